use super::{format_duration, GuildQueue, Track};
use crate::Client;
use anyhow::{bail, Result};
use bella::{
    interactions::{CommandContext, InteractionContext, InteractionError, Response},
    models::id::{
        marker::{ChannelMarker, GuildMarker},
        Id,
    },
};
use std::time::Duration;

const QUEUE_PAGE_SIZE: usize = 10;

pub async fn handle_command(
    client: &Client,
    ctx: &CommandContext,
    subcommand: &str,
) -> Result<Response> {
    match subcommand {
        "play" => play(client, ctx).await,
        "skip" => skip(client, ctx).await,
        "stop" => stop(client, ctx).await,
        "queue" => queue(client, ctx),
        _ => bail!(InteractionError::UnknownCommand),
    }
}

/// The caller must be in a voice channel, and in the bot's channel if the bot is connected.
fn require_in_voice_channel(
    client: &Client,
    ctx: &CommandContext,
) -> Result<(Id<GuildMarker>, Id<ChannelMarker>)> {
    let guild_id = ctx.guild_id()?;
    let user_id = ctx.user().map(|user| user.id);
    let user = user_id.and_then(|id| client.cache.voice_channel(guild_id, id));
    let bot = client.music.channel(guild_id);
    match (user, bot) {
        (Some(user), Some(bot)) if user != bot => bail!(InteractionError::FailedPrecondition(
            "You must be in the same voice channel to play music."
        )),
        (Some(user), _) => Ok((guild_id, user)),
        (None, _) => bail!(InteractionError::FailedPrecondition(
            "You must be in a voice channel to play music."
        )),
    }
}

fn require_playing(client: &Client, ctx: &CommandContext) -> Result<Id<GuildMarker>> {
    let guild_id = ctx.guild_id()?;
    if !client.music.is_playing(guild_id) {
        bail!(InteractionError::FailedPrecondition(
            "No music is currently playing."
        ));
    }
    Ok(guild_id)
}

async fn play(client: &Client, ctx: &CommandContext) -> Result<Response> {
    let (guild_id, channel_id) = require_in_voice_channel(client, ctx)?;
    let user_id = ctx
        .user()
        .map(|user| user.id)
        .ok_or(InteractionError::NotInGuild)?;
    let query = ctx.get_string("query")?;

    let tracks = client.music.search(guild_id, query).await?;
    let response = describe_added(query, &tracks);
    if !tracks.is_empty() {
        client
            .music
            .enqueue(guild_id, channel_id, user_id, tracks)
            .await?;
    }
    Ok(Response::direct().content(response))
}

async fn skip(client: &Client, ctx: &CommandContext) -> Result<Response> {
    let guild_id = require_playing(client, ctx)?;
    require_in_voice_channel(client, ctx)?;
    let response = match client.music.play_next(guild_id).await? {
        Some(previous) => format!("Skipped `{}`.", previous),
        None => "There is nothing in the queue right now.".to_owned(),
    };
    Ok(Response::direct().content(response))
}

async fn stop(client: &Client, ctx: &CommandContext) -> Result<Response> {
    let guild_id = require_playing(client, ctx)?;
    require_in_voice_channel(client, ctx)?;
    client.music.disconnect(guild_id).await?;
    Ok(Response::direct().content("The player has been stopped and the queue has been cleared."))
}

fn queue(client: &Client, ctx: &CommandContext) -> Result<Response> {
    let guild_id = require_playing(client, ctx)?;
    let text = client
        .music
        .with_queue(guild_id, format_queue)
        .unwrap_or_else(|| "The queue is empty.".to_owned());
    Ok(Response::direct().content(text))
}

fn describe_added(query: &str, tracks: &[Track]) -> String {
    let duration = format_duration(tracks.iter().map(|t| t.info.length).sum::<Duration>());
    match tracks {
        [] => format!(":bulb: No results found for `{}`", query),
        [track] => format!(
            ":notes: Added **[{}](<{}>)** ({}) to the music queue.",
            track.info, track.info.uri, duration
        ),
        _ => format!(
            ":notes: Added **{}** tracks ({}) to the music queue.",
            tracks.len(),
            duration
        ),
    }
}

fn format_queue(queue: &GuildQueue) -> String {
    let mut lines = Vec::new();
    for (idx, item) in queue.iter().take(QUEUE_PAGE_SIZE).enumerate() {
        let prefix = if idx == 0 {
            ":arrow_forward:".to_owned()
        } else {
            format!("`{}.`", idx)
        };
        let length = if item.value.info.is_stream {
            "LIVE".to_owned()
        } else {
            format_duration(item.value.info.length)
        };
        lines.push(format!(
            "{} **{}** ({}) - <@{}>",
            prefix, item.value.info, length, item.key
        ));
    }
    let remaining = queue.len().saturating_sub(QUEUE_PAGE_SIZE);
    if remaining > 0 {
        lines.push(format!("... and {} more.", remaining));
    }
    lines.join("\n")
}
