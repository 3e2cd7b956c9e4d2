use crate::{chat, moderation, music, Client};
use anyhow::Result;
use bella::{
    events::DashboardEvent,
    image::{self, ImageRequest},
    interactions::{Command, CommandContext, InteractionContext, InteractionError, Response},
    models::{
        application::command::{Command as ApplicationCommand, CommandType},
        guild::Permissions,
        http::attachment::Attachment,
    },
};
use serde_json::json;
use tracing::warn;
use twilight_util::builder::command::{
    CommandBuilder, IntegerBuilder, StringBuilder, SubCommandBuilder, UserBuilder,
};

const IMAGE_FILENAME: &str = "imagine.jpg";

/// Every global slash command the bot registers at start-up.
pub fn all() -> Vec<ApplicationCommand> {
    vec![
        CommandBuilder::new("chat", "Chat with Bella", CommandType::ChatInput)
            .option(StringBuilder::new("message", "What to say").required(true))
            .build(),
        CommandBuilder::new(
            "remember",
            "Tell Bella something to remember about you",
            CommandType::ChatInput,
        )
        .option(StringBuilder::new("fact", "What to remember").required(true))
        .build(),
        CommandBuilder::new("ban", "Ban a user", CommandType::ChatInput)
            .default_member_permissions(Permissions::BAN_MEMBERS)
            .dm_permission(false)
            .option(UserBuilder::new("user", "The user to ban").required(true))
            .option(StringBuilder::new("reason", "Why the user is being banned"))
            .build(),
        CommandBuilder::new("kick", "Kick a user", CommandType::ChatInput)
            .default_member_permissions(Permissions::KICK_MEMBERS)
            .dm_permission(false)
            .option(UserBuilder::new("user", "The user to kick").required(true))
            .option(StringBuilder::new("reason", "Why the user is being kicked"))
            .build(),
        CommandBuilder::new("imagine", "Generate an image", CommandType::ChatInput)
            .option(StringBuilder::new("prompt", "What to draw").required(true))
            .option(
                StringBuilder::new("model", "Which image model to use")
                    .choices(image::MODELS.iter().map(|model| (*model, *model))),
            )
            .option(
                IntegerBuilder::new("seed", "Seed for reproducible results").min_value(0),
            )
            .build(),
        CommandBuilder::new("music", "Play music in voice channels", CommandType::ChatInput)
            .dm_permission(false)
            .option(
                SubCommandBuilder::new("play", "Add a song or playlist to the queue").option(
                    StringBuilder::new("query", "A URL or search terms").required(true),
                ),
            )
            .option(SubCommandBuilder::new("skip", "Skip the current song"))
            .option(SubCommandBuilder::new(
                "stop",
                "Stop playing and clear the queue",
            ))
            .option(SubCommandBuilder::new("queue", "Show the music queue"))
            .build(),
    ]
}

pub async fn handle_command(client: Client, ctx: CommandContext) -> Result<()> {
    let command = ctx.command();
    tracing::info!("Received command: {:?}", command);
    metrics::increment_counter!("bella_commands", "command" => command_name(&command));
    let result = match command {
        Command::Command("chat") => chat::chat(&client, &ctx).await,
        Command::Command("ban") => moderation::ban(&client, &ctx).await.map(Some),
        Command::Command("kick") => moderation::kick(&client, &ctx).await.map(Some),
        Command::Command("imagine") => imagine(&client, &ctx).await,
        Command::Command("remember") => chat::remember(&client, &ctx).await.map(Some),
        Command::SubCommand("music", sub) => {
            music::handle_command(&client, &ctx, sub).await.map(Some)
        }
        _ => Err(anyhow::Error::new(InteractionError::UnknownCommand)),
    };

    match result {
        Ok(Some(response)) => ctx.reply(response).await,
        Ok(None) => Ok(()),
        Err(err) => {
            let response = Response::ephemeral();
            if let Some(command_err) = err.downcast_ref::<InteractionError>() {
                ctx.reply(response.content(format!(":x: Error: {}", command_err)))
                    .await?;
                Ok(())
            } else {
                ctx.reply(response.content(":x: Fatal Error: Internal Error has occurred."))
                    .await?;
                Err(err)
            }
        }
    }
}

fn command_name(command: &Command<'_>) -> String {
    match command {
        Command::Command(name) => (*name).to_owned(),
        Command::SubCommand(name, sub) => format!("{} {}", name, sub),
    }
}

fn image_attachment(image: Vec<u8>) -> Attachment {
    Attachment::from_bytes(IMAGE_FILENAME.to_owned(), image, 0)
}

/// `/imagine`: uploads the generated image. Falls back to posting its link when the download
/// fails, the link renders the same image once it is ready.
async fn imagine(client: &Client, ctx: &CommandContext) -> Result<Option<Response>> {
    let mut request = ImageRequest::new(ctx.get_string("prompt")?.as_str());
    request.model = ctx.get_string("model").ok().cloned();
    request.seed = ctx.get_int("seed").ok().and_then(|seed| u64::try_from(seed).ok());
    if let Err(err) = request.validate() {
        anyhow::bail!(InteractionError::InvalidArgument(err.to_string()));
    }

    let url = client.images.generate_url(&request);
    ctx.defer(Response::direct()).await?;
    match client.images.fetch_bytes(&request).await {
        Ok(image) => ctx.update_attachments(&[image_attachment(image)]).await?,
        Err(err) => {
            warn!("Failed to download generated image: {}", err);
            ctx.update(url.clone()).await?;
        }
    }
    client
        .events
        .report(&DashboardEvent::new(
            "image",
            json!({"prompt": request.prompt, "url": url}),
        ))
        .await;
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names_are_unique() {
        let commands = all();
        let mut names: Vec<&str> = commands.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names, vec!["ban", "chat", "imagine", "kick", "music", "remember"]);
    }

    #[test]
    fn test_image_attachment() {
        let attachment = image_attachment(vec![0xff, 0xd8, 0xff]);
        assert_eq!(attachment.filename, "imagine.jpg");
        assert_eq!(attachment.file, vec![0xff, 0xd8, 0xff]);
        assert_eq!(attachment.id, 0);
    }

    #[test]
    fn test_command_name() {
        assert_eq!(command_name(&Command::Command("ban")), "ban");
        assert_eq!(command_name(&Command::SubCommand("music", "play")), "music play");
    }
}
