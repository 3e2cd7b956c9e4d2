use crate::Client;
use anyhow::Result;
use bella::{
    events::DashboardEvent,
    interactions::{
        CommandContext, InteractionContext, InteractionError, InteractionResult, Response,
    },
    models::{channel::message::Message, user::User, UserLike},
    prelude::*,
    util::mentions,
};
use bella_redis::MemorySnapshot;
use serde_json::json;

/// Discord rejects messages longer than this many characters.
const MAX_MESSAGE_LENGTH: usize = 2000;
const FALLBACK_REPLY: &str = "Sorry, I can't think of anything to say right now.";
const MAX_FACT_LENGTH: usize = 500;

fn build_prompt(memory: &MemorySnapshot, content: &str) -> String {
    let context = memory.as_context();
    if context.is_empty() {
        content.to_owned()
    } else {
        format!("{}\n{}", context, content)
    }
}

fn truncate_reply(mut reply: String) -> String {
    if let Some((idx, _)) = reply.char_indices().nth(MAX_MESSAGE_LENGTH) {
        reply.truncate(idx);
    }
    reply
}

impl Client {
    /// Generates a persona-steered reply to `content` from `user`, who holds `roles` (role
    /// names, in the order Discord lists them on the member).
    pub async fn respond(&self, user: &User, roles: &[String], content: &str) -> String {
        if let Err(err) = self.behaviors.reload().await {
            warn!("Failed to reload behavior config: {}", err);
        }
        let system_instruction = self.behaviors.resolve(&user.id.to_string(), roles).await;

        let mut memory = self.redis.user_memory();
        if let Err(err) = memory.touch(user.id, &user.display_name(), roles).await {
            warn!("Failed to update memory for user {}: {}", user.id, err);
        }
        let snapshot = memory.get(user.id).await.unwrap_or_else(|err| {
            warn!("Failed to load memory for user {}: {}", user.id, err);
            MemorySnapshot::default()
        });

        let prompt = build_prompt(&snapshot, content);
        match self.gemini.generate(&system_instruction, &prompt).await {
            Ok(reply) => {
                metrics::increment_counter!("bella_chat_replies");
                truncate_reply(reply)
            }
            Err(err) => {
                error!("Failed to generate a reply for user {}: {}", user.id, err);
                metrics::increment_counter!("bella_chat_failures");
                FALLBACK_REPLY.to_owned()
            }
        }
    }

    async fn report_message(&self, user: &User, content: &str, source: &str) {
        self.events
            .report(&DashboardEvent::new(
                "message",
                json!({
                    "author": user.display_name(),
                    "author_id": user.id,
                    "content": content,
                    "source": source,
                }),
            ))
            .await;
    }
}

/// Replies to messages that mention the bot, and to every direct message.
pub async fn on_message_create(client: Client, message: Message) -> Result<()> {
    if message.author.bot || message.author.id == client.user_id {
        return Ok(());
    }
    let mentioned = message.mentions.iter().any(|m| m.id == client.user_id)
        || mentions::mentions_user(&message.content, client.user_id);
    if message.guild_id.is_some() && !mentioned {
        return Ok(());
    }

    let content = mentions::strip_user_mention(&message.content, client.user_id);
    if content.is_empty() {
        return Ok(());
    }

    let roles = match (message.guild_id, message.member.as_ref()) {
        (Some(guild_id), Some(member)) => client.cache.role_names(guild_id, &member.roles),
        _ => Vec::new(),
    };
    let reply = client.respond(&message.author, &roles, &content).await;
    client
        .http
        .create_message(message.channel_id)
        .reply(message.id)
        .content(&reply)?
        .exec()
        .await?;
    client.report_message(&message.author, &content, "mention").await;
    Ok(())
}

/// `/chat message`: the same conversation, as a slash command. The reply is deferred since
/// generation regularly takes longer than Discord's response window.
pub async fn chat(client: &Client, ctx: &CommandContext) -> Result<Option<Response>> {
    let content = ctx.get_string("message")?.trim().to_owned();
    if content.is_empty() {
        anyhow::bail!(InteractionError::InvalidArgument(
            "Message must not be empty.".to_owned()
        ));
    }
    let user = ctx.user().ok_or(InteractionError::UserError(
        "Unable to determine who sent this command.",
    ))?;
    let roles = match (ctx.guild_id().ok(), ctx.member()) {
        (Some(guild_id), Some(member)) => client.cache.role_names(guild_id, &member.roles),
        _ => Vec::new(),
    };

    ctx.defer(Response::direct()).await?;
    let reply = client.respond(user, &roles, &content).await;
    ctx.update(reply).await?;
    client.report_message(user, &content, "slash").await;
    Ok(None)
}

fn normalize_fact(fact: &str) -> InteractionResult<String> {
    let fact = fact.split_whitespace().collect::<Vec<_>>().join(" ");
    if fact.is_empty() {
        return Err(InteractionError::InvalidArgument(
            "Fact must not be empty.".to_owned(),
        ));
    }
    if fact.chars().count() > MAX_FACT_LENGTH {
        return Err(InteractionError::InvalidArgument(format!(
            "Facts are limited to {} characters.",
            MAX_FACT_LENGTH
        )));
    }
    Ok(fact)
}

/// `/remember fact`: stores a fact about the caller. Remembered facts are prepended to every
/// prompt the user sends afterwards.
pub async fn remember(client: &Client, ctx: &CommandContext) -> Result<Response> {
    let fact = normalize_fact(ctx.get_string("fact")?)?;
    let user = ctx.user().ok_or(InteractionError::UserError(
        "Unable to determine who sent this command.",
    ))?;
    client.redis.user_memory().add_fact(user.id, &fact).await?;
    info!("Remembered a fact for user {}", user.id);
    Ok(Response::ephemeral().content("Got it, I'll remember that."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_without_memory() {
        assert_eq!(build_prompt(&MemorySnapshot::default(), "hello"), "hello");
    }

    #[test]
    fn test_prompt_with_memory() {
        let memory = MemorySnapshot {
            facts: vec!["Has a cat".to_owned()],
            ..Default::default()
        };
        assert_eq!(
            build_prompt(&memory, "hello"),
            "Things you remember about this user:\n- Has a cat\n\nhello"
        );
    }

    #[test]
    fn test_normalize_fact() {
        assert_eq!(
            normalize_fact("  Has   a\ncat ").unwrap(),
            "Has a cat"
        );
        assert!(matches!(
            normalize_fact(" \t "),
            Err(InteractionError::InvalidArgument(_))
        ));
        let long = "a".repeat(MAX_FACT_LENGTH + 1);
        assert!(matches!(
            normalize_fact(&long),
            Err(InteractionError::InvalidArgument(_))
        ));
        assert!(normalize_fact(&"a".repeat(MAX_FACT_LENGTH)).is_ok());
    }

    #[test]
    fn test_truncate_reply() {
        assert_eq!(truncate_reply("short".to_owned()), "short");
        let long: String = std::iter::repeat('é').take(MAX_MESSAGE_LENGTH + 10).collect();
        assert_eq!(truncate_reply(long).chars().count(), MAX_MESSAGE_LENGTH);
    }
}
