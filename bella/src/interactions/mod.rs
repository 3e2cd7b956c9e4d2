mod commands;

pub use commands::*;

use crate::{
    http,
    models::{
        channel::message::MessageFlags,
        guild::{PartialMember, Permissions},
        http::{
            attachment::Attachment,
            interaction::{InteractionResponse, InteractionResponseData, InteractionResponseType},
        },
        id::{
            marker::{ApplicationMarker, GuildMarker, InteractionMarker},
            Id,
        },
        user::User,
    },
};
use std::sync::Arc;
use thiserror::Error;

pub type InteractionResult<T> = std::result::Result<T, InteractionError>;

#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("Unknown command. This command is currently unusable.")]
    UnknownCommand,
    #[error("Command can only be used in a server.")]
    NotInGuild,
    #[error("Missing argument: {}", .0)]
    MissingArgument(&'static str),
    #[error("Invalid argument: {}", .0)]
    InvalidArgument(String),
    #[error("User failed to satisfy preconditions: {}", .0)]
    FailedPrecondition(&'static str),
    #[error("User is missing permission: `{0}`")]
    MissingPermission(&'static str),
    #[error("{0}")]
    UserError(&'static str),
}

pub struct Response(InteractionResponseData);

impl Response {
    pub fn direct() -> Self {
        Self(InteractionResponseData::default())
    }

    pub fn ephemeral() -> Self {
        Self::direct().flag(MessageFlags::EPHEMERAL)
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.0.content = Some(content.into());
        self
    }

    pub fn flag(mut self, flags: impl Into<MessageFlags>) -> Self {
        self.0.flags = Some(flags.into() | self.0.flags.unwrap_or(MessageFlags::empty()));
        self
    }
}

impl From<Response> for InteractionResponseData {
    fn from(value: Response) -> Self {
        value.0
    }
}

#[async_trait::async_trait]
pub trait InteractionContext {
    fn http(&self) -> &Arc<http::Client>;
    fn id(&self) -> Id<InteractionMarker>;
    fn application_id(&self) -> Id<ApplicationMarker>;
    fn token(&self) -> &str;
    fn member(&self) -> Option<&PartialMember>;
    fn guild_id(&self) -> InteractionResult<Id<GuildMarker>>;
    fn user(&self) -> Option<&User>;

    async fn defer(
        &self,
        data: impl Into<InteractionResponseData> + Send + 'async_trait,
    ) -> anyhow::Result<()> {
        self.reply_raw(InteractionResponse {
            kind: InteractionResponseType::DeferredChannelMessageWithSource,
            data: Some(data.into()),
        })
        .await
    }

    async fn reply(
        &self,
        data: impl Into<InteractionResponseData> + Send + 'async_trait,
    ) -> anyhow::Result<()> {
        self.reply_raw(InteractionResponse {
            kind: InteractionResponseType::ChannelMessageWithSource,
            data: Some(data.into()),
        })
        .await
    }

    async fn reply_raw(&self, response: InteractionResponse) -> anyhow::Result<()> {
        self.http()
            .interaction(self.application_id())
            .create_response(self.id(), self.token(), &response)
            .exec()
            .await?;
        Ok(())
    }

    /// Replaces the content of a previously deferred response.
    async fn update(&self, content: String) -> anyhow::Result<()> {
        self.http()
            .interaction(self.application_id())
            .update_response(self.token())
            .content(Some(&content))?
            .exec()
            .await?;
        Ok(())
    }

    /// Replaces a previously deferred response with uploaded files.
    async fn update_attachments(&self, attachments: &[Attachment]) -> anyhow::Result<()> {
        self.http()
            .interaction(self.application_id())
            .update_response(self.token())
            .attachments(attachments)?
            .exec()
            .await?;
        Ok(())
    }

    /// Checks if the caller has a given set of permissions. All provided permissions must be
    /// present for this to return true.
    fn has_user_permission(&self, perms: Permissions) -> bool {
        self.member()
            .and_then(|m| m.permissions)
            .map(|p| p.contains(perms))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeral_response() {
        let data: InteractionResponseData = Response::ephemeral().content(":x: Error").into();
        assert_eq!(data.content.as_deref(), Some(":x: Error"));
        assert_eq!(data.flags, Some(MessageFlags::EPHEMERAL));
    }

    #[test]
    fn test_direct_response_has_no_flags() {
        let data: InteractionResponseData = Response::direct().content("hi").into();
        assert!(data.flags.is_none());
    }
}
