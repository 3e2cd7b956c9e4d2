use anyhow::Result;
use bella::{
    events::DashboardEvent,
    http::request::AuditLogReason,
    interactions::{CommandContext, InteractionContext, InteractionError, Response},
    models::{guild::Permissions, UserLike},
};
use serde_json::json;
use tracing::info;

const DEFAULT_REASON: &str = "No reason provided";
/// Discord rejects audit log reasons longer than this many characters.
const MAX_AUDIT_REASON_LENGTH: usize = 512;

/// The audit log entry, cut down to what Discord accepts.
fn build_reason(action: &str, authorizer: &str, reason: &str) -> String {
    let mut audit_reason = format!("{} by {} for: {}", action, authorizer, reason);
    if let Some((idx, _)) = audit_reason.char_indices().nth(MAX_AUDIT_REASON_LENGTH) {
        audit_reason.truncate(idx);
    }
    audit_reason
}

fn reason(ctx: &CommandContext) -> &str {
    ctx.get_string("reason")
        .map(|reason| reason.as_str())
        .ok()
        .filter(|reason| !reason.trim().is_empty())
        .unwrap_or(DEFAULT_REASON)
}

fn authorizer_name(ctx: &CommandContext) -> String {
    ctx.user()
        .map(|user| user.display_name())
        .unwrap_or_else(|| "unknown".to_owned())
}

pub(super) async fn ban(client: &crate::Client, ctx: &CommandContext) -> Result<Response> {
    let guild_id = ctx.guild_id()?;
    if !ctx.has_user_permission(Permissions::BAN_MEMBERS) {
        anyhow::bail!(InteractionError::MissingPermission("Ban Members"));
    }
    let user_id = ctx.get_user("user")?;
    let reason = reason(ctx);
    let audit_reason = build_reason("Banned", &authorizer_name(ctx), reason);

    ctx.http
        .create_ban(guild_id, user_id)
        .reason(&audit_reason)?
        .exec()
        .await?;
    info!("Banned user {} from guild {}: {}", user_id, guild_id, audit_reason);
    client
        .events
        .report(&DashboardEvent::new(
            "moderation",
            json!({"action": "ban", "guild_id": guild_id, "user_id": user_id, "reason": reason}),
        ))
        .await;

    Ok(Response::direct().content(format!("Banned <@{}> for: {}", user_id, reason)))
}

pub(super) async fn kick(client: &crate::Client, ctx: &CommandContext) -> Result<Response> {
    let guild_id = ctx.guild_id()?;
    if !ctx.has_user_permission(Permissions::KICK_MEMBERS) {
        anyhow::bail!(InteractionError::MissingPermission("Kick Members"));
    }
    let user_id = ctx.get_user("user")?;
    let reason = reason(ctx);
    let audit_reason = build_reason("Kicked", &authorizer_name(ctx), reason);

    ctx.http
        .remove_guild_member(guild_id, user_id)
        .reason(&audit_reason)?
        .exec()
        .await?;
    info!("Kicked user {} from guild {}: {}", user_id, guild_id, audit_reason);
    client
        .events
        .report(&DashboardEvent::new(
            "moderation",
            json!({"action": "kick", "guild_id": guild_id, "user_id": user_id, "reason": reason}),
        ))
        .await;

    Ok(Response::direct().content(format!("Kicked <@{}> for: {}", user_id, reason)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_reason_is_truncated() {
        let reason = "ü".repeat(1000);
        let audit_reason = build_reason("Banned", "mod#0001", &reason);
        assert_eq!(audit_reason.chars().count(), MAX_AUDIT_REASON_LENGTH);
        assert!(audit_reason.starts_with("Banned by mod#0001 for: üü"));

        let exact = "a".repeat(MAX_AUDIT_REASON_LENGTH - "Kicked by m for: ".len());
        assert_eq!(
            build_reason("Kicked", "m", &exact).chars().count(),
            MAX_AUDIT_REASON_LENGTH
        );
    }

    #[test]
    fn test_build_reason() {
        assert_eq!(
            build_reason("Banned", "mod#0001", "spam"),
            "Banned by mod#0001 for: spam"
        );
        assert_eq!(
            build_reason("Kicked", "mod", DEFAULT_REASON),
            "Kicked by mod for: No reason provided"
        );
    }
}
