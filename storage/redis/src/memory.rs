use crate::keys::CachePrefix;
use crate::RedisClient;
use anyhow::Result;
use bella::models::id::{marker::UserMarker, Id};
use redis::AsyncCommands;
use serde::Serialize;
use std::collections::HashMap;

const FIELD_USERNAME: &str = "username";
const FIELD_ROLES: &str = "roles";
const FIELD_LAST_SEEN: &str = "last_seen";
const FIELD_CREATED_AT: &str = "created_at";
const FIELD_SUMMARY: &str = "summary";

/// What the bot remembers about a user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MemorySnapshot {
    pub facts: Vec<String>,
    pub roles: Vec<String>,
    pub summary: String,
}

impl MemorySnapshot {
    fn from_parts(profile: HashMap<String, String>, facts: Vec<String>) -> Self {
        let roles = profile
            .get(FIELD_ROLES)
            .and_then(|roles| serde_json::from_str(roles).ok())
            .unwrap_or_default();
        Self {
            facts,
            roles,
            summary: profile.get(FIELD_SUMMARY).cloned().unwrap_or_default(),
        }
    }

    /// Renders the known facts as a preamble for a prompt. Empty when nothing is known.
    pub fn as_context(&self) -> String {
        if self.facts.is_empty() {
            return String::new();
        }
        let mut context = String::from("Things you remember about this user:\n");
        for fact in &self.facts {
            context.push_str("- ");
            context.push_str(fact);
            context.push('\n');
        }
        context
    }
}

pub struct UserMemory(pub(crate) RedisClient);

impl UserMemory {
    /// Records that a user was seen. The creation time and summary are only set the first time.
    pub async fn touch(
        &mut self,
        user_id: Id<UserMarker>,
        username: &str,
        roles: &[String],
    ) -> Result<()> {
        let key = CachePrefix::UserMemory.make_key(user_id.get());
        let now = chrono::Utc::now().to_rfc3339();
        let roles = serde_json::to_string(roles)?;
        redis::pipe()
            .atomic()
            .hset_multiple(
                key,
                &[
                    (FIELD_USERNAME, username),
                    (FIELD_ROLES, roles.as_str()),
                    (FIELD_LAST_SEEN, now.as_str()),
                ],
            )
            .ignore()
            .hset_nx(key, FIELD_CREATED_AT, now.as_str())
            .ignore()
            .hset_nx(key, FIELD_SUMMARY, "")
            .ignore()
            .query_async::<_, ()>(self.0.connection_mut())
            .await?;
        Ok(())
    }

    /// Unknown users yield an empty snapshot.
    pub async fn get(&mut self, user_id: Id<UserMarker>) -> Result<MemorySnapshot> {
        let (profile, facts): (HashMap<String, String>, Vec<String>) = redis::pipe()
            .hgetall(CachePrefix::UserMemory.make_key(user_id.get()))
            .lrange(CachePrefix::UserFacts.make_key(user_id.get()), 0, -1)
            .query_async(self.0.connection_mut())
            .await?;
        Ok(MemorySnapshot::from_parts(profile, facts))
    }

    pub async fn add_fact(&mut self, user_id: Id<UserMarker>, fact: &str) -> Result<()> {
        let key = CachePrefix::UserFacts.make_key(user_id.get());
        self.0.connection_mut().rpush::<_, _, ()>(key, fact).await?;
        Ok(())
    }
}
