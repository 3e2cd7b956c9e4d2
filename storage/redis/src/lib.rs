mod event_log;
mod keys;
mod memory;

pub use redis::*;

pub use self::event_log::{EventLog, LogEntry, LEVEL_ALL};
pub use self::memory::{MemorySnapshot, UserMemory};
use tracing::debug;

type RedisPool = redis::aio::ConnectionManager;

pub async fn init(config: &bella::config::BellaConfig) -> anyhow::Result<RedisClient> {
    debug!("Creating Redis client");
    let client = redis::Client::open(config.redis.as_ref())?;
    let pool = RedisPool::new(client).await?;
    Ok(RedisClient::new(pool))
}

#[derive(Clone)]
pub struct RedisClient(RedisPool);

impl RedisClient {
    pub fn new(connection: RedisPool) -> Self {
        Self(connection)
    }

    pub fn connection_mut(&mut self) -> &mut RedisPool {
        &mut self.0
    }

    pub fn user_memory(&self) -> UserMemory {
        UserMemory(self.clone())
    }

    pub fn event_log(&self) -> EventLog {
        EventLog(self.clone())
    }
}
