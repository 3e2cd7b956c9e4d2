use crate::keys::CachePrefix;
use crate::RedisClient;
use anyhow::Result;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Oldest entries past this count are discarded.
const MAX_ENTRIES: isize = 1000;
/// The whole log expires after a week without new entries.
const EXPIRATION_SECS: usize = 7 * 24 * 60 * 60;

/// Level filter value that matches every entry.
pub const LEVEL_ALL: &str = "ALL";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub level: String,
    #[serde(default)]
    pub details: Value,
}

impl LogEntry {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
            kind: kind.into(),
            message: message.into(),
            level: "INFO".to_owned(),
            details: Value::Object(Default::default()),
        }
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Decodes stored entries (newest first), skipping any that fail to parse, and applies the
/// level filter and limit.
fn select_entries(raw: Vec<String>, limit: usize, level: Option<&str>) -> Vec<LogEntry> {
    let level = level.filter(|level| *level != LEVEL_ALL);
    raw.iter()
        .filter_map(|entry| serde_json::from_str::<LogEntry>(entry).ok())
        .filter(|entry| level.map(|level| entry.level == level).unwrap_or(true))
        .take(limit)
        .collect()
}

pub struct EventLog(pub(crate) RedisClient);

impl EventLog {
    pub async fn push(&mut self, entry: &LogEntry) -> Result<()> {
        let key = CachePrefix::EventLog.make_key(());
        let encoded = serde_json::to_string(entry)?;
        redis::pipe()
            .atomic()
            .lpush(key, encoded)
            .ignore()
            .ltrim(key, 0, MAX_ENTRIES - 1)
            .ignore()
            .expire(key, EXPIRATION_SECS)
            .ignore()
            .query_async::<_, ()>(self.0.connection_mut())
            .await?;
        Ok(())
    }

    /// The most recent entries, newest first. A level of `None` or `ALL` matches everything.
    pub async fn recent(&mut self, limit: usize, level: Option<&str>) -> Result<Vec<LogEntry>> {
        let key = CachePrefix::EventLog.make_key(());
        let raw: Vec<String> = self
            .0
            .connection_mut()
            .lrange(key, 0, MAX_ENTRIES - 1)
            .await?;
        Ok(select_entries(raw, limit, level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(level: &str, message: &str) -> String {
        serde_json::to_string(&LogEntry::new("system", message).level(level)).unwrap()
    }

    #[test]
    fn test_entry_wire_format() {
        let entry = LogEntry {
            timestamp: 1.5,
            kind: "message".to_owned(),
            message: "Event: message".to_owned(),
            level: "INFO".to_owned(),
            details: json!({"content": "hi"}),
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({
                "timestamp": 1.5,
                "type": "message",
                "message": "Event: message",
                "level": "INFO",
                "details": {"content": "hi"}
            })
        );
    }

    #[test]
    fn test_default_entry() {
        let entry = LogEntry::new("system", "started");
        assert_eq!(entry.level, "INFO");
        assert_eq!(entry.details, json!({}));
        assert!(entry.timestamp > 0.0);
    }

    #[test]
    fn test_select_all_levels() {
        let entries = vec![raw("ERROR", "c"), raw("INFO", "b"), raw("INFO", "a")];
        let messages: Vec<String> = select_entries(entries.clone(), 10, Some(LEVEL_ALL))
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, vec!["c", "b", "a"]);
        assert_eq!(select_entries(entries, 10, None).len(), 3);
    }

    #[test]
    fn test_select_filters_level_then_limits() {
        let entries = vec![
            raw("INFO", "d"),
            raw("ERROR", "c"),
            raw("INFO", "b"),
            raw("INFO", "a"),
        ];
        let messages: Vec<String> = select_entries(entries, 2, Some("INFO"))
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, vec!["d", "b"]);
    }

    #[test]
    fn test_select_skips_corrupt_entries() {
        let entries = vec!["garbage".to_owned(), raw("INFO", "ok")];
        assert_eq!(select_entries(entries, 10, None).len(), 1);
    }
}
