use crate::AppState;
use actix_web::{get, web, HttpResponse};
use bella_redis::LogEntry;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

const MAX_LIMIT: usize = 1000;

#[derive(Deserialize)]
struct LogQuery {
    #[serde(default = "LogQuery::default_limit")]
    limit: usize,
    level: Option<String>,
}

impl LogQuery {
    fn default_limit() -> usize {
        50
    }
}

/// Recent dashboard events, newest first. Without Redis the log is always empty.
#[get("/logs")]
async fn get_logs(state: web::Data<AppState>, query: web::Query<LogQuery>) -> HttpResponse {
    let logs: Vec<LogEntry> = match state.redis.as_ref() {
        Some(redis) => redis
            .event_log()
            .recent(query.limit.min(MAX_LIMIT), query.level.as_deref())
            .await
            .unwrap_or_else(|err| {
                warn!("Failed to fetch logs: {}", err);
                Vec::new()
            }),
        None => Vec::new(),
    };
    HttpResponse::Ok().json(json!({ "logs": logs }))
}

pub fn scoped_config(cfg: &mut web::ServiceConfig) {
    cfg.service(get_logs);
}
