mod behaviors;
mod events;
mod images;
mod logs;
mod oauth;
mod prelude;
mod spa;

use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpServer};
use bella::{
    behavior::BehaviorStore,
    config::{self, BellaConfig},
    image::ImageService,
    init,
};
use bella_redis::RedisClient;
use std::{sync::Arc, time::Duration};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

/// How many dashboard events a slow WebSocket client may fall behind before it skips ahead.
const EVENT_BUFFER: usize = 256;
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) struct AppState {
    config: BellaConfig,
    http: awc::Client,
    behaviors: Arc<BehaviorStore>,
    redis: Option<RedisClient>,
    images: Arc<ImageService>,
    events: broadcast::Sender<String>,
}

impl AppState {
    /// Publishes a dashboard event to every connected WebSocket client.
    pub fn broadcast(&self, event: String) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

pub fn api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(web::scope("/behaviors").configure(behaviors::scoped_config))
            .service(web::scope("/image").configure(images::scoped_config))
            .configure(logs::scoped_config),
    );
    cfg.service(web::scope("/auth/discord").configure(oauth::scoped_config));
    cfg.configure(events::scoped_config);
}

fn cors(config: &BellaConfig) -> Cors {
    config
        .web
        .allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .supports_credentials()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = config::load_config().expect("Failed to load config");
    init::init_logging(&config);

    let behaviors = Arc::new(
        BehaviorStore::open(&config.behaviors.path)
            .await
            .expect("Failed to load behavior config"),
    );
    let redis = match bella_redis::init(&config).await {
        Ok(redis) => Some(redis),
        Err(err) => {
            warn!("Redis is unavailable, the event log is disabled: {}", err);
            None
        }
    };
    let images = Arc::new(ImageService::new(&config.image));
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    let address = (config.web.host.clone(), config.web.port);

    info!("Listening on {}:{}", address.0, address.1);
    HttpServer::new(move || {
        App::new()
            .wrap(cors(&config))
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(AppState {
                config: config.clone(),
                http: awc::Client::builder().timeout(UPSTREAM_TIMEOUT).finish(),
                behaviors: behaviors.clone(),
                redis: redis.clone(),
                images: images.clone(),
                events: events.clone(),
            }))
            .configure(api)
            .configure(spa::configure(config.web.static_dir.clone()))
    })
    .bind(address)?
    .run()
    .await
}
