mod cache;
mod chat;
mod commands;
mod moderation;
mod music;

use crate::{cache::GuildCache, music::Music};
use anyhow::Result;
use bella::{
    ai::GeminiClient,
    behavior::BehaviorStore,
    config,
    events::{DashboardEvent, EventReporter},
    gateway::{Event, EventTypeFlags, Intents},
    image::ImageService,
    init,
    interactions::CommandContext,
    models::{
        application::interaction::Interaction,
        id::{
            marker::{GuildMarker, UserMarker},
            Id,
        },
    },
    prelude::*,
};
use bella_redis::RedisClient;
use futures::stream::StreamExt;
use serde_json::json;
use std::ops::Deref;

const BOT_INTENTS: Intents = Intents::from_bits_truncate(
    Intents::GUILDS.bits()
        | Intents::GUILD_MESSAGES.bits()
        | Intents::MESSAGE_CONTENT.bits()
        | Intents::GUILD_MEMBERS.bits()
        | Intents::GUILD_VOICE_STATES.bits()
        | Intents::DIRECT_MESSAGES.bits(),
);

const BOT_EVENTS: EventTypeFlags = EventTypeFlags::from_bits_truncate(
    EventTypeFlags::READY.bits()
        | EventTypeFlags::GUILD_CREATE.bits()
        | EventTypeFlags::GUILD_DELETE.bits()
        | EventTypeFlags::INTERACTION_CREATE.bits()
        | EventTypeFlags::MESSAGE_CREATE.bits()
        | EventTypeFlags::ROLE_CREATE.bits()
        | EventTypeFlags::ROLE_DELETE.bits()
        | EventTypeFlags::ROLE_UPDATE.bits()
        | EventTypeFlags::VOICE_SERVER_UPDATE.bits()
        | EventTypeFlags::VOICE_STATE_UPDATE.bits(),
);

#[tokio::main]
async fn main() {
    let config = config::load_config().expect("Failed to load config");
    init::init(&config);

    let http_client = Arc::new(init::http_client(&config));
    let redis = bella_redis::init(&config)
        .await
        .expect("Failed to connect to Redis");
    let behaviors = BehaviorStore::open(&config.behaviors.path)
        .await
        .expect("Failed to load behavior config");

    info!("Updating commands...");
    if let Err(err) = http_client
        .interaction(config.discord.application_id)
        .set_global_commands(&commands::all())
        .exec()
        .await
    {
        warn!("Failed to update global commands: {:?}", err);
    }

    let (gateway, mut events) = init::cluster(&config, BOT_INTENTS, http_client.clone())
        .event_types(BOT_EVENTS)
        .build()
        .await
        .expect("Failed to connect to the Discord gateway");
    let gateway = Arc::new(gateway);

    let current_user = http_client
        .current_user()
        .exec()
        .await
        .expect("Current user should not fail to load.")
        .model()
        .await
        .expect("Failed to deserialize bot CurrentUser.");

    let music = Music::new(current_user.id, gateway.clone());
    for node in config.music.nodes.iter().cloned() {
        tokio::spawn(music.clone().run_node(node));
    }

    let client = Client(Arc::new(ClientRef {
        user_id: current_user.id,
        http: http_client,
        cache: GuildCache::default(),
        behaviors,
        gemini: GeminiClient::new(&config.ai),
        images: ImageService::new(&config.image),
        redis,
        events: EventReporter::new(config.web.events_url.clone()),
        music,
    }));

    info!("Starting gateway...");
    gateway.up().await;
    info!("Client started.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => { break; }
            res = events.next() => {
                if let Some((_, evt)) = res {
                    client.cache.update(&evt);
                    client.music.process(&evt).await;
                    tokio::spawn(client.clone().consume_event(evt));
                } else {
                    break;
                }
            }
        }
    }

    info!("Shutting down gateway...");
    gateway.down();
    info!("Client stopped.");
}

pub struct ClientRef {
    pub user_id: Id<UserMarker>,
    pub http: Arc<bella::http::Client>,
    pub cache: GuildCache,
    pub behaviors: BehaviorStore,
    pub gemini: GeminiClient,
    pub images: ImageService,
    pub redis: RedisClient,
    pub events: EventReporter,
    pub music: Music,
}

#[derive(Clone)]
pub struct Client(Arc<ClientRef>);

impl Deref for Client {
    type Target = ClientRef;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Client {
    async fn consume_event(self, event: Event) {
        let kind = event.kind();
        let result = match event {
            Event::Ready(ready) => {
                info!("Logged in as {} ({})", ready.user.name, ready.user.id);
                Ok(())
            }
            Event::MessageCreate(evt) => chat::on_message_create(self.clone(), evt.0).await,
            Event::InteractionCreate(evt) => self.clone().on_interaction_create(evt.0).await,
            Event::GuildDelete(evt) if !evt.unavailable => self.on_guild_leave(evt.id).await,
            _ => Ok(()),
        };

        if let Err(err) = result {
            error!("Error while running event with {:?}: {:?}", kind, err);
            self.events
                .report(&DashboardEvent::new(
                    "error",
                    json!({"event": format!("{:?}", kind), "error": err.to_string()}),
                ))
                .await;
        }
    }

    async fn on_interaction_create(self, interaction: Interaction) -> Result<()> {
        match CommandContext::new(self.http.clone(), interaction) {
            Some(ctx) => commands::handle_command(self, ctx).await,
            None => {
                debug!("Ignoring non-command interaction.");
                Ok(())
            }
        }
    }

    async fn on_guild_leave(&self, guild_id: Id<GuildMarker>) -> Result<()> {
        if self.music.is_playing(guild_id) {
            self.music.disconnect(guild_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(Client: Send, Sync, Clone);
}
