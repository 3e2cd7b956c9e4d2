mod commands;
mod queue;
mod track;

pub use self::commands::handle_command;
pub use self::queue::MusicQueue;
pub use self::track::{format_duration, Track, TrackInfo};

use anyhow::{bail, Result};
use bella::{
    config::MusicNode,
    gateway::{Cluster, Event},
    models::{
        gateway::payload::outgoing::UpdateVoiceState,
        id::{
            marker::{ChannelMarker, GuildMarker, UserMarker},
            Id,
        },
    },
    prelude::*,
};
use dashmap::DashMap;
use futures::stream::StreamExt;
use hyper::{client::HttpConnector, Body, Client as HyperClient, Request};
use twilight_lavalink::{
    http::{LoadType, LoadedTracks},
    model::{IncomingEvent, Stop, TrackEnd},
    node::IncomingEvents,
    Lavalink, Node,
};

pub type GuildQueue = MusicQueue<Id<UserMarker>, Track>;

/// Lavalink backed music playback. One queue per guild; a guild without a queue has no player.
#[derive(Clone)]
pub struct Music {
    lavalink: Arc<Lavalink>,
    gateway: Arc<Cluster>,
    hyper: HyperClient<HttpConnector>,
    queues: Arc<DashMap<Id<GuildMarker>, GuildQueue>>,
}

impl Music {
    pub fn new(user_id: Id<UserMarker>, gateway: Arc<Cluster>) -> Self {
        Self {
            lavalink: Arc::new(Lavalink::new(user_id, gateway.total_shards())),
            gateway,
            hyper: HyperClient::new(),
            queues: Arc::new(DashMap::new()),
        }
    }

    /// Feeds voice events from the gateway to Lavalink.
    pub async fn process(&self, event: &Event) {
        if let Err(err) = self.lavalink.process(event).await {
            error!("Error while handling Lavalink event: {}", err);
        }
    }

    async fn connect_node(&self, node: &MusicNode) -> Result<IncomingEvents> {
        let addresses = tokio::net::lookup_host((node.host.as_str(), node.port)).await?;
        for address in addresses {
            debug!("Trying to connect to a Lavalink node at: {}", address);
            match self.lavalink.add(address, node.password.as_str()).await {
                Ok((_, rx)) => return Ok(rx),
                Err(err) => debug!("Failed to connect to {}: {:?}", address, err),
            }
        }
        bail!("No valid destination. Cannot connect.");
    }

    /// Keeps a connection to one Lavalink node open, reconnecting whenever it drops.
    pub async fn run_node(self, node: MusicNode) {
        info!("Starting listener for node {} ({}:{}).", node.identifier, node.host, node.port);
        loop {
            let mut rx = match self.connect_node(&node).await {
                Ok(rx) => rx,
                Err(err) => {
                    error!("Error connecting to node {}: {:?}", node.identifier, err);
                    debug!("Retrying connection to {} in 5 seconds.", node.identifier);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            info!("Connected to node {}.", node.identifier);
            while let Some(event) = rx.next().await {
                tokio::spawn(self.clone().handle_lavalink_event(event));
            }
            info!("Disconnected from node {}.", node.identifier);
        }
    }

    async fn handle_lavalink_event(self, event: IncomingEvent) {
        let result = match &event {
            IncomingEvent::TrackStart(evt) => {
                info!("Started track in guild {}: {}", evt.guild_id, evt.track);
                Ok(())
            }
            IncomingEvent::TrackEnd(evt) => self.on_track_end(evt).await,
            _ => Ok(()),
        };

        if let Err(err) = result {
            error!("Error while handling Lavalink event {:?}: {:?}", event, err);
        }
    }

    async fn on_track_end(&self, evt: &TrackEnd) -> Result<()> {
        info!("Track ended in guild {} (reason: {})", evt.guild_id, evt.reason);
        match evt.reason.as_str() {
            "FINISHED" | "LOAD_FAILED" => {
                self.play_next(evt.guild_id).await?;
            }
            _ => {}
        }
        Ok(())
    }

    /// The voice channel the bot is connected to in a guild, if any.
    pub fn channel(&self, guild_id: Id<GuildMarker>) -> Option<Id<ChannelMarker>> {
        self.lavalink
            .players()
            .get(&guild_id)
            .and_then(|player| player.channel_id())
    }

    pub fn is_playing(&self, guild_id: Id<GuildMarker>) -> bool {
        self.queues
            .get(&guild_id)
            .map(|queue| !queue.is_empty())
            .unwrap_or(false)
    }

    pub fn currently_playing(&self, guild_id: Id<GuildMarker>) -> Option<Track> {
        self.queues
            .get(&guild_id)
            .and_then(|queue| queue.peek().map(|item| item.value.clone()))
    }

    /// Reads a guild's queue, if it has one.
    pub fn with_queue<F, R>(&self, guild_id: Id<GuildMarker>, f: F) -> Option<R>
    where
        F: FnOnce(&GuildQueue) -> R,
    {
        self.queues.get(&guild_id).map(|queue| f(queue.value()))
    }

    async fn node(&self, guild_id: Id<GuildMarker>) -> Result<Arc<Node>> {
        Ok(match self.lavalink.players().get(&guild_id) {
            Some(player) => player.node().clone(),
            None => self.lavalink.best().await?,
        })
    }

    async fn load_tracks(&self, node: &Node, query: &str) -> Result<LoadedTracks> {
        let config = node.config();
        let (parts, body) =
            twilight_lavalink::http::load_track(config.address, query, &config.authorization)?
                .into_parts();
        let request = Request::from_parts(parts, Body::from(body));
        let response = self.hyper.request(request).await?;
        let bytes = hyper::body::to_bytes(response.into_body()).await?;
        Ok(serde_json::from_slice::<LoadedTracks>(&bytes)?)
    }

    /// Resolves a user query into tracks. The raw query is tried first, then a YouTube search,
    /// then a SoundCloud search.
    pub async fn search(&self, guild_id: Id<GuildMarker>, query: &str) -> Result<Vec<Track>> {
        let node = self.node(guild_id).await?;
        for subquery in search_queries(query) {
            match self.load_tracks(&node, &subquery).await {
                Ok(loaded) => {
                    let tracks = select_tracks(loaded);
                    if !tracks.is_empty() {
                        return Ok(tracks.into_iter().map(Track::from).collect());
                    }
                }
                Err(err) => warn!("Failed to load tracks for `{}`: {}", subquery, err),
            }
        }
        Ok(Vec::new())
    }

    /// Adds tracks to the guild's queue. Connects and starts playback when the guild had nothing
    /// queued.
    pub async fn enqueue(
        &self,
        guild_id: Id<GuildMarker>,
        channel_id: Id<ChannelMarker>,
        user_id: Id<UserMarker>,
        tracks: Vec<Track>,
    ) -> Result<()> {
        let was_idle = {
            let mut queue = self.queues.entry(guild_id).or_default();
            let was_idle = queue.is_empty();
            queue.extend(user_id, tracks);
            was_idle
        };
        if was_idle {
            self.connect(guild_id, channel_id).await?;
            self.start_playing(guild_id).await?;
        }
        Ok(())
    }

    async fn start_playing(&self, guild_id: Id<GuildMarker>) -> Result<()> {
        if let Some(track) = self.currently_playing(guild_id) {
            let player = self.lavalink.player(guild_id).await?;
            player.send(track.play(guild_id))?;
        }
        Ok(())
    }

    /// Advances the queue. Disconnects once nothing is left. Returns the track that was playing.
    pub async fn play_next(&self, guild_id: Id<GuildMarker>) -> Result<Option<TrackInfo>> {
        let previous = match self.queues.get_mut(&guild_id) {
            Some(mut queue) => queue.pop().map(|item| item.value.info),
            None => return Ok(None),
        };
        // The queue lock must be released before touching the player.
        if self.currently_playing(guild_id).is_some() {
            self.start_playing(guild_id).await?;
        } else {
            self.disconnect(guild_id).await?;
        }
        Ok(previous)
    }

    pub async fn connect(
        &self,
        guild_id: Id<GuildMarker>,
        channel_id: Id<ChannelMarker>,
    ) -> Result<()> {
        self.gateway
            .command(
                self.gateway.shard_id(guild_id),
                &UpdateVoiceState::new(guild_id, Some(channel_id), false, false),
            )
            .await?;
        info!("Connected to channel {} in guild {}", channel_id, guild_id);
        Ok(())
    }

    /// Stops playback, leaves the voice channel and drops the guild's queue.
    pub async fn disconnect(&self, guild_id: Id<GuildMarker>) -> Result<()> {
        if let Some(player) = self.lavalink.players().get(&guild_id) {
            if let Err(err) = player.send(Stop::from(guild_id)) {
                warn!("Failed to stop player in guild {}: {}", guild_id, err);
            }
        }
        self.gateway
            .command(
                self.gateway.shard_id(guild_id),
                &UpdateVoiceState::new(guild_id, None, false, false),
            )
            .await?;
        self.lavalink.players().destroy(guild_id)?;
        self.queues.remove(&guild_id);
        info!("Disconnected and cleared the queue in guild {}", guild_id);
        Ok(())
    }
}

fn search_queries(query: &str) -> [String; 3] {
    let query = query.trim_matches(|c: char| c.is_whitespace() || c == '<' || c == '>');
    [
        query.to_owned(),
        format!("ytsearch:{}", query),
        format!("scsearch:{}", query),
    ]
}

/// Picks what to enqueue out of a load result: the single track for direct loads and searches,
/// the selected track or the whole list for playlists, nothing on failure.
fn select_tracks(loaded: LoadedTracks) -> Vec<twilight_lavalink::http::Track> {
    let LoadedTracks {
        load_type,
        playlist_info,
        mut tracks,
        ..
    } = loaded;
    match load_type {
        LoadType::TrackLoaded | LoadType::SearchResult => {
            tracks.truncate(1);
            tracks
        }
        LoadType::PlaylistLoaded => match playlist_info
            .selected_track
            .and_then(|idx| usize::try_from(idx).ok())
            .filter(|idx| *idx < tracks.len())
        {
            Some(idx) => vec![tracks.swap_remove(idx)],
            None => tracks,
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_queries() {
        assert_eq!(
            search_queries(" <https://youtu.be/abc> "),
            [
                "https://youtu.be/abc".to_owned(),
                "ytsearch:https://youtu.be/abc".to_owned(),
                "scsearch:https://youtu.be/abc".to_owned(),
            ]
        );
    }
}
