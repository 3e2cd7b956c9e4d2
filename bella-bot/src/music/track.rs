use bella::models::id::{marker::GuildMarker, Id};
use std::{fmt, time::Duration};
use twilight_lavalink::model::Play;

#[derive(Clone, Debug)]
pub struct TrackInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub uri: String,
    pub length: Duration,
    pub is_stream: bool,
}

impl fmt::Display for TrackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.title, &self.author) {
            (Some(title), Some(author)) => write!(f, "{} - {}", author, title),
            (Some(title), None) => f.write_str(title),
            _ => f.write_str(&self.uri),
        }
    }
}

impl From<twilight_lavalink::http::TrackInfo> for TrackInfo {
    fn from(value: twilight_lavalink::http::TrackInfo) -> Self {
        Self {
            title: value.title,
            author: value.author,
            uri: value.uri,
            length: Duration::from_millis(value.length),
            is_stream: value.is_stream,
        }
    }
}

/// A loaded track. `track` is the opaque Lavalink encoding passed back when playing it.
#[derive(Clone, Debug)]
pub struct Track {
    pub info: TrackInfo,
    pub track: String,
}

impl Track {
    pub fn play(&self, guild_id: Id<GuildMarker>) -> Play {
        Play::new(guild_id, self.track.clone(), None, None, false)
    }
}

impl From<twilight_lavalink::http::Track> for Track {
    fn from(value: twilight_lavalink::http::Track) -> Self {
        Self {
            info: value.info.into(),
            track: value.track,
        }
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, secs) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
