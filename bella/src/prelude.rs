pub use std::{sync::Arc, time::Duration};
pub use tracing::{debug, error, info, warn};
use twilight_model::id::{marker::GuildMarker, Id};

pub trait ClusterExt {
    fn total_shards(&self) -> u64;

    /// Gets the shard ID for a guild.
    #[inline(always)]
    fn shard_id(&self, guild_id: Id<GuildMarker>) -> u64 {
        (guild_id.get() >> 22) % self.total_shards()
    }
}

impl ClusterExt for twilight_gateway::Cluster {
    #[inline(always)]
    fn total_shards(&self) -> u64 {
        let shards = self.shards().count() as u64;
        assert!(shards > 0, "Bot somehow has a total of zero shards.");
        shards
    }
}
