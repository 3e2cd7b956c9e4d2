use bella::{
    gateway::Event,
    models::{
        guild::Role,
        id::{
            marker::{ChannelMarker, GuildMarker, RoleMarker, UserMarker},
            Id,
        },
        voice::VoiceState,
    },
};
use dashmap::DashMap;
use std::collections::HashMap;

/// The small slice of guild state the bot needs: role names, to resolve personas, and which
/// voice channel each member is in, for music.
#[derive(Default)]
pub struct GuildCache {
    roles: DashMap<Id<GuildMarker>, HashMap<Id<RoleMarker>, String>>,
    voice: DashMap<(Id<GuildMarker>, Id<UserMarker>), Id<ChannelMarker>>,
}

impl GuildCache {
    pub fn update(&self, event: &Event) {
        match event {
            Event::GuildCreate(evt) => {
                self.replace_roles(evt.0.id, &evt.0.roles);
                for state in evt.0.voice_states.iter() {
                    self.update_voice_state(evt.0.id, state);
                }
            }
            Event::GuildDelete(evt) => self.remove_guild(evt.id),
            Event::RoleCreate(evt) => self.set_role(evt.guild_id, evt.role.id, &evt.role.name),
            Event::RoleUpdate(evt) => self.set_role(evt.guild_id, evt.role.id, &evt.role.name),
            Event::RoleDelete(evt) => self.remove_role(evt.guild_id, evt.role_id),
            Event::VoiceStateUpdate(evt) => {
                if let Some(guild_id) = evt.0.guild_id {
                    self.update_voice_state(guild_id, &evt.0);
                }
            }
            _ => {}
        }
    }

    fn replace_roles(&self, guild_id: Id<GuildMarker>, roles: &[Role]) {
        let roles = roles
            .iter()
            .map(|role| (role.id, role.name.clone()))
            .collect();
        self.roles.insert(guild_id, roles);
    }

    fn update_voice_state(&self, guild_id: Id<GuildMarker>, state: &VoiceState) {
        self.set_voice_channel(guild_id, state.user_id, state.channel_id);
    }

    pub fn set_role(&self, guild_id: Id<GuildMarker>, role_id: Id<RoleMarker>, name: &str) {
        self.roles
            .entry(guild_id)
            .or_default()
            .insert(role_id, name.to_owned());
    }

    pub fn remove_role(&self, guild_id: Id<GuildMarker>, role_id: Id<RoleMarker>) {
        if let Some(mut roles) = self.roles.get_mut(&guild_id) {
            roles.remove(&role_id);
        }
    }

    pub fn remove_guild(&self, guild_id: Id<GuildMarker>) {
        self.roles.remove(&guild_id);
        self.voice.retain(|(guild, _), _| *guild != guild_id);
    }

    pub fn set_voice_channel(
        &self,
        guild_id: Id<GuildMarker>,
        user_id: Id<UserMarker>,
        channel_id: Option<Id<ChannelMarker>>,
    ) {
        match channel_id {
            Some(channel_id) => {
                self.voice.insert((guild_id, user_id), channel_id);
            }
            None => {
                self.voice.remove(&(guild_id, user_id));
            }
        }
    }

    /// Looks up the names of the given roles, keeping their order. Unknown roles are skipped.
    pub fn role_names(&self, guild_id: Id<GuildMarker>, role_ids: &[Id<RoleMarker>]) -> Vec<String> {
        match self.roles.get(&guild_id) {
            Some(roles) => role_ids
                .iter()
                .filter_map(|id| roles.get(id).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn voice_channel(
        &self,
        guild_id: Id<GuildMarker>,
        user_id: Id<UserMarker>,
    ) -> Option<Id<ChannelMarker>> {
        self.voice.get(&(guild_id, user_id)).map(|kv| *kv.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: Id<GuildMarker> = Id::new(1);

    #[test]
    fn test_role_names_keep_member_order() {
        let cache = GuildCache::default();
        cache.set_role(GUILD, Id::new(10), "Admin");
        cache.set_role(GUILD, Id::new(11), "Member");
        cache.set_role(GUILD, Id::new(12), "Owner");

        let names = cache.role_names(GUILD, &[Id::new(12), Id::new(99), Id::new(10)]);
        assert_eq!(names, vec!["Owner", "Admin"]);
    }

    #[test]
    fn test_role_rename_and_delete() {
        let cache = GuildCache::default();
        cache.set_role(GUILD, Id::new(10), "Admin");
        cache.set_role(GUILD, Id::new(10), "Moderator");
        assert_eq!(cache.role_names(GUILD, &[Id::new(10)]), vec!["Moderator"]);

        cache.remove_role(GUILD, Id::new(10));
        assert!(cache.role_names(GUILD, &[Id::new(10)]).is_empty());
    }

    #[test]
    fn test_unknown_guild_has_no_roles() {
        let cache = GuildCache::default();
        assert!(cache.role_names(Id::new(2), &[Id::new(10)]).is_empty());
    }

    #[test]
    fn test_voice_channel_tracking() {
        let cache = GuildCache::default();
        let user = Id::new(5);
        cache.set_voice_channel(GUILD, user, Some(Id::new(100)));
        assert_eq!(cache.voice_channel(GUILD, user), Some(Id::new(100)));

        cache.set_voice_channel(GUILD, user, None);
        assert_eq!(cache.voice_channel(GUILD, user), None);
    }

    #[test]
    fn test_remove_guild_clears_everything() {
        let cache = GuildCache::default();
        let user = Id::new(5);
        cache.set_role(GUILD, Id::new(10), "Admin");
        cache.set_voice_channel(GUILD, user, Some(Id::new(100)));
        cache.set_voice_channel(Id::new(2), user, Some(Id::new(200)));

        cache.remove_guild(GUILD);
        assert!(cache.role_names(GUILD, &[Id::new(10)]).is_empty());
        assert_eq!(cache.voice_channel(GUILD, user), None);
        assert_eq!(cache.voice_channel(Id::new(2), user), Some(Id::new(200)));
    }
}
