use crate::{
    http::Client,
    interactions::{InteractionContext, InteractionError, InteractionResult},
    models::{
        application::interaction::{
            application_command::{CommandData, CommandDataOption, CommandOptionValue},
            Interaction, InteractionData,
        },
        guild::PartialMember,
        id::{
            marker::{ApplicationMarker, GuildMarker, InteractionMarker, UserMarker},
            Id,
        },
        user::User,
    },
};
use std::sync::Arc;

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Command(&'a str),
    SubCommand(&'a str, &'a str),
}

#[derive(Clone)]
pub struct CommandContext {
    pub http: Arc<Client>,
    pub command: Interaction,
}

impl CommandContext {
    /// Wraps an interaction. Returns `None` if it is not an application command.
    pub fn new(client: Arc<Client>, interaction: Interaction) -> Option<Self> {
        match interaction.data {
            Some(InteractionData::ApplicationCommand(_)) => Some(Self {
                http: client,
                command: interaction,
            }),
            _ => None,
        }
    }

    fn data(&self) -> Option<&CommandData> {
        match &self.command.data {
            Some(InteractionData::ApplicationCommand(data)) => Some(&**data),
            _ => None,
        }
    }

    fn raw_options(&self) -> &[CommandDataOption] {
        self.data().map(|data| data.options.as_slice()).unwrap_or(&[])
    }

    pub fn command(&self) -> Command<'_> {
        let base = self.data().map(|data| data.name.as_str()).unwrap_or_default();
        match get_subcommand(self.raw_options()) {
            Some((sub, _)) => Command::SubCommand(base, sub),
            None => Command::Command(base),
        }
    }

    pub fn options(&self) -> impl Iterator<Item = &CommandDataOption> {
        flatten_options(self.raw_options()).into_iter()
    }

    pub fn option_named(&self, name: &'static str) -> Option<&CommandDataOption> {
        self.options().find(move |opt| opt.name == name)
    }

    /// Attempts to find the first argument with a given name that is of type String.
    pub fn get_string(&self, name: &'static str) -> InteractionResult<&String> {
        self.option_named(name)
            .and_then(|option| match option.value {
                CommandOptionValue::String(ref value) => Some(value),
                _ => None,
            })
            .ok_or(InteractionError::MissingArgument(name))
    }

    pub fn get_int(&self, name: &'static str) -> InteractionResult<i64> {
        self.option_named(name)
            .and_then(|option| match option.value {
                CommandOptionValue::Integer(value) => Some(value),
                _ => None,
            })
            .ok_or(InteractionError::MissingArgument(name))
    }

    pub fn get_user(&self, name: &'static str) -> InteractionResult<Id<UserMarker>> {
        self.option_named(name)
            .and_then(|option| match option.value {
                CommandOptionValue::User(value) => Some(value),
                _ => None,
            })
            .ok_or(InteractionError::MissingArgument(name))
    }

}

fn flatten_options(options: &[CommandDataOption]) -> Vec<&CommandDataOption> {
    let mut all_options: Vec<&CommandDataOption> = Vec::new();
    for option in options.iter() {
        if let CommandOptionValue::SubCommand(ref options) = option.value {
            all_options.extend(flatten_options(options));
        } else {
            all_options.push(option);
        }
    }
    all_options
}

fn get_subcommand(options: &[CommandDataOption]) -> Option<(&str, &[CommandDataOption])> {
    options.iter().find_map(|option| match option.value {
        CommandOptionValue::SubCommand(ref options) => Some((option.name.as_str(), options.as_slice())),
        _ => None,
    })
}

impl InteractionContext for CommandContext {
    fn http(&self) -> &Arc<Client> {
        &self.http
    }

    fn id(&self) -> Id<InteractionMarker> {
        self.command.id
    }

    fn application_id(&self) -> Id<ApplicationMarker> {
        self.command.application_id
    }

    fn token(&self) -> &str {
        &self.command.token
    }

    fn member(&self) -> Option<&PartialMember> {
        self.command.member.as_ref()
    }

    fn guild_id(&self) -> InteractionResult<Id<GuildMarker>> {
        self.command.guild_id.ok_or(InteractionError::NotInGuild)
    }

    fn user(&self) -> Option<&User> {
        let member = self
            .command
            .member
            .as_ref()
            .and_then(|member| member.user.as_ref());
        self.command.user.as_ref().or(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(name: &str, value: CommandOptionValue) -> CommandDataOption {
        CommandDataOption {
            name: name.to_owned(),
            value,
        }
    }

    #[test]
    fn test_flatten_options_descends_into_subcommands() {
        let options = vec![option(
            "play",
            CommandOptionValue::SubCommand(vec![
                option("query", CommandOptionValue::String("song".to_owned())),
                option("loud", CommandOptionValue::Boolean(true)),
            ]),
        )];
        let names: Vec<&str> = flatten_options(&options)
            .into_iter()
            .map(|opt| opt.name.as_str())
            .collect();
        assert_eq!(names, vec!["query", "loud"]);
    }

    #[test]
    fn test_get_subcommand() {
        let options = vec![option("skip", CommandOptionValue::SubCommand(Vec::new()))];
        assert_eq!(get_subcommand(&options).map(|(name, _)| name), Some("skip"));

        let flat = vec![option("prompt", CommandOptionValue::String("x".to_owned()))];
        assert!(get_subcommand(&flat).is_none());
    }
}
