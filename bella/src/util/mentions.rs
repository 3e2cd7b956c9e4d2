use crate::models::id::{marker::UserMarker, Id};
use regex::Regex;
use std::str::FromStr;

lazy_static! {
    static ref USER_MENTION_REGEX: Regex = Regex::new(r"<@!?(\d+)>").unwrap();
}

pub fn get_user_mention_ids(text: &str) -> impl Iterator<Item = Id<UserMarker>> + '_ {
    USER_MENTION_REGEX
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|hit| u64::from_str(hit.as_str()).ok())
        .filter_map(Id::new_checked)
}

pub fn mentions_user(text: &str, user_id: Id<UserMarker>) -> bool {
    get_user_mention_ids(text).any(|id| id == user_id)
}

/// Removes every mention of `user_id` from the text and trims the result.
pub fn strip_user_mention(text: &str, user_id: Id<UserMarker>) -> String {
    USER_MENTION_REGEX
        .replace_all(text, |caps: &regex::Captures| {
            let mentioned = caps
                .get(1)
                .and_then(|id| u64::from_str(id.as_str()).ok())
                .map(|id| id == user_id.get())
                .unwrap_or(false);
            if mentioned {
                String::new()
            } else {
                caps[0].to_owned()
            }
        })
        .trim()
        .to_owned()
}
