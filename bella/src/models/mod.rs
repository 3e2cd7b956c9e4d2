pub mod user;

pub use twilight_model::application;
pub use twilight_model::channel;
pub use twilight_model::gateway;
pub use twilight_model::guild;
pub use twilight_model::http;
pub use twilight_model::id;
pub use twilight_model::voice;

pub use self::user::UserLike;
