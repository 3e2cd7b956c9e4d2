pub use twilight_model::user::User;

pub trait UserLike {
    fn name(&self) -> &str;
    fn discriminator(&self) -> u16;

    /// `name#1234` for users that still carry a discriminator, otherwise just the name.
    fn display_name(&self) -> String {
        match self.discriminator() {
            0 => self.name().to_owned(),
            discriminator => format!("{}#{:04}", self.name(), discriminator),
        }
    }
}

impl UserLike for User {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn discriminator(&self) -> u16 {
        self.discriminator
    }
}
