#[macro_use]
extern crate lazy_static;

pub mod ai;
pub mod behavior;
pub mod config;
pub mod events;
pub mod image;
pub mod init;
pub mod interactions;
pub mod models;
pub mod prelude;
pub mod util;

pub use twilight_gateway as gateway;
pub use twilight_http as http;
