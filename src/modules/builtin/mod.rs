//! Modules shipped with the bot.

mod admin;
mod ping;
mod urltitle;

pub use admin::Admin;
pub use ping::Ping;
pub use urltitle::UrlTitle;
