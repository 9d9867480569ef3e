//! Channels connect Bruin to the outside world.
//!
//! Inbound: the console channel turns stdin lines into user events.
//! Outbound: the `Notifier` fans broadcast messages out to every subscribed
//! channel, which is how fired alarms reach users.

pub mod cli;
pub mod notify;
pub mod validator;

pub use cli::ConsoleChannel;
pub use notify::Notifier;
pub use validator::MessageValidator;
