pub mod command;
pub mod consent;
pub mod error;
pub mod poller;

pub use command::{BroadcastAction, BroadcastCommand};
pub use error::BroadcastError;
pub use poller::BroadcastPoller;
