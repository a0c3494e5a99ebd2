pub mod bootstrap;
pub mod checker;
pub mod config;
pub mod error;
pub mod logging;
pub mod probe;
pub mod target;
pub mod verify;

#[cfg(test)]
pub mod test_helpers;

pub use checker::{CheckSettings, FullReport, PullReport, PushReport, StreamChecker};
pub use config::Config;
pub use error::{Error, Result};
pub use target::{PullTarget, PushTarget, StreamTarget};
