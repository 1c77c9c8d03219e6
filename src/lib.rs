pub mod checker;
pub mod config;
pub mod countdown;
pub mod error;
pub mod fanout;
pub mod log;
pub mod orchestration;
pub mod sleeper;

pub use checker::{PatternChecker, WebsiteChecker};
pub use error::{Error, Result};
pub use fanout::{check_websites, concurrent_map, concurrent_map_joined, CheckResult};
