pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
