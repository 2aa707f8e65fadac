pub mod config;
pub mod error;
pub mod types;

pub use config::{AccessConfig, ChatPlayConfig, CommandConfig, EngineConfig, GeneralConfig, Privilege};
pub use error::{ChatPlayError, Result};
pub use types::*;
