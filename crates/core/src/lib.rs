pub mod config;
pub mod path_utils;

pub use self::config::{AppConfig, InstancePolicy};
