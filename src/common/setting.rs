//! setting config file
//! `ENV` selects `config_{ENV}.toml`, defaults to `dev`

use std::{env, fs};
use std::str::FromStr;
use lazy_static::lazy_static;
use serde_derive::Deserialize;
use super::error::ConfigError;

const DEFAULT_ENV: &str = "dev";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub application_name: String,
}

impl Default for Meta {
    fn default() -> Self {
        Self { application_name: "k8055-communicator".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Env {
    pub debug: bool,
    pub env: String,
    pub log_level: String,
}

impl Default for Env {
    fn default() -> Self {
        Self {
            debug: false,
            env: DEFAULT_ENV.to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Communicator {
    /// "dummy" runs against simulated cards, "real" needs a hardware port
    pub mode: String,
    /// devices to start on boot
    pub devices: Vec<i32>,
    /// bit i set means simulated card i is attached (dummy mode only)
    pub present_cards: u8,
    /// bound of the queued delivery channel, 0 means unbounded
    pub event_buffer: usize,
}

impl Default for Communicator {
    fn default() -> Self {
        Self {
            mode: "dummy".to_string(),
            devices: vec![0],
            present_cards: 0b0001,
            event_buffer: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub meta: Meta,
    pub env: Env,
    pub communicator: Communicator,
}

/// parse settings from toml text, missing keys take their defaults
impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        toml::from_str(text).map_err(|e| ConfigError(format!("config file format invalid: {}", e)))
    }
}

impl Settings {
    pub fn get<'a>() -> &'a Self {
        lazy_static! {
            static ref CACHE: Settings = Settings::load_from_env();
        }
        &CACHE
    }

    /// read and parse one settings file
    pub fn load(file_path: &str) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(file_path)
            .map_err(|e| ConfigError(format!("cannot read config file {}: {}", file_path, e)))?;
        text.parse()
    }

    fn load_from_env() -> Self {
        let env = match env::var("ENV") {
            Ok(e) => e,
            Err(_) => {
                log::warn!("no ENV set, use default: '{}'", DEFAULT_ENV);
                DEFAULT_ENV.to_string()
            }
        };
        let file_path = format!("config_{}.toml", env);

        match Self::load(&file_path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}, use default settings", e);
                Self::default()
            }
        }
    }
}
