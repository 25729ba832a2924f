//! Process-wide configuration.
//!
//! Unlike the teacher's `agent::config`, which parses a `config.ini` file and
//! resolves login profiles, this daemon has no accounts of its own to manage:
//! the control plane binds loopback-only and is otherwise unauthenticated
//! (spec §1 non-goals), and every remote credential arrives per-request via
//! `UserData` (see `crate::transfer::UserData`). What's left to configure is
//! process-wide: the control-plane port and the fallback farm host. Both are
//! resolved from the environment, falling back to built-in defaults, and the
//! result is an owned value threaded through `actix_web::web::Data` rather
//! than a global/lazy_static singleton.

pub mod constants;
mod error;

pub use self::error::{Error, Result};

use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub control_plane_port: u16,
    pub default_farm_host: String,
    pub r2_base_url: String,
    pub log_level: log::LevelFilter,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let control_plane_port = Self::env_parsed(
            "TRANSFER_MANAGER_PORT",
            constants::DEFAULT_CONTROL_PLANE_PORT,
        )?;

        let default_farm_host = env::var("TRANSFER_MANAGER_DEFAULT_FARM_HOST")
            .unwrap_or_else(|_| constants::DEFAULT_FARM_HOST.to_owned());

        let r2_base_url = env::var("TRANSFER_MANAGER_R2_BASE_URL")
            .unwrap_or_else(|_| constants::DEFAULT_R2_BASE_URL.to_owned());

        let log_level = env::var("TRANSFER_MANAGER_LOG_LEVEL")
            .ok()
            .and_then(|s| log::LevelFilter::from_str(&s).ok())
            .unwrap_or(log::LevelFilter::Info);

        Ok(Self {
            control_plane_port,
            default_farm_host,
            r2_base_url,
            log_level,
        })
    }

    fn env_parsed<T>(var: &'static str, default: T) -> Result<T>
    where
        T: FromStr,
    {
        match env::var(var) {
            Ok(value) => value
                .parse()
                .map_err(|_| Error::InvalidPort { var, value }),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_plane_port: constants::DEFAULT_CONTROL_PLANE_PORT,
            default_farm_host: constants::DEFAULT_FARM_HOST.to_owned(),
            r2_base_url: constants::DEFAULT_R2_BASE_URL.to_owned(),
            log_level: log::LevelFilter::Info,
        }
    }
}
