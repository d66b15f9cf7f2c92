use std::{net::IpAddr, path::PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::InitError;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_server_address")]
    pub server_address: IpAddr,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_index_cache_seconds")]
    pub index_cache_seconds: u64,
}

fn default_server_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_server_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "yatube.db".to_string()
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_jwt_secret() -> String {
    "dev-secret-change-me".to_string()
}

fn default_index_cache_seconds() -> u64 {
    20
}

impl Config {
    /// Reads `.env` when present, then the process environment.
    pub fn from_env() -> Result<Self, InitError> {
        if let Err(e) = dotenvy::dotenv() {
            if e.not_found() {
                debug!("No .env file found");
            } else {
                return Err(e.into());
            }
        }

        envy::from_env().map_err(InitError::from)
    }
}
