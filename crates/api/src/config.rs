// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;

pub const ALLOWED_DEV_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://localhost:3001"];

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Environment variable {0} must be set")]
    Missing(&'static str),
    #[error("Environment variable {name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub front_end_url: String,
    pub jwt_issuer: String,
    pub jwt_exp: Duration,
    pub signing_key_file: PathBuf,
    pub db_pool_size: u32,
    pub db_connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("Failed to read .env file: {e}");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            port: parse_or(&get, "PORT", 8080)?,
            front_end_url: get("FRONT_END_URL")
                .unwrap_or_else(|| ALLOWED_DEV_ORIGINS[0].to_string()),
            jwt_issuer: get("JWT_ISSUER").unwrap_or_else(|| "league-api".to_string()),
            jwt_exp: Duration::from_secs(parse_or::<u64>(&get, "JWT_EXP_MINUTES", 60)? * 60),
            signing_key_file: get("SIGNING_KEY_FILE")
                .unwrap_or_else(|| "key.json".to_string())
                .into(),
            db_pool_size: parse_or(&get, "DB_POOL_SIZE", 10)?,
            db_connect_timeout: Duration::from_secs(parse_or(&get, "DB_CONNECT_TIMEOUT_SECS", 5)?),
            request_timeout: Duration::from_secs(parse_or(&get, "REQUEST_TIMEOUT_SECS", 15)?),
        })
    }

    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        ALLOWED_DEV_ORIGINS.contains(&origin) || origin == self.front_end_url
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
