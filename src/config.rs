// src/config.rs

use std::{env, time::Duration};

use dotenvy::dotenv;
use thiserror::Error;

use crate::engine::QuizRunConfiguration;

const DEFAULT_JWT_EXPIRATION: u64 = 7 * 24 * 60 * 60;
const DEFAULT_IMGBB_UPLOAD_URL: &str = "https://api.imgbb.com/1/upload";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is not valid: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Without one the in-memory store is used.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub timer_enabled: bool,
    pub question_seconds: u64,
    pub imgbb_api_key: Option<String>,
    pub imgbb_upload_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = optional("DATABASE_URL");

        let jwt_secret = optional("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let jwt_expiration = parsed("JWT_EXPIRATION", DEFAULT_JWT_EXPIRATION)?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let timer_enabled = parsed("QUIZ_TIMER_ENABLED", true)?;

        let question_seconds = parsed(
            "QUIZ_QUESTION_SECONDS",
            QuizRunConfiguration::DEFAULT_QUESTION_SECONDS,
        )?;

        let imgbb_api_key = optional("IMGBB_API_KEY");

        let imgbb_upload_url =
            optional("IMGBB_UPLOAD_URL").unwrap_or_else(|| DEFAULT_IMGBB_UPLOAD_URL.to_string());

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            timer_enabled,
            question_seconds,
            imgbb_api_key,
            imgbb_upload_url,
        })
    }

    /// Attempt-flow settings derived from this configuration.
    pub fn run_configuration(&self) -> QuizRunConfiguration {
        if self.timer_enabled {
            QuizRunConfiguration::timed(Duration::from_secs(self.question_seconds))
        } else {
            QuizRunConfiguration::untimed()
        }
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
