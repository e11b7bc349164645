//! Runtime configuration from environment variables

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Context;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub log_level: String,
    pub study: StudySettings,
}

/// Scheduling knobs shared by every request
#[derive(Debug, Clone, PartialEq)]
pub struct StudySettings {
    /// Used when the user has no enrollment for the card's course
    pub default_desired_retention: f64,
    pub new_cards_per_day: u32,
    pub reviews_per_day: u32,
    /// Review writes attempted before a version conflict is surfaced
    pub review_max_attempts: u32,
    pub weak_topic_limit: usize,
}

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            default_desired_retention: 0.9,
            new_cards_per_day: 20,
            reviews_per_day: 200,
            review_max_attempts: 3,
            weak_topic_limit: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let defaults = StudySettings::default();
        let study = StudySettings {
            default_desired_retention: env_or(
                "DEFAULT_DESIRED_RETENTION",
                defaults.default_desired_retention,
            ),
            new_cards_per_day: env_or("NEW_CARDS_PER_DAY", defaults.new_cards_per_day),
            reviews_per_day: env_or("REVIEWS_PER_DAY", defaults.reviews_per_day),
            review_max_attempts: env_or("REVIEW_MAX_ATTEMPTS", defaults.review_max_attempts).max(1),
            weak_topic_limit: env_or("WEAK_TOPIC_LIMIT", defaults.weak_topic_limit),
        };
        anyhow::ensure!(
            study.default_desired_retention > 0.0 && study.default_desired_retention < 1.0,
            "DEFAULT_DESIRED_RETENTION must be between 0 and 1, got {}",
            study.default_desired_retention
        );

        Ok(Self {
            host,
            port: env_or("PORT", 3000),
            database_url,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            study,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}
