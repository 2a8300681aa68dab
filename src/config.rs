use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

/// Seven days, the lifetime of an identity token.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 7;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// `None` when `JWT_SECRET` is unset; token operations then fail closed.
    pub secret: Option<String>,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Postgres connection string. Without it the process runs on in-memory stores.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub allowed_origins: Vec<String>,
    pub environment: String,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = non_empty_var("DATABASE_URL");
        let jwt = JwtConfig {
            secret: non_empty_var("JWT_SECRET"),
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "moviemeter".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "moviemeter-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_TOKEN_TTL_MINUTES),
        };

        let allowed_origins = [
            non_empty_var("CLIENT_ORIGIN"),
            Some(non_empty_var("LOCAL_ORIGIN").unwrap_or_else(|| "http://localhost:3000".into())),
        ]
        .into_iter()
        .flatten()
        .collect();

        let environment = std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let host = non_empty_var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match non_empty_var("APP_PORT") {
            Some(v) => v.parse::<u16>().with_context(|| format!("APP_PORT {v:?} is not a port"))?,
            None => 5000,
        };

        Ok(Self {
            database_url,
            jwt,
            allowed_origins,
            environment,
            host,
            port,
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
