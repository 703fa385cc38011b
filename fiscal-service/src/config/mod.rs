use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Connection settings for the external fiscal document provider.
#[derive(Deserialize, Clone, Debug)]
pub struct ProviderConfig {
    pub api_base_url: String,
    pub api_key: Secret<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("FISCAL_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("FISCAL_SERVICE_PORT")
            .unwrap_or_else(|_| "3006".to_string())
            .parse()?;

        let db_url = env::var("FISCAL_DATABASE_URL").expect("FISCAL_DATABASE_URL must be set");
        let max_connections = env::var("FISCAL_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("FISCAL_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let provider_url =
            env::var("FISCAL_PROVIDER_API_URL").unwrap_or_else(|_| String::new());
        let provider_key = env::var("FISCAL_PROVIDER_API_KEY").unwrap_or_else(|_| String::new());

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            provider: ProviderConfig {
                api_base_url: provider_url,
                api_key: Secret::new(provider_key),
            },
            service_name: "fiscal-service".to_string(),
        })
    }
}
