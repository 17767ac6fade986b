// In crates/app-config/src/types.rs

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Settings for the database connection.
    pub database: DatabaseSettings,
    /// Settings for the HTTP API server.
    pub server: ServerSettings,
    /// Settings for the trading account itself.
    #[serde(default)]
    pub ledger: LedgerSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseSettings {
    /// The connection URL for the PostgreSQL database.
    pub url: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LedgerSettings {
    /// Cash a brand-new account starts with, in account currency.
    #[serde(default = "default_starting_cash")]
    pub starting_cash: f64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            starting_cash: default_starting_cash(),
        }
    }
}

fn default_starting_cash() -> f64 {
    1_000_000.0
}
