pub mod config;
pub mod domain;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use config::Config;
use services::{Database, FiscalProviderClient, SyncAgent};

pub use startup::Application;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub provider: FiscalProviderClient,
    pub sync: SyncAgent,
    pub config: Config,
}
