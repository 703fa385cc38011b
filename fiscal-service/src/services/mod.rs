pub mod database;
pub mod metrics;
pub mod provider;
pub mod sync;

pub use database::Database;
pub use provider::FiscalProviderClient;
pub use sync::SyncAgent;
