pub mod chain;
pub mod config;
pub mod logging;
pub mod wallet;

pub use config::{StoreBackend, StorefrontConfig};
