pub mod app;
pub mod domain;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::{CatalogService, ClaimHistory, FileGateway, PurchaseService};
pub use domain::{StorefrontError, StorefrontResult};
pub use infra::logging::init_logging;
pub use infra::StorefrontConfig;
pub use storage::{BlobStore, RowStore};
