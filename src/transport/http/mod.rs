pub mod error;
pub mod router;
pub mod types;
pub mod handlers {
    pub mod claims;
    pub mod common;
    pub mod download;
    pub mod files;
    pub mod health;
    pub mod products;
    pub mod purchases;
}

pub use error::{ApiError, ApiResult};
pub use router::{create_router, ApiDoc};
pub use types::AppState;
