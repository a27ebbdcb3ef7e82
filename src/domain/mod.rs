pub mod clock;
pub mod error;
pub mod model;
pub mod money;

pub use error::{StorefrontError, StorefrontResult};
