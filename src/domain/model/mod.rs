//! Domain records persisted by the row store.

pub mod bucket;
pub mod claim;
pub mod product;
pub mod purchase;

pub use bucket::Bucket;
pub use claim::{classify_claim, ClaimStatus};
pub use product::{NewProduct, Product, ProductChanges};
pub use purchase::{generate_token, DownloadToken, NewPurchase, Purchase, TokenRejection};
