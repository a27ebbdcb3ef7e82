pub mod blobs;
pub mod rows;

pub use blobs::{BlobError, BlobStore};
pub use rows::{RowStore, StoreError, StoreResult};
