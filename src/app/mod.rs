pub mod catalog;
pub mod claims;
pub mod files;
pub mod purchase;

pub use catalog::{CatalogService, DeletionReport, ProductInput};
pub use claims::{ClaimEntry, ClaimHistory, ClaimHistoryResponse, ClaimRequest, ProductSummary};
pub use files::{FileGateway, StoredFile};
pub use purchase::{DirectDownload, PurchaseReceipt, PurchaseRequest, PurchaseService, Redemption};
