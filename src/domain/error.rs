//! Error taxonomy shared by every storefront operation.

use crate::domain::model::TokenRejection;
use crate::infra::chain::ChainError;
use crate::storage::blobs::BlobError;
use crate::storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Missing or malformed input; raised before any external call.
    #[error("{message}")]
    Validation { code: &'static str, message: String },
    #[error("{0}")]
    NotFound(String),
    /// Tenant mismatch on a mutating call.
    #[error("{0}")]
    Forbidden(String),
    /// Wallet signature did not match the claimed address.
    #[error("{0}")]
    Unauthorized(String),
    #[error("{message}")]
    Conflict { code: &'static str, message: String },
    #[error("{0}")]
    Gone(String),
    #[error("product is sold out")]
    SoldOut,
    #[error("payload of {actual} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize, actual: usize },
    /// Store, blob storage or chain RPC failure. Not retried here.
    #[error("{context}: {detail}")]
    Upstream { context: &'static str, detail: String },
}

pub type StorefrontResult<T> = Result<T, StorefrontError>;

impl StorefrontError {
    pub fn validation(message: impl Into<String>) -> Self {
        StorefrontError::Validation {
            code: "VALIDATION_ERROR",
            message: message.into(),
        }
    }

    pub fn validation_code(code: &'static str, message: impl Into<String>) -> Self {
        StorefrontError::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        StorefrontError::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn upstream(context: &'static str, detail: impl ToString) -> Self {
        StorefrontError::Upstream {
            context,
            detail: detail.to_string(),
        }
    }
}

impl From<StoreError> for StorefrontError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => StorefrontError::NotFound(what),
            StoreError::Conflict(what) => StorefrontError::conflict("CONFLICT", what),
            StoreError::Exhausted => StorefrontError::SoldOut,
            StoreError::Unexpected(e) => StorefrontError::upstream("row store", format!("{:#}", e)),
        }
    }
}

impl From<BlobError> for StorefrontError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound { .. } => StorefrontError::NotFound(err.to_string()),
            other => StorefrontError::upstream("blob storage", other),
        }
    }
}

impl From<ChainError> for StorefrontError {
    fn from(err: ChainError) -> Self {
        StorefrontError::upstream("chain rpc", err)
    }
}

impl From<TokenRejection> for StorefrontError {
    fn from(rejection: TokenRejection) -> Self {
        match rejection {
            TokenRejection::NotFound => StorefrontError::NotFound("download token not found".to_string()),
            TokenRejection::Expired => StorefrontError::Gone("download token has expired".to_string()),
            TokenRejection::AlreadyUsed => StorefrontError::conflict(
                "TOKEN_ALREADY_USED",
                "download token already used",
            ),
        }
    }
}
