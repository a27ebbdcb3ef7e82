use crate::domain::model::DownloadToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Display status of a purchase in a buyer's claim history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Completed,
    Expired,
    Available,
    Pending,
    Failed,
}

/// Classifies a purchase from its latest token and the read-time chain re-check.
///
/// `chain_ok` is `None` when the re-check could not be performed; the token then decides.
pub fn classify_claim(
    token: Option<&DownloadToken>,
    chain_ok: Option<bool>,
    now: DateTime<Utc>,
) -> ClaimStatus {
    if chain_ok == Some(false) {
        return ClaimStatus::Failed;
    }
    match token {
        None => ClaimStatus::Pending,
        Some(t) if t.consumed => ClaimStatus::Completed,
        Some(t) if t.is_expired_at(now) => ClaimStatus::Expired,
        Some(_) => ClaimStatus::Available,
    }
}
