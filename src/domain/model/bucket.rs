use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Logical storage category. Each maps to one named bucket in the blob store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    PublicAssets,
    PrivateDownloads,
    Logos,
    Avatars,
    Temp,
}

impl Bucket {
    pub const ALL: [Bucket; 5] = [
        Bucket::PublicAssets,
        Bucket::PrivateDownloads,
        Bucket::Logos,
        Bucket::Avatars,
        Bucket::Temp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Bucket::PublicAssets => "public-assets",
            Bucket::PrivateDownloads => "private-downloads",
            Bucket::Logos => "logos",
            Bucket::Avatars => "avatars",
            Bucket::Temp => "temp",
        }
    }

    /// Public buckets are served over plain URLs; private ones only via signed URLs.
    pub fn is_public(&self) -> bool {
        matches!(self, Bucket::PublicAssets | Bucket::Logos | Bucket::Avatars)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Bucket::ALL
            .into_iter()
            .find(|b| b.name() == wanted)
            .ok_or_else(|| format!("unknown bucket '{}'", s))
    }
}
