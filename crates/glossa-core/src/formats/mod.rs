//! # Formats
//!
//! Snapshot encodings for the merged store and its resolver.
//!
//! Three interchangeable formats share one schema:
//! - `json`: pretty-printed JSON
//! - `json.gz`: gzip-compressed JSON
//! - `msgpack.gz`: gzip-compressed, framed MessagePack

mod persistence;
mod snapshot;

pub use persistence::{SnapshotHeader, payload_from_bytes, payload_to_bytes};
pub use snapshot::{
    IdentityRecord, NextId, ResolverRecord, Snapshot, SnapshotMetadata, canonical_bytes, load,
    save,
};
#[cfg(feature = "crypto-hash")]
pub use snapshot::{snapshot_digest, verify_digest};

use crate::GlossaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Snapshot encoding, selected by tag or file suffix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotFormat {
    #[default]
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "json.gz")]
    JsonGz,
    #[serde(rename = "msgpack.gz")]
    MsgpackGz,
}

impl SnapshotFormat {
    pub const ALL: [SnapshotFormat; 3] = [
        SnapshotFormat::Json,
        SnapshotFormat::JsonGz,
        SnapshotFormat::MsgpackGz,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::JsonGz => "json.gz",
            SnapshotFormat::MsgpackGz => "msgpack.gz",
        }
    }

    /// Infer the format from a path suffix. Unknown suffixes read as `json`.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".msgpack.gz") {
            SnapshotFormat::MsgpackGz
        } else if name.ends_with(".json.gz") {
            SnapshotFormat::JsonGz
        } else {
            SnapshotFormat::Json
        }
    }

    #[must_use]
    pub const fn is_compressed(self) -> bool {
        !matches!(self, SnapshotFormat::Json)
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotFormat {
    type Err = GlossaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SnapshotFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| {
                GlossaError::Config(format!(
                    "Unknown snapshot format '{}' (expected json, json.gz or msgpack.gz)",
                    s
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn format_from_suffix() {
        let cases = [
            ("glossa.json", SnapshotFormat::Json),
            ("data/glossa.json.gz", SnapshotFormat::JsonGz),
            ("GLOSSA.MSGPACK.GZ", SnapshotFormat::MsgpackGz),
            ("glossa.db", SnapshotFormat::Json),
        ];
        for (path, expected) in cases {
            assert_eq!(SnapshotFormat::from_path(&PathBuf::from(path)), expected, "{path}");
        }
    }

    #[test]
    fn format_parses_tags() {
        for format in SnapshotFormat::ALL {
            assert_eq!(format.as_str().parse::<SnapshotFormat>().expect("parse"), format);
        }
        assert!("yaml".parse::<SnapshotFormat>().is_err());
    }
}
