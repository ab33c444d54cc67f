//! # strata-types: Core types for `Strata`
//!
//! This crate contains shared types used across the `Strata` event lake:
//! - Event records ([`Event`], [`EventType`]) and ingestion metadata ([`IngestMeta`], [`BronzeRecord`])
//! - Lake addressing ([`Layer`], [`BatchId`], [`BatchPrefix`])
//! - Injected time ([`Clock`], [`SystemClock`], [`ManualClock`])

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod clock;
mod event;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event::{BronzeRecord, Event, IngestMeta, Rejection, coerce_f64, parse_timestamp};

/// Event version assumed when a producer omits `event_version`.
pub const DEFAULT_EVENT_VERSION: &str = "1.0";

// ============================================================================
// Event Type
// ============================================================================

/// Name of an event kind, e.g. `transaction-initiated`.
///
/// Event types are open: producers may introduce new kinds at any time, and
/// every component falls back to generic behavior for kinds it does not know.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    /// Placeholder for records that carry no `event_type`.
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the name starts with the given domain prefix
    /// (`transaction`, `remittance`, ...).
    pub fn is_domain(&self, domain: &str) -> bool {
        self.0.starts_with(domain)
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for EventType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Layer
// ============================================================================

/// Data lake tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Raw, immutable events as received.
    Bronze,
    /// Validated, deduplicated, de-identified events.
    Silver,
    /// Materialized analytical datasets.
    Gold,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Bronze, Layer::Silver, Layer::Gold];

    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
            Layer::Gold => "gold",
        }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown layer name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLayerError(pub String);

impl Display for ParseLayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown layer '{}' (expected bronze, silver or gold)", self.0)
    }
}

impl std::error::Error for ParseLayerError {}

impl FromStr for Layer {
    type Err = ParseLayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bronze" => Ok(Layer::Bronze),
            "silver" => Ok(Layer::Silver),
            "gold" => Ok(Layer::Gold),
            other => Err(ParseLayerError(other.to_string())),
        }
    }
}

// ============================================================================
// Batch IDs
// ============================================================================

/// Prefix distinguishing what kind of writer produced a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPrefix {
    /// Bronze flushes and silver writes.
    Batch,
    /// Dead-letter partitions.
    Rejected,
    /// Gold refreshes.
    Gold,
}

impl BatchPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchPrefix::Batch => "batch",
            BatchPrefix::Rejected => "rejected",
            BatchPrefix::Gold => "gold",
        }
    }
}

/// Identifier of one written partition, unique within its second.
///
/// Generated ids are the prefix followed by 8 lowercase hex characters,
/// e.g. `batch1a2b3c4d`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random batch id with the given prefix.
    pub fn generate(prefix: BatchPrefix) -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}{}", prefix.as_str(), &hex[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(BatchPrefix::Batch, "batch")]
    #[test_case(BatchPrefix::Rejected, "rejected")]
    #[test_case(BatchPrefix::Gold, "gold")]
    fn batch_id_has_prefix_and_eight_hex(prefix: BatchPrefix, expected: &str) {
        let id = BatchId::generate(prefix);
        let s = id.as_str();
        assert!(s.starts_with(expected));
        let suffix = &s[expected.len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn batch_ids_are_unique() {
        let a = BatchId::generate(BatchPrefix::Batch);
        let b = BatchId::generate(BatchPrefix::Batch);
        assert_ne!(a, b);
    }

    #[test]
    fn layer_roundtrips_through_str() {
        for layer in Layer::ALL {
            assert_eq!(layer.as_str().parse::<Layer>().unwrap(), layer);
        }
        assert!("platinum".parse::<Layer>().is_err());
    }

    #[test]
    fn event_type_domain_prefix() {
        let t = EventType::from("remittance-initiated");
        assert!(t.is_domain("remittance"));
        assert!(!t.is_domain("transaction"));
    }
}
