//! Resource names
//!
//! Source and destination identifiers are slash-separated paths of the form
//! `.../<scope>/<kind>/<name>`, e.g. `projects/my-project/subscriptions/dlq`.
//! Only the last three segments carry meaning; anything before them is kept
//! verbatim so the full name can be sent back to the broker unchanged.

use std::fmt;

use crate::utils::error::BrokerError;

/// Minimum number of path segments in a valid resource name.
pub const MIN_SEGMENTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceName {
    full: String,
    scope: String,
    kind: String,
    name: String,
}

impl ResourceName {
    /// Parse and validate a resource name. Fails on fewer than
    /// [`MIN_SEGMENTS`] segments or on empty segments.
    pub fn parse(raw: &str) -> Result<Self, BrokerError> {
        let invalid = |reason: &str| BrokerError::InvalidResource {
            name: raw.to_string(),
            reason: reason.to_string(),
        };

        let segments: Vec<&str> = raw.split('/').collect();
        if segments.len() < MIN_SEGMENTS {
            return Err(invalid(&format!(
                "expected at least {MIN_SEGMENTS} path segments, found {}",
                segments.len()
            )));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty path segment"));
        }

        let n = segments.len();
        Ok(Self {
            full: raw.to_string(),
            scope: segments[n - 3].to_string(),
            kind: segments[n - 2].to_string(),
            name: segments[n - 1].to_string(),
        })
    }

    /// Parse and additionally require a specific `<kind>` segment.
    pub fn parse_kind(raw: &str, kind: &str) -> Result<Self, BrokerError> {
        let resource = Self::parse(raw)?;
        if resource.kind != kind {
            return Err(BrokerError::InvalidResource {
                name: raw.to_string(),
                reason: format!("expected a '{kind}' resource, found '{}'", resource.kind),
            });
        }
        Ok(resource)
    }

    pub fn full(&self) -> &str {
        &self.full
    }

    /// Administrative scope (the project for Pub/Sub).
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}
