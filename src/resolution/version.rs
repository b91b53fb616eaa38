//! Version grammar shared by resolution, comparison and the rollback list.
//!
//! A conforming label is an optional leading `v` followed by one or more
//! dot-separated numeric components (`v1.4.2`, `2.0`, `3`). Anything else,
//! such as `release-candidate` or `1.0.0-beta`, does not conform.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed, comparable version.
///
/// Missing trailing components compare as zero, so `v1.2` == `1.2.0`.
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u64>,
}

impl Version {
    /// Parses a label, returning `None` when it does not conform.
    pub fn parse(label: &str) -> Option<Version> {
        let numeric = label.strip_prefix('v').unwrap_or(label);
        if numeric.is_empty() {
            return None;
        }

        let components = numeric
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    None
                } else {
                    part.parse::<u64>().ok()
                }
            })
            .collect::<Option<Vec<u64>>>()?;

        Some(Version { components })
    }

    /// Whether a label follows the version grammar.
    pub fn conforms(label: &str) -> bool {
        Self::parse(label).is_some()
    }
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s).ok_or_else(|| anyhow::anyhow!("Not a version: {}", s))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| {
                let a = self.components.get(i).copied().unwrap_or(0);
                let b = other.components.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

/// Whether two labels name the same version.
///
/// Conforming labels compare semantically (`v1.0` matches `1.0.0`); anything
/// else must match exactly.
pub fn labels_match(a: &str, b: &str) -> bool {
    match (Version::parse(a), Version::parse(b)) {
        (Some(va), Some(vb)) => va == vb,
        _ => a == b,
    }
}
