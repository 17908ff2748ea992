//! Namespaces (`db.collection`)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{PipelineError, PipelineResult};

/// A fully qualified collection or view name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace {
    db: String,
    coll: String,
}

impl Namespace {
    /// Create a namespace from its parts
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            coll: coll.into(),
        }
    }

    /// Parse `db.collection`; the collection part may itself contain dots
    pub fn parse(full: &str) -> PipelineResult<Self> {
        match full.split_once('.') {
            Some((db, coll)) if !db.is_empty() && !coll.is_empty() => Ok(Self::new(db, coll)),
            _ => Err(PipelineError::invalid_namespace(full)),
        }
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    pub fn coll(&self) -> &str {
        &self.coll
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}

impl FromStr for Namespace {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Namespace {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let ns = Namespace::parse("test.orders.archive").unwrap();
        assert_eq!(ns.db(), "test");
        assert_eq!(ns.coll(), "orders.archive");
        assert_eq!(ns.to_string(), "test.orders.archive");
    }

    #[test]
    fn test_parse_rejects_missing_parts() {
        assert!(Namespace::parse("nodot").is_err());
        assert!(Namespace::parse(".coll").is_err());
        assert!(Namespace::parse("db.").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let ns = Namespace::new("test", "view");
        let json = serde_json::to_string(&ns).unwrap();
        assert_eq!(json, "\"test.view\"");
        let back: Namespace = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ns);
    }
}
