//! Resolved-namespace table
//!
//! Maps a namespace named by the host to the namespace that actually holds
//! its data plus the view stages to prepend. Clones share one table, so a
//! resolution learned by one execution is visible to later ones.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::pipeline::{Namespace, Stage};

/// A view definition: backing namespace plus the view's own stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedView {
    pub namespace: Namespace,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

impl ResolvedView {
    pub fn new(namespace: Namespace, stages: Vec<Stage>) -> Self {
        Self { namespace, stages }
    }

    /// An entry for a plain collection
    pub fn identity(namespace: Namespace) -> Self {
        Self::new(namespace, Vec::new())
    }
}

/// Shared `Namespace -> ResolvedView` table
#[derive(Debug, Clone, Default)]
pub struct ResolvedNamespaces {
    entries: Arc<RwLock<HashMap<Namespace, ResolvedView>>>,
}

impl ResolvedNamespaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &Namespace) -> Option<ResolvedView> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(namespace).cloned()
    }

    pub fn insert(&self, namespace: Namespace, view: ResolvedView) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(namespace, view);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(Namespace, ResolvedView)> for ResolvedNamespaces {
    fn from_iter<I: IntoIterator<Item = (Namespace, ResolvedView)>>(iter: I) -> Self {
        let table = Self::new();
        for (ns, view) in iter {
            table.insert(ns, view);
        }
        table
    }
}
