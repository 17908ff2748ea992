//! The sub-pipeline a union stage runs against another namespace

use serde::{Deserialize, Serialize};

use super::errors::PipelineResult;
use super::namespace::Namespace;
use super::stage::{Predicate, Stage};

/// An ordered stage sequence plus its target namespace.
///
/// Values are never mutated once dispatch starts; a view resolution
/// produces a new `SubPipeline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubPipeline {
    namespace: Namespace,
    #[serde(default)]
    stages: Vec<Stage>,
    /// Set once the namespace has been resolved from a view
    #[serde(default)]
    view_resolved: bool,
}

impl SubPipeline {
    pub fn new(namespace: Namespace, stages: Vec<Stage>) -> Self {
        Self {
            namespace,
            stages,
            view_resolved: false,
        }
    }

    /// Build the pipeline that replaces a view: `view_stages` then `stages`
    pub(crate) fn resolved(namespace: Namespace, view_stages: &[Stage], stages: &[Stage]) -> Self {
        let mut combined = Vec::with_capacity(view_stages.len() + stages.len());
        combined.extend_from_slice(view_stages);
        combined.extend_from_slice(stages);
        Self {
            namespace,
            stages: combined,
            view_resolved: true,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_view_resolved(&self) -> bool {
        self.view_resolved
    }

    /// Predicates of the first stage if it is a filter
    pub fn leading_filter(&self) -> Option<&[Predicate]> {
        match self.stages.first() {
            Some(Stage::Match(preds)) => Some(preds),
            _ => None,
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        self.stages.iter().try_for_each(Stage::validate)
    }
}
