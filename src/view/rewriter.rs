//! View rewriting
//!
//! A sub-pipeline naming a view is rewritten to run against the view's
//! backing namespace with the view stages in front. Two paths lead here:
//! - the host already knows the definition (resolved-namespace table)
//! - a shard rejects the request and returns the definition
//!
//! A pipeline is rewritten at most once; a second view signal for an
//! already rewritten pipeline is an error.

use super::namespaces::{ResolvedNamespaces, ResolvedView};
use crate::coordinator::{UnionError, UnionResult};
use crate::pipeline::SubPipeline;

/// Rewrites sub-pipelines over views
pub struct ViewRewriter;

impl ViewRewriter {
    /// Apply a resolution the host already knows about.
    ///
    /// Entries without stages only redirect the namespace and leave the
    /// pipeline unresolved: the target may still turn out to be a view.
    pub fn apply_known(pipeline: SubPipeline, table: &ResolvedNamespaces) -> SubPipeline {
        if pipeline.is_view_resolved() {
            return pipeline;
        }
        match table.get(pipeline.namespace()) {
            Some(view) if !view.stages.is_empty() => {
                SubPipeline::resolved(view.namespace, &view.stages, pipeline.stages())
            }
            Some(view) if &view.namespace != pipeline.namespace() => {
                SubPipeline::new(view.namespace, pipeline.stages().to_vec())
            }
            _ => pipeline,
        }
    }

    /// Rewrite after a shard revealed the view definition
    pub fn rewrite(pipeline: &SubPipeline, view: &ResolvedView) -> UnionResult<SubPipeline> {
        if pipeline.is_view_resolved() {
            return Err(UnionError::ViewResolutionLoop(pipeline.namespace().to_string()));
        }
        Ok(SubPipeline::resolved(
            view.namespace.clone(),
            &view.stages,
            pipeline.stages(),
        ))
    }

    /// Rewrite and remember the definition under the original namespace
    pub fn rewrite_and_record(
        pipeline: &SubPipeline,
        view: &ResolvedView,
        table: &ResolvedNamespaces,
    ) -> UnionResult<SubPipeline> {
        let rewritten = Self::rewrite(pipeline, view)?;
        table.insert(pipeline.namespace().clone(), view.clone());
        Ok(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Namespace, Predicate, Stage};
    use serde_json::json;

    fn view_ns() -> Namespace {
        Namespace::new("test", "view")
    }

    fn backing() -> Namespace {
        Namespace::new("test", "backing")
    }

    #[test]
    fn test_rewrite_prepends_and_marks() {
        let filter = Stage::Match(vec![Predicate::eq("a", json!(1))]);
        let pipeline = SubPipeline::new(view_ns(), vec![Stage::Limit(2)]);
        let view = ResolvedView::new(backing(), vec![filter.clone()]);

        let rewritten = ViewRewriter::rewrite(&pipeline, &view).unwrap();
        assert_eq!(rewritten.namespace(), &backing());
        assert_eq!(rewritten.stages(), &[filter, Stage::Limit(2)]);
        assert!(rewritten.is_view_resolved());
    }

    #[test]
    fn test_second_rewrite_fails() {
        let pipeline = SubPipeline::new(view_ns(), vec![]);
        let view = ResolvedView::new(backing(), vec![Stage::InhibitOptimization]);
        let once = ViewRewriter::rewrite(&pipeline, &view).unwrap();

        let err = ViewRewriter::rewrite(&once, &view).unwrap_err();
        assert_eq!(err.code(), "UNION_VIEW_RESOLUTION_LOOP");
    }

    #[test]
    fn test_apply_known_with_stages() {
        let table = ResolvedNamespaces::new();
        table.insert(view_ns(), ResolvedView::new(backing(), vec![Stage::InhibitOptimization]));

        let pipeline = ViewRewriter::apply_known(SubPipeline::new(view_ns(), vec![]), &table);
        assert!(pipeline.is_view_resolved());
        assert_eq!(pipeline.namespace(), &backing());
    }

    #[test]
    fn test_apply_known_without_stages_keeps_unresolved() {
        let table = ResolvedNamespaces::new();
        table.insert(view_ns(), ResolvedView::identity(view_ns()));

        let pipeline = ViewRewriter::apply_known(SubPipeline::new(view_ns(), vec![]), &table);
        assert!(!pipeline.is_view_resolved());
        assert_eq!(pipeline.namespace(), &view_ns());
    }

    #[test]
    fn test_rewrite_and_record() {
        let table = ResolvedNamespaces::new();
        let view = ResolvedView::new(backing(), vec![Stage::InhibitOptimization]);
        ViewRewriter::rewrite_and_record(&SubPipeline::new(view_ns(), vec![]), &view, &table)
            .unwrap();
        assert_eq!(table.get(&view_ns()), Some(view));
    }
}
