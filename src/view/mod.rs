//! View resolution for union sub-pipelines

mod namespaces;
mod rewriter;

pub use namespaces::{ResolvedNamespaces, ResolvedView};
pub use rewriter::ViewRewriter;
