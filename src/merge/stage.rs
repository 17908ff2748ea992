//! The router half of a split pipeline
//!
//! Documents from every shard are pushed through a chain of merge
//! operators. Blocking operators (group, sort) hold their input until
//! `flush`; the rest stream. Results collect in an output queue the
//! coordinator drains one document per pull.

use std::collections::VecDeque;

use super::group::{GroupMode, GroupProcessor};
use super::sort::DocumentSorter;
use crate::pipeline::{
    lookup_path, Document, MergeStep, Predicate, PredicateFilter, SortSpec, SplitPipeline, Stage,
};

#[derive(Debug)]
enum MergeOp {
    Group(GroupProcessor),
    Sort { spec: SortSpec, buffer: Vec<Document> },
    Match(Vec<Predicate>),
    Project(Vec<String>),
    Skip(u64),
    Limit(u64),
    Passthrough,
}

enum Step {
    Emit(Document),
    Consumed,
}

impl MergeOp {
    fn from_step(step: &MergeStep) -> Self {
        match step {
            MergeStep::MergeGroup(spec) => MergeOp::Group(GroupProcessor::new(spec, GroupMode::Merging)),
            MergeStep::Apply(stage) => match stage {
                Stage::Group(spec) => MergeOp::Group(GroupProcessor::new(spec, GroupMode::Full)),
                Stage::Sort(spec) => MergeOp::Sort {
                    spec: spec.clone(),
                    buffer: Vec::new(),
                },
                Stage::Match(preds) => MergeOp::Match(preds.clone()),
                Stage::Project(fields) => MergeOp::Project(fields.clone()),
                Stage::Skip(n) => MergeOp::Skip(*n),
                Stage::Limit(n) => MergeOp::Limit(*n),
                Stage::InhibitOptimization => MergeOp::Passthrough,
            },
        }
    }

    fn is_blocking(&self) -> bool {
        matches!(self, MergeOp::Group(_) | MergeOp::Sort { .. })
    }

    fn apply(&mut self, doc: Document) -> Step {
        match self {
            MergeOp::Group(group) => {
                group.process(&doc);
                Step::Consumed
            }
            MergeOp::Sort { buffer, .. } => {
                buffer.push(doc);
                Step::Consumed
            }
            MergeOp::Match(preds) => {
                if PredicateFilter::matches(&doc, preds) {
                    Step::Emit(doc)
                } else {
                    Step::Consumed
                }
            }
            MergeOp::Project(fields) => Step::Emit(project(&doc, fields)),
            MergeOp::Skip(remaining) => {
                if *remaining > 0 {
                    *remaining -= 1;
                    Step::Consumed
                } else {
                    Step::Emit(doc)
                }
            }
            MergeOp::Limit(remaining) => {
                if *remaining > 0 {
                    *remaining -= 1;
                    Step::Emit(doc)
                } else {
                    Step::Consumed
                }
            }
            MergeOp::Passthrough => Step::Emit(doc),
        }
    }

    fn drain(&mut self) -> Vec<Document> {
        match self {
            MergeOp::Group(group) => group.finish(),
            MergeOp::Sort { spec, buffer } => {
                let mut docs = std::mem::take(buffer);
                DocumentSorter::sort(&mut docs, spec);
                docs
            }
            _ => Vec::new(),
        }
    }
}

fn project(doc: &Document, fields: &[String]) -> Document {
    let mut out = serde_json::Map::new();
    if let Some(id) = doc.get("_id") {
        out.insert("_id".into(), id.clone());
    }
    for field in fields {
        if let Some(value) = lookup_path(doc, field) {
            out.insert(field.clone(), value.clone());
        }
    }
    Document::Object(out)
}

/// Router-side merge of shard results
#[derive(Debug)]
pub struct MergeStage {
    ops: Vec<MergeOp>,
    output: VecDeque<Document>,
    flushed: bool,
}

impl MergeStage {
    pub fn new(split: &SplitPipeline) -> Self {
        Self {
            ops: split.merge_steps.iter().map(MergeOp::from_step).collect(),
            output: VecDeque::new(),
            flushed: false,
        }
    }

    /// Feed one shard document
    pub fn push(&mut self, doc: Document) {
        self.feed(0, doc);
    }

    /// Signal end of input; blocking operators release their results
    pub fn flush(&mut self) {
        if self.flushed {
            return;
        }
        self.flushed = true;
        for i in 0..self.ops.len() {
            let released = self.ops[i].drain();
            for doc in released {
                self.feed(i + 1, doc);
            }
        }
    }

    /// Next merged document, if one is ready
    pub fn pop_ready(&mut self) -> Option<Document> {
        self.output.pop_front()
    }

    pub fn has_ready(&self) -> bool {
        !self.output.is_empty()
    }

    /// True after flush once the output queue is drained
    pub fn is_finished(&self) -> bool {
        self.flushed && self.output.is_empty()
    }

    /// False once no further input can change the output, for example
    /// when a streaming limit upstream of every blocking operator is spent
    pub fn wants_input(&self) -> bool {
        for op in &self.ops {
            if op.is_blocking() {
                return true;
            }
            if let MergeOp::Limit(0) = op {
                return false;
            }
        }
        true
    }

    fn feed(&mut self, start: usize, doc: Document) {
        let mut current = doc;
        for op in self.ops.iter_mut().skip(start) {
            match op.apply(current) {
                Step::Emit(next) => current = next,
                Step::Consumed => return,
            }
        }
        self.output.push_back(current);
    }
}
