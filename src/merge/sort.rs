//! Document ordering for the merger
//!
//! Used both to sort a buffered stream and to pick the next document among
//! the heads of several already sorted shard streams.

use std::cmp::Ordering;

use crate::pipeline::{compare_optional, lookup_path, Document, SortDirection, SortSpec};

/// Orders documents by a sort specification
pub struct DocumentSorter;

impl DocumentSorter {
    /// Compare two documents; missing fields sort as lowest
    pub fn compare(a: &Document, b: &Document, spec: &SortSpec) -> Ordering {
        let ordering = compare_optional(lookup_path(a, &spec.field), lookup_path(b, &spec.field));
        match spec.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// Stable in-place sort
    pub fn sort(documents: &mut [Document], spec: &SortSpec) {
        documents.sort_by(|a, b| Self::compare(a, b, spec));
    }

    /// Index of the head that sorts first. Ties go to the lowest index so
    /// equal keys keep shard order.
    pub fn pick_next(heads: &[Option<&Document>], spec: &SortSpec) -> Option<usize> {
        let mut best: Option<(usize, &Document)> = None;
        for (i, head) in heads.iter().enumerate() {
            let Some(doc) = *head else { continue };
            match best {
                Some((_, current)) if Self::compare(doc, current, spec) != Ordering::Less => {}
                _ => best = Some((i, doc)),
            }
        }
        best.map(|(i, _)| i)
    }
}
