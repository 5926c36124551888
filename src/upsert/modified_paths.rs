use bson::{Bson, Document};
use std::collections::HashSet;

/// The dotted paths whose value an update (or a filter equality) already
/// determines.
#[derive(Debug, Default, Clone)]
pub struct ModifiedPaths {
    paths: HashSet<String>,
}

impl ModifiedPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks every key of `value` as modified under `prefix`, descending into
    /// sub-documents. Arrays and scalars are values, not further paths.
    ///
    /// Keys are taken verbatim: `{ "a.b": 1 }` marks `"a.b"` without marking `"a"`.
    pub fn collect(&mut self, value: &Document, prefix: &str) {
        for (key, child) in value.iter() {
            let path = format!("{}{}", prefix, key);
            if let Bson::Document(sub_doc) = child {
                self.collect(sub_doc, &format!("{}.", path));
            }
            self.paths.insert(path);
        }
    }

    /// Same as [`collect`](Self::collect) for an arbitrary value. Anything other
    /// than a document marks nothing.
    pub fn collect_bson(&mut self, value: &Bson, prefix: &str) {
        if let Bson::Document(doc) = value {
            self.collect(doc, prefix);
        }
    }

    pub fn mark(&mut self, path: impl Into<String>) {
        self.paths.insert(path.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Returns `true` if `path` or one of its dotted ancestors is modified.
    ///
    /// `"a.b.c"` is covered by `"a"` or `"a.b"`, but `"a"` is not covered by `"a.b"`.
    pub fn is_modified(&self, path: &str) -> bool {
        if self.paths.contains(path) {
            return true;
        }
        path.match_indices('.')
            .any(|(idx, _)| self.paths.contains(&path[..idx]))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
