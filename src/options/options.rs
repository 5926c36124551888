use crate::error::Result;
use bson::Document;
use serde::Deserialize;

/// Process-wide settings shared by every schema created from the same base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseOptions {
    /// Fallback used when an update does not say whether defaults should be
    /// applied on insert. `None` behaves as `true`.
    set_defaults_on_insert: Option<bool>,
}

impl BaseOptions {
    pub fn new(set_defaults_on_insert: Option<bool>) -> Self {
        BaseOptions { set_defaults_on_insert }
    }

    pub fn from_document(doc: &Document) -> Result<Self> {
        Ok(bson::from_document(doc.clone())?)
    }

    pub fn set_defaults_on_insert(&self) -> Option<bool> {
        self.set_defaults_on_insert
    }
}

/// Options of a single update operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateOptions {
    /// Create a document when nothing matches the filter.
    upsert: bool,

    /// Overrides [`BaseOptions::set_defaults_on_insert`] for this operation.
    set_defaults_on_insert: Option<bool>,

    /// The update replaces the whole document.
    overwrite: bool,
}

impl UpdateOptions {
    pub fn builder() -> UpdateOptionsBuilder {
        UpdateOptionsBuilder::default()
    }

    /// Decodes options such as `{ upsert: true, setDefaultsOnInsert: false }`.
    /// Keys this crate does not know about are ignored.
    pub fn from_document(doc: &Document) -> Result<Self> {
        Ok(bson::from_document(doc.clone())?)
    }

    pub fn upsert(&self) -> bool {
        self.upsert
    }

    pub fn set_defaults_on_insert(&self) -> Option<bool> {
        self.set_defaults_on_insert
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// Resolves the effective flag: the operation's own setting, then the base
    /// setting, then `true`.
    pub fn should_set_defaults_on_insert(&self, base: &BaseOptions) -> bool {
        self.set_defaults_on_insert
            .or(base.set_defaults_on_insert())
            .unwrap_or(true)
    }
}

#[derive(Default)]
pub struct UpdateOptionsBuilder {
    options: UpdateOptions,
}

impl UpdateOptionsBuilder {
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.options.upsert = upsert;
        self
    }

    pub fn set_defaults_on_insert(mut self, value: bool) -> Self {
        self.options.set_defaults_on_insert = Some(value);
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.options.overwrite = overwrite;
        self
    }

    pub fn build(self) -> UpdateOptions {
        self.options
    }
}
