use crate::error::{Error, Result};
use crate::options::BaseOptions;
use bson::oid::ObjectId;
use bson::Bson;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

pub mod parser;

/// Name of the identifier path every document carries.
pub const ID_PATH: &str = "_id";

/// Segment used for the values of a map-typed path (`"tags.$*"`).
pub const MAP_VALUE_SEGMENT: &str = "$*";

/// Produces a default value on demand; `None` means "no default".
pub type DefaultFn = Arc<dyn Fn() -> Option<Bson> + Send + Sync>;

/// Transforms a value before it is stored.
pub type Setter = Arc<dyn Fn(Bson) -> Bson + Send + Sync>;

#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed value, cloned each time it is requested.
    Value(Bson),
    /// A value computed at request time (e.g. a fresh `ObjectId` or a timestamp).
    Provider(DefaultFn),
}

impl DefaultValue {
    pub fn resolve(&self) -> Option<Bson> {
        match self {
            DefaultValue::Value(value) => Some(value.clone()),
            DefaultValue::Provider(provider) => provider(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(value) => write!(f, "Value({})", value),
            DefaultValue::Provider(_) => write!(f, "Provider(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PathKind {
    /// A leaf value.
    Scalar,
    /// A map container. Its values are declared at `<path>.$*`.
    Map,
    /// A subdocument described by its own schema.
    SingleNested(Arc<Schema>),
}

/// A declared path of a schema together with how its default is produced.
#[derive(Clone)]
pub struct SchemaPath {
    path: String,
    kind: PathKind,
    auto: bool,
    default: Option<DefaultValue>,
    setters: Vec<Setter>,
}

impl SchemaPath {
    pub fn new(path: impl Into<String>) -> Self {
        SchemaPath {
            path: path.into(),
            kind: PathKind::Scalar,
            auto: false,
            default: None,
            setters: Vec::new(),
        }
    }

    pub fn map(path: impl Into<String>) -> Self {
        SchemaPath { kind: PathKind::Map, ..SchemaPath::new(path) }
    }

    pub fn single_nested(path: impl Into<String>, schema: Schema) -> Self {
        SchemaPath { kind: PathKind::SingleNested(Arc::new(schema)), ..SchemaPath::new(path) }
    }

    /// The `_id` path added to every schema unless disabled.
    fn auto_id() -> Self {
        SchemaPath::new(ID_PATH)
            .auto(true)
            .with_default_fn(|| Some(Bson::ObjectId(ObjectId::new())))
    }

    pub fn auto(mut self, auto: bool) -> Self {
        self.auto = auto;
        self
    }

    pub fn with_default(mut self, value: impl Into<Bson>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn with_default_fn<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Option<Bson> + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Provider(Arc::new(provider)));
        self
    }

    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(Bson) -> Bson + Send + Sync + 'static,
    {
        self.setters.push(Arc::new(setter));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> &PathKind {
        &self.kind
    }

    pub fn is_auto(&self) -> bool {
        self.auto
    }

    /// `true` for the generated identifier, which is never defaulted by updates.
    pub fn is_auto_id(&self) -> bool {
        self.auto && self.path == ID_PATH
    }

    pub fn is_single_nested(&self) -> bool {
        matches!(self.kind, PathKind::SingleNested(_))
    }

    pub fn nested_schema(&self) -> Option<&Schema> {
        match &self.kind {
            PathKind::SingleNested(schema) => Some(schema),
            _ => None,
        }
    }

    /// `true` if the path describes the values of a map (`"a.$*"` or `"a.$*.b"`).
    pub fn is_underneath_map(&self) -> bool {
        self.path.ends_with(".$*") || self.path.contains(".$*.")
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Returns the default value with every setter applied, or `None` if the path
    /// has no default or its provider declined to produce one.
    pub fn get_default(&self) -> Option<Bson> {
        let value = self.default.as_ref()?.resolve()?;
        Some(self.setters.iter().fold(value, |value, setter| setter(value)))
    }
}

impl fmt::Debug for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaPath")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("auto", &self.auto)
            .field("default", &self.default)
            .field("setters", &self.setters.len())
            .finish()
    }
}

/// The declared paths of a document type, in declaration order.
#[derive(Debug, Clone)]
pub struct Schema {
    paths: Vec<SchemaPath>,
    base: Arc<BaseOptions>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Iterates over every declared path in declaration order.
    pub fn each_path(&self) -> impl Iterator<Item = &SchemaPath> {
        self.paths.iter()
    }

    pub fn path(&self, path: &str) -> Option<&SchemaPath> {
        self.paths.iter().find(|p| p.path == path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn base_options(&self) -> &BaseOptions {
        &self.base
    }
}

pub struct SchemaBuilder {
    paths: Vec<SchemaPath>,
    auto_id: bool,
    base: Arc<BaseOptions>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        SchemaBuilder {
            paths: Vec::new(),
            auto_id: true,
            base: Arc::new(BaseOptions::default()),
        }
    }
}

impl SchemaBuilder {
    pub fn path(mut self, path: SchemaPath) -> Self {
        self.paths.push(path);
        self
    }

    /// Whether an `_id` path with a generated `ObjectId` default is added when the
    /// schema does not declare `_id` itself. Enabled by default.
    pub fn auto_id(mut self, auto_id: bool) -> Self {
        self.auto_id = auto_id;
        self
    }

    pub fn base_options(mut self, base: Arc<BaseOptions>) -> Self {
        self.base = base;
        self
    }

    pub fn build(self) -> Result<Schema> {
        let mut paths = Vec::with_capacity(self.paths.len() + 1);

        if self.auto_id && !self.paths.iter().any(|p| p.path == ID_PATH) {
            paths.push(SchemaPath::auto_id());
        }

        let mut seen = HashSet::with_capacity(self.paths.len());
        for path in self.paths {
            validate_path(&path.path)?;
            if !seen.insert(path.path.clone()) {
                return Err(Error::InvalidSchema(format!("Duplicate path: {}", path.path)));
            }
            paths.push(path);
        }

        Ok(Schema { paths, base: self.base })
    }
}

fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidSchema("Path cannot be empty".to_string()));
    }
    if path.split('.').any(|segment| segment.is_empty()) {
        return Err(Error::InvalidSchema(format!("Path contains an empty segment: {}", path)));
    }
    Ok(())
}
