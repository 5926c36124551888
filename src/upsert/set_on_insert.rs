use crate::obs::logger::{LoggerAndTracer, NoOpLogger};
use crate::options::UpdateOptions;
use crate::schema::{Schema, SchemaPath};
use crate::upsert::modified_paths::ModifiedPaths;
use crate::util::bson_utils::{get_path, has_operator_key, is_nullish, is_operator_key};
use crate::{debug, event, warn};
use bson::{Bson, Document};
use std::sync::Arc;

/// The update operator whose fields only apply when the upsert inserts.
pub const SET_ON_INSERT: &str = "$setOnInsert";

/// Adds schema defaults to the `$setOnInsert` clause of upserts.
pub struct InsertDefaults {
    logger: Arc<dyn LoggerAndTracer>,
}

impl InsertDefaults {
    pub fn new(logger: Arc<dyn LoggerAndTracer>) -> Self {
        InsertDefaults { logger }
    }

    /// Adds to `update["$setOnInsert"]` the default of every schema path that
    /// neither the update nor an equality condition of `filter` determines.
    ///
    /// Nothing is done unless `options` is an upsert with defaults on insert
    /// enabled, nor for whole-document replacements in overwrite mode.
    pub fn apply(
        &self,
        filter: &Document,
        schema: &Schema,
        update: &mut Document,
        options: &UpdateOptions,
    ) {
        if !options.upsert() {
            debug!(self.logger, "Skipping insert defaults: not an upsert");
            return;
        }
        if !options.should_set_defaults_on_insert(schema.base_options()) {
            debug!(self.logger, "Skipping insert defaults: setDefaultsOnInsert is disabled");
            return;
        }

        let (mut modified, has_dollar_update) = collect_update_paths(update);
        collect_filter_paths(filter, &mut modified);

        if options.overwrite() && !has_dollar_update {
            debug!(self.logger, "Skipping insert defaults: overwrite replaces the whole document");
            return;
        }

        let mut inserts: Option<Document> = None;

        for schema_path in schema.each_path() {
            if schema_path.is_auto_id() {
                continue;
            }

            match schema_path.nested_schema() {
                Some(nested) if !schema_path.is_underneath_map() => {
                    self.add_nested_defaults(schema_path, nested, &modified, &mut inserts);
                }
                _ => {
                    let path = schema_path.path();
                    if modified.is_modified(path) {
                        continue;
                    }
                    let Some(value) = schema_path.get_default() else {
                        continue;
                    };
                    if get_path(update, path).is_some_and(|v| !is_nullish(v)) {
                        continue;
                    }
                    event!(self.logger, "event: default injected, path={}", path);
                    inserts.get_or_insert_with(Document::new).insert(path, value);
                }
            }
        }

        let injected = inserts.as_ref().map_or(0, |doc| doc.len());
        event!(
            self.logger,
            "event: insert defaults, injected={}, modified={}",
            injected,
            modified.len()
        );

        if let Some(inserts) = inserts {
            self.merge_set_on_insert(update, inserts);
        }
    }

    /// Defaults of a single nested subdocument's own paths. Only one level is
    /// visited: a subdocument inside the subdocument contributes its own default
    /// but its children are not expanded.
    fn add_nested_defaults(
        &self,
        schema_path: &SchemaPath,
        nested: &Schema,
        modified: &ModifiedPaths,
        inserts: &mut Option<Document>,
    ) {
        for child in nested.each_path() {
            if child.is_auto_id() {
                continue;
            }
            let path = format!("{}.{}", schema_path.path(), child.path());
            if modified.is_modified(&path) {
                continue;
            }
            if let Some(value) = child.get_default() {
                event!(self.logger, "event: default injected, path={}", path);
                inserts.get_or_insert_with(Document::new).insert(path, value);
            }
        }
    }

    fn merge_set_on_insert(&self, update: &mut Document, inserts: Document) {
        match update.get_mut(SET_ON_INSERT) {
            Some(Bson::Document(existing)) => {
                for (path, value) in inserts {
                    existing.insert(path, value);
                }
            }
            Some(other) => {
                warn!(
                    self.logger,
                    "Replacing {} holding a non-document value: {}",
                    SET_ON_INSERT,
                    other
                );
                update.insert(SET_ON_INSERT, inserts);
            }
            None => {
                update.insert(SET_ON_INSERT, inserts);
            }
        }
    }
}

impl Default for InsertDefaults {
    fn default() -> Self {
        InsertDefaults::new(Arc::new(NoOpLogger))
    }
}

/// Adds schema defaults to the `$setOnInsert` clause of an upsert without logging.
/// See [`InsertDefaults::apply`].
pub fn apply_insert_defaults(
    filter: &Document,
    schema: &Schema,
    update: &mut Document,
    options: &UpdateOptions,
) {
    InsertDefaults::default().apply(filter, schema, update, options)
}

/// Collects the paths set by `update` and reports whether it uses operators.
/// Operator documents contribute the fields under each operator; replacement
/// documents contribute all of their fields.
fn collect_update_paths(update: &Document) -> (ModifiedPaths, bool) {
    let mut modified = ModifiedPaths::new();
    let mut has_dollar_update = false;

    for (key, value) in update.iter() {
        if is_operator_key(key) {
            modified.collect_bson(value, "");
            has_dollar_update = true;
        }
    }

    if !has_dollar_update {
        modified.collect(update, "");
    }

    (modified, has_dollar_update)
}

/// Marks the filter paths matched by equality. A condition written with
/// operators (`{ "$gt": 5 }`) does not fix the value of an inserted document
/// and is ignored, even when it is equivalent to an equality such as a
/// single-valued `$in`.
fn collect_filter_paths(filter: &Document, modified: &mut ModifiedPaths) {
    for (path, condition) in filter.iter() {
        if let Bson::Document(condition) = condition {
            if has_operator_key(condition) {
                continue;
            }
        }
        modified.mark(path.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obs::logger::test_instance;
    use bson::doc;

    fn upsert() -> UpdateOptions {
        UpdateOptions::builder().upsert(true).build()
    }

    fn schema_with(paths: Vec<SchemaPath>) -> Schema {
        paths
            .into_iter()
            .fold(Schema::builder(), |builder, path| builder.path(path))
            .build()
            .unwrap()
    }

    #[test]
    fn test_collect_update_paths_operator_document() {
        let (modified, has_dollar) = collect_update_paths(&doc! {
            "$set": { "a.b": 1, "c": { "d": 2 } },
            "$inc": { "n": 1 },
        });

        assert!(has_dollar);
        assert!(modified.contains("a.b"));
        assert!(modified.contains("c"));
        assert!(modified.contains("c.d"));
        assert!(modified.contains("n"));
        assert!(!modified.contains("$set"));
    }

    #[test]
    fn test_collect_update_paths_replacement_document() {
        let (modified, has_dollar) = collect_update_paths(&doc! { "a": { "b": 1 }, "c": 2 });

        assert!(!has_dollar);
        assert_eq!(modified.len(), 3);
        assert!(modified.is_modified("a.b"));
        assert!(modified.is_modified("c"));
    }

    #[test]
    fn test_collect_filter_paths() {
        let mut modified = ModifiedPaths::new();
        collect_filter_paths(
            &doc! {
                "status": "A",
                "qty": { "$gt": 5 },
                "size": { "h": 14 },
                "tags": ["red"],
                "gone": null,
                "kind": { "$in": ["x"] },
            },
            &mut modified,
        );

        assert!(modified.contains("status"));
        assert!(modified.contains("size"));
        assert!(modified.contains("tags"));
        assert!(modified.contains("gone"));
        assert!(!modified.contains("qty"));
        assert!(!modified.contains("kind"));
    }

    #[test]
    fn test_apply_with_logger() {
        let schema = schema_with(vec![
            SchemaPath::new("status").with_default("A"),
            SchemaPath::new("qty").with_default(0),
        ]);
        let mut update = doc! { "$set": { "qty": 5 } };

        InsertDefaults::new(test_instance()).apply(&doc! {}, &schema, &mut update, &upsert());

        assert_eq!(update, doc! { "$set": { "qty": 5 }, "$setOnInsert": { "status": "A" } });
    }

    #[test]
    fn test_existing_set_on_insert_is_extended() {
        let schema = schema_with(vec![
            SchemaPath::new("status").with_default("A"),
            SchemaPath::new("qty").with_default(0),
        ]);
        let mut update = doc! { "$set": { "x": 1 }, "$setOnInsert": { "qty": 10 } };

        apply_insert_defaults(&doc! {}, &schema, &mut update, &upsert());

        assert_eq!(
            update,
            doc! { "$set": { "x": 1 }, "$setOnInsert": { "qty": 10, "status": "A" } }
        );
    }

    #[test]
    fn test_no_clause_without_defaults() {
        let schema = schema_with(vec![SchemaPath::new("status")]);
        let mut update = doc! { "$set": { "x": 1 } };

        apply_insert_defaults(&doc! {}, &schema, &mut update, &upsert());

        assert_eq!(update, doc! { "$set": { "x": 1 } });
        assert!(!update.contains_key(SET_ON_INSERT));
    }

    #[test]
    fn test_malformed_set_on_insert_is_replaced() {
        let schema = schema_with(vec![SchemaPath::new("status").with_default("A")]);
        let mut update = doc! { "$set": { "x": 1 }, "$setOnInsert": 5 };

        InsertDefaults::new(test_instance()).apply(&doc! {}, &schema, &mut update, &upsert());

        assert_eq!(update, doc! { "$set": { "x": 1 }, "$setOnInsert": { "status": "A" } });
    }

    #[test]
    fn test_schema_order_is_preserved() {
        let schema = schema_with(vec![
            SchemaPath::new("z").with_default(1),
            SchemaPath::new("a").with_default(2),
            SchemaPath::new("m").with_default(3),
        ]);
        let mut update = doc! { "$set": { "x": 1 } };

        apply_insert_defaults(&doc! {}, &schema, &mut update, &upsert());

        let keys: Vec<&String> = update.get_document(SET_ON_INSERT).unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}
