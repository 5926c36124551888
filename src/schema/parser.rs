use crate::error::{Error, Result};
use crate::options::BaseOptions;
use crate::schema::{Schema, SchemaPath, ID_PATH, MAP_VALUE_SEGMENT};
use bson::{Bson, Document};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

static SCALAR_TYPES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        "string", "number", "boolean", "date", "objectId", "decimal",
        "buffer", "mixed", "array"])
});

const MAP_TYPE: &str = "map";

/// Parses a schema definition document into a [`Schema`].
///
/// ```text
/// {
///   "_id": false,                                   // no generated identifier
///   "name": "string",                               // scalar, no default
///   "status": { "type": "string", "default": "A" }, // scalar with default
///   "size": { "h": "number", "uom": { "type": "string", "default": "cm" } },
///   "owner": { "type": { "login": "string" } },     // single nested subdocument
///   "labels": { "type": "map", "of": "string" },    // map: "labels" and "labels.$*"
/// }
/// ```
///
/// Plain nested objects (`size` above) are flattened into dotted paths
/// (`size.h`, `size.uom`).
pub fn parse_schema(definition: &Document, base: Arc<BaseOptions>) -> Result<Schema> {
    let mut builder = Schema::builder().base_options(base.clone());

    if matches!(definition.get(ID_PATH), Some(Bson::Boolean(false))) {
        builder = builder.auto_id(false);
    }

    let mut paths = Vec::new();
    parse_fields(definition, "", &base, &mut paths)?;

    for path in paths {
        builder = builder.path(path);
    }
    builder.build()
}

fn parse_fields(
    definition: &Document,
    prefix: &str,
    base: &Arc<BaseOptions>,
    out: &mut Vec<SchemaPath>,
) -> Result<()> {
    for (key, value) in definition.iter() {
        if prefix.is_empty() && key == ID_PATH && matches!(value, Bson::Boolean(false)) {
            continue;
        }
        let path = format!("{}{}", prefix, key);
        parse_field(path, value, false, base, out)?;
    }
    Ok(())
}

/// Parses the declaration of a single field.
///
/// `object_as_subdocument` decides what a plain object without `type` means: a
/// nested object flattened into dotted paths, or (for map values) a subdocument.
fn parse_field(
    path: String,
    value: &Bson,
    object_as_subdocument: bool,
    base: &Arc<BaseOptions>,
    out: &mut Vec<SchemaPath>,
) -> Result<()> {
    match value {
        Bson::String(type_name) => {
            check_scalar_type(&path, type_name)?;
            out.push(SchemaPath::new(path));
        }
        Bson::Document(spec) => match spec.get("type") {
            Some(Bson::String(type_name)) if type_name == MAP_TYPE => {
                let values_path = format!("{}.{}", path, MAP_VALUE_SEGMENT);
                out.push(apply_path_options(SchemaPath::map(path), spec)?);
                match spec.get("of") {
                    Some(of) => parse_field(values_path, of, true, base, out)?,
                    None => out.push(SchemaPath::new(values_path)),
                }
            }
            Some(Bson::String(type_name)) => {
                check_scalar_type(&path, type_name)?;
                out.push(apply_path_options(SchemaPath::new(path), spec)?);
            }
            Some(Bson::Document(sub_definition)) => {
                let schema = parse_schema(sub_definition, base.clone())?;
                out.push(apply_path_options(SchemaPath::single_nested(path, schema), spec)?);
            }
            Some(other) => {
                return Err(Error::InvalidSchema(format!(
                    "Invalid type for path {}: {}",
                    path, other
                )));
            }
            None if spec.is_empty() => out.push(SchemaPath::new(path)),
            None if object_as_subdocument => {
                let schema = parse_schema(spec, base.clone())?;
                out.push(SchemaPath::single_nested(path, schema));
            }
            None => parse_fields(spec, &format!("{}.", path), base, out)?,
        },
        other => {
            return Err(Error::InvalidSchema(format!(
                "Invalid declaration for path {}: {}",
                path, other
            )));
        }
    }
    Ok(())
}

fn check_scalar_type(path: &str, type_name: &str) -> Result<()> {
    if SCALAR_TYPES.contains(type_name) {
        Ok(())
    } else {
        Err(Error::InvalidSchema(format!(
            "Unknown type for path {}: {}",
            path, type_name
        )))
    }
}

fn apply_path_options(mut path: SchemaPath, spec: &Document) -> Result<SchemaPath> {
    if let Some(default) = spec.get("default") {
        path = path.with_default(default.clone());
    }
    match spec.get("auto") {
        Some(Bson::Boolean(auto)) => path = path.auto(*auto),
        Some(other) => {
            return Err(Error::InvalidSchema(format!(
                "auto must be a boolean for path {}: {}",
                path.path(),
                other
            )));
        }
        None => {}
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PathKind;
    use bson::doc;

    fn parse(definition: Document) -> Schema {
        parse_schema(&definition, Arc::new(BaseOptions::default())).unwrap()
    }

    fn paths(schema: &Schema) -> Vec<&str> {
        schema.each_path().map(|p| p.path()).collect()
    }

    #[test]
    fn test_parse_scalars_and_defaults() {
        let schema = parse(doc! {
            "name": "string",
            "status": { "type": "string", "default": "A" },
            "qty": { "type": "number", "default": 0 },
        });

        assert_eq!(paths(&schema), vec!["_id", "name", "status", "qty"]);
        assert!(schema.path("_id").unwrap().is_auto_id());
        assert_eq!(schema.path("name").unwrap().get_default(), None);
        assert_eq!(
            schema.path("status").unwrap().get_default(),
            Some(Bson::String("A".to_string()))
        );
        assert_eq!(schema.path("qty").unwrap().get_default(), Some(Bson::Int32(0)));
    }

    #[test]
    fn test_parse_disabled_id() {
        let schema = parse(doc! { "_id": false, "name": "string" });
        assert_eq!(paths(&schema), vec!["name"]);
    }

    #[test]
    fn test_parse_declared_id() {
        let schema = parse(doc! { "_id": { "type": "number", "auto": false } });
        assert_eq!(paths(&schema), vec!["_id"]);
        assert!(!schema.path("_id").unwrap().is_auto_id());
    }

    #[test]
    fn test_parse_nested_objects_are_flattened() {
        let schema = parse(doc! {
            "_id": false,
            "size": { "h": "number", "uom": { "type": "string", "default": "cm" } },
            "meta": {},
        });

        assert_eq!(paths(&schema), vec!["size.h", "size.uom", "meta"]);
        assert_eq!(
            schema.path("size.uom").unwrap().get_default(),
            Some(Bson::String("cm".to_string()))
        );
    }

    #[test]
    fn test_parse_single_nested() {
        let schema = parse(doc! {
            "_id": false,
            "owner": {
                "type": { "login": { "type": "string", "default": "guest" } },
                "default": null,
            },
        });

        let owner = schema.path("owner").unwrap();
        assert!(owner.is_single_nested());
        assert_eq!(owner.get_default(), Some(Bson::Null));

        let nested = owner.nested_schema().unwrap();
        assert_eq!(paths(nested), vec!["_id", "login"]);
        assert_eq!(
            nested.path("login").unwrap().get_default(),
            Some(Bson::String("guest".to_string()))
        );
    }

    #[test]
    fn test_parse_maps() {
        let schema = parse(doc! {
            "_id": false,
            "labels": { "type": "map", "of": "string", "default": {} },
            "ratings": {
                "type": "map",
                "of": { "user": "string", "score": { "type": "number", "default": 5 } },
            },
            "extra": { "type": "map" },
        });

        assert_eq!(
            paths(&schema),
            vec!["labels", "labels.$*", "ratings", "ratings.$*", "extra", "extra.$*"]
        );
        assert!(matches!(schema.path("labels").unwrap().kind(), PathKind::Map));
        assert_eq!(schema.path("labels").unwrap().get_default(), Some(Bson::Document(doc! {})));

        let rating = schema.path("ratings.$*").unwrap();
        assert!(rating.is_single_nested());
        assert!(rating.is_underneath_map());
        assert!(rating.nested_schema().unwrap().path("score").is_some());
    }

    #[test]
    fn test_parse_errors() {
        let base = Arc::new(BaseOptions::default());

        match parse_schema(&doc! { "name": "text" }, base.clone()) {
            Err(Error::InvalidSchema(reason)) => {
                assert_eq!(reason, "Unknown type for path name: text")
            }
            other => panic!("Expected InvalidSchema error, got: {:?}", other),
        }

        match parse_schema(&doc! { "id": "uuid" }, base.clone()) {
            Err(Error::InvalidSchema(reason)) => {
                assert_eq!(reason, "Unknown type for path id: uuid")
            }
            other => panic!("Expected InvalidSchema error, got: {:?}", other),
        }

        let definition = doc! { "size": { "h": { "type": "number", "auto": 1 } } };
        match parse_schema(&definition, base.clone()) {
            Err(Error::InvalidSchema(reason)) => assert!(reason.contains("size.h")),
            other => panic!("Expected InvalidSchema error, got: {:?}", other),
        }

        assert!(parse_schema(&doc! { "qty": 5 }, base.clone()).is_err());
        assert!(parse_schema(&doc! { "qty": { "type": 5 } }, base).is_err());
    }

    #[test]
    fn test_parse_keeps_base_options() {
        let base = Arc::new(BaseOptions::new(Some(false)));
        let schema = parse_schema(&doc! { "name": "string" }, base).unwrap();
        assert_eq!(schema.base_options().set_defaults_on_insert(), Some(false));
    }
}
