use bson::{Bson, Document};

/// Prefix that marks update operators (`$set`, `$inc`, …) and query operators
/// (`$gt`, `$in`, …).
pub const OPERATOR_PREFIX: char = '$';

pub fn is_operator_key(key: &str) -> bool {
    key.starts_with(OPERATOR_PREFIX)
}

/// Returns `true` if at least one top-level key of `doc` is an operator.
pub fn has_operator_key(doc: &Document) -> bool {
    doc.keys().any(|k| is_operator_key(k))
}

/// Reads the value at a dotted `path` (e.g. `"size.h"` or `"ratings.0.score"`).
///
/// Documents are walked by key and arrays by numeric index. At every level the
/// whole remaining dotted key is tried first, then each shorter key prefix, so
/// documents holding dotted keys such as `{ "size.h": 10 }` are read correctly
/// even next to a `"size"` sub-document.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let parts: Vec<&str> = path.split('.').collect();
    get_in_document(doc, &parts)
}

fn get_in_document<'a>(doc: &'a Document, parts: &[&str]) -> Option<&'a Bson> {
    lookup(parts, |key| doc.get(key))
}

fn get_in_value<'a>(value: &'a Bson, parts: &[&str]) -> Option<&'a Bson> {
    match value {
        Bson::Document(d) => get_in_document(d, parts),
        Bson::Array(a) => lookup(parts, |key| key.parse::<usize>().ok().and_then(|i| a.get(i))),
        _ => None,
    }
}

/// A non-null value under the whole remaining key wins. Otherwise every shorter
/// prefix is descended into, and a nullish whole-key value is the fallback.
fn lookup<'a, F>(parts: &[&str], child: F) -> Option<&'a Bson>
where
    F: Fn(&str) -> Option<&'a Bson>,
{
    let whole = child(&parts.join("."));
    if let Some(value) = whole {
        if !is_nullish(value) {
            return Some(value);
        }
    }

    for split in 1..parts.len() {
        if let Some(next) = child(&parts[..split].join(".")) {
            if let Some(found) = get_in_value(next, &parts[split..]) {
                return Some(found);
            }
        }
    }

    whole
}

/// Returns `true` for values that count as "nothing there" when reading a path.
pub fn is_nullish(value: &Bson) -> bool {
    matches!(value, Bson::Null | Bson::Undefined)
}
