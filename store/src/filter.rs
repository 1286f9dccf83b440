//! Filter conditions evaluated against stored documents.

use dorm_core::{Document, Value};

/// A match condition over stored documents.
///
/// Paths are dot-joined storage names. A path segment applied to a list
/// fans out across its elements, and an equality against a list value
/// matches when any element is equal. This is what lets a reference held
/// inside a list be found by the plain identifier it stores.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    /// Value at the path equals the given value.
    Eq(String, Value),
    /// Value at the path equals one of the given values.
    In(String, Vec<Value>),
    /// All inner filters match.
    And(Vec<Filter>),
}

impl Filter {
    /// Equality on a path.
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(path.into(), value.into())
    }

    /// Membership on a path.
    pub fn is_in(path: impl Into<String>, values: Vec<Value>) -> Self {
        Filter::In(path.into(), values)
    }

    /// Evaluate this filter against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(path, value) => {
                resolve(doc, path).iter().any(|held| value_matches(held, value))
            }
            Filter::In(path, values) => resolve(doc, path)
                .iter()
                .any(|held| values.iter().any(|value| value_matches(held, value))),
            Filter::And(filters) => filters.iter().all(|filter| filter.matches(doc)),
        }
    }
}

/// Equality with list fan-out on the stored side.
fn value_matches(held: &Value, wanted: &Value) -> bool {
    if held == wanted {
        return true;
    }
    match held {
        Value::List(items) => items.iter().any(|item| item == wanted),
        _ => false,
    }
}

/// Collect every value a dotted path reaches, fanning out across lists.
fn resolve<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((first, rest)) = segments.split_first() {
        if let Some(value) = doc.get(*first) {
            collect(value, rest, &mut out);
        }
    }
    out
}

fn collect<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    match segments.split_first() {
        None => out.push(value),
        Some((first, rest)) => match value {
            Value::Map(entries) => {
                if let Some(inner) = entries.get(*first) {
                    collect(inner, rest, out);
                }
            }
            Value::List(items) => {
                for item in items {
                    collect(item, segments, out);
                }
            }
            _ => {}
        },
    }
}
