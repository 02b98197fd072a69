//! Dotted-path access into documents
//!
//! A path like `"items.0.name"` walks sub-documents by field name and arrays
//! by non-negative integer index. Reads never fail: a missing segment just
//! yields `None`. Writes create missing sub-documents and array slots on the
//! way down and fail with [`MemDocError::InvalidPath`] when a segment has to
//! pass through a scalar.
//!
//! Unsetting an array element leaves a hole (`Bson::Undefined`) rather than
//! shifting later elements; holes read back as absent.

use crate::error::{MemDocError, Result};
use bson::{Bson, Document};

fn segments(path: &str) -> Result<Vec<&str>> {
    if path.is_empty() {
        return Err(MemDocError::InvalidPath("path must not be empty".to_string()));
    }
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(MemDocError::InvalidPath(format!(
            "path '{}' contains an empty segment",
            path
        )));
    }
    Ok(parts)
}

fn array_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Value at `path`, or `None` when any segment is missing.
///
/// ```
/// use bson::{doc, Bson};
/// use memdoc_core::path::get_path;
///
/// let doc = doc! {"address": {"city": "NYC"}, "tags": ["a", "b"]};
/// assert_eq!(get_path(&doc, "address.city"), Some(&Bson::String("NYC".into())));
/// assert_eq!(get_path(&doc, "tags.1"), Some(&Bson::String("b".into())));
/// assert_eq!(get_path(&doc, "address.zip.code"), None);
/// ```
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    // Fast path: no dots means simple field access
    if !path.contains('.') {
        return doc.get(path).filter(|v| !matches!(v, Bson::Undefined));
    }

    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(sub) => sub.get(part)?,
            Bson::Array(items) => items.get(array_index(part)?)?,
            _ => return None,
        };
    }
    match current {
        Bson::Undefined => None,
        value => Some(value),
    }
}

/// Mutable counterpart of [`get_path`]; holes read as absent.
pub fn get_path_mut<'a>(doc: &'a mut Document, path: &str) -> Option<&'a mut Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get_mut(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(sub) => sub.get_mut(part)?,
            Bson::Array(items) => items.get_mut(array_index(part)?)?,
            _ => return None,
        };
    }
    match current {
        Bson::Undefined => None,
        value => Some(value),
    }
}

/// Write `value` at `path`, creating intermediate containers.
pub fn set_path(doc: &mut Document, path: &str, value: Bson) -> Result<()> {
    let parts = segments(path)?;
    set_in_document(doc, &parts, value, path)
}

fn set_in_document(doc: &mut Document, parts: &[&str], value: Bson, path: &str) -> Result<()> {
    let (head, rest) = match parts.split_first() {
        Some(split) => split,
        None => return Ok(()),
    };
    if rest.is_empty() {
        doc.insert(*head, value);
        return Ok(());
    }
    if !doc.contains_key(*head) {
        doc.insert(*head, Document::new());
    }
    match doc.get_mut(*head) {
        Some(child) => set_in_value(child, rest, value, path),
        None => Err(MemDocError::InvalidPath(format!(
            "cannot create field '{}' in '{}'",
            head, path
        ))),
    }
}

fn set_in_value(target: &mut Bson, parts: &[&str], value: Bson, path: &str) -> Result<()> {
    if matches!(target, Bson::Undefined) {
        *target = Bson::Document(Document::new());
    }
    match target {
        Bson::Document(sub) => set_in_document(sub, parts, value, path),
        Bson::Array(items) => {
            let (head, rest) = match parts.split_first() {
                Some(split) => split,
                None => return Ok(()),
            };
            let index = array_index(head).ok_or_else(|| {
                MemDocError::InvalidPath(format!(
                    "cannot index array with '{}' in path '{}'",
                    head, path
                ))
            })?;
            let created = index >= items.len();
            if created {
                items.resize(index + 1, Bson::Null);
            }
            if rest.is_empty() {
                items[index] = value;
                return Ok(());
            }
            let slot = &mut items[index];
            if created {
                *slot = Bson::Document(Document::new());
            }
            set_in_value(slot, rest, value, path)
        }
        other => Err(MemDocError::InvalidPath(format!(
            "cannot create field '{}' in path '{}': parent holds {:?}",
            parts.first().copied().unwrap_or_default(),
            path,
            other.element_type()
        ))),
    }
}

/// Remove the value at `path`, returning it.
///
/// Document fields are removed outright; array elements are replaced with
/// a hole so the indices of later elements stay put.
pub fn unset_path(doc: &mut Document, path: &str) -> Option<Bson> {
    let parts = segments(path).ok()?;
    let (last, parents) = parts.split_last()?;

    if parents.is_empty() {
        return doc.remove(*last).filter(|v| !matches!(v, Bson::Undefined));
    }

    let mut current = doc.get_mut(parents[0])?;
    for part in &parents[1..] {
        current = match current {
            Bson::Document(sub) => sub.get_mut(*part)?,
            Bson::Array(items) => items.get_mut(array_index(part)?)?,
            _ => return None,
        };
    }

    let removed = match current {
        Bson::Document(sub) => sub.remove(*last),
        Bson::Array(items) => {
            let slot = items.get_mut(array_index(last)?)?;
            Some(std::mem::replace(slot, Bson::Undefined))
        }
        _ => None,
    };
    removed.filter(|v| !matches!(v, Bson::Undefined))
}
