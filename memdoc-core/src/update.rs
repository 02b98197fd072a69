//! Update operators
//!
//! An update document is parsed into an [`UpdateSpec`]: one typed
//! [`UpdateOperator`] per recognized operator key, ordered as
//!
//! `$setOnInsert`, `$set`, `$addToSet`, `$push`, `$inc`, `$min`, `$max`,
//! `$mul`, `$rename`, `$unset`, `$pull`, `$pop`
//!
//! whatever order the keys had in the update document. Paths under one
//! operator apply left to right. Updates are all-or-nothing per document:
//! they run against a working copy that replaces the original only when
//! every operator succeeded.

use crate::error::{MemDocError, Result};
use crate::log_debug;
use crate::path::{get_path, get_path_mut, set_path, unset_path};
use crate::query::operators::{equality_matches, is_operator_document, matches_filter, matches_operators};
use crate::value_utils::{as_integer, compare_values, values_equal, NumericValue};
use bson::{Bson, Document};
use std::cmp::Ordering;

/// Arguments of `$push`, after `$each`/`$position`/`$slice` unpacking
#[derive(Debug, Clone, PartialEq)]
pub struct PushArgs {
    pub values: Vec<Bson>,
    pub position: Option<i64>,
    pub slice: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopEnd {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOperator {
    SetOnInsert(Vec<(String, Bson)>),
    Set(Vec<(String, Bson)>),
    AddToSet(Vec<(String, Vec<Bson>)>),
    Push(Vec<(String, PushArgs)>),
    Inc(Vec<(String, NumericValue)>),
    Min(Vec<(String, Bson)>),
    Max(Vec<(String, Bson)>),
    Mul(Vec<(String, NumericValue)>),
    Rename(Vec<(String, String)>),
    Unset(Vec<String>),
    Pull(Vec<(String, Bson)>),
    Pop(Vec<(String, PopEnd)>),
}

impl UpdateOperator {
    /// Application order within one update
    fn rank(&self) -> u8 {
        match self {
            UpdateOperator::SetOnInsert(_) => 0,
            UpdateOperator::Set(_) => 1,
            UpdateOperator::AddToSet(_) => 2,
            UpdateOperator::Push(_) => 3,
            UpdateOperator::Inc(_) => 4,
            UpdateOperator::Min(_) => 5,
            UpdateOperator::Max(_) => 6,
            UpdateOperator::Mul(_) => 7,
            UpdateOperator::Rename(_) => 8,
            UpdateOperator::Unset(_) => 9,
            UpdateOperator::Pull(_) => 10,
            UpdateOperator::Pop(_) => 11,
        }
    }

    fn parse(name: &str, args: &Document) -> Result<Option<UpdateOperator>> {
        let op = match name {
            "$setOnInsert" => UpdateOperator::SetOnInsert(pairs(args)),
            "$set" => UpdateOperator::Set(pairs(args)),
            "$min" => UpdateOperator::Min(pairs(args)),
            "$max" => UpdateOperator::Max(pairs(args)),
            "$pull" => UpdateOperator::Pull(pairs(args)),
            "$unset" => UpdateOperator::Unset(args.keys().cloned().collect()),
            "$inc" => UpdateOperator::Inc(numeric_pairs(name, args)?),
            "$mul" => UpdateOperator::Mul(numeric_pairs(name, args)?),
            "$addToSet" => UpdateOperator::AddToSet(
                args.iter()
                    .map(|(path, value)| Ok((path.clone(), each_values(name, value)?)))
                    .collect::<Result<_>>()?,
            ),
            "$push" => UpdateOperator::Push(
                args.iter()
                    .map(|(path, value)| Ok((path.clone(), push_args(value)?)))
                    .collect::<Result<_>>()?,
            ),
            "$rename" => UpdateOperator::Rename(
                args.iter()
                    .map(|(path, target)| match target {
                        Bson::String(target) => Ok((path.clone(), target.clone())),
                        other => Err(MemDocError::InvalidUpdate(format!(
                            "$rename target for '{}' must be a string, got {}",
                            path, other
                        ))),
                    })
                    .collect::<Result<_>>()?,
            ),
            "$pop" => UpdateOperator::Pop(
                args.iter()
                    .map(|(path, end)| match as_integer(end) {
                        Some(1) => Ok((path.clone(), PopEnd::Last)),
                        Some(-1) => Ok((path.clone(), PopEnd::First)),
                        _ => Err(MemDocError::InvalidUpdate(format!(
                            "$pop for '{}' expects 1 or -1",
                            path
                        ))),
                    })
                    .collect::<Result<_>>()?,
            ),
            _ => return Ok(None),
        };
        Ok(Some(op))
    }
}

fn pairs(args: &Document) -> Vec<(String, Bson)> {
    args.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn numeric_pairs(op: &str, args: &Document) -> Result<Vec<(String, NumericValue)>> {
    args.iter()
        .map(|(path, value)| {
            NumericValue::from_bson(value)
                .map(|n| (path.clone(), n))
                .ok_or_else(|| {
                    MemDocError::InvalidUpdate(format!(
                        "{} for '{}' requires a number, got {}",
                        op, path, value
                    ))
                })
        })
        .collect()
}

/// A single value, or the elements of `{$each: [...]}`
fn each_values(op: &str, value: &Bson) -> Result<Vec<Bson>> {
    match value {
        Bson::Document(modifiers) if modifiers.contains_key("$each") => match modifiers.get("$each") {
            Some(Bson::Array(items)) => Ok(items.clone()),
            _ => Err(MemDocError::InvalidUpdate(format!("{} $each requires an array", op))),
        },
        other => Ok(vec![other.clone()]),
    }
}

fn push_args(value: &Bson) -> Result<PushArgs> {
    let values = each_values("$push", value)?;
    let modifier = |name: &str| -> Result<Option<i64>> {
        match value {
            Bson::Document(modifiers) if modifiers.contains_key("$each") => match modifiers.get(name) {
                None => Ok(None),
                Some(n) => as_integer(n).map(Some).ok_or_else(|| {
                    MemDocError::InvalidUpdate(format!("$push {} requires an integer", name))
                }),
            },
            _ => Ok(None),
        }
    };
    Ok(PushArgs {
        values,
        position: modifier("$position")?,
        slice: modifier("$slice")?,
    })
}

/// A parsed update document
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSpec {
    operators: Vec<UpdateOperator>,
}

impl UpdateSpec {
    /// Parse an update document. With `validate`, a document without any
    /// recognized operator is rejected; unrecognized keys are otherwise
    /// ignored.
    pub fn parse(spec: &Document, validate: bool) -> Result<Self> {
        let mut operators = Vec::new();
        for (key, args) in spec {
            let parsed = match args {
                Bson::Document(args) => UpdateOperator::parse(key, args)?,
                _ if key.starts_with('$') && is_known_operator(key) => {
                    return Err(MemDocError::InvalidUpdate(format!(
                        "{} requires an object argument",
                        key
                    )))
                }
                _ => None,
            };
            match parsed {
                Some(op) => operators.push(op),
                None => log_debug!("ignoring unrecognized update key '{}'", key),
            }
        }
        if validate && operators.is_empty() {
            return Err(MemDocError::InvalidUpdate(
                "update document contains no recognized operator".to_string(),
            ));
        }
        operators.sort_by_key(UpdateOperator::rank);
        Ok(UpdateSpec { operators })
    }

    pub fn operators(&self) -> &[UpdateOperator] {
        &self.operators
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Apply to `doc`. `inserting` enables `$setOnInsert`. Returns whether
    /// the document changed; on error `doc` is left untouched.
    pub fn apply(&self, doc: &mut Document, inserting: bool) -> Result<bool> {
        let mut working = doc.clone();
        for op in &self.operators {
            apply_operator(&mut working, op, inserting)?;
        }
        if working == *doc {
            return Ok(false);
        }
        *doc = working;
        Ok(true)
    }
}

fn is_known_operator(name: &str) -> bool {
    matches!(
        name,
        "$setOnInsert"
            | "$set"
            | "$addToSet"
            | "$push"
            | "$inc"
            | "$min"
            | "$max"
            | "$mul"
            | "$rename"
            | "$unset"
            | "$pull"
            | "$pop"
    )
}

/// Parse and apply `spec` in one step.
pub fn apply_update(doc: &mut Document, spec: &Document, validate: bool) -> Result<bool> {
    UpdateSpec::parse(spec, validate)?.apply(doc, false)
}

fn apply_operator(doc: &mut Document, op: &UpdateOperator, inserting: bool) -> Result<()> {
    match op {
        UpdateOperator::SetOnInsert(fields) => {
            if inserting {
                for (path, value) in fields {
                    set_path(doc, path, value.clone())?;
                }
            }
        }
        UpdateOperator::Set(fields) => {
            for (path, value) in fields {
                set_path(doc, path, value.clone())?;
            }
        }
        UpdateOperator::AddToSet(fields) => {
            for (path, values) in fields {
                add_to_set(doc, path, values)?;
            }
        }
        UpdateOperator::Push(fields) => {
            for (path, args) in fields {
                push(doc, path, args)?;
            }
        }
        UpdateOperator::Inc(fields) => {
            for (path, delta) in fields {
                let next = match get_path(doc, path) {
                    None => *delta,
                    Some(current) => existing_number("$inc", path, current)?.add(*delta),
                };
                set_path(doc, path, next.to_bson())?;
            }
        }
        UpdateOperator::Min(fields) => {
            for (path, value) in fields {
                replace_if(doc, path, value, Ordering::Less)?;
            }
        }
        UpdateOperator::Max(fields) => {
            for (path, value) in fields {
                replace_if(doc, path, value, Ordering::Greater)?;
            }
        }
        UpdateOperator::Mul(fields) => {
            for (path, factor) in fields {
                let next = match get_path(doc, path) {
                    None => factor.zero_like(),
                    Some(current) => existing_number("$mul", path, current)?.mul(*factor),
                };
                set_path(doc, path, next.to_bson())?;
            }
        }
        UpdateOperator::Rename(fields) => {
            for (source, target) in fields {
                rename(doc, source, target)?;
            }
        }
        UpdateOperator::Unset(paths) => {
            for path in paths {
                unset_path(doc, path);
            }
        }
        UpdateOperator::Pull(fields) => {
            for (path, condition) in fields {
                pull(doc, path, condition)?;
            }
        }
        UpdateOperator::Pop(fields) => {
            for (path, end) in fields {
                if let Some(items) = existing_array(doc, "$pop", path)? {
                    match end {
                        PopEnd::Last => {
                            items.pop();
                        }
                        PopEnd::First if !items.is_empty() => {
                            items.remove(0);
                        }
                        PopEnd::First => {}
                    }
                }
            }
        }
    }
    Ok(())
}

fn existing_number(op: &str, path: &str, current: &Bson) -> Result<NumericValue> {
    NumericValue::from_bson(current).ok_or_else(|| {
        MemDocError::TypeMismatch(format!(
            "cannot apply {} to non-numeric field '{}' ({:?})",
            op,
            path,
            current.element_type()
        ))
    })
}

/// Array at `path`; `None` when absent, `TypeMismatch` for other values.
fn existing_array<'a>(doc: &'a mut Document, op: &str, path: &str) -> Result<Option<&'a mut Vec<Bson>>> {
    match get_path_mut(doc, path) {
        None => Ok(None),
        Some(Bson::Array(items)) => Ok(Some(items)),
        Some(other) => Err(MemDocError::TypeMismatch(format!(
            "{} requires an array at '{}', found {:?}",
            op,
            path,
            other.element_type()
        ))),
    }
}

fn add_to_set(doc: &mut Document, path: &str, values: &[Bson]) -> Result<()> {
    match existing_array(doc, "$addToSet", path)? {
        Some(items) => {
            for value in values {
                if !items.iter().any(|item| values_equal(item, value)) {
                    items.push(value.clone());
                }
            }
            Ok(())
        }
        None => {
            let mut fresh: Vec<Bson> = Vec::with_capacity(values.len());
            for value in values {
                if !fresh.iter().any(|item| values_equal(item, value)) {
                    fresh.push(value.clone());
                }
            }
            set_path(doc, path, Bson::Array(fresh))
        }
    }
}

fn push(doc: &mut Document, path: &str, args: &PushArgs) -> Result<()> {
    if get_path(doc, path).is_none() {
        set_path(doc, path, Bson::Array(Vec::new()))?;
    }
    let items = match existing_array(doc, "$push", path)? {
        Some(items) => items,
        None => return Ok(()),
    };

    let len = items.len() as i64;
    let at = match args.position {
        None => len,
        Some(p) if p < 0 => (len + p).max(0),
        Some(p) => p.min(len),
    };
    let at = at as usize;
    for (offset, value) in args.values.iter().enumerate() {
        items.insert(at + offset, value.clone());
    }

    if let Some(slice) = args.slice {
        let len = items.len();
        if slice >= 0 {
            items.truncate((slice as usize).min(len));
        } else {
            let keep = (slice.unsigned_abs() as usize).min(len);
            items.drain(..len - keep);
        }
    }
    Ok(())
}

/// `$min`/`$max`: write when absent or when `value` orders `wanted` against
/// the current value.
fn replace_if(doc: &mut Document, path: &str, value: &Bson, wanted: Ordering) -> Result<()> {
    let replace = match get_path(doc, path) {
        None => true,
        Some(current) => compare_values(value, current) == wanted,
    };
    if replace {
        set_path(doc, path, value.clone())?;
    }
    Ok(())
}

fn rename(doc: &mut Document, source: &str, target: &str) -> Result<()> {
    if source == target {
        log_debug!("$rename of '{}' onto itself ignored", source);
        return Ok(());
    }
    if target.starts_with(&format!("{}.", source)) || source.starts_with(&format!("{}.", target)) {
        return Err(MemDocError::InvalidUpdate(format!(
            "$rename source '{}' and target '{}' overlap",
            source, target
        )));
    }
    match unset_path(doc, source) {
        Some(value) => set_path(doc, target, value),
        None => Ok(()),
    }
}

fn pull(doc: &mut Document, path: &str, condition: &Bson) -> Result<()> {
    let items = match existing_array(doc, "$pull", path)? {
        Some(items) => items,
        None => return Ok(()),
    };
    let mut kept = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        if !pull_matches(&item, condition)? {
            kept.push(item);
        }
    }
    *items = kept;
    Ok(())
}

fn pull_matches(item: &Bson, condition: &Bson) -> Result<bool> {
    match (condition, item) {
        (Bson::Document(cond), _) if is_operator_document(cond) => {
            matches_operators(Some(item), cond, None)
        }
        (Bson::Document(cond), Bson::Document(sub)) => matches_filter(sub, cond),
        _ => Ok(match condition {
            Bson::RegularExpression(_) => equality_matches(Some(item), condition)?,
            _ => values_equal(item, condition),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{bson, doc};

    fn updated(mut doc: Document, spec: Document) -> Document {
        apply_update(&mut doc, &spec, true).unwrap();
        doc
    }

    // ========== Parsing tests ==========

    #[test]
    fn test_no_recognized_operator_fails_when_validating() {
        let mut doc = doc! {"a": 1};
        let err = apply_update(&mut doc, &doc! {"a": 2}, true).unwrap_err();
        assert!(matches!(err, MemDocError::InvalidUpdate(_)));
        let err = apply_update(&mut doc, &doc! {}, true).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_unrecognized_keys_ignored_without_validation() {
        let mut doc = doc! {"a": 1};
        let changed = apply_update(&mut doc, &doc! {"a": 2, "$foo": {"x": 1}}, false).unwrap();
        assert!(!changed);
        assert_eq!(doc, doc! {"a": 1});
    }

    #[test]
    fn test_unrecognized_keys_ignored_next_to_known_ones() {
        let doc = updated(doc! {"a": 1}, doc! {"$bogus": {"a": 5}, "$set": {"b": 2}});
        assert_eq!(doc, doc! {"a": 1, "b": 2});
    }

    #[test]
    fn test_operator_order_is_fixed() {
        let spec = UpdateSpec::parse(
            &doc! {"$unset": {"x": 1}, "$inc": {"n": 1}, "$set": {"s": 1}},
            true,
        )
        .unwrap();
        let ranks: Vec<u8> = spec.operators().iter().map(UpdateOperator::rank).collect();
        assert_eq!(ranks, vec![1, 4, 9]);
    }

    #[test]
    fn test_set_then_unset_same_field() {
        // $set runs before $unset regardless of key order
        let doc = updated(doc! {"a": 1}, doc! {"$unset": {"a": ""}, "$set": {"a": 2}});
        assert_eq!(doc, doc! {});
    }

    #[test]
    fn test_non_document_argument_rejected() {
        let mut doc = doc! {};
        let err = apply_update(&mut doc, &doc! {"$set": 5}, true).unwrap_err();
        assert!(err.to_string().contains("requires an object"));
        let err = apply_update(&mut doc, &doc! {"$inc": {"n": "one"}}, true).unwrap_err();
        assert!(matches!(err, MemDocError::InvalidUpdate(_)));
    }

    // ========== $set / $unset tests ==========

    #[test]
    fn test_set_creates_path_and_is_idempotent() {
        let once = updated(doc! {"a": 1}, doc! {"$set": {"b.c": 2}});
        let twice = updated(once.clone(), doc! {"$set": {"b.c": 2}});
        assert_eq!(once, doc! {"a": 1, "b": {"c": 2}});
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unset_then_get_is_absent() {
        let doc = updated(doc! {"a": {"b": 1}, "list": [1, 2]}, doc! {"$unset": {"a.b": 1, "list.0": 1}});
        assert_eq!(get_path(&doc, "a.b"), None);
        assert_eq!(get_path(&doc, "list.0"), None);
        assert_eq!(get_path(&doc, "list.1"), Some(&Bson::Int32(2)));
    }

    // ========== Array operator tests ==========

    #[test]
    fn test_add_to_set() {
        let doc = updated(doc! {"tags": ["a"]}, doc! {"$addToSet": {"tags": "a"}});
        assert_eq!(doc, doc! {"tags": ["a"]});
        let doc = updated(doc, doc! {"$addToSet": {"tags": "b"}});
        assert_eq!(doc, doc! {"tags": ["a", "b"]});
        let doc = updated(doc, doc! {"$addToSet": {"fresh": {"$each": [1, 1.0, 2]}}});
        assert_eq!(doc.get_array("fresh").unwrap(), &vec![bson!(1), bson!(2)]);
    }

    #[test]
    fn test_add_to_set_deep_equality() {
        let doc = updated(
            doc! {"items": [{"a": 1, "b": [1, 2]}]},
            doc! {"$addToSet": {"items": {"a": 1, "b": [1, 2]}}},
        );
        assert_eq!(doc.get_array("items").unwrap().len(), 1);
    }

    #[test]
    fn test_push() {
        let doc = updated(doc! {}, doc! {"$push": {"list": 1}});
        assert_eq!(doc, doc! {"list": [1]});
        let doc = updated(doc, doc! {"$push": {"list": 2}});
        assert_eq!(doc, doc! {"list": [1, 2]});
    }

    #[test]
    fn test_push_modifiers() {
        let doc = updated(
            doc! {"list": [1, 2, 3]},
            doc! {"$push": {"list": {"$each": [9, 8], "$position": 1, "$slice": -4}}},
        );
        // [1, 9, 8, 2, 3] trimmed to its last four
        assert_eq!(doc, doc! {"list": [9, 8, 2, 3]});
    }

    #[test]
    fn test_push_onto_scalar_fails() {
        let mut doc = doc! {"list": 5};
        let err = apply_update(&mut doc, &doc! {"$push": {"list": 1}}, true).unwrap_err();
        assert!(matches!(err, MemDocError::TypeMismatch(_)));
        assert_eq!(doc, doc! {"list": 5});
    }

    #[test]
    fn test_pull_and_pop() {
        let doc = updated(
            doc! {"n": [1, 5, 10, 5], "docs": [{"k": 1}, {"k": 2}]},
            doc! {"$pull": {"n": 5, "docs": {"k": 2}}},
        );
        assert_eq!(doc, doc! {"n": [1, 10], "docs": [{"k": 1}]});

        let doc = updated(doc! {"n": [1, 5, 10]}, doc! {"$pull": {"n": {"$gte": 5}}});
        assert_eq!(doc, doc! {"n": [1]});

        let doc = updated(doc! {"n": [1, 2, 3]}, doc! {"$pop": {"n": -1}});
        assert_eq!(doc, doc! {"n": [2, 3]});
        let doc = updated(doc, doc! {"$pop": {"n": 1}});
        assert_eq!(doc, doc! {"n": [2]});
    }

    // ========== Arithmetic operator tests ==========

    #[test]
    fn test_inc() {
        let doc = updated(doc! {"n": 1}, doc! {"$inc": {"n": 2, "fresh": 5}});
        assert_eq!(doc, doc! {"n": 3, "fresh": 5});
        let doc = updated(doc, doc! {"$inc": {"n": 0.5}});
        assert_eq!(doc.get("n"), Some(&Bson::Double(3.5)));
    }

    #[test]
    fn test_inc_non_numeric_fails() {
        let mut doc = doc! {"n": "x"};
        let err = apply_update(&mut doc, &doc! {"$inc": {"n": 1}}, true).unwrap_err();
        assert!(matches!(err, MemDocError::TypeMismatch(_)));
    }

    #[test]
    fn test_min_max() {
        let doc = updated(doc! {"lo": 5, "hi": 5}, doc! {"$min": {"lo": 3, "new": 1}, "$max": {"hi": 3}});
        assert_eq!(doc, doc! {"lo": 3, "hi": 5, "new": 1});
        let doc = updated(doc, doc! {"$max": {"hi": 8}, "$min": {"lo": 4}});
        assert_eq!(doc, doc! {"lo": 3, "hi": 8, "new": 1});
    }

    #[test]
    fn test_min_uses_type_rank() {
        // numbers rank below strings
        let doc = updated(doc! {"v": "text"}, doc! {"$min": {"v": 100}});
        assert_eq!(doc, doc! {"v": 100});
    }

    #[test]
    fn test_mul() {
        let doc = updated(doc! {"price": 10}, doc! {"$mul": {"price": 3, "missing": 7}});
        assert_eq!(doc, doc! {"price": 30, "missing": 0});
        let doc = updated(doc, doc! {"$mul": {"price": 0.5}});
        assert_eq!(doc.get("price"), Some(&Bson::Double(15.0)));
    }

    // ========== $rename tests ==========

    #[test]
    fn test_rename_moves_and_overwrites() {
        let doc = updated(doc! {"a": 1, "b": 2}, doc! {"$rename": {"a": "b"}});
        assert_eq!(doc, doc! {"b": 1});
        let doc = updated(doc! {"a": {"x": 1}}, doc! {"$rename": {"a.x": "y.z"}});
        assert_eq!(doc, doc! {"a": {}, "y": {"z": 1}});
    }

    #[test]
    fn test_rename_noops() {
        let doc = updated(doc! {"b": 2}, doc! {"$rename": {"a": "b"}});
        assert_eq!(doc, doc! {"b": 2});
        let doc = updated(doc! {"a": 1}, doc! {"$rename": {"a": "a"}});
        assert_eq!(doc, doc! {"a": 1});
    }

    #[test]
    fn test_rename_overlap_rejected() {
        let mut doc = doc! {"a": {"b": 1}};
        assert!(apply_update(&mut doc, &doc! {"$rename": {"a": "a.c"}}, true).is_err());
        assert!(apply_update(&mut doc, &doc! {"$rename": {"a": 5}}, true).is_err());
    }

    // ========== Atomicity tests ==========

    #[test]
    fn test_failed_update_leaves_document_untouched() {
        let mut doc = doc! {"a": 1, "s": "x"};
        let result = apply_update(&mut doc, &doc! {"$set": {"a": 2}, "$inc": {"s": 1}}, true);
        assert!(result.is_err());
        assert_eq!(doc, doc! {"a": 1, "s": "x"});
    }

    #[test]
    fn test_set_on_insert_only_when_inserting() {
        let spec = UpdateSpec::parse(&doc! {"$setOnInsert": {"created": true}, "$set": {"a": 1}}, true).unwrap();
        let mut existing = doc! {};
        spec.apply(&mut existing, false).unwrap();
        assert_eq!(existing, doc! {"a": 1});
        let mut inserted = doc! {};
        spec.apply(&mut inserted, true).unwrap();
        assert_eq!(inserted, doc! {"created": true, "a": 1});
    }
}
