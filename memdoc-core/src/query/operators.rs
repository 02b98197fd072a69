// src/query/operators.rs
//! Query operator implementations
//!
//! Each operator is a separate type implementing [`OperatorMatcher`];
//! `OPERATOR_REGISTRY` maps operator names to implementations.
//!
//! ```text
//! OperatorMatcher trait
//!     ↓
//! ┌────────────────┬────────────────┬────────────────┐
//! │ Comparison     │ Logical        │ Element/Array  │
//! │ ($eq, $gt...)  │ ($and, $or...) │ ($exists...)   │
//! └────────────────┴────────────────┴────────────────┘
//! ```

use crate::error::{MemDocError, Result};
use crate::expression::{is_truthy, Expression};
use crate::path::get_path;
use crate::value_utils::{as_integer, compare_in_query, values_equal};
use bson::spec::ElementType;
use bson::{Bson, Document};
use lazy_static::lazy_static;
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::num::NonZeroUsize;

// ============================================================================
// REGEX SUPPORT
// ============================================================================

lazy_static! {
    /// Compiled patterns keyed by "options/pattern"
    static ref REGEX_CACHE: Mutex<LruCache<String, Regex>> =
        Mutex::new(LruCache::new(NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN)));
}

/// Translate i/m/s/x options into inline regex flags
fn build_regex_pattern(pattern: &str, options: &str) -> String {
    let flags: String = options
        .chars()
        .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
        .collect();
    if flags.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", flags, pattern)
    }
}

fn get_or_compile_regex(pattern: &str, options: &str) -> Result<Regex> {
    let cache_key = format!("{}/{}", options, pattern);
    if let Some(regex) = REGEX_CACHE.lock().get(&cache_key) {
        return Ok(regex.clone());
    }

    let regex = Regex::new(&build_regex_pattern(pattern, options)).map_err(|e| {
        MemDocError::InvalidQuery(format!("Invalid regex pattern '{}': {}", pattern, e))
    })?;
    REGEX_CACHE.lock().put(cache_key, regex.clone());
    Ok(regex)
}

/// Compile a `$regex` argument so a bad pattern is reported when the
/// query is built
pub(crate) fn validate_regex(pattern: &Bson, options: &str) -> Result<()> {
    match pattern {
        Bson::String(pattern) => get_or_compile_regex(pattern, options).map(|_| ()),
        Bson::RegularExpression(regex) => {
            get_or_compile_regex(&regex.pattern, &format!("{}{}", regex.options, options)).map(|_| ())
        }
        _ => Err(MemDocError::InvalidQuery(
            "$regex operator requires a string pattern".to_string(),
        )),
    }
}

pub(crate) fn regex_matches(text: &str, pattern: &str, options: &str) -> Result<bool> {
    Ok(get_or_compile_regex(pattern, options)?.is_match(text))
}

/// String (or any string element of an array) matches the pattern
fn value_matches_regex(value: &Bson, pattern: &str, options: &str) -> Result<bool> {
    match value {
        Bson::String(s) | Bson::Symbol(s) => regex_matches(s, pattern, options),
        Bson::Array(items) => {
            for item in items {
                if let Bson::String(s) = item {
                    if regex_matches(s, pattern, options)? {
                        return Ok(true);
                    }
                }
            }
            Ok(false)
        }
        _ => Ok(false),
    }
}

// ============================================================================
// TRAIT DEFINITION
// ============================================================================

/// A single query operator (`$eq`, `$gt`, `$and`, ...)
pub trait OperatorMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// `doc_value` is the field's value (`None` when missing), `filter_value`
    /// the operator argument, `document` the enclosing document for
    /// operators that recurse.
    fn matches(
        &self,
        doc_value: Option<&Bson>,
        filter_value: &Bson,
        document: Option<&Document>,
    ) -> Result<bool>;
}

// ============================================================================
// COMPARISON OPERATORS
// ============================================================================

/// Equality with array-element matching; a regex operand matches strings
/// and `null` matches a missing field.
pub(crate) fn equality_matches(doc_value: Option<&Bson>, filter_value: &Bson) -> Result<bool> {
    let value = match doc_value {
        None => return Ok(matches!(filter_value, Bson::Null)),
        Some(v) => v,
    };
    if let Bson::RegularExpression(regex) = filter_value {
        return value_matches_regex(value, &regex.pattern, &regex.options);
    }
    if values_equal(value, filter_value) {
        return Ok(true);
    }
    if let Bson::Array(items) = value {
        return Ok(items.iter().any(|item| values_equal(item, filter_value)));
    }
    Ok(false)
}

pub struct EqOperator;

impl OperatorMatcher for EqOperator {
    fn name(&self) -> &'static str {
        "$eq"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, _: Option<&Document>) -> Result<bool> {
        equality_matches(doc_value, filter_value)
    }
}

/// True when the field is missing
pub struct NeOperator;

impl OperatorMatcher for NeOperator {
    fn name(&self) -> &'static str {
        "$ne"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, _: Option<&Document>) -> Result<bool> {
        Ok(!equality_matches(doc_value, filter_value)?)
    }
}

pub struct GtOperator;

impl OperatorMatcher for GtOperator {
    fn name(&self) -> &'static str {
        "$gt"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, _: Option<&Document>) -> Result<bool> {
        compare_with_predicate(doc_value, filter_value, |ord| ord == Ordering::Greater)
    }
}

pub struct GteOperator;

impl OperatorMatcher for GteOperator {
    fn name(&self) -> &'static str {
        "$gte"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, _: Option<&Document>) -> Result<bool> {
        compare_with_predicate(doc_value, filter_value, |ord| ord != Ordering::Less)
    }
}

pub struct LtOperator;

impl OperatorMatcher for LtOperator {
    fn name(&self) -> &'static str {
        "$lt"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, _: Option<&Document>) -> Result<bool> {
        compare_with_predicate(doc_value, filter_value, |ord| ord == Ordering::Less)
    }
}

pub struct LteOperator;

impl OperatorMatcher for LteOperator {
    fn name(&self) -> &'static str {
        "$lte"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, _: Option<&Document>) -> Result<bool> {
        compare_with_predicate(doc_value, filter_value, |ord| ord != Ordering::Greater)
    }
}

// ============================================================================
// ARRAY OPERATORS
// ============================================================================

fn require_array<'a>(op: &str, filter_value: &'a Bson) -> Result<&'a Vec<Bson>> {
    filter_value
        .as_array()
        .ok_or_else(|| MemDocError::InvalidQuery(format!("{} operator requires an array", op)))
}

pub struct InOperator;

impl OperatorMatcher for InOperator {
    fn name(&self) -> &'static str {
        "$in"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, _: Option<&Document>) -> Result<bool> {
        for candidate in require_array("$in", filter_value)? {
            if equality_matches(doc_value, candidate)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

pub struct NinOperator;

impl OperatorMatcher for NinOperator {
    fn name(&self) -> &'static str {
        "$nin"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, document: Option<&Document>) -> Result<bool> {
        Ok(!InOperator.matches(doc_value, filter_value, document)?)
    }
}

pub struct AllOperator;

impl OperatorMatcher for AllOperator {
    fn name(&self) -> &'static str {
        "$all"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, _: Option<&Document>) -> Result<bool> {
        let required = require_array("$all", filter_value)?;
        match doc_value {
            Some(Bson::Array(items)) => Ok(required
                .iter()
                .all(|req| items.iter().any(|item| values_equal(item, req)))),
            _ => Ok(false),
        }
    }
}

/// At least one array element satisfies every condition
pub struct ElemMatchOperator;

impl OperatorMatcher for ElemMatchOperator {
    fn name(&self) -> &'static str {
        "$elemMatch"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, _: Option<&Document>) -> Result<bool> {
        let conditions = filter_value.as_document().ok_or_else(|| {
            MemDocError::InvalidQuery("$elemMatch operator requires an object".to_string())
        })?;
        let items = match doc_value {
            Some(Bson::Array(items)) => items,
            _ => return Ok(false),
        };
        let operator_form = is_operator_document(conditions);
        for item in items {
            let matched = if operator_form {
                matches_operators(Some(item), conditions, None)?
            } else if let Bson::Document(sub) = item {
                matches_filter(sub, conditions)?
            } else {
                false
            };
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

pub struct SizeOperator;

impl OperatorMatcher for SizeOperator {
    fn name(&self) -> &'static str {
        "$size"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, _: Option<&Document>) -> Result<bool> {
        let size = as_integer(filter_value).ok_or_else(|| {
            MemDocError::InvalidQuery("$size operator requires an integer".to_string())
        })?;
        match doc_value {
            Some(Bson::Array(items)) => Ok(items.len() as i64 == size),
            _ => Ok(false),
        }
    }
}

// ============================================================================
// ELEMENT OPERATORS
// ============================================================================

pub struct ExistsOperator;

impl OperatorMatcher for ExistsOperator {
    fn name(&self) -> &'static str {
        "$exists"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, _: Option<&Document>) -> Result<bool> {
        let should_exist = match filter_value {
            Bson::Boolean(b) => *b,
            other => match as_integer(other) {
                Some(n) => n != 0,
                None => {
                    return Err(MemDocError::InvalidQuery(
                        "$exists operator requires a boolean".to_string(),
                    ))
                }
            },
        };
        Ok(doc_value.is_some() == should_exist)
    }
}

/// Standalone `$regex`; `$options` from the same condition is applied by
/// [`matches_operators`].
pub struct RegexOperator;

impl OperatorMatcher for RegexOperator {
    fn name(&self) -> &'static str {
        "$regex"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, _: Option<&Document>) -> Result<bool> {
        regex_operator(doc_value, filter_value, "")
    }
}

fn regex_operator(doc_value: Option<&Bson>, filter_value: &Bson, options: &str) -> Result<bool> {
    let value = match doc_value {
        Some(v) => v,
        None => return Ok(false),
    };
    match filter_value {
        Bson::String(pattern) => value_matches_regex(value, pattern, options),
        Bson::RegularExpression(regex) => {
            let combined = format!("{}{}", regex.options, options);
            value_matches_regex(value, &regex.pattern, &combined)
        }
        _ => Err(MemDocError::InvalidQuery(
            "$regex operator requires a string pattern".to_string(),
        )),
    }
}

fn type_code(name: &str) -> Result<i64> {
    let code = match name {
        "double" => 1,
        "string" => 2,
        "object" => 3,
        "array" => 4,
        "binData" => 5,
        "undefined" => 6,
        "objectId" => 7,
        "bool" => 8,
        "date" => 9,
        "null" => 10,
        "regex" => 11,
        "javascript" => 13,
        "int" => 16,
        "timestamp" => 17,
        "long" => 18,
        "decimal" => 19,
        "minKey" => -1,
        "maxKey" => 127,
        other => {
            return Err(MemDocError::InvalidQuery(format!("Unknown type name: {}", other)))
        }
    };
    Ok(code)
}

fn has_type(value: &Bson, wanted: &Bson) -> Result<bool> {
    if let Bson::String(name) = wanted {
        if name == "number" {
            return Ok(matches!(
                value,
                Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)
            ));
        }
    }
    let code = match wanted {
        Bson::String(name) => type_code(name)?,
        other => as_integer(other).ok_or_else(|| {
            MemDocError::InvalidQuery("$type operator requires a string or number".to_string())
        })?,
    };
    let actual = match value.element_type() {
        ElementType::MinKey => -1,
        element => element as u8 as i64,
    };
    Ok(actual == code)
}

pub struct TypeOperator;

impl OperatorMatcher for TypeOperator {
    fn name(&self) -> &'static str {
        "$type"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, _: Option<&Document>) -> Result<bool> {
        let value = match doc_value {
            Some(v) => v,
            None => return Ok(false),
        };
        match filter_value {
            Bson::Array(wanted) => {
                for w in wanted {
                    if has_type(value, w)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            wanted => has_type(value, wanted),
        }
    }
}

// ============================================================================
// LOGICAL OPERATORS
// ============================================================================

fn require_context<'a>(op: &str, document: Option<&'a Document>) -> Result<&'a Document> {
    document.ok_or_else(|| {
        MemDocError::InvalidQuery(format!("{} operator requires document context", op))
    })
}

fn sub_filters<'a>(op: &str, filter_value: &'a Bson) -> Result<Vec<&'a Document>> {
    require_array(op, filter_value)?
        .iter()
        .map(|item| {
            item.as_document().ok_or_else(|| {
                MemDocError::InvalidQuery(format!("{} entries must be objects", op))
            })
        })
        .collect()
}

pub struct AndOperator;

impl OperatorMatcher for AndOperator {
    fn name(&self) -> &'static str {
        "$and"
    }

    fn matches(&self, _: Option<&Bson>, filter_value: &Bson, document: Option<&Document>) -> Result<bool> {
        let doc = require_context("$and", document)?;
        for condition in sub_filters("$and", filter_value)? {
            if !matches_filter(doc, condition)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

pub struct OrOperator;

impl OperatorMatcher for OrOperator {
    fn name(&self) -> &'static str {
        "$or"
    }

    fn matches(&self, _: Option<&Bson>, filter_value: &Bson, document: Option<&Document>) -> Result<bool> {
        let doc = require_context("$or", document)?;
        for condition in sub_filters("$or", filter_value)? {
            if matches_filter(doc, condition)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

pub struct NorOperator;

impl OperatorMatcher for NorOperator {
    fn name(&self) -> &'static str {
        "$nor"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, document: Option<&Document>) -> Result<bool> {
        Ok(!OrOperator.matches(doc_value, filter_value, document)?)
    }
}

/// Negates an operator object (`{$not: {$gt: 5}}`) or a regex
pub struct NotOperator;

impl OperatorMatcher for NotOperator {
    fn name(&self) -> &'static str {
        "$not"
    }

    fn matches(&self, doc_value: Option<&Bson>, filter_value: &Bson, document: Option<&Document>) -> Result<bool> {
        match filter_value {
            Bson::Document(condition) if is_operator_document(condition) => {
                Ok(!matches_operators(doc_value, condition, document)?)
            }
            Bson::RegularExpression(_) => Ok(!equality_matches(doc_value, filter_value)?),
            _ => Err(MemDocError::InvalidQuery(
                "$not operator requires an operator object or a regex".to_string(),
            )),
        }
    }
}

/// `{$expr: <aggregation expression>}` evaluated against the document
pub struct ExprOperator;

impl OperatorMatcher for ExprOperator {
    fn name(&self) -> &'static str {
        "$expr"
    }

    fn matches(&self, _: Option<&Bson>, filter_value: &Bson, document: Option<&Document>) -> Result<bool> {
        let doc = require_context("$expr", document)?;
        let value = Expression::parse(filter_value)?.evaluate(doc)?;
        Ok(is_truthy(value.as_ref()))
    }
}

// ============================================================================
// OPERATOR REGISTRY
// ============================================================================

lazy_static! {
    /// Every query operator by name; immutable after first use
    pub static ref OPERATOR_REGISTRY: HashMap<&'static str, Box<dyn OperatorMatcher>> = {
        let operators: Vec<Box<dyn OperatorMatcher>> = vec![
            Box::new(EqOperator),
            Box::new(NeOperator),
            Box::new(GtOperator),
            Box::new(GteOperator),
            Box::new(LtOperator),
            Box::new(LteOperator),
            Box::new(InOperator),
            Box::new(NinOperator),
            Box::new(AllOperator),
            Box::new(ElemMatchOperator),
            Box::new(SizeOperator),
            Box::new(ExistsOperator),
            Box::new(TypeOperator),
            Box::new(RegexOperator),
            Box::new(AndOperator),
            Box::new(OrOperator),
            Box::new(NorOperator),
            Box::new(NotOperator),
            Box::new(ExprOperator),
        ];
        operators.into_iter().map(|op| (op.name(), op)).collect()
    };
}

const TOP_LEVEL_OPERATORS: [&str; 4] = ["$and", "$or", "$nor", "$expr"];

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn lookup(op_name: &str) -> Result<&'static dyn OperatorMatcher> {
    OPERATOR_REGISTRY
        .get(op_name)
        .map(|op| op.as_ref())
        .ok_or_else(|| MemDocError::InvalidQuery(format!("Unknown operator: {}", op_name)))
}

/// Shared by $gt/$gte/$lt/$lte: same-rank comparison, with array
/// element matching.
fn compare_with_predicate<F>(doc_value: Option<&Bson>, filter_value: &Bson, predicate: F) -> Result<bool>
where
    F: Fn(Ordering) -> bool,
{
    let value = match doc_value {
        Some(v) => v,
        None => return Ok(false),
    };
    if compare_in_query(value, filter_value).map(&predicate).unwrap_or(false) {
        return Ok(true);
    }
    if let Bson::Array(items) = value {
        return Ok(items.iter().any(|item| {
            compare_in_query(item, filter_value)
                .map(&predicate)
                .unwrap_or(false)
        }));
    }
    Ok(false)
}

/// Condition objects whose first key is an operator (`{$gt: 1}`); anything
/// else is matched by whole-value equality.
pub(crate) fn is_operator_document(condition: &Document) -> bool {
    condition
        .keys()
        .next()
        .map(|key| key.starts_with('$'))
        .unwrap_or(false)
}

/// Apply every operator in `condition` to a single value.
pub(crate) fn matches_operators(
    doc_value: Option<&Bson>,
    condition: &Document,
    document: Option<&Document>,
) -> Result<bool> {
    for (op_name, op_value) in condition {
        match op_name.as_str() {
            "$regex" => {
                let options = condition.get_str("$options").unwrap_or("");
                if !regex_operator(doc_value, op_value, options)? {
                    return Ok(false);
                }
            }
            "$options" => {
                if !condition.contains_key("$regex") {
                    return Err(MemDocError::InvalidQuery(
                        "$options requires $regex".to_string(),
                    ));
                }
            }
            name if name.starts_with('$') => {
                if !lookup(name)?.matches(doc_value, op_value, document)? {
                    return Ok(false);
                }
            }
            name => {
                return Err(MemDocError::InvalidQuery(format!(
                    "Unexpected field '{}' in operator object",
                    name
                )))
            }
        }
    }
    Ok(true)
}

/// Main entry point for filter matching
///
/// - `Ok(true)` if the document matches
/// - `Ok(false)` if it doesn't
/// - `Err(...)` if the filter is malformed
pub fn matches_filter(document: &Document, filter: &Document) -> Result<bool> {
    for (key, value) in filter {
        if key.starts_with('$') {
            if !TOP_LEVEL_OPERATORS.contains(&key.as_str()) {
                return Err(MemDocError::InvalidQuery(format!(
                    "Unknown top-level operator: {}",
                    key
                )));
            }
            if !lookup(key)?.matches(None, value, Some(document))? {
                return Ok(false);
            }
            continue;
        }

        let doc_value = get_path(document, key);
        let matched = match value {
            Bson::Document(condition) if is_operator_document(condition) => {
                matches_operators(doc_value, condition, Some(document))?
            }
            _ => equality_matches(doc_value, value)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}
