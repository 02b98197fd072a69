// src/aggregation/accumulator.rs
//! `$group` accumulators
//!
//! Every accumulator collects the documents of one group and reduces them
//! to a single value. The operand of most accumulators is an arbitrary
//! expression evaluated once per document; a row whose evaluation divides
//! by zero is left out of the reduction unless the pipeline runs with
//! [`DivideByZeroPolicy::Error`].

use crate::error::{MemDocError, Result};
use crate::expression::Expression;
use crate::log_debug;
use crate::options::DivideByZeroPolicy;
use crate::sort::SortSpec;
use crate::value_utils::{as_integer, canonical_key, compare_values, count_value, NumericValue};
use ahash::AHashSet;
use bson::{Bson, Document};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Evaluate `expr` for every row, dropping rows skipped by the divide-by-zero
/// policy. Absent results stay in the output as `None`.
fn evaluate_rows(
    expr: &Expression,
    docs: &[&Document],
    policy: DivideByZeroPolicy,
) -> Result<Vec<Option<Bson>>> {
    let mut values = Vec::with_capacity(docs.len());
    for doc in docs {
        match expr.evaluate(doc) {
            Ok(value) => values.push(value),
            Err(MemDocError::DivideByZero) if policy == DivideByZeroPolicy::Skip => {
                log_debug!("division by zero, skipping row");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(values)
}

/// Values that are neither absent nor null
fn present(values: Vec<Option<Bson>>) -> impl Iterator<Item = Bson> {
    values
        .into_iter()
        .flatten()
        .filter(|v| !matches!(v, Bson::Null | Bson::Undefined))
}

fn numbers(values: Vec<Option<Bson>>) -> Vec<NumericValue> {
    values
        .iter()
        .flatten()
        .filter_map(NumericValue::from_bson)
        .collect()
}

fn operand_document<'a>(op: &str, spec: &'a Bson) -> Result<&'a Document> {
    spec.as_document().ok_or_else(|| {
        MemDocError::InvalidArgument(format!("{} requires an object argument", op))
    })
}

fn required<'a>(op: &str, args: &'a Document, field: &str) -> Result<&'a Bson> {
    args.get(field).ok_or_else(|| {
        MemDocError::InvalidArgument(format!("{} requires '{}'", op, field))
    })
}

fn parse_n(op: &str, args: &Document) -> Result<usize> {
    match as_integer(required(op, args, "n")?) {
        Some(n) if n > 0 => Ok(n as usize),
        _ => Err(MemDocError::InvalidArgument(format!(
            "{} 'n' must be a positive integer",
            op
        ))),
    }
}

fn parse_sort_by(op: &str, args: &Document) -> Result<SortSpec> {
    SortSpec::from_bson(required(op, args, "sortBy")?)
}

/// Average and variance helpers return `None` without enough samples.
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn std_dev(values: &[f64], sample: bool) -> Option<f64> {
    let min_len = if sample { 2 } else { 1 };
    if values.len() < min_len {
        return None;
    }
    let avg = mean(values)?;
    let squares: f64 = values.iter().map(|v| (v - avg) * (v - avg)).sum();
    let divisor = if sample { values.len() - 1 } else { values.len() };
    Some((squares / divisor as f64).sqrt())
}

// ============================================================================
// ACCUMULATOR
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Count,
    Sum(Expression),
    Avg(Expression),
    Min(Expression),
    Max(Expression),
    First(Expression),
    Last(Expression),
    FirstN { input: Expression, n: usize },
    LastN { input: Expression, n: usize },
    MaxN { input: Expression, n: usize },
    MinN { input: Expression, n: usize },
    Push(Expression),
    AddToSet(Expression),
    StdDevPop(Expression),
    StdDevSamp(Expression),
    Top { sort_by: SortSpec, output: Expression },
    Bottom { sort_by: SortSpec, output: Expression },
    TopN { sort_by: SortSpec, output: Expression, n: usize },
    BottomN { sort_by: SortSpec, output: Expression, n: usize },
    MergeObjects(Expression),
}

impl Accumulator {
    /// Parse `{$op: args}`
    pub fn parse(spec: &Bson) -> Result<Self> {
        let obj = match spec {
            Bson::Document(obj) => obj,
            _ => {
                return Err(MemDocError::InvalidPipeline(
                    "Accumulator must be an object".to_string(),
                ))
            }
        };
        let (op, value) = match obj.iter().next() {
            Some(entry) if obj.len() == 1 => entry,
            _ => {
                return Err(MemDocError::InvalidPipeline(
                    "Accumulator must have exactly one operator".to_string(),
                ))
            }
        };

        let accumulator = match op.as_str() {
            "$count" => {
                if !operand_document(op, value)?.is_empty() {
                    return Err(MemDocError::InvalidArgument(
                        "$count takes no arguments".to_string(),
                    ));
                }
                Accumulator::Count
            }
            "$sum" => Accumulator::Sum(Expression::parse(value)?),
            "$avg" => Accumulator::Avg(Expression::parse(value)?),
            "$min" => Accumulator::Min(Expression::parse(value)?),
            "$max" => Accumulator::Max(Expression::parse(value)?),
            "$first" => Accumulator::First(Expression::parse(value)?),
            "$last" => Accumulator::Last(Expression::parse(value)?),
            "$push" => Accumulator::Push(Expression::parse(value)?),
            "$addToSet" => Accumulator::AddToSet(Expression::parse(value)?),
            "$stdDevPop" => Accumulator::StdDevPop(Expression::parse(value)?),
            "$stdDevSamp" => Accumulator::StdDevSamp(Expression::parse(value)?),
            "$mergeObjects" => Accumulator::MergeObjects(Expression::parse(value)?),
            "$firstN" | "$lastN" | "$maxN" | "$minN" => {
                let args = operand_document(op, value)?;
                let input = Expression::parse(required(op, args, "input")?)?;
                let n = parse_n(op, args)?;
                match op.as_str() {
                    "$firstN" => Accumulator::FirstN { input, n },
                    "$lastN" => Accumulator::LastN { input, n },
                    "$maxN" => Accumulator::MaxN { input, n },
                    _ => Accumulator::MinN { input, n },
                }
            }
            "$top" | "$bottom" => {
                let args = operand_document(op, value)?;
                let sort_by = parse_sort_by(op, args)?;
                let output = Expression::parse(required(op, args, "output")?)?;
                if op == "$top" {
                    Accumulator::Top { sort_by, output }
                } else {
                    Accumulator::Bottom { sort_by, output }
                }
            }
            "$topN" | "$bottomN" => {
                let args = operand_document(op, value)?;
                let sort_by = parse_sort_by(op, args)?;
                let output = Expression::parse(required(op, args, "output")?)?;
                let n = parse_n(op, args)?;
                if op == "$topN" {
                    Accumulator::TopN { sort_by, output, n }
                } else {
                    Accumulator::BottomN { sort_by, output, n }
                }
            }
            "$accumulator" => {
                return Err(MemDocError::UnsupportedAccumulator(
                    "$accumulator (custom reducer functions are not supported)".to_string(),
                ))
            }
            other => return Err(MemDocError::UnsupportedAccumulator(other.to_string())),
        };
        Ok(accumulator)
    }

    /// Reduce the documents of one group.
    pub fn compute(&self, docs: &[&Document], policy: DivideByZeroPolicy) -> Result<Bson> {
        let value = match self {
            Accumulator::Count => count_value(docs.len()),

            Accumulator::Sum(expr) => numbers(evaluate_rows(expr, docs, policy)?)
                .into_iter()
                .fold(NumericValue::Int32(0), NumericValue::add)
                .to_bson(),

            Accumulator::Avg(expr) => {
                let values: Vec<f64> = numbers(evaluate_rows(expr, docs, policy)?)
                    .into_iter()
                    .map(NumericValue::as_f64)
                    .collect();
                mean(&values).map(Bson::Double).unwrap_or(Bson::Null)
            }

            Accumulator::Min(expr) => present(evaluate_rows(expr, docs, policy)?)
                .reduce(|best, v| if compare_values(&v, &best).is_lt() { v } else { best })
                .unwrap_or(Bson::Null),

            Accumulator::Max(expr) => present(evaluate_rows(expr, docs, policy)?)
                .reduce(|best, v| if compare_values(&v, &best).is_gt() { v } else { best })
                .unwrap_or(Bson::Null),

            Accumulator::First(expr) => evaluate_rows(expr, docs, policy)?
                .into_iter()
                .next()
                .flatten()
                .unwrap_or(Bson::Null),

            Accumulator::Last(expr) => evaluate_rows(expr, docs, policy)?
                .into_iter()
                .last()
                .flatten()
                .unwrap_or(Bson::Null),

            Accumulator::FirstN { input, n } => Bson::Array(
                evaluate_rows(input, docs, policy)?
                    .into_iter()
                    .take(*n)
                    .map(|v| v.unwrap_or(Bson::Null))
                    .collect(),
            ),

            Accumulator::LastN { input, n } => {
                let values = evaluate_rows(input, docs, policy)?;
                let skip = values.len().saturating_sub(*n);
                Bson::Array(
                    values
                        .into_iter()
                        .skip(skip)
                        .map(|v| v.unwrap_or(Bson::Null))
                        .collect(),
                )
            }

            Accumulator::MaxN { input, n } | Accumulator::MinN { input, n } => {
                let mut values: Vec<Bson> = present(evaluate_rows(input, docs, policy)?).collect();
                if matches!(self, Accumulator::MaxN { .. }) {
                    values.sort_by(|a, b| compare_values(b, a));
                } else {
                    values.sort_by(compare_values);
                }
                values.truncate(*n);
                Bson::Array(values)
            }

            Accumulator::Push(expr) => {
                Bson::Array(evaluate_rows(expr, docs, policy)?.into_iter().flatten().collect())
            }

            Accumulator::AddToSet(expr) => {
                let mut seen = AHashSet::new();
                let mut unique = Vec::new();
                for value in evaluate_rows(expr, docs, policy)?.into_iter().flatten() {
                    if seen.insert(canonical_key(&value)) {
                        unique.push(value);
                    }
                }
                Bson::Array(unique)
            }

            Accumulator::StdDevPop(expr) | Accumulator::StdDevSamp(expr) => {
                let values: Vec<f64> = numbers(evaluate_rows(expr, docs, policy)?)
                    .into_iter()
                    .map(NumericValue::as_f64)
                    .collect();
                let sample = matches!(self, Accumulator::StdDevSamp(_));
                std_dev(&values, sample).map(Bson::Double).unwrap_or(Bson::Null)
            }

            Accumulator::Top { sort_by, output } => {
                let sorted = sorted_rows(sort_by, docs);
                evaluate_rows(output, &sorted, policy)?
                    .into_iter()
                    .next()
                    .flatten()
                    .unwrap_or(Bson::Null)
            }

            Accumulator::Bottom { sort_by, output } => {
                let sorted = sorted_rows(sort_by, docs);
                evaluate_rows(output, &sorted, policy)?
                    .into_iter()
                    .last()
                    .flatten()
                    .unwrap_or(Bson::Null)
            }

            Accumulator::TopN { sort_by, output, n } => {
                let sorted = sorted_rows(sort_by, docs);
                Bson::Array(
                    evaluate_rows(output, &sorted, policy)?
                        .into_iter()
                        .take(*n)
                        .map(|v| v.unwrap_or(Bson::Null))
                        .collect(),
                )
            }

            Accumulator::BottomN { sort_by, output, n } => {
                let sorted = sorted_rows(sort_by, docs);
                let values = evaluate_rows(output, &sorted, policy)?;
                let skip = values.len().saturating_sub(*n);
                Bson::Array(
                    values
                        .into_iter()
                        .skip(skip)
                        .map(|v| v.unwrap_or(Bson::Null))
                        .collect(),
                )
            }

            Accumulator::MergeObjects(expr) => {
                let mut merged = Document::new();
                for value in present(evaluate_rows(expr, docs, policy)?) {
                    match value {
                        Bson::Document(fields) => {
                            for (key, field) in fields {
                                merged.insert(key, field);
                            }
                        }
                        other => {
                            return Err(MemDocError::TypeMismatch(format!(
                                "$mergeObjects requires documents, found {:?}",
                                other.element_type()
                            )))
                        }
                    }
                }
                Bson::Document(merged)
            }
        };
        Ok(value)
    }
}

/// Group members ordered by `sort_by` (stable).
fn sorted_rows<'a>(sort_by: &SortSpec, docs: &[&'a Document]) -> Vec<&'a Document> {
    let mut sorted = docs.to_vec();
    sorted.sort_by(|a, b| sort_by.compare(a, b));
    sorted
}
