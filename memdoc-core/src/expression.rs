//! Aggregation expressions
//!
//! An expression is parsed once into an [`Expression`] tree and evaluated
//! per document. Evaluation yields `Ok(None)` for an absent value.
//!
//! Supported forms:
//!
//! - literals: any non-string value, or a string not starting with `$`
//! - field references: `"$path.to.field"`
//! - `$$ROOT` / `$$CURRENT` (the whole document)
//! - object and array literals whose members are expressions
//! - operators: `$multiply`, `$add`, `$subtract`, `$divide`, `$literal`,
//!   `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$cmp`, and the date parts
//!   `$year`, `$month`, `$dayOfMonth`, `$dayOfYear`, `$dayOfWeek`, `$hour`,
//!   `$minute`, `$second`, `$millisecond`
//!
//! `$subtract` computes first operand minus second operand.

use crate::error::{MemDocError, Result};
use crate::path::get_path;
use crate::value_utils::{compare_optional, NumericValue};
use bson::{Bson, DateTime, Document};
use chrono::{Datelike, Timelike};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Bson),
    FieldPath(String),
    Root,
    Object(Vec<(String, Expression)>),
    Array(Vec<Expression>),
    Operator(Operator),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Multiply(Vec<Expression>),
    Add(Vec<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Divide(Box<Expression>, Box<Expression>),
    Compare(CompareOp, Box<Expression>, Box<Expression>),
    DatePart(DatePart, Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Cmp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
    DayOfMonth,
    DayOfYear,
    DayOfWeek,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl Expression {
    pub fn parse(spec: &Bson) -> Result<Expression> {
        match spec {
            Bson::String(s) if s.starts_with("$$") => parse_variable(s),
            Bson::String(s) if s.starts_with('$') => {
                let path = &s[1..];
                if path.is_empty() {
                    return Err(MemDocError::InvalidArgument(
                        "field reference '$' has no path".to_string(),
                    ));
                }
                Ok(Expression::FieldPath(path.to_string()))
            }
            Bson::Document(doc) => parse_document(doc),
            Bson::Array(items) => Ok(Expression::Array(
                items.iter().map(Expression::parse).collect::<Result<_>>()?,
            )),
            other => Ok(Expression::Literal(other.clone())),
        }
    }

    /// Field reference path, if this is a plain `"$path"` expression.
    pub fn field_path(&self) -> Option<&str> {
        match self {
            Expression::FieldPath(path) => Some(path),
            _ => None,
        }
    }

    pub fn evaluate(&self, doc: &Document) -> Result<Option<Bson>> {
        match self {
            Expression::Literal(value) => Ok(Some(value.clone())),
            Expression::FieldPath(path) => Ok(get_path(doc, path).cloned()),
            Expression::Root => Ok(Some(Bson::Document(doc.clone()))),
            Expression::Object(fields) => {
                let mut out = Document::new();
                for (name, expr) in fields {
                    if let Some(value) = expr.evaluate(doc)? {
                        out.insert(name.clone(), value);
                    }
                }
                Ok(Some(Bson::Document(out)))
            }
            Expression::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.evaluate(doc)?.unwrap_or(Bson::Null));
                }
                Ok(Some(Bson::Array(out)))
            }
            Expression::Operator(op) => op.evaluate(doc),
        }
    }
}

/// Truthiness used by `$expr`: false, null, absent and zero are false.
pub fn is_truthy(value: Option<&Bson>) -> bool {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) | Some(Bson::Boolean(false)) => false,
        Some(Bson::Int32(n)) => *n != 0,
        Some(Bson::Int64(n)) => *n != 0,
        Some(Bson::Double(n)) => *n != 0.0,
        Some(_) => true,
    }
}

fn parse_variable(name: &str) -> Result<Expression> {
    let (variable, rest) = match name[2..].split_once('.') {
        Some((variable, rest)) => (variable, Some(rest)),
        None => (&name[2..], None),
    };
    match (variable, rest) {
        ("ROOT" | "CURRENT", None) => Ok(Expression::Root),
        ("ROOT" | "CURRENT", Some(path)) if !path.is_empty() => {
            Ok(Expression::FieldPath(path.to_string()))
        }
        _ => Err(MemDocError::UnsupportedExpression(format!("variable {}", name))),
    }
}

fn parse_document(doc: &Document) -> Result<Expression> {
    let (first_key, args) = match doc.iter().next() {
        Some(entry) => entry,
        None => return Ok(Expression::Literal(Bson::Document(Document::new()))),
    };

    if first_key.starts_with('$') {
        if doc.len() != 1 {
            return Err(MemDocError::InvalidArgument(format!(
                "an expression object must hold exactly one operator, found {} keys",
                doc.len()
            )));
        }
        return parse_operator(first_key, args);
    }

    let mut fields = Vec::with_capacity(doc.len());
    for (name, value) in doc {
        if name.starts_with('$') {
            return Err(MemDocError::InvalidArgument(format!(
                "operator '{}' cannot be mixed with field names in an expression object",
                name
            )));
        }
        fields.push((name.clone(), Expression::parse(value)?));
    }
    Ok(Expression::Object(fields))
}

fn parse_operator(name: &str, args: &Bson) -> Result<Expression> {
    let op = match name {
        "$literal" => return Ok(Expression::Literal(args.clone())),
        "$multiply" => Operator::Multiply(parse_operands(args)?),
        "$add" => Operator::Add(parse_operands(args)?),
        "$subtract" => {
            let (a, b) = parse_pair(name, args)?;
            Operator::Subtract(a, b)
        }
        "$divide" => {
            let (a, b) = parse_pair(name, args)?;
            Operator::Divide(a, b)
        }
        "$eq" | "$ne" | "$gt" | "$gte" | "$lt" | "$lte" | "$cmp" => {
            let cmp = match name {
                "$eq" => CompareOp::Eq,
                "$ne" => CompareOp::Ne,
                "$gt" => CompareOp::Gt,
                "$gte" => CompareOp::Gte,
                "$lt" => CompareOp::Lt,
                "$lte" => CompareOp::Lte,
                _ => CompareOp::Cmp,
            };
            let (a, b) = parse_pair(name, args)?;
            Operator::Compare(cmp, a, b)
        }
        "$year" => Operator::DatePart(DatePart::Year, parse_date_operand(args)?),
        "$month" => Operator::DatePart(DatePart::Month, parse_date_operand(args)?),
        "$dayOfMonth" => Operator::DatePart(DatePart::DayOfMonth, parse_date_operand(args)?),
        "$dayOfYear" => Operator::DatePart(DatePart::DayOfYear, parse_date_operand(args)?),
        "$dayOfWeek" => Operator::DatePart(DatePart::DayOfWeek, parse_date_operand(args)?),
        "$hour" => Operator::DatePart(DatePart::Hour, parse_date_operand(args)?),
        "$minute" => Operator::DatePart(DatePart::Minute, parse_date_operand(args)?),
        "$second" => Operator::DatePart(DatePart::Second, parse_date_operand(args)?),
        "$millisecond" => Operator::DatePart(DatePart::Millisecond, parse_date_operand(args)?),
        other => return Err(MemDocError::UnsupportedExpression(other.to_string())),
    };
    Ok(Expression::Operator(op))
}

fn parse_operands(args: &Bson) -> Result<Vec<Expression>> {
    match args {
        Bson::Array(items) => items.iter().map(Expression::parse).collect(),
        single => Ok(vec![Expression::parse(single)?]),
    }
}

fn parse_pair(name: &str, args: &Bson) -> Result<(Box<Expression>, Box<Expression>)> {
    match args {
        Bson::Array(items) if items.len() == 2 => Ok((
            Box::new(Expression::parse(&items[0])?),
            Box::new(Expression::parse(&items[1])?),
        )),
        _ => Err(MemDocError::InvalidArgument(format!(
            "{} requires exactly 2 operands",
            name
        ))),
    }
}

fn parse_date_operand(args: &Bson) -> Result<Box<Expression>> {
    let operand = match args {
        Bson::Array(items) if items.len() == 1 => &items[0],
        Bson::Array(items) => {
            return Err(MemDocError::InvalidArgument(format!(
                "date operators take 1 operand, got {}",
                items.len()
            )))
        }
        Bson::Document(doc) => doc.get("date").unwrap_or(args),
        other => other,
    };
    Ok(Box::new(Expression::parse(operand)?))
}

impl Operator {
    fn evaluate(&self, doc: &Document) -> Result<Option<Bson>> {
        match self {
            Operator::Multiply(operands) => {
                let mut product = NumericValue::Int32(1);
                for operand in operands {
                    if let Some(n) = operand
                        .evaluate(doc)?
                        .as_ref()
                        .and_then(NumericValue::from_bson)
                    {
                        product = product.mul(n);
                    }
                }
                Ok(Some(product.to_bson()))
            }
            Operator::Add(operands) => evaluate_add(operands, doc),
            Operator::Subtract(a, b) => evaluate_subtract(a.evaluate(doc)?, b.evaluate(doc)?),
            Operator::Divide(a, b) => evaluate_divide(a.evaluate(doc)?, b.evaluate(doc)?),
            Operator::Compare(cmp, a, b) => {
                let left = a.evaluate(doc)?;
                let right = b.evaluate(doc)?;
                let ordering = compare_optional(left.as_ref(), right.as_ref());
                let result = match cmp {
                    CompareOp::Eq => Bson::Boolean(ordering == Ordering::Equal),
                    CompareOp::Ne => Bson::Boolean(ordering != Ordering::Equal),
                    CompareOp::Gt => Bson::Boolean(ordering == Ordering::Greater),
                    CompareOp::Gte => Bson::Boolean(ordering != Ordering::Less),
                    CompareOp::Lt => Bson::Boolean(ordering == Ordering::Less),
                    CompareOp::Lte => Bson::Boolean(ordering != Ordering::Greater),
                    CompareOp::Cmp => Bson::Int32(match ordering {
                        Ordering::Less => -1,
                        Ordering::Equal => 0,
                        Ordering::Greater => 1,
                    }),
                };
                Ok(Some(result))
            }
            Operator::DatePart(part, operand) => evaluate_date_part(*part, operand.evaluate(doc)?),
        }
    }
}

/// Milliseconds since the epoch for dates and RFC 3339 date strings.
fn date_millis(value: &Bson) -> Option<i64> {
    match value {
        Bson::DateTime(dt) => Some(dt.timestamp_millis()),
        Bson::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}

fn evaluate_add(operands: &[Expression], doc: &Document) -> Result<Option<Bson>> {
    let mut date: Option<i64> = None;
    let mut sum = NumericValue::Int32(0);
    for operand in operands {
        let value = match operand.evaluate(doc)? {
            Some(value) => value,
            None => continue,
        };
        if let Some(n) = NumericValue::from_bson(&value) {
            sum = sum.add(n);
        } else if let Some(millis) = date_millis(&value) {
            if date.is_some() {
                return Err(MemDocError::TypeMismatch(
                    "$add accepts at most one date operand".to_string(),
                ));
            }
            date = Some(millis);
        }
    }
    match date {
        Some(millis) => {
            let delta = sum.as_f64().round() as i64;
            let shifted = millis.checked_add(delta).ok_or_else(date_overflow)?;
            Ok(Some(Bson::DateTime(DateTime::from_millis(shifted))))
        }
        None => Ok(Some(sum.to_bson())),
    }
}

fn evaluate_subtract(left: Option<Bson>, right: Option<Bson>) -> Result<Option<Bson>> {
    let (left, right) = match (left, right) {
        (Some(l), Some(r)) if !matches!(l, Bson::Null) && !matches!(r, Bson::Null) => (l, r),
        _ => return Ok(Some(Bson::Null)),
    };
    if let (Some(a), Some(b)) = (NumericValue::from_bson(&left), NumericValue::from_bson(&right)) {
        return Ok(Some(a.sub(b).to_bson()));
    }
    match (&left, &right) {
        (Bson::DateTime(a), Bson::DateTime(b)) => a
            .timestamp_millis()
            .checked_sub(b.timestamp_millis())
            .map(|millis| Some(Bson::Int64(millis)))
            .ok_or_else(date_overflow),
        (Bson::DateTime(a), other) if NumericValue::from_bson(other).is_some() => {
            let delta = NumericValue::from_bson(other)
                .map(|n| n.as_f64().round() as i64)
                .unwrap_or(0);
            let shifted = a.timestamp_millis().checked_sub(delta).ok_or_else(date_overflow)?;
            Ok(Some(Bson::DateTime(DateTime::from_millis(shifted))))
        }
        _ => Err(MemDocError::TypeMismatch(format!(
            "$subtract cannot subtract {:?} from {:?}",
            right.element_type(),
            left.element_type()
        ))),
    }
}

fn date_overflow() -> MemDocError {
    MemDocError::TypeMismatch("date arithmetic out of range".to_string())
}

fn evaluate_divide(left: Option<Bson>, right: Option<Bson>) -> Result<Option<Bson>> {
    let (left, right) = match (left, right) {
        (Some(l), Some(r)) if !matches!(l, Bson::Null) && !matches!(r, Bson::Null) => (l, r),
        _ => return Ok(Some(Bson::Null)),
    };
    match (NumericValue::from_bson(&left), NumericValue::from_bson(&right)) {
        (Some(_), Some(divisor)) if divisor.is_zero() => Err(MemDocError::DivideByZero),
        (Some(dividend), Some(divisor)) => {
            Ok(Some(Bson::Double(dividend.as_f64() / divisor.as_f64())))
        }
        _ => Err(MemDocError::TypeMismatch(format!(
            "$divide only supports numeric operands, got {:?} and {:?}",
            left.element_type(),
            right.element_type()
        ))),
    }
}

fn evaluate_date_part(part: DatePart, value: Option<Bson>) -> Result<Option<Bson>> {
    let dt = match value {
        None | Some(Bson::Null) => return Ok(Some(Bson::Null)),
        Some(Bson::DateTime(dt)) => dt.to_chrono(),
        Some(other) => {
            return Err(MemDocError::TypeMismatch(format!(
                "date operator applied to {:?}",
                other.element_type()
            )))
        }
    };
    let n = match part {
        DatePart::Year => dt.year(),
        DatePart::Month => dt.month() as i32,
        DatePart::DayOfMonth => dt.day() as i32,
        DatePart::DayOfYear => dt.ordinal() as i32,
        DatePart::DayOfWeek => dt.weekday().number_from_sunday() as i32,
        DatePart::Hour => dt.hour() as i32,
        DatePart::Minute => dt.minute() as i32,
        DatePart::Second => dt.second() as i32,
        DatePart::Millisecond => dt.timestamp_subsec_millis() as i32,
    };
    Ok(Some(Bson::Int32(n)))
}
