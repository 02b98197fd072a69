//! Value comparison and arithmetic shared across modules
//!
//! Every value has a type rank; values of different ranks order by rank
//! alone, values of the same rank order by a rank-specific rule. This gives
//! a total order used by sorting, `$min`/`$max` and group-key equality.
//!
//! | rank | variant                       |
//! |------|-------------------------------|
//! | 0    | MinKey                        |
//! | 1    | numbers (int32, int64, double, decimal128) |
//! | 2    | strings, symbols              |
//! | 3    | sub-documents                 |
//! | 4    | arrays                        |
//! | 5    | binary                        |
//! | 6    | undefined / absent            |
//! | 7    | ObjectId                      |
//! | 8    | false                         |
//! | 9    | true                          |
//! | 10   | dates, timestamps             |
//! | 11   | null                          |
//! | 12   | regular expressions           |
//! | 13   | JavaScript code, DbPointer    |
//! | 14   | MaxKey                        |

use bson::Bson;
use std::cmp::Ordering;

pub const RANK_NUMBER: u8 = 1;
pub const RANK_UNDEFINED: u8 = 6;
pub const RANK_DATE: u8 = 10;

/// Type rank of a value; `None` (absent) ranks with undefined.
pub fn type_rank(value: Option<&Bson>) -> u8 {
    let value = match value {
        Some(v) => v,
        None => return RANK_UNDEFINED,
    };
    match value {
        Bson::MinKey => 0,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => RANK_NUMBER,
        Bson::String(_) | Bson::Symbol(_) => 2,
        Bson::Document(_) => 3,
        Bson::Array(_) => 4,
        Bson::Binary(_) => 5,
        Bson::Undefined => RANK_UNDEFINED,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(false) => 8,
        Bson::Boolean(true) => 9,
        Bson::DateTime(_) | Bson::Timestamp(_) => RANK_DATE,
        Bson::Null => 11,
        Bson::RegularExpression(_) => 12,
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) | Bson::DbPointer(_) => 13,
        Bson::MaxKey => 14,
    }
}

/// Total order over values.
///
/// ```
/// use bson::Bson;
/// use std::cmp::Ordering;
/// use memdoc_core::value_utils::compare_values;
///
/// assert_eq!(compare_values(&Bson::Int32(10), &Bson::Double(5.5)), Ordering::Greater);
/// assert_eq!(compare_values(&Bson::String("a".into()), &Bson::Int32(1)), Ordering::Greater);
/// assert_eq!(compare_values(&Bson::Null, &Bson::Boolean(true)), Ordering::Greater);
/// ```
pub fn compare_values(a: &Bson, b: &Bson) -> Ordering {
    compare_optional(Some(a), Some(b))
}

/// Like [`compare_values`], with `None` standing for an absent field.
pub fn compare_optional(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let rank_a = type_rank(a);
    let rank_b = type_rank(b);
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }
    match (a, b) {
        (Some(a), Some(b)) => compare_same_rank(a, b),
        _ => Ordering::Equal,
    }
}

/// Sort-callback form: -1, 0 or 1.
///
/// `descending` flips same-rank comparisons only. Values of different
/// ranks always order by rank, whatever the direction.
pub fn compare_directed(a: Option<&Bson>, b: Option<&Bson>, descending: bool) -> i32 {
    let rank_a = type_rank(a);
    let rank_b = type_rank(b);
    if rank_a != rank_b {
        return ordering_to_i32(rank_a.cmp(&rank_b));
    }
    let ordering = compare_optional(a, b);
    if descending {
        ordering_to_i32(ordering.reverse())
    } else {
        ordering_to_i32(ordering)
    }
}

pub fn ordering_to_i32(ordering: Ordering) -> i32 {
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Deep value equality under the comparator (1 == 1.0, key order matters).
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    compare_values(a, b) == Ordering::Equal
}

/// Ordering for query comparison operators, which only compare values of
/// the same type rank.
pub fn compare_in_query(a: &Bson, b: &Bson) -> Option<Ordering> {
    if type_rank(Some(a)) == type_rank(Some(b)) {
        Some(compare_same_rank(a, b))
    } else {
        None
    }
}

fn compare_same_rank(a: &Bson, b: &Bson) -> Ordering {
    match (a, b) {
        (Bson::String(x), Bson::String(y))
        | (Bson::String(x), Bson::Symbol(y))
        | (Bson::Symbol(x), Bson::String(y))
        | (Bson::Symbol(x), Bson::Symbol(y)) => x.cmp(y),
        (Bson::Document(x), Bson::Document(y)) => {
            for ((key_x, val_x), (key_y, val_y)) in x.iter().zip(y.iter()) {
                let ordering = key_x
                    .cmp(key_y)
                    .then_with(|| compare_values(val_x, val_y));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Bson::Array(x), Bson::Array(y)) => {
            for (item_x, item_y) in x.iter().zip(y.iter()) {
                let ordering = compare_values(item_x, item_y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Bson::Binary(x), Bson::Binary(y)) => x
            .bytes
            .len()
            .cmp(&y.bytes.len())
            .then_with(|| x.bytes.cmp(&y.bytes))
            .then_with(|| format!("{:?}", x.subtype).cmp(&format!("{:?}", y.subtype))),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            x.timestamp_millis().cmp(&y.timestamp_millis())
        }
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            (x.time, x.increment).cmp(&(y.time, y.increment))
        }
        (Bson::DateTime(_), Bson::Timestamp(_)) => Ordering::Less,
        (Bson::Timestamp(_), Bson::DateTime(_)) => Ordering::Greater,
        (Bson::RegularExpression(x), Bson::RegularExpression(y)) => x
            .pattern
            .cmp(&y.pattern)
            .then_with(|| x.options.cmp(&y.options)),
        (Bson::JavaScriptCode(x), Bson::JavaScriptCode(y)) => x.cmp(y),
        _ => match (NumericValue::from_bson(a), NumericValue::from_bson(b)) {
            (Some(x), Some(y)) => x.cmp_numeric(&y),
            // decimal128 never converts; keep it after other numbers
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

fn compare_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

// ============================================================================
// NUMERIC ARITHMETIC
// ============================================================================

/// A numeric value with its integer kind preserved
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    Int32(i32),
    Int64(i64),
    Double(f64),
}

impl NumericValue {
    pub fn from_bson(value: &Bson) -> Option<NumericValue> {
        match value {
            Bson::Int32(n) => Some(NumericValue::Int32(*n)),
            Bson::Int64(n) => Some(NumericValue::Int64(*n)),
            Bson::Double(n) => Some(NumericValue::Double(*n)),
            _ => None,
        }
    }

    pub fn to_bson(self) -> Bson {
        match self {
            NumericValue::Int32(n) => Bson::Int32(n),
            NumericValue::Int64(n) => Bson::Int64(n),
            NumericValue::Double(n) => Bson::Double(n),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            NumericValue::Int32(n) => n as f64,
            NumericValue::Int64(n) => n as f64,
            NumericValue::Double(n) => n,
        }
    }

    fn as_i64(self) -> Option<i64> {
        match self {
            NumericValue::Int32(n) => Some(n as i64),
            NumericValue::Int64(n) => Some(n),
            NumericValue::Double(_) => None,
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    /// Zero of the same kind.
    pub fn zero_like(self) -> NumericValue {
        match self {
            NumericValue::Int32(_) => NumericValue::Int32(0),
            NumericValue::Int64(_) => NumericValue::Int64(0),
            NumericValue::Double(_) => NumericValue::Double(0.0),
        }
    }

    fn cmp_numeric(&self, other: &NumericValue) -> Ordering {
        match (self.as_i64(), other.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => compare_f64(self.as_f64(), other.as_f64()),
        }
    }

    pub fn add(self, other: NumericValue) -> NumericValue {
        self.combine(other, i64::checked_add, |x, y| x + y)
    }

    pub fn sub(self, other: NumericValue) -> NumericValue {
        self.combine(other, i64::checked_sub, |x, y| x - y)
    }

    pub fn mul(self, other: NumericValue) -> NumericValue {
        self.combine(other, i64::checked_mul, |x, y| x * y)
    }

    /// Integer kinds stay integral (int32 widening to int64 on overflow,
    /// int64 falling back to double); any double operand yields a double.
    fn combine(
        self,
        other: NumericValue,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> NumericValue {
        let (x, y) = match (self.as_i64(), other.as_i64()) {
            (Some(x), Some(y)) => (x, y),
            _ => return NumericValue::Double(float_op(self.as_f64(), other.as_f64())),
        };
        let both_int32 = matches!(
            (self, other),
            (NumericValue::Int32(_), NumericValue::Int32(_))
        );
        match int_op(x, y) {
            Some(result) if both_int32 && i32::try_from(result).is_ok() => {
                NumericValue::Int32(result as i32)
            }
            Some(result) => NumericValue::Int64(result),
            None => NumericValue::Double(float_op(self.as_f64(), other.as_f64())),
        }
    }
}

pub fn is_numeric(value: &Bson) -> bool {
    NumericValue::from_bson(value).is_some()
}

pub fn as_f64(value: &Bson) -> Option<f64> {
    NumericValue::from_bson(value).map(NumericValue::as_f64)
}

/// Integral value of an integer or whole double.
pub fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(*n as i64),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
        _ => None,
    }
}

/// Counts as int32 when they fit, int64 otherwise.
pub fn count_value(count: usize) -> Bson {
    match i32::try_from(count) {
        Ok(n) => Bson::Int32(n),
        Err(_) => Bson::Int64(count as i64),
    }
}

// ============================================================================
// HASHABLE KEYS
// ============================================================================

/// Canonical string such that `values_equal(a, b)` implies equal keys.
///
/// Numbers of any kind that compare equal share a key; sub-document keys
/// keep their order since field order is part of document equality.
pub fn canonical_key(value: &Bson) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Bson, out: &mut String) {
    match value {
        Bson::Int32(n) => out.push_str(&format!("n:{}", n)),
        Bson::Int64(n) => out.push_str(&format!("n:{}", n)),
        Bson::Double(n) => {
            if n.fract() == 0.0 && n.abs() < 9.0e15 {
                out.push_str(&format!("n:{}", *n as i64));
            } else {
                out.push_str(&format!("n:{}", n));
            }
        }
        Bson::String(s) | Bson::Symbol(s) => out.push_str(&format!("s:{:?}", s)),
        Bson::Document(doc) => {
            out.push('{');
            for (key, val) in doc {
                out.push_str(&format!("{:?}:", key));
                write_canonical(val, out);
                out.push(',');
            }
            out.push('}');
        }
        Bson::Array(items) => {
            out.push('[');
            for item in items {
                write_canonical(item, out);
                out.push(',');
            }
            out.push(']');
        }
        Bson::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Bson::Null => out.push_str("null"),
        Bson::Undefined => out.push_str("undefined"),
        Bson::ObjectId(oid) => out.push_str(&format!("oid:{}", oid.to_hex())),
        Bson::DateTime(dt) => out.push_str(&format!("date:{}", dt.timestamp_millis())),
        Bson::RegularExpression(regex) => {
            out.push_str(&format!("re:{:?}/{:?}", regex.pattern, regex.options))
        }
        other => out.push_str(&format!("{}:{:?}", type_rank(Some(other)), other)),
    }
}
