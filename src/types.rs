use std::fmt::Display;

use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TupleValueType {
    BigInt,
    Int,
    Double,
    Bool
}

impl TupleValueType {
    pub fn is_type_of(&self, value: &TupleValue) -> bool {
        matches!((self, value),
            (TupleValueType::BigInt, TupleValue::BigInt(_))
            | (TupleValueType::Int, TupleValue::Int(_))
            | (TupleValueType::Double, TupleValue::Double(_))
            | (TupleValueType::Bool, TupleValue::Bool(_)))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum TupleValue {
    BigInt(i64),
    Int(i32),
    Double(f64),
    Bool(bool),
}

impl TupleValue {
    pub fn as_big_int(&self) -> i64 {
        match self {
            TupleValue::BigInt(value) => *value,
            _ => unreachable!(),
        }
    }

    pub fn as_int(&self) -> i32 {
        match self {
            TupleValue::Int(value) => *value,
            _ => unreachable!(),
        }
    }

    pub fn as_double(&self) -> f64 {
        match self {
            TupleValue::Double(value) => *value,
            _ => unreachable!(),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            TupleValue::Bool(value) => *value,
            _ => unreachable!(),
        }
    }
}

impl PartialEq for TupleValue {
    fn eq(&self, other: &Self) -> bool {
        // Integer types compare across widths, doubles only compare with doubles
        match (self, other) {
            (TupleValue::BigInt(a), TupleValue::BigInt(b)) => a == b,
            (TupleValue::Int(a), TupleValue::Int(b)) => a == b,
            (TupleValue::BigInt(a), TupleValue::Int(b)) => *a == *b as i64,
            (TupleValue::Int(a), TupleValue::BigInt(b)) => *a as i64 == *b,
            (TupleValue::Double(a), TupleValue::Double(b)) => a.to_bits() == b.to_bits(),
            (TupleValue::Bool(a), TupleValue::Bool(b)) => a == b,
            _ => false
        }
    }
}

impl Display for TupleValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TupleValue::BigInt(i) => write!(f, "{}", i),
            TupleValue::Int(i) => write!(f, "{}", i),
            TupleValue::Double(d) => write!(f, "{}", d),
            TupleValue::Bool(b) => write!(f, "{}", if *b { "t" } else { "f" }),
        }
    }
}

/// One row of a diagnostic view. `None` stands for SQL NULL.
#[derive(Debug, PartialEq, Clone)]
pub struct Tuple {
    pub values: Vec<Option<TupleValue>>
}

impl Tuple {
    #[inline]
    pub fn new(values: Vec<Option<TupleValue>>) -> Tuple {
        Tuple { values }
    }

    pub fn matches_schema(&self, attributes: &[TupleValueType]) -> bool {
        self.values.len() == attributes.len()
            && self.values.iter().zip(attributes)
                .all(|(value, attribute)| value.as_ref().map_or(true, |v| attribute.is_type_of(v)))
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = self.values.iter()
            .map(|v| v.map(|v| v.to_string()).unwrap_or_else(|| "NULL".to_string()))
            .join(" | ");
        write!(f, "{}", rendered)
    }
}
