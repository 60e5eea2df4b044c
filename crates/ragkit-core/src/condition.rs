//! Backend-neutral filter conditions.
//!
//! A [`Condition`] is built once by the caller and translated into native
//! filter syntax by a backend's [`FilterAdapter`] at query time.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Convert a JSON value into a scalar, if it is one.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Int(i))
                } else {
                    n.as_f64().map(Self::Float)
                }
            }
            serde_json::Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    /// Numeric view used for comparisons. Bools count as 0 / 1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Str(_) => None,
        }
    }

    /// Compare two scalars. Strings only compare with strings.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "'{}'", s),
        }
    }
}

/// The fixed operator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
    And,
    Or,
}

impl Operator {
    /// Comparison operators take a single scalar.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Gt | Self::Ge | Self::Lt | Self::Le
        )
    }

    /// Membership operators take a list of scalars.
    pub fn is_membership(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    /// Logical operators combine nested conditions.
    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    /// Whether an ordering satisfies this comparison operator.
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            _ => false,
        }
    }
}

/// Untyped operand for [`Condition::new`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
    Conditions(Vec<Condition>),
}

/// Filter expression over scalar metadata fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `key op value` for Eq, Ne, Gt, Ge, Lt, Le.
    Compare {
        key: String,
        op: Operator,
        value: Scalar,
    },
    /// `key In / NotIn values`.
    Membership {
        key: String,
        op: Operator,
        values: Vec<Scalar>,
    },
    /// And / Or over nested conditions.
    Logical {
        op: Operator,
        operands: Vec<Condition>,
    },
}

impl Condition {
    /// Build a condition from an operator and an untyped operand.
    ///
    /// The operand shape must match the operator: a scalar for comparisons,
    /// a list for In / NotIn, nested conditions for And / Or. The key is
    /// ignored for logical operators.
    pub fn new(key: impl Into<String>, op: Operator, value: ConditionValue) -> Result<Self> {
        match value {
            ConditionValue::Scalar(value) if op.is_comparison() => Ok(Self::Compare {
                key: key.into(),
                op,
                value,
            }),
            ConditionValue::List(values) if op.is_membership() => Ok(Self::Membership {
                key: key.into(),
                op,
                values,
            }),
            ConditionValue::Conditions(operands) if op.is_logical() => {
                Ok(Self::Logical { op, operands })
            }
            value => Err(RagError::unsupported_condition(format!(
                "operator {:?} does not accept {:?}",
                op, value
            ))),
        }
    }

    pub fn eq(key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::compare(key, Operator::Eq, value)
    }

    pub fn ne(key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::compare(key, Operator::Ne, value)
    }

    pub fn gt(key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::compare(key, Operator::Gt, value)
    }

    pub fn ge(key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::compare(key, Operator::Ge, value)
    }

    pub fn lt(key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::compare(key, Operator::Lt, value)
    }

    pub fn le(key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::compare(key, Operator::Le, value)
    }

    pub fn is_in<V: Into<Scalar>>(
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::Membership {
            key: key.into(),
            op: Operator::In,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn not_in<V: Into<Scalar>>(
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::Membership {
            key: key.into(),
            op: Operator::NotIn,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and(operands: impl IntoIterator<Item = Condition>) -> Self {
        Self::Logical {
            op: Operator::And,
            operands: operands.into_iter().collect(),
        }
    }

    pub fn or(operands: impl IntoIterator<Item = Condition>) -> Self {
        Self::Logical {
            op: Operator::Or,
            operands: operands.into_iter().collect(),
        }
    }

    fn compare(key: impl Into<String>, op: Operator, value: impl Into<Scalar>) -> Self {
        Self::Compare {
            key: key.into(),
            op,
            value: value.into(),
        }
    }

    /// The top-level operator.
    pub fn op(&self) -> Operator {
        match self {
            Self::Compare { op, .. } | Self::Membership { op, .. } | Self::Logical { op, .. } => {
                *op
            }
        }
    }

    /// Check that every node pairs its operator with the right operand shape.
    ///
    /// Conditions built through the typed constructors are always valid;
    /// hand-assembled enum values may not be.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Compare { op, .. } if op.is_comparison() => Ok(()),
            Self::Membership { op, .. } if op.is_membership() => Ok(()),
            Self::Logical { op, operands } if op.is_logical() => {
                operands.iter().try_for_each(Condition::validate)
            }
            other => Err(RagError::unsupported_condition(format!(
                "operator {:?} used with the wrong operand shape",
                other.op()
            ))),
        }
    }
}

/// Translates a [`Condition`] into a backend's native filter.
///
/// One adapter exists per backend.
pub trait FilterAdapter {
    /// The backend-native filter representation.
    type Filter;

    /// Translate the condition.
    fn to_filter(&self, condition: &Condition) -> Result<Self::Filter>;
}
