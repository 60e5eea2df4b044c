//! Condition adapters for the reference backends.
//!
//! Both adapters share one semantics: a missing field never matches,
//! numbers and bools compare numerically, strings compare
//! lexicographically and a string never matches a number.

use rusqlite::types::Value;

use ragkit_core::{Condition, FilterAdapter, Metadata, Operator, RagError, Result, Scalar};

/// A parameterized SQL boolean expression over a `metadata` JSON column.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlWhere {
    /// Expression using positional `?` placeholders.
    pub clause: String,

    /// Parameters in placeholder order.
    pub params: Vec<Value>,
}

/// Translates conditions into SQLite JSON1 expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlFilter;

const NUMERIC_TYPES: &str = "('integer', 'real', 'true', 'false')";

fn json_path(key: &str) -> Result<String> {
    if key.is_empty() || key.contains('"') {
        return Err(RagError::unsupported_condition(format!(
            "invalid metadata key: {:?}",
            key
        )));
    }
    Ok(format!("$.\"{}\"", key))
}

fn sql_value(value: &Scalar) -> Value {
    match value {
        Scalar::Bool(b) => Value::Integer(i64::from(*b)),
        Scalar::Int(i) => Value::Integer(*i),
        Scalar::Float(f) => Value::Real(*f),
        Scalar::Str(s) => Value::Text(s.clone()),
    }
}

fn sql_operator(op: Operator) -> Result<&'static str> {
    Ok(match op {
        Operator::Eq => "=",
        Operator::Ne => "!=",
        Operator::Gt => ">",
        Operator::Ge => ">=",
        Operator::Lt => "<",
        Operator::Le => "<=",
        other => {
            return Err(RagError::unsupported_condition(format!(
                "{:?} is not a comparison",
                other
            )))
        }
    })
}

impl SqlFilter {
    /// Type-guarded comparison, so `'a' > 1` never matches.
    fn compare(key: &str, op: Operator, value: &Scalar, params: &mut Vec<Value>) -> Result<String> {
        let path = json_path(key)?;
        let types = match value {
            Scalar::Str(_) => "('text')",
            _ => NUMERIC_TYPES,
        };
        params.push(Value::Text(path.clone()));
        params.push(Value::Text(path));
        params.push(sql_value(value));
        Ok(format!(
            "(json_type(metadata, ?) IN {} AND json_extract(metadata, ?) {} ?)",
            types,
            sql_operator(op)?
        ))
    }

    fn build(condition: &Condition, params: &mut Vec<Value>) -> Result<String> {
        match condition {
            Condition::Compare { key, op, value } if op.is_comparison() => {
                Self::compare(key, *op, value, params)
            }
            Condition::Membership { key, op, values } if op.is_membership() => {
                if values.is_empty() {
                    return Ok(if *op == Operator::In { "0" } else { "1" }.to_string());
                }
                // Placeholders bind left to right: the presence guard comes first
                if *op == Operator::NotIn {
                    params.push(Value::Text(json_path(key)?));
                }
                let alternatives = values
                    .iter()
                    .map(|value| Self::compare(key, Operator::Eq, value, params))
                    .collect::<Result<Vec<_>>>()?;
                let any = format!("({})", alternatives.join(" OR "));

                if *op == Operator::In {
                    Ok(any)
                } else {
                    Ok(format!("(json_type(metadata, ?) IS NOT NULL AND NOT {})", any))
                }
            }
            Condition::Logical { op, operands } if op.is_logical() => {
                let (joiner, empty) = if *op == Operator::And {
                    (" AND ", "1")
                } else {
                    (" OR ", "0")
                };
                if operands.is_empty() {
                    return Ok(empty.to_string());
                }
                let parts = operands
                    .iter()
                    .map(|operand| Self::build(operand, params))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("({})", parts.join(joiner)))
            }
            other => {
                other.validate()?;
                Err(RagError::internal("unreachable condition shape"))
            }
        }
    }
}

impl FilterAdapter for SqlFilter {
    type Filter = SqlWhere;

    fn to_filter(&self, condition: &Condition) -> Result<SqlWhere> {
        let mut params = Vec::new();
        let clause = Self::build(condition, &mut params)?;
        Ok(SqlWhere { clause, params })
    }
}

/// An in-process evaluator over a row's scalar metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    condition: Condition,
}

impl Predicate {
    /// Whether a row with this metadata satisfies the condition.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        Self::eval(&self.condition, metadata)
    }

    fn eval(condition: &Condition, metadata: &Metadata) -> bool {
        match condition {
            Condition::Compare { key, op, value } => metadata
                .get(key)
                .and_then(|field| field.compare(value))
                .map_or(false, |ordering| op.accepts(ordering)),
            Condition::Membership { key, op, values } => {
                let Some(field) = metadata.get(key) else {
                    return *op == Operator::NotIn && values.is_empty();
                };
                let found = values
                    .iter()
                    .any(|value| field.compare(value) == Some(std::cmp::Ordering::Equal));
                if *op == Operator::In {
                    found
                } else {
                    !found
                }
            }
            Condition::Logical { op, operands } => {
                if *op == Operator::And {
                    operands.iter().all(|operand| Self::eval(operand, metadata))
                } else {
                    operands.iter().any(|operand| Self::eval(operand, metadata))
                }
            }
        }
    }
}

/// Translates conditions into [`Predicate`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredicateFilter;

impl FilterAdapter for PredicateFilter {
    type Filter = Predicate;

    fn to_filter(&self, condition: &Condition) -> Result<Predicate> {
        condition.validate()?;
        Ok(Predicate {
            condition: condition.clone(),
        })
    }
}
