//! Backend-neutral query description.
//!
//! The memory store evaluates an [`Expr`] against a record document, the
//! postgres store translates it into a sea-query condition.

use std::{cmp::Ordering, collections::HashMap};

use serde_json::Value;

/// Default page size.
pub const DEFAULT_LIMIT: usize = 100;
/// Page size meaning "every record".
pub const UNLIMITED: usize = i64::MAX as usize;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Eq(String, Value),
    Le(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    pub fn eq<V: Into<Value>>(
        key: &str,
        value: V,
    ) -> Self {
        Expr::Eq(key.to_string(), value.into())
    }

    pub fn le<V: Into<Value>>(
        key: &str,
        value: V,
    ) -> Self {
        Expr::Le(key.to_string(), value.into())
    }

    pub fn is_in<V: Into<Value>>(
        key: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Expr::In(key.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(key: &str) -> Self {
        Expr::IsNull(key.to_string())
    }

    pub fn and(
        self,
        other: Expr,
    ) -> Self {
        match self {
            Expr::And(mut items) => {
                items.push(other);
                Expr::And(items)
            }
            expr => Expr::And(vec![expr, other]),
        }
    }

    pub fn or(
        self,
        other: Expr,
    ) -> Self {
        match self {
            Expr::Or(mut items) => {
                items.push(other);
                Expr::Or(items)
            }
            expr => Expr::Or(vec![expr, other]),
        }
    }

    /// Evaluate against a record document. Comparisons with a missing or null field are false.
    pub fn matches(
        &self,
        doc: &HashMap<String, Value>,
    ) -> bool {
        let field = |key: &String| doc.get(key).filter(|v| !v.is_null());
        match self {
            Expr::Eq(key, value) => field(key).is_some_and(|v| compare(v, value) == Some(Ordering::Equal)),
            Expr::Le(key, value) => field(key).is_some_and(|v| matches!(compare(v, value), Some(Ordering::Less | Ordering::Equal))),
            Expr::In(key, values) => field(key).is_some_and(|v| values.iter().any(|value| compare(v, value) == Some(Ordering::Equal))),
            Expr::IsNull(key) => field(key).is_none(),
            Expr::And(items) => items.iter().all(|e| e.matches(doc)),
            Expr::Or(items) => items.iter().any(|e| e.matches(doc)),
        }
    }
}

/// Order two JSON scalars of the same kind.
pub fn compare(
    a: &Value,
    b: &Value,
) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64().zip(y.as_f64()).and_then(|(x, y)| x.partial_cmp(&y)),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Query {
    filter: Option<Expr>,
    limit: usize,
    order_by: Vec<(String, bool)>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    pub fn new() -> Self {
        Self {
            filter: None,
            limit: DEFAULT_LIMIT,
            order_by: Vec::new(),
        }
    }

    pub fn filter(
        mut self,
        expr: Expr,
    ) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(current) => current.and(expr),
            None => expr,
        });
        self
    }

    pub fn set_limit(
        mut self,
        limit: usize,
    ) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Add a sort key; `rev` sorts descending.
    pub fn push_order(
        mut self,
        key: &str,
        rev: bool,
    ) -> Self {
        self.order_by.push((key.to_string(), rev));
        self
    }

    pub fn filter_expr(&self) -> Option<&Expr> {
        self.filter.as_ref()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn order_by(&self) -> &Vec<(String, bool)> {
        &self.order_by
    }

    pub fn is_match(
        &self,
        doc: &HashMap<String, Value>,
    ) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(doc))
    }
}
