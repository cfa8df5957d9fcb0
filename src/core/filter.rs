//! Query evaluation over in-memory records
//!
//! Adapters that cannot push a query down to their backend (the file and
//! in-memory adapters) load candidate records and run them through
//! [`Query::apply`]: filter, then sort, then skip/limit, then project.

use crate::core::query::{Condition, Filter, Operator, Query, SortDirection, SortKey};
use crate::core::record::{Fields, ID_FIELD};
use serde_json::Value;
use std::cmp::Ordering;

impl Filter {
    /// Decide whether `record` satisfies this node
    pub fn matches(&self, record: &Fields) -> bool {
        match self {
            Filter::Field { field, condition } => condition.holds(record.get(field)),
            Filter::And(children) => children.iter().all(|child| child.matches(record)),
            Filter::Or(children) => children.iter().any(|child| child.matches(record)),
        }
    }
}

impl Condition {
    /// `actual` is `None` when the record lacks the field
    pub fn holds(&self, actual: Option<&Value>) -> bool {
        match self {
            Condition::Equals(expected) => actual.is_some_and(|a| values_equal(a, expected)),
            Condition::Operators(ops) => ops.iter().all(|op| op.holds(actual)),
        }
    }
}

impl Operator {
    /// A missing field never equals anything, so `$ne`/`$nin` hold and every
    /// other operator fails.
    pub fn holds(&self, actual: Option<&Value>) -> bool {
        let Some(actual) = actual else {
            return matches!(self, Operator::Ne(_) | Operator::Nin(_));
        };

        match self {
            Operator::Ne(expected) => !values_equal(actual, expected),
            Operator::In(values) => values.iter().any(|v| values_equal(actual, v)),
            Operator::Nin(values) => !values.iter().any(|v| values_equal(actual, v)),
            Operator::Lt(bound) => compare_values(actual, bound) == Some(Ordering::Less),
            Operator::Lte(bound) => matches!(
                compare_values(actual, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Gt(bound) => compare_values(actual, bound) == Some(Ordering::Greater),
            Operator::Gte(bound) => matches!(
                compare_values(actual, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Search(needle) => actual
                .as_str()
                .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
        }
    }
}

impl Query {
    /// Decide whether `record` passes every filter of this query
    pub fn matches(&self, record: &Fields) -> bool {
        self.conditions.iter().all(|filter| filter.matches(record))
    }

    /// Filter, sort, paginate and project `records`
    ///
    /// `records` must be in storage enumeration order; ties in the sort keep
    /// that order.
    pub fn apply(&self, mut records: Vec<Fields>) -> Vec<Fields> {
        records.retain(|record| self.matches(record));

        if !self.sort.is_empty() {
            // `sort_by` is stable
            records.sort_by(|a, b| compare_records(a, b, &self.sort));
        }

        let page = records.into_iter().skip(self.skip.unwrap_or(0));
        let page: Vec<Fields> = match self.limit {
            Some(limit) => page.take(limit).collect(),
            None => page.collect(),
        };

        match &self.select {
            Some(select) => page.into_iter().map(|r| project(r, select)).collect(),
            None => page,
        }
    }
}

/// Apply an optional query; `None` returns every record untouched
pub fn apply_query(records: Vec<Fields>, query: Option<&Query>) -> Vec<Fields> {
    match query {
        Some(query) => query.apply(records),
        None => records,
    }
}

/// Keep `id` plus the selected fields that are present
pub fn project(mut record: Fields, select: &[String]) -> Fields {
    let mut projected = Fields::new();
    if let Some(id) = record.remove(ID_FIELD) {
        projected.insert(ID_FIELD.to_string(), id);
    }
    for field in select {
        if let Some(value) = record.remove(field) {
            projected.insert(field.clone(), value);
        }
    }
    projected
}

/// Strict equality, except that numbers compare by numeric value
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// Ordering for `$lt`/`$lte`/`$gt`/`$gte`
///
/// Numbers compare numerically, strings lexicographically and booleans with
/// `false < true`. Any other pairing is unordered.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order used by `$sort`: missing/null < numbers < strings < objects <
/// arrays < booleans, then by value within a type.
fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let by_rank = type_rank(a).cmp(&type_rank(b));
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    match (a, b) {
        (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

fn compare_records(a: &Fields, b: &Fields, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering = sort_order(a.get(&key.field), b.get(&key.field));
        let ordering = match key.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
