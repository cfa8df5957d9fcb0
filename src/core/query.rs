//! Query language: filters plus result-shaping directives
//!
//! A query is a conjunction of [`Filter`] nodes together with the shaping
//! directives `$limit`, `$skip`, `$sort` and `$select`. It can be built in
//! code or parsed from its MongoDB-style JSON form:
//!
//! ```rust,ignore
//! // {"age": {"$gte": 15}, "$or": [{"name": "a"}, {"name": "b"}], "$sort": {"age": -1}, "$limit": 2}
//! let query = Query::new()
//!     .gte("age", 15)
//!     .or(vec![Query::new().eq("name", "a"), Query::new().eq("name", "b")])
//!     .sort_desc("age")
//!     .limit(2);
//! ```
//!
//! Evaluation lives in [`crate::core::filter`]; the flattened URL form lives
//! in [`crate::core::params`].

use crate::core::error::{StoreError, StoreResult};
use crate::core::params;
use crate::core::record::type_name;
use serde_json::{Map, Value};

pub const LIMIT: &str = "$limit";
pub const SKIP: &str = "$skip";
pub const SORT: &str = "$sort";
pub const SELECT: &str = "$select";
pub const OR: &str = "$or";
pub const AND: &str = "$and";

/// A single comparison operator applied to one field
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// `$ne`: the field differs from the value
    Ne(Value),
    /// `$in`: the field equals one of the values
    In(Vec<Value>),
    /// `$nin`: the field equals none of the values
    Nin(Vec<Value>),
    /// `$lt`
    Lt(Value),
    /// `$lte`
    Lte(Value),
    /// `$gt`
    Gt(Value),
    /// `$gte`
    Gte(Value),
    /// `$search`: case-insensitive substring match on string fields
    Search(String),
}

impl Operator {
    /// Parse one `$op: value` entry, `None` for operators outside the vocabulary
    fn parse(name: &str, value: &Value) -> Option<Self> {
        let op = match name {
            "$ne" => Operator::Ne(value.clone()),
            "$in" => Operator::In(as_list(value)),
            "$nin" => Operator::Nin(as_list(value)),
            "$lt" => Operator::Lt(value.clone()),
            "$lte" => Operator::Lte(value.clone()),
            "$gt" => Operator::Gt(value.clone()),
            "$gte" => Operator::Gte(value.clone()),
            "$search" => Operator::Search(match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            _ => return None,
        };
        Some(op)
    }

    /// The `$op` key of this operator
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Ne(_) => "$ne",
            Operator::In(_) => "$in",
            Operator::Nin(_) => "$nin",
            Operator::Lt(_) => "$lt",
            Operator::Lte(_) => "$lte",
            Operator::Gt(_) => "$gt",
            Operator::Gte(_) => "$gte",
            Operator::Search(_) => "$search",
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Operator::Ne(v)
            | Operator::Lt(v)
            | Operator::Lte(v)
            | Operator::Gt(v)
            | Operator::Gte(v) => v.clone(),
            Operator::In(values) | Operator::Nin(values) => Value::Array(values.clone()),
            Operator::Search(s) => Value::String(s.clone()),
        }
    }
}

fn as_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(values) => values.clone(),
        other => vec![other.clone()],
    }
}

/// What a field constraint requires of its field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Strict equality with a literal
    Equals(Value),
    /// Every listed operator must hold
    Operators(Vec<Operator>),
}

impl Condition {
    fn to_value(&self) -> Value {
        match self {
            Condition::Equals(v) => v.clone(),
            Condition::Operators(ops) => Value::Object(
                ops.iter()
                    .map(|op| (op.name().to_string(), op.to_value()))
                    .collect(),
            ),
        }
    }
}

/// A node of the filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Constraint on a single field
    Field { field: String, condition: Condition },
    /// Every child must match (`$and`, or the implicit top-level conjunction)
    And(Vec<Filter>),
    /// At least one child must match (`$or`)
    Or(Vec<Filter>),
}

impl Filter {
    /// Parse a query object into the conjunction of its field constraints and
    /// combinators. Shaping directives are skipped.
    pub fn parse_object(object: &Map<String, Value>) -> StoreResult<Filter> {
        let mut nodes = Vec::new();

        for (key, value) in object {
            match key.as_str() {
                LIMIT | SKIP | SORT | SELECT => {}
                OR => nodes.push(Filter::Or(parse_group(OR, value)?)),
                AND => nodes.push(Filter::And(parse_group(AND, value)?)),
                other if other.starts_with('$') => {
                    tracing::debug!(directive = other, "ignoring unknown query directive");
                }
                field => nodes.push(Filter::Field {
                    field: field.to_string(),
                    condition: parse_condition(value),
                }),
            }
        }

        Ok(Filter::And(nodes))
    }

    /// Render this node as a standalone query object
    pub fn to_object(&self) -> Map<String, Value> {
        match self {
            Filter::And(children) => conjunction_to_object(children),
            other => conjunction_to_object(std::slice::from_ref(other)),
        }
    }
}

fn parse_group(name: &str, value: &Value) -> StoreResult<Vec<Filter>> {
    let Value::Array(items) = value else {
        return Err(StoreError::invalid_query(format!(
            "{} expects an array, got {}",
            name,
            type_name(value)
        )));
    };

    items
        .iter()
        .map(|item| match item {
            Value::Object(object) => Filter::parse_object(object),
            other => Err(StoreError::invalid_query(format!(
                "{} entries must be objects, got {}",
                name,
                type_name(other)
            ))),
        })
        .collect()
}

/// An object made only of `$` keys is an operator set, anything else a literal
fn parse_condition(value: &Value) -> Condition {
    match value {
        Value::Object(object) if object.keys().all(|k| k.starts_with('$')) => {
            let ops = object
                .iter()
                .filter_map(|(name, operand)| {
                    let op = Operator::parse(name, operand);
                    if op.is_none() {
                        tracing::debug!(operator = %name, "ignoring unknown query operator");
                    }
                    op
                })
                .collect();
            Condition::Operators(ops)
        }
        literal => Condition::Equals(literal.clone()),
    }
}

fn conjunction_to_object(nodes: &[Filter]) -> Map<String, Value> {
    let mut object = Map::new();
    let mut and_list = Vec::new();
    let mut has_or = false;

    for node in nodes {
        match node {
            Filter::Field { field, condition } => {
                if object.contains_key(field) {
                    let mut single = Map::new();
                    single.insert(field.clone(), condition.to_value());
                    and_list.push(Value::Object(single));
                } else {
                    object.insert(field.clone(), condition.to_value());
                }
            }
            Filter::And(children) => {
                and_list.extend(children.iter().map(|c| Value::Object(c.to_object())));
            }
            Filter::Or(children) => {
                let alternatives =
                    Value::Array(children.iter().map(|c| Value::Object(c.to_object())).collect());
                if has_or {
                    let mut single = Map::new();
                    single.insert(OR.to_string(), alternatives);
                    and_list.push(Value::Object(single));
                } else {
                    object.insert(OR.to_string(), alternatives);
                    has_or = true;
                }
            }
        }
    }

    if !and_list.is_empty() {
        object.insert(AND.to_string(), Value::Array(and_list));
    }
    object
}

/// Sort direction of a `$sort` key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn parse(field: &str, value: &Value) -> StoreResult<Self> {
        let direction = match value {
            Value::Number(n) if n.as_f64().is_some_and(|d| d < 0.0) => SortDirection::Descending,
            Value::Number(_) => SortDirection::Ascending,
            Value::String(s) if s.eq_ignore_ascii_case("desc") => SortDirection::Descending,
            Value::String(s) if s.eq_ignore_ascii_case("asc") => SortDirection::Ascending,
            other => {
                return Err(StoreError::invalid_query(format!(
                    "$sort direction for '{}' must be 1 or -1, got {}",
                    field, other
                )));
            }
        };
        Ok(direction)
    }

    /// `1` or `-1`
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

/// One `$sort` entry
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Filters and shaping directives applied by `list`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Implicitly AND-ed filter nodes
    pub conditions: Vec<Filter>,
    /// Sort keys in declaration order
    pub sort: Vec<SortKey>,
    /// Number of records to skip after sorting
    pub skip: Option<usize>,
    /// Maximum number of records returned
    pub limit: Option<usize>,
    /// Field allow-list; `id` is always kept
    pub select: Option<Vec<String>>,
}

impl Query {
    /// An empty query: every record, no shaping
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the MongoDB-style JSON form
    ///
    /// `null` parses to the empty query. Unknown operators are ignored;
    /// structurally malformed directives are rejected.
    pub fn from_value(value: &Value) -> StoreResult<Self> {
        let object = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => {
                return Err(StoreError::invalid_query(format!(
                    "query must be an object, got {}",
                    type_name(other)
                )));
            }
        };

        let Filter::And(conditions) = Filter::parse_object(object)? else {
            return Err(StoreError::Internal(
                "query object did not parse to a conjunction".to_string(),
            ));
        };

        let mut query = Query {
            conditions,
            ..Default::default()
        };

        if let Some(value) = object.get(LIMIT) {
            query.limit = Some(parse_count(LIMIT, value)?);
        }
        if let Some(value) = object.get(SKIP) {
            query.skip = Some(parse_count(SKIP, value)?);
        }
        if let Some(value) = object.get(SORT) {
            query.sort = parse_sort(value)?;
        }
        if let Some(value) = object.get(SELECT) {
            query.select = Some(parse_select(value)?);
        }

        Ok(query)
    }

    /// Render the MongoDB-style JSON form
    pub fn to_value(&self) -> Value {
        let mut object = conjunction_to_object(&self.conditions);

        if let Some(limit) = self.limit {
            object.insert(LIMIT.to_string(), Value::from(limit));
        }
        if let Some(skip) = self.skip {
            object.insert(SKIP.to_string(), Value::from(skip));
        }
        if !self.sort.is_empty() {
            let sort = self
                .sort
                .iter()
                .map(|key| (key.field.clone(), Value::from(key.direction.as_i32())))
                .collect();
            object.insert(SORT.to_string(), Value::Object(sort));
        }
        if let Some(select) = &self.select {
            object.insert(
                SELECT.to_string(),
                Value::Array(select.iter().cloned().map(Value::String).collect()),
            );
        }

        Value::Object(object)
    }

    /// Flatten into URL query pairs (`age[$gte]=15`, `$sort[age]=-1`, ...)
    pub fn to_params(&self) -> Vec<(String, String)> {
        params::flatten(&self.to_value())
    }

    /// Parse flattened URL query pairs back into a query
    pub fn from_params<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> StoreResult<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::from_value(&params::unflatten(pairs))
    }

    /// Whether the query filters, sorts, pages or projects anything
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
            && self.sort.is_empty()
            && self.skip.is_none()
            && self.limit.is_none()
            && self.select.is_none()
    }

    // === Builder ===

    fn field(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.conditions.push(Filter::Field {
            field: field.into(),
            condition,
        });
        self
    }

    fn op(self, field: impl Into<String>, op: Operator) -> Self {
        self.field(field, Condition::Operators(vec![op]))
    }

    /// Require `field == value`
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field(field, Condition::Equals(value.into()))
    }

    /// `$ne`
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Ne(value.into()))
    }

    /// `$in`
    pub fn is_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.op(field, Operator::In(values.into_iter().map(Into::into).collect()))
    }

    /// `$nin`
    pub fn not_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.op(field, Operator::Nin(values.into_iter().map(Into::into).collect()))
    }

    /// `$lt`
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Lt(value.into()))
    }

    /// `$lte`
    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Lte(value.into()))
    }

    /// `$gt`
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Gt(value.into()))
    }

    /// `$gte`
    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Gte(value.into()))
    }

    /// `$search`
    pub fn search(self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.op(field, Operator::Search(needle.into()))
    }

    /// `$or` over the filters of `alternatives` (their shaping is ignored)
    pub fn or(mut self, alternatives: Vec<Query>) -> Self {
        self.conditions.push(Filter::Or(
            alternatives
                .into_iter()
                .map(|q| Filter::And(q.conditions))
                .collect(),
        ));
        self
    }

    /// `$and` over the filters of `groups` (their shaping is ignored)
    pub fn and(mut self, groups: Vec<Query>) -> Self {
        self.conditions.push(Filter::And(
            groups.into_iter().map(|q| Filter::And(q.conditions)).collect(),
        ));
        self
    }

    /// Append an ascending sort key
    pub fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            direction: SortDirection::Ascending,
        });
        self
    }

    /// Append a descending sort key
    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            direction: SortDirection::Descending,
        });
        self
    }

    /// `$skip`
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// `$limit`
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// `$select`
    pub fn select<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

fn parse_count(name: &str, value: &Value) -> StoreResult<usize> {
    let count = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    count
        .and_then(|c| usize::try_from(c).ok())
        .ok_or_else(|| {
            StoreError::invalid_query(format!(
                "{} must be a non-negative integer, got {}",
                name, value
            ))
        })
}

fn parse_sort(value: &Value) -> StoreResult<Vec<SortKey>> {
    let Value::Object(object) = value else {
        return Err(StoreError::invalid_query(format!(
            "$sort expects an object, got {}",
            type_name(value)
        )));
    };

    object
        .iter()
        .map(|(field, direction)| {
            Ok(SortKey {
                field: field.clone(),
                direction: SortDirection::parse(field, direction)?,
            })
        })
        .collect()
}

fn parse_select(value: &Value) -> StoreResult<Vec<String>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(StoreError::invalid_query(format!(
                    "$select entries must be strings, got {}",
                    type_name(other)
                ))),
            })
            .collect(),
        Value::String(s) => Ok(vec![s.clone()]),
        other => Err(StoreError::invalid_query(format!(
            "$select expects an array of field names, got {}",
            type_name(other)
        ))),
    }
}
