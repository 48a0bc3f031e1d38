//! The canonical query plan - the only input the compiler trusts.
//!
//! A `CanonicalPlan` is the closed, structured representation of a query
//! intent. Draft payloads arriving from an external text-generation call are
//! coerced into this shape by [`builder::PlanBuilder`]; nothing open-ended
//! survives the coercion. Every enum here is closed on purpose: an operator
//! or aggregation outside the listed variants cannot be represented at all.

pub mod builder;
pub mod draft;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Allowed aggregation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregation {
    /// SQL function name for this aggregation.
    pub fn sql_name(&self) -> &'static str {
        match self {
            Aggregation::Count => "COUNT",
            Aggregation::Sum => "SUM",
            Aggregation::Avg => "AVG",
            Aggregation::Min => "MIN",
            Aggregation::Max => "MAX",
        }
    }

    /// Lowercase wire name, used for default metric aliases.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Aggregation::Count => "count",
            Aggregation::Sum => "sum",
            Aggregation::Avg => "avg",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
        }
    }

    /// Parse a wire name ("sum", "count", ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "count" => Some(Aggregation::Count),
            "sum" => Some(Aggregation::Sum),
            "avg" => Some(Aggregation::Avg),
            "min" => Some(Aggregation::Min),
            "max" => Some(Aggregation::Max),
            _ => None,
        }
    }

    /// Whether the aggregation only makes sense over numeric columns.
    pub fn requires_numeric(&self) -> bool {
        matches!(self, Aggregation::Sum | Aggregation::Avg)
    }
}

/// Comparison operators permitted in plan filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "between")]
    Between,
    #[serde(rename = "like")]
    Like,
}

impl FilterOp {
    /// Parse a wire operator ("=", "!=", "in", ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "=" => Some(FilterOp::Eq),
            "!=" | "<>" => Some(FilterOp::Ne),
            ">" => Some(FilterOp::Gt),
            "<" => Some(FilterOp::Lt),
            ">=" => Some(FilterOp::Gte),
            "<=" => Some(FilterOp::Lte),
            "in" => Some(FilterOp::In),
            "between" => Some(FilterOp::Between),
            "like" => Some(FilterOp::Like),
            _ => None,
        }
    }
}

/// A filter value. Scalar values bind as a single parameter; lists bind as
/// one parameter per element (for `in` and `between`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Convert an untrusted JSON value into a filter value.
    ///
    /// Objects are rejected: there is no SQL binding for them.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(FilterValue::Null),
            serde_json::Value::Bool(b) => Some(FilterValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(FilterValue::Int(i))
                } else {
                    n.as_f64().map(FilterValue::Float)
                }
            }
            serde_json::Value::String(s) => Some(FilterValue::Text(s.clone())),
            serde_json::Value::Array(items) => {
                let converted: Option<Vec<_>> = items.iter().map(Self::from_json).collect();
                Some(FilterValue::List(converted?))
            }
            serde_json::Value::Object(_) => None,
        }
    }

    /// Whether this value binds exactly one scalar parameter.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FilterValue::List(_))
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Null => write!(f, "null"),
            FilterValue::Bool(b) => write!(f, "{}", b),
            FilterValue::Int(i) => write!(f, "{}", i),
            FilterValue::Float(x) => write!(f, "{}", x),
            FilterValue::Text(s) => write!(f, "{}", s),
            FilterValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// An aggregated metric in the SELECT list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub column: String,
    #[serde(rename = "agg")]
    pub aggregation: Aggregation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Metric {
    pub fn new(column: &str, aggregation: Aggregation) -> Self {
        Self {
            column: column.into(),
            aggregation,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The output alias: explicit if given, `<agg>_<column>` otherwise.
    pub fn output_alias(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => format!("{}_{}", self.aggregation.wire_name(), self.column),
        }
    }
}

/// A single WHERE predicate. The value always becomes a bound parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(column: &str, op: FilterOp, value: FilterValue) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }

    /// A plain `column = value` equality filter.
    pub fn eq(column: &str, value: FilterValue) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(SortDir::Asc),
            "desc" => Some(SortDir::Desc),
            _ => None,
        }
    }
}

/// An ORDER BY entry. The column must resolve to a selected column or a
/// metric alias; anything else is dropped at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub dir: SortDir,
}

impl OrderBy {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.into(),
            dir: SortDir::Asc,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.into(),
            dir: SortDir::Desc,
        }
    }
}

/// The canonical query plan.
///
/// `fact_table` anchors the query; `dimensions` are lookup tables reached
/// via approved joins; `metrics` aggregate fact columns; `filters` become
/// bound parameters. Plans are created and consumed within a single pipeline
/// run and never persisted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPlan {
    #[serde(default)]
    pub intent: String,
    pub fact_table: String,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    pub limit: i64,
}

impl CanonicalPlan {
    /// Every table the plan references, fact first.
    pub fn referenced_tables(&self) -> Vec<&str> {
        let mut tables = Vec::with_capacity(1 + self.dimensions.len());
        tables.push(self.fact_table.as_str());
        for dim in &self.dimensions {
            tables.push(dim.as_str());
        }
        tables
    }

    /// Find a filter that binds the given column to a single value with `=`.
    pub fn single_value_filter(&self, column: &str) -> Option<&Filter> {
        self.filters
            .iter()
            .find(|f| f.column == column && f.op == FilterOp::Eq && f.value.is_scalar())
    }
}
