//! Untrusted draft plans.
//!
//! The external plan-drafting call returns JSON it promises matches the plan
//! contract. That promise is never trusted: the payload is deserialized into
//! `DraftPlan` (strings where the canonical plan has closed enums, unknown
//! fields rejected) and then explicitly coerced field by field. A draft that
//! names an operator or aggregation outside the contract fails coercion with
//! a typed error instead of leaking into validation.

use serde::Deserialize;
use thiserror::Error;

use super::{
    Aggregation, CanonicalPlan, Filter, FilterOp, FilterValue, Metric, OrderBy, SortDir,
};

/// Error coercing a draft into a canonical plan.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DraftError {
    #[error("draft is not valid plan JSON: {0}")]
    Malformed(String),

    #[error("draft names unknown aggregation '{0}'")]
    UnknownAggregation(String),

    #[error("draft names unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("draft names unknown sort direction '{0}'")]
    UnknownSortDir(String),

    #[error("filter value for '{column}' has no SQL binding")]
    UnbindableValue { column: String },

    #[error("draft has no fact_table")]
    MissingFactTable,
}

/// The open wire shape of a drafted plan.
///
/// Field names follow the plan contract; everything enum-like is a plain
/// string here so a bad draft produces a coercion error, not a serde panic
/// deep inside a pipeline stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DraftPlan {
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub fact_table: String,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<DraftMetric>,
    #[serde(default)]
    pub filters: Vec<DraftFilter>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<DraftOrderBy>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DraftMetric {
    pub column: String,
    #[serde(default)]
    pub agg: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DraftFilter {
    pub column: String,
    pub op: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DraftOrderBy {
    pub column: String,
    #[serde(default)]
    pub dir: Option<String>,
}

impl DraftPlan {
    /// Parse a raw JSON payload into a draft.
    pub fn from_json(raw: &str) -> Result<Self, DraftError> {
        serde_json::from_str(raw).map_err(|e| DraftError::Malformed(e.to_string()))
    }

    /// Coerce this draft into a canonical plan.
    ///
    /// `default_limit` fills a missing limit. No clamping happens here: an
    /// oversized limit is the validator's business, not the builder's.
    pub fn coerce(self, default_limit: i64) -> Result<CanonicalPlan, DraftError> {
        if self.fact_table.trim().is_empty() {
            return Err(DraftError::MissingFactTable);
        }

        let mut metrics = Vec::with_capacity(self.metrics.len());
        for m in self.metrics {
            let aggregation = match &m.agg {
                Some(raw) => Aggregation::parse(raw)
                    .ok_or_else(|| DraftError::UnknownAggregation(raw.clone()))?,
                None => Aggregation::Sum,
            };
            metrics.push(Metric {
                column: m.column,
                aggregation,
                alias: m.alias,
            });
        }

        let mut filters = Vec::with_capacity(self.filters.len());
        for f in self.filters {
            let op =
                FilterOp::parse(&f.op).ok_or_else(|| DraftError::UnknownOperator(f.op.clone()))?;
            let value = FilterValue::from_json(&f.value).ok_or(DraftError::UnbindableValue {
                column: f.column.clone(),
            })?;
            filters.push(Filter {
                column: f.column,
                op,
                value,
            });
        }

        let mut order_by = Vec::with_capacity(self.order_by.len());
        for o in self.order_by {
            let dir = match &o.dir {
                Some(raw) => {
                    SortDir::parse(raw).ok_or_else(|| DraftError::UnknownSortDir(raw.clone()))?
                }
                None => SortDir::Asc,
            };
            order_by.push(OrderBy {
                column: o.column,
                dir,
            });
        }

        Ok(CanonicalPlan {
            intent: self.intent,
            fact_table: self.fact_table,
            dimensions: self.dimensions,
            metrics,
            filters,
            group_by: self.group_by,
            order_by,
            limit: self.limit.unwrap_or(default_limit),
        })
    }
}
