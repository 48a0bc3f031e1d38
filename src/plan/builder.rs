//! Plan assembly.
//!
//! The builder shapes structure and nothing else: it turns an intent label
//! plus extracted entities into a canonical plan using a registered
//! template, or coerces an external draft into the canonical shape. It makes
//! no safety decisions - whether the result may run is entirely the
//! validator's call.
//!
//! Determinism: identical inputs produce identical plans. The only notion of
//! "now" is the one passed in explicitly for relative-date resolution.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use thiserror::Error;

use crate::config::SecuritySettings;
use crate::mapping::MappingState;

use super::draft::{DraftError, DraftPlan};
use super::{CanonicalPlan, Filter, FilterOp, FilterValue, Metric, OrderBy};

/// Error assembling a plan.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildError {
    #[error("no plan template registered for intent '{0}'")]
    UnknownIntent(String),

    #[error("no table is mapped as a fact table")]
    NoFactTableMapped,

    #[error(transparent)]
    Draft(#[from] DraftError),
}

/// Relative-date placeholders entities may carry instead of literal dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Today,
    Last7Days,
    Last30Days,
    ThisMonth,
}

impl TimeWindow {
    /// Parse a placeholder token ("LAST_30_DAYS", "THIS_MONTH", ...).
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "TODAY" => Some(TimeWindow::Today),
            "LAST_7_DAYS" => Some(TimeWindow::Last7Days),
            "LAST_30_DAYS" => Some(TimeWindow::Last30Days),
            "THIS_MONTH" => Some(TimeWindow::ThisMonth),
            _ => None,
        }
    }

    /// The inclusive start of the window, resolved against an explicit now.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
            .single()
            .unwrap_or(now);
        match self {
            TimeWindow::Today => midnight,
            TimeWindow::Last7Days => midnight - Duration::days(7),
            TimeWindow::Last30Days => midnight - Duration::days(30),
            TimeWindow::ThisMonth => Utc
                .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
                .single()
                .unwrap_or(midnight),
        }
    }
}

/// Entities extracted from the question by the external classifier.
#[derive(Debug, Clone, Default)]
pub struct Entities {
    /// The caller's tenant id; templates bind it to the mapped tenant column.
    pub tenant: Option<FilterValue>,
    /// The caller's user id; bound only by user-scoped templates.
    pub user: Option<FilterValue>,
    /// Plain column = value equalities.
    pub equals: Vec<(String, FilterValue)>,
    /// A relative date window over a column.
    pub window: Option<(String, TimeWindow)>,
}

/// A registered plan shape for one intent.
#[derive(Debug, Clone, Default)]
pub struct PlanTemplate {
    pub dimensions: Vec<String>,
    pub metrics: Vec<Metric>,
    pub group_by: Vec<String>,
    pub order_by: Vec<OrderBy>,
    /// User-scoped intents additionally bind the configured user column.
    pub user_scoped: bool,
}

/// Assembles canonical plans from intents or drafts.
pub struct PlanBuilder<'a> {
    mappings: &'a MappingState,
    security: &'a SecuritySettings,
    templates: HashMap<String, PlanTemplate>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(mappings: &'a MappingState, security: &'a SecuritySettings) -> Self {
        let mut builder = Self {
            mappings,
            security,
            templates: HashMap::new(),
        };
        builder.register("list_records", PlanTemplate::default());
        builder.register(
            "record_count",
            PlanTemplate {
                metrics: vec![Metric::new("id", crate::plan::Aggregation::Count)
                    .with_alias("record_count")],
                ..PlanTemplate::default()
            },
        );
        builder.register(
            "user_activity",
            PlanTemplate {
                user_scoped: true,
                ..PlanTemplate::default()
            },
        );
        builder
    }

    /// Register (or replace) a template for an intent.
    pub fn register(&mut self, intent: &str, template: PlanTemplate) {
        self.templates.insert(intent.to_string(), template);
    }

    /// Assemble a plan from an intent label and extracted entities.
    ///
    /// The fact table is the best-priority mapped fact. `now` anchors
    /// relative-date entities; passing the same instant reproduces the same
    /// plan bit for bit.
    pub fn build(
        &self,
        intent: &str,
        entities: &Entities,
        now: DateTime<Utc>,
    ) -> Result<CanonicalPlan, BuildError> {
        let template = self
            .templates
            .get(intent)
            .ok_or_else(|| BuildError::UnknownIntent(intent.to_string()))?;

        let fact = self
            .mappings
            .fact_tables()
            .first()
            .map(|t| (t.table.clone(), t.tenant_column.clone()))
            .ok_or(BuildError::NoFactTableMapped)?;
        let (fact_table, tenant_column) = fact;

        let mut filters = Vec::new();
        if let (Some(column), Some(value)) = (tenant_column.as_deref(), entities.tenant.as_ref()) {
            filters.push(Filter::eq(column, value.clone()));
        }
        if template.user_scoped {
            if let Some(user) = entities.user.as_ref() {
                filters.push(Filter::eq(&self.security.user_column, user.clone()));
            }
        }
        for (column, value) in &entities.equals {
            filters.push(Filter::eq(column, value.clone()));
        }
        if let Some((column, window)) = &entities.window {
            filters.push(Filter::new(
                column,
                FilterOp::Gte,
                FilterValue::Text(window.start(now).to_rfc3339()),
            ));
        }

        Ok(CanonicalPlan {
            intent: intent.to_string(),
            fact_table,
            dimensions: template.dimensions.clone(),
            metrics: template.metrics.clone(),
            filters,
            group_by: template.group_by.clone(),
            order_by: template.order_by.clone(),
            limit: self.security.default_limit,
        })
    }

    /// Coerce an untrusted draft into the canonical shape.
    ///
    /// Shape errors are the only failures here; whether the plan refers to
    /// real tables and survives the security checks is the validator's job.
    pub fn from_draft(&self, draft: DraftPlan) -> Result<CanonicalPlan, BuildError> {
        Ok(draft.coerce(self.security.default_limit)?)
    }
}
