//! Deterministic lowering of a validated plan to parameterized SQL.
//!
//! The compiler is a pure function: identical inputs always produce
//! byte-identical SQL text and identically-ordered parameters. That property
//! backs audit comparison and caching, so nothing here may consult a clock,
//! randomness or ambient state.
//!
//! Structural injection safety: every identifier in the output is drawn from
//! the validated snapshot or from the fixed alias generator, and every
//! user-supplied value becomes a named bind parameter. User text can become
//! a parameter value, never an identifier.
//!
//! The orchestrator guarantees validation precedes compilation. A plan that
//! fails to resolve here is therefore a bug, reported as `CompileError` and
//! never surfaced as a user mistake.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::SchemaSnapshot;
use crate::plan::{CanonicalPlan, FilterOp, FilterValue, SortDir};
use crate::semantic::resolve::JoinStep;

use super::dialect::Dialect;
use super::token::{Token, TokenStream};

/// Internal compilation failure. Not a user-facing validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("column '{0}' does not resolve to any plan table")]
    UnresolvedColumn(String),

    #[error("table '{0}' is missing from the schema snapshot")]
    UnresolvedTable(String),

    #[error("join path references table '{0}' with no assigned alias")]
    UnassignedAlias(String),

    #[error("filter on '{column}' has a value shape the operator cannot bind")]
    UnbindableFilter { column: String },

    #[error("plan has a non-positive limit after clamping")]
    BadLimit,
}

/// One ordered bind parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub value: FilterValue,
}

/// The immutable product of a successful compile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Param>,
    pub audit_id: Uuid,
}

/// Lowers validated plans into SQL for one dialect.
pub struct SqlCompiler<'a> {
    snapshot: &'a SchemaSnapshot,
    dialect: Dialect,
    max_limit: i64,
}

impl<'a> SqlCompiler<'a> {
    pub fn new(snapshot: &'a SchemaSnapshot, dialect: Dialect, max_limit: i64) -> Self {
        Self {
            snapshot,
            dialect,
            max_limit,
        }
    }

    /// Compile a validated plan and its resolved join tree.
    ///
    /// `audit_id` is threaded through rather than generated so the function
    /// stays pure; the orchestrator owns id generation.
    pub fn compile(
        &self,
        plan: &CanonicalPlan,
        join_tree: &[JoinStep],
        audit_id: Uuid,
    ) -> Result<CompiledQuery, CompileError> {
        let aliases = self.assign_aliases(plan, join_tree);
        let grouped = self.grouping_columns(plan, join_tree);

        let mut params: Vec<Param> = Vec::new();
        let mut ts = TokenStream::new();

        ts.push(Token::Select);

        let effective_limit = plan.limit.min(self.max_limit);
        if effective_limit <= 0 {
            return Err(CompileError::BadLimit);
        }
        if self.dialect.uses_top() {
            ts.space()
                .push(Token::Top)
                .space()
                .push(Token::LitInt(effective_limit));
        }

        // SELECT list: grouped columns first, then aggregated metrics, both
        // in plan order. A plan with neither degrades to a row count.
        let mut select_items = 0usize;
        for (owner, column) in &grouped {
            let alias = aliases
                .get(owner.as_str())
                .ok_or_else(|| CompileError::UnassignedAlias(owner.clone()))?;
            if select_items > 0 {
                ts.comma();
            }
            ts.space()
                .qualified(alias, column)
                .space()
                .push(Token::As)
                .space()
                .push(Token::Ident(column.clone()));
            select_items += 1;
        }

        for metric in &plan.metrics {
            let owner = self.column_owner(plan, &metric.column)?;
            let alias = aliases
                .get(owner)
                .ok_or_else(|| CompileError::UnassignedAlias(owner.to_string()))?;
            if select_items > 0 {
                ts.comma();
            }
            ts.space()
                .push(Token::FunctionName(metric.aggregation.sql_name().into()))
                .push(Token::LParen);
            ts.qualified(alias, &metric.column).push(Token::RParen);
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(metric.output_alias()));
            select_items += 1;
        }

        if select_items == 0 {
            ts.space()
                .push(Token::FunctionName("count".into()))
                .push(Token::LParen)
                .push(Token::Star)
                .push(Token::RParen)
                .space()
                .push(Token::As)
                .space()
                .push(Token::Ident("row_count".into()));
        }

        // FROM the fact table.
        if self.snapshot.table(&plan.fact_table).is_none() {
            return Err(CompileError::UnresolvedTable(plan.fact_table.clone()));
        }
        ts.space()
            .push(Token::From)
            .space()
            .push(Token::Ident(plan.fact_table.clone()))
            .space()
            .push(Token::TableAlias("f".into()));

        // JOIN clauses in resolved path order.
        for step in join_tree {
            let left_alias = aliases
                .get(step.left_table.as_str())
                .ok_or_else(|| CompileError::UnassignedAlias(step.left_table.clone()))?;
            let right_alias = aliases
                .get(step.right_table.as_str())
                .ok_or_else(|| CompileError::UnassignedAlias(step.right_table.clone()))?;
            if self.snapshot.table(&step.right_table).is_none() {
                return Err(CompileError::UnresolvedTable(step.right_table.clone()));
            }
            ts.space()
                .push(Token::Left)
                .space()
                .push(Token::Join)
                .space()
                .push(Token::Ident(step.right_table.clone()))
                .space()
                .push(Token::TableAlias(right_alias.clone()))
                .space()
                .push(Token::On)
                .space();
            ts.qualified(left_alias, &step.left_column)
                .space()
                .push(Token::Eq)
                .space();
            ts.qualified(right_alias, &step.right_column);
        }

        // WHERE: all plan filters AND-joined, values as bind parameters.
        for (i, filter) in plan.filters.iter().enumerate() {
            let owner = self.column_owner(plan, &filter.column)?;
            let alias = aliases
                .get(owner)
                .ok_or_else(|| CompileError::UnassignedAlias(owner.to_string()))?;
            ts.space()
                .push(if i == 0 { Token::Where } else { Token::And })
                .space();
            ts.qualified(alias, &filter.column);
            self.emit_predicate(&mut ts, &mut params, i, filter.op, &filter.value, &filter.column)?;
        }

        // GROUP BY mirrors the grouped columns.
        for (i, (owner, column)) in grouped.iter().enumerate() {
            let alias = aliases
                .get(owner.as_str())
                .ok_or_else(|| CompileError::UnassignedAlias(owner.clone()))?;
            if i == 0 {
                ts.space().push(Token::GroupBy).space();
            } else {
                ts.comma().space();
            }
            ts.qualified(alias, column);
        }

        // ORDER BY restricted to selected columns and metric aliases.
        let mut order_items = 0usize;
        for order in &plan.order_by {
            let target = self.order_target(plan, &grouped, &aliases, &order.column);
            let Some(target) = target else {
                continue; // validator already warned; drop it
            };
            if order_items == 0 {
                ts.space().push(Token::OrderBy).space();
            } else {
                ts.comma().space();
            }
            ts.append(&target);
            if order.dir == SortDir::Desc {
                ts.space().push(Token::Desc);
            }
            order_items += 1;
        }

        if !self.dialect.uses_top() {
            ts.space()
                .push(Token::Limit)
                .space()
                .push(Token::LitInt(effective_limit));
        }

        Ok(CompiledQuery {
            sql: ts.serialize(self.dialect),
            params,
            audit_id,
        })
    }

    /// Fixed alias assignment: the fact table is `f`; every table joined in
    /// gets `d1`, `d2`, ... in join-tree order. Requested dimensions with no
    /// join step (none, after validation) would simply have no alias.
    fn assign_aliases<'p>(
        &self,
        plan: &'p CanonicalPlan,
        join_tree: &'p [JoinStep],
    ) -> HashMap<&'p str, String> {
        let mut aliases: HashMap<&str, String> = HashMap::new();
        aliases.insert(plan.fact_table.as_str(), "f".to_string());
        let mut next = 1usize;
        for step in join_tree {
            if !aliases.contains_key(step.right_table.as_str()) {
                aliases.insert(step.right_table.as_str(), format!("d{}", next));
                next += 1;
            }
        }
        aliases
    }

    /// The grouping keys: explicit group_by columns resolved to their owning
    /// tables, or, when metrics are present with dimensions but no explicit
    /// grouping, the dimension-side join column of each requested dimension.
    fn grouping_columns(
        &self,
        plan: &CanonicalPlan,
        join_tree: &[JoinStep],
    ) -> Vec<(String, String)> {
        if !plan.group_by.is_empty() {
            let mut grouped = Vec::with_capacity(plan.group_by.len());
            for col in &plan.group_by {
                if let Ok(owner) = self.column_owner(plan, col) {
                    grouped.push((owner.to_string(), col.clone()));
                }
            }
            return grouped;
        }

        if plan.metrics.is_empty() || plan.dimensions.is_empty() {
            return Vec::new();
        }

        let mut grouped = Vec::new();
        for dim in &plan.dimensions {
            if let Some(step) = join_tree.iter().find(|s| s.right_table == *dim) {
                grouped.push((dim.clone(), step.right_column.clone()));
            }
        }
        grouped
    }

    /// Resolve the owning table of a column: the fact table first, then
    /// dimensions in plan order. Same order as the validator.
    fn column_owner<'p>(
        &self,
        plan: &'p CanonicalPlan,
        column: &str,
    ) -> Result<&'p str, CompileError> {
        for table in plan.referenced_tables() {
            if self.snapshot.column(table, column).is_some() {
                return Ok(table);
            }
        }
        Err(CompileError::UnresolvedColumn(column.to_string()))
    }

    /// Emit the predicate tail for one filter and push its parameters.
    fn emit_predicate(
        &self,
        ts: &mut TokenStream,
        params: &mut Vec<Param>,
        index: usize,
        op: FilterOp,
        value: &FilterValue,
        column: &str,
    ) -> Result<(), CompileError> {
        match op {
            FilterOp::Eq
            | FilterOp::Ne
            | FilterOp::Gt
            | FilterOp::Lt
            | FilterOp::Gte
            | FilterOp::Lte => {
                if !value.is_scalar() {
                    return Err(CompileError::UnbindableFilter {
                        column: column.to_string(),
                    });
                }
                let name = format!("p{}", index);
                ts.space()
                    .push(match op {
                        FilterOp::Eq => Token::Eq,
                        FilterOp::Ne => Token::Ne,
                        FilterOp::Gt => Token::Gt,
                        FilterOp::Lt => Token::Lt,
                        FilterOp::Gte => Token::Gte,
                        FilterOp::Lte => Token::Lte,
                        _ => unreachable!(),
                    })
                    .space()
                    .push(Token::Placeholder(name.clone()));
                params.push(Param {
                    name,
                    value: value.clone(),
                });
            }
            FilterOp::Like => {
                if !value.is_scalar() {
                    return Err(CompileError::UnbindableFilter {
                        column: column.to_string(),
                    });
                }
                let name = format!("p{}", index);
                ts.space()
                    .push(Token::Like)
                    .space()
                    .push(Token::Placeholder(name.clone()));
                params.push(Param {
                    name,
                    value: value.clone(),
                });
            }
            FilterOp::In => {
                let FilterValue::List(items) = value else {
                    return Err(CompileError::UnbindableFilter {
                        column: column.to_string(),
                    });
                };
                if items.is_empty() {
                    return Err(CompileError::UnbindableFilter {
                        column: column.to_string(),
                    });
                }
                ts.space().push(Token::In).space().push(Token::LParen);
                for (j, item) in items.iter().enumerate() {
                    let name = format!("p{}_{}", index, j);
                    if j > 0 {
                        ts.comma().space();
                    }
                    ts.push(Token::Placeholder(name.clone()));
                    params.push(Param {
                        name,
                        value: item.clone(),
                    });
                }
                ts.push(Token::RParen);
            }
            FilterOp::Between => {
                let FilterValue::List(items) = value else {
                    return Err(CompileError::UnbindableFilter {
                        column: column.to_string(),
                    });
                };
                if items.len() != 2 {
                    return Err(CompileError::UnbindableFilter {
                        column: column.to_string(),
                    });
                }
                let lo = format!("p{}_lo", index);
                let hi = format!("p{}_hi", index);
                ts.space()
                    .push(Token::Between)
                    .space()
                    .push(Token::Placeholder(lo.clone()))
                    .space()
                    .push(Token::And)
                    .space()
                    .push(Token::Placeholder(hi.clone()));
                params.push(Param {
                    name: lo,
                    value: items[0].clone(),
                });
                params.push(Param {
                    name: hi,
                    value: items[1].clone(),
                });
            }
        }
        Ok(())
    }

    /// Resolve an order-by column to a renderable target: a metric alias, a
    /// grouped column, or any selected column.
    fn order_target(
        &self,
        plan: &CanonicalPlan,
        grouped: &[(String, String)],
        aliases: &HashMap<&str, String>,
        column: &str,
    ) -> Option<TokenStream> {
        if plan.metrics.iter().any(|m| m.output_alias() == column) {
            let mut ts = TokenStream::new();
            ts.push(Token::Ident(column.to_string()));
            return Some(ts);
        }

        if let Some((owner, col)) = grouped.iter().find(|(_, c)| c == column) {
            let alias = aliases.get(owner.as_str())?;
            let mut ts = TokenStream::new();
            ts.qualified(alias, col);
            return Some(ts);
        }

        // A bare selected column outside grouping (plain list queries).
        if grouped.is_empty() && plan.metrics.is_empty() {
            if let Ok(owner) = self.column_owner(plan, column) {
                let alias = aliases.get(owner)?;
                let mut ts = TokenStream::new();
                ts.qualified(alias, column);
                return Some(ts);
            }
        }

        None
    }
}
