//! MetadataProvider trait definition.
//!
//! Abstracts over how schema snapshots, mappings and approved joins are
//! fetched. Introspection itself lives outside the core; the core only
//! consumes the provider's results and swaps them into [`SharedMetadata`]
//! atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::shared::SharedMetadata;
use super::SchemaSnapshot;
use crate::mapping::{JoinGraph, MappingState};

/// Error fetching metadata from a collaborator.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("metadata source unavailable: {0}")]
    Unavailable(String),

    #[error("metadata payload malformed: {0}")]
    Malformed(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for fetching the three metadata inputs the core depends on.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch the current schema snapshot.
    async fn schema_snapshot(&self) -> ProviderResult<SchemaSnapshot>;

    /// Fetch the human-curated table/column mappings.
    async fn mapping_state(&self) -> ProviderResult<MappingState>;

    /// Fetch the approved-join graph.
    async fn join_graph(&self) -> ProviderResult<JoinGraph>;
}

/// Fetch all three inputs and swap them into the shared snapshot.
///
/// The swap only happens after every fetch succeeded; a failed fetch leaves
/// the previous snapshot untouched.
pub async fn refresh(
    shared: &SharedMetadata,
    provider: &dyn MetadataProvider,
    now: DateTime<Utc>,
) -> ProviderResult<u64> {
    let schema = provider.schema_snapshot().await?;
    let mappings = provider.mapping_state().await?;
    let joins = provider.join_graph().await?;
    Ok(shared.swap(schema, mappings, joins, now))
}
