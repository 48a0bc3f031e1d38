//! Shared, atomically-swappable metadata.
//!
//! The schema snapshot, mapping state and approved-join graph are read by
//! every pipeline run and refreshed rarely by an explicit admin action. They
//! are bundled into one `MetadataSnapshot` behind a single reference so a
//! refresh is atomic from a reader's point of view: an in-flight run holds
//! its own `Arc` and sees the old snapshot in full or the new one in full,
//! never a partial mix.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use super::SchemaSnapshot;
use crate::mapping::{JoinGraph, MappingState};

/// One coherent view of schema + mappings + approved joins.
#[derive(Debug, Clone, Default)]
pub struct MetadataSnapshot {
    pub schema: SchemaSnapshot,
    pub mappings: MappingState,
    pub joins: JoinGraph,
    pub version: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// The process-lifetime holder for the current metadata snapshot.
#[derive(Debug)]
pub struct SharedMetadata {
    current: RwLock<Arc<MetadataSnapshot>>,
}

impl SharedMetadata {
    pub fn new(snapshot: MetadataSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Get the current snapshot. The returned `Arc` stays valid for the
    /// caller even if a refresh swaps the shared reference underneath.
    pub fn load(&self) -> Arc<MetadataSnapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the snapshot wholesale. Returns the new version number.
    pub fn swap(
        &self,
        schema: SchemaSnapshot,
        mappings: MappingState,
        joins: JoinGraph,
        refreshed_at: DateTime<Utc>,
    ) -> u64 {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let version = guard.version + 1;
        *guard = Arc::new(MetadataSnapshot {
            schema,
            mappings,
            joins,
            version,
            refreshed_at: Some(refreshed_at),
        });
        version
    }
}

impl Default for SharedMetadata {
    fn default() -> Self {
        Self::new(MetadataSnapshot::default())
    }
}
