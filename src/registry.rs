// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! In-memory registry of the last synced state of every plan.

use crate::types::PlanSnapshot;
use dashmap::DashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

/// Concurrent map from plan name to its last synced snapshot.
///
/// Entries are replaced as a whole, so readers never see a partial update.
/// Iteration works on a copy of the entries and holds no lock while visiting.
#[derive(Debug, Default)]
pub struct PlanRegistry {
    plans: DashMap<String, Arc<PlanSnapshot>>,
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, snapshot: PlanSnapshot) {
        self.plans.insert(snapshot.name.clone(), Arc::new(snapshot));
    }

    pub fn load(&self, name: &str) -> Option<Arc<PlanSnapshot>> {
        self.plans.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn delete(&self, name: &str) -> Option<Arc<PlanSnapshot>> {
        self.plans.remove(name).map(|(_, snapshot)| snapshot)
    }

    /// Point-in-time copy of every entry, in no particular order
    pub fn snapshot(&self) -> Vec<Arc<PlanSnapshot>> {
        self.plans
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Visit every entry until `visit` breaks
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&PlanSnapshot) -> ControlFlow<()>,
    {
        for snapshot in self.snapshot() {
            if visit(&snapshot).is_break() {
                break;
            }
        }
    }

    /// First plan matching `predicate`
    pub fn find<F>(&self, mut predicate: F) -> Option<Arc<PlanSnapshot>>
    where
        F: FnMut(&PlanSnapshot) -> bool,
    {
        self.snapshot().into_iter().find(|snapshot| predicate(snapshot))
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}
