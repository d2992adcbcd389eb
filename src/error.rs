// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiggerError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Sync incomplete: {failed} of {total} objects failed")]
    PartialSync { failed: usize, total: usize },

    #[error("Reconcile cancelled")]
    Cancelled,

    #[error("Reconcile deadline exceeded")]
    DeadlineExceeded,

    #[error("Work queue closed")]
    QueueClosed,
}

impl RiggerError {
    /// Races with another event that the reconcile loop treats as success
    pub fn is_benign_race(&self) -> bool {
        matches!(self, RiggerError::NotFound(_) | RiggerError::AlreadyExists(_))
    }

    /// The reconcile was stopped from outside and should not continue
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RiggerError::Cancelled | RiggerError::DeadlineExceeded)
    }
}

pub type Result<T> = std::result::Result<T, RiggerError>;
