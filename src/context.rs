// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cancellation and deadline handed to every reconcile invocation.

use crate::error::{Result, RiggerError};
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ReconcileContext {
    token: CancellationToken,
    deadline: Instant,
}

impl ReconcileContext {
    pub fn new(token: CancellationToken, timeout: Duration) -> Self {
        Self {
            token,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run an object store call, aborting it on cancellation or at the deadline
    pub async fn guard<F, T>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.token.is_cancelled() {
            return Err(RiggerError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(RiggerError::Cancelled),
            res = timeout_at(self.deadline, call) => match res {
                Ok(inner) => inner,
                Err(_) => Err(RiggerError::DeadlineExceeded),
            },
        }
    }
}
