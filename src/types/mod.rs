// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resource types, naming and provenance of mirrored secrets.

pub mod labels;
pub mod naming;
pub mod plan;

pub use naming::{DestinationName, SourceRef};
pub use plan::{Plan, PlanChanges, PlanSnapshot, PlanSpec, PlanStatus};
