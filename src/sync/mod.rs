// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Secret mirroring logic shared by the reconcilers.

pub mod mirror;
pub mod sweep;

pub use mirror::{apply, decide, mirror_source, MirrorAction};
pub use sweep::{catch_up, cleanup_namespace, full_sweep, resync};
