// This file is part of Ritex.
//
// Copyright (C) 2025-2026 Ritex Technologies Inc.
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use ritex_common::{Address, RitualStatus};
use thiserror::Error;

/// Hard ritualist error categories.
///
/// Benign outcomes (not a participant, already posted, peers still
/// submitting) are not errors at all: the state-machine entry points
/// report them as [`crate::SkipReason`] values. These kinds cover the
/// failures that must reach the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RitualistErrorKind {
    /// A cohort peer could not be resolved to a public key, even after
    /// the discovery wait. Partial cohorts are invalid for DKG.
    #[error("unknown node {0}")]
    UnknownNode(Address),

    /// Share derivation was requested before the ritual finalized; the
    /// caller should retry once the ceremony completes.
    #[error("ritual not finalized (status: {0})")]
    NotFinalized(RitualStatus),

    /// A finalized ritual is structurally guaranteed to hold every
    /// transcript, so a gap here is a data-integrity bug to surface
    /// loudly, not a wait-state.
    #[error("missing transcripts from {0} nodes")]
    IncompleteTranscripts(usize),

    /// Same as above, for the aggregate itself.
    #[error("aggregated transcript missing for finalized ritual")]
    MissingAggregatedTranscript,
}

/// Extension for downcasting `anyhow::Error` into [`RitualistErrorKind`].
pub trait RitualistErrorExt {
    fn ritualist_error_kind(&self) -> Option<&RitualistErrorKind>;
}

impl RitualistErrorExt for anyhow::Error {
    fn ritualist_error_kind(&self) -> Option<&RitualistErrorKind> {
        self.downcast_ref::<RitualistErrorKind>()
    }
}
