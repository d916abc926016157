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

//! Ritual-related events emitted by the coordinator contract.

use crate::primitives::{Address, RitualId};
use serde::{Deserialize, Serialize};

/// Decoded coordinator event.
///
/// Events only tell the tracker *which* rituals were touched; the
/// authoritative record is always re-fetched, since events can be stale or
/// reordered at the RPC layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorEvent {
    RitualStarted {
        ritual_id: RitualId,
        authority: Address,
    },
    TranscriptPosted {
        ritual_id: RitualId,
        node: Address,
    },
    AggregationPosted {
        ritual_id: RitualId,
        node: Address,
    },
    RitualEnded {
        ritual_id: RitualId,
        successful: bool,
    },
}

impl CoordinatorEvent {
    /// The ritual this event belongs to.
    pub fn ritual_id(&self) -> RitualId {
        match self {
            Self::RitualStarted { ritual_id, .. }
            | Self::TranscriptPosted { ritual_id, .. }
            | Self::AggregationPosted { ritual_id, .. }
            | Self::RitualEnded { ritual_id, .. } => *ritual_id,
        }
    }
}
