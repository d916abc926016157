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

//! Decoding of coordinator logs into [`CoordinatorEvent`]s.

use crate::abi::{utils::alloy_to_address, ICoordinator};
use alloy::{rpc::types::eth::Log, sol_types::SolEvent};
use anyhow::Result;
use ritex_common::CoordinatorEvent;

pub mod signature_hash {
    use super::ICoordinator;
    use alloy::{primitives::B256, sol_types::SolEvent};

    pub const START_RITUAL: B256 = ICoordinator::StartRitual::SIGNATURE_HASH;
    pub const TRANSCRIPT_POSTED: B256 = ICoordinator::TranscriptPosted::SIGNATURE_HASH;
    pub const AGGREGATION_POSTED: B256 = ICoordinator::AggregationPosted::SIGNATURE_HASH;
    pub const END_RITUAL: B256 = ICoordinator::EndRitual::SIGNATURE_HASH;

    pub const ALL: [B256; 4] = [
        START_RITUAL,
        TRANSCRIPT_POSTED,
        AGGREGATION_POSTED,
        END_RITUAL,
    ];
}

pub(crate) fn decode_log<E: SolEvent>(log: &Log) -> Result<E> {
    E::decode_raw_log(log.topics(), &log.data().data, false).map_err(Into::into)
}

/// Decodes a coordinator log; logs with foreign signatures yield `None`.
pub fn try_extract_event(log: &Log) -> Result<Option<CoordinatorEvent>> {
    let Some(&topic0) = log.topics().first() else {
        return Ok(None);
    };

    let event = if topic0 == signature_hash::START_RITUAL {
        let event = decode_log::<ICoordinator::StartRitual>(log)?;
        CoordinatorEvent::RitualStarted {
            ritual_id: event.ritualId,
            authority: alloy_to_address(event.authority),
        }
    } else if topic0 == signature_hash::TRANSCRIPT_POSTED {
        let event = decode_log::<ICoordinator::TranscriptPosted>(log)?;
        CoordinatorEvent::TranscriptPosted {
            ritual_id: event.ritualId,
            node: alloy_to_address(event.node),
        }
    } else if topic0 == signature_hash::AGGREGATION_POSTED {
        let event = decode_log::<ICoordinator::AggregationPosted>(log)?;
        CoordinatorEvent::AggregationPosted {
            ritual_id: event.ritualId,
            node: alloy_to_address(event.node),
        }
    } else if topic0 == signature_hash::END_RITUAL {
        let event = decode_log::<ICoordinator::EndRitual>(log)?;
        CoordinatorEvent::RitualEnded {
            ritual_id: event.ritualId,
            successful: event.successful,
        }
    } else {
        return Ok(None);
    };

    Ok(Some(event))
}
