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

use anyhow::{bail, Result};
use ritex_common::{
    AggregatedTranscript, DkgPublicKey, Participant, Ritual, RitualId, RitualStatus,
};

alloy::sol!(
    #[allow(clippy::too_many_arguments)]
    #[sol(rpc)]
    contract ICoordinator {
        struct RitualData {
            address initiator;
            address authority;
            uint32 initTimestamp;
            uint16 threshold;
            uint16 shares;
            uint16 totalTranscripts;
            uint16 totalAggregations;
            bytes aggregatedTranscript;
            bytes publicKey;
        }

        struct Participant {
            address provider;
            bool aggregated;
            bytes transcript;
            bytes decryptionRequestStaticKey;
        }

        event StartRitual(uint32 indexed ritualId, address indexed authority, address[] participants);
        event TranscriptPosted(uint32 indexed ritualId, address indexed node, bytes32 transcriptDigest);
        event AggregationPosted(uint32 indexed ritualId, address indexed node, bytes32 aggregatedTranscriptDigest);
        event EndRitual(uint32 indexed ritualId, bool successful);

        function getRitual(uint32 ritualId) external view returns (RitualData memory);
        function getRitualState(uint32 ritualId) external view returns (uint8);
        function getParticipants(uint32 ritualId) external view returns (Participant[] memory);
        function getParticipant(uint32 ritualId, address provider) external view returns (Participant memory);
        function isParticipant(uint32 ritualId, address provider) external view returns (bool);
        function timeout() external view returns (uint32);
        function postTranscript(uint32 ritualId, bytes calldata transcript) external;
        function postAggregation(uint32 ritualId, bytes calldata aggregatedTranscript, bytes calldata dkgPublicKey, bytes calldata decryptionRequestStaticKey) external;
    }
);

pub(crate) mod utils {
    use ritex_common::Address;

    pub fn address_to_alloy(address: Address) -> alloy::primitives::Address {
        alloy::primitives::Address::new(address.0)
    }

    pub fn alloy_to_address(address: alloy::primitives::Address) -> Address {
        Address(address.0 .0)
    }
}

impl From<ICoordinator::Participant> for Participant {
    fn from(value: ICoordinator::Participant) -> Self {
        Self {
            provider: utils::alloy_to_address(value.provider),
            transcript: value.transcript.to_vec(),
            aggregated: value.aggregated,
            decryption_request_static_key: value.decryptionRequestStaticKey.to_vec(),
        }
    }
}

/// Maps the contract's state enum onto [`RitualStatus`].
pub(crate) fn ritual_status_from_u8(value: u8) -> Result<RitualStatus> {
    Ok(match value {
        0 => RitualStatus::NonInitiated,
        1 => RitualStatus::AwaitingTranscripts,
        2 => RitualStatus::AwaitingAggregations,
        3 => RitualStatus::Timeout,
        4 => RitualStatus::Finalized,
        _ => bail!("unknown ritual state {value}"),
    })
}

pub(crate) fn ritual_from_parts(
    ritual_id: RitualId,
    data: ICoordinator::RitualData,
    participants: Vec<Participant>,
    status: RitualStatus,
) -> Ritual {
    Ritual {
        id: ritual_id,
        initiator: utils::alloy_to_address(data.initiator),
        authority: utils::alloy_to_address(data.authority),
        participants,
        threshold: data.threshold,
        shares: data.shares,
        init_timestamp: data.initTimestamp as u64,
        total_transcripts: data.totalTranscripts,
        total_aggregations: data.totalAggregations,
        aggregated_transcript: (!data.aggregatedTranscript.is_empty())
            .then(|| AggregatedTranscript(data.aggregatedTranscript.to_vec())),
        public_key: (!data.publicKey.is_empty()).then(|| DkgPublicKey(data.publicKey.to_vec())),
        status,
    }
}
