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

//! The on-chain ritual data model.

use crate::{
    crypto::{AggregatedTranscript, DkgPublicKey},
    primitives::{Address, RitualId},
};
use serde::{Deserialize, Serialize};

/// Threshold derived from the share count at round-1 time.
///
/// Every node must derive the same value for the ceremony to agree, so it
/// is computed from on-chain data only.
pub const fn threshold_for_shares(shares: u16) -> u16 {
    shares / 2 + 1
}

/// Lifecycle state of a ritual, authoritative on-chain.
///
/// The contract only ever moves a ritual forward through these states;
/// the local engine observes transitions, it never causes them directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum RitualStatus {
    #[display("non-initiated")]
    NonInitiated,
    #[display("awaiting transcripts")]
    AwaitingTranscripts,
    #[display("awaiting aggregations")]
    AwaitingAggregations,
    #[display("timeout")]
    Timeout,
    #[display("finalized")]
    Finalized,
}

impl RitualStatus {
    /// Terminal states never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Timeout | Self::Finalized)
    }

    /// Whether the contract can move a ritual from `self` to `next`.
    ///
    /// Progress is strictly forward: no state is ever skipped and no
    /// transition moves backward.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NonInitiated, Self::AwaitingTranscripts)
                | (Self::AwaitingTranscripts, Self::AwaitingAggregations)
                | (Self::AwaitingTranscripts, Self::Timeout)
                | (Self::AwaitingAggregations, Self::Finalized)
                | (Self::AwaitingAggregations, Self::Timeout)
        )
    }
}

/// Member of a ritual, keyed by its on-chain provider address.
///
/// The provider address is the staking identity, not necessarily the
/// network-transport identity; it is unique within a ritual.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub provider: Address,
    /// Round-1 artifact, empty until submitted.
    pub transcript: Vec<u8>,
    /// True once this participant's contribution was folded into the
    /// aggregate (round 2).
    pub aggregated: bool,
    /// Public key for the secure decryption-request channel.
    pub decryption_request_static_key: Vec<u8>,
}

impl Participant {
    pub fn new(provider: Address) -> Self {
        Self {
            provider,
            ..Default::default()
        }
    }

    pub fn posted_transcript(&self) -> bool {
        !self.transcript.is_empty()
    }
}

/// On-chain ritual record, immutable once read for a given block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ritual {
    pub id: RitualId,
    pub initiator: Address,
    pub authority: Address,
    /// Ordered participant set; its length equals `shares`. May be left
    /// empty by readers that were asked to skip participant data.
    pub participants: Vec<Participant>,
    pub threshold: u16,
    pub shares: u16,
    pub init_timestamp: u64,
    pub total_transcripts: u16,
    pub total_aggregations: u16,
    /// Populated only once the ritual is finalized.
    pub aggregated_transcript: Option<AggregatedTranscript>,
    pub public_key: Option<DkgPublicKey>,
    pub status: RitualStatus,
}

impl Ritual {
    /// Looks up a participant record by provider address.
    pub fn participant(&self, provider: Address) -> Option<&Participant> {
        self.participants.iter().find(|p| p.provider == provider)
    }

    /// Number of participants that have not posted a round-1 transcript.
    pub fn missing_transcripts(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| !p.posted_transcript())
            .count()
    }
}
