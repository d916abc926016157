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

//! The Chain Reader boundary: read access to blocks and ritual state,
//! plus ritual transaction submission.

use crate::{
    crypto::{AggregatedTranscript, DkgPublicKey, Transcript},
    events::CoordinatorEvent,
    primitives::{Address, BlockHeader, RitualId, TxReceipt},
    ritual::{Participant, Ritual, RitualStatus},
};
use anyhow::Result;
use async_trait::async_trait;

/// Block selector for [`CoordinatorClient::block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockId {
    Latest,
    Number(u64),
}

/// Access to the coordinator contract and the chain underneath it.
///
/// Implementations are injected into the tracker and ritualist
/// constructors; there is no ambient registry. The transacting identity
/// used by the `post_*` operations is likewise bound at construction of
/// the implementation.
#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    /// Header of the selected block.
    async fn block(&self, id: BlockId) -> Result<BlockHeader>;

    /// Authoritative ritual record. When `with_participants` is false the
    /// participant list is left empty, saving the heavier query.
    async fn ritual(&self, ritual_id: RitualId, with_participants: bool) -> Result<Ritual>;

    /// Current lifecycle state of a ritual.
    async fn ritual_status(&self, ritual_id: RitualId) -> Result<RitualStatus>;

    /// Authoritative participant record, `None` when the provider is not
    /// part of the ritual.
    async fn participant(
        &self,
        ritual_id: RitualId,
        provider: Address,
    ) -> Result<Option<Participant>>;

    /// Contract-configured ritual timeout, in seconds.
    async fn dkg_timeout(&self) -> Result<u64>;

    /// Ritual events emitted in the inclusive block range `[from, to]`.
    async fn events_in_range(&self, from: u64, to: u64) -> Result<Vec<CoordinatorEvent>>;

    /// Submits this node's round-1 transcript.
    async fn post_transcript(
        &self,
        ritual_id: RitualId,
        transcript: &Transcript,
    ) -> Result<TxReceipt>;

    /// Submits this node's round-2 aggregate together with the derived
    /// public key and the decryption-request channel key.
    async fn post_aggregation(
        &self,
        ritual_id: RitualId,
        aggregated: &AggregatedTranscript,
        public_key: &DkgPublicKey,
        request_static_key: &[u8],
    ) -> Result<TxReceipt>;
}
