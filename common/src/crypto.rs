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

//! Opaque cryptographic artifacts and the ritual crypto engine boundary.
//!
//! The engine's internal math is out of scope for this workspace: the
//! traits below are consumed capabilities, injected into the ritualist at
//! construction time.

use crate::primitives::{Address, RitualId};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Round-1 artifact of a single participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::From)]
pub struct Transcript(pub Vec<u8>);

impl Transcript {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Combined result of all participants' transcripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::From)]
pub struct AggregatedTranscript(pub Vec<u8>);

impl AggregatedTranscript {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Shared public key derived from the aggregated transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::From)]
pub struct DkgPublicKey(pub Vec<u8>);

impl DkgPublicKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Partial decryption contribution for one ciphertext under a finalized
/// ritual's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::From)]
pub struct DecryptionShare(pub Vec<u8>);

/// Cryptographic variant tag selecting the share-derivation flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum ShareVariant {
    #[display("simple")]
    Simple,
    #[display("precomputed")]
    Precomputed,
}

/// Crypto-engine-facing identity of a ritual participant.
///
/// Ephemeral: reconstructed per protocol step from the on-chain
/// participant list and the peer directory, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub address: Address,
    pub public_key: Vec<u8>,
}

/// Participants paired with their round-1 transcripts, sorted ascending by
/// address. A `None` transcript means the participant has not posted yet.
pub type ResolvedCohort = Vec<(Validator, Option<Transcript>)>;

/// The DKG primitive operations, consumed as an opaque capability.
///
/// All operations take the full address-sorted validator list: transcript
/// generation and aggregation are order-sensitive, and every node must
/// feed the engine the identical ordering for the ceremony to agree.
pub trait RitualCryptoEngine: Send + Sync {
    /// The local node's own DKG session public key.
    fn public_key(&self) -> Result<Vec<u8>>;

    /// Produces this node's round-1 transcript.
    fn generate_transcript(
        &self,
        validators: &[Validator],
        threshold: u16,
        shares: u16,
        me: Address,
        ritual_id: RitualId,
    ) -> Result<Transcript>;

    /// Folds the complete transcript set into the aggregate and derives
    /// the shared public key.
    fn aggregate_transcripts(
        &self,
        cohort: &[(Validator, Transcript)],
        threshold: u16,
        shares: u16,
        me: Address,
        ritual_id: RitualId,
    ) -> Result<(AggregatedTranscript, DkgPublicKey)>;

    /// Derives this node's decryption share for a ciphertext.
    #[allow(clippy::too_many_arguments)]
    fn derive_decryption_share(
        &self,
        cohort: &[(Validator, Transcript)],
        threshold: u16,
        shares: u16,
        me: Address,
        ritual_id: RitualId,
        aggregated: &AggregatedTranscript,
        ciphertext: &[u8],
        conditions: &[u8],
        variant: ShareVariant,
    ) -> Result<DecryptionShare>;
}

/// Key material for the secure decryption-request channel, posted on-chain
/// together with the aggregate.
pub trait ThresholdRequestCrypto: Send + Sync {
    fn request_static_key(&self, ritual_id: RitualId) -> Result<Vec<u8>>;
}
