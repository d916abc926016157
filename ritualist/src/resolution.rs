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

//! Validator resolution: mapping a ritual's participant list to live
//! cryptographic identities in the ceremony order.

use crate::error::RitualistErrorKind;
use anyhow::Result;
use ritex_common::{
    crypto::ResolvedCohort, Address, PeerDirectory, Ritual, RitualCryptoEngine, Transcript,
    Validator,
};
use std::{sync::Arc, time::Duration};

/// Resolves a ritual's participants to `(Validator, transcript)` pairs.
///
/// The output is always sorted ascending by address regardless of the
/// on-chain participant order: transcript generation, aggregation, and
/// share derivation are all order-sensitive, and every node in the cohort
/// must feed the crypto engine the identical ordering.
pub struct ValidatorResolver {
    peers: Arc<dyn PeerDirectory>,
    crypto: Arc<dyn RitualCryptoEngine>,
    me: Address,
    discovery_timeout: Duration,
}

impl ValidatorResolver {
    pub fn new(
        peers: Arc<dyn PeerDirectory>,
        crypto: Arc<dyn RitualCryptoEngine>,
        me: Address,
        discovery_timeout: Duration,
    ) -> Self {
        Self {
            peers,
            crypto,
            me,
            discovery_timeout,
        }
    }

    /// Resolves the full cohort or fails: DKG has no use for a partial
    /// participant set.
    pub async fn resolve(&self, ritual: &Ritual) -> Result<ResolvedCohort> {
        let unknown: Vec<Address> = ritual
            .participants
            .iter()
            .map(|p| p.provider)
            .filter(|&provider| provider != self.me && self.peers.known_peer(provider).is_none())
            .collect();

        // A zero timeout means "fail fast": skip discovery entirely.
        if !unknown.is_empty() && !self.discovery_timeout.is_zero() {
            log::debug!(
                "ritual {}: waiting up to {:?} for {} unknown peers",
                ritual.id,
                self.discovery_timeout,
                unknown.len(),
            );
            self.peers
                .wait_for_peers(&unknown, self.discovery_timeout, true)
                .await?;
        }

        let mut cohort = Vec::with_capacity(ritual.participants.len());
        for participant in &ritual.participants {
            let public_key = if participant.provider == self.me {
                // The local node's ritual key material needs no discovery.
                self.crypto.public_key()?
            } else {
                self.peers
                    .known_peer(participant.provider)
                    .ok_or_else(|| {
                        anyhow::Error::new(RitualistErrorKind::UnknownNode(participant.provider))
                    })?
                    .public_key
            };
            let transcript = (!participant.transcript.is_empty())
                .then(|| Transcript(participant.transcript.clone()));
            cohort.push((
                Validator {
                    address: participant.provider,
                    public_key,
                },
                transcript,
            ));
        }

        cohort.sort_by_key(|(validator, _)| validator.address);
        Ok(cohort)
    }
}

/// Checks that every resolved participant carries a transcript.
///
/// Used where a gap is a hard error (finalized rituals); the round-2
/// wait-state is handled before resolution from the on-chain counters.
pub fn complete_cohort(cohort: ResolvedCohort) -> Result<Vec<(Validator, Transcript)>> {
    let missing = cohort
        .iter()
        .filter(|(_, transcript)| transcript.is_none())
        .count();
    if missing > 0 {
        return Err(anyhow::Error::new(RitualistErrorKind::IncompleteTranscripts(missing)));
    }
    Ok(cohort
        .into_iter()
        .map(|(validator, transcript)| (validator, transcript.expect("checked above")))
        .collect())
}
