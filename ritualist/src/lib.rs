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

//! The per-ritual DKG state machine.
//!
//! The contract is the single source of truth for ritual phases; this
//! module executes the protocol step the observed phase calls for:
//! transcript generation (round 1), aggregation (round 2), and decryption
//! share derivation once a ritual is finalized.

use crate::{error::RitualistErrorKind, resolution::complete_cohort};
use anyhow::Result;
use parking_lot::Mutex;
use ritex_common::{
    threshold_for_shares, Address, AggregatedTranscript, CoordinatorClient, DecryptionShare,
    DkgStorageRO, DkgStorageRW, PeerDirectory, RitualCryptoEngine, RitualId, RitualStatus,
    RitualStore, ShareVariant, ThresholdRequestCrypto, TxReceipt, Validator,
};
use std::{collections::BTreeMap, sync::Arc, time::Duration};

mod error;
mod resolution;

#[cfg(test)]
mod tests;

pub use error::{RitualistErrorExt, RitualistErrorKind as ErrorKind};
pub use resolution::ValidatorResolver;

/// Default bound on the peer-discovery wait inside validator resolution.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of a state-machine entry point.
///
/// Benign skips are ordinary values, not errors: they are expected
/// whenever the tracker re-dispatches a phase that was already handled,
/// and must not alarm anyone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RitualStep {
    /// The protocol step ran and its transaction was submitted.
    Posted(TxReceipt),
    /// Nothing to do; the reason says why.
    Skipped(SkipReason),
}

/// Why a protocol step was not performed.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum SkipReason {
    /// The local node is not in the ritual's participant list.
    #[display("local node is not a participant")]
    NotParticipating,
    /// The artifact for the current phase is already on-chain.
    #[display("artifact for the current phase already posted")]
    AlreadyPosted,
    /// The ritual moved past (or never reached) the expected phase
    /// between dispatch and the authoritative re-check.
    #[display("ritual phase mismatch (status: {_0})")]
    PhasePassed(RitualStatus),
    /// Round 2 is due but peers are still submitting round-1 transcripts;
    /// the next scan retries naturally.
    #[display("missing transcripts from {_0} nodes")]
    TranscriptsPending(usize),
}

/// Serializes state-machine execution per ritual id.
///
/// Correctness never depends on this (the contract rejects conflicting
/// submissions and the idempotency pre-checks catch the rest); the lock
/// only prevents overlapping scan ticks from paying twice for the same
/// expensive crypto-engine invocation.
#[derive(Default)]
struct RitualLocks {
    inner: Mutex<BTreeMap<RitualId, Arc<tokio::sync::Mutex<()>>>>,
}

impl RitualLocks {
    async fn lock(&self, ritual_id: RitualId) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self.inner.lock().entry(ritual_id).or_default().clone();
        lock.lock_owned().await
    }
}

/// The local ritual participant.
pub struct Ritualist {
    coordinator: Arc<dyn CoordinatorClient>,
    crypto: Arc<dyn RitualCryptoEngine>,
    request_crypto: Arc<dyn ThresholdRequestCrypto>,
    resolver: ValidatorResolver,
    store: RitualStore,
    me: Address,
    locks: RitualLocks,
}

impl Ritualist {
    /// All collaborators are injected; nothing is looked up from ambient
    /// state.
    pub fn new(
        coordinator: Arc<dyn CoordinatorClient>,
        crypto: Arc<dyn RitualCryptoEngine>,
        request_crypto: Arc<dyn ThresholdRequestCrypto>,
        peers: Arc<dyn PeerDirectory>,
        store: RitualStore,
        me: Address,
        discovery_timeout: Duration,
    ) -> Self {
        let resolver = ValidatorResolver::new(peers, crypto.clone(), me, discovery_timeout);
        Self {
            coordinator,
            crypto,
            request_crypto,
            resolver,
            store,
            me,
            locks: RitualLocks::default(),
        }
    }

    /// The canonical address this node participates under.
    pub fn address(&self) -> Address {
        self.me
    }

    /// The local artifact cache.
    pub fn store(&self) -> &RitualStore {
        &self.store
    }

    /// Generates and posts this node's round-1 transcript.
    pub async fn perform_round_1(&self, ritual_id: RitualId) -> Result<RitualStep> {
        let _guard = self.locks.lock(ritual_id).await;

        let ritual = self.coordinator.ritual(ritual_id, true).await?;
        let Some(onchain) = self.coordinator.participant(ritual_id, self.me).await? else {
            return Ok(self.skip(ritual_id, SkipReason::NotParticipating));
        };
        // Re-check the authoritative phase right before acting: another
        // node may have raced us, or the ritual may have timed out.
        let status = self.coordinator.ritual_status(ritual_id).await?;
        if status != RitualStatus::AwaitingTranscripts {
            return Ok(self.skip(ritual_id, SkipReason::PhasePassed(status)));
        }
        if onchain.posted_transcript() {
            return Ok(self.skip(ritual_id, SkipReason::AlreadyPosted));
        }

        let cohort = self.resolver.resolve(&ritual).await?;
        let validators: Vec<Validator> =
            cohort.into_iter().map(|(validator, _)| validator).collect();
        let threshold = threshold_for_shares(ritual.shares);

        // A cached transcript survives a crash between the local write and
        // the transaction landing; resubmitting the same bytes is
        // idempotent as far as the protocol is concerned.
        let transcript = match self.store.dkg_record(ritual_id).and_then(|r| r.transcript) {
            Some(transcript) => {
                log::debug!("ritual {ritual_id}: reusing locally cached transcript");
                transcript
            }
            None => {
                let transcript = self
                    .crypto
                    .generate_transcript(&validators, threshold, ritual.shares, self.me, ritual_id)
                    .inspect_err(|err| {
                        log::error!("ritual {ritual_id}: transcript generation failed: {err}")
                    })?;
                self.store.mutate_dkg_record(ritual_id, |record| {
                    record.transcript = Some(transcript.clone());
                });
                transcript
            }
        };

        let receipt = self.coordinator.post_transcript(ritual_id, &transcript).await?;
        self.store.mutate_dkg_record(ritual_id, |record| {
            record.transcript_receipt = Some(receipt.clone());
        });
        log::info!(
            "ritual {ritual_id}: transcript posted in block {}",
            receipt.block_number,
        );
        Ok(RitualStep::Posted(receipt))
    }

    /// Aggregates the complete transcript set and posts the result.
    pub async fn perform_round_2(&self, ritual_id: RitualId) -> Result<RitualStep> {
        let _guard = self.locks.lock(ritual_id).await;

        let ritual = self.coordinator.ritual(ritual_id, true).await?;
        let Some(onchain) = self.coordinator.participant(ritual_id, self.me).await? else {
            return Ok(self.skip(ritual_id, SkipReason::NotParticipating));
        };
        let status = self.coordinator.ritual_status(ritual_id).await?;
        if status != RitualStatus::AwaitingAggregations {
            return Ok(self.skip(ritual_id, SkipReason::PhasePassed(status)));
        }
        if onchain.aggregated {
            return Ok(self.skip(ritual_id, SkipReason::AlreadyPosted));
        }

        // A legitimate wait-state, not an error: peers may still be
        // submitting round 1.
        let missing = ritual.missing_transcripts();
        if missing > 0 {
            return Ok(self.skip(ritual_id, SkipReason::TranscriptsPending(missing)));
        }

        let mut cohort = self.resolver.resolve(&ritual).await?;
        // Prefer the transcript this node generated over the on-chain echo
        // of it.
        if let Some(local) = self.store.dkg_record(ritual_id).and_then(|r| r.transcript) {
            if let Some(pair) = cohort.iter_mut().find(|(v, _)| v.address == self.me) {
                pair.1 = Some(local);
            }
        }
        let cohort = complete_cohort(cohort)?;
        let threshold = threshold_for_shares(ritual.shares);

        let (aggregated, public_key) = self
            .crypto
            .aggregate_transcripts(&cohort, threshold, ritual.shares, self.me, ritual_id)
            .inspect_err(|err| log::error!("ritual {ritual_id}: aggregation failed: {err}"))?;
        self.store.mutate_dkg_record(ritual_id, |record| {
            record.aggregated_transcript = Some(aggregated.clone());
            record.public_key = Some(public_key.clone());
        });

        let request_static_key = self.request_crypto.request_static_key(ritual_id)?;
        let receipt = self
            .coordinator
            .post_aggregation(ritual_id, &aggregated, &public_key, &request_static_key)
            .await?;
        self.store.mutate_dkg_record(ritual_id, |record| {
            record.aggregation_receipt = Some(receipt.clone());
        });
        log::info!(
            "ritual {ritual_id}: aggregate posted in block {}",
            receipt.block_number,
        );
        Ok(RitualStep::Posted(receipt))
    }

    /// Derives this node's decryption share for a ciphertext under a
    /// finalized ritual.
    ///
    /// Callable any number of times; the ritual must be finalized, and a
    /// finalized ritual missing artifacts is a data-integrity bug that
    /// fails the request loudly.
    pub async fn derive_decryption_share(
        &self,
        ritual_id: RitualId,
        ciphertext: &[u8],
        conditions: &[u8],
        variant: ShareVariant,
    ) -> Result<DecryptionShare> {
        let status = self.coordinator.ritual_status(ritual_id).await?;
        if status != RitualStatus::Finalized {
            log::debug!("ritual {ritual_id}: decryption requested while {status}");
            return Err(anyhow::Error::new(RitualistErrorKind::NotFinalized(status)));
        }

        let ritual = self.coordinator.ritual(ritual_id, true).await?;
        let cohort = complete_cohort(self.resolver.resolve(&ritual).await?)?;
        let aggregated: AggregatedTranscript = ritual.aggregated_transcript.ok_or_else(|| {
            anyhow::Error::new(RitualistErrorKind::MissingAggregatedTranscript)
        })?;
        let threshold = threshold_for_shares(ritual.shares);

        self.crypto.derive_decryption_share(
            &cohort,
            threshold,
            ritual.shares,
            self.me,
            ritual_id,
            &aggregated,
            ciphertext,
            conditions,
            variant,
        )
    }

    fn skip(&self, ritual_id: RitualId, reason: SkipReason) -> RitualStep {
        log::debug!("ritual {ritual_id}: skipping: {reason}");
        RitualStep::Skipped(reason)
    }
}
