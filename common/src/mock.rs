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

//! Mock implementations of the consumed capabilities, shared by the
//! workspace test suites.

use crate::{
    chain::{BlockId, CoordinatorClient},
    crypto::{
        AggregatedTranscript, DecryptionShare, DkgPublicKey, RitualCryptoEngine, ShareVariant,
        ThresholdRequestCrypto, Transcript, Validator,
    },
    events::CoordinatorEvent,
    network::{PeerDirectory, PeerInfo},
    primitives::{Address, BlockHeader, RitualId, TxHash, TxReceipt},
    ritual::{threshold_for_shares, Participant, Ritual, RitualStatus},
};
use anyhow::{anyhow, bail, ensure, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

#[derive(Debug, Default)]
struct MockChain {
    /// Block timestamps, indexed by height.
    blocks: Vec<u64>,
    timeout: u64,
    rituals: BTreeMap<RitualId, Ritual>,
    events: BTreeMap<u64, Vec<CoordinatorEvent>>,
    next_tx: u64,
    events_failures: u32,
    queried_ranges: Vec<(u64, u64)>,
}

impl MockChain {
    fn tip(&self) -> BlockHeader {
        let height = (self.blocks.len() - 1) as u64;
        BlockHeader {
            height,
            timestamp: self.blocks[height as usize],
        }
    }

    fn status_of(&self, ritual: &Ritual) -> RitualStatus {
        if ritual.total_aggregations == ritual.shares {
            RitualStatus::Finalized
        } else if self.tip().timestamp >= ritual.init_timestamp + self.timeout {
            RitualStatus::Timeout
        } else if ritual.total_transcripts == ritual.shares {
            RitualStatus::AwaitingAggregations
        } else {
            RitualStatus::AwaitingTranscripts
        }
    }

    fn mint_receipt(&mut self) -> TxReceipt {
        self.next_tx += 1;
        let mut hash = [0u8; 32];
        hash[..8].copy_from_slice(&self.next_tx.to_le_bytes());
        TxReceipt {
            tx_hash: TxHash(hash),
            block_number: self.tip().height,
        }
    }

    fn emit(&mut self, event: CoordinatorEvent) {
        let height = self.tip().height;
        self.events.entry(height).or_default().push(event);
    }
}

/// In-memory stand-in for the coordinator contract and its chain.
///
/// Status is derived from the ritual counters the way the contract derives
/// it, so tests observe the same state machine the engine sees on a real
/// deployment. Clones share the chain; [`Self::with_sender`] produces a
/// client transacting under a different identity on the same chain.
#[derive(Clone)]
pub struct MockCoordinator {
    me: Address,
    inner: Arc<Mutex<MockChain>>,
}

impl MockCoordinator {
    pub fn new(me: Address) -> Self {
        Self {
            me,
            inner: Arc::new(Mutex::new(MockChain {
                blocks: vec![0],
                timeout: 3600,
                ..Default::default()
            })),
        }
    }

    /// A client for the same chain transacting as `address`.
    pub fn with_sender(&self, address: Address) -> Self {
        Self {
            me: address,
            inner: self.inner.clone(),
        }
    }

    pub fn set_timeout(&self, seconds: u64) {
        self.inner.lock().timeout = seconds;
    }

    /// Appends `count` blocks, each `block_time` seconds after the last.
    pub fn push_blocks(&self, count: u64, block_time: u64) {
        let mut chain = self.inner.lock();
        for _ in 0..count {
            let next = chain.blocks.last().copied().unwrap_or_default() + block_time;
            chain.blocks.push(next);
        }
    }

    /// Creates a ritual at the current tip and emits its start event.
    pub fn new_ritual(&self, authority: Address, providers: &[Address]) -> RitualId {
        let mut chain = self.inner.lock();
        let id = chain.rituals.len() as RitualId;
        let shares = providers.len() as u16;
        let ritual = Ritual {
            id,
            initiator: authority,
            authority,
            participants: providers.iter().copied().map(Participant::new).collect(),
            threshold: threshold_for_shares(shares),
            shares,
            init_timestamp: chain.tip().timestamp,
            total_transcripts: 0,
            total_aggregations: 0,
            aggregated_transcript: None,
            public_key: None,
            status: RitualStatus::AwaitingTranscripts,
        };
        chain.rituals.insert(id, ritual);
        chain.emit(CoordinatorEvent::RitualStarted {
            ritual_id: id,
            authority,
        });
        id
    }

    /// Makes the next `count` event queries fail, for retry tests.
    pub fn fail_events_queries(&self, count: u32) {
        self.inner.lock().events_failures = count;
    }

    /// Every range ever passed to [`CoordinatorClient::events_in_range`],
    /// including failed attempts.
    pub fn queried_ranges(&self) -> Vec<(u64, u64)> {
        self.inner.lock().queried_ranges.clone()
    }
}

#[async_trait]
impl CoordinatorClient for MockCoordinator {
    async fn block(&self, id: BlockId) -> Result<BlockHeader> {
        let chain = self.inner.lock();
        match id {
            BlockId::Latest => Ok(chain.tip()),
            BlockId::Number(height) => chain
                .blocks
                .get(height as usize)
                .map(|&timestamp| BlockHeader { height, timestamp })
                .ok_or_else(|| anyhow!("block {height} not found")),
        }
    }

    async fn ritual(&self, ritual_id: RitualId, with_participants: bool) -> Result<Ritual> {
        let chain = self.inner.lock();
        let mut ritual = chain
            .rituals
            .get(&ritual_id)
            .cloned()
            .ok_or_else(|| anyhow!("ritual {ritual_id} not found"))?;
        ritual.status = chain.status_of(&ritual);
        if !with_participants {
            ritual.participants.clear();
        }
        Ok(ritual)
    }

    async fn ritual_status(&self, ritual_id: RitualId) -> Result<RitualStatus> {
        let chain = self.inner.lock();
        chain
            .rituals
            .get(&ritual_id)
            .map(|ritual| chain.status_of(ritual))
            .ok_or_else(|| anyhow!("ritual {ritual_id} not found"))
    }

    async fn participant(
        &self,
        ritual_id: RitualId,
        provider: Address,
    ) -> Result<Option<Participant>> {
        let chain = self.inner.lock();
        let ritual = chain
            .rituals
            .get(&ritual_id)
            .ok_or_else(|| anyhow!("ritual {ritual_id} not found"))?;
        Ok(ritual.participant(provider).cloned())
    }

    async fn dkg_timeout(&self) -> Result<u64> {
        Ok(self.inner.lock().timeout)
    }

    async fn events_in_range(&self, from: u64, to: u64) -> Result<Vec<CoordinatorEvent>> {
        let mut chain = self.inner.lock();
        chain.queried_ranges.push((from, to));
        if chain.events_failures > 0 {
            chain.events_failures -= 1;
            bail!("rpc: events query failed");
        }
        Ok(chain
            .events
            .range(from..=to)
            .flat_map(|(_, events)| events.iter().cloned())
            .collect())
    }

    async fn post_transcript(
        &self,
        ritual_id: RitualId,
        transcript: &Transcript,
    ) -> Result<TxReceipt> {
        let mut chain = self.inner.lock();
        let status = {
            let ritual = chain
                .rituals
                .get(&ritual_id)
                .ok_or_else(|| anyhow!("ritual {ritual_id} not found"))?;
            chain.status_of(ritual)
        };
        ensure!(
            status == RitualStatus::AwaitingTranscripts,
            "contract revert: ritual {ritual_id} is not awaiting transcripts",
        );

        let me = self.me;
        {
            let ritual = chain.rituals.get_mut(&ritual_id).unwrap();
            let participant = ritual
                .participants
                .iter_mut()
                .find(|p| p.provider == me)
                .ok_or_else(|| anyhow!("contract revert: {me} is not a participant"))?;
            ensure!(
                participant.transcript.is_empty(),
                "contract revert: transcript already posted by {me}",
            );
            participant.transcript = transcript.0.clone();
            ritual.total_transcripts += 1;
        }

        chain.emit(CoordinatorEvent::TranscriptPosted {
            ritual_id,
            node: me,
        });
        Ok(chain.mint_receipt())
    }

    async fn post_aggregation(
        &self,
        ritual_id: RitualId,
        aggregated: &AggregatedTranscript,
        public_key: &DkgPublicKey,
        request_static_key: &[u8],
    ) -> Result<TxReceipt> {
        let mut chain = self.inner.lock();
        let status = {
            let ritual = chain
                .rituals
                .get(&ritual_id)
                .ok_or_else(|| anyhow!("ritual {ritual_id} not found"))?;
            chain.status_of(ritual)
        };
        ensure!(
            status == RitualStatus::AwaitingAggregations,
            "contract revert: ritual {ritual_id} is not awaiting aggregations",
        );

        let me = self.me;
        let finalized = {
            let ritual = chain.rituals.get_mut(&ritual_id).unwrap();
            let participant = ritual
                .participants
                .iter_mut()
                .find(|p| p.provider == me)
                .ok_or_else(|| anyhow!("contract revert: {me} is not a participant"))?;
            ensure!(
                !participant.aggregated,
                "contract revert: aggregate already posted by {me}",
            );
            participant.aggregated = true;
            participant.decryption_request_static_key = request_static_key.to_vec();
            ritual.total_aggregations += 1;
            if ritual.aggregated_transcript.is_none() {
                ritual.aggregated_transcript = Some(aggregated.clone());
                ritual.public_key = Some(public_key.clone());
            }
            ritual.total_aggregations == ritual.shares
        };

        chain.emit(CoordinatorEvent::AggregationPosted {
            ritual_id,
            node: me,
        });
        if finalized {
            chain.emit(CoordinatorEvent::RitualEnded {
                ritual_id,
                successful: true,
            });
        }
        Ok(chain.mint_receipt())
    }
}

/// Per-operation call counters of [`MockRitualCrypto`].
#[derive(Debug, Default)]
pub struct CryptoCalls {
    pub generate: AtomicUsize,
    pub aggregate: AtomicUsize,
    pub derive: AtomicUsize,
    pub fail_next_generate: AtomicBool,
}

/// Deterministic stand-in for the ritual crypto engine.
///
/// Artifacts are readable byte strings derived from the inputs, so that
/// aggregates computed by different nodes coincide the way real ones do.
#[derive(Debug, Clone)]
pub struct MockRitualCrypto {
    public_key: Vec<u8>,
    pub calls: Arc<CryptoCalls>,
}

impl MockRitualCrypto {
    pub fn for_node(address: Address) -> Self {
        Self {
            public_key: format!("dkg-key/{address}").into_bytes(),
            calls: Arc::default(),
        }
    }

    fn check_sorted(cohort: &[Validator]) -> Result<()> {
        ensure!(
            cohort.windows(2).all(|w| w[0].address < w[1].address),
            "validators are not strictly sorted by address",
        );
        Ok(())
    }
}

impl RitualCryptoEngine for MockRitualCrypto {
    fn public_key(&self) -> Result<Vec<u8>> {
        Ok(self.public_key.clone())
    }

    fn generate_transcript(
        &self,
        validators: &[Validator],
        _threshold: u16,
        _shares: u16,
        me: Address,
        ritual_id: RitualId,
    ) -> Result<Transcript> {
        self.calls.generate.fetch_add(1, Ordering::SeqCst);
        if self.calls.fail_next_generate.swap(false, Ordering::SeqCst) {
            bail!("mock crypto engine failure");
        }
        Self::check_sorted(validators)?;
        Ok(Transcript(
            format!("transcript/{ritual_id}/{me}").into_bytes(),
        ))
    }

    fn aggregate_transcripts(
        &self,
        cohort: &[(Validator, Transcript)],
        _threshold: u16,
        _shares: u16,
        _me: Address,
        ritual_id: RitualId,
    ) -> Result<(AggregatedTranscript, DkgPublicKey)> {
        self.calls.aggregate.fetch_add(1, Ordering::SeqCst);
        let validators: Vec<_> = cohort.iter().map(|(v, _)| v.clone()).collect();
        Self::check_sorted(&validators)?;
        Ok((
            AggregatedTranscript(
                format!("aggregate/{ritual_id}/{}", cohort.len()).into_bytes(),
            ),
            DkgPublicKey(format!("dkg-public-key/{ritual_id}").into_bytes()),
        ))
    }

    fn derive_decryption_share(
        &self,
        cohort: &[(Validator, Transcript)],
        _threshold: u16,
        _shares: u16,
        me: Address,
        ritual_id: RitualId,
        _aggregated: &AggregatedTranscript,
        _ciphertext: &[u8],
        _conditions: &[u8],
        variant: ShareVariant,
    ) -> Result<DecryptionShare> {
        self.calls.derive.fetch_add(1, Ordering::SeqCst);
        let validators: Vec<_> = cohort.iter().map(|(v, _)| v.clone()).collect();
        Self::check_sorted(&validators)?;
        Ok(DecryptionShare(
            format!("share/{ritual_id}/{me}/{variant}").into_bytes(),
        ))
    }
}

impl ThresholdRequestCrypto for MockRitualCrypto {
    fn request_static_key(&self, ritual_id: RitualId) -> Result<Vec<u8>> {
        Ok(format!("request-key/{ritual_id}/{}", hex::encode(&self.public_key)).into_bytes())
    }
}

/// Peer directory backed by a shared map; peers appear when a test (or a
/// spawned task standing in for discovery) inserts them.
#[derive(Debug, Clone, Default)]
pub struct MockPeerDirectory {
    peers: Arc<Mutex<BTreeMap<Address, PeerInfo>>>,
}

impl MockPeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, address: Address, public_key: Vec<u8>) {
        self.peers.lock().insert(address, PeerInfo { public_key });
    }

    fn missing(&self, addresses: &[Address]) -> Vec<Address> {
        let peers = self.peers.lock();
        addresses
            .iter()
            .copied()
            .filter(|address| !peers.contains_key(address))
            .collect()
    }
}

#[async_trait]
impl PeerDirectory for MockPeerDirectory {
    fn known_peer(&self, address: Address) -> Option<PeerInfo> {
        self.peers.lock().get(&address).cloned()
    }

    async fn wait_for_peers(
        &self,
        addresses: &[Address],
        timeout: Duration,
        allow_missing: bool,
    ) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let missing = self.missing(addresses);
            if missing.is_empty() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                if allow_missing {
                    return Ok(());
                }
                bail!(
                    "peers not discovered within {timeout:?}: {}",
                    missing
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
