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

use super::*;
use anyhow::Result;
use rand::seq::SliceRandom;
use ritex_common::{
    mock::{MockCoordinator, MockPeerDirectory, MockRitualCrypto},
    BlockHeader, BlockId, CoordinatorEvent, Participant, Ritual, Transcript,
};
use std::{
    sync::atomic::Ordering,
    time::{Duration, Instant},
};

fn addresses<const N: usize>() -> [Address; N] {
    core::array::from_fn(|i| Address([i as u8 + 1; 20]))
}

fn world<const N: usize>() -> (MockCoordinator, MockPeerDirectory, [Address; N]) {
    let addrs = addresses::<N>();
    let coordinator = MockCoordinator::new(addrs[0]);
    let peers = MockPeerDirectory::new();
    for address in addrs {
        peers.insert(address, format!("dkg-key/{address}").into_bytes());
    }
    (coordinator, peers, addrs)
}

struct TestNode {
    ritualist: Ritualist,
    crypto: MockRitualCrypto,
}

fn make_node(coordinator: &MockCoordinator, peers: &MockPeerDirectory, me: Address) -> TestNode {
    let crypto = MockRitualCrypto::for_node(me);
    let ritualist = Ritualist::new(
        Arc::new(coordinator.with_sender(me)),
        Arc::new(crypto.clone()),
        Arc::new(crypto.clone()),
        Arc::new(peers.clone()),
        RitualStore::new(),
        me,
        Duration::from_millis(200),
    );
    TestNode { ritualist, crypto }
}

fn ritual_record(providers: &[Address]) -> Ritual {
    Ritual {
        id: 1,
        initiator: providers[0],
        authority: providers[0],
        participants: providers.iter().copied().map(Participant::new).collect(),
        threshold: threshold_for_shares(providers.len() as u16),
        shares: providers.len() as u16,
        init_timestamp: 0,
        total_transcripts: 0,
        total_aggregations: 0,
        aggregated_transcript: None,
        public_key: None,
        status: RitualStatus::AwaitingTranscripts,
    }
}

#[tokio::test]
async fn round1_posts_transcript() {
    let (coordinator, peers, [a, b, c]) = world::<3>();
    let id = coordinator.new_ritual(a, &[a, b, c]);
    let node = make_node(&coordinator, &peers, a);

    let step = node.ritualist.perform_round_1(id).await.unwrap();
    let RitualStep::Posted(receipt) = step else {
        panic!("expected a posted transcript, got {step:?}");
    };

    let onchain = coordinator.participant(id, a).await.unwrap().unwrap();
    assert!(onchain.posted_transcript());
    assert_eq!(node.crypto.calls.generate.load(Ordering::SeqCst), 1);

    let record = node.ritualist.store().dkg_record(id).unwrap();
    assert_eq!(record.transcript.unwrap().0, onchain.transcript);
    assert_eq!(record.transcript_receipt, Some(receipt));
}

#[tokio::test]
async fn round1_is_idempotent() {
    let (coordinator, peers, [a, b, c]) = world::<3>();
    let id = coordinator.new_ritual(a, &[a, b, c]);
    let node = make_node(&coordinator, &peers, a);

    assert!(matches!(
        node.ritualist.perform_round_1(id).await.unwrap(),
        RitualStep::Posted(_),
    ));
    // The second dispatch must see the on-chain record and stop before
    // touching the crypto engine.
    assert_eq!(
        node.ritualist.perform_round_1(id).await.unwrap(),
        RitualStep::Skipped(SkipReason::AlreadyPosted),
    );
    assert_eq!(node.crypto.calls.generate.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn round1_skips_non_participants() {
    let (coordinator, peers, [a, b, c, d]) = world::<4>();
    let id = coordinator.new_ritual(a, &[a, b, c]);
    let outsider = make_node(&coordinator, &peers, d);

    assert_eq!(
        outsider.ritualist.perform_round_1(id).await.unwrap(),
        RitualStep::Skipped(SkipReason::NotParticipating),
    );
    assert_eq!(outsider.crypto.calls.generate.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn round1_resubmits_cached_transcript_after_crash() {
    let (coordinator, peers, [a, b]) = world::<2>();
    let id = coordinator.new_ritual(a, &[a, b]);
    let node = make_node(&coordinator, &peers, a);

    // A previous run generated and cached the transcript, then died before
    // its transaction landed.
    node.ritualist.store().mutate_dkg_record(id, |record| {
        record.transcript = Some(Transcript(b"cached".to_vec()));
    });

    assert!(matches!(
        node.ritualist.perform_round_1(id).await.unwrap(),
        RitualStep::Posted(_),
    ));
    assert_eq!(node.crypto.calls.generate.load(Ordering::SeqCst), 0);

    let onchain = coordinator.participant(id, a).await.unwrap().unwrap();
    assert_eq!(onchain.transcript, b"cached".to_vec());
}

#[tokio::test]
async fn round1_detects_passed_phase() {
    let (coordinator, peers, [a, b]) = world::<2>();
    let id = coordinator.new_ritual(a, &[a, b]);
    for node in [a, b] {
        coordinator
            .with_sender(node)
            .post_transcript(id, &Transcript(vec![1]))
            .await
            .unwrap();
    }

    let node = make_node(&coordinator, &peers, a);
    assert_eq!(
        node.ritualist.perform_round_1(id).await.unwrap(),
        RitualStep::Skipped(SkipReason::PhasePassed(RitualStatus::AwaitingAggregations)),
    );
    assert_eq!(node.crypto.calls.generate.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn round1_crypto_failure_is_retried_by_next_dispatch() {
    let (coordinator, peers, [a, b]) = world::<2>();
    let id = coordinator.new_ritual(a, &[a, b]);
    let node = make_node(&coordinator, &peers, a);

    node.crypto
        .calls
        .fail_next_generate
        .store(true, Ordering::SeqCst);
    assert!(node.ritualist.perform_round_1(id).await.is_err());
    // Nothing was cached or posted, so the next dispatch starts over.
    assert!(node.ritualist.store().dkg_record(id).is_none());

    assert!(matches!(
        node.ritualist.perform_round_1(id).await.unwrap(),
        RitualStep::Posted(_),
    ));
    assert_eq!(node.crypto.calls.generate.load(Ordering::SeqCst), 2);
}

/// Delegating client that serves a stale (diverged) status, the way a
/// lagging RPC endpoint can.
struct StaleStatusClient {
    inner: MockCoordinator,
    status: RitualStatus,
}

#[async_trait::async_trait]
impl CoordinatorClient for StaleStatusClient {
    async fn block(&self, id: BlockId) -> Result<BlockHeader> {
        self.inner.block(id).await
    }

    async fn ritual(&self, ritual_id: RitualId, with_participants: bool) -> Result<Ritual> {
        self.inner.ritual(ritual_id, with_participants).await
    }

    async fn ritual_status(&self, _ritual_id: RitualId) -> Result<RitualStatus> {
        Ok(self.status)
    }

    async fn participant(
        &self,
        ritual_id: RitualId,
        provider: Address,
    ) -> Result<Option<Participant>> {
        self.inner.participant(ritual_id, provider).await
    }

    async fn dkg_timeout(&self) -> Result<u64> {
        self.inner.dkg_timeout().await
    }

    async fn events_in_range(&self, from: u64, to: u64) -> Result<Vec<CoordinatorEvent>> {
        self.inner.events_in_range(from, to).await
    }

    async fn post_transcript(
        &self,
        ritual_id: RitualId,
        transcript: &Transcript,
    ) -> Result<TxReceipt> {
        self.inner.post_transcript(ritual_id, transcript).await
    }

    async fn post_aggregation(
        &self,
        ritual_id: RitualId,
        aggregated: &AggregatedTranscript,
        public_key: &ritex_common::DkgPublicKey,
        request_static_key: &[u8],
    ) -> Result<TxReceipt> {
        self.inner
            .post_aggregation(ritual_id, aggregated, public_key, request_static_key)
            .await
    }
}

#[tokio::test]
async fn round2_requires_complete_transcripts() {
    let (coordinator, peers, [a, b, c]) = world::<3>();
    let id = coordinator.new_ritual(a, &[a, b, c]);
    // Only two of three transcripts are in.
    for node in [b, c] {
        coordinator
            .with_sender(node)
            .post_transcript(id, &Transcript(vec![1]))
            .await
            .unwrap();
    }

    let crypto = MockRitualCrypto::for_node(a);
    let stale = StaleStatusClient {
        inner: coordinator.with_sender(a),
        status: RitualStatus::AwaitingAggregations,
    };
    let ritualist = Ritualist::new(
        Arc::new(stale),
        Arc::new(crypto.clone()),
        Arc::new(crypto.clone()),
        Arc::new(peers.clone()),
        RitualStore::new(),
        a,
        Duration::from_millis(200),
    );

    assert_eq!(
        ritualist.perform_round_2(id).await.unwrap(),
        RitualStep::Skipped(SkipReason::TranscriptsPending(1)),
    );
    assert_eq!(crypto.calls.aggregate.load(Ordering::SeqCst), 0);
}

async fn run_round_1(
    coordinator: &MockCoordinator,
    peers: &MockPeerDirectory,
    id: RitualId,
    nodes: &[Address],
) {
    for &address in nodes {
        let node = make_node(coordinator, peers, address);
        assert!(matches!(
            node.ritualist.perform_round_1(id).await.unwrap(),
            RitualStep::Posted(_),
        ));
    }
}

#[tokio::test]
async fn round2_posts_aggregate() {
    let (coordinator, peers, [a, b, c]) = world::<3>();
    let id = coordinator.new_ritual(a, &[a, b, c]);
    run_round_1(&coordinator, &peers, id, &[a, b, c]).await;

    let node = make_node(&coordinator, &peers, a);
    let step = node.ritualist.perform_round_2(id).await.unwrap();
    assert!(matches!(step, RitualStep::Posted(_)), "got {step:?}");
    assert_eq!(node.crypto.calls.aggregate.load(Ordering::SeqCst), 1);

    let onchain = coordinator.participant(id, a).await.unwrap().unwrap();
    assert!(onchain.aggregated);
    assert!(!onchain.decryption_request_static_key.is_empty());

    let ritual = coordinator.ritual(id, false).await.unwrap();
    let record = node.ritualist.store().dkg_record(id).unwrap();
    assert_eq!(ritual.aggregated_transcript, record.aggregated_transcript);
    assert_eq!(ritual.public_key, record.public_key);

    // Re-dispatch stops at the idempotency guard.
    assert_eq!(
        node.ritualist.perform_round_2(id).await.unwrap(),
        RitualStep::Skipped(SkipReason::AlreadyPosted),
    );
    assert_eq!(node.crypto.calls.aggregate.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn full_ceremony_finalizes() {
    let (coordinator, peers, [a, b, c]) = world::<3>();
    let id = coordinator.new_ritual(a, &[a, b, c]);
    run_round_1(&coordinator, &peers, id, &[a, b, c]).await;

    for address in [a, b, c] {
        let node = make_node(&coordinator, &peers, address);
        assert!(matches!(
            node.ritualist.perform_round_2(id).await.unwrap(),
            RitualStep::Posted(_),
        ));
    }

    assert_eq!(
        coordinator.ritual_status(id).await.unwrap(),
        RitualStatus::Finalized,
    );
}

#[tokio::test]
async fn decryption_share_requires_finalized_ritual() {
    let (coordinator, peers, [a, b, c]) = world::<3>();
    let id = coordinator.new_ritual(a, &[a, b, c]);
    run_round_1(&coordinator, &peers, id, &[a, b, c]).await;

    let node = make_node(&coordinator, &peers, a);
    let err = node
        .ritualist
        .derive_decryption_share(id, b"ciphertext", b"conditions", ShareVariant::Simple)
        .await
        .unwrap_err();

    assert_eq!(
        err.ritualist_error_kind(),
        Some(&ErrorKind::NotFinalized(RitualStatus::AwaitingAggregations)),
    );
    assert_eq!(node.crypto.calls.derive.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn decryption_share_derived_for_finalized_ritual() {
    let (coordinator, peers, [a, b, c]) = world::<3>();
    let id = coordinator.new_ritual(a, &[a, b, c]);
    run_round_1(&coordinator, &peers, id, &[a, b, c]).await;
    for address in [a, b, c] {
        let node = make_node(&coordinator, &peers, address);
        node.ritualist.perform_round_2(id).await.unwrap();
    }

    let node = make_node(&coordinator, &peers, a);
    let share = node
        .ritualist
        .derive_decryption_share(id, b"ciphertext", b"conditions", ShareVariant::Precomputed)
        .await
        .unwrap();

    assert!(!share.0.is_empty());
    assert_eq!(node.crypto.calls.derive.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn resolution_orders_validators_deterministically() {
    let addrs = addresses::<5>();
    let peers = MockPeerDirectory::new();
    for address in addrs {
        peers.insert(address, format!("dkg-key/{address}").into_bytes());
    }
    let crypto = MockRitualCrypto::for_node(addrs[0]);
    let resolver = ValidatorResolver::new(
        Arc::new(peers),
        Arc::new(crypto),
        addrs[0],
        Duration::from_millis(100),
    );

    let mut rng = rand::thread_rng();
    let mut providers = addrs.to_vec();
    let mut previous = None;
    for _ in 0..16 {
        providers.shuffle(&mut rng);
        let cohort = resolver.resolve(&ritual_record(&providers)).await.unwrap();

        let resolved: Vec<Address> = cohort.iter().map(|(v, _)| v.address).collect();
        let mut sorted = addrs.to_vec();
        sorted.sort();
        assert_eq!(resolved, sorted, "input order {providers:?}");

        if let Some(previous) = previous.take() {
            assert_eq!(previous, cohort);
        }
        previous = Some(cohort);
    }
}

#[tokio::test]
async fn resolution_names_undiscoverable_peer() {
    let [a, b, c] = addresses::<3>();
    let peers = MockPeerDirectory::new();
    // `b` is known; `c` never shows up.
    peers.insert(b, b"dkg-key-b".to_vec());

    let crypto = MockRitualCrypto::for_node(a);
    let timeout = Duration::from_millis(100);
    let resolver = ValidatorResolver::new(Arc::new(peers), Arc::new(crypto), a, timeout);

    let started = Instant::now();
    let err = resolver.resolve(&ritual_record(&[a, b, c])).await.unwrap_err();
    assert!(
        started.elapsed() >= timeout,
        "discovery window must be exhausted before failing",
    );
    assert_eq!(
        err.ritualist_error_kind(),
        Some(&ErrorKind::UnknownNode(c)),
    );
}

#[tokio::test]
async fn resolution_with_zero_timeout_fails_fast() {
    let [a, b] = addresses::<2>();
    let peers = MockPeerDirectory::new();
    let crypto = MockRitualCrypto::for_node(a);
    let resolver = ValidatorResolver::new(Arc::new(peers), Arc::new(crypto), a, Duration::ZERO);

    let started = Instant::now();
    let err = resolver.resolve(&ritual_record(&[a, b])).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(50));
    assert_eq!(
        err.ritualist_error_kind(),
        Some(&ErrorKind::UnknownNode(b)),
    );
}

#[tokio::test]
async fn resolution_picks_up_late_peers() {
    let [a, b] = addresses::<2>();
    let peers = MockPeerDirectory::new();
    let crypto = MockRitualCrypto::for_node(a);
    let resolver = ValidatorResolver::new(
        Arc::new(peers.clone()),
        Arc::new(crypto),
        a,
        Duration::from_millis(500),
    );

    let late = peers.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        late.insert(b, b"dkg-key-b".to_vec());
    });

    let cohort = resolver.resolve(&ritual_record(&[a, b])).await.unwrap();
    assert_eq!(cohort.len(), 2);
}
