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

//! On-chain ritual state observer.
//!
//! The tracker is a single recurring polling task: each tick it scans the
//! coordinator contract's events since its cursor, reconciles the set of
//! rituals needing local action against the authoritative records, and
//! dispatches the phase-appropriate protocol step to the ritualist. There
//! is no push channel from the chain; arbitrarily delayed or reordered
//! event visibility at the RPC layer must be tolerated, which is why
//! events only ever *select* rituals and never carry state.

use anyhow::Result;
use ritex_common::{
    Address, BlockId, CoordinatorClient, CoordinatorEvent, RitualId, RitualStatus,
};
use ritex_ritualist::{RitualStep, Ritualist};
use std::{collections::BTreeSet, sync::Arc, time::Duration};
use tokio::{sync::watch, time::MissedTickBehavior};


/// Default number of trailing blocks sampled to estimate the average
/// block time.
pub const DEFAULT_SAMPLE_WINDOW: u64 = 100;

/// Bound on the walk-back loop of the first-scan estimation. In practice
/// the estimate is off by single-digit blocks; a chain with block
/// production irregular enough to exhaust this is scanned from genesis.
const MAX_WALK_BACK: u64 = 1024;

/// Tracker construction parameters, injected explicitly.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Interval between scan ticks.
    pub poll_interval: Duration,
    /// Block count used by the first-scan block-time estimate.
    pub sample_window: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            sample_window: DEFAULT_SAMPLE_WINDOW,
        }
    }
}

/// Operator-facing tracker state, published on a watch channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStatus {
    pub latest_block: u64,
    pub last_scanned_block: u64,
    pub tracked_rituals: usize,
}

/// The local node's standing in a ritual, read from the authoritative
/// on-chain participant record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participation {
    NotParticipating,
    Participating {
        posted_transcript: bool,
        posted_aggregate: bool,
    },
}

/// What a single scan tick covered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub from: u64,
    pub to: u64,
    /// Distinct rituals processed in this batch.
    pub rituals: usize,
    /// Rituals whose processing failed and stays queued for the next tick.
    pub failed: usize,
}

/// Maintains the local view of which rituals exist and need action.
pub struct ActiveRitualTracker {
    coordinator: Arc<dyn CoordinatorClient>,
    ritualist: Ritualist,
    me: Address,
    config: TrackerConfig,
    /// Last block covered by a completed scan; `None` until the first
    /// scan derives its start block. Lost on restart by design: the
    /// first-scan estimate makes restart-from-scratch correct.
    cursor: Option<u64>,
    /// Rituals the local node participates in that are still in flight.
    active: BTreeSet<RitualId>,
    /// Rituals that need no further dispatch (terminal, or this node is
    /// not a participant).
    done: BTreeSet<RitualId>,
    status: TrackerStatus,
    status_sender: watch::Sender<TrackerStatus>,
}

impl ActiveRitualTracker {
    pub fn new(
        coordinator: Arc<dyn CoordinatorClient>,
        ritualist: Ritualist,
        config: TrackerConfig,
    ) -> Self {
        let (status_sender, _status_receiver) = watch::channel(TrackerStatus::default());
        let me = ritualist.address();
        Self {
            coordinator,
            ritualist,
            me,
            config,
            cursor: None,
            active: BTreeSet::new(),
            done: BTreeSet::new(),
            status: TrackerStatus::default(),
            status_sender,
        }
    }

    pub fn status_receiver(&self) -> watch::Receiver<TrackerStatus> {
        self.status_sender.subscribe()
    }

    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    pub fn ritualist(&self) -> &Ritualist {
        &self.ritualist
    }

    fn update_status<F>(&mut self, update_fn: F)
    where
        F: FnOnce(&mut TrackerStatus),
    {
        update_fn(&mut self.status);
        let _ = self.status_sender.send_replace(self.status);
    }

    /// Runs the tracker as its recurring scheduled task.
    ///
    /// A failed tick never kills the loop; the cursor was not advanced, so
    /// the next tick retries the same range plus whatever arrived since.
    pub async fn run(mut self) {
        log::info!(
            "active ritual tracker started (poll interval {:?})",
            self.config.poll_interval,
        );
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.scan(&[]).await {
                Ok(summary) => log::debug!(
                    "scan [{}, {}] touched {} rituals ({} failed)",
                    summary.from,
                    summary.to,
                    summary.rituals,
                    summary.failed,
                ),
                Err(err) => {
                    log::warn!("scan failed; retrying from the same cursor next tick: {err:#}")
                }
            }
        }
    }

    /// Estimates how far back the first scan must start so that no ritual
    /// still inside the contract's timeout window can be missed, without
    /// scanning the whole history on every cold start.
    ///
    /// Re-derived on every tracker start: the average block time drifts,
    /// so caching the result would be wrong.
    pub async fn first_scan_start_block(&self, sample_window: u64) -> Result<u64> {
        let latest = self.coordinator.block(BlockId::Latest).await?;
        if latest.height == 0 {
            return Ok(0);
        }
        if sample_window >= latest.height {
            // Not enough history to sample from; scan everything.
            return Ok(0);
        }

        let sample = self
            .coordinator
            .block(BlockId::Number(latest.height - sample_window))
            .await?;
        let average_block_time = latest.timestamp.saturating_sub(sample.timestamp) / sample_window;
        if average_block_time == 0 {
            log::warn!("zero average block time over the sample window; scanning from genesis");
            return Ok(0);
        }

        let timeout = self.coordinator.dkg_timeout().await?;
        let estimated_blocks_in_past = timeout / average_block_time;
        let mut candidate = latest.height.saturating_sub(estimated_blocks_in_past);

        let mut walked = 0;
        loop {
            if candidate == 0 {
                return Ok(0);
            }
            let header = self.coordinator.block(BlockId::Number(candidate)).await?;
            if latest.timestamp.saturating_sub(header.timestamp) >= timeout {
                break;
            }
            // The sampled average under-estimated the block time; step
            // further into the past. Timestamps are monotonic, so this
            // terminates.
            candidate -= 1;
            walked += 1;
            if walked > MAX_WALK_BACK {
                log::warn!(
                    "first-scan estimation walked back {MAX_WALK_BACK} blocks without \
                     covering the ritual timeout; scanning from genesis",
                );
                return Ok(0);
            }
        }

        // One block earlier than the point where the timeout guarantee
        // held, to avoid an off-by-one exclusion at the range edge.
        Ok(candidate.saturating_sub(1))
    }

    /// Scans `[cursor, latest]` for ritual events and dispatches local
    /// action where due. `fetch_rituals` are processed regardless of the
    /// block range (and even if previously retired).
    ///
    /// The cursor advances only when the scan itself completes; an
    /// events-query failure leaves it untouched so the next tick retries
    /// the same range. Individual rituals failing do not abort the batch:
    /// they stay on the active list and are retried next tick.
    pub async fn scan(&mut self, fetch_rituals: &[RitualId]) -> Result<ScanSummary> {
        let latest = self.coordinator.block(BlockId::Latest).await?;
        let from = match self.cursor {
            Some(cursor) => cursor,
            None => self.first_scan_start_block(self.config.sample_window).await?,
        };
        let to = latest.height;

        let events = self.coordinator.events_in_range(from, to).await?;
        log::trace!("scan [{from}, {to}]: {} events", events.len());

        let mut touched: BTreeSet<RitualId> = events
            .iter()
            .map(CoordinatorEvent::ritual_id)
            .filter(|id| !self.done.contains(id))
            .collect();
        touched.extend(self.active.iter().copied());
        touched.extend(fetch_rituals.iter().copied());

        let mut failed = 0;
        for &ritual_id in &touched {
            if let Err(err) = self.process_ritual(ritual_id).await {
                // One bad ritual must not block the rest of the batch.
                failed += 1;
                self.active.insert(ritual_id);
                log::warn!("ritual {ritual_id}: processing failed: {err:#}");
            }
        }

        self.cursor = Some(to);
        let tracked = self.active.len();
        self.update_status(|status| {
            status.latest_block = to;
            status.last_scanned_block = to;
            status.tracked_rituals = tracked;
        });

        Ok(ScanSummary {
            from,
            to,
            rituals: touched.len(),
            failed,
        })
    }

    /// Determines whether this node appears in the ritual's participant
    /// list and how far its contribution has progressed.
    ///
    /// Reads the authoritative participant record, never a local cache:
    /// the cache could be stale relative to a concurrent submission by
    /// this same node through another path.
    pub async fn resolve_local_participation(
        &self,
        ritual_id: RitualId,
    ) -> Result<Participation> {
        match self.coordinator.participant(ritual_id, self.me).await? {
            Some(participant) => Ok(Participation::Participating {
                posted_transcript: participant.posted_transcript(),
                posted_aggregate: participant.aggregated,
            }),
            None => Ok(Participation::NotParticipating),
        }
    }

    /// Reconciles one ritual against its authoritative record and
    /// dispatches the step its phase calls for. Dispatch is idempotent:
    /// already-handled phases come back as skips from the ritualist.
    async fn process_ritual(&mut self, ritual_id: RitualId) -> Result<()> {
        let ritual = self.coordinator.ritual(ritual_id, false).await?;

        if ritual.status.is_terminal() {
            match ritual.status {
                RitualStatus::Timeout => {
                    log::debug!("ritual {ritual_id} timed out; ceasing to track")
                }
                _ => log::debug!("ritual {ritual_id} finalized"),
            }
            self.active.remove(&ritual_id);
            self.done.insert(ritual_id);
            return Ok(());
        }

        let participation = self.resolve_local_participation(ritual_id).await?;
        let Participation::Participating {
            posted_transcript,
            posted_aggregate,
        } = participation
        else {
            log::debug!("ritual {ritual_id}: local node is not a participant");
            self.active.remove(&ritual_id);
            self.done.insert(ritual_id);
            return Ok(());
        };

        self.active.insert(ritual_id);
        self.done.remove(&ritual_id);

        let step = match ritual.status {
            RitualStatus::AwaitingTranscripts if !posted_transcript => {
                self.ritualist.perform_round_1(ritual_id).await?
            }
            RitualStatus::AwaitingAggregations if !posted_aggregate => {
                self.ritualist.perform_round_2(ritual_id).await?
            }
            status => {
                log::trace!("ritual {ritual_id}: nothing to do while {status}");
                return Ok(());
            }
        };

        match step {
            RitualStep::Posted(receipt) => log::info!(
                "ritual {ritual_id}: artifact posted in tx {}",
                receipt.tx_hash,
            ),
            RitualStep::Skipped(reason) => {
                log::debug!("ritual {ritual_id}: dispatch skipped: {reason}")
            }
        }
        Ok(())
    }
}
