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

//! Local cache of per-ritual cryptographic artifacts.

use crate::{
    crypto::{AggregatedTranscript, DkgPublicKey, Transcript},
    primitives::{RitualId, TxReceipt},
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

/// Locally owned per-ritual record.
///
/// A pure write-through cache: it avoids recomputation and keeps
/// transaction receipts for audit, while the contract stays authoritative.
/// Created lazily on first write, never destroyed automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkgRecord {
    pub transcript: Option<Transcript>,
    pub transcript_receipt: Option<TxReceipt>,
    pub aggregated_transcript: Option<AggregatedTranscript>,
    pub aggregation_receipt: Option<TxReceipt>,
    pub public_key: Option<DkgPublicKey>,
}

#[auto_impl::auto_impl(&, Box, Arc)]
pub trait DkgStorageRO {
    /// The record for a ritual, if one was ever written.
    fn dkg_record(&self, ritual_id: RitualId) -> Option<DkgRecord>;
}

#[auto_impl::auto_impl(&)]
pub trait DkgStorageRW: DkgStorageRO {
    /// NOTE: if the record doesn't exist yet, it is created with default
    /// values and then mutated.
    fn mutate_dkg_record(&self, ritual_id: RitualId, f: impl FnOnce(&mut DkgRecord));
}

/// In-memory ritual store.
///
/// Cheap to clone; clones share the underlying map. Only this node's own
/// engine writes to it, so a process-local lock is all the coordination
/// needed. Restart-from-scratch is always correct, only slower.
#[derive(Debug, Clone, Default)]
pub struct RitualStore {
    records: Arc<RwLock<BTreeMap<RitualId, DkgRecord>>>,
}

impl RitualStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ritual ids with a local record, for diagnostics.
    pub fn ritual_ids(&self) -> Vec<RitualId> {
        self.records.read().keys().copied().collect()
    }
}

impl DkgStorageRO for RitualStore {
    fn dkg_record(&self, ritual_id: RitualId) -> Option<DkgRecord> {
        self.records.read().get(&ritual_id).cloned()
    }
}

impl DkgStorageRW for RitualStore {
    fn mutate_dkg_record(&self, ritual_id: RitualId, f: impl FnOnce(&mut DkgRecord)) {
        f(self.records.write().entry(ritual_id).or_default())
    }
}
