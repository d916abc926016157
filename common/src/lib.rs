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

//! Ritex common types and traits.

pub mod chain;
pub mod crypto;
pub mod db;
pub mod events;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod network;

mod primitives;
mod ritual;

pub use chain::{BlockId, CoordinatorClient};
pub use crypto::{
    AggregatedTranscript, DecryptionShare, DkgPublicKey, RitualCryptoEngine, ShareVariant,
    ThresholdRequestCrypto, Transcript, Validator,
};
pub use db::{DkgRecord, DkgStorageRO, DkgStorageRW, RitualStore};
pub use events::CoordinatorEvent;
pub use network::{PeerDirectory, PeerInfo};
pub use primitives::{Address, BlockHeader, RitualId, TxHash, TxReceipt};
pub use ritual::{threshold_for_shares, Participant, Ritual, RitualStatus};
