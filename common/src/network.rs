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

//! The peer directory boundary used by validator resolution.

use crate::primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use core::time::Duration;

/// What validator resolution needs to know about a live peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// The peer's current DKG session public key.
    pub public_key: Vec<u8>,
}

/// Discovery and lookup of cohort peers.
///
/// Peer discovery internals (transports, reputation) are outside this
/// workspace; the ritualist only needs bounded waiting and key lookup.
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    /// The peer's info if it is already known locally.
    fn known_peer(&self, address: Address) -> Option<PeerInfo>;

    /// Blocks until all `addresses` are known or `timeout` elapses.
    ///
    /// With `allow_missing`, an exhausted timeout returns `Ok(())` and the
    /// caller re-checks [`Self::known_peer`]; otherwise it is an error
    /// naming the peers that were never discovered.
    async fn wait_for_peers(
        &self,
        addresses: &[Address],
        timeout: Duration,
        allow_missing: bool,
    ) -> Result<()>;
}
