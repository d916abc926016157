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

//! Alloy-backed implementation of the coordinator contract boundary.

use crate::{
    abi::{ritual_from_parts, ritual_status_from_u8, utils::*, ICoordinator},
    events::{signature_hash, try_extract_event},
};
use alloy::{
    eips::BlockNumberOrTag,
    network::EthereumWallet,
    primitives::Bytes,
    providers::{
        fillers::{ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::eth::{Filter, TransactionReceipt, Topic},
};
use anyhow::{anyhow, ensure, Context as _, Result};
use async_trait::async_trait;
use ritex_common::{
    Address, AggregatedTranscript, BlockHeader, BlockId, CoordinatorClient, CoordinatorEvent,
    DkgPublicKey, Participant, Ritual, RitualId, RitualStatus, Transcript, TxHash, TxReceipt,
};

mod abi;
pub mod events;

/// Max number of blocks per `eth_getLogs` query.
pub(crate) const MAX_QUERY_BLOCK_RANGE: u64 = 100_000;

pub(crate) type CoordinatorFiller = JoinFill<
    JoinFill<JoinFill<JoinFill<Identity, GasFiller>, NonceFiller>, ChainIdFiller>,
    WalletFiller<EthereumWallet>,
>;
pub(crate) type AlloyProvider = FillProvider<CoordinatorFiller, RootProvider>;

type Instance = ICoordinator::ICoordinatorInstance<(), AlloyProvider>;
type QueryInstance = ICoordinator::ICoordinatorInstance<(), RootProvider>;

/// Whether ritual transactions wait for inclusion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitMode {
    /// Wait for the receipt and fail on revert.
    #[default]
    WaitForReceipt,
    /// Return as soon as the transaction is accepted by the RPC node; the
    /// returned receipt carries the hash and a zero block number.
    FireAndForget,
}

async fn create_provider(rpc_url: &str, wallet: EthereumWallet) -> Result<AlloyProvider> {
    ProviderBuilder::default()
        .filler(GasFiller)
        .filler(NonceFiller::default())
        .filler(ChainIdFiller::default())
        .wallet(wallet)
        .connect(rpc_url)
        .await
        .context("failed to create ethereum provider")
}

fn into_receipt(receipt: TransactionReceipt) -> Result<TxReceipt> {
    ensure!(
        receipt.status(),
        "transaction {} reverted",
        receipt.transaction_hash,
    );
    Ok(TxReceipt {
        tx_hash: TxHash(receipt.transaction_hash.0),
        block_number: receipt.block_number.unwrap_or_default(),
    })
}

async fn read_block(provider: &impl Provider, id: BlockId) -> Result<BlockHeader> {
    let tag = match id {
        BlockId::Latest => BlockNumberOrTag::Latest,
        BlockId::Number(number) => BlockNumberOrTag::Number(number),
    };
    let block = provider
        .get_block_by_number(tag)
        .await?
        .ok_or_else(|| anyhow!("block {id:?} not found"))?;
    Ok(BlockHeader {
        height: block.header.number,
        timestamp: block.header.timestamp,
    })
}

/// Full coordinator client bound to a transacting identity.
///
/// The wallet passed at construction signs every ritual transaction; gas,
/// nonce, and chain-id handling live in the provider's filler stack.
#[derive(Clone)]
pub struct Coordinator {
    instance: Instance,
    submit_mode: SubmitMode,
}

impl Coordinator {
    pub async fn new(
        rpc_url: &str,
        coordinator_address: Address,
        wallet: EthereumWallet,
        submit_mode: SubmitMode,
    ) -> Result<Self> {
        let provider = create_provider(rpc_url, wallet).await?;
        Ok(Self {
            instance: ICoordinator::new(address_to_alloy(coordinator_address), provider),
            submit_mode,
        })
    }

    pub fn address(&self) -> Address {
        alloy_to_address(*self.instance.address())
    }

    /// A read-only view over the same RPC connection.
    pub fn query(&self) -> CoordinatorQuery {
        CoordinatorQuery::from_provider(
            self.address(),
            self.instance.provider().root().clone(),
        )
    }
}

#[async_trait]
impl CoordinatorClient for Coordinator {
    async fn block(&self, id: BlockId) -> Result<BlockHeader> {
        read_block(self.instance.provider(), id).await
    }

    async fn ritual(&self, ritual_id: RitualId, with_participants: bool) -> Result<Ritual> {
        let data = self.instance.getRitual(ritual_id).call().await?;
        let status = self.ritual_status(ritual_id).await?;
        let participants = if with_participants {
            self.instance
                .getParticipants(ritual_id)
                .call()
                .await?
                .into_iter()
                .map(Into::into)
                .collect()
        } else {
            Vec::new()
        };
        Ok(ritual_from_parts(ritual_id, data, participants, status))
    }

    async fn ritual_status(&self, ritual_id: RitualId) -> Result<RitualStatus> {
        ritual_status_from_u8(self.instance.getRitualState(ritual_id).call().await?)
    }

    async fn participant(
        &self,
        ritual_id: RitualId,
        provider: Address,
    ) -> Result<Option<Participant>> {
        let provider = address_to_alloy(provider);
        if !self
            .instance
            .isParticipant(ritual_id, provider)
            .call()
            .await?
        {
            return Ok(None);
        }
        let participant = self
            .instance
            .getParticipant(ritual_id, provider)
            .call()
            .await?;
        Ok(Some(participant.into()))
    }

    async fn dkg_timeout(&self) -> Result<u64> {
        Ok(self.instance.timeout().call().await? as u64)
    }

    async fn events_in_range(&self, from: u64, to: u64) -> Result<Vec<CoordinatorEvent>> {
        let provider = self.instance.provider();
        let mut events = Vec::new();
        let mut start = from;
        while start <= to {
            let end = core::cmp::min(start + MAX_QUERY_BLOCK_RANGE - 1, to);
            let filter = Filter::new()
                .from_block(start)
                .to_block(end)
                .address(*self.instance.address())
                .event_signature(Topic::from_iter(signature_hash::ALL));

            for log in provider.get_logs(&filter).await? {
                if let Some(event) = try_extract_event(&log)? {
                    events.push(event);
                }
            }

            log::trace!("read coordinator events from {start} to {end}");
            start = end + 1;
        }
        Ok(events)
    }

    async fn post_transcript(
        &self,
        ritual_id: RitualId,
        transcript: &Transcript,
    ) -> Result<TxReceipt> {
        let builder = self
            .instance
            .postTranscript(ritual_id, Bytes::copy_from_slice(transcript.as_bytes()));
        let pending = builder.send().await?;
        match self.submit_mode {
            SubmitMode::FireAndForget => Ok(TxReceipt {
                tx_hash: TxHash(pending.tx_hash().0),
                block_number: 0,
            }),
            SubmitMode::WaitForReceipt => into_receipt(pending.get_receipt().await?),
        }
    }

    async fn post_aggregation(
        &self,
        ritual_id: RitualId,
        aggregated: &AggregatedTranscript,
        public_key: &DkgPublicKey,
        request_static_key: &[u8],
    ) -> Result<TxReceipt> {
        let builder = self.instance.postAggregation(
            ritual_id,
            Bytes::copy_from_slice(aggregated.as_bytes()),
            Bytes::copy_from_slice(public_key.as_bytes()),
            Bytes::copy_from_slice(request_static_key),
        );
        let pending = builder.send().await?;
        match self.submit_mode {
            SubmitMode::FireAndForget => Ok(TxReceipt {
                tx_hash: TxHash(pending.tx_hash().0),
                block_number: 0,
            }),
            SubmitMode::WaitForReceipt => into_receipt(pending.get_receipt().await?),
        }
    }
}

/// Read-only coordinator access for consumers that never transact.
#[derive(Clone)]
pub struct CoordinatorQuery(QueryInstance);

impl CoordinatorQuery {
    pub async fn new(rpc_url: &str, coordinator_address: Address) -> Result<Self> {
        let provider = ProviderBuilder::default()
            .connect(rpc_url)
            .await
            .context("failed to create ethereum provider")?;
        Ok(Self::from_provider(coordinator_address, provider))
    }

    pub fn from_provider(coordinator_address: Address, provider: RootProvider) -> Self {
        Self(ICoordinator::new(
            address_to_alloy(coordinator_address),
            provider,
        ))
    }

    pub async fn block(&self, id: BlockId) -> Result<BlockHeader> {
        read_block(self.0.provider(), id).await
    }

    pub async fn ritual_status(&self, ritual_id: RitualId) -> Result<RitualStatus> {
        ritual_status_from_u8(self.0.getRitualState(ritual_id).call().await?)
    }

    pub async fn dkg_timeout(&self) -> Result<u64> {
        Ok(self.0.timeout().call().await? as u64)
    }
}
