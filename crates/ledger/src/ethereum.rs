//! alloy-backed [`LedgerClient`] for the stream manager contract.

use crate::client::{EventFilter, LedgerClient, LedgerConnector};
use crate::error::{LedgerError, Result};
use crate::keystore::load_signer;
use alloy::eips::BlockNumberOrTag;
use alloy::network::EthereumWallet;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use streamgate_types::{Address, EventKind, EventMeta, LedgerEvent, SessionId, B256, U256};
use tracing::debug;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    contract StreamManager {
        event StreamRequested(address indexed client, uint256 indexed streamId);
        event StreamApproved(uint256 indexed streamId);
        event StreamCreated(address indexed streamAddress, uint256 indexed streamId);
        event InputChunkAdded(uint256 indexed streamId, uint256 indexed chunkId);

        function requestStream(uint256 streamId, string calldata client, uint256[] calldata profiles) external;
        function createStream(uint256 streamId) external payable returns (address);
    }
}

/// Connection settings for [`EthereumLedger`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthereumLedgerConfig {
    pub rpc_url: String,
    pub contract_address: Address,
    /// Client name recorded with each stream request.
    #[serde(default = "default_client_tag")]
    pub client_tag: String,
    /// Transcoding profiles requested for each stream.
    #[serde(default = "default_profiles")]
    pub profiles: Vec<u64>,
}

fn default_client_tag() -> String {
    "streamgate".to_string()
}

fn default_profiles() -> Vec<u64> {
    vec![0, 1, 2]
}

impl EthereumLedgerConfig {
    pub fn new(rpc_url: impl Into<String>, contract_address: Address) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contract_address,
            client_tag: default_client_tag(),
            profiles: default_profiles(),
        }
    }
}

/// Stream manager client over an HTTP provider with a local signer.
pub struct EthereumLedger {
    provider: DynProvider,
    contract_address: Address,
    signer_address: Address,
    client_tag: String,
    profiles: Vec<U256>,
}

impl EthereumLedger {
    /// Build the provider. No network traffic happens until the first call.
    pub fn connect(config: &EthereumLedgerConfig, signer: PrivateKeySigner) -> Result<Self> {
        let rpc_url = config
            .rpc_url
            .parse()
            .map_err(|e| LedgerError::Config(format!("invalid RPC URL '{}': {}", config.rpc_url, e)))?;

        let signer_address = signer.address();
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(rpc_url)
            .erased();

        Ok(Self {
            provider,
            contract_address: config.contract_address,
            signer_address,
            client_tag: config.client_tag.clone(),
            profiles: config.profiles.iter().map(|p| U256::from(*p)).collect(),
        })
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    async fn fetch_logs<E: SolEvent>(
        &self,
        topic1: Vec<B256>,
        topic2: Vec<B256>,
    ) -> Result<Vec<(Log, E)>> {
        let filter = Filter::new()
            .address(self.contract_address)
            .event_signature(E::SIGNATURE_HASH)
            .topic1(topic1)
            .topic2(topic2)
            .from_block(BlockNumberOrTag::Earliest);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        debug!(event = E::SIGNATURE, count = logs.len(), "Fetched logs");

        logs.into_iter()
            .map(|log| {
                let decoded = E::decode_log_data(&log.inner.data).map_err(|e| LedgerError::Decode {
                    kind: kind_of::<E>(),
                    reason: e.to_string(),
                })?;
                Ok((log, decoded))
            })
            .collect()
    }
}

fn kind_of<E: SolEvent>() -> EventKind {
    match E::SIGNATURE_HASH {
        h if h == StreamManager::StreamRequested::SIGNATURE_HASH => EventKind::StreamRequested,
        h if h == StreamManager::StreamApproved::SIGNATURE_HASH => EventKind::StreamApproved,
        h if h == StreamManager::StreamCreated::SIGNATURE_HASH => EventKind::StreamCreated,
        _ => EventKind::InputChunkAdded,
    }
}

fn id_topics(ids: &[SessionId]) -> Vec<B256> {
    ids.iter().map(|id| u256_topic(id.as_u256())).collect()
}

fn u256_topic(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}

fn address_topics(addresses: &[Address]) -> Vec<B256> {
    addresses.iter().map(|a| a.into_word()).collect()
}

fn meta(log: &Log, stream_id: U256) -> EventMeta {
    EventMeta {
        address: log.inner.address,
        session_id: SessionId::new(stream_id),
        block_number: log.block_number.unwrap_or_default(),
        block_hash: log.block_hash.unwrap_or_default(),
        tx_hash: log.transaction_hash.unwrap_or_default(),
        tx_index: log.transaction_index.unwrap_or_default(),
    }
}

#[async_trait]
impl LedgerClient for EthereumLedger {
    fn signer_address(&self) -> Address {
        self.signer_address
    }

    async fn request_stream(&self, session_id: SessionId) -> Result<B256> {
        let contract = StreamManager::new(self.contract_address, self.provider.clone());
        let pending = contract
            .requestStream(
                session_id.as_u256(),
                self.client_tag.clone(),
                self.profiles.clone(),
            )
            .send()
            .await
            .map_err(|e| LedgerError::Submission(e.to_string()))?;

        Ok(*pending.tx_hash())
    }

    async fn create_stream(&self, session_id: SessionId, value: U256) -> Result<B256> {
        let contract = StreamManager::new(self.contract_address, self.provider.clone());
        let pending = contract
            .createStream(session_id.as_u256())
            .value(value)
            .send()
            .await
            .map_err(|e| LedgerError::Submission(e.to_string()))?;

        Ok(*pending.tx_hash())
    }

    async fn balance_of(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))
    }

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<LedgerEvent>> {
        let events = match filter {
            EventFilter::StreamRequested {
                clients,
                session_ids,
            } => self
                .fetch_logs::<StreamManager::StreamRequested>(
                    address_topics(clients),
                    id_topics(session_ids),
                )
                .await?
                .into_iter()
                .map(|(log, e)| LedgerEvent::StreamRequested(meta(&log, e.streamId)))
                .collect(),
            EventFilter::StreamCreated {
                stream_addresses,
                session_ids,
            } => self
                .fetch_logs::<StreamManager::StreamCreated>(
                    address_topics(stream_addresses),
                    id_topics(session_ids),
                )
                .await?
                .into_iter()
                .map(|(log, e)| LedgerEvent::StreamCreated {
                    meta: meta(&log, e.streamId),
                    stream_address: e.streamAddress,
                })
                .collect(),
            EventFilter::StreamApproved { session_ids } => self
                .fetch_logs::<StreamManager::StreamApproved>(id_topics(session_ids), Vec::new())
                .await?
                .into_iter()
                .map(|(log, e)| LedgerEvent::StreamApproved(meta(&log, e.streamId)))
                .collect(),
            EventFilter::InputChunkAdded {
                session_ids,
                chunk_ids,
            } => self
                .fetch_logs::<StreamManager::InputChunkAdded>(
                    id_topics(session_ids),
                    chunk_ids.iter().copied().map(u256_topic).collect(),
                )
                .await?
                .into_iter()
                .map(|(log, e)| LedgerEvent::InputChunkAdded {
                    meta: meta(&log, e.streamId),
                    chunk_id: e.chunkId,
                })
                .collect(),
        };

        Ok(events)
    }
}

/// Unlocks a JSON keystore and connects an [`EthereumLedger`] with it.
pub struct KeystoreConnector {
    config: EthereumLedgerConfig,
    keystore_path: PathBuf,
    password: String,
}

impl KeystoreConnector {
    pub fn new(
        config: EthereumLedgerConfig,
        keystore_path: impl Into<PathBuf>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            config,
            keystore_path: keystore_path.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl LedgerConnector for KeystoreConnector {
    async fn connect(&self) -> Result<Arc<dyn LedgerClient>> {
        let path = self.keystore_path.clone();
        let password = self.password.clone();

        // Keystore decryption is CPU bound.
        let signer = tokio::task::spawn_blocking(move || load_signer(&path, &password))
            .await
            .map_err(|e| LedgerError::Keystore(format!("keystore task failed: {}", e)))??;

        let ledger = EthereumLedger::connect(&self.config, signer)?;
        debug!(
            signer = %ledger.signer_address(),
            contract = %ledger.contract_address(),
            "Connected to ledger"
        );
        Ok(Arc::new(ledger))
    }
}
