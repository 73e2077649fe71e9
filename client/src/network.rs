/// Network Guard
///
/// Compares the wallet's active chain against the chain the voting contract
/// is deployed on and offers a corrective switch. A mismatch is a persistent
/// warning state, never a thrown error; switching is user-retriable only.
use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::{VoteError, VoteResult};
use crate::provider::{WalletProvider, CODE_CHAIN_NOT_ADDED};
use crate::session::SessionManager;

/// Static metadata for a chain the wallet may need added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainNetwork {
    pub chain_id: u64,
    pub name: &'static str,
    pub currency_name: &'static str,
    pub currency_symbol: &'static str,
    pub decimals: u8,
    pub rpc_url: &'static str,
    pub block_explorer: &'static str,
}

pub const KNOWN_NETWORKS: &[ChainNetwork] = &[
    ChainNetwork {
        chain_id: 1,
        name: "Ethereum Mainnet",
        currency_name: "Ether",
        currency_symbol: "ETH",
        decimals: 18,
        rpc_url: "https://eth.llamarpc.com",
        block_explorer: "https://etherscan.io",
    },
    ChainNetwork {
        chain_id: 11_155_111,
        name: "Sepolia Testnet",
        currency_name: "Sepolia ETH",
        currency_symbol: "SEP",
        decimals: 18,
        rpc_url: "https://rpc.sepolia.org",
        block_explorer: "https://sepolia.etherscan.io",
    },
    ChainNetwork {
        chain_id: 137,
        name: "Polygon Mainnet",
        currency_name: "POL",
        currency_symbol: "POL",
        decimals: 18,
        rpc_url: "https://polygon-rpc.com",
        block_explorer: "https://polygonscan.com",
    },
];

pub fn network_by_chain_id(chain_id: u64) -> Option<&'static ChainNetwork> {
    KNOWN_NETWORKS.iter().find(|n| n.chain_id == chain_id)
}

/// Block-explorer URL for a transaction, when the chain is known.
pub fn tx_explorer_url(tx_hash: &str, chain_id: u64) -> Option<String> {
    network_by_chain_id(chain_id).map(|n| format!("{}/tx/{}", n.block_explorer, tx_hash))
}

/// Block-explorer URL for an address, when the chain is known.
pub fn address_explorer_url(address: &str, chain_id: u64) -> Option<String> {
    network_by_chain_id(chain_id).map(|n| format!("{}/address/{}", n.block_explorer, address))
}

/// Warning-banner state: the wallet is on the wrong chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkMismatch {
    pub current: u64,
    pub required: u64,
    pub required_name: Option<&'static str>,
}

pub struct NetworkGuard {
    provider: Arc<dyn WalletProvider>,
    session: SessionManager,
    required_chain_id: u64,
}

impl NetworkGuard {
    pub fn new(
        provider: Arc<dyn WalletProvider>,
        session: SessionManager,
        required_chain_id: u64,
    ) -> Self {
        Self {
            provider,
            session,
            required_chain_id,
        }
    }

    /// `None` when no session is active or the chain already matches.
    pub async fn check_network(&self) -> VoteResult<Option<NetworkMismatch>> {
        if !self.session.is_active() {
            return Ok(None);
        }
        let current = self.provider.chain_id().await?;
        if current == self.required_chain_id {
            return Ok(None);
        }
        Ok(Some(NetworkMismatch {
            current,
            required: self.required_chain_id,
            required_name: network_by_chain_id(self.required_chain_id).map(|n| n.name),
        }))
    }

    /// Request a switch to the required chain, adding it to the wallet first
    /// when the wallet does not know it. Failures are logged and leave the
    /// warning in place; the returned value is the re-checked banner state.
    pub async fn switch_network(&self) -> VoteResult<Option<NetworkMismatch>> {
        match self.provider.switch_chain(self.required_chain_id).await {
            Ok(()) => {
                info!(chain_id = self.required_chain_id, "network switched");
            }
            Err(VoteError::Rpc { code, .. }) if code == CODE_CHAIN_NOT_ADDED => {
                info!(
                    chain_id = self.required_chain_id,
                    "chain unknown to wallet, requesting add"
                );
                let definition = self.add_chain_definition()?;
                if let Err(err) = self.provider.add_chain(definition).await {
                    warn!(error = %err, "failed to add chain to wallet");
                } else if let Err(err) = self.provider.switch_chain(self.required_chain_id).await {
                    warn!(error = %err, "switch after chain add failed");
                }
            }
            Err(err) => {
                warn!(error = %err, "network switch failed");
            }
        }
        self.check_network().await
    }

    fn add_chain_definition(&self) -> VoteResult<serde_json::Value> {
        let network = network_by_chain_id(self.required_chain_id).ok_or_else(|| {
            VoteError::Validation(format!(
                "no metadata for required chain {}",
                self.required_chain_id
            ))
        })?;
        Ok(serde_json::json!({
            "chainId": format!("0x{:x}", network.chain_id),
            "chainName": network.name,
            "nativeCurrency": {
                "name": network.currency_name,
                "symbol": network.currency_symbol,
                "decimals": network.decimals,
            },
            "rpcUrls": [network.rpc_url],
            "blockExplorerUrls": [network.block_explorer],
        }))
    }
}
