/// Chain/Contract Accessor
///
/// Resolves the configured wallet provider into read- or write-capable
/// handles bound to the fixed voting contract address. Pure factory: owns no
/// mutable state. Address validation happens here, before any network call.
use std::sync::Arc;

use crate::abi;
use crate::config::AppConfig;
use crate::errors::{VoteError, VoteResult};
use crate::provider::{TxReceipt, WalletProvider};
use crate::session::SessionManager;

#[derive(Clone)]
pub struct ContractAccessor {
    provider: Arc<dyn WalletProvider>,
    config: AppConfig,
}

impl ContractAccessor {
    pub fn new(provider: Arc<dyn WalletProvider>, config: AppConfig) -> Self {
        Self { provider, config }
    }

    /// Read-capable handle; usable without a connected account.
    pub fn reader(&self) -> VoteResult<ReadContract> {
        self.config.validate_contract_address()?;
        Ok(ReadContract {
            provider: Arc::clone(&self.provider),
            address: self.config.contract_address.clone(),
        })
    }

    /// Write-capable handle; requires an active wallet session.
    pub fn writer(&self, session: &SessionManager) -> VoteResult<WriteContract> {
        self.config.validate_contract_address()?;
        let from = session.account().ok_or(VoteError::NoSigner)?;
        Ok(WriteContract {
            provider: Arc::clone(&self.provider),
            address: self.config.contract_address.clone(),
            from,
        })
    }

    /// The wallet's currently active chain id.
    pub async fn chain_id(&self) -> VoteResult<u64> {
        self.provider.chain_id().await
    }
}

/// Read accessor bound to the voting contract.
pub struct ReadContract {
    provider: Arc<dyn WalletProvider>,
    address: String,
}

impl ReadContract {
    /// Full candidate list with per-candidate vote counts, in contract order.
    pub async fn get_candidates(&self) -> VoteResult<Vec<(String, u64)>> {
        let data = abi::get_candidates_calldata();
        let raw = self.provider.call(&self.address, &data).await?;
        abi::decode_candidates_return(&raw)
    }

    /// Whether the given account has already voted.
    pub async fn has_voted(&self, account: &str) -> VoteResult<bool> {
        let data = abi::has_voted_calldata(account)?;
        let raw = self.provider.call(&self.address, &data).await?;
        abi::decode_bool_return(&raw)
    }
}

/// Write accessor bound to the voting contract and a signing account.
pub struct WriteContract {
    provider: Arc<dyn WalletProvider>,
    address: String,
    from: String,
}

impl WriteContract {
    /// Submit a `vote(candidateId)` transaction; returns the transaction hash.
    pub async fn submit_vote(&self, candidate_id: u64) -> VoteResult<String> {
        let payload = serde_json::json!({
            "from": self.from,
            "to": self.address,
            "data": format!("0x{}", hex::encode(abi::vote_calldata(candidate_id))),
        });
        self.provider.send_transaction(payload).await
    }

    /// Await on-chain inclusion of a submitted transaction.
    pub async fn wait_for_receipt(&self, tx_hash: &str) -> VoteResult<TxReceipt> {
        self.provider.wait_for_receipt(tx_hash).await
    }

    pub fn signer_account(&self) -> &str {
        &self.from
    }
}
