/// Wallet provider boundary
///
/// Models the injected-wallet convention (method-based JSON-RPC-shaped calls)
/// behind an object-safe trait so the rest of the client never touches the
/// transport directly. The concrete `HttpBridgeProvider` talks to a wallet
/// bridge endpoint over HTTP.
use std::time::Duration;

use parking_lot::Mutex;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{VoteError, VoteResult};

/// EIP-1193 error code: the user rejected the request.
pub const CODE_USER_REJECTED: i64 = 4001;
/// EIP-1193 error code: the requested chain has not been added to the wallet.
pub const CODE_CHAIN_NOT_ADDED: i64 = 4902;

/// A notification pushed by the wallet, drained explicitly by the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEvent {
    pub sequence: u64,
    pub kind: ProviderEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEventKind {
    AccountsChanged(Vec<String>),
    ChainChanged(u64),
}

/// Transaction receipt as reported by the wallet's request lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TxReceipt {
    pub transaction_hash: String,
    pub status: bool,
    pub block_number: Option<u64>,
    /// Revert reason, when the node surfaces one for a failed transaction.
    pub revert_reason: Option<String>,
}

/// The operations this client needs from an injected wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Whether a wallet is present at all. Checked before prompting.
    async fn is_available(&self) -> bool;

    /// Prompt the user for account access (`eth_requestAccounts`).
    async fn request_accounts(&self) -> VoteResult<Vec<String>>;

    /// Accounts already authorized, without prompting (`eth_accounts`).
    async fn accounts(&self) -> VoteResult<Vec<String>>;

    /// The wallet's currently active chain id.
    async fn chain_id(&self) -> VoteResult<u64>;

    /// Read-only contract call; returns the raw return data.
    async fn call(&self, to: &str, data: &[u8]) -> VoteResult<Vec<u8>>;

    /// Submit a transaction; returns the transaction hash.
    async fn send_transaction(&self, payload: serde_json::Value) -> VoteResult<String>;

    /// Await on-chain inclusion of a submitted transaction.
    async fn wait_for_receipt(&self, tx_hash: &str) -> VoteResult<TxReceipt>;

    /// Ask the wallet to switch its active chain.
    async fn switch_chain(&self, chain_id: u64) -> VoteResult<()>;

    /// Ask the wallet to add a chain it does not know about.
    async fn add_chain(&self, definition: serde_json::Value) -> VoteResult<()>;

    /// Drain accumulated account/chain change notifications.
    fn drain_events(&self) -> Vec<ProviderEvent>;
}

/// JSON-RPC request structure
#[derive(Debug, Serialize)]
struct JsonRpcRequest<T: Serialize> {
    jsonrpc: String,
    method: String,
    params: T,
    id: u64,
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
#[allow(dead_code)] // fields are populated via serde; not all are read by all call sites
struct JsonRpcResponse {
    jsonrpc: String,
    // `null` is a legitimate result (pending receipts, wallet_* acks), so a
    // missing or null field must reach the caller as Value::Null, not an error.
    #[serde(default)]
    result: serde_json::Value,
    error: Option<JsonRpcError>,
    id: u64,
}

/// JSON-RPC error structure
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Default)]
struct ObservedState {
    accounts: Vec<String>,
    chain_id: Option<u64>,
    event_seq: u64,
    events: Vec<ProviderEvent>,
}

impl ObservedState {
    fn push_event(&mut self, kind: ProviderEventKind) {
        self.event_seq = self.event_seq.saturating_add(1);
        self.events.push(ProviderEvent {
            sequence: self.event_seq,
            kind,
        });
    }

    fn note_accounts(&mut self, accounts: &[String]) {
        if self.accounts != accounts {
            self.accounts = accounts.to_vec();
            self.push_event(ProviderEventKind::AccountsChanged(accounts.to_vec()));
        }
    }

    fn note_chain(&mut self, chain_id: u64) {
        if self.chain_id != Some(chain_id) {
            let first_observation = self.chain_id.is_none();
            self.chain_id = Some(chain_id);
            if !first_observation {
                self.push_event(ProviderEventKind::ChainChanged(chain_id));
            }
        }
    }
}

/// HTTP client for the wallet bridge.
///
/// The bridge cannot push notifications over plain HTTP, so account and chain
/// changes are synthesized by comparing each response against the last
/// observed state.
pub struct HttpBridgeProvider {
    client: Client,
    base_url: String,
    observed: Mutex<ObservedState>,
}

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const RECEIPT_POLL_ATTEMPTS: u32 = 60;

impl HttpBridgeProvider {
    pub fn new(base_url: impl Into<String>) -> VoteResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VoteError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpBridgeProvider {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            observed: Mutex::new(ObservedState::default()),
        })
    }

    /// Make a JSON-RPC call to the wallet bridge
    async fn rpc_call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> VoteResult<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| VoteError::Network(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(VoteError::Network(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| VoteError::Network(format!("Failed to parse response: {}", e)))?;

        extract_result(rpc_response)
    }

    fn note_accounts(&self, accounts: &[String]) {
        self.observed.lock().note_accounts(accounts);
    }

    fn note_chain(&self, chain_id: u64) {
        self.observed.lock().note_chain(chain_id);
    }
}

#[async_trait]
impl WalletProvider for HttpBridgeProvider {
    async fn is_available(&self) -> bool {
        self.rpc_call::<serde_json::Value>("web3_clientVersion", serde_json::json!([]))
            .await
            .is_ok()
    }

    async fn request_accounts(&self) -> VoteResult<Vec<String>> {
        let accounts: Vec<String> = self
            .rpc_call("eth_requestAccounts", serde_json::json!([]))
            .await
            .map_err(map_user_rejection)?;
        self.note_accounts(&accounts);
        Ok(accounts)
    }

    async fn accounts(&self) -> VoteResult<Vec<String>> {
        let accounts: Vec<String> = self.rpc_call("eth_accounts", serde_json::json!([])).await?;
        self.note_accounts(&accounts);
        Ok(accounts)
    }

    async fn chain_id(&self) -> VoteResult<u64> {
        let raw: serde_json::Value = self.rpc_call("eth_chainId", serde_json::json!([])).await?;
        let chain_id = json_chain_id_to_u64(&raw)?;
        self.note_chain(chain_id);
        Ok(chain_id)
    }

    async fn call(&self, to: &str, data: &[u8]) -> VoteResult<Vec<u8>> {
        let params = serde_json::json!([
            { "to": to, "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);
        let raw: String = self.rpc_call("eth_call", params).await?;
        decode_hex_bytes(&raw)
    }

    async fn send_transaction(&self, payload: serde_json::Value) -> VoteResult<String> {
        self.rpc_call("eth_sendTransaction", serde_json::json!([payload]))
            .await
            .map_err(map_user_rejection)
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> VoteResult<TxReceipt> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            let raw: serde_json::Value = self
                .rpc_call("eth_getTransactionReceipt", serde_json::json!([tx_hash]))
                .await?;
            if !raw.is_null() {
                return parse_receipt(&raw);
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
        Err(VoteError::Network(format!(
            "Timed out waiting for receipt of {}",
            tx_hash
        )))
    }

    async fn switch_chain(&self, chain_id: u64) -> VoteResult<()> {
        let params = serde_json::json!([{ "chainId": format!("0x{:x}", chain_id) }]);
        let _: serde_json::Value = self
            .rpc_call("wallet_switchEthereumChain", params)
            .await
            .map_err(map_user_rejection)?;
        self.note_chain(chain_id);
        Ok(())
    }

    async fn add_chain(&self, definition: serde_json::Value) -> VoteResult<()> {
        let _: serde_json::Value = self
            .rpc_call("wallet_addEthereumChain", serde_json::json!([definition]))
            .await
            .map_err(map_user_rejection)?;
        Ok(())
    }

    fn drain_events(&self) -> Vec<ProviderEvent> {
        std::mem::take(&mut self.observed.lock().events)
    }
}

fn extract_result<T: for<'de> Deserialize<'de>>(response: JsonRpcResponse) -> VoteResult<T> {
    if let Some(error) = response.error {
        return Err(VoteError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    serde_json::from_value(response.result)
        .map_err(|e| VoteError::Network(format!("Unexpected RPC result shape: {}", e)))
}

fn map_user_rejection(err: VoteError) -> VoteError {
    match err {
        VoteError::Rpc { code, message } if code == CODE_USER_REJECTED => {
            VoteError::UserRejected(message)
        }
        other => other,
    }
}

fn parse_receipt(raw: &serde_json::Value) -> VoteResult<TxReceipt> {
    let transaction_hash = raw
        .get("transactionHash")
        .and_then(|v| v.as_str())
        .ok_or_else(|| VoteError::Network("Receipt missing transactionHash".to_string()))?
        .to_string();
    let status = raw
        .get("status")
        .and_then(|v| v.as_str())
        .map(|s| s == "0x1" || s == "0x01")
        .unwrap_or(false);
    let block_number = raw
        .get("blockNumber")
        .and_then(|v| v.as_str())
        .and_then(|s| parse_hex_or_decimal(s).ok());
    let revert_reason = raw
        .get("revertReason")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    Ok(TxReceipt {
        transaction_hash,
        status,
        block_number,
        revert_reason,
    })
}

/// Parse a chain id that wallets report as either a number or a 0x/decimal string.
pub fn json_chain_id_to_u64(value: &serde_json::Value) -> VoteResult<u64> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let raw = value
        .as_str()
        .ok_or_else(|| VoteError::Validation("chain id must be string or number".to_string()))?;
    parse_hex_or_decimal(raw)
}

fn parse_hex_or_decimal(raw: &str) -> VoteResult<u64> {
    if let Some(stripped) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(stripped, 16)
            .map_err(|e| VoteError::Validation(format!("invalid hex value '{}': {}", raw, e)))
    } else {
        raw.parse()
            .map_err(|e| VoteError::Validation(format!("invalid value '{}': {}", raw, e)))
    }
}

fn decode_hex_bytes(raw: &str) -> VoteResult<Vec<u8>> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(stripped).map_err(|e| VoteError::Codec(format!("invalid hex payload: {}", e)))
}
