use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::errors::{VoteError, VoteResult};
use crate::provider::{ProviderEvent, ProviderEventKind, WalletProvider};

/// The current wallet identity.
///
/// Invariant: `account` and `chain_id` are both set or both `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub account: Option<String>,
    pub chain_id: Option<u64>,
    pub is_connecting: bool,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.account.is_some()
    }
}

/// Outcome of applying a batch of provider events, consumed by the app layer
/// to decide which dependent state needs reloading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub disconnected: bool,
    pub account_changed: bool,
    pub chain_changed: Option<u64>,
}

impl SessionUpdate {
    /// Whether chain-dependent state must be reloaded wholesale.
    pub fn needs_reload(&self) -> bool {
        self.disconnected || self.account_changed || self.chain_changed.is_some()
    }
}

/// Owns the wallet connect/disconnect lifecycle and the account/chain identity.
///
/// All session mutation funnels through this manager; other components read
/// snapshots only.
#[derive(Clone)]
pub struct SessionManager {
    provider: Arc<dyn WalletProvider>,
    state: Arc<RwLock<Session>>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self {
            provider,
            state: Arc::new(RwLock::new(Session::default())),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.state.read().clone()
    }

    pub fn account(&self) -> Option<String> {
        self.state.read().account.clone()
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.state.read().chain_id
    }

    pub fn is_active(&self) -> bool {
        self.state.read().is_active()
    }

    /// Request account access from the wallet.
    ///
    /// Fails with `NoProvider` when no wallet is present and `UserRejected`
    /// when the permission prompt is denied. Re-entrant calls while a prompt
    /// is pending are refused.
    pub async fn connect(&self) -> VoteResult<Session> {
        {
            let mut state = self.state.write();
            if state.is_connecting {
                return Err(VoteError::Validation(
                    "a connection request is already pending".to_string(),
                ));
            }
            state.is_connecting = true;
        }

        let result = self.connect_inner().await;

        let mut state = self.state.write();
        state.is_connecting = false;
        match result {
            Ok((account, chain_id)) => {
                info!(account = %account, chain_id, "wallet connected");
                state.account = Some(account);
                state.chain_id = Some(chain_id);
                Ok(state.clone())
            }
            Err(err) => {
                warn!(error = %err, "wallet connection failed");
                Err(err)
            }
        }
    }

    async fn connect_inner(&self) -> VoteResult<(String, u64)> {
        if !self.provider.is_available().await {
            return Err(VoteError::NoProvider);
        }
        let accounts = self.provider.request_accounts().await?;
        let account = accounts
            .into_iter()
            .next()
            .ok_or_else(|| VoteError::UserRejected("no accounts authorized".to_string()))?;
        let chain_id = self.provider.chain_id().await?;
        Ok((account, chain_id))
    }

    /// Resume a session the wallet already authorized, without prompting.
    pub async fn resume(&self) -> VoteResult<Option<Session>> {
        if !self.provider.is_available().await {
            return Ok(None);
        }
        let accounts = self.provider.accounts().await?;
        let Some(account) = accounts.into_iter().next() else {
            return Ok(None);
        };
        let chain_id = self.provider.chain_id().await?;
        let mut state = self.state.write();
        state.account = Some(account);
        state.chain_id = Some(chain_id);
        Ok(Some(state.clone()))
    }

    /// Local-only reset. Wallet-side permission cannot be revoked from here.
    pub fn disconnect(&self) {
        let mut state = self.state.write();
        if state.is_active() {
            info!("wallet disconnected");
        }
        state.account = None;
        state.chain_id = None;
    }

    /// Apply wallet notifications to the session.
    ///
    /// Zero accounts means an implicit disconnect. A chain change keeps the
    /// session but signals that chain-dependent state must be fully reloaded,
    /// since a different chain may hold a different contract deployment or
    /// none at all.
    pub fn apply_events(&self, events: &[ProviderEvent]) -> SessionUpdate {
        let mut update = SessionUpdate::default();
        let mut state = self.state.write();
        for event in events {
            match &event.kind {
                ProviderEventKind::AccountsChanged(accounts) => {
                    if !state.is_active() {
                        continue;
                    }
                    match accounts.first() {
                        None => {
                            info!("all accounts revoked; treating as disconnect");
                            state.account = None;
                            state.chain_id = None;
                            update.disconnected = true;
                        }
                        Some(account) if state.account.as_deref() != Some(account.as_str()) => {
                            info!(account = %account, "active account changed");
                            state.account = Some(account.clone());
                            update.account_changed = true;
                        }
                        Some(_) => {}
                    }
                }
                ProviderEventKind::ChainChanged(chain_id) => {
                    if !state.is_active() {
                        continue;
                    }
                    if state.chain_id != Some(*chain_id) {
                        info!(chain_id, "active chain changed");
                        state.chain_id = Some(*chain_id);
                        update.chain_changed = Some(*chain_id);
                    }
                }
            }
        }
        update
    }
}
