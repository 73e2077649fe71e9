use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::contract::ContractAccessor;
use crate::errors::{VoteError, VoteResult};
use crate::labels::{can_edit_labels, CandidateLabels, LabelStore};
use crate::network::{NetworkGuard, NetworkMismatch};
use crate::provider::{TxReceipt, WalletProvider};
use crate::session::{Session, SessionManager, SessionUpdate};
use crate::sync::{PollerHandle, VoteSynchronizer, VotingSnapshot};
use crate::vote::{VoteFlow, VotePhase};

/// Top-level wiring of the voting client.
///
/// Owns one instance of every component and funnels all state mutation
/// through them; consumers hold this context and read snapshots.
pub struct VotingApp {
    config: AppConfig,
    provider: Arc<dyn WalletProvider>,
    session: SessionManager,
    sync: Arc<VoteSynchronizer>,
    flow: VoteFlow,
    guard: NetworkGuard,
    labels: LabelStore,
    poller: Mutex<Option<PollerHandle>>,
}

impl VotingApp {
    /// Wire up all components against the given provider.
    ///
    /// Succeeds even with a missing contract address so the UI can render a
    /// predictable disabled state; the accessors fail fast on first use.
    pub fn initialize(config: AppConfig, provider: Arc<dyn WalletProvider>) -> Self {
        let session = SessionManager::new(Arc::clone(&provider));
        let accessor = ContractAccessor::new(Arc::clone(&provider), config.clone());
        let sync = Arc::new(VoteSynchronizer::new(accessor.clone(), session.clone()));
        let flow = VoteFlow::new(accessor, session.clone(), Arc::clone(&sync));
        let guard = NetworkGuard::new(
            Arc::clone(&provider),
            session.clone(),
            config.required_chain_id,
        );
        let labels = LabelStore::new(&config.label_store_path);
        info!(
            contract = %config.contract_address,
            chain_id = config.required_chain_id,
            configured = config.is_contract_configured(),
            "voting app initialized"
        );
        Self {
            config,
            provider,
            session,
            sync,
            flow,
            guard,
            labels,
            poller: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> Session {
        self.session.snapshot()
    }

    pub async fn connect(&self) -> VoteResult<Session> {
        let session = self.session.connect().await?;
        // Voted flag and banner state depend on the new identity.
        if let Err(err) = self.sync.refresh().await {
            warn!(error = %err, "refresh after connect failed");
        }
        Ok(session)
    }

    /// Resume an already-authorized wallet session without prompting.
    pub async fn resume(&self) -> VoteResult<Option<Session>> {
        let session = self.session.resume().await?;
        if session.is_some() {
            if let Err(err) = self.sync.refresh().await {
                warn!(error = %err, "refresh after resume failed");
            }
        }
        Ok(session)
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    /// The current published snapshot, contract names untouched.
    pub fn snapshot(&self) -> VotingSnapshot {
        self.sync.snapshot()
    }

    /// The current snapshot with local label overrides applied.
    pub fn display_snapshot(&self) -> VotingSnapshot {
        let mut snapshot = self.sync.snapshot();
        self.labels.load().apply(&mut snapshot);
        snapshot
    }

    pub fn last_refresh_error(&self) -> Option<String> {
        self.sync.last_error()
    }

    pub async fn refresh(&self) -> VoteResult<VotingSnapshot> {
        self.sync.refresh().await
    }

    /// Begin periodic polling; the first refresh happens immediately.
    pub fn start_polling(&self) {
        let mut poller = self.poller.lock();
        if poller.is_some() {
            return;
        }
        *poller = Some(self.sync.spawn_poller(self.config.poll_interval));
    }

    /// Stop polling and wait for the loop to exit.
    pub async fn shutdown(&self) {
        let handle = self.poller.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }

    pub fn vote_phase(&self) -> watch::Receiver<VotePhase> {
        self.flow.phase()
    }

    pub async fn vote(&self, candidate_id: u64) -> VoteResult<TxReceipt> {
        self.flow.vote(candidate_id).await
    }

    pub async fn check_network(&self) -> VoteResult<Option<NetworkMismatch>> {
        self.guard.check_network().await
    }

    pub async fn switch_network(&self) -> VoteResult<Option<NetworkMismatch>> {
        self.guard.switch_network().await
    }

    /// Drain wallet notifications and apply them to the session.
    ///
    /// A chain or account change invalidates all chain-dependent state: the
    /// snapshot is re-read wholesale rather than patched.
    pub async fn pump_events(&self) -> VoteResult<SessionUpdate> {
        let events = self.provider.drain_events();
        let update = self.session.apply_events(&events);
        if update.needs_reload() {
            info!(?update, "session changed, reloading chain-dependent state");
            if let Err(err) = self.sync.refresh().await {
                warn!(error = %err, "reload refresh failed");
            }
        }
        Ok(update)
    }

    pub fn candidate_labels(&self) -> CandidateLabels {
        self.labels.load()
    }

    /// Whether the current account may edit display labels (cosmetic gate).
    pub fn can_edit_labels(&self) -> bool {
        can_edit_labels(
            self.session.account().as_deref(),
            self.config.admin_address.as_deref(),
        )
    }

    /// Set a display label override for one candidate.
    pub fn set_candidate_label(&self, candidate_id: u64, label: &str) -> VoteResult<()> {
        if !self.can_edit_labels() {
            return Err(VoteError::Validation(
                "label editing is restricted to the configured admin account".to_string(),
            ));
        }
        self.labels.set_label(candidate_id, label)?;
        Ok(())
    }
}
