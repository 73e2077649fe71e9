use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use tally_client::{
    abi, AppConfig, ProviderEvent, ProviderEventKind, TxReceipt, VoteError, VoteResult, VotingApp,
    WalletProvider, CODE_CHAIN_NOT_ADDED, CODE_USER_REJECTED,
};

const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const VOTER: &str = "0x90f79bf6eb2c4f870365e785982e1f101e93b906";
const SEPOLIA: u64 = 11_155_111;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum VoteOutcome {
    #[default]
    Confirm,
    RejectPrompt,
    RevertAlreadyVoted,
    RevertInvalidCandidate,
    TransportFailure,
}

#[derive(Default)]
struct MockState {
    available: bool,
    accounts: Vec<String>,
    chain_id: u64,
    known_chains: HashSet<u64>,
    candidates: Vec<(String, u64)>,
    voted: HashSet<String>,
    fail_reads: bool,
    vote_outcome: VoteOutcome,
    pending_candidate: Option<u64>,
    call_count: u64,
    candidate_reads: u64,
    send_count: u64,
    add_chain_count: u64,
    events: Vec<ProviderEvent>,
    event_seq: u64,
}

/// Scripted wallet standing in for the injected provider.
struct MockProvider {
    state: Mutex<MockState>,
}

impl MockProvider {
    fn new(candidates: Vec<(&str, u64)>) -> Arc<Self> {
        let mut known_chains = HashSet::new();
        known_chains.insert(1);
        known_chains.insert(SEPOLIA);
        Arc::new(Self {
            state: Mutex::new(MockState {
                available: true,
                accounts: vec![VOTER.to_string()],
                chain_id: SEPOLIA,
                known_chains,
                candidates: candidates
                    .into_iter()
                    .map(|(name, votes)| (name.to_string(), votes))
                    .collect(),
                ..MockState::default()
            }),
        })
    }

    fn set_chain(&self, chain_id: u64) {
        self.state.lock().chain_id = chain_id;
    }

    fn set_known_chains(&self, chains: &[u64]) {
        self.state.lock().known_chains = chains.iter().copied().collect();
    }

    fn set_vote_outcome(&self, outcome: VoteOutcome) {
        self.state.lock().vote_outcome = outcome;
    }

    fn set_fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    fn mark_voted(&self, account: &str) {
        self.state.lock().voted.insert(account.to_lowercase());
    }

    fn push_event(&self, kind: ProviderEventKind) {
        let mut state = self.state.lock();
        state.event_seq += 1;
        let sequence = state.event_seq;
        state.events.push(ProviderEvent { sequence, kind });
    }

    fn rpc_ops(&self) -> u64 {
        let state = self.state.lock();
        state.call_count + state.send_count
    }

    fn candidate_reads(&self) -> u64 {
        self.state.lock().candidate_reads
    }

    fn send_count(&self) -> u64 {
        self.state.lock().send_count
    }

    fn add_chain_count(&self) -> u64 {
        self.state.lock().add_chain_count
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn is_available(&self) -> bool {
        self.state.lock().available
    }

    async fn request_accounts(&self) -> VoteResult<Vec<String>> {
        Ok(self.state.lock().accounts.clone())
    }

    async fn accounts(&self) -> VoteResult<Vec<String>> {
        Ok(self.state.lock().accounts.clone())
    }

    async fn chain_id(&self) -> VoteResult<u64> {
        Ok(self.state.lock().chain_id)
    }

    async fn call(&self, to: &str, data: &[u8]) -> VoteResult<Vec<u8>> {
        assert_eq!(to.to_lowercase(), CONTRACT.to_lowercase());
        let mut state = self.state.lock();
        state.call_count += 1;
        if state.fail_reads {
            return Err(VoteError::Network("connection reset".into()));
        }
        if data == abi::get_candidates_calldata().as_slice() {
            state.candidate_reads += 1;
            return Ok(abi::encode_candidates_return(&state.candidates));
        }
        if data.len() == 36 && data[..4] == abi::selector("hasVoted(address)") {
            let account = format!("0x{}", hex::encode(&data[16..36]));
            return Ok(abi::encode_bool_return(state.voted.contains(&account)));
        }
        Err(VoteError::Rpc {
            code: -32601,
            message: "unknown call".into(),
        })
    }

    async fn send_transaction(&self, payload: serde_json::Value) -> VoteResult<String> {
        let mut state = self.state.lock();
        state.send_count += 1;
        match state.vote_outcome {
            VoteOutcome::RejectPrompt => Err(VoteError::Rpc {
                code: CODE_USER_REJECTED,
                message: "User rejected the request".into(),
            }),
            VoteOutcome::TransportFailure => Err(VoteError::Rpc {
                code: -32000,
                message: "nonce too low".into(),
            }),
            _ => {
                let data = payload
                    .get("data")
                    .and_then(|v| v.as_str())
                    .expect("vote payload carries calldata");
                let bytes = hex::decode(data.trim_start_matches("0x")).unwrap();
                let mut id_bytes = [0u8; 8];
                id_bytes.copy_from_slice(&bytes[28..36]);
                state.pending_candidate = Some(u64::from_be_bytes(id_bytes));
                Ok("0xdeadbeef".to_string())
            }
        }
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> VoteResult<TxReceipt> {
        let mut state = self.state.lock();
        match state.vote_outcome {
            VoteOutcome::Confirm => {
                let candidate = state.pending_candidate.take().expect("a pending vote");
                state.candidates[candidate as usize].1 += 1;
                let voter = state.accounts[0].to_lowercase();
                state.voted.insert(voter);
                Ok(TxReceipt {
                    transaction_hash: tx_hash.to_string(),
                    status: true,
                    block_number: Some(1),
                    revert_reason: None,
                })
            }
            VoteOutcome::RevertAlreadyVoted => Ok(TxReceipt {
                transaction_hash: tx_hash.to_string(),
                status: false,
                block_number: Some(1),
                revert_reason: Some("execution reverted: You have already voted".into()),
            }),
            VoteOutcome::RevertInvalidCandidate => Ok(TxReceipt {
                transaction_hash: tx_hash.to_string(),
                status: false,
                block_number: Some(1),
                revert_reason: Some("execution reverted: Invalid candidate ID".into()),
            }),
            _ => unreachable!("no receipt for failed submissions"),
        }
    }

    async fn switch_chain(&self, chain_id: u64) -> VoteResult<()> {
        let mut state = self.state.lock();
        if !state.known_chains.contains(&chain_id) {
            return Err(VoteError::Rpc {
                code: CODE_CHAIN_NOT_ADDED,
                message: "Unrecognized chain ID".into(),
            });
        }
        state.chain_id = chain_id;
        Ok(())
    }

    async fn add_chain(&self, definition: serde_json::Value) -> VoteResult<()> {
        let mut state = self.state.lock();
        state.add_chain_count += 1;
        let raw = definition
            .get("chainId")
            .and_then(|v| v.as_str())
            .expect("add-chain definition carries chainId");
        let chain_id = u64::from_str_radix(raw.trim_start_matches("0x"), 16).unwrap();
        state.known_chains.insert(chain_id);
        Ok(())
    }

    fn drain_events(&self) -> Vec<ProviderEvent> {
        std::mem::take(&mut self.state.lock().events)
    }
}

fn test_app(provider: Arc<MockProvider>, temp: &TempDir) -> VotingApp {
    let mut config = AppConfig::new(CONTRACT);
    config.poll_interval = Duration::from_millis(50);
    config.label_store_path = temp.path().join("labels.json");
    VotingApp::initialize(config, provider)
}

fn three_candidates() -> Vec<(&'static str, u64)> {
    vec![("Candidate A", 3), ("Candidate B", 1), ("Candidate C", 0)]
}

#[tokio::test]
async fn placeholder_address_fails_before_any_network_call() {
    let provider = MockProvider::new(three_candidates());
    let temp = TempDir::new().unwrap();
    let mut config = AppConfig::new(tally_client::PLACEHOLDER_CONTRACT_ADDRESS);
    config.label_store_path = temp.path().join("labels.json");
    let app = VotingApp::initialize(config, Arc::clone(&provider) as Arc<dyn WalletProvider>);

    let err = app.refresh().await.unwrap_err();
    assert!(matches!(err, VoteError::MisconfiguredAddress(_)));
    assert_eq!(provider.rpc_ops(), 0);
}

#[tokio::test]
async fn connect_and_refresh_builds_snapshot() {
    let provider = MockProvider::new(three_candidates());
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);

    let session = app.connect().await.unwrap();
    assert_eq!(session.account.as_deref(), Some(VOTER));
    assert_eq!(session.chain_id, Some(SEPOLIA));

    let snapshot = app.snapshot();
    assert_eq!(snapshot.candidates.len(), 3);
    assert_eq!(snapshot.candidates[0].id, 0);
    assert_eq!(snapshot.candidates[0].name, "Candidate A");
    assert_eq!(snapshot.candidates[0].vote_count, 3);
    assert_eq!(snapshot.total_votes(), 4);
    assert_eq!(snapshot.share_percent(0), Some(75.0));
    assert!(!snapshot.has_voted);
}

#[tokio::test]
async fn confirmed_vote_marks_flag_and_triggers_one_refresh() {
    let provider = MockProvider::new(three_candidates());
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);
    app.connect().await.unwrap();

    let reads_before = provider.candidate_reads();
    let receipt = app.vote(1).await.unwrap();
    assert!(receipt.status);

    let snapshot = app.snapshot();
    assert!(snapshot.has_voted);
    assert_eq!(snapshot.candidates[1].vote_count, 2);
    assert_eq!(provider.send_count(), 1);
    assert_eq!(provider.candidate_reads(), reads_before + 1);

    // The flow settles back to idle after the attempt.
    assert_eq!(*app.vote_phase().borrow(), tally_client::VotePhase::Idle);
}

#[tokio::test]
async fn already_voted_fails_fast_without_network_calls() {
    let provider = MockProvider::new(three_candidates());
    provider.mark_voted(VOTER);
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);
    app.connect().await.unwrap();
    assert!(app.snapshot().has_voted);

    let ops_before = provider.rpc_ops();
    let err = app.vote(0).await.unwrap_err();
    assert_eq!(err, VoteError::AlreadyVoted);
    assert_eq!(provider.rpc_ops(), ops_before);
}

#[tokio::test]
async fn unknown_candidate_id_fails_fast() {
    let provider = MockProvider::new(three_candidates());
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);
    app.connect().await.unwrap();

    let err = app.vote(99).await.unwrap_err();
    assert!(matches!(err, VoteError::InvalidCandidate(_)));
    assert_eq!(provider.send_count(), 0);
}

#[tokio::test]
async fn rejected_prompt_leaves_voted_flag_unchanged() {
    let provider = MockProvider::new(three_candidates());
    provider.set_vote_outcome(VoteOutcome::RejectPrompt);
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);
    app.connect().await.unwrap();

    let err = app.vote(0).await.unwrap_err();
    assert!(matches!(err, VoteError::UserRejected(_)));
    assert!(!app.snapshot().has_voted);
    assert_eq!(provider.send_count(), 1);
}

#[tokio::test]
async fn already_voted_revert_classifies_and_sets_flag() {
    let provider = MockProvider::new(three_candidates());
    provider.set_vote_outcome(VoteOutcome::RevertAlreadyVoted);
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);
    app.connect().await.unwrap();

    let err = app.vote(0).await.unwrap_err();
    assert_eq!(err, VoteError::AlreadyVoted);
    // Defensive fallback for races against a stale snapshot.
    assert!(app.snapshot().has_voted);
}

#[tokio::test]
async fn invalid_candidate_revert_classifies() {
    let provider = MockProvider::new(three_candidates());
    provider.set_vote_outcome(VoteOutcome::RevertInvalidCandidate);
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);
    app.connect().await.unwrap();

    let err = app.vote(0).await.unwrap_err();
    assert!(matches!(err, VoteError::InvalidCandidate(_)));
    assert!(!app.snapshot().has_voted);
}

#[tokio::test]
async fn transport_failure_classifies_as_submission_failed() {
    let provider = MockProvider::new(three_candidates());
    provider.set_vote_outcome(VoteOutcome::TransportFailure);
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);
    app.connect().await.unwrap();

    let err = app.vote(0).await.unwrap_err();
    assert!(matches!(err, VoteError::SubmissionFailed(_)));
}

#[tokio::test]
async fn network_check_is_silent_without_session() {
    let provider = MockProvider::new(three_candidates());
    provider.set_chain(1);
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);

    // Wrong chain, but nobody connected: no warning.
    assert_eq!(app.check_network().await.unwrap(), None);

    app.connect().await.unwrap();
    let mismatch = app.check_network().await.unwrap().expect("mismatch banner");
    assert_eq!(mismatch.current, 1);
    assert_eq!(mismatch.required, SEPOLIA);
    assert_eq!(mismatch.required_name, Some("Sepolia Testnet"));
}

#[tokio::test]
async fn switch_network_falls_back_to_add_chain() {
    let provider = MockProvider::new(three_candidates());
    provider.set_chain(1);
    provider.set_known_chains(&[1]);
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);
    app.connect().await.unwrap();

    assert!(app.check_network().await.unwrap().is_some());
    let after = app.switch_network().await.unwrap();
    assert_eq!(after, None);
    assert_eq!(provider.add_chain_count(), 1);
}

#[tokio::test]
async fn revoked_accounts_event_disconnects_and_reloads() {
    let provider = MockProvider::new(three_candidates());
    provider.mark_voted(VOTER);
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);
    app.connect().await.unwrap();
    assert!(app.snapshot().has_voted);

    provider.push_event(ProviderEventKind::AccountsChanged(vec![]));
    let update = app.pump_events().await.unwrap();
    assert!(update.disconnected);
    assert!(app.session().account.is_none());
    // The reload re-reads anonymously: voted flag is unknown, treated false.
    assert!(!app.snapshot().has_voted);
}

#[tokio::test]
async fn chain_change_event_triggers_full_reload() {
    let provider = MockProvider::new(three_candidates());
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);
    app.connect().await.unwrap();

    let reads_before = provider.candidate_reads();
    provider.push_event(ProviderEventKind::ChainChanged(137));
    let update = app.pump_events().await.unwrap();
    assert_eq!(update.chain_changed, Some(137));
    assert_eq!(app.session().chain_id, Some(137));
    assert_eq!(provider.candidate_reads(), reads_before + 1);
}

#[tokio::test]
async fn concurrent_refreshes_publish_one_complete_read() {
    let provider = MockProvider::new(three_candidates());
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);
    app.connect().await.unwrap();

    let (a, b) = tokio::join!(app.refresh(), app.refresh());
    a.unwrap();
    b.unwrap();

    let snapshot = app.snapshot();
    assert_eq!(snapshot.candidates.len(), 3);
    assert_eq!(snapshot.total_votes(), 4);
}

#[tokio::test]
async fn polling_refreshes_until_shutdown() {
    let provider = MockProvider::new(three_candidates());
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);

    app.start_polling();
    tokio::time::sleep(Duration::from_millis(160)).await;
    app.shutdown().await;

    let reads = provider.candidate_reads();
    assert!(reads >= 2, "expected immediate poll plus ticks, got {reads}");

    let reads_after = provider.candidate_reads();
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(provider.candidate_reads(), reads_after);
}

#[tokio::test]
async fn failed_refresh_retains_previous_snapshot() {
    let provider = MockProvider::new(three_candidates());
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);
    app.connect().await.unwrap();
    assert_eq!(app.snapshot().candidates.len(), 3);
    assert!(app.last_refresh_error().is_none());

    provider.set_fail_reads(true);
    assert!(app.refresh().await.is_err());
    // The stale-but-complete snapshot stays visible, with the error surfaced.
    assert_eq!(app.snapshot().candidates.len(), 3);
    assert!(app.last_refresh_error().is_some());

    provider.set_fail_reads(false);
    app.refresh().await.unwrap();
    assert!(app.last_refresh_error().is_none());
}

#[tokio::test]
async fn label_overrides_are_cosmetic_and_gated() {
    let provider = MockProvider::new(three_candidates());
    let temp = TempDir::new().unwrap();
    let app = test_app(Arc::clone(&provider), &temp);
    app.connect().await.unwrap();

    // No admin configured: anyone may edit.
    assert!(app.can_edit_labels());
    app.set_candidate_label(0, "Alice").unwrap();

    let display = app.display_snapshot();
    assert_eq!(display.candidates[0].name, "Alice");
    // The authoritative snapshot is untouched.
    assert_eq!(app.snapshot().candidates[0].name, "Candidate A");
}

#[tokio::test]
async fn label_editing_restricted_to_admin_account() {
    let provider = MockProvider::new(three_candidates());
    let temp = TempDir::new().unwrap();
    let mut config = AppConfig::new(CONTRACT);
    config.admin_address = Some("0x000000000000000000000000000000000000dEaD".to_string());
    config.label_store_path = temp.path().join("labels.json");
    let app = VotingApp::initialize(config, Arc::clone(&provider) as Arc<dyn WalletProvider>);
    app.connect().await.unwrap();

    assert!(!app.can_edit_labels());
    let err = app.set_candidate_label(0, "Mallory").unwrap_err();
    assert!(matches!(err, VoteError::Validation(_)));
}
