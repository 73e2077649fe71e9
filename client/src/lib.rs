// lib.rs - Core library structure for the voting client

pub mod abi;
pub mod app;
pub mod config;
pub mod contract;
pub mod errors;
pub mod labels;
pub mod network;
pub mod provider;
pub mod session;
pub mod sync;
pub mod vote;

// Re-export common types
pub use app::VotingApp;
pub use config::{AppConfig, DEFAULT_POLL_INTERVAL, PLACEHOLDER_CONTRACT_ADDRESS};
pub use contract::{ContractAccessor, ReadContract, WriteContract};
pub use errors::{VoteError, VoteResult};
pub use labels::{can_edit_labels, CandidateLabels, LabelStore};
pub use network::{
    address_explorer_url, network_by_chain_id, tx_explorer_url, ChainNetwork, NetworkGuard,
    NetworkMismatch, KNOWN_NETWORKS,
};
pub use provider::{
    HttpBridgeProvider, ProviderEvent, ProviderEventKind, TxReceipt, WalletProvider,
    CODE_CHAIN_NOT_ADDED, CODE_USER_REJECTED,
};
pub use session::{Session, SessionManager, SessionUpdate};
pub use sync::{Candidate, PollerHandle, VoteSynchronizer, VotingSnapshot};
pub use vote::{classify_submission_error, VoteFlow, VotePhase};
