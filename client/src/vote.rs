/// Vote Submission Flow
///
/// Submits a single vote transaction, awaits confirmation, classifies the
/// outcome into a user-facing error, and triggers one resynchronization on
/// success. Nothing here retries; a failed attempt ends and the user must
/// invoke `vote` again.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::contract::ContractAccessor;
use crate::errors::{VoteError, VoteResult};
use crate::provider::{TxReceipt, CODE_USER_REJECTED};
use crate::session::SessionManager;
use crate::sync::VoteSynchronizer;

/// Progress of the current vote attempt, for the UI to render distinguishable
/// states. The vote control stays disabled while any non-idle phase is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotePhase {
    Idle,
    Submitting,
    AwaitingConfirmation,
    Settled,
}

pub struct VoteFlow {
    accessor: ContractAccessor,
    session: SessionManager,
    sync: Arc<VoteSynchronizer>,
    phase_tx: watch::Sender<VotePhase>,
    busy: AtomicBool,
}

impl VoteFlow {
    pub fn new(
        accessor: ContractAccessor,
        session: SessionManager,
        sync: Arc<VoteSynchronizer>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(VotePhase::Idle);
        Self {
            accessor,
            session,
            sync,
            phase_tx,
            busy: AtomicBool::new(false),
        }
    }

    /// Observe phase transitions of vote attempts.
    pub fn phase(&self) -> watch::Receiver<VotePhase> {
        self.phase_tx.subscribe()
    }

    /// Submit a vote for the candidate at the given index.
    ///
    /// Fails fast, without any network call, when the local snapshot already
    /// shows a cast vote or the id references no known candidate.
    pub async fn vote(&self, candidate_id: u64) -> VoteResult<TxReceipt> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(VoteError::Validation(
                "a vote is already in progress".to_string(),
            ));
        }
        let result = self.vote_inner(candidate_id).await;
        let _ = self.phase_tx.send(VotePhase::Idle);
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn vote_inner(&self, candidate_id: u64) -> VoteResult<TxReceipt> {
        let snapshot = self.sync.snapshot();
        if snapshot.has_voted {
            return Err(VoteError::AlreadyVoted);
        }
        if candidate_id as usize >= snapshot.candidates.len() {
            return Err(VoteError::InvalidCandidate(format!(
                "candidate {} does not exist",
                candidate_id
            )));
        }

        let writer = self.accessor.writer(&self.session)?;

        let _ = self.phase_tx.send(VotePhase::Submitting);
        let result = async {
            let tx_hash = writer.submit_vote(candidate_id).await?;
            info!(tx_hash = %tx_hash, candidate_id, "vote submitted, awaiting confirmation");
            let _ = self.phase_tx.send(VotePhase::AwaitingConfirmation);
            let receipt = writer.wait_for_receipt(&tx_hash).await?;
            if !receipt.status {
                let reason = receipt
                    .revert_reason
                    .clone()
                    .unwrap_or_else(|| "transaction reverted".to_string());
                return Err(VoteError::SubmissionFailed(reason));
            }
            Ok(receipt)
        }
        .await;
        let _ = self.phase_tx.send(VotePhase::Settled);

        match result {
            Ok(receipt) => {
                info!(candidate_id, "vote confirmed");
                self.sync.mark_voted();
                // Exactly one follow-up refresh; its failure is a poll
                // concern, not a vote failure.
                if let Err(err) = self.sync.refresh().await {
                    warn!(error = %err, "post-vote refresh failed");
                }
                Ok(receipt)
            }
            Err(err) => {
                let classified = classify_submission_error(err);
                if classified == VoteError::AlreadyVoted {
                    // The chain knew better than our last snapshot; record it
                    // so further attempts fail fast locally.
                    self.sync.mark_voted();
                }
                error!(error = %classified, candidate_id, "vote attempt failed");
                Err(classified)
            }
        }
    }
}

/// Map a raw submission failure to the user-facing taxonomy.
///
/// Mutually exclusive, first match wins: user rejection, already voted,
/// invalid candidate, then generic failure.
pub fn classify_submission_error(err: VoteError) -> VoteError {
    match &err {
        VoteError::UserRejected(_)
        | VoteError::AlreadyVoted
        | VoteError::InvalidCandidate(_)
        | VoteError::NoSigner
        | VoteError::MisconfiguredAddress(_) => return err,
        VoteError::Rpc { code, message } if *code == CODE_USER_REJECTED => {
            return VoteError::UserRejected(message.clone());
        }
        _ => {}
    }

    let message = err.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("already") || lowered.contains("voted") {
        VoteError::AlreadyVoted
    } else if lowered.contains("invalid") || lowered.contains("candidate") {
        VoteError::InvalidCandidate(message)
    } else {
        VoteError::SubmissionFailed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_code_wins_over_message_content() {
        let err = classify_submission_error(VoteError::Rpc {
            code: CODE_USER_REJECTED,
            message: "user denied an already voted thing".into(),
        });
        assert!(matches!(err, VoteError::UserRejected(_)));
    }

    #[test]
    fn already_voted_detected_from_revert_text() {
        let err = classify_submission_error(VoteError::SubmissionFailed(
            "execution reverted: You have already voted".into(),
        ));
        assert_eq!(err, VoteError::AlreadyVoted);

        let err = classify_submission_error(VoteError::Rpc {
            code: -32000,
            message: "sender voted before".into(),
        });
        assert_eq!(err, VoteError::AlreadyVoted);
    }

    #[test]
    fn invalid_candidate_detected_after_already_voted() {
        let err = classify_submission_error(VoteError::Rpc {
            code: -32000,
            message: "execution reverted: Invalid candidate ID".into(),
        });
        assert!(matches!(err, VoteError::InvalidCandidate(_)));
    }

    #[test]
    fn everything_else_is_submission_failure() {
        let err = classify_submission_error(VoteError::Network("connection reset".into()));
        assert!(matches!(err, VoteError::SubmissionFailed(_)));
    }

    #[test]
    fn preclassified_errors_pass_through() {
        assert_eq!(
            classify_submission_error(VoteError::AlreadyVoted),
            VoteError::AlreadyVoted
        );
        assert_eq!(
            classify_submission_error(VoteError::NoSigner),
            VoteError::NoSigner
        );
    }
}
