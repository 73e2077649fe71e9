use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VoteError {
    // Session and provider availability
    NoProvider,
    UserRejected(String),
    NoSigner,

    // Configuration
    MisconfiguredAddress(String),

    // Vote submission outcomes
    AlreadyVoted,
    InvalidCandidate(String),
    SubmissionFailed(String),

    // Transport
    Network(String),
    Rpc { code: i64, message: String },

    // Local storage and input
    Storage(String),
    Validation(String),

    // Wire/ABI decoding
    Codec(String),
}

impl fmt::Display for VoteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VoteError::NoProvider => {
                write!(f, "No Web3 wallet provider found; install a wallet extension")
            }
            VoteError::UserRejected(msg) => write!(f, "Request rejected by user: {}", msg),
            VoteError::NoSigner => write!(f, "No wallet session; connect a wallet first"),

            VoteError::MisconfiguredAddress(msg) => {
                write!(f, "Contract address misconfigured: {}", msg)
            }

            VoteError::AlreadyVoted => write!(f, "This account has already voted"),
            VoteError::InvalidCandidate(msg) => write!(f, "Invalid candidate: {}", msg),
            VoteError::SubmissionFailed(msg) => write!(f, "Vote submission failed: {}", msg),

            VoteError::Network(msg) => write!(f, "Network error: {}", msg),
            VoteError::Rpc { code, message } => write!(f, "RPC error {}: {}", code, message),

            VoteError::Storage(msg) => write!(f, "Storage error: {}", msg),
            VoteError::Validation(msg) => write!(f, "Validation error: {}", msg),

            VoteError::Codec(msg) => write!(f, "Decoding error: {}", msg),
        }
    }
}

impl std::error::Error for VoteError {}

pub type VoteResult<T> = Result<T, VoteError>;

// Conversion helpers
impl From<std::io::Error> for VoteError {
    fn from(error: std::io::Error) -> Self {
        VoteError::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for VoteError {
    fn from(error: serde_json::Error) -> Self {
        VoteError::Validation(format!("JSON error: {}", error))
    }
}

impl VoteError {
    /// The JSON-RPC error code carried by this error, if any.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            VoteError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}
