use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{VoteError, VoteResult};

/// Sentinel value shipped in example configuration; must never reach the network.
pub const PLACEHOLDER_CONTRACT_ADDRESS: &str = "0xYourContractAddressHere";

/// Default snapshot polling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Sepolia testnet, where the voting contract is deployed by default.
pub const DEFAULT_REQUIRED_CHAIN_ID: u64 = 11_155_111;

const DEFAULT_BRIDGE_ENDPOINT: &str = "http://localhost:8545";
const DEFAULT_LABEL_STORE_FILE: &str = "tally-labels.json";

static ADDRESS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("address regex must compile"));

/// Startup configuration for the voting client.
///
/// The contract address is the only required value; everything else has a
/// working default. The admin address is a client-side display hint only and
/// is never enforced on-chain.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub contract_address: String,
    pub admin_address: Option<String>,
    pub required_chain_id: u64,
    pub poll_interval: Duration,
    pub bridge_endpoint: String,
    pub label_store_path: PathBuf,
}

impl AppConfig {
    pub fn new(contract_address: impl Into<String>) -> Self {
        Self {
            contract_address: contract_address.into(),
            admin_address: None,
            required_chain_id: DEFAULT_REQUIRED_CHAIN_ID,
            poll_interval: DEFAULT_POLL_INTERVAL,
            bridge_endpoint: DEFAULT_BRIDGE_ENDPOINT.to_string(),
            label_store_path: PathBuf::from(DEFAULT_LABEL_STORE_FILE),
        }
    }

    /// Build configuration from `TALLY_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::new(
            std::env::var("TALLY_CONTRACT_ADDRESS").unwrap_or_default(),
        );
        if let Ok(admin) = std::env::var("TALLY_ADMIN_ADDRESS") {
            if !admin.is_empty() {
                config.admin_address = Some(admin);
            }
        }
        if let Ok(raw) = std::env::var("TALLY_CHAIN_ID") {
            if let Ok(chain_id) = raw.parse() {
                config.required_chain_id = chain_id;
            }
        }
        if let Ok(raw) = std::env::var("TALLY_POLL_SECONDS") {
            if let Ok(seconds) = raw.parse::<u64>() {
                config.poll_interval = Duration::from_secs(seconds.max(1));
            }
        }
        if let Ok(endpoint) = std::env::var("TALLY_BRIDGE_URL") {
            if !endpoint.is_empty() {
                config.bridge_endpoint = endpoint;
            }
        }
        if let Ok(path) = std::env::var("TALLY_LABELS_PATH") {
            if !path.is_empty() {
                config.label_store_path = PathBuf::from(path);
            }
        }
        config
    }

    /// Validate the configured contract address.
    ///
    /// Called by the contract accessor before any network request is issued;
    /// a missing or placeholder address disables voting predictably instead of
    /// issuing calls to a sentinel address.
    pub fn validate_contract_address(&self) -> VoteResult<()> {
        if self.contract_address.is_empty() {
            return Err(VoteError::MisconfiguredAddress(
                "TALLY_CONTRACT_ADDRESS is not set".to_string(),
            ));
        }
        if self.contract_address == PLACEHOLDER_CONTRACT_ADDRESS {
            return Err(VoteError::MisconfiguredAddress(
                "contract address is the placeholder value".to_string(),
            ));
        }
        if !ADDRESS_PATTERN.is_match(&self.contract_address) {
            return Err(VoteError::MisconfiguredAddress(format!(
                "'{}' is not a valid 0x address",
                self.contract_address
            )));
        }
        Ok(())
    }

    pub fn is_contract_configured(&self) -> bool {
        self.validate_contract_address().is_ok()
    }
}

/// Validate an account address shape.
pub fn validate_account_address(address: &str) -> VoteResult<()> {
    if !ADDRESS_PATTERN.is_match(address) {
        return Err(VoteError::Validation(format!(
            "'{}' is not a valid 0x address",
            address
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    #[test]
    fn valid_address_accepted() {
        let config = AppConfig::new(GOOD_ADDRESS);
        assert!(config.validate_contract_address().is_ok());
        assert!(config.is_contract_configured());
    }

    #[test]
    fn placeholder_address_rejected() {
        let config = AppConfig::new(PLACEHOLDER_CONTRACT_ADDRESS);
        let err = config.validate_contract_address().unwrap_err();
        assert!(matches!(err, VoteError::MisconfiguredAddress(_)));
    }

    #[test]
    fn empty_and_malformed_addresses_rejected() {
        assert!(matches!(
            AppConfig::new("").validate_contract_address(),
            Err(VoteError::MisconfiguredAddress(_))
        ));
        assert!(matches!(
            AppConfig::new("0x1234").validate_contract_address(),
            Err(VoteError::MisconfiguredAddress(_))
        ));
        assert!(matches!(
            AppConfig::new("not-an-address").validate_contract_address(),
            Err(VoteError::MisconfiguredAddress(_))
        ));
    }

    #[test]
    fn account_address_validation() {
        assert!(validate_account_address(GOOD_ADDRESS).is_ok());
        assert!(validate_account_address("0xzz").is_err());
    }
}
