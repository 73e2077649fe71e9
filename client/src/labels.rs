/// Local candidate-label overrides
///
/// Purely cosmetic display names keyed by candidate index, persisted to a
/// local file with an integrity checksum. Never sent to the contract and
/// never authoritative: a corrupt or tampered file degrades to no overrides.
///
/// Editing is gated by a client-side comparison against the configured admin
/// address. This is a display convenience, not a security boundary; anyone
/// with access to the file can change the labels in their own client.
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use blake3::Hasher as Blake3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{VoteError, VoteResult};
use crate::sync::VotingSnapshot;

const LABELS_VERSION: u16 = 1;
const MAX_LABEL_LENGTH: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLabels {
    pub overrides: BTreeMap<u64, String>,
}

impl CandidateLabels {
    pub fn label_for(&self, candidate_id: u64) -> Option<&str> {
        self.overrides.get(&candidate_id).map(|s| s.as_str())
    }

    /// Overlay the overrides onto a snapshot's candidate names for display.
    pub fn apply(&self, snapshot: &mut VotingSnapshot) {
        for candidate in &mut snapshot.candidates {
            if let Some(label) = self.overrides.get(&candidate.id) {
                candidate.name = label.clone();
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LabelEnvelope {
    version: u16,
    checksum: [u8; 32],
    payload: CandidateLabels,
    modified_at_unix: i64,
}

/// Handles persistence of label overrides with integrity checks.
#[derive(Debug, Clone)]
pub struct LabelStore {
    path: PathBuf,
}

impl LabelStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load overrides; any problem with the file yields the empty default.
    pub fn load(&self) -> CandidateLabels {
        if !self.path.exists() {
            return CandidateLabels::default();
        }
        match self.load_checked() {
            Ok(labels) => labels,
            Err(err) => {
                warn!(error = %err, path = %self.path.display(), "ignoring unreadable label file");
                CandidateLabels::default()
            }
        }
    }

    fn load_checked(&self) -> VoteResult<CandidateLabels> {
        let bytes = fs::read(&self.path)?;
        let envelope: LabelEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != LABELS_VERSION {
            return Err(VoteError::Validation(format!(
                "unsupported label file version {}",
                envelope.version
            )));
        }
        if checksum(&envelope.payload)? != envelope.checksum {
            return Err(VoteError::Validation(
                "label file integrity verification failed".to_string(),
            ));
        }
        Ok(envelope.payload)
    }

    pub fn save(&self, labels: &CandidateLabels) -> VoteResult<()> {
        let envelope = LabelEnvelope {
            version: LABELS_VERSION,
            checksum: checksum(labels)?,
            payload: labels.clone(),
            modified_at_unix: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map_err(|e| VoteError::Storage(e.to_string()))?
                .as_secs() as i64,
        };

        let serialized = serde_json::to_vec_pretty(&envelope)?;
        let tmp_path = self.path.with_extension("new");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&serialized)?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }

    /// Set or clear one override. An empty label removes the override.
    pub fn set_label(&self, candidate_id: u64, label: &str) -> VoteResult<CandidateLabels> {
        let trimmed = label.trim();
        if trimmed.len() > MAX_LABEL_LENGTH {
            return Err(VoteError::Validation(format!(
                "label exceeds {} characters",
                MAX_LABEL_LENGTH
            )));
        }
        let mut labels = self.load();
        if trimmed.is_empty() {
            labels.overrides.remove(&candidate_id);
        } else {
            labels.overrides.insert(candidate_id, trimmed.to_string());
        }
        self.save(&labels)?;
        Ok(labels)
    }

    /// Remove all overrides.
    pub fn clear(&self) -> VoteResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether the given account may edit labels in this client.
///
/// No admin configured means everyone may; otherwise a case-insensitive
/// address comparison. Cosmetic gating only.
pub fn can_edit_labels(account: Option<&str>, admin: Option<&str>) -> bool {
    match admin {
        None => true,
        Some(admin) => match account {
            None => false,
            Some(account) => account.eq_ignore_ascii_case(admin),
        },
    }
}

fn checksum(labels: &CandidateLabels) -> VoteResult<[u8; 32]> {
    let mut hasher = Blake3::new();
    let encoded = serde_json::to_vec(labels)?;
    hasher.update(&encoded);
    let mut output = [0u8; 32];
    output.copy_from_slice(hasher.finalize().as_bytes());
    Ok(output)
}
