//! Session checkpoint: resumable prefetch progress.
//!
//! A single persisted record captures which directories were already
//! scanned plus a structural fingerprint of the root, so a restart can
//! resume instead of rescanning. The fingerprint only detects root-level
//! additions and removals, trading precision for an O(children-of-root)
//! check instead of a full recursive diff. Persistence is best-effort:
//! save failures are swallowed, never surfaced.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::RecordStore;
use crate::time::now_ms;

/// Checkpoint record schema version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Fixed key the checkpoint persists under (separate small store).
pub const CHECKPOINT_KEY: &str = "v1:tree:checkpoint";

/// Persisted prefetch progress for one scan source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCheckpoint {
    pub version: u32,
    /// Directory paths already scanned in the captured session.
    pub loaded_dir_paths: Vec<String>,
    pub indexed_file_count: u64,
    /// Order-independent hash of the root's immediate child names.
    pub shape_fingerprint: String,
    /// When this checkpoint was written, epoch milliseconds.
    pub saved_at: u64,
}

impl SessionCheckpoint {
    pub fn new(
        loaded_dir_paths: Vec<String>,
        indexed_file_count: u64,
        shape_fingerprint: String,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            loaded_dir_paths,
            indexed_file_count,
            shape_fingerprint,
            saved_at: now_ms(),
        }
    }

    /// Persist this checkpoint. Failures are logged and swallowed.
    pub async fn save(&self, store: &Arc<dyn RecordStore>) {
        let bytes = match serde_json::to_vec(self) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "checkpoint encode failed, skipping save");
                return;
            }
        };
        if let Err(e) = store.put(CHECKPOINT_KEY, bytes).await {
            warn!(error = %e, "checkpoint save failed");
        } else {
            debug!(
                loaded = self.loaded_dir_paths.len(),
                indexed = self.indexed_file_count,
                "checkpoint saved"
            );
        }
    }

    /// Load the persisted checkpoint, if any. Version mismatches and
    /// decode failures are treated as absence.
    pub async fn load(store: &Arc<dyn RecordStore>) -> Option<Self> {
        let bytes = match store.get(CHECKPOINT_KEY).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "checkpoint load failed");
                return None;
            }
        };
        let checkpoint: SessionCheckpoint = match serde_json::from_slice(&bytes) {
            Ok(cp) => cp,
            Err(e) => {
                warn!(error = %e, "checkpoint decode failed, discarding");
                return None;
            }
        };
        if checkpoint.version != CHECKPOINT_VERSION {
            debug!(
                found = checkpoint.version,
                expected = CHECKPOINT_VERSION,
                "discarding version-mismatched checkpoint"
            );
            return None;
        }
        Some(checkpoint)
    }

    /// Remove the persisted checkpoint (used when the fingerprint gate
    /// rejects it).
    pub async fn discard(store: &Arc<dyn RecordStore>) {
        let _ = store.delete(CHECKPOINT_KEY).await;
    }
}

/// Order-independent fingerprint of a directory's immediate child names.
///
/// Names are sorted, joined, and run through a cheap DJB2-style rolling
/// hash; the result is `v1:<count>:<hash in base36>`. Equal fingerprints
/// mean the root's shape is presumed unchanged and a checkpoint keyed on
/// it can be trusted.
pub fn generate_shape_fingerprint<S: AsRef<str>>(child_names: &[S]) -> String {
    let mut names: Vec<&str> = child_names.iter().map(|n| n.as_ref()).collect();
    names.sort_unstable();

    let mut hash: u64 = 5381;
    for name in &names {
        for byte in name.as_bytes() {
            hash = hash.wrapping_mul(33) ^ u64::from(*byte);
        }
        // Separator keeps ["ab"] distinct from ["a", "b"]
        hash = hash.wrapping_mul(33) ^ u64::from(b'\n');
    }

    format!("v1:{}:{}", names.len(), to_base36(hash))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = String::new();
    while value > 0 {
        out.insert(0, DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    out
}
