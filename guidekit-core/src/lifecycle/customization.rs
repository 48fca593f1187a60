//! Customization detection via SHA-256 content fingerprints

use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::gateway::FileGateway;

/// Fingerprint raw bytes as `sha256:<hex>`
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Compares installed copies against their catalog source
#[derive(Clone)]
pub struct CustomizationDetector {
    gateway: Arc<dyn FileGateway>,
}

impl CustomizationDetector {
    pub fn new(gateway: Arc<dyn FileGateway>) -> Self {
        Self { gateway }
    }

    pub async fn fingerprint_file(&self, path: &Path) -> Option<String> {
        match self.gateway.read(path).await {
            Ok(bytes) => Some(fingerprint(&bytes)),
            Err(e) => {
                debug!("Cannot fingerprint {}: {}", path.display(), e);
                None
            }
        }
    }

    /// True only when both files are readable and their fingerprints differ.
    /// An unreadable file counts as "not customized".
    pub async fn is_customized(&self, installed: &Path, source: &Path) -> bool {
        let (Some(installed_hash), Some(source_hash)) = (
            self.fingerprint_file(installed).await,
            self.fingerprint_file(source).await,
        ) else {
            return false;
        };

        let customized = installed_hash != source_hash;
        debug!(
            "Customization check {} vs {}: {}",
            installed.display(),
            source.display(),
            if customized { "differs" } else { "identical" }
        );
        customized
    }
}
