/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::sync::Arc;

use directory::Directory;
use store::Store;

pub mod addresses;
pub mod config;
pub mod signer;
pub mod tls;

pub use config::Config;

/// Process-wide handle shared by every listener (SMTP, IMAP) and background
/// task. Cheap to clone: the `Arc` fields are the actual shared state.
#[derive(Clone)]
pub struct Core {
    pub config: Arc<Config>,
    pub store: Store,
    pub directory: Arc<Directory>,
    pub signer: Option<Arc<dyn signer::Signer>>,
    pub verifier: Option<Arc<dyn signer::Verifier>>,
}

impl Core {
    pub fn new(config: Config, store: Store, directory: Arc<Directory>) -> Self {
        Core {
            config: Arc::new(config),
            store,
            directory,
            signer: None,
            verifier: None,
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn signer::Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn signer::Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }
}
