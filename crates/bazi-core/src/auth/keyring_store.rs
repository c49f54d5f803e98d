use anyhow::{Context, Result};
use keyring::credential::{CredentialBuilderApi, CredentialPersistence};
use keyring::Entry;

use super::store::{CredentialStore, Origin, StoreChange, StoreSubscription, TabId};
use super::Credential;

const SERVICE_NAME: &str = "bazi-client";

/// Session kept in the OS keychain as one JSON-encoded entry
pub struct KeyringCredentialStore {
    origin: Origin,
    tab: TabId,
    entry: Entry,
}

impl KeyringCredentialStore {
    pub fn new(account: &str) -> Result<Self> {
        let origin = Origin::new();
        let entry = Entry::new(SERVICE_NAME, account).context("Failed to create keyring entry")?;
        Ok(Self {
            tab: origin.next_tab(),
            origin,
            entry,
        })
    }

    /// Whether this platform's keychain keeps entries after the process exits.
    /// Unsupported platforms fall back to an in-memory mock that does not.
    pub fn is_durable() -> bool {
        matches!(
            keyring::default::default_credential_builder().persistence(),
            CredentialPersistence::UntilReboot | CredentialPersistence::UntilDelete
        )
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self) -> Result<Option<Credential>> {
        match self.entry.get_password() {
            Ok(json) => {
                let credential = serde_json::from_str(&json)
                    .context("Failed to parse session stored in keychain")?;
                Ok(Some(credential))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve session from keychain"),
        }
    }

    fn set(&self, credential: &Credential) -> Result<()> {
        let json = serde_json::to_string(credential)?;
        self.entry
            .set_password(&json)
            .context("Failed to store session in keychain")?;
        self.origin.publish(self.tab, StoreChange::Set);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) => {
                self.origin.publish(self.tab, StoreChange::Cleared);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }

    fn subscribe(&self) -> StoreSubscription {
        self.origin.subscribe(self.tab)
    }

    fn tab(&self) -> TabId {
        self.tab
    }
}
