// Allow dead code: Infrastructure methods for future use
#![allow(dead_code)]

use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "bookrack";

/// Remember-me storage for a login password in the OS keychain, keyed by
/// the account email. Lets `login --saved` re-establish a session after the
/// token expires without prompting for the password again.
pub struct CredentialStore {
    email: String,
}

impl CredentialStore {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.email).context("Failed to create keyring entry")
    }

    /// Store the password in the OS keychain
    pub fn save(&self, password: &str) -> Result<()> {
        self.entry()?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    /// Retrieve the stored password
    pub fn load(&self) -> Result<String> {
        self.entry()?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Delete the stored password; a missing entry is not an error
    pub fn forget(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }

    /// Whether a password is stored for this email
    pub fn exists(&self) -> bool {
        self.entry().map(|e| e.get_password().is_ok()).unwrap_or(false)
    }
}
