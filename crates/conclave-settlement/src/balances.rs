//! Encrypted per-account balances.
//!
//! Each account's balance is a single ciphertext handle; credits and
//! debits go through the oracle's homomorphic add/sub, so the core moves
//! value around without ever seeing a plaintext. The map is cheap to
//! clone, which is how the settlement engine gets its all-or-nothing
//! commit: mutate a working copy, swap it in only on success.

use std::collections::HashMap;

use conclave_types::{AccountId, CipherHandle, Result};

use crate::oracle::CipherOracle;

/// Account → encrypted balance handle.
#[derive(Debug, Clone, Default)]
pub struct EncryptedBalances {
    accounts: HashMap<AccountId, CipherHandle>,
}

impl EncryptedBalances {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an encrypted amount to an account, creating the balance
    /// (as an encrypted zero) on first touch.
    ///
    /// # Errors
    /// Propagates oracle failures; the entry is left unchanged on error.
    pub fn credit(
        &mut self,
        oracle: &mut dyn CipherOracle,
        account: AccountId,
        amount: CipherHandle,
    ) -> Result<()> {
        let current = match self.accounts.get(&account) {
            Some(handle) => *handle,
            None => oracle.encrypt(0),
        };
        let updated = oracle.add(current, amount)?;
        self.accounts.insert(account, updated);
        Ok(())
    }

    /// Debit an encrypted amount from an account.
    ///
    /// # Errors
    /// Propagates oracle failures (including underflow); the entry is
    /// left unchanged on error. Debiting an account with no balance
    /// debits an encrypted zero and fails accordingly.
    pub fn debit(
        &mut self,
        oracle: &mut dyn CipherOracle,
        account: AccountId,
        amount: CipherHandle,
    ) -> Result<()> {
        let current = match self.accounts.get(&account) {
            Some(handle) => *handle,
            None => oracle.encrypt(0),
        };
        let updated = oracle.sub(current, amount)?;
        self.accounts.insert(account, updated);
        Ok(())
    }

    /// The account's current balance handle, if it has ever been touched.
    #[must_use]
    pub fn handle(&self, account: AccountId) -> Option<CipherHandle> {
        self.accounts.get(&account).copied()
    }

    /// Accounts with a balance entry.
    pub fn accounts(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.accounts.keys().copied()
    }

    /// Number of touched accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether no account has been touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
