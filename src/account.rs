use super::common::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("not enough funds")]
    InsufficientFunds,
    #[error("account is not active")]
    Inactive,
}

/// A single account row as persisted by the store.
///
/// Mutations go through `deposit`/`withdraw`, which return a new value
/// rather than mutating in place, mirroring the rest of this crate's
/// "validate then replace" transaction shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub account_number: AccountNumber,
    pub bank_code: BankCode,
    pub balance: Value,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Account {
    pub fn new(account_number: AccountNumber, bank_code: BankCode, balance: Value, now: i64) -> Self {
        Self {
            account_number,
            bank_code,
            balance,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn deposit(&self, amount: Value, now: i64) -> Result<Self, AccountError> {
        if !self.is_active {
            return Err(AccountError::Inactive);
        }
        Ok(Self {
            balance: self.balance + amount,
            updated_at: now,
            ..self.clone()
        })
    }

    pub fn withdraw(&self, amount: Value, now: i64) -> Result<Self, AccountError> {
        if !self.is_active {
            return Err(AccountError::Inactive);
        }
        if self.balance < amount {
            return Err(AccountError::InsufficientFunds);
        }
        Ok(Self {
            balance: self.balance - amount,
            updated_at: now,
            ..self.clone()
        })
    }
}
