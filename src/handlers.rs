//! Domain logic for each opcode. Each handler enforces the
//! preconditions and error strings from the protocol's external
//! contract — clients may match on these strings, so they are never
//! reworded.

use super::account::{Account, AccountError};
use super::common::*;
use super::events::{EventKind, EventPublisher};
use super::proxy;
use super::store::{self, Store};
use super::transaction::{Transaction, TransactionKind};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A domain-level rejection, surfaced verbatim to the client as `ER <message>`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DomainError(pub String);

impl DomainError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<AccountError> for DomainError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Inactive => DomainError::new("Account is not active"),
            AccountError::InsufficientFunds => DomainError::new("Insufficient funds"),
        }
    }
}

/// Failure a handler can produce. `Internal` failures are never shown
/// to the client verbatim — the dispatcher downgrades them to
/// `Command incomplete` after logging the real cause.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Internal(#[from] store::Error),
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Splits `"<number>/<bank>"`, requiring the `/` separator.
fn split_account_info(account_info: &str) -> Result<(&str, &str), DomainError> {
    account_info
        .split_once('/')
        .ok_or_else(|| DomainError::new("Invalid account format. Use: account_number/bank_code"))
}

pub struct Handlers {
    store: Arc<Store>,
    bank_code: BankCode,
    events: EventPublisher,
    proxy_timeout: Duration,
}

impl Handlers {
    pub fn new(
        store: Arc<Store>,
        bank_code: BankCode,
        events: EventPublisher,
        proxy_timeout: Duration,
    ) -> Self {
        Self {
            store,
            bank_code,
            events,
            proxy_timeout,
        }
    }

    pub fn bank_code(&self) -> &str {
        &self.bank_code
    }

    pub fn get_bank_code(&self, _peer_ip: &str) -> Result<Option<String>, HandlerError> {
        Ok(Some(self.bank_code.clone()))
    }

    pub fn create_account(
        &self,
        initial_balance: Option<&str>,
        _peer_ip: &str,
    ) -> Result<Option<String>, HandlerError> {
        let initial_balance = match initial_balance {
            None => Value::ZERO,
            Some(raw) => Value::from_str(raw)
                .map_err(|_| DomainError::new("Invalid initial balance"))?,
        };
        if initial_balance < Value::ZERO {
            return Err(DomainError::new("Initial balance cannot be negative").into());
        }

        let now = now();
        let txn = self.store.write()?;
        let next = txn.next_account_number()?;
        if next > MAX_ACCOUNT_NUMBER {
            return Err(DomainError::new("Bank account limit reached").into());
        }

        let account = Account::new(next, self.bank_code.clone(), initial_balance, now);
        txn.insert_account(&account)?;

        if initial_balance > Value::ZERO {
            let id = txn.next_ledger_id()?;
            txn.append_ledger(&Transaction {
                id,
                account_number: next,
                bank_code: self.bank_code.clone(),
                amount: initial_balance,
                kind: TransactionKind::InitialDeposit,
                description: "initial deposit".to_string(),
                timestamp: now,
            })?;
        }
        txn.commit()?;

        self.events
            .emit(EventKind::Account, format!("created {next}/{}", self.bank_code), now);
        Ok(Some(format!("{next}/{}", self.bank_code)))
    }

    pub fn deposit(
        &self,
        account_info: &str,
        amount: &str,
        peer_ip: &str,
    ) -> Result<Option<String>, HandlerError> {
        self.mutate(account_info, amount, TransactionKind::Deposit, peer_ip)
    }

    pub fn withdraw(
        &self,
        account_info: &str,
        amount: &str,
        peer_ip: &str,
    ) -> Result<Option<String>, HandlerError> {
        self.mutate(account_info, amount, TransactionKind::Withdrawal, peer_ip)
    }

    fn mutate(
        &self,
        account_info: &str,
        amount: &str,
        kind: TransactionKind,
        peer_ip: &str,
    ) -> Result<Option<String>, HandlerError> {
        let (number_str, bank) = split_account_info(account_info)?;
        let opcode = match kind {
            TransactionKind::Deposit => "AD",
            TransactionKind::Withdrawal => "AW",
            TransactionKind::InitialDeposit => unreachable!("not a routable operation"),
        };

        if bank != self.bank_code {
            let response = proxy::forward(
                &self.store,
                &self.events,
                opcode,
                account_info,
                Some(amount),
                bank,
                self.proxy_timeout,
                now(),
            )
            .map_err(|e| DomainError::new(e.to_string()))?;
            return Ok(Some(response));
        }

        let number: AccountNumber = number_str
            .parse()
            .map_err(|_| DomainError::new("Invalid account number or amount format"))?;
        let amount: Value = amount
            .parse()
            .map_err(|_| DomainError::new("Invalid account number or amount format"))?;

        if amount <= Value::ZERO {
            return Err(DomainError::new("Amount must be positive").into());
        }
        let max = Value::from_str(MAX_DEPOSIT).unwrap();
        if kind == TransactionKind::Deposit && amount > max {
            return Err(DomainError::new("Maximum deposit amount is $1,000,000").into());
        }
        if kind == TransactionKind::Withdrawal && amount > max {
            return Err(DomainError::new("Maximum withdrawal amount is $1,000,000").into());
        }

        let now = now();
        let txn = self.store.write()?;
        let account = txn
            .get_account(number)
            .map_err(|_| DomainError::new("Account not found"))?;

        let updated = match kind {
            TransactionKind::Deposit => account.deposit(amount, now).map_err(DomainError::from)?,
            TransactionKind::Withdrawal => account.withdraw(amount, now).map_err(DomainError::from)?,
            TransactionKind::InitialDeposit => unreachable!(),
        };
        txn.replace_account(&updated)?;

        let id = txn.next_ledger_id()?;
        txn.append_ledger(&Transaction {
            id,
            account_number: number,
            bank_code: bank.to_string(),
            amount,
            kind,
            description: kind.as_str().to_string(),
            timestamp: now,
        })?;
        txn.commit()?;

        self.events.emit(
            EventKind::Transaction,
            format!("{} {amount} on {account_info} from {peer_ip}", kind.as_str()),
            now,
        );
        Ok(None)
    }

    pub fn get_balance(
        &self,
        account_info: &str,
        _peer_ip: &str,
    ) -> Result<Option<String>, HandlerError> {
        let (number_str, bank) = split_account_info(account_info)?;

        if bank != self.bank_code {
            let response = proxy::forward(
                &self.store,
                &self.events,
                "AB",
                account_info,
                None,
                bank,
                self.proxy_timeout,
                now(),
            )
            .map_err(|e| DomainError::new(e.to_string()))?;
            return Ok(Some(response));
        }

        let number: AccountNumber = number_str
            .parse()
            .map_err(|_| DomainError::new("Invalid account number"))?;

        let read = self.store.read()?;
        let account = read
            .get_account(number)
            .ok()
            .filter(|a| a.is_active)
            .ok_or_else(|| DomainError::new("Account not found or inactive"))?;

        Ok(Some(account.balance.to_string()))
    }

    pub fn remove_account(
        &self,
        account_info: &str,
        _peer_ip: &str,
    ) -> Result<Option<String>, HandlerError> {
        let (number_str, bank) = split_account_info(account_info)?;

        if bank != self.bank_code {
            let response = proxy::forward(
                &self.store,
                &self.events,
                "AR",
                account_info,
                None,
                bank,
                self.proxy_timeout,
                now(),
            )
            .map_err(|e| DomainError::new(e.to_string()))?;
            return Ok(Some(response));
        }

        let number: AccountNumber = number_str
            .parse()
            .map_err(|_| DomainError::new("Account not found"))?;

        let now = now();
        let txn = self.store.write()?;
        let account = txn
            .get_account(number)
            .map_err(|_| DomainError::new("Account not found"))?;
        if account.balance > Value::ZERO {
            return Err(DomainError::new("Cannot delete bank account containing funds").into());
        }
        txn.delete_account(number)?;
        txn.commit()?;

        self.events
            .emit(EventKind::Account, format!("removed {account_info}"), now);
        Ok(None)
    }

    pub fn bank_amount(&self, _peer_ip: &str) -> Result<Option<String>, HandlerError> {
        let read = self.store.read()?;
        Ok(Some(read.sum_balances()?.to_string()))
    }

    pub fn bank_number_of_clients(&self, _peer_ip: &str) -> Result<Option<String>, HandlerError> {
        let read = self.store.read()?;
        Ok(Some(read.count_accounts()?.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handlers() -> (Handlers, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("bank.redb")).unwrap());
        let (events, _rx) = EventPublisher::channel();
        (
            Handlers::new(store, "192.168.1.7".to_string(), events, Duration::from_secs(5)),
            dir,
        )
    }

    #[test]
    fn create_account_defaults_balance_to_zero() {
        let (h, _dir) = handlers();
        let result = h.create_account(None, "127.0.0.1").unwrap().unwrap();
        assert_eq!(result, "10001/192.168.1.7");
    }

    #[test]
    fn create_account_rejects_negative_initial_balance() {
        let (h, _dir) = handlers();
        let err = h.create_account(Some("-5"), "127.0.0.1").unwrap_err();
        assert!(matches!(err, HandlerError::Domain(DomainError(msg)) if msg == "Initial balance cannot be negative"));
    }

    #[test]
    fn create_account_rejects_garbage_balance() {
        let (h, _dir) = handlers();
        let err = h.create_account(Some("abc"), "127.0.0.1").unwrap_err();
        assert!(matches!(err, HandlerError::Domain(DomainError(msg)) if msg == "Invalid initial balance"));
    }

    #[test]
    fn deposit_then_withdraw_then_balance() {
        let (h, _dir) = handlers();
        let account = h.create_account(None, "127.0.0.1").unwrap().unwrap();
        h.deposit(&account, "100", "127.0.0.1").unwrap();
        h.withdraw(&account, "30", "127.0.0.1").unwrap();
        let balance = h.get_balance(&account, "127.0.0.1").unwrap().unwrap();
        assert_eq!(balance, "70");
    }

    #[test]
    fn withdraw_rejects_insufficient_funds() {
        let (h, _dir) = handlers();
        let account = h.create_account(None, "127.0.0.1").unwrap().unwrap();
        h.deposit(&account, "70", "127.0.0.1").unwrap();
        let err = h.withdraw(&account, "1000", "127.0.0.1").unwrap_err();
        assert!(matches!(err, HandlerError::Domain(DomainError(msg)) if msg == "Insufficient funds"));
    }

    #[test]
    fn deposit_rejects_non_positive_amount() {
        let (h, _dir) = handlers();
        let account = h.create_account(None, "127.0.0.1").unwrap().unwrap();
        let err = h.deposit(&account, "0", "127.0.0.1").unwrap_err();
        assert!(matches!(err, HandlerError::Domain(DomainError(msg)) if msg == "Amount must be positive"));
    }

    #[test]
    fn deposit_rejects_over_the_cap() {
        let (h, _dir) = handlers();
        let account = h.create_account(None, "127.0.0.1").unwrap().unwrap();
        let err = h.deposit(&account, "1000000.01", "127.0.0.1").unwrap_err();
        assert!(matches!(err, HandlerError::Domain(DomainError(msg)) if msg == "Maximum deposit amount is $1,000,000"));
    }

    #[test]
    fn remove_account_rejects_nonzero_balance_then_succeeds_once_drained() {
        let (h, _dir) = handlers();
        let account = h.create_account(None, "127.0.0.1").unwrap().unwrap();
        h.deposit(&account, "70", "127.0.0.1").unwrap();
        assert!(h.remove_account(&account, "127.0.0.1").is_err());
        h.withdraw(&account, "70", "127.0.0.1").unwrap();
        h.remove_account(&account, "127.0.0.1").unwrap();
        let err = h.get_balance(&account, "127.0.0.1").unwrap_err();
        assert!(matches!(err, HandlerError::Domain(DomainError(msg)) if msg == "Account not found or inactive"));
    }

    #[test]
    fn account_numbering_hits_the_ceiling() {
        let (h, _dir) = handlers();
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("b.redb")).unwrap());
        // seed the store so the very next number is the ceiling
        {
            let txn = store.write().unwrap();
            txn.insert_account(&Account::new(MAX_ACCOUNT_NUMBER, "192.168.1.7".into(), Value::ZERO, 0))
                .unwrap();
            txn.commit().unwrap();
        }
        let (events, _rx) = EventPublisher::channel();
        let capped = Handlers::new(store, "192.168.1.7".to_string(), events, Duration::from_secs(5));
        let err = capped.create_account(None, "127.0.0.1").unwrap_err();
        assert!(matches!(err, HandlerError::Domain(DomainError(msg)) if msg == "Bank account limit reached"));
        drop(h);
    }
}
