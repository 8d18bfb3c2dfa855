use super::account::Account;
use super::common::*;
use super::transaction::Transaction;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const ACCOUNTS_TABLE: TableDefinition<u32, Vec<u8>> = TableDefinition::new("accounts");
const LEDGER_TABLE: TableDefinition<u64, Vec<u8>> = TableDefinition::new("transactions");
const KNOWN_BANKS_TABLE: TableDefinition<&str, Vec<u8>> = TableDefinition::new("known_banks");
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_LEDGER_ID_KEY: &str = "next_ledger_id";

#[derive(Debug, Error)]
pub enum Error {
    #[error("account not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] redb::DatabaseError),
    #[error(transparent)]
    Transaction(#[from] redb::TransactionError),
    #[error(transparent)]
    Table(#[from] redb::TableError),
    #[error(transparent)]
    Storage(#[from] redb::StorageError),
    #[error(transparent)]
    Commit(#[from] redb::CommitError),
    #[error(transparent)]
    Bincode(#[from] bincode::Error),
}

/// A peer bank discovered through a successful proxy hop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnownBank {
    pub bank_code: BankCode,
    pub ip_address: String,
    pub port: u16,
    pub last_seen: i64,
    pub is_active: bool,
}

/// Durable, transactional account/ledger/peer store.
///
/// A single `redb::Database` backs four tables (`accounts`,
/// `transactions`, `known_banks`, `meta`). Every logical operation runs
/// inside one `StoreTxn`: callers open it, perform reads/writes, then
/// call `commit`; dropping it without committing aborts, giving the
/// begin/read/validate/mutate/commit shape the handlers rely on.
pub struct Store {
    db: Database,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let db = Database::create(path)?;
        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(ACCOUNTS_TABLE)?;
            let _ = txn.open_table(LEDGER_TABLE)?;
            let _ = txn.open_table(KNOWN_BANKS_TABLE)?;
            let _ = txn.open_table(META_TABLE)?;
        }
        txn.commit()?;
        Ok(Self { db })
    }

    pub fn write(&self) -> Result<StoreTxn, Error> {
        Ok(StoreTxn {
            txn: self.db.begin_write()?,
        })
    }

    pub fn read(&self) -> Result<StoreRead, Error> {
        Ok(StoreRead {
            txn: self.db.begin_read()?,
        })
    }
}

/// One write transaction, open/validate/mutate, then `commit`.
pub struct StoreTxn {
    txn: redb::WriteTransaction,
}

impl StoreTxn {
    pub fn next_account_number(&self) -> Result<AccountNumber, Error> {
        let table = self.txn.open_table(ACCOUNTS_TABLE)?;
        let mut iter = table.iter()?;
        let next = match iter.next_back() {
            Some(row) => row?.0.value() + 1,
            None => MIN_ACCOUNT_NUMBER,
        };
        Ok(next)
    }

    pub fn insert_account(&self, account: &Account) -> Result<(), Error> {
        let mut table = self.txn.open_table(ACCOUNTS_TABLE)?;
        table.insert(account.account_number, bincode::serialize(account)?)?;
        Ok(())
    }

    /// Overwrites an existing row; callers are responsible for read-then-write discipline.
    pub fn replace_account(&self, account: &Account) -> Result<(), Error> {
        self.insert_account(account)
    }

    pub fn get_account(&self, number: AccountNumber) -> Result<Account, Error> {
        let table = self.txn.open_table(ACCOUNTS_TABLE)?;
        let guard = table.get(number)?.ok_or(Error::NotFound)?;
        Ok(bincode::deserialize(&guard.value())?)
    }

    pub fn delete_account(&self, number: AccountNumber) -> Result<(), Error> {
        let mut table = self.txn.open_table(ACCOUNTS_TABLE)?;
        table.remove(number)?;
        Ok(())
    }

    pub fn next_ledger_id(&self) -> Result<TxId, Error> {
        let mut meta = self.txn.open_table(META_TABLE)?;
        let next = meta.get(NEXT_LEDGER_ID_KEY)?.map(|g| g.value()).unwrap_or(1);
        meta.insert(NEXT_LEDGER_ID_KEY, next + 1)?;
        Ok(next)
    }

    pub fn append_ledger(&self, entry: &Transaction) -> Result<(), Error> {
        let mut ledger = self.txn.open_table(LEDGER_TABLE)?;
        ledger.insert(entry.id, bincode::serialize(entry)?)?;
        Ok(())
    }

    pub fn sum_balances(&self) -> Result<Value, Error> {
        let table = self.txn.open_table(ACCOUNTS_TABLE)?;
        let mut sum = Value::ZERO;
        for row in table.iter()? {
            let (_, v) = row?;
            let account: Account = bincode::deserialize(&v.value())?;
            sum += account.balance;
        }
        Ok(sum)
    }

    pub fn count_accounts(&self) -> Result<u64, Error> {
        let table = self.txn.open_table(ACCOUNTS_TABLE)?;
        Ok(table.len()?)
    }

    pub fn upsert_known_bank(&self, bank: &KnownBank) -> Result<(), Error> {
        let mut table = self.txn.open_table(KNOWN_BANKS_TABLE)?;
        table.insert(bank.bank_code.as_str(), bincode::serialize(bank)?)?;
        Ok(())
    }

    pub fn commit(self) -> Result<(), Error> {
        self.txn.commit()?;
        Ok(())
    }
}

/// A read-only snapshot, used by the handlers that spec.md requires to
/// have no observable side effect (`get_balance`, `bank_amount`, ...).
pub struct StoreRead {
    txn: redb::ReadTransaction,
}

impl StoreRead {
    pub fn get_account(&self, number: AccountNumber) -> Result<Account, Error> {
        let table = self.txn.open_table(ACCOUNTS_TABLE)?;
        let guard = table.get(number)?.ok_or(Error::NotFound)?;
        Ok(bincode::deserialize(&guard.value())?)
    }

    pub fn sum_balances(&self) -> Result<Value, Error> {
        let table = self.txn.open_table(ACCOUNTS_TABLE)?;
        let mut sum = Value::ZERO;
        for row in table.iter()? {
            let (_, v) = row?;
            let account: Account = bincode::deserialize(&v.value())?;
            sum += account.balance;
        }
        Ok(sum)
    }

    pub fn count_accounts(&self) -> Result<u64, Error> {
        let table = self.txn.open_table(ACCOUNTS_TABLE)?;
        Ok(table.len()?)
    }

    pub fn get_known_bank(&self, bank_code: &str) -> Result<KnownBank, Error> {
        let table = self.txn.open_table(KNOWN_BANKS_TABLE)?;
        let guard = table.get(bank_code)?.ok_or(Error::NotFound)?;
        Ok(bincode::deserialize(&guard.value())?)
    }
}
