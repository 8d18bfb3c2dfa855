//! Shared scalar types used across the node.

pub use rust_decimal::Decimal as Value;

/// An account's externally-visible identifier. Issued in `[10001, 99999]`.
pub type AccountNumber = u32;

/// A bank's identity: the IPv4 address it advertises itself under.
pub type BankCode = String;

/// Monotonic ledger entry identifier.
pub type TxId = u64;

pub const MIN_ACCOUNT_NUMBER: AccountNumber = 10001;
pub const MAX_ACCOUNT_NUMBER: AccountNumber = 99999;

pub const MAX_DEPOSIT: &str = "1000000";
pub const MAX_LINE_BYTES: usize = 1024;
pub const DEFAULT_PORT: u16 = 65525;
