use super::common::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum TransactionKind {
    InitialDeposit,
    Deposit,
    Withdrawal,
}

impl TransactionKind {
    /// The literal tag used in events/logging; not part of the wire protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialDeposit => "INITIAL_DEPOSIT",
            Self::Deposit => "DEPOSIT",
            Self::Withdrawal => "WITHDRAWAL",
        }
    }
}

/// An append-only ledger entry recording one balance change.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Transaction {
    pub id: TxId,
    pub account_number: AccountNumber,
    pub bank_code: BankCode,
    pub amount: Value,
    pub kind: TransactionKind,
    pub description: String,
    pub timestamp: i64,
}
