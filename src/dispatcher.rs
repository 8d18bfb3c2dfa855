//! Maps a parsed `(opcode, args)` pair to a handler invocation and
//! turns the outcome into a response line.

use super::handlers::{HandlerError, Handlers};
use super::protocol;
use tracing::error;

/// The fixed opcode table. Membership here, not reflection, decides
/// whether an opcode is recognised at all.
const COMMAND_TABLE: &[&str] = &["BC", "AC", "AD", "AW", "AB", "AR", "BA", "BN"];

pub fn dispatch(handlers: &Handlers, opcode: &str, args: &[String], peer_ip: &str) -> String {
    if !COMMAND_TABLE.contains(&opcode) {
        return protocol::format(opcode, None, Some("Unknown command"));
    }

    let outcome = match opcode {
        "BC" => handlers.get_bank_code(peer_ip),
        "AC" => handlers.create_account(args.first().map(String::as_str), peer_ip),
        "AD" => match (args.first(), args.get(1)) {
            (Some(account_info), Some(amount)) => handlers.deposit(account_info, amount, peer_ip),
            _ => Err(HandlerError::Domain(
                super::handlers::DomainError("Invalid account number or amount format".to_string()),
            )),
        },
        "AW" => match (args.first(), args.get(1)) {
            (Some(account_info), Some(amount)) => handlers.withdraw(account_info, amount, peer_ip),
            _ => Err(HandlerError::Domain(
                super::handlers::DomainError("Invalid account number or amount format".to_string()),
            )),
        },
        "AB" => match args.first() {
            Some(account_info) => handlers.get_balance(account_info, peer_ip),
            None => Err(HandlerError::Domain(super::handlers::DomainError(
                "Invalid account format. Use: account_number/bank_code".to_string(),
            ))),
        },
        "AR" => match args.first() {
            Some(account_info) => handlers.remove_account(account_info, peer_ip),
            None => Err(HandlerError::Domain(super::handlers::DomainError(
                "Invalid account format. Use: account_number/bank_code".to_string(),
            ))),
        },
        "BA" => handlers.bank_amount(peer_ip),
        "BN" => handlers.bank_number_of_clients(peer_ip),
        _ => return protocol::format(opcode, None, Some("Command not implemented")),
    };

    match outcome {
        Ok(result) => protocol::format(opcode, result.as_deref(), None),
        Err(HandlerError::Domain(domain_error)) => protocol::format(opcode, None, Some(&domain_error.0)),
        Err(HandlerError::Internal(store_error)) => {
            error!(opcode, error = %store_error, "store operation failed");
            protocol::format(opcode, None, Some("Command incomplete"))
        }
    }
}
