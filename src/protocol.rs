//! The wire codec: pure, side-effect-free parse/format of one line.

/// Splits a request line on whitespace into an uppercased opcode and
/// its positional arguments. An empty or all-whitespace line parses to
/// `("", [])`, which the dispatcher treats as a blank line to skip.
pub fn parse(line: &str) -> (String, Vec<String>) {
    let mut tokens = line.split_whitespace();
    let opcode = tokens.next().unwrap_or("").to_uppercase();
    let args = tokens.map(|t| t.to_string()).collect();
    (opcode, args)
}

/// Formats a response line.
///
/// - `error` set: `"ER " + error`.
/// - `error` unset, `result` unset: just the opcode.
/// - otherwise: `"OPCODE RESULT"`.
///
/// The trailing `\n` is always present.
pub fn format(opcode: &str, result: Option<&str>, error: Option<&str>) -> String {
    let body = if let Some(error) = error {
        format!("ER {error}")
    } else if let Some(result) = result {
        format!("{opcode} {result}")
    } else {
        opcode.to_string()
    };
    format!("{body}\n")
}
