//! Recipient address-list handling.

use std::fmt::Write as _;

/// Splits a `;`/`,`-separated address list, trimming surrounding
/// whitespace. Empty entries are dropped.
#[must_use]
pub fn split_addresses(list: &str) -> Vec<String> {
    list.split([';', ','])
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builds the RCPT command block for one transaction: one
/// `RCPT TO:` line per address, to-list first, then cc-list, issued as a
/// single write. Addresses already carrying angle brackets go verbatim;
/// bare addresses are wrapped.
#[must_use]
pub fn rcpt_block(to: &str, cc: Option<&str>) -> String {
    let mut block = String::new();
    let cc_addresses = cc.map(split_addresses).unwrap_or_default();
    for addr in split_addresses(to).iter().chain(cc_addresses.iter()) {
        if addr.contains('<') && addr.contains('>') {
            let _ = write!(block, "RCPT TO:{addr}\r\n");
        } else {
            let _ = write!(block, "RCPT TO:<{addr}>\r\n");
        }
    }
    block
}
