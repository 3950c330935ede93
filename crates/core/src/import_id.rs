use std::collections::HashMap;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::money::Milliunits;

/// Namespace tag in front of every import id. Changing it re-keys every
/// previously imported transaction.
pub const IMPORT_ID_PREFIX: &str = "YNAB-MCP:";

const DIGEST_HEX_LEN: usize = 16;

/// Deterministic dedup key for a transaction.
///
/// `occurrence` is the zero-based count of earlier rows in the same run that
/// share date, amount and payee.
pub fn generate_import_id(
    date: NaiveDate,
    amount: Milliunits,
    payee: &str,
    occurrence: u32,
) -> String {
    let input = format!(
        "{}:{}:{}:{}",
        date.format("%Y-%m-%d"),
        amount.value(),
        payee,
        occurrence
    );
    let digest = Sha256::digest(input.as_bytes());
    let hex = hex::encode(digest);
    format!("{IMPORT_ID_PREFIX}{}", &hex[..DIGEST_HEX_LEN])
}

/// Per-run tally of `(date, amount, payee)` triples seen so far.
#[derive(Debug, Default)]
pub struct OccurrenceCounter {
    seen: HashMap<(NaiveDate, Milliunits, String), u32>,
}

impl OccurrenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many times this triple was seen before, then records it.
    pub fn next(&mut self, date: NaiveDate, amount: Milliunits, payee: &str) -> u32 {
        let count = self
            .seen
            .entry((date, amount, payee.to_string()))
            .or_insert(0);
        let occurrence = *count;
        *count += 1;
        occurrence
    }

    /// Derive the import id for the next row carrying this triple.
    pub fn import_id(&mut self, date: NaiveDate, amount: Milliunits, payee: &str) -> String {
        let occurrence = self.next(date, amount, payee);
        generate_import_id(date, amount, payee, occurrence)
    }
}
