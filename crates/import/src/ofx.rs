use std::sync::OnceLock;
use std::time::Instant;

use ledgerlift_core::{
    parse_amount, to_naive_date, FileFormat, Milliunits, NormalizedTransaction, OccurrenceCounter,
    ParseResult,
};
use regex::Regex;

use crate::error::ImportError;
use crate::markup::{self, Element};
use crate::row::{RowOutcome, SkipReason};

const BANK_STATEMENT: &[&str] = &["BANKMSGSRSV1", "STMTTRNRS", "STMTRS"];
const CARD_STATEMENT: &[&str] = &["CREDITCARDMSGSRSV1", "CCSTMTTRNRS", "CCSTMTRS"];

fn posted_date_pattern() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})").expect("invalid regex"))
}

/// The statement subtree and the aggregate holding its account id.
struct Statement<'a> {
    section: &'a Element,
    account_tag: &'static str,
}

impl<'a> Statement<'a> {
    fn locate(ofx: &'a Element) -> Option<Self> {
        if let Some(section) = ofx.path(BANK_STATEMENT) {
            return Some(Statement {
                section,
                account_tag: "BANKACCTFROM",
            });
        }
        ofx.path(CARD_STATEMENT).map(|section| Statement {
            section,
            account_tag: "CCACCTFROM",
        })
    }

    fn account_id(&self) -> Option<&'a str> {
        self.section
            .path(&[self.account_tag, "ACCTID"])
            .and_then(Element::value)
    }

    /// `STMTTRN` entries in document order. Card statements carry their
    /// list under the same `BANKTRANLIST` aggregate.
    fn transactions(&self) -> Vec<&'a Element> {
        self.section
            .child("BANKTRANLIST")
            .map(|list| list.children_named("STMTTRN").collect())
            .unwrap_or_default()
    }
}

/// Parse an OFX or QFX statement. `format` is echoed into the result.
///
/// The markup parse runs on the blocking pool; the per-transaction loop does
/// not suspend.
pub async fn parse_ofx(content: &str, format: FileFormat) -> Result<ParseResult, ImportError> {
    let started = Instant::now();
    if content.trim().is_empty() {
        return Err(ImportError::Empty(format));
    }

    let owned = content.to_owned();
    let ofx = tokio::task::spawn_blocking(move || markup::parse_document(&owned))
        .await
        .map_err(|e| ImportError::Markup(e.to_string()))??;

    let statement = Statement::locate(&ofx).ok_or(ImportError::NoStatement)?;

    let mut result = ParseResult::new(format);
    result.account_name = statement.account_id().map(str::to_string);

    let entries = statement.transactions();
    let mut counter = OccurrenceCounter::new();
    for (i, entry) in entries.iter().enumerate() {
        parse_transaction(entry, i + 1, &mut counter, &mut result.warnings).record(&mut result);
    }

    tracing::info!(
        format = format.as_str(),
        account = result.account_name.as_deref(),
        entries = entries.len(),
        transactions = result.transactions.len(),
        warnings = result.warnings.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "parsed OFX statement"
    );
    Ok(result)
}

fn parse_transaction(
    entry: &Element,
    index: usize,
    counter: &mut OccurrenceCounter,
    warnings: &mut Vec<String>,
) -> RowOutcome {
    let skip = |detail: String| -> RowOutcome { SkipReason::Transaction { index, detail }.into() };

    let raw_date = entry.value_of("DTPOSTED").unwrap_or("");
    let Some(date) = posted_date(raw_date) else {
        return skip(format!("invalid OFX date format \"{raw_date}\""));
    };
    let Some(date) = to_naive_date(&date) else {
        return skip(format!("invalid calendar date \"{raw_date}\""));
    };

    let Some(raw_amount) = entry.value_of("TRNAMT") else {
        return skip("missing amount".to_string());
    };
    let amount = match parse_amount(raw_amount) {
        Ok(value) => Milliunits(value),
        Err(e) => return skip(format!("invalid amount \"{raw_amount}\" ({e})")),
    };

    let memo = entry.value_of("MEMO").unwrap_or("");
    let payee = match entry.value_of("NAME").or(entry.value_of("MEMO")) {
        Some(payee) => payee.to_string(),
        None => {
            warnings.push(format!(
                "Transaction {index}: missing payee name, using FITID"
            ));
            entry
                .value_of("FITID")
                .map(str::to_string)
                .unwrap_or_else(|| format!("Unknown-{index}"))
        }
    };

    let import_id = counter.import_id(date, amount, &payee);
    RowOutcome::Parsed(NormalizedTransaction {
        date,
        amount,
        payee,
        memo: memo.to_string(),
        import_id,
    })
}

/// `YYYYMMDD[HHMMSS[.XXX]][[offset:TZ]]` to canonical `YYYY-MM-DD`.
fn posted_date(raw: &str) -> Option<String> {
    let stamp = raw.split('[').next().unwrap_or("").trim();
    posted_date_pattern()
        .captures(stamp)
        .map(|m| format!("{}-{}-{}", &m[1], &m[2], &m[3]))
}
