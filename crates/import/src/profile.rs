use ledgerlift_core::DateFormatHint;
use serde::{Deserialize, Serialize};

use crate::error::ImportError;

/// Which header names hold each field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: String,
    pub payee: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Exact header membership test: every name in `all`, and at least one of
/// `any` when `any` is non-empty.
#[derive(Debug, Clone, Copy)]
pub struct HeaderRule {
    pub all: &'static [&'static str],
    pub any: &'static [&'static str],
}

impl HeaderRule {
    pub fn matches(&self, headers: &[String]) -> bool {
        let has = |name: &str| headers.iter().any(|h| h == name);
        self.all.iter().all(|n| has(*n))
            && (self.any.is_empty() || self.any.iter().any(|n| has(*n)))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StaticMapping {
    pub date: &'static str,
    pub payee: &'static str,
    pub amount: Option<&'static str>,
    pub debit: Option<&'static str>,
    pub credit: Option<&'static str>,
    pub memo: Option<&'static str>,
}

impl StaticMapping {
    pub fn to_mapping(&self) -> ColumnMapping {
        ColumnMapping {
            date: self.date.to_string(),
            payee: self.payee.to_string(),
            amount: self.amount.map(str::to_string),
            debit: self.debit.map(str::to_string),
            credit: self.credit.map(str::to_string),
            memo: self.memo.map(str::to_string),
        }
    }
}

/// A known bank CSV layout.
#[derive(Debug, Clone, Copy)]
pub struct BankProfile {
    pub name: &'static str,
    pub detect: HeaderRule,
    pub mapping: StaticMapping,
    pub date_hint: Option<DateFormatHint>,
    pub invert_amounts: bool,
}

const AMOUNT_ONLY: StaticMapping = StaticMapping {
    date: "Date",
    payee: "Description",
    amount: Some("Amount"),
    debit: None,
    credit: None,
    memo: None,
};

/// Tried in order; first match wins. Profiles sharing a header rule with an
/// earlier entry are shadowed by it.
pub const BANK_PROFILES: &[BankProfile] = &[
    BankProfile {
        name: "Chase Credit Card",
        detect: HeaderRule {
            all: &["Transaction Date", "Post Date", "Description", "Amount"],
            any: &[],
        },
        mapping: StaticMapping {
            date: "Transaction Date",
            payee: "Description",
            amount: Some("Amount"),
            debit: None,
            credit: None,
            memo: Some("Memo"),
        },
        date_hint: None,
        // Chase card exports report charges with the opposite sign convention.
        invert_amounts: true,
    },
    BankProfile {
        name: "Chase Checking",
        detect: HeaderRule {
            all: &["Posting Date", "Description", "Amount"],
            any: &[],
        },
        mapping: StaticMapping {
            date: "Posting Date",
            ..AMOUNT_ONLY
        },
        date_hint: None,
        invert_amounts: false,
    },
    BankProfile {
        name: "Bank of America",
        detect: HeaderRule {
            all: &["Date", "Description", "Amount"],
            any: &[],
        },
        mapping: AMOUNT_ONLY,
        date_hint: None,
        invert_amounts: false,
    },
    BankProfile {
        name: "Wells Fargo",
        detect: HeaderRule {
            all: &["Date", "Amount", "Description"],
            any: &[],
        },
        mapping: AMOUNT_ONLY,
        date_hint: None,
        invert_amounts: false,
    },
    BankProfile {
        name: "American Express",
        detect: HeaderRule {
            all: &["Date", "Description", "Amount"],
            any: &[],
        },
        mapping: AMOUNT_ONLY,
        date_hint: None,
        invert_amounts: false,
    },
    BankProfile {
        name: "Citi",
        detect: HeaderRule {
            all: &["Date", "Description"],
            any: &["Debit", "Credit"],
        },
        mapping: StaticMapping {
            date: "Date",
            payee: "Description",
            amount: None,
            debit: Some("Debit"),
            credit: Some("Credit"),
            memo: None,
        },
        date_hint: None,
        invert_amounts: false,
    },
];

pub fn detect_profile(headers: &[String]) -> Option<&'static BankProfile> {
    BANK_PROFILES.iter().find(|p| p.detect.matches(headers))
}

/// Best-effort mapping for layouts no profile recognises.
pub fn infer_mapping(headers: &[String]) -> Result<ColumnMapping, ImportError> {
    let lower: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

    let exact = |name: &str| lower.iter().position(|h| h == name);
    let containing = |needle: &str| lower.iter().position(|h| h.contains(needle));
    let find = |name: &str| exact(name).or_else(|| containing(name));
    let header = |idx: usize| headers[idx].clone();

    let date = find("date");
    let amount = find("amount");
    let payee = find("description")
        .or_else(|| find("payee"))
        .or_else(|| containing("memo"));
    let memo = find("memo");

    let (Some(date), Some(payee)) = (date, payee) else {
        return Err(ImportError::UnmappedColumns {
            headers: headers.join(", "),
        });
    };

    let (debit, credit) = if amount.is_none() {
        (find("debit").map(header), find("credit").map(header))
    } else {
        (None, None)
    };

    Ok(ColumnMapping {
        date: header(date),
        payee: header(payee),
        amount: amount.map(header),
        debit,
        credit,
        memo: memo.map(header),
    })
}
