use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::money::Milliunits;

/// Supported statement formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Ofx,
    Qfx,
}

impl FileFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Ofx => "ofx",
            FileFormat::Qfx => "qfx",
        }
    }

    pub fn is_ofx_family(self) -> bool {
        matches!(self, FileFormat::Ofx | FileFormat::Qfx)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Csv => write!(f, "CSV"),
            FileFormat::Ofx => write!(f, "OFX"),
            FileFormat::Qfx => write!(f, "QFX"),
        }
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "ofx" => Ok(FileFormat::Ofx),
            "qfx" => Ok(FileFormat::Qfx),
            other => Err(format!("Unknown file format: '{other}'")),
        }
    }
}

/// One bank row after normalization. Amounts are negative for money leaving
/// the account once any format-specific inversion has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTransaction {
    pub date: NaiveDate,
    pub amount: Milliunits,
    pub payee: String,
    pub memo: String,
    pub import_id: String,
}

/// Output of a single ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub format: FileFormat,
    /// Source row order.
    pub transactions: Vec<NormalizedTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    pub warnings: Vec<String>,
}

impl ParseResult {
    pub fn new(format: FileFormat) -> Self {
        ParseResult {
            format,
            transactions: Vec::new(),
            account_name: None,
            warnings: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn total_amount(&self) -> Milliunits {
        self.transactions.iter().map(|t| t.amount).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParseResult {
        ParseResult {
            format: FileFormat::Ofx,
            transactions: vec![
                NormalizedTransaction {
                    date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
                    amount: Milliunits(-45_670),
                    payee: "GROCERY STORE".to_string(),
                    memo: String::new(),
                    import_id: "YNAB-MCP:0123456789abcdef".to_string(),
                },
                NormalizedTransaction {
                    date: NaiveDate::from_ymd_opt(2026, 1, 16).unwrap(),
                    amount: Milliunits(3_500_000),
                    payee: "DIRECT DEPOSIT".to_string(),
                    memo: "Payroll".to_string(),
                    import_id: "YNAB-MCP:fedcba9876543210".to_string(),
                },
            ],
            account_name: Some("9876543210".to_string()),
            warnings: vec![],
        }
    }

    #[test]
    fn total_amount_sums_milliunits() {
        let result = sample();
        assert_eq!(result.len(), 2);
        assert_eq!(result.total_amount(), Milliunits(3_454_330));
        assert_eq!(ParseResult::new(FileFormat::Csv).total_amount(), Milliunits::ZERO);
    }

    #[test]
    fn serializes_with_collaborator_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["format"], "ofx");
        assert_eq!(json["accountName"], "9876543210");
        let first = &json["transactions"][0];
        assert_eq!(first["date"], "2026-01-15");
        assert_eq!(first["amount"], -45_670);
        assert_eq!(first["importId"], "YNAB-MCP:0123456789abcdef");
    }

    #[test]
    fn account_name_omitted_when_absent() {
        let json = serde_json::to_value(ParseResult::new(FileFormat::Csv)).unwrap();
        assert!(json.get("accountName").is_none());
    }

    #[test]
    fn deserializes_round_trip() {
        let original = sample();
        let text = serde_json::to_string(&original).unwrap();
        let back: ParseResult = serde_json::from_str(&text).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn file_format_from_str_is_case_insensitive() {
        assert_eq!("QFX".parse::<FileFormat>().unwrap(), FileFormat::Qfx);
        assert_eq!("csv".parse::<FileFormat>().unwrap(), FileFormat::Csv);
        assert!("pdf".parse::<FileFormat>().is_err());
        assert!(FileFormat::Qfx.is_ofx_family());
        assert!(!FileFormat::Csv.is_ofx_family());
    }
}
