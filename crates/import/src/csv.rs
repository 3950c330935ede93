use std::time::Instant;

use csv::StringRecord;
use ledgerlift_core::{
    parse_amount, parse_date, to_naive_date, DateFormatHint, FileFormat, Milliunits,
    NormalizedTransaction, OccurrenceCounter, ParseResult,
};
use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::profile::{detect_profile, infer_mapping, ColumnMapping};
use crate::row::{RowOutcome, SkipReason};

/// Caller overrides. Anything set here beats the detected profile and the
/// inferred mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvOptions {
    #[serde(default, rename = "columns", skip_serializing_if = "Option::is_none")]
    pub column_mapping: Option<ColumnMapping>,
    #[serde(default, rename = "date_format", skip_serializing_if = "Option::is_none")]
    pub date_format_hint: Option<DateFormatHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invert_amounts: Option<bool>,
}

impl CsvOptions {
    /// Layer `over` on top of `self`; fields set in `over` win.
    pub fn overlay(self, over: CsvOptions) -> CsvOptions {
        CsvOptions {
            column_mapping: over.column_mapping.or(self.column_mapping),
            date_format_hint: over.date_format_hint.or(self.date_format_hint),
            invert_amounts: over.invert_amounts.or(self.invert_amounts),
        }
    }
}

enum AmountSource {
    Single(Option<usize>),
    Split {
        debit: Option<usize>,
        credit: Option<usize>,
    },
    Unmapped,
}

/// Mapping resolved to column positions for one file.
struct CsvLayout {
    date: Option<usize>,
    payee: Option<usize>,
    memo: Option<usize>,
    amount: AmountSource,
    date_hint: DateFormatHint,
    invert_amounts: bool,
}

impl CsvLayout {
    fn resolve(
        headers: &[String],
        mapping: &ColumnMapping,
        date_hint: DateFormatHint,
        invert_amounts: bool,
    ) -> Self {
        let position = |name: &str| headers.iter().position(|h| h == name);
        let optional = |name: &Option<String>| name.as_deref().and_then(position);

        // A mapped single amount column wins over debit/credit columns.
        let amount = if mapping.amount.is_some() {
            AmountSource::Single(optional(&mapping.amount))
        } else if mapping.debit.is_some() || mapping.credit.is_some() {
            AmountSource::Split {
                debit: optional(&mapping.debit),
                credit: optional(&mapping.credit),
            }
        } else {
            AmountSource::Unmapped
        };

        CsvLayout {
            date: position(&mapping.date),
            payee: position(&mapping.payee),
            memo: optional(&mapping.memo),
            amount,
            date_hint,
            invert_amounts,
        }
    }

    fn parse_row(
        &self,
        record: &StringRecord,
        row: usize,
        counter: &mut OccurrenceCounter,
    ) -> RowOutcome {
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").trim();

        let raw_date = field(self.date);
        if raw_date.is_empty() {
            return SkipReason::MissingDate { row }.into();
        }
        let Some(canonical) = parse_date(raw_date, self.date_hint) else {
            return SkipReason::UnparseableDate {
                row,
                raw: raw_date.to_string(),
            }
            .into();
        };
        let Some(date) = to_naive_date(&canonical) else {
            return SkipReason::InvalidDate {
                row,
                raw: raw_date.to_string(),
            }
            .into();
        };

        let amount = match self.amount_for(&field, row) {
            Ok(amount) => amount,
            Err(reason) => return reason.into(),
        };
        let amount = if self.invert_amounts { -amount } else { amount };

        let payee = field(self.payee);
        if payee.is_empty() {
            return SkipReason::MissingPayee { row }.into();
        }
        let memo = field(self.memo);

        RowOutcome::Parsed(NormalizedTransaction {
            date,
            amount,
            payee: payee.to_string(),
            memo: memo.to_string(),
            import_id: counter.import_id(date, amount, payee),
        })
    }

    fn amount_for<'r>(
        &self,
        field: &impl Fn(Option<usize>) -> &'r str,
        row: usize,
    ) -> Result<Milliunits, SkipReason> {
        let parse = |raw: &str| {
            parse_amount(raw)
                .map(Milliunits)
                .map_err(|_| SkipReason::InvalidAmount {
                    row,
                    raw: raw.to_string(),
                })
        };

        match self.amount {
            AmountSource::Single(idx) => {
                let raw = field(idx);
                if raw.is_empty() {
                    return Err(SkipReason::MissingAmount { row });
                }
                parse(raw)
            }
            AmountSource::Split { debit, credit } => {
                let debit = field(debit);
                let credit = field(credit);
                if !is_blank_amount(debit) {
                    parse(debit).map(|m| Milliunits(-m.value().abs()))
                } else if !is_blank_amount(credit) {
                    parse(credit).map(|m| Milliunits(m.value().abs()))
                } else {
                    Err(SkipReason::MissingAmount { row })
                }
            }
            AmountSource::Unmapped => Err(SkipReason::MissingAmount { row }),
        }
    }
}

fn is_blank_amount(raw: &str) -> bool {
    matches!(raw, "" | "0" | "0.00")
}

pub struct CsvImporter;

impl CsvImporter {
    /// Parse a whole CSV export held in memory.
    pub fn parse(content: &str, options: &CsvOptions) -> Result<ParseResult, ImportError> {
        let started = Instant::now();
        let content = content.trim_start_matches('\u{feff}');
        if content.trim().is_empty() {
            return Err(ImportError::Empty(FileFormat::Csv));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = Self::detect_columns(&mut reader)?;
        let records = reader
            .records()
            .collect::<Result<Vec<StringRecord>, csv::Error>>()?;
        if records.is_empty() {
            return Err(ImportError::NoDataRows);
        }

        let profile = detect_profile(&headers);
        let mapping = match (&options.column_mapping, profile) {
            (Some(explicit), _) => explicit.clone(),
            (None, Some(profile)) => profile.mapping.to_mapping(),
            (None, None) => {
                let inferred = infer_mapping(&headers)?;
                tracing::debug!(?inferred, "inferred CSV column mapping");
                inferred
            }
        };
        let date_hint = options
            .date_format_hint
            .or_else(|| profile.and_then(|p| p.date_hint))
            .unwrap_or_default();
        let invert_amounts = options
            .invert_amounts
            .unwrap_or_else(|| profile.is_some_and(|p| p.invert_amounts));

        let layout = CsvLayout::resolve(&headers, &mapping, date_hint, invert_amounts);

        let mut result = ParseResult::new(FileFormat::Csv);
        if let Some(profile) = profile {
            tracing::debug!(profile = profile.name, "matched bank profile");
            result
                .warnings
                .push(format!("Detected bank format: {}", profile.name));
        }

        let mut counter = OccurrenceCounter::new();
        for (i, record) in records.iter().enumerate() {
            // Header occupies line 1.
            layout.parse_row(record, i + 2, &mut counter).record(&mut result);
        }

        tracing::info!(
            format = "csv",
            profile = profile.map(|p| p.name),
            rows = records.len(),
            transactions = result.transactions.len(),
            warnings = result.warnings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "parsed CSV export"
        );
        Ok(result)
    }

    pub fn detect_columns<R: std::io::Read>(
        reader: &mut csv::Reader<R>,
    ) -> Result<Vec<String>, ImportError> {
        Ok(reader.headers()?.iter().map(str::to_string).collect())
    }
}

pub fn parse_csv(content: &str, options: &CsvOptions) -> Result<ParseResult, ImportError> {
    CsvImporter::parse(content, options)
}
