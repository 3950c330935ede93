pub mod date;
pub mod import_id;
pub mod money;
pub mod reconcile;
pub mod transaction;

pub use date::{is_valid_date, normalize_date, parse_date, to_naive_date, DateFormatHint};
pub use import_id::{generate_import_id, OccurrenceCounter, IMPORT_ID_PREFIX};
pub use money::{describe_amount, format_amount, parse_amount, AmountError, Milliunits};
pub use reconcile::{reconcile, ReconciliationInput, ReconciliationReport};
pub use transaction::{FileFormat, NormalizedTransaction, ParseResult};
