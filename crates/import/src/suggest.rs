use std::collections::HashMap;

use chrono::NaiveDate;
use ledgerlift_core::{Milliunits, NormalizedTransaction};
use serde::{Deserialize, Serialize};

/// Payees seen at least this often yield a high-confidence suggestion.
pub const HIGH_CONFIDENCE_COUNT: u32 = 3;

/// One categorised transaction from the ledger's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub payee: String,
    pub category_id: String,
    pub category_name: String,
    pub date: NaiveDate,
}

/// A payee already known to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownPayee {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySuggestion {
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub confidence: Confidence,
}

impl CategorySuggestion {
    fn none() -> Self {
        CategorySuggestion {
            category_id: None,
            category_name: None,
            confidence: Confidence::None,
        }
    }
}

#[derive(Debug, Clone)]
struct PayeeStats {
    category_id: String,
    category_name: String,
    last_seen: NaiveDate,
    count: u32,
}

/// Normalised payee name to the category it was most recently filed under.
#[derive(Debug, Clone, Default)]
pub struct PayeeCategoryIndex {
    // Insertion order drives the substring fallback.
    payees: Vec<(String, PayeeStats)>,
    by_name: HashMap<String, usize>,
}

fn normalize_payee(name: &str) -> String {
    name.trim().to_lowercase()
}

impl PayeeCategoryIndex {
    /// Entries with a blank payee or category are ignored.
    pub fn new(history: impl IntoIterator<Item = HistoryEntry>) -> Self {
        let mut index = PayeeCategoryIndex::default();
        for entry in history {
            index.insert(entry);
        }
        index
    }

    fn insert(&mut self, entry: HistoryEntry) {
        let key = normalize_payee(&entry.payee);
        if key.is_empty() || entry.category_id.trim().is_empty() {
            return;
        }

        match self.by_name.get(&key) {
            Some(&i) => {
                let stats = &mut self.payees[i].1;
                stats.count += 1;
                if entry.date >= stats.last_seen {
                    stats.last_seen = entry.date;
                    stats.category_id = entry.category_id;
                    stats.category_name = entry.category_name;
                }
            }
            None => {
                self.by_name.insert(key.clone(), self.payees.len());
                self.payees.push((
                    key,
                    PayeeStats {
                        category_id: entry.category_id,
                        category_name: entry.category_name,
                        last_seen: entry.date,
                        count: 1,
                    },
                ));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.payees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payees.is_empty()
    }

    fn lookup(&self, payee: &str) -> Option<&PayeeStats> {
        let key = normalize_payee(payee);
        if key.is_empty() {
            return None;
        }
        if let Some(&i) = self.by_name.get(&key) {
            return Some(&self.payees[i].1);
        }
        self.payees
            .iter()
            .find(|(name, _)| key.contains(name.as_str()) || name.contains(key.as_str()))
            .map(|(_, stats)| stats)
    }

    pub fn suggest(&self, payee: &str) -> CategorySuggestion {
        let Some(stats) = self.lookup(payee) else {
            return CategorySuggestion::none();
        };
        CategorySuggestion {
            category_id: Some(stats.category_id.clone()),
            category_name: Some(stats.category_name.clone()),
            confidence: if stats.count >= HIGH_CONFIDENCE_COUNT {
                Confidence::High
            } else {
                Confidence::Medium
            },
        }
    }
}

/// First known payee whose name equals, or is contained in, the imported
/// payee (case-insensitive).
pub fn match_known_payee<'a>(payee: &str, known: &'a [KnownPayee]) -> Option<&'a KnownPayee> {
    let key = normalize_payee(payee);
    known.iter().find(|p| {
        let name = p.name.to_lowercase();
        !name.is_empty() && (name == key || key.contains(&name))
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionPreview {
    #[serde(flatten)]
    pub transaction: NormalizedTransaction,
    pub suggested_category_id: Option<String>,
    pub suggested_category_name: Option<String>,
    pub category_match_confidence: Confidence,
    pub matched_payee_id: Option<String>,
    pub matched_payee_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportPreview {
    pub total_count: usize,
    pub total_amount: Milliunits,
    pub categorized_count: usize,
    pub uncategorized_count: usize,
    pub previews: Vec<TransactionPreview>,
}

/// Dry-run view of an import with a category suggestion per transaction.
pub fn preview(
    transactions: &[NormalizedTransaction],
    index: &PayeeCategoryIndex,
    known: &[KnownPayee],
) -> ImportPreview {
    let previews: Vec<TransactionPreview> = transactions
        .iter()
        .map(|tx| {
            let suggestion = index.suggest(&tx.payee);
            let matched = match_known_payee(&tx.payee, known);
            TransactionPreview {
                transaction: tx.clone(),
                suggested_category_id: suggestion.category_id,
                suggested_category_name: suggestion.category_name,
                category_match_confidence: suggestion.confidence,
                matched_payee_id: matched.map(|p| p.id.clone()),
                matched_payee_name: matched.map(|p| p.name.clone()),
            }
        })
        .collect();

    let categorized_count = previews
        .iter()
        .filter(|p| p.suggested_category_id.is_some())
        .count();

    tracing::debug!(
        transactions = previews.len(),
        categorized = categorized_count,
        history_payees = index.len(),
        "built import preview"
    );

    ImportPreview {
        total_count: previews.len(),
        total_amount: transactions.iter().map(|t| t.amount).sum(),
        categorized_count,
        uncategorized_count: previews.len() - categorized_count,
        previews,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn entry(payee: &str, category: &str, d: u32) -> HistoryEntry {
        HistoryEntry {
            payee: payee.to_string(),
            category_id: format!("cat-{}", category.to_lowercase()),
            category_name: category.to_string(),
            date: day(d),
        }
    }

    fn tx(payee: &str, amount: i64) -> NormalizedTransaction {
        NormalizedTransaction {
            date: day(20),
            amount: Milliunits(amount),
            payee: payee.to_string(),
            memo: String::new(),
            import_id: format!("YNAB-MCP:{payee}"),
        }
    }

    fn sample_index() -> PayeeCategoryIndex {
        PayeeCategoryIndex::new(vec![
            entry("Starbucks", "Coffee", 1),
            entry("STARBUCKS ", "Coffee", 5),
            entry("starbucks", "Coffee", 9),
            entry("Shell", "Fuel", 3),
            entry("Whole Foods", "Groceries", 2),
            entry("Whole Foods", "Household", 8),
            entry("Whole Foods", "Groceries", 4),
        ])
    }

    // ── PayeeCategoryIndex ────────────────────────────────────────────────────

    #[test]
    fn exact_match_case_and_whitespace_insensitive() {
        let index = sample_index();
        assert_eq!(index.len(), 3);
        let s = index.suggest("  STARBUCKS");
        assert_eq!(s.category_name.as_deref(), Some("Coffee"));
        assert_eq!(s.confidence, Confidence::High);
    }

    #[test]
    fn few_sightings_is_medium() {
        let s = sample_index().suggest("shell");
        assert_eq!(s.category_id.as_deref(), Some("cat-fuel"));
        assert_eq!(s.confidence, Confidence::Medium);
    }

    #[test]
    fn most_recent_entry_supplies_category() {
        let s = sample_index().suggest("whole foods");
        assert_eq!(s.category_name.as_deref(), Some("Household"));
        assert_eq!(s.confidence, Confidence::High);
    }

    #[test]
    fn substring_match_either_direction() {
        let index = sample_index();
        assert_eq!(
            index.suggest("STARBUCKS STORE 12345").category_name.as_deref(),
            Some("Coffee")
        );
        assert_eq!(index.suggest("foods").category_name.as_deref(), Some("Household"));
    }

    #[test]
    fn unmatched_is_none() {
        let s = sample_index().suggest("NETFLIX.COM");
        assert_eq!(s, CategorySuggestion::none());
        assert_eq!(sample_index().suggest("   ").confidence, Confidence::None);
    }

    #[test]
    fn blank_history_entries_ignored() {
        let index = PayeeCategoryIndex::new(vec![
            entry("", "Misc", 1),
            HistoryEntry {
                category_id: " ".to_string(),
                ..entry("Uncategorized Shop", "None", 1)
            },
        ]);
        assert!(index.is_empty());
    }

    // ── known payees ──────────────────────────────────────────────────────────

    #[test]
    fn known_payee_exact_or_contained() {
        let known = vec![
            KnownPayee { id: "p1".to_string(), name: "Amazon".to_string() },
            KnownPayee { id: "p2".to_string(), name: "".to_string() },
        ];
        assert_eq!(match_known_payee("AMAZON.COM*AB1", &known).map(|p| p.id.as_str()), Some("p1"));
        assert_eq!(match_known_payee("amazon", &known).map(|p| p.id.as_str()), Some("p1"));
        assert!(match_known_payee("Target", &known).is_none());
    }

    // ── preview ───────────────────────────────────────────────────────────────

    #[test]
    fn preview_counts_and_totals() {
        let known = vec![KnownPayee {
            id: "p-sb".to_string(),
            name: "Starbucks".to_string(),
        }];
        let txs = vec![tx("STARBUCKS STORE 1", -4_850), tx("NETFLIX", -15_490), tx("Shell", -40_000)];
        let result = preview(&txs, &sample_index(), &known);

        assert_eq!(result.total_count, 3);
        assert_eq!(result.categorized_count, 2);
        assert_eq!(result.uncategorized_count, 1);
        assert_eq!(result.total_amount, Milliunits(-60_340));
        assert_eq!(result.previews[0].matched_payee_id.as_deref(), Some("p-sb"));
        assert_eq!(result.previews[1].category_match_confidence, Confidence::None);
    }

    #[test]
    fn preview_serializes_flat() {
        let result = preview(&[tx("Shell", -1_000)], &sample_index(), &[]);
        let json = serde_json::to_value(&result.previews[0]).unwrap();
        assert_eq!(json["payee"], "Shell");
        assert_eq!(json["importId"], "YNAB-MCP:Shell");
        assert_eq!(json["category_match_confidence"], "medium");
        assert!(json["matched_payee_id"].is_null());
    }
}
