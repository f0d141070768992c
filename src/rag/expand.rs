//! Query expansion with a fixed domain-synonym table.
//!
//! The embedding model does not always activate on product-specific
//! vocabulary, so queries are widened with related terms before embedding.
//! Expansion trades precision for recall; the hybrid re-ranker recovers the
//! precision afterwards.

/// At most this many related terms are taken per matched trigger.
const MAX_TERMS_PER_TRIGGER: usize = 5;
/// Hard cap on appended terms across all triggers.
const MAX_EXPANSION_TERMS: usize = 8;

/// Immutable trigger -> related-terms table, injected at construction.
/// Entry order matters: earlier entries win the dedupe.
pub struct QueryExpander {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryExpander {
    pub fn new(entries: Vec<(String, Vec<String>)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(trigger, terms)| (trigger.to_lowercase(), terms))
            .collect();
        Self { entries }
    }

    /// Default table for the vehicle-support corpus.
    pub fn with_default_synonyms() -> Self {
        let table: &[(&str, &[&str])] = &[
            ("warranty", &["coverage", "guarantee", "repair", "replacement", "defect"]),
            ("battery", &["charge", "capacity", "range", "degradation", "pack"]),
            ("charging", &["charger", "plug", "connector", "outlet", "kilowatt"]),
            ("range", &["distance", "mileage", "efficiency", "consumption"]),
            ("service", &["maintenance", "inspection", "repair", "appointment"]),
            ("return", &["refund", "exchange", "cancellation", "policy"]),
            ("delivery", &["shipping", "arrival", "schedule", "tracking"]),
            ("price", &["cost", "payment", "financing", "invoice"]),
            ("software", &["update", "firmware", "version", "install"]),
            ("tire", &["wheel", "pressure", "rotation", "tread"]),
        ];

        Self::new(
            table
                .iter()
                .map(|(trigger, terms)| {
                    (
                        trigger.to_string(),
                        terms.iter().map(|t| t.to_string()).collect(),
                    )
                })
                .collect(),
        )
    }

    /// Pure and deterministic: appends capped, deduplicated related terms
    /// for every trigger found in the query, or returns the query unchanged.
    pub fn expand(&self, query: &str) -> String {
        let query_lower = query.to_lowercase();
        let mut pool: Vec<&str> = Vec::new();

        for (trigger, terms) in &self.entries {
            if !query_lower.contains(trigger.as_str()) {
                continue;
            }
            for term in terms.iter().take(MAX_TERMS_PER_TRIGGER) {
                if !pool.iter().any(|p| p == term) {
                    pool.push(term);
                }
            }
        }

        pool.truncate(MAX_EXPANSION_TERMS);

        if pool.is_empty() {
            query.to_string()
        } else {
            format!("{} {}", query, pool.join(" "))
        }
    }
}
