//! Core data models used throughout TSA RAG.
//!
//! These types represent the indexed rules and the per-query results that
//! flow through the indexing and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// One indexed unit of knowledge: a single line of the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Stable identifier, the 1-based line number as a string.
    pub id: String,
    /// Trimmed line content.
    pub text: String,
    pub metadata: ItemMetadata,
}

/// Metadata stored alongside each item.
///
/// Serialized with the keys `line_number` and `item` so that stored rows
/// stay readable by other tools inspecting the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    /// Original 1-based line number in the corpus.
    #[serde(rename = "line_number")]
    pub position: usize,
    /// Category token, the text before the first `.`.
    #[serde(rename = "item")]
    pub label: String,
}

impl Item {
    /// Build an item from a raw corpus line at a 1-based `position`.
    ///
    /// Returns `None` for lines that are blank after trimming.
    pub fn from_line(position: usize, line: &str) -> Option<Self> {
        let text = line.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            id: position.to_string(),
            text: text.to_string(),
            metadata: ItemMetadata {
                position,
                label: derive_label(text).to_string(),
            },
        })
    }

    pub fn label(&self) -> &str {
        &self.metadata.label
    }

    pub fn position(&self) -> usize {
        self.metadata.position
    }
}

/// Derive the category label of a rule: everything before the first `.`.
///
/// Text without a `.` is its own label.
///
/// ```rust
/// use tsa_rag_core::models::derive_label;
///
/// assert_eq!(derive_label("Firearms. Unloaded firearms must be..."), "Firearms");
/// assert_eq!(derive_label("No period here"), "No period here");
/// ```
pub fn derive_label(text: &str) -> &str {
    text.split('.').next().unwrap_or(text)
}

/// A retrieved item and its distance from the query (smaller = closer).
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub item: Item,
    pub distance: f32,
}

/// Result of a single retrieval, ordered by ascending distance.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub query_text: String,
    pub matches: Vec<Match>,
}

impl QueryResult {
    /// Newline-joined text of every match, in match order.
    pub fn context_block(&self) -> String {
        self.matches
            .iter()
            .map(|m| m.item.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_line_trims_and_labels() {
        let item = Item::from_line(3, "  Firearms. Unloaded firearms only.\n").unwrap();
        assert_eq!(item.id, "3");
        assert_eq!(item.text, "Firearms. Unloaded firearms only.");
        assert_eq!(item.label(), "Firearms");
        assert_eq!(item.position(), 3);
    }

    #[test]
    fn test_from_line_blank() {
        assert!(Item::from_line(1, "   \n").is_none());
        assert!(Item::from_line(1, "").is_none());
    }

    #[test]
    fn test_label_matches_split() {
        let lines = [
            "Liquids. Max 3.4oz containers.",
            "Batteries",
            ".Leading period",
            "Food. Solid food is allowed. Liquids are not.",
        ];
        for line in lines {
            let text = line.trim();
            assert_eq!(derive_label(text), text.split('.').next().unwrap());
        }
        assert_eq!(derive_label(".Leading period"), "");
    }

    #[test]
    fn test_metadata_json_keys() {
        let meta = ItemMetadata {
            position: 7,
            label: "Knives".to_string(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({"line_number": 7, "item": "Knives"}));
    }

    #[test]
    fn test_context_block_preserves_order() {
        let result = QueryResult {
            query_text: "q".to_string(),
            matches: vec![
                Match {
                    item: Item::from_line(2, "B. second").unwrap(),
                    distance: 0.1,
                },
                Match {
                    item: Item::from_line(1, "A. first").unwrap(),
                    distance: 0.2,
                },
            ],
        };
        assert_eq!(result.context_block(), "B. second\nA. first");
    }

    #[test]
    fn test_context_block_empty() {
        let result = QueryResult {
            query_text: "q".to_string(),
            matches: Vec::new(),
        };
        assert_eq!(result.context_block(), "");
        assert!(result.is_empty());
    }
}
