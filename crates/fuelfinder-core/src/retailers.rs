use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const RETAILERS_CSV: &str = include_str!("retailers.csv");

#[derive(Debug, Error)]
pub enum RetailerError {
    #[error("failed to parse retailers table: {0}")]
    Csv(#[from] csv::Error),

    #[error("duplicate retailer name: {0}")]
    Duplicate(String),

    #[error("retailer on row {row} has an empty name")]
    EmptyName { row: usize },
}

/// Canonical brand identity for a fuel retailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retailer {
    pub name: String,
    pub website_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

/// Immutable lookup table of retailers keyed by uppercase name.
#[derive(Debug, Clone, Default)]
pub struct Retailers {
    by_name: BTreeMap<String, Retailer>,
}

impl Retailers {
    /// Load the table compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns [`RetailerError`] if the embedded table is malformed or lists
    /// the same name twice.
    pub fn embedded() -> Result<Self, RetailerError> {
        Self::from_csv(RETAILERS_CSV)
    }

    /// Parse a `name,website_url,logo_url` table with a header row.
    ///
    /// # Errors
    ///
    /// Returns [`RetailerError`] on CSV decode failure, a blank name, or a
    /// duplicate name (compared case-insensitively).
    pub fn from_csv(data: &str) -> Result<Self, RetailerError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());

        let mut by_name = BTreeMap::new();
        for (index, row) in reader.deserialize::<Retailer>().enumerate() {
            let mut retailer = row?;
            if retailer.name.is_empty() {
                return Err(RetailerError::EmptyName { row: index + 1 });
            }
            retailer.name = retailer.name.to_uppercase();
            if by_name.contains_key(&retailer.name) {
                return Err(RetailerError::Duplicate(retailer.name));
            }
            by_name.insert(retailer.name.clone(), retailer);
        }

        Ok(Self { by_name })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Resolve a free-text brand or trading name to a retailer.
    ///
    /// The input is uppercased and the longest retailer name that is a prefix
    /// of it wins, so `"ASDA EXPRESS PETROL"` resolves to `ASDA EXPRESS`
    /// rather than `ASDA`. Names are unique, so two matches can never share a
    /// length.
    #[must_use]
    pub fn match_brand_name(&self, name: &str) -> Option<&Retailer> {
        let normalized = name.to_uppercase();
        self.by_name
            .iter()
            .filter(|(retailer_name, _)| normalized.starts_with(retailer_name.as_str()))
            .max_by_key(|(retailer_name, _)| retailer_name.len())
            .map(|(_, retailer)| retailer)
    }
}
