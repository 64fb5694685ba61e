//! Static lookup tables: store directory, metric labels, tender aliases,
//! labor suffixes, and daypart columns.
//!
//! The tables are read once from YAML at start-up, validated, indexed into a
//! [`MappingTables`] value, and passed by reference into the parser and
//! normalizer. Nothing here is global state, so tests build their own tables
//! from inline YAML.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::records::{DaypartField, LaborField, SalesField, StoreId};
use crate::ConfigError;

// ---------------------------------------------------------------------------
// File shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEntry {
    pub code: String,
    pub name: String,
    /// Location strings as they appear in vendor exports,
    /// e.g. `"357993 - 423 N Enola Rd"`.
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaborSuffix {
    pub suffix: String,
    pub field: LaborField,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaypartColumn {
    pub header: String,
    pub field: DaypartField,
    /// Secondary column consulted when this column is not a positive number.
    #[serde(default)]
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingsFile {
    #[serde(default)]
    pub stores: Vec<StoreEntry>,
    #[serde(default)]
    pub sales_summary_labels: BTreeMap<String, SalesField>,
    /// Raw row labels that are tender types. Keys of `tender_aliases` are
    /// tender labels too and need not be repeated here.
    #[serde(default)]
    pub tender_labels: Vec<String>,
    #[serde(default)]
    pub tender_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub labor_suffixes: Vec<LaborSuffix>,
    #[serde(default)]
    pub daypart_columns: Vec<DaypartColumn>,
}

// ---------------------------------------------------------------------------
// Store directory
// ---------------------------------------------------------------------------

/// Resolves vendor location strings to store codes.
#[derive(Debug, Clone, Default)]
pub struct StoreDirectory {
    entries: Vec<StoreEntry>,
    exact: HashMap<String, StoreId>,
    codes: HashSet<String>,
}

impl StoreDirectory {
    fn build(entries: Vec<StoreEntry>) -> Result<Self, ConfigError> {
        let mut exact: HashMap<String, StoreId> = HashMap::new();
        let mut codes = HashSet::new();

        for entry in &entries {
            let code = entry.code.trim();
            if code.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "store '{}' has an empty code",
                    entry.name
                )));
            }
            if !codes.insert(code.to_string()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate store code: '{code}'"
                )));
            }

            let keys = std::iter::once(code)
                .chain(std::iter::once(entry.name.trim()))
                .chain(entry.patterns.iter().map(|p| p.trim()))
                .filter(|k| !k.is_empty());

            for key in keys {
                match exact.get(key) {
                    Some(existing) if existing.as_str() != code => {
                        return Err(ConfigError::Validation(format!(
                            "location '{key}' maps to both store '{existing}' and store '{code}'"
                        )));
                    }
                    _ => {
                        exact.insert(key.to_string(), StoreId::new(code));
                    }
                }
            }
        }

        Ok(Self {
            entries,
            exact,
            codes,
        })
    }

    /// Resolve a location string to a store code.
    ///
    /// Priority: exact match on a known code, name, or pattern; then the
    /// longest pattern contained in the location string; then the leading
    /// digits of the location string when they form a known code.
    #[must_use]
    pub fn resolve(&self, location: &str) -> Option<StoreId> {
        let location = location.trim();
        if location.is_empty() {
            return None;
        }

        if let Some(id) = self.exact.get(location) {
            return Some(id.clone());
        }

        let mut best: Option<(&str, usize)> = None;
        for entry in &self.entries {
            for pattern in entry.patterns.iter().map(|p| p.trim()) {
                if pattern.is_empty() || !location.contains(pattern) {
                    continue;
                }
                if best.is_none_or(|(_, len)| pattern.len() > len) {
                    best = Some((entry.code.trim(), pattern.len()));
                }
            }
        }
        if let Some((code, _)) = best {
            return Some(StoreId::new(code));
        }

        let digits: String = location
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        if !digits.is_empty() && self.codes.contains(&digits) {
            return Some(StoreId::new(digits));
        }

        None
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Indexed tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MappingTables {
    pub stores: StoreDirectory,
    sales_labels: HashMap<String, SalesField>,
    tender_labels: HashSet<String>,
    tender_aliases: HashMap<String, String>,
    /// Sorted longest-first so `"OT Hours"` cannot shadow a longer suffix.
    labor_suffixes: Vec<LaborSuffix>,
    daypart_columns: Vec<DaypartColumn>,
}

impl MappingTables {
    /// Validate and index a deserialized mappings file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the tables are inconsistent.
    pub fn from_file(file: MappingsFile) -> Result<Self, ConfigError> {
        let stores = StoreDirectory::build(file.stores)?;

        let mut sales_labels = HashMap::new();
        for (label, field) in file.sales_summary_labels {
            if label.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "sales summary label must be non-empty".to_string(),
                ));
            }
            sales_labels.insert(label, field);
        }

        let mut tender_aliases = HashMap::new();
        for (raw, canonical) in file.tender_aliases {
            if canonical.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "tender alias '{raw}' has an empty canonical name"
                )));
            }
            tender_aliases.insert(raw, canonical);
        }

        let mut tender_labels: HashSet<String> = file.tender_labels.into_iter().collect();
        tender_labels.extend(tender_aliases.keys().cloned());
        if tender_labels.iter().any(|l| l.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "tender label must be non-empty".to_string(),
            ));
        }

        if let Some(clash) = tender_labels.iter().find(|l| sales_labels.contains_key(*l)) {
            return Err(ConfigError::Validation(format!(
                "label '{clash}' is both a sales summary metric and a tender type"
            )));
        }

        let mut seen_suffixes = HashSet::new();
        for s in &file.labor_suffixes {
            if s.suffix.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "labor suffix must be non-empty".to_string(),
                ));
            }
            if !seen_suffixes.insert(s.suffix.clone()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate labor suffix: '{}'",
                    s.suffix
                )));
            }
        }
        let mut labor_suffixes = file.labor_suffixes;
        labor_suffixes.sort_by(|a, b| b.suffix.len().cmp(&a.suffix.len()));

        let mut seen_headers = HashSet::new();
        for c in &file.daypart_columns {
            if c.header.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "daypart column header must be non-empty".to_string(),
                ));
            }
            if !seen_headers.insert(c.header.clone()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate daypart column: '{}'",
                    c.header
                )));
            }
            if c.fallback.as_deref() == Some(c.header.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "daypart column '{}' cannot fall back to itself",
                    c.header
                )));
            }
        }

        Ok(Self {
            stores,
            sales_labels,
            tender_labels,
            tender_aliases,
            labor_suffixes,
            daypart_columns: file.daypart_columns,
        })
    }

    /// Parse, validate, and index mappings from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MappingsFileParse`] or [`ConfigError::Validation`].
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: MappingsFile = serde_yaml::from_str(yaml)?;
        Self::from_file(file)
    }

    /// Exact, case-sensitive lookup of a sales summary row label.
    #[must_use]
    pub fn sales_field(&self, label: &str) -> Option<SalesField> {
        self.sales_labels.get(label).copied()
    }

    #[must_use]
    pub fn is_tender_label(&self, label: &str) -> bool {
        self.tender_labels.contains(label)
    }

    /// Canonical tender name; labels without an alias pass through unchanged.
    #[must_use]
    pub fn canonical_tender<'a>(&'a self, label: &'a str) -> &'a str {
        self.tender_aliases.get(label).map_or(label, String::as_str)
    }

    /// Split a labor label like `"Crew Total Hours"` into
    /// `("Crew", LaborField::TotalHours)`.
    #[must_use]
    pub fn labor_split(&self, label: &str) -> Option<(String, LaborField)> {
        self.labor_suffixes.iter().find_map(|s| {
            let rest = label.strip_suffix(s.suffix.as_str())?;
            if !rest.ends_with(char::is_whitespace) {
                return None;
            }
            let position = rest.trim();
            if position.is_empty() {
                None
            } else {
                Some((position.to_string(), s.field))
            }
        })
    }

    #[must_use]
    pub fn daypart_column(&self, header: &str) -> Option<&DaypartColumn> {
        self.daypart_columns.iter().find(|c| c.header == header)
    }
}

/// Load and validate the mapping tables from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_mappings(path: &Path) -> Result<MappingTables, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::MappingsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    MappingTables::from_yaml_str(&content)
}

#[cfg(test)]
#[path = "mappings_test.rs"]
mod tests;
