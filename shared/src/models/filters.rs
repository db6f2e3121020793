//! Inventory query filters

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::validation::FilterError;

/// Recognized filter keys, serialized with the names the inventory query expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FilterKey {
    #[serde(rename = "lot_name")]
    LotName,
    #[serde(rename = "bloque")]
    Block,
    #[serde(rename = "atado")]
    Bundle,
    #[serde(rename = "contenedor")]
    Container,
    #[serde(rename = "pedimento")]
    CustomsRef,
    #[serde(rename = "alto_min")]
    MinHeight,
    #[serde(rename = "ancho_min")]
    MinWidth,
    #[serde(rename = "grosor")]
    Thickness,
}

impl FilterKey {
    pub const ALL: [FilterKey; 8] = [
        FilterKey::LotName,
        FilterKey::Block,
        FilterKey::Bundle,
        FilterKey::Container,
        FilterKey::CustomsRef,
        FilterKey::MinHeight,
        FilterKey::MinWidth,
        FilterKey::Thickness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKey::LotName => "lot_name",
            FilterKey::Block => "bloque",
            FilterKey::Bundle => "atado",
            FilterKey::Container => "contenedor",
            FilterKey::CustomsRef => "pedimento",
            FilterKey::MinHeight => "alto_min",
            FilterKey::MinWidth => "ancho_min",
            FilterKey::Thickness => "grosor",
        }
    }

    /// Numeric filters compare against a dimension instead of matching text
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FilterKey::MinHeight | FilterKey::MinWidth | FilterKey::Thickness
        )
    }
}

impl FromStr for FilterKey {
    type Err = FilterError;

    /// Parse a wire name such as `bloque` or `alto_min`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| FilterError::UnknownKey(s.to_string()))
    }
}

impl std::fmt::Display for FilterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current filter values, keyed by filter.
///
/// Values are kept verbatim (including blanks) so the input echoes exactly
/// what the user typed; only non-blank values take part in a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet(BTreeMap<FilterKey, String>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: FilterKey, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: FilterKey, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    pub fn get(&self, key: FilterKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    /// Non-blank filters, trimmed
    pub fn active(&self) -> impl Iterator<Item = (FilterKey, &str)> {
        self.0
            .iter()
            .map(|(key, value)| (*key, value.trim()))
            .filter(|(_, value)| !value.is_empty())
    }

    pub fn is_active(&self) -> bool {
        self.active().next().is_some()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}
