use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

// Grouping key used when an element arrives without a type name
pub const UNKNOWN_TYPE: &str = "Unknown";

/// One free-form property value from the parser's property bag.
/// Kept as a tagged variant so consumers stay type-safe; the wire format
/// is plain JSON, hence `untagged`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Map(HashMap<String, PropertyValue>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub type_name: String,
    pub global_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<[f64; 3]>,
    #[serde(default)]
    pub placement_matrix: Option<Vec<f64>>,
    #[serde(default)]
    pub properties: Option<HashMap<String, PropertyValue>>,
}

impl Element {
    // Type key for grouping; empty wire values collapse to "Unknown"
    pub fn type_key(&self) -> &str {
        if self.type_name.is_empty() { UNKNOWN_TYPE } else { &self.type_name }
    }

    pub fn display_name(&self) -> &str {
        match &self.name {
            Some(n) if !n.is_empty() => n,
            _ => &self.global_id,
        }
    }
}

/// Immutable-per-load list of parsed elements. The only mutations are a full
/// replace on successful parse and a full clear, which keeps every downstream
/// invariant (visibility key set, viewport markers) trivial to restate.
#[derive(Clone, Debug, Default)]
pub struct ElementCatalog {
    elements: Vec<Element>,
}

impl ElementCatalog {
    pub fn new() -> Self {
        Self { elements: Vec::new() }
    }

    // Replace all state with a freshly parsed element list
    pub fn load(&mut self, elements: Vec<Element>) {
        self.elements = elements;
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Per-type element counts, sorted by type name for stable display.
    /// Counts are catalog-derived and independent of any visibility flags.
    pub fn type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for element in &self.elements {
            *counts.entry(element.type_key().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// First `limit` elements plus the count of the rest, for the
    /// "list a few, collapse the remainder" summary view. The remainder
    /// collapses to 0 when the catalog fits within the limit.
    pub fn preview(&self, limit: usize) -> (&[Element], usize) {
        let shown = limit.min(self.elements.len());
        (&self.elements[..shown], self.elements.len() - shown)
    }
}
