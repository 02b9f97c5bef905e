use std::collections::HashSet;

/// One picked element, as reported by the viewer's click events.
/// Uniquely keyed by `express_id`; `fragment_id` carries the viewer-side
/// mesh/global identifier when the viewer supplies one.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionEntry {
    pub express_id: u64,
    pub name: String,
    pub type_name: String,
    pub fragment_id: Option<String>,
}

/// Ordered, duplicate-free set of selected elements plus the isolation flag.
/// Isolation is a view mode, emptiness is a selection fact: removing the last
/// entry never exits isolation on its own.
#[derive(Clone, Debug, Default)]
pub struct SelectionManager {
    entries: Vec<SelectionEntry>,
    index: HashSet<u64>,
    isolated: bool,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    // Append unless the express id is already selected; insertion order is
    // what the panel displays.
    pub fn add(&mut self, entry: SelectionEntry) {
        if self.index.insert(entry.express_id) {
            self.entries.push(entry);
        }
    }

    // No-op when the id is not selected
    pub fn remove(&mut self, express_id: u64) {
        if self.index.remove(&express_id) {
            self.entries.retain(|e| e.express_id != express_id);
        }
    }

    // Empties the set; deliberately leaves `isolated` alone
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    // Valid only with a non-empty selection; empty-set calls are a no-op
    // (the panel disables the button, this guards programmatic callers too)
    pub fn isolate(&mut self) {
        if !self.entries.is_empty() {
            self.isolated = true;
        }
    }

    pub fn unisolate(&mut self) {
        self.isolated = false;
    }

    pub fn is_isolated(&self) -> bool {
        self.isolated
    }

    pub fn contains(&self, express_id: u64) -> bool {
        self.index.contains(&express_id)
    }

    pub fn entries(&self) -> &[SelectionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recently added entry; new comments are scoped to this one.
    pub fn current(&self) -> Option<&SelectionEntry> {
        self.entries.last()
    }
}
