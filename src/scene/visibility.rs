use std::collections::BTreeMap;

/// Per-type display flags for the viewport. Keys mirror the distinct type
/// names of the last successfully loaded catalog; queries for absent keys are
/// fail-open (visible), so callers must seed before relying on the key set.
#[derive(Clone, Debug, Default)]
pub struct VisibilityManager {
    flags: BTreeMap<String, bool>,
}

impl VisibilityManager {
    pub fn new() -> Self {
        Self { flags: BTreeMap::new() }
    }

    // Insert missing type keys as visible; existing flags are left untouched.
    // Supports incremental loads that want to keep user overrides.
    pub fn seed(&mut self, counts: &BTreeMap<String, usize>) {
        for type_name in counts.keys() {
            self.flags.entry(type_name.clone()).or_insert(true);
        }
    }

    // Replace the whole mapping with all-visible flags for the given catalog.
    // This is what the (re)load path uses: the key set always matches the
    // last successful parse exactly.
    pub fn reset_from(&mut self, counts: &BTreeMap<String, usize>) {
        self.flags = counts.keys().map(|t| (t.clone(), true)).collect();
    }

    pub fn clear(&mut self) {
        self.flags.clear();
    }

    // Direct mutation; unknown type names are simply inserted
    pub fn set_visible(&mut self, type_name: &str, visible: bool) {
        self.flags.insert(type_name.to_string(), visible);
    }

    pub fn show_all(&mut self) {
        for flag in self.flags.values_mut() {
            *flag = true;
        }
    }

    pub fn hide_all(&mut self) {
        for flag in self.flags.values_mut() {
            *flag = false;
        }
    }

    /// A type absent from the mapping is treated as visible by convention.
    pub fn is_visible(&self, type_name: &str) -> bool {
        self.flags.get(type_name).copied().unwrap_or(true)
    }

    pub fn flags(&self) -> &BTreeMap<String, bool> {
        &self.flags
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
