use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::scene::catalog::Element;

/// Success payload of the parse service, field names matching the wire JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParseResponse {
    pub elements: Vec<Element>,
    pub costs: Option<Costs>,
    pub element_count: usize,
    pub costs_calculated: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Costs {
    pub summary: CostSummary,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    pub grand_total: f64,
    pub total_material_cost: f64,
    pub total_connection_cost: f64,
    pub total_labor_cost: f64,
}

/// Terminal message of one upload attempt. Exactly one of these arrives per
/// spawned upload; there are no intermediate or partial updates.
#[derive(Clone, Debug)]
pub enum UploadOutcome {
    Parsed(ParseResponse),
    Failed(String),
}

// Client-side gate: only files named *.ifc are ever submitted
pub fn is_ifc_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".ifc"))
}

// Upload worker (feature-gated). Builds without the backend feature get a
// stub that fails immediately with a clear message.
#[cfg(feature = "backend")]
pub mod client;

#[cfg(not(feature = "backend"))]
pub mod client {
    use std::path::PathBuf;
    use std::sync::mpsc::Receiver;

    use super::UploadOutcome;
    use crate::persistence::settings::AppSettings;

    pub fn spawn_upload(_path: PathBuf, _cfg: &AppSettings) -> Receiver<UploadOutcome> {
        let (tx, rx) = std::sync::mpsc::channel();
        let _ = tx.send(UploadOutcome::Failed(
            "Built without backend support; use the local load path".to_string(),
        ));
        rx
    }
}
