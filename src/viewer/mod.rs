use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};

use once_cell::sync::OnceCell;

// Global sender that panels use to request viewer actions; the GUI thread
// drains the receiver once per frame
static VIEWER_TX: OnceCell<Sender<ViewerCommand>> = OnceCell::new();

/// Requests flowing back toward the viewer. The senders (panels, uploader)
/// know nothing about how the viewer honors them.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewerCommand {
    /// Re-select/focus the element with this express id (selection panel row
    /// click)
    Focus(u64),
    /// Highlight the element behind an element-scoped comment; the payload is
    /// the comment's stored element id
    Highlight(String),
    /// Hand a model file straight to the local consumer, bypassing the
    /// backend and skipping cost computation
    LoadLocalModel(PathBuf),
}

pub fn set_command_sender(tx: Sender<ViewerCommand>) {
    let _ = VIEWER_TX.set(tx);
}

pub fn command_sender() -> Option<&'static Sender<ViewerCommand>> {
    VIEWER_TX.get()
}

// Called by the GUI on startup to create the bridge pair
pub fn init_bridge() -> Receiver<ViewerCommand> {
    let (tx, rx) = std::sync::mpsc::channel();
    set_command_sender(tx);
    rx
}

// Best-effort send; returns false when no bridge is up (e.g. in tests)
pub fn send(cmd: ViewerCommand) -> bool {
    match VIEWER_TX.get() {
        Some(tx) => tx.send(cmd).is_ok(),
        None => false,
    }
}
