use ifc_scope::gui::frontend::ViewerApp;
use ifc_scope::persistence::settings::AppSettings;

use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();
    let settings = AppSettings::load().unwrap_or_default();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1300.0, 710.0])
            // Provide sensible bounds so the UI stays usable on small screens
            .with_min_inner_size([700.0, 420.0])
            .with_resizable(true),
        ..Default::default()
    };
    eframe::run_native(
        "IFC-Scope",
        options,
        Box::new(move |_cc| Ok(Box::new(ViewerApp::new(settings)) as Box<dyn eframe::App>)),
    )
}
