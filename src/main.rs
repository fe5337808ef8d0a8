mod app;
mod color;
mod state;
mod ui;

use app::ExesExplorerApp;
use eframe::egui;
use exes_explorer::config::Settings;

fn main() -> eframe::Result {
    env_logger::init();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("{e:#}");
            return Err(eframe::Error::AppCreation(e.into()));
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "EXES Explorer – Spectra and HITRAN Lines",
        options,
        Box::new(|_cc| Ok(Box::new(ExesExplorerApp::new(settings)))),
    )
}
