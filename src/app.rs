use eframe::egui::{self, ScrollArea, Ui};

use exes_explorer::config::Settings;

use crate::state::AppState;
use crate::ui::{map, panels, peaks, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct ExesExplorerApp {
    pub state: AppState,
}

impl ExesExplorerApp {
    pub fn new(settings: Settings) -> Self {
        Self {
            state: AppState::new(settings),
        }
    }
}

impl eframe::App for ExesExplorerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Reload the spectrum / overlays if their inputs changed last frame.
        self.state.refresh();

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: observations and parameters ----
        egui::SidePanel::left("observation_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: map, spectrum, peaks and fit ----
        egui::CentralPanel::default().show(ctx, |ui| {
            ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui: &mut Ui| {
                    map::observation_map(ui, &mut self.state);
                    ui.separator();
                    plot::spectrum_plot(ui, &mut self.state);
                    plot::line_strength_plot(ui, &self.state);
                    ui.separator();
                    peaks::peak_section(ui, &mut self.state);
                });
        });
    }
}
