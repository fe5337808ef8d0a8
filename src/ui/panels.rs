use eframe::egui::{self, emath::Numeric, Color32, DragValue, RichText, ScrollArea, Ui};

use crate::state::{AppState, SelectionMode};

// ---------------------------------------------------------------------------
// Left side panel – observation filter, list and parameters
// ---------------------------------------------------------------------------

/// Render the left panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Observations");
    ui.separator();

    if state.catalog.is_empty() {
        ui.label(format!(
            "No EXES files in {}",
            state.settings.exes_dir.display()
        ));
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            object_filter(ui, state);
            ui.separator();
            observation_list(ui, state);
            ui.separator();
            parameters(ui, state);
        });
}

fn object_filter(ui: &mut Ui, state: &mut AppState) {
    let objects: Vec<String> = state.catalog.objects.iter().cloned().collect();
    let header = format!(
        "Objects  ({}/{})",
        if state.object_filter.is_empty() {
            objects.len()
        } else {
            state.object_filter.len()
        },
        objects.len()
    );

    egui::CollapsingHeader::new(RichText::new(header).strong())
        .id_salt("object_filter")
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            if ui.small_button("All").clicked() {
                state.clear_object_filter();
            }
            for object in &objects {
                let mut checked = state.object_filter.contains(object);
                if ui.checkbox(&mut checked, object.as_str()).changed() {
                    state.toggle_object(object);
                }
            }
        });
}

fn observation_list(ui: &mut Ui, state: &mut AppState) {
    ui.strong(format!("{} shown", state.visible_indices.len()));

    let mut clicked = None;
    for &idx in &state.visible_indices {
        let obs = &state.catalog.observations[idx];
        let [object, elevation, altitude, position] = obs.meta.summary_row();
        let is_selected = state.selected.as_deref() == Some(obs.path.as_path());
        let response = ui
            .selectable_label(is_selected, RichText::new(&obs.file_name).monospace())
            .on_hover_text(format!("{object}\n{elevation}\n{altitude}\n{position}"));
        if response.clicked() {
            clicked = Some(obs.path.clone());
        }
    }
    if let Some(path) = clicked {
        state.select_observation(&path);
    }
}

/// Shows a checkbox plus value editor for an optional parameter.
fn optional_value<T: Numeric>(
    ui: &mut Ui,
    label: &str,
    value: &mut Option<T>,
    fallback: T,
    speed: f64,
) -> bool {
    let mut enabled = value.is_some();
    let mut current = value.unwrap_or(fallback);
    let mut changed = false;
    ui.horizontal(|ui: &mut Ui| {
        changed |= ui.checkbox(&mut enabled, label).changed();
        changed |= ui
            .add_enabled(enabled, DragValue::new(&mut current).speed(speed))
            .changed();
    });
    *value = enabled.then_some(current);
    changed
}

fn parameters(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Spectrum");
    // Width and cutoff are picked up by `AppState::refresh` next frame.
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Smoothing width");
        ui.add(DragValue::new(&mut state.settings.smooth_width).range(0..=101));
    });
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Strength cutoff");
        ui.add(
            DragValue::new(&mut state.settings.cutoff)
                .speed(1e-5)
                .range(1e-12..=1e6)
                .custom_formatter(|v, _| format!("{v:.1e}")),
        );
    });

    ui.add_space(6.0);
    ui.strong("Peak finder");
    let mut peaks_changed = false;
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Height");
        peaks_changed |= ui
            .add(DragValue::new(&mut state.settings.height).speed(0.005))
            .changed();
    });
    peaks_changed |= optional_value(ui, "Prominence", &mut state.settings.prominence, 0.05, 0.005);
    peaks_changed |= optional_value(ui, "Distance", &mut state.settings.distance, 3, 0.2);

    let mut baseline_changed = false;
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Baseline");
        baseline_changed = ui
            .add(DragValue::new(&mut state.settings.baseline).speed(0.005))
            .changed();
    });

    if peaks_changed {
        state.recompute_peaks();
    } else if baseline_changed {
        state.refit();
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open EXES folder…").clicked() {
                open_exes_dialog(state);
                ui.close_menu();
            }
            if ui.button("Open HITRAN folder…").clicked() {
                open_hitran_dialog(state);
                ui.close_menu();
            }
            if ui.button("Rescan").clicked() {
                state.rescan();
                ui.close_menu();
            }
        });

        ui.separator();

        ui.label(format!(
            "{} observations, {} visible",
            state.catalog.len(),
            state.visible_indices.len()
        ));

        ui.separator();

        ui.label("Drag:");
        for (mode, label) in [
            (SelectionMode::Pan, "Pan"),
            (SelectionMode::Box, "Box select"),
            (SelectionMode::Lasso, "Lasso select"),
        ] {
            if ui.selectable_label(state.selection_mode == mode, label).clicked() {
                state.selection_mode = mode;
                state.pending_selection.clear();
            }
        }
        if state.selection.is_some() && ui.button("Clear selection").clicked() {
            state.clear_selection();
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Folder dialogs
// ---------------------------------------------------------------------------

pub fn open_exes_dialog(state: &mut AppState) {
    let folder = rfd::FileDialog::new()
        .set_title("Open EXES observation folder")
        .set_directory(&state.settings.exes_dir)
        .pick_folder();

    if let Some(dir) = folder {
        log::info!("Scanning {}", dir.display());
        state.set_exes_dir(dir);
    }
}

pub fn open_hitran_dialog(state: &mut AppState) {
    let folder = rfd::FileDialog::new()
        .set_title("Open HITRAN line table folder")
        .set_directory(&state.settings.hitran_dir)
        .pick_folder();

    if let Some(dir) = folder {
        log::info!("Using HITRAN tables in {}", dir.display());
        state.set_hitran_dir(dir);
    }
}
