use eframe::egui::{self, Color32, DragValue, Ui};
use egui_extras::{Column, TableBuilder};
use egui_plot::{Legend, Line, LineStyle, MarkerShape, Plot, PlotPoints, Points};

use exes_explorer::analysis::fit::{LineShape, PeakRow};

use crate::state::AppState;
use crate::ui::plot::finite_points;

const FIT_COLOR: Color32 = Color32::from_rgb(127, 46, 231);

// ---------------------------------------------------------------------------
// Peak finder, peak table and fit
// ---------------------------------------------------------------------------

pub fn peak_section(ui: &mut Ui, state: &mut AppState) {
    if state.region.is_none() {
        ui.label("Select a section of the spectrum with the box or lasso tool.");
        return;
    }
    peaks_plot(ui, state);
    ui.separator();
    peak_table(ui, state);
    ui.separator();
    fit_plot(ui, state);
}

fn peaks_plot(ui: &mut Ui, state: &AppState) {
    let Some(region) = &state.region else {
        return;
    };
    ui.strong(format!("Identified peaks: {}", state.peaks.len()));

    let baseline = state.settings.baseline;
    Plot::new("peaks_plot")
        .height(240.0)
        .legend(Legend::default())
        .x_axis_label("Wavenumber (cm⁻¹)")
        .y_axis_label("Normalized flux")
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(finite_points(&region.wavenumber, &region.flux))
                    .name("Selected flux")
                    .color(Color32::RED),
            );
            if let Some((lo, hi)) = region.x_range() {
                plot_ui.line(
                    Line::new(PlotPoints::from(vec![[lo, baseline], [hi, baseline]]))
                        .name("Baseline Flux")
                        .color(Color32::DARK_GREEN)
                        .style(LineStyle::dashed_loose()),
                );
            }
            let markers: Vec<[f64; 2]> = state.peaks.iter().map(|p| [p.wavenumber, p.flux]).collect();
            plot_ui.points(
                Points::new(markers)
                    .name("Identified Peaks")
                    .shape(MarkerShape::Circle)
                    .filled(true)
                    .radius(4.0)
                    .color(Color32::BLUE),
            );
        });
}

/// Editable peak table. Any edit re-runs the fit.
fn peak_table(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui: &mut Ui| {
        ui.strong("Peak table");
        if ui.small_button("Reset").clicked() {
            state.recompute_peaks();
        }
    });

    let mut changed = false;
    let mut remove = None;
    let rows = &mut state.peak_rows;

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto())
        .column(Column::initial(130.0))
        .column(Column::initial(100.0))
        .column(Column::initial(120.0))
        .column(Column::auto())
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("#");
            });
            header.col(|ui| {
                ui.strong("Wavenumber");
            });
            header.col(|ui| {
                ui.strong("Flux");
            });
            header.col(|ui| {
                ui.strong("Peak model");
            });
            header.col(|_| {});
        })
        .body(|mut body| {
            for (i, row) in rows.iter_mut().enumerate() {
                body.row(22.0, |mut tr| {
                    tr.col(|ui| {
                        ui.label(i.to_string());
                    });
                    tr.col(|ui| {
                        changed |= ui
                            .add(DragValue::new(&mut row.wavenumber).speed(0.001).max_decimals(4))
                            .changed();
                    });
                    tr.col(|ui| {
                        changed |= ui
                            .add(DragValue::new(&mut row.flux).speed(0.001).max_decimals(4))
                            .changed();
                    });
                    tr.col(|ui| {
                        egui::ComboBox::from_id_salt(("peak_model", i))
                            .selected_text(row.shape.to_string())
                            .show_ui(ui, |ui: &mut Ui| {
                                for shape in LineShape::ALL {
                                    changed |= ui
                                        .selectable_value(&mut row.shape, shape, shape.to_string())
                                        .changed();
                                }
                            });
                    });
                    tr.col(|ui| {
                        if ui.small_button("✖").clicked() {
                            remove = Some(i);
                        }
                    });
                });
            }
        });

    if ui.small_button("Add row").clicked() {
        let template = rows.last().copied().unwrap_or(PeakRow {
            wavenumber: 0.0,
            flux: state.settings.baseline,
            shape: LineShape::default(),
        });
        rows.push(template);
        changed = true;
    }
    if let Some(i) = remove {
        rows.remove(i);
        changed = true;
    }
    if changed {
        state.refit();
    }
}

fn fit_plot(ui: &mut Ui, state: &AppState) {
    let (Some(region), Some(fit)) = (&state.region, &state.fit) else {
        ui.label("Ensure the correct peaks are identified and the desired peak models are selected.");
        return;
    };

    ui.horizontal(|ui: &mut Ui| {
        ui.strong("Line of best fit");
        ui.label(format!(
            "baseline {:.4}, RSS {:.3e}, {} evaluations{}",
            fit.baseline,
            fit.residual_sum_squares,
            fit.evaluations,
            if fit.converged { "" } else { " (not converged)" }
        ));
    });
    for (i, line) in fit.lines.iter().enumerate() {
        ui.monospace(format!(
            "{i:>2} {:<10} center {:.4}  amplitude {:+.4}  width {:.4}",
            line.shape.to_string(),
            line.center,
            line.amplitude,
            line.width
        ));
    }

    let model = fit.evaluate_all(&region.wavenumber);
    Plot::new("fit_plot")
        .height(240.0)
        .legend(Legend::default())
        .x_axis_label("Wavenumber (cm⁻¹)")
        .y_axis_label("Normalized flux")
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(finite_points(&region.wavenumber, &region.flux))
                    .name("Selected flux")
                    .color(Color32::RED),
            );
            plot_ui.line(
                Line::new(finite_points(&region.wavenumber, &model))
                    .name("Line of Best Fit")
                    .color(FIT_COLOR)
                    .width(1.5),
            );
        });
}
