use eframe::egui::{Color32, Ui};
use egui_plot::{Legend, Line, LineStyle, Plot, PlotPoints};

use exes_explorer::analysis::selection::{Bounds, Selection};

use crate::color::isotopologue_color;
use crate::state::{AppState, SelectionMode};

/// Spectrum and line-strength plots share their x axis.
const SPECTRUM_AXIS_GROUP: &str = "spectrum_x";

const SELECTION_COLOR: Color32 = Color32::from_rgb(90, 140, 220);

/// Finite `(x, y)` pairs as plot points.
pub fn finite_points(x: &[f64], y: &[f64]) -> PlotPoints<'static> {
    x.iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| [a, b])
        .collect()
}

fn bounds_outline(b: &Bounds) -> Vec<[f64; 2]> {
    vec![
        [b.x_min, b.y_min],
        [b.x_max, b.y_min],
        [b.x_max, b.y_max],
        [b.x_min, b.y_max],
        [b.x_min, b.y_min],
    ]
}

/// Turn the points of a finished drag into a selection.
fn selection_from_drag(mode: SelectionMode, points: Vec<[f64; 2]>) -> Option<Selection> {
    match mode {
        SelectionMode::Pan => None,
        SelectionMode::Box => {
            let (first, last) = (points.first()?, points.last()?);
            Some(Selection::Box {
                x: (first[0], last[0]),
                y: (first[1], last[1]),
            })
        }
        SelectionMode::Lasso if points.len() >= 3 => Some(Selection::Lasso(points)),
        SelectionMode::Lasso => None,
    }
}

// ---------------------------------------------------------------------------
// Spectrum plot
// ---------------------------------------------------------------------------

/// Transmittance and (smoothed) normalized flux of the selected observation.
/// Dragging draws a box or lasso selection unless the mode is Pan.
pub fn spectrum_plot(ui: &mut Ui, state: &mut AppState) {
    let Some(loaded) = &state.loaded else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Click an observation on the map to view its spectrum");
        });
        return;
    };
    let sp = &loaded.spectrum;
    let file_name = loaded
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    ui.heading(format!("{file_name}:  {}", sp.meta.title()));

    let selecting = state.selection_mode != SelectionMode::Pan;
    let flux_name = if sp.smooth_flux.is_some() {
        "Smoothed flux"
    } else {
        "Normalized flux"
    };

    let response = Plot::new("spectrum_plot")
        .height(320.0)
        .legend(Legend::default())
        .x_axis_label("Wavenumber (cm⁻¹)")
        .y_axis_label("Normalized flux / transmittance")
        .link_axis(SPECTRUM_AXIS_GROUP, [true, false])
        .allow_boxed_zoom(!selecting)
        .allow_drag(!selecting)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(finite_points(&sp.wavenumber, &sp.transmittance))
                    .name("Transmittance")
                    .color(Color32::BLACK)
                    .width(1.0),
            );
            plot_ui.line(
                Line::new(finite_points(&sp.wavenumber, sp.display_flux()))
                    .name(flux_name)
                    .color(Color32::RED)
                    .width(1.5),
            );

            if let Some(bounds) = state.selection.as_ref().and_then(Selection::bounds) {
                plot_ui.line(
                    Line::new(PlotPoints::from(bounds_outline(&bounds)))
                        .color(SELECTION_COLOR)
                        .style(LineStyle::dashed_loose()),
                );
            }
            let pending = &state.pending_selection;
            if pending.len() >= 2 {
                let outline = match state.selection_mode {
                    SelectionMode::Box => {
                        let (a, b) = (pending[0], pending[pending.len() - 1]);
                        bounds_outline(&Bounds {
                            x_min: a[0].min(b[0]),
                            x_max: a[0].max(b[0]),
                            y_min: a[1].min(b[1]),
                            y_max: a[1].max(b[1]),
                        })
                    }
                    _ => pending.clone(),
                };
                plot_ui.line(Line::new(PlotPoints::from(outline)).color(SELECTION_COLOR));
            }
        });

    if !selecting {
        return;
    }
    let r = &response.response;
    if r.drag_started() {
        state.pending_selection.clear();
    }
    if r.dragged() {
        if let Some(pos) = r.interact_pointer_pos() {
            let p = response.transform.value_from_position(pos);
            state.pending_selection.push([p.x, p.y]);
        }
    }
    if r.drag_stopped() {
        let points = std::mem::take(&mut state.pending_selection);
        if let Some(selection) = selection_from_drag(state.selection_mode, points) {
            state.apply_selection(selection);
        }
    }
}

// ---------------------------------------------------------------------------
// Predicted line strengths
// ---------------------------------------------------------------------------

/// Stem plot of column-scaled line strengths on a log10 scale, starting
/// at the cutoff.
pub fn line_strength_plot(ui: &mut Ui, state: &AppState) {
    let traces = state.overlay_traces();
    if state.loaded.is_none() {
        return;
    }
    if traces.is_empty() {
        ui.label("No HITRAN lines above the cutoff in this range.");
        return;
    }
    let floor = state.settings.cutoff.max(f64::MIN_POSITIVE).log10();

    Plot::new("line_strength_plot")
        .height(200.0)
        .legend(Legend::default())
        .x_axis_label("Wavenumber (cm⁻¹)")
        .y_axis_label("log₁₀ S (cm⁻¹/(molecule cm⁻²))")
        .link_axis(SPECTRUM_AXIS_GROUP, [true, false])
        .include_y(floor)
        .show(ui, |plot_ui| {
            for trace in traces {
                let points: PlotPoints = trace
                    .points
                    .iter()
                    .map(|&[nu, s]| [nu, if s > 0.0 { s.log10() } else { floor }])
                    .collect();
                plot_ui.line(
                    Line::new(points)
                        .name(trace.isotopologue)
                        .color(isotopologue_color(trace.isotopologue))
                        .width(1.0),
                );
            }
        });
}
