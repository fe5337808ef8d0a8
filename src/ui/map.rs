use std::path::PathBuf;

use eframe::egui::{Color32, RichText, Ui};
use egui_plot::{MarkerShape, Plot, PlotPoint, Points};

use crate::color::viridis;
use crate::state::AppState;

/// Clicks farther than this from every marker select nothing (screen px).
const PICK_RADIUS: f32 = 12.0;

struct Marker {
    path: PathBuf,
    lon: f64,
    lat: f64,
    altitude_ft: f64,
}

// ---------------------------------------------------------------------------
// Observation map
// ---------------------------------------------------------------------------

/// Longitude/latitude scatter of the visible observations, coloured by
/// average altitude. Clicking a marker selects the observation.
pub fn observation_map(ui: &mut Ui, state: &mut AppState) {
    let markers: Vec<Marker> = state
        .visible_indices
        .iter()
        .map(|&idx| {
            let obs = &state.catalog.observations[idx];
            Marker {
                path: obs.path.clone(),
                lon: obs.meta.longitude,
                lat: obs.meta.latitude,
                altitude_ft: obs.meta.avg_altitude_ft(),
            }
        })
        .collect();

    if markers.is_empty() {
        ui.label("No observations to show.");
        return;
    }

    let (min_alt, max_alt) = markers.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, m| {
        (acc.0.min(m.altitude_ft), acc.1.max(m.altitude_ft))
    });
    ui.horizontal(|ui: &mut Ui| {
        ui.strong("Observation map");
        ui.label(RichText::new(format!("colour: average altitude {min_alt:.0} ft")).color(viridis(
            min_alt, min_alt, max_alt,
        )));
        ui.label(RichText::new(format!("to {max_alt:.0} ft")).color(viridis(
            max_alt, min_alt, max_alt,
        )));
    });

    let selected = state.selected.clone();
    let response = Plot::new("observation_map")
        .height(260.0)
        .x_axis_label("Longitude (deg)")
        .y_axis_label("Latitude (deg)")
        .data_aspect(1.0)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .show(ui, |plot_ui| {
            for m in &markers {
                let is_selected = selected.as_ref() == Some(&m.path);
                let points = Points::new(vec![[m.lon, m.lat]])
                    .shape(MarkerShape::Circle)
                    .filled(true)
                    .radius(if is_selected { 7.0 } else { 4.5 })
                    .color(viridis(m.altitude_ft, min_alt, max_alt));
                plot_ui.points(points);
                if is_selected {
                    plot_ui.points(
                        Points::new(vec![[m.lon, m.lat]])
                            .shape(MarkerShape::Circle)
                            .filled(false)
                            .radius(9.0)
                            .color(Color32::RED),
                    );
                }
            }
        });

    if !response.response.clicked() {
        return;
    }
    let Some(pointer) = response.response.interact_pointer_pos() else {
        return;
    };
    let nearest = markers
        .iter()
        .map(|m| {
            let pos = response
                .transform
                .position_from_point(&PlotPoint::new(m.lon, m.lat));
            (m, pos.distance(pointer))
        })
        .filter(|(_, d)| *d <= PICK_RADIUS)
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((marker, _)) = nearest {
        state.select_observation(&marker.path);
    }
}
