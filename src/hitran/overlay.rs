use std::collections::BTreeMap;

use super::lines::LineStoreError;
use super::molecules::{Molecule, MOLECULES};
use super::strength::{StrengthCalculator, StrengthError, StrengthQuery, TransitionStrength};

// ---------------------------------------------------------------------------
// Stem traces
// ---------------------------------------------------------------------------

/// Predicted lines of one isotopologue, ready to draw as a stem plot.
///
/// `points` holds `(ν, 0), (ν, S), (ν, 0)` for every line so a single
/// polyline renders as separate stems joined along the axis.
#[derive(Debug, Clone, PartialEq)]
pub struct StemTrace {
    pub molecule: &'static str,
    pub isotopologue: &'static str,
    pub points: Vec<[f64; 2]>,
}

impl StemTrace {
    pub fn n_lines(&self) -> usize {
        self.points.len() / 3
    }
}

/// Observation conditions shared by every molecule of an overlay.
#[derive(Debug, Clone, Copy)]
pub struct OverlayConditions {
    pub temperature_c: f64,
    pub altitude_km: f64,
    pub latitude: Option<f64>,
    pub wavenumber_range: Option<(f64, f64)>,
    pub cutoff: Option<f64>,
}

/// Interleave zero points around each strength.
pub fn stem_points(strengths: &[TransitionStrength]) -> Vec<[f64; 2]> {
    strengths
        .iter()
        .flat_map(|s| {
            let nu = s.line.wavenumber;
            [[nu, 0.0], [nu, s.col_den_strength], [nu, 0.0]]
        })
        .collect()
}

/// Split a molecule's strengths by isotopologue, in catalogue order.
///
/// Isotopologues without lines are skipped.
pub fn isotopologue_traces(molecule: &Molecule, strengths: &[TransitionStrength]) -> Vec<StemTrace> {
    let mut by_iso: BTreeMap<u8, Vec<TransitionStrength>> = BTreeMap::new();
    for s in strengths {
        by_iso.entry(s.line.local_iso_id).or_default().push(*s);
    }

    let mut traces = Vec::new();
    for iso in molecule.isotopologues {
        match by_iso.remove(&iso.local_id) {
            Some(group) => {
                log::debug!("{}: {} lines", iso.name, group.len());
                traces.push(StemTrace {
                    molecule: molecule.name,
                    isotopologue: iso.name,
                    points: stem_points(&group),
                });
            }
            None => log::debug!("{}: no significant lines in range", iso.name),
        }
    }
    for (local_id, group) in by_iso {
        log::warn!(
            "{}: {} lines with unknown isotopologue id {local_id}",
            molecule.name,
            group.len()
        );
    }
    traces
}

/// Stem traces for every molecule of the catalogue.
///
/// Molecules without a line table are logged and left out.
pub fn build_overlays(
    calc: &mut StrengthCalculator<'_>,
    conditions: &OverlayConditions,
) -> Result<Vec<StemTrace>, StrengthError> {
    let mut traces = Vec::new();
    for molecule in MOLECULES {
        let query = StrengthQuery {
            molecule: molecule.name,
            temperature_c: conditions.temperature_c,
            altitude_km: conditions.altitude_km,
            latitude: conditions.latitude,
            wavenumber_range: conditions.wavenumber_range,
            cutoff: conditions.cutoff,
        };
        let strengths = match calc.for_location(&query) {
            Ok(s) => s,
            Err(StrengthError::LineStore(e @ LineStoreError::MissingTable { .. })) => {
                log::warn!("{e}");
                continue;
            }
            Err(e) => return Err(e),
        };
        traces.extend(isotopologue_traces(molecule, &strengths));
    }
    log::info!(
        "Built {} line overlays ({} lines)",
        traces.len(),
        traces.iter().map(StemTrace::n_lines).sum::<usize>()
    );
    Ok(traces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::atmosphere::{AtmosphereRow, AtmosphereTable};
    use crate::hitran::lines::{LineRecord, LineStore};
    use crate::hitran::molecules::molecule;
    use crate::hitran::partition::PartitionSums;

    fn line(molec_id: u8, iso: u8, nu: f64, sw: f64) -> LineRecord {
        LineRecord {
            molec_id,
            local_iso_id: iso,
            wavenumber: nu,
            ref_strength: sw,
            gamma_air: 0.07,
            gamma_self: 0.3,
            elower: 100.0,
        }
    }

    fn strength(iso: u8, nu: f64, s: f64) -> TransitionStrength {
        TransitionStrength {
            line: line(2, iso, nu, s),
            q_ref: 1.0,
            q: 1.0,
            exp_strength: s,
            col_den_strength: s,
        }
    }

    #[test]
    fn stems_return_to_zero() {
        let pts = stem_points(&[strength(1, 700.0, 3.0), strength(1, 701.0, 5.0)]);
        assert_eq!(
            pts,
            vec![
                [700.0, 0.0],
                [700.0, 3.0],
                [700.0, 0.0],
                [701.0, 0.0],
                [701.0, 5.0],
                [701.0, 0.0]
            ]
        );
    }

    #[test]
    fn groups_follow_catalogue_order_and_skip_empty() {
        let co2 = molecule("CO2").unwrap();
        let traces = isotopologue_traces(
            co2,
            &[
                strength(2, 700.0, 1.0),
                strength(1, 701.0, 2.0),
                strength(2, 702.0, 3.0),
                strength(0, 703.0, 4.0),
            ],
        );
        let names: Vec<_> = traces.iter().map(|t| t.isotopologue).collect();
        assert_eq!(names, ["CO2", "(13C)O2", "(13C)(18O)2"]);
        assert_eq!(traces[1].n_lines(), 2);
    }

    #[test]
    fn overlays_skip_molecules_without_tables() {
        let dir = tempfile::tempdir().unwrap();
        let mut lines = LineStore::open(dir.path());
        lines.insert_table("CO2", vec![line(2, 1, 700.0, 1e-20), line(2, 3, 701.0, 1e-20)]);
        lines.insert_table("H2O", vec![line(1, 1, 900.0, 1e-20)]);
        let sums = PartitionSums::approximate();
        let atm = AtmosphereTable::from_rows(vec![AtmosphereRow {
            altitude_km: 0.0,
            h2o: 1e21,
            mix: 1e24,
            o3: [1e18; 4],
        }])
        .unwrap();
        let mut calc = StrengthCalculator::new(&mut lines, &sums, &atm);
        let conditions = OverlayConditions {
            temperature_c: -40.0,
            altitude_km: 12.0,
            latitude: Some(30.0),
            wavenumber_range: Some((650.0, 750.0)),
            cutoff: Some(1e-4),
        };
        let traces = build_overlays(&mut calc, &conditions).unwrap();
        let names: Vec<_> = traces.iter().map(|t| t.isotopologue).collect();
        assert_eq!(names, ["CO2", "OC(18O)"]);
        assert!(traces.iter().all(|t| t.molecule == "CO2"));
    }
}
