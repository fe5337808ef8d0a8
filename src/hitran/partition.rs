use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::molecules::Molecule;

/// HITRAN reference temperature (K).
pub const REF_TEMP: f64 = 296.0;

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}: fewer than two (T, Q) points")]
    TooShort { path: PathBuf },
}

// ---------------------------------------------------------------------------
// Total internal partition sums
// ---------------------------------------------------------------------------

/// Partition sums Q(T) per global isotopologue id.
///
/// Tabulated values come from HITRAN `q<global_id>.txt` files (two columns,
/// temperature and Q) and are interpolated linearly. Beyond the table ends
/// the nearest tabulated value is extrapolated with the rigid-rotor power
/// law, so both temperatures of a ratio stay on the table's scale.
/// Isotopologues without a table use the bare estimate Q ∝ T (linear
/// molecules) or Q ∝ T^1.5 (non-linear).
#[derive(Debug, Clone, Default)]
pub struct PartitionSums {
    tables: HashMap<u16, Vec<(f64, f64)>>,
}

impl PartitionSums {
    /// Rigid-rotor estimates only.
    pub fn approximate() -> Self {
        Self::default()
    }

    /// Load every `q<id>.txt` in `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, PartitionError> {
        let io_err = |source| PartitionError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut sums = Self::default();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let Some(id) = global_id_from_file_name(&path) else {
                continue;
            };
            let points = load_table(&path)?;
            sums.insert_table(id, points);
        }
        log::info!("Loaded {} partition-sum tables from {}", sums.tables.len(), dir.display());
        Ok(sums)
    }

    /// Register a table of `(T, Q)` points; they are sorted by temperature.
    pub fn insert_table(&mut self, global_id: u16, mut points: Vec<(f64, f64)>) {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.tables.insert(global_id, points);
    }

    pub fn has_table(&self, global_id: u16) -> bool {
        self.tables.contains_key(&global_id)
    }

    /// Q(T) for an isotopologue of `molecule`.
    pub fn q(&self, molecule: &Molecule, local_iso_id: u8, temperature: f64) -> f64 {
        molecule
            .isotopologue(local_iso_id)
            .and_then(|iso| self.tables.get(&iso.global_id))
            .and_then(|points| tabulated(points, molecule.linear, temperature))
            .unwrap_or_else(|| rigid_rotor(molecule.linear, temperature))
    }

    /// Q(296 K) / Q(T).
    pub fn ratio(&self, molecule: &Molecule, local_iso_id: u8, temperature: f64) -> f64 {
        self.q(molecule, local_iso_id, REF_TEMP) / self.q(molecule, local_iso_id, temperature)
    }
}

/// Classical rotational partition function up to a constant factor.
fn rigid_rotor(linear: bool, temperature: f64) -> f64 {
    if linear {
        temperature
    } else {
        temperature.powf(1.5)
    }
}

/// Q(T) from sorted `(T, Q)` points. Outside the table the nearest end is
/// scaled by the rigid-rotor law, `Q_edge · rr(T) / rr(T_edge)`.
fn tabulated(points: &[(f64, f64)], linear: bool, t: f64) -> Option<f64> {
    let (first, last) = (points.first()?, points.last()?);
    let edge = if t < first.0 {
        first
    } else if t > last.0 {
        last
    } else {
        return Some(interpolate(points, t));
    };
    Some(edge.1 * rigid_rotor(linear, t) / rigid_rotor(linear, edge.0))
}

/// Linear interpolation in sorted `(T, Q)` points covering `t`.
fn interpolate(points: &[(f64, f64)], t: f64) -> f64 {
    let upper = points.partition_point(|p| p.0 < t);
    if upper == 0 {
        return points[0].1;
    }
    let (t0, q0) = points[upper - 1];
    let (t1, q1) = points[upper];
    q0 + (q1 - q0) * (t - t0) / (t1 - t0)
}

fn global_id_from_file_name(path: &Path) -> Option<u16> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix('q')?.strip_suffix(".txt")?.parse().ok()
}

fn load_table(path: &Path) -> Result<Vec<(f64, f64)>, PartitionError> {
    let text = std::fs::read_to_string(path).map_err(|source| PartitionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let points: Vec<(f64, f64)> = text
        .lines()
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let t = cols.next()?.parse().ok()?;
            let q = cols.next()?.parse().ok()?;
            Some((t, q))
        })
        .collect();
    if points.len() < 2 {
        return Err(PartitionError::TooShort {
            path: path.to_path_buf(),
        });
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hitran::molecules::molecule;
    use approx::assert_relative_eq;

    #[test]
    fn rigid_rotor_ratio_depends_on_geometry() {
        let sums = PartitionSums::approximate();
        let co = molecule("CO").unwrap();
        let h2o = molecule("H2O").unwrap();
        assert_relative_eq!(sums.ratio(co, 1, 148.0), 2.0);
        assert_relative_eq!(sums.ratio(h2o, 1, 148.0), 2f64.powf(1.5));
        assert_relative_eq!(sums.ratio(h2o, 1, REF_TEMP), 1.0);
    }

    #[test]
    fn tabulated_values_are_interpolated() {
        let mut sums = PartitionSums::approximate();
        sums.insert_table(26, vec![(300.0, 110.0), (200.0, 70.0), (100.0, 40.0)]);
        let co = molecule("CO").unwrap();
        assert_relative_eq!(sums.q(co, 1, 250.0), 90.0);
        assert_relative_eq!(sums.q(co, 1, 100.0), 40.0);
        // Beyond the ends the edge values follow the rigid-rotor law.
        assert_relative_eq!(sums.q(co, 1, 400.0), 110.0 * 400.0 / 300.0);
        assert_relative_eq!(sums.q(co, 1, 50.0), 40.0 * 50.0 / 100.0);
        // Other isotopologues are untouched.
        assert_relative_eq!(sums.q(co, 2, 250.0), 250.0);
    }

    #[test]
    fn ratio_stays_on_table_scale_past_the_upper_end() {
        let mut sums = PartitionSums::approximate();
        sums.insert_table(26, vec![(100.0, 36.0), (300.0, 108.0)]);
        let co = molecule("CO").unwrap();
        // Q(296) interpolated, Q(350) extrapolated from the 300 K entry.
        let q_ref = 36.0 + 72.0 * 196.0 / 200.0;
        let q = 108.0 * 350.0 / 300.0;
        assert_relative_eq!(sums.ratio(co, 1, 350.0), q_ref / q, max_relative = 1e-12);
        assert!((sums.ratio(co, 1, 350.0) - 0.846).abs() < 1e-3);
        // Continuous across the edge.
        assert_relative_eq!(sums.q(co, 1, 300.0 + 1e-9), 108.0, max_relative = 1e-9);
    }

    #[test]
    fn non_linear_molecules_extrapolate_with_t_to_the_1_5() {
        let mut sums = PartitionSums::approximate();
        let h2o = molecule("H2O").unwrap();
        let id = h2o.isotopologue(1).unwrap().global_id;
        sums.insert_table(id, vec![(200.0, 100.0), (250.0, 150.0)]);
        assert_relative_eq!(sums.q(h2o, 1, 300.0), 150.0 * (300.0f64 / 250.0).powf(1.5));
    }

    #[test]
    fn loads_q_files_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("q7.txt"), "  100.0  50.0\n  300.0  150.0\n").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        let sums = PartitionSums::load_dir(dir.path()).unwrap();
        assert!(sums.has_table(7));
        let co2 = molecule("CO2").unwrap();
        assert_relative_eq!(sums.q(co2, 1, 200.0), 100.0);
        assert_relative_eq!(sums.ratio(co2, 1, 200.0), 148.0 / 100.0);
    }

    #[test]
    fn short_table_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("q1.txt"), "296 174.5\n").unwrap();
        assert!(matches!(
            PartitionSums::load_dir(dir.path()),
            Err(PartitionError::TooShort { .. })
        ));
    }
}
