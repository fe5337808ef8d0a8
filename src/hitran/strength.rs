use thiserror::Error;

use super::lines::{LineRecord, LineStore, LineStoreError};
use super::molecules::{self, Molecule};
use super::partition::{PartitionSums, REF_TEMP};
use crate::data::atmosphere::{AtmosphereError, AtmosphereTable};

/// Second radiation constant hc/k (cm K).
pub const C2: f64 = 1.4387769;

pub const CELSIUS_TO_KELVIN: f64 = 273.15;

#[derive(Debug, Error)]
pub enum StrengthError {
    /// No lines for the molecule in the requested range. Expected whenever a
    /// molecule has no transitions inside an observation's band.
    #[error("no {molecule} line data in the requested wavenumber range")]
    MoleculeDataNotFound { molecule: String },

    #[error("unknown molecule {0}")]
    UnknownMolecule(String),

    #[error(transparent)]
    LineStore(#[from] LineStoreError),

    #[error(transparent)]
    Atmosphere(#[from] AtmosphereError),
}

impl StrengthError {
    /// HTTP-style status code, kept for log output.
    pub fn code(&self) -> u16 {
        match self {
            StrengthError::MoleculeDataNotFound { .. } => 404,
            StrengthError::UnknownMolecule(_) => 400,
            _ => 500,
        }
    }
}

/// A line with its strength at the observation temperature and along the
/// atmospheric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionStrength {
    pub line: LineRecord,
    /// Partition sums at 296 K and at the observation temperature.
    pub q_ref: f64,
    pub q: f64,
    /// Strength at the observation temperature (cm⁻¹ / (molecule cm⁻²)).
    pub exp_strength: f64,
    /// `exp_strength` times column density times concentration.
    pub col_den_strength: f64,
}

/// Inputs of a location-dependent strength calculation.
#[derive(Debug, Clone, Copy)]
pub struct StrengthQuery<'a> {
    pub molecule: &'a str,
    pub temperature_c: f64,
    pub altitude_km: f64,
    pub latitude: Option<f64>,
    pub wavenumber_range: Option<(f64, f64)>,
    pub cutoff: Option<f64>,
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// Scale a 296 K line intensity to `temperature` (K).
///
/// S(T) = S₀ · Q(296)/Q(T) · e^(−c₂E''/T)/e^(−c₂E''/296) ·
///        (1 − e^(−c₂ν/T))/(1 − e^(−c₂ν/296))
pub fn temperature_scaled_strength(
    ref_strength: f64,
    q_ratio: f64,
    elower: f64,
    wavenumber: f64,
    temperature: f64,
) -> f64 {
    let boltzmann = (-C2 * elower / temperature).exp() / (-C2 * elower / REF_TEMP).exp();
    let stimulated = (1.0 - (-C2 * wavenumber / temperature).exp())
        / (1.0 - (-C2 * wavenumber / REF_TEMP).exp());
    ref_strength * q_ratio * boltzmann * stimulated
}

/// Column-integrated strength.
pub fn column_scaled_strength(strength: f64, column_density: f64, concentration: f64) -> f64 {
    strength * column_density * concentration
}

/// Keep lines whose column-scaled strength is at least `cutoff`.
pub fn apply_cutoff(strengths: Vec<TransitionStrength>, cutoff: Option<f64>) -> Vec<TransitionStrength> {
    match cutoff {
        Some(cutoff) => strengths
            .into_iter()
            .filter(|s| s.col_den_strength >= cutoff)
            .collect(),
        None => strengths,
    }
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

/// Borrows the line store, partition sums and atmosphere for one batch of
/// strength calculations.
pub struct StrengthCalculator<'a> {
    pub lines: &'a mut LineStore,
    pub partition: &'a PartitionSums,
    pub atmosphere: &'a AtmosphereTable,
}

impl<'a> StrengthCalculator<'a> {
    pub fn new(
        lines: &'a mut LineStore,
        partition: &'a PartitionSums,
        atmosphere: &'a AtmosphereTable,
    ) -> Self {
        StrengthCalculator {
            lines,
            partition,
            atmosphere,
        }
    }

    /// Temperature-scaled strengths of `molecule` in `range`.
    ///
    /// `col_den_strength` is left equal to `exp_strength`.
    pub fn for_temperature(
        &mut self,
        molecule: &str,
        temperature_c: f64,
        range: Option<(f64, f64)>,
    ) -> Result<Vec<TransitionStrength>, StrengthError> {
        let mol = lookup(molecule)?;
        let lines = self.lines.query(molecule, range)?;
        if lines.is_empty() {
            return Err(StrengthError::MoleculeDataNotFound {
                molecule: molecule.to_string(),
            });
        }

        let temperature = temperature_c + CELSIUS_TO_KELVIN;
        Ok(lines
            .into_iter()
            .map(|line| scale_line(self.partition, mol, line, temperature))
            .collect())
    }

    /// Column-integrated strengths at an altitude/latitude, cutoff filtered.
    ///
    /// Molecules without lines in range, and ozone above the last latitude
    /// band, give an empty result.
    pub fn for_location(
        &mut self,
        query: &StrengthQuery<'_>,
    ) -> Result<Vec<TransitionStrength>, StrengthError> {
        let mol = lookup(query.molecule)?;
        let mut strengths = match self.for_temperature(
            query.molecule,
            query.temperature_c,
            query.wavenumber_range,
        ) {
            Ok(s) => s,
            Err(e @ StrengthError::MoleculeDataNotFound { .. }) => {
                log::info!("{e} (code {}); nothing to overlay", e.code());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let row = self.atmosphere.row_at_or_below(query.altitude_km)?;
        let Some(column_density) = row.column_density(mol.column_source, query.latitude)? else {
            log::info!(
                "{}: no column density tabulated for latitude {:?}",
                mol.name,
                query.latitude
            );
            return Ok(Vec::new());
        };

        for s in &mut strengths {
            s.col_den_strength =
                column_scaled_strength(s.exp_strength, column_density, mol.concentration);
        }
        Ok(apply_cutoff(strengths, query.cutoff))
    }
}

fn lookup(molecule: &str) -> Result<&'static Molecule, StrengthError> {
    molecules::molecule(molecule).ok_or_else(|| StrengthError::UnknownMolecule(molecule.to_string()))
}

fn scale_line(
    partition: &PartitionSums,
    molecule: &Molecule,
    line: LineRecord,
    temperature: f64,
) -> TransitionStrength {
    let q_ref = partition.q(molecule, line.local_iso_id, REF_TEMP);
    let q = partition.q(molecule, line.local_iso_id, temperature);
    let exp_strength = temperature_scaled_strength(
        line.ref_strength,
        partition.ratio(molecule, line.local_iso_id, temperature),
        line.elower,
        line.wavenumber,
        temperature,
    );
    TransitionStrength {
        line,
        q_ref,
        q,
        exp_strength,
        col_den_strength: exp_strength,
    }
}
