use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Datelike, Utc};

/// Feet per kilometre; EXES headers report altitude in feet.
pub const FEET_PER_KILOMETER: f64 = 3280.84;

// ---------------------------------------------------------------------------
// HeaderValue – a single FITS header card value
// ---------------------------------------------------------------------------

/// A dynamically-typed header value as it appears in a FITS card.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::String(s) => write!(f, "{s}"),
            HeaderValue::Integer(i) => write!(f, "{i}"),
            HeaderValue::Float(v) => write!(f, "{v}"),
            HeaderValue::Bool(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            HeaderValue::Null => write!(f, "<null>"),
        }
    }
}

impl HeaderValue {
    /// Numeric cards, integer or real.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(s) => Some(s),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ObservationMeta – header-derived scalars of one EXES observation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationMeta {
    pub object: String,
    /// Telescope elevation angle (degrees).
    pub telescope_elevation: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Aircraft altitude at start/end of the exposure (feet).
    pub start_altitude_ft: f64,
    pub end_altitude_ft: f64,
    /// Outside air temperature (°C).
    pub temperature_c: f64,
    /// Acquisition time, truncated to the minute.
    pub date: DateTime<Utc>,
}

impl ObservationMeta {
    pub fn avg_altitude_ft(&self) -> f64 {
        (self.start_altitude_ft + self.end_altitude_ft) / 2.0
    }

    pub fn avg_altitude_km(&self) -> f64 {
        self.avg_altitude_ft() / FEET_PER_KILOMETER
    }

    /// `"{object} | {elevation} deg. | {altitude} | {Month},{year}"`, with
    /// whole numbers keeping their `.0`.
    pub fn title(&self) -> String {
        format!(
            "{} | {:?} deg. | {:?} | {},{}",
            self.object,
            self.telescope_elevation,
            self.avg_altitude_ft(),
            month_name(self.date.month()),
            self.date.year()
        )
    }

    /// Compact row for the observation list: object, elevation, altitude, position.
    pub fn summary_row(&self) -> [String; 4] {
        [
            self.object.clone(),
            format!("{}\u{b0}", self.telescope_elevation),
            format!("{} ft", self.avg_altitude_ft()),
            format!(
                "{:.3}\u{b0}W, {:.3}\u{b0}N",
                -self.longitude,
                self.latitude
            ),
        ]
    }
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}

// ---------------------------------------------------------------------------
// ExesSpectrum – one parsed instrument file
// ---------------------------------------------------------------------------

/// Parallel sample arrays of an EXES observation plus its metadata.
#[derive(Debug, Clone)]
pub struct ExesSpectrum {
    /// Wavenumber axis (cm⁻¹).
    pub wavenumber: Vec<f64>,
    /// Wavelength axis (µm), `1e4 / wavenumber`.
    pub wavelength: Vec<f64>,
    pub flux: Vec<f64>,
    pub uncertainty: Vec<f64>,
    /// Model atmospheric transmittance (ATRAN).
    pub transmittance: Vec<f64>,
    /// `flux / norm`.
    pub norm_flux: Vec<f64>,
    /// Boxcar-smoothed `norm_flux`, when a smoothing width was requested.
    pub smooth_flux: Option<Vec<f64>>,
    pub smooth_width: Option<usize>,
    pub norm: f64,
    pub meta: ObservationMeta,
}

impl ExesSpectrum {
    pub fn len(&self) -> usize {
        self.wavenumber.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavenumber.is_empty()
    }

    /// Flux shown in the spectrum view: smoothed when available.
    pub fn display_flux(&self) -> &[f64] {
        self.smooth_flux.as_deref().unwrap_or(&self.norm_flux)
    }

    pub fn wavenumber_range(&self) -> Option<(f64, f64)> {
        finite_range(&self.wavenumber)
    }

    pub fn wavelength_range(&self) -> Option<(f64, f64)> {
        finite_range(&self.wavelength)
    }
}

/// Min and max over the finite values of `values`.
pub fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

// ---------------------------------------------------------------------------
// ObservationSummary – one entry of the observation catalogue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ObservationSummary {
    pub file_name: String,
    pub path: PathBuf,
    pub meta: ObservationMeta,
    pub wavenumber_range: Option<(f64, f64)>,
    pub wavelength_range: Option<(f64, f64)>,
}
