use std::path::Path;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use thiserror::Error;

use super::fits::{self, FitsError, FitsHeader, PrimaryHdu};
use super::model::{ExesSpectrum, ObservationMeta};

/// Transmittance within this fraction of its maximum counts as continuum.
const CONTINUUM_TRANSMITTANCE: f64 = 0.95;

#[derive(Debug, Error)]
pub enum ExesError {
    #[error(transparent)]
    Fits(#[from] FitsError),

    #[error("expected a 2-D array with 4 rows (wavenumber, flux, uncertainty, transmittance), got shape {0:?}")]
    BadShape(Vec<usize>),

    #[error("missing or non-numeric header field {0}")]
    MissingField(&'static str),

    #[error("malformed DATE-OBS '{0}'")]
    BadDate(String),

    #[error("no finite flux/transmittance samples to normalize against")]
    NoContinuum,
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Read an EXES spectrum file.
///
/// The primary array holds four rows: wavenumber, flux, uncertainty and
/// transmittance. Samples are decoded from the file's big-endian layout into
/// host order before any arithmetic. `smooth_width` enables boxcar smoothing
/// of the normalized flux.
pub fn read_exes_file(path: &Path, smooth_width: Option<usize>) -> Result<ExesSpectrum, ExesError> {
    let hdu = fits::read_primary_hdu(path)?;
    spectrum_from_hdu(&hdu, smooth_width)
}

pub fn spectrum_from_hdu(hdu: &PrimaryHdu, smooth_width: Option<usize>) -> Result<ExesSpectrum, ExesError> {
    if hdu.shape.len() != 2 || hdu.n_rows() != 4 {
        return Err(ExesError::BadShape(hdu.shape.clone()));
    }
    let row = |i: usize| {
        hdu.row(i)
            .map(<[f64]>::to_vec)
            .ok_or_else(|| ExesError::BadShape(hdu.shape.clone()))
    };
    let wavenumber = row(0)?;
    let flux = row(1)?;
    let uncertainty = row(2)?;
    let transmittance = row(3)?;

    let meta = read_meta(&hdu.header)?;

    let norm = flux_norm(&flux, &transmittance).ok_or(ExesError::NoContinuum)?;
    let norm_flux: Vec<f64> = flux.iter().map(|f| f / norm).collect();
    let smooth_flux = smooth_width.map(|w| boxcar_smooth(&norm_flux, w));
    let wavelength = wavenumber.iter().map(|wn| 1e4 / wn).collect();

    Ok(ExesSpectrum {
        wavenumber,
        wavelength,
        flux,
        uncertainty,
        transmittance,
        norm_flux,
        smooth_flux,
        smooth_width,
        norm,
        meta,
    })
}

fn read_meta(header: &FitsHeader) -> Result<ObservationMeta, ExesError> {
    let number = |key: &'static str| header.get_f64(key).ok_or(ExesError::MissingField(key));

    let object = header
        .get("OBJECT")
        .map(|v| v.to_string())
        .ok_or(ExesError::MissingField("OBJECT"))?;

    Ok(ObservationMeta {
        object,
        telescope_elevation: number("TELEL")?,
        latitude: number("LAT_STA")?,
        longitude: number("LON_STA")?,
        start_altitude_ft: number("ALTI_STA")?,
        end_altitude_ft: number("ALTI_END")?,
        temperature_c: number("TEMP_OUT")?,
        date: parse_date_obs(
            header
                .get_str("DATE-OBS")
                .ok_or(ExesError::MissingField("DATE-OBS"))?,
        )?,
    })
}

/// Parse `YYYY-MM-DDTHH:MM[:SS.sss]` as UTC, truncated to the minute.
pub fn parse_date_obs(s: &str) -> Result<DateTime<Utc>, ExesError> {
    let bad = || ExesError::BadDate(s.to_string());
    let field = |range: std::ops::Range<usize>| -> Result<u32, ExesError> {
        s.get(range).and_then(|v| v.parse().ok()).ok_or_else(bad)
    };

    let year: i32 = s.get(0..4).and_then(|v| v.parse().ok()).ok_or_else(bad)?;
    let (month, day) = (field(5..7)?, field(8..10)?);
    let (hour, minute) = (field(11..13)?, field(14..16)?);
    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .ok_or_else(bad)?;
    Ok(Utc.from_utc_datetime(&naive))
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Flux level of the continuum, scaled so normalized flux sits near the
/// transmittance maximum.
///
/// Uses the middle half of the samples where both arrays are finite, keeps
/// flux where transmittance is near its maximum, then averages the values
/// within one standard deviation of their mean.
pub fn flux_norm(flux: &[f64], transmittance: &[f64]) -> Option<f64> {
    let finite: Vec<usize> = (0..flux.len().min(transmittance.len()))
        .filter(|&i| flux[i].is_finite() && transmittance[i].is_finite())
        .collect();
    let quarter = finite.len() / 4;
    let middle = &finite[quarter..finite.len() - quarter];
    if middle.is_empty() {
        return None;
    }

    let trans_max = middle
        .iter()
        .map(|&i| transmittance[i])
        .fold(f64::NEG_INFINITY, f64::max);

    let baseline: Vec<f64> = middle
        .iter()
        .filter(|&&i| transmittance[i] >= CONTINUUM_TRANSMITTANCE * trans_max)
        .map(|&i| flux[i])
        .collect();
    if baseline.is_empty() {
        return None;
    }

    let (mean, std) = mean_std(&baseline);
    let useful: Vec<f64> = baseline
        .into_iter()
        .filter(|&f| f >= mean - std && f <= mean + std)
        .collect();
    if useful.is_empty() {
        return None;
    }
    let (useful_mean, _) = mean_std(&useful);
    Some(useful_mean / trans_max)
}

/// Mean and population standard deviation.
fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

// ---------------------------------------------------------------------------
// Smoothing
// ---------------------------------------------------------------------------

/// Boxcar kernel of the given width, normalized to unit sum.
///
/// Odd widths give `width` equal taps; even widths give `width + 1` taps with
/// half-weight ends, so the kernel stays centred.
pub fn boxcar_kernel(width: usize) -> Vec<f64> {
    let width = width.max(1);
    let mut kernel = if width % 2 == 1 {
        vec![1.0; width]
    } else {
        let mut k = vec![1.0; width + 1];
        k[0] = 0.5;
        k[width] = 0.5;
        k
    };
    let sum: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Convolve with a boxcar kernel.
///
/// Samples beyond the array edges count as zero. NaN samples are skipped and
/// the kernel renormalized over the remaining taps; NaN inputs stay NaN.
pub fn boxcar_smooth(values: &[f64], width: usize) -> Vec<f64> {
    let kernel = boxcar_kernel(width);
    let half = (kernel.len() / 2) as isize;
    let n = values.len() as isize;

    (0..n)
        .map(|i| {
            if values[i as usize].is_nan() {
                return f64::NAN;
            }
            let mut acc = 0.0;
            let mut weight = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let j = i + k as isize - half;
                if j < 0 || j >= n {
                    weight += w;
                    continue;
                }
                let v = values[j as usize];
                if !v.is_nan() {
                    acc += w * v;
                    weight += w;
                }
            }
            if weight > 0.0 {
                acc / weight
            } else {
                f64::NAN
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fits::write_primary_hdu;
    use crate::data::model::HeaderValue;
    use approx::assert_relative_eq;
    use chrono::{Datelike, Timelike};

    fn continuum_spectrum(n: usize) -> (Vec<f64>, Vec<f64>) {
        let trans: Vec<f64> = (0..n)
            .map(|i| if i % 10 == 5 { 0.4 } else { 0.98 + 0.01 * ((i % 3) as f64) })
            .collect();
        let flux: Vec<f64> = (0..n)
            .map(|i| if i % 10 == 5 { 20.0 } else { 50.0 + (i % 4) as f64 })
            .collect();
        (flux, trans)
    }

    #[test]
    fn norm_uses_continuum_flux() {
        let flux = vec![10.0; 40];
        let trans = vec![1.0; 40];
        assert_relative_eq!(flux_norm(&flux, &trans).unwrap(), 10.0);
    }

    #[test]
    fn norm_scales_with_uniform_flux_scaling() {
        let (flux, trans) = continuum_spectrum(200);
        let scaled: Vec<f64> = flux.iter().map(|f| f * 3.5).collect();
        let norm = flux_norm(&flux, &trans).unwrap();
        let norm_scaled = flux_norm(&scaled, &trans).unwrap();
        assert_relative_eq!(norm_scaled, 3.5 * norm, max_relative = 1e-12);

        // Normalized flux is therefore unchanged.
        assert_relative_eq!(flux[7] / norm, scaled[7] / norm_scaled, max_relative = 1e-12);
    }

    #[test]
    fn norm_ignores_nan_and_edges() {
        let mut flux = vec![5.0; 40];
        let trans = vec![0.9; 40];
        // Outer quarters never contribute.
        for f in flux.iter_mut().take(9) {
            *f = 1000.0;
        }
        flux[20] = f64::NAN;
        assert_relative_eq!(flux_norm(&flux, &trans).unwrap(), 5.0 / 0.9);
        assert!(flux_norm(&[f64::NAN; 8], &[1.0; 8]).is_none());
    }

    #[test]
    fn boxcar_kernel_shapes() {
        assert_eq!(boxcar_kernel(3), vec![1.0 / 3.0; 3]);
        let even = boxcar_kernel(4);
        assert_eq!(even.len(), 5);
        assert_relative_eq!(even[0], 0.125);
        assert_relative_eq!(even[2], 0.25);
    }

    #[test]
    fn smoothing_preserves_nan_and_flat_interior() {
        let mut values = vec![2.0; 11];
        values[5] = f64::NAN;
        let smooth = boxcar_smooth(&values, 3);
        assert!(smooth[5].is_nan());
        assert_relative_eq!(smooth[4], 2.0);
        assert_relative_eq!(smooth[2], 2.0);
        // Zero fill beyond the edge pulls the first sample down.
        assert_relative_eq!(smooth[0], 4.0 / 3.0);
    }

    #[test]
    fn parses_date_obs() {
        let d = parse_date_obs("2019-07-24T08:17:33.120").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2019, 7, 24));
        assert_eq!((d.hour(), d.minute(), d.second()), (8, 17, 0));
        assert!(parse_date_obs("2019/07").is_err());
    }

    #[test]
    fn reads_exes_fits_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.fits");
        let n = 40;
        let mut data = Vec::new();
        data.extend((0..n).map(|i| 700.0 + i as f64 * 0.1));
        data.extend(std::iter::repeat(4.0).take(n));
        data.extend(std::iter::repeat(0.1).take(n));
        data.extend(std::iter::repeat(0.8).take(n));
        let cards = [
            ("OBJECT", HeaderValue::String("Jupiter".into())),
            ("TELEL", HeaderValue::Float(35.0)),
            ("LAT_STA", HeaderValue::Float(37.5)),
            ("LON_STA", HeaderValue::Float(-120.25)),
            ("ALTI_STA", HeaderValue::Float(40000.0)),
            ("ALTI_END", HeaderValue::Float(42000.0)),
            ("TEMP_OUT", HeaderValue::Float(-45.0)),
            ("DATE-OBS", HeaderValue::String("2022-05-06T10:20:30".into())),
        ];
        write_primary_hdu(&path, &cards, &[n, 4], &data).unwrap();

        let sp = read_exes_file(&path, Some(9)).unwrap();
        assert_eq!(sp.len(), n);
        assert_eq!(sp.meta.object, "Jupiter");
        assert_eq!(sp.meta.avg_altitude_ft(), 41000.0);
        assert_relative_eq!(sp.norm, 5.0);
        assert_relative_eq!(sp.norm_flux[0], 0.8);
        assert_relative_eq!(sp.wavelength[0], 1e4 / 700.0);
        assert_eq!(sp.smooth_flux.as_ref().map(Vec::len), Some(n));
        assert_relative_eq!(sp.display_flux()[20], 0.8, max_relative = 1e-12);

        let (lo, hi) = sp.wavenumber_range().unwrap();
        assert_relative_eq!(lo, 700.0);
        assert_relative_eq!(hi, 703.9, max_relative = 1e-12);
    }

    #[test]
    fn missing_header_field_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.fits");
        let cards = [("OBJECT", HeaderValue::String("Io".into()))];
        write_primary_hdu(&path, &cards, &[4, 4], &[1.0; 16]).unwrap();
        let err = read_exes_file(&path, None).unwrap_err();
        assert!(matches!(err, ExesError::MissingField("TELEL")));
    }
}
