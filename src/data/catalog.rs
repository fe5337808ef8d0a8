use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};

use super::exes::read_exes_file;
use super::model::ObservationSummary;

// ---------------------------------------------------------------------------
// Observation catalogue
// ---------------------------------------------------------------------------

/// Every readable EXES file of a directory, sorted by file name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub observations: Vec<ObservationSummary>,
    /// Sorted unique object names.
    pub objects: BTreeSet<String>,
}

impl Catalog {
    pub fn from_observations(mut observations: Vec<ObservationSummary>) -> Self {
        observations.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        let objects = observations.iter().map(|o| o.meta.object.clone()).collect();
        Catalog {
            observations,
            objects,
        }
    }

    /// Scan `dir` for `*.fits` files.
    ///
    /// Files that fail to parse are logged and skipped; only an unreadable
    /// directory is an error.
    pub fn scan(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Cannot read observation directory {}", dir.display()))?;

        let mut observations = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(e) => e.path(),
                Err(e) => {
                    log::warn!("Skipping directory entry in {}: {e}", dir.display());
                    continue;
                }
            };
            if !is_fits(&path) {
                continue;
            }
            match read_exes_file(&path, None) {
                Ok(sp) => observations.push(ObservationSummary {
                    file_name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    wavenumber_range: sp.wavenumber_range(),
                    wavelength_range: sp.wavelength_range(),
                    meta: sp.meta,
                    path,
                }),
                Err(e) => log::warn!("Skipping {}: {e}", path.display()),
            }
        }

        let catalog = Self::from_observations(observations);
        log::info!(
            "Catalogued {} observations of {} objects in {}",
            catalog.observations.len(),
            catalog.objects.len(),
            dir.display()
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn find(&self, file_name: &str) -> Option<&ObservationSummary> {
        self.observations.iter().find(|o| o.file_name == file_name)
    }
}

fn is_fits(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("fits"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::fits::write_primary_hdu;
    use crate::data::model::HeaderValue;

    /// Write a small but valid EXES file.
    pub(crate) fn write_observation(path: &Path, object: &str, lat: f64, lon: f64, alt_ft: f64) {
        let n = 20;
        let mut data = Vec::with_capacity(4 * n);
        data.extend((0..n).map(|i| 1200.0 + i as f64 * 0.5));
        data.extend(std::iter::repeat(2.0).take(n));
        data.extend(std::iter::repeat(0.05).take(n));
        data.extend(std::iter::repeat(0.9).take(n));
        let cards = [
            ("OBJECT", HeaderValue::String(object.into())),
            ("TELEL", HeaderValue::Float(45.0)),
            ("LAT_STA", HeaderValue::Float(lat)),
            ("LON_STA", HeaderValue::Float(lon)),
            ("ALTI_STA", HeaderValue::Float(alt_ft)),
            ("ALTI_END", HeaderValue::Float(alt_ft)),
            ("TEMP_OUT", HeaderValue::Float(-50.0)),
            ("DATE-OBS", HeaderValue::String("2021-11-02T04:05:06".into())),
        ];
        write_primary_hdu(path, &cards, &[n, 4], &data).unwrap();
    }

    #[test]
    fn scans_fits_files_and_skips_broken_ones() {
        let dir = tempfile::tempdir().unwrap();
        write_observation(&dir.path().join("b_mars.FITS"), "Mars", 30.0, -110.0, 41000.0);
        write_observation(&dir.path().join("a_venus.fits"), "Venus", 45.0, -100.0, 39000.0);
        std::fs::write(dir.path().join("broken.fits"), b"not a fits file").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let catalog = Catalog::scan(dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.observations[0].file_name, "a_venus.fits");
        assert_eq!(
            catalog.objects.iter().cloned().collect::<Vec<_>>(),
            ["Mars", "Venus"]
        );
        let mars = catalog.find("b_mars.FITS").unwrap();
        assert_eq!(mars.meta.latitude, 30.0);
        assert_eq!(mars.wavenumber_range, Some((1200.0, 1209.5)));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Catalog::scan(&dir.path().join("nope")).is_err());
    }
}
