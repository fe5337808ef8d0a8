use std::io::Read;
use std::path::Path;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Model atmosphere table
// ---------------------------------------------------------------------------
//
// CSV export of the "Model Atmosphere Table" spreadsheet: one row per
// altitude with vertical column densities (molecules / cm²) above it. Ozone
// is tabulated for four latitude bands; the spreadsheet names only the first
// band column and leaves the other three unnamed.

/// Upper latitude bound (degrees) of each ozone band, in column order.
pub const OZONE_BAND_LIMITS: [f64; 4] = [9.0, 36.0, 43.0, 56.0];

const ALT_HEADERS: &[&str] = &["Alt (KM)", "ALT_KM"];
const H2O_HEADERS: &[&str] = &["Col. Den. H20 (MOL/CM^2)", "H2O"];
const MIX_HEADERS: &[&str] = &["Col. Den. MIX GAS (MOL/CM^2)", "MIX"];
const O3_HEADERS: &[&str] = &["Col. Den. 03 (MOL/CM^2)", "O3_LAT_9"];
const O3_BAND_HEADERS: [&str; 3] = ["O3_LAT_36", "O3_LAT_43", "O3_LAT_56"];

#[derive(Debug, Error)]
pub enum AtmosphereError {
    #[error("reading atmosphere table: {0}")]
    Csv(#[from] csv::Error),

    #[error("atmosphere table has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("atmosphere table row {row}: '{value}' in column '{column}' is not a number")]
    BadValue { row: usize, column: String, value: String },

    #[error("atmosphere table contains no data rows")]
    Empty,

    #[error("altitude {altitude} km is below the lowest tabulated altitude {lowest} km")]
    BelowTable { altitude: f64, lowest: f64 },

    #[error("ozone column density needs a latitude")]
    LatitudeRequired,
}

/// Which column of the table a molecule's column density comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    /// Water vapour column.
    H2O,
    /// Total mixed-gas column, scaled by the molecule's volume mixing ratio.
    Mix,
    /// Ozone column of the latitude band containing the observation.
    OzoneByLatitude,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosphereRow {
    pub altitude_km: f64,
    pub h2o: f64,
    pub mix: f64,
    /// Ozone columns for the bands of [`OZONE_BAND_LIMITS`].
    pub o3: [f64; 4],
}

impl AtmosphereRow {
    /// Column density for `source`.
    ///
    /// Returns `Ok(None)` for ozone above the last tabulated latitude band.
    pub fn column_density(
        &self,
        source: ColumnSource,
        latitude: Option<f64>,
    ) -> Result<Option<f64>, AtmosphereError> {
        match source {
            ColumnSource::H2O => Ok(Some(self.h2o)),
            ColumnSource::Mix => Ok(Some(self.mix)),
            ColumnSource::OzoneByLatitude => {
                let lat = latitude.ok_or(AtmosphereError::LatitudeRequired)?;
                Ok(ozone_band(lat).map(|band| self.o3[band]))
            }
        }
    }
}

/// Index of the ozone band for `latitude`; bands are closed above.
pub fn ozone_band(latitude: f64) -> Option<usize> {
    OZONE_BAND_LIMITS.iter().position(|&limit| latitude <= limit)
}

/// Altitude-sorted atmosphere rows.
#[derive(Debug, Clone)]
pub struct AtmosphereTable {
    rows: Vec<AtmosphereRow>,
}

impl AtmosphereTable {
    pub fn load(path: &Path) -> Result<Self, AtmosphereError> {
        let file = std::fs::File::open(path).map_err(csv::Error::from)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, AtmosphereError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let columns = ColumnIndex::locate(&headers)?;

        let mut rows = Vec::new();
        for (row_no, record) in reader.records().enumerate() {
            let record = record?;
            let Some(altitude_km) = record
                .get(columns.alt)
                .and_then(|v| v.parse::<f64>().ok())
            else {
                // Sub-header rows (band labels, units) carry no altitude.
                log::debug!("skipping atmosphere row {row_no}: no numeric altitude");
                continue;
            };

            let cell = |idx: usize| -> Result<f64, AtmosphereError> {
                let raw = record.get(idx).unwrap_or("");
                raw.parse::<f64>().map_err(|_| AtmosphereError::BadValue {
                    row: row_no,
                    column: headers.get(idx).cloned().unwrap_or_default(),
                    value: raw.to_string(),
                })
            };

            rows.push(AtmosphereRow {
                altitude_km,
                h2o: cell(columns.h2o)?,
                mix: cell(columns.mix)?,
                o3: [
                    cell(columns.o3[0])?,
                    cell(columns.o3[1])?,
                    cell(columns.o3[2])?,
                    cell(columns.o3[3])?,
                ],
            });
        }

        Self::from_rows(rows)
    }

    pub fn from_rows(mut rows: Vec<AtmosphereRow>) -> Result<Self, AtmosphereError> {
        if rows.is_empty() {
            return Err(AtmosphereError::Empty);
        }
        rows.sort_by(|a, b| a.altitude_km.total_cmp(&b.altitude_km));
        Ok(AtmosphereTable { rows })
    }

    pub fn rows(&self) -> &[AtmosphereRow] {
        &self.rows
    }

    /// The row with the greatest altitude not above `altitude_km`.
    pub fn row_at_or_below(&self, altitude_km: f64) -> Result<&AtmosphereRow, AtmosphereError> {
        self.rows
            .iter()
            .rev()
            .find(|r| r.altitude_km <= altitude_km)
            .ok_or(AtmosphereError::BelowTable {
                altitude: altitude_km,
                lowest: self.rows[0].altitude_km,
            })
    }
}

/// Column positions resolved from the CSV header row.
struct ColumnIndex {
    alt: usize,
    h2o: usize,
    mix: usize,
    o3: [usize; 4],
}

impl ColumnIndex {
    fn locate(headers: &[String]) -> Result<Self, AtmosphereError> {
        let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));

        let alt = find(ALT_HEADERS).ok_or(AtmosphereError::MissingColumn("Alt (KM)"))?;
        let h2o = find(H2O_HEADERS).ok_or(AtmosphereError::MissingColumn("H2O"))?;
        let mix = find(MIX_HEADERS).ok_or(AtmosphereError::MissingColumn("MIX"))?;
        let o3_first = find(O3_HEADERS).ok_or(AtmosphereError::MissingColumn("O3_LAT_9"))?;

        let mut o3 = [o3_first; 4];
        for (band, name) in O3_BAND_HEADERS.iter().enumerate() {
            // Named band columns win; otherwise they follow the first band.
            let idx = match find(&[*name]) {
                Some(idx) => idx,
                None => {
                    let idx = o3_first + band + 1;
                    if idx >= headers.len() {
                        return Err(AtmosphereError::MissingColumn(*name));
                    }
                    idx
                }
            };
            o3[band + 1] = idx;
        }

        Ok(ColumnIndex { alt, h2o, mix, o3 })
    }
}
