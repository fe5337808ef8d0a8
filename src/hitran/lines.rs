use std::collections::HashMap;
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Line records
// ---------------------------------------------------------------------------

/// One transition from a HITRAN line list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineRecord {
    pub molec_id: u8,
    pub local_iso_id: u8,
    /// Line centre (cm⁻¹).
    pub wavenumber: f64,
    /// Line intensity at 296 K (cm⁻¹ / (molecule cm⁻²)).
    pub ref_strength: f64,
    /// Air- and self-broadened Lorentzian half widths at 296 K (cm⁻¹ / atm).
    pub gamma_air: f64,
    pub gamma_self: f64,
    /// Lower-state energy (cm⁻¹).
    pub elower: f64,
}

impl LineRecord {
    /// Wavelength in µm.
    pub fn wavelength(&self) -> f64 {
        1e4 / self.wavenumber
    }
}

#[derive(Debug, Error)]
pub enum LineStoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}, line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{path}: missing column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path}, row {row}: column '{column}' {problem}")]
    BadValue {
        path: PathBuf,
        row: usize,
        column: String,
        problem: String,
    },

    #[error("no line table for {molecule} in {dir} (looked for .data, .parquet, .csv)")]
    MissingTable { molecule: String, dir: PathBuf },

    #[error("unsupported line table extension: .{0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
}

// ---------------------------------------------------------------------------
// LineStore – file-backed, memoized line tables
// ---------------------------------------------------------------------------

/// Line tables fetched ahead of time, one file per molecule in `dir`.
///
/// Tables are parsed on first use and kept in memory afterwards.
#[derive(Debug, Default)]
pub struct LineStore {
    dir: PathBuf,
    tables: HashMap<String, Vec<LineRecord>>,
}

/// Table extensions tried in order for a molecule.
const TABLE_EXTENSIONS: [&str; 3] = ["data", "parquet", "csv"];

impl LineStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        LineStore {
            dir: dir.into(),
            tables: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Register an already-loaded table, replacing any cached one.
    pub fn insert_table(&mut self, molecule: &str, lines: Vec<LineRecord>) {
        self.tables.insert(molecule.to_string(), lines);
    }

    /// All lines of `molecule`, loading the table on first access.
    pub fn lines(&mut self, molecule: &str) -> Result<&[LineRecord], LineStoreError> {
        if !self.tables.contains_key(molecule) {
            let path = self.table_path(molecule)?;
            let lines = load_table(&path)?;
            if let Some(expected) = read_hapi_row_count(&path.with_extension("header")) {
                if expected != lines.len() {
                    log::warn!(
                        "{}: header announces {expected} rows, parsed {}",
                        path.display(),
                        lines.len()
                    );
                }
            }
            log::info!("Loaded {} {molecule} lines from {}", lines.len(), path.display());
            self.tables.insert(molecule.to_string(), lines);
        }
        Ok(self.tables[molecule].as_slice())
    }

    /// Lines of `molecule` with `min(range) <= ν <= max(range)`; all lines
    /// when `range` is `None`.
    pub fn query(
        &mut self,
        molecule: &str,
        range: Option<(f64, f64)>,
    ) -> Result<Vec<LineRecord>, LineStoreError> {
        let lines = self.lines(molecule)?;
        Ok(match range {
            Some((a, b)) => {
                let (lo, hi) = (a.min(b), a.max(b));
                lines
                    .iter()
                    .filter(|l| lo <= l.wavenumber && l.wavenumber <= hi)
                    .copied()
                    .collect()
            }
            None => lines.to_vec(),
        })
    }

    fn table_path(&self, molecule: &str) -> Result<PathBuf, LineStoreError> {
        TABLE_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{molecule}.{ext}")))
            .find(|p| p.is_file())
            .ok_or_else(|| LineStoreError::MissingTable {
                molecule: molecule.to_string(),
                dir: self.dir.clone(),
            })
    }
}

// ---------------------------------------------------------------------------
// Table loaders
// ---------------------------------------------------------------------------

/// Load a line table.  Dispatch by extension.
///
/// Supported formats:
/// * `.data`    – HITRAN 160-character fixed-width records (as written by HAPI)
/// * `.parquet` – columns `molec_id, local_iso_id, nu, sw, gamma_air, gamma_self, elower`
/// * `.csv`     – same columns as parquet, with a header row
pub fn load_table(path: &Path) -> Result<Vec<LineRecord>, LineStoreError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "data" | "par" => load_par(path),
        "parquet" | "pq" => load_parquet(path),
        "csv" => load_csv(path),
        other => Err(LineStoreError::UnsupportedFormat(other.to_string())),
    }
}

// -- HITRAN fixed-width --

fn load_par(path: &Path) -> Result<Vec<LineRecord>, LineStoreError> {
    let text = std::fs::read_to_string(path).map_err(|source| LineStoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            parse_par_line(line).map_err(|message| LineStoreError::Parse {
                path: path.to_path_buf(),
                line: i + 1,
                message,
            })
        })
        .collect()
}

/// Parse one HITRAN 160-character record.
pub fn parse_par_line(line: &str) -> Result<LineRecord, String> {
    fn field<'a>(line: &'a str, range: std::ops::Range<usize>, name: &str) -> Result<&'a str, String> {
        line.get(range)
            .map(str::trim)
            .ok_or_else(|| format!("record too short for field {name}"))
    }
    fn number(line: &str, range: std::ops::Range<usize>, name: &str) -> Result<f64, String> {
        let raw = field(line, range, name)?;
        raw.parse::<f64>()
            .map_err(|_| format!("field {name}: '{raw}' is not a number"))
    }

    let molec_id = field(line, 0..2, "molec_id")?
        .parse::<u8>()
        .map_err(|_| "field molec_id is not an integer".to_string())?;
    let iso_code = field(line, 2..3, "local_iso_id")?;
    let local_iso_id = iso_code
        .chars()
        .next()
        .and_then(iso_id_from_code)
        .ok_or_else(|| format!("field local_iso_id: bad code '{iso_code}'"))?;

    Ok(LineRecord {
        molec_id,
        local_iso_id,
        wavenumber: number(line, 3..15, "nu")?,
        ref_strength: number(line, 15..25, "sw")?,
        gamma_air: number(line, 35..40, "gamma_air")?,
        gamma_self: number(line, 40..45, "gamma_self")?,
        elower: number(line, 45..55, "elower")?,
    })
}

/// Format a record as a HITRAN 160-character line (Einstein A and the
/// fields past E'' are left zero/blank). Fails for isotopologue ids with no
/// one-character code.
pub fn format_par_line(line: &LineRecord) -> Result<String, String> {
    let iso_code = iso_code_from_id(line.local_iso_id)
        .ok_or_else(|| format!("isotopologue id {} has no HITRAN code", line.local_iso_id))?;
    let gamma_air = format!("{:.4}", line.gamma_air);
    let gamma_air = gamma_air.strip_prefix('0').unwrap_or(&gamma_air);
    let record = format!(
        "{:>2}{}{:>12.6}{:>10.3E}{:>10.3E}{:>5}{:>5.3}{:>10.4}",
        line.molec_id,
        iso_code,
        line.wavenumber,
        line.ref_strength,
        0.0,
        gamma_air,
        line.gamma_self,
        line.elower,
    );
    Ok(format!("{record:<160}"))
}

/// `0`-`9` map to themselves; `A`, `B`, ... continue from 11.
fn iso_id_from_code(c: char) -> Option<u8> {
    match c {
        '0'..='9' => c.to_digit(10).map(|d| d as u8),
        'A'..='Z' => Some(c as u8 - b'A' + 11),
        _ => None,
    }
}

fn iso_code_from_id(id: u8) -> Option<char> {
    match id {
        0..=9 => Some((b'0' + id) as char),
        11..=36 => Some((b'A' + id - 11) as char),
        _ => None,
    }
}

/// Row count announced by a HAPI `.header` JSON file, if one is present.
fn read_hapi_row_count(path: &Path) -> Option<usize> {
    #[derive(Deserialize)]
    struct HapiHeader {
        number_of_rows: usize,
    }

    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<HapiHeader>(&text) {
        Ok(header) => Some(header.number_of_rows),
        Err(e) => {
            log::warn!("{}: unreadable HAPI header: {e}", path.display());
            None
        }
    }
}

// -- CSV --

#[derive(Debug, Deserialize)]
struct CsvLine {
    molec_id: u8,
    local_iso_id: u8,
    nu: f64,
    sw: f64,
    gamma_air: f64,
    gamma_self: f64,
    elower: f64,
}

fn load_csv(path: &Path) -> Result<Vec<LineRecord>, LineStoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    reader
        .deserialize::<CsvLine>()
        .map(|row| -> Result<LineRecord, LineStoreError> {
            let row = row?;
            Ok(LineRecord {
                molec_id: row.molec_id,
                local_iso_id: row.local_iso_id,
                wavenumber: row.nu,
                ref_strength: row.sw,
                gamma_air: row.gamma_air,
                gamma_self: row.gamma_self,
                elower: row.elower,
            })
        })
        .collect()
}

// -- Parquet --

fn load_parquet(path: &Path) -> Result<Vec<LineRecord>, LineStoreError> {
    let file = std::fs::File::open(path).map_err(|source| LineStoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut lines = Vec::new();
    for batch in reader {
        let batch = batch?;
        let column = |name: &str| f64_column(&batch, name, path);
        let molec_id = column("molec_id")?;
        let local_iso_id = column("local_iso_id")?;
        let nu = column("nu")?;
        let sw = column("sw")?;
        let gamma_air = column("gamma_air")?;
        let gamma_self = column("gamma_self")?;
        let elower = column("elower")?;

        for row in 0..batch.num_rows() {
            let at = CellAt {
                path,
                row: lines.len(),
            };
            lines.push(LineRecord {
                molec_id: at.id(&molec_id, row, "molec_id")?,
                local_iso_id: at.id(&local_iso_id, row, "local_iso_id")?,
                wavenumber: at.value(&nu, row, "nu")?,
                ref_strength: at.value(&sw, row, "sw")?,
                gamma_air: at.value(&gamma_air, row, "gamma_air")?,
                gamma_self: at.value(&gamma_self, row, "gamma_self")?,
                elower: at.value(&elower, row, "elower")?,
            });
        }
    }
    Ok(lines)
}

/// Position of a parquet row across all record batches, for error reports.
struct CellAt<'a> {
    path: &'a Path,
    row: usize,
}

impl CellAt<'_> {
    fn bad(&self, column: &str, problem: String) -> LineStoreError {
        LineStoreError::BadValue {
            path: self.path.to_path_buf(),
            row: self.row,
            column: column.to_string(),
            problem,
        }
    }

    fn value(&self, arr: &Float64Array, i: usize, column: &str) -> Result<f64, LineStoreError> {
        if arr.is_null(i) {
            return Err(self.bad(column, "is null".into()));
        }
        Ok(arr.value(i))
    }

    /// Molecule and isotopologue ids must be whole numbers in `0..=255`.
    fn id(&self, arr: &Float64Array, i: usize, column: &str) -> Result<u8, LineStoreError> {
        let v = self.value(arr, i, column)?;
        if v.fract() != 0.0 || !(0.0..=f64::from(u8::MAX)).contains(&v) {
            return Err(self.bad(column, format!("{v} is not a valid id")));
        }
        Ok(v as u8)
    }
}

/// Read a numeric column of any integer/float type as `Float64Array`.
fn f64_column(batch: &RecordBatch, name: &str, path: &Path) -> Result<Float64Array, LineStoreError> {
    let col: &ArrayRef = batch
        .column_by_name(name)
        .ok_or_else(|| LineStoreError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })?;
    let as_f64 = cast(col, &DataType::Float64)?;
    let arr = as_f64
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| LineStoreError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })?;
    Ok(arr.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::Int64Array;
    use arrow::datatypes::{Field, Schema};
    use parquet::arrow::ArrowWriter;

    fn co2_line(nu: f64, iso: u8) -> LineRecord {
        LineRecord {
            molec_id: 2,
            local_iso_id: iso,
            wavenumber: nu,
            ref_strength: 3.215e-21,
            gamma_air: 0.0712,
            gamma_self: 0.093,
            elower: 234.5678,
        }
    }

    #[test]
    fn par_line_round_trips_through_fixed_width() {
        let line = co2_line(720.123456, 0);
        let text = format_par_line(&line).unwrap();
        assert_eq!(text.len(), 160);
        assert_eq!(&text[0..3], " 20");
        assert_eq!(parse_par_line(&text).unwrap(), line);
    }

    #[test]
    fn isotopologue_codes_cover_digits_and_letters_only() {
        assert_eq!(iso_code_from_id(0), Some('0'));
        assert_eq!(iso_code_from_id(11), Some('A'));
        assert_eq!(iso_code_from_id(36), Some('Z'));
        assert_eq!(iso_code_from_id(10), None);
        assert_eq!(iso_code_from_id(37), None);
        assert_eq!(iso_code_from_id(255), None);
        assert!(format_par_line(&co2_line(700.0, 200)).is_err());
        let z = format_par_line(&co2_line(700.0, 36)).unwrap();
        assert_eq!(parse_par_line(&z).unwrap().local_iso_id, 36);
    }

    #[test]
    fn parses_hitran_record() {
        let text = " 1A  701.234560 1.234E-22 2.345E-01.07120.345  123.4567 0.76-0.001234";
        let line = parse_par_line(text).unwrap();
        assert_eq!(line.molec_id, 1);
        assert_eq!(line.local_iso_id, 11);
        assert_eq!(line.wavenumber, 701.23456);
        assert_eq!(line.ref_strength, 1.234e-22);
        assert_eq!(line.gamma_air, 0.0712);
        assert_eq!(line.gamma_self, 0.345);
        assert_eq!(line.elower, 123.4567);
        assert!(parse_par_line(" 1").is_err());
    }

    #[test]
    fn query_filters_inclusive_range_and_memoizes() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("CO2.data")).unwrap();
        for nu in [700.0, 710.0, 720.0, 730.0] {
            writeln!(file, "{}", format_par_line(&co2_line(nu, 1)).unwrap()).unwrap();
        }
        std::fs::write(dir.path().join("CO2.header"), r#"{"table_name": "CO2", "number_of_rows": 4}"#)
            .unwrap();

        let mut store = LineStore::open(dir.path());
        let hits = store.query("CO2", Some((720.0, 710.0))).unwrap();
        let nus: Vec<f64> = hits.iter().map(|l| l.wavenumber).collect();
        assert_eq!(nus, vec![710.0, 720.0]);
        assert_eq!(store.query("CO2", None).unwrap().len(), 4);

        // Second access is served from memory even if the file disappears.
        std::fs::remove_file(dir.path().join("CO2.data")).unwrap();
        assert_eq!(store.lines("CO2").unwrap().len(), 4);
    }

    #[test]
    fn missing_table_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LineStore::open(dir.path());
        assert!(matches!(
            store.lines("CH4"),
            Err(LineStoreError::MissingTable { .. })
        ));
    }

    #[test]
    fn loads_csv_table() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("O3.csv"),
            "molec_id,local_iso_id,nu,sw,gamma_air,gamma_self,elower\n3,1,1000.5,1e-21,0.07,0.09,50.0\n",
        )
        .unwrap();
        let mut store = LineStore::open(dir.path());
        let lines = store.lines("O3").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].molec_id, 3);
        assert_eq!(lines[0].elower, 50.0);
    }

    #[test]
    fn loads_parquet_table_with_integer_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CO.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("molec_id", DataType::Int64, false),
            Field::new("local_iso_id", DataType::Int64, false),
            Field::new("nu", DataType::Float64, false),
            Field::new("sw", DataType::Float64, false),
            Field::new("gamma_air", DataType::Float64, false),
            Field::new("gamma_self", DataType::Float64, false),
            Field::new("elower", DataType::Float64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![5, 5])),
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(Float64Array::from(vec![2100.0, 2110.0])),
                Arc::new(Float64Array::from(vec![1e-19, 2e-21])),
                Arc::new(Float64Array::from(vec![0.05, 0.05])),
                Arc::new(Float64Array::from(vec![0.06, 0.06])),
                Arc::new(Float64Array::from(vec![10.0, 20.0])),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let lines = load_table(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].local_iso_id, 2);
        assert_eq!(lines[1].wavenumber, 2110.0);
    }

    fn write_id_parquet(path: &Path, molec_id: Int64Array) {
        let schema = Arc::new(Schema::new(vec![
            Field::new("molec_id", DataType::Int64, true),
            Field::new("local_iso_id", DataType::Int64, false),
            Field::new("nu", DataType::Float64, false),
            Field::new("sw", DataType::Float64, false),
            Field::new("gamma_air", DataType::Float64, false),
            Field::new("gamma_self", DataType::Float64, false),
            Field::new("elower", DataType::Float64, false),
        ]));
        let n = molec_id.len();
        let floats = || Arc::new(Float64Array::from(vec![1.0; n]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(molec_id),
                Arc::new(Int64Array::from(vec![1; n])),
                floats(),
                floats(),
                floats(),
                floats(),
                floats(),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn parquet_null_and_out_of_range_ids_are_errors() {
        let dir = tempfile::tempdir().unwrap();

        let nulls = dir.path().join("nulls.parquet");
        write_id_parquet(&nulls, Int64Array::from(vec![Some(5), None]));
        match load_table(&nulls) {
            Err(LineStoreError::BadValue { row, column, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "molec_id");
            }
            other => panic!("expected BadValue, got {other:?}"),
        }

        let wide = dir.path().join("wide.parquet");
        write_id_parquet(&wide, Int64Array::from(vec![261]));
        assert!(matches!(
            load_table(&wide),
            Err(LineStoreError::BadValue { row: 0, .. })
        ));
    }
}
