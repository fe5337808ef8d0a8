use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use exes_explorer::config::Settings;
use exes_explorer::data::fits::write_primary_hdu;
use exes_explorer::data::model::HeaderValue;
use exes_explorer::hitran::lines::{format_par_line, LineRecord};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

// ---------------------------------------------------------------------------
// Synthetic line lists
// ---------------------------------------------------------------------------

fn line(molec_id: u8, iso: u8, nu: f64, sw: f64, elower: f64) -> LineRecord {
    LineRecord {
        molec_id,
        local_iso_id: iso,
        wavenumber: nu,
        ref_strength: sw,
        gamma_air: 0.0712,
        gamma_self: 0.093,
        elower,
    }
}

fn co2_lines() -> Vec<LineRecord> {
    vec![
        line(2, 1, 700.512, 2.1e-22, 180.0),
        line(2, 1, 701.233, 4.5e-22, 95.0),
        line(2, 2, 701.874, 8.0e-23, 310.0),
        line(2, 3, 702.618, 3.3e-23, 420.0),
        line(2, 1, 705.100, 5.0e-22, 60.0),
    ]
}

fn h2o_lines() -> Vec<LineRecord> {
    vec![line(1, 1, 701.502, 1.2e-21, 1100.0), line(1, 2, 702.210, 2.0e-23, 900.0)]
}

fn o3_lines() -> Vec<LineRecord> {
    vec![line(3, 1, 700.905, 2.5e-20, 250.0)]
}

fn write_par(path: &Path, lines: &[LineRecord]) -> Result<()> {
    let text = lines
        .iter()
        .map(|l| format_par_line(l).map(|record| record + "\n"))
        .collect::<Result<String, String>>()
        .map_err(anyhow::Error::msg)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

fn write_parquet(path: &Path, lines: &[LineRecord]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("molec_id", DataType::Int64, false),
        Field::new("local_iso_id", DataType::Int64, false),
        Field::new("nu", DataType::Float64, false),
        Field::new("sw", DataType::Float64, false),
        Field::new("gamma_air", DataType::Float64, false),
        Field::new("gamma_self", DataType::Float64, false),
        Field::new("elower", DataType::Float64, false),
    ]));
    let floats = |f: fn(&LineRecord) -> f64| Arc::new(Float64Array::from_iter_values(lines.iter().map(f)));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from_iter_values(lines.iter().map(|l| l.molec_id as i64))),
            Arc::new(Int64Array::from_iter_values(lines.iter().map(|l| l.local_iso_id as i64))),
            floats(|l| l.wavenumber),
            floats(|l| l.ref_strength),
            floats(|l| l.gamma_air),
            floats(|l| l.gamma_self),
            floats(|l| l.elower),
        ],
    )?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn write_o3_csv(path: &Path, lines: &[LineRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["molec_id", "local_iso_id", "nu", "sw", "gamma_air", "gamma_self", "elower"])?;
    for l in lines {
        writer.write_record([
            l.molec_id.to_string(),
            l.local_iso_id.to_string(),
            l.wavenumber.to_string(),
            l.ref_strength.to_string(),
            l.gamma_air.to_string(),
            l.gamma_self.to_string(),
            l.elower.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Atmosphere table
// ---------------------------------------------------------------------------

fn write_atmosphere(path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["ALT_KM", "H2O", "MIX", "O3_LAT_9", "O3_LAT_36", "O3_LAT_43", "O3_LAT_56"])?;
    for km in 0..=20 {
        let h = km as f64;
        let h2o = 4.5e22 * (-h / 2.2).exp();
        let mix = 2.15e25 * (-h / 7.6).exp();
        let o3 = |peak: f64| peak * (1.0 - 0.02 * h).max(0.3);
        let row = [
            h.to_string(),
            format!("{h2o:.4e}"),
            format!("{mix:.4e}"),
            format!("{:.4e}", o3(7.4e18)),
            format!("{:.4e}", o3(8.1e18)),
            format!("{:.4e}", o3(9.0e18)),
            format!("{:.4e}", o3(9.8e18)),
        ];
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// EXES observations
// ---------------------------------------------------------------------------

struct Flight {
    object: &'static str,
    elevation: f64,
    lat: f64,
    lon: f64,
    alt_start_ft: f64,
    alt_end_ft: f64,
    temp_c: f64,
    date: &'static str,
}

const FLIGHTS: [Flight; 4] = [
    Flight {
        object: "Mars",
        elevation: 38.0,
        lat: 34.6,
        lon: -118.1,
        alt_start_ft: 39000.0,
        alt_end_ft: 41000.0,
        temp_c: -52.0,
        date: "2019-06-12T07:41:22.100",
    },
    Flight {
        object: "Mars",
        elevation: 44.0,
        lat: 41.2,
        lon: -112.5,
        alt_start_ft: 42000.0,
        alt_end_ft: 43000.0,
        temp_c: -56.5,
        date: "2019-06-14T08:02:10",
    },
    Flight {
        object: "Jupiter",
        elevation: 31.0,
        lat: 22.4,
        lon: -125.9,
        alt_start_ft: 38000.0,
        alt_end_ft: 38500.0,
        temp_c: -48.0,
        date: "2021-08-03T05:15:00",
    },
    Flight {
        object: "Venus",
        elevation: 25.0,
        lat: 49.8,
        lon: -104.3,
        alt_start_ft: 40000.0,
        alt_end_ft: 41000.0,
        temp_c: -58.0,
        date: "2022-01-27T03:30:45",
    },
];

fn write_observation(path: &Path, flight: &Flight, rng: &mut SimpleRng) -> Result<()> {
    let n = 3000;
    let wavenumber: Vec<f64> = (0..n).map(|i| 700.0 + i as f64 * 0.001).collect();
    let absorbers: Vec<(f64, f64)> = co2_lines()
        .iter()
        .chain(h2o_lines().iter())
        .chain(o3_lines().iter())
        .map(|l| (l.wavenumber, (l.ref_strength * 4e20).min(0.7)))
        .collect();

    let transmittance: Vec<f64> = wavenumber
        .iter()
        .map(|&wn| {
            let depth: f64 = absorbers.iter().map(|&(mu, d)| gaussian(wn, mu, 0.02, d)).sum();
            (0.98 - depth).max(0.02)
        })
        .collect();
    let continuum = 40.0 + 10.0 * rng.next_f64();
    let flux: Vec<f64> = transmittance
        .iter()
        .map(|t| continuum * t + rng.gauss(0.0, 0.15))
        .collect();
    let uncertainty = vec![0.15; n];

    let mut data = Vec::with_capacity(4 * n);
    data.extend(&wavenumber);
    data.extend(&flux);
    data.extend(&uncertainty);
    data.extend(&transmittance);

    let cards = [
        ("OBJECT", HeaderValue::String(flight.object.into())),
        ("TELEL", HeaderValue::Float(flight.elevation)),
        ("LAT_STA", HeaderValue::Float(flight.lat)),
        ("LON_STA", HeaderValue::Float(flight.lon)),
        ("ALTI_STA", HeaderValue::Float(flight.alt_start_ft)),
        ("ALTI_END", HeaderValue::Float(flight.alt_end_ft)),
        ("TEMP_OUT", HeaderValue::Float(flight.temp_c)),
        ("DATE-OBS", HeaderValue::String(flight.date.into())),
    ];
    write_primary_hdu(path, &cards, &[n, 4], &data).with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::init();
    let out = std::env::args().nth(1).unwrap_or_else(|| "sample_data".to_string());
    let out = Path::new(&out);
    let exes_dir = out.join("EXES_Files");
    let hitran_dir = out.join("HITRAN_Data");
    std::fs::create_dir_all(&exes_dir)?;
    std::fs::create_dir_all(&hitran_dir)?;

    let mut rng = SimpleRng::new(42);
    for (i, flight) in FLIGHTS.iter().enumerate() {
        let name = format!("F{:03}_{}_EXES.fits", 600 + i, flight.object.to_lowercase());
        write_observation(&exes_dir.join(name), flight, &mut rng)?;
    }

    write_par(&hitran_dir.join("CO2.data"), &co2_lines())?;
    write_parquet(&hitran_dir.join("H2O.parquet"), &h2o_lines())?;
    write_o3_csv(&hitran_dir.join("O3.csv"), &o3_lines())?;

    let atmosphere_file = out.join("model_atmosphere.csv");
    write_atmosphere(&atmosphere_file)?;

    let settings = Settings {
        exes_dir,
        hitran_dir,
        atmosphere_file,
        ..Settings::default()
    };
    let config_path = out.join("exes_viewer.json");
    std::fs::write(&config_path, serde_json::to_string_pretty(&settings)?)?;

    println!(
        "Wrote {} observations, 3 line tables and an atmosphere table to {}",
        FLIGHTS.len(),
        out.display()
    );
    println!("Run with EXES_VIEWER_CONFIG={}", config_path.display());
    Ok(())
}
