use std::fmt;

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn};
use thiserror::Error;

use super::peaks::Peak;
use super::selection::Region;

/// Starting width (σ or FWHM, cm⁻¹) of every line.
pub const INITIAL_WIDTH: f64 = 0.025;

/// Baseline plus one amplitude/center/width triple per line.
const PARAMS_PER_LINE: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("no peaks to fit")]
    NoPeaks,

    #[error("{samples} samples cannot constrain {parameters} parameters")]
    TooFewSamples { samples: usize, parameters: usize },

    #[error("fit diverged: {0}")]
    Diverged(String),
}

// ---------------------------------------------------------------------------
// Line shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineShape {
    /// `a·exp(−(x−μ)²/(2σ²))`, width is σ.
    #[default]
    Gaussian,
    /// `a·(f/2)²/((x−μ)² + (f/2)²)`, width is the FWHM f.
    Lorentzian,
}

impl LineShape {
    pub const ALL: [LineShape; 2] = [LineShape::Gaussian, LineShape::Lorentzian];

    pub fn eval(self, x: f64, amplitude: f64, center: f64, width: f64) -> f64 {
        let d = x - center;
        match self {
            LineShape::Gaussian => amplitude * (-d * d / (2.0 * width * width)).exp(),
            LineShape::Lorentzian => {
                let h2 = (width / 2.0).powi(2);
                amplitude * h2 / (d * d + h2)
            }
        }
    }

    /// Partial derivatives with respect to amplitude, center and width.
    fn gradient(self, x: f64, amplitude: f64, center: f64, width: f64) -> [f64; 3] {
        let d = x - center;
        match self {
            LineShape::Gaussian => {
                let e = (-d * d / (2.0 * width * width)).exp();
                let g = amplitude * e;
                [e, g * d / (width * width), g * d * d / width.powi(3)]
            }
            LineShape::Lorentzian => {
                let h = width / 2.0;
                let denom = d * d + h * h;
                let denom2 = denom * denom;
                [
                    h * h / denom,
                    2.0 * amplitude * h * h * d / denom2,
                    amplitude * h * d * d / denom2,
                ]
            }
        }
    }
}

impl fmt::Display for LineShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineShape::Gaussian => write!(f, "gaussian"),
            LineShape::Lorentzian => write!(f, "lorentzian"),
        }
    }
}

// ---------------------------------------------------------------------------
// Peak table rows and fit results
// ---------------------------------------------------------------------------

/// One editable row of the peak table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakRow {
    pub wavenumber: f64,
    pub flux: f64,
    pub shape: LineShape,
}

impl From<&Peak> for PeakRow {
    fn from(peak: &Peak) -> Self {
        PeakRow {
            wavenumber: peak.wavenumber,
            flux: peak.flux,
            shape: LineShape::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedLine {
    pub shape: LineShape,
    pub amplitude: f64,
    pub center: f64,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub baseline: f64,
    pub lines: Vec<FittedLine>,
    pub residual_sum_squares: f64,
    pub evaluations: usize,
    pub converged: bool,
}

impl FitResult {
    /// Model value at `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.baseline
            + self
                .lines
                .iter()
                .map(|l| l.shape.eval(x, l.amplitude, l.center, l.width))
                .sum::<f64>()
    }

    pub fn evaluate_all(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.evaluate(x)).collect()
    }
}

// ---------------------------------------------------------------------------
// Least-squares problem
// ---------------------------------------------------------------------------

/// Residuals `model(x) − y` over a region; parameters are
/// `[baseline, a₀, μ₀, w₀, a₁, μ₁, w₁, …]`.
struct LineFitProblem<'a> {
    x: &'a [f64],
    y: &'a [f64],
    shapes: Vec<LineShape>,
    params: DVector<f64>,
}

impl LineFitProblem<'_> {
    fn line(&self, k: usize) -> (f64, f64, f64) {
        let base = 1 + PARAMS_PER_LINE * k;
        (self.params[base], self.params[base + 1], self.params[base + 2])
    }

    fn model(&self, x: f64) -> f64 {
        let lines = self.shapes.iter().enumerate().map(|(k, shape)| {
            let (a, mu, w) = self.line(k);
            shape.eval(x, a, mu, w)
        });
        self.params[0] + lines.sum::<f64>()
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for LineFitProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, params: &DVector<f64>) {
        self.params.copy_from(params);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let r = DVector::from_iterator(
            self.x.len(),
            self.x.iter().zip(self.y).map(|(&x, &y)| self.model(x) - y),
        );
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let mut jac = DMatrix::zeros(self.x.len(), self.params.len());
        for (i, &x) in self.x.iter().enumerate() {
            jac[(i, 0)] = 1.0;
            for (k, shape) in self.shapes.iter().enumerate() {
                let (a, mu, w) = self.line(k);
                let grad = shape.gradient(x, a, mu, w);
                let base = 1 + PARAMS_PER_LINE * k;
                jac[(i, base)] = grad[0];
                jac[(i, base + 1)] = grad[1];
                jac[(i, base + 2)] = grad[2];
            }
        }
        jac.iter().all(|v| v.is_finite()).then_some(jac)
    }
}

/// Fit `baseline + Σ shape(x; a, μ, w)` to the region, one term per row.
///
/// Each term starts at amplitude `flux − baseline`, the row's wavenumber and
/// [`INITIAL_WIDTH`].
pub fn fit_peaks(region: &Region, rows: &[PeakRow], baseline: f64) -> Result<FitResult, FitError> {
    if rows.is_empty() {
        return Err(FitError::NoPeaks);
    }
    let parameters = 1 + PARAMS_PER_LINE * rows.len();
    if region.len() < parameters {
        return Err(FitError::TooFewSamples {
            samples: region.len(),
            parameters,
        });
    }

    let mut initial = Vec::with_capacity(parameters);
    initial.push(baseline);
    for row in rows {
        initial.extend([row.flux - baseline, row.wavenumber, INITIAL_WIDTH]);
    }

    let problem = LineFitProblem {
        x: &region.wavenumber,
        y: &region.flux,
        shapes: rows.iter().map(|r| r.shape).collect(),
        params: DVector::from_vec(initial),
    };
    let (problem, report) = LevenbergMarquardt::new().minimize(problem);

    if problem.params.iter().any(|p| !p.is_finite()) {
        return Err(FitError::Diverged(format!("{:?}", report.termination)));
    }

    let lines = problem
        .shapes
        .iter()
        .enumerate()
        .map(|(k, &shape)| {
            let (amplitude, center, width) = problem.line(k);
            FittedLine {
                shape,
                amplitude,
                center,
                // The models are symmetric in the sign of the width.
                width: width.abs(),
            }
        })
        .collect();

    let result = FitResult {
        baseline: problem.params[0],
        lines,
        residual_sum_squares: 2.0 * report.objective_function,
        evaluations: report.number_of_evaluations,
        converged: report.termination.was_successful(),
    };
    if result.converged {
        log::info!(
            "Fitted {} lines, RSS {:.3e} after {} evaluations",
            rows.len(),
            result.residual_sum_squares,
            result.evaluations
        );
    } else {
        log::warn!("Fit stopped without converging: {:?}", report.termination);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid() -> Vec<f64> {
        (0..=120).map(|i| 700.0 + i as f64 * 0.005).collect()
    }

    fn region_from(model: &FitResult) -> Region {
        let wavenumber = grid();
        let flux = model.evaluate_all(&wavenumber);
        Region { wavenumber, flux }
    }

    fn truth(lines: Vec<FittedLine>) -> FitResult {
        FitResult {
            baseline: 1.0,
            lines,
            residual_sum_squares: 0.0,
            evaluations: 0,
            converged: true,
        }
    }

    #[test]
    fn gradients_match_finite_differences() {
        let eps = 1e-7;
        for shape in LineShape::ALL {
            let (x, a, mu, w) = (700.31, -0.4, 700.3, 0.03);
            let grad = shape.gradient(x, a, mu, w);
            let numeric = [
                (shape.eval(x, a + eps, mu, w) - shape.eval(x, a - eps, mu, w)) / (2.0 * eps),
                (shape.eval(x, a, mu + eps, w) - shape.eval(x, a, mu - eps, w)) / (2.0 * eps),
                (shape.eval(x, a, mu, w + eps) - shape.eval(x, a, mu, w - eps)) / (2.0 * eps),
            ];
            for (g, n) in grad.iter().zip(numeric) {
                assert_relative_eq!(*g, n, max_relative = 1e-5);
            }
        }
    }

    #[test]
    fn lorentzian_is_half_amplitude_at_half_width() {
        let v = LineShape::Lorentzian.eval(10.05, 2.0, 10.0, 0.1);
        assert_relative_eq!(v, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn recovers_single_gaussian_dip() {
        let expected = truth(vec![FittedLine {
            shape: LineShape::Gaussian,
            amplitude: -0.5,
            center: 700.3,
            width: 0.02,
        }]);
        let region = region_from(&expected);
        let rows = [PeakRow {
            wavenumber: 700.3,
            flux: 0.5,
            shape: LineShape::Gaussian,
        }];
        let fit = fit_peaks(&region, &rows, 1.0).unwrap();
        assert_relative_eq!(fit.baseline, 1.0, epsilon = 1e-6);
        assert_relative_eq!(fit.lines[0].amplitude, -0.5, epsilon = 1e-6);
        assert_relative_eq!(fit.lines[0].center, 700.3, epsilon = 1e-6);
        assert_relative_eq!(fit.lines[0].width, 0.02, epsilon = 1e-6);
        assert!(fit.residual_sum_squares < 1e-10);
    }

    #[test]
    fn recovers_mixed_shapes() {
        let expected = truth(vec![
            FittedLine {
                shape: LineShape::Gaussian,
                amplitude: -0.4,
                center: 700.15,
                width: 0.02,
            },
            FittedLine {
                shape: LineShape::Lorentzian,
                amplitude: -0.3,
                center: 700.45,
                width: 0.03,
            },
        ]);
        let region = region_from(&expected);
        let rows = [
            PeakRow {
                wavenumber: 700.15,
                flux: 0.6,
                shape: LineShape::Gaussian,
            },
            PeakRow {
                wavenumber: 700.45,
                flux: 0.7,
                shape: LineShape::Lorentzian,
            },
        ];
        let fit = fit_peaks(&region, &rows, 1.0).unwrap();
        for (got, want) in fit.lines.iter().zip(&expected.lines) {
            assert_eq!(got.shape, want.shape);
            assert_relative_eq!(got.center, want.center, epsilon = 1e-5);
            assert_relative_eq!(got.amplitude, want.amplitude, epsilon = 1e-5);
            assert_relative_eq!(got.width, want.width, epsilon = 1e-5);
        }
        assert_relative_eq!(fit.evaluate(700.15), expected.evaluate(700.15), epsilon = 1e-6);
    }

    #[test]
    fn rejects_underdetermined_fits() {
        let region = Region {
            wavenumber: vec![700.0, 700.1, 700.2],
            flux: vec![1.0, 0.5, 1.0],
        };
        let rows = [PeakRow {
            wavenumber: 700.1,
            flux: 0.5,
            shape: LineShape::Gaussian,
        }];
        assert_eq!(
            fit_peaks(&region, &rows, 1.0),
            Err(FitError::TooFewSamples {
                samples: 3,
                parameters: 4
            })
        );
        assert_eq!(fit_peaks(&region, &[], 1.0), Err(FitError::NoPeaks));
    }

    #[test]
    fn peak_rows_default_to_gaussian() {
        let peak = Peak {
            index: 3,
            wavenumber: 701.2,
            flux: 0.8,
            prominence: 0.2,
        };
        let row = PeakRow::from(&peak);
        assert_eq!(row.shape, LineShape::Gaussian);
        assert_eq!(row.wavenumber, 701.2);
    }
}
