// ---------------------------------------------------------------------------
// Region selection on the spectrum plot
// ---------------------------------------------------------------------------

/// A user selection in plot coordinates (wavenumber, flux).
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Box { x: (f64, f64), y: (f64, f64) },
    /// Free-hand outline. Only its bounding box is used for extraction.
    Lasso(Vec<[f64; 2]>),
}

/// Axis-aligned selection bounds, ordered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.x_min <= x && x <= self.x_max && self.y_min <= y && y <= self.y_max
    }
}

impl Selection {
    /// Bounding box; `None` for a lasso with no finite points.
    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            Selection::Box { x, y } => Some(Bounds {
                x_min: x.0.min(x.1),
                x_max: x.0.max(x.1),
                y_min: y.0.min(y.1),
                y_max: y.0.max(y.1),
            }),
            Selection::Lasso(points) => points
                .iter()
                .filter(|p| p[0].is_finite() && p[1].is_finite())
                .fold(None, |acc: Option<Bounds>, p| {
                    Some(match acc {
                        None => Bounds {
                            x_min: p[0],
                            x_max: p[0],
                            y_min: p[1],
                            y_max: p[1],
                        },
                        Some(b) => Bounds {
                            x_min: b.x_min.min(p[0]),
                            x_max: b.x_max.max(p[0]),
                            y_min: b.y_min.min(p[1]),
                            y_max: b.y_max.max(p[1]),
                        },
                    })
                }),
        }
    }
}

/// Samples of the spectrum inside a selection, in original order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Region {
    pub wavenumber: Vec<f64>,
    pub flux: Vec<f64>,
}

impl Region {
    pub fn len(&self) -> usize {
        self.wavenumber.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavenumber.is_empty()
    }

    pub fn x_range(&self) -> Option<(f64, f64)> {
        crate::data::model::finite_range(&self.wavenumber)
    }
}

/// Keep the samples with both coordinates inside `bounds`; NaNs never match.
pub fn extract(wavenumber: &[f64], flux: &[f64], bounds: &Bounds) -> Region {
    let (wavenumber, flux) = wavenumber
        .iter()
        .zip(flux)
        .filter(|&(&x, &y)| bounds.contains(x, y))
        .map(|(&x, &y)| (x, y))
        .unzip();
    Region { wavenumber, flux }
}
