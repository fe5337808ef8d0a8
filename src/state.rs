use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use exes_explorer::analysis::fit::{fit_peaks, FitResult, PeakRow};
use exes_explorer::analysis::peaks::{find_dips, Peak};
use exes_explorer::analysis::selection::{extract, Region, Selection};
use exes_explorer::config::Settings;
use exes_explorer::data::atmosphere::AtmosphereTable;
use exes_explorer::data::catalog::Catalog;
use exes_explorer::data::exes::read_exes_file;
use exes_explorer::data::filter::{self, filtered_indices, ObjectFilter};
use exes_explorer::data::model::ExesSpectrum;
use exes_explorer::hitran::lines::LineStore;
use exes_explorer::hitran::overlay::{build_overlays, OverlayConditions, StemTrace};
use exes_explorer::hitran::partition::PartitionSums;
use exes_explorer::hitran::strength::StrengthCalculator;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// How a drag on the spectrum plot is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Pan,
    Box,
    Lasso,
}

/// Spectrum kept until the file or the smoothing width changes.
pub struct LoadedSpectrum {
    pub path: PathBuf,
    pub smooth_width: usize,
    pub spectrum: ExesSpectrum,
}

/// Line overlays kept until the file or the cutoff changes.
pub struct OverlayCache {
    pub path: PathBuf,
    pub cutoff: f64,
    pub traces: Vec<StemTrace>,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Data locations and the current analysis parameters.
    pub settings: Settings,

    pub catalog: Catalog,
    pub object_filter: ObjectFilter,
    /// Indices into `catalog.observations` passing the filter (cached).
    pub visible_indices: Vec<usize>,

    pub lines: LineStore,
    pub partition: PartitionSums,
    pub atmosphere: Option<AtmosphereTable>,

    /// File chosen on the map.
    pub selected: Option<PathBuf>,
    pub loaded: Option<LoadedSpectrum>,
    pub overlays: Option<OverlayCache>,

    pub selection_mode: SelectionMode,
    /// Plot-space points of the drag in progress.
    pub pending_selection: Vec<[f64; 2]>,
    pub selection: Option<Selection>,
    pub region: Option<Region>,
    pub peaks: Vec<Peak>,
    pub peak_rows: Vec<PeakRow>,
    pub fit: Option<FitResult>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let mut state = Self {
            lines: LineStore::open(&settings.hitran_dir),
            partition: PartitionSums::approximate(),
            atmosphere: None,
            catalog: Catalog::default(),
            object_filter: ObjectFilter::new(),
            visible_indices: Vec::new(),
            selected: None,
            loaded: None,
            overlays: None,
            selection_mode: SelectionMode::Box,
            pending_selection: Vec::new(),
            selection: None,
            region: None,
            peaks: Vec::new(),
            peak_rows: Vec::new(),
            fit: None,
            status_message: None,
            settings,
        };
        state.load_reference_data();
        state.rescan();
        state
    }

    fn report(&mut self, err: anyhow::Error) {
        log::error!("{err:#}");
        self.status_message = Some(format!("Error: {err:#}"));
    }

    /// Atmosphere table and partition sums; failures leave overlays disabled.
    pub fn load_reference_data(&mut self) {
        let atmosphere = AtmosphereTable::load(&self.settings.atmosphere_file).with_context(|| {
            format!(
                "loading atmosphere table {}",
                self.settings.atmosphere_file.display()
            )
        });
        match atmosphere {
            Ok(table) => {
                log::info!("Loaded {} atmosphere rows", table.rows().len());
                self.atmosphere = Some(table);
            }
            Err(e) => self.report(e),
        }

        if let Some(dir) = self.settings.partition_dir.clone() {
            match PartitionSums::load_dir(&dir) {
                Ok(sums) => self.partition = sums,
                Err(e) => self.report(anyhow::Error::new(e).context("loading partition sums")),
            }
        }
    }

    pub fn set_exes_dir(&mut self, dir: PathBuf) {
        self.settings.exes_dir = dir;
        self.rescan();
    }

    pub fn set_hitran_dir(&mut self, dir: PathBuf) {
        self.lines = LineStore::open(&dir);
        self.settings.hitran_dir = dir;
        self.overlays = None;
    }

    /// Re-read the observation directory.
    pub fn rescan(&mut self) {
        match Catalog::scan(&self.settings.exes_dir) {
            Ok(catalog) => {
                self.catalog = catalog;
                self.object_filter
                    .retain(|object| self.catalog.objects.contains(object));
                self.status_message = None;
            }
            Err(e) => {
                self.catalog = Catalog::default();
                self.report(e);
            }
        }
        self.refilter();
    }

    /// Recompute `visible_indices` after filter change.
    pub fn refilter(&mut self) {
        self.visible_indices = filtered_indices(&self.catalog, &self.object_filter);
    }

    pub fn toggle_object(&mut self, object: &str) {
        filter::toggle(&mut self.object_filter, object);
        self.refilter();
    }

    pub fn clear_object_filter(&mut self) {
        self.object_filter.clear();
        self.refilter();
    }

    pub fn select_observation(&mut self, path: &Path) {
        if self.selected.as_deref() != Some(path) {
            log::info!("Selected {}", path.display());
            self.selected = Some(path.to_path_buf());
        }
    }

    pub fn spectrum(&self) -> Option<&ExesSpectrum> {
        self.loaded.as_ref().map(|l| &l.spectrum)
    }

    pub fn overlay_traces(&self) -> &[StemTrace] {
        self.overlays
            .as_ref()
            .map(|o| o.traces.as_slice())
            .unwrap_or_default()
    }

    // ---- memoized derivations ----

    /// Bring the loaded spectrum and its overlays up to date with the
    /// selected file and current parameters. Cheap when nothing changed.
    pub fn refresh(&mut self) {
        let Some(path) = self.selected.clone() else {
            return;
        };
        let width = self.settings.smooth_width;

        let stale = self
            .loaded
            .as_ref()
            .map_or(true, |l| l.path != path || l.smooth_width != width);
        if stale {
            match load_spectrum(&path, width) {
                Ok(spectrum) => {
                    let same_file = self.loaded.as_ref().is_some_and(|l| l.path == path);
                    self.loaded = Some(LoadedSpectrum {
                        path: path.clone(),
                        smooth_width: width,
                        spectrum,
                    });
                    self.status_message = None;
                    // A new width only changes the flux under the selection.
                    match self.selection.take() {
                        Some(selection) if same_file => self.apply_selection(selection),
                        _ => self.clear_selection(),
                    }
                }
                Err(e) => {
                    self.loaded = None;
                    self.overlays = None;
                    self.selected = None;
                    self.report(e);
                    return;
                }
            }
        }

        let cutoff = self.settings.cutoff;
        let overlays_stale = self
            .overlays
            .as_ref()
            .map_or(true, |o| o.path != path || o.cutoff != cutoff);
        if overlays_stale {
            let traces = match self.compute_overlays() {
                Ok(traces) => traces,
                Err(e) => {
                    self.report(e);
                    Vec::new()
                }
            };
            self.overlays = Some(OverlayCache {
                path,
                cutoff,
                traces,
            });
        }
    }

    fn compute_overlays(&mut self) -> Result<Vec<StemTrace>> {
        let (Some(loaded), Some(atmosphere)) = (&self.loaded, &self.atmosphere) else {
            return Ok(Vec::new());
        };
        let sp = &loaded.spectrum;
        let conditions = OverlayConditions {
            temperature_c: sp.meta.temperature_c,
            altitude_km: sp.meta.avg_altitude_km(),
            latitude: Some(sp.meta.latitude),
            wavenumber_range: sp.wavenumber_range(),
            cutoff: Some(self.settings.cutoff),
        };
        let mut calc = StrengthCalculator::new(&mut self.lines, &self.partition, atmosphere);
        build_overlays(&mut calc, &conditions).context("computing line overlays")
    }

    // ---- selection → peaks → fit ----

    pub fn clear_selection(&mut self) {
        self.pending_selection.clear();
        self.selection = None;
        self.region = None;
        self.peaks.clear();
        self.peak_rows.clear();
        self.fit = None;
    }

    pub fn apply_selection(&mut self, selection: Selection) {
        let region = match (self.spectrum(), selection.bounds()) {
            (Some(sp), Some(bounds)) => extract(&sp.wavenumber, sp.display_flux(), &bounds),
            _ => return,
        };
        log::info!("Selected {} samples", region.len());
        self.selection = Some(selection);
        self.region = Some(region);
        self.recompute_peaks();
    }

    /// Detect dips in the selected region and reset the peak table.
    pub fn recompute_peaks(&mut self) {
        let Some(region) = &self.region else {
            return;
        };
        self.peaks = find_dips(region, &self.settings.peak_params());
        self.peak_rows = self.peaks.iter().map(PeakRow::from).collect();
        self.refit();
    }

    pub fn refit(&mut self) {
        self.fit = None;
        let Some(region) = &self.region else {
            return;
        };
        if self.peak_rows.is_empty() {
            return;
        }
        match fit_peaks(region, &self.peak_rows, self.settings.baseline) {
            Ok(fit) => {
                self.fit = Some(fit);
                self.status_message = None;
            }
            Err(e) => self.report(anyhow::Error::new(e).context("fitting peaks")),
        }
    }
}

fn load_spectrum(path: &Path, smooth_width: usize) -> Result<ExesSpectrum> {
    let width = (smooth_width > 0).then_some(smooth_width);
    read_exes_file(path, width).with_context(|| format!("reading {}", path.display()))
}
