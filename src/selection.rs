//! View state and gesture-driven selection.
//!
//! All mutable view state lives in [`ViewState`], which is threaded through
//! [`ViewState::apply`] one event at a time. Geometry changes always rebuild
//! in the same order: re-project, rebuild the spatial grid, re-bin any
//! histogram posterior, then recompute a posterior selection. Hit tests never
//! see stale geometry.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::{Filters, ProjectedPoint, Sample, SkyPoint, project_all};
use crate::config::ViewConfig;
use crate::credible::{self, HealpixMap, HistogramPosterior, Posterior};
use crate::export::{DensityHistogram, GalaxyHistograms};
use crate::geom::{Frame, Projector, polygon};
use crate::grid::SpatialGrid;

/// Histogram ranges for galaxy distance (Mpc) and log stellar mass.
const DIST_RANGE: (f64, f64) = (0.0, 500.0);
const MASS_RANGE: (f64, f64) = (6.0, 10.5);

/// How pointer gestures are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Freehand path while dragging.
    #[default]
    Lasso,
    /// Click-to-vertex polygon.
    Polygon,
    /// Magnifier lens: clicks focus a point, drags select nothing.
    Magnify,
    /// Selection follows the active credible region.
    Posterior,
}

/// One discrete input to the view.
#[derive(Debug, Clone)]
pub enum ViewEvent {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    DoubleClick,
    SetMode(Mode),
    SetCredibleLevel(f64),
    SetFrame(Frame),
    SetCenter(f64),
    Resize { width: f64, height: f64 },
    LoadGalaxies(Vec<SkyPoint>),
    LoadPulsars(Vec<SkyPoint>),
    ActivateMap(HealpixMap),
    ActivateSamples(Vec<Sample>),
    ClearPosterior,
    SetFilters(Filters),
    ClearSelection,
    Search(String),
}

#[derive(Debug, Clone)]
pub struct ViewState {
    config: ViewConfig,
    projector: Projector,
    frame: Frame,
    center_lon: f64,
    galaxies: Vec<SkyPoint>,
    pulsars: Vec<SkyPoint>,
    /// Galaxies followed by pulsars; indexes of `projected` point here.
    points: Vec<SkyPoint>,
    projected: Vec<ProjectedPoint>,
    grid: SpatialGrid,
    posterior: Option<Posterior>,
    credible_level: f64,
    filters: Filters,
    mode: Mode,
    path: Vec<(f64, f64)>,
    drawing: bool,
    selection: BTreeSet<String>,
    focused: Option<String>,
}

impl ViewState {
    pub fn new(config: ViewConfig) -> Self {
        let frame = Frame::default();
        let mut state = Self {
            projector: config.projector(),
            frame,
            center_lon: frame.default_center(),
            galaxies: Vec::new(),
            pulsars: Vec::new(),
            points: Vec::new(),
            projected: Vec::new(),
            grid: SpatialGrid::default(),
            posterior: None,
            credible_level: config.credible_level,
            filters: config.filters,
            mode: Mode::default(),
            path: Vec::new(),
            drawing: false,
            selection: BTreeSet::new(),
            focused: None,
            config,
        };
        state.relayout();
        state
    }

    /// Consume one event and return the updated state.
    pub fn apply(mut self, event: ViewEvent) -> Self {
        self.handle(event);
        self
    }

    fn handle(&mut self, event: ViewEvent) {
        match event {
            ViewEvent::PointerDown { x, y } => self.pointer_down(x, y),
            ViewEvent::PointerMove { x, y } => {
                if self.drawing && self.mode == Mode::Lasso {
                    self.path.push((x, y));
                }
            }
            ViewEvent::PointerUp { x, y } => self.pointer_up(x, y),
            ViewEvent::DoubleClick => {
                if self.mode == Mode::Polygon && self.drawing {
                    self.drawing = false;
                    self.select_inside_path();
                }
            }
            ViewEvent::SetMode(mode) => self.set_mode(mode),
            ViewEvent::SetCredibleLevel(level) => {
                self.credible_level = level.clamp(0.0, 1.0);
                self.refresh_posterior_selection();
            }
            ViewEvent::SetFrame(frame) => {
                self.frame = frame;
                self.center_lon = frame.default_center();
                self.relayout();
            }
            ViewEvent::SetCenter(lon) => {
                self.center_lon = lon;
                self.relayout();
            }
            ViewEvent::Resize { width, height } => {
                self.config.width = width;
                self.config.height = height;
                self.relayout();
            }
            ViewEvent::LoadGalaxies(galaxies) => {
                self.galaxies = galaxies;
                self.reload_points();
            }
            ViewEvent::LoadPulsars(pulsars) => {
                self.pulsars = pulsars;
                self.reload_points();
            }
            ViewEvent::ActivateMap(map) => {
                self.posterior = Some(Posterior::Healpix(map));
                self.refresh_posterior_selection();
            }
            ViewEvent::ActivateSamples(samples) => {
                let hist = HistogramPosterior::build(
                    samples,
                    &self.projector,
                    self.frame,
                    self.center_lon,
                    self.config.histogram_resolution,
                );
                self.posterior = Some(Posterior::Histogram(hist));
                self.refresh_posterior_selection();
            }
            ViewEvent::ClearPosterior => {
                self.posterior = None;
                self.refresh_posterior_selection();
            }
            ViewEvent::SetFilters(filters) => {
                self.filters = filters;
                self.refresh_posterior_selection();
            }
            ViewEvent::ClearSelection => {
                self.selection.clear();
                self.focused = None;
                self.path.clear();
                self.drawing = false;
            }
            ViewEvent::Search(query) => self.search(&query),
        }
    }

    fn pointer_down(&mut self, x: f64, y: f64) {
        match self.mode {
            Mode::Magnify => {
                let radius = self.config.lens_pick_radius();
                self.focused = self
                    .nearest_visible(x, y, radius)
                    .map(|i| self.points[self.projected[i].index].id.clone());
            }
            Mode::Posterior => {}
            Mode::Polygon if self.drawing => self.path.push((x, y)),
            Mode::Polygon | Mode::Lasso => {
                self.drawing = true;
                self.path = vec![(x, y)];
                self.selection.clear();
                self.focused = None;
            }
        }
    }

    fn pointer_up(&mut self, x: f64, y: f64) {
        if !self.drawing {
            return;
        }
        match self.mode {
            Mode::Lasso => {
                self.drawing = false;
                if self.path.len() < self.config.lasso_min_vertices {
                    self.pick_at_path_start();
                } else {
                    self.select_inside_path();
                }
            }
            Mode::Polygon => {
                let (x0, y0) = self.path[0];
                let near_start = (x - x0).hypot(y - y0) < self.config.polygon_close_radius;
                if self.path.len() > 2 && near_start {
                    self.drawing = false;
                    self.select_inside_path();
                }
            }
            Mode::Magnify | Mode::Posterior => {}
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.path.clear();
        self.drawing = false;
        self.selection.clear();
        self.focused = None;
        self.refresh_posterior_selection();
    }

    /// Treat a short lasso as a click on the nearest point.
    fn pick_at_path_start(&mut self) {
        let (x, y) = self.path[0];
        self.path.clear();
        self.selection.clear();
        self.focused = None;

        let radius = self.config.pick_radius;
        let show_pulsars = self.filters.show_pulsars;
        let hit = self.grid.nearest_where(&self.projected, x, y, radius, |p| {
            show_pulsars || !self.points[p.index].is_pulsar()
        });
        if let Some(hit) = hit {
            let id = self.points[self.projected[hit.index].index].id.clone();
            self.selection.insert(id.clone());
            self.focused = Some(id);
        }
    }

    /// Select every shown point strictly inside the current path.
    fn select_inside_path(&mut self) {
        let path = std::mem::take(&mut self.path);
        self.selection.clear();
        for p in &self.projected {
            let point = &self.points[p.index];
            if point.is_pulsar() && !self.filters.show_pulsars {
                continue;
            }
            if polygon::contains(&path, p.x, p.y) {
                self.selection.insert(point.id.clone());
            }
        }

        self.focused = if self.selection.len() == 1 {
            self.selection.first().cloned()
        } else {
            None
        };
        log::debug!(
            "region selection: {} vertices, {} points",
            path.len(),
            self.selection.len()
        );
    }

    fn search(&mut self, query: &str) {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return;
        }
        let Some(found) = self
            .points
            .iter()
            .find(|p| p.id.to_lowercase().contains(&needle))
        else {
            log::info!("search: no match for '{query}'");
            return;
        };

        let id = found.id.clone();
        if self.frame == Frame::Equatorial {
            self.center_lon = found.ra;
            self.relayout();
        }
        self.selection.clear();
        self.selection.insert(id.clone());
        self.focused = Some(id);
    }

    fn reload_points(&mut self) {
        self.points = self
            .galaxies
            .iter()
            .chain(self.pulsars.iter())
            .cloned()
            .collect();
        self.selection.clear();
        self.focused = None;
        self.path.clear();
        self.drawing = false;
        self.relayout();
    }

    /// Rebuild all derived geometry. Order matters: projection, grid,
    /// histogram posterior, posterior selection.
    fn relayout(&mut self) {
        self.projector = self.config.projector();
        self.projected = project_all(&self.points, &self.projector, self.frame, self.center_lon);
        self.grid = SpatialGrid::build(
            &self.projected,
            self.config.width,
            self.config.height,
            self.config.grid_cell,
        );
        self.posterior = match self.posterior.take() {
            Some(Posterior::Histogram(hist)) => Some(Posterior::Histogram(hist.rebuild(
                &self.projector,
                self.frame,
                self.center_lon,
            ))),
            other => other,
        };
        log::debug!(
            "relayout: {} points, frame {:?}, centre {:.3}",
            self.projected.len(),
            self.frame,
            self.center_lon
        );
        self.refresh_posterior_selection();
    }

    /// In posterior mode, select every visible point inside the credible region.
    fn refresh_posterior_selection(&mut self) {
        if self.mode != Mode::Posterior {
            return;
        }
        self.selection.clear();
        let Some(posterior) = &self.posterior else {
            return;
        };

        let threshold = posterior.threshold(self.credible_level);
        for p in &self.projected {
            let point = &self.points[p.index];
            if !self.filters.accepts(point) {
                continue;
            }
            let prob = posterior.probability_for(point.ra, point.dec, p.x, p.y);
            if prob.is_some_and(|prob| credible::contains(prob, threshold)) {
                self.selection.insert(point.id.clone());
            }
        }
    }

    fn nearest_visible(&self, x: f64, y: f64, radius: f64) -> Option<usize> {
        self.grid
            .nearest_where(&self.projected, x, y, radius, |p| {
                self.filters.accepts(&self.points[p.index])
            })
            .map(|hit| hit.index)
    }

    /// Point under the cursor for tooltips, if any, within the pick radius.
    pub fn hover(&self, x: f64, y: f64) -> Option<&SkyPoint> {
        if self.drawing {
            return None;
        }
        self.nearest_visible(x, y, self.config.pick_radius)
            .map(|i| &self.points[self.projected[i].index])
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn center_lon(&self) -> f64 {
        self.center_lon
    }

    pub fn credible_level(&self) -> f64 {
        self.credible_level
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn points(&self) -> &[SkyPoint] {
        &self.points
    }

    pub fn projected(&self) -> &[ProjectedPoint] {
        &self.projected
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn posterior(&self) -> Option<&Posterior> {
        self.posterior.as_ref()
    }

    /// Probability threshold of the active credible region.
    pub fn credible_threshold(&self) -> Option<f64> {
        self.posterior
            .as_ref()
            .map(|p| p.threshold(self.credible_level))
    }

    /// Vertices of the gesture in progress.
    pub fn path(&self) -> &[(f64, f64)] {
        &self.path
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    /// Point shown in the inspector: a single pick, a lone selection or a
    /// magnifier click.
    pub fn focused(&self) -> Option<&SkyPoint> {
        let id = self.focused.as_deref()?;
        self.points.iter().find(|p| p.id == id)
    }

    /// Selected points in catalog order.
    pub fn selected_points(&self) -> Vec<&SkyPoint> {
        self.points
            .iter()
            .filter(|p| self.selection.contains(&p.id))
            .collect()
    }

    /// Projected points that pass the current filters.
    pub fn visible(&self) -> impl Iterator<Item = &ProjectedPoint> {
        self.projected
            .iter()
            .filter(|p| self.filters.accepts(&self.points[p.index]))
    }

    /// Distance and mass densities of visible galaxies, overall and selected.
    pub fn galaxy_histograms(&self, bins: usize) -> GalaxyHistograms {
        let galaxies: Vec<&SkyPoint> = self
            .visible()
            .map(|p| &self.points[p.index])
            .filter(|p| !p.is_pulsar())
            .collect();
        let selected: Vec<&SkyPoint> = galaxies
            .iter()
            .copied()
            .filter(|p| self.selection.contains(&p.id))
            .collect();

        let dist = |set: &[&SkyPoint]| {
            DensityHistogram::compute(set.iter().map(|p| p.dist()), DIST_RANGE.0, DIST_RANGE.1, bins)
        };
        let mass = |set: &[&SkyPoint]| {
            DensityHistogram::compute(set.iter().map(|p| p.mass()), MASS_RANGE.0, MASS_RANGE.1, bins)
        };

        GalaxyHistograms {
            dist_all: dist(&galaxies),
            dist_selected: dist(&selected),
            mass_all: mass(&galaxies),
            mass_selected: mass(&selected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(points: Vec<SkyPoint>) -> ViewState {
        ViewState::new(ViewConfig::default()).apply(ViewEvent::LoadGalaxies(points))
    }

    /// Galaxy placed at the screen position of (ra, dec) under default view.
    fn galaxy(id: &str, ra: f64, dec: f64) -> SkyPoint {
        SkyPoint::galaxy(id, ra, dec, 100.0, 8.0)
    }

    fn drag(mut state: ViewState, path: &[(f64, f64)]) -> ViewState {
        let (x0, y0) = path[0];
        state = state.apply(ViewEvent::PointerDown { x: x0, y: y0 });
        for &(x, y) in &path[1..] {
            state = state.apply(ViewEvent::PointerMove { x, y });
        }
        let (xn, yn) = *path.last().unwrap();
        state.apply(ViewEvent::PointerUp { x: xn, y: yn })
    }

    fn square(cx: f64, cy: f64, half: f64) -> Vec<(f64, f64)> {
        vec![
            (cx - half, cy - half),
            (cx + half, cy - half),
            (cx + half, cy + half),
            (cx - half, cy + half),
            (cx - half, cy - half + 1.0),
        ]
    }

    #[test]
    fn lasso_selects_points_inside() {
        let state = state_with(vec![galaxy("centre", 180.0, 0.0), galaxy("far", 90.0, 40.0)]);
        let state = drag(state, &square(400.0, 200.0, 30.0));
        assert_eq!(state.selection().len(), 1);
        assert!(state.selection().contains("centre"));
        assert_eq!(state.focused().unwrap().id, "centre");
        assert!(!state.is_drawing());
    }

    #[test]
    fn short_lasso_is_a_click() {
        let state = state_with(vec![galaxy("centre", 180.0, 0.0)]);
        let state = drag(state, &[(405.0, 203.0), (406.0, 203.0)]);
        assert!(state.selection().contains("centre"));

        let state = drag(state, &[(450.0, 250.0)]);
        assert!(state.selection().is_empty());
        assert!(state.focused().is_none());
    }

    #[test]
    fn gestures_on_empty_catalog() {
        let state = ViewState::new(ViewConfig::default());
        let state = drag(state, &square(400.0, 200.0, 100.0));
        assert!(state.selection().is_empty());
        let state = drag(state, &[(1.0, 1.0)]);
        assert!(state.selection().is_empty());
    }

    #[test]
    fn polygon_closes_near_start() {
        let mut state =
            state_with(vec![galaxy("centre", 180.0, 0.0)]).apply(ViewEvent::SetMode(Mode::Polygon));
        for &(x, y) in &[(370.0, 170.0), (430.0, 170.0), (430.0, 230.0), (370.0, 230.0)] {
            state = state
                .apply(ViewEvent::PointerDown { x, y })
                .apply(ViewEvent::PointerUp { x, y });
            assert!(state.is_drawing());
        }
        state = state
            .apply(ViewEvent::PointerDown { x: 372.0, y: 172.0 })
            .apply(ViewEvent::PointerUp { x: 372.0, y: 172.0 });
        assert!(!state.is_drawing());
        assert!(state.selection().contains("centre"));
    }

    #[test]
    fn polygon_double_click_closes() {
        let mut state =
            state_with(vec![galaxy("centre", 180.0, 0.0)]).apply(ViewEvent::SetMode(Mode::Polygon));
        for &(x, y) in &[(370.0, 170.0), (430.0, 170.0), (400.0, 240.0)] {
            state = state
                .apply(ViewEvent::PointerDown { x, y })
                .apply(ViewEvent::PointerUp { x, y });
        }
        state = state.apply(ViewEvent::DoubleClick);
        assert!(!state.is_drawing());
        assert!(state.selection().contains("centre"));
    }

    #[test]
    fn magnify_focuses_without_selecting() {
        let state = state_with(vec![galaxy("centre", 180.0, 0.0)])
            .apply(ViewEvent::SetMode(Mode::Magnify))
            .apply(ViewEvent::PointerDown { x: 420.0, y: 200.0 });
        assert_eq!(state.focused().unwrap().id, "centre");
        assert!(state.selection().is_empty());

        let state = state.apply(ViewEvent::PointerDown { x: 430.0, y: 200.0 });
        assert!(state.focused().is_none());
    }

    #[test]
    fn hidden_pulsars_are_not_selected() {
        let state = ViewState::new(ViewConfig::default())
            .apply(ViewEvent::LoadPulsars(vec![SkyPoint::pulsar("psr", 180.0, 0.0, 1.0)]))
            .apply(ViewEvent::SetFilters(Filters {
                show_pulsars: false,
                ..Filters::default()
            }));
        let state = drag(state, &square(400.0, 200.0, 30.0));
        assert!(state.selection().is_empty());
    }

    #[test]
    fn degenerate_config_degrades_without_panicking() {
        let config: ViewConfig =
            serde_json::from_str(r#"{"grid_cell": 0, "histogram_resolution": 0}"#).unwrap();
        let state = ViewState::new(config)
            .apply(ViewEvent::LoadGalaxies(vec![galaxy("centre", 180.0, 0.0)]))
            .apply(ViewEvent::ActivateSamples(vec![Sample { ra: 180.0, dec: 0.0 }]))
            .apply(ViewEvent::SetMode(Mode::Posterior));
        assert!(state.grid().is_empty());
        assert!(state.hover(400.0, 200.0).is_none());
        assert!(state.selection().is_empty());

        let config = ViewConfig {
            lens_zoom: 1e-300,
            ..ViewConfig::default()
        };
        let state = ViewState::new(config)
            .apply(ViewEvent::LoadGalaxies(vec![galaxy("centre", 180.0, 0.0)]))
            .apply(ViewEvent::SetMode(Mode::Magnify))
            .apply(ViewEvent::PointerDown { x: 700.0, y: 50.0 });
        assert_eq!(state.focused().unwrap().id, "centre");
    }

    #[test]
    fn search_recentres_in_equatorial_frame() {
        let state = state_with(vec![galaxy("NGC4486", 187.7, 12.4)])
            .apply(ViewEvent::Search("ngc44".into()));
        assert_eq!(state.center_lon(), 187.7);
        assert!(state.selection().contains("NGC4486"));
        assert_eq!(state.projected()[0].x, 400.0);
    }

    #[test]
    fn search_miss_changes_nothing() {
        let state = state_with(vec![galaxy("a", 10.0, 0.0)]).apply(ViewEvent::Search("zzz".into()));
        assert_eq!(state.center_lon(), 180.0);
        assert!(state.selection().is_empty());
    }

    #[test]
    fn frame_switch_recentres_and_reprojects() {
        let state = state_with(vec![galaxy("a", 10.0, 20.0)]).apply(ViewEvent::SetFrame(Frame::Galactic));
        assert_eq!(state.center_lon(), 0.0);
        let (l, b) = crate::geom::equatorial_to_galactic(10.0, 20.0);
        assert_eq!((state.projected()[0].lon, state.projected()[0].lat), (l, b));
    }

    #[test]
    fn resize_rebuilds_grid() {
        let state = state_with(vec![galaxy("a", 180.0, 0.0)]).apply(ViewEvent::Resize {
            width: 1000.0,
            height: 500.0,
        });
        assert_eq!(state.grid().dims(), (50, 25));
        assert_eq!((state.projected()[0].x, state.projected()[0].y), (500.0, 250.0));
        assert!(!state.grid().query(500.0, 250.0, 1.0).is_empty());
    }

    #[test]
    fn posterior_mode_follows_level_and_map() {
        let inside = crate::healpix::pix2radec_ring(4, 100);
        let mut probs = vec![0.0; 192];
        probs[100] = 0.6;
        probs[0] = 0.4;
        let north = crate::healpix::pix2radec_ring(4, 0);
        let map = HealpixMap::from_dense(probs).unwrap();

        let state = state_with(vec![galaxy("in", inside.0, inside.1), galaxy("north", north.0, north.1)])
            .apply(ViewEvent::SetMode(Mode::Posterior));
        assert!(state.selection().is_empty());

        let state = state.apply(ViewEvent::ActivateMap(map));
        assert_eq!(state.credible_threshold(), Some(0.4));
        assert_eq!(state.selection().len(), 2);

        let state = state.apply(ViewEvent::SetCredibleLevel(0.5));
        assert_eq!(state.credible_threshold(), Some(0.6));
        assert_eq!(state.selection().iter().collect::<Vec<_>>(), vec!["in"]);

        // Gestures are ignored in posterior mode.
        let state = drag(state, &square(400.0, 200.0, 300.0));
        assert_eq!(state.selection().len(), 1);

        let state = state.apply(ViewEvent::ClearPosterior);
        assert!(state.selection().is_empty());
    }

    #[test]
    fn samples_replace_healpix_map() {
        let mut probs = vec![0.0; 12];
        probs[0] = 1.0;
        let state = state_with(vec![galaxy("centre", 180.0, 0.0)])
            .apply(ViewEvent::ActivateMap(HealpixMap::from_dense(probs).unwrap()))
            .apply(ViewEvent::ActivateSamples(vec![Sample { ra: 180.0, dec: 0.0 }]))
            .apply(ViewEvent::SetMode(Mode::Posterior));
        assert!(matches!(state.posterior(), Some(Posterior::Histogram(_))));
        assert!(state.selection().contains("centre"));
    }

    #[test]
    fn histograms_split_selected() {
        let state = state_with(vec![
            SkyPoint::galaxy("a", 180.0, 0.0, 50.0, 9.0),
            SkyPoint::galaxy("b", 90.0, 0.0, 450.0, 7.0),
        ]);
        let state = drag(state, &square(400.0, 200.0, 30.0));
        let h = state.galaxy_histograms(10);
        assert_eq!(h.dist_all.counts.iter().sum::<usize>(), 2);
        assert_eq!(h.dist_selected.counts.iter().sum::<usize>(), 1);
        assert_eq!(h.mass_selected.counts[6], 1);
    }
}
