//! The graph model: axis per place, plot type and adornments.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use plotweave_core::logging::targets;
use plotweave_core::{Property, Signal};

use super::axis::AxisModel;
use super::place::AxisPlace;
use super::plot_type::PlotType;
use crate::data::KELLY_COLORS;
use crate::facet::{Adornment, UpdateCategoriesOptions};

/// Default point fill.
pub const DEFAULT_POINT_COLOR: &str = "#E6805B";
/// Largest point radius.
pub const POINT_RADIUS_MAX: f64 = 10.0;
/// Smallest point radius.
pub const POINT_RADIUS_MIN: f64 = 3.0;
/// Every power of this many points shrinks the radius by one.
pub const POINT_RADIUS_LOG_BASE: usize = 2;

/// Serializable state of a [`GraphModel`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphSnapshot {
    /// Axis per place; places without an axis are absent.
    pub axes: BTreeMap<AxisPlace, AxisModel>,
    /// The plot type.
    pub plot_type: PlotType,
    /// Fill per series; series past the end use the palette.
    pub point_colors: Vec<String>,
}

/// Axes, plot type and adornments of one graph.
pub struct GraphModel {
    axes: RwLock<BTreeMap<AxisPlace, AxisModel>>,
    editing: RwLock<BTreeSet<AxisPlace>>,
    editing_series: RwLock<BTreeSet<String>>,
    plot_type: Property<PlotType>,
    point_colors: RwLock<Vec<String>>,
    adornments: Mutex<Vec<Box<dyn Adornment>>>,
    /// Emitted when the plot type changes.
    pub plot_type_changed: Signal<PlotType>,
    /// Emitted when the axis at a place is set, changed or removed.
    pub axis_changed: Signal<AxisPlace>,
}

impl GraphModel {
    /// A case plot with no axes.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_snapshot(GraphSnapshot::default()))
    }

    /// A model restored from a snapshot.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Arc<Self> {
        Arc::new(Self::with_snapshot(snapshot))
    }

    fn with_snapshot(snapshot: GraphSnapshot) -> Self {
        let point_colors = if snapshot.point_colors.is_empty() {
            vec![DEFAULT_POINT_COLOR.to_string()]
        } else {
            snapshot.point_colors
        };
        Self {
            axes: RwLock::new(snapshot.axes),
            editing: RwLock::new(BTreeSet::new()),
            editing_series: RwLock::new(BTreeSet::new()),
            plot_type: Property::new(snapshot.plot_type),
            point_colors: RwLock::new(point_colors),
            adornments: Mutex::new(Vec::new()),
            plot_type_changed: Signal::new(),
            axis_changed: Signal::new(),
        }
    }

    /// Current state.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            axes: self.axes.read().clone(),
            plot_type: self.plot_type.get(),
            point_colors: self.point_colors.read().clone(),
        }
    }

    // ------------------------------------------------------------------
    // Axes
    // ------------------------------------------------------------------

    /// The axis at `place`.
    pub fn axis(&self, place: AxisPlace) -> Option<AxisModel> {
        self.axes.read().get(&place).cloned()
    }

    /// Every axis.
    pub fn axes(&self) -> BTreeMap<AxisPlace, AxisModel> {
        self.axes.read().clone()
    }

    /// Install `axis` at `place`. Returns whether anything changed.
    pub fn set_axis(&self, place: AxisPlace, axis: AxisModel) -> bool {
        let changed = {
            let mut axes = self.axes.write();
            let changed = axes.get(&place) != Some(&axis);
            axes.insert(place, axis);
            changed
        };
        if changed {
            tracing::debug!(target: targets::AXIS, %place, "axis set");
            self.axis_changed.emit(place);
        }
        changed
    }

    /// Remove the axis at `place`.
    pub fn remove_axis(&self, place: AxisPlace) -> Option<AxisModel> {
        let removed = self.axes.write().remove(&place);
        if removed.is_some() {
            tracing::debug!(target: targets::AXIS, %place, "axis removed");
            self.axis_changed.emit(place);
        }
        removed
    }

    /// Modify the axis at `place` in place. The closure returns whether it
    /// changed anything.
    pub fn update_axis(&self, place: AxisPlace, update: impl FnOnce(&mut AxisModel) -> bool) -> bool {
        let changed = {
            let mut axes = self.axes.write();
            match axes.get_mut(&place) {
                Some(axis) => update(axis),
                None => false,
            }
        };
        if changed {
            self.axis_changed.emit(place);
        }
        changed
    }

    /// Lock or unlock a numeric axis. A locked axis keeps its bounds when
    /// the data changes.
    pub fn set_axis_locked(&self, place: AxisPlace, locked: bool) -> bool {
        self.update_axis(place, |axis| match axis.as_numeric_mut() {
            Some(numeric) if numeric.locked != locked => {
                numeric.locked = locked;
                true
            }
            _ => false,
        })
    }

    /// Whether the axis at `place` is numeric and locked.
    pub fn is_axis_locked(&self, place: AxisPlace) -> bool {
        self.axes
            .read()
            .get(&place)
            .and_then(AxisModel::as_numeric)
            .is_some_and(|n| n.locked)
    }

    /// Mark the axis at `place` as being edited by the user (dragging its
    /// bounds). Edited axes are not rescaled.
    pub fn set_axis_editing(&self, place: AxisPlace, editing: bool) {
        let mut set = self.editing.write();
        if editing {
            set.insert(place);
        } else {
            set.remove(&place);
        }
    }

    /// Whether the axis at `place` is being edited.
    pub fn is_axis_editing(&self, place: AxisPlace) -> bool {
        self.editing.read().contains(&place)
    }

    /// Mark the series plotting `attribute_id` as being edited (its values
    /// dragged in the plot). Axes showing an edited series are not rescaled.
    pub fn set_series_editing(&self, attribute_id: &str, editing: bool) {
        let mut set = self.editing_series.write();
        if editing {
            set.insert(attribute_id.to_string());
        } else {
            set.remove(attribute_id);
        }
    }

    /// Whether the series plotting `attribute_id` is being edited.
    pub fn is_series_editing(&self, attribute_id: &str) -> bool {
        self.editing_series.read().contains(attribute_id)
    }

    /// Whether the axis at `place` draws grid lines.
    pub fn axis_should_show_grid_lines(&self, place: AxisPlace) -> bool {
        self.plot_type() == PlotType::ScatterPlot && place.is_primary()
    }

    // ------------------------------------------------------------------
    // Plot type and appearance
    // ------------------------------------------------------------------

    /// The plot type.
    pub fn plot_type(&self) -> PlotType {
        self.plot_type.get()
    }

    /// Change the plot type. Returns whether it changed.
    pub fn set_plot_type(&self, plot_type: PlotType) -> bool {
        let changed = self.plot_type.set(plot_type);
        if changed {
            tracing::debug!(target: targets::CONTROLLER, %plot_type, "plot type");
            self.plot_type_changed.emit(plot_type);
        }
        changed
    }

    /// Fill of series `plot_index`.
    pub fn point_color_at_index(&self, plot_index: usize) -> String {
        let colors = self.point_colors.read();
        match colors.get(plot_index) {
            Some(color) => color.clone(),
            None => KELLY_COLORS[plot_index % KELLY_COLORS.len()].to_string(),
        }
    }

    /// Set the fill of series `plot_index`. Gaps are filled from the palette.
    pub fn set_point_color(&self, color: impl Into<String>, plot_index: usize) {
        let mut colors = self.point_colors.write();
        while colors.len() <= plot_index {
            let next = colors.len();
            colors.push(KELLY_COLORS[next % KELLY_COLORS.len()].to_string());
        }
        colors[plot_index] = color.into();
    }

    /// Point radius for `point_count` points: shrinks by one per power of
    /// the log base, down to the minimum.
    pub fn point_radius(point_count: usize) -> f64 {
        let mut radius = POINT_RADIUS_MAX;
        let mut threshold = POINT_RADIUS_LOG_BASE;
        while threshold <= point_count {
            radius -= 1.0;
            if radius <= POINT_RADIUS_MIN {
                break;
            }
            threshold = threshold.saturating_mul(POINT_RADIUS_LOG_BASE);
        }
        radius
    }

    // ------------------------------------------------------------------
    // Adornments
    // ------------------------------------------------------------------

    /// Show an adornment. If one of the same type exists it is made visible
    /// and `adornment` is dropped.
    pub fn show_adornment(&self, adornment: Box<dyn Adornment>) {
        let mut adornments = self.adornments.lock();
        match adornments
            .iter_mut()
            .find(|a| a.adornment_type() == adornment.adornment_type())
        {
            Some(existing) => existing.set_visibility(true),
            None => adornments.push(adornment),
        }
    }

    /// Hide the adornment of the given type.
    pub fn hide_adornment(&self, adornment_type: &str) {
        if let Some(existing) = self
            .adornments
            .lock()
            .iter_mut()
            .find(|a| a.adornment_type() == adornment_type)
        {
            existing.set_visibility(false);
        }
    }

    /// Number of adornments.
    pub fn adornment_count(&self) -> usize {
        self.adornments.lock().len()
    }

    /// Run `f` on every adornment.
    pub fn with_adornments<R>(&self, f: impl FnOnce(&mut [Box<dyn Adornment>]) -> R) -> R {
        f(&mut self.adornments.lock())
    }

    /// Push category options to every adornment.
    pub fn update_adornments(&self, options: &UpdateCategoriesOptions) {
        for adornment in self.adornments.lock().iter_mut() {
            adornment.update_categories(options);
        }
    }
}

impl std::fmt::Debug for GraphModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphModel")
            .field("plot_type", &self.plot_type())
            .field("axes", &*self.axes.read())
            .field("adornments", &self.adornment_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphModel: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::{MOVABLE_LINE_TYPE, MovableLineAdornment};
    use crate::graph::NumericAxis;

    #[test]
    fn test_set_axis_emits_on_change() {
        let graph = GraphModel::new();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let c = changes.clone();
        graph.axis_changed.connect(move |place| c.lock().push(*place));

        assert!(graph.set_axis(AxisPlace::Left, AxisModel::numeric()));
        assert!(!graph.set_axis(AxisPlace::Left, AxisModel::numeric()));
        assert!(graph.remove_axis(AxisPlace::Left).is_some());
        assert!(graph.remove_axis(AxisPlace::Left).is_none());
        assert_eq!(*changes.lock(), vec![AxisPlace::Left, AxisPlace::Left]);
    }

    #[test]
    fn test_plot_type_setter() {
        let graph = GraphModel::new();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let f = fired.clone();
        graph.plot_type_changed.connect(move |t| f.lock().push(*t));
        assert!(!graph.set_plot_type(PlotType::CasePlot));
        assert!(graph.set_plot_type(PlotType::ScatterPlot));
        assert_eq!(*fired.lock(), vec![PlotType::ScatterPlot]);
        assert!(graph.axis_should_show_grid_lines(AxisPlace::Bottom));
        assert!(!graph.axis_should_show_grid_lines(AxisPlace::Top));
    }

    #[test]
    fn test_lock_and_edit() {
        let graph = GraphModel::new();
        graph.set_axis(AxisPlace::Bottom, AxisModel::Numeric(NumericAxis::new(0.0, 5.0)));
        assert!(graph.set_axis_locked(AxisPlace::Bottom, true));
        assert!(!graph.set_axis_locked(AxisPlace::Bottom, true));
        assert!(graph.is_axis_locked(AxisPlace::Bottom));
        assert!(!graph.set_axis_locked(AxisPlace::Top, true));

        graph.set_axis_editing(AxisPlace::Left, true);
        assert!(graph.is_axis_editing(AxisPlace::Left));
        graph.set_axis_editing(AxisPlace::Left, false);
        assert!(!graph.is_axis_editing(AxisPlace::Left));

        graph.set_series_editing("height", true);
        assert!(graph.is_series_editing("height"));
        assert!(!graph.is_series_editing("weight"));
        graph.set_series_editing("height", false);
        assert!(!graph.is_series_editing("height"));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let graph = GraphModel::new();
        graph.set_axis(AxisPlace::Left, AxisModel::categorical());
        graph.set_plot_type(PlotType::DotChart);
        let json = serde_json::to_value(graph.snapshot()).unwrap();
        assert_eq!(json["plotType"], "dotChart");
        assert_eq!(json["axes"]["left"]["type"], "categorical");
        let restored = GraphModel::from_snapshot(serde_json::from_value(json).unwrap());
        assert_eq!(restored.plot_type(), PlotType::DotChart);
        assert_eq!(restored.axis(AxisPlace::Left), Some(AxisModel::categorical()));
    }

    #[test]
    fn test_point_colors() {
        let graph = GraphModel::new();
        assert_eq!(graph.point_color_at_index(0), DEFAULT_POINT_COLOR);
        assert_eq!(graph.point_color_at_index(1), KELLY_COLORS[1]);
        graph.set_point_color("#000000", 2);
        assert_eq!(graph.point_color_at_index(2), "#000000");
        assert_eq!(graph.point_color_at_index(1), KELLY_COLORS[1]);
    }

    #[test]
    fn test_point_radius() {
        assert_eq!(GraphModel::point_radius(0), POINT_RADIUS_MAX);
        assert_eq!(GraphModel::point_radius(1), POINT_RADIUS_MAX);
        assert_eq!(GraphModel::point_radius(2), POINT_RADIUS_MAX - 1.0);
        assert_eq!(GraphModel::point_radius(5), POINT_RADIUS_MAX - 2.0);
        assert_eq!(GraphModel::point_radius(1_000_000), POINT_RADIUS_MIN);
    }

    #[test]
    fn test_adornment_visibility() {
        let graph = GraphModel::new();
        graph.show_adornment(Box::new(MovableLineAdornment::new()));
        graph.show_adornment(Box::new(MovableLineAdornment::new()));
        assert_eq!(graph.adornment_count(), 1);
        graph.hide_adornment(MOVABLE_LINE_TYPE);
        assert!(graph.with_adornments(|a| !a[0].is_visible()));
        graph.show_adornment(Box::new(MovableLineAdornment::new()));
        assert!(graph.with_adornments(|a| a[0].is_visible()));
    }
}
