//! The graph controller.
//!
//! The controller is the only place that reacts to binding changes. When an
//! attribute is assigned to a place it
//!
//! 1. picks the primary role and the plot type from the x and y types,
//! 2. brings every axis model in line with its role's attribute type
//!    (creating, replacing or removing models and rescaling numeric axes),
//! 3. pushes domains and categories into the layout's scales,
//! 4. lets adornments create state for new facet cells,
//! 5. requests a debounced point refresh.
//!
//! Layout, scale, axis, plot type and case membership changes also request
//! the refresh. Bursts of requests within one event loop turn collapse into
//! a single run of the refresh on the next turn.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use plotweave_core::logging::{span_names, targets};
use plotweave_core::{ConnectionGuard, Debouncer, EventLoop, PerfSpan, Signal};

use super::axis::{AxisModel, NumericAxis};
use super::layout::GraphLayout;
use super::model::GraphModel;
use super::nice::set_nice_domain;
use super::place::{AxisPlace, GraphPlace};
use super::plot_type::PlotType;
use super::scale::ScaleType;
use crate::config::GraphConfig;
use crate::data::{AttributeAssignment, AttributeBinding, AttributeType, CasesChanged, DataConfiguration, Role};
use crate::error::Result;
use crate::facet::UpdateCategoriesOptions;

/// The place whose display a role change affects.
fn place_for_role(role: Role) -> Option<GraphPlace> {
    match role {
        Role::X => Some(GraphPlace::Bottom),
        Role::Y => Some(GraphPlace::Left),
        Role::YPlus => Some(GraphPlace::YPlus),
        Role::RightNumeric => Some(GraphPlace::RightNumeric),
        Role::TopSplit => Some(GraphPlace::Top),
        Role::RightSplit => Some(GraphPlace::RightCat),
        Role::Legend => Some(GraphPlace::Legend),
        Role::Caption => None,
    }
}

fn scale_type_for(axis: &AxisModel) -> ScaleType {
    match axis {
        AxisModel::Empty => ScaleType::Ordinal,
        AxisModel::Categorical { .. } => ScaleType::Band,
        AxisModel::Numeric(_) => ScaleType::Linear,
    }
}

struct Subscriptions {
    _attributes: ConnectionGuard<AttributeAssignment>,
    _cases: ConnectionGuard<CasesChanged>,
    _bounds: ConnectionGuard<()>,
    _scales: ConnectionGuard<AxisPlace>,
    _axes: ConnectionGuard<AxisPlace>,
    _plot_type: ConnectionGuard<PlotType>,
}

/// Keeps a [`GraphModel`] and [`GraphLayout`] consistent with a
/// [`DataConfiguration`].
pub struct GraphController {
    self_ref: Weak<GraphController>,
    graph: Arc<GraphModel>,
    layout: Arc<GraphLayout>,
    data: Arc<DataConfiguration>,
    config: GraphConfig,
    refresh: Debouncer,
    points_refreshed: Arc<Signal<()>>,
    assigning: AtomicBool,
    subscriptions: Mutex<Option<Subscriptions>>,
    category_watchers: Mutex<BTreeMap<AxisPlace, ConnectionGuard<()>>>,
}

impl GraphController {
    /// Wire a controller to existing models and bring the graph in line
    /// with the current bindings.
    pub fn new(
        graph: Arc<GraphModel>,
        layout: Arc<GraphLayout>,
        data: Arc<DataConfiguration>,
        event_loop: &Arc<EventLoop>,
        config: GraphConfig,
    ) -> Arc<Self> {
        let points_refreshed = Arc::new(Signal::new());
        let refresh = {
            let data = Arc::downgrade(&data);
            let refreshed = Arc::clone(&points_refreshed);
            Debouncer::new("points", event_loop, move || {
                if let Some(data) = data.upgrade() {
                    data.set_points_need_updating(false);
                }
                tracing::trace!(target: targets::CONTROLLER, "points refreshed");
                refreshed.emit(());
            })
        };

        let controller = Arc::new_cyclic(|weak: &Weak<GraphController>| {
            let subscriptions = Subscriptions {
                _attributes: data.signals().attributes_changed.connect_scoped({
                    let weak = weak.clone();
                    move |assignment: &AttributeAssignment| {
                        if let Some(controller) = weak.upgrade() {
                            controller.on_attributes_changed(assignment);
                        }
                    }
                }),
                _cases: data.signals().cases_changed.connect_scoped({
                    let weak = weak.clone();
                    move |_: &CasesChanged| {
                        if let Some(controller) = weak.upgrade() {
                            controller.on_cases_changed();
                        }
                    }
                }),
                _bounds: layout.bounds_changed.connect_scoped({
                    let weak = weak.clone();
                    move |_: &()| {
                        if let Some(controller) = weak.upgrade() {
                            controller.schedule_refresh();
                        }
                    }
                }),
                _scales: layout.scale_changed.connect_scoped({
                    let weak = weak.clone();
                    move |_: &AxisPlace| {
                        if let Some(controller) = weak.upgrade() {
                            controller.schedule_refresh();
                        }
                    }
                }),
                _axes: graph.axis_changed.connect_scoped({
                    let weak = weak.clone();
                    move |_: &AxisPlace| {
                        if let Some(controller) = weak.upgrade() {
                            controller.schedule_refresh();
                        }
                    }
                }),
                _plot_type: graph.plot_type_changed.connect_scoped({
                    let weak = weak.clone();
                    move |_: &PlotType| {
                        if let Some(controller) = weak.upgrade() {
                            controller.schedule_refresh();
                        }
                    }
                }),
            };
            GraphController {
                self_ref: weak.clone(),
                graph,
                layout,
                data,
                config,
                refresh,
                points_refreshed,
                assigning: AtomicBool::new(false),
                subscriptions: Mutex::new(Some(subscriptions)),
                category_watchers: Mutex::new(BTreeMap::new()),
            }
        });
        controller.initialize_graph();
        controller
    }

    /// A controller over a fresh graph model and a layout built from
    /// `config`.
    pub fn from_config(data: Arc<DataConfiguration>, event_loop: &Arc<EventLoop>, config: GraphConfig) -> Arc<Self> {
        let layout = Arc::new(GraphLayout::new(config.layout.clone()));
        Self::new(GraphModel::new(), layout, data, event_loop, config)
    }

    /// The graph model.
    pub fn graph(&self) -> &Arc<GraphModel> {
        &self.graph
    }

    /// The layout.
    pub fn layout(&self) -> &Arc<GraphLayout> {
        &self.layout
    }

    /// The data configuration.
    pub fn data(&self) -> &Arc<DataConfiguration> {
        &self.data
    }

    /// The settings.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Emitted when the debounced point refresh runs.
    pub fn points_refreshed(&self) -> &Signal<()> {
        &self.points_refreshed
    }

    // ------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------

    /// Request a point refresh on the next event loop turn.
    pub fn request_refresh(&self) -> Result<bool> {
        Ok(self.refresh.request()?)
    }

    fn schedule_refresh(&self) {
        if let Err(err) = self.refresh.request() {
            tracing::warn!(target: targets::CONTROLLER, %err, "point refresh not scheduled");
        }
    }

    /// Whether a point refresh is pending.
    pub fn is_refresh_pending(&self) -> bool {
        self.refresh.is_pending()
    }

    /// Drop a pending point refresh.
    pub fn cancel_refresh(&self) -> bool {
        self.refresh.cancel()
    }

    /// Run a pending point refresh now.
    pub fn flush_refresh(&self) -> Result<()> {
        Ok(self.refresh.flush()?)
    }

    /// How many times the point refresh has run.
    pub fn refresh_count(&self) -> u64 {
        self.refresh.flush_count()
    }

    // ------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------

    /// Bring the graph in line with bindings made before the controller
    /// existed, then push every axis into its layout scale.
    pub fn initialize_graph(&self) {
        let bound_axis_roles = AxisPlace::ALL
            .iter()
            .any(|place| self.data.attribute_id(place.role()).is_some());
        if self.graph.axes().is_empty() && (bound_axis_roles || self.config.empty_plot_is_numeric) {
            self.assign_primary_role_and_plot_type(Role::X);
            for place in AxisPlace::ALL {
                self.setup_axis(place);
            }
        }

        for (place, axis) in self.graph.axes() {
            self.layout.set_axis_scale_type(place, scale_type_for(&axis));
            match &axis {
                AxisModel::Numeric(numeric) => {
                    self.layout.set_axis_numeric_domain(place, numeric.domain());
                }
                AxisModel::Categorical { .. } => self.sync_categories(place),
                AxisModel::Empty => {}
            }
        }
        tracing::debug!(target: targets::CONTROLLER, config = %self.data.id(), "graph initialized");
        self.schedule_refresh();
    }

    // ------------------------------------------------------------------
    // Attribute assignment
    // ------------------------------------------------------------------

    /// Assign `attribute_id` to the role of `place` (or unassign with
    /// `None`) and reconcile the graph.
    ///
    /// `YPlus` appends a series unless the attribute is already plotted; it
    /// only rescales the left axis. `Plot` and `Legend` bind the legend and
    /// leave the axes alone.
    pub fn handle_attribute_assignment(&self, place: GraphPlace, attribute_id: Option<&str>) {
        let _span = PerfSpan::new(span_names::ATTRIBUTE_ASSIGNMENT);
        tracing::debug!(target: targets::CONTROLLER, %place, attribute = attribute_id, "attribute assignment");

        let was_assigning = self.assigning.swap(true, Ordering::AcqRel);
        self.assign(place, attribute_id);
        self.assigning.store(was_assigning, Ordering::Release);

        self.reconcile(place);
    }

    fn assign(&self, place: GraphPlace, attribute_id: Option<&str>) {
        let role = place.role();
        let binding = attribute_id.map(AttributeBinding::new);
        match role {
            Role::YPlus => {
                if let Some(binding) = binding {
                    if !self.data.y_attribute_ids().contains(&binding.attribute_id) {
                        self.data.add_y_attribute(binding);
                    }
                }
            }
            _ => {
                if self.data.binding_for_role(role).map(|b| b.attribute_id).as_deref() != attribute_id {
                    self.data.set_attribute(role, binding, true);
                }
            }
        }
    }

    fn on_attributes_changed(&self, assignment: &AttributeAssignment) {
        if self.assigning.load(Ordering::Acquire) {
            return;
        }
        if let Some(place) = place_for_role(assignment.role) {
            tracing::trace!(target: targets::CONTROLLER, role = %assignment.role, %place, "binding changed");
            self.reconcile(place);
        }
    }

    /// Added, removed and edited cases can make a category appear or
    /// disappear, so categorical axes and per-cell state are re-synced.
    fn on_cases_changed(&self) {
        for (place, axis) in self.graph.axes() {
            if let AxisModel::Categorical { .. } = axis {
                self.sync_categories(place);
            }
        }
        self.update_adornments(false);
        self.schedule_refresh();
    }

    fn reconcile(&self, place: GraphPlace) {
        match place {
            GraphPlace::Plot | GraphPlace::Legend => {}
            GraphPlace::YPlus => self.rescale_left_for_all_series(),
            _ => {
                if matches!(place, GraphPlace::Left | GraphPlace::Bottom) {
                    self.assign_primary_role_and_plot_type(place.role());
                }
                for axis_place in AxisPlace::ALL {
                    self.setup_axis(axis_place);
                }
                self.update_adornments(false);
            }
        }
        self.schedule_refresh();
    }

    fn effective_type(&self, role: Role) -> AttributeType {
        match self.data.attribute_type(role) {
            AttributeType::Empty if self.config.empty_plot_is_numeric => AttributeType::Numeric,
            other => other,
        }
    }

    /// Numeric beats categorical beats empty; a tie keeps the previous
    /// primary role, else `role`.
    fn assign_primary_role_and_plot_type(&self, role: Role) {
        let other_role = if role == Role::X { Role::Y } else { Role::X };
        let role_type = self.effective_type(role);
        let other_type = self.effective_type(other_role);

        let primary = match role_type.primary_rank().cmp(&other_type.primary_rank()) {
            std::cmp::Ordering::Greater => role,
            std::cmp::Ordering::Less => other_role,
            std::cmp::Ordering::Equal => self
                .data
                .primary_role()
                .filter(|r| matches!(r, Role::X | Role::Y))
                .unwrap_or(role),
        };
        if self.data.primary_role() != Some(primary) {
            self.data.set_primary_role(primary);
        }
        self.graph
            .set_plot_type(PlotType::for_attribute_types(role_type, other_type));
    }

    fn default_numeric_axis(&self) -> AxisModel {
        let (min, max) = self.config.default_numeric_bounds;
        AxisModel::Numeric(NumericAxis::new(min, max))
    }

    fn can_rescale(&self, place: AxisPlace) -> bool {
        if self.graph.is_axis_locked(place) || self.graph.is_axis_editing(place) {
            return false;
        }
        let plotted = match place {
            AxisPlace::Left => self.data.y_attribute_ids(),
            _ => self.data.attribute_id(place.role()).into_iter().collect(),
        };
        !plotted.iter().any(|id| self.graph.is_series_editing(id))
    }

    fn push_numeric_domain(&self, place: AxisPlace) {
        if let Some(domain) = self.graph.axis(place).as_ref().and_then(AxisModel::as_numeric).map(NumericAxis::domain) {
            self.layout.set_axis_numeric_domain(place, domain);
        }
    }

    fn setup_axis(&self, place: AxisPlace) {
        let role = place.role();
        let attr_type = self.data.attribute_type(role);
        let current_type = self
            .graph
            .axis(place)
            .map_or(AttributeType::Empty, |axis| axis.attribute_type());

        match attr_type {
            AttributeType::Numeric => {
                if current_type != AttributeType::Numeric {
                    self.graph.set_axis(place, self.default_numeric_axis());
                }
                self.release_category_watcher(place);
                self.layout.set_axis_scale_type(place, ScaleType::Linear);
                if self.can_rescale(place) {
                    let values = self.data.numeric_values_for_attr_role(role);
                    self.graph.update_axis(place, |axis| {
                        axis.as_numeric_mut()
                            .is_some_and(|numeric| set_nice_domain(&values, numeric))
                    });
                }
                self.push_numeric_domain(place);
            }
            AttributeType::Categorical => {
                if current_type != AttributeType::Categorical {
                    self.graph.set_axis(place, AxisModel::categorical());
                    self.layout.set_axis_scale_type(place, ScaleType::Band);
                }
                self.watch_categories(place);
                self.sync_categories(place);
            }
            AttributeType::Empty => {
                self.release_category_watcher(place);
                if place.is_primary() {
                    let wanted = if self.config.empty_plot_is_numeric {
                        AttributeType::Numeric
                    } else {
                        AttributeType::Empty
                    };
                    if current_type != wanted || self.graph.axis(place).is_none() {
                        let axis = if wanted == AttributeType::Numeric {
                            self.default_numeric_axis()
                        } else {
                            AxisModel::Empty
                        };
                        self.layout.set_axis_scale_type(place, scale_type_for(&axis));
                        self.graph.set_axis(place, axis);
                        self.push_numeric_domain(place);
                    }
                } else if self.graph.axis(place).is_some() {
                    self.layout.set_axis_scale_type(place, ScaleType::Ordinal);
                    self.graph.remove_axis(place);
                }
            }
        }
    }

    fn rescale_left_for_all_series(&self) {
        let place = AxisPlace::Left;
        if !self.can_rescale(place) {
            return;
        }
        let values = self.data.numeric_values_for_y_axis();
        self.graph.update_axis(place, |axis| {
            axis.as_numeric_mut()
                .is_some_and(|numeric| set_nice_domain(&values, numeric))
        });
        self.push_numeric_domain(place);
    }

    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    /// Copy the role's categories into the axis model and the layout scale.
    fn sync_categories(&self, place: AxisPlace) {
        let categories = self.data.category_array(place.role());
        self.graph.update_axis(place, |axis| match axis {
            AxisModel::Categorical { categories: current } if *current != categories => {
                current.clone_from(&categories);
                true
            }
            _ => false,
        });
        self.layout.set_axis_categories(place, categories);
    }

    fn watch_categories(&self, place: AxisPlace) {
        let Some(set) = self.data.category_set_for_place(place) else {
            self.release_category_watcher(place);
            return;
        };
        let weak = self.self_ref.clone();
        let guard = set.changed.connect_scoped(move |_: &()| {
            if let Some(controller) = weak.upgrade() {
                controller.sync_categories(place);
                controller.update_adornments(false);
            }
        });
        self.category_watchers.lock().insert(place, guard);
    }

    fn release_category_watcher(&self, place: AxisPlace) {
        let released = self.category_watchers.lock().remove(&place);
        drop(released);
    }

    // ------------------------------------------------------------------
    // Adornments and user edits
    // ------------------------------------------------------------------

    /// Hand current axes and split categories to every adornment.
    pub fn update_adornments(&self, reset_points: bool) {
        let split = |role: Role| match self.data.attribute_id(role) {
            Some(id) => {
                let categories = self.data.category_array_for_attr_role(role, &[]);
                (Some(id), categories)
            }
            None => (None, Vec::new()),
        };
        let (top_attribute_id, top_cats) = split(Role::TopSplit);
        let (right_attribute_id, right_cats) = split(Role::RightSplit);
        let x_axis = self.graph.axis(AxisPlace::Bottom);
        let y_axis = self.graph.axis(AxisPlace::Left);
        let axis_cats = |axis: &Option<AxisModel>, role: Role| match axis {
            Some(AxisModel::Categorical { .. }) => self.data.category_array_for_attr_role(role, &[]),
            _ => Vec::new(),
        };
        let options = UpdateCategoriesOptions {
            x_cats: axis_cats(&x_axis, Role::X),
            y_cats: axis_cats(&y_axis, Role::Y),
            x_axis,
            y_axis,
            x_attribute_id: self.data.attribute_id(Role::X),
            y_attribute_id: self.data.attribute_id(Role::Y),
            top_attribute_id,
            top_cats,
            right_attribute_id,
            right_cats,
            reset_points,
        };
        self.graph.update_adornments(&options);
    }

    /// Lock or unlock a numeric axis.
    pub fn set_axis_locked(&self, place: AxisPlace, locked: bool) -> bool {
        self.graph.set_axis_locked(place, locked)
    }

    /// Mark an axis as being dragged by the user.
    pub fn set_axis_editing(&self, place: AxisPlace, editing: bool) {
        self.graph.set_axis_editing(place, editing);
    }

    /// Mark the series plotting `attribute_id` as being dragged by the user.
    /// Its axis keeps its bounds until the edit ends.
    pub fn set_series_editing(&self, attribute_id: &str, editing: bool) {
        self.graph.set_series_editing(attribute_id, editing);
    }

    /// Set a numeric axis domain directly, as a user drag does.
    pub fn set_numeric_axis_domain(&self, place: AxisPlace, min: f64, max: f64) -> bool {
        let changed = self.graph.update_axis(place, |axis| {
            axis.as_numeric_mut()
                .is_some_and(|numeric| numeric.set_domain(min, max))
        });
        self.push_numeric_domain(place);
        changed
    }

    /// Disconnect from every model and drop any pending refresh.
    pub fn teardown(&self) {
        let subscriptions = self.subscriptions.lock().take();
        drop(subscriptions);
        let watchers = std::mem::take(&mut *self.category_watchers.lock());
        drop(watchers);
        self.refresh.cancel();
        tracing::debug!(target: targets::CONTROLLER, "controller torn down");
    }

    /// Whether the controller still listens to its models.
    pub fn is_connected(&self) -> bool {
        self.subscriptions.lock().is_some()
    }
}

impl std::fmt::Debug for GraphController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphController")
            .field("graph", &self.graph)
            .field("data", &self.data.id())
            .field("refresh", &self.refresh)
            .field("connected", &self.is_connected())
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphController: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CaseMetadata, CaseValues, Dataset, MemoryCaseMetadata, MemoryDataset};
    use crate::facet::{MovableLineAdornment, SubPlotKey};

    struct Fixture {
        data: Arc<MemoryDataset>,
        _metadata: Arc<dyn CaseMetadata>,
        event_loop: Arc<EventLoop>,
        controller: Arc<GraphController>,
    }

    fn fixture_with(config: GraphConfig) -> Fixture {
        let data = Arc::new(MemoryDataset::new("plants"));
        data.add_attribute("weight", "weight", None).unwrap();
        data.add_attribute("height", "height", None).unwrap();
        data.add_attribute("species", "species", None).unwrap();
        data.add_cases(vec![
            CaseValues::new("p1").with("weight", 1.0).with("height", 4.0).with("species", "oak"),
            CaseValues::new("p2").with("weight", 9.0).with("height", 6.0).with("species", "elm"),
            CaseValues::new("p3").with("weight", 5.0).with("height", 8.0).with("species", "oak"),
        ])
        .unwrap();
        let source: Arc<dyn Dataset> = data.clone();
        let metadata: Arc<dyn CaseMetadata> = Arc::new(MemoryCaseMetadata::for_dataset(&data));
        let config_model = DataConfiguration::new();
        config_model.set_dataset(Some(&source), Some(&metadata));
        let event_loop = Arc::new(EventLoop::new());
        let controller = GraphController::from_config(config_model, &event_loop, config);
        Fixture {
            data,
            _metadata: metadata,
            event_loop,
            controller,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(GraphConfig::default())
    }

    #[test]
    fn test_plot_type_follows_bindings() {
        let f = fixture();
        let c = &f.controller;
        assert_eq!(c.graph().plot_type(), PlotType::CasePlot);

        c.handle_attribute_assignment(GraphPlace::Bottom, Some("weight"));
        assert_eq!(c.graph().plot_type(), PlotType::DotPlot);
        assert_eq!(c.data().primary_role(), Some(Role::X));

        c.handle_attribute_assignment(GraphPlace::Left, Some("species"));
        assert_eq!(c.graph().plot_type(), PlotType::DotPlot);
        assert_eq!(c.data().primary_role(), Some(Role::X));
        assert_eq!(c.graph().axis(AxisPlace::Left), Some(AxisModel::Categorical {
            categories: vec!["oak".into(), "elm".into()],
        }));

        c.handle_attribute_assignment(GraphPlace::Left, Some("height"));
        assert_eq!(c.graph().plot_type(), PlotType::ScatterPlot);
        assert!(c.graph().axis(AxisPlace::Left).unwrap().is_numeric());
        assert_eq!(c.data().primary_role(), Some(Role::X));
    }

    #[test]
    fn test_numeric_axis_gets_nice_bounds() {
        let f = fixture();
        f.controller.handle_attribute_assignment(GraphPlace::Bottom, Some("weight"));
        let axis = f.controller.graph().axis(AxisPlace::Bottom).unwrap();
        assert_eq!(axis.as_numeric().unwrap().domain(), (0.0, 9.0));
        let scale = f.controller.layout().axis_scale(AxisPlace::Bottom);
        assert_eq!(scale.scale_type(), ScaleType::Linear);
        assert_eq!(scale.numeric_domain(), (0.0, 9.0));
    }

    #[test]
    fn test_locked_axis_keeps_bounds() {
        let f = fixture();
        let c = &f.controller;
        c.handle_attribute_assignment(GraphPlace::Bottom, Some("weight"));
        assert!(c.set_numeric_axis_domain(AxisPlace::Bottom, -50.0, 50.0));
        c.set_axis_locked(AxisPlace::Bottom, true);
        f.data
            .set_case_values(vec![CaseValues::new("p1").with("weight", 1000.0)])
            .unwrap();
        c.handle_attribute_assignment(GraphPlace::Bottom, Some("weight"));
        c.handle_attribute_assignment(GraphPlace::Left, Some("height"));
        let axis = c.graph().axis(AxisPlace::Bottom).unwrap();
        assert_eq!(axis.as_numeric().unwrap().domain(), (-50.0, 50.0));
    }

    #[test]
    fn test_edited_series_keeps_its_axis_bounds() {
        let f = fixture();
        let c = &f.controller;
        c.handle_attribute_assignment(GraphPlace::Bottom, Some("weight"));
        c.handle_attribute_assignment(GraphPlace::Left, Some("height"));
        c.set_series_editing("height", true);
        f.data
            .set_case_values(vec![CaseValues::new("p1").with("height", 100.0)])
            .unwrap();
        c.handle_attribute_assignment(GraphPlace::Bottom, Some("species"));
        let left = c.graph().axis(AxisPlace::Left).unwrap();
        assert_eq!(left.as_numeric().unwrap().domain(), (4.0, 8.0));

        c.set_series_editing("height", false);
        c.handle_attribute_assignment(GraphPlace::Bottom, Some("weight"));
        let left = c.graph().axis(AxisPlace::Left).unwrap();
        assert_eq!(left.as_numeric().unwrap().domain(), (0.0, 100.0));
    }

    #[test]
    fn test_split_axis_is_removed_when_unbound() {
        let f = fixture();
        let c = &f.controller;
        c.handle_attribute_assignment(GraphPlace::Top, Some("species"));
        assert_eq!(c.graph().axis(AxisPlace::Top).map(|a| a.attribute_type()), Some(AttributeType::Categorical));
        assert_eq!(c.layout().axis_scale(AxisPlace::Top).scale_type(), ScaleType::Band);
        c.handle_attribute_assignment(GraphPlace::Top, None);
        assert_eq!(c.graph().axis(AxisPlace::Top), None);
        assert_eq!(c.layout().axis_scale(AxisPlace::Top).scale_type(), ScaleType::Ordinal);
    }

    #[test]
    fn test_empty_plot_is_numeric() {
        let f = fixture_with(GraphConfig::builder().empty_plot_is_numeric(true).build().unwrap());
        let c = &f.controller;
        assert_eq!(c.graph().plot_type(), PlotType::ScatterPlot);
        assert!(c.graph().axis(AxisPlace::Left).unwrap().is_numeric());
        c.handle_attribute_assignment(GraphPlace::Bottom, Some("species"));
        assert_eq!(c.graph().plot_type(), PlotType::DotPlot);
        assert_eq!(c.data().primary_role(), Some(Role::Y));
    }

    #[test]
    fn test_legend_does_not_change_plot_type() {
        let f = fixture();
        let c = &f.controller;
        c.handle_attribute_assignment(GraphPlace::Bottom, Some("weight"));
        c.handle_attribute_assignment(GraphPlace::Legend, Some("species"));
        assert_eq!(c.graph().plot_type(), PlotType::DotPlot);
        assert_eq!(c.data().attribute_id(Role::Legend).as_deref(), Some("species"));
    }

    #[test]
    fn test_y_plus_rescales_left_axis() {
        let f = fixture();
        let c = &f.controller;
        c.handle_attribute_assignment(GraphPlace::Left, Some("height"));
        assert_eq!(c.graph().axis(AxisPlace::Left).unwrap().as_numeric().unwrap().domain(), (4.0, 8.0));
        c.handle_attribute_assignment(GraphPlace::YPlus, Some("weight"));
        assert_eq!(c.data().y_attribute_ids(), vec!["height", "weight"]);
        assert_eq!(c.graph().axis(AxisPlace::Left).unwrap().as_numeric().unwrap().domain(), (0.0, 9.0));
        assert_eq!(c.layout().axis_scale(AxisPlace::Left).numeric_domain(), (0.0, 9.0));
    }

    #[test]
    fn test_direct_binding_changes_are_reconciled() {
        let f = fixture();
        let c = &f.controller;
        c.data().set_attribute(Role::X, Some("weight".into()), false);
        assert_eq!(c.graph().plot_type(), PlotType::DotPlot);
        assert!(c.graph().axis(AxisPlace::Bottom).unwrap().is_numeric());

        f.data.remove_attribute("weight").unwrap();
        assert_eq!(c.data().attribute_id(Role::X), None);
        assert_eq!(c.graph().plot_type(), PlotType::CasePlot);
        assert_eq!(c.graph().axis(AxisPlace::Bottom), Some(AxisModel::Empty));
    }

    #[test]
    fn test_refresh_is_debounced() {
        let f = fixture();
        let c = &f.controller;
        f.event_loop.run_until_idle(4);
        let base = c.refresh_count();

        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        c.points_refreshed().connect(move |_| *h.lock() += 1);

        c.handle_attribute_assignment(GraphPlace::Bottom, Some("weight"));
        c.handle_attribute_assignment(GraphPlace::Left, Some("height"));
        c.layout().set_parent_extent(600.0, 400.0);
        assert!(c.is_refresh_pending());
        assert!(c.data().points_need_updating());

        f.event_loop.run_until_idle(4);
        assert_eq!(c.refresh_count(), base + 1);
        assert_eq!(*hits.lock(), 1);
        assert!(!c.data().points_need_updating());
    }

    #[test]
    fn test_teardown_disconnects() {
        let f = fixture();
        let c = &f.controller;
        c.teardown();
        assert!(!c.is_connected());
        assert!(!c.is_refresh_pending());
        c.data().set_attribute(Role::X, Some("weight".into()), false);
        assert_eq!(c.graph().plot_type(), PlotType::CasePlot);
        assert!(!c.is_refresh_pending());
    }

    #[test]
    fn test_adornments_get_one_line_per_cell() {
        let f = fixture();
        let c = &f.controller;
        c.handle_attribute_assignment(GraphPlace::Bottom, Some("weight"));
        c.handle_attribute_assignment(GraphPlace::Left, Some("height"));
        c.graph().show_adornment(Box::new(MovableLineAdornment::new()));
        c.handle_attribute_assignment(GraphPlace::Top, Some("species"));

        c.graph().with_adornments(|adornments| {
            let lines = adornments[0]
                .as_any()
                .downcast_ref::<MovableLineAdornment>()
                .unwrap();
            assert_eq!(lines.lines().len(), 2);
            let key = SubPlotKey::new().with("species", "elm").instance_key();
            let line = lines.line(&key).unwrap();
            assert_eq!(line.slope, 4.0 / 4.5);
            assert_eq!(line.intercept, 4.0);
        });
    }

    #[test]
    fn test_new_category_reaches_axis_scale_and_cells() {
        let f = fixture();
        let c = &f.controller;
        c.handle_attribute_assignment(GraphPlace::Bottom, Some("species"));
        c.graph().show_adornment(Box::new(MovableLineAdornment::new()));
        c.update_adornments(false);

        f.data
            .add_cases(vec![CaseValues::new("p4").with("weight", 3.0).with("species", "pine")])
            .unwrap();
        f.event_loop.run_until_idle(4);

        let expected: Vec<String> = vec!["oak".into(), "elm".into(), "pine".into()];
        assert_eq!(c.graph().axis(AxisPlace::Bottom), Some(AxisModel::Categorical {
            categories: expected.clone(),
        }));
        assert_eq!(c.layout().axis_scale(AxisPlace::Bottom).categories(), expected.as_slice());
        c.graph().with_adornments(|adornments| {
            let lines = adornments[0]
                .as_any()
                .downcast_ref::<MovableLineAdornment>()
                .unwrap();
            let key = SubPlotKey::new().with("species", "pine").instance_key();
            assert!(lines.line(&key).is_some());
            assert_eq!(lines.lines().len(), 3);
        });
    }

    #[test]
    fn test_dot_chart_cells_include_axis_categories() {
        let f = fixture();
        let c = &f.controller;
        f.data.add_attribute("site", "site", None).unwrap();
        f.data
            .set_case_values(vec![
                CaseValues::new("p1").with("site", "north"),
                CaseValues::new("p2").with("site", "south"),
                CaseValues::new("p3").with("site", "south"),
            ])
            .unwrap();
        c.handle_attribute_assignment(GraphPlace::Bottom, Some("species"));
        c.handle_attribute_assignment(GraphPlace::Left, Some("site"));
        assert_eq!(c.graph().plot_type(), PlotType::DotChart);
        c.graph().show_adornment(Box::new(MovableLineAdornment::new()));
        c.update_adornments(false);

        c.graph().with_adornments(|adornments| {
            let lines = adornments[0]
                .as_any()
                .downcast_ref::<MovableLineAdornment>()
                .unwrap();
            let key = SubPlotKey::new().with("species", "elm").with("site", "south").instance_key();
            assert!(lines.line(&key).is_some());
            assert_eq!(lines.lines().len(), 4);
        });
    }

    #[test]
    fn test_category_moves_reach_the_scale() {
        let f = fixture();
        let c = &f.controller;
        c.handle_attribute_assignment(GraphPlace::Bottom, Some("species"));
        assert_eq!(c.layout().axis_scale(AxisPlace::Bottom).categories(), ["oak", "elm"]);
        let set = c.data().category_set_for_place(AxisPlace::Bottom).unwrap();
        set.move_value("elm", Some("oak"));
        assert_eq!(c.layout().axis_scale(AxisPlace::Bottom).categories(), ["elm", "oak"]);
    }
}
