//! Role bindings and the queries derived from them.
//!
//! A [`DataConfiguration`] maps each [`Role`] to an [`AttributeBinding`],
//! keeps one [`FilteredCaseSet`] per plotted series and answers every
//! data-side question the graph asks: which cases to draw, which categories
//! an axis shows, which values a numeric axis must cover, which colour a
//! legend value gets.
//!
//! # Locking
//!
//! Internal locks are never held while calling into the dataset, a filter,
//! or a signal. Filtering evaluates a [`CaseFilter`] snapshot taken at the
//! start of each pass.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use plotweave_core::Signal;
use plotweave_core::logging::targets;
use serde::{Deserialize, Serialize};

use super::attribute::{AttributeBinding, AttributeType, Role};
use super::dataset::{ActionDisposer, ActionHandler, CaseValues, Dataset, DatasetAction};
use super::filtered::{CaseFilter, ChangedCases, FilterFn, FilterRequirement, FilteredCaseSet};
use super::legend::QuantileScale;
use super::metadata::{CaseMetadata, CategorySet, MISSING_COLOR};
use crate::facet::SubPlotKey;
use crate::graph::{AxisPlace, GraphPlace};

/// Category used when a role has no categories.
pub const MAIN_CATEGORY: &str = "__main__";

static NEXT_CONFIG_ID: AtomicU64 = AtomicU64::new(1);

/// One plotted point: a case in a series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseData {
    /// Owning configuration.
    #[serde(rename = "dataConfigID")]
    pub data_config_id: String,
    /// Series index.
    pub plot_num: usize,
    /// Case id.
    #[serde(rename = "caseID")]
    pub case_id: String,
}

/// Notification that a role's binding changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeAssignment {
    /// The role whose binding changed.
    pub role: Role,
    /// The attribute now bound, if any.
    pub attribute_id: Option<String>,
}

/// Notification that the membership or plotted values of a series changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasesChanged {
    /// The series.
    pub series_index: usize,
    /// What changed. Empty when the series was rebuilt lazily.
    pub changes: ChangedCases,
}

/// Signals emitted by a [`DataConfiguration`].
#[derive(Default)]
pub struct ConfigSignals {
    /// Emitted after a binding or binding type changed.
    pub attributes_changed: Signal<AttributeAssignment>,
    /// Emitted after a dataset mutation was applied to a series.
    pub cases_changed: Signal<CasesChanged>,
}

/// Persistent part of a configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataConfigurationSnapshot {
    /// Role that determines stacking direction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_role: Option<Role>,
    /// Bindings of every role except y.
    #[serde(default)]
    pub attribute_descriptions: BTreeMap<Role, AttributeBinding>,
    /// The y series, in order.
    #[serde(default)]
    pub y_attribute_descriptions: Vec<AttributeBinding>,
}

type ConfigState = DataConfigurationSnapshot;

impl ConfigState {
    fn y_with_y2(&self) -> Vec<AttributeBinding> {
        let mut all = self.y_attribute_descriptions.clone();
        if let Some(y2) = self.attribute_descriptions.get(&Role::RightNumeric) {
            all.push(y2.clone());
        }
        all
    }

    /// Bindings keyed by role with only the first y and without y2.
    fn role_bindings(&self) -> BTreeMap<Role, AttributeBinding> {
        let mut bindings = self.attribute_descriptions.clone();
        bindings.remove(&Role::RightNumeric);
        if let Some(first) = self.y_attribute_descriptions.first() {
            bindings.insert(Role::Y, first.clone());
        }
        bindings
    }

    fn binding_for_role(&self, role: Role) -> Option<AttributeBinding> {
        match role {
            Role::Y => self.y_with_y2().into_iter().next(),
            Role::RightNumeric => self.attribute_descriptions.get(&Role::RightNumeric).cloned(),
            _ => self.role_bindings().remove(&role),
        }
    }
}

/// Role bindings, filtered case sets, and derived queries for one graph.
pub struct DataConfiguration {
    id: String,
    self_ref: Weak<DataConfiguration>,
    state: RwLock<ConfigState>,
    dataset: RwLock<Option<Weak<dyn Dataset>>>,
    metadata: RwLock<Option<Weak<dyn CaseMetadata>>>,
    case_sets: RwLock<Vec<Arc<FilteredCaseSet>>>,
    action_disposer: Mutex<Option<ActionDisposer>>,
    forwarded: Signal<DatasetAction>,
    quantile_scale: Mutex<Option<Arc<QuantileScale>>>,
    points_need_updating: AtomicBool,
    signals: ConfigSignals,
}

impl DataConfiguration {
    /// Create an empty configuration with no dataset.
    pub fn new() -> Arc<Self> {
        let id = format!("DCON{}", NEXT_CONFIG_ID.fetch_add(1, Ordering::Relaxed));
        Arc::new_cyclic(|self_ref| Self {
            id,
            self_ref: self_ref.clone(),
            state: RwLock::new(ConfigState::default()),
            dataset: RwLock::new(None),
            metadata: RwLock::new(None),
            case_sets: RwLock::new(Vec::new()),
            action_disposer: Mutex::new(None),
            forwarded: Signal::new(),
            quantile_scale: Mutex::new(None),
            points_need_updating: AtomicBool::new(false),
            signals: ConfigSignals::default(),
        })
    }

    /// Create a configuration restored from a snapshot.
    pub fn from_snapshot(snapshot: DataConfigurationSnapshot) -> Arc<Self> {
        let config = Self::new();
        *config.state.write() = snapshot;
        config
    }

    /// Unique id of this configuration.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Signals emitted by this configuration.
    pub fn signals(&self) -> &ConfigSignals {
        &self.signals
    }

    // ------------------------------------------------------------------
    // Dataset attachment
    // ------------------------------------------------------------------

    /// Attach a dataset and its category metadata, replacing any previous
    /// ones. Only weak references are kept.
    pub fn set_dataset(&self, dataset: Option<&Arc<dyn Dataset>>, metadata: Option<&Arc<dyn CaseMetadata>>) {
        let old = self.action_disposer.lock().take();
        if let Some(old) = old {
            old.dispose();
        }
        *self.dataset.write() = dataset.map(Arc::downgrade);
        *self.metadata.write() = metadata.map(Arc::downgrade);
        // Sets hold their own source handle, so the old ones are discarded.
        self.case_sets.write().clear();

        if let Some(dataset) = dataset {
            let weak = self.self_ref.clone();
            let disposer = dataset.on_action(Box::new(move |action| {
                if let Some(config) = weak.upgrade() {
                    config.handle_dataset_action(action);
                }
            }));
            *self.action_disposer.lock() = Some(disposer);
            tracing::debug!(target: targets::DATA, config = %self.id, dataset = %dataset.id(), "dataset attached");
        } else {
            tracing::debug!(target: targets::DATA, config = %self.id, "dataset detached");
        }
        self.sync_filtered_cases_count(true);
        self.invalidate_quantile_scale();
    }

    /// The attached dataset, if it is still alive.
    pub fn dataset(&self) -> Option<Arc<dyn Dataset>> {
        self.dataset.read().as_ref().and_then(Weak::upgrade)
    }

    /// The attached metadata, if it is still alive.
    pub fn metadata(&self) -> Option<Arc<dyn CaseMetadata>> {
        self.metadata.read().as_ref().and_then(Weak::upgrade)
    }

    /// Subscribe to dataset actions as seen through this configuration.
    ///
    /// Value changes are delivered after filtering, split into up to three
    /// notifications: cases that entered the plot (as `AddCases`), cases that
    /// left it (as `RemoveCases`) and plotted cases whose values changed (as
    /// `SetCaseValues`).
    pub fn on_action(&self, handler: ActionHandler) -> ActionDisposer {
        ActionDisposer::from_guard(self.forwarded.connect_scoped(move |action| handler(action)))
    }

    // ------------------------------------------------------------------
    // Binding queries
    // ------------------------------------------------------------------

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        let state = self.state.read();
        state.attribute_descriptions.is_empty() && state.y_attribute_descriptions.is_empty()
    }

    /// Current bindings.
    pub fn snapshot(&self) -> DataConfigurationSnapshot {
        self.state.read().clone()
    }

    /// Replace every binding, then resync the case sets.
    pub fn apply_snapshot(&self, snapshot: DataConfigurationSnapshot) {
        *self.state.write() = snapshot;
        self.sync_filtered_cases_count(true);
        self.invalidate_quantile_scale();
        self.set_points_need_updating(true);
        for role in [Role::X, Role::Y] {
            self.notify_assignment(role);
        }
    }

    /// The role that determines stacking direction, if set.
    pub fn primary_role(&self) -> Option<Role> {
        self.state.read().primary_role
    }

    /// Set the primary role. Only x and y are accepted.
    pub fn set_primary_role(&self, role: Role) {
        if matches!(role, Role::X | Role::Y) {
            self.state.write().primary_role = Some(role);
        }
    }

    /// The other of x and y.
    pub fn secondary_role(&self) -> Option<Role> {
        match self.primary_role() {
            Some(Role::X) => Some(Role::Y),
            Some(Role::Y) => Some(Role::X),
            _ => None,
        }
    }

    /// Attribute on the primary role.
    pub fn primary_attribute_id(&self) -> Option<String> {
        self.attribute_id(self.primary_role()?)
    }

    /// Attribute on the secondary role.
    pub fn secondary_attribute_id(&self) -> Option<String> {
        self.attribute_id(self.secondary_role()?)
    }

    /// Whether a second numeric y attribute is bound.
    pub fn has_y2_attribute(&self) -> bool {
        self.state
            .read()
            .attribute_descriptions
            .contains_key(&Role::RightNumeric)
    }

    /// The y series bindings, not including the right numeric one.
    pub fn y_bindings_excluding_y2(&self) -> Vec<AttributeBinding> {
        self.state.read().y_attribute_descriptions.clone()
    }

    /// Every y series binding, with the right numeric one last.
    pub fn y_bindings(&self) -> Vec<AttributeBinding> {
        self.state.read().y_with_y2()
    }

    /// Attribute bound to x, if any.
    pub fn x_attribute_id(&self) -> Option<String> {
        self.binding_for_role(Role::X).map(|b| b.attribute_id)
    }

    /// Attributes of every y series, with the right numeric one last.
    pub fn y_attribute_ids(&self) -> Vec<String> {
        self.y_bindings().into_iter().map(|b| b.attribute_id).collect()
    }

    /// Attribute of series `index`; empty if out of range.
    pub fn y_attribute_id(&self, index: usize) -> String {
        self.y_bindings()
            .into_iter()
            .nth(index)
            .map(|b| b.attribute_id)
            .unwrap_or_default()
    }

    /// Series index of a y attribute.
    pub fn plot_number_for_attribute_id(&self, attribute_id: &str) -> Option<usize> {
        self.y_attribute_ids().iter().position(|id| id == attribute_id)
    }

    /// One binding per role: the first y, and no right numeric entry.
    pub fn attribute_bindings(&self) -> BTreeMap<Role, AttributeBinding> {
        self.state.read().role_bindings()
    }

    /// The binding shown for a role. For y this is the first series.
    pub fn binding_for_role(&self, role: Role) -> Option<AttributeBinding> {
        self.state.read().binding_for_role(role)
    }

    /// Caption used when none is bound: the dataset's first attribute.
    pub fn default_caption_attribute_id(&self) -> Option<String> {
        self.dataset()?.attributes().into_iter().next().map(|a| a.id)
    }

    /// The attribute shown for a role.
    pub fn attribute_id(&self, role: Role) -> Option<String> {
        let bound = self.binding_for_role(role).map(|b| b.attribute_id);
        match (role, bound) {
            (Role::Caption, None) => self.default_caption_attribute_id(),
            (_, bound) => bound,
        }
    }

    /// Every role the attribute is bound to. A y attribute reports `Y` when
    /// it is the only series and `YPlus` otherwise.
    pub fn roles_for_attribute(&self, attribute_id: &str) -> Vec<Role> {
        let state = self.state.read();
        let mut roles: Vec<Role> = state
            .attribute_descriptions
            .iter()
            .filter(|(_, b)| b.attribute_id == attribute_id)
            .map(|(role, _)| *role)
            .collect();
        if state
            .y_attribute_descriptions
            .iter()
            .any(|b| b.attribute_id == attribute_id)
        {
            roles.push(if state.y_with_y2().len() > 1 { Role::YPlus } else { Role::Y });
        }
        roles
    }

    /// Effective type of a role: the override if present, else the dataset
    /// type, else `Empty`.
    pub fn attribute_type(&self, role: Role) -> AttributeType {
        if let Some(t) = self.binding_for_role(role).and_then(|b| b.type_override) {
            return t;
        }
        let Some(attribute_id) = self.attribute_id(role) else {
            return AttributeType::Empty;
        };
        self.dataset_type(&attribute_id)
    }

    /// Effective type of a bound attribute, looked up by id.
    pub fn attribute_type_for_id(&self, attribute_id: &str) -> AttributeType {
        let override_type = {
            let state = self.state.read();
            match state
                .y_with_y2()
                .iter()
                .position(|b| b.attribute_id == attribute_id)
            {
                Some(index) => state.y_with_y2()[index].type_override,
                None => state
                    .attribute_descriptions
                    .values()
                    .filter(|b| b.attribute_id == attribute_id)
                    .last()
                    .and_then(|b| b.type_override),
            }
        };
        override_type.unwrap_or_else(|| self.dataset_type(attribute_id))
    }

    fn dataset_type(&self, attribute_id: &str) -> AttributeType {
        self.dataset()
            .and_then(|d| d.attr_from_id(attribute_id))
            .map(|a| a.attr_type)
            .unwrap_or_default()
    }

    /// Roles that have an attribute, plus caption when the dataset has any
    /// attributes.
    pub fn places(&self) -> Vec<Role> {
        let mut places: Vec<Role> = self.attribute_bindings().into_keys().collect();
        let has_attributes = self.dataset().is_some_and(|d| !d.attributes().is_empty());
        if has_attributes && !places.contains(&Role::Caption) {
            places.push(Role::Caption);
        }
        places
    }

    /// Attributes of every place, duplicates kept.
    pub fn attributes(&self) -> Vec<String> {
        self.places()
            .into_iter()
            .filter_map(|role| self.attribute_id(role))
            .collect()
    }

    /// Attributes of every place, each once.
    pub fn unique_attributes(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.attributes()
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    /// (role, attribute) pairs shown in data tips.
    pub fn tip_attributes(&self) -> Vec<(Role, String)> {
        Role::TIP_ROLES
            .iter()
            .filter_map(|role| self.attribute_id(*role).map(|id| (*role, id)))
            .collect()
    }

    /// Tip attributes with duplicates removed, keeping each attribute's last
    /// role.
    pub fn unique_tip_attributes(&self) -> Vec<(Role, String)> {
        let tips = self.tip_attributes();
        tips.iter()
            .enumerate()
            .filter(|(i, (_, id))| !tips[i + 1..].iter().any(|(_, later)| later == id))
            .map(|(_, pair)| pair.clone())
            .collect()
    }

    /// True when nothing besides the implicit caption is bound.
    pub fn no_attributes_assigned(&self) -> bool {
        self.attributes().len() <= 1
    }

    /// Number of series, i.e. of filtered case sets.
    pub fn number_of_plots(&self) -> usize {
        self.case_sets.read().len()
    }

    /// Whether points must be repositioned.
    pub fn points_need_updating(&self) -> bool {
        self.points_need_updating.load(Ordering::Acquire)
    }

    /// Mark or clear the point-repositioning flag.
    pub fn set_points_need_updating(&self, need_updating: bool) {
        self.points_need_updating.store(need_updating, Ordering::Release);
    }

    // ------------------------------------------------------------------
    // Place queries
    // ------------------------------------------------------------------

    /// Whether a place may collapse to zero size: it is an optional place
    /// with nothing bound.
    pub fn place_can_have_zero_extent(&self, place: GraphPlace) -> bool {
        matches!(
            place,
            GraphPlace::RightNumeric | GraphPlace::Legend | GraphPlace::Top | GraphPlace::RightCat
        ) && self.attribute_id(place.role()).is_none()
    }

    /// Whether a place may show a "click here" cue.
    pub fn place_can_show_click_here_cue(&self, place: GraphPlace) -> bool {
        matches!(place, GraphPlace::Left | GraphPlace::Bottom) && self.attribute_id(place.role()).is_none()
    }

    /// Whether a place shows the cue regardless of focus: neither primary
    /// axis is bound.
    pub fn place_always_shows_click_here_cue(&self, place: GraphPlace) -> bool {
        let other = if place == GraphPlace::Left {
            GraphPlace::Bottom
        } else {
            GraphPlace::Left
        };
        self.place_can_show_click_here_cue(place) && self.attribute_id(other.role()).is_none()
    }

    /// Whether a place shows the cue now.
    pub fn place_should_show_click_here_cue(&self, place: GraphPlace, tile_has_focus: bool) -> bool {
        self.place_always_shows_click_here_cue(place)
            || (self.place_can_show_click_here_cue(place) && tile_has_focus)
    }

    /// Whether the categories of an axis are centred: always for split axes,
    /// and for a primary axis when it shows the primary role.
    pub fn categories_for_axis_should_be_centered(&self, place: AxisPlace) -> bool {
        self.primary_role() == Some(place.role()) || !place.is_primary()
    }

    /// Whether dropping `id_to_drop` from `drop_dataset` on `place` is allowed.
    pub fn graph_place_can_accept_attribute_id_drop(
        &self,
        place: GraphPlace,
        drop_dataset: Option<&dyn Dataset>,
        id_to_drop: Option<&str>,
    ) -> bool {
        let Some(id_to_drop) = id_to_drop.filter(|id| !id.is_empty()) else {
            return false;
        };
        let role = place.role();
        let drop_is_numeric = drop_dataset
            .and_then(|d| d.attr_from_id(id_to_drop))
            .is_some_and(|a| a.attr_type == AttributeType::Numeric);
        let x_is_numeric = self.attribute_type(Role::X) == AttributeType::Numeric;
        let existing = self.attribute_id(role);
        let is_existing = existing.as_deref() == Some(id_to_drop);

        let same_dataset = drop_dataset.map(|d| d.id()) == self.dataset().map(|d| d.id());
        if !same_dataset && !matches!(place, GraphPlace::Left | GraphPlace::Bottom) {
            return false;
        }
        match place {
            GraphPlace::YPlus => {
                x_is_numeric && drop_is_numeric && !self.y_attribute_ids().iter().any(|id| id == id_to_drop)
            }
            GraphPlace::RightNumeric => x_is_numeric && drop_is_numeric && !is_existing,
            GraphPlace::Top | GraphPlace::RightCat => !drop_is_numeric && !is_existing,
            _ => !is_existing,
        }
    }

    // ------------------------------------------------------------------
    // Binding mutations
    // ------------------------------------------------------------------

    /// Bind `binding` to `role`, or unbind the role when `binding` is `None`
    /// or unbound.
    ///
    /// `Y` replaces every y series; `YPlus` appends one; `RightNumeric` sets
    /// the second numeric axis. With `select`, the attribute is also
    /// selected in the dataset.
    pub fn set_attribute(&self, role: Role, binding: Option<AttributeBinding>, select: bool) {
        let binding = binding.filter(AttributeBinding::is_bound);
        match role {
            Role::Y => {
                let mut state = self.state.write();
                state.y_attribute_descriptions.clear();
                if let Some(b) = &binding {
                    state.y_attribute_descriptions.push(b.clone());
                }
            }
            Role::YPlus => {
                if let Some(b) = &binding {
                    self.state.write().y_attribute_descriptions.push(b.clone());
                }
            }
            Role::RightNumeric => self.set_y2_binding(binding.clone()),
            _ => {
                let mut state = self.state.write();
                match &binding {
                    Some(b) => {
                        state.attribute_descriptions.insert(role, b.clone());
                    }
                    None => {
                        state.attribute_descriptions.remove(&role);
                    }
                }
            }
        }
        if let (Some(b), true) = (&binding, select) {
            if let Some(dataset) = self.dataset() {
                dataset.set_selected_attributes(std::slice::from_ref(&b.attribute_id));
            }
        }
        tracing::debug!(
            target: targets::DATA,
            config = %self.id,
            %role,
            attribute = binding.as_ref().map(|b| b.attribute_id.as_str()),
            "attribute assigned"
        );
        self.sync_filtered_cases_count(true);
        self.set_points_need_updating(true);
        if role == Role::Legend {
            self.invalidate_quantile_scale();
        }
        self.notify_assignment(role);
    }

    /// Append a y series.
    pub fn add_y_attribute(&self, binding: AttributeBinding) {
        self.set_attribute(Role::YPlus, Some(binding), true);
    }

    /// Set or clear the second numeric y attribute.
    pub fn set_y2_attribute(&self, binding: Option<AttributeBinding>) {
        self.set_y2_binding(binding.filter(AttributeBinding::is_bound));
        self.notify_assignment(Role::RightNumeric);
    }

    fn set_y2_binding(&self, binding: Option<AttributeBinding>) {
        let (is_new, is_empty) = {
            let mut state = self.state.write();
            let is_new = !state.attribute_descriptions.contains_key(&Role::RightNumeric);
            let is_empty = binding.is_none();
            match binding {
                Some(b) => {
                    state.attribute_descriptions.insert(Role::RightNumeric, b);
                }
                None => {
                    state.attribute_descriptions.remove(&Role::RightNumeric);
                }
            }
            (is_new, is_empty)
        };
        self.sync_filtered_cases_count(false);
        if is_empty {
            self.set_points_need_updating(true);
        } else if !is_new {
            let last = self.case_sets.read().last().cloned();
            if let Some(set) = last {
                set.invalidate();
            }
        }
    }

    /// Replace y attribute `old_id` with `new_id`, keeping its position. If
    /// `new_id` is already a series it is removed from its old position.
    pub fn replace_y_attribute(&self, old_id: &str, new_id: &str) {
        if !self.y_bindings_excluding_y2().iter().any(|b| b.attribute_id == old_id) {
            return;
        }
        if old_id != new_id && self.y_bindings_excluding_y2().iter().any(|b| b.attribute_id == new_id) {
            self.remove_y_binding(new_id);
        }
        let index = {
            let mut state = self.state.write();
            let count = state.y_attribute_descriptions.len();
            let Some(index) = state
                .y_attribute_descriptions
                .iter()
                .position(|b| b.attribute_id == old_id)
            else {
                return;
            };
            let binding = &mut state.y_attribute_descriptions[index];
            binding.attribute_id = new_id.to_string();
            if index == 0 && count == 1 {
                binding.type_override = None;
            }
            index
        };
        if let Some(dataset) = self.dataset() {
            dataset.set_selected_attributes(&[new_id.to_string()]);
        }
        self.sync_filtered_cases_count(false);
        let set = self.case_sets.read().get(index).cloned();
        if let Some(set) = set {
            set.invalidate();
        }
        self.set_points_need_updating(true);
        self.notify_assignment(Role::Y);
    }

    /// Remove the y series bound to `attribute_id`. Returns whether one was
    /// removed.
    pub fn remove_y_attribute_with_id(&self, attribute_id: &str) -> bool {
        let removed = self.remove_y_binding(attribute_id);
        if removed {
            self.notify_assignment(Role::Y);
        }
        removed
    }

    fn remove_y_binding(&self, attribute_id: &str) -> bool {
        let removed = {
            let mut state = self.state.write();
            match state
                .y_attribute_descriptions
                .iter()
                .position(|b| b.attribute_id == attribute_id)
            {
                Some(index) => {
                    state.y_attribute_descriptions.remove(index);
                    true
                }
                None => false,
            }
        };
        if removed {
            self.sync_filtered_cases_count(true);
            self.set_points_need_updating(true);
        }
        removed
    }

    /// Unbind a role. For `Y` every series is removed.
    pub fn remove_attribute_from_role(&self, role: Role) {
        match role {
            Role::Y => {
                let ids: Vec<String> = self
                    .y_bindings_excluding_y2()
                    .into_iter()
                    .map(|b| b.attribute_id)
                    .collect();
                for id in ids {
                    self.remove_y_attribute_with_id(&id);
                }
            }
            Role::YPlus => {}
            _ => {
                let removed = self.state.write().attribute_descriptions.remove(&role).is_some();
                if removed {
                    self.sync_filtered_cases_count(true);
                    self.set_points_need_updating(true);
                    if role == Role::Legend {
                        self.invalidate_quantile_scale();
                    }
                    self.notify_assignment(role);
                }
            }
        }
    }

    /// Unbind everything: y series one at a time, then the other roles.
    pub fn clear_attributes(&self) {
        while let Some(first) = self.y_bindings_excluding_y2().into_iter().next() {
            if !self.remove_y_attribute_with_id(&first.attribute_id) {
                break;
            }
        }
        let roles: Vec<Role> = self.state.read().attribute_descriptions.keys().copied().collect();
        for role in roles {
            self.remove_attribute_from_role(role);
        }
    }

    /// Override the type of a role's attribute. For y, the series is chosen
    /// by `attribute_id` when given, else by `plot_number`. `Empty` clears
    /// the override.
    pub fn set_attribute_type(&self, role: Role, attr_type: AttributeType, plot_number: usize, attribute_id: Option<&str>) {
        let changed = {
            let mut state = self.state.write();
            let binding = match role {
                Role::Y | Role::YPlus => match attribute_id {
                    Some(id) => state
                        .y_attribute_descriptions
                        .iter_mut()
                        .find(|b| b.attribute_id == id),
                    None => state.y_attribute_descriptions.get_mut(plot_number),
                },
                _ => state.attribute_descriptions.get_mut(&role),
            };
            match binding {
                Some(binding) => {
                    binding.set_type(Some(attr_type));
                    true
                }
                None => false,
            }
        };
        let sets = self.case_sets.read().clone();
        for set in sets {
            set.invalidate();
        }
        if changed {
            tracing::debug!(target: targets::DATA, config = %self.id, %role, %attr_type, "attribute type set");
            self.set_points_need_updating(true);
            if role == Role::Legend {
                self.invalidate_quantile_scale();
            }
            self.notify_assignment(if role == Role::YPlus { Role::Y } else { role });
        }
    }

    fn notify_assignment(&self, role: Role) {
        let attribute_id = self.attribute_id(role).filter(|_| role != Role::Caption);
        self.signals
            .attributes_changed
            .emit(AttributeAssignment { role, attribute_id });
    }

    // ------------------------------------------------------------------
    // Filtering
    // ------------------------------------------------------------------

    /// Make the number of case sets match the number of series: one per y
    /// series (including the right numeric one), or one when a dataset is
    /// attached but no y is bound, or none without a dataset.
    ///
    /// Every set is invalidated when the count changed or `always_invalidate`
    /// is set.
    pub fn sync_filtered_cases_count(&self, always_invalidate: bool) {
        let dataset = self.dataset.read().clone().filter(|w| w.strong_count() > 0);
        let desired = match &dataset {
            Some(_) => self.state.read().y_with_y2().len().max(1),
            None => 0,
        };
        let (changed, sets) = {
            let mut sets = self.case_sets.write();
            let changed = sets.len() != desired;
            sets.truncate(desired);
            if let Some(source) = &dataset {
                while sets.len() < desired {
                    let index = sets.len();
                    sets.push(Arc::new(FilteredCaseSet::new(index, source.clone(), self.filter_fn())));
                }
            }
            (changed, sets.clone())
        };
        if changed {
            self.set_points_need_updating(true);
            tracing::debug!(target: targets::FILTER, config = %self.id, count = desired, "case set count changed");
        }
        if always_invalidate || changed {
            for set in &sets {
                set.invalidate();
            }
        }
    }

    fn filter_fn(&self) -> FilterFn {
        let weak = self.self_ref.clone();
        Arc::new(move |series| weak.upgrade().map(|config| config.case_filter(series)))
    }

    /// The requirements series `series_index` places on a case.
    ///
    /// Caption and legend never exclude a case. Attributes the dataset no
    /// longer has impose no requirement.
    pub fn case_filter(&self, series_index: usize) -> CaseFilter {
        let (mut bindings, all_bound) = {
            let state = self.state.read();
            let mut bindings = state.role_bindings();
            let y_count = state.y_attribute_descriptions.len();
            let y2 = state.attribute_descriptions.get(&Role::RightNumeric);
            match y2 {
                Some(y2) if series_index == y_count => {
                    bindings.insert(Role::Y, y2.clone());
                }
                _ => {
                    if let Some(y) = state.y_attribute_descriptions.get(series_index) {
                        bindings.insert(Role::Y, y.clone());
                    }
                }
            }
            let all_bound: Vec<String> = bindings.values().map(|b| b.attribute_id.clone()).collect();
            (bindings, all_bound)
        };
        bindings.retain(|role, _| !role.is_optional_for_filtering());

        let dataset = self.dataset();
        let requirements = bindings
            .into_values()
            .filter_map(|binding| {
                let declared = dataset.as_ref()?.attr_from_id(&binding.attribute_id)?.attr_type;
                Some(FilterRequirement {
                    attr_type: binding.type_override.unwrap_or(declared),
                    attribute_id: binding.attribute_id,
                })
            })
            .collect();
        let mut plotted = all_bound;
        if let Some(caption) = self.attribute_id(Role::Caption) {
            plotted.push(caption);
        }
        CaseFilter::new(requirements, plotted)
    }

    /// Whether a case can be plotted in series `series_index`.
    pub fn filter_case(&self, dataset: &dyn Dataset, case_id: &str, series_index: usize) -> bool {
        self.case_filter(series_index).accepts(dataset, case_id)
    }

    /// The case set of a series.
    pub fn filtered_cases(&self, series_index: usize) -> Option<Arc<FilteredCaseSet>> {
        self.case_sets.read().get(series_index).cloned()
    }

    fn all_case_sets(&self) -> Vec<Arc<FilteredCaseSet>> {
        self.case_sets.read().clone()
    }

    fn handle_dataset_action(&self, action: &DatasetAction) {
        tracing::trace!(target: targets::DATA, config = %self.id, action = action.name(), "dataset action");
        for set in self.all_case_sets() {
            let was_valid = set.is_valid();
            let changes = set.apply(action);
            if let DatasetAction::SetCaseValues { cases, attribute_ids } = action {
                self.forward_set_case_values(cases, attribute_ids, &changes);
            }
            if !changes.is_empty() || !was_valid {
                self.set_points_need_updating(true);
                self.signals.cases_changed.emit(CasesChanged {
                    series_index: set.series_index(),
                    changes,
                });
            }
        }

        match action {
            DatasetAction::SetCaseValues { cases, attribute_ids } => {
                let affected: Option<Vec<String>> = match (attribute_ids, cases.as_slice()) {
                    (Some(ids), _) => Some(ids.clone()),
                    (None, [single]) => Some(single.values.keys().cloned().collect()),
                    (None, _) => None,
                };
                let legend = self.attribute_id(Role::Legend);
                match (affected, legend) {
                    (Some(ids), Some(legend)) if ids.contains(&legend) => self.invalidate_quantile_scale(),
                    (Some(_), _) => {}
                    (None, _) => self.invalidate_quantile_scale(),
                }
            }
            DatasetAction::AddCases(_) | DatasetAction::RemoveCases(_) => {
                self.forwarded.emit(action.clone());
                self.invalidate_quantile_scale();
            }
            DatasetAction::RemoveAttribute(attribute_id) => {
                self.forwarded.emit(action.clone());
                self.handle_removed_attribute(attribute_id);
            }
            DatasetAction::AddAttribute(_) => self.forwarded.emit(action.clone()),
        }
    }

    fn forward_set_case_values(
        &self,
        cases: &[CaseValues],
        attribute_ids: &Option<Vec<String>>,
        changes: &ChangedCases,
    ) {
        if !changes.added.is_empty() {
            let new_cases: Vec<CaseValues> = match self.dataset() {
                Some(dataset) => changes.added.iter().filter_map(|id| dataset.get_case(id)).collect(),
                None => Vec::new(),
            };
            self.forwarded.emit(DatasetAction::AddCases(new_cases));
        }
        if !changes.removed.is_empty() {
            self.forwarded.emit(DatasetAction::RemoveCases(changes.removed.clone()));
        }
        if !changes.changed.is_empty() {
            let changed: HashSet<&str> = changes.changed.iter().map(String::as_str).collect();
            let changed_cases = cases
                .iter()
                .filter(|c| changed.contains(c.id.as_str()))
                .cloned()
                .collect();
            self.forwarded.emit(DatasetAction::SetCaseValues {
                cases: changed_cases,
                attribute_ids: attribute_ids.clone(),
            });
        }
    }

    fn handle_removed_attribute(&self, attribute_id: &str) {
        let roles: Vec<Role> = self
            .state
            .read()
            .attribute_descriptions
            .iter()
            .filter(|(_, b)| b.attribute_id == attribute_id)
            .map(|(role, _)| *role)
            .collect();
        for role in roles {
            tracing::debug!(target: targets::DATA, config = %self.id, %role, attribute = attribute_id, "unbinding removed attribute");
            if role == Role::RightNumeric {
                self.set_y2_attribute(None);
            } else {
                self.remove_attribute_from_role(role);
            }
        }
        while self.remove_y_attribute_with_id(attribute_id) {}
    }

    // ------------------------------------------------------------------
    // Case queries
    // ------------------------------------------------------------------

    /// Every plotted case id, each once, in series then dataset order.
    pub fn graph_case_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for set in self.all_case_sets() {
            for id in set.case_ids() {
                if seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Selected cases that are plotted.
    pub fn case_selection(&self) -> Vec<String> {
        let Some(dataset) = self.dataset() else {
            return Vec::new();
        };
        if self.number_of_plots() == 0 {
            return Vec::new();
        }
        let plotted: HashSet<String> = self.graph_case_ids().into_iter().collect();
        dataset
            .case_selection()
            .into_iter()
            .filter(|id| plotted.contains(id))
            .collect()
    }

    /// Whether a case's values match every entry of a facet key.
    pub fn is_case_in_sub_plot(&self, key: &SubPlotKey, case: &CaseValues) -> bool {
        key.iter().all(|(attr, value)| case.str_value(attr) == *value)
    }

    /// Plotted cases, across every series, that belong to a facet cell.
    pub fn sub_plot_cases(&self, key: &SubPlotKey) -> Vec<CaseValues> {
        let Some(dataset) = self.dataset() else {
            return Vec::new();
        };
        self.all_case_sets()
            .iter()
            .flat_map(|set| set.case_ids())
            .filter_map(|id| dataset.get_case(&id))
            .filter(|case| self.is_case_in_sub_plot(key, case))
            .collect()
    }

    /// Points of one series in dataset order.
    pub fn unsorted_case_data_array(&self, series_index: usize) -> Vec<CaseData> {
        let Some(set) = self.filtered_cases(series_index) else {
            return Vec::new();
        };
        set.case_ids()
            .into_iter()
            .map(|case_id| CaseData {
                data_config_id: self.id.clone(),
                plot_num: series_index,
                case_id,
            })
            .collect()
    }

    /// Points of one series, ordered by legend category when a legend is
    /// bound.
    pub fn case_data_array_for(&self, series_index: usize) -> Vec<CaseData> {
        let mut points = self.unsorted_case_data_array(series_index);
        let (Some(legend), Some(dataset)) = (self.attribute_id(Role::Legend), self.dataset()) else {
            return points;
        };
        let categories = self.category_array(Role::Legend);
        points.sort_by_key(|point| {
            let value = dataset.get_str_value(&point.case_id, &legend);
            categories
                .iter()
                .position(|c| *c == value)
                .map_or(-1, |i| i as i64)
        });
        points
    }

    /// Points of the first series.
    pub fn case_data_array(&self) -> Vec<CaseData> {
        self.case_data_array_for(0)
    }

    /// Points of every series whose types match: x must have `x_type` and
    /// the series attribute `y_type`.
    pub fn joined_case_data_arrays(&self, x_type: AttributeType, y_type: AttributeType) -> Vec<CaseData> {
        if self.attribute_type(Role::X) != x_type {
            return Vec::new();
        }
        let y_ids = self.y_attribute_ids();
        let mut joined = Vec::new();
        for set in self.all_case_sets() {
            let index = set.series_index();
            let series_type = y_ids
                .get(index)
                .map_or(AttributeType::Empty, |id| self.attribute_type_for_id(id));
            if series_type == y_type {
                joined.extend(set.case_ids().into_iter().map(|case_id| CaseData {
                    data_config_id: self.id.clone(),
                    plot_num: index,
                    case_id,
                }));
            }
        }
        joined
    }

    // ------------------------------------------------------------------
    // Values and categories
    // ------------------------------------------------------------------

    /// Non-empty values of a role's attribute over the plotted cases.
    pub fn values_for_attr_role(&self, role: Role) -> Vec<String> {
        let (Some(attribute_id), Some(dataset)) = (self.attribute_id(role), self.dataset()) else {
            return Vec::new();
        };
        self.graph_case_ids()
            .iter()
            .filter_map(|id| dataset.get_value(id, &attribute_id))
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .collect()
    }

    /// Finite values a numeric axis showing `role` must cover. For y this
    /// spans every left-axis series.
    pub fn numeric_values_for_attr_role(&self, role: Role) -> Vec<f64> {
        if role == Role::Y {
            return self.numeric_values_for_y_axis();
        }
        let (Some(attribute_id), Some(dataset)) = (self.attribute_id(role), self.dataset()) else {
            return Vec::new();
        };
        self.graph_case_ids()
            .iter()
            .filter_map(|id| dataset.get_numeric(id, &attribute_id))
            .filter(|v| v.is_finite())
            .collect()
    }

    /// Finite values of every left-axis y series over the plotted cases.
    pub fn numeric_values_for_y_axis(&self) -> Vec<f64> {
        let Some(dataset) = self.dataset() else {
            return Vec::new();
        };
        let case_ids = self.graph_case_ids();
        self.y_bindings_excluding_y2()
            .iter()
            .flat_map(|b| {
                case_ids
                    .iter()
                    .filter_map(|id| dataset.get_numeric(id, &b.attribute_id))
                    .collect::<Vec<_>>()
            })
            .filter(|v| v.is_finite())
            .collect()
    }

    /// The category set of a role's attribute.
    pub fn category_set_for_attr_role(&self, role: Role) -> Option<Arc<CategorySet>> {
        let attribute_id = self.attribute_id(role)?;
        self.metadata()?.category_set_for(&attribute_id)
    }

    /// The category set shown on an axis.
    pub fn category_set_for_place(&self, place: AxisPlace) -> Option<Arc<CategorySet>> {
        self.category_set_for_attr_role(place.role())
    }

    /// Categories of a role present among the plotted cases, in category
    /// set order. Falls back to `empty_default` when there are none.
    pub fn category_array_for_attr_role(&self, role: Role, empty_default: &[&str]) -> Vec<String> {
        let fallback = || empty_default.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let categories = match self.category_set_for_attr_role(role) {
            Some(set) => {
                let present: HashSet<String> = self.values_for_attr_role(role).into_iter().collect();
                set.values()
                    .into_iter()
                    .filter(|v| present.contains(v))
                    .collect::<Vec<_>>()
            }
            None => Vec::new(),
        };
        if categories.is_empty() {
            fallback()
        } else {
            categories
        }
    }

    /// Categories of a role, defaulting to the single main category.
    pub fn category_array(&self, role: Role) -> Vec<String> {
        self.category_array_for_attr_role(role, &[MAIN_CATEGORY])
    }

    /// How many times an axis is repeated by the split on the other side.
    pub fn num_repetitions_for_place(&self, place: GraphPlace) -> usize {
        match place {
            GraphPlace::Left => self.category_array(Role::RightSplit).len().max(1),
            GraphPlace::Bottom => self.category_array(Role::TopSplit).len().max(1),
            _ => 1,
        }
    }

    /// Pin the current colours of a role's categories.
    pub fn store_all_current_colors_for_attr_role(&self, role: Role) {
        if let Some(set) = self.category_set_for_attr_role(role) {
            set.store_all_current_colors();
        }
    }

    /// Move the category at `index1` to just after the one at `index2`.
    pub fn swap_categories_for_attr_role(&self, role: Role, index1: usize, index2: usize) {
        let categories = self.category_array(role);
        let Some(set) = self.category_set_for_attr_role(role) else {
            return;
        };
        let (lo, hi) = if index2 < index1 { (index2, index1) } else { (index1, index2) };
        let count = categories.len();
        if lo < count && hi < count {
            let before = categories.get(hi + 1).map(String::as_str);
            set.move_value(&categories[lo], before);
        }
    }

    // ------------------------------------------------------------------
    // Legend
    // ------------------------------------------------------------------

    /// The cached quantile scale over the legend attribute's values.
    pub fn legend_quantile_scale(&self) -> Arc<QuantileScale> {
        if let Some(scale) = self.quantile_scale.lock().as_ref() {
            return scale.clone();
        }
        let scale = Arc::new(QuantileScale::new(&self.numeric_values_for_attr_role(Role::Legend)));
        *self.quantile_scale.lock() = Some(scale.clone());
        scale
    }

    /// Drop the cached quantile scale.
    pub fn invalidate_quantile_scale(&self) {
        *self.quantile_scale.lock() = None;
    }

    /// Colour of a legend category.
    pub fn legend_color_for_category(&self, category: &str) -> String {
        self.category_set_for_attr_role(Role::Legend)
            .and_then(|set| set.color_for_category(category))
            .unwrap_or_else(|| MISSING_COLOR.to_string())
    }

    /// Colour of a numeric legend value.
    pub fn legend_color_for_numeric_value(&self, value: f64) -> String {
        self.legend_quantile_scale()
            .color(value)
            .unwrap_or(MISSING_COLOR)
            .to_string()
    }

    /// Colour of a case under the current legend; empty without a legend.
    pub fn legend_color_for_case(&self, case_id: &str) -> String {
        let (Some(legend), Some(dataset)) = (self.attribute_id(Role::Legend), self.dataset()) else {
            return String::new();
        };
        match self.attribute_type(Role::Legend) {
            AttributeType::Categorical => {
                self.legend_color_for_category(&dataset.get_str_value(case_id, &legend))
            }
            AttributeType::Numeric => match dataset.get_numeric(case_id, &legend) {
                Some(value) => self.legend_color_for_numeric_value(value),
                None => MISSING_COLOR.to_string(),
            },
            AttributeType::Empty => String::new(),
        }
    }

    fn cases_with_legend_value(&self, value: &str) -> Vec<String> {
        let (Some(legend), Some(dataset)) = (self.attribute_id(Role::Legend), self.dataset()) else {
            return Vec::new();
        };
        self.case_data_array()
            .into_iter()
            .filter(|point| dataset.get_str_value(&point.case_id, &legend) == value)
            .map(|point| point.case_id)
            .collect()
    }

    fn select(&self, selection: &[String], extend: bool) {
        if let Some(dataset) = self.dataset() {
            if extend {
                dataset.select_cases(selection);
            } else {
                dataset.set_selected_cases(selection);
            }
        }
    }

    /// Select the plotted cases with a legend category.
    pub fn select_cases_for_legend_value(&self, value: &str, extend: bool) {
        let selection = self.cases_with_legend_value(value);
        self.select(&selection, extend);
    }

    /// Whether every plotted case of a legend category is selected.
    pub fn all_cases_for_category_are_selected(&self, category: &str) -> bool {
        let selection = self.cases_with_legend_value(category);
        let Some(dataset) = self.dataset() else {
            return false;
        };
        !selection.is_empty() && selection.iter().all(|id| dataset.is_case_selected(id))
    }

    /// Plotted cases whose legend value falls in quantile bin `quantile`.
    pub fn selected_cases_for_legend_quantile(&self, quantile: usize) -> Vec<String> {
        let (Some(legend), Some(dataset)) = (self.attribute_id(Role::Legend), self.dataset()) else {
            return Vec::new();
        };
        let (min, max) = self.legend_quantile_scale().bin_range(quantile);
        self.case_data_array()
            .into_iter()
            .filter(|point| {
                dataset
                    .get_numeric(&point.case_id, &legend)
                    .is_some_and(|v| v >= min && v < max)
            })
            .map(|point| point.case_id)
            .collect()
    }

    /// Select the plotted cases in a quantile bin.
    pub fn select_cases_for_legend_quantile(&self, quantile: usize, extend: bool) {
        let selection = self.selected_cases_for_legend_quantile(quantile);
        self.select(&selection, extend);
    }

    /// Whether every plotted case in a quantile bin is selected.
    pub fn cases_in_quantile_are_selected(&self, quantile: usize) -> bool {
        let selection = self.selected_cases_for_legend_quantile(quantile);
        let Some(dataset) = self.dataset() else {
            return false;
        };
        !selection.is_empty() && selection.iter().all(|id| dataset.is_case_selected(id))
    }
}

impl Drop for DataConfiguration {
    fn drop(&mut self) {
        if let Some(disposer) = self.action_disposer.get_mut().take() {
            disposer.dispose();
        }
    }
}

impl std::fmt::Debug for DataConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataConfiguration")
            .field("id", &self.id)
            .field("state", &*self.state.read())
            .field("case_sets", &self.case_sets.read().len())
            .finish()
    }
}

static_assertions::assert_impl_all!(DataConfiguration: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::MemoryDataset;
    use crate::data::metadata::MemoryCaseMetadata;

    struct Fixture {
        data: Arc<MemoryDataset>,
        _metadata: Arc<dyn CaseMetadata>,
        config: Arc<DataConfiguration>,
    }

    /// Attributes n (names), x, y; c1 complete, c2 only x, c3 name and y.
    fn fixture() -> Fixture {
        let data = Arc::new(MemoryDataset::new("data"));
        data.add_attribute("nId", "n", None).unwrap();
        data.add_attribute("xId", "x", None).unwrap();
        data.add_attribute("yId", "y", None).unwrap();
        data.add_cases(vec![
            CaseValues::new("c1").with("nId", "n1").with("xId", 1.0).with("yId", 1.0),
            CaseValues::new("c2").with("xId", 2.0),
            CaseValues::new("c3").with("nId", "n3").with("yId", 3.0),
        ])
        .unwrap();
        let source: Arc<dyn Dataset> = data.clone();
        let metadata: Arc<dyn CaseMetadata> = Arc::new(MemoryCaseMetadata::for_dataset(&data));
        let config = DataConfiguration::new();
        config.set_dataset(Some(&source), Some(&metadata));
        Fixture {
            data,
            _metadata: metadata,
            config,
        }
    }

    fn ids(points: &[CaseData]) -> Vec<&str> {
        points.iter().map(|p| p.case_id.as_str()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = DataConfiguration::new();
        assert!(config.is_empty());
        assert_eq!(config.number_of_plots(), 0);
        assert!(config.case_data_array().is_empty());
        assert_eq!(config.attribute_id(Role::Caption), None);
        assert_eq!(config.category_array(Role::X), vec![MAIN_CATEGORY]);
    }

    #[test]
    fn test_dataset_without_bindings_plots_every_case() {
        let f = fixture();
        assert_eq!(f.config.number_of_plots(), 1);
        assert_eq!(f.config.attribute_id(Role::Caption).as_deref(), Some("nId"));
        assert_eq!(ids(&f.config.case_data_array()), vec!["c1", "c2", "c3"]);
        assert!(f.config.no_attributes_assigned());
    }

    #[test]
    fn test_bindings_filter_cases() {
        let f = fixture();
        f.config.set_attribute(Role::X, Some("xId".into()), true);
        assert_eq!(ids(&f.config.case_data_array()), vec!["c1", "c2"]);
        assert_eq!(f.data.selected_attributes(), vec!["xId"]);

        f.config.set_attribute(Role::Y, Some("yId".into()), true);
        assert_eq!(ids(&f.config.case_data_array()), vec!["c1"]);

        f.config.remove_attribute_from_role(Role::X);
        assert_eq!(ids(&f.config.case_data_array()), vec!["c1", "c3"]);

        // Caption never filters.
        f.config.set_attribute(Role::Caption, Some("nId".into()), false);
        f.config.set_attribute(Role::Y, None, false);
        assert_eq!(ids(&f.config.case_data_array()), vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_type_override_changes_filter() {
        let f = fixture();
        f.config.set_attribute(Role::X, Some("nId".into()), false);
        assert_eq!(f.config.attribute_type(Role::X), AttributeType::Categorical);
        assert_eq!(ids(&f.config.case_data_array()), vec!["c1", "c3"]);

        f.config.set_attribute_type(Role::X, AttributeType::Numeric, 0, None);
        assert_eq!(f.config.attribute_type(Role::X), AttributeType::Numeric);
        assert!(f.config.case_data_array().is_empty());

        f.config.set_attribute_type(Role::X, AttributeType::Empty, 0, None);
        assert_eq!(f.config.attribute_type(Role::X), AttributeType::Categorical);
    }

    #[test]
    fn test_y_series_and_y2() {
        let f = fixture();
        f.config.set_attribute(Role::X, Some("xId".into()), false);
        f.config.set_attribute(Role::Y, Some("yId".into()), false);
        f.config.add_y_attribute("nId".into());
        assert_eq!(f.config.y_attribute_ids(), vec!["yId", "nId"]);
        assert_eq!(f.config.number_of_plots(), 2);
        assert_eq!(f.config.roles_for_attribute("nId"), vec![Role::YPlus]);

        f.config.set_attribute(Role::RightNumeric, Some("yId".into()), false);
        assert!(f.config.has_y2_attribute());
        assert_eq!(f.config.number_of_plots(), 3);
        assert_eq!(f.config.y_attribute_id(2), "yId");
        assert_eq!(f.config.y_attribute_id(7), "");

        f.config.remove_y_attribute_with_id("yId");
        assert_eq!(f.config.y_attribute_ids(), vec!["nId", "yId"]);
        assert_eq!(f.config.number_of_plots(), 2);

        f.config.clear_attributes();
        assert!(f.config.is_empty());
        assert_eq!(f.config.number_of_plots(), 1);
    }

    #[test]
    fn test_replace_y_attribute() {
        let f = fixture();
        f.config
            .set_attribute(Role::Y, Some(AttributeBinding::with_type("yId", AttributeType::Categorical)), false);
        f.config.replace_y_attribute("yId", "xId");
        let y = f.config.y_bindings_excluding_y2();
        assert_eq!(y, vec![AttributeBinding::new("xId")]);
        assert_eq!(ids(&f.config.case_data_array()), vec!["c1", "c2"]);

        f.config.add_y_attribute("yId".into());
        f.config.replace_y_attribute("xId", "yId");
        assert_eq!(f.config.y_attribute_ids(), vec!["yId"]);
    }

    #[test]
    fn test_removed_attribute_is_unbound() {
        let f = fixture();
        f.config.set_attribute(Role::X, Some("xId".into()), false);
        f.config.set_attribute(Role::Y, Some("yId".into()), false);
        f.config.set_attribute(Role::Legend, Some("yId".into()), false);
        f.data.remove_attribute("yId").unwrap();
        assert_eq!(f.config.attribute_id(Role::Y), None);
        assert_eq!(f.config.attribute_id(Role::Legend), None);
        assert_eq!(ids(&f.config.case_data_array()), vec!["c1", "c2"]);
    }

    #[test]
    fn test_members_of_a_deleted_attribute_are_removed() {
        let f = fixture();
        f.config.set_attribute(Role::X, Some("xId".into()), false);
        f.config.set_attribute(Role::Y, Some("yId".into()), false);
        assert_eq!(ids(&f.config.case_data_array()), vec!["c1"]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _guard = f
            .config
            .signals()
            .cases_changed
            .connect_scoped(move |changed: &CasesChanged| sink.lock().push(changed.changes.clone()));
        f.data.remove_attribute("xId").unwrap();

        assert_eq!(*seen.lock(), vec![ChangedCases {
            removed: vec!["c1".into()],
            ..Default::default()
        }]);
        assert_eq!(f.config.attribute_id(Role::X), None);
        assert_eq!(ids(&f.config.case_data_array()), vec!["c1", "c3"]);
    }

    #[test]
    fn test_set_case_values_is_split_into_notifications() {
        let f = fixture();
        f.config.set_attribute(Role::X, Some("xId".into()), false);
        f.config.set_attribute(Role::Y, Some("yId".into()), false);
        assert_eq!(ids(&f.config.case_data_array()), vec!["c1"]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _disposer = f.config.on_action(Box::new(move |action| {
            seen_clone.lock().push(action.clone());
        }));

        f.data
            .set_case_values(vec![
                CaseValues::new("c1").with("xId", f64::NAN),
                CaseValues::new("c2").with("yId", 2.0),
            ])
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(matches!(&seen[0], DatasetAction::AddCases(cases) if cases[0].id == "c2"));
        assert_eq!(seen[1], DatasetAction::RemoveCases(vec!["c1".into()]));
        assert_eq!(ids(&f.config.case_data_array()), vec!["c2"]);
    }

    #[test]
    fn test_cases_changed_signal() {
        let f = fixture();
        f.config.set_attribute(Role::X, Some("xId".into()), false);
        f.config.case_data_array();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        f.config.signals().cases_changed.connect(move |changed| {
            seen_clone.lock().push(changed.clone());
        });
        f.data.set_case_values(vec![CaseValues::new("c1").with("xId", 9.0)]).unwrap();
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].changes.changed, vec!["c1"]);
    }

    #[test]
    fn test_attributes_changed_signal() {
        let f = fixture();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        f.config.signals().attributes_changed.connect(move |a| {
            seen_clone.lock().push(a.clone());
        });
        f.config.set_attribute(Role::X, Some("xId".into()), false);
        f.config.remove_attribute_from_role(Role::X);
        assert_eq!(
            *seen.lock(),
            vec![
                AttributeAssignment { role: Role::X, attribute_id: Some("xId".into()) },
                AttributeAssignment { role: Role::X, attribute_id: None },
            ]
        );
    }

    #[test]
    fn test_categories_and_swap() {
        let f = fixture();
        f.config.set_attribute(Role::Y, Some("nId".into()), false);
        assert_eq!(f.config.category_array(Role::Y), vec!["n1", "n3"]);
        assert_eq!(f.config.category_array(Role::TopSplit), vec![MAIN_CATEGORY]);
        assert_eq!(f.config.num_repetitions_for_place(GraphPlace::Left), 1);

        f.config.swap_categories_for_attr_role(Role::Y, 1, 0);
        assert_eq!(f.config.category_array(Role::Y), vec!["n3", "n1"]);
    }

    #[test]
    fn test_legend_colors() {
        let f = fixture();
        f.config.set_attribute(Role::Legend, Some("nId".into()), false);
        let categorical = f.config.legend_color_for_case("c1");
        assert_eq!(categorical, f.config.legend_color_for_category("n1"));
        assert_eq!(f.config.legend_color_for_category("zzz"), MISSING_COLOR);

        f.config.set_attribute(Role::Legend, Some("xId".into()), false);
        let scale = f.config.legend_quantile_scale();
        assert_eq!(scale.quantiles().len(), 4);
        assert!(!f.config.legend_color_for_case("c2").is_empty());
    }

    #[test]
    fn test_legend_selection() {
        let f = fixture();
        f.config.set_attribute(Role::Legend, Some("nId".into()), false);
        f.config.select_cases_for_legend_value("n3", false);
        assert_eq!(f.data.case_selection(), vec!["c3"]);
        assert!(f.config.all_cases_for_category_are_selected("n3"));
        assert!(!f.config.all_cases_for_category_are_selected("n1"));
        assert_eq!(f.config.case_selection(), vec!["c3"]);
    }

    #[test]
    fn test_drop_rules() {
        let f = fixture();
        let source: Arc<dyn Dataset> = f.data.clone();
        f.config.set_attribute(Role::X, Some("xId".into()), false);
        let ds = Some(source.as_ref());
        assert!(f.config.graph_place_can_accept_attribute_id_drop(GraphPlace::YPlus, ds, Some("yId")));
        assert!(!f.config.graph_place_can_accept_attribute_id_drop(GraphPlace::YPlus, ds, Some("nId")));
        assert!(!f.config.graph_place_can_accept_attribute_id_drop(GraphPlace::Bottom, ds, Some("xId")));
        assert!(f.config.graph_place_can_accept_attribute_id_drop(GraphPlace::Top, ds, Some("nId")));
        assert!(!f.config.graph_place_can_accept_attribute_id_drop(GraphPlace::Top, ds, Some("yId")));
        assert!(!f.config.graph_place_can_accept_attribute_id_drop(GraphPlace::Left, ds, None));
    }

    #[test]
    fn test_place_queries() {
        let f = fixture();
        assert!(f.config.place_can_have_zero_extent(GraphPlace::Legend));
        assert!(!f.config.place_can_have_zero_extent(GraphPlace::Left));
        assert!(f.config.place_should_show_click_here_cue(GraphPlace::Left, false));
        f.config.set_attribute(Role::X, Some("xId".into()), false);
        assert!(!f.config.place_should_show_click_here_cue(GraphPlace::Left, false));
        assert!(f.config.place_should_show_click_here_cue(GraphPlace::Left, true));
        f.config.set_primary_role(Role::X);
        assert!(f.config.categories_for_axis_should_be_centered(AxisPlace::Bottom));
        assert!(!f.config.categories_for_axis_should_be_centered(AxisPlace::Left));
        assert!(f.config.categories_for_axis_should_be_centered(AxisPlace::Top));
    }

    #[test]
    fn test_tip_attributes() {
        let f = fixture();
        f.config.set_attribute(Role::X, Some("nId".into()), false);
        f.config.set_attribute(Role::Y, Some("yId".into()), false);
        assert_eq!(
            f.config.tip_attributes(),
            vec![(Role::X, "nId".into()), (Role::Y, "yId".into()), (Role::Caption, "nId".into())]
        );
        assert_eq!(
            f.config.unique_tip_attributes(),
            vec![(Role::Y, "yId".into()), (Role::Caption, "nId".into())]
        );
    }

    #[test]
    fn test_snapshot_round_trip() {
        let f = fixture();
        f.config.set_attribute(Role::X, Some("xId".into()), false);
        f.config.set_primary_role(Role::X);
        let json = serde_json::to_value(f.config.snapshot()).unwrap();
        assert_eq!(json["primaryRole"], "x");
        assert_eq!(json["attributeDescriptions"]["x"]["attributeID"], "xId");

        let restored = DataConfiguration::from_snapshot(serde_json::from_value(json).unwrap());
        assert_eq!(restored.x_attribute_id().as_deref(), Some("xId"));
    }

    #[test]
    fn test_detached_dataset_degrades_to_empty() {
        let f = fixture();
        f.config.set_attribute(Role::X, Some("xId".into()), false);
        let config = f.config.clone();
        drop(f);
        assert!(config.case_data_array().is_empty());
        assert!(config.numeric_values_for_attr_role(Role::X).is_empty());
        assert_eq!(config.category_array(Role::X), vec![MAIN_CATEGORY]);
    }

    #[test]
    fn test_clear_attributes_unbinds_series_then_roles() {
        let f = fixture();
        f.config.set_attribute(Role::Y, Some("yId".into()), false);
        f.config.add_y_attribute("xId".into());
        f.config.set_attribute(Role::Legend, Some("nId".into()), false);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _guard = f
            .config
            .signals()
            .attributes_changed
            .connect_scoped(move |a: &AttributeAssignment| sink.lock().push(a.role));

        f.config.clear_attributes();
        assert!(f.config.is_empty());
        assert_eq!(*seen.lock(), vec![Role::Y, Role::Y, Role::Legend]);
        assert_eq!(f.config.number_of_plots(), 1);
        assert_eq!(ids(&f.config.case_data_array()), vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_membership_matches_filter_case_after_mutations() {
        let f = fixture();
        f.config.set_attribute(Role::X, Some("xId".into()), false);
        f.config.set_attribute(Role::Y, Some("yId".into()), false);
        f.config.case_data_array();

        f.data
            .set_case_values(vec![CaseValues::new("c2").with("yId", 2.0), CaseValues::new("c1").with("xId", "")])
            .unwrap();
        f.data
            .add_cases(vec![CaseValues::new("c4").with("xId", 4.0).with("yId", 4.0)])
            .unwrap();
        f.data.remove_cases(&["c3"]);

        let source = f.config.dataset().unwrap();
        let expected: Vec<String> = source
            .cases()
            .into_iter()
            .filter(|id| f.config.filter_case(source.as_ref(), id, 0))
            .collect();
        assert_eq!(expected, vec!["c2", "c4"]);
        assert_eq!(f.config.filtered_cases(0).unwrap().case_ids(), expected);
    }
}
