//! Plot adornments that keep per-cell state.
//!
//! An adornment (a movable line, say) draws once in every facet cell. When
//! the axes or the split categories change, the controller hands each
//! adornment an [`UpdateCategoriesOptions`] so it can create state for new
//! cells, keyed by [`SubPlotKey::instance_key`].

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use plotweave_core::PerfSpan;
use plotweave_core::logging::{span_names, targets};

use super::sub_plot_key::{FacetDimension, FacetGrid, SubPlotKey};
use crate::graph::{AxisModel, compute_slope_and_intercept};

/// Adornment type of [`MovableLineAdornment`].
pub const MOVABLE_LINE_TYPE: &str = "Movable Line";

static NEXT_ADORNMENT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_id(prefix: &str) -> String {
    format!("{prefix}{}", NEXT_ADORNMENT_ID.fetch_add(1, Ordering::Relaxed))
}

/// What an adornment needs to know to lay out its cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateCategoriesOptions {
    /// The bottom axis.
    pub x_axis: Option<AxisModel>,
    /// The left axis.
    pub y_axis: Option<AxisModel>,
    /// Attribute on x.
    pub x_attribute_id: Option<String>,
    /// Categories of a categorical x axis; empty otherwise.
    pub x_cats: Vec<String>,
    /// Attribute on y.
    pub y_attribute_id: Option<String>,
    /// Categories of a categorical y axis; empty otherwise.
    pub y_cats: Vec<String>,
    /// Column split attribute.
    pub top_attribute_id: Option<String>,
    /// Column split categories.
    pub top_cats: Vec<String>,
    /// Row split attribute.
    pub right_attribute_id: Option<String>,
    /// Row split categories.
    pub right_cats: Vec<String>,
    /// Discard existing per-cell state.
    pub reset_points: bool,
}

impl UpdateCategoriesOptions {
    /// The facet grid the options describe.
    pub fn grid(&self) -> FacetGrid {
        FacetGrid::with_axes(
            FacetDimension::new(self.x_attribute_id.clone(), self.x_cats.clone()),
            FacetDimension::new(self.top_attribute_id.clone(), self.top_cats.clone()),
            FacetDimension::new(self.y_attribute_id.clone(), self.y_cats.clone()),
            FacetDimension::new(self.right_attribute_id.clone(), self.right_cats.clone()),
        )
    }

    /// Number of cells.
    pub fn cell_count(&self) -> usize {
        self.grid().cell_count()
    }

    /// Key of cell `index`.
    pub fn sub_plot_key(&self, index: usize) -> SubPlotKey {
        self.grid().key_for_index(index)
    }
}

/// Something drawn on top of the plot.
pub trait Adornment: Send + Sync + fmt::Debug {
    /// Unique id.
    fn id(&self) -> &str;

    /// Type name, shared by all adornments of a kind.
    fn adornment_type(&self) -> &'static str;

    /// Whether it is drawn.
    fn is_visible(&self) -> bool;

    /// Show or hide it.
    fn set_visibility(&mut self, visible: bool);

    /// Bring per-cell state in line with the axes and split categories.
    fn update_categories(&mut self, options: &UpdateCategoriesOptions);

    /// Ids of the parts other tiles may annotate.
    fn annotation_ids(&self) -> Vec<String> {
        Vec::new()
    }

    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcasting support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A point in data coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X.
    pub x: f64,
    /// Y.
    pub y: f64,
}

impl Point {
    /// A point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// A point that is never drawn.
    pub const INFINITE: Point = Point {
        x: f64::INFINITY,
        y: f64::INFINITY,
    };

    /// Whether both coordinates are finite.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::INFINITE
    }
}

/// Which part of a movable line an annotation points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePart {
    /// A drag handle.
    Handle,
    /// The equation label.
    Equation,
}

/// Which handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlePosition {
    /// Near the lower end.
    Lower,
    /// Near the upper end.
    Upper,
}

/// Annotation id of part of a line.
pub fn annotation_id(line_key: &str, part: LinePart, position: Option<HandlePosition>) -> String {
    let part = match part {
        LinePart::Handle => "handle",
        LinePart::Equation => "equation",
    };
    match position {
        Some(HandlePosition::Lower) => format!("movable_line_{part}:{line_key}:lower"),
        Some(HandlePosition::Upper) => format!("movable_line_{part}:{line_key}:upper"),
        None => format!("movable_line_{part}:{line_key}"),
    }
}

/// One movable line. Dragging changes the `drag_*` values; saving commits
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovableLine {
    /// Saved intercept.
    pub intercept: f64,
    /// Saved slope.
    pub slope: f64,
    /// Saved position of the equation label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equation_coords: Option<Point>,
    #[serde(skip)]
    is_selected: bool,
    #[serde(skip)]
    pivot1: Point,
    #[serde(skip)]
    pivot2: Point,
    #[serde(skip)]
    drag_equation_coords: Option<Point>,
    #[serde(skip)]
    drag_intercept: Option<f64>,
    #[serde(skip)]
    drag_slope: Option<f64>,
}

impl MovableLine {
    /// A line with no drag in progress.
    pub fn new(intercept: f64, slope: f64) -> Self {
        Self {
            intercept,
            slope,
            equation_coords: None,
            is_selected: false,
            pivot1: Point::INFINITE,
            pivot2: Point::INFINITE,
            drag_equation_coords: None,
            drag_intercept: None,
            drag_slope: None,
        }
    }

    /// Intercept, including an uncommitted drag.
    pub fn current_intercept(&self) -> f64 {
        self.drag_intercept.unwrap_or(self.intercept)
    }

    /// Slope, including an uncommitted drag.
    pub fn current_slope(&self) -> f64 {
        self.drag_slope.unwrap_or(self.slope)
    }

    /// Equation label position, including an uncommitted drag.
    pub fn current_equation_coords(&self) -> Option<Point> {
        self.drag_equation_coords
            .or(self.equation_coords.filter(Point::is_valid))
    }

    /// Whether the line is selected.
    pub fn is_selected(&self) -> bool {
        self.is_selected
    }

    /// First pivot.
    pub fn pivot1(&self) -> Point {
        self.pivot1
    }

    /// Second pivot.
    pub fn pivot2(&self) -> Point {
        self.pivot2
    }

    /// Set the first pivot.
    pub fn set_pivot1(&mut self, point: Point) {
        self.pivot1 = point;
    }

    /// Set the second pivot.
    pub fn set_pivot2(&mut self, point: Point) {
        self.pivot2 = point;
    }

    /// Start or continue dragging the line.
    pub fn set_drag(&mut self, intercept: f64, slope: f64) {
        self.drag_intercept = Some(intercept);
        self.drag_slope = Some(slope);
    }

    /// Start or continue dragging the equation label.
    pub fn set_drag_equation_coords(&mut self, coords: Point) {
        self.drag_equation_coords = Some(coords);
    }

    /// Commit a drag of the line.
    pub fn save(&mut self) {
        if let Some(intercept) = self.drag_intercept.take() {
            self.intercept = intercept;
        }
        if let Some(slope) = self.drag_slope.take() {
            self.slope = slope;
        }
    }

    /// Commit a drag of the equation label.
    pub fn save_equation_coords(&mut self) {
        if let Some(coords) = self.drag_equation_coords.take() {
            self.equation_coords = Some(coords);
        }
    }
}

/// User-positioned straight lines, one per facet cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovableLineAdornment {
    id: String,
    #[serde(default = "visible")]
    is_visible: bool,
    lines: BTreeMap<String, MovableLine>,
}

fn visible() -> bool {
    true
}

impl MovableLineAdornment {
    /// No lines.
    pub fn new() -> Self {
        Self {
            id: unique_id("ADRN"),
            is_visible: true,
            lines: BTreeMap::new(),
        }
    }

    /// One line spanning the given axes, under a fresh key.
    pub fn with_default_line(x_axis: Option<&AxisModel>, y_axis: Option<&AxisModel>) -> Self {
        let mut adornment = Self::new();
        adornment.add_line(x_axis, y_axis);
        adornment
    }

    /// The lines by key.
    pub fn lines(&self) -> &BTreeMap<String, MovableLine> {
        &self.lines
    }

    /// One line.
    pub fn line(&self, key: &str) -> Option<&MovableLine> {
        self.lines.get(key)
    }

    /// Reset the line at `key` to span the axes.
    pub fn set_line(&mut self, x_axis: Option<&AxisModel>, y_axis: Option<&AxisModel>, key: &str) {
        let (slope, intercept) = compute_slope_and_intercept(x_axis, y_axis);
        self.lines.insert(key.to_string(), MovableLine::new(intercept, slope));
    }

    /// Add a line under a fresh key. Returns the key.
    pub fn add_line(&mut self, x_axis: Option<&AxisModel>, y_axis: Option<&AxisModel>) -> String {
        let key = unique_id("LINE");
        self.set_line(x_axis, y_axis, &key);
        key
    }

    /// Remove a line.
    pub fn delete_line(&mut self, key: &str) -> Option<MovableLine> {
        self.lines.remove(key)
    }

    /// Drag a line to a new intercept and slope.
    pub fn drag_line(&mut self, intercept: f64, slope: f64, key: &str) {
        if let Some(line) = self.lines.get_mut(key) {
            line.set_drag(intercept, slope);
        }
    }

    /// Commit a line drag.
    pub fn save_line(&mut self, key: &str) {
        if let Some(line) = self.lines.get_mut(key) {
            line.save();
        }
    }

    /// Drag a line's equation label.
    pub fn drag_equation(&mut self, coords: Point, key: &str) {
        if let Some(line) = self.lines.get_mut(key) {
            line.set_drag_equation_coords(coords);
        }
    }

    /// Commit an equation label drag.
    pub fn save_equation_coords(&mut self, key: &str) {
        if let Some(line) = self.lines.get_mut(key) {
            line.save_equation_coords();
        }
    }

    /// Toggle selection of `key` and deselect every other line. `None`
    /// deselects everything.
    pub fn toggle_selected(&mut self, key: Option<&str>) {
        for (line_key, line) in self.lines.iter_mut() {
            if Some(line_key.as_str()) == key {
                line.is_selected = !line.is_selected;
            } else {
                line.is_selected = false;
            }
        }
    }

    /// Remove every selected line.
    pub fn delete_selected(&mut self) {
        self.lines.retain(|_, line| !line.is_selected);
    }

    /// Whether any line is selected.
    pub fn has_selected_instances(&self) -> bool {
        self.lines.values().any(MovableLine::is_selected)
    }
}

impl Default for MovableLineAdornment {
    fn default() -> Self {
        Self::new()
    }
}

impl Adornment for MovableLineAdornment {
    fn id(&self) -> &str {
        &self.id
    }

    fn adornment_type(&self) -> &'static str {
        MOVABLE_LINE_TYPE
    }

    fn is_visible(&self) -> bool {
        self.is_visible
    }

    fn set_visibility(&mut self, visible: bool) {
        self.is_visible = visible;
    }

    fn update_categories(&mut self, options: &UpdateCategoriesOptions) {
        let _span = PerfSpan::new(span_names::UPDATE_CATEGORIES);
        let grid = options.grid();
        let mut created = 0;
        for index in 0..grid.cell_count() {
            let key = grid.key_for_index(index).instance_key();
            if options.reset_points || !self.lines.contains_key(&key) {
                self.set_line(options.x_axis.as_ref(), options.y_axis.as_ref(), &key);
                created += 1;
            }
        }
        tracing::debug!(
            target: targets::FACET,
            adornment = %self.id,
            cells = options.cell_count(),
            created,
            "movable lines updated"
        );
    }

    fn annotation_ids(&self) -> Vec<String> {
        if !self.is_visible {
            return Vec::new();
        }
        self.lines
            .keys()
            .flat_map(|key| {
                [
                    annotation_id(key, LinePart::Handle, Some(HandlePosition::Lower)),
                    annotation_id(key, LinePart::Handle, Some(HandlePosition::Upper)),
                    annotation_id(key, LinePart::Equation, None),
                ]
            })
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NumericAxis;

    fn axes() -> (AxisModel, AxisModel) {
        (
            AxisModel::Numeric(NumericAxis::new(0.0, 10.0)),
            AxisModel::Numeric(NumericAxis::new(0.0, 10.0)),
        )
    }

    fn two_lines() -> MovableLineAdornment {
        let (x, y) = axes();
        let mut adornment = MovableLineAdornment::new();
        adornment.set_line(Some(&x), Some(&y), "line1");
        adornment.set_line(Some(&x), Some(&y), "line2");
        adornment
    }

    #[test]
    fn test_line_drag_and_save() {
        let mut line = MovableLine::new(1.0, 1.0);
        assert_eq!(line.current_equation_coords(), None);
        assert!(!line.pivot1().is_valid());
        line.set_drag(2.0, 3.0);
        assert_eq!(line.intercept, 1.0);
        assert_eq!(line.current_intercept(), 2.0);
        assert_eq!(line.current_slope(), 3.0);
        line.save();
        assert_eq!((line.intercept, line.slope), (2.0, 3.0));

        line.set_drag(0.0, 0.0);
        line.save();
        assert_eq!((line.intercept, line.slope), (0.0, 0.0));
    }

    #[test]
    fn test_equation_coords() {
        let mut line = MovableLine::new(1.0, 1.0);
        line.set_drag_equation_coords(Point::new(50.0, 50.0));
        assert_eq!(line.current_equation_coords(), Some(Point::new(50.0, 50.0)));
        assert_eq!(line.equation_coords, None);
        line.save_equation_coords();
        assert_eq!(line.equation_coords, Some(Point::new(50.0, 50.0)));
    }

    #[test]
    fn test_set_line_spans_axes() {
        let adornment = two_lines();
        let line = adornment.line("line1").unwrap();
        assert_eq!(line.intercept, 0.0);
        assert_eq!(line.slope, 2.0);
        assert_eq!(adornment.lines().len(), 2);
    }

    #[test]
    fn test_single_selection() {
        let mut adornment = two_lines();
        assert!(!adornment.has_selected_instances());
        adornment.toggle_selected(Some("line1"));
        assert!(adornment.line("line1").unwrap().is_selected());
        adornment.toggle_selected(Some("line2"));
        assert!(!adornment.line("line1").unwrap().is_selected());
        assert!(adornment.line("line2").unwrap().is_selected());
        adornment.toggle_selected(None);
        assert!(!adornment.has_selected_instances());
    }

    #[test]
    fn test_delete() {
        let mut adornment = two_lines();
        assert!(adornment.delete_line("line1").is_some());
        assert_eq!(adornment.lines().len(), 1);

        let mut adornment = two_lines();
        adornment.toggle_selected(Some("line1"));
        adornment.delete_selected();
        assert!(adornment.line("line1").is_none());
        assert!(adornment.line("line2").is_some());
    }

    #[test]
    fn test_drag_through_adornment() {
        let mut adornment = two_lines();
        adornment.drag_line(2.0, 3.0, "line1");
        adornment.save_line("line1");
        adornment.drag_equation(Point::new(5.0, 6.0), "line1");
        adornment.save_equation_coords("line1");
        let line = adornment.line("line1").unwrap();
        assert_eq!((line.intercept, line.slope), (2.0, 3.0));
        assert_eq!(line.equation_coords, Some(Point::new(5.0, 6.0)));
        adornment.drag_line(9.0, 9.0, "missing");
    }

    #[test]
    fn test_update_categories_creates_one_line_per_cell() {
        let (x, y) = axes();
        let mut adornment = MovableLineAdornment::new();
        let mut options = UpdateCategoriesOptions {
            x_axis: Some(x),
            y_axis: Some(y),
            top_attribute_id: Some("t".into()),
            top_cats: vec!["a".into(), "b".into()],
            right_attribute_id: Some("r".into()),
            right_cats: vec!["c".into(), "d".into(), "e".into()],
            ..Default::default()
        };
        adornment.update_categories(&options);
        assert_eq!(adornment.lines().len(), 6);
        let key = SubPlotKey::new().with("t", "b").with("r", "c").instance_key();
        assert!(adornment.line(&key).is_some());

        adornment.drag_line(4.0, 4.0, &key);
        adornment.save_line(&key);
        adornment.update_categories(&options);
        assert_eq!(adornment.line(&key).unwrap().intercept, 4.0);

        options.reset_points = true;
        adornment.update_categories(&options);
        assert_eq!(adornment.line(&key).unwrap().intercept, 0.0);
    }

    #[test]
    fn test_categorical_axis_gets_a_line_per_category() {
        let mut adornment = MovableLineAdornment::new();
        let options = UpdateCategoriesOptions {
            x_axis: Some(AxisModel::Categorical {
                categories: vec!["oak".into(), "elm".into()],
            }),
            y_axis: Some(AxisModel::Categorical {
                categories: vec!["north".into(), "south".into()],
            }),
            x_attribute_id: Some("species".into()),
            x_cats: vec!["oak".into(), "elm".into()],
            y_attribute_id: Some("site".into()),
            y_cats: vec!["north".into(), "south".into()],
            top_attribute_id: Some("year".into()),
            top_cats: vec!["2023".into(), "2024".into()],
            ..Default::default()
        };
        assert_eq!(options.cell_count(), 8);
        adornment.update_categories(&options);
        assert_eq!(adornment.lines().len(), 8);
        let key = SubPlotKey::new()
            .with("species", "elm")
            .with("site", "south")
            .with("year", "2024")
            .instance_key();
        assert!(adornment.line(&key).is_some());
    }

    #[test]
    fn test_unsplit_plot_has_one_line() {
        let mut adornment = MovableLineAdornment::new();
        adornment.update_categories(&UpdateCategoriesOptions::default());
        assert_eq!(adornment.lines().keys().collect::<Vec<_>>(), vec!["{}"]);
    }

    #[test]
    fn test_annotation_ids() {
        assert_eq!(
            annotation_id("k", LinePart::Handle, Some(HandlePosition::Lower)),
            "movable_line_handle:k:lower"
        );
        assert_eq!(annotation_id("k", LinePart::Equation, None), "movable_line_equation:k");

        let mut adornment = two_lines();
        assert_eq!(adornment.annotation_ids().len(), 6);
        adornment.set_visibility(false);
        assert!(adornment.annotation_ids().is_empty());
    }

    #[test]
    fn test_snapshot_skips_drag_state() {
        let mut adornment = two_lines();
        adornment.drag_line(7.0, 7.0, "line1");
        let json = serde_json::to_value(&adornment).unwrap();
        assert_eq!(json["lines"]["line1"], serde_json::json!({"intercept": 0.0, "slope": 2.0}));
        let back: MovableLineAdornment = serde_json::from_value(json).unwrap();
        assert_eq!(back.line("line1").unwrap().current_intercept(), 0.0);
    }

    #[test]
    fn test_downcast() {
        let boxed: Box<dyn Adornment> = Box::new(MovableLineAdornment::new());
        assert_eq!(boxed.adornment_type(), MOVABLE_LINE_TYPE);
        assert!(boxed.as_any().downcast_ref::<MovableLineAdornment>().is_some());
    }
}
