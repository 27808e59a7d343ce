//! Pixel layout of the graph tile.
//!
//! Each place (axes, legend, plot) asks for a desired extent: a width for
//! vertical strips, a height for horizontal ones. Given the parent size, the
//! layout carves the tile into rectangles, leaving what remains to the plot.
//!
//! The rectangles are a pure function of the extents and the parent size.
//! They are cached in a [`Binding`] and recomputed after any input change.
//! The layout also owns one [`AxisScale`] per axis place and keeps each
//! scale's length in step with the plot rectangle.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use plotweave_core::logging::targets;
use plotweave_core::{Binding, Signal};

use super::place::{AxisPlace, GraphPlace};
use super::scale::{AxisScale, Orientation, ScaleType};

/// Default parent width.
pub const DEFAULT_GRAPH_WIDTH: f64 = 480.0;
/// Default parent height.
pub const DEFAULT_GRAPH_HEIGHT: f64 = 300.0;
/// Extent of the top and right strips in the standard layout.
pub const TOP_AND_RIGHT_DEFAULT_EXTENT: f64 = 12.0;
/// Length of an axis tick.
pub const AXIS_TICK_LENGTH: f64 = 4.0;
/// Gap between a tick and its label.
pub const AXIS_TICK_PADDING: f64 = 5.0;
/// Left of the legend strip.
const LEGEND_INSET: f64 = 6.0;

/// A rectangle in tile coordinates. Width and height are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Bounds {
    /// A rectangle; negative or non-finite sizes become zero.
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width: non_negative(width),
            height: non_negative(height),
        }
    }

    /// The empty rectangle at the origin.
    pub const ZERO: Bounds = Bounds {
        left: 0.0,
        top: 0.0,
        width: 0.0,
        height: 0.0,
    };

    /// Whether the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

/// Computed rectangles for every place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutBounds {
    places: BTreeMap<GraphPlace, Bounds>,
}

impl LayoutBounds {
    /// Every place zero-sized.
    pub fn zero() -> Self {
        Self {
            places: GraphPlace::ALL.iter().map(|p| (*p, Bounds::ZERO)).collect(),
        }
    }

    /// The rectangle of a place.
    pub fn get(&self, place: GraphPlace) -> Bounds {
        self.places.get(&place).copied().unwrap_or_default()
    }

    /// All rectangles.
    pub fn iter(&self) -> impl Iterator<Item = (GraphPlace, Bounds)> + '_ {
        self.places.iter().map(|(p, b)| (*p, *b))
    }

    /// Whether every place is zero-sized.
    pub fn is_collapsed(&self) -> bool {
        self.places.values().all(|b| *b == Bounds::ZERO)
    }
}

/// Default extents and parent size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    /// Extent used by a place until it asks for one. Missing places use 0.
    pub extents: BTreeMap<GraphPlace, f64>,
    /// Initial parent width.
    pub width: f64,
    /// Initial parent height.
    pub height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            extents: BTreeMap::new(),
            width: DEFAULT_GRAPH_WIDTH,
            height: DEFAULT_GRAPH_HEIGHT,
        }
    }
}

impl LayoutConfig {
    /// Room for labelled axes on the left and bottom and thin strips on the
    /// top and right.
    pub fn standard() -> Self {
        let labelled = 20.0 + AXIS_TICK_LENGTH + AXIS_TICK_PADDING;
        let extents = [
            (GraphPlace::Top, TOP_AND_RIGHT_DEFAULT_EXTENT),
            (GraphPlace::RightCat, TOP_AND_RIGHT_DEFAULT_EXTENT),
            (GraphPlace::RightNumeric, TOP_AND_RIGHT_DEFAULT_EXTENT),
            (GraphPlace::Left, labelled),
            (GraphPlace::Bottom, labelled),
            (GraphPlace::Legend, 0.0),
        ];
        Self {
            extents: extents.into_iter().collect(),
            ..Self::default()
        }
    }

    /// The default extent of a place.
    pub fn default_extent(&self, place: GraphPlace) -> f64 {
        self.extents.get(&place).copied().unwrap_or(0.0)
    }
}

/// Lay out a `width` × `height` tile.
///
/// If the plot would be narrower or shorter than one pixel every place is
/// zero-sized.
pub fn compute_layout(width: f64, height: f64, extent: impl Fn(GraphPlace) -> f64) -> LayoutBounds {
    let legend = extent(GraphPlace::Legend);
    let top = extent(GraphPlace::Top);
    let left = extent(GraphPlace::Left);
    let bottom = extent(GraphPlace::Bottom);
    let right_numeric = extent(GraphPlace::RightNumeric);
    let right_cat = extent(GraphPlace::RightCat);
    let plot_width = width - left - right_numeric - right_cat;
    let plot_height = height - top - bottom - legend;

    if !(plot_width >= 1.0 && plot_height >= 1.0) {
        return LayoutBounds::zero();
    }

    let places = [
        (GraphPlace::Left, Bounds::new(0.0, top, left, plot_height)),
        (GraphPlace::Top, Bounds::new(left, 0.0, width - left - right_cat, top)),
        (GraphPlace::Plot, Bounds::new(left, top, plot_width, plot_height)),
        (GraphPlace::Bottom, Bounds::new(left, top + plot_height, plot_width, bottom)),
        (GraphPlace::Legend, Bounds::new(LEGEND_INSET, height - legend, width - LEGEND_INSET, legend)),
        (GraphPlace::RightNumeric, Bounds::new(left + plot_width, top, right_numeric, plot_height)),
        (GraphPlace::RightCat, Bounds::new(left + plot_width, top, right_cat, plot_height)),
        (GraphPlace::YPlus, Bounds::new(0.0, top, left, plot_height)),
    ];
    LayoutBounds {
        places: places.into_iter().collect(),
    }
}

#[derive(Debug)]
struct LayoutInputs {
    width: f64,
    height: f64,
    desired: BTreeMap<GraphPlace, f64>,
    config: LayoutConfig,
}

impl LayoutInputs {
    fn extent(&self, place: GraphPlace) -> f64 {
        self.desired
            .get(&place)
            .copied()
            .unwrap_or_else(|| self.config.default_extent(place))
    }
}

/// The layout of one graph tile.
pub struct GraphLayout {
    inputs: Arc<RwLock<LayoutInputs>>,
    bounds: Binding<LayoutBounds>,
    scales: RwLock<BTreeMap<AxisPlace, AxisScale>>,
    axis_bounds: RwLock<BTreeMap<AxisPlace, Bounds>>,
    /// Emitted when the computed rectangles change.
    pub bounds_changed: Signal<()>,
    /// Emitted when a scale's type, domain or categories change.
    pub scale_changed: Signal<AxisPlace>,
}

impl GraphLayout {
    /// A layout with the given defaults.
    pub fn new(config: LayoutConfig) -> Self {
        let inputs = Arc::new(RwLock::new(LayoutInputs {
            width: non_negative(config.width),
            height: non_negative(config.height),
            desired: BTreeMap::new(),
            config,
        }));
        let source = Arc::clone(&inputs);
        let bounds = Binding::new(move || {
            let inputs = source.read();
            compute_layout(inputs.width, inputs.height, |place| inputs.extent(place))
        });
        let scales = AxisPlace::ALL
            .iter()
            .map(|place| {
                let orientation = if place.is_vertical() {
                    Orientation::Vertical
                } else {
                    Orientation::Horizontal
                };
                (*place, AxisScale::new(orientation))
            })
            .collect();
        let layout = Self {
            inputs,
            bounds,
            scales: RwLock::new(scales),
            axis_bounds: RwLock::new(BTreeMap::new()),
            bounds_changed: Signal::new(),
            scale_changed: Signal::new(),
        };
        layout.update_scale_ranges();
        layout
    }

    /// Parent width.
    pub fn graph_width(&self) -> f64 {
        self.inputs.read().width
    }

    /// Parent height.
    pub fn graph_height(&self) -> f64 {
        self.inputs.read().height
    }

    /// The extent a place currently gets: its desired extent if it set one,
    /// else its configured default. An explicit 0 is kept.
    pub fn desired_extent(&self, place: GraphPlace) -> f64 {
        self.inputs.read().extent(place)
    }

    /// Ask for `extent` pixels for `place`.
    pub fn set_desired_extent(&self, place: GraphPlace, extent: f64) {
        let extent = non_negative(extent);
        {
            let mut inputs = self.inputs.write();
            if inputs.desired.get(&place) == Some(&extent) {
                return;
            }
            inputs.desired.insert(place, extent);
        }
        tracing::trace!(target: targets::LAYOUT, %place, extent, "desired extent");
        self.inputs_changed();
    }

    /// Resize the parent.
    pub fn set_parent_extent(&self, width: f64, height: f64) {
        let (width, height) = (non_negative(width), non_negative(height));
        {
            let mut inputs = self.inputs.write();
            if inputs.width == width && inputs.height == height {
                return;
            }
            inputs.width = width;
            inputs.height = height;
        }
        tracing::debug!(target: targets::LAYOUT, width, height, "parent resized");
        self.inputs_changed();
    }

    fn inputs_changed(&self) {
        let before = self.bounds.get();
        self.bounds.invalidate();
        let after = self.bounds.get();
        self.update_scale_ranges();
        if before != after {
            if after.is_collapsed() {
                tracing::debug!(target: targets::LAYOUT, "plot too small, layout collapsed");
            }
            self.bounds_changed.emit(());
        }
    }

    /// All computed rectangles.
    pub fn layout_bounds(&self) -> LayoutBounds {
        self.bounds.get()
    }

    /// The computed rectangle of one place.
    pub fn computed_bounds(&self, place: GraphPlace) -> Bounds {
        self.bounds.get().get(place)
    }

    /// Plot width, or the parent width while the layout is collapsed.
    pub fn plot_width(&self) -> f64 {
        let width = self.computed_bounds(GraphPlace::Plot).width;
        if width > 0.0 { width } else { self.graph_width() }
    }

    /// Plot height, or the parent height less the legend while the layout
    /// is collapsed.
    pub fn plot_height(&self) -> f64 {
        let height = self.computed_bounds(GraphPlace::Plot).height;
        if height > 0.0 {
            height
        } else {
            non_negative(self.graph_height() - self.desired_extent(GraphPlace::Legend))
        }
    }

    /// Pixel length of the axis at `place`.
    pub fn axis_length(&self, place: AxisPlace) -> f64 {
        if place.is_vertical() {
            self.plot_height()
        } else {
            self.plot_width()
        }
    }

    fn update_scale_ranges(&self) {
        let (width, height) = (self.plot_width(), self.plot_height());
        let mut scales = self.scales.write();
        for (place, scale) in scales.iter_mut() {
            scale.set_length(if place.is_vertical() { height } else { width });
        }
    }

    /// A copy of the scale at `place`.
    pub fn axis_scale(&self, place: AxisPlace) -> AxisScale {
        let orientation = if place.is_vertical() {
            Orientation::Vertical
        } else {
            Orientation::Horizontal
        };
        self.scales
            .read()
            .get(&place)
            .cloned()
            .unwrap_or_else(|| AxisScale::new(orientation))
    }

    fn update_scale(&self, place: AxisPlace, update: impl FnOnce(&mut AxisScale) -> bool) -> bool {
        let changed = {
            let mut scales = self.scales.write();
            match scales.get_mut(&place) {
                Some(scale) => update(scale),
                None => false,
            }
        };
        if changed {
            self.scale_changed.emit(place);
        }
        changed
    }

    /// Change the scale type at `place`; its length is refreshed too.
    pub fn set_axis_scale_type(&self, place: AxisPlace, scale_type: ScaleType) -> bool {
        let length = self.axis_length(place);
        let changed = self.update_scale(place, |scale| {
            let changed = scale.set_scale_type(scale_type);
            scale.set_length(length);
            changed
        });
        if changed {
            tracing::debug!(target: targets::LAYOUT, %place, ?scale_type, "scale type");
        }
        changed
    }

    /// Set the numeric domain of the scale at `place`.
    pub fn set_axis_numeric_domain(&self, place: AxisPlace, domain: (f64, f64)) -> bool {
        self.update_scale(place, |scale| scale.set_numeric_domain(domain))
    }

    /// Set the categories of the scale at `place`.
    pub fn set_axis_categories(&self, place: AxisPlace, categories: Vec<String>) -> bool {
        self.update_scale(place, |scale| scale.set_categories(categories))
    }

    /// Record the measured rectangle of a rendered axis, or clear it.
    ///
    /// Rendered axes that draw grid lines span the plot, so their measured
    /// size is trimmed back to the axis strip.
    pub fn set_axis_bounds(&self, place: AxisPlace, bounds: Option<Bounds>) {
        let Some(mut bounds) = bounds else {
            self.axis_bounds.write().remove(&place);
            return;
        };
        let legend = self.desired_extent(GraphPlace::Legend);
        match place {
            AxisPlace::Bottom => {
                let room = self.graph_height() - self.axis_length(AxisPlace::Left) - legend;
                bounds.height = non_negative(bounds.height.min(room));
                bounds.top = self.plot_height();
            }
            AxisPlace::Left => {
                bounds.height = non_negative(bounds.height.min(self.graph_height() - legend));
                let plot_width = self.plot_width();
                if bounds.width > plot_width {
                    bounds.width -= plot_width;
                }
            }
            _ => {}
        }
        self.axis_bounds.write().insert(place, bounds);
    }

    /// The recorded rectangle of a rendered axis.
    pub fn axis_bounds(&self, place: AxisPlace) -> Option<Bounds> {
        self.axis_bounds.read().get(&place).copied()
    }
}

impl Default for GraphLayout {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl std::fmt::Debug for GraphLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inputs = self.inputs.read();
        f.debug_struct("GraphLayout")
            .field("width", &inputs.width)
            .field("height", &inputs.height)
            .field("desired", &inputs.desired)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(GraphLayout: Send, Sync);
