//! Facet cells and their keys.
//!
//! Categorical split attributes divide the plot into a grid of cells. A
//! categorical x or y axis subdivides each split cell again, one cell per
//! axis category. A cell is identified by a [`SubPlotKey`]: the contributing
//! attribute ids mapped to the category values of that cell.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::{AttributeType, DataConfiguration, Role};

/// Identity of one facet cell: attribute id → category value.
///
/// Keys are ordered, so equal keys always serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubPlotKey(BTreeMap<String, String>);

impl SubPlotKey {
    /// The key of the single cell of an unsplit plot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, attribute_id: impl Into<String>, value: impl Into<String>) {
        self.0.insert(attribute_id.into(), value.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, attribute_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(attribute_id, value);
        self
    }

    /// The category of an attribute in this cell.
    pub fn get(&self, attribute_id: &str) -> Option<&str> {
        self.0.get(attribute_id).map(String::as_str)
    }

    /// Entries in attribute id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stable string form, used to key per-cell state.
    pub fn instance_key(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl FromIterator<(String, String)> for SubPlotKey {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One split of the facet grid.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FacetDimension {
    /// The split attribute, if any.
    pub attribute_id: Option<String>,
    /// Its categories in display order.
    pub categories: Vec<String>,
}

impl FacetDimension {
    /// A split on `attribute_id`.
    pub fn new(attribute_id: Option<String>, categories: Vec<String>) -> Self {
        Self {
            attribute_id,
            categories,
        }
    }

    /// Number of cells along this dimension; at least one.
    pub fn len(&self) -> usize {
        match self.attribute_id {
            Some(_) => self.categories.len().max(1),
            None => 1,
        }
    }

    /// Whether this dimension actually splits the plot.
    pub fn is_active(&self) -> bool {
        self.attribute_id.is_some() && !self.categories.is_empty()
    }
}

/// A grid of facet cells, dimensions ordered inner to outer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FacetGrid {
    dimensions: Vec<FacetDimension>,
}

impl FacetGrid {
    /// A grid over the given dimensions, innermost first.
    pub fn new(dimensions: Vec<FacetDimension>) -> Self {
        Self { dimensions }
    }

    /// The grid formed by the top (columns, inner) and right (rows, outer)
    /// splits.
    pub fn splits(top: FacetDimension, right: FacetDimension) -> Self {
        Self::new(vec![top, right])
    }

    /// Columns are the x categories nested in the top split, rows the y
    /// categories nested in the right split. Pass a default dimension for a
    /// numeric or unbound axis.
    pub fn with_axes(x: FacetDimension, top: FacetDimension, y: FacetDimension, right: FacetDimension) -> Self {
        Self::new(vec![x, top, y, right])
    }

    /// The cell grid of a configuration: its splits and any categorical x
    /// or y axis.
    pub fn from_config(config: &DataConfiguration) -> Self {
        let dimension = |role: Role| match config.attribute_id(role) {
            Some(id) => FacetDimension::new(Some(id), config.category_array_for_attr_role(role, &[])),
            None => FacetDimension::default(),
        };
        let axis = |role: Role| match config.attribute_type(role) {
            AttributeType::Categorical => dimension(role),
            _ => FacetDimension::default(),
        };
        Self::with_axes(
            axis(Role::X),
            dimension(Role::TopSplit),
            axis(Role::Y),
            dimension(Role::RightSplit),
        )
    }

    /// The dimensions, innermost first.
    pub fn dimensions(&self) -> &[FacetDimension] {
        &self.dimensions
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.dimensions.iter().map(FacetDimension::len).product()
    }

    /// Key of cell `index`. The innermost dimension varies fastest.
    pub fn key_for_index(&self, index: usize) -> SubPlotKey {
        let mut key = SubPlotKey::new();
        let mut stride = 1;
        for dim in &self.dimensions {
            if let (Some(attribute_id), true) = (&dim.attribute_id, dim.is_active()) {
                let len = dim.categories.len();
                key.insert(attribute_id.clone(), dim.categories[(index / stride) % len].clone());
            }
            stride *= dim.len();
        }
        key
    }

    /// Every cell key in index order.
    pub fn keys(&self) -> Vec<SubPlotKey> {
        (0..self.cell_count()).map(|i| self.key_for_index(i)).collect()
    }
}
