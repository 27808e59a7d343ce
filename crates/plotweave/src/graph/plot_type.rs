//! Plot kinds and how bound attribute types select them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::AttributeType;

/// What kind of plot the graph draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlotType {
    /// No attributes on the axes: cases scattered at random.
    #[default]
    CasePlot,
    /// One numeric axis: stacked dots along it.
    DotPlot,
    /// Only categorical axes: dots grouped in cells.
    DotChart,
    /// Two numeric axes.
    ScatterPlot,
}

impl PlotType {
    /// The plot implied by the primary and secondary axis attribute types.
    ///
    /// Symmetric in its arguments and total over all nine combinations.
    pub fn for_attribute_types(primary: AttributeType, secondary: AttributeType) -> Self {
        use AttributeType::{Categorical, Empty, Numeric};
        match (primary, secondary) {
            (Empty, Empty) => PlotType::CasePlot,
            (Numeric, Numeric) => PlotType::ScatterPlot,
            (Numeric, Empty | Categorical) | (Empty | Categorical, Numeric) => PlotType::DotPlot,
            (Categorical, Empty | Categorical) | (Empty, Categorical) => PlotType::DotChart,
        }
    }
}

impl fmt::Display for PlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlotType::CasePlot => "casePlot",
            PlotType::DotPlot => "dotPlot",
            PlotType::DotChart => "dotChart",
            PlotType::ScatterPlot => "scatterPlot",
        })
    }
}
