//! The data layer: datasets, attribute bindings, filtered case sets and the
//! per-graph [`DataConfiguration`] that combines them.

mod attribute;
mod configuration;
mod dataset;
mod filtered;
mod legend;
mod memory;
mod metadata;

pub use attribute::{AttributeBinding, AttributeType, Role};
pub use configuration::{
    AttributeAssignment, CaseData, CasesChanged, ConfigSignals, DataConfiguration, DataConfigurationSnapshot,
    MAIN_CATEGORY,
};
pub use dataset::{
    ActionDisposer, ActionHandler, Attribute, CaseValue, CaseValues, Dataset, DatasetAction,
};
pub use filtered::{CaseFilter, ChangedCases, FilterFn, FilterRequirement, FilteredCaseSet};
pub use legend::{LEGEND_BLUES, QuantileScale};
pub use memory::MemoryDataset;
pub use metadata::{CaseMetadata, CategorySet, KELLY_COLORS, MISSING_COLOR, MemoryCaseMetadata};
