//! Places in the graph tile and the roles they display.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::Role;

/// A place that can hold an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AxisPlace {
    /// Below the plot.
    Bottom,
    /// Left of the plot.
    Left,
    /// Above the plot (column split).
    Top,
    /// Right of the plot (row split).
    RightCat,
    /// Right of the plot (second numeric y axis).
    RightNumeric,
}

impl AxisPlace {
    /// Every axis place, in reconciliation order.
    pub const ALL: [AxisPlace; 5] = [
        AxisPlace::Bottom,
        AxisPlace::Left,
        AxisPlace::Top,
        AxisPlace::RightCat,
        AxisPlace::RightNumeric,
    ];

    /// Whether the axis runs vertically.
    pub fn is_vertical(self) -> bool {
        matches!(self, AxisPlace::Left | AxisPlace::RightCat | AxisPlace::RightNumeric)
    }

    /// The role displayed on this axis.
    pub fn role(self) -> Role {
        GraphPlace::from(self).role()
    }

    /// Whether this is one of the two primary axes.
    pub fn is_primary(self) -> bool {
        matches!(self, AxisPlace::Left | AxisPlace::Bottom)
    }
}

impl fmt::Display for AxisPlace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&GraphPlace::from(*self), f)
    }
}

/// Any place in the tile an attribute can be dropped on or laid out in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GraphPlace {
    /// Left axis.
    Left,
    /// Bottom axis.
    Bottom,
    /// Top split axis.
    Top,
    /// Right split axis.
    RightCat,
    /// Right numeric axis.
    RightNumeric,
    /// Drop target for additional y series.
    YPlus,
    /// Legend strip.
    Legend,
    /// The plot area.
    Plot,
}

impl GraphPlace {
    /// Every place.
    pub const ALL: [GraphPlace; 8] = [
        GraphPlace::Left,
        GraphPlace::Bottom,
        GraphPlace::Top,
        GraphPlace::RightCat,
        GraphPlace::RightNumeric,
        GraphPlace::YPlus,
        GraphPlace::Legend,
        GraphPlace::Plot,
    ];

    /// The role an attribute dropped here is bound to.
    pub fn role(self) -> Role {
        match self {
            GraphPlace::Left => Role::Y,
            GraphPlace::Bottom => Role::X,
            GraphPlace::Top => Role::TopSplit,
            GraphPlace::RightCat => Role::RightSplit,
            GraphPlace::RightNumeric => Role::RightNumeric,
            GraphPlace::YPlus => Role::YPlus,
            GraphPlace::Legend | GraphPlace::Plot => Role::Legend,
        }
    }

    /// The axis place, if this place holds an axis.
    pub fn axis_place(self) -> Option<AxisPlace> {
        match self {
            GraphPlace::Left => Some(AxisPlace::Left),
            GraphPlace::Bottom => Some(AxisPlace::Bottom),
            GraphPlace::Top => Some(AxisPlace::Top),
            GraphPlace::RightCat => Some(AxisPlace::RightCat),
            GraphPlace::RightNumeric => Some(AxisPlace::RightNumeric),
            GraphPlace::YPlus | GraphPlace::Legend | GraphPlace::Plot => None,
        }
    }
}

impl From<AxisPlace> for GraphPlace {
    fn from(place: AxisPlace) -> Self {
        match place {
            AxisPlace::Bottom => GraphPlace::Bottom,
            AxisPlace::Left => GraphPlace::Left,
            AxisPlace::Top => GraphPlace::Top,
            AxisPlace::RightCat => GraphPlace::RightCat,
            AxisPlace::RightNumeric => GraphPlace::RightNumeric,
        }
    }
}

impl fmt::Display for GraphPlace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GraphPlace::Left => "left",
            GraphPlace::Bottom => "bottom",
            GraphPlace::Top => "top",
            GraphPlace::RightCat => "rightCat",
            GraphPlace::RightNumeric => "rightNumeric",
            GraphPlace::YPlus => "yPlus",
            GraphPlace::Legend => "legend",
            GraphPlace::Plot => "plot",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_mapping() {
        assert_eq!(GraphPlace::Left.role(), Role::Y);
        assert_eq!(GraphPlace::Bottom.role(), Role::X);
        assert_eq!(GraphPlace::Top.role(), Role::TopSplit);
        assert_eq!(GraphPlace::RightCat.role(), Role::RightSplit);
        assert_eq!(GraphPlace::Plot.role(), Role::Legend);
        assert_eq!(AxisPlace::RightNumeric.role(), Role::RightNumeric);
    }

    #[test]
    fn test_axis_places_round_trip() {
        for place in AxisPlace::ALL {
            assert_eq!(GraphPlace::from(place).axis_place(), Some(place));
        }
        assert_eq!(GraphPlace::YPlus.axis_place(), None);
        assert_eq!(AxisPlace::RightCat.to_string(), "rightCat");
    }

    #[test]
    fn test_orientation() {
        assert!(AxisPlace::Left.is_vertical());
        assert!(AxisPlace::RightNumeric.is_vertical());
        assert!(!AxisPlace::Top.is_vertical());
    }
}
