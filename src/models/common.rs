//! Shared value types: positions, protobuf-style enums and entity kinds.

use serde::{Deserialize, Serialize};

/// Planar position in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct XyPosition {
    pub x: f64,
    pub y: f64,
}

impl XyPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<XyPosition> for geo::Coord<f64> {
    fn from(p: XyPosition) -> Self {
        geo::Coord { x: p.x, y: p.y }
    }
}

/// A point on a lane, `s` meters from the lane start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LanePosition {
    pub lane_id: i64,
    pub s: f64,
}

/// Enum value as the routing service and document store emit it:
/// either the numeric code or the upper-case symbolic name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProtoEnumValue {
    Code(i32),
    Name(String),
}

/// Declares a protobuf-style enum with `Unspecified` at code 0. Unknown
/// codes and names decode to `Unspecified` and are rejected by the operation
/// that needs a concrete value.
macro_rules! proto_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $prefix:literal {
            $($variant:ident = $code:literal => $label:literal),+ $(,)?
        }
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        $(#[$meta])*
        pub enum $name {
            #[default]
            Unspecified,
            $($variant,)+
        }

        impl $name {
            pub fn code(self) -> i32 {
                match self {
                    $name::Unspecified => 0,
                    $($name::$variant => $code,)+
                }
            }

            pub fn from_code(code: i32) -> Self {
                match code {
                    $($code => $name::$variant,)+
                    _ => $name::Unspecified,
                }
            }

            pub fn from_name(name: &str) -> Self {
                let short = name.strip_prefix($prefix).unwrap_or(name);
                $(
                    if short.eq_ignore_ascii_case($label) {
                        return $name::$variant;
                    }
                )+
                $name::Unspecified
            }

            pub fn label(self) -> &'static str {
                match self {
                    $name::Unspecified => "UNSPECIFIED",
                    $($name::$variant => $label,)+
                }
            }
        }

        impl From<i32> for $name {
            fn from(code: i32) -> Self {
                $name::from_code(code)
            }
        }

        impl From<ProtoEnumValue> for $name {
            fn from(value: ProtoEnumValue) -> Self {
                match value {
                    ProtoEnumValue::Code(code) => $name::from_code(code),
                    ProtoEnumValue::Name(name) => $name::from_name(&name),
                }
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                value.code()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", $prefix, self.label())
            }
        }
    };
}

// Map entity enums are stored in the binary cache, which cannot decode
// untagged values, so they only accept numeric codes.
proto_enum! {
    #[serde(from = "i32", into = "i32")]
    LaneType, "LANE_TYPE_" {
        Driving = 1 => "DRIVING",
        Walking = 2 => "WALKING",
        RailTransit = 3 => "RAIL_TRANSIT",
    }
}

proto_enum! {
    #[serde(from = "i32", into = "i32")]
    LaneTurn, "LANE_TURN_" {
        Straight = 1 => "STRAIGHT",
        Left = 2 => "LEFT",
        Right = 3 => "RIGHT",
        Around = 4 => "AROUND",
    }
}

proto_enum! {
    /// Which end of the neighbouring lane a connection attaches to.
    #[serde(from = "i32", into = "i32")]
    LaneConnectionType, "LANE_CONNECTION_TYPE_" {
        Head = 1 => "HEAD",
        Tail = 2 => "TAIL",
    }
}

proto_enum! {
    #[serde(from = "ProtoEnumValue", into = "i32")]
    RouteType, "ROUTE_TYPE_" {
        Driving = 1 => "DRIVING",
        Walking = 2 => "WALKING",
    }
}

proto_enum! {
    #[serde(from = "ProtoEnumValue", into = "i32")]
    JourneyType, "JOURNEY_TYPE_" {
        Driving = 1 => "DRIVING",
        Walking = 2 => "WALKING",
    }
}

proto_enum! {
    #[serde(from = "ProtoEnumValue", into = "i32")]
    MovingDirection, "MOVING_DIRECTION_" {
        Forward = 1 => "FORWARD",
        Backward = 2 => "BACKWARD",
    }
}

/// Kind of a map entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Lane,
    Road,
    Junction,
    Aoi,
    Poi,
}

impl EntityKind {
    /// Classify an id by the upstream numbering convention.
    ///
    /// The convention is not enforced anywhere; this is for display and
    /// diagnostics only.
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0..=199_999_999 => Some(EntityKind::Lane),
            200_000_000..=299_999_999 => Some(EntityKind::Road),
            300_000_000..=399_999_999 => Some(EntityKind::Junction),
            500_000_000..=599_999_999 => Some(EntityKind::Aoi),
            700_000_000..=799_999_999 => Some(EntityKind::Poi),
            _ => None,
        }
    }

    /// Record class name used by the document store.
    pub fn class(&self) -> &'static str {
        match self {
            EntityKind::Lane => "lane",
            EntityKind::Road => "road",
            EntityKind::Junction => "junction",
            EntityKind::Aoi => "aoi",
            EntityKind::Poi => "poi",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.class())
    }
}
