//! Supply-chain graph value objects
//!
//! Value objects are immutable types that represent concepts in the connection
//! graph. They are compared by value rather than identity and encapsulate
//! domain validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Mean earth radius in meters, used for great-circle distances.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

macro_rules! graph_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// The nil identifier, used as a sentinel where no real record exists
            pub fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Whether this is the nil sentinel
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

graph_id! {
    /// Identifier of a supply-chain participant, copied from the system of
    /// record and never regenerated by the projection.
    ActorId
}

graph_id! {
    /// Identifier of a directed buyer-supplier connection
    ConnectionId
}

graph_id! {
    /// Identifier of a supply chain scoping a connection
    SupplyChainId
}

graph_id! {
    /// Identifier of the tag record behind a transitive tier link
    TagId
}

/// Kind of supply-chain participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    /// A company that buys from other actors
    BuyingCompany,
    /// A farm at the producing end of a chain
    Farm,
    /// A third-party verifier
    Verifier,
    /// Kind not (yet) known to the projection
    Unknown,
}

impl ActorKind {
    /// Create an actor kind from a string
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "buying-company" | "company" => ActorKind::BuyingCompany,
            "farm" => ActorKind::Farm,
            "verifier" => ActorKind::Verifier,
            _ => ActorKind::Unknown,
        }
    }

    /// Get the string representation of the actor kind
    pub fn as_str(&self) -> &str {
        match self {
            ActorKind::BuyingCompany => "buying-company",
            ActorKind::Farm => "farm",
            ActorKind::Verifier => "verifier",
            ActorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for ActorKind {
    fn default() -> Self {
        ActorKind::Unknown
    }
}

/// Verification status of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Claimed by one side, not yet verified
    Claimed,
    /// Verified by both sides
    Verified,
    /// Rejected by the invited side
    Rejected,
}

impl ConnectionStatus {
    /// Get the string representation of the status
    pub fn as_str(&self) -> &str {
        match self {
            ConnectionStatus::Claimed => "claimed",
            ConnectionStatus::Verified => "verified",
            ConnectionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Claimed
    }
}

/// Traversal direction over the connection graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Walk buyer -> connection -> supplier, one tier upstream per hop
    ToSuppliers,
    /// Walk supplier -> connection -> buyer, one tier downstream per hop
    ToBuyers,
}

impl Direction {
    /// Sign convention for tiers in this direction: supplier tiers are
    /// positive, buyer tiers are negative, so both chains merge onto one
    /// signed axis centered on the root.
    pub fn tier_sign(&self) -> i32 {
        match self {
            Direction::ToSuppliers => 1,
            Direction::ToBuyers => -1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ToSuppliers => write!(f, "to-suppliers"),
            Direction::ToBuyers => write!(f, "to-buyers"),
        }
    }
}

/// A geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Create a new coordinate
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle (haversine) distance to another coordinate, in meters
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }
}

/// Denormalized reference to an actor that manages another actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerRef {
    /// The managing actor's identifier
    pub id: ActorId,
    /// The managing actor's display name
    pub name: String,
}

/// Denormalized reference to a label attached to a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRef {
    /// The label record's identifier in the system of record
    pub id: Uuid,
    /// The label's display name
    pub name: String,
}
