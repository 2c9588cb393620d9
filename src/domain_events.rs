//! Domain events enum for the connection graph

use crate::events::{
    ActorChanged, ActorDeleted, ConnectionChanged, ConnectionDeleted, TagDeclared, TagRemoved,
};
use serde::{Deserialize, Serialize};

/// Enum wrapper for supply-chain projection events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProjectionEvent {
    /// An actor record changed
    ActorChanged(ActorChanged),
    /// A buyer-supplier connection changed
    ConnectionChanged(ConnectionChanged),
    /// A transitive tier link was declared
    TagDeclared(TagDeclared),
    /// An actor record was deleted
    ActorDeleted(ActorDeleted),
    /// A connection was deleted
    ConnectionDeleted(ConnectionDeleted),
    /// A tag record was removed
    TagRemoved(TagRemoved),
}

impl ProjectionEvent {
    /// Short event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ActorChanged(_) => "ActorChanged",
            Self::ConnectionChanged(_) => "ConnectionChanged",
            Self::TagDeclared(_) => "TagDeclared",
            Self::ActorDeleted(_) => "ActorDeleted",
            Self::ConnectionDeleted(_) => "ConnectionDeleted",
            Self::TagRemoved(_) => "TagRemoved",
        }
    }

    /// Routing subject for the event
    pub fn subject(&self) -> String {
        match self {
            Self::ActorChanged(_) => "chain.actor.changed.v1".to_string(),
            Self::ConnectionChanged(_) => "chain.connection.changed.v1".to_string(),
            Self::TagDeclared(_) => "chain.tag.declared.v1".to_string(),
            Self::ActorDeleted(_) => "chain.actor.deleted.v1".to_string(),
            Self::ConnectionDeleted(_) => "chain.connection.deleted.v1".to_string(),
            Self::TagRemoved(_) => "chain.tag.removed.v1".to_string(),
        }
    }
}
