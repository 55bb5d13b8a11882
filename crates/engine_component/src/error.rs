//! Error types for the entity hierarchy.

use crate::entity::EntityId;

/// Errors returned when a parent/child relation cannot be established.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// An entity was asked to become its own child.
    #[error("{0} cannot be its own parent")]
    SelfParent(EntityId),

    /// The child is already an ancestor of the would-be parent.
    #[error("attaching {child} under {parent} would create a cycle")]
    Cycle {
        /// The entity that would become the parent.
        parent: EntityId,
        /// The entity that would become the child.
        child: EntityId,
    },
}
