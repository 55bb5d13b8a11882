//! # engine_component
//!
//! The "E" and "C" in ECS: what a component is, how an entity stores its
//! components, and how entities are arranged into a parent/child hierarchy.
//!
//! This crate provides:
//!
//! - [`Component`] trait: the contract all ECS data must satisfy.
//! - [`ComponentHandle`]: shared, lockable access to an attached component.
//! - [`Entity`]: a concurrently accessible container of components, created
//!   empty, through [`EntityBuilder`], or from a [`ComponentBundle`] tuple.
//! - [`EntityId`] and [`EntityAllocator`]: process-unique, never reused ids.
//! - Parent/child relations ([`Entity::add_child`] and friends) with
//!   [`HierarchyError`] for the cases that cannot be honoured.
//!
//! Reads that return collections ([`Entity::children`],
//! [`Entity::component_names`]) return snapshots, never live views.

pub mod component;
pub mod entity;
pub mod error;
mod hierarchy;

pub use component::{Component, ComponentHandle, ComponentTypeId};
pub use entity::{
    ComponentBundle, Entity, EntityAllocator, EntityBuilder, EntityId, allocated_entities,
};
pub use error::HierarchyError;
