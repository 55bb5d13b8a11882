//! Parent/child relations between entities.
//!
//! The relation is bidirectional and always consistent: if `c` is in
//! `p.children()` then `c.parent() == Some(p)`, and a child has at most one
//! parent. Every relation change runs under one process-wide lock and holds
//! the write locks of all entities it touches at once (acquired in id order),
//! so no reader can observe a half-applied change.
//!
//! Parents own their children. The back-reference from child to parent is
//! weak.

use std::sync::Arc;

use parking_lot::{Mutex, RwLockWriteGuard, const_mutex};

use crate::entity::{Entity, EntityId, EntityState};
use crate::error::HierarchyError;

static RELATIONS: Mutex<()> = const_mutex(());

impl Entity {
    /// Attach `child` under this entity.
    ///
    /// If `child` already has another parent it is moved: it disappears from
    /// the old parent's children. Attaching a child to its current parent is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::SelfParent`] if `child` is this entity and
    /// [`HierarchyError::Cycle`] if `child` is an ancestor of this entity.
    pub fn add_child(&self, child: &Entity) -> Result<(), HierarchyError> {
        let _relations = RELATIONS.lock();
        validate(self, child)?;
        attach(self, child);
        Ok(())
    }

    /// Attach several children in order, as one relation change.
    ///
    /// Either all children are attached or, on error, none are.
    ///
    /// # Errors
    ///
    /// Same as [`Entity::add_child`], for the first offending child.
    pub fn add_children(&self, children: &[Entity]) -> Result<(), HierarchyError> {
        let _relations = RELATIONS.lock();
        for child in children {
            validate(self, child)?;
        }
        for child in children {
            attach(self, child);
        }
        Ok(())
    }

    /// Detach `child` from this entity.
    ///
    /// Returns `false` if `child` is not a child of this entity.
    pub fn remove_child(&self, child: &Entity) -> bool {
        let _relations = RELATIONS.lock();
        if child.parent_id() != Some(self.id()) {
            return false;
        }
        detach(self, child);
        true
    }

    /// Detach this entity from its parent, returning the former parent.
    pub fn detach_from_parent(&self) -> Option<Entity> {
        let _relations = RELATIONS.lock();
        let parent = self.parent()?;
        detach(&parent, self);
        Some(parent)
    }

    /// Snapshot of this entity's children, in attach order.
    ///
    /// The returned vector is a copy. Later relation changes are not
    /// reflected in it.
    #[must_use]
    pub fn children(&self) -> Vec<Entity> {
        self.inner.state.read().children.clone()
    }

    /// Number of direct children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.state.read().children.len()
    }

    /// The current parent, if any and if it is still alive.
    #[must_use]
    pub fn parent(&self) -> Option<Entity> {
        self.inner
            .state
            .read()
            .parent
            .upgrade()
            .map(Entity::from_inner)
    }

    /// Returns `true` if this entity is `other`'s parent, grandparent, etc.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Entity) -> bool {
        let mut current = other.parent();
        while let Some(entity) = current {
            if entity.id() == self.id() {
                return true;
            }
            current = entity.parent();
        }
        false
    }

    fn parent_id(&self) -> Option<EntityId> {
        self.inner.state.read().parent.upgrade().map(|inner| inner.id)
    }
}

fn validate(parent: &Entity, child: &Entity) -> Result<(), HierarchyError> {
    if parent.id() == child.id() {
        return Err(HierarchyError::SelfParent(parent.id()));
    }
    if child.is_ancestor_of(parent) {
        return Err(HierarchyError::Cycle {
            parent: parent.id(),
            child: child.id(),
        });
    }
    Ok(())
}

/// Caller must hold `RELATIONS` and have validated the pair.
fn attach(parent: &Entity, child: &Entity) {
    let old_parent = child.parent();
    if old_parent.as_ref() == Some(parent) {
        return;
    }

    let mut involved = vec![parent, child];
    if let Some(old) = old_parent.as_ref() {
        involved.push(old);
    }
    for (id, state) in &mut lock_in_order(&involved) {
        if *id == child.id() {
            state.parent = Arc::downgrade(&parent.inner);
        } else if *id == parent.id() {
            state.children.push(child.clone());
        } else {
            state.children.retain(|c| c.id() != child.id());
        }
    }
}

/// Caller must hold `RELATIONS` and know that `child` is under `parent`.
fn detach(parent: &Entity, child: &Entity) {
    for (id, state) in &mut lock_in_order(&[parent, child]) {
        if *id == child.id() {
            state.parent = std::sync::Weak::new();
        } else {
            state.children.retain(|c| c.id() != child.id());
        }
    }
}

fn lock_in_order<'a>(
    entities: &[&'a Entity],
) -> Vec<(EntityId, RwLockWriteGuard<'a, EntityState>)> {
    let mut sorted = entities.to_vec();
    sorted.sort_by_key(|e| e.id());
    sorted
        .into_iter()
        .map(|e| (e.id(), e.inner.state.write()))
        .collect()
}
