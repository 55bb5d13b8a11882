//! Entity identifiers and the concurrently accessible [`Entity`] container.
//!
//! An [`Entity`] is a cheap, clonable handle to a set of components plus its
//! place in the parent/child hierarchy. Every read and mutation goes through
//! the entity's own reader/writer lock, so entities can be shared freely
//! between systems running in parallel.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentHandle, ComponentSlot, ComponentTypeId};

/// A unique entity identifier.
///
/// Ids are allocated from a process-wide counter, strictly increasing and
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The null / invalid entity sentinel. Never handed out by the allocator.
    pub const INVALID: EntityId = EntityId(0);

    /// Create an entity id from a raw `u64`.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) id.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Allocates monotonically increasing entity ids.
///
/// Safe to share between threads. Ids are exhausted, never compacted.
#[derive(Debug)]
pub struct EntityAllocator {
    next_id: AtomicU64,
}

impl EntityAllocator {
    /// Creates a new allocator. Ids start at 1 (0 is reserved for [`EntityId::INVALID`]).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh id.
    pub fn allocate(&self) -> EntityId {
        EntityId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the number of ids allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// The allocator behind [`Entity::new`].
static ALLOCATOR: EntityAllocator = EntityAllocator::new();

/// Number of entity ids handed out in this process.
#[must_use]
pub fn allocated_entities() -> u64 {
    ALLOCATOR.count()
}

pub(crate) struct EntityInner {
    pub(crate) id: EntityId,
    pub(crate) state: RwLock<EntityState>,
}

#[derive(Default)]
pub(crate) struct EntityState {
    pub(crate) components: HashMap<ComponentTypeId, ComponentSlot>,
    pub(crate) children: Vec<Entity>,
    /// Relation only. The parent owns the child, never the reverse.
    pub(crate) parent: Weak<EntityInner>,
}

/// A uniquely identified container of components with optional parent and
/// child relations.
///
/// Cloning an `Entity` clones the handle, not the data. Two handles compare
/// equal when they refer to the same entity id.
#[derive(Clone)]
pub struct Entity {
    pub(crate) inner: Arc<EntityInner>,
}

impl Entity {
    /// Create an entity with no components.
    #[must_use]
    pub fn new() -> Self {
        Self::from_slots(HashMap::new())
    }

    /// Start building an entity with initial components.
    #[must_use]
    pub fn builder() -> EntityBuilder {
        EntityBuilder::default()
    }

    /// Create an entity from a tuple of initial components.
    ///
    /// ```rust
    /// use engine_component::{Component, Entity};
    ///
    /// struct Name(&'static str);
    /// impl Component for Name {
    ///     fn type_name() -> &'static str { "Name" }
    /// }
    /// struct Speed(f32);
    /// impl Component for Speed {
    ///     fn type_name() -> &'static str { "Speed" }
    /// }
    ///
    /// let e = Entity::with_components((Name("ship"), Speed(4.0)));
    /// assert_eq!(e.component_names(), vec!["Name", "Speed"]);
    /// ```
    #[must_use]
    pub fn with_components<B: ComponentBundle>(bundle: B) -> Self {
        bundle.add_to(Self::builder()).build()
    }

    fn from_slots(components: HashMap<ComponentTypeId, ComponentSlot>) -> Self {
        Self {
            inner: Arc::new(EntityInner {
                id: ALLOCATOR.allocate(),
                state: RwLock::new(EntityState {
                    components,
                    ..EntityState::default()
                }),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<EntityInner>) -> Self {
        Self { inner }
    }

    /// Returns the id of this entity. Fixed for its whole lifetime.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    /// Attach a component, replacing any component with the same name.
    ///
    /// Returns the handle under which the component is now stored.
    pub fn add_component<T: Component>(&self, component: T) -> ComponentHandle<T> {
        let handle = ComponentHandle::new(component);
        self.insert_handle(&handle);
        handle
    }

    /// Attach an existing component handle, replacing any component with the
    /// same name.
    pub fn insert_handle<T: Component>(&self, handle: &ComponentHandle<T>) {
        let slot = ComponentSlot::from_handle(handle);
        self.inner
            .state
            .write()
            .components
            .insert(T::component_type_id(), slot);
    }

    /// Detach the component of type `T`.
    ///
    /// Removing a component that is not attached is a no-op and returns
    /// `None`.
    pub fn remove_component<T: Component>(&self) -> Option<ComponentHandle<T>> {
        let slot = self
            .inner
            .state
            .write()
            .components
            .remove(&T::component_type_id())?;
        ComponentHandle::from_erased(slot.value)
    }

    /// Detach whatever component is stored under `name`.
    ///
    /// Returns `true` if a component was removed.
    pub fn remove_component_named(&self, name: &str) -> bool {
        self.inner
            .state
            .write()
            .components
            .remove(&ComponentTypeId::from_name(name))
            .is_some()
    }

    /// Look up the component of type `T`.
    ///
    /// Returns `None` if no component with `T`'s name is attached, or if the
    /// component under that name is of a different Rust type.
    #[must_use]
    pub fn component<T: Component>(&self) -> Option<ComponentHandle<T>> {
        let value = self
            .inner
            .state
            .read()
            .components
            .get(&T::component_type_id())
            .map(|slot| slot.value.clone())?;
        ComponentHandle::from_erased(value)
    }

    /// Returns `true` if a component of type `T` is attached.
    #[must_use]
    pub fn has_component<T: Component>(&self) -> bool {
        self.has_component_named(T::type_name())
    }

    /// Returns `true` if any component is stored under `name`.
    #[must_use]
    pub fn has_component_named(&self, name: &str) -> bool {
        self.has_component_id(ComponentTypeId::from_name(name))
    }

    /// Returns `true` if any component is stored under `type_id`.
    #[must_use]
    pub fn has_component_id(&self, type_id: ComponentTypeId) -> bool {
        self.inner.state.read().components.contains_key(&type_id)
    }

    /// Names of all attached components, sorted.
    #[must_use]
    pub fn component_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .inner
            .state
            .read()
            .components
            .values()
            .map(|slot| slot.name)
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of attached components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.inner.state.read().components.len()
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Entity");
        out.field("id", &self.inner.id.0);
        // Never block in Debug: a writer may hold the lock.
        if let Some(state) = self.inner.state.try_read() {
            let names: Vec<_> = state.components.values().map(|slot| slot.name).collect();
            out.field("components", &names)
                .field("children", &state.children.len());
        }
        out.finish()
    }
}

/// Collects initial components for a new [`Entity`].
#[derive(Default)]
pub struct EntityBuilder {
    components: HashMap<ComponentTypeId, ComponentSlot>,
}

impl EntityBuilder {
    /// Add a component. A later component with the same name replaces an
    /// earlier one.
    #[must_use]
    pub fn with<T: Component>(mut self, component: T) -> Self {
        let handle = ComponentHandle::new(component);
        self.components
            .insert(T::component_type_id(), ComponentSlot::from_handle(&handle));
        self
    }

    /// Add an existing component handle.
    #[must_use]
    pub fn with_handle<T: Component>(mut self, handle: &ComponentHandle<T>) -> Self {
        self.components
            .insert(T::component_type_id(), ComponentSlot::from_handle(handle));
        self
    }

    /// Allocate an id and create the entity.
    #[must_use]
    pub fn build(self) -> Entity {
        Entity::from_slots(self.components)
    }
}

/// A fixed set of components added to an entity in one go.
///
/// Implemented for tuples of up to eight components.
pub trait ComponentBundle {
    /// Add every component of the bundle to `builder`.
    fn add_to(self, builder: EntityBuilder) -> EntityBuilder;
}

macro_rules! impl_component_bundle {
    ($($name:ident),*) => {
        impl<$($name: Component),*> ComponentBundle for ($($name,)*) {
            #[allow(non_snake_case, unused_mut)]
            fn add_to(self, mut builder: EntityBuilder) -> EntityBuilder {
                let ($($name,)*) = self;
                $(builder = builder.with($name);)*
                builder
            }
        }
    };
}

impl_component_bundle!();
impl_component_bundle!(A);
impl_component_bundle!(A, B);
impl_component_bundle!(A, B, C);
impl_component_bundle!(A, B, C, D);
impl_component_bundle!(A, B, C, D, E);
impl_component_bundle!(A, B, C, D, E, F);
impl_component_bundle!(A, B, C, D, E, F, G);
impl_component_bundle!(A, B, C, D, E, F, G, H);

impl fmt::Debug for EntityBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.components.values().map(|slot| slot.name).collect();
        f.debug_struct("EntityBuilder")
            .field("components", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(i32);

    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[derive(Debug)]
    struct Armor(i32);

    impl Component for Armor {
        fn type_name() -> &'static str {
            "Armor"
        }
    }

    #[derive(Debug)]
    struct Tagged(usize);

    impl Component for Tagged {
        fn type_name() -> &'static str {
            "Tagged"
        }
    }

    #[test]
    fn test_entity_id_creation() {
        let e = EntityId::from_raw(42);
        assert_eq!(e.id(), 42);
        assert!(e.is_valid());
        assert!(!EntityId::INVALID.is_valid());
    }

    #[test]
    fn test_allocator_produces_unique_ids() {
        let alloc = EntityAllocator::new();
        let e1 = alloc.allocate();
        let e2 = alloc.allocate();
        let e3 = alloc.allocate();
        assert_eq!(e1.id(), 1);
        assert_eq!(e2.id(), 2);
        assert_eq!(e3.id(), 3);
        assert_eq!(alloc.count(), 3);
    }

    #[test]
    fn test_entity_ids_unique_and_increasing() {
        let a = Entity::new();
        let b = Entity::new();
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
        assert!(a.id().is_valid());
        assert!(allocated_entities() >= b.id().id());
    }

    #[test]
    fn test_entity_ids_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| (0..100).map(|_| Entity::new().id()).collect::<Vec<_>>()))
            .collect();
        let mut ids: Vec<_> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn test_with_components_tuple() {
        let e = Entity::with_components((Health(10), Armor(2)));
        assert_eq!(e.component_names(), vec!["Armor", "Health"]);
        assert_eq!(*e.component::<Health>().unwrap().read(), Health(10));

        let empty = Entity::with_components(());
        assert_eq!(empty.component_count(), 0);
    }

    #[test]
    fn test_add_component() {
        let e = Entity::new();
        let added = e.add_component(Health(10));
        assert!(e.has_component::<Health>());
        assert!(e.has_component_named("Health"));
        let found = e.component::<Health>().unwrap();
        assert!(found.ptr_eq(&added));
    }

    #[test]
    fn test_remove_component() {
        let e = Entity::builder().with(Health(10)).build();
        let removed = e.remove_component::<Health>();
        assert_eq!(removed.unwrap().read().0, 10);
        assert!(!e.has_component::<Health>());
    }

    #[test]
    fn test_remove_component_twice_is_noop() {
        let e = Entity::builder().with(Health(10)).with(Armor(3)).build();
        e.remove_component::<Health>();
        assert!(e.remove_component::<Health>().is_none());
        assert!(!e.remove_component_named("Health"));
        assert_eq!(e.component_names(), vec!["Armor"]);
    }

    #[test]
    fn test_missing_component_is_none() {
        let e = Entity::new();
        assert!(e.component::<Health>().is_none());
        assert!(!e.has_component::<Health>());
    }

    #[test]
    fn test_last_writer_wins() {
        let e = Entity::new();
        e.add_component(Health(1));
        e.add_component(Health(2));
        assert_eq!(e.component_count(), 1);
        assert_eq!(e.component::<Health>().unwrap().read().0, 2);
    }

    #[test]
    fn test_builder_initial_components() {
        let shared = ComponentHandle::new(Armor(7));
        let e = Entity::builder()
            .with(Health(5))
            .with_handle(&shared)
            .build();
        assert_eq!(e.component_names(), vec!["Armor", "Health"]);
        assert!(e.component::<Armor>().unwrap().ptr_eq(&shared));
    }

    #[test]
    fn test_mutation_through_handle_is_visible() {
        let e = Entity::builder().with(Health(10)).build();
        e.component::<Health>().unwrap().write().0 -= 4;
        assert_eq!(*e.component::<Health>().unwrap().read(), Health(6));
    }

    #[test]
    fn test_concurrent_distinct_adds_are_not_lost() {
        // Each thread writes a component under its own name.
        struct Slot<const N: usize>;
        macro_rules! slot {
            ($($n:literal),*) => {$(
                impl Component for Slot<$n> {
                    fn type_name() -> &'static str { concat!("Slot", $n) }
                }
            )*};
        }
        slot!(0, 1, 2, 3, 4, 5, 6, 7);

        let e = Entity::new();
        thread::scope(|s| {
            s.spawn(|| e.add_component(Slot::<0>));
            s.spawn(|| e.add_component(Slot::<1>));
            s.spawn(|| e.add_component(Slot::<2>));
            s.spawn(|| e.add_component(Slot::<3>));
            s.spawn(|| e.add_component(Slot::<4>));
            s.spawn(|| e.add_component(Slot::<5>));
            s.spawn(|| e.add_component(Slot::<6>));
            s.spawn(|| e.add_component(Slot::<7>));
        });
        assert_eq!(e.component_count(), 8);
    }

    #[test]
    fn test_concurrent_handle_updates() {
        let e = Entity::builder().with(Tagged(0)).build();
        thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    for _ in 0..100 {
                        e.component::<Tagged>().unwrap().write().0 += 1;
                    }
                });
            }
        });
        assert_eq!(e.component::<Tagged>().unwrap().read().0, 1600);
    }

    #[test]
    fn test_entity_equality_by_id() {
        let a = Entity::new();
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, Entity::new());
    }

    #[test]
    fn test_entity_id_serialization() {
        let id = EntityId::from_raw(999);
        let json = serde_json::to_string(&id).unwrap();
        let restored: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }
}
