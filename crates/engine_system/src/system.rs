//! The [`System`] trait and [`BaseSystem`] entity bookkeeping.
//!
//! A system is a behaviour unit updated once per tick. Concrete systems embed
//! a [`BaseSystem`] to get entity tracking for free and only implement
//! [`System::name`], [`System::update`] and [`System::base`].

use dashmap::DashMap;
use engine_component::{Entity, EntityId};

use crate::context::TickContext;
use crate::filter::{AcceptAll, EntityFilter};

/// A behaviour unit driven by the [`SystemManager`](crate::SystemManager).
///
/// Updates of different systems run concurrently on separate threads, so all
/// methods take `&self`; mutable per-system state belongs behind a lock or in
/// components.
///
/// # Examples
///
/// ```rust
/// use engine_component::Entity;
/// use engine_system::{BaseSystem, System, TickContext};
///
/// struct Gravity {
///     base: BaseSystem,
/// }
///
/// impl System for Gravity {
///     fn name(&self) -> &str { "gravity" }
///     fn base(&self) -> &BaseSystem { &self.base }
///     fn update(&self, ctx: &TickContext) -> anyhow::Result<()> {
///         for _entity in self.entities() {
///             let _fall = 9.81 * ctx.dt;
///         }
///         Ok(())
///     }
/// }
///
/// let gravity = Gravity { base: BaseSystem::new() };
/// gravity.add_entities(&[Entity::new()]);
/// assert_eq!(gravity.entities().len(), 1);
/// ```
pub trait System: Send + Sync + 'static {
    /// A stable name, used for lookup and in logs.
    fn name(&self) -> &str;

    /// Advance the system by one tick.
    ///
    /// # Errors
    ///
    /// An error is reported to the caller of
    /// [`SystemManager::update`](crate::SystemManager::update); it does not
    /// stop other systems.
    fn update(&self, ctx: &TickContext) -> anyhow::Result<()>;

    /// The embedded entity bookkeeping.
    fn base(&self) -> &BaseSystem;

    /// Track every entity in `entities` that passes the system's filter.
    /// Returns how many were accepted.
    fn add_entities(&self, entities: &[Entity]) -> usize {
        self.base().add_entities(entities)
    }

    /// Snapshot of the tracked entities, ordered by id.
    fn entities(&self) -> Vec<Entity> {
        self.base().entities()
    }

    /// Stop tracking `entity`. Returns `false` if it was not tracked.
    fn remove_entity(&self, entity: &Entity) -> bool {
        self.base().remove_entity(entity)
    }
}

/// Concurrent entity bookkeeping shared by all systems.
///
/// Entities are keyed by id; adding the same entity twice keeps one entry.
pub struct BaseSystem {
    entities: DashMap<EntityId, Entity>,
    filter: Box<dyn EntityFilter>,
}

impl BaseSystem {
    /// Bookkeeping that accepts every entity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_filter(AcceptAll)
    }

    /// Bookkeeping that only accepts entities passing `filter`.
    #[must_use]
    pub fn with_filter(filter: impl EntityFilter + 'static) -> Self {
        Self {
            entities: DashMap::new(),
            filter: Box::new(filter),
        }
    }

    /// Track the entities that pass the filter. Returns how many were
    /// accepted.
    pub fn add_entities(&self, entities: &[Entity]) -> usize {
        let mut accepted = 0;
        for entity in entities {
            if self.filter.accepts(entity) {
                self.entities.insert(entity.id(), entity.clone());
                accepted += 1;
            }
        }
        accepted
    }

    /// Snapshot of the tracked entities, ordered by id.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<_> = self.entities.iter().map(|e| e.value().clone()).collect();
        entities.sort_by_key(Entity::id);
        entities
    }

    /// Look up a tracked entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<Entity> {
        self.entities.get(&id).map(|e| e.value().clone())
    }

    /// Returns `true` if the entity is tracked.
    #[must_use]
    pub fn contains(&self, entity: &Entity) -> bool {
        self.entities.contains_key(&entity.id())
    }

    /// Stop tracking `entity`. Returns `false` if it was not tracked.
    pub fn remove_entity(&self, entity: &Entity) -> bool {
        self.entities.remove(&entity.id()).is_some()
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entity is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Default for BaseSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BaseSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseSystem")
            .field("entities", &self.entities.len())
            .finish_non_exhaustive()
    }
}
