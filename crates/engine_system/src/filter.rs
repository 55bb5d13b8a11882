//! Entity filters: which entities a system accepts.
//!
//! A system only tracks entities that pass its [`EntityFilter`]. The usual
//! filter is a [`ComponentFilter`] listing the components an entity must and
//! must not carry, but any `Fn(&Entity) -> bool` works too.

use engine_component::{Component, ComponentTypeId, Entity};

/// Decides whether an entity meets a system's requirements.
pub trait EntityFilter: Send + Sync {
    /// Returns `true` if the entity should be tracked by the system.
    fn accepts(&self, entity: &Entity) -> bool;
}

impl<F> EntityFilter for F
where
    F: Fn(&Entity) -> bool + Send + Sync,
{
    fn accepts(&self, entity: &Entity) -> bool {
        self(entity)
    }
}

/// Accepts every entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl EntityFilter for AcceptAll {
    fn accepts(&self, _entity: &Entity) -> bool {
        true
    }
}

/// A single component condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentCondition {
    /// Only match entities that have this component.
    With(ComponentTypeId),
    /// Only match entities that do NOT have this component.
    Without(ComponentTypeId),
}

impl ComponentCondition {
    fn holds(self, entity: &Entity) -> bool {
        match self {
            Self::With(id) => entity.has_component_id(id),
            Self::Without(id) => !entity.has_component_id(id),
        }
    }
}

/// Matches entities by the presence and absence of components.
///
/// ```rust
/// use engine_component::{Component, Entity};
/// use engine_system::{ComponentFilter, EntityFilter};
///
/// struct Health(u32);
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
///
/// let alive = ComponentFilter::new().with::<Health>();
/// assert!(alive.accepts(&Entity::builder().with(Health(3)).build()));
/// assert!(!alive.accepts(&Entity::new()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ComponentFilter {
    conditions: Vec<ComponentCondition>,
}

impl ComponentFilter {
    /// Create an empty filter (accepts everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require component `T`.
    #[must_use]
    pub fn with<T: Component>(self) -> Self {
        self.condition(ComponentCondition::With(T::component_type_id()))
    }

    /// Require that component `T` is absent.
    #[must_use]
    pub fn without<T: Component>(self) -> Self {
        self.condition(ComponentCondition::Without(T::component_type_id()))
    }

    /// Require a component by name.
    #[must_use]
    pub fn with_named(self, name: &str) -> Self {
        self.condition(ComponentCondition::With(ComponentTypeId::from_name(name)))
    }

    /// Add a raw condition.
    #[must_use]
    pub fn condition(mut self, condition: ComponentCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Component types an entity must carry.
    #[must_use]
    pub fn required_types(&self) -> Vec<ComponentTypeId> {
        self.conditions
            .iter()
            .filter_map(|c| match c {
                ComponentCondition::With(id) => Some(*id),
                ComponentCondition::Without(_) => None,
            })
            .collect()
    }
}

impl EntityFilter for ComponentFilter {
    fn accepts(&self, entity: &Entity) -> bool {
        self.conditions.iter().all(|c| c.holds(entity))
    }
}
