//! Core [`Component`] trait and the shared handle components are stored behind.
//!
//! Every piece of data attached to an [`Entity`](crate::Entity) implements
//! [`Component`]. The trait requires `Send + Sync + 'static` so components can
//! be read and written from systems running on any worker thread.
//!
//! ## Name-keyed identity
//!
//! A component is identified by its **string name**. [`ComponentTypeId`] is
//! derived from that name using the FNV-1a 64-bit hash, so two components
//! reporting the same name occupy the same slot on an entity and the last one
//! written wins.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

/// A unique identifier for a component slot, derived from the component's
/// string name using the FNV-1a 64-bit hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] from a component name.
    ///
    /// # Algorithm (FNV-1a 64-bit)
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325          (offset basis)
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3  (prime)
    /// return hash
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the [`ComponentTypeId`] for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }
}

/// The core component trait.
///
/// # Examples
///
/// ```rust
/// use engine_component::{Component, Entity};
///
/// #[derive(Debug)]
/// struct Health {
///     current: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
///
/// let entity = Entity::new();
/// let health = entity.add_component(Health { current: 100.0 });
/// health.write().current -= 10.0;
/// assert_eq!(entity.component::<Health>().unwrap().read().current, 90.0);
/// ```
pub trait Component: Send + Sync + 'static {
    /// The stable name of this component. Used as its storage key.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }
}

/// A shared, lockable reference to a component attached to an entity.
///
/// Handles are cheap to clone. Every clone points at the same value, so a
/// system can look a component up once and mutate it in place through
/// [`ComponentHandle::write`].
pub struct ComponentHandle<T> {
    inner: Arc<RwLock<T>>,
}

impl<T: Component> ComponentHandle<T> {
    /// Wrap a component value in a new handle.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    /// Acquire shared read access to the component.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    /// Acquire exclusive write access to the component.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }

    /// Returns `true` if both handles point at the same component value.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn erase(&self) -> ErasedComponent {
        self.inner.clone()
    }

    /// Checked downcast from the type-erased slot value. Returns `None` when a
    /// different Rust type was stored under the same name.
    pub(crate) fn from_erased(value: ErasedComponent) -> Option<Self> {
        value.downcast::<RwLock<T>>().ok().map(|inner| Self { inner })
    }
}

impl<T> Clone for ComponentHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ComponentHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_read() {
            Some(value) => f.debug_tuple("ComponentHandle").field(&*value).finish(),
            None => f.write_str("ComponentHandle(<locked>)"),
        }
    }
}

pub(crate) type ErasedComponent = Arc<dyn Any + Send + Sync>;

/// One occupied component slot on an entity.
#[derive(Clone)]
pub(crate) struct ComponentSlot {
    pub(crate) name: &'static str,
    pub(crate) value: ErasedComponent,
}

impl ComponentSlot {
    pub(crate) fn from_handle<T: Component>(handle: &ComponentHandle<T>) -> Self {
        Self {
            name: T::type_name(),
            value: handle.erase(),
        }
    }
}
