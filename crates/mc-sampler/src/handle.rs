use std::any::{self, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Upcast helper so registered trait objects can be downcast to their concrete type.
pub trait AsAny: Any {
    /// Shared view as `dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Exclusive view as `dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Concrete type name, used in diagnostics.
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        any::type_name::<T>()
    }
}

static NEXT_REGISTRY: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_registry_id() -> u64 {
    NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed)
}

/// Typed reference to an entry of one registry, returned at registration time.
///
/// `Tag` distinguishes move handles from measure handles; `T` is the concrete type that was
/// registered, so resolving the handle needs no caller-side type assertion.
pub struct Handle<Tag, T> {
    pub(crate) index: usize,
    pub(crate) registry: u64,
    _marker: PhantomData<fn() -> (Tag, T)>,
}

impl<Tag, T> Handle<Tag, T> {
    pub(crate) fn new(index: usize, registry: u64) -> Self {
        Self {
            index,
            registry,
            _marker: PhantomData,
        }
    }

    /// Registration order of the entry.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<Tag, T> Clone for Handle<Tag, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Tag, T> Copy for Handle<Tag, T> {}

impl<Tag, T> fmt::Debug for Handle<Tag, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index)
            .field("registry", &self.registry)
            .field("type", &any::type_name::<T>())
            .finish()
    }
}
