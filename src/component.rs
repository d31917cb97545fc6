//! Component descriptors and the process-wide component registry.
//!
//! Every component type is described once by a [`ComponentDescriptor`] that
//! carries its size, alignment, identifiers, and a small table of type-erased
//! lifecycle operations. Chunks never see concrete component types; they only
//! call through that table.

use crate::config::MAX_COMPONENT_TYPES;
use crate::{hash, HashMap};
use parking_lot::{Mutex, RwLock};
use std::any::TypeId;
use std::sync::OnceLock;
use std::{fmt, mem, ptr};

/// A plain value type that can be attached to an entity.
///
/// `NAME` must be unique among component types and should not change between
/// sessions: the stable component id is derived from it. Use
/// `#[derive(Component)]` to fill it in from the type's path.
pub trait Component: Default + Send + Sync + 'static {
    const NAME: &'static str;

    /// Per-type cache of the descriptor in [`ComponentRegistry::global`].
    /// `#[derive(Component)]` provides one; without it lookups go through the
    /// registry maps.
    #[doc(hidden)]
    fn descriptor_slot() -> Option<&'static OnceLock<&'static ComponentDescriptor>> {
        None
    }
}

/// Sequential, process-local component identifier. `0` is reserved for "none".
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct ComponentId(u32);

impl ComponentId {
    pub const NONE: Self = ComponentId(0);

    pub const fn new(id: u32) -> Self {
        ComponentId(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl Default for ComponentId {
    fn default() -> Self {
        ComponentId::NONE
    }
}

/// Size, alignment, identifiers and lifecycle operations of one component type.
pub struct ComponentDescriptor {
    id: ComponentId,
    stable_id: u64,
    name: &'static str,
    type_id: TypeId,
    size: usize,
    align: usize,
    needs_drop: bool,
    construct_fn: unsafe fn(*mut u8),
    move_fn: unsafe fn(*mut u8, *mut u8),
    drop_fn: unsafe fn(*mut u8),
}

unsafe fn construct_impl<T: Default>(dst: *mut u8) {
    ptr::write(dst as *mut T, T::default());
}

unsafe fn move_impl<T>(src: *mut u8, dst: *mut u8) {
    ptr::copy_nonoverlapping(src as *const T, dst as *mut T, 1);
}

unsafe fn drop_impl<T>(ptr: *mut u8) {
    ptr::drop_in_place(ptr as *mut T);
}

impl ComponentDescriptor {
    fn of<C: Component>(id: ComponentId, stable_id: u64) -> Self {
        ComponentDescriptor {
            id,
            stable_id,
            name: C::NAME,
            type_id: TypeId::of::<C>(),
            size: mem::size_of::<C>(),
            align: mem::align_of::<C>(),
            needs_drop: mem::needs_drop::<C>(),
            construct_fn: construct_impl::<C>,
            move_fn: move_impl::<C>,
            drop_fn: drop_impl::<C>,
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn stable_id(&self) -> u64 {
        self.stable_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    pub fn needs_drop(&self) -> bool {
        self.needs_drop
    }

    /// Returns `true` if this descriptor describes `C`.
    pub fn is<C: Component>(&self) -> bool {
        self.type_id == TypeId::of::<C>()
    }

    /// Writes a default value to `dst`.
    ///
    /// # Safety
    /// `dst` must be valid for writes and aligned for the described type.
    /// Any value previously at `dst` is overwritten without being dropped.
    #[inline]
    pub unsafe fn construct(&self, dst: *mut u8) {
        (self.construct_fn)(dst);
    }

    /// Moves the value at `src` into `dst`. After the call `src` holds no value.
    ///
    /// # Safety
    /// `src` must hold a live value of the described type, `dst` must be valid
    /// uninitialized storage for it, and the two must not overlap.
    #[inline]
    pub unsafe fn move_to(&self, src: *mut u8, dst: *mut u8) {
        (self.move_fn)(src, dst);
    }

    /// Drops the value at `ptr` in place.
    ///
    /// # Safety
    /// `ptr` must hold a live value of the described type.
    #[inline]
    pub unsafe fn destroy(&self, ptr: *mut u8) {
        if self.needs_drop {
            (self.drop_fn)(ptr);
        }
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("id", &self.id)
            .field("stable_id", &format_args!("{:#018x}", self.stable_id))
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish()
    }
}

impl PartialEq for ComponentDescriptor {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Eq for ComponentDescriptor {}

/// Maps component types to their process-lifetime descriptors.
///
/// `find` and `get` of derived types in the global registry are lock-free
/// once the type is registered; the other lookups take a shared lock and
/// only the first registration of a type takes the insert mutex.
pub struct ComponentRegistry {
    capacity: usize,
    slots: Box<[OnceLock<&'static ComponentDescriptor>]>,
    by_type: RwLock<HashMap<TypeId, &'static ComponentDescriptor>>,
    by_stable_id: RwLock<HashMap<u64, &'static ComponentDescriptor>>,
    next_id: Mutex<u32>,
}

static REGISTRY: OnceLock<ComponentRegistry> = OnceLock::new();

impl ComponentRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        ComponentRegistry {
            capacity,
            slots: (0..capacity).map(|_| OnceLock::new()).collect(),
            by_type: Default::default(),
            by_stable_id: Default::default(),
            next_id: Mutex::new(1),
        }
    }

    /// Returns the process-wide registry, creating it on first access.
    pub fn global() -> &'static ComponentRegistry {
        REGISTRY.get_or_init(|| ComponentRegistry::new(MAX_COMPONENT_TYPES))
    }

    /// Returns the descriptor of `C`, registering it on first use.
    ///
    /// Panics if the registry is full or another type already uses the same
    /// stable id.
    pub fn get<C: Component>(&self) -> &'static ComponentDescriptor {
        match C::descriptor_slot() {
            Some(slot) if self.is_global() => slot.get_or_init(|| self.lookup::<C>()),
            _ => self.lookup::<C>(),
        }
    }

    fn is_global(&self) -> bool {
        REGISTRY.get().map_or(false, |global| ptr::eq(self, global))
    }

    fn lookup<C: Component>(&self) -> &'static ComponentDescriptor {
        match self.find_by_type_id(TypeId::of::<C>()) {
            Some(desc) => desc,
            None => self.register::<C>(),
        }
    }

    #[cold]
    fn register<C: Component>(&self) -> &'static ComponentDescriptor {
        #[cold]
        #[inline(never)]
        fn capacity_exceeded(capacity: usize) -> ! {
            panic!("Out of component ids. A maximum number of component types ({capacity}) is reached.");
        }

        let mut next_id = self.next_id.lock();

        // Another thread may have registered `C` while this one waited.
        if let Some(desc) = self.find_by_type_id(TypeId::of::<C>()) {
            return desc;
        }

        let stable_id = hash::hash_str(C::NAME);
        if let Some(other) = self.find_by_stable_id(stable_id) {
            panic!(
                "Component `{}` has the same stable id as `{}` ({:#018x})",
                C::NAME,
                other.name,
                stable_id
            );
        }

        let raw_id = *next_id;
        if raw_id as usize > self.capacity {
            capacity_exceeded(self.capacity);
        }

        let desc: &'static ComponentDescriptor = Box::leak(Box::new(ComponentDescriptor::of::<C>(
            ComponentId(raw_id),
            stable_id,
        )));

        let _ = self.slots[raw_id as usize - 1].set(desc);
        self.by_stable_id.write().insert(stable_id, desc);
        self.by_type.write().insert(desc.type_id, desc);
        *next_id += 1;

        tracing::debug!(
            id = raw_id,
            name = desc.name,
            size = desc.size,
            align = desc.align,
            "registered component type"
        );

        desc
    }

    /// Returns the descriptor with the specified sequential id.
    pub fn find(&self, id: ComponentId) -> Option<&'static ComponentDescriptor> {
        let idx = id.0.checked_sub(1)? as usize;
        self.slots.get(idx)?.get().copied()
    }

    /// Returns the descriptor with the specified stable (name-derived) id.
    pub fn find_by_stable_id(&self, stable_id: u64) -> Option<&'static ComponentDescriptor> {
        self.by_stable_id.read().get(&stable_id).copied()
    }

    pub fn find_by_type_id(&self, type_id: TypeId) -> Option<&'static ComponentDescriptor> {
        self.by_type.read().get(&type_id).copied()
    }

    /// Returns the number of registered component types.
    pub fn len(&self) -> usize {
        *self.next_id.lock() as usize - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shorthand for `ComponentRegistry::global().get::<C>()`.
pub fn descriptor<C: Component>() -> &'static ComponentDescriptor {
    ComponentRegistry::global().get::<C>()
}

/// Shorthand for the sequential id of `C`.
pub fn component_id<C: Component>() -> ComponentId {
    descriptor::<C>().id()
}
