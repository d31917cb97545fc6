use crate::archetype::{Archetype, ArchetypeId};
use crate::chunk::layout::{ChunkLayout, Components};
use crate::component::{ComponentId, ComponentRegistry};
use crate::config::MAX_INLINE_COMPONENTS;
use crate::entity::Entity;
use crate::error::LayoutError;
use crate::{hash, HashMap};
use smallvec::SmallVec;
use std::collections::hash_map;
use std::hash::{Hash, Hasher};
use std::slice;

pub(crate) type ComponentIds = SmallVec<[ComponentId; MAX_INLINE_COMPONENTS]>;

/// Canonical component set: sorted by id, duplicates and `ComponentId::NONE` removed.
#[derive(Clone, Eq)]
struct ArchetypeKey {
    sorted_ids: ComponentIds,
    hash_val: u64,
}

impl ArchetypeKey {
    fn new(ids: &[ComponentId]) -> ArchetypeKey {
        let sorted_ids = canonicalize(ids);
        let hash_val = hash::hash_component_ids(&sorted_ids);
        ArchetypeKey {
            sorted_ids,
            hash_val,
        }
    }
}

impl PartialEq for ArchetypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.sorted_ids == other.sorted_ids
    }
}

impl Hash for ArchetypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_val.hash(state);
    }
}

/// Sorts `ids`, removes duplicates and `ComponentId::NONE`.
///
/// `<B, A, A>` and `<A, B>` canonicalize to the same list.
pub fn canonicalize(ids: &[ComponentId]) -> SmallVec<[ComponentId; MAX_INLINE_COMPONENTS]> {
    let mut sorted: ComponentIds = ids.iter().copied().filter(|id| !id.is_none()).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}

#[cold]
#[inline(never)]
fn layout_failed(err: LayoutError) -> ! {
    panic!("cannot create archetype: {err}");
}

#[cold]
#[inline(never)]
fn unknown_component(id: ComponentId) -> ! {
    panic!("component id {} is not registered", id.get());
}

/// Creates archetypes on demand and guarantees one archetype per distinct
/// canonical component set.
///
/// The component-less archetype always exists with id `ArchetypeId::EMPTY`.
pub struct ArchetypeRegistry {
    archetypes: Vec<Archetype>,
    by_key: HashMap<ArchetypeKey, ArchetypeId>,
    by_hash: HashMap<u64, ArchetypeId>,
}

impl ArchetypeRegistry {
    /// Creates a registry holding only the empty archetype.
    ///
    /// Component ids are resolved through [`ComponentRegistry::global`].
    pub fn new() -> Self {
        let mut registry = ArchetypeRegistry {
            archetypes: Vec::new(),
            by_key: Default::default(),
            by_hash: Default::default(),
        };
        let empty = registry.get_by_components(&[]);
        debug_assert_eq!(empty, ArchetypeId::EMPTY);
        registry
    }

    /// Returns the archetype of the component set `ids`, creating it if needed.
    /// Panics if the set cannot be laid out in a chunk.
    pub fn get_by_components(&mut self, ids: &[ComponentId]) -> ArchetypeId {
        match self.try_get_by_components(ids) {
            Ok(id) => id,
            Err(err) => layout_failed(err),
        }
    }

    /// Returns the archetype of the component set `ids`, creating it if needed.
    pub fn try_get_by_components(&mut self, ids: &[ComponentId]) -> Result<ArchetypeId, LayoutError> {
        let key = ArchetypeKey::new(ids);

        match self.by_key.entry(key) {
            hash_map::Entry::Occupied(e) => Ok(*e.get()),
            hash_map::Entry::Vacant(e) => {
                let registry = ComponentRegistry::global();
                let components: Components = e
                    .key()
                    .sorted_ids
                    .iter()
                    .map(|&id| match registry.find(id) {
                        Some(desc) => desc,
                        None => unknown_component(id),
                    })
                    .collect();

                let layout = ChunkLayout::new(&components)?;
                let hash_val = e.key().hash_val;
                let id = ArchetypeId::new(self.archetypes.len() as u32);

                tracing::debug!(
                    id = id.get(),
                    components = ?components.iter().map(|c| c.name()).collect::<Vec<_>>(),
                    capacity = layout.capacity(),
                    "created archetype"
                );

                self.archetypes.push(Archetype::new(id, hash_val, layout));
                match self.by_hash.entry(hash_val) {
                    hash_map::Entry::Vacant(slot) => {
                        slot.insert(id);
                    }
                    hash_map::Entry::Occupied(existing) => {
                        tracing::warn!(
                            id = id.get(),
                            existing = existing.get().get(),
                            hash = hash_val,
                            "archetype hash collision, lookups by hash keep the older archetype"
                        );
                    }
                }
                e.insert(id);
                Ok(id)
            }
        }
    }

    /// Returns the archetype of `from` plus component `id`.
    pub fn with_component(&mut self, from: ArchetypeId, id: ComponentId) -> ArchetypeId {
        let src = self.archetype(from);
        if id.is_none() || src.has_component(id) {
            return from;
        }
        if let Some(to) = src.add_edge(id) {
            return to;
        }

        let mut ids: ComponentIds = src.component_ids().collect();
        ids.push(id);
        let to = self.get_by_components(&ids);

        self.archetype_mut(from).set_add_edge(id, to);
        self.archetype_mut(to).set_remove_edge(id, from);
        to
    }

    /// Returns the archetype of `from` minus component `id`.
    pub fn without_component(&mut self, from: ArchetypeId, id: ComponentId) -> ArchetypeId {
        let src = self.archetype(from);
        if !src.has_component(id) {
            return from;
        }
        if let Some(to) = src.remove_edge(id) {
            return to;
        }

        let ids: ComponentIds = src.component_ids().filter(|c| *c != id).collect();
        let to = self.get_by_components(&ids);

        self.archetype_mut(from).set_remove_edge(id, to);
        self.archetype_mut(to).set_add_edge(id, from);
        to
    }

    /// Returns the component-less archetype.
    pub fn empty(&self) -> ArchetypeId {
        ArchetypeId::EMPTY
    }

    pub fn get_by_id(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    pub(crate) fn get_by_id_mut(&mut self, id: ArchetypeId) -> Option<&mut Archetype> {
        self.archetypes.get_mut(id.index())
    }

    pub fn get_by_component_hash(&self, hash: u64) -> Option<&Archetype> {
        let id = *self.by_hash.get(&hash)?;
        self.get_by_id(id)
    }

    pub(crate) fn archetype(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id.index()]
    }

    pub(crate) fn archetype_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.archetypes[id.index()]
    }

    /// Moves the entity at `index` of `from` into `to`.
    /// Returns its new index and the entity that was swapped into `index`.
    pub(crate) fn move_entity(
        &mut self,
        index: u32,
        from: ArchetypeId,
        to: ArchetypeId,
    ) -> (u32, Option<Entity>) {
        let (src, dst) = self.pair_mut(from, to);
        src.move_entity(index, dst)
    }

    fn pair_mut(&mut self, a: ArchetypeId, b: ArchetypeId) -> (&mut Archetype, &mut Archetype) {
        let len = self.archetypes.len();
        assert!(
            a.index() < len && b.index() < len,
            "invalid archetype id ({}, {}), {} archetypes exist",
            a.get(),
            b.get(),
            len
        );
        assert_ne!(a, b, "cannot move an entity into its own archetype");

        if a.index() < b.index() {
            let (lo, hi) = self.archetypes.split_at_mut(b.index());
            (&mut lo[a.index()], &mut hi[0])
        } else {
            let (lo, hi) = self.archetypes.split_at_mut(a.index());
            (&mut hi[0], &mut lo[b.index()])
        }
    }

    /// Returns the number of archetypes.
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Always `false`: the empty archetype exists from construction.
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Archetype> {
        self.archetypes.iter()
    }
}

impl Default for ArchetypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a ArchetypeRegistry {
    type Item = &'a Archetype;
    type IntoIter = slice::Iter<'a, Archetype>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
