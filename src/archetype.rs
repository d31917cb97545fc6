pub mod registry;

use crate::chunk::layout::ChunkLayout;
use crate::chunk::Chunk;
use crate::component::{Component, ComponentDescriptor, ComponentId};
use crate::entity::Entity;
use crate::HashMap;
#[cfg(feature = "rayon")]
use rayon::iter::IndexedParallelIterator;
use std::sync::Arc;
use std::{fmt, slice};

/// An archetype identifier. `ArchetypeId::EMPTY` is the component-less archetype.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    pub const EMPTY: Self = ArchetypeId(0);

    pub const fn new(id: u32) -> Self {
        ArchetypeId(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

#[cold]
#[inline(never)]
fn index_out_of_range(index: u32, count: u32) -> ! {
    panic!("entity index {index} is out of range, the archetype holds {count} entities");
}

/// All entities sharing one exact component set, stored in fixed-size chunks.
///
/// Entities are addressed by a flattened index `chunk * capacity + row`. Live
/// entities always occupy indices `0..entity_count()`: removal fills the hole
/// with the last entity, so every chunk but the last is full.
pub struct Archetype {
    id: ArchetypeId,
    hash: u64,
    layout: Arc<ChunkLayout>,
    chunks: Vec<Chunk>,
    entity_count: u32,
    version: u32,
    add_edges: HashMap<ComponentId, ArchetypeId>,
    remove_edges: HashMap<ComponentId, ArchetypeId>,
}

impl Archetype {
    pub(crate) fn new(id: ArchetypeId, hash: u64, layout: ChunkLayout) -> Self {
        Archetype {
            id,
            hash,
            layout: Arc::new(layout),
            chunks: Vec::new(),
            entity_count: 0,
            version: 0,
            add_edges: Default::default(),
            remove_edges: Default::default(),
        }
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Order-independent hash of the component set.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// Component descriptors, sorted by component id.
    pub fn components(&self) -> &[&'static ComponentDescriptor] {
        self.layout.components()
    }

    pub fn component_ids(&self) -> impl ExactSizeIterator<Item = ComponentId> + '_ {
        self.layout.component_ids()
    }

    pub fn component_count(&self) -> u32 {
        self.layout.components().len() as u32
    }

    pub fn entity_count(&self) -> u32 {
        self.entity_count
    }

    pub fn is_empty(&self) -> bool {
        self.entity_count == 0
    }

    pub fn has_component(&self, id: ComponentId) -> bool {
        self.layout.column_of(id).is_some()
    }

    pub fn contains<C: Component>(&self) -> bool {
        self.layout.components().iter().any(|c| c.is::<C>())
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn get_chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    /// Returns the column of `C` in chunk `chunk` for writing and stamps the
    /// chunk's version.
    pub(crate) fn column_mut<C: Component>(&mut self, chunk: usize) -> Option<&mut [C]> {
        self.chunks.get(chunk)?.column_index::<C>()?;
        let version = self.bump_version();
        let chunk = &mut self.chunks[chunk];
        chunk.set_version(version);
        chunk.column_mut::<C>()
    }

    pub fn chunks(&self) -> slice::Iter<'_, Chunk> {
        self.chunks.iter()
    }

    /// Returns a parallel iterator over the chunks.
    #[cfg(feature = "rayon")]
    pub fn par_chunks(&self) -> rayon::slice::Iter<'_, Chunk> {
        use rayon::prelude::*;
        self.chunks.par_iter()
    }

    /// Returns a parallel iterator over the `C` column of every chunk; every
    /// chunk is stamped.
    #[cfg(feature = "rayon")]
    pub(crate) fn par_columns_mut<C: Component>(
        &mut self,
    ) -> Option<impl IndexedParallelIterator<Item = &mut [C]> + '_> {
        use rayon::prelude::*;
        let column = self.layout.components().iter().position(|c| c.is::<C>())?;
        let version = self.bump_version();
        for chunk in &mut self.chunks {
            chunk.set_version(version);
        }
        Some(
            self.chunks
                .par_iter_mut()
                .map(move |chunk| chunk.column_at_mut::<C>(column)),
        )
    }

    /// Current value of the change counter.
    pub fn version(&self) -> u32 {
        self.version
    }

    fn bump_version(&mut self) -> u32 {
        self.version = self.version.wrapping_add(1);
        self.version
    }

    #[inline]
    fn locate(&self, index: u32) -> (usize, u32) {
        if index >= self.entity_count {
            index_out_of_range(index, self.entity_count);
        }
        let capacity = self.layout.capacity();
        ((index / capacity) as usize, index % capacity)
    }

    /// Returns the entity stored at `index`.
    pub fn entity_at(&self, index: u32) -> Option<Entity> {
        if index >= self.entity_count {
            return None;
        }
        let (chunk, row) = self.locate(index);
        Some(self.chunks[chunk].entities()[row as usize])
    }

    /// Returns a reference to the component `C` of the entity at `index`.
    pub fn get_component<C: Component>(&self, index: u32) -> Option<&C> {
        if index >= self.entity_count {
            return None;
        }
        let (chunk, row) = self.locate(index);
        let chunk = &self.chunks[chunk];
        let column = chunk.column_index::<C>()?;
        // Safety: live rows hold initialized values of the column's type.
        Some(unsafe { &*(chunk.column_ptr(column, row) as *const C) })
    }

    /// Returns a mutable reference to the component `C` of the entity at `index`.
    pub(crate) fn get_component_mut<C: Component>(&mut self, index: u32) -> Option<&mut C> {
        if index >= self.entity_count {
            return None;
        }
        let (chunk, row) = self.locate(index);
        let column = self.chunks[chunk].column_index::<C>()?;
        let version = self.bump_version();
        let chunk = &mut self.chunks[chunk];
        chunk.set_version(version);
        Some(unsafe { &mut *(chunk.column_ptr(column, row) as *mut C) })
    }

    /// Overwrites the component `C` of the entity at `index`, dropping the old value.
    /// Returns `false` if the archetype has no `C` or `index` is out of range.
    pub(crate) fn set_component<C: Component>(&mut self, index: u32, value: C) -> bool {
        match self.get_component_mut::<C>(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Returns the chunk and row the next entity will be written to,
    /// allocating a chunk if the last one is full.
    fn reserve(&mut self) -> (usize, u32) {
        if self.chunks.last().map_or(true, |c| c.is_full()) {
            let index = self.chunks.len() as u32;
            self.chunks.push(Chunk::new(self.layout.clone(), self.id, index));
        }
        let chunk = self.chunks.len() - 1;
        (chunk, self.chunks[chunk].len())
    }

    /// Publishes the reserved row; all of its columns must be initialized.
    fn commit(&mut self, chunk: usize, entity: Entity) -> u32 {
        let version = self.bump_version();
        let chunk_ref = &mut self.chunks[chunk];
        let row = chunk_ref.push(entity);
        chunk_ref.set_version(version);
        self.entity_count += 1;
        chunk as u32 * self.layout.capacity() + row
    }

    /// Appends `entity` with every component default-constructed.
    /// Returns the entity's index in the archetype.
    pub(crate) fn add(&mut self, entity: Entity) -> u32 {
        let (chunk, row) = self.reserve();
        {
            let chunk = &self.chunks[chunk];
            for (column, desc) in self.layout.components().iter().enumerate() {
                unsafe { desc.construct(chunk.column_ptr(column, row)) };
            }
        }
        self.commit(chunk, entity)
    }

    /// Destroys the entity at `index` and fills its slot with the last entity.
    /// Returns the entity that now lives at `index`, if one was moved.
    pub(crate) fn remove(&mut self, index: u32) -> Option<Entity> {
        let (chunk, row) = self.locate(index);
        {
            let chunk = &self.chunks[chunk];
            for (column, desc) in self.layout.components().iter().enumerate() {
                unsafe { desc.destroy(chunk.column_ptr(column, row)) };
            }
        }
        self.fill_hole(index)
    }

    /// Moves the last entity into the vacated slot `index` and shrinks the
    /// archetype by one. The slot's component values must already be gone.
    fn fill_hole(&mut self, index: u32) -> Option<Entity> {
        let last = self.entity_count - 1;
        let (last_chunk, last_row) = self.locate(last);
        let version = self.bump_version();

        let moved = if index != last {
            let (chunk, row) = self.locate(index);
            let src = &self.chunks[last_chunk];
            let dst = &self.chunks[chunk];
            for (column, desc) in self.layout.components().iter().enumerate() {
                unsafe { desc.move_to(src.column_ptr(column, last_row), dst.column_ptr(column, row)) };
            }
            let entity = src.entities()[last_row as usize];
            let dst = &mut self.chunks[chunk];
            dst.set_entity(row, entity);
            dst.set_version(version);
            Some(entity)
        } else {
            None
        };

        let tail = &mut self.chunks[last_chunk];
        tail.pop();
        tail.set_version(version);
        if tail.is_empty() {
            self.chunks.pop();
        }
        self.entity_count -= 1;

        moved
    }

    /// Moves the entity at `index` into `dst`.
    ///
    /// Components present in both archetypes are moved, destination-only
    /// components are default-constructed and source-only components are
    /// destroyed. Returns the entity's index in `dst` and the entity that now
    /// occupies `index` in `self`, if any.
    pub(crate) fn move_entity(&mut self, index: u32, dst: &mut Archetype) -> (u32, Option<Entity>) {
        let (src_chunk, src_row) = self.locate(index);
        let entity = self.chunks[src_chunk].entities()[src_row as usize];
        let (dst_chunk, dst_row) = dst.reserve();

        {
            let src_chunk = &self.chunks[src_chunk];
            let dst_chunk_ref = &dst.chunks[dst_chunk];

            for (dst_column, desc) in dst.layout.components().iter().enumerate() {
                let dst_ptr = dst_chunk_ref.column_ptr(dst_column, dst_row);
                match self.layout.column_of(desc.id()) {
                    Some(src_column) => unsafe {
                        desc.move_to(src_chunk.column_ptr(src_column, src_row), dst_ptr)
                    },
                    None => unsafe { desc.construct(dst_ptr) },
                }
            }

            for (src_column, desc) in self.layout.components().iter().enumerate() {
                if !dst.has_component(desc.id()) {
                    unsafe { desc.destroy(src_chunk.column_ptr(src_column, src_row)) };
                }
            }
        }

        let dst_index = dst.commit(dst_chunk, entity);
        let moved = self.fill_hole(index);

        tracing::trace!(
            from = self.id.get(),
            to = dst.id.get(),
            entity = entity.index(),
            "moved entity between archetypes"
        );

        (dst_index, moved)
    }

    pub(crate) fn add_edge(&self, id: ComponentId) -> Option<ArchetypeId> {
        self.add_edges.get(&id).copied()
    }

    pub(crate) fn remove_edge(&self, id: ComponentId) -> Option<ArchetypeId> {
        self.remove_edges.get(&id).copied()
    }

    pub(crate) fn set_add_edge(&mut self, id: ComponentId, to: ArchetypeId) {
        self.add_edges.insert(id, to);
    }

    pub(crate) fn set_remove_edge(&mut self, id: ComponentId, to: ArchetypeId) {
        self.remove_edges.insert(id, to);
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("hash", &format_args!("{:#018x}", self.hash))
            .field(
                "components",
                &self.components().iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("entity_count", &self.entity_count)
            .field("chunk_count", &self.chunks.len())
            .finish()
    }
}
