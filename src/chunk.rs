pub mod layout;

use crate::archetype::ArchetypeId;
use crate::component::Component;
use crate::config::CHUNK_SIZE;
use crate::entity::Entity;
use layout::ChunkLayout;
use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::Arc;
use std::{fmt, slice};

/// Header stored at the start of every chunk block.
#[repr(C)]
pub(crate) struct ChunkHeader {
    archetype: ArchetypeId,
    index: u32,
    count: u32,
    capacity: u32,
    version: u32,
}

/// A fixed-size block holding up to `capacity` entities of one archetype.
///
/// Rows `0..len()` are always live: the entity-id array and every column
/// hold initialized values for them, rows past `len()` hold nothing.
pub struct Chunk {
    ptr: NonNull<u8>,
    layout: Arc<ChunkLayout>,
}

// Safety: a chunk exclusively owns its block, and every component stored in
// it is `Send + Sync`.
unsafe impl Send for Chunk {}
unsafe impl Sync for Chunk {}

impl Chunk {
    pub(crate) fn new(layout: Arc<ChunkLayout>, archetype: ArchetypeId, index: u32) -> Self {
        let alloc_layout = Self::alloc_layout(&layout);

        // Safety: `alloc_layout` has a non-zero size.
        let raw = unsafe { alloc::alloc(alloc_layout) };
        let ptr = match NonNull::new(raw) {
            Some(ptr) => ptr,
            None => alloc::handle_alloc_error(alloc_layout),
        };

        let header = ChunkHeader {
            archetype,
            index,
            count: 0,
            capacity: layout.capacity(),
            version: 0,
        };
        // Safety: the block is at least `CHUNK_SIZE` bytes and aligned to at least 64.
        unsafe { ptr.as_ptr().cast::<ChunkHeader>().write(header) };

        tracing::trace!(archetype = archetype.get(), index, "allocated chunk");

        Chunk { ptr, layout }
    }

    fn alloc_layout(layout: &ChunkLayout) -> Layout {
        // Safety: `ChunkLayout::align` is the maximum of component alignments and
        // a power-of-two constant, so it is a power of two; `CHUNK_SIZE` is far
        // below `isize::MAX`.
        unsafe { Layout::from_size_align_unchecked(CHUNK_SIZE, layout.align()) }
    }

    #[inline]
    fn header(&self) -> &ChunkHeader {
        unsafe { &*self.ptr.as_ptr().cast::<ChunkHeader>() }
    }

    #[inline]
    fn header_mut(&mut self) -> &mut ChunkHeader {
        unsafe { &mut *self.ptr.as_ptr().cast::<ChunkHeader>() }
    }

    /// Returns the archetype that owns this chunk.
    pub fn archetype(&self) -> ArchetypeId {
        self.header().archetype
    }

    /// Position of this chunk in its archetype's chunk list.
    pub fn index(&self) -> u32 {
        self.header().index
    }

    /// Number of live entities in the chunk.
    pub fn len(&self) -> u32 {
        self.header().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> u32 {
        self.header().capacity
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Archetype change counter value of the last write to this chunk.
    pub fn version(&self) -> u32 {
        self.header().version
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// Returns the ids of the live entities, in row order.
    pub fn entities(&self) -> &[Entity] {
        // Safety: rows `0..len` of the entity array are initialized.
        unsafe { slice::from_raw_parts(self.entity_ptr(0), self.len() as usize) }
    }

    /// Returns the column of component `C` for the live rows.
    pub fn column<C: Component>(&self) -> Option<&[C]> {
        let column = self.column_index::<C>()?;
        let ptr = self.column_ptr(column, 0) as *const C;
        // Safety: the column holds `len` initialized, aligned values of `C`.
        Some(unsafe { slice::from_raw_parts(ptr, self.len() as usize) })
    }

    /// Returns the column of component `C` for the live rows.
    pub(crate) fn column_mut<C: Component>(&mut self) -> Option<&mut [C]> {
        let column = self.column_index::<C>()?;
        Some(self.column_at_mut(column))
    }

    /// Returns column `column`, which must hold values of `C`, for the live rows.
    pub(crate) fn column_at_mut<C: Component>(&mut self, column: usize) -> &mut [C] {
        assert!(self.layout.components()[column].is::<C>(), "column type mismatch");
        let ptr = self.column_ptr(column, 0) as *mut C;
        // Safety: see `column`; `&mut self` makes the borrow unique.
        unsafe { slice::from_raw_parts_mut(ptr, self.len() as usize) }
    }

    #[inline]
    pub(crate) fn column_index<C: Component>(&self) -> Option<usize> {
        self.layout.components().iter().position(|c| c.is::<C>())
    }

    /// Address of `row` in `column`: `base + column_offset + row * size`.
    #[inline]
    pub(crate) fn column_ptr(&self, column: usize, row: u32) -> *mut u8 {
        let size = self.layout.components()[column].size();
        let offset = self.layout.column_offset(column) + row as usize * size;
        debug_assert!(row < self.capacity());
        // Safety: the offset lies inside the block by construction of the layout.
        unsafe { self.ptr.as_ptr().add(offset) }
    }

    #[inline]
    pub(crate) fn entity_ptr(&self, row: u32) -> *mut Entity {
        let offset = self.layout.entities_offset() + row as usize * std::mem::size_of::<Entity>();
        unsafe { self.ptr.as_ptr().add(offset).cast::<Entity>() }
    }

    /// Appends `entity` to the entity array. Every column at the returned row
    /// must already be initialized by the caller.
    pub(crate) fn push(&mut self, entity: Entity) -> u32 {
        let row = self.len();
        assert!(row < self.capacity(), "chunk is full");
        unsafe { self.entity_ptr(row).write(entity) };
        self.header_mut().count += 1;
        row
    }

    /// Forgets the last row. Its component values must already be moved out or destroyed.
    pub(crate) fn pop(&mut self) {
        debug_assert!(!self.is_empty());
        self.header_mut().count -= 1;
    }

    pub(crate) fn set_version(&mut self, version: u32) {
        self.header_mut().version = version;
    }

    pub(crate) fn set_entity(&mut self, row: u32, entity: Entity) {
        debug_assert!(row < self.len());
        unsafe { self.entity_ptr(row).write(entity) };
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        for row in 0..self.len() {
            for (column, desc) in self.layout.components().iter().enumerate() {
                unsafe { desc.destroy(self.column_ptr(column, row)) };
            }
        }

        tracing::trace!(
            archetype = self.archetype().get(),
            index = self.index(),
            "released chunk"
        );

        unsafe { alloc::dealloc(self.ptr.as_ptr(), Self::alloc_layout(&self.layout)) };
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("archetype", &self.archetype())
            .field("index", &self.index())
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("version", &self.version())
            .finish()
    }
}
