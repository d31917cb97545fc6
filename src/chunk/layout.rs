use crate::chunk::ChunkHeader;
use crate::component::{ComponentDescriptor, ComponentId};
use crate::config::{CHUNK_ALIGN, CHUNK_SIZE, MAX_COMPONENT_ALIGN, MAX_INLINE_COMPONENTS};
use crate::entity::Entity;
use crate::error::LayoutError;
use smallvec::SmallVec;
use std::mem;

pub(crate) type Components = SmallVec<[&'static ComponentDescriptor; MAX_INLINE_COMPONENTS]>;

#[inline]
pub(crate) const fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// Byte-offset plan of one chunk: header, entity-id array, then one packed
/// column per component in canonical order.
#[derive(Debug, Clone)]
pub struct ChunkLayout {
    components: Components,
    offsets: SmallVec<[usize; MAX_INLINE_COMPONENTS]>,
    entities_offset: usize,
    capacity: u32,
    used_bytes: usize,
    align: usize,
}

impl ChunkLayout {
    /// Computes the layout for a canonical (sorted by id, duplicate-free)
    /// component list.
    ///
    /// The capacity is the largest entity count for which every column fits
    /// inside [`CHUNK_SIZE`] with each column start aligned to its component.
    pub fn new(components: &[&'static ComponentDescriptor]) -> Result<Self, LayoutError> {
        debug_assert!(
            components.windows(2).all(|w| w[0].id() < w[1].id()),
            "component list is not canonical"
        );

        if let Some(c) = components.iter().find(|c| c.align() > MAX_COMPONENT_ALIGN) {
            return Err(LayoutError::AlignmentTooLarge {
                name: c.name(),
                align: c.align(),
                max: MAX_COMPONENT_ALIGN,
            });
        }

        let entities_offset = align_up(mem::size_of::<ChunkHeader>(), mem::align_of::<Entity>());
        let available = CHUNK_SIZE - entities_offset;
        let per_entity: usize =
            mem::size_of::<Entity>() + components.iter().map(|c| c.size()).sum::<usize>();

        // Padding only ever shrinks the real capacity below this bound.
        let upper = available / per_entity;

        let mut offsets = SmallVec::with_capacity(components.len());
        let single = place(components, entities_offset, 1, &mut offsets);

        if upper == 0 || single > CHUNK_SIZE {
            return Err(LayoutError::DoesNotFit {
                per_entity: per_entity.max(single - entities_offset),
                available,
            });
        }

        // The end offset grows monotonically with capacity, so the largest
        // fitting capacity is found by bisection over [1, upper].
        let (mut lo, mut hi) = (1, upper);
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if place(components, entities_offset, mid, &mut offsets) <= CHUNK_SIZE {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        let capacity = lo.min(u32::MAX as usize);
        let used_bytes = place(components, entities_offset, capacity, &mut offsets);
        let align = components
            .iter()
            .map(|c| c.align())
            .max()
            .unwrap_or(1)
            .max(CHUNK_ALIGN);

        Ok(ChunkLayout {
            components: components.iter().copied().collect(),
            offsets,
            entities_offset,
            capacity: capacity as u32,
            used_bytes,
            align,
        })
    }

    /// Maximum number of entities per chunk.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Byte offset of the entity-id array.
    pub fn entities_offset(&self) -> usize {
        self.entities_offset
    }

    /// Byte offset of the column at `column`.
    pub fn column_offset(&self, column: usize) -> usize {
        self.offsets[column]
    }

    pub fn column_offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn components(&self) -> &[&'static ComponentDescriptor] {
        &self.components
    }

    pub fn component_ids(&self) -> impl ExactSizeIterator<Item = ComponentId> + '_ {
        self.components.iter().map(|c| c.id())
    }

    /// Returns the column index of the component `id`.
    pub fn column_of(&self, id: ComponentId) -> Option<usize> {
        self.components.iter().position(|c| c.id() == id)
    }

    /// Number of bytes of the chunk actually covered by the layout.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Alignment of the chunk allocation.
    pub fn align(&self) -> usize {
        self.align
    }
}

/// Lays columns out back-to-back for `capacity` entities and returns the end offset.
fn place(
    components: &[&'static ComponentDescriptor],
    entities_offset: usize,
    capacity: usize,
    offsets: &mut SmallVec<[usize; MAX_INLINE_COMPONENTS]>,
) -> usize {
    offsets.clear();
    let mut offset = entities_offset + capacity * mem::size_of::<Entity>();
    for c in components {
        offset = align_up(offset, c.align());
        offsets.push(offset);
        offset += capacity * c.size();
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::descriptor;
    use crate::Component;

    #[allow(dead_code)]
    #[derive(Default, Component)]
    struct Byte(u8);

    #[allow(dead_code)]
    #[derive(Default, Component)]
    struct Wide([u64; 3]);

    #[allow(dead_code)]
    #[derive(Default, Component)]
    #[repr(align(32))]
    struct Aligned32([u32; 10]);

    #[derive(Default, Component)]
    struct Tag;

    #[allow(dead_code)]
    #[derive(Component)]
    struct Huge([u8; CHUNK_SIZE]);

    impl Default for Huge {
        fn default() -> Self {
            Huge([0; CHUNK_SIZE])
        }
    }

    #[allow(dead_code)]
    #[derive(Default, Component)]
    #[repr(align(8192))]
    struct OverAligned(u8);

    fn canonical(mut list: Vec<&'static ComponentDescriptor>) -> Vec<&'static ComponentDescriptor> {
        list.sort_by_key(|c| c.id());
        list
    }

    fn assert_valid(layout: &ChunkLayout) {
        let cap = layout.capacity() as usize;
        assert!(cap > 0);
        assert!(layout.used_bytes() <= CHUNK_SIZE);
        assert!(layout.entities_offset() >= mem::size_of::<ChunkHeader>());

        let mut prev_end = layout.entities_offset() + cap * mem::size_of::<Entity>();
        for (c, &offset) in layout.components().iter().zip(layout.column_offsets()) {
            assert_eq!(offset % c.align(), 0, "column of {} is misaligned", c.name());
            assert!(offset >= prev_end, "column of {} overlaps", c.name());
            prev_end = offset + cap * c.size();
        }
        assert_eq!(prev_end, layout.used_bytes());
    }

    #[test]
    fn mixed_alignment_columns() {
        let comps = canonical(vec![
            descriptor::<Byte>(),
            descriptor::<Wide>(),
            descriptor::<Aligned32>(),
        ]);
        let layout = ChunkLayout::new(&comps).unwrap();
        assert_valid(&layout);
        assert_eq!(layout.align(), CHUNK_ALIGN);

        // Capacity is maximal: one more entity would not fit.
        let mut offsets = SmallVec::new();
        let next = layout.capacity() as usize + 1;
        assert!(place(&comps, layout.entities_offset(), next, &mut offsets) > CHUNK_SIZE);
    }

    #[test]
    fn empty_set_holds_only_entities() {
        let layout = ChunkLayout::new(&[]).unwrap();
        assert_valid(&layout);
        assert_eq!(
            layout.capacity() as usize,
            (CHUNK_SIZE - layout.entities_offset()) / mem::size_of::<Entity>()
        );
    }

    #[test]
    fn zero_sized_components_take_no_space() {
        let with_tag = canonical(vec![descriptor::<Byte>(), descriptor::<Tag>()]);
        let without = ChunkLayout::new(&[descriptor::<Byte>()]).unwrap();
        let layout = ChunkLayout::new(&with_tag).unwrap();
        assert_valid(&layout);
        assert_eq!(layout.capacity(), without.capacity());
    }

    #[test]
    fn oversized_set_is_rejected() {
        let err = ChunkLayout::new(&[descriptor::<Huge>()]).unwrap_err();
        assert!(matches!(err, LayoutError::DoesNotFit { .. }));
    }

    #[test]
    fn over_aligned_component_is_rejected() {
        let err = ChunkLayout::new(&[descriptor::<OverAligned>()]).unwrap_err();
        assert!(matches!(err, LayoutError::AlignmentTooLarge { align: 8192, .. }));
    }

    #[test]
    fn column_lookup() {
        let comps = canonical(vec![descriptor::<Byte>(), descriptor::<Wide>()]);
        let layout = ChunkLayout::new(&comps).unwrap();
        assert_eq!(layout.column_of(comps[1].id()), Some(1));
        assert_eq!(layout.column_of(ComponentId::NONE), None);
    }
}
