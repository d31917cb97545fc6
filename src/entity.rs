use crate::archetype::registry::ArchetypeRegistry;
use crate::archetype::ArchetypeId;

/// A generational entity handle.
///
/// Indices are reused after destruction; the version of an index grows on
/// every destruction so that old handles never refer to a new entity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(C)]
pub struct Entity {
    index: u32,
    version: u32,
}

impl Entity {
    pub const NULL: Self = Entity {
        index: u32::MAX,
        version: 0,
    };

    /// Constructs an entity handle.
    pub const fn new(index: u32, version: u32) -> Entity {
        Entity { index, version }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn version(self) -> u32 {
        self.version
    }
}

impl Default for Entity {
    fn default() -> Self {
        Entity::NULL
    }
}

/// Where a live entity is stored: its archetype and index within it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EntityRecord {
    pub archetype: ArchetypeId,
    pub index: u32,
}

struct Slot {
    version: u32,
    alive: bool,
    record: EntityRecord,
}

/// Issues entity handles and tracks where each live entity is stored.
#[derive(Default)]
pub struct EntityRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    alive: usize,
}

const fn next_version(version: u32) -> u32 {
    match version.wrapping_add(1) {
        0 => 1,
        v => v,
    }
}

impl EntityRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates an entity in the empty archetype.
    ///
    /// The most recently freed index is reused first.
    pub fn create(&mut self, archetypes: &mut ArchetypeRegistry) -> Entity {
        #[cold]
        #[inline(never)]
        fn assert_failed() -> ! {
            panic!(
                "Out of entity slots. A maximum number of entities ({}) is reached.",
                u32::MAX - 1
            );
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                if self.slots.len() >= (u32::MAX - 1) as usize {
                    assert_failed();
                }
                self.slots.push(Slot {
                    version: 1,
                    alive: false,
                    record: EntityRecord {
                        archetype: ArchetypeId::EMPTY,
                        index: 0,
                    },
                });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        let entity = Entity::new(index, slot.version);
        let empty = archetypes.empty();
        let arch_index = archetypes.archetype_mut(empty).add(entity);

        slot.alive = true;
        slot.record = EntityRecord {
            archetype: empty,
            index: arch_index,
        };
        self.alive += 1;

        entity
    }

    /// Creates `count` entities in the empty archetype.
    pub fn create_many(&mut self, count: usize, archetypes: &mut ArchetypeRegistry) -> Vec<Entity> {
        (0..count).map(|_| self.create(archetypes)).collect()
    }

    /// Destroys `entity`. Returns `false` if the handle is not alive.
    pub fn destroy(&mut self, entity: Entity, archetypes: &mut ArchetypeRegistry) -> bool {
        let Some(record) = self.record(entity) else {
            return false;
        };

        let moved = archetypes.archetype_mut(record.archetype).remove(record.index);
        if let Some(moved) = moved {
            self.slots[moved.index as usize].record.index = record.index;
        }

        let slot = &mut self.slots[entity.index as usize];
        slot.alive = false;
        slot.version = next_version(slot.version);
        self.free.push(entity.index);
        self.alive -= 1;

        true
    }

    /// Destroys every live entity of `entities`. Returns how many were destroyed.
    pub fn destroy_many(&mut self, entities: &[Entity], archetypes: &mut ArchetypeRegistry) -> usize {
        entities
            .iter()
            .filter(|&&e| self.destroy(e, archetypes))
            .count()
    }

    /// Returns `true` if `entity` refers to a live entity.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index as usize)
            .map_or(false, |s| s.alive && s.version == entity.version)
    }

    /// Returns the storage location of a live entity.
    pub fn record(&self, entity: Entity) -> Option<EntityRecord> {
        self.slots
            .get(entity.index as usize)
            .filter(|s| s.alive && s.version == entity.version)
            .map(|s| s.record)
    }

    pub(crate) fn set_record(&mut self, entity: Entity, record: EntityRecord) {
        debug_assert!(self.is_alive(entity));
        self.slots[entity.index as usize].record = record;
    }

    /// Re-points the record of an entity that was swapped into `index` of its archetype.
    pub(crate) fn set_record_index(&mut self, entity: Entity, index: u32) {
        debug_assert!(self.is_alive(entity));
        self.slots[entity.index as usize].record.index = index;
    }

    /// Returns the number of live entities.
    pub fn len(&self) -> usize {
        self.alive
    }

    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    /// Returns the number of issued indices, live or free.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}
