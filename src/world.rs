use crate::archetype::registry::ArchetypeRegistry;
use crate::archetype::{Archetype, ArchetypeId};
use crate::component::{component_id, Component, ComponentId};
use crate::entity::{Entity, EntityRecord, EntityRegistry};

/// Entities and their components.
///
/// All structural changes (`*_immediate`) take `&mut self` and are applied
/// before returning.
pub struct World {
    entities: EntityRegistry,
    archetypes: ArchetypeRegistry,
}

impl World {
    /// Creates an empty world with its own archetype registry.
    pub fn new() -> World {
        Self::with_archetypes(ArchetypeRegistry::new())
    }

    /// Creates an empty world on top of `archetypes`.
    ///
    /// Panics if any archetype of the registry already holds entities.
    pub fn with_archetypes(archetypes: ArchetypeRegistry) -> World {
        assert!(
            archetypes.iter().all(|a| a.is_empty()),
            "archetype registry already holds entities"
        );
        World {
            entities: EntityRegistry::new(),
            archetypes,
        }
    }

    /// Creates a component-less entity.
    pub fn create_immediate(&mut self) -> Entity {
        self.entities.create(&mut self.archetypes)
    }

    pub fn create_many_immediate(&mut self, count: usize) -> Vec<Entity> {
        self.entities.create_many(count, &mut self.archetypes)
    }

    /// Destroys `entity` and its components. Dead handles are ignored.
    pub fn destroy_immediate(&mut self, entity: Entity) -> bool {
        self.entities.destroy(entity, &mut self.archetypes)
    }

    /// Destroys every live entity of `entities`. Returns how many were destroyed.
    pub fn destroy_many_immediate(&mut self, entities: &[Entity]) -> usize {
        self.entities.destroy_many(entities, &mut self.archetypes)
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Returns the number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns the number of components of `entity`, `0` if it is dead.
    pub fn component_count(&self, entity: Entity) -> u32 {
        self.archetype_of(entity).map_or(0, |a| a.component_count())
    }

    pub fn record(&self, entity: Entity) -> Option<EntityRecord> {
        self.entities.record(entity)
    }

    /// Returns the archetype `entity` belongs to.
    pub fn archetype_of(&self, entity: Entity) -> Option<&Archetype> {
        let record = self.entities.record(entity)?;
        self.archetypes.get_by_id(record.archetype)
    }

    pub fn archetypes(&self) -> &ArchetypeRegistry {
        &self.archetypes
    }

    /// Returns the `C` column of chunk `chunk` of archetype `archetype` for
    /// writing. The chunk's version is stamped.
    pub fn column_mut<C: Component>(&mut self, archetype: ArchetypeId, chunk: usize) -> Option<&mut [C]> {
        self.archetypes.get_by_id_mut(archetype)?.column_mut::<C>(chunk)
    }

    /// Returns a parallel iterator over the `C` column of every chunk of
    /// `archetype`. Every chunk's version is stamped.
    #[cfg(feature = "rayon")]
    pub fn par_columns_mut<C: Component>(
        &mut self,
        archetype: ArchetypeId,
    ) -> Option<impl rayon::iter::IndexedParallelIterator<Item = &mut [C]> + '_> {
        self.archetypes.get_by_id_mut(archetype)?.par_columns_mut::<C>()
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    /// Adds a default-constructed `C` to `entity`.
    /// Returns `false` if the entity is dead or already has `C`.
    pub fn add_component_immediate<C: Component>(&mut self, entity: Entity) -> bool {
        self.add_component_by_id_immediate(entity, component_id::<C>())
    }

    /// Adds a default-constructed component `id` to `entity`.
    /// Returns `false` if the entity is dead or already has the component.
    ///
    /// Panics if `id` is not a registered component id.
    pub fn add_component_by_id_immediate(&mut self, entity: Entity, id: ComponentId) -> bool {
        let Some(record) = self.entities.record(entity) else {
            return false;
        };
        let to = self.archetypes.with_component(record.archetype, id);
        if to == record.archetype {
            return false;
        }
        self.relocate(entity, record, to);
        true
    }

    /// Sets the component `C` of `entity` to `value`, adding it first if missing.
    /// Returns `false` if the entity is dead.
    pub fn insert_component_immediate<C: Component>(&mut self, entity: Entity, value: C) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.add_component_immediate::<C>(entity);
        self.set_component(entity, value)
    }

    /// Removes `C` from `entity`.
    /// Returns `false` if the entity is dead or has no `C`.
    pub fn remove_component_immediate<C: Component>(&mut self, entity: Entity) -> bool {
        self.remove_component_by_id_immediate(entity, component_id::<C>())
    }

    /// Removes component `id` from `entity`.
    /// Returns `false` if the entity is dead or has no such component.
    pub fn remove_component_by_id_immediate(&mut self, entity: Entity, id: ComponentId) -> bool {
        let Some(record) = self.entities.record(entity) else {
            return false;
        };
        let to = self.archetypes.without_component(record.archetype, id);
        if to == record.archetype {
            return false;
        }
        self.relocate(entity, record, to);
        true
    }

    fn relocate(&mut self, entity: Entity, record: EntityRecord, to: ArchetypeId) {
        let (index, moved) = self
            .archetypes
            .move_entity(record.index, record.archetype, to);

        if let Some(moved) = moved {
            self.entities.set_record_index(moved, record.index);
        }
        self.entities.set_record(
            entity,
            EntityRecord {
                archetype: to,
                index,
            },
        );
    }

    pub fn has_component<C: Component>(&self, entity: Entity) -> bool {
        self.archetype_of(entity).map_or(false, |a| a.contains::<C>())
    }

    /// Returns a copy of the component `C` of `entity`.
    ///
    /// Changing the copy does not change the entity; use [`set_component`](Self::set_component).
    pub fn get_component<C: Component + Clone>(&self, entity: Entity) -> Option<C> {
        self.component_ref::<C>(entity).cloned()
    }

    /// Returns a reference to the component `C` of `entity`.
    pub fn component_ref<C: Component>(&self, entity: Entity) -> Option<&C> {
        let record = self.entities.record(entity)?;
        self.archetypes
            .get_by_id(record.archetype)?
            .get_component::<C>(record.index)
    }

    /// Returns a mutable reference to the component `C` of `entity` and stamps
    /// its chunk's version.
    pub fn component_mut<C: Component>(&mut self, entity: Entity) -> Option<&mut C> {
        let record = self.entities.record(entity)?;
        self.archetypes
            .get_by_id_mut(record.archetype)?
            .get_component_mut::<C>(record.index)
    }

    /// Overwrites the component `C` of `entity`.
    /// Returns `false` if the entity is dead or has no `C`.
    pub fn set_component<C: Component>(&mut self, entity: Entity, value: C) -> bool {
        let Some(record) = self.entities.record(entity) else {
            return false;
        };
        match self.archetypes.get_by_id_mut(record.archetype) {
            Some(arch) => arch.set_component(record.index, value),
            None => false,
        }
    }
}

impl Default for World {
    fn default() -> Self {
        World::new()
    }
}
