//! Chunked archetype storage for entity component data.
//!
//! An entity is a generational handle to an open set of component values.
//! Entities with exactly the same set of component types share an
//! [archetype](Archetype), and an archetype stores its entities in fixed-size
//! [chunks](Chunk): one packed column per component type, laid out so that
//! every column is correctly aligned and as many entities as possible fit in
//! a chunk. Adding or removing a component moves the entity to another
//! archetype using the type-erased operations of each component's
//! [descriptor](ComponentDescriptor).
//!
//! # Examples
//!
//! ```
//! use entity_chunks::{Component, World};
//!
//! #[derive(Default, Clone, Debug, PartialEq, Component)]
//! struct Position {
//!     x: f32,
//!     y: f32,
//! }
//!
//! #[derive(Default, Clone, Component)]
//! struct Velocity {
//!     x: f32,
//!     y: f32,
//! }
//!
//! let mut world = World::new();
//! let e = world.create_immediate();
//!
//! world.insert_component_immediate(e, Position { x: 1.0, y: 2.0 });
//! world.add_component_immediate::<Velocity>(e);
//! assert_eq!(world.component_count(e), 2);
//!
//! // Chunk-level iteration over every archetype holding `Position`.
//! for archetype in world.archetypes() {
//!     for chunk in archetype.chunks() {
//!         if let Some(positions) = chunk.column::<Position>() {
//!             assert_eq!(positions.len(), chunk.entities().len());
//!         }
//!     }
//! }
//!
//! world.remove_component_immediate::<Velocity>(e);
//! assert_eq!(world.get_component::<Position>(e), Some(Position { x: 1.0, y: 2.0 }));
//!
//! world.destroy_immediate(e);
//! assert!(!world.is_alive(e));
//! ```

extern crate self as entity_chunks;


mod archetype;
mod chunk;
mod component;
mod config;
mod entity;
mod error;
pub mod hash;
mod world;

pub use archetype::registry::{canonicalize, ArchetypeRegistry};
pub use archetype::{Archetype, ArchetypeId};
pub use chunk::layout::ChunkLayout;
pub use chunk::Chunk;
pub use component::{component_id, descriptor, Component, ComponentDescriptor, ComponentId, ComponentRegistry};
pub use config::{CHUNK_ALIGN, CHUNK_SIZE, MAX_COMPONENT_ALIGN, MAX_COMPONENT_TYPES};
pub use entity::{Entity, EntityRecord, EntityRegistry};
pub use error::LayoutError;
pub use world::World;

/// Derives [`Component`](trait@Component).
///
/// ```
/// use entity_chunks::Component;
///
/// #[derive(Default, Component)]
/// #[component(name = "physics::Mass")]
/// struct Mass(f32);
///
/// assert_eq!(<Mass as Component>::NAME, "physics::Mass");
/// ```
///
/// Generic types would give every instantiation the same name, so the derive
/// rejects them:
///
/// ```compile_fail
/// use entity_chunks::Component;
///
/// #[derive(Default, Component)]
/// struct Wrapper<T: Default + Send + Sync + 'static>(T);
/// ```
pub use macros::Component;

pub(crate) type HashMap<K, V> = ahash::AHashMap<K, V>;
