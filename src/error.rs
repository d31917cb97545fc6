use thiserror::Error;

/// A component set that cannot be laid out in a chunk.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum LayoutError {
    #[error("component set needs {per_entity} bytes per entity but a chunk only has {available} bytes for entities")]
    DoesNotFit { per_entity: usize, available: usize },
    #[error("component `{name}` requires alignment {align}, the maximum supported is {max}")]
    AlignmentTooLarge {
        name: &'static str,
        align: usize,
        max: usize,
    },
}
