/// Size in bytes of every chunk allocation, header included.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Minimum alignment of a chunk allocation (one cache line).
pub const CHUNK_ALIGN: usize = 64;

/// Largest component alignment a chunk can honor.
pub const MAX_COMPONENT_ALIGN: usize = 4096;

/// Maximum number of distinct component types per process.
pub const MAX_COMPONENT_TYPES: usize = 1024;

/// Component lists up to this length are kept on the stack.
pub const MAX_INLINE_COMPONENTS: usize = 16;
