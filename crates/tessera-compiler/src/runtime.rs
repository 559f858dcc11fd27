//! Runtime primitives targeted by shape lowering.
//!
//! Lowered functions call these as external functions. Slot indices and the
//! heap size travel as integer attributes, never as shape expressions.

/// `shape_heap = alloc_shape_heap()` with attribute `size: Int`.
pub const ALLOC_SHAPE_HEAP: &str = "alloc_shape_heap";

/// `free_shape_heap(shape_heap)`.
pub const FREE_SHAPE_HEAP: &str = "free_shape_heap";

/// `decode_shape(value, shape_heap)` with attribute `slots: Ints`. Writes the
/// runtime dimensions of `value` into the listed slots, in order.
pub const DECODE_SHAPE: &str = "decode_shape";

/// `construct_shape(shape_heap)` with attribute `slots: Ints`. Reads the
/// listed slots back into a runtime shape value.
pub const CONSTRUCT_SHAPE: &str = "construct_shape";

/// Attribute holding the heap size of an allocation.
pub const SIZE_ATTR: &str = "size";

/// Attribute holding heap slot indices.
pub const SLOTS_ATTR: &str = "slots";
