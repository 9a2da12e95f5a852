//! Implementation limits for execution, registration and decoding.
//!
//! They bound resource use for runaway recursion in scripts and for malformed
//! encoded cells claiming unrealistic sizes.

// =============================================================================
// Execution limits
// =============================================================================

/// Maximum number of nested frames (top level included) before a user
/// function call is refused
pub const MAX_CALL_DEPTH: usize = 1_000;

/// Host stack headroom below which a user function call grows the stack
pub const STACK_RED_ZONE: usize = 128 * 1024;

/// Size of each host stack segment allocated when the red zone is reached
pub const STACK_GROWTH: usize = 1024 * 1024;

/// Initial capacity of each frame's operand stack
pub const DEFAULT_STACK_CAPACITY: usize = 16;

// =============================================================================
// Registration limits
// =============================================================================

/// Maximum number of parameters in one signature
pub const MAX_SIGNATURE_PARAMS: usize = 1_000;

// =============================================================================
// Decoding limits
// =============================================================================

/// Maximum element count claimed by an encoded list
pub const MAX_DECODE_LIST_LEN: u64 = 1_000_000;

/// Maximum nesting of encoded lists and list element tags
pub const MAX_DECODE_DEPTH: usize = 64;

/// Maximum byte length claimed by an encoded string
pub const MAX_DECODE_STRING_LEN: u64 = 16 * 1024 * 1024;
