//! Engine tuning parameters.
//!
//! Every numeric bound in the call machinery is a tuning constant, not an
//! architectural limit. The defaults here are the documented ones; embedders
//! may override any of them before constructing an [`Engine`].
//!
//! [`Engine`]: crate::engine::Engine

/// Tuning parameters for the call/dispatch engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Depth of each call site's inline-cache chain.
    pub inline_cache_depth: usize,
    /// Number of cache evictions after which a call site degrades
    /// permanently to the uncached resolution path.
    pub megamorphic_after: u32,
    /// How many leading argument slots get per-slot sharing flags.
    /// Slots past this bound are always treated as Shared. Capped at 64
    /// (the flags are a u64 bitset).
    pub tracked_arg_slots: usize,
    /// Lists with at most this many elements are exempt from fine-grained
    /// sharing bookkeeping.
    pub small_list_exempt_len: usize,
    /// Whether to create eager (optimistic) promises for bare-symbol and
    /// literal argument expressions.
    pub eager_promises: bool,
    /// Recursion budget for forcing chains of nested promises; deeper
    /// chains are unwrapped iteratively.
    pub promise_recursion_limit: usize,
    /// Evaluation nesting limit before raising a stack-overflow error.
    pub max_eval_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inline_cache_depth: 4,
            megamorphic_after: 8,
            tracked_arg_slots: 16,
            small_list_exempt_len: 2,
            eager_promises: true,
            promise_recursion_limit: 32,
            max_eval_depth: 1000,
        }
    }
}

impl EngineConfig {
    /// Tracked slot count clamped to the bitset width.
    pub(crate) fn tracked_slots_clamped(&self) -> usize {
        self.tracked_arg_slots.min(64)
    }
}
