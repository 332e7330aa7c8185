//! Allocation records and stack signatures.
//!
//! An allocation record is one row of the allocator's profile table:
//! cumulative allocation and free counters for a single call stack.

use crate::utils::config::MAX_STACK_DEPTH;
use std::fmt;

/// Identity of a call site: the return addresses of the allocating stack,
/// innermost first, truncated to `MAX_STACK_DEPTH`.
///
/// Two signatures are the same call site iff they have the same length and
/// the same addresses in the same order. Unused slots are always zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackSignature {
    len: u8,
    frames: [usize; MAX_STACK_DEPTH],
}

impl Default for StackSignature {
    fn default() -> Self {
        Self {
            len: 0,
            frames: [0; MAX_STACK_DEPTH],
        }
    }
}

impl StackSignature {
    /// Build a signature from return addresses, keeping at most
    /// `MAX_STACK_DEPTH` of them.
    pub fn from_frames(frames: &[usize]) -> Self {
        let mut sig = Self::default();
        for &pc in frames.iter().take(MAX_STACK_DEPTH) {
            sig.push(pc);
        }
        sig
    }

    /// Append one return address. Returns false once the signature is full.
    pub fn push(&mut self, pc: usize) -> bool {
        let len = self.len as usize;
        if len >= MAX_STACK_DEPTH {
            return false;
        }
        self.frames[len] = pc;
        self.len += 1;
        true
    }

    pub fn frames(&self) -> &[usize] {
        &self.frames[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Same-call-site predicate: equal length and element-wise equal
    /// program counters.
    pub fn same_call_site(&self, other: &StackSignature) -> bool {
        self.len == other.len && self.frames() == other.frames()
    }
}

impl fmt::Debug for StackSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.frames().iter().map(|pc| format!("{:#x}", pc)))
            .finish()
    }
}

/// One entry of the allocation-profile table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocRecord {
    pub alloc_bytes: i64,
    pub free_bytes: i64,
    pub alloc_objects: i64,
    pub free_objects: i64,
    pub stack: StackSignature,
}

impl AllocRecord {
    pub fn new(stack: StackSignature) -> Self {
        Self {
            stack,
            ..Default::default()
        }
    }

    pub fn in_use_bytes(&self) -> i64 {
        self.alloc_bytes - self.free_bytes
    }

    pub fn in_use_objects(&self) -> i64 {
        self.alloc_objects - self.free_objects
    }
}
