//! Data structures used by stepping contexts to stay allocation-free.

pub use self::scratch_pool::{
    PooledArray, Scratch, ScratchItem, ScratchPool, ScratchStack, MAX_SCRATCH_ITEMS,
};

pub mod scratch_pool;
