//! Fixed-block memory pool over a caller-provided buffer.
//!
//! This crate provides [`BlockPool`], a constant-time allocator for
//! environments without a general-purpose heap. The pool cuts a byte buffer
//! into equal-size blocks, links the free ones into a list stored inside the
//! blocks themselves, and hands them out one at a time. The crate is
//! `no_std`, does not allocate, and contains no `unsafe` code.
//!
//! # Usage Example
//!
//! ```rust
//! use block_pool::{BlockPool, PoolConfig};
//!
//! let mut buffer = [0u8; 256];
//! let mut pool = BlockPool::with_config(&mut buffer, PoolConfig::default()).unwrap();
//! assert_eq!(pool.available(), 16);
//!
//! let block = pool.allocate().unwrap();
//! pool.get_mut(&block).unwrap().copy_from_slice(b"sixteen byte msg");
//! assert_eq!(pool.get(&block).unwrap(), b"sixteen byte msg");
//!
//! pool.free(block).unwrap();
//! assert_eq!(pool.available(), 16);
//! ```
//!
//! # Design Considerations
//!
//! ## Block Ownership
//!
//! [`BlockPool::allocate`] returns a move-only [`Block`] handle. Returning it
//! through [`BlockPool::free`] consumes it, so a block cannot be freed twice
//! through its handle, and the pool rejects handles issued by another pool or
//! before a [`reset`](BlockPool::reset). [`BlockPool::free_at`] frees by
//! offset instead; it checks bounds and alignment but cannot detect a block
//! that is already free.
//!
//! ## Exhaustion
//!
//! Running out of blocks is not an error: [`BlockPool::allocate`] returns
//! `None` and leaves the pool untouched.
//!
//! ## Thread Safety
//!
//! The pool is `Send` but not internally synchronized. The intended use is
//! one pool per task. Sharing a pool requires wrapping it in a lock.
//!
//! ## Performance Characteristics
//!
//! | Operation | Cost |
//! |-----------|------|
//! | initialization | O(n) in the number of blocks |
//! | `allocate` / `free` / `free_at` | O(1) |
//! | `available` | O(1) |
//!
//! Each block loses nothing to headers while allocated; while free, its first
//! [`LINK_SIZE`] bytes hold the free-list link.

#![no_std]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

#[macro_use]
mod macros;

pub mod config;
pub mod error;
pub mod pool;
pub mod selftest;

pub use self::{
    config::{BLOCK_SIZE, LINK_SIZE, POOL_SIZE, PoolConfig},
    error::{BlockError, BlockErrorKind, InitError, InitErrorKind},
    pool::{Block, BlockPool, FreeList},
};
