//! Pool sizing.
//!
//! A pool is described by two numbers: the number of bytes it manages and
//! the size of each block. Both are normally fixed at build time through
//! [`POOL_SIZE`] and [`BLOCK_SIZE`].

use crate::error::{InitError, InitErrorKind};

/// Number of bytes occupied by a free-list link.
///
/// Every free block stores the offset of the next free block in its first
/// `LINK_SIZE` bytes, so no block may be smaller than this.
pub const LINK_SIZE: usize = size_of::<usize>();

/// Default pool size in bytes.
pub const POOL_SIZE: usize = 256;

/// Default block size in bytes.
pub const BLOCK_SIZE: usize = 16;

const _: () = assert!(BLOCK_SIZE >= LINK_SIZE && BLOCK_SIZE <= POOL_SIZE);

/// Sizing of a block pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Total number of bytes managed by the pool.
    pub pool_size: usize,
    /// Size of each block in bytes.
    pub block_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(POOL_SIZE, BLOCK_SIZE)
    }
}

impl PoolConfig {
    /// Creates a new configuration.
    ///
    /// The configuration is not validated until it is used to build a pool
    /// or [`validate`](Self::validate) is called.
    #[must_use]
    pub const fn new(pool_size: usize, block_size: usize) -> Self {
        Self {
            pool_size,
            block_size,
        }
    }

    /// Returns the number of whole blocks that fit in the pool.
    ///
    /// Bytes left over after the last whole block are never handed out.
    /// Returns 0 for a zero block size.
    #[must_use]
    pub const fn block_count(&self) -> usize {
        match self.pool_size.checked_div(self.block_size) {
            Some(count) => count,
            None => 0,
        }
    }

    /// Returns the number of trailing bytes that do not form a whole block.
    #[must_use]
    pub const fn padding(&self) -> usize {
        self.pool_size - self.block_count() * self.block_size
    }

    /// Checks that the configuration describes a usable layout.
    ///
    /// The block must be able to hold one free-list link and must fit in the
    /// pool at least once.
    #[track_caller]
    pub fn validate(&self) -> Result<(), InitError> {
        ensure!(
            self.block_size >= LINK_SIZE,
            InitErrorKind::BlockTooSmall {
                block_size: self.block_size,
                link_size: LINK_SIZE,
            }
        );
        ensure!(
            self.pool_size >= self.block_size,
            InitErrorKind::BlockExceedsPool {
                block_size: self.block_size,
                pool_size: self.pool_size,
            }
        );
        Ok(())
    }
}
