//! Fixed-block pool implementation.
//!
//! This module provides [`BlockPool`], an allocator that cuts a
//! caller-provided byte buffer into equal-size blocks and hands them out one
//! at a time.
//!
//! # Algorithm
//!
//! The pool keeps a singly-linked **LIFO free list** threaded through the
//! free blocks themselves:
//!
//! - **Initialization**: every block's first [`LINK_SIZE`] bytes are set to
//!   the offset of the following block, the last block gets the null marker,
//!   and the list head is set to offset 0
//! - **Allocation**: pops the head block and moves the head to the link it
//!   contained
//! - **Deallocation**: writes the current head into the returned block and
//!   makes that block the new head
//!
//! All three steps are O(1). There is no coalescing and no searching.
//!
//! # Memory Layout
//!
//! Links are byte offsets from the start of the pool, stored as native-endian
//! `usize` values. The null marker is `usize::MAX`.
//!
//! ```text
//! Pool of 4 blocks, block 1 allocated:
//! ┌──────────────┬──────────────┬──────────────┬──────────────┬─────────┐
//! │ link: 2*B    │ caller data  │ link: 3*B    │ link: null   │ padding │
//! │ ...          │ ...          │ ...          │ ...          │         │
//! └──────────────┴──────────────┴──────────────┴──────────────┴─────────┘
//!   ▲ head
//! ```
//!
//! # Ownership
//!
//! A successful allocation returns a [`Block`] handle. Handles are neither
//! `Clone` nor `Copy` and are consumed by [`BlockPool::free`], so a block
//! cannot be returned twice through its handle. The contents of an allocated
//! block are reached through [`BlockPool::get`] and [`BlockPool::get_mut`].
//!
//! # Thread Safety
//!
//! The pool is `Send` but provides no internal locking. Each task should own
//! its own pool; sharing one requires external synchronization.

use core::{
    fmt,
    iter::FusedIterator,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{
    config::{LINK_SIZE, PoolConfig},
    error::{BlockError, BlockErrorKind, InitError, InitErrorKind},
};

/// Raw link value marking the end of the free list.
const NIL: usize = usize::MAX;

/// A block handed out by a [`BlockPool`].
///
/// The handle is the only proof of ownership of an allocated block. It
/// records which pool issued it so that the pool can reject handles it did
/// not create, including handles that outlived an earlier pool built over
/// the same buffer.
#[must_use = "dropping a block handle leaks the block until the pool is reset"]
#[derive(Debug, PartialEq, Eq)]
pub struct Block {
    pool_id: usize,
    generation: u32,
    offset: usize,
}

impl Block {
    /// Returns the byte offset of this block from the start of the pool.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// A fixed-block allocator over a borrowed byte buffer.
///
/// The pool never allocates: all of its bookkeeping lives in its own fields
/// and in the leading bytes of the free blocks.
pub struct BlockPool<'buf> {
    /// The managed region, exactly `pool_size` bytes long.
    memory: &'buf mut [u8],
    /// Unique for the lifetime of the program, recorded in every handle.
    id: usize,
    block_size: usize,
    block_count: usize,
    free_count: usize,
    /// Offset of the first free block.
    head: Option<usize>,
    /// Bumped every time the buffer is partitioned.
    generation: u32,
}

impl fmt::Debug for BlockPool<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPool")
            .field("id", &self.id)
            .field("pool_size", &self.pool_size())
            .field("block_size", &self.block_size)
            .field("block_count", &self.block_count)
            .field("free_count", &self.free_count)
            .field("head", &self.head)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl<'buf> BlockPool<'buf> {
    /// Partitions the whole `buffer` into blocks of `block_size` bytes.
    ///
    /// Trailing bytes that do not form a whole block are left untouched and
    /// never handed out.
    ///
    /// # Examples
    ///
    /// ```
    /// use block_pool::BlockPool;
    ///
    /// let mut buffer = [0u8; 256];
    /// let pool = BlockPool::new(&mut buffer, 16).unwrap();
    /// assert_eq!(pool.block_count(), 16);
    /// assert_eq!(pool.available(), 16);
    /// ```
    #[track_caller]
    pub fn new(buffer: &'buf mut [u8], block_size: usize) -> Result<Self, InitError> {
        let config = PoolConfig::new(buffer.len(), block_size);
        Self::with_config(buffer, config)
    }

    /// Partitions the first `config.pool_size` bytes of `buffer`.
    ///
    /// Validation happens before anything is written, so a rejected
    /// configuration leaves `buffer` unchanged.
    #[track_caller]
    pub fn with_config(buffer: &'buf mut [u8], config: PoolConfig) -> Result<Self, InitError> {
        config.validate()?;

        let buffer_len = buffer.len();
        let Some(memory) = buffer.get_mut(..config.pool_size) else {
            return Err(InitErrorKind::BufferTooShort {
                pool_size: config.pool_size,
                buffer_len,
            }
            .into());
        };

        static NEXT_ID: AtomicUsize = AtomicUsize::new(0);
        let mut pool = Self {
            memory,
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            block_size: config.block_size,
            block_count: config.block_count(),
            free_count: 0,
            head: None,
            generation: 0,
        };
        pool.partition();
        Ok(pool)
    }

    /// Returns the size of each block in bytes.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns the total number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Returns the number of bytes managed by the pool, padding included.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.memory.len()
    }

    /// Returns how many blocks are free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free_count
    }

    /// Returns how many blocks are allocated.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.block_count - self.free_count
    }

    /// Returns `true` if no block can be allocated.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.free_count == 0
    }

    /// Returns `true` if every block is free.
    #[must_use]
    pub fn is_untouched(&self) -> bool {
        self.free_count == self.block_count
    }

    /// Returns the managed region as raw bytes.
    ///
    /// Free blocks start with their free-list link; allocated blocks hold
    /// whatever their owner wrote.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.memory
    }

    /// Returns an iterator over the offsets of the free blocks, in the order
    /// they will be allocated.
    ///
    /// The walk stops at the null marker or at the first link that does not
    /// name a block of this pool. A free list corrupted into a cycle makes
    /// the iterator endless, so diagnostic callers should bound it.
    pub fn free_list(&self) -> FreeList<'_, 'buf> {
        FreeList {
            pool: self,
            next: self.head,
        }
    }

    /// Takes a block from the pool.
    ///
    /// Returns `None` when every block is in use. This is an expected
    /// outcome, not an error, and does not touch the buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use block_pool::BlockPool;
    ///
    /// let mut buffer = [0u8; 64];
    /// let mut pool = BlockPool::new(&mut buffer, 32).unwrap();
    /// let a = pool.allocate().unwrap();
    /// let b = pool.allocate().unwrap();
    /// assert!(pool.allocate().is_none());
    ///
    /// pool.free(b).unwrap();
    /// pool.free(a).unwrap();
    /// assert_eq!(pool.available(), 2);
    /// ```
    pub fn allocate(&mut self) -> Option<Block> {
        if self.free_count == 0 {
            return None;
        }

        let offset = self.head?;
        self.head = self.read_link(offset);
        self.free_count -= 1;

        Some(Block {
            pool_id: self.id,
            generation: self.generation,
            offset,
        })
    }

    /// Returns a block to the pool.
    ///
    /// The block becomes the next one to be allocated. Handles issued by a
    /// different pool, or by this pool before the last
    /// [`reset`](Self::reset), are rejected without changing any state.
    pub fn free(&mut self, block: Block) -> Result<(), BlockError> {
        self.check_block(&block)?;
        self.push(block.offset)
    }

    /// Returns the block starting at `offset` to the pool.
    ///
    /// The offset must lie inside the pool and on a block boundary.
    ///
    /// Unlike [`free`](Self::free), this cannot tell whether the block is
    /// currently allocated. Freeing a block that is already free while some
    /// other block is allocated is not detected: the free list then contains
    /// that block twice and it may be handed out to two owners. Memory
    /// safety is preserved, but the pool's bookkeeping is no longer
    /// meaningful.
    pub fn free_at(&mut self, offset: usize) -> Result<(), BlockError> {
        self.check_offset(offset)?;
        self.push(offset)
    }

    /// Returns the contents of an allocated block.
    pub fn get(&self, block: &Block) -> Result<&[u8], BlockError> {
        self.check_block(block)?;
        Ok(&self.memory[block.offset..block.offset + self.block_size])
    }

    /// Returns the contents of an allocated block for writing.
    ///
    /// The whole block belongs to the caller, including the bytes that held
    /// the free-list link before it was allocated.
    pub fn get_mut(&mut self, block: &Block) -> Result<&mut [u8], BlockError> {
        self.check_block(block)?;
        Ok(&mut self.memory[block.offset..block.offset + self.block_size])
    }

    /// Makes every block free again.
    ///
    /// The buffer is partitioned from scratch and all outstanding handles
    /// become stale: passing them back to this pool fails with
    /// [`BlockErrorKind::StaleBlock`].
    pub fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.partition();
    }

    /// Consumes the pool and returns the managed region.
    #[must_use]
    pub fn into_inner(self) -> &'buf mut [u8] {
        self.memory
    }

    /// One past the last byte that belongs to a block.
    fn limit(&self) -> usize {
        self.block_count * self.block_size
    }

    fn partition(&mut self) {
        for index in 0..self.block_count {
            let offset = index * self.block_size;
            let next = (index + 1 < self.block_count).then_some(offset + self.block_size);
            self.write_link(offset, next);
        }
        self.head = (self.block_count > 0).then_some(0);
        self.free_count = self.block_count;
    }

    fn push(&mut self, offset: usize) -> Result<(), BlockError> {
        ensure!(
            self.free_count < self.block_count,
            BlockErrorKind::PoolFull {
                block_count: self.block_count,
            }
        );

        self.write_link(offset, self.head);
        self.head = Some(offset);
        self.free_count += 1;
        Ok(())
    }

    fn check_block(&self, block: &Block) -> Result<(), BlockError> {
        ensure!(block.pool_id == self.id, BlockErrorKind::ForeignBlock);
        ensure!(
            block.generation == self.generation,
            BlockErrorKind::StaleBlock {
                block_generation: block.generation,
                pool_generation: self.generation,
            }
        );
        self.check_offset(block.offset)
    }

    fn check_offset(&self, offset: usize) -> Result<(), BlockError> {
        ensure!(
            offset < self.limit(),
            BlockErrorKind::OutOfBounds {
                offset,
                limit: self.limit(),
            }
        );
        ensure!(
            offset.is_multiple_of(self.block_size),
            BlockErrorKind::Unaligned {
                offset,
                block_size: self.block_size,
            }
        );
        Ok(())
    }

    /// Reads the link stored in the free block at `offset`.
    ///
    /// Returns `None` for the null marker and for any value that is not the
    /// offset of a block in this pool.
    fn read_link(&self, offset: usize) -> Option<usize> {
        let field = self.memory.get(offset..offset + LINK_SIZE)?;
        let raw = usize::from_ne_bytes(field.try_into().ok()?);
        (raw != NIL && self.check_offset(raw).is_ok()).then_some(raw)
    }

    fn write_link(&mut self, offset: usize, next: Option<usize>) {
        let raw = next.unwrap_or(NIL);
        self.memory[offset..offset + LINK_SIZE].copy_from_slice(&raw.to_ne_bytes());
    }
}

/// Iterator over the free blocks of a [`BlockPool`].
///
/// Created by [`BlockPool::free_list`]. Yields block offsets.
#[derive(Debug, Clone)]
pub struct FreeList<'a, 'buf> {
    pool: &'a BlockPool<'buf>,
    next: Option<usize>,
}

impl Iterator for FreeList<'_, '_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next?;
        self.next = self.pool.read_link(offset);
        Some(offset)
    }
}

impl FusedIterator for FreeList<'_, '_> {}
