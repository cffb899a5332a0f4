/// The kinds of errors that can occur when partitioning a buffer into a
/// pool.
///
/// All of them mean the requested sizing cannot produce a valid layout, so
/// the pool is never created and the buffer is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[non_exhaustive]
pub enum InitErrorKind {
    #[display(
        "out of memory: block too small to hold a free-list link, \
         block_size={block_size}, link_size={link_size}"
    )]
    BlockTooSmall { block_size: usize, link_size: usize },
    #[display(
        "out of memory: block larger than pool, block_size={block_size}, pool_size={pool_size}"
    )]
    BlockExceedsPool { block_size: usize, pool_size: usize },
    #[display("out of memory: pool larger than buffer, pool_size={pool_size}, buffer_len={buffer_len}")]
    BufferTooShort { pool_size: usize, buffer_len: usize },
}

define_error!(
    /// The error type returned when a pool cannot be initialized.
    pub struct InitError {
        kind: InitErrorKind,
    }
);

/// The kinds of errors that can occur when a block is handed back to a
/// pool or accessed through a handle.
///
/// A rejected call never changes the pool state.
#[derive(
    Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error, derive_more::IsVariant,
)]
#[non_exhaustive]
pub enum BlockErrorKind {
    #[display("pool is already fully free, block_count={block_count}")]
    PoolFull { block_count: usize },
    #[display("block belongs to another pool")]
    ForeignBlock,
    #[display(
        "block was issued before the pool was reset, \
         block_generation={block_generation}, pool_generation={pool_generation}"
    )]
    StaleBlock {
        block_generation: u32,
        pool_generation: u32,
    },
    #[display("block offset out of bounds: offset={offset}, limit={limit}")]
    OutOfBounds { offset: usize, limit: usize },
    #[display("block offset not aligned to a block start: offset={offset}, block_size={block_size}")]
    Unaligned { offset: usize, block_size: usize },
}

define_error!(
    /// The error type returned when freeing or accessing a block fails.
    pub struct BlockError {
        kind: BlockErrorKind,
    }
);
