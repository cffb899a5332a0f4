//! Self-test routines.
//!
//! These routines exercise a [`BlockPool`] only through its public contract
//! and report the first violated expectation. They are meant to be run on a
//! pool that has just been initialized or reset; on a pool with outstanding
//! blocks most of them fail even though the pool itself is consistent.
//!
//! Every failure kind maps to a distinct [`code`](SelfTestError::code), so a
//! driver can turn a failure into a process exit status.

use crate::{config::LINK_SIZE, error::BlockError, pool::BlockPool};

/// Byte pattern written into blocks while they are allocated.
const FILL: u8 = 0xA5;

/// The kinds of failures the self-tests can report.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::IsVariant)]
#[non_exhaustive]
pub enum SelfTestErrorKind {
    #[display("free list does not terminate within {block_count} blocks")]
    Unterminated { block_count: usize },
    #[display("free list has {visited} blocks, expected={expected}")]
    WrongLength { visited: usize, expected: usize },
    #[display("single free block at offset {offset}, expected=0")]
    MisplacedSingleBlock { offset: usize },
    #[display("free list spans {actual} bytes, expected={expected}")]
    WrongSpan { actual: usize, expected: usize },
    #[display("no free block to allocate")]
    NoFreeBlock,
    #[display("leading link bytes unchanged after allocation")]
    HeadUnchanged,
    #[display("leading link bytes not restored after free")]
    HeadNotRestored,
    #[display("{actual} blocks available after free, expected={expected}")]
    AvailableMismatch { actual: usize, expected: usize },
    #[display("pool has outstanding blocks, available={available}, block_count={block_count}")]
    PoolInUse {
        available: usize,
        block_count: usize,
    },
    #[display("allocated {allocated} blocks before exhaustion, expected={expected}")]
    ExhaustionMismatch { allocated: usize, expected: usize },
    #[display("failed allocation modified the pool")]
    BufferTouched,
    #[display("pool rejected a block it issued")]
    Rejected { source: BlockError },
}

impl SelfTestErrorKind {
    /// Returns the diagnostic code of this failure.
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            Self::Unterminated { .. } => 1,
            Self::WrongLength { .. } => 2,
            Self::MisplacedSingleBlock { .. } => 3,
            Self::WrongSpan { .. } => 4,
            Self::NoFreeBlock => 5,
            Self::HeadUnchanged => 6,
            Self::HeadNotRestored => 7,
            Self::AvailableMismatch { .. } => 8,
            Self::PoolInUse { .. } => 9,
            Self::ExhaustionMismatch { .. } => 10,
            Self::BufferTouched => 11,
            Self::Rejected { .. } => 12,
        }
    }
}

define_error!(
    /// The error type returned when a self-test fails.
    pub struct SelfTestError {
        kind: SelfTestErrorKind,
    }
);

impl SelfTestError {
    /// Returns the diagnostic code of this failure.
    #[must_use]
    pub fn code(&self) -> u8 {
        self.kind.code()
    }
}

/// Checks the layout of a freshly partitioned free list.
///
/// Walks the free list for at most `block_count + 1` hops and requires that
/// it visits every block exactly once, in ascending order, with consecutive
/// blocks exactly one block apart.
pub fn check_free_list(pool: &BlockPool<'_>) -> Result<(), SelfTestError> {
    let block_count = pool.block_count();

    let mut visited = 0;
    let mut span = 0;
    let mut first = None;
    let mut prev = None;
    for offset in pool.free_list().take(block_count + 1) {
        visited += 1;
        if let Some(prev) = prev {
            span += offset.abs_diff(prev);
        }
        first.get_or_insert(offset);
        prev = Some(offset);
    }

    ensure!(
        visited <= block_count,
        SelfTestErrorKind::Unterminated { block_count }
    );
    ensure!(
        visited == block_count,
        SelfTestErrorKind::WrongLength {
            visited,
            expected: block_count,
        }
    );
    if let (1, Some(offset)) = (block_count, first) {
        ensure!(offset == 0, SelfTestErrorKind::MisplacedSingleBlock { offset });
    }

    let expected = (block_count - 1) * pool.block_size();
    ensure!(
        span == expected,
        SelfTestErrorKind::WrongSpan {
            actual: span,
            expected,
        }
    );
    Ok(())
}

/// Checks that a single allocate/free cycle restores the pool exactly.
///
/// Allocates one block, overwrites all of it, and requires that the leading
/// link bytes of the pool changed. After freeing the block, the leading
/// bytes and the available count must be back to their previous values.
pub fn check_alloc_free(pool: &mut BlockPool<'_>) -> Result<(), SelfTestError> {
    let available = pool.available();
    let before = leading_link(pool);

    let block = pool.allocate().ok_or(SelfTestErrorKind::NoFreeBlock)?;
    pool.get_mut(&block)
        .map_err(|source| SelfTestErrorKind::Rejected { source })?
        .fill(FILL);
    let allocated = leading_link(pool);

    pool.free(block)
        .map_err(|source| SelfTestErrorKind::Rejected { source })?;
    let after = leading_link(pool);

    ensure!(allocated != before, SelfTestErrorKind::HeadUnchanged);
    ensure!(after == before, SelfTestErrorKind::HeadNotRestored);
    ensure!(
        pool.available() == available,
        SelfTestErrorKind::AvailableMismatch {
            actual: pool.available(),
            expected: available,
        }
    );
    Ok(())
}

/// Checks that the pool hands out every block exactly once.
///
/// Allocates until the pool is exhausted, requires one more allocation to
/// fail without modifying the pool, then returns every block in descending
/// order so that the free list ends up in its initial layout.
///
/// The pool must have no outstanding blocks, because the blocks are
/// returned by offset.
pub fn check_exhaustion(pool: &mut BlockPool<'_>) -> Result<(), SelfTestError> {
    let block_count = pool.block_count();
    ensure!(
        pool.is_untouched(),
        SelfTestErrorKind::PoolInUse {
            available: pool.available(),
            block_count,
        }
    );

    let mut allocated = 0;
    while let Some(block) = pool.allocate() {
        pool.get_mut(&block)
            .map_err(|source| SelfTestErrorKind::Rejected { source })?
            .fill(FILL);
        allocated += 1;
    }
    ensure!(
        allocated == block_count && pool.is_exhausted(),
        SelfTestErrorKind::ExhaustionMismatch {
            allocated,
            expected: block_count,
        }
    );

    let before = fingerprint(pool.as_bytes());
    ensure!(
        pool.allocate().is_none(),
        SelfTestErrorKind::ExhaustionMismatch {
            allocated: allocated + 1,
            expected: block_count,
        }
    );
    ensure!(
        fingerprint(pool.as_bytes()) == before,
        SelfTestErrorKind::BufferTouched
    );

    for index in (0..block_count).rev() {
        pool.free_at(index * pool.block_size())
            .map_err(|source| SelfTestErrorKind::Rejected { source })?;
    }
    ensure!(
        pool.available() == block_count,
        SelfTestErrorKind::AvailableMismatch {
            actual: pool.available(),
            expected: block_count,
        }
    );

    check_free_list(pool)
}

fn leading_link(pool: &BlockPool<'_>) -> [u8; LINK_SIZE] {
    let mut link = [0; LINK_SIZE];
    link.copy_from_slice(&pool.as_bytes()[..LINK_SIZE]);
    link
}

/// FNV-1a hash of `bytes`.
fn fingerprint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    extern crate alloc;

    use alloc::vec;

    use super::*;

    fn with_test_pool<F>(pool_size: usize, block_size: usize, test_fn: F)
    where
        F: FnOnce(&mut BlockPool),
    {
        let mut buffer = vec![0x11; pool_size];
        let mut pool = BlockPool::new(&mut buffer, block_size).unwrap();
        test_fn(&mut pool);
    }

    #[test]
    fn test_all_pass_on_fresh_pool() {
        for (pool_size, block_size) in [(256, 16), (100, 16), (64, 64), (LINK_SIZE, LINK_SIZE)] {
            with_test_pool(pool_size, block_size, |pool| {
                check_free_list(pool).unwrap();
                check_alloc_free(pool).unwrap();
                check_exhaustion(pool).unwrap();
                check_free_list(pool).unwrap();
                assert!(pool.is_untouched());
            });
        }
    }

    #[test]
    fn test_free_list_with_outstanding_block() {
        with_test_pool(64, 16, |pool| {
            let _block = pool.allocate().unwrap();
            let err = check_free_list(pool).unwrap_err();
            assert!(matches!(
                err.kind(),
                SelfTestErrorKind::WrongLength {
                    visited: 3,
                    expected: 4,
                }
            ));
            assert_eq!(err.code(), 2);
        });
    }

    #[test]
    fn test_free_list_cycle_is_detected() {
        with_test_pool(64, 16, |pool| {
            let a = pool.allocate().unwrap();
            let _b = pool.allocate().unwrap();

            // Freeing the same offset twice links the block to itself.
            pool.free_at(a.offset()).unwrap();
            pool.free_at(a.offset()).unwrap();

            let err = check_free_list(pool).unwrap_err();
            assert!(err.kind().is_unterminated());
            assert_eq!(err.code(), 1);
        });
    }

    #[test]
    fn test_free_list_out_of_order() {
        with_test_pool(64, 16, |pool| {
            let a = pool.allocate().unwrap();
            let b = pool.allocate().unwrap();
            pool.free(a).unwrap();
            pool.free(b).unwrap();

            // Free list is now 16, 0, 32, 48.
            let err = check_free_list(pool).unwrap_err();
            assert!(matches!(
                err.kind(),
                SelfTestErrorKind::WrongSpan {
                    actual: 64,
                    expected: 48,
                }
            ));
        });
    }

    #[test]
    fn test_alloc_free_on_exhausted_pool() {
        with_test_pool(32, 16, |pool| {
            let _a = pool.allocate().unwrap();
            let _b = pool.allocate().unwrap();
            let err = check_alloc_free(pool).unwrap_err();
            assert!(err.kind().is_no_free_block());
            assert_eq!(pool.available(), 0);
        });
    }

    #[test]
    fn test_alloc_free_when_head_is_not_first_block() {
        with_test_pool(64, 16, |pool| {
            let _first = pool.allocate().unwrap();
            let err = check_alloc_free(pool).unwrap_err();
            assert!(err.kind().is_head_unchanged());
            assert_eq!(err.code(), 6);
            assert_eq!(pool.available(), 3);
        });
    }

    #[test]
    fn test_exhaustion_requires_untouched_pool() {
        with_test_pool(64, 16, |pool| {
            let block = pool.allocate().unwrap();
            let err = check_exhaustion(pool).unwrap_err();
            assert!(matches!(
                err.kind(),
                SelfTestErrorKind::PoolInUse {
                    available: 3,
                    block_count: 4,
                }
            ));
            pool.free(block).unwrap();
            check_exhaustion(pool).unwrap();
        });
    }

    #[test]
    fn test_codes_are_distinct() {
        let mut rejected = None;
        with_test_pool(64, 16, |pool| {
            let _block = pool.allocate().unwrap();
            rejected = pool.free_at(1).err();
        });
        let source = rejected.unwrap();
        assert!(source.kind().is_unaligned());

        let kinds = [
            SelfTestErrorKind::Unterminated { block_count: 0 },
            SelfTestErrorKind::WrongLength {
                visited: 0,
                expected: 0,
            },
            SelfTestErrorKind::MisplacedSingleBlock { offset: 0 },
            SelfTestErrorKind::WrongSpan {
                actual: 0,
                expected: 0,
            },
            SelfTestErrorKind::NoFreeBlock,
            SelfTestErrorKind::HeadUnchanged,
            SelfTestErrorKind::HeadNotRestored,
            SelfTestErrorKind::AvailableMismatch {
                actual: 0,
                expected: 0,
            },
            SelfTestErrorKind::PoolInUse {
                available: 0,
                block_count: 0,
            },
            SelfTestErrorKind::ExhaustionMismatch {
                allocated: 0,
                expected: 0,
            },
            SelfTestErrorKind::BufferTouched,
            SelfTestErrorKind::Rejected { source },
        ];
        assert_eq!(kinds[kinds.len() - 1].code(), 12);
        for (i, a) in kinds.iter().enumerate() {
            assert_ne!(a.code(), 0);
            for b in &kinds[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }
}
