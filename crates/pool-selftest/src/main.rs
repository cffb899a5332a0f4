use std::{collections::TryReserveError, process};

use argh::FromArgs;
use block_pool::{
    BLOCK_SIZE, BlockPool, InitError, POOL_SIZE, PoolConfig,
    selftest::{self, SelfTestError},
};
use snafu::{Location, ResultExt as _, Snafu};

#[macro_use]
mod log;
mod report;

use self::{log::LogLevel, report::Report};

/// Partition a buffer into a block pool and run the pool self-tests.
#[derive(Debug, FromArgs)]
struct Args {
    /// total pool size in bytes
    #[argh(option, default = "POOL_SIZE")]
    pool_size: usize,
    /// block size in bytes
    #[argh(option, default = "BLOCK_SIZE")]
    block_size: usize,
    /// least severe log level printed: trace, debug, info, warn or error
    #[argh(option, default = "LogLevel::Info")]
    log_level: LogLevel,
}

#[derive(Debug, Snafu)]
pub enum RunError {
    #[snafu(display("init memory: FAIL"))]
    Init {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        source: InitError,
    },
    #[snafu(display("init memory: FAIL"))]
    Buffer {
        pool_size: usize,
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        source: TryReserveError,
    },
    #[snafu(display("{name} test: BAD"))]
    SelfTest {
        name: &'static str,
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        source: SelfTestError,
    },
}

impl RunError {
    pub fn location(&self) -> &Location {
        match self {
            Self::Init { location, .. }
            | Self::Buffer { location, .. }
            | Self::SelfTest { location, .. } => location,
        }
    }

    fn exit_code(&self) -> i32 {
        match self {
            Self::Init { .. } | Self::Buffer { .. } => 1,
            Self::SelfTest { source, .. } => 10 + i32::from(source.code()),
        }
    }
}

fn main() {
    let args: Args = argh::from_env();
    log::init(args.log_level);

    if let Err(err) = run(&args) {
        error!("{err}");
        let report = Report::new(&err);
        eprintln!("{report}");
        process::exit(err.exit_code());
    }
}

fn run(args: &Args) -> Result<(), RunError> {
    let config = PoolConfig::new(args.pool_size, args.block_size);
    info!(
        "initializing pool, pool_size={}, block_size={}, block_count={}, padding={}",
        config.pool_size,
        config.block_size,
        config.block_count(),
        config.padding()
    );

    config.validate().context(InitSnafu)?;
    let mut buffer = Vec::<u8>::new();
    buffer
        .try_reserve_exact(config.pool_size)
        .context(BufferSnafu {
            pool_size: config.pool_size,
        })?;
    buffer.resize(config.pool_size, 0);
    let mut pool = BlockPool::with_config(&mut buffer, config).context(InitSnafu)?;
    debug!("{pool:?}");
    println!("init memory: OK");

    run_test("free list", &mut pool, |pool| selftest::check_free_list(pool))?;
    run_test("allocate and free", &mut pool, selftest::check_alloc_free)?;
    run_test("exhaustion", &mut pool, selftest::check_exhaustion)?;

    info!("all tests passed, available={}", pool.available());
    Ok(())
}

fn run_test<F>(name: &'static str, pool: &mut BlockPool<'_>, test_fn: F) -> Result<(), RunError>
where
    F: FnOnce(&mut BlockPool<'_>) -> Result<(), SelfTestError>,
{
    debug!("running {name} test");
    test_fn(pool).context(SelfTestSnafu { name })?;
    trace!("{pool:?}");
    println!("{name} test: OK");
    Ok(())
}
