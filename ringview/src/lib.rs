//! ringview - copy vs zero-copy consumption of a shared record ring.
//!
//! A single producer writes fixed-size `SkbMeta` records into a memfd-backed
//! ring; a single reader drains them with one of two strategies:
//!
//! - **copy** - each sample is copied into an owned scratch record, then folded
//! - **view** - each sample is borrowed in place and released after folding
//!
//! ```rust,no_run
//! use ringview::{ BenchConfig, BenchDriver, RingBuf, RingConfig, StrategySelection,
//!     SyntheticProducer, WakeupStrategy };
//!
//! let ring = RingBuf::new(RingConfig::new(1 << 24)?.with_wakeup(WakeupStrategy::NoWakeup))?;
//! let producer = SyntheticProducer::new(ring.producer()?);
//! let mut driver = BenchDriver::new(ring.reader()?, producer, BenchConfig::new(50_000))?;
//!
//! for report in driver.run_all(StrategySelection::Both).successes() {
//!     println!("{}: {} (checksum {})", report.strategy, report, report.checksum);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bench;
pub mod constants;
pub mod consumer;
pub mod error;
pub mod insights;
pub mod layout;
pub mod metrics;
pub mod ringbuf;

pub use bench::{
    AllReport,
    BenchConfig,
    BenchDriver,
    BenchError,
    BenchReport,
    Producer,
    ProducerError,
    RoundsSummary,
    StrategyKind,
    StrategySelection,
    SyntheticProducer,
};
pub use consumer::{
    ClosedPolicy,
    ConsumeError,
    ConsumeLoop,
    ConsumeStrategy,
    Consumed,
    CopyStrategy,
    Step,
    StepError,
    ViewStrategy,
};
pub use error::{ LayoutError, ReadError, Result, RingError };
pub use insights::init_tracy;
pub use layout::{ Checksum, Record, SkbMeta, SlotLayout };
pub use metrics::{ MetricsSnapshot, METRICS };
pub use ringbuf::{ RawRecord, RingBuf, RingConfig, RingProducer, RingReader, View, WakeupStrategy };
