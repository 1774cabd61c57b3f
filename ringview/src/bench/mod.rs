//! Benchmark driver: trigger the producer, time one strategy, report.

pub mod producer;
pub mod report;

pub use producer::{ check_repeat, Producer, ProducerError, SyntheticProducer };
pub use report::{ AllReport, BenchReport, RoundsSummary, StrategyOutcome };

use std::fmt;
use std::str::FromStr;
use std::time::{ Duration, Instant };

use serde::Serialize;
use thiserror::Error;
use tracing::{ debug, info, warn };

use crate::constants::{ DEFAULT_EVENTS, DEFAULT_READ_TIMEOUT, PACKET_DATA_SIZE };
use crate::consumer::{ ClosedPolicy, ConsumeError, ConsumeLoop, ConsumeStrategy, CopyStrategy, ViewStrategy };
use crate::insights;
use crate::layout::{ CapacityShortfall, SkbMeta, SlotLayout };
use crate::metrics::METRICS;
use crate::ringbuf::RingReader;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error(transparent)]
    Capacity(#[from] CapacityShortfall),

    #[error("producer failed: {0}")]
    Producer(#[from] ProducerError),

    #[error(transparent)]
    Consume(#[from] ConsumeError),

    #[error("histogram setup failed: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),
}

impl BenchError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Raised before any producer call.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Capacity(_))
    }
}

/// A single read strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Copy,
    View,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::View => "view",
        }
    }

    /// Strategy over `SkbMeta` records.
    pub fn build(self) -> Box<dyn ConsumeStrategy> {
        match self {
            Self::Copy => Box::new(CopyStrategy::<SkbMeta>::new()),
            Self::View => Box::new(ViewStrategy::<SkbMeta>::new()),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which strategies a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategySelection {
    Copy,
    View,
    #[default]
    Both,
}

impl StrategySelection {
    pub fn kinds(self) -> &'static [StrategyKind] {
        match self {
            Self::Copy => &[StrategyKind::Copy],
            Self::View => &[StrategyKind::View],
            Self::Both => &[StrategyKind::Copy, StrategyKind::View],
        }
    }
}

impl FromStr for StrategySelection {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "copy" => Ok(Self::Copy),
            "view" => Ok(Self::View),
            "both" => Ok(Self::Both),
            other =>
                Err(BenchError::config(format!("unsupported strategy '{}': expected copy, view or both", other))),
        }
    }
}

/// Parameters of one measurement
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub events: u64,
    pub per_wait_timeout: Duration,
    pub payload_size: usize,
    pub rounds: u32,
    pub closed_policy: ClosedPolicy,
    pub layout: SlotLayout,
}

impl BenchConfig {
    pub fn new(events: u64) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, per_wait_timeout: Duration) -> Self {
        self.per_wait_timeout = per_wait_timeout;
        self
    }

    pub fn with_payload_size(mut self, payload_size: usize) -> Self {
        self.payload_size = payload_size;
        self
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_closed_policy(mut self, closed_policy: ClosedPolicy) -> Self {
        self.closed_policy = closed_policy;
        self
    }

    pub fn with_layout(mut self, layout: SlotLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Checks everything that does not depend on the ring.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.events == 0 {
            return Err(BenchError::config("event count must be greater than 0"));
        }
        check_repeat(self.events).map_err(|e| BenchError::config(e.to_string()))?;
        if self.per_wait_timeout.is_zero() {
            return Err(BenchError::config("read timeout must be greater than 0"));
        }
        if self.payload_size == 0 {
            return Err(BenchError::config("payload size must be greater than 0"));
        }
        if self.rounds == 0 {
            return Err(BenchError::config("rounds must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            events: DEFAULT_EVENTS,
            per_wait_timeout: DEFAULT_READ_TIMEOUT,
            payload_size: PACKET_DATA_SIZE,
            rounds: 1,
            closed_policy: ClosedPolicy::default(),
            layout: SlotLayout::of::<SkbMeta>(),
        }
    }
}

/// Owns the reader and producer for a series of runs.
pub struct BenchDriver<P: Producer> {
    reader: RingReader,
    producer: P,
    config: BenchConfig,
    payload: Vec<u8>,
}

impl<P: Producer> BenchDriver<P> {
    pub fn new(reader: RingReader, producer: P, config: BenchConfig) -> Result<Self, BenchError> {
        let driver = Self {
            payload: vec![0u8; config.payload_size],
            reader,
            producer,
            config,
        };
        driver.preflight()?;
        Ok(driver)
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn producer_mut(&mut self) -> &mut P {
        &mut self.producer
    }

    /// Configuration and capacity checks; no producer call happens before these pass.
    ///
    /// The configured layout must describe what actually lands in the ring:
    /// `SkbMeta` records in the ring's own header and alignment.
    pub fn preflight(&self) -> Result<(), BenchError> {
        self.config.validate()?;
        let framing = SlotLayout::of::<SkbMeta>();
        if self.config.layout != framing {
            return Err(
                BenchError::config(
                    format!(
                        "slot layout {}B record / {}B align / {}B header does not match the ring's {}B / {}B / {}B",
                        self.config.layout.record_size(),
                        self.config.layout.align(),
                        self.config.layout.header_size(),
                        framing.record_size(),
                        framing.align(),
                        framing.header_size()
                    )
                )
            );
        }
        framing.check_capacity(self.reader.capacity(), self.config.events)?;
        Ok(())
    }

    /// Measure one strategy once.
    pub fn run(&mut self, strategy: &mut dyn ConsumeStrategy) -> Result<BenchReport, BenchError> {
        self.preflight()?;
        self.measure(strategy)
    }

    pub fn run_kind(&mut self, kind: StrategyKind) -> Result<BenchReport, BenchError> {
        self.preflight()?;
        let mut strategy = kind.build();
        self.measure(strategy.as_mut())
    }

    /// Run each selected strategy back to back; a failure does not stop the next.
    pub fn run_all(&mut self, selection: StrategySelection) -> AllReport {
        let mut all = AllReport::default();
        for &kind in selection.kinds() {
            let result = self.run_kind(kind);
            if let Err(e) = &result {
                warn!(strategy = %kind, error = %e, "strategy run failed");
            }
            all.outcomes.push(StrategyOutcome { strategy: kind, result });
        }
        all
    }

    /// Repeat one strategy `rounds` times and summarize elapsed times.
    pub fn run_rounds(&mut self, kind: StrategyKind, rounds: u32) -> Result<RoundsSummary, BenchError> {
        if rounds == 0 {
            return Err(BenchError::config("rounds must be greater than 0"));
        }
        self.preflight()?;

        let mut strategy = kind.build();
        let mut reports = Vec::with_capacity(rounds as usize);
        for round in 0..rounds {
            let _span = insights::round_span(kind.name(), round).entered();
            reports.push(self.measure(strategy.as_mut())?);
        }

        let summary = RoundsSummary::from_reports(kind.name(), reports)?;
        if !summary.checksums_consistent {
            warn!(strategy = %kind, "checksum differs between rounds");
        }
        Ok(summary)
    }

    fn measure(&mut self, strategy: &mut dyn ConsumeStrategy) -> Result<BenchReport, BenchError> {
        let name = strategy.name();
        let _span = insights::run_span(name, self.config.events).entered();
        let events = self.config.events;

        let stale = self.reader.discard_pending();
        if stale > 0 {
            debug!(stale, "dropped records left by a previous run");
        }

        self.producer.trigger(&self.payload, events)?;
        self.reader.set_deadline(None);

        let start = Instant::now();
        let consumed = ConsumeLoop::new(events, self.config.per_wait_timeout)
            .with_closed_policy(self.config.closed_policy)
            .run(strategy, &mut self.reader)?;
        let elapsed = start.elapsed();

        let report = BenchReport {
            strategy: name,
            received: consumed.received,
            elapsed,
            checksum: consumed.checksum,
        };
        info!(
            strategy = name,
            received = report.received,
            elapsed = ?report.elapsed,
            mevents_per_sec = report.mevents_per_sec(),
            checksum = %report.checksum,
            "run complete"
        );
        debug!(metrics = %METRICS.snapshot(), "metrics");
        Ok(report)
    }
}
