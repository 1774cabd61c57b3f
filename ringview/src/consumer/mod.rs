//! Record consumption: one contract, two read strategies.
//!
//! A strategy only knows how to take one record off the reader and fold it.
//! `ConsumeLoop` owns everything around that: counting, the checksum, the
//! wait deadline and the reaction to transient buffer conditions.
//!
//! ```text
//!            record, more ready            received == expected
//!   Waiting ───────────────────▶ Draining ─────────────────────▶ Done
//!      ▲  ◀───────────────────────┘
//!      │      record, nothing ready (deadline re-armed)
//!      └─ closed / flushed: retried, deadline kept
//!
//!   deadline exceeded, wrong-size sample, fatal reader error ──▶ Failed
//! ```

pub mod copy;
pub mod view;

pub use copy::CopyStrategy;
pub use view::ViewStrategy;

use std::time::{ Duration, Instant };

use serde::Serialize;
use thiserror::Error;
use tracing::{ debug, trace, warn };

use crate::error::{ LayoutError, ReadError };
use crate::layout::Checksum;
use crate::metrics::METRICS;
use crate::ringbuf::RingReader;

/// Records taken off the ring so far and their running checksum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Consumed {
    pub received: u64,
    pub checksum: Checksum,
}

/// One record taken by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub fold: u64,
    /// Another committed record can be read without waiting
    pub more_ready: bool,
}

#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// A consume run that stopped before `expected` records. Every variant carries
/// the partial count and checksum.
#[derive(Error, Debug)]
pub enum ConsumeError {
    #[error("timeout waiting for events: received {received}/{expected}")]
    Starvation {
        received: u64,
        expected: u64,
        checksum: Checksum,
    },

    #[error("framing error after {received}/{expected} events: {source}")]
    Framing {
        received: u64,
        expected: u64,
        checksum: Checksum,
        #[source]
        source: LayoutError,
    },

    #[error("ring buffer closed after {received}/{expected} events")]
    Closed {
        received: u64,
        expected: u64,
        checksum: Checksum,
    },

    #[error("reading ring buffer failed after {received}/{expected} events: {source}")]
    Reader {
        received: u64,
        expected: u64,
        checksum: Checksum,
        #[source]
        source: ReadError,
    },
}

impl ConsumeError {
    fn new(consumed: Consumed, expected: u64, cause: StepError, policy: ClosedPolicy) -> Self {
        let Consumed { received, checksum } = consumed;
        match cause {
            StepError::Layout(source) => Self::Framing { received, expected, checksum, source },
            StepError::Read(ReadError::DeadlineExceeded) =>
                Self::Starvation { received, expected, checksum },
            StepError::Read(ReadError::Closed) if policy == ClosedPolicy::EndOfStream =>
                Self::Closed { received, expected, checksum },
            StepError::Read(source) => Self::Reader { received, expected, checksum, source },
        }
    }

    /// Partial result at the point of failure.
    pub fn consumed(&self) -> Consumed {
        match *self {
            | Self::Starvation { received, checksum, .. }
            | Self::Framing { received, checksum, .. }
            | Self::Closed { received, checksum, .. }
            | Self::Reader { received, checksum, .. } => Consumed { received, checksum },
        }
    }

    pub fn expected(&self) -> u64 {
        match *self {
            | Self::Starvation { expected, .. }
            | Self::Framing { expected, .. }
            | Self::Closed { expected, .. }
            | Self::Reader { expected, .. } => expected,
        }
    }

    pub fn is_starvation(&self) -> bool {
        matches!(self, Self::Starvation { .. })
    }

    pub fn is_framing(&self) -> bool {
        matches!(self, Self::Framing { .. })
    }
}

/// How a closed buffer is treated while consuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClosedPolicy {
    /// Closed is transient; keep retrying until data or the deadline
    #[default]
    Retry,
    /// Closed ends the run with `ConsumeError::Closed`
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Waiting,
    Draining,
    Done,
    Failed,
}

/// Drives a strategy until `expected` records are folded or the run fails.
#[derive(Debug, Clone, Copy)]
pub struct ConsumeLoop {
    expected: u64,
    per_wait_timeout: Duration,
    closed_policy: ClosedPolicy,
}

impl ConsumeLoop {
    pub fn new(expected: u64, per_wait_timeout: Duration) -> Self {
        Self {
            expected,
            per_wait_timeout,
            closed_policy: ClosedPolicy::default(),
        }
    }

    pub fn with_closed_policy(mut self, policy: ClosedPolicy) -> Self {
        self.closed_policy = policy;
        self
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }

    pub fn run<S: ConsumeStrategy + ?Sized>(
        &self,
        strategy: &mut S,
        reader: &mut RingReader
    ) -> Result<Consumed, ConsumeError> {
        let mut consumed = Consumed::default();
        if self.expected == 0 {
            return Ok(consumed);
        }

        let mut state = self.enter_waiting(reader);
        loop {
            match strategy.read_one(reader) {
                Ok(step) => {
                    consumed.received += 1;
                    consumed.checksum.absorb(step.fold);

                    if consumed.received == self.expected {
                        trace!(from = ?state, to = ?ConsumerState::Done, "consumer transition");
                        return Ok(consumed);
                    }
                    state = if step.more_ready {
                        ConsumerState::Draining
                    } else {
                        self.enter_waiting(reader)
                    };
                }
                Err(StepError::Read(e)) if e.is_transient() && !self.closed_is_fatal(&e) => {
                    // Deadline stays as armed; a buffer that stays closed ends in starvation.
                    METRICS.record_transient_retry();
                    trace!(error = %e, ?state, "transient buffer condition, retrying");
                    std::thread::yield_now();
                }
                Err(cause) => {
                    let err = ConsumeError::new(consumed, self.expected, cause, self.closed_policy);
                    self.record_failure(&err, state);
                    return Err(err);
                }
            }
        }
    }

    fn enter_waiting(&self, reader: &mut RingReader) -> ConsumerState {
        reader.set_deadline(Some(Instant::now() + self.per_wait_timeout));
        METRICS.record_wait_armed();
        ConsumerState::Waiting
    }

    fn closed_is_fatal(&self, e: &ReadError) -> bool {
        matches!(e, ReadError::Closed) && self.closed_policy == ClosedPolicy::EndOfStream
    }

    fn record_failure(&self, err: &ConsumeError, from: ConsumerState) {
        match err {
            ConsumeError::Starvation { .. } => METRICS.record_starvation(),
            ConsumeError::Framing { .. } => METRICS.record_framing_error(),
            _ => {}
        }
        warn!(?from, to = ?ConsumerState::Failed, error = %err, "consume failed");
    }
}

/// A way of taking records off the ring. Copy and View implement it.
pub trait ConsumeStrategy {
    fn name(&self) -> &'static str;

    /// Take exactly one record, blocking within the reader's current deadline.
    fn read_one(&mut self, reader: &mut RingReader) -> Result<Step, StepError>;

    /// Consume `expected` records, failing if the ring stays empty for
    /// longer than `per_wait_timeout`.
    fn consume(
        &mut self,
        reader: &mut RingReader,
        expected: u64,
        per_wait_timeout: Duration
    ) -> Result<Consumed, ConsumeError> {
        debug!(strategy = self.name(), expected, ?per_wait_timeout, "consume start");
        ConsumeLoop::new(expected, per_wait_timeout).run(self, reader)
    }
}
