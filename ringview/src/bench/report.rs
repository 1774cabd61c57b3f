use std::fmt;
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

use super::{ BenchError, StrategyKind };
use crate::layout::Checksum;

/// Result of one successful strategy run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchReport {
    pub strategy: &'static str,
    pub received: u64,
    /// Consumption window only; producer time is excluded
    pub elapsed: Duration,
    pub checksum: Checksum,
}

impl BenchReport {
    /// Records per second over the consumption window.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        (self.received as f64) / secs
    }

    pub fn mevents_per_sec(&self) -> f64 {
        self.throughput() / 1e6
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parsed {} events in {:?} ({:.2} Mevents/s)",
            self.received,
            self.elapsed,
            self.mevents_per_sec()
        )
    }
}

/// Upper bound of the rounds histogram: one hour.
const MAX_TRACKED_NANOS: u64 = 3_600_000_000_000;

/// Elapsed-time distribution over repeated runs of one strategy.
#[derive(Debug, Clone, Serialize)]
pub struct RoundsSummary {
    pub strategy: &'static str,
    pub rounds: u32,
    pub p50: Duration,
    pub p99: Duration,
    pub max: Duration,
    /// Every round folded to the same checksum
    pub checksums_consistent: bool,
    pub reports: Vec<BenchReport>,
}

impl RoundsSummary {
    pub(crate) fn from_reports(
        strategy: &'static str,
        reports: Vec<BenchReport>
    ) -> Result<Self, BenchError> {
        let mut hist = Histogram::<u64>::new_with_bounds(1, MAX_TRACKED_NANOS, 3)?;
        for report in &reports {
            // Rounds slower than an hour land in the top bucket.
            hist.saturating_record(report.elapsed.as_nanos().min(MAX_TRACKED_NANOS as u128) as u64);
        }

        let checksums_consistent = reports.windows(2).all(|w| w[0].checksum == w[1].checksum);

        Ok(Self {
            strategy,
            rounds: reports.len() as u32,
            p50: Duration::from_nanos(hist.value_at_quantile(0.5)),
            p99: Duration::from_nanos(hist.value_at_quantile(0.99)),
            max: Duration::from_nanos(hist.max()),
            checksums_consistent,
            reports,
        })
    }

    pub fn checksum(&self) -> Option<Checksum> {
        self.reports.last().map(|r| r.checksum)
    }
}

impl fmt::Display for RoundsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} rounds p50={:?} p99={:?} max={:?} checksums {}",
            self.strategy,
            self.rounds,
            self.p50,
            self.p99,
            self.max,
            if self.checksums_consistent { "consistent" } else { "DIFFER" }
        )
    }
}

/// One strategy's outcome inside `run_all`.
#[derive(Debug)]
pub struct StrategyOutcome {
    pub strategy: StrategyKind,
    pub result: Result<BenchReport, BenchError>,
}

/// Outcomes of several strategies run back to back.
#[derive(Debug, Default)]
pub struct AllReport {
    pub outcomes: Vec<StrategyOutcome>,
}

impl AllReport {
    pub fn successes(&self) -> impl Iterator<Item = &BenchReport> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (StrategyKind, &BenchError)> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err().map(|e| (o.strategy, e)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// `None` unless at least two strategies succeeded.
    pub fn checksums_agree(&self) -> Option<bool> {
        let mut successes = self.successes();
        let first = successes.next()?;
        let mut compared = false;
        let mut agree = true;
        for other in successes {
            compared = true;
            agree &= other.checksum == first.checksum;
        }
        compared.then_some(agree)
    }
}
