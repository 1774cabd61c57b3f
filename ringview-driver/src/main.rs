//! ringview - copy vs view consumption benchmark.
//!
//! Usage: ringview [--strategy copy|view|both] [-n EVENTS] [--read-timeout 5ms] [--rounds N]
//! Features: --features tracy (Tracy profiler instead of console logging)

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{ Context, Result };
use clap::{ Parser, ValueEnum };
use serde::Serialize;
use tracing::{ debug, error, info };

use ringview::constants::{ DEFAULT_EVENTS, DEFAULT_RING_CAPACITY, PACKET_DATA_SIZE };
use ringview::{
    BenchConfig,
    BenchDriver,
    BenchReport,
    Checksum,
    ClosedPolicy,
    RingBuf,
    RingConfig,
    RoundsSummary,
    StrategySelection,
    SyntheticProducer,
    WakeupStrategy,
    METRICS,
};

#[derive(Parser, Debug)]
#[command(name = "ringview")]
#[command(about = "compare copy and zero-copy consumption of a shared record ring")]
struct Args {
    #[arg(long, default_value = "both", help = "read strategy: copy, view or both")]
    strategy: StrategySelection,

    #[arg(
        short = 'n',
        long,
        default_value_t = DEFAULT_EVENTS,
        value_parser = clap::value_parser!(u64).range(1..=(u32::MAX as u64)),
        help = "number of events to generate and parse"
    )]
    events: u64,

    #[arg(
        long,
        default_value = "5ms",
        value_parser = parse_timeout,
        help = "how long a read may wait with no pending data (e.g. 5ms, 1s)"
    )]
    read_timeout: Duration,

    #[arg(long, default_value_t = DEFAULT_RING_CAPACITY, help = "ring capacity in bytes (power of 2)")]
    capacity: usize,

    #[arg(long, default_value_t = PACKET_DATA_SIZE, help = "packet payload size handed to the producer")]
    payload_size: usize,

    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "measurements per strategy; more than one prints a latency summary"
    )]
    rounds: u32,

    #[arg(long, value_enum, default_value_t = ClosedPolicyArg::Retry, help = "how a closed ring is treated")]
    closed_policy: ClosedPolicyArg,

    #[arg(long, default_value = "info", help = "log filter when RUST_LOG is unset")]
    log_level: String,

    #[arg(long, help = "also print each result as a JSON line")]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClosedPolicyArg {
    Retry,
    EndOfStream,
}

impl From<ClosedPolicyArg> for ClosedPolicy {
    fn from(arg: ClosedPolicyArg) -> Self {
        match arg {
            ClosedPolicyArg::Retry => ClosedPolicy::Retry,
            ClosedPolicyArg::EndOfStream => ClosedPolicy::EndOfStream,
        }
    }
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    let timeout = humantime::parse_duration(s).map_err(|e| e.to_string())?;
    if timeout.is_zero() {
        return Err("read timeout must be greater than 0".to_string());
    }
    Ok(timeout)
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JsonLine<'a> {
    Run(&'a BenchReport),
    Rounds(&'a RoundsSummary),
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);
    debug!(?args, "ringview configuration");

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{:#}", e), "aborted before any run");
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

#[cfg(feature = "tracy")]
fn init_logging(_args: &Args) {
    if let Err(e) = ringview::init_tracy() {
        eprintln!("tracy setup failed: {}", e);
    }
}

#[cfg(not(feature = "tracy"))]
fn init_logging(args: &Args) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level))
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Ok(false) when a strategy failed or the strategies disagree on the checksum.
fn run(args: &Args) -> Result<bool> {
    let ring_config = RingConfig::new(args.capacity)
        .context("invalid ring configuration")?
        .with_wakeup(WakeupStrategy::NoWakeup);
    let ring = RingBuf::new(ring_config).context("failed to create ring buffer")?;

    let producer = SyntheticProducer::new(ring.producer()?);
    let config = BenchConfig::new(args.events)
        .with_timeout(args.read_timeout)
        .with_payload_size(args.payload_size)
        .with_rounds(args.rounds)
        .with_closed_policy(args.closed_policy.into());
    let mut driver = BenchDriver::new(ring.reader()?, producer, config).context(
        "invalid benchmark configuration"
    )?;

    info!(
        events = args.events,
        capacity = args.capacity,
        strategy = ?args.strategy,
        rounds = args.rounds,
        "starting"
    );

    let ok = if args.rounds == 1 {
        run_once(&mut driver, args)?
    } else {
        run_rounds(&mut driver, args)?
    };

    info!(metrics = %METRICS.snapshot(), "done");
    Ok(ok)
}

fn run_once(driver: &mut BenchDriver<SyntheticProducer>, args: &Args) -> Result<bool> {
    let all = driver.run_all(args.strategy);

    for outcome in &all.outcomes {
        match &outcome.result {
            Ok(report) => {
                println!("{}: {}", report.strategy, report);
                println!("{}: checksum: {}", report.strategy, report.checksum);
                if args.json {
                    println!("{}", serde_json::to_string(&JsonLine::Run(report))?);
                }
            }
            Err(e) => eprintln!("{}: error: {}", outcome.strategy, e),
        }
    }

    let agree = match all.checksums_agree() {
        Some(agree) => {
            println!("checksums {}", if agree { "agree" } else { "DIFFER" });
            agree
        }
        None => true,
    };
    Ok(all.all_succeeded() && agree)
}

fn run_rounds(driver: &mut BenchDriver<SyntheticProducer>, args: &Args) -> Result<bool> {
    let mut ok = true;
    let mut checksums: Vec<Checksum> = Vec::new();

    for &kind in args.strategy.kinds() {
        match driver.run_rounds(kind, args.rounds) {
            Ok(summary) => {
                println!("{}", summary);
                if let Some(checksum) = summary.checksum() {
                    println!("{}: checksum: {}", kind, checksum);
                    checksums.push(checksum);
                }
                if args.json {
                    println!("{}", serde_json::to_string(&JsonLine::Rounds(&summary))?);
                }
                ok &= summary.checksums_consistent;
            }
            Err(e) => {
                eprintln!("{}: error: {}", kind, e);
                ok = false;
            }
        }
    }

    if checksums.len() > 1 {
        let agree = checksums.windows(2).all(|w| w[0] == w[1]);
        println!("checksums {}", if agree { "agree" } else { "DIFFER" });
        ok &= agree;
    }
    Ok(ok)
}
