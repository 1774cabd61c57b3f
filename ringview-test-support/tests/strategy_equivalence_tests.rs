//! Copy and view must agree on every sequence they both fully consume.

use std::time::Duration;

use ringview::ringbuf::page_size;
use ringview::{
    BenchConfig,
    BenchDriver,
    Checksum,
    ConsumeStrategy,
    CopyStrategy,
    Record,
    RingBuf,
    RingConfig,
    SkbMeta,
    StrategyKind,
    StrategySelection,
    SyntheticProducer,
    ViewStrategy,
    WakeupStrategy,
};
use ringview_test_support::{ checksum_of, RandomRecords, SequenceProducer, ThreadedProducer };
use rstest::rstest;

fn ring(capacity: usize) -> RingBuf {
    RingBuf::new(RingConfig::new(capacity).unwrap().with_wakeup(WakeupStrategy::NoWakeup)).unwrap()
}

#[rstest]
#[case(1, 1)]
#[case(7, 500)]
#[case(42, 1820)]
fn test_random_sequences_fold_identically(#[case] seed: u64, #[case] count: usize) {
    let records = RandomRecords::new(seed).take(count);
    let expected = checksum_of(&records);

    let ring = ring(1 << 17);
    let producer = SequenceProducer::new(ring.producer().unwrap(), records);
    let config = BenchConfig::new(count as u64).with_timeout(Duration::from_millis(50));
    let mut driver = BenchDriver::new(ring.reader().unwrap(), producer, config).unwrap();

    let all = driver.run_all(StrategySelection::Both);
    assert!(all.all_succeeded());
    assert_eq!(all.checksums_agree(), Some(true));
    for report in all.successes() {
        assert_eq!(report.received, count as u64);
        assert_eq!(report.checksum, expected);
    }
}

#[test]
fn test_repeated_runs_are_deterministic() {
    let ring = ring(1 << 16);
    let producer = SyntheticProducer::new(ring.producer().unwrap());
    let mut driver = BenchDriver::new(ring.reader().unwrap(), producer, BenchConfig::new(800)).unwrap();

    let summary = driver.run_rounds(StrategyKind::View, 4).unwrap();
    assert!(summary.checksums_consistent);
    let copy = driver.run_kind(StrategyKind::Copy).unwrap();
    assert_eq!(summary.checksum(), Some(copy.checksum));
}

#[test]
fn test_throughput_covers_consumption_only() {
    let ring = ring(1 << 20);
    let producer = SyntheticProducer::new(ring.producer().unwrap());
    let mut driver = BenchDriver::new(ring.reader().unwrap(), producer, BenchConfig::new(10_000)).unwrap();

    let report = driver.run_kind(StrategyKind::Copy).unwrap();
    let expected = report.received as f64 / report.elapsed.as_secs_f64();
    assert!((report.throughput() - expected).abs() <= expected * 1e-9);
    assert!((report.mevents_per_sec() - expected / 1e6).abs() <= 1e-9 * expected);
}

/// 5000 records through a single-page ring, producer on another thread.
#[rstest]
#[case::copy(Box::new(CopyStrategy::<SkbMeta>::new()))]
#[case::view(Box::new(ViewStrategy::<SkbMeta>::new()))]
fn test_threaded_drain_through_small_ring(#[case] mut strategy: Box<dyn ConsumeStrategy>) {
    const EVENTS: u64 = 5000;
    let payload = [0x5Au8; 128];

    let reference = {
        let scratch = ring(page_size());
        let producer = SyntheticProducer::new(scratch.producer().unwrap());
        let mut sum = Checksum::default();
        for i in 0..EVENTS {
            sum.absorb(producer.record_for(&payload, i).fold());
        }
        sum
    };

    let ring = ring(page_size());
    let mut reader = ring.reader().unwrap();
    let producer = ThreadedProducer::spawn(ring.producer().unwrap()).unwrap();
    let done = producer.emit(&payload, EVENTS, None).unwrap();

    let consumed = strategy.consume(&mut reader, EVENTS, Duration::from_millis(500)).unwrap();
    assert_eq!(done.recv().unwrap().unwrap(), EVENTS);
    assert_eq!(consumed.received, EVENTS);
    assert_eq!(consumed.checksum, reference);
    assert_eq!(reader.pending_bytes(), 0);
}

#[test]
fn test_slow_producer_rearms_per_wait() {
    // Each record arrives 2 ms apart; a 20 ms per-wait budget must cover every gap
    // even though the whole run takes longer than that.
    let ring = ring(1 << 16);
    let mut reader = ring.reader().unwrap();
    let producer = ThreadedProducer::spawn(ring.producer().unwrap()).unwrap();
    let done = producer.emit(&[0u8; 128], 30, Some(Duration::from_millis(2))).unwrap();

    let mut strategy = ViewStrategy::<SkbMeta>::new();
    let consumed = strategy.consume(&mut reader, 30, Duration::from_millis(20)).unwrap();
    assert_eq!(consumed.received, 30);
    assert_eq!(done.recv().unwrap().unwrap(), 30);
}
