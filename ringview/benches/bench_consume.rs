//! Copy vs view consumption benchmark with Criterion
//!
//! Only the drain is timed; the producer fills the ring before each measurement.
//!
//! Run: cargo bench --bench bench_consume

use criterion::{ criterion_group, criterion_main, BenchmarkId, Criterion, Throughput };
use std::time::{ Duration, Instant };

use ringview::constants::PACKET_DATA_SIZE;
use ringview::{
    ConsumeStrategy,
    CopyStrategy,
    Producer,
    RingBuf,
    RingConfig,
    SkbMeta,
    SyntheticProducer,
    ViewStrategy,
    WakeupStrategy,
};

const RING_SIZE: usize = 16 * 1024 * 1024;
const EVENTS: u64 = 50_000;
const READ_TIMEOUT: Duration = Duration::from_millis(5);

fn drain(iters: u64, strategy: &mut dyn ConsumeStrategy) -> Duration {
    let ring = RingBuf::new(
        RingConfig::new(RING_SIZE).unwrap().with_wakeup(WakeupStrategy::NoWakeup)
    ).unwrap();
    let mut producer = SyntheticProducer::new(ring.producer().unwrap());
    let mut reader = ring.reader().unwrap();
    let payload = [0u8; PACKET_DATA_SIZE];

    let mut total = Duration::ZERO;
    for _ in 0..iters {
        producer.trigger(&payload, EVENTS).unwrap();
        reader.set_deadline(None);

        let start = Instant::now();
        let consumed = strategy.consume(&mut reader, EVENTS, READ_TIMEOUT).unwrap();
        total += start.elapsed();
        std::hint::black_box(consumed.checksum);
    }
    total
}

fn benchmark_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("Consume (50K SkbMeta records)");
    group.throughput(Throughput::Elements(EVENTS));
    group.sample_size(20);

    group.bench_function(BenchmarkId::new("strategy", "copy"), |b| {
        b.iter_custom(|iters| drain(iters, &mut CopyStrategy::<SkbMeta>::new()))
    });

    group.bench_function(BenchmarkId::new("strategy", "view"), |b| {
        b.iter_custom(|iters| drain(iters, &mut ViewStrategy::<SkbMeta>::new()))
    });

    group.finish();
}

criterion_group!(benches, benchmark_strategies);
criterion_main!(benches);
