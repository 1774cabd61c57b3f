//! A producer running on its own thread.
//!
//! Commands arrive over a crossbeam channel; records are written as fast as
//! the ring accepts them, backing off while it is full.

use std::thread::{ self, JoinHandle };
use std::time::{ Duration, Instant };

use crossbeam_channel::{ bounded, unbounded, Receiver, Sender };

use ringview::bench::check_repeat;
use ringview::{ Producer, ProducerError, RingProducer, SyntheticProducer };

/// How long a single write may keep retrying against a full ring.
pub const FULL_RING_PATIENCE: Duration = Duration::from_secs(5);

enum Command {
    Emit {
        payload: Vec<u8>,
        repeat: u64,
        pace: Option<Duration>,
        done: Sender<Result<u64, ProducerError>>,
    },
    Stop,
}

pub struct ThreadedProducer {
    commands: Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadedProducer {
    pub fn spawn(ring: RingProducer) -> Result<Self, ProducerError> {
        let (commands, inbox) = unbounded();
        let handle = thread::Builder::new()
            .name("ringview-producer".into())
            .spawn(move || worker(SyntheticProducer::new(ring), inbox))
            .map_err(|e| ProducerError::Unavailable(format!("failed to spawn producer thread: {}", e)))?;
        Ok(Self { commands, handle: Some(handle) })
    }

    /// Start emitting without waiting. The receiver yields the number of
    /// records written once the batch finishes.
    ///
    /// `pace` sleeps between records to keep the consumer waiting.
    pub fn emit(
        &self,
        payload: &[u8],
        repeat: u64,
        pace: Option<Duration>
    ) -> Result<Receiver<Result<u64, ProducerError>>, ProducerError> {
        check_repeat(repeat)?;
        let (done, result) = bounded(1);
        self.commands
            .send(Command::Emit { payload: payload.to_vec(), repeat, pace, done })
            .map_err(|_| ProducerError::Unavailable("producer thread exited".into()))?;
        Ok(result)
    }
}

impl Producer for ThreadedProducer {
    /// Blocks until the whole batch is in the ring.
    ///
    /// With a ring smaller than the batch this only returns once a consumer
    /// drains concurrently; prefer `emit` there.
    fn trigger(&mut self, payload: &[u8], repeat: u64) -> Result<(), ProducerError> {
        let result = self.emit(payload, repeat, None)?;
        match result.recv() {
            Ok(outcome) => outcome.map(|_| ()),
            Err(_) => Err(ProducerError::Unavailable("producer thread exited".into())),
        }
    }
}

impl Drop for ThreadedProducer {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker(mut producer: SyntheticProducer, inbox: Receiver<Command>) {
    while let Ok(command) = inbox.recv() {
        match command {
            Command::Emit { payload, repeat, pace, done } => {
                let outcome = emit_batch(&mut producer, &payload, repeat, pace);
                let _ = done.send(outcome);
            }
            Command::Stop => break,
        }
    }
}

fn emit_batch(
    producer: &mut SyntheticProducer,
    payload: &[u8],
    repeat: u64,
    pace: Option<Duration>
) -> Result<u64, ProducerError> {
    for index in 0..repeat {
        let record = producer.record_for(payload, index);
        let bytes = bytemuck::bytes_of(&record);

        let mut backoff = Duration::from_micros(1);
        let give_up = Instant::now() + FULL_RING_PATIENCE;
        loop {
            match producer.ring_mut().write(bytes) {
                Ok(()) => break,
                Err(e) if e.is_full() && Instant::now() < give_up => {
                    // The reader only learns about records through the eventfd.
                    let _ = producer.ring_mut().notify();
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(Duration::from_millis(1));
                }
                Err(source) => {
                    return Err(ProducerError::Ring { written: index, requested: repeat, source });
                }
            }
        }

        if let Some(pace) = pace {
            let _ = producer.ring_mut().notify();
            thread::sleep(pace);
        }
    }

    producer
        .ring_mut()
        .notify()
        .map_err(|source| ProducerError::Ring { written: repeat, requested: repeat, source })?;
    Ok(repeat)
}
