//! Slot reuse under load: every released slot is immediately rewritten.

use std::collections::VecDeque;

use ringview::{ ConsumeStrategy, RingProducer, RingReader, SkbMeta, Step, StepError };

/// Wraps a strategy and, after each record it takes, writes the next refill
/// record into the space that record freed.
///
/// With a ring sized to hold exactly the prefill, every refill lands in a
/// slot the consumer has just released.
pub struct OverwriteAfterRelease<S> {
    inner: S,
    producer: RingProducer,
    refill: VecDeque<SkbMeta>,
    folds: Vec<u64>,
    refilled: usize,
}

impl<S: ConsumeStrategy> OverwriteAfterRelease<S> {
    pub fn new(inner: S, producer: RingProducer, refill: Vec<SkbMeta>) -> Self {
        Self {
            inner,
            producer,
            refill: refill.into(),
            folds: Vec::new(),
            refilled: 0,
        }
    }

    /// Folds in the order the inner strategy produced them.
    pub fn folds(&self) -> &[u64] {
        &self.folds
    }

    pub fn refilled(&self) -> usize {
        self.refilled
    }
}

impl<S: ConsumeStrategy> ConsumeStrategy for OverwriteAfterRelease<S> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn read_one(&mut self, reader: &mut RingReader) -> Result<Step, StepError> {
        let step = self.inner.read_one(reader)?;
        self.folds.push(step.fold);

        let mut more_ready = step.more_ready;
        if let Some(record) = self.refill.pop_front() {
            // Left queued when the freed space is not enough; `refilled` exposes the shortfall.
            match self.producer.write(bytemuck::bytes_of(&record)) {
                Ok(()) => {
                    self.refilled += 1;
                    more_ready = true;
                }
                Err(_) => self.refill.push_front(record),
            }
        }
        Ok(Step { fold: step.fold, more_ready })
    }
}
