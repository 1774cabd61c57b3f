//! Producers that misbehave in one specific, repeatable way.

use ringview::{ Producer, ProducerError, RingProducer, SkbMeta, SyntheticProducer };
use ringview::bench::check_repeat;

fn ring_error(written: u64, requested: u64) -> impl FnOnce(ringview::RingError) -> ProducerError {
    move |source| ProducerError::Ring { written, requested, source }
}

/// Emits at most `limit` records no matter how many were requested.
pub struct ShortProducer {
    inner: SyntheticProducer,
    limit: u64,
}

impl ShortProducer {
    pub fn new(ring: RingProducer, limit: u64) -> Self {
        Self { inner: SyntheticProducer::new(ring), limit }
    }

    pub fn record_for(&self, payload: &[u8], index: u64) -> SkbMeta {
        self.inner.record_for(payload, index)
    }
}

impl Producer for ShortProducer {
    fn trigger(&mut self, payload: &[u8], repeat: u64) -> Result<(), ProducerError> {
        check_repeat(repeat)?;
        let emitted = repeat.min(self.limit);
        if emitted == 0 {
            return Ok(());
        }
        self.inner.trigger(payload, emitted)
    }
}

/// Replaces record `bad_index` with a sample of `bad_len` bytes.
pub struct MalformedProducer {
    inner: SyntheticProducer,
    bad_index: u64,
    bad_len: usize,
}

impl MalformedProducer {
    pub fn new(ring: RingProducer, bad_index: u64, bad_len: usize) -> Self {
        Self { inner: SyntheticProducer::new(ring), bad_index, bad_len }
    }

    pub fn record_for(&self, payload: &[u8], index: u64) -> SkbMeta {
        self.inner.record_for(payload, index)
    }
}

impl Producer for MalformedProducer {
    fn trigger(&mut self, payload: &[u8], repeat: u64) -> Result<(), ProducerError> {
        check_repeat(repeat)?;

        for index in 0..repeat {
            let record = self.inner.record_for(payload, index);
            let bytes = bytemuck::bytes_of(&record);
            let result = if index == self.bad_index {
                let mut sample = vec![0xA5u8; self.bad_len];
                let n = self.bad_len.min(bytes.len());
                sample[..n].copy_from_slice(&bytes[..n]);
                self.inner.ring_mut().write(&sample)
            } else {
                self.inner.ring_mut().write(bytes)
            };
            result.map_err(ring_error(index, repeat))?;
        }
        self.inner.ring_mut().notify().map_err(ring_error(repeat, repeat))
    }
}

/// Writes a fixed record sequence, ignoring the payload.
///
/// `repeat` must equal the sequence length.
pub struct SequenceProducer {
    ring: RingProducer,
    records: Vec<SkbMeta>,
}

impl SequenceProducer {
    pub fn new(ring: RingProducer, records: Vec<SkbMeta>) -> Self {
        Self { ring, records }
    }

    pub fn records(&self) -> &[SkbMeta] {
        &self.records
    }
}

impl Producer for SequenceProducer {
    fn trigger(&mut self, _payload: &[u8], repeat: u64) -> Result<(), ProducerError> {
        check_repeat(repeat)?;
        if repeat != self.records.len() as u64 {
            return Err(
                ProducerError::Unavailable(
                    format!("sequence holds {} records, {} requested", self.records.len(), repeat)
                )
            );
        }

        for (index, record) in self.records.iter().enumerate() {
            self.ring
                .write(bytemuck::bytes_of(record))
                .map_err(ring_error(index as u64, repeat))?;
        }
        self.ring.notify().map_err(ring_error(repeat, repeat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringview::ringbuf::page_size;
    use ringview::{ RawRecord, RingBuf, RingConfig, WakeupStrategy };

    fn ring() -> RingBuf {
        RingBuf::new(RingConfig::new(page_size()).unwrap().with_wakeup(WakeupStrategy::NoWakeup)).unwrap()
    }

    #[test]
    fn test_short_producer_caps_output() {
        let ring = ring();
        let mut producer = ShortProducer::new(ring.producer().unwrap(), 5);
        producer.trigger(&[0u8; 128], 20).unwrap();
        assert_eq!(ring.used_bytes(), 5 * 72);
    }

    #[test]
    fn test_malformed_producer_writes_bad_length() {
        let ring = ring();
        let mut reader = ring.reader().unwrap();
        let mut producer = MalformedProducer::new(ring.producer().unwrap(), 1, 60);
        producer.trigger(&[0u8; 128], 3).unwrap();

        let mut record = RawRecord::new();
        let lens: Vec<usize> = (0..3)
            .map(|_| {
                reader.read_into(&mut record).unwrap();
                record.len()
            })
            .collect();
        assert_eq!(lens, vec![64, 60, 64]);
    }

    #[test]
    fn test_sequence_producer_rejects_count_mismatch() {
        let ring = ring();
        let mut producer = SequenceProducer::new(ring.producer().unwrap(), vec![SkbMeta::default(); 3]);
        assert!(matches!(producer.trigger(&[], 4), Err(ProducerError::Unavailable(_))));
        producer.trigger(&[], 3).unwrap();
        assert_eq!(producer.records().len(), 3);
    }
}
