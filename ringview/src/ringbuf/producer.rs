use std::ops::{ Deref, DerefMut };
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::trace;

use super::header::{ framed_len, RecordHeader, HEADER_SIZE };
use super::{ Shared, WakeupStrategy };
use crate::error::{ Result, RingError };
use crate::metrics::METRICS;

/// The single writer of a ring buffer.
pub struct RingProducer {
    shared: Arc<Shared>,
}

impl RingProducer {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Bytes available before the producer would overrun the reader.
    pub fn free_bytes(&self) -> usize {
        let meta = self.shared.metadata();
        let used = meta.producer_pos() - meta.consumer_pos();
        self.shared.capacity() - (used as usize)
    }

    // ===== Producer API =====

    /// Reserve `len` bytes. The reader stops at the record until the
    /// reservation is committed (dropped) or discarded.
    pub fn reserve(&mut self, len: usize) -> Result<Reservation<'_>> {
        let shared: &Shared = &self.shared;
        let total = framed_len(len);
        if len > (u32::MAX as usize) || total > shared.capacity() {
            return Err(RingError::InvalidRecordSize(len));
        }

        let meta = shared.metadata();
        let consumer_pos = meta.consumer_pos();
        let producer_pos = meta.producer_pos();
        let new_producer_pos = producer_pos + (total as u64);

        if new_producer_pos - consumer_pos > (shared.capacity() as u64) {
            METRICS.record_reserve_failure();
            trace!(producer_pos, consumer_pos, len, "reserve failed: insufficient space");
            return Err(RingError::InsufficientSpace {
                needed: total,
                free: shared.capacity() - ((producer_pos - consumer_pos) as usize),
            });
        }

        let header = shared.header_at(producer_pos);
        header.reserve(len as u32);
        meta.producer.pos.store(new_producer_pos, Ordering::Release);

        let data = unsafe {
            std::slice::from_raw_parts_mut(shared.data_at(producer_pos + (HEADER_SIZE as u64)), len)
        };

        Ok(Reservation {
            header,
            data,
            shared,
            discarded: false,
        })
    }

    /// Reserve, copy `bytes` in and commit.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut reservation = self.reserve(bytes.len())?;
        reservation.copy_from_slice(bytes);
        Ok(())
    }

    /// Wake the reader. Needed with `WakeupStrategy::NoWakeup`.
    pub fn notify(&self) -> Result<()> {
        self.shared.signal()
    }
}

impl Drop for RingProducer {
    fn drop(&mut self) {
        self.shared.detach_producer();
    }
}

/// Space reserved for one record. Committed when dropped.
pub struct Reservation<'a> {
    header: &'a RecordHeader,
    data: &'a mut [u8],
    shared: &'a Shared,
    discarded: bool,
}

impl Reservation<'_> {
    /// Give the slot back without publishing it; the reader skips it.
    pub fn discard(mut self) {
        self.header.discard();
        self.discarded = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.discarded {
            self.header.commit();
            METRICS.record_produced();
        }
        if self.shared.wakeup() == WakeupStrategy::Forced {
            let _ = self.shared.signal();
        }
    }
}

impl Deref for Reservation<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl DerefMut for Reservation<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use crate::error::RingError;
    use crate::ringbuf::{ page_size, RawRecord, RingBuf, RingConfig };

    fn small_ring() -> RingBuf {
        RingBuf::new(RingConfig::new(page_size()).unwrap()).unwrap()
    }

    #[test]
    fn test_fills_to_exact_capacity() {
        let ring = small_ring();
        let mut producer = ring.producer().unwrap();

        // 64-byte records frame to 72 bytes.
        let slots = ring.capacity() / 72;
        for _ in 0..slots {
            producer.write(&[7u8; 64]).unwrap();
        }
        let left = ring.capacity() - slots * 72;
        assert_eq!(producer.free_bytes(), left);

        let err = producer.write(&[7u8; 64]).unwrap_err();
        assert!(err.is_full());
        assert!(matches!(err, RingError::InsufficientSpace { needed: 72, free } if free == left));
    }

    #[test]
    fn test_rejects_oversized_record() {
        let ring = small_ring();
        let mut producer = ring.producer().unwrap();
        let capacity = ring.capacity();
        assert!(matches!(producer.reserve(capacity), Err(RingError::InvalidRecordSize(n)) if n == capacity));
        assert!(producer.reserve(capacity - 8).is_ok());
    }

    #[test]
    fn test_discarded_record_is_skipped() {
        let ring = small_ring();
        let mut producer = ring.producer().unwrap();
        let mut reader = ring.reader().unwrap();

        producer.reserve(16).unwrap().discard();
        producer.write(b"kept").unwrap();

        let mut record = RawRecord::new();
        reader.read_into(&mut record).unwrap();
        assert_eq!(record.as_bytes(), b"kept");
        assert_eq!(reader.pending_bytes(), 0);
    }

    #[test]
    fn test_reader_stops_at_busy_record() {
        let ring = small_ring();
        let mut producer = ring.producer().unwrap();
        let reader = ring.reader().unwrap();

        let mut reservation = producer.reserve(8).unwrap();
        reservation.copy_from_slice(&[1; 8]);
        assert!(!reader.ready());
        drop(reservation);
        assert!(reader.ready());
    }

    #[test]
    fn test_space_returns_after_read() {
        let ring = small_ring();
        let mut producer = ring.producer().unwrap();
        let mut reader = ring.reader().unwrap();
        let mut record = RawRecord::new();

        // Several laps around the ring, including records straddling the wrap.
        for i in 0..1000u32 {
            let payload = [(i % 256) as u8; 100];
            producer.write(&payload).unwrap();
            reader.read_into(&mut record).unwrap();
            assert_eq!(record.as_bytes(), &payload[..]);
        }
        assert_eq!(producer.free_bytes(), ring.capacity());
    }
}
