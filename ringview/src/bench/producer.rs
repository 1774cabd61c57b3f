//! Record sources a benchmark run can trigger.

use thiserror::Error;
use tracing::debug;

use crate::constants::MAX_TRIGGER_REPEAT;
use crate::error::RingError;
use crate::layout::SkbMeta;
use crate::ringbuf::RingProducer;

#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("invalid repeat count {repeat}: must be between 1 and {max}")]
    InvalidRepeat { repeat: u64, max: u64 },

    #[error("ring write failed after {written}/{requested} records: {source}")]
    Ring {
        written: u64,
        requested: u64,
        #[source]
        source: RingError,
    },

    #[error("producer unavailable: {0}")]
    Unavailable(String),
}

/// Something that can be told "emit exactly `repeat` records" for a payload.
///
/// `trigger` returns once every record is written, or fails.
pub trait Producer {
    fn trigger(&mut self, payload: &[u8], repeat: u64) -> Result<(), ProducerError>;
}

/// Repeat counts outside `1..=MAX_TRIGGER_REPEAT` are refused before any write.
pub fn check_repeat(repeat: u64) -> Result<(), ProducerError> {
    if repeat == 0 || repeat > MAX_TRIGGER_REPEAT {
        return Err(ProducerError::InvalidRepeat { repeat, max: MAX_TRIGGER_REPEAT });
    }
    Ok(())
}

/// Pseudo socket-buffer addresses start here
pub const DEFAULT_BASE_ADDRESS: u64 = 0xffff_8880_0100_0000;
/// Distance between consecutive pseudo addresses
pub const DEFAULT_ADDRESS_STRIDE: u64 = 0x100;

const ETH_TYPE_OFFSET: usize = 12;
const LOOPBACK_IFINDEX: u32 = 1;

/// In-process stand-in for a packet program: one `SkbMeta` per repetition.
///
/// The record sequence depends only on the payload and the repetition index,
/// so every trigger with the same payload yields the same checksum.
pub struct SyntheticProducer {
    ring: RingProducer,
    base_address: u64,
    stride: u64,
}

impl SyntheticProducer {
    pub fn new(ring: RingProducer) -> Self {
        Self {
            ring,
            base_address: DEFAULT_BASE_ADDRESS,
            stride: DEFAULT_ADDRESS_STRIDE,
        }
    }

    pub fn with_addresses(mut self, base_address: u64, stride: u64) -> Self {
        self.base_address = base_address;
        self.stride = stride;
        self
    }

    /// Record emitted for repetition `index` of `payload`.
    pub fn record_for(&self, payload: &[u8], index: u64) -> SkbMeta {
        let protocol = payload
            .get(ETH_TYPE_OFFSET..ETH_TYPE_OFFSET + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .unwrap_or(0);

        let mut cb = [0u32; 5];
        for (word, chunk) in cb.iter_mut().zip(payload.chunks(4)) {
            let mut bytes = [0u8; 4];
            bytes[..chunk.len()].copy_from_slice(chunk);
            *word = u32::from_le_bytes(bytes);
        }

        SkbMeta {
            address: self.base_address.wrapping_add(index.wrapping_mul(self.stride)),
            len: payload.len() as u32,
            ingress_ifindex: LOOPBACK_IFINDEX,
            ifindex: LOOPBACK_IFINDEX,
            protocol,
            cb,
            ..Default::default()
        }
    }

    pub fn ring_mut(&mut self) -> &mut RingProducer {
        &mut self.ring
    }
}

impl Producer for SyntheticProducer {
    fn trigger(&mut self, payload: &[u8], repeat: u64) -> Result<(), ProducerError> {
        check_repeat(repeat)?;

        for index in 0..repeat {
            let record = self.record_for(payload, index);
            self.ring
                .write(bytemuck::bytes_of(&record))
                .map_err(|source| ProducerError::Ring {
                    written: index,
                    requested: repeat,
                    source,
                })?;
        }
        // Records are written without per-record wakeups; one notify covers the batch.
        self.ring.notify().map_err(|source| ProducerError::Ring {
            written: repeat,
            requested: repeat,
            source,
        })?;

        debug!(repeat, payload_len = payload.len(), "producer triggered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ Checksum, Record, SlotLayout };
    use crate::ringbuf::{ page_size, RawRecord, RingBuf, RingConfig, WakeupStrategy };

    fn ring() -> RingBuf {
        let config = RingConfig::new(page_size()).unwrap().with_wakeup(WakeupStrategy::NoWakeup);
        RingBuf::new(config).unwrap()
    }

    #[test]
    fn test_check_repeat() {
        assert!(check_repeat(1).is_ok());
        assert!(check_repeat(u32::MAX as u64).is_ok());
        assert!(matches!(check_repeat(0), Err(ProducerError::InvalidRepeat { repeat: 0, .. })));
        assert!(check_repeat(u32::MAX as u64 + 1).is_err());
    }

    #[test]
    fn test_record_for_parses_payload() {
        let ring = ring();
        let producer = SyntheticProducer::new(ring.producer().unwrap()).with_addresses(1000, 8);

        let mut payload = [0u8; 128];
        payload[12] = 0x08;
        payload[13] = 0x00;
        payload[0] = 0xAA;

        let record = producer.record_for(&payload, 3);
        assert_eq!(record.address, 1024);
        assert_eq!(record.len, 128);
        assert_eq!(record.protocol, 0x0800);
        assert_eq!(record.cb[0], 0xAA);
        assert_eq!(record.ifindex, 1);

        let short = producer.record_for(&[1, 2, 3], 0);
        assert_eq!(short.protocol, 0);
        assert_eq!(short.cb, [0x0003_0201, 0, 0, 0, 0]);
    }

    #[test]
    fn test_trigger_writes_exact_count() {
        let ring = ring();
        let mut producer = SyntheticProducer::new(ring.producer().unwrap());
        let mut reader = ring.reader().unwrap();
        let payload = [0u8; 128];

        producer.trigger(&payload, 10).unwrap();

        let mut expected = Checksum::default();
        for i in 0..10 {
            expected.absorb(producer.record_for(&payload, i).fold());
        }

        let mut actual = Checksum::default();
        let mut record = RawRecord::new();
        for _ in 0..10 {
            reader.read_into(&mut record).unwrap();
            actual.absorb(SkbMeta::read(record.as_bytes()).unwrap().fold());
        }
        assert_eq!(actual, expected);
        assert_eq!(reader.pending_bytes(), 0);
    }

    #[test]
    fn test_trigger_reports_partial_write_when_full() {
        let ring = ring();
        let mut producer = SyntheticProducer::new(ring.producer().unwrap());

        let slots = SlotLayout::of::<SkbMeta>().max_events(ring.capacity());

        let err = producer.trigger(&[0u8; 128], slots + 1).unwrap_err();
        assert!(
            matches!(
                err,
                ProducerError::Ring { written, requested, ref source }
                    if written == slots && requested == slots + 1 && source.is_full()
            )
        );
    }
}
