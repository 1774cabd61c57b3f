//! Shared metadata page and per-record headers.

use std::sync::atomic::{ AtomicU32, AtomicU64, Ordering };

use crate::constants::{ RECORD_ALIGN, RING_HEADER_SIZE };
use crate::layout::slot_size;

/// Cache-line padded position to prevent false sharing.
///
/// The producer writes `producer` and reads `consumer`; the reader does the opposite.
/// Keeping each on its own 128-byte line stops one side's stores from invalidating
/// the line the other side polls.
#[repr(C, align(128))]
pub(crate) struct PaddedPosition {
    pub(crate) pos: AtomicU64,
    _padding: [u8; 120], // 128 - 8 bytes for AtomicU64
}

impl PaddedPosition {
    pub(crate) fn new(initial: u64) -> Self {
        Self {
            pos: AtomicU64::new(initial),
            _padding: [0; 120],
        }
    }
}

/// Cache-line padded control word (closed / flush-pending bits).
#[repr(C, align(128))]
pub(crate) struct PaddedControl {
    pub(crate) bits: AtomicU32,
    _padding: [u8; 124],
}

impl PaddedControl {
    pub(crate) fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
            _padding: [0; 124],
        }
    }
}

pub(crate) const CONTROL_CLOSED: u32 = 1 << 0;
pub(crate) const CONTROL_FLUSH: u32 = 1 << 1;

/// Lives at the start of the shared mapping.
#[repr(C)]
pub(crate) struct Metadata {
    /// Bytes released by the reader
    pub(crate) consumer: PaddedPosition,
    /// Bytes reserved by the producer (committed or still busy)
    pub(crate) producer: PaddedPosition,
    pub(crate) control: PaddedControl,
}

impl Metadata {
    pub(crate) fn new() -> Self {
        Self {
            consumer: PaddedPosition::new(0),
            producer: PaddedPosition::new(0),
            control: PaddedControl::new(),
        }
    }

    pub(crate) fn consumer_pos(&self) -> u64 {
        self.consumer.pos.load(Ordering::Acquire)
    }

    pub(crate) fn producer_pos(&self) -> u64 {
        self.producer.pos.load(Ordering::Acquire)
    }

    pub(crate) fn set_control(&self, bit: u32) {
        self.control.bits.fetch_or(bit, Ordering::AcqRel);
    }

    pub(crate) fn clear_control(&self, bit: u32) {
        self.control.bits.fetch_and(!bit, Ordering::AcqRel);
    }

    pub(crate) fn has_control(&self, bit: u32) -> bool {
        self.control.bits.load(Ordering::Acquire) & bit != 0
    }

    /// Clears `bit`, returning whether it was set.
    pub(crate) fn take_control(&self, bit: u32) -> bool {
        self.control.bits.fetch_and(!bit, Ordering::AcqRel) & bit != 0
    }
}

/// 8-byte header in front of every record: length in the low word, flags in the high word.
#[repr(transparent)]
pub(crate) struct RecordHeader(AtomicU64);

pub(crate) const BUSY_FLAG: u32 = 1 << 31;
pub(crate) const DISCARD_FLAG: u32 = 1 << 30;
pub(crate) const HEADER_SIZE: usize = std::mem::size_of::<RecordHeader>();

impl RecordHeader {
    /// Marks the slot reserved; the reader stops here until commit or discard.
    #[inline(always)]
    pub(crate) fn reserve(&self, len: u32) {
        self.0.store((len as u64) | ((BUSY_FLAG as u64) << 32), Ordering::Release);
    }

    #[inline(always)]
    pub(crate) fn commit(&self) {
        let len = self.0.load(Ordering::Relaxed) as u32;
        self.0.store(len as u64, Ordering::Release);
    }

    #[inline(always)]
    pub(crate) fn discard(&self) {
        let len = self.0.load(Ordering::Relaxed) as u32;
        self.0.store((len as u64) | ((DISCARD_FLAG as u64) << 32), Ordering::Release);
    }

    #[inline(always)]
    pub(crate) fn len_and_flags(&self) -> (u32, u32) {
        let current = self.0.load(Ordering::Acquire);
        (current as u32, (current >> 32) as u32)
    }
}

/// Bytes one record of `len` occupies, header included.
#[inline(always)]
pub(crate) fn framed_len(len: usize) -> usize {
    slot_size(len, RECORD_ALIGN, HEADER_SIZE)
}

// `SlotLayout::of` describes this framing; the two must not drift apart.
const _: () = assert!(HEADER_SIZE == RING_HEADER_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_sizes() {
        assert_eq!(std::mem::size_of::<PaddedPosition>(), 128);
        assert_eq!(std::mem::size_of::<PaddedControl>(), 128);
        assert_eq!(std::mem::size_of::<Metadata>(), 384);
        assert_eq!(HEADER_SIZE, 8);
    }

    #[test]
    fn test_framed_len_matches_slot_layout() {
        use crate::layout::{ SkbMeta, SlotLayout };
        assert_eq!(framed_len(64), SlotLayout::of::<SkbMeta>().slot_size());
        assert_eq!(framed_len(60), 72);
        assert_eq!(framed_len(0), 8);
    }

    #[test]
    fn test_header_lifecycle() {
        let header = RecordHeader(AtomicU64::new(0));
        header.reserve(64);
        assert_eq!(header.len_and_flags(), (64, BUSY_FLAG));

        header.commit();
        assert_eq!(header.len_and_flags(), (64, 0));

        header.reserve(12);
        header.discard();
        assert_eq!(header.len_and_flags(), (12, DISCARD_FLAG));
    }

    #[test]
    fn test_framed_len() {
        assert_eq!(framed_len(64), 72);
        assert_eq!(framed_len(60), 72);
        assert_eq!(framed_len(0), 8);
        assert_eq!(framed_len(1), 16);
    }

    #[test]
    fn test_control_bits() {
        let meta = Metadata::new();
        assert!(!meta.has_control(CONTROL_CLOSED));
        meta.set_control(CONTROL_CLOSED);
        meta.set_control(CONTROL_FLUSH);
        assert!(meta.take_control(CONTROL_FLUSH));
        assert!(!meta.take_control(CONTROL_FLUSH));
        assert!(meta.has_control(CONTROL_CLOSED));
        meta.clear_control(CONTROL_CLOSED);
        assert!(!meta.has_control(CONTROL_CLOSED));
    }
}
