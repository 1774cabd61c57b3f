//! Shared single-producer ring buffer of variable-length framed records.
//!
//! - `RingBuf` - owns the mapping and hands out one producer and one reader
//! - `RingProducer` / `Reservation` - reserve, fill, commit (or discard)
//! - `RingReader` / `View` - copy-read or borrow the next committed record
//!
//! Positions are monotonically increasing byte offsets; the data region is mapped
//! twice so a record is always one contiguous slice even across the wrap.

mod header;
mod memory;
pub mod producer;
pub mod reader;

pub use producer::{ RingProducer, Reservation };
pub use reader::{ RawRecord, RingReader, View };
pub use memory::page_size;

use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::eventfd::{ EfdFlags, EventFd };
use tracing::debug;

use crate::constants::DEFAULT_RING_CAPACITY;
use crate::error::{ Result, RingError };
use header::{ Metadata, RecordHeader, CONTROL_CLOSED, CONTROL_FLUSH };
use memory::Memory;

/// When a committed record wakes a blocked reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WakeupStrategy {
    /// Every commit signals the reader
    #[default]
    Forced,
    /// The producer calls `RingProducer::notify` itself, usually once per batch
    NoWakeup,
}

/// Configuration for a shared ring buffer
#[derive(Debug, Clone)]
pub struct RingConfig {
    /// Data region size in bytes (power of 2, at least one page)
    pub capacity: usize,
    pub wakeup: WakeupStrategy,
}

impl RingConfig {
    pub fn new(capacity: usize) -> Result<Self> {
        if !capacity.is_power_of_two() {
            return Err(RingError::config("Capacity must be a power of 2"));
        }
        if capacity > (u32::MAX as usize) + 1 {
            return Err(RingError::config("Capacity must not exceed 4 GiB"));
        }
        Ok(Self {
            capacity,
            wakeup: WakeupStrategy::default(),
        })
    }

    pub fn with_wakeup(mut self, wakeup: WakeupStrategy) -> Self {
        self.wakeup = wakeup;
        self
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RING_CAPACITY,
            wakeup: WakeupStrategy::default(),
        }
    }
}

pub(crate) struct Shared {
    memory: Memory,
    notify: EventFd,
    wakeup: WakeupStrategy,
    reader_attached: AtomicBool,
    producer_attached: AtomicBool,
}

impl Shared {
    #[inline(always)]
    pub(crate) fn metadata(&self) -> &Metadata {
        unsafe { &*(self.memory.metadata_ptr() as *const Metadata) }
    }

    #[inline(always)]
    pub(crate) fn capacity(&self) -> usize {
        self.memory.capacity()
    }

    #[inline(always)]
    fn offset(&self, pos: u64) -> usize {
        (pos as usize) & (self.memory.capacity() - 1)
    }

    /// Header of the record starting at `pos`.
    #[inline(always)]
    pub(crate) fn header_at(&self, pos: u64) -> &RecordHeader {
        unsafe { &*(self.memory.data_ptr().add(self.offset(pos)) as *const RecordHeader) }
    }

    /// Pointer to byte `pos` of the ring; valid for up to `capacity` bytes.
    #[inline(always)]
    pub(crate) fn data_at(&self, pos: u64) -> *mut u8 {
        unsafe { self.memory.data_ptr().add(self.offset(pos)) }
    }

    pub(crate) fn wakeup(&self) -> WakeupStrategy {
        self.wakeup
    }

    pub(crate) fn eventfd(&self) -> &EventFd {
        &self.notify
    }

    pub(crate) fn signal(&self) -> Result<()> {
        match self.notify.write(1) {
            // Counter saturated; the reader already has a pending wakeup.
            Ok(_) | Err(Errno::EAGAIN) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn detach_reader(&self) {
        self.reader_attached.store(false, Ordering::Release);
    }

    pub(crate) fn detach_producer(&self) {
        self.producer_attached.store(false, Ordering::Release);
    }
}

/// Owner of the shared mapping. Cheap to clone; every clone refers to the same ring.
#[derive(Clone)]
pub struct RingBuf {
    shared: Arc<Shared>,
}

impl RingBuf {
    pub fn new(config: RingConfig) -> Result<Self> {
        let memory = Memory::new(config.capacity)?;
        if std::mem::size_of::<Metadata>() > memory.page_size() {
            return Err(RingError::config("Metadata does not fit in one page"));
        }
        unsafe {
            (memory.metadata_ptr() as *mut Metadata).write(Metadata::new());
        }

        let notify = EventFd::from_value_and_flags(0, EfdFlags::EFD_CLOEXEC | EfdFlags::EFD_NONBLOCK)?;

        debug!(capacity = config.capacity, wakeup = ?config.wakeup, "ring buffer created");

        Ok(Self {
            shared: Arc::new(Shared {
                memory,
                notify,
                wakeup: config.wakeup,
                reader_attached: AtomicBool::new(false),
                producer_attached: AtomicBool::new(false),
            }),
        })
    }

    /// Data region size in bytes.
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Attach the single producer. Fails while another producer handle is alive.
    pub fn producer(&self) -> Result<RingProducer> {
        if self.shared.producer_attached.swap(true, Ordering::AcqRel) {
            return Err(RingError::AlreadyAttached { role: "producer" });
        }
        Ok(RingProducer::new(Arc::clone(&self.shared)))
    }

    /// Attach the single reader. Fails while another reader handle is alive.
    pub fn reader(&self) -> Result<RingReader> {
        if self.shared.reader_attached.swap(true, Ordering::AcqRel) {
            return Err(RingError::AlreadyAttached { role: "reader" });
        }
        match RingReader::new(Arc::clone(&self.shared)) {
            Ok(reader) => Ok(reader),
            Err(e) => {
                self.shared.detach_reader();
                Err(e)
            }
        }
    }

    /// Mark the ring closed. A waiting reader sees `ReadError::Closed` until `reopen`.
    pub fn close(&self) -> Result<()> {
        self.shared.metadata().set_control(CONTROL_CLOSED);
        debug!("ring buffer closed");
        self.shared.signal()
    }

    pub fn reopen(&self) -> Result<()> {
        self.shared.metadata().clear_control(CONTROL_CLOSED);
        debug!("ring buffer reopened");
        self.shared.signal()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.metadata().has_control(CONTROL_CLOSED)
    }

    /// Wake the reader once with `ReadError::Flushed`.
    pub fn flush(&self) -> Result<()> {
        self.shared.metadata().set_control(CONTROL_FLUSH);
        self.shared.signal()
    }

    /// Bytes reserved by the producer and not yet released by the reader.
    pub fn used_bytes(&self) -> u64 {
        let meta = self.shared.metadata();
        meta.producer_pos() - meta.consumer_pos()
    }
}

impl std::fmt::Debug for RingBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuf")
            .field("capacity", &self.capacity())
            .field("used", &self.used_bytes())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReadError;
    use rstest::*;
    use std::time::{ Duration, Instant };

    #[fixture]
    fn ring() -> RingBuf {
        RingBuf::new(RingConfig::new(memory::page_size()).unwrap()).unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(RingConfig::new(1000).is_err());
        assert!(RingConfig::new(4096).is_ok());
        assert_eq!(RingConfig::default().capacity, DEFAULT_RING_CAPACITY);
        let config = RingConfig::new(4096).unwrap().with_wakeup(WakeupStrategy::NoWakeup);
        assert_eq!(config.wakeup, WakeupStrategy::NoWakeup);
    }

    #[rstest]
    fn test_single_producer_and_reader(ring: RingBuf) {
        let producer = ring.producer().unwrap();
        assert!(matches!(ring.producer(), Err(RingError::AlreadyAttached { role: "producer" })));
        drop(producer);
        assert!(ring.producer().is_ok());

        let reader = ring.reader().unwrap();
        assert!(matches!(ring.reader(), Err(RingError::AlreadyAttached { role: "reader" })));
        drop(reader);
        assert!(ring.reader().is_ok());
    }

    #[rstest]
    fn test_close_is_reported_until_reopen(ring: RingBuf) {
        let mut reader = ring.reader().unwrap();
        let mut record = RawRecord::new();

        ring.close().unwrap();
        assert!(ring.is_closed());
        reader.set_deadline(Some(Instant::now() + Duration::from_millis(50)));
        assert!(matches!(reader.read_into(&mut record), Err(ReadError::Closed)));
        assert!(matches!(reader.read_into(&mut record), Err(ReadError::Closed)));

        ring.reopen().unwrap();
        assert!(!ring.is_closed());
        reader.set_deadline(Some(Instant::now() + Duration::from_millis(5)));
        assert!(matches!(reader.read_into(&mut record), Err(ReadError::DeadlineExceeded)));
    }

    #[rstest]
    fn test_flush_is_reported_once(ring: RingBuf) {
        let mut reader = ring.reader().unwrap();
        let mut record = RawRecord::new();

        ring.flush().unwrap();
        reader.set_deadline(Some(Instant::now() + Duration::from_millis(5)));
        assert!(matches!(reader.read_into(&mut record), Err(ReadError::Flushed)));
        assert!(matches!(reader.read_into(&mut record), Err(ReadError::DeadlineExceeded)));
    }

    #[rstest]
    fn test_used_bytes_tracks_positions(ring: RingBuf) {
        let mut producer = ring.producer().unwrap();
        let mut reader = ring.reader().unwrap();
        let mut record = RawRecord::new();

        producer.write(&[1u8; 64]).unwrap();
        assert_eq!(ring.used_bytes(), 72);

        reader.read_into(&mut record).unwrap();
        assert_eq!(ring.used_bytes(), 0);
    }
}
