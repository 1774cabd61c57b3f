use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use nix::errno::Errno;
use nix::sys::epoll::{ Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout };
use tracing::trace;

use super::header::{ framed_len, BUSY_FLAG, CONTROL_CLOSED, CONTROL_FLUSH, DISCARD_FLAG, HEADER_SIZE };
use super::Shared;
use crate::error::{ LayoutError, ReadError, Result };
use crate::layout::Record;
use crate::metrics::METRICS;

const NOTIFY_TOKEN: u64 = 0;

/// Owned copy of one sample, reused across reads.
#[derive(Debug, Default, Clone)]
pub struct RawRecord {
    buf: Vec<u8>,
    remaining: usize,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            remaining: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes still unread in the ring right after this record was taken.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

/// Next committed record: its sample length and framed size.
#[derive(Debug, Clone, Copy)]
struct Ready {
    len: usize,
    total: u64,
}

/// The single reader of a ring buffer.
pub struct RingReader {
    shared: Arc<Shared>,
    pos: u64,
    deadline: Option<Instant>,
    epoll: Epoll,
    events: [EpollEvent; 1],
}

impl RingReader {
    pub(crate) fn new(shared: Arc<Shared>) -> Result<Self> {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)?;
        epoll.add(shared.eventfd(), EpollEvent::new(EpollFlags::EPOLLIN, NOTIFY_TOKEN))?;
        let pos = shared.metadata().consumer_pos();

        Ok(Self {
            shared,
            pos,
            deadline: None,
            epoll,
            events: [EpollEvent::empty()],
        })
    }

    /// Data region size in bytes.
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Arm (`Some`) or clear (`None`) the wait deadline for blocking reads.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether a committed record can be read without waiting.
    pub fn ready(&self) -> bool {
        self.scan().1.is_some()
    }

    /// Bytes reserved by the producer past the read position, busy records included.
    pub fn pending_bytes(&self) -> usize {
        (self.shared.metadata().producer_pos() - self.pos) as usize
    }

    /// Drop every committed record without reading it. Returns the number skipped.
    pub fn discard_pending(&mut self) -> u64 {
        let mut skipped = 0;
        while let Some(ready) = self.next_ready() {
            self.advance(ready.total);
            skipped += 1;
        }
        if skipped > 0 {
            trace!(skipped, "discarded stale records");
        }
        skipped
    }

    // ===== Reader API =====

    /// Copy the next sample into `record`, blocking until one is committed.
    pub fn read_into(&mut self, record: &mut RawRecord) -> std::result::Result<(), ReadError> {
        loop {
            if let Some(ready) = self.next_ready() {
                let sample = unsafe {
                    std::slice::from_raw_parts(
                        self.shared.data_at(self.pos + (HEADER_SIZE as u64)),
                        ready.len
                    )
                };
                record.buf.clear();
                record.buf.extend_from_slice(sample);

                METRICS.record_consumed(ready.len as u64);
                self.advance(ready.total);
                record.remaining = self.pending_bytes();
                return Ok(());
            }
            self.wait()?;
        }
    }

    /// Borrow the next sample in place, blocking until one is committed.
    ///
    /// The slot stays reserved for the reader until the view is released.
    pub fn peek(&mut self) -> std::result::Result<View<'_>, ReadError> {
        loop {
            if let Some(ready) = self.next_ready() {
                METRICS.record_consumed(ready.len as u64);
                return Ok(View {
                    pos: self.pos,
                    len: ready.len,
                    total: ready.total,
                    reader: self,
                });
            }
            self.wait()?;
        }
    }

    /// Walk past discarded records from the read position without moving it.
    fn scan(&self) -> (u64, Option<Ready>) {
        let producer_pos = self.shared.metadata().producer_pos();
        let mut pos = self.pos;

        while pos < producer_pos {
            let (len, flags) = self.shared.header_at(pos).len_and_flags();
            if flags & BUSY_FLAG != 0 {
                break;
            }
            let total = framed_len(len as usize) as u64;
            if flags & DISCARD_FLAG != 0 {
                pos += total;
                continue;
            }
            return (pos, Some(Ready { len: len as usize, total }));
        }
        (pos, None)
    }

    fn next_ready(&mut self) -> Option<Ready> {
        let (pos, ready) = self.scan();
        if pos != self.pos {
            self.pos = pos;
            self.publish();
        }
        ready
    }

    #[inline]
    fn advance(&mut self, total: u64) {
        self.pos += total;
        self.publish();
    }

    #[inline]
    fn publish(&self) {
        self.shared.metadata().consumer.pos.store(self.pos, Ordering::Release);
    }

    /// Block until the producer signals, the deadline passes or a control bit is set.
    fn wait(&mut self) -> std::result::Result<(), ReadError> {
        let now = Instant::now();
        if let Some(deadline) = self.deadline {
            if now >= deadline {
                return Err(ReadError::DeadlineExceeded);
            }
        }

        let meta = self.shared.metadata();
        if meta.has_control(CONTROL_CLOSED) {
            return Err(ReadError::Closed);
        }
        if meta.take_control(CONTROL_FLUSH) {
            return Err(ReadError::Flushed);
        }

        let timeout_ms = match self.deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(now);
                left.as_micros().div_ceil(1000).min(u16::MAX as u128) as u16
            }
            None => u16::MAX,
        };

        match self.epoll.wait(&mut self.events, EpollTimeout::from(timeout_ms)) {
            Ok(_) | Err(Errno::EINTR) => {}
            Err(e) => {
                return Err(e.into());
            }
        }

        // Non-blocking; EAGAIN just means nothing was pending.
        let _ = self.shared.eventfd().read();
        Ok(())
    }
}

impl Drop for RingReader {
    fn drop(&mut self) {
        self.shared.detach_reader();
    }
}

/// Zero-copy window over one committed sample.
///
/// The slot is handed back to the producer when the view is released or dropped,
/// and the borrow of the reader keeps at most one view alive.
pub struct View<'a> {
    reader: &'a mut RingReader,
    pos: u64,
    len: usize,
    total: u64,
}

impl View<'_> {
    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(
                self.reader.shared.data_at(self.pos + (HEADER_SIZE as u64)),
                self.len
            )
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Typed borrow of the sample; fails unless the length matches `R` exactly.
    pub fn record<R: Record>(&self) -> std::result::Result<&R, LayoutError> {
        R::view(self.as_bytes())
    }

    /// Hand the slot back to the producer.
    pub fn release(self) {}
}

impl Drop for View<'_> {
    fn drop(&mut self) {
        self.reader.advance(self.total);
    }
}
