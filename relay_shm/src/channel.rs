//! Shared-memory ring channel.
//!
//! Writers serialize on `<name>_write` around "copy record into slot, advance
//! write cursor". Readers serialize on `<name>_read` around the scan of
//! `[local cursor, write cursor)`. Each attachment runs one poller thread that
//! scans, hands new records from other participants to the delivery callback,
//! and sleeps for the configured interval.
//!
//! Delivery is best effort. Writers never wait for readers: once the ring
//! wraps, unread slots are overwritten. A reader that falls more than
//! `CHANNEL_CAPACITY` records behind skips ahead to the oldest slot still
//! intact instead of delivering overwritten data under old indices.

use crate::config::ChannelConfig;
use crate::error::{ShmError, ShmResult};
use crate::region::{SharedRegion, posix_name, unlink_region};
use crate::semaphore::NamedSemaphore;
use relay_common::consts::CHANNEL_CAPACITY;
use relay_common::message::Message;
use relay_common::text::{DisplayName, display_name};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering, fence};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Records collected by one scan.
pub type Batch = heapless::Vec<Message, CHANNEL_CAPACITY>;

/// Name of the writer semaphore for channel `name`.
pub fn write_sem_name(name: &str) -> String {
    format!("{}_write", name.trim_start_matches('/'))
}

/// Name of the read-scan semaphore for channel `name`.
pub fn read_sem_name(name: &str) -> String {
    format!("{}_read", name.trim_start_matches('/'))
}

/// Region plus the two semaphores guarding it.
struct Ring {
    name: String,
    identity: DisplayName,
    region: SharedRegion,
    write_sem: NamedSemaphore,
    read_sem: NamedSemaphore,
}

impl Ring {
    fn publish(&self, msg: &Message) -> ShmResult<u64> {
        let _guard = self.write_sem.acquire()?;
        let index = self.region.write_cursor();
        // SAFETY: write semaphore held.
        unsafe { self.region.push(index, msg) };
        Ok(index)
    }

    fn scan(&self, cursor: &mut u64) -> ShmResult<Batch> {
        let _guard = self.read_sem.acquire()?;
        let head = self.region.write_cursor();
        let mut batch = Batch::new();

        if head < *cursor {
            debug!(channel = %self.name, head, cursor = *cursor, "Write cursor moved back; resyncing");
            *cursor = head;
        }

        let oldest = head.saturating_sub(CHANNEL_CAPACITY as u64);
        if *cursor < oldest {
            warn!(
                channel = %self.name,
                skipped = oldest - *cursor,
                "Reader fell behind; overwritten messages skipped"
            );
            *cursor = oldest;
        }

        while *cursor < head {
            // SAFETY: read semaphore held.
            let msg = unsafe { self.region.load(*cursor) };

            // Writers do not take the read semaphore: once the write cursor
            // reaches `index + CHANNEL_CAPACITY` the slot may hold a newer record.
            fence(Ordering::Acquire);
            let intact = self
                .region
                .write_cursor()
                .saturating_sub(CHANNEL_CAPACITY as u64 - 1);
            if *cursor < intact {
                warn!(
                    channel = %self.name,
                    skipped = intact - *cursor,
                    "Ring lapped during scan; overwritten messages skipped"
                );
                *cursor = intact;
                continue;
            }
            *cursor += 1;

            if !msg.is_valid() || msg.sender.text_bytes() == self.identity.as_bytes() {
                continue;
            }
            if batch.push(msg).is_err() {
                break;
            }
        }

        self.region.advance_read_cursor(*cursor);
        Ok(batch)
    }
}

/// One process's attachment to a named channel.
///
/// Dropping the channel leaves it. Leaving never removes the backing objects;
/// use [`ShmChannel::unlink`] for that.
pub struct ShmChannel {
    ring: Arc<Ring>,
    stop: Arc<AtomicBool>,
    poller: Option<JoinHandle<()>>,
}

impl ShmChannel {
    /// Join channel `name` as `identity`.
    ///
    /// Opens or creates the region and both semaphores, then starts the poller.
    /// Only records written after this call are delivered to `on_message`;
    /// records whose sender equals `identity` are never delivered.
    ///
    /// # Errors
    ///
    /// Configuration errors (bad name, blank identity, zero poll interval) are
    /// returned before any resource is opened. Failing to open the region or a
    /// semaphore fails this join only.
    pub fn join<F>(
        name: &str,
        identity: &str,
        config: &ChannelConfig,
        on_message: F,
    ) -> ShmResult<Self>
    where
        F: FnMut(Message) + Send + 'static,
    {
        posix_name(name)?;
        if identity.trim().is_empty() {
            return Err(ShmError::EmptyIdentity);
        }
        config.validate()?;

        let region = SharedRegion::open_or_create(name)?;
        let write_sem = NamedSemaphore::open(&write_sem_name(name), 1)?;
        let read_sem = NamedSemaphore::open(&read_sem_name(name), 1)?;
        let start = region.write_cursor();

        let ring = Arc::new(Ring {
            name: name.to_string(),
            identity: display_name(identity),
            region,
            write_sem,
            read_sem,
        });
        let stop = Arc::new(AtomicBool::new(false));

        let poller = thread::Builder::new()
            .name(format!("shm-{}", name.trim_start_matches('/')))
            .spawn({
                let ring = Arc::clone(&ring);
                let stop = Arc::clone(&stop);
                let interval = config.poll_interval();
                move || poll_loop(ring, stop, start, interval, on_message)
            })?;

        info!(channel = name, identity = %ring.identity, cursor = start, "Joined channel");

        Ok(Self {
            ring,
            stop,
            poller: Some(poller),
        })
    }

    /// Write `text` as a record from this participant. Returns the record's index.
    pub fn send(&self, text: &str) -> ShmResult<u64> {
        let msg = Message::new(&self.ring.identity, text);
        if msg.body.is_empty() {
            return Err(ShmError::EmptyMessage);
        }
        self.ring.publish(&msg)
    }

    /// Write a pre-built record verbatim. Returns the record's index.
    pub fn publish(&self, msg: &Message) -> ShmResult<u64> {
        if msg.body.is_empty() {
            return Err(ShmError::EmptyMessage);
        }
        self.ring.publish(msg)
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.ring.name
    }

    /// Identity used as `sender` and for own-message filtering.
    pub fn identity(&self) -> &str {
        &self.ring.identity
    }

    /// Current `(write_cursor, read_cursor)` of the shared region.
    pub fn cursors(&self) -> (u64, u64) {
        (self.ring.region.write_cursor(), self.ring.region.read_cursor())
    }

    /// Stop the poller, wait for its current scan, and detach.
    pub fn leave(mut self) {
        self.shutdown();
    }

    /// Remove the region and both semaphores of channel `name`.
    ///
    /// Processes still attached keep their mappings; later joins create a
    /// fresh, zeroed channel. Every object is attempted; the first error is
    /// returned.
    pub fn unlink(name: &str) -> ShmResult<()> {
        let results = [
            unlink_region(name),
            NamedSemaphore::unlink(&write_sem_name(name)),
            NamedSemaphore::unlink(&read_sem_name(name)),
        ];
        results.into_iter().collect::<ShmResult<Vec<()>>>()?;
        info!(channel = name, "Channel unlinked");
        Ok(())
    }

    fn shutdown(&mut self) {
        let Some(poller) = self.poller.take() else {
            return;
        };

        self.stop.store(true, Ordering::Release);
        poller.thread().unpark();

        if poller.thread().id() == thread::current().id() {
            // leaving from inside the delivery callback; the loop exits after this scan
            return;
        }
        if poller.join().is_err() {
            warn!(channel = %self.ring.name, "Poller thread panicked");
        }
        info!(channel = %self.ring.name, identity = %self.ring.identity, "Left channel");
    }
}

impl Drop for ShmChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_loop<F>(ring: Arc<Ring>, stop: Arc<AtomicBool>, mut cursor: u64, interval: Duration, mut on_message: F)
where
    F: FnMut(Message),
{
    while !stop.load(Ordering::Acquire) {
        match ring.scan(&mut cursor) {
            Ok(batch) => {
                for msg in batch {
                    on_message(msg);
                }
            }
            Err(e) => warn!(channel = %ring.name, error = %e, "Channel scan failed"),
        }
        thread::park_timeout(interval);
    }
    debug!(channel = %ring.name, cursor, "Poller stopped");
}
