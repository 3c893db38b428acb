//! Mapped ring region.
//!
//! Layout of the backing object (native endianness, no header):
//!
//! ```text
//! ┌──────────────────────────────┬──────────────┬─────────────┐
//! │ slots: [Message; 64]         │ write_cursor │ read_cursor │
//! │ 64 × 576 bytes               │ u64          │ u64         │
//! └──────────────────────────────┴──────────────┴─────────────┘
//! ```
//!
//! Cursors grow without bound; the physical slot of index `i` is
//! `i % CHANNEL_CAPACITY`. The region carries no magic or version field, so
//! every attached process must be built with the same record size and
//! capacity. Attaching checks the object size and refuses a mismatch.

use crate::error::{ShmError, ShmResult};
use memmap2::{MmapMut, MmapOptions};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use relay_common::consts::{CHANNEL_CAPACITY, MESSAGE_SIZE};
use relay_common::message::Message;
use static_assertions::const_assert_eq;
use std::fs::File;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Longest accepted channel name. Leaves room for the `_write` suffix and the
/// `sem.` prefix glibc adds under `/dev/shm`.
pub const MAX_NAME_LEN: usize = 200;

/// In-memory layout of a channel region.
#[repr(C)]
pub struct RingLayout {
    /// Ring of record slots.
    pub slots: [Message; CHANNEL_CAPACITY],
    /// Index of the next slot to be written.
    pub write_cursor: AtomicU64,
    /// Highest index any reader has scanned up to.
    pub read_cursor: AtomicU64,
}

/// Permissions for every object a channel creates: the region and both
/// semaphores.
pub const OBJECT_MODE: libc::mode_t = 0o600;

/// Byte size of the backing object.
pub const REGION_SIZE: usize = core::mem::size_of::<RingLayout>();

const_assert_eq!(REGION_SIZE, CHANNEL_CAPACITY * MESSAGE_SIZE + 2 * 8);

/// A channel region mapped into this process.
pub struct SharedRegion {
    name: String,
    layout: NonNull<RingLayout>,
    created: bool,
    _mmap: MmapMut,
}

// SAFETY: slots are only touched under the channel semaphores and the cursors
// are atomics; the mapping lives as long as the struct.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Open the region `name`, creating it if it does not exist.
    ///
    /// A new object is sized with `ftruncate`, which zero-fills it, so both
    /// cursors start at 0. An existing object keeps its cursors.
    pub fn open_or_create(name: &str) -> ShmResult<Self> {
        let path = posix_name(name)?;

        let fd = shm_open(
            path.as_str(),
            OFlag::O_CREAT | OFlag::O_RDWR,
            Mode::from_bits_truncate(OBJECT_MODE),
        )?;
        let file = File::from(fd);

        let found = file.metadata()?.len() as usize;
        let created = match found {
            0 => {
                file.set_len(REGION_SIZE as u64)?;
                true
            }
            n if n == REGION_SIZE => false,
            n => {
                return Err(ShmError::LayoutMismatch {
                    name: name.to_string(),
                    expected: REGION_SIZE,
                    found: n,
                });
            }
        };

        let mut mmap = unsafe { MmapOptions::new().len(REGION_SIZE).map_mut(&file)? };
        let layout = NonNull::new(mmap.as_mut_ptr() as *mut RingLayout).ok_or_else(|| {
            ShmError::Io {
                source: std::io::Error::other("mmap returned null"),
            }
        })?;

        if created {
            info!(channel = name, size = REGION_SIZE, "Channel region created");
        } else {
            debug!(channel = name, "Attached to existing channel region");
        }

        Ok(Self {
            name: name.to_string(),
            layout,
            created,
            _mmap: mmap,
        })
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` if this call created the backing object.
    pub fn was_created(&self) -> bool {
        self.created
    }

    /// Current write cursor.
    pub fn write_cursor(&self) -> u64 {
        self.write_cursor_atomic().load(Ordering::Acquire)
    }

    /// Current shared read cursor.
    pub fn read_cursor(&self) -> u64 {
        self.read_cursor_atomic().load(Ordering::Acquire)
    }

    /// Copy `msg` into the slot for `index` and publish `index + 1` as the new
    /// write cursor.
    ///
    /// # Safety
    ///
    /// The caller must hold the channel's write semaphore.
    pub unsafe fn push(&self, index: u64, msg: &Message) {
        let slot = self.slot_ptr(index);
        unsafe { std::ptr::write_volatile(slot, *msg) };
        self.write_cursor_atomic().store(index + 1, Ordering::Release);
    }

    /// Copy the slot for `index` out of the region.
    ///
    /// # Safety
    ///
    /// The caller must hold the channel's read semaphore.
    pub unsafe fn load(&self, index: u64) -> Message {
        unsafe { std::ptr::read_volatile(self.slot_ptr(index)) }
    }

    /// Raise the shared read cursor to `index` if it is behind.
    pub fn advance_read_cursor(&self, index: u64) {
        self.read_cursor_atomic().fetch_max(index, Ordering::AcqRel);
    }

    fn write_cursor_atomic(&self) -> &AtomicU64 {
        unsafe { &*std::ptr::addr_of!((*self.layout.as_ptr()).write_cursor) }
    }

    fn read_cursor_atomic(&self) -> &AtomicU64 {
        unsafe { &*std::ptr::addr_of!((*self.layout.as_ptr()).read_cursor) }
    }

    fn slot_ptr(&self, index: u64) -> *mut Message {
        let slot = (index % CHANNEL_CAPACITY as u64) as usize;
        unsafe {
            std::ptr::addr_of_mut!((*self.layout.as_ptr()).slots)
                .cast::<Message>()
                .add(slot)
        }
    }
}

/// Remove the backing object of `name`. Missing objects are not an error.
pub fn unlink_region(name: &str) -> ShmResult<()> {
    match shm_unlink(posix_name(name)?.as_str()) {
        Ok(()) | Err(Errno::ENOENT) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// POSIX object name (`/name`) for a channel name.
///
/// A single leading slash is accepted and ignored. The rest must be non-empty,
/// at most [`MAX_NAME_LEN`] bytes, and free of `/` and NUL.
pub fn posix_name(name: &str) -> ShmResult<String> {
    let bare = name.strip_prefix('/').unwrap_or(name);
    if bare.is_empty() || bare.len() > MAX_NAME_LEN || bare.contains(['/', '\0']) {
        return Err(ShmError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(format!("/{bare}"))
}
