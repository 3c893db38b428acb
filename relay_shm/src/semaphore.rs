//! POSIX named semaphores.
//!
//! Any process opening the same name attaches to the same kernel object.
//! Both channel semaphores are created with an initial count of 1 and used as
//! cross-process mutexes. Closing a semaphore never removes it; removal is an
//! explicit [`NamedSemaphore::unlink`].

use crate::error::{ShmError, ShmResult};
use crate::region::{OBJECT_MODE, posix_name};
use std::ffi::CString;
use std::io;
use std::ptr::NonNull;
use tracing::{debug, warn};

/// Handle to an opened named semaphore.
#[derive(Debug)]
pub struct NamedSemaphore {
    name: String,
    sem: NonNull<libc::sem_t>,
}

// SAFETY: sem_wait/sem_post/sem_close are thread-safe on a valid handle.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Open the semaphore `name`, creating it with `initial` if it does not exist.
    ///
    /// The initial value only applies on creation; an existing semaphore keeps
    /// its current count.
    pub fn open(name: &str, initial: u32) -> ShmResult<Self> {
        let c_name = c_name(name)?;

        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT,
                OBJECT_MODE as libc::c_uint,
                initial as libc::c_uint,
            )
        };

        if sem == libc::SEM_FAILED {
            return Err(ShmError::Semaphore {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        let sem = NonNull::new(sem).ok_or_else(|| ShmError::Semaphore {
            name: name.to_string(),
            source: io::Error::other("sem_open returned null"),
        })?;

        debug!(semaphore = name, "Semaphore opened");
        Ok(Self {
            name: name.to_string(),
            sem,
        })
    }

    /// Semaphore name (without the leading slash).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decrement the semaphore, blocking while it is zero.
    ///
    /// Interrupted waits are retried. The returned guard posts on drop.
    pub fn acquire(&self) -> ShmResult<SemaphoreGuard<'_>> {
        loop {
            if unsafe { libc::sem_wait(self.sem.as_ptr()) } == 0 {
                return Ok(SemaphoreGuard { sem: self });
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(self.error(err));
            }
        }
    }

    /// Increment the semaphore.
    pub fn release(&self) -> ShmResult<()> {
        if unsafe { libc::sem_post(self.sem.as_ptr()) } == 0 {
            Ok(())
        } else {
            Err(self.error(io::Error::last_os_error()))
        }
    }

    /// Current count.
    pub fn value(&self) -> ShmResult<i32> {
        let mut value: libc::c_int = 0;
        if unsafe { libc::sem_getvalue(self.sem.as_ptr(), &mut value) } == 0 {
            Ok(value)
        } else {
            Err(self.error(io::Error::last_os_error()))
        }
    }

    /// Remove the semaphore name from the system. Missing names are not an error.
    pub fn unlink(name: &str) -> ShmResult<()> {
        let c_name = c_name(name)?;
        if unsafe { libc::sem_unlink(c_name.as_ptr()) } == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::NotFound {
            Ok(())
        } else {
            Err(ShmError::Semaphore {
                name: name.to_string(),
                source: err,
            })
        }
    }

    fn error(&self, source: io::Error) -> ShmError {
        ShmError::Semaphore {
            name: self.name.clone(),
            source,
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        if unsafe { libc::sem_close(self.sem.as_ptr()) } != 0 {
            warn!(
                semaphore = %self.name,
                error = %io::Error::last_os_error(),
                "sem_close failed"
            );
        }
    }
}

/// Held semaphore; posts when dropped.
#[must_use = "the semaphore is released as soon as the guard is dropped"]
pub struct SemaphoreGuard<'a> {
    sem: &'a NamedSemaphore,
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.sem.release() {
            warn!(error = %e, "Failed to release semaphore");
        }
    }
}

fn c_name(name: &str) -> ShmResult<CString> {
    CString::new(posix_name(name)?).map_err(|_| ShmError::InvalidName {
        name: name.to_string(),
    })
}
