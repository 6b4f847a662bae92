//! Shared memory regions.
//!
//! Named or anonymous byte buffers with access-rights enforcement and
//! the same ref-counted duplicate/close lifetime as the sync kinds: the
//! region stays alive until the last owner closes, no matter which
//! wrapper performs the closes.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use spin::Mutex;

use crate::error::{KernelError, Result};
use crate::handle::{self, AccessFlags, CreateDisposition, HandleKind, KernelObject, RawHandle};
use crate::naming::{ResourceName, ResourceType};

/// Shared state of one memory region.
pub(crate) struct MemoryState {
    data: Mutex<Vec<u8>>,
    size: usize,
    access: AccessFlags,
}

impl MemoryState {
    pub(crate) fn new(size: usize, access: AccessFlags) -> Self {
        MemoryState {
            data: Mutex::new(vec![0u8; size]),
            size,
            access,
        }
    }
}

/// Shared memory wrapper.
pub struct KrnlSharedMem {
    handle: RawHandle,
    state: Option<Arc<MemoryState>>,
}

impl KrnlSharedMem {
    /// Allocate an anonymous, zero-filled region.
    pub fn new(size: usize, access: AccessFlags) -> Result<Self> {
        if size == 0 {
            return Err(KernelError::bad_parms());
        }
        let state = Arc::new(MemoryState::new(size, access));
        let id = handle::create_anonymous(KernelObject::Memory(state.clone()));
        Ok(KrnlSharedMem {
            handle: RawHandle::new(id, HandleKind::SharedMemory),
            state: Some(state),
        })
    }

    /// Create or open a named region per the disposition. Size and access
    /// apply only when the region is freshly created.
    pub fn create_named(
        name: &ResourceName,
        disposition: CreateDisposition,
        size: usize,
        access: AccessFlags,
    ) -> Result<(Self, bool)> {
        if size == 0 {
            return Err(KernelError::bad_parms());
        }
        let full = name.full_name(ResourceType::Memory);
        let (id, created, object) =
            handle::open_named(HandleKind::SharedMemory, &full, disposition, || {
                KernelObject::Memory(Arc::new(MemoryState::new(size, access)))
            })?;
        let state = match object {
            KernelObject::Memory(state) => state,
            _ => return Err(KernelError::invalid_handle()),
        };
        Ok((
            KrnlSharedMem {
                handle: RawHandle::new(id, HandleKind::SharedMemory),
                state: Some(state),
            },
            created,
        ))
    }

    fn state(&self) -> Result<&Arc<MemoryState>> {
        self.state.as_ref().ok_or_else(KernelError::invalid_handle)
    }

    /// Whether this wrapper is bound to a live region.
    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    /// The opaque handle.
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// Region size in bytes.
    pub fn size(&self) -> Result<usize> {
        Ok(self.state()?.size)
    }

    /// Access rights the region was created with.
    pub fn access(&self) -> Result<AccessFlags> {
        Ok(self.state()?.access)
    }

    /// Copy bytes out of the region at the given offset.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let state = self.state()?;
        if !state.access.contains(AccessFlags::READ) {
            return Err(KernelError::access_denied());
        }
        let end = offset
            .checked_add(buf.len())
            .ok_or_else(KernelError::index_range)?;
        if end > state.size {
            return Err(KernelError::index_range());
        }
        let data = state.data.lock();
        buf.copy_from_slice(&data[offset..end]);
        Ok(())
    }

    /// Copy bytes into the region at the given offset.
    pub fn write_at(&self, offset: usize, buf: &[u8]) -> Result<()> {
        let state = self.state()?;
        if !state.access.contains(AccessFlags::WRITE) {
            return Err(KernelError::access_denied());
        }
        let end = offset
            .checked_add(buf.len())
            .ok_or_else(KernelError::index_range)?;
        if end > state.size {
            return Err(KernelError::index_range());
        }
        let mut data = state.data.lock();
        data[offset..end].copy_from_slice(buf);
        Ok(())
    }

    /// Produce a second wrapper sharing the same region.
    pub fn duplicate(&self) -> Result<Self> {
        let state = self.state()?.clone();
        handle::duplicate(self.handle.id())?;
        Ok(KrnlSharedMem {
            handle: self.handle,
            state: Some(state),
        })
    }

    /// Release this wrapper's claim. Idempotent; the region is freed
    /// when the last owner closes.
    pub fn close(&mut self) -> Result<()> {
        if self.state.take().is_some() {
            handle::close(self.handle.id())?;
            self.handle.clear();
        }
        Ok(())
    }
}

impl Drop for KrnlSharedMem {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_round_trip() {
        let mem = KrnlSharedMem::new(64, AccessFlags::READ | AccessFlags::WRITE).unwrap();
        mem.write_at(8, b"platform").unwrap();
        let mut buf = [0u8; 8];
        mem.read_at(8, &mut buf).unwrap();
        assert_eq!(&buf, b"platform");
    }

    #[test]
    fn test_bounds_checked() {
        let mem = KrnlSharedMem::new(16, AccessFlags::READ | AccessFlags::WRITE).unwrap();
        let err = mem.write_at(12, &[0u8; 8]).unwrap_err();
        assert_eq!(err, KernelError::index_range());
        let mut buf = [0u8; 4];
        assert!(mem.read_at(14, &mut buf).is_err());
    }

    #[test]
    fn test_access_enforced() {
        let mem = KrnlSharedMem::new(16, AccessFlags::READ).unwrap();
        let err = mem.write_at(0, &[1, 2]).unwrap_err();
        assert_eq!(err, KernelError::access_denied());
        let mut buf = [0u8; 2];
        mem.read_at(0, &mut buf).unwrap();
    }

    #[test]
    fn test_named_region_shares_contents() {
        let name = ResourceName::new("Acme", "Test", "MemShare").unwrap();
        let (a, created) = KrnlSharedMem::create_named(
            &name,
            CreateDisposition::OpenOrCreate,
            32,
            AccessFlags::READ | AccessFlags::WRITE,
        )
        .unwrap();
        assert!(created);
        let (b, created) = KrnlSharedMem::create_named(
            &name,
            CreateDisposition::OpenExisting,
            32,
            AccessFlags::READ | AccessFlags::WRITE,
        )
        .unwrap();
        assert!(!created);

        a.write_at(0, b"hello").unwrap();
        let mut buf = [0u8; 5];
        b.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_three_duplicates_need_four_closes() {
        let mut mem = KrnlSharedMem::new(16, AccessFlags::READ | AccessFlags::WRITE).unwrap();
        let id = mem.handle().id();
        let mut d1 = mem.duplicate().unwrap();
        let mut d2 = mem.duplicate().unwrap();
        let mut d3 = mem.duplicate().unwrap();
        assert_eq!(crate::handle::ref_count_of(id), Some(4));

        d1.close().unwrap();
        d2.close().unwrap();
        d3.close().unwrap();
        // Still open: the original owner remains
        assert_eq!(crate::handle::ref_count_of(id), Some(1));
        mem.write_at(0, &[7]).unwrap();

        mem.close().unwrap();
        assert_eq!(crate::handle::ref_count_of(id), None);
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(KrnlSharedMem::new(0, AccessFlags::READ).is_err());
    }
}
