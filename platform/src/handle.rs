//! Handle abstraction and the process-wide object table.
//!
//! A wrapper object (event, mutex, file, ...) holds a [`RawHandle`]: an
//! opaque by-value reference to one entry in the object table. The table
//! entry carries the shared state of the underlying resource and the
//! embedded reference count that makes duplication and closing behave
//! the same no matter which wrapper instance performs them. The entry is
//! removed, and a named entry unlinked from the name index, exactly when
//! that count reaches zero.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use bitflags::bitflags;
use hashbrown::HashMap;
use spin::Mutex;

use crate::error::{KernelError, Result};
use crate::fs::{FileState, SearchState};
use crate::process::ProcessState;
use crate::shmem::MemoryState;
use crate::sync::event::EventState;
use crate::sync::mutex::MutexState;
use crate::sync::semaphore::SemaphoreState;
use crate::thread::ThreadState;

/// Unique handle identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub u64);

impl HandleId {
    /// The invalid sentinel.
    pub const INVALID: HandleId = HandleId(0);
}

/// The resource kinds the object table manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// Event semaphore.
    Event,
    /// Mutex semaphore.
    Mutex,
    /// Counting semaphore.
    Semaphore,
    /// Shared memory region.
    SharedMemory,
    /// Open file.
    File,
    /// Directory search.
    DirSearch,
    /// Thread.
    Thread,
    /// Process.
    Process,
}

/// How a create/open call treats an existing or missing named resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateDisposition {
    /// Fail if the resource already exists.
    CreateNew,
    /// Fail if the resource does not exist.
    OpenExisting,
    /// Open it if present, create it otherwise; the caller is told which.
    OpenOrCreate,
}

bitflags! {
    /// Access rights for memory regions and files.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        /// Contents may be read.
        const READ = 0b001;
        /// Contents may be written.
        const WRITE = 0b010;
        /// Contents may be executed.
        const EXECUTE = 0b100;
    }
}

/// The opaque by-value handle a wrapper holds. Destroying one of these
/// does not release the resource; the wrapper's close does, through the
/// table's reference count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHandle {
    id: HandleId,
    kind: HandleKind,
}

impl RawHandle {
    /// An invalid handle of the given kind.
    pub const fn invalid(kind: HandleKind) -> Self {
        RawHandle {
            id: HandleId::INVALID,
            kind,
        }
    }

    pub(crate) fn new(id: HandleId, kind: HandleKind) -> Self {
        RawHandle { id, kind }
    }

    /// Whether this handle refers to a live table entry slot.
    pub fn is_valid(&self) -> bool {
        self.id != HandleId::INVALID
    }

    /// Reset to the invalid sentinel.
    pub fn clear(&mut self) {
        self.id = HandleId::INVALID;
    }

    /// The handle identifier.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// The resource kind this handle refers to.
    pub fn kind(&self) -> HandleKind {
        self.kind
    }
}

impl core::fmt::Display for RawHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}:{:#x}", self.kind, self.id.0)
    }
}

/// Shared state of one table-managed resource.
#[derive(Clone)]
pub(crate) enum KernelObject {
    Event(Arc<EventState>),
    Mutex(Arc<MutexState>),
    Semaphore(Arc<SemaphoreState>),
    Memory(Arc<MemoryState>),
    File(Arc<FileState>),
    DirSearch(Arc<SearchState>),
    Thread(Arc<ThreadState>),
    Process(Arc<ProcessState>),
}

impl core::fmt::Debug for KernelObject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "KernelObject::{:?}", self.kind())
    }
}

impl KernelObject {
    fn kind(&self) -> HandleKind {
        match self {
            KernelObject::Event(_) => HandleKind::Event,
            KernelObject::Mutex(_) => HandleKind::Mutex,
            KernelObject::Semaphore(_) => HandleKind::Semaphore,
            KernelObject::Memory(_) => HandleKind::SharedMemory,
            KernelObject::File(_) => HandleKind::File,
            KernelObject::DirSearch(_) => HandleKind::DirSearch,
            KernelObject::Thread(_) => HandleKind::Thread,
            KernelObject::Process(_) => HandleKind::Process,
        }
    }
}

struct TableEntry {
    object: KernelObject,
    /// Outstanding wrapper owners. Duplicate and close are the only
    /// mutators; release happens at zero.
    ref_count: usize,
    /// Full derived name for named kinds, used to unlink the name index.
    name: Option<String>,
}

struct ObjectTable {
    entries: BTreeMap<HandleId, TableEntry>,
    names: HashMap<String, HandleId>,
    next_id: u64,
}

impl ObjectTable {
    fn new() -> Self {
        ObjectTable {
            entries: BTreeMap::new(),
            names: HashMap::new(),
            next_id: 1,
        }
    }

    fn alloc_id(&mut self) -> HandleId {
        let id = HandleId(self.next_id);
        self.next_id += 1;
        id
    }
}

static OBJECT_TABLE: Mutex<Option<ObjectTable>> = Mutex::new(None);

fn with_table<F, R>(f: F) -> R
where
    F: FnOnce(&mut ObjectTable) -> R,
{
    let mut guard = OBJECT_TABLE.lock();
    if guard.is_none() {
        *guard = Some(ObjectTable::new());
    }
    f(guard.as_mut().unwrap())
}

/// Initialize the handle subsystem.
pub fn init() {
    with_table(|_| ());
    log::debug!("[Platform Handle] Object table ready");
}

/// Register an anonymous resource, returning its handle id.
pub(crate) fn create_anonymous(object: KernelObject) -> HandleId {
    with_table(|table| {
        let id = table.alloc_id();
        table.entries.insert(
            id,
            TableEntry {
                object,
                ref_count: 1,
                name: None,
            },
        );
        id
    })
}

/// Open or create a named resource per the disposition.
///
/// On success returns the handle id, whether the resource was freshly
/// created, and the shared object state. `make` is only invoked when a
/// new resource is actually created.
pub(crate) fn open_named(
    kind: HandleKind,
    full_name: &str,
    disposition: CreateDisposition,
    make: impl FnOnce() -> KernelObject,
) -> Result<(HandleId, bool, KernelObject)> {
    with_table(|table| {
        let existing = table.names.get(full_name).copied();
        match existing {
            Some(id) => {
                if disposition == CreateDisposition::CreateNew {
                    return Err(KernelError::already_exists());
                }
                let entry = table
                    .entries
                    .get_mut(&id)
                    .ok_or_else(KernelError::invalid_handle)?;
                if entry.object.kind() != kind {
                    // Same name, different resource kind: a naming clash
                    return Err(KernelError::already_exists());
                }
                entry.ref_count += 1;
                Ok((id, false, entry.object.clone()))
            }
            None => {
                if disposition == CreateDisposition::OpenExisting {
                    return Err(KernelError::not_found());
                }
                let object = make();
                let id = table.alloc_id();
                table.entries.insert(
                    id,
                    TableEntry {
                        object: object.clone(),
                        ref_count: 1,
                        name: Some(full_name.to_string()),
                    },
                );
                table.names.insert(full_name.to_string(), id);
                log::debug!("[Platform Handle] Created named {:?} '{}'", kind, full_name);
                Ok((id, true, object))
            }
        }
    })
}

/// Add an owner to a live entry. Duplicating an invalid handle is a
/// programmer error and is reported loudly.
pub(crate) fn duplicate(id: HandleId) -> Result<()> {
    with_table(|table| {
        let entry = table
            .entries
            .get_mut(&id)
            .ok_or_else(KernelError::invalid_handle)?;
        entry.ref_count += 1;
        Ok(())
    })
}

/// Drop one owner from a live entry. Returns true when this was the last
/// owner and the resource was released.
pub(crate) fn close(id: HandleId) -> Result<bool> {
    with_table(|table| {
        let entry = table
            .entries
            .get_mut(&id)
            .ok_or_else(KernelError::invalid_handle)?;
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return Ok(false);
        }
        let entry = table.entries.remove(&id).unwrap();
        if let Some(name) = entry.name {
            table.names.remove(&name);
            log::debug!("[Platform Handle] Released named object '{}'", name);
        }
        Ok(true)
    })
}

/// Current owner count of an entry, if it is still live.
pub(crate) fn ref_count_of(id: HandleId) -> Option<usize> {
    with_table(|table| table.entries.get(&id).map(|e| e.ref_count))
}

/// Number of live table entries.
pub fn live_handles() -> usize {
    with_table(|table| table.entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::event::EventState;

    fn event_object() -> KernelObject {
        KernelObject::Event(Arc::new(EventState::new()))
    }

    #[test]
    fn test_anonymous_lifecycle() {
        let id = create_anonymous(event_object());
        assert_eq!(ref_count_of(id), Some(1));
        assert!(close(id).unwrap());
        assert_eq!(ref_count_of(id), None);
    }

    #[test]
    fn test_duplicate_counts_owners() {
        let id = create_anonymous(event_object());
        duplicate(id).unwrap();
        duplicate(id).unwrap();
        assert_eq!(ref_count_of(id), Some(3));
        assert!(!close(id).unwrap());
        assert!(!close(id).unwrap());
        assert!(close(id).unwrap());
    }

    #[test]
    fn test_duplicate_dead_entry_fails() {
        let id = create_anonymous(event_object());
        assert!(close(id).unwrap());
        assert!(duplicate(id).is_err());
        assert!(close(id).is_err());
    }

    #[test]
    fn test_named_dispositions() {
        let name = "Handle.Test.Dispositions.Evt";

        // OpenExisting before creation fails
        let err = open_named(
            HandleKind::Event,
            name,
            CreateDisposition::OpenExisting,
            event_object,
        )
        .unwrap_err();
        assert_eq!(err, KernelError::not_found());

        // CreateNew succeeds once
        let (id, created, _) = open_named(
            HandleKind::Event,
            name,
            CreateDisposition::CreateNew,
            event_object,
        )
        .unwrap();
        assert!(created);

        // CreateNew again fails
        let err = open_named(
            HandleKind::Event,
            name,
            CreateDisposition::CreateNew,
            event_object,
        )
        .unwrap_err();
        assert_eq!(err, KernelError::already_exists());

        // OpenOrCreate reports "already existed" and shares the entry
        let (id2, created2, _) = open_named(
            HandleKind::Event,
            name,
            CreateDisposition::OpenOrCreate,
            event_object,
        )
        .unwrap();
        assert!(!created2);
        assert_eq!(id, id2);
        assert_eq!(ref_count_of(id), Some(2));

        assert!(!close(id).unwrap());
        assert!(close(id).unwrap());

        // Fully released: the name is gone
        let err = open_named(
            HandleKind::Event,
            name,
            CreateDisposition::OpenExisting,
            event_object,
        )
        .unwrap_err();
        assert_eq!(err, KernelError::not_found());
    }

    #[test]
    fn test_kind_clash_on_name() {
        let name = "Handle.Test.KindClash.Obj";
        let (id, _, _) = open_named(
            HandleKind::Event,
            name,
            CreateDisposition::OpenOrCreate,
            event_object,
        )
        .unwrap();
        let err = open_named(
            HandleKind::Mutex,
            name,
            CreateDisposition::OpenOrCreate,
            event_object,
        )
        .unwrap_err();
        assert_eq!(err, KernelError::already_exists());
        assert!(close(id).unwrap());
    }

    #[test]
    fn test_raw_handle_validity() {
        let mut handle = RawHandle::invalid(HandleKind::Event);
        assert!(!handle.is_valid());
        handle = RawHandle::new(HandleId(7), HandleKind::Event);
        assert!(handle.is_valid());
        handle.clear();
        assert!(!handle.is_valid());
    }
}
