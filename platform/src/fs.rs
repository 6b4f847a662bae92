//! File and directory-search wrappers over the RAM-backed file store.
//!
//! The store plays the role the host filesystem plays on a full OS: a
//! process-wide, path-keyed byte store. Wrappers follow the same handle
//! contract as every other primitive: open with a disposition, operate,
//! close idempotently.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use hashbrown::HashMap;
use spin::Mutex;

use crate::error::{KernelError, Result};
use crate::handle::{self, AccessFlags, CreateDisposition, HandleKind, KernelObject, RawHandle};

static FILE_STORE: Mutex<Option<HashMap<String, Vec<u8>>>> = Mutex::new(None);

fn with_store<F, R>(f: F) -> R
where
    F: FnOnce(&mut HashMap<String, Vec<u8>>) -> R,
{
    let mut guard = FILE_STORE.lock();
    if guard.is_none() {
        *guard = Some(HashMap::new());
    }
    f(guard.as_mut().unwrap())
}

/// Initialize the file subsystem.
pub fn init() {
    with_store(|_| ());
    log::debug!("[Platform FS] File store ready");
}

/// Whether a file exists in the store.
pub fn exists(path: &str) -> bool {
    with_store(|store| store.contains_key(path))
}

/// Remove a file from the store.
pub fn remove_file(path: &str) -> Result<()> {
    with_store(|store| {
        store
            .remove(path)
            .map(|_| ())
            .ok_or_else(KernelError::not_found)
    })
}

/// Where a seek is measured from.
#[derive(Debug, Clone, Copy)]
pub enum SeekFrom {
    /// From the start of the file.
    Start(u64),
    /// From the end of the file.
    End(i64),
    /// From the current position.
    Current(i64),
}

/// Shared state of one open file.
pub(crate) struct FileState {
    path: String,
    access: AccessFlags,
    position: Mutex<u64>,
}

/// Open file wrapper.
pub struct KrnlFile {
    handle: RawHandle,
    state: Option<Arc<FileState>>,
}

impl core::fmt::Debug for KrnlFile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KrnlFile").field("handle", &self.handle).finish()
    }
}

impl KrnlFile {
    /// Open a file per the disposition. Returns the wrapper and whether
    /// the file was freshly created.
    pub fn open(
        path: &str,
        disposition: CreateDisposition,
        access: AccessFlags,
    ) -> Result<(Self, bool)> {
        if path.is_empty() {
            return Err(KernelError::bad_parms());
        }
        let created = with_store(|store| {
            let present = store.contains_key(path);
            match disposition {
                CreateDisposition::CreateNew => {
                    if present {
                        return Err(KernelError::already_exists());
                    }
                    store.insert(path.to_string(), Vec::new());
                    Ok(true)
                }
                CreateDisposition::OpenExisting => {
                    if !present {
                        return Err(KernelError::not_found());
                    }
                    Ok(false)
                }
                CreateDisposition::OpenOrCreate => {
                    if !present {
                        store.insert(path.to_string(), Vec::new());
                    }
                    Ok(!present)
                }
            }
        })?;

        let state = Arc::new(FileState {
            path: path.to_string(),
            access,
            position: Mutex::new(0),
        });
        let id = handle::create_anonymous(KernelObject::File(state.clone()));
        Ok((
            KrnlFile {
                handle: RawHandle::new(id, HandleKind::File),
                state: Some(state),
            },
            created,
        ))
    }

    fn state(&self) -> Result<&Arc<FileState>> {
        self.state.as_ref().ok_or_else(KernelError::invalid_handle)
    }

    /// Whether this wrapper is bound to an open file.
    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    /// The opaque handle.
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// Path the file was opened with.
    pub fn path(&self) -> Result<&str> {
        Ok(&self.state()?.path)
    }

    /// Current file size in bytes.
    pub fn size(&self) -> Result<u64> {
        let state = self.state()?;
        with_store(|store| {
            store
                .get(&state.path)
                .map(|data| data.len() as u64)
                .ok_or_else(KernelError::not_found)
        })
    }

    /// Read from the current position, advancing it. Returns the number
    /// of bytes actually read; zero at end of file.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let state = self.state()?;
        if !state.access.contains(AccessFlags::READ) {
            return Err(KernelError::access_denied());
        }
        let mut pos = state.position.lock();
        let count = with_store(|store| {
            let data = store.get(&state.path).ok_or_else(KernelError::not_found)?;
            let start = (*pos as usize).min(data.len());
            let count = buf.len().min(data.len() - start);
            buf[..count].copy_from_slice(&data[start..start + count]);
            Ok(count)
        })?;
        *pos += count as u64;
        Ok(count)
    }

    /// Write at the current position, extending the file as needed, and
    /// advance the position.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let state = self.state()?;
        if !state.access.contains(AccessFlags::WRITE) {
            return Err(KernelError::access_denied());
        }
        let mut pos = state.position.lock();
        with_store(|store| {
            let data = store
                .get_mut(&state.path)
                .ok_or_else(KernelError::not_found)?;
            let start = *pos as usize;
            let end = start + buf.len();
            if end > data.len() {
                data.resize(end, 0);
            }
            data[start..end].copy_from_slice(buf);
            Ok(())
        })?;
        *pos += buf.len() as u64;
        Ok(buf.len())
    }

    /// Move the file position. Returns the new absolute position.
    pub fn seek(&self, from: SeekFrom) -> Result<u64> {
        let state = self.state()?;
        let size = self.size()?;
        let mut pos = state.position.lock();
        let new_pos = match from {
            SeekFrom::Start(n) => n,
            SeekFrom::End(n) => {
                if n >= 0 {
                    size + n as u64
                } else {
                    size.checked_sub((-n) as u64)
                        .ok_or_else(KernelError::index_range)?
                }
            }
            SeekFrom::Current(n) => {
                if n >= 0 {
                    *pos + n as u64
                } else {
                    pos.checked_sub((-n) as u64)
                        .ok_or_else(KernelError::index_range)?
                }
            }
        };
        *pos = new_pos;
        Ok(new_pos)
    }

    /// Truncate or extend the file to the given size.
    pub fn truncate(&self, size: u64) -> Result<()> {
        let state = self.state()?;
        if !state.access.contains(AccessFlags::WRITE) {
            return Err(KernelError::access_denied());
        }
        with_store(|store| {
            let data = store
                .get_mut(&state.path)
                .ok_or_else(KernelError::not_found)?;
            data.resize(size as usize, 0);
            Ok(())
        })
    }

    /// Release this wrapper's claim on the open file. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.state.take().is_some() {
            handle::close(self.handle.id())?;
            self.handle.clear();
        }
        Ok(())
    }
}

impl Drop for KrnlFile {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Shared state of one directory search: a snapshot of the matching
/// paths at `find_first` time.
pub(crate) struct SearchState {
    matches: Vec<String>,
    next: Mutex<usize>,
}

/// Directory search wrapper, enumerating store entries that match a
/// wildcard pattern (`*` any run, `?` any single character).
pub struct KrnlDirSearch {
    handle: RawHandle,
    state: Option<Arc<SearchState>>,
}

impl KrnlDirSearch {
    /// Begin a search over the store. The result set is a snapshot;
    /// files created after this call are not picked up.
    pub fn find_first(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(KernelError::bad_parms());
        }
        let mut matches: Vec<String> = with_store(|store| {
            store
                .keys()
                .filter(|path| wildcard_match(pattern, path))
                .cloned()
                .collect()
        });
        matches.sort();
        let state = Arc::new(SearchState {
            matches,
            next: Mutex::new(0),
        });
        let id = handle::create_anonymous(KernelObject::DirSearch(state.clone()));
        Ok(KrnlDirSearch {
            handle: RawHandle::new(id, HandleKind::DirSearch),
            state: Some(state),
        })
    }

    fn state(&self) -> Result<&Arc<SearchState>> {
        self.state.as_ref().ok_or_else(KernelError::invalid_handle)
    }

    /// Whether this wrapper is bound to a live search.
    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    /// The opaque handle.
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// The next matching path, or None when the search is exhausted.
    pub fn find_next(&self) -> Result<Option<String>> {
        let state = self.state()?;
        let mut next = state.next.lock();
        if *next >= state.matches.len() {
            return Ok(None);
        }
        let path = state.matches[*next].clone();
        *next += 1;
        Ok(Some(path))
    }

    /// Number of matches in the snapshot.
    pub fn match_count(&self) -> Result<usize> {
        Ok(self.state()?.matches.len())
    }

    /// Release this wrapper's claim. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.state.take().is_some() {
            handle::close(self.handle.id())?;
            self.handle.clear();
        }
        Ok(())
    }
}

impl Drop for KrnlDirSearch {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Iterative wildcard match supporting `*` and `?`.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < txt.len() {
        if p < pat.len() && (pat[p] == '?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_dispositions() {
        let path = "fs-test/dispositions.dat";
        let _ = remove_file(path);

        let err = KrnlFile::open(path, CreateDisposition::OpenExisting, AccessFlags::READ)
            .unwrap_err();
        assert_eq!(err, KernelError::not_found());

        let (_f, created) = KrnlFile::open(
            path,
            CreateDisposition::CreateNew,
            AccessFlags::READ | AccessFlags::WRITE,
        )
        .unwrap();
        assert!(created);

        let err = KrnlFile::open(path, CreateDisposition::CreateNew, AccessFlags::READ)
            .unwrap_err();
        assert_eq!(err, KernelError::already_exists());

        let (_f2, created) =
            KrnlFile::open(path, CreateDisposition::OpenOrCreate, AccessFlags::READ).unwrap();
        assert!(!created);

        remove_file(path).unwrap();
    }

    #[test]
    fn test_read_write_seek() {
        let path = "fs-test/rw.dat";
        let _ = remove_file(path);
        let (file, _) = KrnlFile::open(
            path,
            CreateDisposition::CreateNew,
            AccessFlags::READ | AccessFlags::WRITE,
        )
        .unwrap();

        assert_eq!(file.write(b"hello world").unwrap(), 11);
        assert_eq!(file.size().unwrap(), 11);

        file.seek(SeekFrom::Start(6)).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(file.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"world");

        // At end of file a read returns zero bytes
        assert_eq!(file.read(&mut buf).unwrap(), 0);

        file.seek(SeekFrom::End(-5)).unwrap();
        file.write(b"earth").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut all = [0u8; 11];
        file.read(&mut all).unwrap();
        assert_eq!(&all, b"hello earth");

        remove_file(path).unwrap();
    }

    #[test]
    fn test_truncate() {
        let path = "fs-test/trunc.dat";
        let _ = remove_file(path);
        let (file, _) = KrnlFile::open(
            path,
            CreateDisposition::CreateNew,
            AccessFlags::READ | AccessFlags::WRITE,
        )
        .unwrap();
        file.write(b"0123456789").unwrap();
        file.truncate(4).unwrap();
        assert_eq!(file.size().unwrap(), 4);
        remove_file(path).unwrap();
    }

    #[test]
    fn test_access_enforced() {
        let path = "fs-test/readonly.dat";
        let _ = remove_file(path);
        let (file, _) =
            KrnlFile::open(path, CreateDisposition::CreateNew, AccessFlags::READ).unwrap();
        let err = file.write(b"nope").unwrap_err();
        assert_eq!(err, KernelError::access_denied());
        remove_file(path).unwrap();
    }

    #[test]
    fn test_dir_search() {
        let prefix = "fs-test/search";
        for name in ["a.log", "b.log", "c.txt"] {
            let path = format!("{}/{}", prefix, name);
            let _ = remove_file(&path);
            KrnlFile::open(&path, CreateDisposition::OpenOrCreate, AccessFlags::WRITE).unwrap();
        }

        let search = KrnlDirSearch::find_first("fs-test/search/*.log").unwrap();
        assert_eq!(search.match_count().unwrap(), 2);
        assert_eq!(
            search.find_next().unwrap(),
            Some(String::from("fs-test/search/a.log"))
        );
        assert_eq!(
            search.find_next().unwrap(),
            Some(String::from("fs-test/search/b.log"))
        );
        assert_eq!(search.find_next().unwrap(), None);

        for name in ["a.log", "b.log", "c.txt"] {
            remove_file(&format!("{}/{}", prefix, name)).unwrap();
        }
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*.log", "run.log"));
        assert!(!wildcard_match("*.log", "run.txt"));
        assert!(wildcard_match("data-?.bin", "data-7.bin"));
        assert!(!wildcard_match("data-?.bin", "data-42.bin"));
        assert!(wildcard_match("*", "anything/at.all"));
        assert!(wildcard_match("a*b*c", "a-x-b-y-c"));
    }

    #[test]
    fn test_close_idempotent() {
        let path = "fs-test/close.dat";
        let _ = remove_file(path);
        let (mut file, _) =
            KrnlFile::open(path, CreateDisposition::CreateNew, AccessFlags::WRITE).unwrap();
        file.close().unwrap();
        file.close().unwrap();
        assert!(!file.is_valid());
        assert!(file.write(b"x").is_err());
        remove_file(path).unwrap();
    }
}
