//! Persistent memoization of metadata probes.
//!
//! The [`ProbeCache`] maps file paths to their [`ProbeResult`], keyed by the
//! file's last-write time: a lookup whose stored mtime still matches the disk
//! returns the cached value without touching the file content. The cache can
//! be loaded from and flushed to a versioned binary state file, so probe work
//! survives across resolver invocations. A corrupt or mismatched state file
//! is discarded and resolution starts from an empty cache.
//!
//! [`FsMemo`] additionally memoizes directory listings and file-existence
//! checks within a single invocation; those memos are never persisted.

use crate::{
    error::{ResolveError, Result},
    probe::{probe_file, ProbeError, ProbeResult},
    utils,
};
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
};

/// Magic prefix of the state file.
const STATE_MAGIC: [u8; 4] = *b"ARRC";
/// Current state-file format version.
const STATE_VERSION: u8 = 1;

#[derive(Debug)]
struct CachedProbe {
    mtime: i64,
    result: Arc<ProbeResult>,
}

/// Thread-safe cache of probe results keyed by `path -> (mtime, result)`.
#[derive(Debug, Default)]
pub struct ProbeCache {
    entries: RwLock<HashMap<PathBuf, CachedProbe>>,
    dirty: AtomicBool,
    /// Number of times file content was actually read, for instrumentation.
    disk_probes: AtomicU64,
}

impl ProbeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the state file at `path` into a fresh cache.
    ///
    /// Fails on io errors, malformed framing, or a magic/version mismatch;
    /// callers treat all of these as advisories and start empty.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|err| ResolveError::io(err, path))?;
        let mut entries = HashMap::new();
        let mut cursor = Reader { bytes: &bytes, pos: 0 };

        if cursor.take(4)? != STATE_MAGIC {
            return Err(ResolveError::msg("state file magic mismatch"));
        }
        let version = cursor.u8()?;
        if version != STATE_VERSION {
            return Err(ResolveError::msg(format!("unsupported state file version {version}")));
        }
        let count = cursor.u32()?;
        for _ in 0..count {
            let path_len = cursor.u16()? as usize;
            let path_bytes = cursor.take(path_len)?;
            let entry_path = std::str::from_utf8(path_bytes)
                .map_err(|_| ResolveError::msg("state file path is not valid UTF-8"))?;
            let mtime = cursor.i64()?;
            let probe_len = cursor.u32()? as usize;
            let probe: ProbeResult = serde_json::from_slice(cursor.take(probe_len)?)?;
            entries
                .insert(PathBuf::from(entry_path), CachedProbe { mtime, result: Arc::new(probe) });
        }
        if cursor.pos != bytes.len() {
            return Err(ResolveError::msg("trailing bytes in state file"));
        }

        trace!("read probe cache with {} entries from \"{}\"", entries.len(), path.display());
        Ok(Self { entries: RwLock::new(entries), ..Default::default() })
    }

    /// Returns the probe result for `path`, reusing the cached value when the
    /// file's last-write time is unchanged.
    pub fn probe(&self, path: &Path) -> Result<Arc<ProbeResult>, ProbeError> {
        let mtime = match utils::last_write_time(path) {
            Ok(mtime) => mtime,
            Err(_) => {
                return Err(ProbeError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("cannot stat \"{}\"", path.display()),
                )))
            }
        };

        if let Some(cached) = self.entries.read().expect("cache lock poisoned").get(path) {
            if cached.mtime == mtime {
                return Ok(cached.result.clone());
            }
        }

        self.disk_probes.fetch_add(1, Ordering::Relaxed);
        let result = Arc::new(probe_file(path)?);
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.insert(path.to_path_buf(), CachedProbe { mtime, result: result.clone() });
        self.dirty.store(true, Ordering::Release);
        Ok(result)
    }

    /// Whether the cache changed since it was loaded or last flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Number of times a file's content was read instead of served from cache.
    pub fn disk_probe_count(&self) -> u64 {
        self.disk_probes.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes the cache and atomically replaces the state file at `path`.
    ///
    /// Resets the dirty flag on success.
    pub fn flush(&self, path: &Path) -> Result<()> {
        let bytes = self.serialize()?;
        utils::create_parent_dir_all(path)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|err| ResolveError::io(err, dir))?;
        tmp.write_all(&bytes).map_err(|err| ResolveError::io(err, tmp.path().to_path_buf()))?;
        tmp.persist(path).map_err(|err| ResolveError::io(err.error, path))?;
        self.dirty.store(false, Ordering::Release);
        trace!("flushed probe cache to \"{}\"", path.display());
        Ok(())
    }

    /// The serialized byte form of the cache, with entries in path order so
    /// serialization is deterministic.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let entries = self.entries.read().expect("cache lock poisoned");
        let mut paths: Vec<_> = entries.keys().collect();
        paths.sort();

        let mut out = Vec::new();
        out.extend_from_slice(&STATE_MAGIC);
        out.push(STATE_VERSION);
        out.extend_from_slice(&(paths.len() as u32).to_le_bytes());
        for path in paths {
            let cached = &entries[path];
            let path_str = path.to_string_lossy();
            let path_bytes = path_str.as_bytes();
            out.extend_from_slice(&(path_bytes.len() as u16).to_le_bytes());
            out.extend_from_slice(path_bytes);
            out.extend_from_slice(&cached.mtime.to_le_bytes());
            let blob = serde_json::to_vec(cached.result.as_ref())?;
            out.extend_from_slice(&(blob.len() as u32).to_le_bytes());
            out.extend_from_slice(&blob);
        }
        Ok(out)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| ResolveError::msg("truncated state file"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().expect("2 bytes")))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("4 bytes")))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().expect("8 bytes")))
    }
}

/// Memoizes file-existence and directory-listing probes for the duration of
/// one resolver invocation, avoiding redundant syscalls when many candidates
/// share directories. Not persisted.
#[derive(Debug, Default)]
pub struct FsMemo {
    exists: Mutex<HashMap<PathBuf, bool>>,
    dirs: Mutex<HashMap<PathBuf, Arc<Vec<PathBuf>>>>,
}

impl FsMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, path: &Path) -> bool {
        let mut memo = self.exists.lock().expect("memo lock poisoned");
        if let Some(known) = memo.get(path) {
            return *known;
        }
        let exists = path.is_file();
        memo.insert(path.to_path_buf(), exists);
        exists
    }

    /// Entries of `dir`, sorted case-insensitively by file name.
    pub fn dir_entries(&self, dir: &Path) -> Arc<Vec<PathBuf>> {
        let mut memo = self.dirs.lock().expect("memo lock poisoned");
        if let Some(entries) = memo.get(dir) {
            return entries.clone();
        }
        let entries = Arc::new(utils::sorted_dir_entries(dir));
        memo.insert(dir.to_path_buf(), entries.clone());
        entries
    }

    /// First-level subdirectories of `dir`, sorted case-insensitively.
    pub fn sub_dirs(&self, dir: &Path) -> Vec<PathBuf> {
        self.dir_entries(dir).iter().filter(|p| p.is_dir()).cloned().collect()
    }
}
