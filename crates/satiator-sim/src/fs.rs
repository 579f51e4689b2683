//! In-memory FAT volume behind the simulated firmware.
//!
//! Models the FatFs behaviour the driver can observe: result codes, file
//! positions, directory iteration order and the working directory. Paths
//! are stored absolute and normalised (`/DIR/FILE.BIN`).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use satiator::fs::{Attributes, OpenFlags};
use satiator::FsError;

/// Most files the firmware keeps open at once.
pub const MAX_OPEN_FILES: usize = 8;

/// Characters FatFs refuses in a name.
const ILLEGAL_CHARS: &[char] = &['*', '?', '<', '>', '|', '"', ':', '\\'];

type FsResult<T> = Result<T, FsError>;

/// A stored file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimFile {
    /// Contents.
    pub data: Vec<u8>,
    /// FAT timestamp of the last write (date high, time low).
    pub stamp: u32,
}

/// A directory entry as reported by stat/readdir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Last path component.
    pub name: String,
    /// Size in bytes (0 for directories).
    pub size: u32,
    /// FAT timestamp.
    pub stamp: u32,
    /// Attribute bits.
    pub attrib: u8,
}

impl Entry {
    /// Encode as a stat record: big-endian size, date, time, attrib, name.
    pub fn record(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(9 + self.name.len());
        out.extend_from_slice(&self.size.to_be_bytes());
        out.extend_from_slice(&self.stamp.to_be_bytes());
        out.push(self.attrib);
        out.extend_from_slice(self.name.as_bytes());
        out
    }
}

#[derive(Debug)]
struct OpenFile {
    path: String,
    pos: u32,
    flags: OpenFlags,
}

/// The simulated volume.
#[derive(Debug)]
pub struct SimFs {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, SimFile>,
    cwd: String,
    handles: BTreeMap<u8, OpenFile>,
    listing: Option<VecDeque<Entry>>,
    clock: u32,
}

impl Default for SimFs {
    fn default() -> Self {
        Self::new()
    }
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

impl SimFs {
    /// An empty, formatted volume.
    pub fn new() -> Self {
        Self {
            dirs: BTreeSet::from(["/".to_owned()]),
            files: BTreeMap::new(),
            cwd: "/".to_owned(),
            handles: BTreeMap::new(),
            listing: None,
            clock: 0,
        }
    }

    /// Normalise `path` against the working directory.
    pub fn resolve(&self, path: &str) -> FsResult<String> {
        if path.is_empty() || path.chars().any(|c| c.is_control() || ILLEGAL_CHARS.contains(&c)) {
            return Err(FsError::InvalidName);
        }
        let mut parts: Vec<&str> = if path.starts_with('/') {
            Vec::new()
        } else {
            self.cwd.split('/').filter(|p| !p.is_empty()).collect()
        };
        for part in path.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                name => parts.push(name),
            }
        }
        Ok(format!("/{}", parts.join("/")))
    }

    fn require_parent(&self, path: &str) -> FsResult<()> {
        if self.dirs.contains(parent_of(path)) {
            Ok(())
        } else {
            Err(FsError::NoPath)
        }
    }

    fn is_open(&self, path: &str) -> bool {
        self.handles.values().any(|h| h.path == path)
    }

    fn entry(&self, path: &str) -> FsResult<Entry> {
        let name = name_of(path).to_owned();
        if let Some(file) = self.files.get(path) {
            let size = u32::try_from(file.data.len()).map_err(|_| FsError::IntErr)?;
            return Ok(Entry { name, size, stamp: file.stamp, attrib: Attributes::ARCHIVE });
        }
        if self.dirs.contains(path) {
            return Ok(Entry { name, size: 0, stamp: 0, attrib: Attributes::DIRECTORY });
        }
        Err(FsError::NoFile)
    }

    fn children(&self, dir: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .dirs
            .iter()
            .chain(self.files.keys())
            .filter(|p| p.as_str() != "/" && parent_of(p) == dir)
            .cloned()
            .collect();
        out.sort();
        out
    }

    /// `f_open`.
    pub fn open(&mut self, path: &str, flags: OpenFlags) -> FsResult<u8> {
        let path = self.resolve(path)?;
        self.require_parent(&path)?;
        if self.dirs.contains(&path) {
            return Err(FsError::NoFile);
        }

        let exists = self.files.contains_key(&path);
        let create = flags.contains(OpenFlags::CREATE_NEW)
            || flags.contains(OpenFlags::CREATE_ALWAYS)
            || flags.contains(OpenFlags::OPEN_ALWAYS);
        if exists && flags.contains(OpenFlags::CREATE_NEW) {
            return Err(FsError::Exist);
        }
        if !exists && !create {
            return Err(FsError::NoFile);
        }
        if exists && flags.contains(OpenFlags::WRITE) && self.is_open(&path) {
            return Err(FsError::Locked);
        }

        let fd = (0..=u8::MAX)
            .take(MAX_OPEN_FILES)
            .find(|fd| !self.handles.contains_key(fd))
            .ok_or(FsError::TooManyOpenFiles)?;

        let stamp = self.clock;
        let file = self.files.entry(path.clone()).or_insert_with(|| SimFile { data: Vec::new(), stamp });
        if flags.contains(OpenFlags::CREATE_ALWAYS) {
            file.data.clear();
            file.stamp = stamp;
        }
        let pos = if flags.contains(OpenFlags::OPEN_APPEND) {
            u32::try_from(file.data.len()).map_err(|_| FsError::IntErr)?
        } else {
            0
        };
        self.handles.insert(fd, OpenFile { path, pos, flags });
        Ok(fd)
    }

    /// `f_close`.
    pub fn close(&mut self, fd: u8) -> FsResult<()> {
        self.handles.remove(&fd).map(|_| ()).ok_or(FsError::InvalidObject)
    }

    /// `f_lseek` with a whence code (0 start, 1 current, 2 end).
    ///
    /// Seeking past the end grows a writable file and clamps a read-only one.
    pub fn seek(&mut self, fd: u8, offset: i32, whence: u16) -> FsResult<u32> {
        let file = self.handles.get_mut(&fd).ok_or(FsError::InvalidObject)?;
        let stored = self.files.get_mut(&file.path).ok_or(FsError::IntErr)?;
        let len = u32::try_from(stored.data.len()).map_err(|_| FsError::IntErr)?;
        let base = match whence {
            0 => 0,
            1 => i64::from(file.pos),
            2 => i64::from(len),
            _ => return Err(FsError::InvalidParameter),
        };
        let target = base.checked_add(i64::from(offset)).ok_or(FsError::InvalidParameter)?;
        let mut target = u32::try_from(target).map_err(|_| FsError::InvalidParameter)?;

        if !file.flags.contains(OpenFlags::WRITE) {
            target = target.min(len);
        } else if target > len {
            stored.data.resize(target as usize, 0);
        }
        file.pos = target;
        Ok(target)
    }

    /// `f_read` of up to `n` bytes.
    pub fn read(&mut self, fd: u8, n: usize) -> FsResult<Vec<u8>> {
        let file = self.handles.get_mut(&fd).ok_or(FsError::InvalidObject)?;
        if !file.flags.contains(OpenFlags::READ) {
            return Err(FsError::Denied);
        }
        let data = self.files.get(&file.path).map_or(&[][..], |f| &f.data);
        let start = (file.pos as usize).min(data.len());
        let end = start.saturating_add(n).min(data.len());
        let out = data[start..end].to_vec();
        file.pos = u32::try_from(end).map_err(|_| FsError::IntErr)?;
        Ok(out)
    }

    /// `f_write`; returns the bytes written.
    pub fn write(&mut self, fd: u8, bytes: &[u8]) -> FsResult<u32> {
        let clock = self.clock;
        let file = self.handles.get_mut(&fd).ok_or(FsError::InvalidObject)?;
        if !file.flags.contains(OpenFlags::WRITE) {
            return Err(FsError::Denied);
        }
        let stored = self.files.get_mut(&file.path).ok_or(FsError::IntErr)?;
        let start = file.pos as usize;
        let end = start.saturating_add(bytes.len());
        if stored.data.len() < end {
            stored.data.resize(end, 0);
        }
        stored.data[start..end].copy_from_slice(bytes);
        stored.stamp = clock;
        file.pos = u32::try_from(end).map_err(|_| FsError::IntErr)?;
        u32::try_from(bytes.len()).map_err(|_| FsError::IntErr)
    }

    /// `f_truncate` at the current position; returns the new size.
    pub fn truncate(&mut self, fd: u8) -> FsResult<u32> {
        let file = self.handles.get(&fd).ok_or(FsError::InvalidObject)?;
        if !file.flags.contains(OpenFlags::WRITE) {
            return Err(FsError::Denied);
        }
        let pos = file.pos;
        let stored = self.files.get_mut(&file.path).ok_or(FsError::IntErr)?;
        stored.data.truncate(pos as usize);
        Ok(pos)
    }

    /// `f_stat`.
    pub fn stat(&self, path: &str) -> FsResult<Entry> {
        let path = self.resolve(path)?;
        self.require_parent(&path)?;
        self.entry(&path)
    }

    /// `f_rename`. Directories move with their contents.
    pub fn rename(&mut self, old: &str, new: &str) -> FsResult<()> {
        let old = self.resolve(old)?;
        let new = self.resolve(new)?;
        self.require_parent(&old)?;
        self.require_parent(&new)?;
        if self.files.contains_key(&new) || self.dirs.contains(&new) {
            return Err(FsError::Exist);
        }
        if let Some(file) = self.files.remove(&old) {
            self.files.insert(new, file);
            return Ok(());
        }
        if old == "/" || !self.dirs.contains(&old) {
            return Err(FsError::NoFile);
        }
        let prefix = format!("{old}/");
        let moved = |p: &String| {
            if *p == old {
                Some(new.clone())
            } else {
                p.strip_prefix(&prefix).map(|rest| format!("{new}/{rest}"))
            }
        };
        self.dirs = self.dirs.iter().map(|d| moved(d).unwrap_or_else(|| d.clone())).collect();
        self.files = std::mem::take(&mut self.files)
            .into_iter()
            .map(|(p, f)| (moved(&p).unwrap_or(p), f))
            .collect();
        Ok(())
    }

    /// `f_unlink`. Directories must be empty.
    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        let path = self.resolve(path)?;
        self.require_parent(&path)?;
        if self.files.contains_key(&path) {
            if self.is_open(&path) {
                return Err(FsError::Locked);
            }
            self.files.remove(&path);
            return Ok(());
        }
        if path == "/" || !self.dirs.contains(&path) {
            return Err(FsError::NoFile);
        }
        if !self.children(&path).is_empty() || self.cwd == path {
            return Err(FsError::Denied);
        }
        self.dirs.remove(&path);
        Ok(())
    }

    /// `f_mkdir`.
    pub fn mkdir(&mut self, path: &str) -> FsResult<()> {
        let path = self.resolve(path)?;
        self.require_parent(&path)?;
        if self.files.contains_key(&path) || self.dirs.contains(&path) {
            return Err(FsError::Exist);
        }
        self.dirs.insert(path);
        Ok(())
    }

    /// `f_opendir`: snapshot the listing for [`SimFs::readdir`].
    pub fn opendir(&mut self, path: &str) -> FsResult<()> {
        let path = self.resolve(path)?;
        if !self.dirs.contains(&path) {
            return Err(FsError::NoPath);
        }
        let entries = self
            .children(&path)
            .iter()
            .map(|p| self.entry(p))
            .collect::<FsResult<VecDeque<_>>>()?;
        self.listing = Some(entries);
        Ok(())
    }

    /// `f_readdir`: the next entry, `NoFile` once exhausted.
    pub fn readdir(&mut self) -> FsResult<Entry> {
        let listing = self.listing.as_mut().ok_or(FsError::InvalidObject)?;
        listing.pop_front().ok_or(FsError::NoFile)
    }

    /// `f_chdir`; returns the new working directory.
    pub fn chdir(&mut self, path: &str) -> FsResult<&str> {
        let path = self.resolve(path)?;
        if !self.dirs.contains(&path) {
            return Err(FsError::NoPath);
        }
        self.cwd = path;
        Ok(&self.cwd)
    }

    /// `f_mkfs`: wipe everything.
    pub fn format(&mut self) {
        let clock = self.clock;
        *self = Self::new();
        self.clock = clock;
    }

    /// Set the clock stamped on written files.
    pub fn set_time(&mut self, stamp: u32) {
        self.clock = stamp;
    }

    /// The clock stamped on written files.
    pub fn time(&self) -> u32 {
        self.clock
    }

    /// The working directory.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Contents of a file, by absolute path.
    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(|f| f.data.as_slice())
    }

    /// Whether a directory exists, by absolute path.
    pub fn is_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }

    /// Store a file directly, creating missing parent directories.
    pub fn insert_file(&mut self, path: &str, data: &[u8]) {
        let mut dir = String::new();
        let parent = parent_of(path);
        for part in parent.split('/').filter(|p| !p.is_empty()) {
            dir.push('/');
            dir.push_str(part);
            self.dirs.insert(dir.clone());
        }
        self.files.insert(path.to_owned(), SimFile { data: data.to_vec(), stamp: self.clock });
    }

    /// Number of open handles.
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn resolve_handles_dots_and_cwd() {
        let mut fs = SimFs::new();
        fs.mkdir("GAMES").unwrap();
        fs.chdir("GAMES").unwrap();
        assert_eq!(fs.resolve("A.CUE").unwrap(), "/GAMES/A.CUE");
        assert_eq!(fs.resolve("../B").unwrap(), "/B");
        assert_eq!(fs.resolve(".").unwrap(), "/GAMES");
        assert_eq!(fs.resolve("/X/./Y").unwrap(), "/X/Y");
        assert_eq!(fs.resolve("A?B"), Err(FsError::InvalidName));
    }

    #[test]
    fn open_modes_follow_fatfs() {
        let mut fs = SimFs::new();
        assert_eq!(fs.open("NONE", OpenFlags::READ), Err(FsError::NoFile));
        let fd = fs.open("NEW", OpenFlags::WRITE | OpenFlags::CREATE_NEW).unwrap();
        fs.close(fd).unwrap();
        assert_eq!(fs.open("NEW", OpenFlags::WRITE | OpenFlags::CREATE_NEW), Err(FsError::Exist));
        assert_eq!(fs.open("NODIR/X", OpenFlags::OPEN_ALWAYS), Err(FsError::NoPath));
    }

    #[test]
    fn append_positions_at_end() {
        let mut fs = SimFs::new();
        fs.insert_file("/LOG", b"abc");
        let fd = fs.open("LOG", OpenFlags::WRITE | OpenFlags::OPEN_APPEND).unwrap();
        fs.write(fd, b"de").unwrap();
        assert_eq!(fs.file("/LOG").unwrap(), b"abcde");
    }

    #[test]
    fn handle_table_is_bounded() {
        let mut fs = SimFs::new();
        fs.insert_file("/F", b"");
        for _ in 0..MAX_OPEN_FILES {
            fs.open("F", OpenFlags::READ).unwrap();
        }
        assert_eq!(fs.open("F", OpenFlags::READ), Err(FsError::TooManyOpenFiles));
    }

    #[test]
    fn readdir_lists_sorted_then_reports_no_file() {
        let mut fs = SimFs::new();
        fs.insert_file("/B.BIN", b"12");
        fs.insert_file("/A.BIN", b"1");
        fs.mkdir("C").unwrap();
        fs.opendir("/").unwrap();
        let names: Vec<_> = std::iter::from_fn(|| fs.readdir().ok()).map(|e| e.name).collect();
        assert_eq!(names, ["A.BIN", "B.BIN", "C"]);
        assert_eq!(fs.readdir(), Err(FsError::NoFile));
    }

    #[test]
    fn rename_moves_directory_contents() {
        let mut fs = SimFs::new();
        fs.insert_file("/OLD/SUB/F", b"x");
        fs.rename("OLD", "NEW").unwrap();
        assert!(fs.is_dir("/NEW/SUB"));
        assert_eq!(fs.file("/NEW/SUB/F").unwrap(), b"x");
        assert!(!fs.is_dir("/OLD"));
    }

    #[test]
    fn unlink_refuses_non_empty_directory() {
        let mut fs = SimFs::new();
        fs.insert_file("/D/F", b"");
        assert_eq!(fs.unlink("D"), Err(FsError::Denied));
        fs.unlink("D/F").unwrap();
        fs.unlink("D").unwrap();
    }

    #[test]
    fn stat_record_layout() {
        let entry = Entry { name: "AB".into(), size: 0x0102_0304, stamp: 0x0506_0708, attrib: 0x20 };
        assert_eq!(entry.record(), [1, 2, 3, 4, 5, 6, 7, 8, 0x20, b'A', b'B']);
    }
}
