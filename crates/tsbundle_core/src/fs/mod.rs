//! Filesystem abstraction with an in-memory and a host-disk backend.
//!
//! Both backends implement [`FileSystem`] with identical pre- and post-conditions, so the
//! parser and the bundler never know which one they are talking to.

mod host;
mod memory;

pub use host::HostFs;
pub use memory::MemoryFs;

use std::{cell::OnceCell, fmt};

use crate::{
    error::{Error, Result},
    path::ModulePath,
};

/// Identifier of an open file, stable for the lifetime of its [`FileHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An open file. Not `Clone`: [`FileSystem::close`] consumes it, so a handle can only be
/// closed once.
#[derive(Debug, PartialEq, Eq)]
pub struct FileHandle {
    id: HandleId,
}

impl FileHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }
}

/// Accounting snapshot used by leak tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsStat {
    pub open_handles: usize,
    pub files: usize,
}

pub trait FileSystem {
    fn open(&mut self, path: &ModulePath) -> Result<FileHandle>;

    /// Creates an empty file, truncating an existing one. The parent directory must exist.
    fn create(&mut self, path: &ModulePath) -> Result<()>;

    /// Removes a file. Directory removal is not supported and fails with `InvalidPath`.
    fn remove(&mut self, path: &ModulePath) -> Result<()>;

    fn mkdir(&mut self, path: &ModulePath) -> Result<()>;

    /// Returns the full content. Never depends on or moves a cursor.
    fn read_all(&self, handle: &FileHandle) -> Result<Vec<u8>>;

    /// Replaces the full content.
    fn write_all(&mut self, handle: &FileHandle, bytes: &[u8]) -> Result<()>;

    fn close(&mut self, handle: FileHandle) -> Result<()>;

    /// The canonical absolute path the handle was opened with.
    fn realpath(&self, handle: &FileHandle) -> Result<ModulePath>;

    /// Cached string rendering of [`FileSystem::realpath`].
    fn display_path(&self, handle: &FileHandle) -> Result<&str>;

    /// Resolves `relative` starting at the directory `context` and returns the canonical path
    /// of the node it names. The node must exist.
    fn resolve_relative(
        &self,
        context: &ModulePath,
        relative: &ModulePath,
    ) -> Result<ModulePath>;

    fn is_file(&self, path: &ModulePath) -> bool;

    fn stat(&self) -> FsStat;

    /// Opens, reads and closes `path`. The handle is closed even when the read fails.
    fn read_file(&mut self, path: &ModulePath) -> Result<Vec<u8>> {
        let handle = self.open(path)?;
        let bytes = self.read_all(&handle);
        self.close(handle)?;
        bytes
    }

    fn write_file(&mut self, path: &ModulePath, bytes: &[u8]) -> Result<()> {
        self.create(path)?;
        let handle = self.open(path)?;
        let written = self.write_all(&handle, bytes);
        self.close(handle)?;
        written
    }

    /// Creates `path` and every missing ancestor. Existing directories are left alone.
    fn mkdir_all(&mut self, path: &ModulePath) -> Result<()> {
        if !path.is_absolute() {
            return Err(Error::invalid_path(format!("mkdir_all needs an absolute path: {path}")));
        }
        let mut current = ModulePath::root();
        for seg in path.segments() {
            current = current.child(seg);
            if self.resolve_relative(&ModulePath::root(), &current).is_err() {
                self.mkdir(&current)?;
            }
        }
        Ok(())
    }
}

/// Book-keeping for one open handle, shared by both backends.
#[derive(Debug)]
struct OpenFile<T> {
    target: T,
    realpath: ModulePath,
    rendered: OnceCell<String>,
}

impl<T> OpenFile<T> {
    fn new(target: T, realpath: ModulePath) -> Self {
        Self { target, realpath, rendered: OnceCell::new() }
    }

    fn rendered(&self) -> &str {
        self.rendered.get_or_init(|| self.realpath.to_string())
    }
}

fn stale_handle(handle: &FileHandle) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("handle {} is not open", handle.id),
    ))
}
