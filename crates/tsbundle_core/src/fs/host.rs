use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};

use log::trace;

use super::{FileHandle, FileSystem, FsStat, HandleId, OpenFile, stale_handle};
use crate::{
    error::{Error, Result},
    path::{ModulePath, PARENT},
};

/// Filesystem backed by the host disk. Relative paths are taken from the process working
/// directory.
#[derive(Debug, Default)]
pub struct HostFs {
    handles: BTreeMap<HandleId, OpenFile<PathBuf>>,
    next_handle: u64,
}

impl HostFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_file(&self, handle: &FileHandle) -> Result<&OpenFile<PathBuf>> {
        self.handles.get(&handle.id).ok_or_else(|| stale_handle(handle))
    }

    fn canonicalize(path: &ModulePath) -> Result<PathBuf> {
        if path.is_absolute() {
            path.normalize()?;
        }
        let std_path = path.to_std_path();
        std_path.canonicalize().map_err(|e| path_error(&std_path, e))
    }
}

/// Missing entries and non-directory path components surface as `InvalidPath` like they do in the in-memory store; anything
/// else stays an I/O error.
fn path_error(path: &Path, err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound
        | io::ErrorKind::AlreadyExists
        | io::ErrorKind::NotADirectory => {
            Error::invalid_path(format!("{}: {err}", path.display()))
        }
        _ => Error::Io(err),
    }
}

impl FileSystem for HostFs {
    fn open(&mut self, path: &ModulePath) -> Result<FileHandle> {
        let target = Self::canonicalize(path)?;
        if !target.is_file() {
            return Err(Error::invalid_path(format!("{} is not a file", target.display())));
        }
        let realpath = ModulePath::from_std_path(&target)?;
        let handle = HandleId(self.next_handle);
        self.next_handle += 1;
        trace!("Opened {} as {}", target.display(), handle);
        self.handles.insert(handle, OpenFile::new(target, realpath));
        Ok(FileHandle { id: handle })
    }

    fn create(&mut self, path: &ModulePath) -> Result<()> {
        let target = path.to_std_path();
        match target.parent() {
            Some(parent) if parent.as_os_str().is_empty() || parent.is_dir() => {}
            _ => {
                return Err(Error::invalid_path(format!(
                    "{}: parent directory does not exist",
                    target.display()
                )));
            }
        }
        if target.is_dir() {
            return Err(Error::invalid_path(format!("{} is a directory", target.display())));
        }
        trace!("Creating file {}", target.display());
        File::create(&target).map_err(|e| path_error(&target, e))?;
        Ok(())
    }

    fn remove(&mut self, path: &ModulePath) -> Result<()> {
        let target = path.to_std_path();
        let meta = fs::symlink_metadata(&target).map_err(|e| path_error(&target, e))?;
        if meta.is_dir() {
            return Err(Error::invalid_path(format!(
                "{} is a directory; directory removal is not supported",
                target.display()
            )));
        }
        trace!("Removing file {}", target.display());
        fs::remove_file(&target).map_err(|e| path_error(&target, e))
    }

    fn mkdir(&mut self, path: &ModulePath) -> Result<()> {
        let target = path.to_std_path();
        trace!("Creating directory {}", target.display());
        fs::create_dir(&target).map_err(|e| path_error(&target, e))
    }

    fn read_all(&self, handle: &FileHandle) -> Result<Vec<u8>> {
        let target = &self.open_file(handle)?.target;
        let mut file = File::open(target)?;
        let len = file.metadata()?.len();
        let mut out = Vec::new();
        out.try_reserve_exact(usize::try_from(len).map_err(|_| Error::OutOfMemory)?)?;
        file.read_to_end(&mut out)?;
        Ok(out)
    }

    fn write_all(&mut self, handle: &FileHandle, bytes: &[u8]) -> Result<()> {
        let target = &self.open_file(handle)?.target;
        fs::write(target, bytes)?;
        Ok(())
    }

    fn close(&mut self, handle: FileHandle) -> Result<()> {
        match self.handles.remove(&handle.id) {
            Some(open) => {
                trace!("Closed {} ({})", open.rendered(), handle.id);
                Ok(())
            }
            None => Err(stale_handle(&handle)),
        }
    }

    fn realpath(&self, handle: &FileHandle) -> Result<ModulePath> {
        Ok(self.open_file(handle)?.realpath.clone())
    }

    fn display_path(&self, handle: &FileHandle) -> Result<&str> {
        Ok(self.open_file(handle)?.rendered())
    }

    fn resolve_relative(
        &self,
        context: &ModulePath,
        relative: &ModulePath,
    ) -> Result<ModulePath> {
        let mut current = Self::canonicalize(context)?;
        for seg in relative.segments() {
            if seg == "." {
                continue;
            }
            if seg == PARENT {
                if !current.is_dir() {
                    return Err(Error::invalid_path(format!(
                        "cannot ascend from file '{}'",
                        current.display()
                    )));
                }
                if !current.pop() {
                    return Err(Error::invalid_path("cannot ascend past the root"));
                }
                continue;
            }
            if !current.is_dir() {
                let message = format!("'{}' is not a directory", current.display());
                return Err(Error::invalid_path(message));
            }
            current.push(seg);
            // Symlinks resolve at every step; `..` ascends from the link target
            current = current.canonicalize().map_err(|e| path_error(&current, e))?;
        }
        trace!("Resolved '{}' from {} to {}", relative, context, current.display());
        ModulePath::from_std_path(&current)
    }

    fn is_file(&self, path: &ModulePath) -> bool {
        path.to_std_path().is_file()
    }

    /// `files` counts the distinct files currently open; the host disk itself is not walked.
    fn stat(&self) -> FsStat {
        let files: BTreeSet<&PathBuf> = self.handles.values().map(|open| &open.target).collect();
        FsStat { open_handles: self.handles.len(), files: files.len() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, path: &str, content: &str) -> PathBuf {
        let file_path = dir.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    fn root_of(temp_dir: &TempDir) -> ModulePath {
        ModulePath::from_std_path(&temp_dir.path().canonicalize().unwrap()).unwrap()
    }

    #[test]
    fn test_open_read_close() {
        let temp_dir = TempDir::new().unwrap();
        let root = root_of(&temp_dir);
        create_test_file(temp_dir.path(), "src/main.ts", "import './a';");

        let mut fs = HostFs::new();
        let handle = fs.open(&root.join(&ModulePath::parse("src/main.ts"))).unwrap();
        assert_eq!(fs.read_all(&handle).unwrap(), b"import './a';");
        assert_eq!(fs.read_all(&handle).unwrap(), b"import './a';");
        assert_eq!(fs.realpath(&handle).unwrap(), root.join(&ModulePath::parse("src/main.ts")));
        assert_eq!(fs.stat(), FsStat { open_handles: 1, files: 1 });
        fs.close(handle).unwrap();
        assert_eq!(fs.stat().open_handles, 0);
    }

    #[test]
    fn test_open_missing_is_invalid_path() {
        let temp_dir = TempDir::new().unwrap();
        let root = root_of(&temp_dir);
        let mut fs = HostFs::new();
        let err = fs.open(&root.child("missing.ts")).unwrap_err();
        assert!(err.is_invalid_path());
    }

    #[test]
    fn test_create_write_remove() {
        let temp_dir = TempDir::new().unwrap();
        let root = root_of(&temp_dir);
        let mut fs = HostFs::new();

        let file = root.child("new.ts");
        fs.write_file(&file, b"first version").unwrap();
        fs.write_file(&file, b"second").unwrap();
        assert_eq!(fs.read_file(&file).unwrap(), b"second");

        fs.remove(&file).unwrap();
        assert!(!fs.is_file(&file));
    }

    #[test]
    fn test_create_without_parent_fails() {
        let temp_dir = TempDir::new().unwrap();
        let root = root_of(&temp_dir);
        let mut fs = HostFs::new();
        let err = fs.create(&root.child("missing").child("file.ts")).unwrap_err();
        assert!(err.is_invalid_path());
    }

    #[test]
    fn test_remove_directory_is_unsupported() {
        let temp_dir = TempDir::new().unwrap();
        let root = root_of(&temp_dir);
        let mut fs = HostFs::new();
        fs.mkdir(&root.child("dir")).unwrap();
        assert!(fs.remove(&root.child("dir")).unwrap_err().is_invalid_path());
        assert!(fs.mkdir(&root.child("dir")).unwrap_err().is_invalid_path());
    }

    #[test]
    fn test_resolve_relative() {
        let temp_dir = TempDir::new().unwrap();
        let root = root_of(&temp_dir);
        create_test_file(temp_dir.path(), "a/x.ts", "x");
        fs::create_dir_all(temp_dir.path().join("a/b/c")).unwrap();

        let fs = HostFs::new();
        let deep = root.join(&ModulePath::parse("a/b/c"));
        let via_parents = fs.resolve_relative(&deep, &ModulePath::parse("./../../x.ts")).unwrap();
        let direct = fs.resolve_relative(&root, &ModulePath::parse("a/x.ts")).unwrap();
        assert_eq!(via_parents, direct);

        let missing = fs.resolve_relative(&deep, &ModulePath::parse("./nope.ts")).unwrap_err();
        assert!(missing.is_invalid_path());
    }

    #[test]
    fn test_resolve_parent_from_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let root = root_of(&temp_dir);
        create_test_file(temp_dir.path(), "a/x.ts", "x");
        create_test_file(temp_dir.path(), "top.ts", "top");

        let fs = HostFs::new();
        let from_file = root.join(&ModulePath::parse("a/x.ts"));
        let err = fs.resolve_relative(&from_file, &ModulePath::parse("../top.ts")).unwrap_err();
        assert!(err.is_invalid_path());

        let through_file = fs.resolve_relative(&root, &ModulePath::parse("top.ts/x.ts"));
        assert!(through_file.unwrap_err().is_invalid_path());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_parent_follows_symlink_target() {
        let temp_dir = TempDir::new().unwrap();
        let root = root_of(&temp_dir);
        create_test_file(temp_dir.path(), "a/b/c/deep.ts", "deep");
        create_test_file(temp_dir.path(), "a/b/shared.ts", "shared");
        std::os::unix::fs::symlink(temp_dir.path().join("a/b/c"), temp_dir.path().join("link"))
            .unwrap();

        let fs = HostFs::new();
        let resolved = fs.resolve_relative(&root, &ModulePath::parse("link/../shared.ts")).unwrap();
        assert_eq!(resolved, root.join(&ModulePath::parse("a/b/shared.ts")));
    }

    #[test]
    fn test_resolve_past_root_fails() {
        let fs = HostFs::new();
        let err = fs.resolve_relative(&ModulePath::root(), &ModulePath::parse("../etc")).unwrap_err();
        assert!(err.is_invalid_path());
    }
}
