//! Structured paths used to name files in every filesystem backend.
//!
//! A [`ModulePath`] is an ordered list of segments plus an absolute/relative flag. Empty
//! segments and `.` never survive construction; `..` is kept as input and resolved away by
//! [`ModulePath::normalize`] or by a filesystem backend.

use std::{
    collections::VecDeque,
    fmt,
    hash::{Hash, Hasher},
    path::{Component, Path, PathBuf},
};

use crate::error::{Error, Result};

pub const SEPARATOR: char = '/';
pub const PARENT: &str = "..";
const CURRENT: &str = ".";

const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const ABSOLUTE_SEED: u64 = 0xcbf2_9ce4_8422_2325;
const RELATIVE_SEED: u64 = 0x84222325_cbf29ce4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePath {
    segments: Vec<String>,
    absolute: bool,
}

impl ModulePath {
    /// Splits `s` on `/`, dropping empty and `.` segments. A leading separator makes the
    /// path absolute.
    pub fn parse(s: &str) -> Self {
        let absolute = s.starts_with(SEPARATOR);
        let segments = s
            .split(SEPARATOR)
            .filter(|seg| !seg.is_empty() && *seg != CURRENT)
            .map(str::to_owned)
            .collect();
        Self { segments, absolute }
    }

    pub fn root() -> Self {
        Self { segments: Vec::new(), absolute: true }
    }

    pub fn current() -> Self {
        Self { segments: Vec::new(), absolute: false }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// True for `/` and `./`.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// An absolute path with every `..` resolved away.
    pub fn is_canonical(&self) -> bool {
        self.absolute && !self.segments.iter().any(|s| s == PARENT)
    }

    pub fn basename(&self) -> Result<&str> {
        self.segments
            .last()
            .map(String::as_str)
            .ok_or_else(|| Error::invalid_path(format!("'{self}' has no basename")))
    }

    /// The path without its last segment.
    pub fn parent_dir(&self) -> Result<ModulePath> {
        match self.segments.split_last() {
            Some((_, rest)) => Ok(Self { segments: rest.to_vec(), absolute: self.absolute }),
            None => Err(Error::invalid_path(format!("'{self}' has no parent directory"))),
        }
    }

    pub fn child(&self, name: &str) -> ModulePath {
        let mut builder = PathBuilder::from(self);
        builder.push(name);
        builder.finish(self.absolute)
    }

    /// Appends `other` to this path. An absolute `other` replaces this path entirely.
    pub fn join(&self, other: &ModulePath) -> ModulePath {
        if other.absolute {
            return other.clone();
        }
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments, absolute: self.absolute }
    }

    /// Replaces the basename `name` with `name.ext`.
    pub fn with_extension(&self, ext: &str) -> Result<ModulePath> {
        let name = self.basename()?;
        let mut out = self.parent_dir()?;
        out.segments.push(format!("{name}.{ext}"));
        Ok(out)
    }

    /// Resolves `..` segments lexically. Ascending past the root of an absolute path fails
    /// with `InvalidPath`; leading `..` segments of a relative path are kept.
    pub fn normalize(&self) -> Result<ModulePath> {
        let mut segments: Vec<String> = Vec::with_capacity(self.segments.len());
        for seg in &self.segments {
            if seg != PARENT {
                segments.push(seg.clone());
                continue;
            }
            match segments.last() {
                Some(last) if last != PARENT => {
                    segments.pop();
                }
                _ if self.absolute => {
                    return Err(Error::invalid_path(format!("'{self}' ascends past the root")));
                }
                _ => segments.push(seg.clone()),
            }
        }
        Ok(Self { segments, absolute: self.absolute })
    }

    /// FNV-1a over the segments, seeded differently for absolute and relative paths so that
    /// `/a/b` and `./a/b` do not collide.
    pub fn stable_hash(&self) -> u64 {
        let mut hash = if self.absolute { ABSOLUTE_SEED } else { RELATIVE_SEED };
        for seg in &self.segments {
            for byte in seg.bytes().chain(std::iter::once(0xff)) {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        }
        hash
    }

    pub fn to_std_path(&self) -> PathBuf {
        let mut out = if self.absolute { PathBuf::from("/") } else { PathBuf::from(".") };
        out.extend(&self.segments);
        out
    }

    pub fn from_std_path(path: &Path) -> Result<ModulePath> {
        let mut builder = PathBuilder::new();
        for component in path.components() {
            match component {
                Component::Normal(seg) => {
                    let seg = seg.to_str().ok_or_else(|| {
                        Error::invalid_path(format!("{} is not valid UTF-8", path.display()))
                    })?;
                    builder.push(seg);
                }
                Component::ParentDir => {
                    builder.push(PARENT);
                }
                Component::CurDir | Component::RootDir => {}
                Component::Prefix(_) => {
                    return Err(Error::invalid_path(format!(
                        "{} has an unsupported prefix",
                        path.display()
                    )));
                }
            }
        }
        Ok(builder.finish(path.has_root()))
    }
}

impl Hash for ModulePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.stable_hash());
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.absolute, self.segments.is_empty()) {
            (true, true) => f.write_str("/"),
            (false, true) => f.write_str("./"),
            (absolute, false) => {
                if !absolute {
                    f.write_str(".")?;
                }
                for seg in &self.segments {
                    write!(f, "/{seg}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for ModulePath {
    fn from(s: &str) -> Self {
        ModulePath::parse(s)
    }
}

/// Builds a [`ModulePath`] one segment at a time, from either end.
///
/// Every pushed segment is copied, so the finished path never borrows from the caller.
#[derive(Debug, Default, Clone)]
pub struct PathBuilder {
    segments: VecDeque<String>,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `seg`. A segment containing `/` is split; empty and `.` parts are dropped.
    pub fn push(&mut self, seg: &str) -> &mut Self {
        for part in seg.split(SEPARATOR).filter(|p| !p.is_empty() && *p != CURRENT) {
            self.segments.push_back(part.to_owned());
        }
        self
    }

    /// Prepends `seg`, for callers that discover segments leaf-first.
    pub fn push_front(&mut self, seg: &str) -> &mut Self {
        for part in seg.rsplit(SEPARATOR).filter(|p| !p.is_empty() && *p != CURRENT) {
            self.segments.push_front(part.to_owned());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn absolute(self) -> ModulePath {
        self.finish(true)
    }

    pub fn relative(self) -> ModulePath {
        self.finish(false)
    }

    fn finish(self, absolute: bool) -> ModulePath {
        ModulePath { segments: self.segments.into(), absolute }
    }
}

impl From<&ModulePath> for PathBuilder {
    fn from(path: &ModulePath) -> Self {
        Self { segments: path.segments.iter().cloned().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_absolute() {
        let p = ModulePath::parse("/a/b/c");
        assert!(p.is_absolute());
        assert_eq!(p.segments(), ["a", "b", "c"]);
    }

    #[test]
    fn test_parse_drops_empty_and_current_segments() {
        let p = ModulePath::parse("./a//./b/");
        assert!(!p.is_absolute());
        assert_eq!(p.segments(), ["a", "b"]);
    }

    #[test]
    fn test_parse_keeps_parent_segments() {
        let p = ModulePath::parse("../baz");
        assert!(!p.is_absolute());
        assert_eq!(p.segments(), ["..", "baz"]);
    }

    #[test]
    fn test_display() {
        assert_eq!(ModulePath::parse("/a/b/c").to_string(), "/a/b/c");
        assert_eq!(ModulePath::parse("a/b").to_string(), "./a/b");
        assert_eq!(ModulePath::root().to_string(), "/");
        assert_eq!(ModulePath::current().to_string(), "./");
        assert_eq!(ModulePath::parse("/x").to_string(), "/x");
    }

    #[test]
    fn test_round_trip_canonical_paths() {
        for s in ["/", "/a", "/a/b/c", "/src/components/Button.tsx"] {
            let p = ModulePath::parse(s);
            assert!(p.is_canonical());
            assert_eq!(ModulePath::parse(&p.to_string()), p);
        }
    }

    #[test]
    fn test_absolute_and_relative_differ() {
        let abs = ModulePath::parse("/a/b");
        let rel = ModulePath::parse("./a/b");
        assert_ne!(abs, rel);
        assert_ne!(abs.stable_hash(), rel.stable_hash());
        assert_ne!(ModulePath::root().stable_hash(), ModulePath::current().stable_hash());
    }

    #[test]
    fn test_equal_paths_hash_equal() {
        let a = ModulePath::parse("/a/b/c");
        let b = ModulePath::parse("//a/./b/c/");
        assert_eq!(a, b);
        assert_eq!(a.stable_hash(), b.stable_hash());

        let set: HashSet<ModulePath> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_hash_respects_segment_boundaries() {
        let joined = ModulePath::parse("/ab");
        let split = ModulePath::parse("/a/b");
        assert_ne!(joined.stable_hash(), split.stable_hash());
    }

    #[test]
    fn test_basename_and_parent_dir() {
        let p = ModulePath::parse("/src/main.ts");
        assert_eq!(p.basename().unwrap(), "main.ts");
        assert_eq!(p.parent_dir().unwrap(), ModulePath::parse("/src"));
        assert_eq!(p.parent_dir().unwrap().parent_dir().unwrap(), ModulePath::root());
    }

    #[test]
    fn test_basename_and_parent_dir_of_empty_path_fail() {
        assert!(ModulePath::root().basename().unwrap_err().is_invalid_path());
        assert!(ModulePath::current().basename().unwrap_err().is_invalid_path());
        assert!(ModulePath::root().parent_dir().unwrap_err().is_invalid_path());
    }

    #[test]
    fn test_join_and_normalize() {
        let dir = ModulePath::parse("/a/b/c");
        let joined = dir.join(&ModulePath::parse("./../../x"));
        assert_eq!(joined.normalize().unwrap(), ModulePath::parse("/a/x"));
        assert_eq!(dir.join(&ModulePath::parse("/y")), ModulePath::parse("/y"));
    }

    #[test]
    fn test_normalize_past_root_fails() {
        let p = ModulePath::parse("/a/../..");
        assert!(p.normalize().unwrap_err().is_invalid_path());
    }

    #[test]
    fn test_normalize_relative_keeps_leading_parents() {
        let p = ModulePath::parse("../../a/../b");
        assert_eq!(p.normalize().unwrap().segments(), ["..", "..", "b"]);
    }

    #[test]
    fn test_with_extension() {
        let p = ModulePath::parse("/src/math");
        assert_eq!(p.with_extension("ts").unwrap(), ModulePath::parse("/src/math.ts"));
        assert!(ModulePath::root().with_extension("ts").is_err());
    }

    #[test]
    fn test_builder_forward_and_reverse() {
        let mut forward = PathBuilder::new();
        forward.push("a").push("b").push("c");

        let mut reverse = PathBuilder::new();
        reverse.push_front("c").push_front("b").push_front("a");

        assert_eq!(forward.absolute(), ModulePath::parse("/a/b/c"));
        assert_eq!(reverse.relative(), ModulePath::parse("./a/b/c"));
    }

    #[test]
    fn test_builder_zero_segments() {
        assert_eq!(PathBuilder::new().absolute(), ModulePath::root());
        assert_eq!(PathBuilder::new().relative(), ModulePath::current());
    }

    #[test]
    fn test_builder_copies_segments() {
        let mut buf = String::from("first");
        let mut builder = PathBuilder::new();
        builder.push(&buf);
        buf.clear();
        buf.push_str("second");
        assert_eq!(builder.absolute().segments(), ["first"]);
    }

    #[test]
    fn test_builder_splits_compound_segments() {
        let mut builder = PathBuilder::new();
        builder.push_front("c/d").push_front("a/b");
        assert_eq!(builder.absolute(), ModulePath::parse("/a/b/c/d"));
    }

    #[test]
    fn test_std_path_conversion() {
        let p = ModulePath::from_std_path(Path::new("/tmp/project/src/main.ts")).unwrap();
        assert_eq!(p, ModulePath::parse("/tmp/project/src/main.ts"));
        assert_eq!(p.to_std_path(), PathBuf::from("/tmp/project/src/main.ts"));
    }
}
