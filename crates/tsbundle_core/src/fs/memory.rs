use std::collections::BTreeMap;

use log::trace;

use super::{FileHandle, FileSystem, FsStat, HandleId, OpenFile, stale_handle};
use crate::{
    error::{Error, Result},
    path::{ModulePath, PARENT, PathBuilder},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

#[derive(Debug)]
enum NodeKind {
    File { data: Vec<u8> },
    Directory { children: Vec<NodeId> },
}

#[derive(Debug)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    kind: NodeKind,
}

impl Node {
    fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }
}

/// In-memory filesystem: a single-rooted tree of nodes stored in an arena.
///
/// Node ids are never reused. Removing a file drops its storage and empties its arena slot,
/// so a handle still pointing at it fails with `Io` instead of reading another file.
#[derive(Debug)]
pub struct MemoryFs {
    nodes: Vec<Option<Node>>,
    handles: BTreeMap<HandleId, OpenFile<NodeId>>,
    next_handle: u64,
}

impl Default for MemoryFs {
    fn default() -> Self {
        let root = Node {
            name: String::new(),
            parent: None,
            kind: NodeKind::Directory { children: Vec::new() },
        };
        Self { nodes: vec![Some(root)], handles: BTreeMap::new(), next_handle: 0 }
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from `(absolute path, content)` pairs, creating directories as needed.
    pub fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut fs = Self::new();
        for (path, content) in files {
            let path = ModulePath::parse(path);
            fs.mkdir_all(&path.parent_dir()?)?;
            fs.write_file(&path, content.as_bytes())?;
        }
        Ok(fs)
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Walks `segments` from `start`. `.` stays put, `..` moves to the parent and is illegal
    /// at the root or from a file, any other segment must name a child of a directory.
    fn resolve_from(&self, start: NodeId, segments: &[String]) -> Result<NodeId> {
        let mut current = start;
        for seg in segments {
            let node = self
                .node(current)
                .ok_or_else(|| Error::invalid_path("path runs through a removed node"))?;
            if seg == "." {
                continue;
            }
            if seg == PARENT {
                if node.is_file() {
                    return Err(Error::invalid_path(format!(
                        "cannot ascend from file '{}'",
                        node.name
                    )));
                }
                current = node
                    .parent
                    .ok_or_else(|| Error::invalid_path("cannot ascend past the root"))?;
                continue;
            }
            let NodeKind::Directory { children } = &node.kind else {
                return Err(Error::invalid_path(format!("'{}' is not a directory", node.name)));
            };
            current = children
                .iter()
                .copied()
                .find(|child| self.node(*child).is_some_and(|n| n.name == *seg))
                .ok_or_else(|| {
                    Error::invalid_path(format!("'{}' has no entry named '{seg}'", node.name))
                })?;
        }
        Ok(current)
    }

    fn lookup(&self, path: &ModulePath) -> Result<NodeId> {
        self.resolve_from(ROOT, path.segments())
            .map_err(|e| Error::invalid_path(format!("{path}: {e}")))
    }

    fn path_of(&self, id: NodeId) -> ModulePath {
        let mut builder = PathBuilder::new();
        let mut current = self.node(id);
        while let Some(node) = current {
            let Some(parent) = node.parent else { break };
            builder.push_front(&node.name);
            current = self.node(parent);
        }
        builder.absolute()
    }

    /// Resolves the directory that should contain `path` and returns it with the basename.
    fn split_target<'p>(&self, path: &'p ModulePath) -> Result<(NodeId, &'p str)> {
        let name = path.basename()?;
        if name == PARENT {
            return Err(Error::invalid_path(format!("{path}: cannot name an entry '..'")));
        }
        let parent = self.lookup(&path.parent_dir()?)?;
        match self.node(parent) {
            Some(node) if !node.is_file() => Ok((parent, name)),
            _ => Err(Error::invalid_path(format!("{path}: parent is not a directory"))),
        }
    }

    fn find_child(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        match &self.node(dir)?.kind {
            NodeKind::Directory { children } => children
                .iter()
                .copied()
                .find(|child| self.node(*child).is_some_and(|n| n.name == name)),
            NodeKind::File { .. } => None,
        }
    }

    fn add_child(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> Result<NodeId> {
        let id = NodeId(self.nodes.len());
        self.nodes.try_reserve(1)?;
        self.nodes.push(Some(Node { name: name.to_owned(), parent: Some(parent), kind }));
        match self.node_mut(parent).map(|n| &mut n.kind) {
            Some(NodeKind::Directory { children }) => {
                children.try_reserve(1)?;
                children.push(id);
                Ok(id)
            }
            _ => Err(Error::invalid_path(format!("cannot add '{name}' to a non-directory"))),
        }
    }

    fn open_file(&self, handle: &FileHandle) -> Result<&OpenFile<NodeId>> {
        self.handles.get(&handle.id).ok_or_else(|| stale_handle(handle))
    }
}

impl FileSystem for MemoryFs {
    fn open(&mut self, path: &ModulePath) -> Result<FileHandle> {
        let id = self.lookup(path)?;
        if !self.node(id).is_some_and(Node::is_file) {
            return Err(Error::invalid_path(format!("{path} is not a file")));
        }
        let handle = HandleId(self.next_handle);
        self.next_handle += 1;
        let realpath = self.path_of(id);
        trace!("Opened {} as {}", realpath, handle);
        self.handles.insert(handle, OpenFile::new(id, realpath));
        Ok(FileHandle { id: handle })
    }

    fn create(&mut self, path: &ModulePath) -> Result<()> {
        let (parent, name) = self.split_target(path)?;
        match self.find_child(parent, name) {
            Some(existing) => match self.node_mut(existing).map(|n| &mut n.kind) {
                Some(NodeKind::File { data }) => {
                    trace!("Truncating existing file {}", path);
                    data.clear();
                    Ok(())
                }
                _ => Err(Error::invalid_path(format!("{path} is a directory"))),
            },
            None => {
                trace!("Creating file {}", path);
                self.add_child(parent, name, NodeKind::File { data: Vec::new() }).map(|_| ())
            }
        }
    }

    fn remove(&mut self, path: &ModulePath) -> Result<()> {
        let (parent, name) = self.split_target(path)?;
        let id = self
            .find_child(parent, name)
            .ok_or_else(|| Error::invalid_path(format!("{path} does not exist")))?;
        if !self.node(id).is_some_and(Node::is_file) {
            return Err(Error::invalid_path(format!(
                "{path} is a directory; directory removal is not supported"
            )));
        }
        if let Some(NodeKind::Directory { children }) = self.node_mut(parent).map(|n| &mut n.kind)
        {
            children.retain(|child| *child != id);
        }
        trace!("Removed file {}", path);
        self.nodes[id.0] = None;
        Ok(())
    }

    fn mkdir(&mut self, path: &ModulePath) -> Result<()> {
        let (parent, name) = self.split_target(path)?;
        if self.find_child(parent, name).is_some() {
            return Err(Error::invalid_path(format!("{path} already exists")));
        }
        trace!("Creating directory {}", path);
        self.add_child(parent, name, NodeKind::Directory { children: Vec::new() }).map(|_| ())
    }

    fn read_all(&self, handle: &FileHandle) -> Result<Vec<u8>> {
        let open = self.open_file(handle)?;
        match self.node(open.target).map(|n| &n.kind) {
            Some(NodeKind::File { data }) => {
                let mut out = Vec::new();
                out.try_reserve_exact(data.len())?;
                out.extend_from_slice(data);
                Ok(out)
            }
            _ => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} was removed", open.rendered()),
            ))),
        }
    }

    fn write_all(&mut self, handle: &FileHandle, bytes: &[u8]) -> Result<()> {
        let target = self.open_file(handle)?.target;
        match self.node_mut(target).map(|n| &mut n.kind) {
            Some(NodeKind::File { data }) => {
                data.clear();
                data.try_reserve_exact(bytes.len())?;
                data.extend_from_slice(bytes);
                Ok(())
            }
            _ => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("handle {} points at a removed file", handle.id),
            ))),
        }
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
        let start = if relative.is_absolute() { ROOT } else { self.lookup(context)? };
        let id = self
            .resolve_from(start, relative.segments())
            .map_err(|e| Error::invalid_path(format!("{relative} from {context}: {e}")))?;
        Ok(self.path_of(id))
    }

    fn is_file(&self, path: &ModulePath) -> bool {
        self.lookup(path).ok().and_then(|id| self.node(id)).is_some_and(Node::is_file)
    }

    fn stat(&self) -> FsStat {
        FsStat {
            open_handles: self.handles.len(),
            files: self.nodes.iter().flatten().filter(|n| n.is_file()).count(),
        }
    }
}
