use std::io::{self, Write};

use indexmap::IndexMap;
use log::debug;

use crate::{parser::FileParser, path::ModulePath};

/// Order in which modules are handed to the code generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmitOrder {
    /// First-visit depth-first order, entry first
    Discovery,
    /// Dependencies before their dependents; cycles are cut at the edge that closes them
    #[default]
    Dependency,
}

/// A file in the graph together with its parse and its outgoing edges.
#[derive(Debug)]
pub struct Module {
    parser: FileParser,
    dependencies: Vec<usize>,
    externals: Vec<String>,
}

impl Module {
    pub fn path(&self) -> &ModulePath {
        self.parser.path()
    }

    /// Verbatim bytes the module was parsed from.
    pub fn source(&self) -> &[u8] {
        self.parser.source().unwrap_or_default()
    }

    pub fn parser(&self) -> &FileParser {
        &self.parser
    }

    /// Indices of the modules this one imports, in import order, without duplicates.
    pub fn dependencies(&self) -> &[usize] {
        &self.dependencies
    }

    /// Requests left for the runtime to provide.
    pub fn externals(&self) -> &[String] {
        &self.externals
    }
}

/// Every file discovered from one entry point, keyed by canonical path.
///
/// Modules are stored in discovery order and addressed by their index; the entry is index 0.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: IndexMap<ModulePath, Module>,
}

impl ModuleGraph {
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn contains(&self, path: &ModulePath) -> bool {
        self.modules.contains_key(path)
    }

    pub fn index_of(&self, path: &ModulePath) -> Option<usize> {
        self.modules.get_index_of(path)
    }

    pub fn get(&self, path: &ModulePath) -> Option<&Module> {
        self.modules.get(path)
    }

    pub fn module(&self, index: usize) -> Option<&Module> {
        self.modules.get_index(index).map(|(_, module)| module)
    }

    pub fn entry(&self) -> Option<&Module> {
        self.module(0)
    }

    /// Modules in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &ModulePath> {
        self.modules.keys()
    }

    pub(crate) fn insert(&mut self, parser: FileParser) -> usize {
        let path = parser.path().clone();
        let module = Module { parser, dependencies: Vec::new(), externals: Vec::new() };
        self.modules.insert_full(path, module).0
    }

    pub(crate) fn add_dependency(&mut self, from: usize, to: usize) {
        if let Some((_, module)) = self.modules.get_index_mut(from)
            && !module.dependencies.contains(&to)
        {
            module.dependencies.push(to);
        }
    }

    pub(crate) fn add_external(&mut self, from: usize, request: String) {
        if let Some((_, module)) = self.modules.get_index_mut(from)
            && !module.externals.contains(&request)
        {
            module.externals.push(request);
        }
    }

    /// Module indices in the requested order. Every module appears exactly once.
    pub fn order(&self, order: EmitOrder) -> Vec<usize> {
        match order {
            EmitOrder::Discovery => (0..self.modules.len()).collect(),
            EmitOrder::Dependency => self.post_order(),
        }
    }

    fn post_order(&self) -> Vec<usize> {
        let mut visited = vec![false; self.modules.len()];
        let mut out = Vec::with_capacity(self.modules.len());

        for root in 0..self.modules.len() {
            if visited[root] {
                continue;
            }
            visited[root] = true;
            // (module, position of the next dependency to look at)
            let mut stack = vec![(root, 0usize)];
            while let Some((current, next)) = stack.last_mut() {
                let deps = &self.modules[*current].dependencies;
                if let Some(&dep) = deps.get(*next) {
                    *next += 1;
                    if !visited[dep] {
                        visited[dep] = true;
                        stack.push((dep, 0));
                    }
                } else {
                    out.push(*current);
                    stack.pop();
                }
            }
        }
        out
    }

    /// Writes every module's source into `writer`, each preceded by a `// <path>` line.
    pub fn emit<W: Write>(&self, order: EmitOrder, writer: &mut W) -> io::Result<()> {
        let indices = self.order(order);
        debug!("Emitting {} modules in {:?} order", indices.len(), order);
        for index in indices {
            let Some(module) = self.module(index) else { continue };
            writeln!(writer, "// {}", module.path())?;
            let source = module.source();
            writer.write_all(source)?;
            if !source.ends_with(b"\n") {
                writeln!(writer)?;
            }
        }
        writer.flush()
    }
}
