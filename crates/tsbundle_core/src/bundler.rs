use log::{debug, info, trace};

use crate::{
    engine::SyntaxEngine,
    error::{Error, Result},
    fs::FileSystem,
    graph::ModuleGraph,
    parser::FileParser,
    path::ModulePath,
    resolver::{PackageResolver, Resolution, resolve_relative_import},
    types::Import,
};

#[derive(Default)]
pub struct BundleOptions {
    /// Strategy for non-relative imports. Without one, every such import fails the bundle
    /// with `UnsupportedImport`.
    pub package_resolver: Option<Box<dyn PackageResolver>>,
    /// Also follow `import type` edges, which carry no runtime code
    pub follow_type_imports: bool,
}

/// Builds the module graph reachable from an entry file.
pub struct Bundler<'fs> {
    fs: &'fs mut dyn FileSystem,
    options: BundleOptions,
}

impl<'fs> Bundler<'fs> {
    pub fn new(fs: &'fs mut dyn FileSystem) -> Self {
        Self::with_options(fs, BundleOptions::default())
    }

    pub fn with_options(fs: &'fs mut dyn FileSystem, options: BundleOptions) -> Self {
        Self { fs, options }
    }

    pub fn fs(&self) -> &dyn FileSystem {
        &*self.fs
    }

    /// Discovers, parses and registers every file transitively imported by `entry`.
    ///
    /// Any failure aborts the whole bundle and the partial graph is dropped.
    pub fn bundle(&mut self, entry: &ModulePath) -> Result<ModuleGraph> {
        info!("Bundling from entry: {}", entry);
        let handle = self.fs.open(entry)?;
        let canonical = self.fs.realpath(&handle);
        self.fs.close(handle)?;
        let canonical = canonical?;
        debug!("Entry canonical path: {}", canonical);

        let mut engine = SyntaxEngine::new()?;
        let mut graph = ModuleGraph::default();
        self.collect_modules(&mut engine, &mut graph, &canonical)?;

        info!("Bundle complete: {} modules", graph.len());
        Ok(graph)
    }

    /// Depth-first, first-visit registration. A path already in the graph is returned
    /// as-is, which also stops import cycles.
    fn collect_modules(
        &mut self,
        engine: &mut SyntaxEngine,
        graph: &mut ModuleGraph,
        path: &ModulePath,
    ) -> Result<usize> {
        if let Some(index) = graph.index_of(path) {
            trace!("Already visited: {}", path);
            return Ok(index);
        }

        let mut parser = FileParser::new(path.clone());
        parser.parse(&mut *self.fs, engine)?;
        let imports = parser.get_referenced_imports()?;
        let dir = path.parent_dir()?;

        let index = graph.insert(parser);
        debug!("Registered module #{}: {} ({} imports)", index, path, imports.len());

        for import in imports {
            if import.type_only && !self.options.follow_type_imports {
                trace!("Skipping type-only import '{}' in {}", import.request, path);
                continue;
            }

            let resolved = if import.is_relative() {
                resolve_relative_import(&*self.fs, &dir, &import.to_path()).map_err(|e| match e {
                    Error::InvalidPath(msg) => {
                        Error::invalid_path(format!("{msg} (imported by {path})"))
                    }
                    other => other,
                })?
            } else {
                match self.resolve_package(&dir, &import, path)? {
                    Some(resolved) => resolved,
                    None => {
                        graph.add_external(index, import.request);
                        continue;
                    }
                }
            };

            let child = self.collect_modules(engine, graph, &resolved)?;
            graph.add_dependency(index, child);
        }

        Ok(index)
    }

    /// `Ok(None)` means the import is external.
    fn resolve_package(
        &self,
        dir: &ModulePath,
        import: &Import,
        from: &ModulePath,
    ) -> Result<Option<ModulePath>> {
        let unsupported = || Error::UnsupportedImport {
            request: import.request.clone(),
            from: from.to_string(),
        };
        let Some(resolver) = &self.options.package_resolver else {
            return Err(unsupported());
        };
        match resolver.resolve(&*self.fs, dir, &import.request)? {
            Resolution::Module(path) => Ok(Some(path)),
            Resolution::External => Ok(None),
            Resolution::Unresolved => Err(unsupported()),
        }
    }
}
