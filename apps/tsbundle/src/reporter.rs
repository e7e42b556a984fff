use std::{
    collections::BTreeSet,
    env,
    io::{self, Write},
};

use colored::Colorize;
use log::{debug, trace};
use serde::Serialize;
use tsbundle_core::{EmitOrder, Error, ModuleGraph, ModulePath, PathBuilder};

/// Machine-readable summary of a bundle, as printed by `--format json`.
#[derive(Debug, Serialize)]
pub struct BundleReport {
    pub entry: String,
    pub order: Vec<String>,
    pub modules: Vec<ModuleReport>,
    pub externals: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ModuleReport {
    pub path: String,
    pub bytes: usize,
    pub dependencies: Vec<String>,
}

impl BundleReport {
    /// Modules are listed in discovery order; `order` lists the same paths in emission order.
    pub fn from_graph(graph: &ModuleGraph, order: EmitOrder) -> Self {
        let path_at = |index: usize| {
            graph.module(index).map(|module| module.path().to_string()).unwrap_or_default()
        };

        let modules = graph
            .iter()
            .map(|module| ModuleReport {
                path: module.path().to_string(),
                bytes: module.source().len(),
                dependencies: module.dependencies().iter().map(|&dep| path_at(dep)).collect(),
            })
            .collect();

        let externals: BTreeSet<&String> =
            graph.iter().flat_map(|module| module.externals()).collect();

        Self {
            entry: graph.entry().map(|module| module.path().to_string()).unwrap_or_default(),
            order: graph.order(order).into_iter().map(path_at).collect(),
            modules,
            externals: externals.into_iter().cloned().collect(),
        }
    }
}

pub fn print_json<W: Write>(writer: &mut W, report: &BundleReport) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, report)?;
    writeln!(writer)?;
    writer.flush()
}

/// Renders a module path relative to the working directory for clickable links
fn relativize_to_cwd(path: &ModulePath) -> String {
    let cwd = env::current_dir().map_err(Error::from);
    let cwd = match cwd.and_then(|cwd| ModulePath::from_std_path(&cwd)) {
        Ok(cwd) => cwd,
        Err(e) => {
            debug!("Failed to get current directory: {}", e);
            return path.to_string();
        }
    };
    let result = relative_display(path, &cwd);
    trace!("Relativized '{}' to '{}'", path, result);
    result
}

/// `path` as seen from the directory `base`: the shared leading segments are dropped and
/// every remaining segment of `base` becomes a `..` step.
fn relative_display(path: &ModulePath, base: &ModulePath) -> String {
    let target = path.segments();
    let from = base.segments();
    let shared = target.iter().zip(from).take_while(|(a, b)| a == b).count();

    let mut builder = PathBuilder::new();
    for _ in shared..from.len() {
        builder.push("..");
    }
    for seg in &target[shared..] {
        builder.push(seg);
    }

    if builder.is_empty() {
        return ".".to_string();
    }
    builder.relative().segments().join("/")
}

pub fn print_module_tree<W: Write>(
    writer: &mut W,
    graph: &ModuleGraph,
    order: EmitOrder,
) -> io::Result<()> {
    let indices = graph.order(order);
    debug!("Printing {} modules in {:?} order", indices.len(), order);

    writeln!(
        writer,
        "{} Bundled {} modules ({:?} order)\n",
        "✓".green().bold(),
        graph.len().to_string().cyan(),
        order
    )?;

    for index in indices {
        let Some(module) = graph.module(index) else { continue };
        let label = relativize_to_cwd(module.path());
        let label = if index == 0 { label.bright_white().bold() } else { label.blue() };
        writeln!(writer, "{} ({} bytes)", label, module.source().len().to_string().cyan())?;

        let deps = module.dependencies();
        let externals = module.externals();
        let total = deps.len() + externals.len();
        let children = deps
            .iter()
            .filter_map(|&dep| graph.module(dep))
            .map(|dep| relativize_to_cwd(dep.path()).normal())
            .chain(externals.iter().map(|request| format!("{request} (external)").dimmed()));

        for (idx, child) in children.enumerate() {
            let prefix = if idx + 1 == total { "└──" } else { "├──" };
            writeln!(writer, "{}  {}", prefix.dimmed(), child)?;
        }
    }

    print_summary(writer, graph)?;
    writer.flush()
}

fn print_summary<W: Write>(writer: &mut W, graph: &ModuleGraph) -> io::Result<()> {
    let total_bytes: usize = graph.iter().map(|module| module.source().len()).sum();
    let edges: usize = graph.iter().map(|module| module.dependencies().len()).sum();
    let externals: BTreeSet<&String> = graph.iter().flat_map(|module| module.externals()).collect();

    writeln!(writer, "\n{}", "─".repeat(60).dimmed())?;
    writeln!(writer, "{}", "Summary".bold())?;
    writeln!(writer, "  Modules: {}", graph.len().to_string().yellow().bold())?;
    writeln!(writer, "  Import edges: {}", edges.to_string().yellow())?;
    writeln!(writer, "  Total size: {} bytes", total_bytes.to_string().yellow())?;
    if !externals.is_empty() {
        let list: Vec<&str> = externals.iter().map(|s| s.as_str()).collect();
        writeln!(writer, "  Externals: {}", list.join(", ").dimmed())?;
    }
    Ok(())
}
