//! Module graph construction for TypeScript/TSX bundling.
//!
//! This crate turns an entry file into the complete, deduplicated set of files it
//! transitively imports:
//! - A structured path model ([`ModulePath`]) naming files unambiguously
//! - A filesystem abstraction with in-memory ([`MemoryFs`]) and host-disk ([`HostFs`]) backends
//! - An incremental tree-sitter parser wrapper that extracts imports ([`FileParser`])
//! - The recursive graph builder ([`Bundler`]) and its result ([`ModuleGraph`])
//!
//! # Examples
//!
//! ```no_run
//! use tsbundle_core::{Bundler, EmitOrder, MemoryFs, ModulePath};
//!
//! # fn main() -> tsbundle_core::Result<()> {
//! let mut fs = MemoryFs::with_files([
//!     ("/main.ts", "import { add } from './math';\nconsole.log(add(1, 2));\n"),
//!     ("/math.ts", "export const add = (a: number, b: number) => a + b;\n"),
//! ])?;
//!
//! let graph = Bundler::new(&mut fs).bundle(&ModulePath::parse("/main.ts"))?;
//! assert_eq!(graph.len(), 2);
//!
//! let mut out = Vec::new();
//! graph.emit(EmitOrder::Dependency, &mut out)?;
//! # Ok(())
//! # }
//! ```

mod bundler;
mod constants;
mod engine;
mod error;
mod fs;
mod graph;
mod parser;
mod path;
mod resolver;
mod types;

// Re-export public API
pub use bundler::{BundleOptions, Bundler};
pub use constants::{INDEX_FILES, RESOLVE_EXTENSIONS, TSX_EXTENSIONS};
pub use engine::{Dialect, SyntaxEngine};
pub use error::{Error, Result};
pub use fs::{FileHandle, FileSystem, FsStat, HandleId, HostFs, MemoryFs};
pub use graph::{EmitOrder, Module, ModuleGraph};
pub use parser::{FileParser, ParsedSource};
pub use path::{ModulePath, PathBuilder};
pub use resolver::{ExternalPackages, PackageResolver, Resolution, resolve_relative_import};
pub use types::{Import, ImportKind};
