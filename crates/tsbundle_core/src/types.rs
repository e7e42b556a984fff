use std::ops::Range;

use crate::path::ModulePath;

/// One module reference found in a parsed file.
///
/// The request text is copied out of the parse buffer, so an `Import` stays valid after the
/// file is re-parsed or dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Module specifier without its quotes, e.g. `../baz`
    pub request: String,
    pub kind: ImportKind,
    /// `import type ...` / `export type ... from ...`
    pub type_only: bool,
    /// Byte range of `request` in the source it was extracted from
    pub span: Range<usize>,
}

impl Import {
    pub fn is_relative(&self) -> bool {
        self.request.starts_with('.')
    }

    pub fn to_path(&self) -> ModulePath {
        ModulePath::parse(&self.request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import x from '...'`, `import '...'`, `import x = require('...')`
    Static,
    /// `export { x } from '...'`, `export * from '...'`
    ReExport,
    /// `import('...')` with a string literal argument
    Dynamic,
}
