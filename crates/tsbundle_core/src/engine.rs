//! Boundary to the tree-sitter TypeScript grammars.

use log::trace;
use tree_sitter::{Language, Parser, Tree};

use crate::{
    constants::TSX_EXTENSIONS,
    error::{Error, Result},
    path::ModulePath,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TypeScript,
    Tsx,
}

impl Dialect {
    pub fn for_path(path: &ModulePath) -> Self {
        let ext = path.basename().ok().and_then(|name| name.rsplit_once('.')).map(|(_, e)| e);
        match ext {
            Some(ext) if TSX_EXTENSIONS.contains(&ext) => Dialect::Tsx,
            _ => Dialect::TypeScript,
        }
    }

    fn language(self) -> Language {
        match self {
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// Holds one configured parser per dialect for the duration of a bundle.
pub struct SyntaxEngine {
    typescript: Parser,
    tsx: Parser,
}

impl SyntaxEngine {
    pub fn new() -> Result<Self> {
        Ok(Self { typescript: parser_for(Dialect::TypeScript)?, tsx: parser_for(Dialect::Tsx)? })
    }

    /// Parses `source`, reusing `previous` for unchanged regions. `previous` must already
    /// carry the edit that turns its text into `source`. Returns `None` when the engine
    /// cannot produce a tree at all.
    pub fn parse_source(
        &mut self,
        dialect: Dialect,
        source: &[u8],
        previous: Option<&Tree>,
    ) -> Option<Tree> {
        trace!(
            "Parsing {} bytes as {:?} ({})",
            source.len(),
            dialect,
            if previous.is_some() { "incremental" } else { "fresh" }
        );
        let parser = match dialect {
            Dialect::TypeScript => &mut self.typescript,
            Dialect::Tsx => &mut self.tsx,
        };
        parser.parse(source, previous)
    }
}

fn parser_for(dialect: Dialect) -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&dialect.language())
        .map_err(|e| Error::parse(format!("<{dialect:?} grammar>"), e.to_string()))?;
    Ok(parser)
}
