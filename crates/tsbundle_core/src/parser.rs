use log::{debug, trace, warn};
use tree_sitter::{InputEdit, Node, Point, Tree, TreeCursor};

use crate::{
    engine::{Dialect, SyntaxEngine},
    error::{Error, Result},
    fs::FileSystem,
    path::ModulePath,
    types::{Import, ImportKind},
};

/// The syntax tree of one successful parse together with the bytes it was parsed from.
#[derive(Debug)]
pub struct ParsedSource {
    tree: Tree,
    content: Vec<u8>,
}

impl ParsedSource {
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

#[derive(Debug)]
enum ParseState {
    Unparsed,
    Parsed(ParsedSource),
}

/// Owns the current parse of a single file and re-parses it incrementally.
#[derive(Debug)]
pub struct FileParser {
    path: ModulePath,
    dialect: Dialect,
    state: ParseState,
}

impl FileParser {
    pub fn new(path: ModulePath) -> Self {
        let dialect = Dialect::for_path(&path);
        Self { path, dialect, state: ParseState::Unparsed }
    }

    pub fn path(&self) -> &ModulePath {
        &self.path
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self.state, ParseState::Parsed(_))
    }

    pub fn parsed(&self) -> Option<&ParsedSource> {
        match &self.state {
            ParseState::Parsed(parsed) => Some(parsed),
            ParseState::Unparsed => None,
        }
    }

    /// Source bytes of the current parse.
    pub fn source(&self) -> Option<&[u8]> {
        self.parsed().map(ParsedSource::content)
    }

    /// Reads the file's current bytes and parses them, handing the previous tree to the
    /// engine when there is one. The previous state is only replaced on success.
    pub fn parse(&mut self, fs: &mut dyn FileSystem, engine: &mut SyntaxEngine) -> Result<()> {
        let content = fs.read_file(&self.path)?;

        let previous = match &self.state {
            ParseState::Parsed(prev) => {
                let mut tree = prev.tree.clone();
                if let Some(edit) = input_edit(&prev.content, &content) {
                    trace!(
                        "Re-parsing {} with edit at bytes {}..{} -> {}",
                        self.path, edit.start_byte, edit.old_end_byte, edit.new_end_byte
                    );
                    tree.edit(&edit);
                }
                Some(tree)
            }
            ParseState::Unparsed => None,
        };

        let tree = engine
            .parse_source(self.dialect, &content, previous.as_ref())
            .ok_or_else(|| Error::parse(&self.path, "syntax engine produced no tree"))?;
        if tree.root_node().has_error() {
            warn!("{} contains syntax errors", self.path);
        }

        debug!("Parsed {} ({} bytes)", self.path, content.len());
        self.state = ParseState::Parsed(ParsedSource { tree, content });
        Ok(())
    }

    /// Walks the current tree once, in pre-order, and returns every module reference it finds.
    /// A reference whose source is not a non-empty string literal aborts the walk.
    pub fn get_referenced_imports(&self) -> Result<Vec<Import>> {
        let ParseState::Parsed(parsed) = &self.state else {
            return Err(Error::FileIsNotParsed(self.path.to_string()));
        };

        let mut imports = Vec::new();
        for node in Preorder::new(parsed.tree.root_node()) {
            let found = match node.kind() {
                "import_statement" => {
                    let source = import_source(node).ok_or_else(|| {
                        Error::parse(&self.path, "import statement without a source")
                    })?;
                    Some((source, ImportKind::Static, is_type_only(node)))
                }
                "export_statement" => node
                    .child_by_field_name("source")
                    .map(|source| (source, ImportKind::ReExport, is_type_only(node))),
                "call_expression" => {
                    dynamic_import_source(node).map(|source| (source, ImportKind::Dynamic, false))
                }
                _ => None,
            };

            if let Some((source, kind, type_only)) = found {
                let import = self.copy_out(parsed, source, kind, type_only)?;
                trace!("Found {:?} import '{}' in {}", import.kind, import.request, self.path);
                imports.push(import);
            }
        }

        debug!("Found {} imports in {}", imports.len(), self.path);
        Ok(imports)
    }

    fn copy_out(
        &self,
        parsed: &ParsedSource,
        source: Node<'_>,
        kind: ImportKind,
        type_only: bool,
    ) -> Result<Import> {
        let span = literal_content(source).ok_or_else(|| {
            Error::parse(
                &self.path,
                format!("expected a non-empty string literal at byte {}", source.start_byte()),
            )
        })?;
        let text = parsed
            .content
            .get(span.clone())
            .ok_or_else(|| Error::parse(&self.path, "import source outside of the buffer"))?;
        let request = std::str::from_utf8(text)
            .map_err(|e| Error::parse(&self.path, format!("import source is not UTF-8: {e}")))?
            .to_owned();
        Ok(Import { request, kind, type_only, span })
    }
}

fn import_source(node: Node<'_>) -> Option<Node<'_>> {
    if let Some(source) = node.child_by_field_name("source") {
        return Some(source);
    }
    // import x = require('...')
    let mut cursor = node.walk();
    let clause = node.named_children(&mut cursor).find(|c| c.kind() == "import_require_clause");
    clause.and_then(|c| c.child_by_field_name("source"))
}

fn dynamic_import_source(node: Node<'_>) -> Option<Node<'_>> {
    let function = node.child_by_field_name("function")?;
    if function.kind() != "import" {
        return None;
    }
    let arguments = node.child_by_field_name("arguments")?;
    // Non-literal specifiers cannot be followed statically
    arguments.named_child(0).filter(|arg| arg.kind() == "string")
}

fn is_type_only(statement: Node<'_>) -> bool {
    statement.child(1).is_some_and(|keyword| keyword.kind() == "type")
}

/// Byte range between the quotes of a `string` node. The node must have a content child
/// between its opening and closing quote.
fn literal_content(string: Node<'_>) -> Option<std::ops::Range<usize>> {
    if string.kind() != "string" {
        return None;
    }
    let count = string.child_count();
    if count < 3 {
        return None;
    }
    let first = string.child(1)?;
    let closing = string.child(count - 1)?;
    Some(first.start_byte()..closing.start_byte())
}

/// Pre-order traversal over every node of a tree.
struct Preorder<'t> {
    cursor: TreeCursor<'t>,
    done: bool,
}

impl<'t> Preorder<'t> {
    fn new(root: Node<'t>) -> Self {
        Self { cursor: root.walk(), done: false }
    }
}

impl<'t> Iterator for Preorder<'t> {
    type Item = Node<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let node = self.cursor.node();
        if !self.cursor.goto_first_child() {
            while !self.cursor.goto_next_sibling() {
                if !self.cursor.goto_parent() {
                    self.done = true;
                    break;
                }
            }
        }
        Some(node)
    }
}

/// Describes the change from `old` to `new` as one edit spanning everything between their
/// common prefix and common suffix. `None` when the buffers are identical.
fn input_edit(old: &[u8], new: &[u8]) -> Option<InputEdit> {
    if old == new {
        return None;
    }
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let old_end_byte = old.len() - suffix;
    let new_end_byte = new.len() - suffix;
    Some(InputEdit {
        start_byte: prefix,
        old_end_byte,
        new_end_byte,
        start_position: point_at(old, prefix),
        old_end_position: point_at(old, old_end_byte),
        new_end_position: point_at(new, new_end_byte),
    })
}

fn point_at(bytes: &[u8], offset: usize) -> Point {
    let before = &bytes[..offset];
    let row = before.iter().filter(|b| **b == b'\n').count();
    let column = match before.iter().rposition(|b| *b == b'\n') {
        Some(newline) => offset - newline - 1,
        None => offset,
    };
    Point { row, column }
}
