//! File extensions and probing order used when resolving relative imports.
//!
//! `import './math'` names `math.ts` on disk, so resolution tries the bare path first, then
//! each extension in [`RESOLVE_EXTENSIONS`] order, then each of [`INDEX_FILES`] inside the
//! path as a directory.

/// Extensions to try when resolving module imports (in priority order)
pub const RESOLVE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Index file names to try when resolving directory imports
pub const INDEX_FILES: &[&str] = &[
    "index.ts",
    "index.tsx",
    "index.mts",
    "index.cts",
    "index.js",
    "index.jsx",
    "index.mjs",
    "index.cjs",
];

/// Extensions parsed with the TSX grammar; everything else uses plain TypeScript
pub const TSX_EXTENSIONS: &[&str] = &["tsx", "jsx"];
