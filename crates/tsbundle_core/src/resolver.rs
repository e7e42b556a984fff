use log::trace;

use crate::{
    constants::{INDEX_FILES, RESOLVE_EXTENSIONS},
    error::{Error, Result},
    fs::FileSystem,
    path::{ModulePath, PARENT},
};

/// Outcome of resolving a non-relative import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The import names this file, which joins the module graph
    Module(ModulePath),
    /// The import is provided at runtime and stays out of the bundle
    External,
    /// No strategy knows this import; the bundle fails with `UnsupportedImport`
    Unresolved,
}

/// Strategy for package-style imports such as `react` or `@std/core`.
pub trait PackageResolver {
    fn resolve(
        &self,
        fs: &dyn FileSystem,
        from_dir: &ModulePath,
        request: &str,
    ) -> Result<Resolution>;
}

/// Marks requests matching one of the configured package prefixes as external.
///
/// A prefix matches the request itself and any subpath of it: `react` matches `react` and
/// `react/jsx-runtime` but not `react-dom`. A prefix ending in `/` (`@std/`) matches every
/// request starting with it.
#[derive(Debug, Clone, Default)]
pub struct ExternalPackages {
    prefixes: Vec<String>,
}

impl ExternalPackages {
    pub fn new<S: Into<String>>(prefixes: impl IntoIterator<Item = S>) -> Self {
        Self { prefixes: prefixes.into_iter().map(Into::into).collect() }
    }

    pub fn matches(&self, request: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            if prefix.ends_with('/') {
                return request.starts_with(prefix.as_str());
            }
            request == prefix.as_str()
                || request.strip_prefix(prefix.as_str()).is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

impl PackageResolver for ExternalPackages {
    fn resolve(
        &self,
        _fs: &dyn FileSystem,
        _from_dir: &ModulePath,
        request: &str,
    ) -> Result<Resolution> {
        if self.matches(request) {
            trace!("Treating '{}' as external", request);
            Ok(Resolution::External)
        } else {
            Ok(Resolution::Unresolved)
        }
    }
}

/// Resolves a relative import against the importing file's directory.
///
/// Tries the exact path, then the path with each known extension, then an index file inside
/// it. Only files qualify. When nothing matches, the exact-path error is returned.
pub fn resolve_relative_import(
    fs: &dyn FileSystem,
    dir: &ModulePath,
    request: &ModulePath,
) -> Result<ModulePath> {
    trace!("Resolving '{}' from {}", request, dir);
    let exact = fs.resolve_relative(dir, request);
    if let Ok(path) = &exact
        && fs.is_file(path)
    {
        return Ok(path.clone());
    }

    let mut candidates = Vec::new();
    if let Ok(name) = request.basename()
        && name != PARENT
    {
        for ext in RESOLVE_EXTENSIONS {
            candidates.push(request.with_extension(ext)?);
        }
    }
    candidates.extend(INDEX_FILES.iter().map(|index| request.child(index)));

    for candidate in &candidates {
        trace!("Trying candidate '{}'", candidate);
        if let Ok(path) = fs.resolve_relative(dir, candidate)
            && fs.is_file(&path)
        {
            trace!("Resolved '{}' to {}", request, path);
            return Ok(path);
        }
    }

    match exact {
        Ok(path) => Err(Error::invalid_path(format!(
            "{request} from {dir} names {path}, which is not a file and has no index file"
        ))),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;

    fn p(s: &str) -> ModulePath {
        ModulePath::parse(s)
    }

    fn project() -> MemoryFs {
        MemoryFs::with_files([
            ("/src/main.ts", ""),
            ("/src/math.ts", ""),
            ("/src/view.tsx", ""),
            ("/src/data.json.ts", ""),
            ("/src/components/index.ts", ""),
            ("/src/empty/readme.md", ""),
            ("/lib/util.js", ""),
        ])
        .unwrap()
    }

    #[test]
    fn test_exact_match() {
        let fs = project();
        let resolved = resolve_relative_import(&fs, &p("/src"), &p("./math.ts")).unwrap();
        assert_eq!(resolved, p("/src/math.ts"));
    }

    #[test]
    fn test_extension_probing() {
        let fs = project();
        let math = resolve_relative_import(&fs, &p("/src"), &p("./math")).unwrap();
        assert_eq!(math, p("/src/math.ts"));
        let view = resolve_relative_import(&fs, &p("/src"), &p("./view")).unwrap();
        assert_eq!(view, p("/src/view.tsx"));
        assert_eq!(
            resolve_relative_import(&fs, &p("/src/components"), &p("../../lib/util")).unwrap(),
            p("/lib/util.js")
        );
    }

    #[test]
    fn test_dotted_basename_gets_extension_appended() {
        let fs = project();
        assert_eq!(
            resolve_relative_import(&fs, &p("/src"), &p("./data.json")).unwrap(),
            p("/src/data.json.ts")
        );
    }

    #[test]
    fn test_index_file() {
        let fs = project();
        assert_eq!(
            resolve_relative_import(&fs, &p("/src"), &p("./components")).unwrap(),
            p("/src/components/index.ts")
        );
        // `/src` holds files but no index file of its own
        let err = resolve_relative_import(&fs, &p("/src/components"), &p("..")).unwrap_err();
        assert!(err.is_invalid_path());
    }

    #[test]
    fn test_directory_without_index_fails() {
        let fs = project();
        let err = resolve_relative_import(&fs, &p("/src"), &p("./empty")).unwrap_err();
        assert!(err.is_invalid_path());
    }

    #[test]
    fn test_missing_file_fails() {
        let fs = project();
        let err = resolve_relative_import(&fs, &p("/src"), &p("./nope")).unwrap_err();
        assert!(err.is_invalid_path());
    }

    #[test]
    fn test_past_root_fails() {
        let fs = project();
        let err = resolve_relative_import(&fs, &p("/src"), &p("../../main")).unwrap_err();
        assert!(err.is_invalid_path());
    }

    #[test]
    fn test_external_packages() {
        let externals = ExternalPackages::new(["react", "@std/"]);
        assert!(externals.matches("react"));
        assert!(externals.matches("react/jsx-runtime"));
        assert!(!externals.matches("react-dom"));
        assert!(externals.matches("@std/core"));
        assert!(!externals.matches("@stdlib/core"));

        let fs = project();
        assert_eq!(externals.resolve(&fs, &p("/src"), "react").unwrap(), Resolution::External);
        assert_eq!(externals.resolve(&fs, &p("/src"), "npm").unwrap(), Resolution::Unresolved);
    }
}
