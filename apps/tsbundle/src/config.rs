use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tsbundle_core::{BundleOptions, EmitOrder, ExternalPackages, PackageResolver};

/// Name of the configuration file picked up from the working directory
pub const CONFIG_FILE: &str = "tsbundle.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderArg {
    Discovery,
    Dependency,
}

impl From<OrderArg> for EmitOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Discovery => EmitOrder::Discovery,
            OrderArg::Dependency => EmitOrder::Dependency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "bundle")]
#[command(about = "Build the module graph of a TypeScript entry file")]
pub struct Config {
    /// Entry file of the bundle
    pub entry: PathBuf,

    /// Module order used for the report and the bundle output [default: dependency]
    #[arg(long, value_enum)]
    pub order: Option<OrderArg>,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    pub format: Format,

    /// Package prefix provided at runtime instead of bundled (repeatable)
    #[arg(long = "external")]
    pub externals: Vec<String>,

    /// Write the concatenated bundle to this file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// JSON configuration file (defaults to ./tsbundle.json when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also follow `import type` edges
    #[arg(long)]
    pub follow_type_imports: bool,
}

/// Settings read from a configuration file. Command-line flags take precedence.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileConfig {
    pub externals: Vec<String>,
    pub order: Option<OrderArg>,
    pub follow_type_imports: Option<bool>,
}

impl Config {
    /// Merge the configuration file, if any, into the command-line settings
    pub fn initialize(&mut self) -> Result<()> {
        let path = match &self.config {
            Some(path) => Some(path.clone()),
            None => {
                let default = env::current_dir()?.join(CONFIG_FILE);
                default.is_file().then_some(default)
            }
        };

        if let Some(path) = path {
            info!("Using config file: {}", path.display());
            let file = read_config_file(&path)?;
            self.merge(file);
        } else {
            debug!("No config file found");
        }
        Ok(())
    }

    fn merge(&mut self, file: FileConfig) {
        for external in file.externals {
            if !self.externals.contains(&external) {
                self.externals.push(external);
            }
        }
        if self.order.is_none() {
            self.order = file.order;
        }
        if !self.follow_type_imports {
            self.follow_type_imports = file.follow_type_imports.unwrap_or(false);
        }
        debug!(
            "Merged config: externals={:?}, order={:?}, follow_type_imports={}",
            self.externals, self.order, self.follow_type_imports
        );
    }

    pub fn emit_order(&self) -> EmitOrder {
        self.order.map(EmitOrder::from).unwrap_or_default()
    }

    pub fn bundle_options(&self) -> BundleOptions {
        let package_resolver = if self.externals.is_empty() {
            None
        } else {
            let externals = ExternalPackages::new(self.externals.iter().cloned());
            Some(Box::new(externals) as Box<dyn PackageResolver>)
        };
        BundleOptions { package_resolver, follow_type_imports: self.follow_type_imports }
    }
}

pub fn read_config_file(path: &Path) -> Result<FileConfig> {
    trace!("Reading config at: {:?}", path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;

    serde_json::from_str(&strip_line_comments(&content))
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

/// Removes `//` comments that start outside of a string literal
fn strip_line_comments(content: &str) -> String {
    content
        .lines()
        .map(|line| {
            let mut in_string = false;
            let mut escaped = false;
            let mut prev = None;
            for (idx, ch) in line.char_indices() {
                if in_string {
                    match ch {
                        _ if escaped => escaped = false,
                        '\\' => escaped = true,
                        '"' => in_string = false,
                        _ => {}
                    }
                } else if ch == '"' {
                    in_string = true;
                } else if ch == '/' && prev == Some('/') {
                    return &line[..idx - 1];
                }
                prev = Some(ch);
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Config {
        Config::parse_from(std::iter::once("bundle").chain(args.iter().copied()))
    }

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, content).expect("Failed to write config file");
        path
    }

    #[test]
    fn test_cli_defaults() {
        let cfg = cli(&["src/main.ts"]);
        assert_eq!(cfg.entry, PathBuf::from("src/main.ts"));
        assert_eq!(cfg.format, Format::Text);
        assert_eq!(cfg.emit_order(), EmitOrder::Dependency);
        assert!(cfg.externals.is_empty());
        assert!(cfg.bundle_options().package_resolver.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let cfg = cli(&[
            "main.ts",
            "--order",
            "discovery",
            "--format",
            "json",
            "--external",
            "react",
            "--external",
            "@std/",
        ]);
        assert_eq!(cfg.emit_order(), EmitOrder::Discovery);
        assert_eq!(cfg.format, Format::Json);
        assert_eq!(cfg.externals, ["react", "@std/"]);
        assert!(cfg.bundle_options().package_resolver.is_some());
    }

    #[test]
    fn test_read_config_with_comments() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            temp_dir.path(),
            r#"
{
  // Provided by the runtime
  "externals": ["react", "@std/"],
  "order": "discovery", // emit as discovered
  "followTypeImports": true
}
"#,
        );
        let file = read_config_file(&path).unwrap();
        assert_eq!(file.externals, ["react", "@std/"]);
        assert_eq!(file.order, Some(OrderArg::Discovery));
        assert_eq!(file.follow_type_imports, Some(true));
    }

    #[test]
    fn test_read_config_keeps_slashes_in_strings() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            temp_dir.path(),
            r#"{ "externals": ["https://esm.sh/", "a\"//b"] } // remote modules"#,
        );
        let file = read_config_file(&path).unwrap();
        assert_eq!(file.externals, ["https://esm.sh/", "a\"//b"]);
    }

    #[test]
    fn test_strip_line_comments() {
        assert_eq!(strip_line_comments("\"a\": 1, // note"), "\"a\": 1, ");
        assert_eq!(strip_line_comments("// only a comment"), "");
        assert_eq!(strip_line_comments("\"x\": \"//\""), "\"x\": \"//\"");
        assert_eq!(strip_line_comments("\"x\": \"a / b\" / 2"), "\"x\": \"a / b\" / 2");
    }

    #[test]
    fn test_read_config_empty_object() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(temp_dir.path(), "{}");
        let file = read_config_file(&path).unwrap();
        assert!(file.externals.is_empty());
        assert_eq!(file.order, None);
    }

    #[test]
    fn test_read_config_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(temp_dir.path(), "{ externals: }");
        assert!(read_config_file(&path).is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            temp_dir.path(),
            r#"{ "externals": ["react", "vue"], "order": "discovery" }"#,
        );
        let mut cfg = cli(&["main.ts", "--order", "dependency", "--external", "react"]);
        cfg.config = Some(path);
        cfg.initialize().unwrap();

        assert_eq!(cfg.emit_order(), EmitOrder::Dependency);
        assert_eq!(cfg.externals, ["react", "vue"]);
        assert!(!cfg.follow_type_imports);
    }

    #[test]
    fn test_missing_config_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut cfg = cli(&["main.ts"]);
        cfg.config = Some(temp_dir.path().join("nope.json"));
        assert!(cfg.initialize().is_err());
    }
}
