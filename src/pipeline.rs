//! Build pipeline: discover sources, minify them in parallel, write outputs and
//! flush the catalog once.
//!
//! Code assignment is a single-writer step between two read-only parallel
//! phases, so codes never depend on thread scheduling.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::catalog::{CatalogReader, CatalogTransaction, MessageCatalog, TemplateCollector};
use crate::error::{BuildError, TransformError};
use crate::minify::{minify_errors, MinifyOptions, MinifyOutput, SkipReason};

lazy_static::lazy_static! {
    static ref DEFAULT_EXTENSIONS: Vec<String> = ["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts"]
        .iter()
        .map(|s| s.to_string())
        .collect();
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

fn is_node_modules(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == "node_modules"
}

/// Recursively finds source files under `root`, sorted by path.
pub fn discover_sources(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !is_node_modules(entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.iter().any(|allowed| allowed == ext))
        })
        .collect();
    files.sort();
    files
}

// ═══════════════════════════════════════════════════════════════════════════════
// MINIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source: String,
}

#[derive(Debug)]
pub struct MinifiedFile {
    pub path: PathBuf,
    pub output: MinifyOutput,
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Minifies `files` against `catalog`, appending new templates to it.
///
/// On failure every per-file error is returned and `catalog` is unchanged.
pub fn minify_sources(
    files: &[SourceFile],
    catalog: &mut MessageCatalog,
    options: &MinifyOptions,
) -> Result<Vec<MinifiedFile>, Vec<TransformError>> {
    let mut order: Vec<&SourceFile> = files.iter().collect();
    order.sort_by(|a, b| a.path.cmp(&b.path));

    // Phase 1: find templates the snapshot lacks.
    let snapshot: &MessageCatalog = catalog;
    let collected: Vec<Result<Vec<String>, TransformError>> = order
        .par_iter()
        .map(|file| {
            let mut collector = TemplateCollector::new(snapshot, options.missing_code);
            minify_errors(&file.source, &display_path(&file.path), options, &mut collector)?;
            Ok(collector.missing)
        })
        .collect();

    let mut missing = Vec::new();
    let mut errors = Vec::new();
    for result in collected {
        match result {
            Ok(templates) => missing.push(templates),
            Err(err) => errors.push(err),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    // Single writer: path order, then source order.
    let mut extended = catalog.clone();
    for template in missing.iter().flatten() {
        extended.insert(template);
    }
    tracing::info!(
        files = order.len(),
        new_codes = extended.len() - catalog.len(),
        "assigned error codes"
    );

    // Phase 2: rewrite against the frozen, extended catalog.
    let rewritten: Vec<Result<MinifiedFile, TransformError>> = order
        .par_iter()
        .map(|file| {
            let mut reader = CatalogReader::new(&extended, options.missing_code);
            let output =
                minify_errors(&file.source, &display_path(&file.path), options, &mut reader)?;
            Ok(MinifiedFile {
                path: file.path.clone(),
                output,
            })
        })
        .collect();

    let mut outputs = Vec::with_capacity(rewritten.len());
    for result in rewritten {
        match result {
            Ok(file) => outputs.push(file),
            Err(err) => errors.push(err),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    *catalog = extended;
    Ok(outputs)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILD
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildOptions {
    pub src_dir: PathBuf,
    pub out_dir: PathBuf,
    pub catalog_path: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub minify: MinifyOptions,
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.clone()
}

impl BuildOptions {
    pub fn new(
        src_dir: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
        catalog_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            src_dir: src_dir.into(),
            out_dir: out_dir.into(),
            catalog_path: catalog_path.into(),
            extensions: default_extensions(),
            minify: MinifyOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub files: usize,
    pub changed_files: usize,
    pub rewritten_sites: usize,
    pub unminified_sites: usize,
    pub catalog_size: usize,
    pub catalog_written: bool,
}

/// Minifies every source under `src_dir` into `out_dir` and commits the catalog.
pub fn run_build(options: &BuildOptions) -> Result<BuildReport, BuildError> {
    let mut transaction = CatalogTransaction::open(&options.catalog_path)?;

    let paths = discover_sources(&options.src_dir, &options.extensions);
    tracing::info!(root = %options.src_dir.display(), files = paths.len(), "discovered sources");

    let files = paths
        .into_iter()
        .map(|path| {
            fs::read_to_string(&path)
                .map(|source| SourceFile {
                    path: path.clone(),
                    source,
                })
                .map_err(|source| BuildError::Read { path, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let minified = minify_sources(&files, transaction.catalog_mut(), &options.minify)
        .map_err(BuildError::Files)?;

    let mut report = BuildReport {
        files: minified.len(),
        ..BuildReport::default()
    };
    for file in &minified {
        let relative = file
            .path
            .strip_prefix(&options.src_dir)
            .unwrap_or(&file.path);
        let target = options.out_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| BuildError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&target, &file.output.code).map_err(|source| BuildError::Write {
            path: target.clone(),
            source,
        })?;

        report.changed_files += usize::from(file.output.changed());
        report.rewritten_sites += file.output.rewritten.len();
        report.unminified_sites += file
            .output
            .skipped
            .iter()
            .filter(|site| site.reason == SkipReason::Annotated)
            .count();
    }
    tracing::info!(out_dir = %options.out_dir.display(), files = report.files, "wrote outputs");

    report.catalog_size = transaction.catalog().len();
    report.catalog_written = transaction.commit()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use crate::catalog::MissingCodePolicy;

    fn write(dir: &Path, relative: &str, contents: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn source(path: &str, source: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(path),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_discover_skips_node_modules() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/b.ts", "");
        write(dir.path(), "src/a.js", "");
        write(dir.path(), "src/readme.md", "");
        write(dir.path(), "node_modules/dep/index.js", "");

        let found = discover_sources(dir.path(), &default_extensions());
        let relative: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            relative,
            vec![PathBuf::from("src/a.js"), PathBuf::from("src/b.ts")]
        );
    }

    #[test]
    fn test_codes_follow_path_order() {
        let files = vec![
            source("b.js", "throw new Error('from b');"),
            source("a.js", "throw new Error('from a'); throw new Error('from a again');"),
        ];
        let mut catalog = MessageCatalog::new();
        let outputs = minify_sources(&files, &mut catalog, &MinifyOptions::default()).unwrap();

        assert_eq!(catalog.lookup("from a").unwrap().code, 1);
        assert_eq!(catalog.lookup("from a again").unwrap().code, 2);
        assert_eq!(catalog.lookup("from b").unwrap().code, 3);
        assert_eq!(outputs[0].path, PathBuf::from("a.js"));
        assert_eq!(outputs[1].output.rewritten[0].code, 3);
    }

    #[test]
    fn test_shared_template_gets_one_code() {
        let files = vec![
            source("a.js", "throw new Error('same');"),
            source("b.js", "throw new TypeError('same');"),
        ];
        let mut catalog = MessageCatalog::new();
        let outputs = minify_sources(&files, &mut catalog, &MinifyOptions::default()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(outputs[1].output.rewritten[0].code, 1);
    }

    #[test]
    fn test_failure_leaves_catalog_unchanged() {
        let files = vec![
            source("good.js", "throw new Error('fine');"),
            source("bad.js", "throw new Error('50%s off');"),
            source("broken.js", "throw new Error('unterminated"),
        ];
        let mut catalog = MessageCatalog::new();
        let errors = minify_sources(&files, &mut catalog, &MinifyOptions::default()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_run_build() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src, "index.js", "export function f(x) {\n  throw new Error(`bad ${x}`);\n}\n");
        write(&src, "nested/plain.js", "export const answer = 42;\n");
        let options = BuildOptions::new(&src, dir.path().join("dist"), dir.path().join("codes.json"));

        let report = run_build(&options).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.changed_files, 1);
        assert_eq!(report.rewritten_sites, 1);
        assert!(report.catalog_written);

        let out = fs::read_to_string(dir.path().join("dist/index.js")).unwrap();
        assert_eq!(
            out,
            "export function f(x) {\n  throw new Error(process.env.NODE_ENV !== 'production' ? `bad ${x}` : formatProdErrorMessage(1, x));\n}\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("dist/nested/plain.js")).unwrap(),
            "export const answer = 42;\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("codes.json")).unwrap(),
            "{\n  \"1\": \"bad %s\"\n}\n"
        );

        // A second build over the same sources reuses every code.
        let report = run_build(&options).unwrap();
        assert!(!report.catalog_written);
        assert_eq!(
            fs::read_to_string(dir.path().join("dist/index.js")).unwrap(),
            out
        );
    }

    #[test]
    fn test_only_annotated_sites_count_as_unminified() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "index.js",
            "if (process.env.NODE_ENV !== 'production') { throw new Error('dev'); }\n\
             throw /* minify-error-disabled */ new Error('kept');\n\
             throw new Error('unknown');\n",
        );
        let mut options =
            BuildOptions::new(&src, dir.path().join("dist"), dir.path().join("codes.json"));
        options.minify.missing_code = MissingCodePolicy::Annotate;

        let report = run_build(&options).unwrap();
        assert_eq!(report.rewritten_sites, 0);
        assert_eq!(report.unminified_sites, 1);
    }

    #[test]
    fn test_failed_build_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src, "a.js", "throw new Error('ok');");
        write(&src, "b.js", "if (");
        let options = BuildOptions::new(&src, dir.path().join("dist"), dir.path().join("codes.json"));

        match run_build(&options) {
            Err(BuildError::Files(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected file errors, got {other:?}"),
        }
        assert!(!dir.path().join("dist").exists());
        assert!(!dir.path().join("codes.json").exists());
    }

    #[test]
    fn test_build_options_from_json() {
        let options: BuildOptions = serde_json::from_value(serde_json::json!({
            "srcDir": "src",
            "outDir": "dist",
            "catalogPath": "codes.json",
            "minify": { "runtimeModule": "shared/formatProdErrorMessage" }
        }))
        .unwrap();
        assert_eq!(options.extensions, default_extensions());
        assert_eq!(
            options.minify.runtime_module.as_deref(),
            Some("shared/formatProdErrorMessage")
        );
    }
}
