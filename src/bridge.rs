//! Node bindings. Every entry point exchanges JSON strings with the host.

use napi::{Error, Result};
use napi_derive::napi;
use serde::Serialize;
use std::path::Path;

use crate::catalog::{CatalogWriter, MessageCatalog};
use crate::lint::{rule_schemas, Linter};
use crate::minify::{minify_errors, MinifyOptions};

fn to_napi(err: impl std::fmt::Display) -> Error {
    Error::from_reason(err.to_string())
}

fn to_json(value: &impl Serialize) -> Result<String> {
    serde_json::to_string(value).map_err(to_napi)
}

/// Lints `source`. `rules_json` is an ESLint-shaped rules object; when absent
/// every rule runs as an error.
#[napi]
pub fn lint_native(source: String, file_path: String, rules_json: Option<String>) -> Result<String> {
    let linter = match rules_json {
        Some(text) => {
            let config: serde_json::Value = serde_json::from_str(&text).map_err(to_napi)?;
            Linter::from_config(&config).map_err(to_napi)?
        }
        None => Linter::recommended(),
    };
    let diagnostics = linter.lint(&source, &file_path).map_err(to_napi)?;
    to_json(&diagnostics)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NativeMinifyResult {
    code: String,
    catalog: String,
    rewritten: Vec<crate::minify::RewrittenSite>,
    skipped: Vec<crate::minify::SkippedSite>,
}

/// Minifies one file against `catalog_json` and returns the output together
/// with the updated catalog text. Persisting the catalog is up to the host.
#[napi]
pub fn minify_native(
    source: String,
    file_path: String,
    catalog_json: String,
    options_json: Option<String>,
) -> Result<String> {
    let options = match options_json {
        Some(text) => {
            let value: serde_json::Value = serde_json::from_str(&text).map_err(to_napi)?;
            MinifyOptions::from_json(value).map_err(to_napi)?
        }
        None => MinifyOptions::default(),
    };
    let mut catalog =
        MessageCatalog::from_json(&catalog_json, Path::new("<catalog>")).map_err(to_napi)?;
    let mut writer = CatalogWriter::new(&mut catalog, options.missing_code);
    let output = minify_errors(&source, &file_path, &options, &mut writer).map_err(to_napi)?;
    to_json(&NativeMinifyResult {
        code: output.code,
        catalog: catalog.to_json().map_err(to_napi)?,
        rewritten: output.rewritten,
        skipped: output.skipped,
    })
}

/// Option schemas keyed by rule name, for host-side registration.
#[napi]
pub fn rule_schemas_native() -> Result<String> {
    to_json(&rule_schemas())
}
