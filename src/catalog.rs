//! Message catalog: the persisted, append-only mapping between numeric error
//! codes and normalized message templates.
//!
//! The catalog is loaded once per build, extended in memory and flushed once
//! through [`CatalogTransaction::commit`]. Codes are keyed by normalized
//! template text, so source positions and file key order never affect them.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CatalogError;

/// Positional placeholder used in templates.
pub const PLACEHOLDER: &str = "%s";

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Trims surrounding whitespace and collapses internal whitespace runs.
pub fn normalize_template(template: &str) -> String {
    WHITESPACE_RUN
        .replace_all(template.trim(), " ")
        .into_owned()
}

pub fn template_arity(template: &str) -> usize {
    template.matches(PLACEHOLDER).count()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: u32,
    pub template: String,
    pub arity: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CATALOG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    entries: BTreeMap<u32, CatalogEntry>,
    codes: HashMap<String, u32>,
    dirty: bool,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from `(code, template)` pairs as read from storage.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (u32, S)>,
        S: AsRef<str>,
    {
        let mut catalog = Self::new();
        for (code, template) in entries {
            catalog.insert_existing(code, template.as_ref())?;
        }
        Ok(catalog)
    }

    pub fn from_json(text: &str, path: &Path) -> Result<Self, CatalogError> {
        let raw: BTreeMap<u32, String> =
            serde_json::from_str(text).map_err(|source| CatalogError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_entries(raw)
    }

    /// Loads the catalog at `path`. A missing file is an empty catalog.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(source) => Err(CatalogError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn insert_existing(&mut self, code: u32, template: &str) -> Result<(), CatalogError> {
        let template = normalize_template(template);
        if let Some(existing) = self.entries.get(&code) {
            return Err(CatalogError::CodeTaken {
                code,
                existing: existing.template.clone(),
            });
        }
        if let Some(&first) = self.codes.get(&template) {
            return Err(CatalogError::DuplicateTemplate {
                first,
                second: code,
                template,
            });
        }
        self.codes.insert(template.clone(), code);
        self.entries.insert(
            code,
            CatalogEntry {
                code,
                arity: template_arity(&template),
                template,
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether entries were added since load.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get(&self, code: u32) -> Option<&CatalogEntry> {
        self.entries.get(&code)
    }

    pub fn lookup(&self, template: &str) -> Option<&CatalogEntry> {
        let template = normalize_template(template);
        self.codes.get(&template).and_then(|code| self.entries.get(code))
    }

    /// Entries in ascending code order.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    /// Next unused code. Gaps left in a hand-edited file are never filled.
    pub fn next_code(&self) -> u32 {
        self.entries.keys().next_back().map_or(1, |last| last + 1)
    }

    /// Returns the code for `template`, appending a new entry on a miss.
    pub fn insert(&mut self, template: &str) -> u32 {
        let template = normalize_template(template);
        if let Some(&code) = self.codes.get(&template) {
            return code;
        }
        let code = self.next_code();
        tracing::debug!(code, template = %template, "assigned error code");
        self.codes.insert(template.clone(), code);
        self.entries.insert(
            code,
            CatalogEntry {
                code,
                arity: template_arity(&template),
                template,
            },
        );
        self.dirty = true;
        code
    }

    /// Reconstructs the message for `code` by substituting `args` positionally.
    pub fn format(&self, code: u32, args: &[&str]) -> Result<String, CatalogError> {
        let entry = self.get(code).ok_or(CatalogError::UnknownCode(code))?;
        if entry.arity != args.len() {
            return Err(CatalogError::ArityMismatch {
                template: entry.template.clone(),
                expected: entry.arity,
                found: args.len(),
            });
        }
        let mut message = String::with_capacity(entry.template.len());
        for (i, piece) in entry.template.split(PLACEHOLDER).enumerate() {
            if i > 0 {
                message.push_str(args[i - 1]);
            }
            message.push_str(piece);
        }
        Ok(message)
    }

    pub fn to_json(&self) -> Result<String, CatalogError> {
        let table: BTreeMap<u32, &str> = self
            .entries
            .iter()
            .map(|(code, entry)| (*code, entry.template.as_str()))
            .collect();
        let mut text = serde_json::to_string_pretty(&table)?;
        text.push('\n');
        Ok(text)
    }

    /// Writes the full catalog to a sibling temporary file and renames it over
    /// `path`, so readers never observe a partial file.
    pub fn write_to(&self, path: &Path) -> Result<(), CatalogError> {
        let text = self.to_json()?;
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| CatalogError::Io { path, source }
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let mut tmp_name = OsString::from(path.as_os_str());
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        fs::write(&tmp, text).map_err(io_err(&tmp))?;
        fs::rename(&tmp, path).map_err(io_err(path))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Load-snapshot, accumulate-in-memory, flush-once cycle around a catalog file.
/// Dropping a transaction without committing leaves the file untouched.
#[derive(Debug)]
pub struct CatalogTransaction {
    path: PathBuf,
    catalog: MessageCatalog,
}

impl CatalogTransaction {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let catalog = MessageCatalog::load(&path)?;
        tracing::info!(path = %path.display(), entries = catalog.len(), "loaded error catalog");
        Ok(Self { path, catalog })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn catalog(&self) -> &MessageCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut MessageCatalog {
        &mut self.catalog
    }

    /// Flushes the catalog if anything was added. Returns whether it wrote.
    pub fn commit(self) -> Result<bool, CatalogError> {
        if !self.catalog.is_dirty() {
            return Ok(false);
        }
        self.catalog.write_to(&self.path)?;
        tracing::info!(path = %self.path.display(), entries = self.catalog.len(), "committed error catalog");
        Ok(true)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CODE RESOLUTION
// ═══════════════════════════════════════════════════════════════════════════════

/// What to do with a template that has no code yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingCodePolicy {
    /// Assign the next code and append it to the catalog.
    #[default]
    Write,
    /// Fail the file.
    Throw,
    /// Leave the site unminified and mark it.
    Annotate,
}

/// Access seam between the rewrite and the catalog. `Ok(None)` leaves the site
/// unminified.
pub trait CodeResolver {
    fn resolve(&mut self, template: &str) -> Result<Option<u32>, CatalogError>;
}

fn on_miss(policy: MissingCodePolicy, template: &str) -> Result<Option<u32>, CatalogError> {
    match policy {
        MissingCodePolicy::Annotate => Ok(None),
        MissingCodePolicy::Write | MissingCodePolicy::Throw => Err(CatalogError::MissingCode {
            template: normalize_template(template),
        }),
    }
}

/// Resolves against a mutable catalog, appending under [`MissingCodePolicy::Write`].
pub struct CatalogWriter<'c> {
    catalog: &'c mut MessageCatalog,
    policy: MissingCodePolicy,
}

impl<'c> CatalogWriter<'c> {
    pub fn new(catalog: &'c mut MessageCatalog, policy: MissingCodePolicy) -> Self {
        Self { catalog, policy }
    }
}

impl CodeResolver for CatalogWriter<'_> {
    fn resolve(&mut self, template: &str) -> Result<Option<u32>, CatalogError> {
        if let Some(entry) = self.catalog.lookup(template) {
            return Ok(Some(entry.code));
        }
        match self.policy {
            MissingCodePolicy::Write => Ok(Some(self.catalog.insert(template))),
            policy => on_miss(policy, template),
        }
    }
}

/// Resolves against a frozen snapshot; never appends.
pub struct CatalogReader<'c> {
    catalog: &'c MessageCatalog,
    policy: MissingCodePolicy,
}

impl<'c> CatalogReader<'c> {
    pub fn new(catalog: &'c MessageCatalog, policy: MissingCodePolicy) -> Self {
        Self { catalog, policy }
    }
}

impl CodeResolver for CatalogReader<'_> {
    fn resolve(&mut self, template: &str) -> Result<Option<u32>, CatalogError> {
        match self.catalog.lookup(template) {
            Some(entry) => Ok(Some(entry.code)),
            None => on_miss(self.policy, template),
        }
    }
}

/// Records templates missing from a snapshot without assigning codes. Used by
/// the read-only first phase of a parallel build.
pub struct TemplateCollector<'c> {
    catalog: &'c MessageCatalog,
    policy: MissingCodePolicy,
    pub missing: Vec<String>,
}

impl<'c> TemplateCollector<'c> {
    pub fn new(catalog: &'c MessageCatalog, policy: MissingCodePolicy) -> Self {
        Self {
            catalog,
            policy,
            missing: Vec::new(),
        }
    }
}

impl CodeResolver for TemplateCollector<'_> {
    fn resolve(&mut self, template: &str) -> Result<Option<u32>, CatalogError> {
        if let Some(entry) = self.catalog.lookup(template) {
            return Ok(Some(entry.code));
        }
        match self.policy {
            MissingCodePolicy::Write => {
                self.missing.push(normalize_template(template));
                // Placeholder; phase-one output is discarded.
                Ok(Some(0))
            }
            policy => on_miss(policy, template),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_template() {
        assert_eq!(normalize_template("  Invalid \n\t prop   %s  "), "Invalid prop %s");
        assert_eq!(template_arity("a %s b %s"), 2);
    }

    #[test]
    fn test_insert_is_keyed_by_normalized_text() {
        let mut catalog = MessageCatalog::new();
        let first = catalog.insert("Invalid  prop %s");
        let second = catalog.insert(" Invalid prop\n%s ");
        assert_eq!(first, 1);
        assert_eq!(first, second);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.is_dirty());
        assert_eq!(catalog.insert("Other"), 2);
    }

    #[test]
    fn test_codes_are_never_reused() {
        let mut catalog = MessageCatalog::from_entries([(1, "a"), (7, "b")]).unwrap();
        assert!(!catalog.is_dirty());
        assert_eq!(catalog.insert("c"), 8);
    }

    #[test]
    fn test_duplicate_template_is_rejected() {
        let err = MessageCatalog::from_entries([(1, "same  text"), (2, "same text")]).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::DuplicateTemplate { first: 1, second: 2, .. }
        ));
    }

    #[test]
    fn test_format_round_trip() {
        let catalog =
            MessageCatalog::from_entries([(1, "Prop %s of %s is invalid"), (2, "Plain")]).unwrap();
        assert_eq!(
            catalog.format(1, &["`color`", "Button"]).unwrap(),
            "Prop `color` of Button is invalid"
        );
        assert_eq!(catalog.format(2, &[]).unwrap(), "Plain");
        assert!(matches!(
            catalog.format(1, &["x"]),
            Err(CatalogError::ArityMismatch { expected: 2, found: 1, .. })
        ));
        assert!(matches!(catalog.format(3, &[]), Err(CatalogError::UnknownCode(3))));
    }

    #[test]
    fn test_json_is_ordered_by_code() {
        let catalog = MessageCatalog::from_entries([(10, "ten"), (2, "two"), (1, "one")]).unwrap();
        assert_eq!(
            catalog.to_json().unwrap(),
            "{\n  \"1\": \"one\",\n  \"2\": \"two\",\n  \"10\": \"ten\"\n}\n"
        );
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let path = Path::new("codes.json");
        let a = MessageCatalog::from_json(r#"{"2": "b", "1": "a"}"#, path).unwrap();
        let b = MessageCatalog::from_json(r#"{"1": "a", "2": "b"}"#, path).unwrap();
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
        assert_eq!(a.lookup("b").map(|e| e.code), Some(2));
    }

    #[test]
    fn test_malformed_file() {
        let err = MessageCatalog::from_json("[1, 2]", Path::new("codes.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Malformed { .. }));
    }

    #[test]
    fn test_transaction_commits_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("codes.json");

        let tx = CatalogTransaction::open(&path).unwrap();
        assert!(tx.catalog().is_empty());
        assert!(!tx.commit().unwrap());
        assert!(!path.exists());

        let mut tx = CatalogTransaction::open(&path).unwrap();
        tx.catalog_mut().insert("First %s");
        assert!(tx.commit().unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\n  \"1\": \"First %s\"\n}\n");

        let reloaded = MessageCatalog::load(&path).unwrap();
        assert_eq!(reloaded.lookup("First %s").map(|e| e.arity), Some(1));
    }

    #[test]
    fn test_dropped_transaction_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.json");
        fs::write(&path, "{\n  \"1\": \"kept\"\n}\n").unwrap();

        let mut tx = CatalogTransaction::open(&path).unwrap();
        tx.catalog_mut().insert("discarded");
        drop(tx);

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\n  \"1\": \"kept\"\n}\n");
    }

    #[test]
    fn test_resolvers() {
        let mut catalog = MessageCatalog::from_entries([(1, "known")]).unwrap();

        let mut reader = CatalogReader::new(&catalog, MissingCodePolicy::Annotate);
        assert_eq!(reader.resolve("known").unwrap(), Some(1));
        assert_eq!(reader.resolve("unknown").unwrap(), None);

        let mut collector = TemplateCollector::new(&catalog, MissingCodePolicy::Write);
        assert_eq!(collector.resolve("known").unwrap(), Some(1));
        collector.resolve("  fresh   one ").unwrap();
        assert_eq!(collector.missing, vec!["fresh one".to_string()]);

        let mut strict = CatalogWriter::new(&mut catalog, MissingCodePolicy::Throw);
        assert!(matches!(
            strict.resolve("unknown"),
            Err(CatalogError::MissingCode { .. })
        ));

        let mut writer = CatalogWriter::new(&mut catalog, MissingCodePolicy::Write);
        assert_eq!(writer.resolve("unknown").unwrap(), Some(2));
    }
}
