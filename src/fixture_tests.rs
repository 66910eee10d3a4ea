//! End-to-end fixtures under `fixtures/`.
//!
//! - `fixtures/minify/<case>/`: `input.js`, expected `output.js`, optional
//!   `options.json` (camelCase `MinifyOptions`). Each case starts from an empty
//!   catalog.
//! - `fixtures/lint/<case>/`: `input.js` linted with every rule enabled and
//!   `expected.json` listing `rule`, `messageId`, `line`, `column` in order.

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use std::fs;
    use std::path::{Path, PathBuf};

    use crate::catalog::{CatalogWriter, MessageCatalog};
    use crate::lint::Linter;
    use crate::minify::{minify_errors, MinifyOptions};

    fn cases(kind: &str) -> Vec<PathBuf> {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(kind);
        let mut dirs: Vec<PathBuf> = fs::read_dir(&root)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();
        assert!(!dirs.is_empty(), "no fixtures under {}", root.display());
        dirs
    }

    #[test]
    fn minify_fixtures() {
        for case in cases("minify") {
            let input = fs::read_to_string(case.join("input.js")).unwrap();
            let expected = fs::read_to_string(case.join("output.js")).unwrap();
            let options = match fs::read_to_string(case.join("options.json")) {
                Ok(text) => MinifyOptions::from_json(serde_json::from_str(&text).unwrap()).unwrap(),
                Err(_) => MinifyOptions::default(),
            };

            let mut catalog = MessageCatalog::new();
            let mut writer = CatalogWriter::new(&mut catalog, options.missing_code);
            let output = minify_errors(&input, "input.js", &options, &mut writer)
                .unwrap_or_else(|e| panic!("{}: {e}", case.display()));
            assert_eq!(output.code, expected, "{}", case.display());

            // Output is a fixed point.
            let again = minify_errors(&output.code, "input.js", &options, &mut writer).unwrap();
            assert_eq!(again.code, expected, "{} (second run)", case.display());
        }
    }

    #[derive(Debug, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ExpectedDiagnostic {
        rule: String,
        message_id: String,
        line: u32,
        column: u32,
    }

    #[test]
    fn lint_fixtures() {
        let linter = Linter::recommended();
        for case in cases("lint") {
            let input = fs::read_to_string(case.join("input.js")).unwrap();
            let expected: Vec<ExpectedDiagnostic> =
                serde_json::from_str(&fs::read_to_string(case.join("expected.json")).unwrap())
                    .unwrap();

            let actual: Vec<ExpectedDiagnostic> = linter
                .lint(&input, "input.js")
                .unwrap()
                .into_iter()
                .map(|d| ExpectedDiagnostic {
                    rule: d.rule,
                    message_id: d.message_id,
                    line: d.line,
                    column: d.column,
                })
                .collect();
            assert_eq!(actual, expected, "{}", case.display());
        }
    }
}
