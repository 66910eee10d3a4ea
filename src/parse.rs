//! Source parsing and position helpers shared by the transform and the linter.

use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_parser::Parser;
use oxc_span::{SourceType, Span};
use std::path::Path;

use crate::error::TransformError;

/// Picks the source type from the file extension. Unknown extensions parse as
/// an ES module with JSX enabled.
pub fn source_type_for(file_path: &str) -> SourceType {
    SourceType::from_path(Path::new(file_path)).unwrap_or_else(|_| {
        SourceType::default()
            .with_module(true)
            .with_jsx(true)
    })
}

/// Parses `source` into an oxc program. Any recoverable or fatal parser error
/// fails the whole file.
pub fn parse_program<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    file_path: &str,
) -> Result<Program<'a>, TransformError> {
    let ret = Parser::new(allocator, source, source_type_for(file_path)).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return Err(TransformError::Parse {
            file: file_path.to_string(),
            messages: ret.errors.iter().map(|e| e.to_string()).collect(),
        });
    }
    Ok(ret.program)
}

/// Source text covered by `span`.
pub fn span_text(source: &str, span: Span) -> &str {
    &source[span.start as usize..span.end as usize]
}

/// Byte offset to 1-based line/column lookup. Columns count UTF-16 code
/// units, as JavaScript tooling does.
#[derive(Debug, Clone)]
pub struct LineIndex<'s> {
    source: &'s str,
    line_starts: Vec<u32>,
}

impl<'s> LineIndex<'s> {
    pub fn new(source: &'s str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self {
            source,
            line_starts,
        }
    }

    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line] as usize;
        let column = self
            .source
            .get(start..offset as usize)
            .map_or(offset as usize - start, |prefix| prefix.encode_utf16().count());
        (line as u32 + 1, column as u32 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let index = LineIndex::new("a\nbc\n\nd");
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(2), (2, 1));
        assert_eq!(index.line_col(3), (2, 2));
        assert_eq!(index.line_col(5), (3, 1));
        assert_eq!(index.line_col(6), (4, 1));
    }

    #[test]
    fn test_columns_count_utf16_units() {
        // 'é' is two bytes and one unit, '😀' is four bytes and two units.
        let source = "const é = 1;\nlet s = '😀'; x";
        let index = LineIndex::new(source);
        assert_eq!(index.line_col(source.find('=').unwrap() as u32), (1, 9));
        assert_eq!(index.line_col(source.find('x').unwrap() as u32), (2, 15));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let allocator = Allocator::default();
        let err = parse_program(&allocator, "if (", "broken.js").unwrap_err();
        match err {
            TransformError::Parse { file, messages } => {
                assert_eq!(file, "broken.js");
                assert!(!messages.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_extension_falls_back_to_module() {
        let allocator = Allocator::default();
        let program = parse_program(&allocator, "export const a = <div />;", "component.svelte");
        assert!(program.is_ok());
    }
}
