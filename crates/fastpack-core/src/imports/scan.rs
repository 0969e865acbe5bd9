//! Import specifier scanner.
//!
//! Walks script source once, skipping comments and string literals, and
//! records the specifiers of `import`, `export ... from` and `require(...)`.

use std::collections::HashSet;

/// How a specifier was referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    /// `import x from "..."` or `import "..."`.
    Static,
    /// `export ... from "..."`.
    ReExport,
    /// `require("...")`.
    Require,
    /// `import("...")`. Recorded, never followed by the graph.
    Dynamic,
}

impl ImportKind {
    /// Whether the bundler follows this edge when building the graph.
    #[must_use]
    pub fn is_static(self) -> bool {
        !matches!(self, Self::Dynamic)
    }
}

/// Import specifier found in source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Specifier exactly as written.
    pub specifier: String,
    pub kind: ImportKind,
    /// 1-indexed line of the keyword.
    pub line: u32,
}

/// Scan source code for import/require specifiers.
///
/// Returns imports in first-appearance order. A specifier appears at most once
/// among static imports and at most once among dynamic ones.
#[must_use]
pub fn scan_imports(source: &str) -> Vec<Import> {
    let mut scanner = Scanner::new(source);
    scanner.run();
    scanner.imports
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    seen: HashSet<(String, bool)>,
    imports: Vec<Import>,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            seen: HashSet::new(),
            imports: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn run(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                '/' if self.peek_at(1) == Some('/') => self.skip_line_comment(),
                '/' if self.peek_at(1) == Some('*') => self.skip_block_comment(),
                '"' | '\'' | '`' => {
                    self.read_string();
                }
                _ if self.at_keyword("import") => self.scan_import(),
                _ if self.at_keyword("export") => self.scan_export(),
                _ if self.at_keyword("require") => self.scan_require(),
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn record(&mut self, specifier: String, kind: ImportKind, line: u32) {
        if specifier.is_empty() {
            return;
        }
        if self.seen.insert((specifier.clone(), kind.is_static())) {
            self.imports.push(Import {
                specifier,
                kind,
                line,
            });
        }
    }

    /// Keyword at the cursor with identifier boundaries on both sides.
    /// A preceding `.` excludes member access such as `obj.require`.
    fn at_keyword(&self, keyword: &str) -> bool {
        if self.pos > 0 {
            let prev = self.chars[self.pos - 1];
            if is_ident_char(prev) || prev == '.' {
                return false;
            }
        }
        let mut len = 0;
        for (offset, expected) in keyword.chars().enumerate() {
            if self.peek_at(offset) != Some(expected) {
                return false;
            }
            len += 1;
        }
        !self.peek_at(len).is_some_and(is_ident_char)
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) {
        self.advance(2);
        while self.peek().is_some() {
            if self.peek() == Some('*') && self.peek_at(1) == Some('/') {
                self.advance(2);
                return;
            }
            self.bump();
        }
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => self.skip_line_comment(),
                Some('/') if self.peek_at(1) == Some('*') => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    /// Consume a string literal starting at the cursor.
    ///
    /// Returns its raw contents, or `None` for template literals with
    /// substitutions (not a static specifier).
    fn read_string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut value = String::new();
        let mut interpolated = false;
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    if let Some(escaped) = self.bump() {
                        value.push(escaped);
                    }
                }
                '$' if quote == '`' && self.peek() == Some('{') => {
                    interpolated = true;
                    value.push(c);
                }
                '\n' if quote != '`' => return None,
                c if c == quote => return if interpolated { None } else { Some(value) },
                c => value.push(c),
            }
        }
        None
    }

    fn at_quote(&self) -> bool {
        matches!(self.peek(), Some('"' | '\'' | '`'))
    }

    fn scan_import(&mut self) {
        let line = self.line;
        self.advance("import".len());
        self.skip_trivia();

        match self.peek() {
            // import.meta
            Some('.') => {}
            Some('(') => {
                self.bump();
                self.skip_trivia();
                if self.at_quote() {
                    if let Some(spec) = self.read_string() {
                        self.record(spec, ImportKind::Dynamic, line);
                    }
                }
            }
            Some('"' | '\'') => {
                if let Some(spec) = self.read_string() {
                    self.record(spec, ImportKind::Static, line);
                }
            }
            _ => {
                if let Some(spec) = self.scan_clause_then_from() {
                    self.record(spec, ImportKind::Static, line);
                }
            }
        }
    }

    fn scan_export(&mut self) {
        let line = self.line;
        self.advance("export".len());
        self.skip_trivia();

        // Only `export * ...` and `export { ... }` can carry a `from`.
        if matches!(self.peek(), Some('*' | '{')) {
            if let Some(spec) = self.scan_clause_then_from() {
                self.record(spec, ImportKind::ReExport, line);
            }
        }
    }

    /// Walk an import/export clause (`x`, `{ a as b }`, `* as ns`, `type`)
    /// and return the string after `from`. Any other token aborts.
    fn scan_clause_then_from(&mut self) -> Option<String> {
        loop {
            self.skip_trivia();
            match self.peek()? {
                '{' => {
                    while let Some(c) = self.bump() {
                        if c == '}' {
                            break;
                        }
                    }
                }
                '*' | ',' => {
                    self.bump();
                }
                _ if self.at_keyword("from") => {
                    self.advance("from".len());
                    self.skip_trivia();
                    if self.at_quote() {
                        return self.read_string();
                    }
                    return None;
                }
                c if is_ident_char(c) => {
                    while self.peek().is_some_and(is_ident_char) {
                        self.bump();
                    }
                }
                _ => return None,
            }
        }
    }

    fn scan_require(&mut self) {
        let line = self.line;
        self.advance("require".len());
        self.skip_trivia();
        if self.peek() != Some('(') {
            return;
        }
        self.bump();
        self.skip_trivia();
        if !self.at_quote() {
            return;
        }
        let Some(spec) = self.read_string() else {
            return;
        };
        self.skip_trivia();
        // `require("a" + b)` is not a static edge.
        if self.peek() == Some(')') {
            self.bump();
            self.record(spec, ImportKind::Require, line);
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(source: &str) -> Vec<String> {
        scan_imports(source)
            .into_iter()
            .map(|i| i.specifier)
            .collect()
    }

    #[test]
    fn test_esm_import_forms() {
        let source = r#"
import foo from "./default";
import { a, b as c } from './named';
import * as ns from "./star";
import def, { x } from "./mixed";
import "./side-effect";
"#;
        assert_eq!(
            specs(source),
            vec!["./default", "./named", "./star", "./mixed", "./side-effect"]
        );
        assert!(scan_imports(source)
            .iter()
            .all(|i| i.kind == ImportKind::Static));
    }

    #[test]
    fn test_elm_import_from_js_entry() {
        let source = "var Elm = require('./Main');\nElm.Main.embed(document.getElementById('main'));\n";
        let imports = scan_imports(source);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].specifier, "./Main");
        assert_eq!(imports[0].kind, ImportKind::Require);
    }

    #[test]
    fn test_export_from() {
        let source = r#"
export { foo } from "./dep";
export * from "./all";
export * as ns from "./ns";
export const local = 1;
export { local as renamed };
"#;
        let imports = scan_imports(source);
        assert_eq!(specs(source), vec!["./dep", "./all", "./ns"]);
        assert!(imports.iter().all(|i| i.kind == ImportKind::ReExport));
    }

    #[test]
    fn test_dynamic_import_is_not_static() {
        let imports = scan_imports(r#"const m = await import("./lazy");"#);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].kind, ImportKind::Dynamic);
        assert!(!imports[0].kind.is_static());
    }

    #[test]
    fn test_static_and_dynamic_same_specifier_both_kept() {
        let source = r#"
import("./dep");
import dep from "./dep";
"#;
        let imports = scan_imports(source);
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[1].kind, ImportKind::Static);
    }

    #[test]
    fn test_ignores_comments_and_strings() {
        let source = r#"
// import a from "./line-comment";
/* import b from "./block-comment";
   require("./also-comment") */
const s = "import c from './in-string'";
const t = `require("./in-template")`;
import real from "./real";
"#;
        assert_eq!(specs(source), vec!["./real"]);
    }

    #[test]
    fn test_member_access_is_not_a_keyword() {
        let source = r#"
loader.require("./not-this");
const x = import.meta.url;
const myrequire = 1;
"#;
        assert!(specs(source).is_empty());
    }

    #[test]
    fn test_non_literal_require_skipped() {
        let source = r#"
require("./a" + suffix);
require(name);
require(`./tpl/${name}`);
require( "./spaced" );
"#;
        assert_eq!(specs(source), vec!["./spaced"]);
    }

    #[test]
    fn test_deduplicates_in_first_appearance_order() {
        let source = r#"
import b from "./b";
import a from "./a";
const again = require("./b");
"#;
        assert_eq!(specs(source), vec!["./b", "./a"]);
    }

    #[test]
    fn test_line_numbers() {
        let source = "\nimport a from \"./a\";\n\n/*\n*/\nimport b from \"./b\";\n";
        let imports = scan_imports(source);
        assert_eq!(imports[0].line, 2);
        assert_eq!(imports[1].line, 6);
    }

    #[test]
    fn test_multiline_named_import() {
        let source = "import {\n  one,\n  two,\n} from \"./many\";\n";
        assert_eq!(specs(source), vec!["./many"]);
    }

    #[test]
    fn test_no_imports() {
        assert!(scan_imports("").is_empty());
        assert!(scan_imports("console.log('hello');").is_empty());
    }
}
