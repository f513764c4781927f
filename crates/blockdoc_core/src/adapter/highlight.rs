//! Token classifier for code blocks.
//!
//! A small per-language scanner that splits code into coloured tokens using
//! the light theme palette. Adjacent tokens of the same colour are merged, so
//! `import this` in Python yields `import` and ` this`.

/// Plain text.
pub const DEFAULT: &str = "#000000";
/// Control flow and import keywords.
pub const CONTROL: &str = "#AF00DB";
/// Declarations, operators spelled as words, and literal constants.
pub const STORAGE: &str = "#0000FF";
/// String literals.
pub const STRING: &str = "#A31515";
/// Numeric literals.
pub const NUMBER: &str = "#098658";
/// Comments.
pub const COMMENT: &str = "#008000";
/// Function names at call or definition sites.
pub const FUNCTION: &str = "#795E26";

/// A run of code sharing one colour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Source text
    pub text: String,
    /// CSS colour
    pub color: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Language {
    Python,
    JavaScript,
    Rust,
    Json,
}

impl Language {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "python" | "py" => Some(Language::Python),
            "javascript" | "js" | "jsx" | "typescript" | "ts" | "tsx" => {
                Some(Language::JavaScript)
            }
            "rust" | "rs" => Some(Language::Rust),
            "json" => Some(Language::Json),
            _ => None,
        }
    }

    fn control_keywords(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &[
                "if", "elif", "else", "for", "while", "break", "continue", "return", "try",
                "except", "finally", "raise", "with", "import", "from", "as", "pass", "yield",
                "await", "assert",
            ],
            Language::JavaScript => &[
                "if", "else", "for", "while", "do", "break", "continue", "return", "switch",
                "case", "default", "try", "catch", "finally", "throw", "import", "export",
                "from", "await", "yield",
            ],
            Language::Rust => &[
                "if", "else", "for", "while", "loop", "break", "continue", "return", "match",
                "await",
            ],
            Language::Json => &[],
        }
    }

    fn storage_keywords(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &[
                "def", "class", "lambda", "and", "or", "not", "in", "is", "global", "nonlocal",
                "del", "async", "True", "False", "None",
            ],
            Language::JavaScript => &[
                "const", "let", "var", "function", "class", "new", "typeof", "instanceof",
                "delete", "void", "this", "extends", "static", "async", "in", "of", "true",
                "false", "null", "undefined", "interface", "type", "enum",
            ],
            Language::Rust => &[
                "fn", "let", "mut", "pub", "struct", "enum", "impl", "trait", "type", "const",
                "static", "use", "mod", "crate", "self", "Self", "super", "where", "ref",
                "move", "unsafe", "async", "dyn", "as", "in", "extern", "true", "false",
            ],
            Language::Json => &["true", "false", "null"],
        }
    }

    fn line_comment(&self) -> Option<&'static str> {
        match self {
            Language::Python => Some("#"),
            Language::JavaScript | Language::Rust => Some("//"),
            Language::Json => None,
        }
    }

    fn has_block_comments(&self) -> bool {
        matches!(self, Language::JavaScript | Language::Rust)
    }

    fn quotes(&self) -> &'static [char] {
        match self {
            Language::Python => &['"', '\''],
            Language::JavaScript => &['"', '\'', '`'],
            Language::Rust | Language::Json => &['"'],
        }
    }
}

/// Whether the classifier knows a language name.
pub fn is_supported(language: &str) -> bool {
    Language::parse(language).is_some()
}

/// Split code into coloured tokens. Returns `None` for unsupported languages.
pub fn highlight(language: &str, code: &str) -> Option<Vec<Token>> {
    let language = Language::parse(language)?;
    let mut scanner = Scanner {
        chars: code.chars().collect(),
        pos: 0,
        language,
        tokens: Vec::new(),
    };
    scanner.run();
    Some(scanner.tokens)
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    language: Language,
    tokens: Vec<Token>,
}

impl Scanner {
    fn run(&mut self) {
        while self.pos < self.chars.len() {
            let start = self.pos;
            let c = self.chars[self.pos];

            let color = if self.at_line_comment() {
                self.skip_while(|c| c != '\n');
                COMMENT
            } else if self.language.has_block_comments() && self.starts_with("/*") {
                self.skip_block_comment();
                COMMENT
            } else if self.language.quotes().contains(&c) {
                self.skip_string(c);
                STRING
            } else if self.language == Language::Rust && c == '\'' {
                self.skip_char_or_lifetime()
            } else if c.is_ascii_digit() {
                self.skip_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                NUMBER
            } else if c.is_alphabetic() || c == '_' {
                self.skip_while(|c| c.is_alphanumeric() || c == '_');
                let word: String = self.chars[start..self.pos].iter().collect();
                self.classify_word(&word)
            } else {
                self.pos += 1;
                DEFAULT
            };

            let text: String = self.chars[start..self.pos].iter().collect();
            self.push(text, color);
        }
    }

    fn push(&mut self, text: String, color: &'static str) {
        match self.tokens.last_mut() {
            Some(last) if last.color == color => last.text.push_str(&text),
            _ => self.tokens.push(Token { text, color }),
        }
    }

    fn starts_with(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(i, p)| self.chars.get(self.pos + i) == Some(&p))
    }

    fn at_line_comment(&self) -> bool {
        self.language
            .line_comment()
            .is_some_and(|marker| self.starts_with(marker))
    }

    fn skip_while(&mut self, keep: impl Fn(char) -> bool) {
        while self.pos < self.chars.len() && keep(self.chars[self.pos]) {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while self.pos < self.chars.len() && !self.starts_with("*/") {
            self.pos += 1;
        }
        self.pos = (self.pos + 2).min(self.chars.len());
    }

    fn skip_string(&mut self, quote: char) {
        let triple: String = [quote; 3].iter().collect();
        if self.language == Language::Python && self.starts_with(&triple) {
            self.pos += 3;
            while self.pos < self.chars.len() && !self.starts_with(&triple) {
                self.pos += 1;
            }
            self.pos = (self.pos + 3).min(self.chars.len());
            return;
        }

        self.pos += 1;
        while self.pos < self.chars.len() {
            match self.chars[self.pos] {
                '\\' => self.pos += 2,
                c if c == quote => {
                    self.pos += 1;
                    break;
                }
                '\n' if quote != '`' => break,
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.chars.len());
    }

    /// `'a'` and `'\n'` are chars; `'a` alone is a lifetime.
    fn skip_char_or_lifetime(&mut self) -> &'static str {
        let closing = if self.chars.get(self.pos + 1) == Some(&'\\') { 3 } else { 2 };
        if self.chars.get(self.pos + closing) == Some(&'\'') {
            self.pos += closing + 1;
            STRING
        } else {
            self.pos += 1;
            self.skip_while(|c| c.is_alphanumeric() || c == '_');
            STORAGE
        }
    }

    fn classify_word(&self, word: &str) -> &'static str {
        if self.language.control_keywords().contains(&word) {
            return CONTROL;
        }
        if self.language.storage_keywords().contains(&word) {
            return STORAGE;
        }
        let next = self.chars[self.pos..].iter().find(|c| !c.is_whitespace());
        if self.language != Language::Json && next == Some(&'(') {
            return FUNCTION;
        }
        DEFAULT
    }
}
