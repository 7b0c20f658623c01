//! Statement / expression splitting
//!
//! The last non-blank line of a snippet is its result expression and
//! everything above it runs as statements. This is purely line based: a final
//! line that continues an unterminated multi-line statement (for example the
//! closing line of a bracketed literal) is still taken as the expression, and
//! Python reports the resulting syntax error.

/// A snippet split into its statement prefix and trailing expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnit {
    /// Lines run in statements mode, possibly empty
    pub statements: String,
    /// The last non-blank line, trimmed
    pub expression: String,
}

/// Split `code` into statements and a final expression
///
/// Callers reject blank code before splitting; for blank input the
/// expression comes back empty.
pub fn split(code: &str) -> CodeUnit {
    let lines: Vec<&str> = code.trim().lines().collect();

    let Some(last) = lines.iter().rposition(|line| !line.trim().is_empty()) else {
        return CodeUnit {
            statements: String::new(),
            expression: String::new(),
        };
    };

    CodeUnit {
        statements: lines[..last].join("\n"),
        expression: lines[last].trim().to_string(),
    }
}
