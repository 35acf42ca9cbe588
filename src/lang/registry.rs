//! Metadata and grammar lookup for the languages compiled into this build.

use std::path::Path;
use tree_sitter::Language;

use crate::core::errors::{BadcodeError, Result};

/// Metadata describing one of the built-in grammars.
#[derive(Debug, Clone, Copy)]
pub struct LanguageInfo {
    /// Canonical short key (matches config usage, e.g. "go").
    pub key: &'static str,
    /// Human-friendly display name.
    pub name: &'static str,
    /// Supported file extensions (without leading dots).
    pub extensions: &'static [&'static str],
}

const REGISTERED_LANGUAGES: &[LanguageInfo] = &[
    LanguageInfo {
        key: "go",
        name: "Go",
        extensions: &["go"],
    },
    LanguageInfo {
        key: "py",
        name: "Python",
        extensions: &["py", "pyi"],
    },
    LanguageInfo {
        key: "rs",
        name: "Rust",
        extensions: &["rs"],
    },
    LanguageInfo {
        key: "js",
        name: "JavaScript",
        extensions: &["js", "jsx", "mjs", "cjs"],
    },
    LanguageInfo {
        key: "ts",
        name: "TypeScript",
        extensions: &["ts", "tsx", "cts", "mts"],
    },
];

/// Return the languages that are compiled into this build.
pub fn registered_languages() -> &'static [LanguageInfo] {
    REGISTERED_LANGUAGES
}

/// Identify the canonical language key for a file path.
pub fn language_key_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    if ext.is_empty() {
        return None;
    }

    find_language_by_extension(ext).map(|info| info.key)
}

/// Get the tree-sitter grammar for a given language key
pub fn get_tree_sitter_language(language_key: &str) -> Result<Language> {
    match normalize_language_key(language_key) {
        Some("py") => Ok(tree_sitter_python::LANGUAGE.into()),
        Some("rs") => Ok(tree_sitter_rust::LANGUAGE.into()),
        Some("js") => Ok(tree_sitter_javascript::LANGUAGE.into()),
        Some("ts") => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        Some("go") => Ok(tree_sitter_go::LANGUAGE.into()),
        _ => Err(BadcodeError::unsupported(format!(
            "No tree-sitter grammar for: {}",
            language_key
        ))),
    }
}

/// Grammar for a concrete file, honouring the TSX dialect.
pub fn grammar_for_path(path: &Path) -> Result<(&'static str, Language)> {
    let key = language_key_for_path(path).ok_or_else(|| {
        BadcodeError::unsupported(format!(
            "Could not determine language for file: {}",
            path.display()
        ))
    })?;

    let is_tsx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tsx"));
    if is_tsx {
        return Ok((key, tree_sitter_typescript::LANGUAGE_TSX.into()));
    }

    Ok((key, get_tree_sitter_language(key)?))
}

/// Create a new parser for the given grammar
pub fn create_parser(language_key: &str, language: &Language) -> Result<tree_sitter::Parser> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(language).map_err(|e| {
        BadcodeError::parse(
            language_key,
            format!("Failed to set parser language: {}", e),
        )
    })?;
    Ok(parser)
}

/// Finds the language info for a given file extension.
fn find_language_by_extension(ext: &str) -> Option<&'static LanguageInfo> {
    let target = ext.trim_start_matches('.').to_ascii_lowercase();
    registered_languages().iter().find(|info| {
        info.extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(&target))
    })
}

/// Normalizes a language identifier to its canonical key.
pub fn normalize_language_key(language: &str) -> Option<&'static str> {
    match language.to_ascii_lowercase().as_str() {
        "py" | "pyw" | "python" => Some("py"),
        "js" | "jsx" | "mjs" | "cjs" | "javascript" => Some("js"),
        "ts" | "tsx" | "cts" | "mts" | "typescript" => Some("ts"),
        "rs" | "rust" => Some("rs"),
        "go" | "golang" => Some("go"),
        other => registered_languages()
            .iter()
            .find(|info| info.key == other)
            .map(|info| info.key),
    }
}
