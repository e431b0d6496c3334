//! Name sanitization for generated symbols.
//!
//! Specification names are user-facing text (`dry-run`, `list_all`) and are
//! emitted verbatim wherever the user types or reads them. Generated Rust
//! symbols are derived from them by fixed rules:
//!
//! - symbols are lowercased and `-`/space become `_`;
//! - symbols that are Rust keywords get a trailing `_` (`type` → `type_`);
//! - type names are the UpperCamelCase of the symbol (`list_all` → `ListAll`),
//!   except that `Self` becomes `Self_`;
//! - value placeholders are SCREAMING_SNAKE (`out-dir` → `OUT_DIR`).
//!
//! # Examples
//!
//! ```
//! use cliforge_core::naming::{symbol_name, type_name, value_name};
//!
//! assert_eq!(symbol_name("dry-run"), "dry_run");
//! assert_eq!(symbol_name("type"), "type_");
//! assert_eq!(type_name("list_all"), "ListAll");
//! assert_eq!(value_name("out-dir"), "OUT_DIR");
//! ```

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final",
    "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

/// Returns `true` if `word` is a strict or reserved Rust keyword.
pub fn is_rust_keyword(word: &str) -> bool {
    RUST_KEYWORDS.contains(&word)
}

/// Maps a specification name to a field/function/module identifier.
pub fn symbol_name(name: &str) -> String {
    let symbol: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect();
    if is_rust_keyword(&symbol) {
        format!("{symbol}_")
    } else {
        symbol
    }
}

/// Maps a specification name to a type identifier.
pub fn type_name(name: &str) -> String {
    let camel: String = symbol_name(name)
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    if camel == "Self" {
        "Self_".to_string()
    } else {
        camel
    }
}

/// Maps a specification name to a help placeholder (`<OUT_DIR>`).
pub fn value_name(name: &str) -> String {
    name.trim().to_uppercase().replace(['-', ' '], "_")
}

/// Maps a specification name to the crate identifier cargo derives from it.
pub fn crate_name(name: &str) -> String {
    name.trim().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_are_suffixed() {
        assert_eq!(symbol_name("self"), "self_");
        assert_eq!(symbol_name("gen"), "gen_");
        assert_eq!(symbol_name("types"), "types");
    }

    #[test]
    fn test_type_name_of_keyword() {
        assert_eq!(type_name("type"), "Type");
        assert_eq!(type_name("resize"), "Resize");
        assert_eq!(type_name("img-convert"), "ImgConvert");
        assert_eq!(type_name("self"), "Self_");
    }

    #[test]
    fn test_hyphen_and_underscore_collide() {
        assert_eq!(symbol_name("dry-run"), symbol_name("dry_run"));
    }

    #[test]
    fn test_crate_name() {
        assert_eq!(crate_name("img-convert"), "img_convert");
    }
}
