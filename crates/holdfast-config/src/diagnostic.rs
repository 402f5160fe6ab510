// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment failures into miette diagnostics pointing at the
//! offending line of `holdfast.toml`.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a candidate must beat to be offered as a fix.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration problem, ready for rendering.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {}", section_label(section.as_deref()))]
    #[diagnostic(
        code(holdfast::config::unknown_key),
        help("{}", did_you_mean(suggestion.as_deref(), expected))
    )]
    UnknownKey {
        key: String,
        /// Table the key appeared under, `None` for the top level.
        section: Option<String>,
        suggestion: Option<String>,
        expected: String,
        #[label("not a holdfast setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// An enum-valued setting such as `storage.backend` got an unknown value.
    #[error("`{key}` cannot be `{value}`")]
    #[diagnostic(
        code(holdfast::config::unknown_value),
        help("{}", did_you_mean(suggestion.as_deref(), expected))
    )]
    UnknownValue {
        key: String,
        value: String,
        suggestion: Option<String>,
        expected: String,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(holdfast::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(holdfast::config::missing_key),
        help("set `{key}` in holdfast.toml or via HOLDFAST_* environment variables")
    )]
    MissingKey { key: String },

    /// Parsed fine but out of range or inconsistent.
    #[error("invalid configuration: {message}")]
    #[diagnostic(code(holdfast::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(holdfast::config::other))]
    Other(String),
}

fn section_label(section: Option<&str>) -> String {
    match section {
        Some(s) => format!("[{s}]"),
        None => "the top level".to_string(),
    }
}

fn did_you_mean(suggestion: Option<&str>, expected: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? expected one of: {expected}"),
        None => format!("expected one of: {expected}"),
    }
}

/// Map every error inside `err` to a [`ConfigError`].
///
/// `toml_sources` pairs a file path (as figment reports it) with its text
/// and is used to attach a source span to unknown keys.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.clone();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let located = source_of(&error, toml_sources)
                        .and_then(|(name, text)| locate_key(name, text, &path, field));
                    let (span, src) = located.unzip();
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        section: (!path.is_empty()).then(|| path.join(".")),
                        suggestion: closest(field, expected),
                        expected: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::UnknownVariant(value, expected) => ConfigError::UnknownValue {
                    key: path.join("."),
                    value: value.clone(),
                    suggestion: closest(value, expected),
                    expected: expected.join(", "),
                },
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: dotted(&path, field),
                },
                Kind::InvalidType(found, expected) | Kind::InvalidValue(found, expected) => {
                    ConfigError::InvalidType {
                        key: path.join("."),
                        found: found.to_string(),
                        expected: expected.clone(),
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn dotted(path: &[String], field: &str) -> String {
    path.iter()
        .map(String::as_str)
        .chain(std::iter::once(field))
        .collect::<Vec<_>>()
        .join(".")
}

/// The TOML text figment read the failing value from, if we have it.
fn source_of<'a>(
    error: &figment::Error,
    toml_sources: &'a [(String, String)],
) -> Option<(&'a str, &'a str)> {
    let name = match error.metadata.as_ref()?.source.as_ref()? {
        figment::Source::File(path) => path.display().to_string(),
        _ => "<inline>".to_string(),
    };
    toml_sources
        .iter()
        .find(|(p, _)| *p == name)
        .map(|(p, text)| (p.as_str(), text.as_str()))
}

fn locate_key(
    name: &str,
    text: &str,
    table: &[String],
    key: &str,
) -> Option<(SourceSpan, NamedSource<String>)> {
    let offset = find_key_offset(text, table, key)?;
    Some((
        SourceSpan::new(offset.into(), key.len()),
        NamedSource::new(name, text.to_string()),
    ))
}

/// Byte offset of `key` inside table `table` (empty for the top level).
///
/// Tracks `[header]` lines so a key of the same name in another table is
/// not matched.
pub fn find_key_offset(text: &str, table: &[String], key: &str) -> Option<usize> {
    let wanted = table.join(".");
    let mut current = String::new();
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        if let Some(header) = trimmed.strip_prefix('[') {
            current = header
                .split(']')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
        } else if current == wanted {
            let rest = trimmed.strip_prefix(key);
            if rest.is_some_and(|r| r.trim_start().starts_with('=')) {
                return Some(offset + indent);
            }
        }
        offset += line.len();
    }
    None
}

/// Best-scoring candidate above [`SUGGESTION_THRESHOLD`].
pub fn closest(input: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|c| (strsim::jaro_winkler(input, c), *c))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

/// Print each error to stderr with miette's graphical renderer.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}
