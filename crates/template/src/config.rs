//! Parser configuration.
//!
//! Invalid values never fail a parse: they are replaced by their defaults and
//! reported as [`DiagnosticKind::InvalidConfig`] diagnostics.

use std::path::PathBuf;

use serde::Deserialize;

use crate::shared::{Diagnostic, DiagnosticKind};

pub const DEFAULT_NAMESPACE: &str = "ten";
pub const DEFAULT_TAB_SIZE: usize = 2;
pub const DEFAULT_INDENT: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed parser configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParserConfig {
    /// Tag and entity prefix recognized as template vocabulary.
    pub namespace: String,
    /// Keep ordinary comments as `Comment` nodes instead of dropping them.
    pub save_comments: bool,
    /// Scan CDATA content for template tags instead of keeping it literal.
    pub parse_cdata: bool,
    /// Remove the indentation owned by the enclosing template tags from text.
    pub strip_indent: bool,
    /// Width of one tab, in spaces.
    pub tab_size: usize,
    /// Indentation per nesting level, in spaces.
    pub indent: usize,
    /// Drop a leading XML declaration/doctype instead of keeping it as text.
    pub remove_prolog: bool,
    /// Template path reported in diagnostics.
    pub path: Option<PathBuf>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            save_comments: true,
            parse_cdata: false,
            strip_indent: true,
            tab_size: DEFAULT_TAB_SIZE,
            indent: DEFAULT_INDENT,
            remove_prolog: true,
            path: None,
        }
    }
}

impl ParserConfig {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Load a configuration from TOML and validate it.
    ///
    /// Missing keys take their defaults. Numeric options accept floats and
    /// are rounded.
    pub fn from_toml_str(text: &str) -> Result<(Self, Vec<Diagnostic>), ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;
        let mut diagnostics = Vec::new();
        let defaults = ParserConfig::default();
        let mut config = ParserConfig {
            namespace: raw.namespace.unwrap_or(defaults.namespace),
            save_comments: raw.save_comments.unwrap_or(defaults.save_comments),
            parse_cdata: raw.parse_cdata.unwrap_or(defaults.parse_cdata),
            strip_indent: raw.strip_indent.unwrap_or(defaults.strip_indent),
            tab_size: defaults.tab_size,
            indent: defaults.indent,
            remove_prolog: raw.remove_prolog.unwrap_or(defaults.remove_prolog),
            path: raw.path,
        };
        if let Some(value) = raw.tab_size {
            match round_option(value) {
                Some(n) => config.tab_size = n,
                None => diagnostics.push(invalid("Invalid tab size.", &config)),
            }
        }
        if let Some(value) = raw.indent {
            match round_option(value) {
                Some(n) => config.indent = n,
                None => diagnostics.push(invalid("Invalid indent.", &config)),
            }
        }
        diagnostics.extend(config.validate());
        Ok((config, diagnostics))
    }

    /// Replace invalid values by their defaults, reporting each replacement.
    pub fn validate(&mut self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if !is_valid_namespace(&self.namespace) {
            log::warn!(
                target: "template.config",
                "invalid namespace {:?}, using {:?}",
                self.namespace,
                DEFAULT_NAMESPACE
            );
            diagnostics.push(invalid("Invalid namespace.", self));
            self.namespace = DEFAULT_NAMESPACE.to_string();
        }
        if self.tab_size < 1 {
            log::warn!(target: "template.config", "invalid tab size {}", self.tab_size);
            diagnostics.push(invalid("Invalid tab size.", self));
            self.tab_size = DEFAULT_TAB_SIZE;
        }
        if self.indent < 1 {
            log::warn!(target: "template.config", "invalid indent {}", self.indent);
            diagnostics.push(invalid("Invalid indent.", self));
            self.indent = DEFAULT_INDENT;
        }
        diagnostics
    }

    /// Tabs removed per nesting level when stripping indentation.
    pub(crate) fn tabs_per_level(&self) -> usize {
        (self.indent / self.tab_size.max(1)).max(1)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    namespace: Option<String>,
    save_comments: Option<bool>,
    parse_cdata: Option<bool>,
    strip_indent: Option<bool>,
    tab_size: Option<f64>,
    indent: Option<f64>,
    remove_prolog: Option<bool>,
    path: Option<PathBuf>,
}

fn round_option(value: f64) -> Option<usize> {
    if !value.is_finite() || value < 1.0 {
        return None;
    }
    let rounded = value.round();
    if rounded > usize::MAX as f64 {
        return None;
    }
    Some(rounded as usize)
}

fn invalid(message: &str, config: &ParserConfig) -> Diagnostic {
    Diagnostic::new(DiagnosticKind::InvalidConfig, message).with_path(config.path.clone())
}

pub(crate) fn is_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty()
        && namespace
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
