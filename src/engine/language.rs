//! Recognition language selection

use std::cmp::Ordering;
use std::fmt;

/// Fallback language when nothing is selected
pub const DEFAULT_PREFIX: &str = "eng";

/// Orientation and script detection data, not a selectable language
pub const OSD_PREFIX: &str = "osd";

/// A recognition language as persisted in the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSpec {
    /// Tesseract data prefix, `+`-joined when multilingual (e.g. "eng+deu")
    pub prefix: String,
    /// Spelling culture code (e.g. "en_US"), may be empty
    pub code: String,
    /// Display name, may be empty
    pub name: String,
}

impl LanguageSpec {
    /// Parse the persisted `prefix:code[:name]` form
    pub fn parse(setting: &str) -> Self {
        let mut parts = setting.splitn(3, ':');
        let prefix = parts.next().map(str::trim).unwrap_or_default();
        let code = parts.next().map(str::trim).unwrap_or_default();
        let name = parts.next().map(str::trim).unwrap_or_default();

        Self {
            prefix: if prefix.is_empty() { DEFAULT_PREFIX } else { prefix }.to_string(),
            code: code.to_string(),
            name: name.to_string(),
        }
    }

    /// Combine several languages for multilingual recognition
    pub fn multilingual<S: AsRef<str>>(prefixes: &[S]) -> Self {
        let joined = prefixes
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("+");

        Self {
            prefix: if joined.is_empty() { DEFAULT_PREFIX.to_string() } else { joined },
            code: String::new(),
            name: "Multilingual".to_string(),
        }
    }

    pub fn is_multilingual(&self) -> bool {
        self.prefix.contains('+')
    }

    /// Individual tesseract prefixes making up this language
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.prefix.split('+').filter(|p| !p.is_empty())
    }

    /// Persisted form
    pub fn to_setting(&self) -> String {
        format!("{}:{}", self.prefix, self.code)
    }

    /// Label shown next to the recognize action
    pub fn label(&self) -> String {
        let name = if self.name.is_empty() { &self.prefix } else { &self.name };
        if self.code.is_empty() {
            name.to_string()
        } else {
            format!("{} ({})", name, self.code)
        }
    }
}

impl Default for LanguageSpec {
    fn default() -> Self {
        Self::parse("eng:en_EN")
    }
}

impl fmt::Display for LanguageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)
    }
}

/// Script models are named `script/...` or start with an uppercase letter
fn is_script(language: &str) -> bool {
    language.starts_with("script") || language.chars().next().is_some_and(char::is_uppercase)
}

/// Order installed languages for display: regular languages first, then
/// script models, each alphabetically. `osd` is dropped.
pub fn sort_languages(mut languages: Vec<String>) -> Vec<String> {
    languages.retain(|l| l != OSD_PREFIX);
    languages.sort_by(|a, b| match (is_script(a), is_script(b)) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        _ => a.cmp(b),
    });
    languages
}
