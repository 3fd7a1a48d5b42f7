//! Localized strings.
//!
//! [`Translations`] maps dotted keys to per-language text. Lookups fall back
//! to the default language, then to the key itself, so a missing string is
//! visible rather than fatal. [`Translator`] binds a namespace and language
//! for one command invocation.
//!
//! # Folder layout
//!
//! ```text
//! translations/
//! ├── en.json          { "command": { "ping": { "description": "Pong!" } } }
//! ├── es.json
//! └── admin/
//!     └── en.json      keys prefixed with "admin."
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::error::{TranslationError, TranslationResult};

/// Language used when a record or lookup does not specify one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Store of localized strings, keyed by dotted path then language.
pub struct Translations {
    default_language: String,
    entries: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl Default for Translations {
    fn default() -> Self {
        Self::new()
    }
}

impl Translations {
    pub fn new() -> Self {
        Self::with_default_language(DEFAULT_LANGUAGE)
    }

    pub fn with_default_language(language: impl Into<String>) -> Self {
        Self {
            default_language: language.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Sets the text for `key` in `language`.
    pub fn set(
        &self,
        key: impl Into<String>,
        language: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.entries
            .write()
            .entry(key.into())
            .or_default()
            .insert(language.into(), text.into());
    }

    /// Returns `true` if `key` has text in `language`.
    pub fn has(&self, key: &str, language: &str) -> bool {
        self.entries
            .read()
            .get(key)
            .is_some_and(|langs| langs.contains_key(language))
    }

    /// Resolves `key` in `language` and substitutes `{name}` placeholders.
    ///
    /// Falls back to the default language, then to `key` unchanged.
    pub fn get(&self, key: &str, language: &str, params: &[(&str, &str)]) -> String {
        let text = {
            let entries = self.entries.read();
            entries.get(key).and_then(|langs| {
                langs
                    .get(language)
                    .or_else(|| langs.get(&self.default_language))
                    .cloned()
            })
        };
        match text {
            Some(text) => substitute(&text, params),
            None => key.to_string(),
        }
    }

    /// Every language that has at least one string, sorted.
    pub fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self
            .entries
            .read()
            .values()
            .flat_map(|langs| langs.keys().cloned())
            .collect();
        languages.sort();
        languages.dedup();
        languages
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copies every string of `other` into `self`, overwriting on conflict.
    pub fn merge(&self, other: &Translations) {
        let incoming = other.entries.read();
        let mut entries = self.entries.write();
        for (key, langs) in incoming.iter() {
            let target = entries.entry(key.clone()).or_default();
            for (lang, text) in langs {
                target.insert(lang.clone(), text.clone());
            }
        }
    }

    /// Flattens a JSON object into dotted keys under `base`.
    ///
    /// Non-string leaves are stored in their JSON representation. Returns the
    /// number of strings imported.
    pub fn import_json(&self, base: &str, language: &str, value: &Value) -> usize {
        match value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| self.import_json(&join_key(base, k), language, v))
                .sum(),
            Value::String(text) => {
                self.set(base, language, text.clone());
                1
            }
            Value::Null => 0,
            other => {
                self.set(base, language, other.to_string());
                1
            }
        }
    }

    /// Loads `<lang>.json` files from `dir`; sub-folders add a key prefix.
    ///
    /// A missing folder is not an error. Returns the number of strings loaded.
    pub fn load_folder(&self, dir: &Path, base: &str) -> TranslationResult<usize> {
        if !dir.is_dir() {
            return Ok(0);
        }
        let io_err = |source| TranslationError::Io {
            path: dir.display().to_string(),
            source,
        };
        let mut paths: Vec<_> = fs::read_dir(dir)
            .map_err(io_err)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()
            .map_err(io_err)?;
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if path.is_dir() {
                loaded += self.load_folder(&path, &join_key(base, stem))?;
            } else if path.extension().is_some_and(|ext| ext == "json") {
                let raw = fs::read_to_string(&path).map_err(|source| TranslationError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                let value: Value =
                    serde_json::from_str(&raw).map_err(|source| TranslationError::Parse {
                        path: path.display().to_string(),
                        source,
                    })?;
                let count = self.import_json(base, stem, &value);
                debug!(path = %path.display(), language = stem, count, "Loaded translations");
                loaded += count;
            }
        }
        Ok(loaded)
    }
}

fn join_key(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}.{key}")
    }
}

fn substitute(text: &str, params: &[(&str, &str)]) -> String {
    params.iter().fold(text.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{name}}}"), value)
    })
}

// =============================================================================
// Translator
// =============================================================================

/// Localized-string accessor bound to a namespace and a language.
///
/// Keys are resolved under the namespace (`command.ping` + `reply` →
/// `command.ping.reply`); a leading `$` escapes to a global key.
#[derive(Clone)]
pub struct Translator {
    translations: Arc<Translations>,
    namespace: String,
    language: String,
}

impl Translator {
    pub fn new(
        translations: Arc<Translations>,
        namespace: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            translations,
            namespace: namespace.into(),
            language: language.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Resolves `key` with placeholder substitution.
    pub fn get(&self, key: &str, params: &[(&str, &str)]) -> String {
        let full_key = match key.strip_prefix('$') {
            Some(global) => global.to_string(),
            None => join_key(&self.namespace, key),
        };
        self.translations.get(&full_key, &self.language, params)
    }
}
