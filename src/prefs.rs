// src/prefs.rs

//! Profile preference store (`prefs.js`)
//!
//! Firefox persists user preferences as a list of JavaScript-like calls:
//!
//! ```text
//! // Mozilla User Preferences
//! user_pref("browser.startup.homepage", "about:blank");
//! user_pref("extensions.autoDisableScopes", 0);
//! user_pref("xpinstall.signatures.required", false);
//! ```
//!
//! Loading yields a [`PreferenceMap`]. When a key occurs more than once the
//! last occurrence wins, matching what the browser itself does when it
//! replays the file. Persisting writes entries sorted by key, and only when
//! the merged map differs from what was loaded.

use crate::error::{Error, Result};
use crate::filesystem::atomic_write;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the preference file inside a profile
pub const PREFS_FILE_NAME: &str = "prefs.js";

/// Header Firefox writes at the top of prefs.js
const PREFS_HEADER: &str = "// Mozilla User Preferences

// DO NOT EDIT THIS FILE.
//
// If you make changes to this file while the application is running,
// the changes will be overwritten when the application exits.
//
// To change a preference value, you can either:
// - modify it via the UI (e.g. via about:config in the browser); or
// - set it within a user.js file in your profile.

";

/// A preference value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl PrefValue {
    /// Render as a prefs.js literal
    pub fn to_js(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            // JSON string escaping is valid JavaScript string syntax
            Self::String(s) => serde_json::Value::String(s.clone()).to_string(),
        }
    }
}

impl fmt::Display for PrefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_js())
    }
}

impl From<bool> for PrefValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PrefValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for PrefValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Preferences keyed (and therefore ordered) by name
pub type PreferenceMap = BTreeMap<String, PrefValue>;

/// Parse error with the 1-based line it occurred on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

/// Parse prefs.js text into (key, value) pairs in file order
pub fn parse_preferences(text: &str) -> std::result::Result<Vec<(String, PrefValue)>, ParseError> {
    let mut parser = Parser::new(text);
    let mut pairs = Vec::new();

    loop {
        parser.skip_trivia()?;
        if parser.at_end() {
            break;
        }

        let func = parser.identifier()?;
        if !matches!(func.as_str(), "user_pref" | "pref" | "sticky_pref") {
            return Err(parser.error(format!("unexpected statement '{func}'")));
        }
        parser.expect('(')?;
        let key = parser.string()?;
        parser.expect(',')?;
        let value = parser.value()?;
        // pref() may carry trailing attributes such as `sticky` or `locked`
        parser.skip_trivia()?;
        while parser.peek() == Some(',') {
            parser.bump();
            parser.skip_trivia()?;
            parser.identifier()?;
            parser.skip_trivia()?;
        }
        parser.expect(')')?;
        parser.expect(';')?;

        pairs.push((key, value));
    }

    Ok(pairs)
}

/// Materialize pairs into a map; later duplicates override earlier ones
pub fn pairs_to_map(pairs: Vec<(String, PrefValue)>) -> PreferenceMap {
    pairs.into_iter().collect()
}

/// Render a map as prefs.js text, sorted by key
pub fn serialize_preferences(map: &PreferenceMap) -> String {
    let mut out = String::from(PREFS_HEADER);
    for (key, value) in map {
        let key = serde_json::Value::String(key.clone()).to_string();
        out.push_str(&format!("user_pref({}, {});\n", key, value.to_js()));
    }
    out
}

/// Load a profile's preferences; a missing file is an empty map
pub fn load(path: &Path) -> Result<PreferenceMap> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No preference file at {}", path.display());
            return Ok(PreferenceMap::new());
        }
        Err(e) => return Err(Error::Io(e)),
    };

    let pairs = parse_preferences(&text).map_err(|e| Error::Preferences {
        path: path.to_path_buf(),
        line: e.line,
        reason: e.reason,
    })?;
    debug!("Read {} preference entries from {}", pairs.len(), path.display());
    Ok(pairs_to_map(pairs))
}

/// Merge `overrides` over `base`, overwriting existing keys
pub fn apply_overrides(base: &PreferenceMap, overrides: &PreferenceMap) -> PreferenceMap {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// True iff `new` adds a key or changes a value relative to `old`
pub fn diff(old: &PreferenceMap, new: &PreferenceMap) -> bool {
    new.iter().any(|(key, value)| old.get(key) != Some(value))
}

/// Write `map` to `path`, sorted by key
pub fn persist(path: &Path, map: &PreferenceMap) -> Result<()> {
    atomic_write(path, serialize_preferences(map).as_bytes())?;
    info!("Wrote {} preferences to {}", map.len(), path.display());
    Ok(())
}

/// Preferences of one profile, tracking what changed since load
#[derive(Debug)]
pub struct PreferenceStore {
    path: PathBuf,
    loaded: PreferenceMap,
    current: PreferenceMap,
}

impl PreferenceStore {
    /// Load the store for a preference file
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let loaded = load(&path)?;
        Ok(Self {
            current: loaded.clone(),
            loaded,
            path,
        })
    }

    /// Load `prefs.js` from a profile directory
    pub fn for_profile(profile_dir: &Path) -> Result<Self> {
        Self::load(profile_dir.join(PREFS_FILE_NAME))
    }

    /// Merge overrides into the pending state
    pub fn apply_overrides(&mut self, overrides: &PreferenceMap) {
        self.current = apply_overrides(&self.current, overrides);
    }

    /// Whether the pending state differs from the loaded file
    pub fn is_changed(&self) -> bool {
        diff(&self.loaded, &self.current)
    }

    /// Keys whose value would change on commit
    pub fn changed_keys(&self) -> Vec<&str> {
        self.current
            .iter()
            .filter(|(key, value)| self.loaded.get(*key) != Some(*value))
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Persist pending changes; returns whether anything was written
    pub fn commit(&mut self) -> Result<bool> {
        if !self.is_changed() {
            debug!("Preferences unchanged, not writing {}", self.path.display());
            return Ok(false);
        }
        persist(&self.path, &self.current)?;
        self.loaded = self.current.clone();
        Ok(true)
    }

    /// Pending preference state
    pub fn current(&self) -> &PreferenceMap {
        &self.current
    }

    /// Path of the preference file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn error(&self, reason: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line,
            reason: reason.into(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }

    /// Skip whitespace and `//`, `#` and `/* */` comments
    fn skip_trivia(&mut self) -> std::result::Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => self.skip_line(),
                Some('/') => {
                    self.bump();
                    match self.bump() {
                        Some('/') => self.skip_line(),
                        Some('*') => {
                            let mut prev = '\0';
                            loop {
                                match self.bump() {
                                    Some('/') if prev == '*' => break,
                                    Some(c) => prev = c,
                                    None => return Err(self.error("unterminated comment")),
                                }
                            }
                        }
                        _ => return Err(self.error("stray '/'")),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn expect(&mut self, want: char) -> std::result::Result<(), ParseError> {
        self.skip_trivia()?;
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(self.error(format!("expected '{want}', found '{c}'"))),
            None => Err(self.error(format!("expected '{want}', found end of file"))),
        }
    }

    fn identifier(&mut self) -> std::result::Result<String, ParseError> {
        self.skip_trivia()?;
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if ident.is_empty() {
            return Err(self.error("expected identifier"));
        }
        Ok(ident)
    }

    fn string(&mut self) -> std::result::Result<String, ParseError> {
        self.skip_trivia()?;
        if self.bump() != Some('"') {
            return Err(self.error("expected string literal"));
        }

        // Collect the raw literal and let serde_json handle the escapes
        let mut raw = String::from("\"");
        loop {
            match self.bump() {
                Some('\\') => {
                    raw.push('\\');
                    match self.bump() {
                        Some(c) => raw.push(c),
                        None => return Err(self.error("unterminated string")),
                    }
                }
                Some('"') => break,
                Some('\n') | None => return Err(self.error("unterminated string")),
                // Firefox writes tabs and other control characters unescaped
                Some(c) if c.is_control() => raw.push_str(&format!("\\u{:04x}", c as u32)),
                Some(c) => raw.push(c),
            }
        }
        raw.push('"');

        serde_json::from_str::<String>(&raw)
            .map_err(|e| self.error(format!("invalid string literal: {e}")))
    }

    fn value(&mut self) -> std::result::Result<PrefValue, ParseError> {
        self.skip_trivia()?;
        match self.peek() {
            Some('"') => Ok(PrefValue::String(self.string()?)),
            Some(c) if c == '-' || c == '+' || c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(c) = self.peek() {
                    if c == '-' || c == '+' || c.is_ascii_digit() {
                        digits.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                digits
                    .trim_start_matches('+')
                    .parse::<i64>()
                    .map(PrefValue::Int)
                    .map_err(|_| self.error(format!("invalid integer '{digits}'")))
            }
            _ => match self.identifier()?.as_str() {
                "true" => Ok(PrefValue::Bool(true)),
                "false" => Ok(PrefValue::Bool(false)),
                other => Err(self.error(format!("invalid value '{other}'"))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, PrefValue)]) -> PreferenceMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_parse_firefox_file() {
        let text = r#"// Mozilla User Preferences

/* block
   comment */
user_pref("app.update.lastUpdateTime.addon-background-update-timer", 1453483497);
user_pref("browser.startup.homepage", "about:blank");
user_pref("xpinstall.signatures.required", false);
user_pref("extensions.negative", -3);
"#;
        let pairs = parse_preferences(text).unwrap();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[1].0, "browser.startup.homepage");
        assert_eq!(pairs[1].1, PrefValue::from("about:blank"));
        assert_eq!(pairs[2].1, PrefValue::Bool(false));
        assert_eq!(pairs[3].1, PrefValue::Int(-3));
    }

    #[test]
    fn test_parse_escapes_and_attributes() {
        let text = "pref(\"a.b\", \"say \\\"hi\\\"\\n\\u00e9\", sticky);\n";
        let pairs = parse_preferences(text).unwrap();
        assert_eq!(pairs[0].1, PrefValue::from("say \"hi\"\n\u{e9}"));
    }

    #[test]
    fn test_parse_raw_tab_in_string() {
        let pairs = parse_preferences("user_pref(\"a.b\", \"x\ty\");\n").unwrap();
        assert_eq!(pairs[0].1, PrefValue::from("x\ty"));

        // Written back escaped, and still loads
        let map = pairs_to_map(pairs);
        let text = serialize_preferences(&map);
        assert!(text.contains(r#"user_pref("a.b", "x\ty");"#));
        assert_eq!(pairs_to_map(parse_preferences(&text).unwrap()), map);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let text = "user_pref(\"ok\", 1);\nuser_pref(\"bad\" 2);\n";
        let err = parse_preferences(text).unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let text = "user_pref(\"k\", 1);\nuser_pref(\"k\", 2);\n";
        let prefs = pairs_to_map(parse_preferences(text).unwrap());
        assert_eq!(prefs.get("k"), Some(&PrefValue::Int(2)));
    }

    #[test]
    fn test_serialize_sorted_and_reparseable() {
        let prefs = map(&[
            ("z.last", PrefValue::from(true)),
            ("a.first", PrefValue::from("quote \" and \\ slash")),
            ("m.middle", PrefValue::from(10)),
        ]);
        let text = serialize_preferences(&prefs);
        assert!(text.starts_with("// Mozilla User Preferences"));

        let a = text.find("a.first").unwrap();
        let m = text.find("m.middle").unwrap();
        let z = text.find("z.last").unwrap();
        assert!(a < m && m < z);

        assert_eq!(pairs_to_map(parse_preferences(&text).unwrap()), prefs);
    }

    #[test]
    fn test_diff() {
        let old = map(&[("a", PrefValue::from(1))]);
        assert!(!diff(&old, &old.clone()));
        assert!(diff(&old, &map(&[("a", PrefValue::from(2))])));
        assert!(diff(&old, &apply_overrides(&old, &map(&[("b", PrefValue::from(true))]))));
        // Re-applying an identical value is not a change
        assert!(!diff(&old, &apply_overrides(&old, &old)));
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::for_profile(dir.path()).unwrap();
        assert!(store.current().is_empty());
        assert!(!store.is_changed());
    }

    #[test]
    fn test_commit_only_when_changed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFS_FILE_NAME);
        fs::write(&path, "user_pref(\"keep\", 1);\n").unwrap();

        let mut store = PreferenceStore::load(&path).unwrap();
        store.apply_overrides(&map(&[("keep", PrefValue::from(1))]));
        assert!(!store.commit().unwrap());
        // Untouched: the original text has no header
        assert_eq!(fs::read_to_string(&path).unwrap(), "user_pref(\"keep\", 1);\n");

        store.apply_overrides(&map(&[("foo", PrefValue::from(true))]));
        assert_eq!(store.changed_keys(), vec!["foo"]);
        assert!(store.commit().unwrap());
        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.get("foo"), Some(&PrefValue::Bool(true)));
        assert_eq!(reloaded.get("keep"), Some(&PrefValue::Int(1)));
        assert!(!store.is_changed());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFS_FILE_NAME);
        fs::write(&path, "user_pref(\"x\", nope);\n").unwrap();
        assert!(matches!(
            PreferenceStore::load(&path),
            Err(Error::Preferences { line: 1, .. })
        ));
    }
}
