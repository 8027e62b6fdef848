//! Spoken app names mapped to the literal names they are installed under

use std::collections::HashMap;

/// Built-in aliases for common apps whose executable name differs from how
/// people say it
const DEFAULT_ALIASES: &[(&str, &[&str])] = &[
    ("chrome", &["google chrome", "chrome.exe"]),
    ("google chrome", &["chrome.exe"]),
    ("firefox", &["mozilla firefox", "firefox.exe"]),
    ("edge", &["microsoft edge", "msedge.exe"]),
    ("word", &["microsoft word", "winword.exe"]),
    ("excel", &["microsoft excel", "excel.exe"]),
    ("powerpoint", &["microsoft powerpoint", "powerpnt.exe"]),
    ("outlook", &["microsoft outlook", "outlook.exe"]),
    ("teams", &["microsoft teams", "ms-teams.exe"]),
    ("photoshop", &["adobe photoshop", "photoshop.exe"]),
    ("illustrator", &["adobe illustrator", "illustrator.exe"]),
    ("acrobat", &["adobe acrobat", "acrobat.exe", "acrord32.exe"]),
    ("vs code", &["visual studio code", "code.exe"]),
    ("vscode", &["visual studio code", "code.exe"]),
    ("visual studio code", &["code.exe"]),
    ("notepad plus plus", &["notepad++", "notepad++.exe"]),
    ("file explorer", &["explorer.exe"]),
    ("explorer", &["explorer.exe"]),
    ("calculator", &["calc.exe", "calculator"]),
    ("paint", &["mspaint.exe"]),
    ("terminal", &["windows terminal", "wt.exe", "windowsterminal.exe"]),
    ("command prompt", &["cmd.exe"]),
    ("task manager", &["taskmgr.exe"]),
    ("obs", &["obs studio", "obs64.exe"]),
    ("vlc", &["vlc media player", "vlc.exe"]),
    ("spotify", &["spotify.exe"]),
    ("discord", &["discord.exe", "update.exe"]),
    ("steam", &["steam.exe"]),
];

/// Static mapping from canonical spoken names to name variants
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: HashMap<String, Vec<String>>,
}

impl AliasTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with the built-in aliases
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::from_entries(
            DEFAULT_ALIASES
                .iter()
                .map(|(name, variants)| (*name, variants.to_vec())),
        )
    }

    /// Build a table from `(name, variants)` pairs
    #[must_use]
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, Vec<V>)>,
    {
        let mut table = Self::new();
        for (name, variants) in entries {
            table.insert(name.as_ref(), variants);
        }
        table
    }

    /// Add or replace the variants for a spoken name
    ///
    /// The key is lowercased and trimmed; empty variants are dropped.
    pub fn insert<V: Into<String>>(&mut self, name: &str, variants: Vec<V>) {
        let key = canonical(name);
        if key.is_empty() {
            return;
        }
        let variants: Vec<String> = variants
            .into_iter()
            .map(Into::into)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        self.entries.insert(key, variants);
    }

    /// Overlay another table; its entries win on conflict
    pub fn extend(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// Variants for a spoken name, empty when there is no entry
    #[must_use]
    pub fn lookup(&self, name: &str) -> &[String] {
        self.entries
            .get(&canonical(name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn canonical(name: &str) -> String {
    name.trim().to_lowercase()
}
