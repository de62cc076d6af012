//! Fortune - One snippet and its rendering
//!
//! Rendering is pure formatting with no backend access.

use serde::{Deserialize, Serialize};

use crate::constants::FORTUNE_PATH_PREFIX;

// =============================================================================
// Fortune
// =============================================================================

/// A fortune fetched from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fortune {
    /// Id minted by the loader; never reused
    pub id: u64,
    /// Owning module name
    #[serde(rename = "mod")]
    pub module: String,
    /// Body, may span several lines
    pub text: String,
}

impl Fortune {
    /// Create a fortune value.
    #[must_use]
    pub fn new(id: u64, module: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            module: module.into(),
            text: text.into(),
        }
    }

    /// Display path, `fortunes/<module>/<id>`.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{FORTUNE_PATH_PREFIX}{}/{}", self.module, self.id)
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Plain text. Verbose mode prefixes `<module>:<id>` on its own line.
    #[must_use]
    pub fn as_plain_text(&self, verbose: bool) -> String {
        if verbose {
            format!("{}:{}\n{}", self.module, self.id, self.text)
        } else {
            self.text.clone()
        }
    }

    /// Minimal HTML fragment tagged with the display path.
    ///
    /// The text is NOT escaped. Callers showing untrusted fortunes in a
    /// browser must escape it themselves.
    #[must_use]
    pub fn as_html_fragment(&self) -> String {
        format!("<div id=\"{}\"><pre>{}</pre></div>", self.path(), self.text)
    }
}

impl std::fmt::Display for Fortune {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
