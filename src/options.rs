/// Delimiter pairs for raw and encoding interpolation tags.
///
/// The encoded pair is expected to be a longer variant of the raw pair
/// (the defaults are `{{`/`}}` and `{{{`/`}}}`).
#[derive(Debug, Clone)]
pub struct Tags {
    pub raw: (String, String),
    pub encoded: (String, String),
}

impl Default for Tags {
    fn default() -> Self {
        Tags {
            raw: ("{{".to_string(), "}}".to_string()),
            encoded: ("{{{".to_string(), "}}}".to_string()),
        }
    }
}

/// Compile-time configuration for a template.
#[derive(Debug, Clone)]
pub struct Options {
    /// Collapse every run of whitespace in the final output to one space.
    pub collapse: bool,
    /// Ordered character substitutions applied inside encoded tags. `&` comes
    /// first in the default map so entities are not double-encoded.
    pub encode: Vec<(char, String)>,
    /// Ordered regex fragments; any unescaped occurrence in an interpolated
    /// value gets a backslash inserted before it.
    pub escape: Vec<String>,
    /// Render interpolations with no matching key as the empty string
    /// instead of echoing the tag back.
    pub remove_unmatched: bool,
    pub tags: Tags,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            collapse: false,
            encode: default_encode_map(),
            escape: Vec::new(),
            remove_unmatched: false,
            tags: Tags::default(),
        }
    }
}

fn default_encode_map() -> Vec<(char, String)> {
    [
        ('&', "&amp;"),
        ('<', "&lt;"),
        ('>', "&gt;"),
        ('"', "&quot;"),
        ('\'', "&#39;"),
        ('/', "&#x2F;"),
        ('`', "&#x60;"),
        ('=', "&#x3D;"),
    ]
    .iter()
    .map(|(c, e)| (*c, e.to_string()))
    .collect()
}
