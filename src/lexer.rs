use crate::options::Options;

/// A recognized section opener.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    If { path: String, negated: bool },
    Each { path: String },
    For { path: String, count: Option<u32> },
    Component { name: String, path: Option<String> },
}

impl Block {
    pub fn kind(&self) -> &'static str {
        match self {
            Block::If { .. } => "if",
            Block::Each { .. } => "each",
            Block::For { .. } => "for",
            Block::Component { .. } => "component",
        }
    }
}

/// One element of the flat token stream produced by [`tokenize`]. Section
/// nesting is implicit: the interpreter pairs `Open` and `End` tokens while
/// walking the stream, there is no tree-building pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    Interpolate {
        path: String,
        encode: bool,
        /// Verbatim tag text, emitted when the path has no match.
        original: String,
    },
    Open(Block),
    /// Close tag; carries the raw name so stray closers of any spelling can
    /// be matched (or dropped) at render time.
    End(String),
}

/// Index-based cursor over a token slice. Rendering advances a shared
/// position through recursive calls instead of consuming a queue, so one
/// compiled token vector serves any number of concurrent renders.
pub struct TokenReader<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenReader<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    pub fn done(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

/// Convert a template string into a token stream.
///
/// Hand-written delimiter scan: find the earliest opening delimiter (the
/// encoded pair wins a tie since it is the longer spelling), then the
/// nearest closing delimiter (same tie rule), and classify the content in
/// between. Anything that never closes is literal text; unknown section
/// names are dropped.
pub fn tokenize(template: &str, options: &Options) -> Vec<Token> {
    let raw_open = options.tags.raw.0.as_str();
    let raw_close = options.tags.raw.1.as_str();
    let enc_open = options.tags.encoded.0.as_str();
    let enc_close = options.tags.encoded.1.as_str();

    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut cursor = 0;

    while cursor < template.len() {
        let rem = &template[cursor..];

        let (at, open, open_is_enc) = match earliest(rem, enc_open, raw_open) {
            Some(found) => found,
            None => {
                text.push_str(rem);
                break;
            }
        };

        text.push_str(&rem[..at]);
        let after_open = &rem[at + open.len()..];

        // Realign on delimiter-character runs: `{{{{foo}}}}` lexes as a `{`
        // of text, then the encoded tag, then a trailing `}`.
        if let Some(delim_char) = char_run_of(open) {
            if after_open.starts_with(delim_char) {
                text.push(delim_char);
                cursor += at + delim_char.len_utf8();
                continue;
            }
        }

        let (close_at, close_len, close_is_enc) = match earliest(after_open, enc_close, raw_close)
        {
            Some((p, close, is_enc)) => (p, close.len(), is_enc),
            None => {
                // Unterminated tag: the rest of the template is literal.
                text.push_str(&rem[at..]);
                break;
            }
        };

        let content = &after_open[..close_at];
        let original = &rem[at..at + open.len() + close_at + close_len];
        cursor += at + open.len() + close_at + close_len;

        if content.trim().is_empty() {
            continue;
        }
        flush_text(&mut text, &mut tokens);
        classify(
            content,
            open_is_enc && close_is_enc,
            original,
            &mut tokens,
        );
    }

    flush_text(&mut text, &mut tokens);
    tokens
}

/// Earliest occurrence of either needle; on a tie the longer (encoded)
/// spelling wins.
fn earliest<'a>(
    haystack: &str,
    encoded: &'a str,
    raw: &'a str,
) -> Option<(usize, &'a str, bool)> {
    match (haystack.find(encoded), haystack.find(raw)) {
        (Some(e), Some(r)) if e <= r => Some((e, encoded, true)),
        (_, Some(r)) => Some((r, raw, false)),
        (Some(e), None) => Some((e, encoded, true)),
        (None, None) => None,
    }
}

/// `Some(c)` when the delimiter is a run of one repeated character, like
/// the default brace pairs.
fn char_run_of(delim: &str) -> Option<char> {
    let mut chars = delim.chars();
    let first = chars.next()?;
    chars.all(|c| c == first).then_some(first)
}

fn flush_text(text: &mut String, tokens: &mut Vec<Token>) {
    if !text.is_empty() {
        tokens.push(Token::Text(std::mem::take(text)));
    }
}

fn classify(content: &str, encode: bool, original: &str, tokens: &mut Vec<Token>) {
    let trimmed = content.trim();

    if let Some(rest) = trimmed.strip_prefix('#') {
        let mut params = rest.split_whitespace();
        let name = params.next().unwrap_or("");
        match name {
            "if" => {
                let predicate = params.next().unwrap_or("");
                let (negated, path) = match predicate.strip_prefix('!') {
                    Some(stripped) => (true, stripped),
                    None => (false, predicate),
                };
                tokens.push(Token::Open(Block::If {
                    path: path.to_string(),
                    negated,
                }));
            }
            "each" => {
                tokens.push(Token::Open(Block::Each {
                    path: params.next().unwrap_or("").to_string(),
                }));
            }
            "for" => {
                let first = params.next().unwrap_or("");
                let second = params.next();
                // A leading number is an iteration bound; otherwise the
                // first parameter is the collection path and the bound
                // defaults to its length.
                let (count, path) = match (first.parse::<u32>(), second) {
                    (Ok(n), Some(path)) => (Some(n), path),
                    _ => (None, first),
                };
                tokens.push(Token::Open(Block::For {
                    path: path.to_string(),
                    count,
                }));
            }
            "component" => {
                let param = params.next().unwrap_or("");
                let (name, path) = match param.split_once(':') {
                    Some((n, p)) => (n.to_string(), Some(p.to_string())),
                    None => (param.to_string(), None),
                };
                tokens.push(Token::Open(Block::Component { name, path }));
            }
            // Unknown section names are dropped, parameters and all.
            _ => {}
        }
        return;
    }

    if let Some(rest) = trimmed.strip_prefix('/') {
        tokens.push(Token::End(rest.trim().to_string()));
        return;
    }

    // Interpolation: whitespace anywhere inside the tag is not part of
    // the path.
    let path: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    tokens.push(Token::Interpolate {
        path,
        encode,
        original: original.to_string(),
    });
}
