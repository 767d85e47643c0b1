use crate::lexer::{self, Block, Token, TokenReader};
use crate::options::Options;
use crate::value::Value;
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// Bound on data-driven re-interpolation (a string value that itself
/// contains tags) so self-referential data cannot recurse forever.
const MAX_INTERPOLATE_DEPTH: u32 = 16;

static COLLAPSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\t\r\n ]+").unwrap());

/// Compile escape fragments into `(^|[^\])(fragment)` insertion patterns.
/// Fragments that are not valid regexes are skipped, not fatal.
pub(crate) fn compile_escapes(fragments: &[String]) -> Vec<Regex> {
    fragments
        .iter()
        .filter_map(|fragment| {
            match Regex::new(&format!(r"(^|[^\\])({})", fragment)) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!(fragment = %fragment, %err, "skipping invalid escape fragment");
                    None
                }
            }
        })
        .collect()
}

pub(crate) struct Renderer<'a> {
    options: &'a Options,
    escapes: &'a [Regex],
    components: &'a IndexMap<String, String>,
}

impl<'a> Renderer<'a> {
    pub(crate) fn new(
        options: &'a Options,
        escapes: &'a [Regex],
        components: &'a IndexMap<String, String>,
    ) -> Self {
        Self {
            options,
            escapes,
            components,
        }
    }

    /// Top-level entry: walk the stream, then collapse whitespace once.
    /// Nested recursive walks never collapse on their own, so structural
    /// whitespace inside loops is only folded a single time.
    pub(crate) fn render(&self, tokens: &[Token], data: &Value) -> String {
        let mut reader = TokenReader::new(tokens);
        let out = self.walk(&mut reader, data, None, false, 0);
        // A top-level walk has no enclosure to match, so it always drains
        // the stream.
        debug_assert!(reader.done());
        if self.options.collapse {
            COLLAPSE_RE.replace_all(&out, " ").into_owned()
        } else {
            out
        }
    }

    /// Interpret tokens until the stream ends or an `End` matching
    /// `enclosure` is consumed. `suppress` keeps consuming tokens without
    /// producing output, which is what keeps sibling sections aligned when
    /// an `if` body is skipped.
    fn walk(
        &self,
        reader: &mut TokenReader<'_>,
        data: &Value,
        enclosure: Option<&str>,
        suppress: bool,
        depth: u32,
    ) -> String {
        let mut out = String::new();

        while let Some(token) = reader.next() {
            match token {
                Token::Text(t) => {
                    if !suppress {
                        out.push_str(t);
                    }
                }

                Token::Interpolate {
                    path,
                    encode,
                    original,
                } => {
                    if suppress {
                        continue;
                    }
                    match data.get_path(path) {
                        None => {
                            if !self.options.remove_unmatched {
                                out.push_str(original);
                            }
                        }
                        Some(value) => {
                            let mut rendered = match value {
                                // String values are themselves templates,
                                // rendered against the same data.
                                Value::Str(s) if depth < MAX_INTERPOLATE_DEPTH => {
                                    let sub = lexer::tokenize(s, self.options);
                                    let mut sub_reader = TokenReader::new(&sub);
                                    self.walk(&mut sub_reader, data, None, false, depth + 1)
                                }
                                other => other.to_string(),
                            };
                            if *encode {
                                rendered = self.encode_chars(&rendered);
                            }
                            rendered = self.escape_chars(&rendered);
                            out.push_str(&rendered);
                        }
                    }
                }

                Token::Open(Block::If { path, negated }) => {
                    let truthy = data
                        .get_path(path)
                        .map(Value::is_truthy)
                        .unwrap_or(false);
                    let no_output = suppress || (*negated == truthy);
                    // The body is walked even when skipped so its tokens
                    // are consumed and siblings stay aligned.
                    out.push_str(&self.walk(reader, data, Some("if"), no_output, depth));
                }

                Token::Open(Block::Each { path }) => {
                    let body = find_loop_body(reader, "each", false);
                    if suppress {
                        continue;
                    }
                    match data.get_path(path) {
                        Some(Value::List(items)) => {
                            for (index, item) in items.iter().enumerate() {
                                let ctx = loop_context(
                                    data,
                                    "@key",
                                    Value::Str(index.to_string()),
                                    item,
                                );
                                out.push_str(&self.render_body(&body, &ctx, depth));
                            }
                        }
                        Some(Value::Map(entries)) => {
                            for (key, item) in entries {
                                let ctx =
                                    loop_context(data, "@key", Value::Str(key.clone()), item);
                                out.push_str(&self.render_body(&body, &ctx, depth));
                            }
                        }
                        // Not iterable: the extracted body is discarded.
                        _ => {}
                    }
                }

                Token::Open(Block::For { path, count }) => {
                    let body = find_loop_body(reader, "for", false);
                    if suppress {
                        continue;
                    }
                    if let Some(Value::List(items)) = data.get_path(path) {
                        let bound = match count {
                            Some(n) => items.len().min(*n as usize),
                            None => items.len(),
                        };
                        for (index, item) in items.iter().take(bound).enumerate() {
                            let ctx = loop_context(
                                data,
                                "@index",
                                Value::Str(index.to_string()),
                                item,
                            );
                            out.push_str(&self.render_body(&body, &ctx, depth));
                        }
                    }
                }

                Token::Open(Block::Component { name, path }) => {
                    if suppress {
                        continue;
                    }
                    if let Some(source) = self.components.get(name) {
                        let target = path.as_deref().unwrap_or(name);
                        let ctx = data.get_path(target).unwrap_or(&Value::Null);
                        let sub = lexer::tokenize(source, self.options);
                        let mut sub_reader = TokenReader::new(&sub);
                        out.push_str(&self.walk(&mut sub_reader, ctx, None, false, depth));
                    }
                }

                Token::End(name) => {
                    if enclosure == Some(name.as_str()) {
                        return out;
                    }
                    // Stray or mismatched close tag: dropped, keep going.
                }
            }
        }

        out
    }

    fn render_body(&self, body: &[Token], ctx: &Value, depth: u32) -> String {
        let mut reader = TokenReader::new(body);
        self.walk(&mut reader, ctx, None, false, depth)
    }

    fn encode_chars(&self, s: &str) -> String {
        let mut out = s.to_string();
        for (ch, replacement) in &self.options.encode {
            if out.contains(*ch) {
                out = out.replace(*ch, replacement);
            }
        }
        out
    }

    fn escape_chars(&self, s: &str) -> String {
        let mut out = s.to_string();
        for re in self.escapes {
            out = re
                .replace_all(&out, |caps: &regex::Captures| {
                    format!("{}\\{}", &caps[1], &caps[2])
                })
                .into_owned();
        }
        out
    }
}

/// Pull a loop body out of the stream up to the matching close tag.
/// Inner `each`/`for` sections are swallowed recursively (close tags
/// included) so an inner `{{/each}}` cannot terminate the outer loop.
/// An unterminated loop yields an empty body: the section renders nothing.
fn find_loop_body(reader: &mut TokenReader<'_>, kind: &str, nested: bool) -> Vec<Token> {
    let mut saved = Vec::new();
    while let Some(token) = reader.peek() {
        reader.next();
        if let Token::End(name) = token {
            if name == kind {
                if nested {
                    saved.push(token.clone());
                }
                return saved;
            }
        }
        saved.push(token.clone());
        if let Token::Open(block) = token {
            match block {
                Block::Each { .. } | Block::For { .. } => {
                    saved.extend(find_loop_body(reader, block.kind(), true));
                }
                _ => {}
            }
        }
    }
    Vec::new()
}

/// Per-iteration context: shallow copy of the parent data overlaid with the
/// loop variable, `@value`, and (for map elements) the element's own fields
/// flattened one level for direct access.
fn loop_context(data: &Value, key_name: &str, key: Value, element: &Value) -> Value {
    let mut merged = match data {
        Value::Map(m) => m.clone(),
        _ => IndexMap::new(),
    };
    merged.insert(key_name.to_string(), key);
    merged.insert("@value".to_string(), element.clone());
    if let Value::Map(fields) = element {
        for (k, v) in fields {
            merged.insert(k.clone(), v.clone());
        }
    }
    Value::Map(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;

    fn lex(template: &str) -> Vec<Token> {
        lexer::tokenize(template, &Options::default())
    }

    #[test]
    fn test_find_loop_body_flat() {
        let tokens = lex("{{a}}{{/each}}{{b}}");
        let mut reader = TokenReader::new(&tokens);
        let body = find_loop_body(&mut reader, "each", false);
        assert_eq!(body.len(), 1);
        // Reader left positioned after the close tag.
        assert!(matches!(reader.next(), Some(Token::Interpolate { .. })));
    }

    #[test]
    fn test_find_loop_body_nested_same_kind() {
        let tokens = lex("a{{#each inner}}b{{/each}}c{{/each}}d");
        let mut reader = TokenReader::new(&tokens);
        let body = find_loop_body(&mut reader, "each", false);
        // Body keeps the whole inner section, close tag included.
        assert_eq!(body.len(), 5);
        assert_eq!(reader.next(), Some(&Token::Text("d".to_string())));
    }

    #[test]
    fn test_find_loop_body_unterminated() {
        let tokens = lex("a{{b}}c");
        let mut reader = TokenReader::new(&tokens);
        assert!(find_loop_body(&mut reader, "for", false).is_empty());
        assert!(reader.done());
    }

    #[test]
    fn test_loop_context_flattens_map_elements() {
        let parent = Value::Map(
            [("top".to_string(), Value::from("t"))].into_iter().collect(),
        );
        let element = Value::Map(
            [("name".to_string(), Value::from("apple"))]
                .into_iter()
                .collect(),
        );
        let ctx = loop_context(&parent, "@key", Value::from("0"), &element);
        assert_eq!(ctx.get_path("top"), Some(&Value::from("t")));
        assert_eq!(ctx.get_path("@key"), Some(&Value::from("0")));
        assert_eq!(ctx.get_path("name"), Some(&Value::from("apple")));
        assert_eq!(ctx.get_path("@value"), Some(&element));
    }

    #[test]
    fn test_compile_escapes_skips_invalid() {
        let escapes = compile_escapes(&["\"".to_string(), "(".to_string()]);
        assert_eq!(escapes.len(), 1);
    }
}
