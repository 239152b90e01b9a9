//! Renders an entry into the HTML body Telegram receives.
//!
//! Templates are plain text with `{{ title }}` and `{{ url }}` placeholders.
//! They are parsed once, so a broken custom template is reported when the
//! settings are loaded rather than on every delivery.
//!
//! Escaping depends on where a placeholder sits. In text it is entity-escaped.
//! Inside a URL attribute such as `href` the value is checked for a safe scheme,
//! percent-encoded, and then entity-escaped.

use crate::entry::Entry;
use crate::error::{PushError, Result};

pub const DEFAULT_TEMPLATE: &str = "{{ title }}\n<a href=\"{{ url }}\">{{ url }}</a>";

/// Telegram's limit on message text after entity parsing, in UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Substituted for URLs with a scheme other than http, https or mailto.
pub const UNSAFE_URL: &str = "#ZgotmplZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    Text,
    UrlAttr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field, Escape),
}

/// Where the parser is in the surrounding markup.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Context {
    Text,
    Tag,
    AttrName(String),
    BeforeValue(String),
    Value { url: bool, quote: char },
}

impl Context {
    fn advance(self, literal: &str) -> Self {
        let mut ctx = self;
        let mut chars = literal.chars().peekable();
        while let Some(c) = chars.next() {
            ctx = match ctx {
                Context::Text => match (c, chars.peek()) {
                    ('<', Some(next)) if next.is_ascii_alphabetic() || *next == '/' => Context::Tag,
                    _ => Context::Text,
                },
                Context::Tag => match c {
                    '>' => Context::Text,
                    c if c.is_whitespace() => Context::Tag,
                    c => Context::AttrName(c.to_string()),
                },
                Context::AttrName(mut name) => match c {
                    '=' => Context::BeforeValue(name),
                    '>' => Context::Text,
                    c if c.is_whitespace() => Context::Tag,
                    c => {
                        name.push(c);
                        Context::AttrName(name)
                    }
                },
                Context::BeforeValue(name) => match c {
                    '"' | '\'' => Context::Value {
                        url: is_url_attr(&name),
                        quote: c,
                    },
                    '>' => Context::Text,
                    c if c.is_whitespace() => Context::BeforeValue(name),
                    // unquoted value
                    _ => Context::Tag,
                },
                Context::Value { quote, .. } if c == quote => Context::Tag,
                value @ Context::Value { .. } => value,
            };
        }
        ctx
    }
}

fn is_url_attr(name: &str) -> bool {
    matches!(name.to_ascii_lowercase().as_str(), "href" | "src")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    segments: Vec<Segment>,
}

impl MessageTemplate {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut ctx = Context::Text;
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                let literal = &rest[..open];
                ctx = ctx.advance(literal);
                segments.push(Segment::Literal(literal.to_string()));
            }
            let offset = source.len() - rest.len() + open;
            let after_open = &rest[open + 2..];
            let close = after_open.find("}}").ok_or_else(|| {
                PushError::Formatting(format!(
                    "template parsing failed: unclosed placeholder at byte {}",
                    offset
                ))
            })?;
            let field = parse_field(&after_open[..close])?;
            let escape = match &ctx {
                Context::Text => Escape::Text,
                Context::Value { url: true, .. } => Escape::UrlAttr,
                Context::Value { url: false, .. } => Escape::Text,
                _ => {
                    return Err(PushError::Formatting(format!(
                        "template parsing failed: placeholder at byte {} is inside a tag \
                         but not in a quoted attribute value",
                        offset
                    )))
                }
            };
            segments.push(Segment::Field(field, escape));
            rest = &after_open[close + 2..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Render the entry. Field values are escaped for their position, literals are not.
    pub fn render(&self, entry: &Entry) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field, escape) => {
                    let value = match field {
                        Field::Title => &entry.title,
                        Field::Url => &entry.url,
                    };
                    match escape {
                        Escape::Text => out.push_str(&escape_html(value)),
                        Escape::UrlAttr => out.push_str(&escape_html(&normalize_url(value))),
                    }
                }
            }
        }

        if out.trim().is_empty() {
            return Err(PushError::Formatting(
                "template execution failed: rendered message is empty".to_string(),
            ));
        }

        let len = visible_utf16_len(&out);
        if len > MAX_MESSAGE_LEN {
            return Err(PushError::Formatting(format!(
                "template execution failed: message text is {} UTF-16 units, limit is {}",
                len, MAX_MESSAGE_LEN
            )));
        }

        Ok(out)
    }
}

impl Default for MessageTemplate {
    fn default() -> Self {
        // The built-in template contains only known placeholders.
        Self {
            segments: vec![
                Segment::Field(Field::Title, Escape::Text),
                Segment::Literal("\n<a href=\"".to_string()),
                Segment::Field(Field::Url, Escape::UrlAttr),
                Segment::Literal("\">".to_string()),
                Segment::Field(Field::Url, Escape::Text),
                Segment::Literal("</a>".to_string()),
            ],
        }
    }
}

/// Placeholder names are case-insensitive.
fn parse_field(raw: &str) -> Result<Field> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "title" => Ok(Field::Title),
        "url" => Ok(Field::Url),
        "" => Err(PushError::Formatting(
            "template parsing failed: empty placeholder".to_string(),
        )),
        _ => Err(PushError::Formatting(format!(
            "template parsing failed: unknown placeholder '{}'",
            raw.trim()
        ))),
    }
}

/// Escape text for use in HTML content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '\0' => out.push('\u{FFFD}'),
            _ => out.push(c),
        }
    }
    out
}

/// A scheme, if present, must be http, https or mailto.
fn is_safe_url(url: &str) -> bool {
    match url.split_once(':') {
        Some((scheme, _)) if !scheme.contains('/') => {
            let scheme = scheme.to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
        _ => true,
    }
}

/// Filter the scheme and percent-encode bytes that are not valid in a URL.
/// Existing `%` escapes and reserved characters are kept.
pub fn normalize_url(url: &str) -> String {
    if !is_safe_url(url) {
        return UNSAFE_URL.to_string();
    }
    let mut out = String::with_capacity(url.len());
    for &b in url.as_bytes() {
        match b {
            b'!' | b'#' | b'$' | b'&' | b'*' | b'+' | b',' | b'/' | b':' | b';' | b'='
            | b'?' | b'@' | b'[' | b']' | b'%' | b'-' | b'.' | b'_' | b'~' => out.push(b as char),
            b if b.is_ascii_alphanumeric() => out.push(b as char),
            b => out.push_str(&format!("%{:02x}", b)),
        }
    }
    out
}

/// Length of the text Telegram shows: tags dropped, entities counted once.
fn visible_utf16_len(html: &str) -> usize {
    let mut len = 0;
    let mut rest = html;
    while let Some(c) = rest.chars().next() {
        match c {
            '<' => {
                if let Some(end) = rest.find('>') {
                    rest = &rest[end + 1..];
                    continue;
                }
                len += 1;
            }
            '&' => {
                if let Some(end) = rest.find(';').filter(|end| *end <= 10) {
                    len += entity_utf16_len(&rest[1..end]);
                    rest = &rest[end + 1..];
                    continue;
                }
                len += 1;
            }
            c => len += c.len_utf16(),
        }
        rest = &rest[c.len_utf8()..];
    }
    len
}

fn entity_utf16_len(name: &str) -> usize {
    let code = match name.strip_prefix('#') {
        Some(num) => match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => num.parse::<u32>().ok(),
        },
        None => None,
    };
    code.and_then(char::from_u32).map_or(1, char::len_utf16)
}
