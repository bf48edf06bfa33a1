//! core::message
//!
//! Commit message convention.
//!
//! A message is free text optionally followed by a blank line and one or more
//! property lines:
//!
//! ```text
//! Add two people
//!
//! query: "INSERT DATA { <a> <p> \"b\" }"
//! source: import
//! ```
//!
//! A property line starts with a key of word characters followed by `:`.
//! Unquoted values run to the end of the line. Quoted values may span lines
//! and use `\` to escape the next character. Every other line belongs to the
//! message text.
//!
//! Keys are not escaped at all; a free-text line that happens to look like
//! `word: ...` is read back as a property.

use std::collections::BTreeMap;

/// Property key carrying the update query text.
pub const QUERY_KEY: &str = "query";
/// Property key carrying the protocol's default graph selection.
pub const DEFAULT_GRAPH_KEY: &str = "default_graph_uri";
/// Property key carrying the protocol's named graph selection.
pub const NAMED_GRAPH_KEY: &str = "named_graph_uri";

/// Parsed commit message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitMessage {
    /// Human readable text with property lines removed.
    pub text: String,
    /// Embedded `key: value` properties.
    pub properties: BTreeMap<String, String>,
}

impl CommitMessage {
    /// Split a raw commit message into text and properties.
    pub fn parse(raw: &str) -> Self {
        let mut properties = BTreeMap::new();
        let mut text = String::new();
        let mut pending: Option<(String, String)> = None;

        for line in raw.split('\n') {
            if let Some((key, mut value)) = pending.take() {
                let closed = eat_quoted(line, &mut value);
                if closed {
                    properties.insert(key, value);
                } else {
                    pending = Some((key, value));
                }
                continue;
            }

            let Some((key, rest)) = split_property(line) else {
                text.push_str(line);
                text.push('\n');
                continue;
            };

            let rest = rest.trim_start();
            match rest.strip_prefix('"') {
                Some(quoted) => {
                    let mut value = String::new();
                    if eat_quoted(quoted, &mut value) {
                        properties.insert(key.to_string(), value);
                    } else {
                        pending = Some((key.to_string(), value));
                    }
                }
                None => {
                    properties.insert(key.to_string(), rest.trim().to_string());
                }
            }
        }

        // An unterminated quote keeps what it collected.
        if let Some((key, value)) = pending {
            properties.insert(key, value.trim_end_matches('\n').to_string());
        }

        Self {
            text: text.trim_end().to_string(),
            properties,
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Builder for messages written by the sync engine.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    text: String,
    properties: Vec<(String, String)>,
}

impl MessageBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            properties: Vec::new(),
        }
    }

    /// Append a property. Keys outside `[A-Za-z0-9_]` are dropped with a
    /// warning since they could not be read back.
    pub fn property(mut self, key: &str, value: impl Into<String>) -> Self {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            tracing::warn!(key, "dropping commit message property with invalid key");
            return self;
        }
        self.properties.push((key.to_string(), value.into()));
        self
    }

    pub fn query(self, query: Option<&str>) -> Self {
        match query {
            Some(q) => self.property(QUERY_KEY, q),
            None => self,
        }
    }

    /// Record the protocol graph selection (space separated IRIs).
    pub fn graph_selection(mut self, default_graphs: &[String], named_graphs: &[String]) -> Self {
        if !default_graphs.is_empty() {
            self = self.property(DEFAULT_GRAPH_KEY, default_graphs.join(" "));
        }
        if !named_graphs.is_empty() {
            self = self.property(NAMED_GRAPH_KEY, named_graphs.join(" "));
        }
        self
    }

    pub fn build(&self) -> String {
        if self.properties.is_empty() {
            return self.text.clone();
        }
        let lines: Vec<String> = self
            .properties
            .iter()
            .map(|(key, value)| format!("{key}: \"{}\"", escape(value)))
            .collect();
        format!("{}\n\n{}", self.text, lines.join("\n"))
    }
}

fn split_property(line: &str) -> Option<(&str, &str)> {
    let (key, rest) = line.split_once(':')?;
    let is_key = !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_');
    is_key.then_some((key, rest))
}

/// Consume a quoted value up to the closing quote.
///
/// Returns true when the quote closed on this line; otherwise a newline is
/// appended and the value continues on the next line.
fn eat_quoted(input: &str, value: &mut String) -> bool {
    let mut escaped = false;
    for c in input.chars() {
        if !escaped {
            match c {
                '\\' => {
                    escaped = true;
                    continue;
                }
                '"' => return true,
                _ => {}
            }
        }
        escaped = false;
        value.push(c);
    }
    value.push('\n');
    false
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse {
        use super::*;

        #[test]
        fn plain_text() {
            let msg = CommitMessage::parse("Fix typo\n\nlonger body");
            assert_eq!(msg.text, "Fix typo\n\nlonger body");
            assert!(msg.properties.is_empty());
        }

        #[test]
        fn unquoted_and_quoted() {
            let msg = CommitMessage::parse("Import\n\nsource: dump.nq\nquery: \"INSERT DATA { }\"");
            assert_eq!(msg.text, "Import");
            assert_eq!(msg.property("source"), Some("dump.nq"));
            assert_eq!(msg.property("query"), Some("INSERT DATA { }"));
        }

        #[test]
        fn multi_line_with_escapes() {
            let raw = "msg\n\nquery: \"INSERT DATA {\n  <a> <b> \\\"c\\\" }\"";
            let msg = CommitMessage::parse(raw);
            assert_eq!(msg.property("query"), Some("INSERT DATA {\n  <a> <b> \"c\" }"));
        }

        #[test]
        fn empty_value() {
            let msg = CommitMessage::parse("note:");
            assert_eq!(msg.property("note"), Some(""));
            assert_eq!(msg.text, "");
        }

        #[test]
        fn unterminated_quote() {
            let msg = CommitMessage::parse("key: \"open\nstill");
            assert_eq!(msg.property("key"), Some("open\nstill"));
        }
    }

    mod build {
        use super::*;

        #[test]
        fn reads_back() {
            let raw = MessageBuilder::new("Update")
                .query(Some("DELETE { ?s ?p \"x\\y\" }"))
                .graph_selection(&["http://ex.org/g".to_string()], &[])
                .property("author_id", "42")
                .build();

            let msg = CommitMessage::parse(&raw);
            assert_eq!(msg.text, "Update");
            assert_eq!(msg.property(QUERY_KEY), Some("DELETE { ?s ?p \"x\\y\" }"));
            assert_eq!(msg.property(DEFAULT_GRAPH_KEY), Some("http://ex.org/g"));
            assert_eq!(msg.property("author_id"), Some("42"));
            assert_eq!(msg.property(NAMED_GRAPH_KEY), None);
        }

        #[test]
        fn drops_invalid_keys() {
            let raw = MessageBuilder::new("m").property("bad key", "v").build();
            assert_eq!(raw, "m");
        }
    }
}
