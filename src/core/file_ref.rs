//! core::file_ref
//!
//! Canonical in-memory form of one tracked statement file.
//!
//! A [`FileReference`] is the file's path plus a de-duplicated, sorted set of
//! statement lines. Sorting keeps serialization deterministic so that two
//! files holding the same statements always produce the same blob.

use std::collections::BTreeSet;

use oxrdf::{GraphName, Triple};

use super::rdf::{statement_line, FileFormat};

/// Sorted, duplicate-free statement lines of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    path: String,
    format: FileFormat,
    lines: BTreeSet<String>,
}

impl FileReference {
    /// Build a reference from raw file content.
    ///
    /// Blank lines and surrounding whitespace are dropped. The format falls
    /// back to N-Quads for paths without a known extension.
    pub fn new(path: impl Into<String>, content: &str) -> Self {
        let path = path.into();
        let format = FileFormat::from_path(&path).unwrap_or(FileFormat::NQuads);
        let lines = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            path,
            format,
            lines,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Insert a raw statement line. Returns false if it was already present.
    pub fn add(&mut self, line: &str) -> bool {
        self.lines.insert(line.trim().to_string())
    }

    /// Remove a raw statement line. Returns false if it was absent.
    pub fn remove(&mut self, line: &str) -> bool {
        self.lines.remove(line.trim())
    }

    /// Insert a triple, rendered in this file's format.
    pub fn add_triple(&mut self, triple: &Triple, graph: &GraphName) -> bool {
        let line = statement_line(triple, graph, self.format);
        self.lines.insert(line)
    }

    /// Remove a triple, rendered in this file's format.
    pub fn remove_triple(&mut self, triple: &Triple, graph: &GraphName) -> bool {
        let line = statement_line(triple, graph, self.format);
        self.lines.remove(&line)
    }

    pub fn contains(&self, line: &str) -> bool {
        self.lines.contains(line.trim())
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Serialized content: sorted lines joined by `\n`, no trailing newline.
    pub fn content(&self) -> String {
        self.lines
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::NamedNode;

    fn triple(s: &str, o: &str) -> Triple {
        Triple::new(
            NamedNode::new(s).unwrap(),
            NamedNode::new("http://ex.org/p").unwrap(),
            NamedNode::new(o).unwrap(),
        )
    }

    #[test]
    fn content_is_sorted_and_deduplicated() {
        let file = FileReference::new("g.nt", "<b> <p> <o> .\n\n<a> <p> <o> .\n<b> <p> <o> .\n");
        assert_eq!(file.len(), 2);
        assert_eq!(file.content(), "<a> <p> <o> .\n<b> <p> <o> .");
    }

    #[test]
    fn add_and_remove_report_membership() {
        let mut file = FileReference::new("g.nt", "");
        assert!(file.add("<a> <p> <o> ."));
        assert!(!file.add("<a> <p> <o> ."));
        assert!(file.remove("<a> <p> <o> ."));
        assert!(!file.remove("<a> <p> <o> ."));
        assert!(file.is_empty());
    }

    #[test]
    fn triples_follow_file_format() {
        let graph = GraphName::NamedNode(NamedNode::new("http://ex.org/g").unwrap());
        let t = triple("http://ex.org/a", "http://ex.org/b");

        let mut nt = FileReference::new("data/g.nt", "");
        nt.add_triple(&t, &graph);
        assert_eq!(
            nt.content(),
            "<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> ."
        );

        let mut nq = FileReference::new("all.nq", "");
        nq.add_triple(&t, &graph);
        assert!(nq.content().ends_with("<http://ex.org/g> ."));
        assert!(nq.remove_triple(&t, &graph));
    }

    #[test]
    fn unknown_extension_defaults_to_nquads() {
        assert_eq!(FileReference::new("data", "").format(), FileFormat::NQuads);
    }
}
