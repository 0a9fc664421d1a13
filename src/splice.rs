//! Layout-retaining regeneration.
//!
//! Instead of printing the edited syntax tree, the passes record small text
//! edits against the original source, keyed by the spans `syn` reports.
//! Comments, blank lines, and the formatting of everything the passes do not
//! touch survive unchanged.
//!
//! `proc_macro2` reports 1-based lines and columns counted in chars, relative
//! to the text `syn::parse_file` saw, which is the source minus any leading
//! byte order mark.

use proc_macro2::LineColumn;

const BOM: &str = "\u{feff}";

#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
    seq: usize,
    /// Closes something an earlier edit opened.
    closing: bool,
}

/// Pending text edits against one source file.
#[derive(Debug)]
pub(crate) struct Splice<'a> {
    bom: &'a str,
    text: &'a str,
    /// Byte offset of the start of each line.
    lines: Vec<usize>,
    edits: Vec<Edit>,
}

impl<'a> Splice<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        let (bom, text) = match source.strip_prefix(BOM) {
            Some(rest) => (BOM, rest),
            None => ("", source),
        };
        let lines = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            bom,
            text,
            lines,
            edits: Vec::new(),
        }
    }

    /// Byte offset of `at` in the text. Positions past the end of a line or
    /// of the text are clamped.
    pub(crate) fn offset(&self, at: LineColumn) -> usize {
        let line = at.line.saturating_sub(1).min(self.lines.len() - 1);
        let start = self.lines[line];
        let end = self
            .lines
            .get(line + 1)
            .copied()
            .unwrap_or(self.text.len());
        self.text[start..end]
            .char_indices()
            .nth(at.column)
            .map_or(end, |(i, _)| start + i)
    }

    /// Newline convention of the file.
    pub(crate) fn newline(&self) -> &'static str {
        if self.text.contains("\r\n") { "\r\n" } else { "\n" }
    }

    /// Leading text of the line containing `at`.
    fn line_prefix(&self, at: usize) -> &'a str {
        &self.text[self.line_start(at)..at]
    }

    fn line_start(&self, at: usize) -> usize {
        self.text[..at].rfind('\n').map_or(0, |i| i + 1)
    }

    /// Position of the newline ending the line containing `at`, or the end
    /// of the text.
    fn line_end(&self, at: usize) -> usize {
        self.text[at..].find('\n').map_or(self.text.len(), |i| at + i)
    }

    fn push(&mut self, start: usize, end: usize, text: String, closing: bool) {
        let seq = self.edits.len();
        self.edits.push(Edit {
            start,
            end,
            text,
            seq,
            closing,
        });
    }

    /// Insert `text` at byte offset `at`.
    pub(crate) fn insert(&mut self, at: usize, text: impl Into<String>) {
        self.push(at, at, text.into(), false);
    }

    /// Insert text closing an earlier [`insert`](Self::insert). At a shared
    /// offset, closings come before openings, and later closings before
    /// earlier ones, so nested wrappers end in the right order.
    pub(crate) fn insert_closing(&mut self, at: usize, text: impl Into<String>) {
        self.push(at, at, text.into(), true);
    }

    /// Insert an item declaration before the item starting at `at`. When the
    /// item begins its line, the declaration gets a line of its own with the
    /// same indentation; otherwise it is placed inline.
    pub(crate) fn insert_item(&mut self, at: usize, decl: &str) {
        let prefix = self.line_prefix(at);
        let text = if prefix.trim().is_empty() {
            format!("{decl}{}{prefix}", self.newline())
        } else {
            format!("{decl} ")
        };
        self.insert(at, text);
    }

    /// Delete `start..end`. If that leaves the line blank the whole line goes
    /// with it; otherwise a single space before `start` is taken along.
    pub(crate) fn delete(&mut self, start: usize, end: usize) {
        let line_start = self.line_start(start);
        let line_end = self.line_end(end);
        let before = &self.text[line_start..start];
        let after = &self.text[end..line_end];

        if before.trim().is_empty() && after.trim().is_empty() {
            if line_end < self.text.len() {
                self.push(line_start, line_end + 1, String::new(), false);
            } else {
                // Last line without a trailing newline: take the preceding one.
                let from = self.text[..line_start]
                    .strip_suffix('\n')
                    .map_or(line_start, |rest| rest.strip_suffix('\r').unwrap_or(rest).len());
                self.push(from, line_end, String::new(), false);
            }
        } else if before.ends_with(' ') {
            self.push(start - 1, end, String::new(), false);
        } else {
            self.push(start, end, String::new(), false);
        }
    }

    /// Apply every edit and return the new source.
    pub(crate) fn apply(mut self) -> String {
        self.edits.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(b.closing.cmp(&a.closing))
                .then_with(|| match a.closing {
                    true => b.seq.cmp(&a.seq),
                    false => a.seq.cmp(&b.seq),
                })
        });
        let extra: usize = self.edits.iter().map(|e| e.text.len()).sum();
        let mut out = String::with_capacity(self.bom.len() + self.text.len() + extra);
        out.push_str(self.bom);
        let mut cursor = 0;
        for edit in &self.edits {
            if edit.start > cursor {
                out.push_str(&self.text[cursor..edit.start]);
            }
            out.push_str(&edit.text);
            cursor = cursor.max(edit.end);
        }
        out.push_str(&self.text[cursor..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lc(line: usize, column: usize) -> LineColumn {
        LineColumn { line, column }
    }

    #[test]
    fn offsets_count_chars_not_bytes() {
        let src = "const S: &str = \"ñé\"; fn g() {}\n";
        let file = syn::parse_file(src).unwrap();
        let syn::Item::Fn(g) = &file.items[1] else {
            panic!("expected fn");
        };
        let splice = Splice::new(src);
        assert_eq!(
            splice.offset(g.sig.ident.span().start()),
            src.find("g()").unwrap()
        );
    }

    #[test]
    fn offsets_skip_the_byte_order_mark() {
        let src = "\u{feff}fn a() {}\nfn b() {}\n";
        let file = syn::parse_file(src).unwrap();
        let syn::Item::Fn(b) = &file.items[1] else {
            panic!("expected fn");
        };
        let mut splice = Splice::new(src);
        let at = splice.offset(b.sig.ident.span().start());
        splice.insert(at, "renamed_");
        assert_eq!(splice.apply(), "\u{feff}fn a() {}\nfn renamed_b() {}\n");
    }

    #[test]
    fn positions_past_the_end_are_clamped() {
        let splice = Splice::new("ab\ncd");
        assert_eq!(splice.offset(lc(1, 9)), 3);
        assert_eq!(splice.offset(lc(2, 9)), 5);
        assert_eq!(splice.offset(lc(7, 0)), 3);
    }

    #[test]
    fn inserts_at_the_same_offset_keep_their_order() {
        let mut splice = Splice::new("ab");
        splice.insert(1, "1");
        splice.insert(1, "2");
        splice.insert(0, "0");
        assert_eq!(splice.apply(), "0a12b");
    }

    #[test]
    fn nested_closings_unwind_inner_first() {
        let mut splice = Splice::new("a + b");
        splice.insert(0, "{ ");
        splice.insert_closing(5, " }");
        splice.insert(0, "(");
        splice.insert_closing(5, ")");
        assert_eq!(splice.apply(), "{ (a + b) }");
    }

    #[test]
    fn item_on_its_own_line_keeps_indentation() {
        let src = "mod m {\n    fn a() {}\n}\n";
        let mut splice = Splice::new(src);
        splice.insert_item(src.find("fn").unwrap(), "use x;");
        assert_eq!(splice.apply(), "mod m {\n    use x;\n    fn a() {}\n}\n");
    }

    #[test]
    fn item_after_other_code_goes_inline() {
        let src = "mod m { fn a() {} }";
        let mut splice = Splice::new(src);
        splice.insert_item(src.find("fn").unwrap(), "use x;");
        assert_eq!(splice.apply(), "mod m { use x; fn a() {} }");
    }

    #[test]
    fn crlf_files_get_crlf_lines() {
        let src = "fn a() {}\r\n";
        let mut splice = Splice::new(src);
        splice.insert_item(0, "use x;");
        assert_eq!(splice.apply(), "use x;\r\nfn a() {}\r\n");
    }

    #[test]
    fn deleting_a_whole_line_removes_the_line() {
        let src = "use x;\nfn a() {\n    probe();\n    work();\n}\n";
        let mut splice = Splice::new(src);
        let start = src.find("use").unwrap();
        splice.delete(start, start + "use x;".len());
        let start = src.find("probe").unwrap();
        splice.delete(start, start + "probe();".len());
        assert_eq!(splice.apply(), "fn a() {\n    work();\n}\n");
    }

    #[test]
    fn deleting_inline_takes_one_space() {
        let src = "fn a() { probe(); work() }";
        let mut splice = Splice::new(src);
        let start = src.find("probe").unwrap();
        splice.delete(start, start + "probe();".len());
        assert_eq!(splice.apply(), "fn a() { work() }");
    }

    #[test]
    fn deleting_the_last_line_takes_the_previous_newline() {
        let src = "fn a() {}\r\nuse x;";
        let mut splice = Splice::new(src);
        splice.delete(src.find("use").unwrap(), src.len());
        assert_eq!(splice.apply(), "fn a() {}");
    }

    #[test]
    fn no_edits_is_identity() {
        let src = "// comment\nfn a() {}\n";
        assert_eq!(Splice::new(src).apply(), src);
    }
}
