//! Unified diff model and a parser tolerant of git patch emails.
//!
//! A patch email carries free text (the commit message, a diffstat, a
//! signature) around the actual diff. Only `diff --git`, `---`/`+++` and
//! `@@` headers open structure; everything else outside a hunk is skipped.
//! Inside a hunk the header's line counts decide where the hunk ends.

use std::fmt::Display;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::DiffError;

static HUNK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@[ ]?(.*)$").unwrap()
});

/// Placeholder path git uses for the missing side of an added or deleted file.
pub const DEV_NULL: &str = "/dev/null";

/// An ordered set of file diffs, as found in one patch or one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSet {
    files: Vec<FileDiff>,
}

impl PatchSet {
    /// Parses every file diff in `text`, skipping the surrounding prose.
    ///
    /// # Errors
    /// Returns [`DiffError::Parse`] when a hunk header is malformed, appears
    /// before any file header, or when a hunk body does not match the line
    /// counts announced by its header.
    pub fn parse(text: &str) -> Result<PatchSet, DiffError> {
        Parser::default().run(text)
    }

    /// Returns a reference to the slice of FileDiffs in this PatchSet.
    pub fn files(&self) -> &[FileDiff] {
        &self.files
    }

    /// Iterates the derived paths of all file diffs, in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(FileDiff::path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A FileDiff represents the changes to one file.
/// It records the source and target file names as written in the diff, whether git announced
/// the file as deleted, and the file's hunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    source_file: String,
    target_file: String,
    deleted: bool,
    hunks: Vec<Hunk>,
}

impl FileDiff {
    fn new(source_file: String, target_file: String) -> FileDiff {
        FileDiff {
            source_file,
            target_file,
            deleted: false,
            hunks: vec![],
        }
    }

    /// Returns the repository-relative path of this file.
    ///
    /// The `a/` and `b/` prefixes git puts on both names are removed. For
    /// added and deleted files the name of the existing side is used.
    pub fn path(&self) -> &str {
        let source = self.source_file.as_str();
        let target = self.target_file.as_str();
        match (source.strip_prefix("a/"), target.strip_prefix("b/")) {
            (Some(path), Some(_)) => path,
            (Some(path), None) if target == DEV_NULL => path,
            (None, Some(path)) if source == DEV_NULL => path,
            _ => source,
        }
    }

    /// Returns the source file name as written in the diff (e.g. `a/foo.c`).
    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    /// Returns the target file name as written in the diff (e.g. `b/foo.c`).
    pub fn target_file(&self) -> &str {
        &self.target_file
    }

    /// Returns true if the diff removes the whole file.
    pub fn is_removed_file(&self) -> bool {
        self.deleted || self.target_file == DEV_NULL
    }

    /// Returns true if the diff creates the file.
    pub fn is_added_file(&self) -> bool {
        self.source_file == DEV_NULL
    }

    /// Returns a reference to the hunks contained in the FileDiff.
    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }
}

/// A Hunk consists of a source location, a target location, a section header and one or more
/// HunkLines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    source_location: HunkLocation,
    target_location: HunkLocation,
    section_header: String,
    lines: Vec<HunkLine>,
}

impl Hunk {
    /// Parses a hunk header of the form
    /// `@@ -SOURCE_START[,SOURCE_LENGTH] +TARGET_START[,TARGET_LENGTH] @@ [SECTION]`.
    /// A missing length means one line.
    fn parse_header(line: &str) -> Option<Hunk> {
        let caps = HUNK_HEADER.captures(line)?;
        let number = |i: usize, default: usize| -> Option<usize> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(default),
            }
        };
        Some(Hunk {
            source_location: HunkLocation {
                start: number(1, 0)?,
                length: number(2, 1)?,
            },
            target_location: HunkLocation {
                start: number(3, 0)?,
                length: number(4, 1)?,
            },
            section_header: caps.get(5).map_or("", |m| m.as_str()).to_string(),
            lines: vec![],
        })
    }

    /// Returns the source location of this Hunk.
    pub fn source_location(&self) -> HunkLocation {
        self.source_location
    }

    /// Returns the target location of this Hunk.
    pub fn target_location(&self) -> HunkLocation {
        self.target_location
    }

    /// Number of lines the hunk spans in the source file.
    pub fn source_length(&self) -> usize {
        self.source_location.length
    }

    /// Text following the closing `@@`, usually the enclosing function.
    pub fn section_header(&self) -> &str {
        &self.section_header
    }

    /// Returns a reference to the HunkLines of this Hunk.
    pub fn lines(&self) -> &[HunkLine] {
        &self.lines
    }

    /// Renders the header line, always spelling out both lengths.
    pub fn header(&self) -> String {
        format!(
            "@@ -{} +{} @@ {}",
            self.source_location, self.target_location, self.section_header
        )
    }
}

impl Display for Hunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.header())?;
        for line in &self.lines {
            write!(f, "\n{line}")?;
        }
        Ok(())
    }
}

/// A HunkLocation defines the location of a Hunk by its line number and length in lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HunkLocation {
    start: usize,
    length: usize,
}

impl HunkLocation {
    /// Returns the start line number of this hunk. The first line has line number '1'.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Returns the length of this hunk in lines.
    pub fn length(&self) -> usize {
        self.length
    }
}

impl Display for HunkLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.start, self.length)
    }
}

/// A single line of a hunk: its type and its text without the marker character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkLine {
    line_type: LineType,
    value: String,
}

impl HunkLine {
    pub fn new(line_type: LineType, value: impl Into<String>) -> HunkLine {
        HunkLine {
            line_type,
            value: value.into(),
        }
    }

    /// Returns the line type of this line.
    pub fn line_type(&self) -> LineType {
        self.line_type
    }

    /// Returns the text of the line after the marker character.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns true for added and removed lines.
    pub fn is_change(&self) -> bool {
        matches!(self.line_type, LineType::Added | LineType::Removed)
    }
}

impl Display for HunkLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line_type {
            LineType::NoNewline => write!(f, "\\{}", self.value),
            _ => write!(f, "{}{}", self.line_type.marker(), self.value),
        }
    }
}

/// Defines the type of a HunkLine.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum LineType {
    /// An unchanged line, marked with a space.
    Context,
    /// A line present only in the target, marked with `+`.
    Added,
    /// A line present only in the source, marked with `-`.
    Removed,
    /// The `\ No newline at end of file` meta line.
    NoNewline,
}

impl LineType {
    pub fn marker(self) -> char {
        match self {
            LineType::Context => ' ',
            LineType::Added => '+',
            LineType::Removed => '-',
            LineType::NoNewline => '\\',
        }
    }
}

/// Hunk being filled, with the number of source and target lines still expected.
#[derive(Debug)]
struct OpenHunk {
    hunk: Hunk,
    source_left: usize,
    target_left: usize,
}

impl OpenHunk {
    fn is_complete(&self) -> bool {
        self.source_left == 0 && self.target_left == 0
    }
}

#[derive(Debug, Default)]
struct Parser {
    files: Vec<FileDiff>,
    file: Option<FileDiff>,
    // true while a `diff --git` header was seen but no `---`/`+++` pair yet
    awaiting_file_headers: bool,
    hunk: Option<OpenHunk>,
}

impl Parser {
    fn run(mut self, text: &str) -> Result<PatchSet, DiffError> {
        let mut lines = text.lines().enumerate().peekable();

        while let Some((index, line)) = lines.next() {
            let number = index + 1;

            if self.hunk.as_ref().is_some_and(|h| !h.is_complete()) {
                self.push_hunk_line(number, line)?;
                continue;
            }

            if let Some(rest) = line.strip_prefix("diff --git ") {
                self.finish_file();
                let (source, target) = split_git_paths(rest);
                self.file = Some(FileDiff::new(source, target));
                self.awaiting_file_headers = true;
            } else if line.starts_with("deleted file mode") && self.awaiting_file_headers {
                if let Some(file) = self.file.as_mut() {
                    file.deleted = true;
                }
            } else if let Some(source) = line.strip_prefix("--- ") {
                let Some(target) = lines
                    .peek()
                    .map(|&(_, next)| next)
                    .and_then(|next| next.strip_prefix("+++ "))
                else {
                    continue;
                };
                let (source, target) = (file_name(source), file_name(target));
                lines.next();
                self.open_file(source, target);
            } else if line.starts_with("@@ ") {
                self.open_hunk(number, line)?;
            } else if line.starts_with('\\') {
                // a no-newline marker directly after a complete hunk
                if let Some(open) = self.hunk.as_mut() {
                    open.hunk
                        .lines
                        .push(HunkLine::new(LineType::NoNewline, &line[1..]));
                }
            } else {
                self.close_hunk();
            }
        }

        if let Some(open) = &self.hunk {
            if !open.is_complete() {
                return Err(DiffError::Parse {
                    line: text.lines().count(),
                    message: "unexpected end of input inside a hunk".to_string(),
                });
            }
        }
        self.finish_file();
        Ok(PatchSet { files: self.files })
    }

    fn push_hunk_line(&mut self, number: usize, line: &str) -> Result<(), DiffError> {
        let Some(open) = self.hunk.as_mut() else {
            return Ok(());
        };
        let shorter = || DiffError::Parse {
            line: number,
            message: format!("hunk is shorter than its header announces: {line:?}"),
        };

        let (line_type, value) = match line.chars().next() {
            // mail clients strip the single space off empty context lines
            None => (LineType::Context, ""),
            Some(' ') => (LineType::Context, &line[1..]),
            Some('+') => (LineType::Added, &line[1..]),
            Some('-') => (LineType::Removed, &line[1..]),
            Some('\\') => (LineType::NoNewline, &line[1..]),
            Some(_) => return Err(shorter()),
        };

        match line_type {
            LineType::Context => {
                if open.source_left == 0 || open.target_left == 0 {
                    return Err(shorter());
                }
                open.source_left -= 1;
                open.target_left -= 1;
            }
            LineType::Added => {
                if open.target_left == 0 {
                    return Err(shorter());
                }
                open.target_left -= 1;
            }
            LineType::Removed => {
                if open.source_left == 0 {
                    return Err(shorter());
                }
                open.source_left -= 1;
            }
            LineType::NoNewline => {}
        }
        open.hunk.lines.push(HunkLine::new(line_type, value));
        Ok(())
    }

    fn open_file(&mut self, source: String, target: String) {
        match self.file.as_mut() {
            Some(file) if self.awaiting_file_headers => {
                file.source_file = source;
                file.target_file = target;
            }
            _ => {
                self.finish_file();
                self.file = Some(FileDiff::new(source, target));
            }
        }
        self.awaiting_file_headers = false;
    }

    fn open_hunk(&mut self, number: usize, line: &str) -> Result<(), DiffError> {
        if self.file.is_none() {
            return Err(DiffError::Parse {
                line: number,
                message: "hunk header before any file header".to_string(),
            });
        }
        let hunk = Hunk::parse_header(line).ok_or_else(|| DiffError::Parse {
            line: number,
            message: format!("invalid hunk header: {line}"),
        })?;
        self.close_hunk();
        self.awaiting_file_headers = false;
        self.hunk = Some(OpenHunk {
            source_left: hunk.source_location.length,
            target_left: hunk.target_location.length,
            hunk,
        });
        Ok(())
    }

    fn close_hunk(&mut self) {
        if let Some(open) = self.hunk.take() {
            if let Some(file) = self.file.as_mut() {
                file.hunks.push(open.hunk);
            }
        }
    }

    fn finish_file(&mut self) {
        self.close_hunk();
        if let Some(file) = self.file.take() {
            self.files.push(file);
        }
        self.awaiting_file_headers = false;
    }
}

/// Splits the `a/<path> b/<path>` part of a `diff --git` line.
fn split_git_paths(rest: &str) -> (String, String) {
    match rest.find(" b/") {
        Some(at) if rest.starts_with("a/") => (rest[..at].to_string(), rest[at + 1..].to_string()),
        _ => (String::new(), String::new()),
    }
}

/// Drops the optional tab-separated timestamp from a `---`/`+++` file name.
fn file_name(header: &str) -> String {
    header.split('\t').next().unwrap_or(header).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIT_PATCH: &str = "From: Dev <dev@example.com>
Subject: [PATCH] net: fix foo

commit 0123456789abcdef0123456789abcdef01234567 upstream.

Fix the foo.

Signed-off-by: Dev <dev@example.com>
---
 net/foo.c | 3 ++-
 net/bar.c | 1 -
 2 files changed, 2 insertions(+), 2 deletions(-)

diff --git a/net/foo.c b/net/foo.c
index 1111111..2222222 100644
--- a/net/foo.c
+++ b/net/foo.c
@@ -10,3 +10,4 @@ static int foo(void)
 \tint a;
-\treturn 0;
+\ta = bar();
+\treturn a;
 }
diff --git a/net/bar.c b/net/bar.c
deleted file mode 100644
index 3333333..0000000
--- a/net/bar.c
+++ /dev/null
@@ -1 +0,0 @@
-int bar;
-- 
2.39.2
";

    fn single_hunk(body: &str) -> Hunk {
        let text = format!("--- a/x.c\n+++ b/x.c\n{body}");
        let set = PatchSet::parse(&text).unwrap();
        set.files()[0].hunks()[0].clone()
    }

    #[test]
    fn parse_git_patch_email() {
        let set = PatchSet::parse(GIT_PATCH).unwrap();
        assert_eq!(set.len(), 2);
        let paths: Vec<&str> = set.paths().collect();
        assert_eq!(paths, ["net/foo.c", "net/bar.c"]);
    }

    #[test]
    fn parse_hunk_header_fields() {
        let set = PatchSet::parse(GIT_PATCH).unwrap();
        let hunk = &set.files()[0].hunks()[0];
        assert_eq!(hunk.source_location().start(), 10);
        assert_eq!(hunk.source_length(), 3);
        assert_eq!(hunk.target_location().length(), 4);
        assert_eq!(hunk.section_header(), "static int foo(void)");
        assert_eq!(hunk.lines().len(), 5);
    }

    #[test]
    fn parse_line_types() {
        let set = PatchSet::parse(GIT_PATCH).unwrap();
        let types: Vec<LineType> = set.files()[0].hunks()[0]
            .lines()
            .iter()
            .map(HunkLine::line_type)
            .collect();
        assert_eq!(
            types,
            [
                LineType::Context,
                LineType::Removed,
                LineType::Added,
                LineType::Added,
                LineType::Context
            ]
        );
        assert_eq!(set.files()[0].hunks()[0].lines()[2].value(), "\ta = bar();");
    }

    #[test]
    fn signature_after_complete_hunk_is_ignored() {
        let set = PatchSet::parse(GIT_PATCH).unwrap();
        let bar = &set.files()[1];
        assert_eq!(bar.hunks().len(), 1);
        assert_eq!(bar.hunks()[0].lines().len(), 1);
    }

    #[test]
    fn deleted_file_is_removal() {
        let set = PatchSet::parse(GIT_PATCH).unwrap();
        assert!(!set.files()[0].is_removed_file());
        assert!(set.files()[1].is_removed_file());
        assert_eq!(set.files()[1].path(), "net/bar.c");
    }

    #[test]
    fn added_file_takes_target_path() {
        let text = "diff --git a/new.c b/new.c
new file mode 100644
--- /dev/null
+++ b/new.c
@@ -0,0 +1,2 @@
+int x;
+int y;
";
        let set = PatchSet::parse(text).unwrap();
        let file = &set.files()[0];
        assert!(file.is_added_file());
        assert!(!file.is_removed_file());
        assert_eq!(file.path(), "new.c");
    }

    #[test]
    fn plain_unified_diff_without_git_header() {
        let text = "--- old/a.txt\t2023-11-03 16:26:28.701847364 +0100
+++ new/a.txt\t2023-11-03 16:26:37.168563729 +0100
@@ -1,3 +1,3 @@
 one
-two
+TWO
 three
";
        let set = PatchSet::parse(text).unwrap();
        let file = &set.files()[0];
        assert_eq!(file.source_file(), "old/a.txt");
        assert_eq!(file.target_file(), "new/a.txt");
        assert_eq!(file.path(), "old/a.txt");
    }

    #[test]
    fn missing_lengths_default_to_one() {
        let hunk = single_hunk("@@ -3 +3 @@\n-a\n+b\n");
        assert_eq!(hunk.source_length(), 1);
        assert_eq!(hunk.target_location().length(), 1);
        assert_eq!(hunk.section_header(), "");
    }

    #[test]
    fn empty_line_inside_hunk_is_context() {
        let hunk = single_hunk("@@ -1,3 +1,3 @@\n a\n\n-b\n+c\n");
        assert_eq!(hunk.lines()[1].line_type(), LineType::Context);
        assert_eq!(hunk.lines()[1].value(), "");
    }

    #[test]
    fn no_newline_marker_is_kept() {
        let hunk = single_hunk("@@ -1 +1 @@\n-a\n\\ No newline at end of file\n+b\n");
        assert_eq!(hunk.lines().len(), 3);
        assert_eq!(hunk.lines()[1].line_type(), LineType::NoNewline);
        assert!(!hunk.lines()[1].is_change());
    }

    #[test]
    fn trailing_no_newline_marker_after_complete_hunk() {
        let hunk = single_hunk("@@ -1 +1 @@\n-a\n+b\n\\ No newline at end of file\n");
        assert_eq!(hunk.lines().len(), 3);
        assert_eq!(hunk.lines()[2].line_type(), LineType::NoNewline);
    }

    #[test]
    fn hunk_display_spells_out_lengths() {
        let hunk = single_hunk("@@ -3 +3 @@ fn main()\n-a\n+b\n");
        assert_eq!(hunk.to_string(), "@@ -3,1 +3,1 @@ fn main()\n-a\n+b");
    }

    #[test]
    fn prose_only_is_empty_set() {
        let set = PatchSet::parse("just a cover letter\n\n--- \nthanks\n").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn truncated_hunk_is_error() {
        let err = PatchSet::parse("--- a/x\n+++ b/x\n@@ -1,3 +1,3 @@\n a\n").unwrap_err();
        let DiffError::Parse { message, .. } = err;
        assert!(message.contains("end of input"));
    }

    #[test]
    fn foreign_line_inside_hunk_is_error() {
        let err = PatchSet::parse("--- a/x\n+++ b/x\n@@ -1,2 +1,2 @@\n a\nbogus\n").unwrap_err();
        assert_eq!(
            err,
            DiffError::Parse {
                line: 5,
                message: "hunk is shorter than its header announces: \"bogus\"".to_string()
            }
        );
    }

    #[test]
    fn hunk_without_file_is_error() {
        let err = PatchSet::parse("@@ -1 +1 @@\n-a\n+b\n").unwrap_err();
        let DiffError::Parse { line, .. } = err;
        assert_eq!(line, 1);
    }

    #[test]
    fn invalid_hunk_header_is_error() {
        assert!(PatchSet::parse("--- a/x\n+++ b/x\n@@ -1,x +1 @@\n").is_err());
    }
}
