//! Diff-of-diffs comparison between a backport and its upstream commit.
//!
//! Line numbers may shift and whitespace at line ends may differ. Per hunk,
//! the source length and function context must agree, as must every added
//! or removed line.

use std::collections::{HashMap, HashSet};

use crate::diff::{FileDiff, Hunk, PatchSet};

/// Returns the drift report lines for `downstream` against `upstream`; empty
/// when the two agree.
///
/// Report order: upstream paths missing downstream, then per downstream
/// file either a missing-upstream line or the differing hunks with their
/// side-by-side tables.
pub fn compare(downstream: &PatchSet, upstream: &PatchSet) -> Vec<String> {
    let upstream_files: HashMap<&str, &FileDiff> =
        upstream.files().iter().map(|file| (file.path(), file)).collect();
    let downstream_paths: HashSet<&str> = downstream.paths().collect();

    let mut report = Vec::new();
    let mut reported = HashSet::new();
    for path in upstream.paths() {
        if !downstream_paths.contains(path) && reported.insert(path) {
            report.push(format!("Path {path} not found in downstream"));
        }
    }

    for file in downstream.files() {
        let Some(theirs) = upstream_files.get(file.path()) else {
            if !file.is_removed_file() {
                report.push(format!("Path {} not found in upstream", file.path()));
            }
            continue;
        };
        for (index, (ours, theirs)) in file.hunks().iter().zip(theirs.hunks()).enumerate() {
            if hunks_differ(ours, theirs) {
                report.push(format!("Hunk difference in hunk {index} for file {}", file.path()));
                report.extend(side_by_side(ours, theirs));
            }
        }
    }
    report
}

/// Whether two hunks paired by position disagree.
///
/// Only changed lines of the downstream hunk are checked, each against the
/// upstream line at the same position. Surplus upstream lines are ignored.
pub fn hunks_differ(ours: &Hunk, theirs: &Hunk) -> bool {
    if ours.source_length() != theirs.source_length() || ours.section_header() != theirs.section_header() {
        return true;
    }
    ours.lines()
        .iter()
        .zip(theirs.lines())
        .filter(|(line, _)| line.is_change())
        .any(|(line, other)| line.line_type() != other.line_type() || line.value().trim() != other.value().trim())
}

/// Two-column rendering of a differing hunk pair, followed by an empty line.
///
/// The left column is padded to the longest downstream line plus ten. Rows
/// that differ, other than the `@@` header row, are flagged with `>`.
pub fn side_by_side(ours: &Hunk, theirs: &Hunk) -> Vec<String> {
    let left = rendered_lines(ours);
    let right = rendered_lines(theirs);
    let width = left.iter().map(|line| line.chars().count()).max().unwrap_or(0) + 10;

    let mut rows = Vec::with_capacity(left.len().max(right.len()) + 2);
    rows.push(table_row(' ', "Downstream", "Upstream", width));
    for index in 0..left.len().max(right.len()) {
        let l = left.get(index).map_or("", String::as_str);
        let r = right.get(index).map_or("", String::as_str);
        let marker = if l == r || l.starts_with("@@") { ' ' } else { '>' };
        rows.push(table_row(marker, l, r, width));
    }
    rows.push(String::new());
    rows
}

fn rendered_lines(hunk: &Hunk) -> Vec<String> {
    hunk.to_string()
        .lines()
        .map(|line| line.trim().replace('\t', "    "))
        .collect()
}

fn table_row(marker: char, left: &str, right: &str, width: usize) -> String {
    format!("{marker} {left:<width$} {right}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn patch(text: &str) -> PatchSet {
        PatchSet::parse(text).unwrap()
    }

    const BASE: &str = "\
diff --git a/net/foo.c b/net/foo.c
--- a/net/foo.c
+++ b/net/foo.c
@@ -10,3 +10,3 @@ static int foo(void)
 \tint a;
-\treturn 0;
+\treturn 1;
 }
";

    #[test]
    fn identical_diffs_agree() {
        assert!(compare(&patch(BASE), &patch(BASE)).is_empty());
    }

    #[test]
    fn shifted_line_numbers_and_trailing_space_agree() {
        let shifted = BASE
            .replace("@@ -10,3 +10,3 @@", "@@ -42,3 +44,3 @@")
            .replace("+\treturn 1;", "+\treturn 1;  ");
        assert!(compare(&patch(&shifted), &patch(BASE)).is_empty());
    }

    #[test]
    fn leading_whitespace_on_changed_line_agrees() {
        let indented = BASE.replace("+\treturn 1;", "+ \t  return 1;");
        assert!(compare(&patch(&indented), &patch(BASE)).is_empty());
    }

    #[test]
    fn swapped_line_types_are_reported() {
        let swapped = BASE.replace("-\treturn 0;\n+\treturn 1;", "+\treturn 1;\n-\treturn 0;");
        let ours = patch(&swapped);
        assert!(hunks_differ(&ours.files()[0].hunks()[0], &patch(BASE).files()[0].hunks()[0]));
        let report = compare(&ours, &patch(BASE));
        assert_eq!(report[0], "Hunk difference in hunk 0 for file net/foo.c");
        assert!(report.contains(&"> +    return 1;                                   -    return 0;".to_string()), "{report:#?}");
    }

    #[test]
    fn context_differences_are_ignored() {
        let context = BASE.replace(" \tint a;", " \tint b;");
        assert!(compare(&patch(&context), &patch(BASE)).is_empty());
    }

    #[test]
    fn changed_line_is_reported_with_table() {
        let ours = BASE.replace("+\treturn 1;", "+\treturn 2;");
        let report = compare(&patch(&ours), &patch(BASE));
        assert_eq!(
            report,
            [
                "Hunk difference in hunk 0 for file net/foo.c",
                "  Downstream                                       Upstream",
                "  @@ -10,3 +10,3 @@ static int foo(void)           @@ -10,3 +10,3 @@ static int foo(void)",
                "  int a;                                           int a;",
                "  -    return 0;                                   -    return 0;",
                "> +    return 2;                                   +    return 1;",
                "  }                                                }",
                "",
            ]
        );
    }

    #[test]
    fn section_header_difference_is_reported() {
        let ours = BASE.replace("static int foo(void)", "static int bar(void)");
        let report = compare(&patch(&ours), &patch(BASE));
        assert_eq!(report[0], "Hunk difference in hunk 0 for file net/foo.c");
    }

    #[test]
    fn source_length_difference_is_reported() {
        let ours = "\
--- a/net/foo.c
+++ b/net/foo.c
@@ -10,2 +10,2 @@ static int foo(void)
-\treturn 0;
+\treturn 1;
 }
";
        let report = compare(&patch(ours), &patch(BASE));
        assert_eq!(report[0], "Hunk difference in hunk 0 for file net/foo.c");
    }

    #[test]
    fn missing_paths_are_reported_in_order() {
        let other = BASE.replace("net/foo.c", "net/other.c");
        let report = compare(&patch(&other), &patch(BASE));
        assert_eq!(
            report,
            ["Path net/foo.c not found in downstream", "Path net/other.c not found in upstream"]
        );
    }

    #[test]
    fn removed_downstream_file_is_not_reported_missing() {
        let removal = "\
diff --git a/old.c b/old.c
deleted file mode 100644
--- a/old.c
+++ /dev/null
@@ -1 +0,0 @@
-int old;
";
        assert!(compare(&patch(removal), &patch("")).is_empty());
    }

    #[test]
    fn extra_hunks_on_either_side_are_not_compared() {
        let extra = format!("{BASE}@@ -40,1 +40,1 @@\n-x\n+y\n");
        assert!(compare(&patch(&extra), &patch(BASE)).is_empty());
        assert!(compare(&patch(BASE), &patch(&extra)).is_empty());
    }

    #[test]
    fn table_pads_to_longest_downstream_line() {
        let ours = patch("--- a/f\n+++ b/f\n@@ -1 +1 @@\n-a\n+b\n");
        let theirs = patch("--- a/f\n+++ b/f\n@@ -1 +1 @@\n-a\n+c\n");
        let rows = side_by_side(&ours.files()[0].hunks()[0], &theirs.files()[0].hunks()[0]);
        // Longest downstream line is the 15-char header, so the column is 25 wide.
        assert_eq!(rows[0], format!("  {:<25} Upstream", "Downstream"));
        assert_eq!(rows[3], format!("> {:<25} +c", "+b"));
        assert_eq!(rows.last().map(String::as_str), Some(""));
    }

    fn arbitrary_patch() -> impl Strategy<Value = String> {
        let line = prop_oneof![Just(' '), Just('-'), Just('+')]
            .prop_flat_map(|marker| "[a-z ]{0,12}".prop_map(move |text| format!("{marker}{text}")));
        (prop::collection::vec(line, 1..8), "[a-z]{1,8}").prop_map(|(lines, name)| {
            let old = lines.iter().filter(|l| !l.starts_with('+')).count();
            let new = lines.iter().filter(|l| !l.starts_with('-')).count();
            format!("--- a/{name}.c\n+++ b/{name}.c\n@@ -1,{old} +1,{new} @@\n{}\n", lines.join("\n"))
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn compare_with_self_is_empty(text in arbitrary_patch()) {
            let set = patch(&text);
            prop_assert!(compare(&set, &set).is_empty());
        }

        #[test]
        fn compare_is_deterministic(a in arbitrary_patch(), b in arbitrary_patch()) {
            let (a, b) = (patch(&a), patch(&b));
            prop_assert_eq!(compare(&a, &b), compare(&a, &b));
        }
    }
}
