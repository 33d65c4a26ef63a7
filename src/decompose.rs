//! Aggregated sample decomposition.
//!
//! SDK code generators pack many example methods into one compilable file and
//! tag each method with a comment naming the REST API spec example it came
//! from (the *marker*). This module walks such a file line by line with an
//! explicit state machine and splits it into method regions:
//!
//! ```text
//!   InPreamble ──begin──▶ InMethod ──end──▶ Outside ──begin──▶ InMethod ...
//!       │  ▲                                  │  ▲
//!       ▼  │ */                               ▼  │ */
//!   InCommentBlock                        InCommentBlock
//! ```
//!
//! The per-language differences (marker prefix, method begin/end signals,
//! decorator lines) are supplied through the [`Dialect`] trait. Comment and
//! decorator lines directly above a method are pulled into its region by
//! backtracking once the method opening is seen.

use tracing::{debug, warn};

/// Scanner state while walking an aggregated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Before the first method: lines belong to the shared preamble.
    InPreamble,
    /// Between or after methods.
    Outside,
    /// Inside a `/* ... */` block outside any method.
    InCommentBlock,
    /// Between a method-begin signal and its end signal.
    InMethod,
}

/// Language-specific grammar consumed by [`scan`].
pub trait Dialect {
    /// Prefix of the marker, matched against the trimmed line.
    fn marker_prefix(&self) -> &'static str;

    /// Whether a marker may continue on following `*` lines of its comment block.
    fn wraps_markers(&self) -> bool {
        false
    }

    /// Whether markers appear inside the method body rather than above it.
    fn marker_inside_method(&self) -> bool {
        false
    }

    /// Whether an unterminated method runs to the end of the file.
    fn closes_at_eof(&self) -> bool {
        false
    }

    /// Whether `line` opens a method region.
    fn begins_method(&self, line: &str) -> bool;

    /// Whether `line` closes the method opened by `opening`.
    fn ends_method(&self, line: &str, previous: Option<&str>, opening: &str) -> bool;

    /// Decorator lines (besides `//` comments and block comments) that belong
    /// to the method declared by `opening`.
    fn is_attached(&self, _line: &str, _opening: &str) -> bool {
        false
    }

    /// Turn the raw marker text into a relative spec example path.
    fn resolve_marker(&self, raw: &str) -> Result<String, String> {
        clean_spec_path(raw)
    }
}

/// One method region with a resolved marker. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRegion {
    pub start: usize,
    pub end: usize,
    pub original_file: String,
}

/// A method that carried a marker but could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMethod {
    pub line: usize,
    pub reason: String,
}

/// Result of scanning one aggregated file.
#[derive(Debug, Clone)]
pub struct Aggregate<'a> {
    pub lines: Vec<&'a str>,
    pub regions: Vec<MethodRegion>,
    pub skipped: Vec<SkippedMethod>,
    /// Number of markers discovered in the file.
    pub markers: usize,
    bounds: Option<(usize, usize)>,
}

impl<'a> Aggregate<'a> {
    /// Lines before the first method carrying a marker.
    pub fn preamble(&self) -> &[&'a str] {
        match self.bounds {
            Some((start, _)) => &self.lines[..start],
            None => &self.lines[..],
        }
    }

    /// Lines after the last method carrying a marker.
    pub fn trailer(&self) -> &[&'a str] {
        match self.bounds {
            Some((_, end)) => &self.lines[end..],
            None => &[],
        }
    }

    pub fn region_lines(&self, region: &MethodRegion) -> &[&'a str] {
        &self.lines[region.start..region.end]
    }

    /// Code between consecutive marker methods (private helpers, fields),
    /// without surrounding blank lines. Gaps still mentioning `marker` hold a
    /// skipped example and are left out.
    pub fn members_between(&self, marker: &str) -> Vec<&[&'a str]> {
        self.regions
            .windows(2)
            .filter_map(|pair| {
                let gap = self.lines.get(pair[0].end..pair[1].start)?;
                let first = gap.iter().position(|l| !l.trim().is_empty())?;
                let last = gap.iter().rposition(|l| !l.trim().is_empty())?;
                let gap = &gap[first..=last];
                (!gap.iter().any(|l| l.contains(marker))).then_some(gap)
            })
            .collect()
    }
}

struct OpenRegion {
    start: usize,
    opening: usize,
    marker: Option<Result<String, String>>,
}

/// Line text without its terminator.
pub fn bare(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Leading whitespace width of a line.
pub fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Whether any line carries the marker prefix.
pub fn has_marker(text: &str, dialect: &dyn Dialect) -> bool {
    text.lines()
        .any(|line| line.trim().starts_with(dialect.marker_prefix()))
}

/// Normalize a relative spec example path taken from a marker.
pub fn clean_spec_path(raw: &str) -> Result<String, String> {
    let path = raw
        .trim()
        .trim_end_matches("*/")
        .trim()
        .replace('\\', "/");
    let path = path.trim_start_matches("./").trim_start_matches('/');
    if path.is_empty() {
        return Err("empty original-file marker".to_string());
    }
    if path.contains(char::is_whitespace) {
        return Err(format!("malformed original-file marker '{}'", path));
    }
    Ok(path.to_string())
}

/// Split `text` into method regions according to `dialect`.
pub fn scan<'a>(text: &'a str, dialect: &dyn Dialect) -> Aggregate<'a> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut aggregate = Aggregate {
        lines: Vec::new(),
        regions: Vec::new(),
        skipped: Vec::new(),
        markers: 0,
        bounds: None,
    };

    let prefix = dialect.marker_prefix();
    let marker_value = |trimmed: &str| -> Option<String> {
        trimmed
            .strip_prefix(prefix)
            .map(|rest| rest.trim().to_string())
    };

    let mut state = ScanState::InPreamble;
    let mut resume = ScanState::InPreamble;
    let mut pending: Option<Result<String, String>> = None;
    let mut wrapped: Option<String> = None;
    let mut open: Option<OpenRegion> = None;
    let mut floor = 0;

    for (index, raw) in lines.iter().enumerate() {
        let line = bare(raw);
        let trimmed = line.trim();

        match state {
            ScanState::InMethod => {
                let Some(region) = open.as_mut() else {
                    state = ScanState::Outside;
                    continue;
                };
                if dialect.marker_inside_method() && region.marker.is_none() {
                    if let Some(value) = marker_value(trimmed) {
                        aggregate.markers += 1;
                        region.marker = Some(dialect.resolve_marker(&value));
                    }
                }
                let previous = index.checked_sub(1).map(|i| bare(lines[i]));
                if dialect.ends_method(line, previous, bare(lines[region.opening])) {
                    if let Some(region) = open.take() {
                        close_region(&mut aggregate, region, index + 1);
                    }
                    floor = index + 1;
                    state = ScanState::Outside;
                }
            }
            ScanState::InCommentBlock => {
                if let Some(joined) = wrapped.as_mut() {
                    if !trimmed.starts_with("*/") {
                        joined.push_str(trimmed.trim_start_matches('*').trim());
                    }
                } else if let Some(value) = marker_value(trimmed) {
                    if dialect.wraps_markers() {
                        wrapped = Some(value);
                    } else {
                        replace_pending(
                            &mut aggregate,
                            &mut pending,
                            dialect.resolve_marker(&value),
                            index,
                        );
                    }
                }
                if trimmed.contains("*/") {
                    if let Some(joined) = wrapped.take() {
                        replace_pending(
                            &mut aggregate,
                            &mut pending,
                            dialect.resolve_marker(&joined),
                            index,
                        );
                    }
                    state = resume;
                }
            }
            ScanState::InPreamble | ScanState::Outside => {
                if dialect.begins_method(line) {
                    let start = backtrack(&lines, index, floor, dialect);
                    open = Some(OpenRegion {
                        start,
                        opening: index,
                        marker: pending.take(),
                    });
                    state = ScanState::InMethod;
                } else if trimmed.starts_with("/*") && !trimmed[2..].contains("*/") {
                    resume = state;
                    state = ScanState::InCommentBlock;
                } else if let Some(value) = marker_value(trimmed) {
                    replace_pending(
                        &mut aggregate,
                        &mut pending,
                        dialect.resolve_marker(&value),
                        index,
                    );
                }
            }
        }
    }

    if let Some(region) = open.take() {
        if dialect.closes_at_eof() {
            close_region(&mut aggregate, region, lines.len());
        } else if region.marker.is_some() {
            warn!(line = region.opening + 1, "method is never closed, skipping");
            aggregate.skipped.push(SkippedMethod {
                line: region.opening + 1,
                reason: "method is never closed".to_string(),
            });
        }
    }

    if let Some(marker) = pending {
        let reason = match marker {
            Ok(path) => format!("marker '{}' is not followed by a method", path),
            Err(reason) => reason,
        };
        warn!(reason = %reason, "skipping marker");
        aggregate.skipped.push(SkippedMethod {
            line: lines.len(),
            reason,
        });
    }

    aggregate.lines = lines;
    aggregate
}

/// Record a marker found outside a method. A marker still pending at this
/// point never reached a method and is counted as skipped.
fn replace_pending(
    aggregate: &mut Aggregate<'_>,
    pending: &mut Option<Result<String, String>>,
    marker: Result<String, String>,
    index: usize,
) {
    aggregate.markers += 1;
    if let Some(previous) = pending.replace(marker) {
        let reason = match previous {
            Ok(path) => format!("marker '{}' is not followed by a method", path),
            Err(reason) => reason,
        };
        warn!(line = index + 1, reason = %reason, "skipping marker");
        aggregate.skipped.push(SkippedMethod {
            line: index + 1,
            reason,
        });
    }
}

fn close_region(aggregate: &mut Aggregate<'_>, region: OpenRegion, end: usize) {
    let Some(marker) = region.marker else {
        debug!(line = region.opening + 1, "method without marker, not an example");
        return;
    };

    aggregate.bounds = Some(match aggregate.bounds {
        Some((start, _)) => (start, end),
        None => (region.start, end),
    });

    match marker {
        Ok(original_file) => aggregate.regions.push(MethodRegion {
            start: region.start,
            end,
            original_file,
        }),
        Err(reason) => {
            warn!(line = region.opening + 1, reason = %reason, "skipping method");
            aggregate.skipped.push(SkippedMethod {
                line: region.opening + 1,
                reason,
            });
        }
    }
}

/// Walk upward from a method opening over the comments and decorators that
/// belong to it. Never crosses `floor` (the end of the previous method).
fn backtrack(lines: &[&str], index: usize, floor: usize, dialect: &dyn Dialect) -> usize {
    let opening = bare(lines[index]);
    let opening_indent = indent_of(opening);
    let mut start = index;
    let mut in_block = false;
    let mut i = index;

    while i > floor {
        i -= 1;
        let line = bare(lines[i]);
        let trimmed = line.trim();

        if in_block {
            if trimmed.starts_with("/*") {
                start = i;
                in_block = false;
            }
            continue;
        }

        if trimmed.starts_with("/*") && trimmed.ends_with("*/") {
            start = i;
        } else if trimmed.ends_with("*/") {
            start = i;
            in_block = true;
        } else if !trimmed.is_empty()
            && indent_of(line) == opening_indent
            && (trimmed.starts_with("//") || dialect.is_attached(line, opening))
        {
            start = i;
        } else {
            break;
        }
    }

    start
}

/// Concatenate lines back into source text.
pub fn join_lines(lines: &[&str]) -> String {
    let mut out = String::with_capacity(lines.iter().map(|l| l.len()).sum());
    for line in lines {
        out.push_str(line);
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal C-like dialect: `fn ` opens, `}` at column 0 closes.
    struct TestDialect;

    impl Dialect for TestDialect {
        fn marker_prefix(&self) -> &'static str {
            "// origin: "
        }
        fn begins_method(&self, line: &str) -> bool {
            line.starts_with("fn ")
        }
        fn ends_method(&self, line: &str, _previous: Option<&str>, _opening: &str) -> bool {
            line == "}"
        }
        fn is_attached(&self, line: &str, _opening: &str) -> bool {
            line.trim_start().starts_with('#')
        }
    }

    struct WrappingDialect;

    impl Dialect for WrappingDialect {
        fn marker_prefix(&self) -> &'static str {
            "* origin:"
        }
        fn wraps_markers(&self) -> bool {
            true
        }
        fn begins_method(&self, line: &str) -> bool {
            line.starts_with("fn ")
        }
        fn ends_method(&self, line: &str, _previous: Option<&str>, _opening: &str) -> bool {
            line == "}"
        }
    }

    #[test]
    fn test_regions_and_preamble() {
        let text = "use a;\n\n// origin: specification/x/examples/A.json\n#[attr]\nfn a() {\n}\n\n// origin: specification/x/examples/B.json\nfn b() {\n  body();\n}\n\ntrailing();\n";
        let aggregate = scan(text, &TestDialect);
        assert_eq!(aggregate.markers, 2);
        assert_eq!(aggregate.regions.len(), 2);
        assert_eq!(aggregate.preamble(), &["use a;\n", "\n"]);
        assert_eq!(aggregate.trailer(), &["\n", "trailing();\n"]);

        let first = aggregate.region_lines(&aggregate.regions[0]);
        assert_eq!(first[0], "// origin: specification/x/examples/A.json\n");
        assert_eq!(first[1], "#[attr]\n");
        assert_eq!(first.last().unwrap(), &"}\n");
        assert_eq!(
            aggregate.regions[1].original_file,
            "specification/x/examples/B.json"
        );
    }

    #[test]
    fn test_method_without_marker_is_ignored() {
        let text = "fn helper() {\n}\n// origin: specification/x/examples/A.json\nfn a() {\n}\n";
        let aggregate = scan(text, &TestDialect);
        assert_eq!(aggregate.regions.len(), 1);
        assert!(aggregate.skipped.is_empty());
        assert_eq!(aggregate.preamble().len(), 2);
    }

    #[test]
    fn test_unclosed_method_is_skipped() {
        let text = "// origin: specification/x/examples/A.json\nfn a() {\n  body();\n";
        let aggregate = scan(text, &TestDialect);
        assert!(aggregate.regions.is_empty());
        assert_eq!(aggregate.skipped.len(), 1);
        assert_eq!(aggregate.markers, 1);
    }

    #[test]
    fn test_wrapped_marker_is_joined() {
        let text = "/*\n * origin:\n * specification/x/examples/\n * Long.json\n */\nfn a() {\n}\n";
        let aggregate = scan(text, &WrappingDialect);
        assert_eq!(aggregate.markers, 1);
        assert_eq!(aggregate.regions.len(), 1);
        assert_eq!(
            aggregate.regions[0].original_file,
            "specification/x/examples/Long.json"
        );
        assert_eq!(aggregate.regions[0].start, 0);
    }

    #[test]
    fn test_backtrack_stops_at_blank_line() {
        let text = "// unrelated\n\n// origin: specification/x/examples/A.json\nfn a() {\n}\n";
        let aggregate = scan(text, &TestDialect);
        assert_eq!(aggregate.regions[0].start, 2);
    }

    #[test]
    fn test_clean_spec_path() {
        assert_eq!(
            clean_spec_path(" /specification/a\\examples\\B.json ").unwrap(),
            "specification/a/examples/B.json"
        );
        assert!(clean_spec_path("   ").is_err());
        assert!(clean_spec_path("two words").is_err());
    }

    #[test]
    fn test_join_lines_terminates_last_line() {
        assert_eq!(join_lines(&["a\n", "b"]), "a\nb\n");
        assert_eq!(join_lines(&[]), "");
    }
}
