//! Shared normalization rules: where an example lands in the publication
//! tree and what it is called.

/// Publication location of one example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLocation {
    /// Directory with its last `examples` segment rewritten to `examples-<folder>`.
    pub dir: String,
    /// Example file name without extension.
    pub filename: String,
}

/// Compute the publication location for the spec example at `original_file`.
///
/// `folder` is the language suffix (`java`, `go`, `js`, `js-rlc`, `dotnet`,
/// `python`). Fails when the path is absolute, climbs with `..`, or has no
/// directory, no file name, or no `examples` segment to rewrite.
pub fn target_location(original_file: &str, folder: &str) -> Result<TargetLocation, String> {
    let path = original_file.replace('\\', "/");
    let path = path.as_str();
    if path.starts_with('/') || path.split('/').next().is_some_and(|s| s.ends_with(':')) {
        return Err(format!("'{}' is not a relative path", original_file));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("'{}' leaves the publication tree", original_file));
    }

    let (dir, file) = path
        .rsplit_once('/')
        .ok_or_else(|| format!("'{}' has no directory", original_file))?;

    let filename = match file.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file,
    };
    if filename.is_empty() {
        return Err(format!("'{}' has no file name", original_file));
    }

    let replacement = format!("examples-{}", folder);
    let dir = if dir == "examples" {
        replacement
    } else if let Some(parent) = dir.strip_suffix("/examples") {
        format!("{}/{}", parent, replacement)
    } else if let Some(pos) = dir.rfind("/examples/") {
        format!(
            "{}/{}/{}",
            &dir[..pos],
            replacement,
            &dir[pos + "/examples/".len()..]
        )
    } else {
        return Err(format!(
            "'{}' has no examples folder to rewrite",
            original_file
        ));
    };

    Ok(TargetLocation {
        dir,
        filename: filename.to_string(),
    })
}

/// Remove the common leading indentation from a block of lines.
///
/// The indentation removed is the longest whitespace prefix shared by every
/// non-blank line, so mixed tabs and spaces or non-ASCII whitespace are only
/// stripped where the lines agree.
pub fn dedent(lines: &[&str]) -> Vec<String> {
    let common = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| &line[..line.len() - line.trim_start().len()])
        .reduce(common_prefix)
        .unwrap_or("");

    lines
        .iter()
        .map(|line| {
            let text = line.trim_end_matches(['\n', '\r']);
            if text.trim().is_empty() {
                String::new()
            } else {
                text.strip_prefix(common).unwrap_or(text).to_string()
            }
        })
        .collect()
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map_or(0, |((i, x), _)| i + x.len_utf8());
    &a[..len]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_examples_segment_rewritten() {
        let location = target_location(
            "specification/foo/resource-manager/Microsoft.Foo/stable/2021-01-01/examples/A.json",
            "java",
        )
        .unwrap();
        assert_eq!(
            location.dir,
            "specification/foo/resource-manager/Microsoft.Foo/stable/2021-01-01/examples-java"
        );
        assert_eq!(location.filename, "A");
    }

    #[test]
    fn test_nested_examples_folder() {
        let location =
            target_location("specification/foo/examples/nested/B.json", "js-rlc").unwrap();
        assert_eq!(location.dir, "specification/foo/examples-js-rlc/nested");
        assert_eq!(location.filename, "B");
    }

    #[test]
    fn test_last_examples_segment_wins() {
        let location =
            target_location("specification/examples/svc/examples/C.json", "go").unwrap();
        assert_eq!(location.dir, "specification/examples/svc/examples-go");
    }

    #[test]
    fn test_missing_examples_segment_rejected() {
        assert!(target_location("specification/foo/samples/A.json", "go").is_err());
        assert!(target_location("A.json", "go").is_err());
    }

    #[test]
    fn test_escaping_paths_rejected() {
        for path in [
            "specification/../../outside/examples/A.json",
            "specification/foo/examples/../../../A.json",
            "/etc/examples/A.json",
            "\\\\server\\examples\\A.json",
            "C:/specs/examples/A.json",
        ] {
            assert!(target_location(path, "java").is_err(), "{}", path);
        }
        assert!(target_location("specification/foo..bar/examples/A..json", "java").is_ok());
    }

    #[test]
    fn test_dotted_filename_keeps_inner_dots() {
        let location = target_location("spec/examples/Foo.Get.json", "dotnet").unwrap();
        assert_eq!(location.filename, "Foo.Get");
    }

    #[test]
    fn test_dedent() {
        let lines = ["        a();\n", "\n", "            b();\n"];
        assert_eq!(dedent(&lines), vec!["a();", "", "    b();"]);
    }

    #[test]
    fn test_dedent_multibyte_whitespace() {
        assert_eq!(dedent(&["\u{3000}a", " b"]), vec!["\u{3000}a", " b"]);
        assert_eq!(dedent(&["\u{3000}\u{3000}a", "\u{3000}b"]), vec!["\u{3000}a", "b"]);
    }

    #[test]
    fn test_dedent_mixed_tabs_and_spaces() {
        assert_eq!(dedent(&["\t  a", "\t b"]), vec![" a", "b"]);
        assert_eq!(dedent(&["\ta", "    b"]), vec!["\ta", "    b"]);
    }
}
