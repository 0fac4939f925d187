use crate::persist::MARKDOWN_EXTENSION;

/// Fallback base name when neither the title nor the configured fallback survive sanitizing.
pub const DEFAULT_FALLBACK: &str = "output";

/// Longest base name in bytes. Most filesystems cap a path component at 255,
/// and the name still gets `.md` appended.
const MAX_NAME_BYTES: usize = 255 - 1 - MARKDOWN_EXTENSION.len();

/// Filesystem-safe base name (no extension) for an article title.
///
/// A title that is absent or blank after trimming is replaced by `fallback`.
/// Reserved characters are removed, whitespace runs become a single `_`.
pub fn sanitize_filename(title: Option<&str>, fallback: &str) -> String {
    let chosen = title.map(str::trim).filter(|t| !t.is_empty());
    if let Some(name) = chosen.map(sanitize_component).filter(|n| !n.is_empty()) {
        return name;
    }
    let fallback = sanitize_component(fallback.trim());
    if fallback.is_empty() {
        DEFAULT_FALLBACK.to_string()
    } else {
        fallback
    }
}

fn sanitize_component(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| c.is_whitespace() || !is_forbidden(*c))
        .collect();
    let mut name = underscore_whitespace(&cleaned);
    if name == "." || name == ".." {
        return String::new();
    }
    fit_name(&mut name, MAX_NAME_BYTES);
    if is_reserved_windows_name(&name) {
        fit_name(&mut name, MAX_NAME_BYTES - 1);
        name.push('_');
    }
    name
}

fn fit_name(name: &mut String, max_bytes: usize) {
    truncate_on_char_boundary(name, max_bytes);
    // Windows silently drops trailing dots and spaces.
    let trimmed_len = name.trim_end_matches(['.', ' ']).len();
    name.truncate(trimmed_len);
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

fn underscore_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_space = false;
    for c in input.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn truncate_on_char_boundary(name: &mut String, max_bytes: usize) {
    if name.len() <= max_bytes {
        return;
    }
    let mut end = max_bytes;
    while end > 0 && !name.is_char_boundary(end) {
        end -= 1;
    }
    name.truncate(end);
}

/// `CON`, `nul.txt` and friends name devices on Windows, whatever the extension.
fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    let stem = name.split('.').next().unwrap_or(name);
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn spaces_become_single_underscores() {
        assert_eq!(sanitize_filename(Some("Example Title"), "output"), "Example_Title");
        assert_eq!(sanitize_filename(Some("  a \t\n b  "), "output"), "a_b");
    }

    #[test]
    fn reserved_characters_are_removed() {
        assert_eq!(
            sanitize_filename(Some("My: Title?/Bad"), "output"),
            "My_TitleBad"
        );
        assert_eq!(sanitize_filename(Some("a\0b\u{7}c"), "output"), "abc");
    }

    #[test]
    fn blank_titles_use_the_fallback() {
        assert_eq!(sanitize_filename(None, "output"), "output");
        assert_eq!(sanitize_filename(Some(" \t "), "my page"), "my_page");
    }

    #[test]
    fn titles_that_sanitize_to_nothing_use_the_fallback() {
        assert_eq!(sanitize_filename(Some("///"), "fallback"), "fallback");
        assert_eq!(sanitize_filename(Some(".."), "fallback"), "fallback");
        assert_eq!(sanitize_filename(Some("?"), "<>"), DEFAULT_FALLBACK);
    }

    #[test]
    fn reserved_device_names_are_patched() {
        assert_eq!(sanitize_filename(Some("CON"), "output"), "CON_");
        assert_eq!(sanitize_filename(Some("lpt1.md"), "output"), "lpt1.md_");
    }

    #[test]
    fn trailing_dots_are_dropped() {
        assert_eq!(sanitize_filename(Some("Wait for it..."), "output"), "Wait_for_it");
    }

    #[test]
    fn long_titles_are_truncated_on_char_boundary() {
        let title = "é".repeat(200);
        let name = sanitize_filename(Some(&title), "output");
        assert!(name.len() <= MAX_NAME_BYTES);
        assert_eq!(name.chars().count(), MAX_NAME_BYTES / 2);
    }

    #[test]
    fn name_with_extension_fits_a_path_component() {
        let name = sanitize_filename(Some(&"a".repeat(300)), "output");
        assert_eq!(format!("{name}.{MARKDOWN_EXTENSION}").len(), 255);

        let device = format!("CON.{}", "b".repeat(300));
        let name = sanitize_filename(Some(&device), "output");
        assert!(name.ends_with('_'));
        assert!(format!("{name}.{MARKDOWN_EXTENSION}").len() <= 255);
    }
}
