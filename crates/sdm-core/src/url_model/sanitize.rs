//! Filename sanitization for names handed to the blob store.

const NAME_MAX: usize = 255;

fn is_unsafe(c: char) -> bool {
    c == '/' || c == '\\' || c.is_control() || c.is_whitespace()
}

/// Makes `name` safe as a single Linux path component.
///
/// Unsafe characters (separators, control characters, whitespace) become `_`,
/// runs of `_` collapse, leading/trailing dots and underscores are trimmed, and
/// the result is cut to 255 bytes on a char boundary. May return an empty string.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars().map(|c| if is_unsafe(c) { '_' } else { c }) {
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_become_underscores() {
        assert_eq!(sanitize_file_name("a/b\\c.txt"), "a_b_c.txt");
    }

    #[test]
    fn whitespace_and_runs_collapse() {
        assert_eq!(sanitize_file_name("my  file___name.txt"), "my_file_name.txt");
        assert_eq!(sanitize_file_name("tab\there"), "tab_here");
    }

    #[test]
    fn dots_are_trimmed() {
        assert_eq!(sanitize_file_name("..hidden.."), "hidden");
        assert_eq!(sanitize_file_name("..."), "");
    }

    #[test]
    fn long_names_are_cut_on_char_boundary() {
        let long = "é".repeat(200);
        let out = sanitize_file_name(&long);
        assert!(out.len() <= NAME_MAX);
        assert!(out.chars().all(|c| c == 'é'));
    }
}
