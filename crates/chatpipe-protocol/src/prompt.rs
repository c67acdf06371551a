//! Text helpers for outgoing user input
//!
//! The wire format to the assistant is raw text followed by one line
//! terminator, so these helpers only decide *what* text to send.

/// Normalize text typed into the chat input box
///
/// Returns the trimmed text, or `None` when nothing but whitespace was typed.
pub fn prepare_input(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Build the prompt used to ask about a code selection
///
/// `file_name` falls back to `unknown` when the editor has no file. Returns
/// `None` for a blank selection.
pub fn code_snippet_prompt(file_name: Option<&str>, selection: &str) -> Option<String> {
    if selection.trim().is_empty() {
        return None;
    }

    let file_name = file_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("unknown");

    Some(format!(
        "Here's some code from {file_name}:\n\n```\n{selection}\n```\n\nCan you help me with this?"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("hello", Some("hello"))]
    #[case("  fix bug \n", Some("fix bug"))]
    #[case("", None)]
    #[case(" \t\n ", None)]
    fn test_prepare_input(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(prepare_input(raw), expected);
    }

    #[test]
    fn test_snippet_prompt_with_file() {
        let prompt = code_snippet_prompt(Some("main.rs"), "fn main() {}").unwrap();
        assert_eq!(
            prompt,
            "Here's some code from main.rs:\n\n```\nfn main() {}\n```\n\nCan you help me with this?"
        );
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("   "))]
    fn test_snippet_prompt_unknown_file(#[case] file_name: Option<&str>) {
        let prompt = code_snippet_prompt(file_name, "let x = 1;").unwrap();
        assert!(prompt.starts_with("Here's some code from unknown:"));
    }

    #[test]
    fn test_snippet_prompt_blank_selection() {
        assert!(code_snippet_prompt(Some("main.rs"), "  \n ").is_none());
    }

    #[test]
    fn test_snippet_prompt_keeps_selection_verbatim() {
        let selection = "    if x {\n        y();\n    }";
        let prompt = code_snippet_prompt(Some("lib.rs"), selection).unwrap();
        assert!(prompt.contains(selection));
    }
}
