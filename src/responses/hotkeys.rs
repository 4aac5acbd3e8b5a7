//! Hotkey markers in menu descriptions

/// Hotkeys marked in a description: the contents of every `[...]`,
/// concatenated and lowercased
///
/// `"[P]assed"` gives `"p"`, `"Fail [f] / [x]"` gives `"fx"`. An unclosed
/// `[` marks nothing.
pub fn extract_hotkeys(description: &str) -> String {
    let mut keys = String::new();
    let mut rest = description;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        keys.push_str(&after[..close]);
        rest = &after[close + 1..];
    }
    keys.to_lowercase()
}
