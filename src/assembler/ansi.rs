//! Terminal escape sequence removal.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// CSI/OSC color and cursor sequences, introduced by ESC or the 8-bit CSI byte.
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"[\x1b\x{9b}][\[\]()#;?]*",
        r"(?:(?:(?:[a-zA-Z\d]*(?:;[a-zA-Z\d]*)*)?\x07)",
        r"|(?:(?:\d{1,4}(?:;\d{0,4})*)?[\dA-PRZcf-ntqry=><~]))",
    ))
    .expect("escape pattern is valid")
});

/// Remove ANSI/VT100 escape sequences. Borrows when there is nothing to strip.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    if !text.contains(['\u{1b}', '\u{9b}']) {
        return Cow::Borrowed(text);
    }
    ANSI_ESCAPE.replace_all(text, "")
}
