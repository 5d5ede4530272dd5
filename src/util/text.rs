use std::borrow::Cow;

/// Removes markup tags from an HTML fragment.
///
/// Every `<` up to the next `>` is dropped, the same as a non-greedy `<.*?>`
/// pattern. An unterminated `<` is kept as literal text. Entities are not
/// decoded.
///
/// Returns `Cow::Borrowed` when the input contains no tags, so plain text
/// bodies pass through without allocation.
///
/// # Examples
///
/// ```
/// use tasalert::util::strip_html;
///
/// assert_eq!(strip_html("<p>Fire at <b>Zeehan</b></p>"), "Fire at Zeehan");
/// assert_eq!(strip_html("no markup"), "no markup");
/// assert_eq!(strip_html("3 < 4"), "3 < 4");
/// ```
pub fn strip_html(s: &str) -> Cow<'_, str> {
    let Some(first) = s.find('<') else {
        return Cow::Borrowed(s);
    };
    if !s[first..].contains('>') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..first]);
    let mut rest = &s[first..];

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open..];
        match after_open.find('>') {
            Some(close) => rest = &after_open[close + 1..],
            None => {
                // Unterminated tag: keep the remainder verbatim
                rest = after_open;
                break;
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

/// Strips terminal control characters and ANSI escape sequences.
///
/// Feed text ends up in log lines and terminals, so anything that could move
/// the cursor or retitle the window is removed. Tab, newline and carriage
/// return survive. CSI sequences (`ESC [` ... final byte `@`..`~`) and OSC
/// sequences (`ESC ]` ... BEL or `ESC \`) are dropped whole; a bare ESC is
/// dropped on its own.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            match chars.peek() {
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
        } else if !is_stripped_control(c) {
            out.push(c);
        }
    }

    Cow::Owned(out)
}

fn is_stripped_control(c: char) -> bool {
    c == '\x1b' || c == '\x7f' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'))
}
