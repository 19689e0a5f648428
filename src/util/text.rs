use std::borrow::Cow;

/// Ellipsis string appended to truncated snippets
const ELLIPSIS: &str = "...";

/// Maximum snippet length, measured in Unicode code points (not bytes, not columns).
pub const SNIPPET_MAX_CHARS: usize = 100;

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// Turns a raw feed description into a short plain-text snippet.
///
/// Steps, in order:
///
/// 1. Unwrap an exact `<![CDATA[ ... ]]>` wrapper (feeds that double-escape
///    their CDATA sections deliver it as literal text).
/// 2. Replace `<br>` and `<br/>` with a single space. Any other markup passes
///    through verbatim; this is a snippet, not a sanitizer.
/// 3. Truncate to [`SNIPPET_MAX_CHARS`] code points, appending `"..."` when
///    anything was cut.
///
/// # Examples
///
/// ```
/// use siphon::util::clean_description;
///
/// assert_eq!(clean_description("<![CDATA[Hello<br/>world]]>"), "Hello world");
/// assert_eq!(clean_description(""), "");
///
/// let long = "x".repeat(150);
/// assert_eq!(clean_description(&long).chars().count(), 103);
/// ```
pub fn clean_description(raw: &str) -> String {
    let unwrapped = raw
        .strip_prefix(CDATA_OPEN)
        .and_then(|inner| inner.strip_suffix(CDATA_CLOSE))
        .unwrap_or(raw);

    let text = replace_line_breaks(unwrapped);
    truncate_chars(&text, SNIPPET_MAX_CHARS).into_owned()
}

fn replace_line_breaks(s: &str) -> Cow<'_, str> {
    if !s.contains("<br") {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.replace("<br>", " ").replace("<br/>", " "))
}

/// Truncates `s` to at most `max_chars` code points, appending [`ELLIPSIS`] if cut.
///
/// Returns `Cow::Borrowed` when the string already fits.
fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS)),
        None => Cow::Borrowed(s),
    }
}
