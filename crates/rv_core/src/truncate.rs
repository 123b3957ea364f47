/// Appended to an extract that had to be shortened.
pub const ELLIPSIS_MARKER: &str = " [...]";

/// Shortens `text` to at most `max` characters, cutting on the last
/// whitespace inside the allowed prefix and appending [`ELLIPSIS_MARKER`].
///
/// Lengths are counted in `char`s. When the prefix holds no usable word
/// boundary the text is hard-cut at `max` characters instead.
pub fn truncate_extract(text: &str, max: usize) -> String {
    let byte_limit = match text.char_indices().nth(max) {
        Some((idx, _)) => idx,
        None => return text.to_string(),
    };
    let prefix = &text[..byte_limit];

    let cut = prefix
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .map(|(idx, _)| idx)
        .last()
        .map(|idx| prefix[..idx].trim_end())
        .filter(|kept| !kept.is_empty())
        .unwrap_or(prefix);

    format!("{}{}", cut, ELLIPSIS_MARKER)
}
