// src/utils/html.rs

/// Sanitizes author-supplied text before it is stored.
///
/// Whitelist based: harmless markup such as `<b>` survives, `<script>` and
/// event-handler attributes are stripped. Surrounding whitespace is trimmed.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input.trim())
}
