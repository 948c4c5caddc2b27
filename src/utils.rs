const MAX_FILENAME_CHARS: usize = 200;

/// Strip characters that are invalid in file names, collapse runs of whitespace
/// and cap the result at 200 characters.
pub fn sanitize_filename(name: &str) -> String {
    let stripped = sanitize_filename::sanitize(name);
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_FILENAME_CHARS).collect()
}

/// Human readable byte count, e.g. `1.5 MB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let fixed = format!("{:.2}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// Slice out the JSON object that starts right after `marker`.
///
/// Braces are balanced while skipping over string literals, so a `};` inside a
/// string does not end the object early.
pub fn extract_json_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)? + marker.len();
    let rest = text[start..].trim_start();
    if !rest.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, b) in rest.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode the handful of HTML entities that show up in page titles and meta tags
pub fn decode_html_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_balanced_object() {
        let html = r#"<script>var data = {"a":{"b":"x};y"},"c":[1,2]};var other = 1;</script>"#;
        assert_eq!(
            extract_json_after(html, "var data = "),
            Some(r#"{"a":{"b":"x};y"},"c":[1,2]}"#)
        );
        assert_eq!(extract_json_after(html, "var missing = "), None);
        assert_eq!(extract_json_after("x = {\"open\":1", "x = "), None);
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(decode_html_entities("Rock &amp; Roll &#x27;77"), "Rock & Roll '77");
    }

    #[test]
    fn strips_invalid_chars_and_collapses_whitespace() {
        assert_eq!(sanitize_filename("My: Playlist/2024*"), "My Playlist2024");
        assert_eq!(sanitize_filename("  a   <b>  c?  "), "a b c");
    }

    #[test]
    fn truncates_to_200_chars() {
        let long = "x".repeat(300);
        assert_eq!(sanitize_filename(&long).chars().count(), 200);
    }

    #[test]
    fn formats_byte_counts() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3 MB");
    }
}
