use ammonia;

/// Sanitize HTML before it is stored.
///
/// Whitelist-based: safe formatting tags (<b>, <p>, lists, links) survive,
/// <script>/<iframe> and event-handler attributes are stripped. News bodies
/// are written by school staff, but a compromised admin account must not be
/// able to plant stored XSS in every student's feed.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_and_keeps_formatting() {
        let cleaned = clean_html("<p>Term begins <b>Monday</b><script>alert(1)</script></p>");
        assert!(cleaned.contains("<b>Monday</b>"));
        assert!(!cleaned.contains("script"));
    }
}
