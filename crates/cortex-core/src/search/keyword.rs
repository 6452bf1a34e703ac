//! Keyword (FTS5) query preparation.

/// Prepare a raw user query for FTS5 MATCH.
///
/// Bare terms get prefix expansion (`term*`); double-quoted substrings are
/// kept literal. Everything is emitted as quoted tokens so FTS5 operator
/// characters in user input (`-`, `:`, parentheses) cannot break the query.
pub fn sanitize_fts_query(query: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut rest = query.trim();

    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix('"') {
            // Quoted phrase: keep literal, no prefix expansion
            if let Some(end) = stripped.find('"') {
                let phrase = &stripped[..end];
                if !phrase.trim().is_empty() {
                    parts.push(format!("\"{}\"", phrase.replace('"', "\"\"")));
                }
                rest = stripped[end + 1..].trim_start();
                continue;
            }
            // Unbalanced quote: treat the remainder as plain terms
            rest = stripped;
        }

        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let term: String = rest[..end]
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if !term.is_empty() {
            parts.push(format!("\"{term}\"*"));
        }
        rest = rest[end..].trim_start();
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_terms_get_prefix_expansion() {
        assert_eq!(sanitize_fts_query("envelope aes"), "\"envelope\"* \"aes\"*");
    }

    #[test]
    fn test_quoted_phrase_stays_literal() {
        assert_eq!(
            sanitize_fts_query("\"key rotation\" policy"),
            "\"key rotation\" \"policy\"*"
        );
    }

    #[test]
    fn test_operator_characters_are_stripped() {
        assert_eq!(sanitize_fts_query("fts5-query: (x)"), "\"fts5query\"* \"x\"*");
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(sanitize_fts_query(""), "");
        assert_eq!(sanitize_fts_query("   "), "");
    }

    #[test]
    fn test_unbalanced_quote_degrades_to_terms() {
        assert_eq!(sanitize_fts_query("\"open ended"), "\"open\"* \"ended\"*");
    }
}
