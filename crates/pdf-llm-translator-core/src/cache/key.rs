use crate::config::Lang;

/// Cache key for a page's pipeline result.
///
/// An MD5 over every input that changes the result, so a new model,
/// language pair, or threshold never serves a stale page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    hash: String,
}

/// Inputs that identify a page result
#[derive(Debug, Clone, Copy)]
pub struct PageKeyParts<'a> {
    pub doc_id: &'a str,
    pub page_num: usize,
    pub page_text: &'a str,
    pub model: &'a str,
    pub source_lang: &'a Lang,
    pub target_lang: &'a Lang,
    pub quality_threshold: f64,
}

impl PageKey {
    pub fn new(parts: PageKeyParts<'_>) -> Self {
        // NUL separators keep ("a", "bc") and ("ab", "c") apart
        let combined = format!(
            "{}\0{}\0{}\0{}\0{}\0{}\0{:.4}",
            parts.doc_id,
            parts.page_num,
            parts.page_text,
            parts.model.to_lowercase(),
            parts.source_lang.as_str().to_lowercase(),
            parts.target_lang.as_str().to_lowercase(),
            parts.quality_threshold,
        );

        Self {
            hash: format!("{:x}", md5::compute(combined.as_bytes())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for PageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(page: usize, text: &str, model: &str, tgt: &str, threshold: f64) -> PageKey {
        PageKey::new(PageKeyParts {
            doc_id: "doc",
            page_num: page,
            page_text: text,
            model,
            source_lang: &Lang::auto(),
            target_lang: &Lang::new(tgt),
            quality_threshold: threshold,
        })
    }

    #[test]
    fn test_key_is_fixed_length_hash() {
        let k = key(5, "Bonjour", "gpt-4o", "en", 0.75);
        assert_eq!(k.as_str().len(), 32);
        assert!(k.to_string().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_key_changes_with_inputs() {
        let base = key(0, "Bonjour", "gpt-4o", "en", 0.75);
        assert_ne!(base, key(1, "Bonjour", "gpt-4o", "en", 0.75));
        assert_ne!(base, key(0, "Salut", "gpt-4o", "en", 0.75));
        assert_ne!(base, key(0, "Bonjour", "gpt-4o-mini", "en", 0.75));
        assert_ne!(base, key(0, "Bonjour", "gpt-4o", "de", 0.75));
        assert_ne!(base, key(0, "Bonjour", "gpt-4o", "en", 0.9));
    }

    #[test]
    fn test_key_ignores_case() {
        assert_eq!(key(0, "x", "GPT-4o", "EN", 0.75), key(0, "x", "gpt-4o", "en", 0.75));
    }
}
