//! Language tag normalization.
//!
//! Detectors report languages as full names ("portuguese"), ISO codes
//! ("pt", "por") or locale tags ("pt-BR"). Everything downstream works with
//! two-letter codes from a fixed known set; anything unrecognized maps to
//! the product default instead of failing the call.

/// Fallback language code for unrecognized detector output.
pub const DEFAULT_LANGUAGE: &str = "pt";

/// Canonicalize raw detector output to a two-letter code.
pub fn normalize(raw: &str) -> &'static str {
    let tag = raw.trim().to_ascii_lowercase();
    if let Some(code) = lookup(&tag) {
        return code;
    }

    // Locale tags like "pt-BR" or "en_US": retry with the primary subtag.
    if let Some(primary) = tag.split(['-', '_']).next() {
        if primary != tag {
            if let Some(code) = lookup(primary) {
                return code;
            }
        }
    }

    DEFAULT_LANGUAGE
}

fn lookup(tag: &str) -> Option<&'static str> {
    match tag {
        "pt" | "por" | "portuguese" | "português" | "portugues" => Some("pt"),
        "en" | "eng" | "english" => Some("en"),
        "es" | "spa" | "spanish" | "español" | "espanol" | "castilian" => Some("es"),
        "fr" | "fra" | "fre" | "french" | "français" | "francais" => Some("fr"),
        "de" | "deu" | "ger" | "german" | "deutsch" => Some("de"),
        "it" | "ita" | "italian" | "italiano" => Some("it"),
        "nl" | "nld" | "dut" | "dutch" => Some("nl"),
        "ja" | "jpn" | "japanese" => Some("ja"),
        "zh" | "zho" | "chi" | "chinese" | "mandarin" => Some("zh"),
        "ko" | "kor" | "korean" => Some("ko"),
        "ru" | "rus" | "russian" => Some("ru"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_letter_codes_pass_through() {
        assert_eq!(normalize("pt"), "pt");
        assert_eq!(normalize("en"), "en");
        assert_eq!(normalize("ja"), "ja");
    }

    #[test]
    fn test_full_names_are_canonicalized() {
        assert_eq!(normalize("portuguese"), "pt");
        assert_eq!(normalize("Portuguese"), "pt");
        assert_eq!(normalize("ENGLISH"), "en");
        assert_eq!(normalize("deutsch"), "de");
    }

    #[test]
    fn test_locale_variants_map_to_primary() {
        assert_eq!(normalize("pt-BR"), "pt");
        assert_eq!(normalize("pt-PT"), "pt");
        assert_eq!(normalize("en_US"), "en");
        assert_eq!(normalize("es-419"), "es");
    }

    #[test]
    fn test_unrecognized_falls_back_to_default() {
        assert_eq!(normalize("klingon"), DEFAULT_LANGUAGE);
        assert_eq!(normalize(""), DEFAULT_LANGUAGE);
        assert_eq!(normalize("zz-ZZ"), DEFAULT_LANGUAGE);
        assert_eq!(normalize("   "), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        assert_eq!(normalize("  pt-br  "), "pt");
    }
}
