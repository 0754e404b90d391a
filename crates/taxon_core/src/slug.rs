//! URL-safe slugs for taxa.

use unicode_normalization::UnicodeNormalization;

/// Derive a slug from a display name.
///
/// NFKD-decomposes, drops combining marks and anything non-ASCII,
/// lowercases, and joins alphanumeric runs with `-`.
pub fn slugify(name: &str) -> String {
    let decomposed: String = name
        .nfkd()
        .filter(|c| c.is_ascii())
        .collect::<String>()
        .to_ascii_lowercase();

    decomposed
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Slug for a taxonomy's root. Names with nothing sluggable (e.g. all CJK)
/// fall back to `root` so the root always carries a valid slug.
pub fn root_slug(name: &str) -> String {
    match slugify(name) {
        slug if slug.is_empty() => ROOT_SLUG.to_string(),
        slug => slug,
    }
}

pub const ROOT_SLUG: &str = "root";

/// A caller-supplied slug must already be in canonical form.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slugify(slug) == slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Men's T-Shirts"), "men-s-t-shirts");
        assert_eq!(slugify("  Home & Garden  "), "home-garden");
    }

    #[test]
    fn slugify_strips_accents() {
        assert_eq!(slugify("Café Crème"), "cafe-creme");
    }

    #[test]
    fn slugify_non_latin_is_empty() {
        assert_eq!(slugify("日本"), "");
    }

    #[test]
    fn root_slug_is_never_empty() {
        assert_eq!(root_slug("Apparel"), "apparel");
        assert_eq!(root_slug("日本"), ROOT_SLUG);
        assert!(is_valid_slug(&root_slug("!!!")));
    }

    #[test]
    fn slug_validity() {
        assert!(is_valid_slug("summer-2024"));
        assert!(!is_valid_slug("Summer 2024"));
        assert!(!is_valid_slug("trailing-"));
        assert!(!is_valid_slug(""));
    }
}
