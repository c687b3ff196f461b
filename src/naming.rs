// Naming inference helpers for metadata generation and string identifiers
use convert_case::{Case, Casing};

/// Kebab-case slug used for secondary string identifiers.
///
/// "Bobs awesome organisation" -> "bobs-awesome-organisation". Characters
/// outside [a-z0-9] collapse into single hyphens.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_was_hyphen = true; // suppress leading hyphen
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Title-cased display name: "user-profile" -> "User Profile".
pub fn title_case(input: &str) -> String {
    input.to_case(Case::Title)
}

/// Kebab-cased machine name: "User Profile" -> "user-profile".
pub fn kebab_case(input: &str) -> String {
    input.to_case(Case::Kebab)
}

/// Naive English pluralization, good enough for entity titles.
pub fn pluralize(input: &str) -> String {
    let lower = input.to_lowercase();
    if let Some(stem) = input.strip_suffix('y') {
        // "company" -> "companies", but "day" -> "days"
        let before = stem.chars().last();
        if !matches!(before, Some('a' | 'e' | 'i' | 'o' | 'u')) {
            return format!("{stem}ies");
        }
    }
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{input}es");
    }
    format!("{input}s")
}

/// "An" for names starting with a vowel, "A" otherwise.
pub fn a_or_an(name: &str) -> &'static str {
    match name.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "An",
        _ => "A",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Bobs awesome organisation"), "bobs-awesome-organisation");
        assert_eq!(slugify("  A -- messy!! name "), "a-messy-name");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn pluralize_handles_common_endings() {
        assert_eq!(pluralize("todo"), "todos");
        assert_eq!(pluralize("company"), "companies");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("match"), "matches");
    }

    #[test]
    fn a_or_an_checks_leading_vowel() {
        assert_eq!(a_or_an("organisation"), "An");
        assert_eq!(a_or_an("todo"), "A");
    }

    #[test]
    fn case_conversions() {
        assert_eq!(title_case("user-profile"), "User Profile");
        assert_eq!(kebab_case("User Profile"), "user-profile");
    }
}
