/// Derive a URL slug: lowercase ASCII alphanumeric runs joined by `-`.
///
/// `"Chicken Biryani (Full)"` becomes `"chicken-biryani-full"`. Returns an
/// empty string when the input has no ASCII alphanumerics.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn collapses_punctuation_and_spaces() {
        assert_eq!(slugify("Chicken Biryani (Full)"), "chicken-biryani-full");
        assert_eq!(slugify("  --Beef   Kala Bhuna-- "), "beef-kala-bhuna");
        assert_eq!(slugify("ফুচকা"), "");
    }

    proptest! {
        #[test]
        fn output_is_url_safe(s in ".{0,64}") {
            let slug = slugify(&s);
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
        }

        #[test]
        fn is_idempotent(s in "[A-Za-z0-9 _.-]{0,40}") {
            let once = slugify(&s);
            prop_assert_eq!(slugify(&once), once.clone());
        }
    }
}
