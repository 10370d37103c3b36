use serde::{Deserialize, Serialize};

use storefront_core::UserId;

/// Who the assistant is talking to. Built from the verified session, never
/// from model output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContext {
    pub user_id: Option<UserId>,
    pub user_name: Option<String>,
    pub user_phone: Option<String>,
    pub user_email: Option<String>,
}

impl ChatContext {
    pub fn guest() -> Self {
        Self::default()
    }

    pub fn is_logged_in(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn has_phone(&self) -> bool {
        self.user_phone.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Bn,
}

impl Locale {
    /// Anything other than `bn` falls back to English.
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(str::trim) {
            Some(l) if l.eq_ignore_ascii_case("bn") || l.to_ascii_lowercase().starts_with("bn-") => Locale::Bn,
            _ => Locale::En,
        }
    }

    pub fn is_bengali(self) -> bool {
        self == Locale::Bn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_parsing_defaults_to_english() {
        assert_eq!(Locale::parse(Some("bn")), Locale::Bn);
        assert_eq!(Locale::parse(Some("bn-BD")), Locale::Bn);
        assert_eq!(Locale::parse(Some("fr")), Locale::En);
        assert_eq!(Locale::parse(None), Locale::En);
    }

    #[test]
    fn phone_must_be_non_blank() {
        let ctx = ChatContext { user_phone: Some("  ".into()), ..ChatContext::guest() };
        assert!(!ctx.has_phone());
        assert!(!ctx.is_logged_in());
    }
}
