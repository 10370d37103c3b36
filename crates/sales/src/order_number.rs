use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult};

const PREFIX: &str = "DC";
const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Human-facing order reference, e.g. `DC41234567K9QZ`.
///
/// `DC` + last 8 digits of the epoch millis + 4 random base-36 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn generate(now: DateTime<Utc>, rng: &mut impl Rng) -> Self {
        let millis = now.timestamp_millis().rem_euclid(100_000_000);
        let suffix: String = (0..4).map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char).collect();
        Self(format!("{PREFIX}{millis:08}{suffix}"))
    }

    /// Normalize user input (trim + upper-case) for lookups.
    pub fn parse(input: &str) -> DomainResult<Self> {
        let s = input.trim().to_ascii_uppercase();
        if s.is_empty() {
            return Err(DomainError::required("order number"));
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::validation("order number must be alphanumeric"));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn format_is_prefix_millis_and_suffix() {
        let now = Utc.timestamp_millis_opt(1_736_141_234_567).unwrap();
        let n = OrderNumber::generate(now, &mut StdRng::seed_from_u64(7));

        assert_eq!(n.as_str().len(), 14);
        assert!(n.as_str().starts_with("DC41234567"));
        assert!(n.as_str()[10..].chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn short_epochs_are_zero_padded() {
        let now = Utc.timestamp_millis_opt(42).unwrap();
        let n = OrderNumber::generate(now, &mut StdRng::seed_from_u64(1));
        assert!(n.as_str().starts_with("DC00000042"));
    }

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        assert_eq!(OrderNumber::parse("  dc4123abcd ").unwrap().as_str(), "DC4123ABCD");
        assert!(OrderNumber::parse("   ").is_err());
        assert!(OrderNumber::parse("DC-1").is_err());
    }
}
