//! Destination address normalization.

use crate::errors::SessionError;

/// Domain suffix of individual accounts on the messaging network.
pub const MESSAGING_DOMAIN: &str = "c.us";

/// Normalize a human-entered phone number into a canonical chat address.
///
/// Every non-digit character is stripped and [`MESSAGING_DOMAIN`] is
/// appended: `"+62 812-3456"` becomes `"628123456@c.us"`.
pub fn normalize_address(raw: &str) -> Result<String, SessionError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(SessionError::invalid_input(
            "destination must contain at least one digit",
        ));
    }
    Ok(format!("{digits}@{MESSAGING_DOMAIN}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_punctuation_and_spaces() {
        assert_eq!(normalize_address("+62 812-3456").unwrap(), "628123456@c.us");
    }

    #[test]
    fn plain_digits_pass_through() {
        assert_eq!(normalize_address("15551234").unwrap(), "15551234@c.us");
    }

    #[test]
    fn no_digits_is_invalid() {
        assert!(matches!(
            normalize_address("call me"),
            Err(SessionError::InvalidInput(_))
        ));
        assert!(normalize_address("").is_err());
    }

    #[test]
    fn non_ascii_digits_are_dropped() {
        assert_eq!(normalize_address("٣12").unwrap(), "12@c.us");
    }

    proptest! {
        #[test]
        fn output_is_digits_then_domain(raw in ".*") {
            if let Ok(addr) = normalize_address(&raw) {
                let (local, domain) = addr.split_once('@').unwrap();
                prop_assert_eq!(domain, MESSAGING_DOMAIN);
                prop_assert!(!local.is_empty());
                prop_assert!(local.chars().all(|c| c.is_ascii_digit()));
            } else {
                prop_assert!(!raw.chars().any(|c| c.is_ascii_digit()));
            }
        }
    }
}
