//! Email address type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The input string is empty (after trimming).
    #[error("email is required")]
    Empty,
    /// The input string is too long.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input does not look like `local@domain.tld`.
    #[error("enter a valid email address")]
    Malformed,
}

/// A normalized email address.
///
/// Parsing trims surrounding whitespace and lowercases the input, so two
/// `Email` values compare equal whenever the addresses are equivalent. The
/// shape check is deliberately loose (the verification email is the real
/// proof of ownership): a non-empty local part, a domain containing a dot,
/// and no embedded whitespace.
///
/// ## Examples
///
/// ```
/// use copperleaf_core::Email;
///
/// let email = Email::parse("  Neo@Example.COM ").unwrap();
/// assert_eq!(email.as_str(), "neo@example.com");
///
/// assert!(Email::parse("").is_err());
/// assert!(Email::parse("no-at-symbol").is_err());
/// assert!(Email::parse("user@domain").is_err()); // no dot in domain
/// assert!(Email::parse("us er@example.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address.
    pub const MAX_LENGTH: usize = 255;

    /// Parse and normalize an `Email` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than 255 characters,
    /// or does not match the `local@domain.tld` shape.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let normalized = s.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(EmailError::Empty);
        }

        if normalized.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if normalized.chars().any(char::is_whitespace) {
            return Err(EmailError::Malformed);
        }

        let (local, domain) = normalized.split_once('@').ok_or(EmailError::Malformed)?;
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(EmailError::Malformed);
        }

        // The TLD check: domain must contain a dot with content on both sides.
        let (host, tld) = domain.rsplit_once('.').ok_or(EmailError::Malformed)?;
        if host.is_empty() || tld.is_empty() {
            return Err(EmailError::Malformed);
        }

        Ok(Self(normalized))
    }

    /// Borrow the normalized address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume self and return the normalized address.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// The part before the `@`.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or("")
    }

    /// The part after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split('@').nth(1).unwrap_or("")
    }

    /// Produce a privacy-preserving hint safe to show to a caller who has
    /// not proven ownership of the address.
    ///
    /// At most the first two characters of the local part are revealed,
    /// followed by asterisks and the full domain.
    ///
    /// ```
    /// use copperleaf_core::Email;
    ///
    /// let email = Email::parse("neo@example.com").unwrap();
    /// assert_eq!(email.masked(), "ne*@example.com");
    /// ```
    #[must_use]
    pub fn masked(&self) -> String {
        mask_email(&self.0)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Mask a raw email string, returning an empty string for malformed input.
///
/// Used by the storefront when masking addresses read back from the
/// database, where the value is a plain column rather than an [`Email`].
#[must_use]
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return String::new();
    };

    if local.is_empty() || domain.is_empty() {
        return String::new();
    }

    if local.chars().count() <= 2 {
        let first = local.chars().next().unwrap_or('*');
        return format!("{first}*@{domain}");
    }

    let shown: String = local.chars().take(2).collect();
    let hidden = local.chars().count().saturating_sub(2).max(1);
    format!("{shown}{}@{domain}", "*".repeat(hidden))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_emails() {
        assert!(Email::parse("user@example.com").is_ok());
        assert!(Email::parse("user.name+tag@example.co.uk").is_ok());
        assert!(Email::parse("a@b.c").is_ok());
    }

    #[test]
    fn test_parse_normalizes() {
        let email = Email::parse("  Neo@EXAMPLE.com ").unwrap();
        assert_eq!(email.as_str(), "neo@example.com");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Email::parse(""), Err(EmailError::Empty));
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            Email::parse(&long),
            Err(EmailError::TooLong { .. })
        ));
    }

    #[test]
    fn test_parse_malformed() {
        assert_eq!(Email::parse("no-at-symbol"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("@example.com"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("user@"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("user@domain"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("user@.com"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("user@domain."), Err(EmailError::Malformed));
        assert_eq!(Email::parse("us er@example.com"), Err(EmailError::Malformed));
        assert_eq!(Email::parse("a@b@c.com"), Err(EmailError::Malformed));
    }

    #[test]
    fn test_local_part_and_domain() {
        let email = Email::parse("user@example.com").unwrap();
        assert_eq!(email.local_part(), "user");
        assert_eq!(email.domain(), "example.com");
    }

    #[test]
    fn test_masked_long_local_part() {
        let email = Email::parse("neo.anderson@example.com").unwrap();
        let masked = email.masked();
        assert!(masked.starts_with("ne"));
        assert!(masked.ends_with("@example.com"));
        assert!(!masked.contains("anderson"));
        assert_eq!(masked, "ne**********@example.com");
    }

    #[test]
    fn test_masked_short_local_parts() {
        let two = Email::parse("ab@example.com").unwrap();
        assert_eq!(two.masked(), "a*@example.com");

        let one = Email::parse("a@example.com").unwrap();
        assert_eq!(one.masked(), "a*@example.com");
    }

    #[test]
    fn test_masked_three_char_local_part_hides_tail() {
        let email = Email::parse("abc@example.com").unwrap();
        assert_eq!(email.masked(), "ab*@example.com");
    }

    #[test]
    fn test_mask_email_malformed_is_empty() {
        assert_eq!(mask_email(""), "");
        assert_eq!(mask_email("not-an-email"), "");
        assert_eq!(mask_email("@example.com"), "");
        assert_eq!(mask_email("user@"), "");
    }

    #[test]
    fn test_serde_roundtrip() {
        let email = Email::parse("user@example.com").unwrap();
        let json = serde_json::to_string(&email).unwrap();
        assert_eq!(json, "\"user@example.com\"");

        let parsed: Email = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, email);
    }

    #[test]
    fn test_from_str() {
        let email: Email = "user@example.com".parse().unwrap();
        assert_eq!(email.as_str(), "user@example.com");
    }
}
