//! Auth error taxonomy.
//!
//! The managed identity provider reports failures as raw status codes
//! (`EMAIL_EXISTS`, `INVALID_PASSWORD`, ...). Each code maps to one stable,
//! caller-facing variant here; unmapped codes fall back to [`AuthError::Unknown`]
//! so a provider-side addition never leaks an opaque code to the UI.

/// Structured, user-facing authentication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    EmailInUse,
    InvalidEmail,
    WeakPassword,
    UserDisabled,
    UserNotFound,
    WrongPassword,
    InvalidCredential,
    RateLimited,
    NetworkError,
    Unknown,
}

impl AuthError {
    /// Map a raw provider status code to its variant.
    ///
    /// Some codes arrive with a trailing explanation
    /// (`"WEAK_PASSWORD : Password should be at least 6 characters"`);
    /// only the leading token is significant.
    pub fn from_provider_code(code: &str) -> Self {
        let code = code
            .split([' ', ':'])
            .next()
            .unwrap_or_default()
            .trim();

        match code {
            "EMAIL_EXISTS" => Self::EmailInUse,
            "INVALID_EMAIL" => Self::InvalidEmail,
            "WEAK_PASSWORD" => Self::WeakPassword,
            "USER_DISABLED" => Self::UserDisabled,
            "EMAIL_NOT_FOUND" => Self::UserNotFound,
            "INVALID_PASSWORD" => Self::WrongPassword,
            "INVALID_LOGIN_CREDENTIALS" => Self::InvalidCredential,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::RateLimited,
            _ => Self::Unknown,
        }
    }

    /// The stable message shown to the user.
    pub fn message(&self) -> &'static str {
        match self {
            Self::EmailInUse => "This email is already registered",
            Self::InvalidEmail => "Invalid email address",
            Self::WeakPassword => "Password should be at least 6 characters",
            Self::UserDisabled => "This account has been disabled",
            Self::UserNotFound => "No account found with this email",
            Self::WrongPassword => "Incorrect password",
            Self::InvalidCredential => "Invalid email or password",
            Self::RateLimited => "Too many failed attempts. Please try again later",
            Self::NetworkError => "Network error. Please check your connection",
            Self::Unknown => "Authentication failed. Please try again",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_known_code_maps() {
        let cases = [
            ("EMAIL_EXISTS", AuthError::EmailInUse),
            ("INVALID_EMAIL", AuthError::InvalidEmail),
            ("WEAK_PASSWORD", AuthError::WeakPassword),
            ("USER_DISABLED", AuthError::UserDisabled),
            ("EMAIL_NOT_FOUND", AuthError::UserNotFound),
            ("INVALID_PASSWORD", AuthError::WrongPassword),
            ("INVALID_LOGIN_CREDENTIALS", AuthError::InvalidCredential),
            ("TOO_MANY_ATTEMPTS_TRY_LATER", AuthError::RateLimited),
        ];
        for (code, expected) in cases {
            assert_eq!(AuthError::from_provider_code(code), expected, "{code}");
        }
    }

    #[test]
    fn test_code_with_explanation_suffix() {
        assert_eq!(
            AuthError::from_provider_code("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthError::WeakPassword
        );
    }

    #[test]
    fn test_unmapped_code_falls_back_to_unknown() {
        assert_eq!(AuthError::from_provider_code("OPERATION_NOT_ALLOWED"), AuthError::Unknown);
        assert_eq!(AuthError::from_provider_code(""), AuthError::Unknown);
        assert_eq!(AuthError::from_provider_code("SOMETHING_NEW"), AuthError::Unknown);
    }

    #[test]
    fn test_messages_are_stable() {
        assert_eq!(AuthError::UserNotFound.message(), "No account found with this email");
        assert_eq!(AuthError::Unknown.message(), "Authentication failed. Please try again");
    }
}
