//! Replacement-password strength gate.
//!
//! The login pipeline consumes strength checking as a pass/fail signal plus
//! suggestions; the scoring algorithm behind it is replaceable. The shipped
//! [`BasicPasswordChecker`] applies simple length and character-class
//! heuristics.

/// Outcome of scoring a candidate password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordStrength {
    /// 0 (worst) to 4 (best).
    pub score: u8,
    pub is_too_low: bool,
    pub suggestions: Vec<String>,
}

pub trait PasswordChecker: Send + Sync {
    fn check(&self, password: &str) -> PasswordStrength;
}

/// Heuristic checker: scores on length and character variety, with a
/// minimum acceptable score of 2.
#[derive(Debug, Clone, Copy)]
pub struct BasicPasswordChecker {
    minimum_score: u8,
}

impl Default for BasicPasswordChecker {
    fn default() -> Self {
        Self { minimum_score: 2 }
    }
}

impl BasicPasswordChecker {
    pub fn new(minimum_score: u8) -> Self {
        Self { minimum_score }
    }
}

impl PasswordChecker for BasicPasswordChecker {
    fn check(&self, password: &str) -> PasswordStrength {
        let mut score: u8 = 0;
        let mut suggestions = Vec::new();

        if password.len() >= 8 {
            score += 1;
        } else {
            suggestions.push("Use at least 8 characters.".to_string());
        }
        if password.len() >= 12 {
            score += 1;
        }

        let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        let has_other = password.chars().any(|c| !c.is_ascii_alphanumeric());
        let class_count =
            has_lower as u8 + has_upper as u8 + has_digit as u8 + has_other as u8;
        if class_count >= 2 {
            score += 1;
        }
        if class_count >= 3 {
            score += 1;
        } else {
            suggestions.push("Mix upper case, digits, or punctuation into the password.".to_string());
        }

        PasswordStrength {
            score,
            is_too_low: score < self.minimum_score,
            suggestions,
        }
    }
}
