use crate::errors::ValidationError;

pub const DEFAULT_MAX_LENGTH: usize = 500;
pub const DEFAULT_BANNED_CHARS: &str = "![]<>@'\"/;";

// Denylist validator guarding the prompt template. Rejects rather than
// strips: a banned character fails the whole question.
#[derive(Debug, Clone)]
pub struct Validator {
    max_length: usize,
    banned: Vec<char>,
}

impl Validator {
    pub fn new(max_length: usize, banned_chars: &str) -> Self {
        Self {
            max_length,
            banned: banned_chars.chars().collect(),
        }
    }

    // Length check first, character check second, then trim
    pub fn sanitize(&self, input: &str) -> Result<String, ValidationError> {
        let length = input.chars().count();
        if length > self.max_length {
            return Err(ValidationError::TooLong {
                length,
                max: self.max_length,
            });
        }
        if let Some(found) = input.chars().find(|c| self.banned.contains(c)) {
            return Err(ValidationError::InvalidCharacters { found });
        }
        Ok(input.trim().to_string())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH, DEFAULT_BANNED_CHARS)
    }
}
