//! Shared validation utilities for identifiers across the codebase
//!
//! Agent ids, roles, block labels, tool names and capability tags all pass
//! through the same [`IdentifierRules`] so that a name accepted in one place is
//! accepted everywhere.

/// Validation rules for string identifiers
#[derive(Debug, Clone, Copy)]
pub struct IdentifierRules {
    /// Maximum allowed length in characters
    pub max_length: usize,
    /// Whether to allow dots (.) in the identifier
    pub allow_dots: bool,
    /// Whether to check for path traversal sequences (../ and ./)
    pub check_path_traversal: bool,
}

impl IdentifierRules {
    /// Rules for tool names
    ///
    /// - Max length: 64 characters
    /// - Allows: alphanumeric, `_`, `-`
    pub const TOOL_NAME: Self = Self {
        max_length: 64,
        allow_dots: false,
        check_path_traversal: true,
    };

    /// Rules for agent ids, roles, block labels and capability tags
    ///
    /// - Max length: 128 characters
    /// - Allows: alphanumeric, `_`, `-`, `.`
    pub const IDENTIFIER: Self = Self {
        max_length: 128,
        allow_dots: true,
        check_path_traversal: true,
    };

    /// Validate a string against these rules
    ///
    /// Identifiers are never trimmed: surrounding whitespace is an error
    /// rather than something silently repaired.
    pub fn validate(&self, input: &str) -> Result<String, ValidationError> {
        if input.is_empty() {
            return Err(ValidationError::Empty);
        }

        if input.trim().is_empty() {
            return Err(ValidationError::WhitespaceOnly);
        }

        if input != input.trim() {
            return Err(ValidationError::LeadingTrailingWhitespace);
        }

        let length = input.chars().count();
        if length > self.max_length {
            return Err(ValidationError::TooLong {
                length,
                max: self.max_length,
            });
        }

        if self.check_path_traversal && (input.contains("../") || input.contains("./")) {
            return Err(ValidationError::PathTraversal);
        }

        for ch in input.chars() {
            let is_valid =
                ch.is_alphanumeric() || ch == '_' || ch == '-' || (ch == '.' && self.allow_dots);

            if !is_valid {
                return Err(ValidationError::InvalidChar {
                    char: ch,
                    input: input.to_string(),
                });
            }
        }

        Ok(input.to_string())
    }
}

/// Errors that can occur during identifier validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Identifier is empty
    #[error("Identifier cannot be empty")]
    Empty,
    /// Identifier contains only whitespace
    #[error("Identifier cannot be whitespace-only")]
    WhitespaceOnly,
    /// Identifier has leading or trailing whitespace
    #[error("Identifier cannot have leading or trailing whitespace")]
    LeadingTrailingWhitespace,
    /// Identifier exceeds maximum allowed length
    #[error("Identifier too long: {length} characters (max {max})")]
    TooLong {
        /// Actual length
        length: usize,
        /// Maximum allowed length
        max: usize,
    },
    /// Identifier contains an invalid character
    #[error("Identifier '{input}' contains invalid character '{char}'")]
    InvalidChar {
        /// The invalid character
        char: char,
        /// The full input string
        input: String,
    },
    /// Identifier contains path traversal sequences
    #[error("Identifier cannot contain path traversal sequences (../)")]
    PathTraversal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_name_rules() {
        let rules = IdentifierRules::TOOL_NAME;

        assert!(rules.validate("update_user_tasks").is_ok());
        assert!(rules.validate("send-message").is_ok());
        assert!(rules.validate("Tool123").is_ok());

        assert!(matches!(rules.validate(""), Err(ValidationError::Empty)));
        assert!(matches!(
            rules.validate("   "),
            Err(ValidationError::WhitespaceOnly)
        ));
        assert!(matches!(
            rules.validate("tool with spaces"),
            Err(ValidationError::InvalidChar { .. })
        ));
        assert!(matches!(
            rules.validate("tool.name"),
            Err(ValidationError::InvalidChar { char: '.', .. })
        ));

        let long_name = "a".repeat(65);
        assert!(matches!(
            rules.validate(&long_name),
            Err(ValidationError::TooLong { length: 65, max: 64 })
        ));
    }

    #[test]
    fn test_identifier_rules() {
        let rules = IdentifierRules::IDENTIFIER;

        assert!(rules.validate("orchestrator").is_ok());
        assert!(rules.validate("task-domain").is_ok());
        assert!(rules.validate("agent.123").is_ok());

        assert!(matches!(
            rules.validate(" agent"),
            Err(ValidationError::LeadingTrailingWhitespace)
        ));
        assert!(matches!(
            rules.validate("agent:123"),
            Err(ValidationError::InvalidChar { char: ':', .. })
        ));
        assert!(matches!(
            rules.validate("../agent"),
            Err(ValidationError::PathTraversal)
        ));
    }
}
