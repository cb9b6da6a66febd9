//! Error types for clipforge-skills.

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during skill registration and pipeline compilation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A skill definition carries an ambiguous or missing generation rule,
    /// or violates a parameter invariant. Fatal to that registration only.
    #[error("malformed skill {name}: {message}")]
    MalformedSkill { name: String, message: String },

    /// A step referenced a skill that could not be resolved, even fuzzily.
    #[error("unknown skill: {name}{}", .suggestion.as_ref().map(|s| format!(" (closest match: {s})")).unwrap_or_default())]
    UnknownSkill {
        name: String,
        /// Best candidate that fell below the confidence threshold, if any.
        suggestion: Option<String>,
    },

    /// A required parameter was neither supplied nor defaulted.
    #[error("skill {skill} is missing required parameter {param}")]
    MissingRequiredParameter { skill: String, param: String },

    /// A skill's sub-pipeline includes itself, directly or transitively.
    #[error("skill {name} participates in a sub-pipeline cycle: {path}")]
    CyclicSkill { name: String, path: String },

    /// Invalid input provided to the composer.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a malformed skill error.
    pub fn malformed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedSkill {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an unknown skill error with no suggestion.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::UnknownSkill {
            name: name.into(),
            suggestion: None,
        }
    }

    /// Create a missing required parameter error.
    pub fn missing_param(skill: impl Into<String>, param: impl Into<String>) -> Self {
        Self::MissingRequiredParameter {
            skill: skill.into(),
            param: param.into(),
        }
    }

    /// Create a cyclic skill error from the traversal path.
    pub fn cyclic(name: impl Into<String>, path: &[String]) -> Self {
        Self::CyclicSkill {
            name: name.into(),
            path: path.join(" -> "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::malformed("overlay", "both template and pipeline present");
        assert_eq!(
            err.to_string(),
            "malformed skill overlay: both template and pipeline present"
        );

        let err = Error::unknown("xyzzyqux");
        assert_eq!(err.to_string(), "unknown skill: xyzzyqux");

        let err = Error::UnknownSkill {
            name: "color_balance".to_string(),
            suggestion: Some("colorbalance".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "unknown skill: color_balance (closest match: colorbalance)"
        );

        let err = Error::missing_param("crop", "width");
        assert_eq!(err.to_string(), "skill crop is missing required parameter width");

        let err = Error::cyclic("a", &["a".to_string(), "b".to_string(), "a".to_string()]);
        assert_eq!(
            err.to_string(),
            "skill a participates in a sub-pipeline cycle: a -> b -> a"
        );
    }
}
