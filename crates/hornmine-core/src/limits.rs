//! Input validation limits for search bounds and resource protection

/// Maximum length for entity and predicate names (2048 bytes, long IRIs included)
pub const MAX_ENTITY_NAME_LEN: usize = 2048;

/// Maximum number of body atoms in a mined rule (6)
pub const MAX_RULE_LENGTH: usize = 6;

/// Default number of body atoms in a mined rule (3)
pub const DEFAULT_MAX_RULE_LENGTH: usize = 3;

/// Default cap on instantiations per rule (1000)
pub const DEFAULT_MAX_INSTANTIATIONS: usize = 1000;

/// Default per-operation timeout in seconds (10 minutes)
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Maximum fresh variables in a single rule body
pub const MAX_FRESH_VARS: usize = MAX_RULE_LENGTH;

/// Validation error type
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyName,
    NameTooLong { len: usize, max: usize },
    ReservedCharacter { name: String },
    RuleLengthOutOfRange { len: usize, max: usize },
    ZeroLimit { what: &'static str },
    DisconnectedRule { rule: String },
    EmptyRuleBody,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Name cannot be empty"),
            Self::NameTooLong { len, max } => {
                write!(f, "Name too long: {} bytes (max {})", len, max)
            }
            Self::ReservedCharacter { name } => {
                write!(f, "Name contains a tab or newline: {:?}", name)
            }
            Self::RuleLengthOutOfRange { len, max } => {
                write!(f, "Max rule length must be between 1 and {} (got {})", max, len)
            }
            Self::ZeroLimit { what } => write!(f, "{} must be greater than zero", what),
            Self::DisconnectedRule { rule } => {
                write!(f, "Rule body is not a connected subject-object path: {}", rule)
            }
            Self::EmptyRuleBody => write!(f, "Rule body cannot be empty"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate an entity or predicate name.
///
/// Tabs and newlines are rejected because the example cache and the fact
/// import format are tab-separated.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.len() > MAX_ENTITY_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            len: name.len(),
            max: MAX_ENTITY_NAME_LEN,
        });
    }
    if name.contains(['\t', '\n', '\r']) {
        return Err(ValidationError::ReservedCharacter {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Validate a maximum rule length
pub fn validate_max_rule_length(len: usize) -> Result<(), ValidationError> {
    if len == 0 || len > MAX_RULE_LENGTH {
        return Err(ValidationError::RuleLengthOutOfRange {
            len,
            max: MAX_RULE_LENGTH,
        });
    }
    Ok(())
}

/// Validate that a count-style limit is positive
pub fn validate_positive(value: usize, what: &'static str) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::ZeroLimit { what });
    }
    Ok(())
}
