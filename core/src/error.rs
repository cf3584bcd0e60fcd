//! Error taxonomy for parsing, validation and execution.
//!
//! Every failure the framework can produce is a variant of [`Error`]. Each
//! variant carries the structured context an error renderer needs (the
//! offending element, the raw token, the nested value error), and maps onto the
//! closed [`ErrorKind`] set through [`Error::kind`]. The `Display` impls are the
//! built-in English messages; a custom [`ErrorRenderer`](crate::ErrorRenderer)
//! can key its own messages off [`ErrorKind::key`] instead.

use std::fmt;

use thiserror::Error;

use crate::value::Radix;

/// Boxed error returned by user callbacks (validators and actions).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// What kind of declared element an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Flag,
    Argument,
    Command,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Flag => "flag",
            Self::Argument => "argument",
            Self::Command => "command",
        })
    }
}

/// Closed set of failure kinds.
///
/// Renderers and tests match on this instead of on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownElement,
    UnknownArgument,
    UnexpectedToken,
    DuplicateLongFlag,
    DuplicateShortFlag,
    UnexpectedFlagValue,
    FlagAlreadySet,
    InvalidBool,
    UnknownChoiceValue,
    NoHintsDeclared,
    InvalidEmail,
    InvalidFilePattern,
    NoMatchingFile,
    InvalidTimestamp,
    InvalidDuration,
    InvalidIp,
    InvalidInteger,
    MissingRequiredFlag,
    MissingRequiredArg,
    FlagsArgsFromMultipleGroups,
    NoUniqueFlagArgCommandInGroup,
    CommandRequired,
    ValidatorFailed,
    ActionFailed,
    InvalidDeclaration,
}

impl ErrorKind {
    /// Stable identifier for message catalogs.
    ///
    /// # Examples
    ///
    /// ```
    /// use cmdtree_core::ErrorKind;
    ///
    /// assert_eq!(ErrorKind::CommandRequired.key(), "CommandRequired");
    /// ```
    pub fn key(self) -> &'static str {
        match self {
            Self::UnknownElement => "UnknownElement",
            Self::UnknownArgument => "UnknownArgument",
            Self::UnexpectedToken => "UnexpectedToken",
            Self::DuplicateLongFlag => "DuplicateLongFlag",
            Self::DuplicateShortFlag => "DuplicateShortFlag",
            Self::UnexpectedFlagValue => "UnexpectedFlagValue",
            Self::FlagAlreadySet => "FlagAlreadySet",
            Self::InvalidBool => "InvalidBool",
            Self::UnknownChoiceValue => "UnknownChoiceValue",
            Self::NoHintsDeclared => "NoHintsDeclared",
            Self::InvalidEmail => "InvalidEmail",
            Self::InvalidFilePattern => "InvalidFilePattern",
            Self::NoMatchingFile => "NoMatchingFile",
            Self::InvalidTimestamp => "InvalidTimestamp",
            Self::InvalidDuration => "InvalidDuration",
            Self::InvalidIp => "InvalidIp",
            Self::InvalidInteger => "InvalidInteger",
            Self::MissingRequiredFlag => "MissingRequiredFlag",
            Self::MissingRequiredArg => "MissingRequiredArg",
            Self::FlagsArgsFromMultipleGroups => "FlagsArgsFromMultipleGroups",
            Self::NoUniqueFlagArgCommandInGroup => "NoUniqueFlagArgCommandInGroup",
            Self::CommandRequired => "CommandRequired",
            Self::ValidatorFailed => "ValidatorFailed",
            Self::ActionFailed => "ActionFailed",
            Self::InvalidDeclaration => "InvalidDeclaration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Failure to convert a raw string into a value of a declared kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("'{0}' is not a boolean")]
    InvalidBool(String),

    #[error("unsupported value '{value}', expected one of: {}", .hints.join(", "))]
    UnknownChoice { value: String, hints: Vec<String> },

    #[error("no hints declared to choose from")]
    NoHints,

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("no file matches '{0}'")]
    NoSuchFile(String),

    #[error("'{0}' does not match any supported timestamp layout")]
    InvalidTimestamp(String),

    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("'{0}' is not a valid IP address")]
    InvalidIp(String),

    #[error("'{value}' is not a valid {radix} integer")]
    InvalidInteger { value: String, radix: Radix },
}

impl ValueError {
    /// Maps the value failure onto the error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidBool(_) => ErrorKind::InvalidBool,
            Self::UnknownChoice { .. } => ErrorKind::UnknownChoiceValue,
            Self::NoHints => ErrorKind::NoHintsDeclared,
            Self::InvalidEmail(_) => ErrorKind::InvalidEmail,
            Self::InvalidPattern { .. } => ErrorKind::InvalidFilePattern,
            Self::NoSuchFile(_) => ErrorKind::NoMatchingFile,
            Self::InvalidTimestamp(_) => ErrorKind::InvalidTimestamp,
            Self::InvalidDuration { .. } => ErrorKind::InvalidDuration,
            Self::InvalidIp(_) => ErrorKind::InvalidIp,
            Self::InvalidInteger { .. } => ErrorKind::InvalidInteger,
        }
    }
}

/// Structural problems in a declared command tree, found at init.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("command name cannot be empty (under '{parent}')")]
    EmptyCommandName { parent: String },

    #[error("{element} name cannot be empty (in command '{command}')")]
    EmptyElementName {
        element: ElementType,
        command: String,
    },

    #[error("duplicate sub-command name or alias '{name}' under '{command}'")]
    DuplicateSubcommand { command: String, name: String },

    #[error("cumulative argument <{arg}> must be the last argument of '{command}'")]
    CumulativeArgNotLast { command: String, arg: String },
}

/// Any failure produced while parsing, validating or executing a command line.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown {element} {name}")]
    UnknownElement { element: ElementType, name: String },

    #[error("unexpected argument '{token}'")]
    UnknownArgument { token: String },

    #[error("expected command but got '{token}'")]
    UnexpectedToken { token: String },

    #[error("flag --{name} already exists")]
    DuplicateLongFlag { name: String },

    #[error("flag -{short} already exists (while adding --{name})")]
    DuplicateShortFlag { short: char, name: String },

    #[error("expected a value for flag {}", flag_label(.name, .short))]
    MissingFlagValue { name: String, short: Option<char> },

    #[error("flag --{name} has already been set; it is not cumulative and can only appear once")]
    FlagAlreadySet { name: String },

    #[error("invalid value '{value}' for {element} {name}: {source}")]
    InvalidValue {
        element: ElementType,
        name: String,
        value: String,
        #[source]
        source: ValueError,
    },

    #[error("required flag {} is missing", flag_label(.name, .short))]
    MissingRequiredFlag { name: String, short: Option<char> },

    #[error("required argument <{placeholder}> is missing")]
    MissingRequiredArg { name: String, placeholder: String },

    #[error("either {first} or {second} can be specified, but not both")]
    FlagsArgsFromMultipleGroups { first: String, second: String },

    #[error("must specify a flag, argument or command; try --help")]
    NoUniqueFlagArgCommandInGroup,

    #[error("a sub-command is required after '{command}'; try --help")]
    CommandRequired { command: String },

    #[error("{element} {name} is invalid: {source}")]
    ValidatorFailed {
        element: ElementType,
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("command '{command}' failed: {source}")]
    ActionFailed {
        command: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid declaration: {0}")]
    Declaration(#[from] DeclarationError),
}

impl Error {
    /// Maps the error onto the closed taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownElement { .. } => ErrorKind::UnknownElement,
            Self::UnknownArgument { .. } => ErrorKind::UnknownArgument,
            Self::UnexpectedToken { .. } => ErrorKind::UnexpectedToken,
            Self::DuplicateLongFlag { .. } => ErrorKind::DuplicateLongFlag,
            Self::DuplicateShortFlag { .. } => ErrorKind::DuplicateShortFlag,
            Self::MissingFlagValue { .. } => ErrorKind::UnexpectedFlagValue,
            Self::FlagAlreadySet { .. } => ErrorKind::FlagAlreadySet,
            Self::InvalidValue { source, .. } => source.kind(),
            Self::MissingRequiredFlag { .. } => ErrorKind::MissingRequiredFlag,
            Self::MissingRequiredArg { .. } => ErrorKind::MissingRequiredArg,
            Self::FlagsArgsFromMultipleGroups { .. } => ErrorKind::FlagsArgsFromMultipleGroups,
            Self::NoUniqueFlagArgCommandInGroup => ErrorKind::NoUniqueFlagArgCommandInGroup,
            Self::CommandRequired { .. } => ErrorKind::CommandRequired,
            Self::ValidatorFailed { .. } => ErrorKind::ValidatorFailed,
            Self::ActionFailed { .. } => ErrorKind::ActionFailed,
            Self::Declaration(_) => ErrorKind::InvalidDeclaration,
        }
    }

    /// Unwraps a callback error, passing framework errors through unchanged.
    pub(crate) fn from_callback(err: BoxError, wrap: impl FnOnce(BoxError) -> Error) -> Error {
        match err.downcast::<Error>() {
            Ok(inner) => *inner,
            Err(other) => wrap(other),
        }
    }
}

fn flag_label(name: &str, short: &Option<char>) -> String {
    match short {
        Some(c) => format!("--{name} (-{c})"),
        None => format!("--{name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_kind_follows_value_error() {
        let err = Error::InvalidValue {
            element: ElementType::Flag,
            name: "output".to_string(),
            value: "xml".to_string(),
            source: ValueError::UnknownChoice {
                value: "xml".to_string(),
                hints: vec!["json".to_string(), "yaml".to_string()],
            },
        };
        assert_eq!(err.kind(), ErrorKind::UnknownChoiceValue);
        assert!(err.to_string().contains("expected one of: json, yaml"));
    }

    #[test]
    fn test_flag_label_includes_short_form() {
        let err = Error::MissingRequiredFlag {
            name: "filename".to_string(),
            short: Some('f'),
        };
        assert_eq!(err.to_string(), "required flag --filename (-f) is missing");
    }

    #[test]
    fn test_from_callback_passes_framework_errors_through() {
        let boxed: BoxError = Box::new(Error::NoUniqueFlagArgCommandInGroup);
        let err = Error::from_callback(boxed, |source| Error::ActionFailed {
            command: "app".to_string(),
            source,
        });
        assert_eq!(err.kind(), ErrorKind::NoUniqueFlagArgCommandInGroup);

        let boxed: BoxError = "disk full".into();
        let err = Error::from_callback(boxed, |source| Error::ActionFailed {
            command: "app".to_string(),
            source,
        });
        assert_eq!(err.kind(), ErrorKind::ActionFailed);
        assert_eq!(err.to_string(), "command 'app' failed: disk full");
    }
}
