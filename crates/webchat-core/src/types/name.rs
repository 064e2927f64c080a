//! Validated string newtypes for nicknames and room names.
//!
//! Both are keys compared by exact string equality. A nick is opaque: any
//! non-empty string is accepted as-is, so `"alice"` and `"alice "` are
//! distinct. Room names come from whitespace-separated user input, so
//! they are trimmed and must be non-empty, free of embedded whitespace,
//! and at most [`MAX_NAME_LEN`] characters.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Maximum length of a room name, in characters.
pub const MAX_NAME_LEN: usize = 64;

/// Macro to define a validated string newtype.
macro_rules! define_name {
    (
        $(#[$meta:meta])*
        $name:ident, $validate:path
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a name.
            pub fn parse(raw: &str) -> Result<Self, AppError> {
                $validate(raw).map(|s| Self(s.to_string()))
            }

            /// Return the name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = AppError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(name: $name) -> String {
                name.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_name!(
    /// Nickname identifying a connected chat participant.
    Nick, validate_nick
);

define_name!(
    /// Name of a chat room.
    RoomName, validate_room
);

fn validate_nick(raw: &str) -> Result<&str, AppError> {
    if raw.is_empty() {
        return Err(AppError::validation("nick must not be empty"));
    }
    Ok(raw)
}

fn validate_room(raw: &str) -> Result<&str, AppError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(AppError::validation("room name must not be empty"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(AppError::validation(format!(
            "room name '{trimmed}' must not contain whitespace"
        )));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "room name must be at most {MAX_NAME_LEN} characters"
        )));
    }

    Ok(trimmed)
}
