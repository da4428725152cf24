//! Shared error for the `FromStr` impls the store layer uses to decode
//! `TEXT` columns into domain enums.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub type_name: &'static str,
    pub value: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not a valid {}", self.value, self.type_name)
    }
}

impl std::error::Error for ParseEnumError {}
