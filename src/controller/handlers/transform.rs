//! Output transformations for plain secrets.

use super::HandlerError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::str::FromStr;

/// One transformation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Strip leading and trailing whitespace
    Trim,
    /// Base64 encode the value
    Base64Encode,
    /// Base64 decode the value
    Base64Decode,
}

impl Transform {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trim => "trim",
            Self::Base64Encode => "base64encode",
            Self::Base64Decode => "base64decode",
        }
    }

    fn apply(self, value: Vec<u8>) -> Result<Vec<u8>, HandlerError> {
        match self {
            Self::Trim => Ok(value.trim_ascii().to_vec()),
            Self::Base64Encode => Ok(STANDARD.encode(&value).into_bytes()),
            Self::Base64Decode => {
                STANDARD
                    .decode(value.trim_ascii())
                    .map_err(|e| HandlerError::TransformFailed {
                        transform: self.as_str(),
                        reason: e.to_string(),
                    })
            }
        }
    }
}

impl FromStr for Transform {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trim" => Ok(Self::Trim),
            "base64encode" => Ok(Self::Base64Encode),
            "base64decode" => Ok(Self::Base64Decode),
            _ => Err(HandlerError::UnsupportedTransform(s.to_string())),
        }
    }
}

/// Ordered list of transformations, validated up front
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transformations(Vec<Transform>);

impl Transformations {
    /// Parse every requested transformation; the first unsupported one is an error
    ///
    /// # Errors
    /// [`HandlerError::UnsupportedTransform`]
    pub fn parse(names: &[String]) -> Result<Self, HandlerError> {
        names
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Apply every transformation in order
    ///
    /// # Errors
    /// [`HandlerError::TransformFailed`] when a step cannot process the value
    pub fn apply(&self, value: Vec<u8>) -> Result<Vec<u8>, HandlerError> {
        self.0.iter().try_fold(value, |value, step| step.apply(value))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
