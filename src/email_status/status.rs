use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Progress of an outgoing signup/login email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EmailStatus {
    Sending,
    Sent,
    Failed,
}

impl EmailStatus {
    /// Terminal statuses end the channel's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sending => "SENDING",
            Self::Sent => "SENT",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown email status '{0}', expected SENDING, SENT or FAILED")]
pub struct UnknownEmailStatus(pub String);

impl FromStr for EmailStatus {
    type Err = UnknownEmailStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SENDING" => Ok(Self::Sending),
            "SENT" => Ok(Self::Sent),
            "FAILED" => Ok(Self::Failed),
            _ => Err(UnknownEmailStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!EmailStatus::Sending.is_terminal());
        assert!(EmailStatus::Sent.is_terminal());
        assert!(EmailStatus::Failed.is_terminal());
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("sent".parse::<EmailStatus>(), Ok(EmailStatus::Sent));
        assert_eq!(" Failed ".parse::<EmailStatus>(), Ok(EmailStatus::Failed));
        assert!("bounced".parse::<EmailStatus>().is_err());
    }
}
