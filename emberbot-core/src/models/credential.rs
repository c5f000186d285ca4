// emberbot-core/src/models/credential.rs

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The two identities the bot operates with. The owner identity authorizes
/// the EventSub subscriptions for the channel; the bot identity sends chat
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityRole {
    Owner,
    Bot,
}

impl IdentityRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityRole::Owner => "owner",
            IdentityRole::Bot => "bot",
        }
    }
}

impl fmt::Display for IdentityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(IdentityRole::Owner),
            "bot" => Ok(IdentityRole::Bot),
            other => Err(Error::Parse(format!("unknown identity role: {other}"))),
        }
    }
}

/// An OAuth access/refresh token pair for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}
