use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const LOCAL_IDENTITY: &str = "local";
const MAX_IDENTITY_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity is empty")]
    Empty,
    #[error("identity exceeds {MAX_IDENTITY_LEN} characters")]
    TooLong,
    #[error("identity contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Stable key correlating every terminal a user opens with the browser
/// sign-in that completes for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionIdentity(String);

impl SessionIdentity {
    pub fn from_public_key(key_bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key_bytes);
        let digest = hasher.finalize();
        let mut output = String::with_capacity(digest.len() * 2);
        for byte in digest {
            output.push_str(&format!("{byte:02x}"));
        }
        Self(output)
    }

    pub fn local() -> Self {
        Self(LOCAL_IDENTITY.to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(IdentityError::Empty);
        }
        if raw == LOCAL_IDENTITY {
            return Ok(Self::local());
        }
        if raw.len() > MAX_IDENTITY_LEN {
            return Err(IdentityError::TooLong);
        }
        if let Some(bad) = raw
            .chars()
            .find(|ch| !matches!(ch, '0'..='9' | 'a'..='f'))
        {
            return Err(IdentityError::InvalidCharacter(bad));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines and the status bar.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionIdentity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionIdentity> for String {
    fn from(value: SessionIdentity) -> Self {
        value.0
    }
}

/// Signer issued by the identity provider once a browser sign-in completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub fid: u64,
    pub token: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
}

impl Credential {
    pub fn new(fid: u64, token: impl Into<String>) -> Self {
        Self {
            fid,
            token: token.into(),
            username: String::new(),
            display_name: String::new(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn label(&self) -> String {
        if self.username.is_empty() {
            format!("fid:{}", self.fid)
        } else {
            format!("@{}", self.username)
        }
    }
}
