//! Git credential helper protocol.
//!
//! Git runs `git-credential-mailkey <operation>`, writes `key=value` lines on
//! stdin terminated by a blank line, and reads `key=value` lines back from
//! stdout. Only `get` produces output: exactly one `password=` line.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use crate::error::MailkeyError;
use crate::manager::{CredentialError, CredentialStatus};
use crate::store::Secret;

/// Process exit status for a successful operation.
pub const EXIT_SUCCESS: u8 = 0;
/// Process exit status for any fatal condition.
pub const EXIT_FAILURE: u8 = 1;

/// The operation git asks the helper to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GitOperation {
    #[default]
    Get,
    Store,
    Erase,
}

impl FromStr for GitOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(GitOperation::Get),
            "store" => Ok(GitOperation::Store),
            "erase" => Ok(GitOperation::Erase),
            other => Err(format!("unknown credential operation: {other}")),
        }
    }
}

impl fmt::Display for GitOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GitOperation::Get => "get",
            GitOperation::Store => "store",
            GitOperation::Erase => "erase",
        })
    }
}

/// Attributes git sends describing the credential it wants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRequest {
    attributes: BTreeMap<String, String>,
}

impl CredentialRequest {
    /// Read `key=value` lines until a blank line or end of input.
    ///
    /// Lines without `=` are ignored. A repeated key keeps its last value.
    pub fn read_from<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut attributes = BTreeMap::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                break;
            }
            if let Some((key, value)) = line.split_once('=') {
                attributes.insert(key.to_string(), value.to_string());
            }
        }
        Ok(Self { attributes })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn protocol(&self) -> Option<&str> {
        self.get("protocol")
    }

    pub fn host(&self) -> Option<&str> {
        self.get("host")
    }

    pub fn username(&self) -> Option<&str> {
        self.get("username")
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// The single line emitted for a successful `get`.
pub fn password_line(access_token: &Secret) -> String {
    format!("password={}", access_token.expose())
}

/// Write the password line and flush.
pub fn write_password<W: Write>(mut out: W, access_token: &Secret) -> io::Result<()> {
    writeln!(out, "{}", password_line(access_token))?;
    out.flush()
}

/// Human-readable lines describing a [`CredentialStatus`].
pub fn status_lines(status: &CredentialStatus) -> Vec<String> {
    let client = match (status.builtin, status.custom) {
        (Some(builtin), false) => format!("{builtin} (default)"),
        (Some(builtin), true) => format!("{builtin} (configured)"),
        (None, _) => "custom".to_string(),
    };
    vec![
        format!("client: {client}"),
        format!("client_id: {}", status.identity.client_id),
        format!("redirect_uri: {}", status.identity.redirect_uri),
        format!(
            "refresh token: {}",
            if status.authenticated { "stored" } else { "absent" }
        ),
    ]
}

/// Diagnostic message for a failed operation.
pub fn failure_message(error: &MailkeyError) -> String {
    match error {
        MailkeyError::Credential(CredentialError::NotAuthenticated) => {
            "No token to delete".to_string()
        }
        other => other.to_string(),
    }
}

/// Exit status for a failed operation. Every failure is fatal.
pub fn exit_code(_error: &MailkeyError) -> u8 {
    EXIT_FAILURE
}
