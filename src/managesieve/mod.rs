//! ManageSieve (RFC 5804) client
//!
//! The deployment talks to the mail server through two traits:
//!
//! - [Connector] opens and authenticates a session from a [DeploymentConfig]
//! - [SieveSession] exposes the script operations of an open session
//!
//! Operations that the server can refuse (`check_script`, `put_script`,
//! `set_active`) report refusal as `Ok(false)`; only transport failures and
//! protocol violations are errors. Deciding what a refusal means is up to
//! the caller.
//!
//! - [client::TcpConnector]: real sessions over TCP, optionally STARTTLS
//! - [mock::MockConnector]: scripted sessions for testing

pub mod auth;
pub mod client;
pub mod mock;
pub mod response;
pub mod tls;

pub use auth::Mechanism;
pub use client::{Client, TcpConnector, Transport};
pub use mock::{MockConnector, MockSession, SessionCall};

use std::collections::HashMap;
use std::fmt;

use crate::config::DeploymentConfig;
use crate::error::ProtocolError;
use response::Token;

/// An open, authenticated session
pub trait SieveSession {
    /// Scripts stored for the account
    fn list_scripts(&mut self) -> Result<Vec<ScriptEntry>, ProtocolError>;

    /// Asks the server to validate `content` without storing it
    fn check_script(&mut self, content: &[u8]) -> Result<bool, ProtocolError>;

    /// Stores `content` under `name`, replacing any script of that name
    fn put_script(&mut self, name: &str, content: &[u8]) -> Result<bool, ProtocolError>;

    /// Makes `name` the active script
    fn set_active(&mut self, name: &str) -> Result<bool, ProtocolError>;

    /// Ends the session politely
    fn logout(&mut self) -> Result<(), ProtocolError>;
}

/// Opens sessions to the configured server
pub trait Connector {
    type Session: SieveSession;

    /// Connect, upgrade to TLS if configured, and authenticate
    ///
    /// # Errors
    /// * `ProtocolError::LoginFailed` - authentication (including STARTTLS) failed
    /// * `ProtocolError::Connect` - the server could not be reached
    fn connect(&self, config: &DeploymentConfig) -> Result<Self::Session, ProtocolError>;
}

/// One script as reported by LISTSCRIPTS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    pub name: String,
    pub active: bool,
}

impl ScriptEntry {
    pub fn new(name: impl Into<String>, active: bool) -> Self {
        ScriptEntry {
            name: name.into(),
            active,
        }
    }

    fn from_tokens(tokens: &[Token]) -> Option<Self> {
        let name = tokens.first()?.text()?;
        let active = tokens[1..]
            .iter()
            .any(|token| matches!(token, Token::Atom(atom) if atom.eq_ignore_ascii_case("ACTIVE")));
        Some(ScriptEntry { name, active })
    }
}

impl fmt::Display for ScriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.active {
            write!(f, "{} (active)", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Server capabilities, keyed by upper-cased name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    entries: HashMap<String, Option<String>>,
}

impl Capabilities {
    fn from_lines(lines: &[Vec<Token>]) -> Self {
        let entries = lines
            .iter()
            .filter_map(|tokens| {
                let name = tokens.first()?.text()?.to_ascii_uppercase();
                let value = tokens.get(1).and_then(Token::text);
                Some((name, value))
            })
            .collect();
        Capabilities { entries }
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_uppercase())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_uppercase())
            .and_then(|value| value.as_deref())
    }

    /// Mechanisms listed in the SASL capability, in server order
    pub fn sasl_mechanisms(&self) -> Vec<String> {
        self.get("SASL")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
