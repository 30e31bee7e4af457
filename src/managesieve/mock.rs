use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::config::DeploymentConfig;
use crate::error::ProtocolError;
use crate::managesieve::{Connector, ScriptEntry, SieveSession};

/// A call made on a [MockSession]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    ListScripts,
    CheckScript(Vec<u8>),
    PutScript(String, Vec<u8>),
    SetActive(String),
    Logout,
}

/// Mock connector for testing without a mail server
///
/// Every operation succeeds unless told otherwise. Sessions share the
/// connector's call log so tests can inspect what the orchestrator did.
#[derive(Debug, Clone)]
pub struct MockConnector {
    scripts: Vec<ScriptEntry>,
    accept_login: bool,
    check_ok: bool,
    put_ok: bool,
    activate_ok: bool,
    listing_fails: bool,
    calls: Rc<RefCell<Vec<SessionCall>>>,
    connects: Rc<Cell<usize>>,
}

impl MockConnector {
    pub fn new() -> Self {
        MockConnector {
            scripts: Vec::new(),
            accept_login: true,
            check_ok: true,
            put_ok: true,
            activate_ok: true,
            listing_fails: false,
            calls: Rc::new(RefCell::new(Vec::new())),
            connects: Rc::new(Cell::new(0)),
        }
    }

    /// Scripts reported by LISTSCRIPTS
    pub fn with_scripts(mut self, scripts: Vec<ScriptEntry>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn reject_login(mut self) -> Self {
        self.accept_login = false;
        self
    }

    pub fn reject_check(mut self) -> Self {
        self.check_ok = false;
        self
    }

    pub fn reject_put(mut self) -> Self {
        self.put_ok = false;
        self
    }

    pub fn reject_activate(mut self) -> Self {
        self.activate_ok = false;
        self
    }

    /// Make LISTSCRIPTS fail with a protocol error
    pub fn fail_listing(mut self) -> Self {
        self.listing_fails = true;
        self
    }

    /// Every session call made so far, in order
    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.borrow().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.get()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MockConnector {
    type Session = MockSession;

    fn connect(&self, config: &DeploymentConfig) -> Result<MockSession, ProtocolError> {
        self.connects.set(self.connects.get() + 1);
        if !self.accept_login {
            return Err(ProtocolError::LoginFailed {
                user: config.user.clone(),
                host: config.host.clone(),
                starttls: config.use_starttls,
                authmech: config.auth_mech.clone(),
            });
        }
        Ok(MockSession {
            connector: self.clone(),
        })
    }
}

/// Session handed out by [MockConnector]
pub struct MockSession {
    connector: MockConnector,
}

impl MockSession {
    fn record(&self, call: SessionCall) {
        self.connector.calls.borrow_mut().push(call);
    }
}

impl SieveSession for MockSession {
    fn list_scripts(&mut self) -> Result<Vec<ScriptEntry>, ProtocolError> {
        self.record(SessionCall::ListScripts);
        if self.connector.listing_fails {
            return Err(ProtocolError::Rejected {
                command: "LISTSCRIPTS".to_string(),
                reason: "mock failure".to_string(),
            });
        }
        Ok(self.connector.scripts.clone())
    }

    fn check_script(&mut self, content: &[u8]) -> Result<bool, ProtocolError> {
        self.record(SessionCall::CheckScript(content.to_vec()));
        Ok(self.connector.check_ok)
    }

    fn put_script(&mut self, name: &str, content: &[u8]) -> Result<bool, ProtocolError> {
        self.record(SessionCall::PutScript(name.to_string(), content.to_vec()));
        Ok(self.connector.put_ok)
    }

    fn set_active(&mut self, name: &str) -> Result<bool, ProtocolError> {
        self.record(SessionCall::SetActive(name.to_string()));
        Ok(self.connector.activate_ok)
    }

    fn logout(&mut self) -> Result<(), ProtocolError> {
        self.record(SessionCall::Logout);
        Ok(())
    }
}
