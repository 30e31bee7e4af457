use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, info, trace, warn};

use super::auth::Mechanism;
use super::response::{quoted, tokenize, Response, Status, Token};
use super::tls::{self, TlsStream};
use super::{Capabilities, Connector, ScriptEntry, SieveSession};
use crate::config::{DeploymentConfig, Secret};
use crate::error::ProtocolError;

/// Upper bound for a single server literal
const MAX_LITERAL: usize = 16 * 1024 * 1024;

/// Upper bound for a single response line, CRLF included
const MAX_LINE: usize = 64 * 1024;

/// The byte stream under a session, before or after STARTTLS
pub enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream>),
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(tcp) => tcp.read(buf),
            Transport::Tls(tls) => tls.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(tcp) => tcp.write(buf),
            Transport::Tls(tls) => tls.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Plain(tcp) => tcp.flush(),
            Transport::Tls(tls) => tls.flush(),
        }
    }
}

/// A ManageSieve session over any byte stream
pub struct Client<S: Read + Write> {
    stream: BufReader<S>,
    capabilities: Capabilities,
}

impl<S: Read + Write> Client<S> {
    pub fn new(stream: S) -> Self {
        Client {
            stream: BufReader::new(stream),
            capabilities: Capabilities::default(),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Gives back the stream. Fails if the server sent data nobody read,
    /// which after STARTTLS would be injected plaintext.
    pub fn into_inner(self) -> Result<S, ProtocolError> {
        if !self.stream.buffer().is_empty() {
            return Err(ProtocolError::malformed(
                "unexpected data from server before TLS upgrade",
            ));
        }
        Ok(self.stream.into_inner())
    }

    /// Reads the capability listing sent on connect and after STARTTLS
    pub fn read_capabilities(&mut self) -> Result<(), ProtocolError> {
        let (lines, response) = self.read_response()?;
        match response.status {
            Status::Ok => {
                self.capabilities = Capabilities::from_lines(&lines);
                Ok(())
            }
            Status::Bye => Err(ProtocolError::Bye(response.reason())),
            Status::No => Err(ProtocolError::Rejected {
                command: "greeting".to_string(),
                reason: response.reason(),
            }),
        }
    }

    /// Sends STARTTLS, returning whether the server agreed
    pub fn starttls(&mut self) -> Result<bool, ProtocolError> {
        let (_, response) = self.command("STARTTLS")?;
        if !response.is_ok() {
            warn!(reason = %response.reason(), "STARTTLS refused");
        }
        Ok(response.is_ok())
    }

    /// Runs a SASL exchange, returning whether the server accepted it
    pub fn authenticate(
        &mut self,
        mechanism: Mechanism,
        user: &str,
        pass: &Secret,
    ) -> Result<bool, ProtocolError> {
        let mut line = format!("AUTHENTICATE {}", quoted(mechanism.name()));
        if let Some(initial) = mechanism.initial_response(user, pass.expose()) {
            line.push(' ');
            line.push_str(&quoted(&BASE64.encode(initial)));
        }
        let shown = format!("AUTHENTICATE {} <redacted>", quoted(mechanism.name()));
        self.write_raw(format!("{}\r\n", line).as_bytes(), &shown)?;

        let mut step = 0;
        loop {
            let tokens = self.read_tokens()?;
            if let Some(response) = Response::classify(&tokens) {
                return match response.status {
                    Status::Ok => Ok(true),
                    Status::No => {
                        warn!(mechanism = %mechanism, reason = %response.reason(), "authentication rejected");
                        Ok(false)
                    }
                    Status::Bye => Err(ProtocolError::Bye(response.reason())),
                };
            }

            match tokens.first() {
                Some(Token::String(challenge)) => {
                    if let Ok(decoded) = BASE64.decode(challenge) {
                        debug!(challenge = %String::from_utf8_lossy(&decoded), "SASL challenge");
                    }
                }
                _ => return Err(ProtocolError::malformed("expected SASL challenge")),
            }

            let answer = match mechanism.respond(step, user, pass.expose()) {
                Some(answer) => quoted(&BASE64.encode(answer)),
                None => quoted("*"),
            };
            self.write_raw(format!("{}\r\n", answer).as_bytes(), "<redacted>")?;
            step += 1;
        }
    }

    /// Sends a one-line command and reads its response.
    ///
    /// `BYE` becomes an error; `OK` and `NO` are returned to the caller.
    pub fn command(&mut self, line: &str) -> Result<(Vec<Vec<Token>>, Response), ProtocolError> {
        self.write_raw(format!("{}\r\n", line).as_bytes(), line)?;
        let (lines, response) = self.read_response()?;
        if response.status == Status::Bye {
            return Err(ProtocolError::Bye(response.reason()));
        }
        Ok((lines, response))
    }

    /// Sends `prefix` followed by `content` as a non-synchronizing literal
    fn command_with_literal(&mut self, prefix: &str, content: &[u8]) -> Result<Response, ProtocolError> {
        let header = format!("{} {{{}+}}", prefix, content.len());
        let mut payload = Vec::with_capacity(header.len() + content.len() + 4);
        payload.extend_from_slice(header.as_bytes());
        payload.extend_from_slice(b"\r\n");
        payload.extend_from_slice(content);
        payload.extend_from_slice(b"\r\n");
        self.write_raw(&payload, &header)?;

        let (_, response) = self.read_response()?;
        if response.status == Status::Bye {
            return Err(ProtocolError::Bye(response.reason()));
        }
        Ok(response)
    }

    fn write_raw(&mut self, bytes: &[u8], shown: &str) -> Result<(), ProtocolError> {
        trace!("C: {}", shown);
        let stream = self.stream.get_mut();
        stream.write_all(bytes)?;
        stream.flush()?;
        Ok(())
    }

    fn read_response(&mut self) -> Result<(Vec<Vec<Token>>, Response), ProtocolError> {
        let mut lines = Vec::new();
        loop {
            let tokens = self.read_tokens()?;
            match Response::classify(&tokens) {
                Some(response) => return Ok((lines, response)),
                None => lines.push(tokens),
            }
        }
    }

    /// Reads one logical line, following any literals it contains
    fn read_tokens(&mut self) -> Result<Vec<Token>, ProtocolError> {
        let mut tokens = Vec::new();
        loop {
            let line = self.read_physical_line()?;
            trace!("S: {}", String::from_utf8_lossy(&line));
            let (mut parsed, literal) = tokenize(&line)?;
            tokens.append(&mut parsed);

            match literal {
                None => return Ok(tokens),
                Some(len) if len > MAX_LITERAL => {
                    return Err(ProtocolError::malformed(format!(
                        "literal of {} bytes exceeds limit",
                        len
                    )))
                }
                Some(len) => {
                    let mut value = vec![0; len];
                    self.stream.read_exact(&mut value)?;
                    tokens.push(Token::String(value));
                }
            }
        }
    }

    fn read_physical_line(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let mut line = Vec::new();
        (&mut self.stream)
            .take(MAX_LINE as u64)
            .read_until(b'\n', &mut line)?;
        if line.is_empty() {
            return Err(ProtocolError::io("connection closed by server"));
        }
        if !line.ends_with(b"\n") {
            if line.len() >= MAX_LINE {
                return Err(ProtocolError::malformed(format!(
                    "response line exceeds {} bytes",
                    MAX_LINE
                )));
            }
            return Err(ProtocolError::io("connection closed mid-line"));
        }
        line.pop();
        if line.ends_with(b"\r") {
            line.pop();
        }
        Ok(line)
    }

    fn outcome(command: &str, response: &Response) -> bool {
        match response.status {
            Status::Ok => {
                if let Some(code) = response.code.as_deref() {
                    if code.eq_ignore_ascii_case("WARNINGS") {
                        warn!(command, warnings = %response.reason(), "server reported warnings");
                    }
                }
                true
            }
            _ => {
                warn!(command, reason = %response.reason(), "command rejected");
                false
            }
        }
    }
}

impl<S: Read + Write> SieveSession for Client<S> {
    fn list_scripts(&mut self) -> Result<Vec<ScriptEntry>, ProtocolError> {
        let (lines, response) = self.command("LISTSCRIPTS")?;
        if !response.is_ok() {
            return Err(ProtocolError::Rejected {
                command: "LISTSCRIPTS".to_string(),
                reason: response.reason(),
            });
        }
        Ok(lines.iter().filter_map(|line| ScriptEntry::from_tokens(line)).collect())
    }

    fn check_script(&mut self, content: &[u8]) -> Result<bool, ProtocolError> {
        // CHECKSCRIPT arrived with RFC 5804; older servers omit VERSION
        if !self.capabilities.has("VERSION") {
            return Err(ProtocolError::Unsupported("CHECKSCRIPT".to_string()));
        }
        let response = self.command_with_literal("CHECKSCRIPT", content)?;
        Ok(Self::outcome("CHECKSCRIPT", &response))
    }

    fn put_script(&mut self, name: &str, content: &[u8]) -> Result<bool, ProtocolError> {
        let prefix = format!("PUTSCRIPT {}", quoted(name));
        let response = self.command_with_literal(&prefix, content)?;
        Ok(Self::outcome("PUTSCRIPT", &response))
    }

    fn set_active(&mut self, name: &str) -> Result<bool, ProtocolError> {
        let (_, response) = self.command(&format!("SETACTIVE {}", quoted(name)))?;
        Ok(Self::outcome("SETACTIVE", &response))
    }

    fn logout(&mut self) -> Result<(), ProtocolError> {
        self.write_raw(b"LOGOUT\r\n", "LOGOUT")?;
        // Servers answer OK or BYE and close; either ends the session
        let (_, response) = self.read_response()?;
        debug!(status = %response.status, "logged out");
        Ok(())
    }
}

/// Opens real TCP sessions, with STARTTLS when configured
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Session = Client<Transport>;

    fn connect(&self, config: &DeploymentConfig) -> Result<Self::Session, ProtocolError> {
        let login_failed = || ProtocolError::LoginFailed {
            user: config.user.clone(),
            host: config.host.clone(),
            starttls: config.use_starttls,
            authmech: config.auth_mech.clone(),
        };

        let tcp = open_tcp(&config.host, config.port, config.timeout)?;
        let mut client = Client::new(Transport::Plain(tcp));
        client.read_capabilities()?;

        if config.use_starttls {
            if !client.capabilities().has("STARTTLS") {
                warn!(host = %config.host, "server does not offer STARTTLS");
                return Err(login_failed());
            }
            if !client.starttls()? {
                return Err(login_failed());
            }
            let tcp = match client.into_inner()? {
                Transport::Plain(tcp) => tcp,
                Transport::Tls(_) => return Err(ProtocolError::malformed("already encrypted")),
            };
            let tls = tls::upgrade(tcp, &config.host, config.ca_file.as_deref()).map_err(|e| {
                warn!(host = %config.host, error = %e, "TLS negotiation failed");
                login_failed()
            })?;
            client = Client::new(Transport::Tls(Box::new(tls)));
            client.read_capabilities()?;
        }

        info!(
            host = %config.host,
            port = config.port,
            implementation = client.capabilities().get("IMPLEMENTATION").unwrap_or("unknown"),
            "connected"
        );

        let offered = client.capabilities().sasl_mechanisms();
        let Some(mechanism) = Mechanism::select(config.auth_mech.as_deref(), &offered) else {
            warn!(offered = ?offered, requested = ?config.auth_mech, "no usable SASL mechanism");
            return Err(login_failed());
        };

        if !client.authenticate(mechanism, &config.user, &config.pass)? {
            return Err(login_failed());
        }
        debug!(user = %config.user, mechanism = %mechanism, "authenticated");

        Ok(client)
    }
}

fn open_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, ProtocolError> {
    let connect_error = |reason: String| ProtocolError::Connect {
        host: host.to_string(),
        port,
        reason,
    };

    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| connect_error(e.to_string()))?;

    let mut last_error = "no addresses found".to_string();
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(tcp) => {
                tcp.set_read_timeout(Some(timeout))?;
                tcp.set_write_timeout(Some(timeout))?;
                return Ok(tcp);
            }
            Err(e) => {
                debug!(addr = %addr, error = %e, "connect attempt failed");
                last_error = e.to_string();
            }
        }
    }

    Err(connect_error(last_error))
}
