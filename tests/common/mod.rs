// tests/common/mod.rs
#![allow(dead_code)]

use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use git2::{Repository, Signature};
use tempfile::TempDir;

pub const SCRIPT: &[u8] = b"require \"fileinto\";\nif header :contains \"list-id\" \"rust\" {\n  fileinto \"INBOX.rust\";\n}\n";

/// How the fake server answers STARTTLS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTls {
    /// Not advertised; the command is unknown
    NotOffered,
    /// Advertised, answered with NO
    Refuse,
    /// Answered with OK, then plaintext after the client hello
    AcceptWithoutTls,
    /// Answered with OK and trailing plaintext in the same write
    AcceptWithTrailingData,
}

/// How the fake server behaves
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub user: String,
    pub password: String,
    pub mechanisms: String,
    pub starttls: StartTls,
    pub script_valid: bool,
    pub activate_ok: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            user: "alice".to_string(),
            password: "secret".to_string(),
            mechanisms: "PLAIN LOGIN".to_string(),
            starttls: StartTls::NotOffered,
            script_valid: true,
            activate_ok: true,
        }
    }
}

/// A single-connection ManageSieve server on 127.0.0.1
pub struct FakeSieveServer {
    pub port: u16,
    commands: Arc<Mutex<Vec<String>>>,
    uploads: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl FakeSieveServer {
    pub fn spawn(options: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let uploads = Arc::new(Mutex::new(Vec::new()));

        let server_commands = Arc::clone(&commands);
        let server_uploads = Arc::clone(&uploads);
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                let _ = serve(stream, &options, &server_commands, &server_uploads);
            }
        });

        FakeSieveServer {
            port,
            commands,
            uploads,
        }
    }

    /// Command names received, in order
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// `(name, content)` of every PUTSCRIPT received
    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

fn serve(
    stream: TcpStream,
    options: &ServerOptions,
    commands: &Mutex<Vec<String>>,
    uploads: &Mutex<Vec<(String, Vec<u8>)>>,
) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(10)))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    let mut greeting = String::from("\"IMPLEMENTATION\" \"Fake Sieve\"\r\n");
    greeting.push_str(&format!("\"SASL\" \"{}\"\r\n", options.mechanisms));
    if options.starttls != StartTls::NotOffered {
        greeting.push_str("\"STARTTLS\"\r\n");
    }
    greeting.push_str("\"VERSION\" \"1.0\"\r\nOK \"Fake Sieve ready.\"\r\n");
    writer.write_all(greeting.as_bytes())?;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        let command = line
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        commands.lock().unwrap().push(command.clone());

        let literal = if line.ends_with("+}") {
            let start = line.rfind('{').unwrap();
            let len: usize = line[start + 1..line.len() - 2].parse().unwrap();
            let mut content = vec![0; len + 2];
            reader.read_exact(&mut content)?;
            content.truncate(len);
            Some(content)
        } else {
            None
        };

        let reply = match command.as_str() {
            "AUTHENTICATE" => {
                let accepted = line
                    .split('"')
                    .nth(3)
                    .and_then(|encoded| BASE64.decode(encoded).ok())
                    .map(|decoded| {
                        let expected = format!("\0{}\0{}", options.user, options.password);
                        decoded == expected.as_bytes()
                    })
                    .unwrap_or(false);
                if accepted {
                    "OK \"Logged in.\"\r\n".to_string()
                } else {
                    "NO \"Authentication failed.\"\r\n".to_string()
                }
            }
            "LISTSCRIPTS" => "\"old\"\r\n\"main\" ACTIVE\r\nOK \"Listscripts completed.\"\r\n".to_string(),
            "CHECKSCRIPT" => {
                if options.script_valid {
                    "OK \"Script is valid.\"\r\n".to_string()
                } else {
                    "NO \"line 1: unknown command 'kep'\"\r\n".to_string()
                }
            }
            "PUTSCRIPT" => {
                let name = line.split('"').nth(1).unwrap_or_default().to_string();
                uploads
                    .lock()
                    .unwrap()
                    .push((name, literal.unwrap_or_default()));
                "OK \"Putscript completed.\"\r\n".to_string()
            }
            "SETACTIVE" => {
                if options.activate_ok {
                    "OK \"Setactive completed.\"\r\n".to_string()
                } else {
                    "NO (NONEXISTENT) \"There is no such script.\"\r\n".to_string()
                }
            }
            "STARTTLS" => match options.starttls {
                StartTls::NotOffered => "NO \"Unknown command.\"\r\n".to_string(),
                StartTls::Refuse => "NO \"TLS not available.\"\r\n".to_string(),
                StartTls::AcceptWithoutTls => {
                    writer.write_all(b"OK \"Begin TLS negotiation now.\"\r\n")?;
                    // wait for the client hello, then answer in plaintext
                    let mut hello = [0; 5];
                    reader.read_exact(&mut hello)?;
                    writer.write_all(b"BYE \"I do not speak TLS.\"\r\n")?;
                    return Ok(());
                }
                StartTls::AcceptWithTrailingData => {
                    writer.write_all(
                        b"OK \"Begin TLS negotiation now.\"\r\n\"SASL\" \"PLAIN\"\r\nOK\r\n",
                    )?;
                    // the client must refuse to continue; drain until it hangs up
                    let mut rest = Vec::new();
                    let _ = reader.read_to_end(&mut rest);
                    return Ok(());
                }
            },
            "LOGOUT" => {
                writer.write_all(b"OK \"Logout completed.\"\r\n")?;
                return Ok(());
            }
            _ => "NO \"Unknown command.\"\r\n".to_string(),
        };
        writer.write_all(reply.as_bytes())?;
    }
}

/// Bare repository with `files` committed on `refname`
pub fn bare_repo_with(refname: &str, files: &[(&str, &[u8])]) -> TempDir {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init_bare(dir.path()).unwrap();

    let mut builder = repo.treebuilder(None).unwrap();
    for (name, content) in files {
        let oid = repo.blob(content).unwrap();
        builder.insert(*name, oid, 0o100644).unwrap();
    }
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();
    let sig = Signature::now("Pusher", "pusher@example.com").unwrap();
    repo.commit(Some(refname), &sig, &sig, "update filters", &tree, &[])
        .unwrap();

    dir
}

/// Canonical path of `dir`, as a hook process would see it from getcwd
pub fn canonical(dir: &Path) -> PathBuf {
    dir.canonicalize().unwrap()
}

/// Config section for `repo` pointing at the fake server
pub fn section(repo: &Path, port: u16, pass: &str, extra: &str) -> String {
    format!(
        "[{}]\nhost = 127.0.0.1\nport = {}\nuser = alice\npass = {}\nfile = main.sieve\nrefname = refs/heads/master\ntimeout = 5\n{}",
        repo.display(),
        port,
        pass,
        extra
    )
}

/// Home directory containing `~/.config/sieve-git-pushdeploy/sieve.conf`
pub fn home_with_config(contents: &str) -> TempDir {
    let home = TempDir::new().unwrap();
    let dir = home.path().join(".config/sieve-git-pushdeploy");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("sieve.conf"), contents).unwrap();
    home
}
