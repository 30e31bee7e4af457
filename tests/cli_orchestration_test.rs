// tests/cli_orchestration_test.rs
mod common;

use std::fs;

use common::{FakeSieveServer, ServerOptions, StartTls, SCRIPT};
use sieve_git_pushdeploy::cli::deploy_from_repository;
use sieve_git_pushdeploy::managesieve::{MockConnector, ScriptEntry, TcpConnector};
use sieve_git_pushdeploy::{ConfigError, HookError, ProtocolError};
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("sieve.conf");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_deploys_over_tcp() {
    let server = FakeSieveServer::spawn(ServerOptions::default());
    let repo = common::bare_repo_with("refs/heads/master", &[("main.sieve", SCRIPT)]);
    let conf_dir = TempDir::new().unwrap();
    let config_path = write_config(
        &conf_dir,
        &common::section(repo.path(), server.port, "secret", ""),
    );

    let report = deploy_from_repository(repo.path(), &config_path, &TcpConnector).unwrap();

    assert_eq!(report.script_name, "main");
    assert_eq!(report.size, SCRIPT.len());
    assert_eq!(
        report.previous_scripts,
        vec![ScriptEntry::new("old", false), ScriptEntry::new("main", true)]
    );
    assert_eq!(server.uploads(), vec![("main".to_string(), SCRIPT.to_vec())]);
    assert_eq!(
        server.commands(),
        vec![
            "AUTHENTICATE",
            "LISTSCRIPTS",
            "CHECKSCRIPT",
            "PUTSCRIPT",
            "SETACTIVE",
            "LOGOUT"
        ]
    );
}

#[test]
fn test_wrong_password_is_login_failure() {
    let server = FakeSieveServer::spawn(ServerOptions::default());
    let repo = common::bare_repo_with("refs/heads/master", &[("main.sieve", SCRIPT)]);
    let conf_dir = TempDir::new().unwrap();
    let config_path = write_config(
        &conf_dir,
        &common::section(repo.path(), server.port, "hunter2", ""),
    );

    let err = deploy_from_repository(repo.path(), &config_path, &TcpConnector).unwrap_err();

    assert!(matches!(
        err,
        HookError::Protocol(ProtocolError::LoginFailed { .. })
    ));
    let message = err.to_string();
    assert!(message.contains("alice"));
    assert!(message.contains("127.0.0.1"));
    assert!(!message.contains("hunter2"));
    assert!(server.uploads().is_empty());
}

#[test]
fn test_invalid_script_is_not_uploaded() {
    let server = FakeSieveServer::spawn(ServerOptions {
        script_valid: false,
        ..ServerOptions::default()
    });
    let repo = common::bare_repo_with("refs/heads/master", &[("main.sieve", &b"kep;\n"[..])]);
    let conf_dir = TempDir::new().unwrap();
    let config_path = write_config(
        &conf_dir,
        &common::section(repo.path(), server.port, "secret", ""),
    );

    let err = deploy_from_repository(repo.path(), &config_path, &TcpConnector).unwrap_err();

    assert_eq!(err.to_string(), "script invalid.");
    assert!(server.uploads().is_empty());
    assert!(!server.commands().contains(&"SETACTIVE".to_string()));
}

#[test]
fn test_refused_activation_keeps_upload() {
    let server = FakeSieveServer::spawn(ServerOptions {
        activate_ok: false,
        ..ServerOptions::default()
    });
    let repo = common::bare_repo_with("refs/heads/master", &[("main.sieve", SCRIPT)]);
    let conf_dir = TempDir::new().unwrap();
    let config_path = write_config(
        &conf_dir,
        &common::section(repo.path(), server.port, "secret", "scriptname = filters\n"),
    );

    let err = deploy_from_repository(repo.path(), &config_path, &TcpConnector).unwrap_err();

    assert_eq!(err.to_string(), "could not set script active");
    assert_eq!(server.uploads(), vec![("filters".to_string(), SCRIPT.to_vec())]);
}

#[test]
fn test_configured_mechanism_not_offered() {
    let server = FakeSieveServer::spawn(ServerOptions {
        mechanisms: "PLAIN".to_string(),
        ..ServerOptions::default()
    });
    let repo = common::bare_repo_with("refs/heads/master", &[("main.sieve", SCRIPT)]);
    let conf_dir = TempDir::new().unwrap();
    let config_path = write_config(
        &conf_dir,
        &common::section(repo.path(), server.port, "secret", "authmech = CRAM-MD5\n"),
    );

    let err = deploy_from_repository(repo.path(), &config_path, &TcpConnector).unwrap_err();

    assert!(err.to_string().ends_with("authmech=CRAM-MD5"));
}

#[test]
fn test_missing_file_never_connects() {
    let repo = common::bare_repo_with("refs/heads/master", &[("other.sieve", SCRIPT)]);
    let conf_dir = TempDir::new().unwrap();
    // port 9 is never contacted
    let config_path = write_config(&conf_dir, &common::section(repo.path(), 9, "secret", ""));
    let connector = MockConnector::new();

    let err = deploy_from_repository(repo.path(), &config_path, &connector).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Can't find file 'main.sieve' in 'refs/heads/master'"
    );
    assert_eq!(connector.connect_count(), 0);
}

#[test]
fn test_missing_section_touches_nothing() {
    // not a repository: opening it would fail with a different error
    let not_a_repo = TempDir::new().unwrap();
    let conf_dir = TempDir::new().unwrap();
    let config_path = write_config(&conf_dir, "[/srv/git/elsewhere.git]\nhost = h\nuser = u\npass = p\n");
    let connector = MockConnector::new();

    let err = deploy_from_repository(not_a_repo.path(), &config_path, &connector).unwrap_err();

    assert!(matches!(
        err,
        HookError::Config(ConfigError::MissingSection(_))
    ));
    assert_eq!(connector.connect_count(), 0);
}

fn deploy_with_starttls(starttls: StartTls) -> (FakeSieveServer, HookError) {
    let server = FakeSieveServer::spawn(ServerOptions {
        starttls,
        ..ServerOptions::default()
    });
    let repo = common::bare_repo_with("refs/heads/master", &[("main.sieve", SCRIPT)]);
    let conf_dir = TempDir::new().unwrap();
    let config_path = write_config(
        &conf_dir,
        &common::section(repo.path(), server.port, "secret", "starttls = yes\n"),
    );

    let err = deploy_from_repository(repo.path(), &config_path, &TcpConnector).unwrap_err();
    (server, err)
}

#[test]
fn test_starttls_not_offered() {
    let (server, err) = deploy_with_starttls(StartTls::NotOffered);

    assert!(matches!(
        err,
        HookError::Protocol(ProtocolError::LoginFailed { starttls: true, .. })
    ));
    assert_eq!(
        err.to_string(),
        "Login unsuccessful for alice:***@127.0.0.1, starttls=true, authmech=auto"
    );
    assert!(!server.commands().contains(&"AUTHENTICATE".to_string()));
}

#[test]
fn test_starttls_refused() {
    let (server, err) = deploy_with_starttls(StartTls::Refuse);

    assert!(matches!(
        err,
        HookError::Protocol(ProtocolError::LoginFailed { starttls: true, .. })
    ));
    assert_eq!(server.commands(), vec!["STARTTLS"]);
}

#[test]
fn test_plaintext_after_starttls_is_rejected() {
    let (server, err) = deploy_with_starttls(StartTls::AcceptWithTrailingData);

    assert!(matches!(
        err,
        HookError::Protocol(ProtocolError::Malformed(ref msg)) if msg.contains("before TLS upgrade")
    ));
    assert_eq!(server.commands(), vec!["STARTTLS"]);
    assert!(server.uploads().is_empty());
}

#[test]
fn test_failed_tls_handshake_is_login_failure() {
    let (server, err) = deploy_with_starttls(StartTls::AcceptWithoutTls);

    assert!(matches!(
        err,
        HookError::Protocol(ProtocolError::LoginFailed { starttls: true, .. })
    ));
    assert!(!server.commands().contains(&"AUTHENTICATE".to_string()));
}
