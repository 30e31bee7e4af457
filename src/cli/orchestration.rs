//! Deployment workflow behind the `post-receive` hook
//!
//! Every step runs exactly once and the first failure aborts the run. The
//! script is never activated unless both the check and the upload succeeded;
//! an upload that is followed by a failed activation is left in place.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::{self, DeploymentConfig};
use crate::error::{ProtocolError, Result};
use crate::git::{Git2Repository, Repository};
use crate::managesieve::{Connector, ScriptEntry, SieveSession, TcpConnector};
use crate::ui;

/// Printed on stdout once the script is active
pub const SUCCESS_MESSAGE: &str = "Successfully uploaded sieve script.";

/// Result of a successful deployment
#[derive(Debug, Clone, PartialEq)]
pub struct DeployReport {
    /// Name the script is active under
    pub script_name: String,

    /// Ref the script was taken from
    pub ref_name: String,

    /// Size of the uploaded script in bytes
    pub size: usize,

    /// Scripts that were on the server before the upload
    pub previous_scripts: Vec<ScriptEntry>,
}

/// Check, upload and activate the configured script
///
/// # Arguments
///
/// * `config` - Resolved deployment settings
/// * `repo` - Source of the script content
/// * `connector` - Opens the server session
///
/// # Errors
///
/// * `ConfigError::ScriptNotFound` if the file is missing at the ref
/// * `ProtocolError::LoginFailed` if the server refuses the credentials
/// * `ProtocolError::ScriptInvalid`, `UploadFailed` or `ActivateFailed` if
///   the corresponding step is refused
pub fn run_deployment<R, C>(config: &DeploymentConfig, repo: &R, connector: &C) -> Result<DeployReport>
where
    R: Repository,
    C: Connector,
{
    let script = repo.read_file_at(&config.ref_name, &config.file)?;
    debug!(file = %config.file, ref_name = %config.ref_name, bytes = script.len(), "extracted script");

    let mut session = connector.connect(config)?;

    // Diagnostic only; a failing listing must not stop the deployment
    let previous_scripts = match session.list_scripts() {
        Ok(scripts) => {
            let names: Vec<String> = scripts.iter().map(ToString::to_string).collect();
            info!("current scripts: [{}]", names.join(", "));
            scripts
        }
        Err(e) => {
            warn!(error = %e, "could not list current scripts");
            Vec::new()
        }
    };

    if !session.check_script(&script)? {
        return Err(ProtocolError::ScriptInvalid.into());
    }

    if !session.put_script(&config.script_name, &script)? {
        return Err(ProtocolError::UploadFailed.into());
    }

    if !session.set_active(&config.script_name)? {
        return Err(ProtocolError::ActivateFailed.into());
    }

    if let Err(e) = session.logout() {
        debug!(error = %e, "logout failed");
    }

    Ok(DeployReport {
        script_name: config.script_name.clone(),
        ref_name: config.ref_name.clone(),
        size: script.len(),
        previous_scripts,
    })
}

/// Resolve the config for `repo_path`, open the repository and deploy
///
/// The config is resolved before the repository is touched, so a missing
/// section never causes git or network activity.
pub fn deploy_from_repository<C: Connector>(
    repo_path: &Path,
    config_path: &Path,
    connector: &C,
) -> Result<DeployReport> {
    let config = config::load_config_from(config_path, &repo_path.to_string_lossy())?;
    debug!(config = ?config, "resolved config");

    let repo = Git2Repository::open(repo_path)?;
    run_deployment(&config, &repo, connector)
}

/// The `post-receive` hook handler
///
/// Git passes ref updates on stdin; they are not needed since the script
/// is always taken from the configured ref.
pub fn post_receive(repo_path: &Path, args: &[String]) -> Result<i32> {
    if !args.is_empty() {
        debug!(args = ?args, "ignoring hook arguments");
    }

    let config_path = config::config_path()?;
    let report = deploy_from_repository(repo_path, &config_path, &TcpConnector)?;
    info!(
        script = %report.script_name,
        ref_name = %report.ref_name,
        bytes = report.size,
        "script active"
    );

    ui::display_done(SUCCESS_MESSAGE);
    Ok(0)
}
