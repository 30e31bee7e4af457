use ini::{Ini, ParseOption};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::error::{ConfigError, HookError, Result};

/// Location of the config file relative to the user's home directory.
pub const CONFIG_RELATIVE_PATH: &str = ".config/sieve-git-pushdeploy/sieve.conf";

/// Section whose keys apply to every repository section.
pub const DEFAULT_SECTION: &str = "DEFAULT";

pub const DEFAULT_SCRIPT_NAME: &str = "main";
pub const DEFAULT_FILE: &str = "main.sieve";
pub const DEFAULT_REF_NAME: &str = "refs/heads/master";
pub const DEFAULT_PORT: u16 = 4190;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A credential that never shows up in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// The raw value. Only the SASL encoder should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Deployment settings for one repository.
///
/// Resolved once per invocation from the section whose name equals the
/// repository path. Every string field except `auth_mech` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: Secret,
    /// Path of the script inside the repository
    pub file: String,
    /// SASL mechanism to insist on; `None` lets client and server negotiate
    pub auth_mech: Option<String>,
    /// Name the script is stored and activated under on the server
    pub script_name: String,
    pub ref_name: String,
    pub use_starttls: bool,
    /// Extra PEM CA certificates trusted for STARTTLS
    pub ca_file: Option<PathBuf>,
    pub timeout: Duration,
}

/// Parsed config file: repository sections plus the `[DEFAULT]` section.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    sections: HashMap<String, HashMap<String, String>>,
    defaults: HashMap<String, String>,
}

impl ConfigFile {
    /// Parses INI text. Keys are case-insensitive, section names are not.
    pub fn parse(contents: &str) -> std::result::Result<Self, ConfigError> {
        let options = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(contents, options)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut file = ConfigFile::default();
        for (name, properties) in ini.iter() {
            let Some(name) = name else {
                continue;
            };
            let values: HashMap<String, String> = properties
                .iter()
                .map(|(key, value)| (key.to_lowercase(), value.to_string()))
                .collect();

            if name == DEFAULT_SECTION {
                file.defaults.extend(values);
            } else {
                file.sections
                    .entry(name.to_string())
                    .or_default()
                    .extend(values);
            }
        }

        Ok(file)
    }

    /// Names of all repository sections, sorted
    pub fn section_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Builds the deployment config for `repo_path`.
    ///
    /// The section is looked up by exact string equality: no trailing-slash,
    /// symlink or case normalization happens here.
    pub fn resolve(&self, repo_path: &str) -> std::result::Result<DeploymentConfig, ConfigError> {
        let section = self
            .sections
            .get(repo_path)
            .ok_or_else(|| ConfigError::MissingSection(repo_path.to_string()))?;

        let lookup = SectionLookup {
            name: repo_path,
            section,
            defaults: &self.defaults,
        };

        let timeout_secs: u64 = lookup.number_or("timeout", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(lookup.invalid_number("timeout"));
        }

        Ok(DeploymentConfig {
            host: lookup.required("host")?,
            port: lookup.number_or("port", DEFAULT_PORT)?,
            user: lookup.required("user")?,
            pass: Secret::new(lookup.required("pass")?),
            file: lookup.string_or("file", DEFAULT_FILE)?,
            auth_mech: lookup.optional("authmech"),
            script_name: lookup.string_or("scriptname", DEFAULT_SCRIPT_NAME)?,
            ref_name: lookup.string_or("refname", DEFAULT_REF_NAME)?,
            use_starttls: lookup.boolean_or("starttls", false)?,
            ca_file: lookup.optional("cafile").map(PathBuf::from),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Key lookup in one section, falling back to `[DEFAULT]`.
struct SectionLookup<'a> {
    name: &'a str,
    section: &'a HashMap<String, String>,
    defaults: &'a HashMap<String, String>,
}

impl SectionLookup<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.section
            .get(key)
            .or_else(|| self.defaults.get(key))
            .map(String::as_str)
    }

    fn required(&self, key: &str) -> std::result::Result<String, ConfigError> {
        let value = self.get(key).ok_or_else(|| ConfigError::MissingKey {
            section: self.name.to_string(),
            key: key.to_string(),
        })?;
        self.non_empty(key, value)
    }

    fn string_or(&self, key: &str, default: &str) -> std::result::Result<String, ConfigError> {
        self.non_empty(key, self.get(key).unwrap_or(default))
    }

    fn optional(&self, key: &str) -> Option<String> {
        self.get(key)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn boolean_or(&self, key: &str, default: bool) -> std::result::Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => parse_bool(value).ok_or_else(|| ConfigError::InvalidBoolean {
                section: self.name.to_string(),
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    fn number_or<T: FromStr>(&self, key: &str, default: T) -> std::result::Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| self.invalid_number(key)),
        }
    }

    fn invalid_number(&self, key: &str) -> ConfigError {
        ConfigError::InvalidNumber {
            section: self.name.to_string(),
            key: key.to_string(),
            value: self.get(key).unwrap_or_default().to_string(),
        }
    }

    fn non_empty(&self, key: &str, value: &str) -> std::result::Result<String, ConfigError> {
        if value.is_empty() {
            return Err(ConfigError::EmptyValue {
                section: self.name.to_string(),
                key: key.to_string(),
            });
        }
        Ok(value.to_string())
    }
}

/// Truthy-string parsing: `1/yes/true/on` and `0/no/false/off`, any case.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// Path of the user-level config file, `~/.config/sieve-git-pushdeploy/sieve.conf`.
pub fn config_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_RELATIVE_PATH))
        .ok_or_else(|| {
            HookError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "cannot determine home directory",
            ))
        })
}

/// Resolves the deployment config for `repo_path` from the user config file.
///
/// # Errors
/// * `HookError::Io` - the config file is missing or unreadable
/// * `HookError::Config` - no matching section, missing or invalid keys
pub fn resolve_config(repo_path: &str) -> Result<DeploymentConfig> {
    let path = config_path()?;
    load_config_from(&path, repo_path)
}

/// Like [`resolve_config`] but reads an explicit config file.
pub fn load_config_from(path: &Path, repo_path: &str) -> Result<DeploymentConfig> {
    let contents = fs::read_to_string(path)?;
    let file = ConfigFile::parse(&contents)?;
    file.resolve(repo_path).map_err(|e| {
        if let ConfigError::MissingSection(_) = e {
            debug!(
                config = %path.display(),
                known = ?file.section_names(),
                "no section for repository"
            );
        }
        HookError::from(e)
    })
}
