//! Saved receivers, stored as a JSON array of `"host:port"` strings.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, error, warn};

const HOSTS_FILE_NAME: &str = ".fcast_hosts.json";

/// Split a `host:port` entry. IPv6 hosts may be written as `[addr]:port`.
pub fn parse_host_entry(entry: &str) -> Result<(String, u16)> {
    let Some((host, port)) = entry.trim().rsplit_once(':') else {
        bail!("`{entry}` is not of the form host:port");
    };

    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        bail!("`{entry}` has an empty host");
    }

    let port = port
        .parse::<u16>()
        .with_context(|| format!("`{entry}` has an invalid port"))?;

    Ok((host.to_owned(), port))
}

/// Join `host` and `port` into an entry, bracketing IPv6 hosts exactly once.
pub fn format_host_entry(host: &str, port: u16) -> String {
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

pub struct HostStore {
    path: PathBuf,
}

impl HostStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.fcast_hosts.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(HOSTS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<String>> {
        debug!("Loading hosts from {}", self.path.display());

        if !self.path.exists() {
            warn!("Hosts file {} does not exist", self.path.display());
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&contents)
            .with_context(|| format!("{} is not valid JSON", self.path.display()))?;

        let hosts = match value {
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => Some(s),
                    _ => None,
                })
                .collect::<Option<Vec<String>>>(),
            _ => None,
        };

        match hosts {
            Some(hosts) => Ok(hosts),
            None => {
                error!("Hosts data in {} is not a list of strings", self.path.display());
                Ok(Vec::new())
            }
        }
    }

    /// Append `entry` unless it is already saved. Returns whether the file changed.
    pub fn add(&self, entry: &str) -> Result<bool> {
        parse_host_entry(entry)?;

        let mut hosts = self.load()?;
        if hosts.iter().any(|h| h == entry) {
            return Ok(false);
        }

        hosts.push(entry.to_owned());
        let json = serde_json::to_string(&hosts)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        debug!("Saved host {entry} to {}", self.path.display());

        Ok(true)
    }
}
