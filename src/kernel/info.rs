//! Kernel identity
//!
//! What the kernel reports in `kernel_info_reply`, including the Topaz
//! version found by running the executable with its version flag.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::TopazConfig;

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"version (\d+(\.\d+)+)").expect("VERSION_PATTERN regex pattern is valid")
});

pub const IMPLEMENTATION: &str = "topaz_kernel";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub name: String,
    pub codemirror_mode: String,
    pub mimetype: String,
    pub file_extension: String,
}

impl Default for LanguageInfo {
    fn default() -> Self {
        Self {
            name: "topaz".to_string(),
            codemirror_mode: "shell".to_string(),
            mimetype: "text/x-sh".to_string(),
            file_extension: ".tpz".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelInfo {
    pub implementation: String,
    pub implementation_version: String,
    pub language_info: LanguageInfo,
    pub banner: String,
    /// Empty when the banner carries no version
    pub language_version: String,
}

impl KernelInfo {
    /// Build from an already obtained banner
    pub fn from_banner(banner: impl Into<String>) -> Self {
        let banner = banner.into();
        let language_version = extract_version(&banner).unwrap_or_default().to_string();
        Self {
            implementation: IMPLEMENTATION.to_string(),
            implementation_version: crate::VERSION.to_string(),
            language_info: LanguageInfo::default(),
            banner,
            language_version,
        }
    }

    /// Run `<executable> <version_flag>` and build from its output.
    ///
    /// A failing probe leaves the banner empty rather than failing.
    pub async fn probe(config: &TopazConfig) -> Self {
        match probe_banner(config).await {
            Ok(banner) => Self::from_banner(banner),
            Err(e) => {
                warn!("Version probe of {} failed: {}", config.executable, e);
                Self::from_banner(String::new())
            }
        }
    }
}

/// First `version X.Y[.Z...]` number in `banner`
pub fn extract_version(banner: &str) -> Option<&str> {
    VERSION_PATTERN
        .captures(banner)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

async fn probe_banner(config: &TopazConfig) -> std::io::Result<String> {
    let mut command = tokio::process::Command::new(&config.executable);
    command.arg(&config.version_flag).envs(&config.environment);
    if let Some(dir) = &config.working_directory {
        command.current_dir(dir);
    }

    let output = command.output().await?;
    let mut banner = String::from_utf8_lossy(&output.stdout).into_owned();
    if banner.trim().is_empty() {
        banner = String::from_utf8_lossy(&output.stderr).into_owned();
    }
    debug!("Version probe exited with {}", output.status);
    Ok(banner)
}
