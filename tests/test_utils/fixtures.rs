//! Test Fixtures
//!
//! Configuration that makes bash behave like a Topaz session: it starts at
//! `topaz> `, and the "login sequence" switches it to `topaz 1> `.

use std::path::Path;
use topaz_kernel::config::KernelConfig;
use topaz_kernel::repl::ReplSpec;

pub const INITIAL_PROMPT: &str = "topaz> ";
pub const STEADY_PROMPT: &str = "topaz 1> ";

/// `\040` is a space; written this way the echoed login line can never
/// look like the steady prompt
pub const LOGIN_SEQUENCE: &str = r"PS1='topaz\0401> '";

/// Smallest byte string `image::guess_format` recognises as PNG
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x06\0\0\0";

/// A kernel configuration driving `bash` instead of `topaz`
pub fn bash_config() -> KernelConfig {
    let mut config = KernelConfig::default();
    config.topaz.executable = "bash".to_string();
    config.topaz.args = ["--norc", "--noprofile", "--noediting", "-i"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    config.topaz.initial_prompt = INITIAL_PROMPT.to_string();
    config.topaz.login_sequence = LOGIN_SEQUENCE.to_string();
    config.topaz.steady_prompt = STEADY_PROMPT.to_string();
    config.topaz.startup_timeout_ms = 10_000;
    config.topaz.version_flag = "--version".to_string();

    let env = &mut config.topaz.environment;
    env.insert("PS1".to_string(), INITIAL_PROMPT.to_string());
    env.insert("PS2".to_string(), String::new());
    env.insert("TERM".to_string(), "dumb".to_string());
    env.insert("HISTFILE".to_string(), "/dev/null".to_string());

    config.execution.interrupt_recovery_timeout_ms = 10_000;
    config.execution.completion_timeout_ms = 10_000;
    config.execution.shutdown_grace_ms = 1_000;
    config
}

/// The wrapper-level view of [`bash_config`]
pub fn bash_spec() -> ReplSpec {
    ReplSpec::from_config(&bash_config())
}

/// Create an empty executable file named `name` in `dir`
pub fn write_executable(dir: &Path, name: &str) {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, "#!/bin/sh\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}
