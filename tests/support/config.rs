use std::fs;
use std::path::{Path, PathBuf};

/// A complete configuration rooted in `dir`, with `extra` appended.
pub fn config_toml(dir: &Path, extra: &str) -> String {
    format!(
        r#"
deployer = "machine-0"

[state]
path = "{state}"
poll_interval_ms = 20

[manager]
init_dir = "{init}"
data_dir = "{data}"
log_dir = "{log}"
agent_binary = "/usr/local/bin/berth-agent"
{extra}
"#,
        state = dir.join("state.toml").display(),
        init = dir.join("init").display(),
        data = dir.join("data").display(),
        log = dir.join("log").display(),
    )
}

/// Write a complete configuration into `dir` and return its path.
pub fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let path = dir.join("berth.toml");
    fs::write(&path, config_toml(dir, extra)).expect("write config");
    path
}
