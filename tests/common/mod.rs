use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_dircap") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "dircap.exe" } else { "dircap" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve dircap binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("dircap-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("RUST_BACKTRACE", "1")
        // Ambient overrides would redirect registry/log paths mid-test.
        .env_remove("DIRCAP_REGISTRY_FILE")
        .env_remove("DIRCAP_JSONL_LOG")
        .env_remove("DIRCAP_INTERVAL_SECS")
        .env_remove("DIRCAP_DEFAULT_MARGIN_BYTES")
        .env_remove("DIRCAP_OUTPUT_FORMAT")
        .output()
        .expect("execute dircap command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Write a minimal config file pointing all state into `dir` and return its
/// path, so CLI cases never touch the invoking user's real registry.
pub fn write_test_config(dir: &Path) -> PathBuf {
    let config_path = dir.join("config.toml");
    let registry = dir.join("registry.json");
    let log = dir.join("activity.jsonl");
    fs::write(
        &config_path,
        format!(
            "[paths]\nregistry_file = {:?}\njsonl_log = {:?}\n",
            registry.to_string_lossy(),
            log.to_string_lossy()
        ),
    )
    .expect("write test config");
    config_path
}
