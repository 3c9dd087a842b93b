//! Local CLI subprocess client.
//!
//! Every call goes through [`CliBackend::run`], which spawns the binary with
//! `kill_on_drop(true)`, drains stdout and stderr concurrently (each capped at
//! [`MAX_CLI_OUTPUT`]) and wraps the whole thing in `tokio::time::timeout`.
//! Arguments are passed as an argv vector, never through a shell, and
//! caller-supplied values are checked by [`check_arg`] first.

use std::fmt::Write;
use std::process::Stdio;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

use super::{BackendError, ConnectOptions};

/// Max output size per stream (1 MB). Output beyond this limit is still
/// drained from the pipe but discarded.
const MAX_CLI_OUTPUT: usize = 1024 * 1024;

/// Max length of a single caller-supplied argument.
const MAX_ARG_LEN: usize = 253;

/// Runs the CLI binary.
pub struct CliBackend {
    cli_path: String,
    timeout: Duration,
    /// Held across `up`/`down` so only one network-state change runs at a time.
    connection_lock: Mutex<()>,
}

/// Captured output of a successful CLI run.
#[derive(Debug)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CliBackend {
    pub fn new(cli_path: &str, timeout_ms: u64) -> Self {
        Self {
            cli_path: cli_path.to_string(),
            timeout: Duration::from_millis(timeout_ms),
            connection_lock: Mutex::new(()),
        }
    }

    /// `status --json`
    pub async fn status(&self) -> Result<Value, BackendError> {
        let out = self.run("status", &["status", "--json"]).await?;
        serde_json::from_str(&out.stdout)
            .map_err(|e| BackendError::Protocol(format!("invalid status JSON from CLI: {e}")))
    }

    /// `up [flags]`
    pub async fn up(&self, options: &ConnectOptions) -> Result<Value, BackendError> {
        let args = up_args(options)?;
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let _guard = self.connection_lock.lock().await;
        let out = self.run("up", &argv).await?;
        Ok(json!({ "connected": true, "output": combined(&out) }))
    }

    /// `down`
    pub async fn down(&self) -> Result<Value, BackendError> {
        let _guard = self.connection_lock.lock().await;
        let out = self.run("down", &["down"]).await?;
        Ok(json!({ "connected": false, "output": combined(&out) }))
    }

    /// `ping -c <count> <target>`
    pub async fn ping(&self, target: &str, count: u32) -> Result<Value, BackendError> {
        let target = check_arg("target", target)?;
        let count = count.clamp(1, 100).to_string();
        let out = self.run("ping", &["ping", "-c", &count, target]).await?;
        Ok(json!({ "target": target, "output": combined(&out) }))
    }

    /// `version`
    pub async fn version(&self) -> Result<Value, BackendError> {
        let out = self.run("version", &["version"]).await?;
        let mut lines = out.stdout.lines();
        let version = lines.next().unwrap_or_default().trim().to_string();
        let details: Vec<&str> = lines.map(str::trim).filter(|l| !l.is_empty()).collect();
        Ok(json!({ "version": version, "details": details }))
    }

    /// Run the CLI with `args`, returning its output when it exits 0.
    pub async fn run(
        &self,
        operation: &'static str,
        args: &[&str],
    ) -> Result<CliOutput, BackendError> {
        debug!("running {} {}", self.cli_path, redacted(args));

        let mut child = Command::new(&self.cli_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::Spawn(format!("{}: {e}", self.cli_path)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::Spawn("failed to take stdout pipe".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| BackendError::Spawn("failed to take stderr pipe".to_string()))?;

        let result = tokio::time::timeout(self.timeout, async {
            // Read stdout and stderr concurrently to avoid pipe deadlock
            let (stdout_data, stderr_data) = tokio::join!(
                read_capped(&mut stdout, MAX_CLI_OUTPUT),
                read_capped(&mut stderr, MAX_CLI_OUTPUT),
            );
            let status = child
                .wait()
                .await
                .map_err(|e| BackendError::Spawn(e.to_string()))?;
            Ok::<_, BackendError>((status, stdout_data, stderr_data))
        })
        .await;

        #[allow(clippy::cast_possible_truncation)]
        let (status, stdout, stderr) = result.map_err(|_| BackendError::Timeout {
            operation,
            timeout_ms: self.timeout.as_millis() as u64,
        })??;

        if status.success() {
            Ok(CliOutput { stdout, stderr })
        } else {
            let message = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            Err(BackendError::Cli {
                code: status.code().unwrap_or(-1),
                stderr: message,
            })
        }
    }
}

/// Build the argv for `up` from validated options.
fn up_args(options: &ConnectOptions) -> Result<Vec<String>, BackendError> {
    let mut args = vec!["up".to_string()];
    if let Some(hostname) = &options.hostname {
        args.push(format!("--hostname={}", check_arg("hostname", hostname)?));
    }
    if options.accept_routes {
        args.push("--accept-routes".to_string());
    }
    if let Some(accept_dns) = options.accept_dns {
        args.push(format!("--accept-dns={accept_dns}"));
    }
    if !options.advertise_routes.is_empty() {
        for route in &options.advertise_routes {
            check_arg("advertise_routes", route)?;
        }
        args.push(format!(
            "--advertise-routes={}",
            options.advertise_routes.join(",")
        ));
    }
    if !options.advertise_tags.is_empty() {
        for tag in &options.advertise_tags {
            check_arg("advertise_tags", tag)?;
        }
        args.push(format!(
            "--advertise-tags={}",
            options.advertise_tags.join(",")
        ));
    }
    if let Some(exit_node) = &options.exit_node {
        args.push(format!("--exit-node={}", check_arg("exit_node", exit_node)?));
    }
    if let Some(auth_key) = &options.auth_key {
        args.push(format!("--auth-key={}", check_arg("auth_key", auth_key)?));
    }
    Ok(args)
}

/// Flags whose values are secrets and never reach the log.
const SECRET_FLAGS: &[&str] = &["--auth-key="];

/// Join `args` for logging with secret flag values masked.
fn redacted(args: &[&str]) -> String {
    args.iter()
        .map(|arg| match SECRET_FLAGS.iter().find(|flag| arg.starts_with(*flag)) {
            Some(flag) => format!("{flag}<redacted>"),
            None => (*arg).to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reject values that could be read as flags or smuggle separators.
fn check_arg<'a>(name: &str, value: &'a str) -> Result<&'a str, BackendError> {
    let invalid = |why: &str| BackendError::InvalidArgument(format!("{name} {why}"));
    if value.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value.len() > MAX_ARG_LEN {
        return Err(invalid("is too long"));
    }
    if value.starts_with('-') {
        return Err(invalid("must not start with '-'"));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '/');
    if !value.chars().all(allowed) {
        return Err(invalid("contains disallowed characters"));
    }
    Ok(value)
}

fn combined(out: &CliOutput) -> String {
    let mut text = out.stdout.trim().to_string();
    let stderr = out.stderr.trim();
    if !stderr.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr);
    }
    text
}

/// Read from an async reader, keeping the first `max_bytes` and discarding the
/// rest. Keeps reading past the cap so the child never blocks on a full pipe.
async fn read_capped(reader: &mut (impl tokio::io::AsyncRead + Unpin), max_bytes: usize) -> String {
    let mut buf = Vec::with_capacity(max_bytes.min(65536));
    let mut tmp = [0u8; 8192];
    let mut total_read = 0usize;
    loop {
        match reader.read(&mut tmp).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                total_read += n;
                if buf.len() < max_bytes {
                    let take = n.min(max_bytes - buf.len());
                    buf.extend_from_slice(&tmp[..take]);
                }
            }
        }
    }
    let mut s = String::from_utf8_lossy(&buf).into_owned();
    if total_read > max_bytes {
        let _ = write!(
            s,
            "\n[truncated: {total_read} bytes total, showing first {max_bytes}]"
        );
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_arg_accepts_hostnames_and_cidrs() {
        assert!(check_arg("target", "nas.tail1234.ts.net").is_ok());
        assert!(check_arg("target", "100.64.0.1").is_ok());
        assert!(check_arg("route", "10.0.0.0/24").is_ok());
        assert!(check_arg("tag", "tag:server").is_ok());
    }

    #[test]
    fn check_arg_rejects_flags_and_separators() {
        assert!(check_arg("target", "--socket=/tmp/x").is_err());
        assert!(check_arg("target", "host;rm -rf /").is_err());
        assert!(check_arg("target", "a b").is_err());
        assert!(check_arg("target", "").is_err());
        assert!(check_arg("target", &"a".repeat(300)).is_err());
    }

    #[test]
    fn up_args_map_options_to_flags() {
        let options = ConnectOptions {
            hostname: Some("build-box".into()),
            accept_routes: true,
            accept_dns: Some(false),
            advertise_routes: vec!["10.0.0.0/24".into(), "10.1.0.0/16".into()],
            advertise_tags: vec!["tag:ci".into()],
            exit_node: None,
            auth_key: None,
        };
        assert_eq!(
            up_args(&options).unwrap(),
            vec![
                "up",
                "--hostname=build-box",
                "--accept-routes",
                "--accept-dns=false",
                "--advertise-routes=10.0.0.0/24,10.1.0.0/16",
                "--advertise-tags=tag:ci",
            ]
        );
    }

    #[test]
    fn auth_key_is_masked_in_logged_argv() {
        let options = ConnectOptions {
            hostname: Some("ci-runner".into()),
            auth_key: Some("tskey-auth-k123".into()),
            ..ConnectOptions::default()
        };
        let args = up_args(&options).unwrap();
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        assert!(argv.contains(&"--auth-key=tskey-auth-k123"));

        let logged = redacted(&argv);
        assert_eq!(logged, "up --hostname=ci-runner --auth-key=<redacted>");
        assert!(!logged.contains("tskey-auth-k123"));
    }

    #[test]
    fn up_args_reject_bad_route() {
        let options = ConnectOptions {
            advertise_routes: vec!["10.0.0.0/24,--reset".into()],
            ..ConnectOptions::default()
        };
        assert!(up_args(&options).is_err());
    }

    #[test]
    fn combined_joins_streams() {
        let out = CliOutput {
            stdout: "ok\n".into(),
            stderr: "warning: x\n".into(),
        };
        assert_eq!(combined(&out), "ok\nwarning: x");
    }

    #[tokio::test]
    async fn read_capped_truncates() {
        let data = vec![b'a'; 100];
        let mut reader = &data[..];
        let s = read_capped(&mut reader, 10).await;
        assert!(s.starts_with("aaaaaaaaaa\n[truncated: 100 bytes total"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_reports_non_zero_exit() {
        let cli = CliBackend::new("false", 5_000);
        let err = cli.run("false", &[]).await.unwrap_err();
        assert!(matches!(err, BackendError::Cli { code: 1, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_times_out() {
        let cli = CliBackend::new("sleep", 50);
        let err = cli.run("sleep", &["5"]).await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout { operation: "sleep", .. }));
    }
}
