use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::types::GenerateOptions;
use crate::{GenerationError, Result};

// ─── ClaudeProcess ────────────────────────────────────────────────────────

/// A running `claude --print` subprocess.
///
/// The prompt goes in on stdin, the finished report comes back on stdout,
/// diagnostics on stderr. The child is spawned with `kill_on_drop`, so
/// dropping a `ClaudeProcess` (for example when its task is aborted) kills
/// the CLI.
pub(crate) struct ClaudeProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

/// Everything the CLI produced, once it has exited.
#[derive(Debug)]
pub(crate) struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutput {
    /// The report text, or the CLI's complaint about why there isn't one.
    ///
    /// A zero exit with empty stdout still counts as a failure.
    pub fn into_report(self) -> Result<String> {
        if self.status.success() && !self.stdout.is_empty() {
            return Ok(self.stdout);
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return Err(GenerationError::Process(stderr.to_string()));
        }
        let msg = match self.status.code() {
            Some(0) => "Process failed: no output".to_string(),
            Some(code) => format!("Process failed with exit code {code}"),
            None => "Process failed: terminated by signal".to_string(),
        };
        Err(GenerationError::Process(msg))
    }
}

impl ClaudeProcess {
    /// Spawn the configured CLI.
    ///
    /// `CLAUDECODE` is removed from the environment so this works both from a
    /// terminal and from a server launched inside a Claude session.
    pub(crate) fn spawn(opts: &GenerateOptions) -> Result<Self> {
        let mut cmd = Command::new(&opts.command);
        cmd.args(&opts.args);
        cmd.env_remove("CLAUDECODE");
        for (k, v) in &opts.env {
            cmd.env(k, v);
        }
        Self::from_command(cmd, &opts.command)
    }

    fn from_command(mut cmd: Command, name: &str) -> Result<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| GenerationError::Launch {
            command: name.to_string(),
            source,
        })?;

        Ok(Self {
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
            child,
        })
    }

    pub(crate) fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Feed `prompt` to stdin, collect all output and wait for exit, giving
    /// up after `limit`. On timeout the process is killed and reaped before
    /// returning.
    pub(crate) async fn communicate(
        &mut self,
        prompt: &str,
        limit: Duration,
    ) -> Result<ProcessOutput> {
        let started = Instant::now();
        match tokio::time::timeout(limit, self.collect(prompt)).await {
            Ok(Ok((status, stdout, stderr))) => Ok(ProcessOutput {
                status,
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                elapsed: started.elapsed(),
            }),
            Ok(Err(e)) => {
                self.kill().await;
                Err(e)
            }
            Err(_) => {
                warn!(pid = ?self.id(), limit_secs = limit.as_secs(), "CLI timed out; killing");
                self.kill().await;
                Err(GenerationError::Timeout(limit))
            }
        }
    }

    async fn collect(&mut self, prompt: &str) -> Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
        let stdout = self
            .stdout
            .take()
            .ok_or_else(|| GenerationError::Process("stdout not captured".into()))?;
        let stderr = self
            .stderr
            .take()
            .ok_or_else(|| GenerationError::Process("stderr not captured".into()))?;

        // Write and read concurrently: a CLI that streams output while still
        // reading stdin would otherwise deadlock on a full pipe.
        let (written, out, err) = tokio::join!(
            write_prompt(self.stdin.take(), prompt),
            read_all(stdout),
            read_all(stderr),
        );
        written?;
        let (out, err) = (out?, err?);

        let status = self.child.wait().await?;
        debug!(?status, stdout_bytes = out.len(), stderr_bytes = err.len(), "CLI exited");
        Ok((status, out, err))
    }

    /// Kill and reap the subprocess (best-effort; errors are ignored).
    pub(crate) async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }

    #[cfg(test)]
    pub(crate) fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }
}

/// Write the prompt and close stdin. A CLI that exits without reading its
/// input shows up as a broken pipe, which is not an error here.
async fn write_prompt(stdin: Option<ChildStdin>, prompt: &str) -> Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    let res = async {
        stdin.write_all(prompt.as_bytes()).await?;
        stdin.shutdown().await
    }
    .await;
    match res {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(GenerationError::Io(e)),
    }
}

async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(buf)
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> GenerateOptions {
        GenerateOptions {
            command: "sh".into(),
            args: vec!["-c".into(), script.into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn prompt_is_delivered_on_stdin() {
        let mut process = ClaudeProcess::spawn(&sh("cat")).unwrap();
        let output = process
            .communicate("hello from the prompt", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, "hello from the prompt");
        assert_eq!(output.into_report().unwrap(), "hello from the prompt");
    }

    #[tokio::test]
    async fn large_prompt_does_not_deadlock() {
        let prompt = "x".repeat(1 << 20);
        let mut process = ClaudeProcess::spawn(&sh("cat")).unwrap();
        let output = process
            .communicate(&prompt, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(output.stdout.len(), prompt.len());
    }

    #[tokio::test]
    async fn process_that_ignores_stdin_is_fine() {
        let mut process = ClaudeProcess::spawn(&sh("printf done")).unwrap();
        let output = process
            .communicate(&"ignored ".repeat(50_000), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output.into_report().unwrap(), "done");
    }

    #[tokio::test]
    async fn claudecode_env_is_removed() {
        std::env::set_var("CLAUDECODE", "1");
        let mut process = ClaudeProcess::spawn(&sh("printf \"[${CLAUDECODE:-unset}]\"")).unwrap();
        let output = process
            .communicate("", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output.stdout, "[unset]");
    }

    #[tokio::test]
    async fn extra_env_is_passed_through() {
        let mut opts = sh("printf \"$REPORT_TONE\"");
        opts.env.insert("REPORT_TONE".into(), "calm".into());
        let mut process = ClaudeProcess::spawn(&opts).unwrap();
        let output = process.communicate("", Duration::from_secs(5)).await.unwrap();
        assert_eq!(output.stdout, "calm");
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_stderr() {
        let mut process =
            ClaudeProcess::spawn(&sh("echo 'not logged in' >&2; exit 3")).unwrap();
        let output = process.communicate("", Duration::from_secs(5)).await.unwrap();
        assert_eq!(output.status.code(), Some(3));
        let err = output.into_report().unwrap_err();
        assert!(matches!(err, GenerationError::Process(ref m) if m == "not logged in"));
    }

    #[tokio::test]
    async fn nonzero_exit_without_stderr_is_generic() {
        let mut process = ClaudeProcess::spawn(&sh("exit 2")).unwrap();
        let output = process.communicate("", Duration::from_secs(5)).await.unwrap();
        let err = output.into_report().unwrap_err();
        assert_eq!(err.to_string(), "Process failed with exit code 2");
    }

    #[tokio::test]
    async fn empty_output_is_a_failure() {
        let mut process = ClaudeProcess::spawn(&sh("cat > /dev/null")).unwrap();
        let output = process.communicate("prompt", Duration::from_secs(5)).await.unwrap();
        assert!(output.status.success());
        assert!(matches!(
            output.into_report(),
            Err(GenerationError::Process(_))
        ));
    }

    #[tokio::test]
    async fn missing_binary_is_a_launch_error() {
        let opts = GenerateOptions {
            command: "__no_such_report_cli__".into(),
            ..Default::default()
        };
        let err = ClaudeProcess::spawn(&opts).err().unwrap();
        assert!(matches!(err, GenerationError::Launch { .. }));
        assert!(err.to_string().contains("__no_such_report_cli__"));
    }

    #[tokio::test]
    async fn timeout_kills_the_process() {
        let mut process = ClaudeProcess::spawn(&sh("exec sleep 30")).unwrap();
        assert!(process.id().is_some());
        let started = Instant::now();
        let err = process
            .communicate("", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
        // Already reaped: no lingering child.
        assert!(process.try_wait().unwrap().is_some());
        assert!(process.id().is_none());
    }
}
