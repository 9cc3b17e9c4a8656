use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use pyreset_core::ToolError;
use tracing::debug;

/// Applied when an invocation does not set its own limit.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);
/// Interpreter and tool version probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Interpreter builds and installer scripts.
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// One external command, described without spawning it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program file name, used in error messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(status: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            status: status.into(),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs external commands. Implementations must enforce `Invocation::timeout`.
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError>;
}

impl<F> CommandRunner for F
where
    F: Fn(&Invocation) -> Result<ToolOutput, ToolError> + Send + Sync,
{
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        self(invocation)
    }
}

/// Runs `invocation` and returns its stdout, turning a non-zero exit into
/// [`ToolError::Failed`].
pub fn run_checked(runner: &dyn CommandRunner, invocation: &Invocation) -> Result<String, ToolError> {
    let output = runner.run(invocation)?;
    if output.success {
        return Ok(output.stdout);
    }
    let stderr = if output.stderr.trim().is_empty() {
        output.stdout.trim().to_string()
    } else {
        output.stderr.trim().to_string()
    };
    Err(ToolError::Failed {
        program: invocation.program_name(),
        status: output.status,
        stderr,
    })
}

/// Spawns real child processes with piped output and a wall-clock deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        let program = invocation.program_name();
        debug!(command = %invocation.command_line(), "running external tool");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &invocation.envs {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|err| spawn_error(&program, err))?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_with_deadline(&mut child, invocation.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                debug!(%program, "external tool timed out");
                return Err(ToolError::Timeout {
                    program,
                    timeout_ms: invocation.timeout.as_millis() as u64,
                });
            }
            Err(err) => {
                let _ = child.kill();
                return Err(ToolError::Io {
                    program,
                    message: err.to_string(),
                });
            }
        };

        Ok(ToolOutput {
            success: status.success(),
            status: status.to_string(),
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        })
    }
}

fn spawn_error(program: &str, err: io::Error) -> ToolError {
    if err.kind() == io::ErrorKind::NotFound {
        ToolError::NotFound {
            program: program.to_string(),
        }
    } else {
        ToolError::Io {
            program: program.to_string(),
            message: err.to_string(),
        }
    }
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R>(reader: Option<R>) -> Option<thread::JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    reader.map(|mut reader| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = reader.read_to_end(&mut buffer);
            buffer
        })
    })
}

fn join_reader(handle: Option<thread::JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Platform shell invocation for a downloaded installer script.
pub fn script_invocation(script: &Path, windows: bool) -> Invocation {
    let invocation = if windows {
        Invocation::new("powershell").args([
            "-NoProfile".to_string(),
            "-ExecutionPolicy".to_string(),
            "Bypass".to_string(),
            "-File".to_string(),
            script.display().to_string(),
        ])
    } else {
        Invocation::new("sh").arg(script.display().to_string())
    };
    invocation.timeout(INSTALL_TIMEOUT)
}
