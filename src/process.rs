//! Running external tools.
//!
//! Everything the crate knows about child processes goes through [`ProcessRunner`], which keeps
//! the dispatcher independent of what is actually installed on the machine.

use log::debug;
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::instrument;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A single external command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Kill the process once this much time has passed.
    pub timeout: Option<Duration>,
    /// Let the tool write straight to our stdout/stderr instead of capturing.
    pub echo: bool,
}

impl Invocation {
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            timeout: None,
            echo: false,
        }
    }

    pub fn arg<S: Into<OsString>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// The program name as it was given, used in diagnostics.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Code(i32),
    /// Killed by a signal we did not send.
    Signal,
    /// Killed by the runner after exceeding [`Invocation::timeout`].
    TimedOut,
}

impl From<ExitStatus> for Exit {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => Exit::Code(code),
            None => Exit::Signal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit: Exit,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit == Exit::Code(0)
    }
}

/// Executes invocations. `Err` means the process could not be started.
pub trait ProcessRunner: Sync {
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput>;
}

/// Runs invocations as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    #[instrument(skip(self), fields(program = %invocation.program.display()))]
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        debug!("Running command: {invocation}");
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).stdin(Stdio::null());
        if invocation.echo {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        let mut child = command.spawn()?;

        // both pipes are drained concurrently
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let exit = match invocation.timeout {
            None => Exit::from(child.wait()?),
            Some(limit) => wait_with_timeout(&mut child, limit)?,
        };

        if exit == Exit::TimedOut {
            // Grandchildren may still hold the pipes open, don't wait for the readers.
            return Ok(ProcessOutput {
                exit,
                stdout: String::new(),
                stderr: String::new(),
            });
        }

        Ok(ProcessOutput {
            exit,
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }
}

fn wait_with_timeout(child: &mut Child, limit: Duration) -> io::Result<Exit> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Exit::from(status));
        }
        if start.elapsed() >= limit {
            match child.kill() {
                Ok(()) => {}
                // already exited between try_wait and kill
                Err(error) if error.kind() == io::ErrorKind::InvalidInput => {}
                Err(error) => return Err(error),
            }
            child.wait()?;
            return Ok(Exit::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        // a read error only truncates diagnostics
        let _ = pipe.read_to_end(&mut buffer);
        buffer
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Keeps the tail of a tool's stderr, which is where converters put the actual error.
pub fn stderr_excerpt(stderr: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
