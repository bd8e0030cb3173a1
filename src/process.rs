//! Running the external tools of the clustering pipeline.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

pub const SORT: &str = "sort";
pub const PARACLU: &str = "paraclu";
pub const PARACLU_CUT: &str = "paraclu-cut.sh";

/// Chromosome, strand, then site ascending.
pub const SITE_SORT_KEYS: [&str; 3] = ["-k1,1", "-k2,2", "-k3n,3"];
/// As `SITE_SORT_KEYS`, then count descending. Used before paraclu-cut.
pub const CLUSTER_SORT_KEYS: [&str; 4] = ["-k1,1", "-k2,2", "-k3n,3", "-k4nr,4"];

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Locations of the external executables and the per-call time limit.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub sort: PathBuf,
    pub paraclu: PathBuf,
    pub paraclu_cut: PathBuf,
    pub timeout: Option<Duration>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            sort: PathBuf::from(SORT),
            paraclu: PathBuf::from(PARACLU),
            paraclu_cut: PathBuf::from(PARACLU_CUT),
            timeout: None,
        }
    }
}

impl Toolchain {
    pub fn sort_command(&self, keys: &[&str], input: &Path) -> Command {
        let mut command = Command::new(&self.sort);
        command.args(keys).arg(input);
        command
    }

    pub fn paraclu_command(&self, min_data_value: &str, input: &Path) -> Command {
        let mut command = Command::new(&self.paraclu);
        command.arg(min_data_value).arg(input);
        command
    }

    pub fn paraclu_cut_command(
        &self,
        max_cluster_size: &str,
        min_density_increase: &str,
        input: &Path,
    ) -> Command {
        let mut command = Command::new(&self.paraclu_cut);
        command
            .args(["-l", max_cluster_size])
            .args(["-d", min_density_increase])
            .arg(input);
        command
    }

    /// Run `command` with its stdout redirected into `output`. See [`run_to_file`].
    pub fn run(&self, command: Command, output: &File) -> Result<()> {
        run_to_file(command, output, self.timeout)
    }
}

/// Render a command the way it would be typed in a shell, for logging.
pub fn command_line(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

fn tool_name(command: &Command) -> String {
    Path::new(command.get_program())
        .file_name()
        .unwrap_or_else(|| command.get_program())
        .to_string_lossy()
        .into_owned()
}

/// Spawn `command` with stdout written to `output` and stderr captured, and block until it
/// exits. A non-zero exit status, a failure to start, or exceeding `timeout` is an error.
/// With a timeout the tool runs in its own process group, and on expiry the whole group is
/// killed and the child reaped before returning.
pub fn run_to_file(mut command: Command, output: &File, timeout: Option<Duration>) -> Result<()> {
    let tool = tool_name(&command);
    log::debug!("    {}", command_line(&command));

    // stderr goes to an anonymous file so a chatty tool cannot fill a pipe while we poll
    let mut stderr_file = tempfile::tempfile()?;
    command
        .stdin(Stdio::null())
        .stdout(Stdio::from(output.try_clone()?))
        .stderr(Stdio::from(stderr_file.try_clone()?));
    if timeout.is_some() {
        own_process_group(&mut command);
    }

    let start = Instant::now();
    let mut child = command.spawn().map_err(|source| Error::Spawn {
        tool: tool.clone(),
        source,
    })?;

    let status = wait(&mut child, &tool, timeout)?;
    let stderr = read_captured(&mut stderr_file)?;
    log::debug!("    {} finished in {:.3?}", tool, start.elapsed());

    if !status.success() {
        return Err(Error::ToolFailed {
            tool,
            status,
            stderr,
        });
    }
    if !stderr.is_empty() {
        log::debug!("    {} stderr: {}", tool, stderr);
    }
    Ok(())
}

fn wait(child: &mut Child, tool: &str, timeout: Option<Duration>) -> Result<ExitStatus> {
    let Some(timeout) = timeout else {
        return Ok(child.wait()?);
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if start.elapsed() >= timeout {
            log::warn!("{} exceeded {:?}, killing it", tool, timeout);
            kill_group(child);
            child.wait()?;
            return Err(Error::Timeout {
                tool: tool.to_string(),
                timeout,
            });
        }
        thread::sleep(POLL_INTERVAL.min(timeout.saturating_sub(start.elapsed())));
    }
}

#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

/// Kill the child and everything it started. The child may already have exited.
#[cfg(unix)]
fn kill_group(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
        log::debug!("killpg {} failed: {}", child.id(), e);
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

fn read_captured(file: &mut File) -> Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).trim().to_string())
}
