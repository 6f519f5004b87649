//! Pipeline execution
//!
//! Spawns every stage left to right, wiring fds from the redirect plan:
//! fresh close-on-exec pipes between stages, files opened relative to the
//! working directory, stderr fused or diverted as required. The driver
//! drains the final stage's stdout and stderr concurrently (either stream
//! could exceed the pipe buffer while the other blocks), then reads the
//! residual pipes and diverted temp files, then reaps every child in order
//! and folds the exit codes.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command as Process, Stdio};
use std::thread;

use log::debug;
use tempfile::NamedTempFile;

use crate::ast::{Command, Pipeline};
use crate::resolver;

use super::wiring::{apply_redirects, plan_wiring, OpenMode, WirePlan};
use super::{decode_output, exit_code_of, ExecContext, ExecError, ExecutedCommand};

struct PipePair {
    read: File,
    write: File,
}

#[cfg(unix)]
fn new_pipe() -> io::Result<PipePair> {
    use std::os::unix::io::FromRawFd;
    let mut fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    for fd in fds {
        unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) };
    }
    // SAFETY: both fds were just returned by pipe(2) and are owned here.
    Ok(PipePair {
        read: unsafe { File::from_raw_fd(fds[0]) },
        write: unsafe { File::from_raw_fd(fds[1]) },
    })
}

#[cfg(not(unix))]
fn new_pipe() -> io::Result<PipePair> {
    // No raw pipe plumbing on this host; a shared temp file stands in. The
    // external shell is the first-class path here.
    let tmp = NamedTempFile::new()?;
    let read = tmp.reopen()?;
    let write = tmp.into_file();
    Ok(PipePair { read, write })
}

/// Book-keeping for one spawned stage.
struct SpawnedCommand {
    command: Command,
    child: Child,
    /// Read end of the stdout pipe; retained for residual draining even
    /// when the next stage consumes a dup of it.
    stdout_pipe: Option<File>,
    /// Read end of a live stderr pipe (final stage, or promoted stderr).
    stderr_pipe: Option<File>,
    /// Diversion file holding a non-final stage's stderr.
    stderr_temp: Option<File>,
    /// Stderr was promoted to carry stdout; relabel on capture.
    stderr_is_stdout: bool,
}

/// Run one pipeline, appending a result record per stage.
pub(crate) fn execute_pipeline(
    pipeline: &Pipeline,
    ctx: &ExecContext<'_>,
    results: &mut Vec<ExecutedCommand>,
) -> Result<i32, ExecError> {
    if pipeline.commands.is_empty() {
        return Err(ExecError::Internal {
            command: None,
            message: "empty pipeline".to_string(),
        });
    }

    let mut spawned: Vec<SpawnedCommand> = Vec::with_capacity(pipeline.commands.len());
    // Stand-ins for /dev/null; deleted on drop, so every exit path cleans up.
    let mut null_files: Vec<NamedTempFile> = Vec::new();

    let outcome = run_pipeline(pipeline, ctx, &mut spawned, &mut null_files, results);
    if outcome.is_err() {
        reap_abandoned(&mut spawned);
    }
    outcome
}

fn run_pipeline(
    pipeline: &Pipeline,
    ctx: &ExecContext<'_>,
    spawned: &mut Vec<SpawnedCommand>,
    null_files: &mut Vec<NamedTempFile>,
    results: &mut Vec<ExecutedCommand>,
) -> Result<i32, ExecError> {
    let last_index = pipeline.commands.len() - 1;
    let mut input: Option<File> = None;

    for (i, command) in pipeline.commands.iter().enumerate() {
        let sc = spawn_command(command, i == last_index, &mut input, ctx, null_files)?;
        spawned.push(sc);
    }
    drop(input);

    let n = spawned.len();
    let (last_out, last_err) = drain_final_stage(&mut spawned[n - 1])?;
    let mut captured: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    captured.resize_with(n, Default::default);
    captured[n - 1] = (last_out, last_err);

    // Residual pipe reads for earlier stages: present when the downstream
    // stage did not consume its input, or when stderr was promoted.
    for (i, sc) in spawned.iter_mut().enumerate().take(n - 1) {
        if let Some(mut f) = sc.stdout_pipe.take() {
            captured[i].0 = read_stream(&mut f, &sc.command)?;
        }
        if let Some(mut f) = sc.stderr_pipe.take() {
            captured[i].1 = read_stream(&mut f, &sc.command)?;
        }
    }

    // Recover diverted stderr from the temp files.
    for (i, sc) in spawned.iter_mut().enumerate() {
        if let Some(mut f) = sc.stderr_temp.take() {
            f.seek(SeekFrom::Start(0))
                .map_err(|e| ExecError::internal(&sc.command, e.to_string()))?;
            captured[i].1 = read_stream(&mut f, &sc.command)?;
        }
    }

    // Reap in order and fold the exits.
    let mut exit_code: Option<i32> = None;
    for (i, sc) in spawned.iter_mut().enumerate() {
        let status = sc
            .child
            .wait()
            .map_err(|e| ExecError::internal(&sc.command, e.to_string()))?;
        let res = exit_code_of(status);
        if is_sigint(res) {
            return Err(ExecError::Interrupted);
        }

        let (out_bytes, err_bytes) = std::mem::take(&mut captured[i]);
        let mut stdout = decode_output(&out_bytes);
        let mut stderr = decode_output(&err_bytes);
        if sc.stderr_is_stdout {
            stdout = std::mem::take(&mut stderr);
        }
        results.push(ExecutedCommand {
            command: sc.command.clone(),
            stdout,
            stderr,
            exit: res,
        });

        exit_code = Some(match exit_code {
            None => res,
            Some(_) if !pipeline.pipe_err => res,
            Some(current) => {
                // Signal deaths (negative) fold via min, error codes via max.
                if res < 0 {
                    current.min(res)
                } else {
                    current.max(res)
                }
            }
        });
    }

    let mut code = exit_code.unwrap_or(0);
    if pipeline.negate {
        code = if code == 0 { 1 } else { 0 };
    }
    Ok(code)
}

/// Read the final stage's stdout and stderr to EOF, concurrently.
fn drain_final_stage(last: &mut SpawnedCommand) -> Result<(Vec<u8>, Vec<u8>), ExecError> {
    let command = last.command.clone();
    let stderr_reader = last.stderr_pipe.take().map(|mut f| {
        thread::spawn(move || -> io::Result<Vec<u8>> {
            let mut buf = Vec::new();
            f.read_to_end(&mut buf)?;
            Ok(buf)
        })
    });
    let mut out = Vec::new();
    if let Some(mut f) = last.stdout_pipe.take() {
        f.read_to_end(&mut out)
            .map_err(|e| ExecError::internal(&command, format!("cannot read output: {}", e)))?;
    }
    let err = match stderr_reader {
        Some(handle) => handle
            .join()
            .unwrap_or_else(|_| Ok(Vec::new()))
            .map_err(|e| ExecError::internal(&command, format!("cannot read output: {}", e)))?,
        None => Vec::new(),
    };
    Ok((out, err))
}

fn read_stream(f: &mut File, command: &Command) -> Result<Vec<u8>, ExecError> {
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)
        .map_err(|e| ExecError::internal(command, format!("cannot read output: {}", e)))?;
    Ok(buf)
}

fn spawn_command(
    command: &Command,
    is_last: bool,
    input: &mut Option<File>,
    ctx: &ExecContext<'_>,
    null_files: &mut Vec<NamedTempFile>,
) -> Result<SpawnedCommand, ExecError> {
    let slots = apply_redirects(command).map_err(|m| ExecError::internal(command, m))?;
    let mut plans = plan_wiring(&slots).map_err(|m| ExecError::internal(command, m))?;

    // Fuse stderr into stdout. When stdout is not itself a pipe, stderr is
    // promoted to a fresh pipe and relabelled as stdout on capture. A live
    // stderr pipe is otherwise reserved for the final stage; earlier stages
    // divert to a temp file so a filled pipe cannot block them.
    let mut stderr_is_stdout = false;
    let mut divert_stderr = false;
    if plans[2] == WirePlan::MergeStdout && plans[1] != WirePlan::NewPipe {
        plans[2] = WirePlan::NewPipe;
        stderr_is_stdout = true;
    } else if plans[2] == WirePlan::NewPipe && !is_last {
        divert_stderr = true;
    }

    let name = command
        .args
        .first()
        .ok_or_else(|| ExecError::internal(command, "empty command"))?;
    let exe = resolver::which(name, ctx.path())
        .ok_or_else(|| ExecError::internal(command, format!("{}: command not found", name)))?;

    let mut argv: Vec<String> = command.args[1..].to_vec();
    if ctx.avoid_dev_null {
        for arg in &mut argv {
            if arg == "/dev/null" {
                let tmp = NamedTempFile::new()
                    .map_err(|e| ExecError::internal(command, e.to_string()))?;
                *arg = tmp.path().to_string_lossy().into_owned();
                null_files.push(tmp);
            }
        }
    }

    // Stdout first so a merged stderr can share its handle.
    let mut stdout_read: Option<File> = None;
    let stdout_handle: File = match &plans[1] {
        WirePlan::NewPipe => {
            let pair = new_pipe().map_err(|e| ExecError::internal(command, e.to_string()))?;
            stdout_read = Some(pair.read);
            pair.write
        }
        WirePlan::File { path, mode } => {
            open_redirect_file(path, *mode, ctx).map_err(|m| ExecError::internal(command, m))?
        }
        WirePlan::Input | WirePlan::MergeStdout => {
            return Err(ExecError::internal(command, "Unsupported redirect on stdout"))
        }
    };

    let mut stderr_read: Option<File> = None;
    let mut stderr_temp: Option<File> = None;
    let stderr_handle: File = if divert_stderr {
        let f = tempfile::tempfile().map_err(|e| ExecError::internal(command, e.to_string()))?;
        stderr_temp = Some(
            f.try_clone()
                .map_err(|e| ExecError::internal(command, e.to_string()))?,
        );
        f
    } else {
        match &plans[2] {
            WirePlan::NewPipe => {
                let pair = new_pipe().map_err(|e| ExecError::internal(command, e.to_string()))?;
                stderr_read = Some(pair.read);
                pair.write
            }
            WirePlan::MergeStdout => stdout_handle
                .try_clone()
                .map_err(|e| ExecError::internal(command, e.to_string()))?,
            WirePlan::File { path, mode } => {
                if slots[1] == slots[2] {
                    // Both streams share one open file so their writes
                    // interleave through a single cursor.
                    stdout_handle
                        .try_clone()
                        .map_err(|e| ExecError::internal(command, e.to_string()))?
                } else {
                    open_redirect_file(path, *mode, ctx)
                        .map_err(|m| ExecError::internal(command, m))?
                }
            }
            WirePlan::Input => match input.as_ref() {
                Some(f) => f
                    .try_clone()
                    .map_err(|e| ExecError::internal(command, e.to_string()))?,
                None => {
                    let pair =
                        new_pipe().map_err(|e| ExecError::internal(command, e.to_string()))?;
                    stderr_read = Some(pair.read);
                    pair.write
                }
            },
        }
    };

    // Stdin last: it may consume the incoming pipe.
    let mut close_child_stdin = false;
    let stdin_stdio: Stdio = match &plans[0] {
        WirePlan::Input => match input.take() {
            Some(f) => Stdio::from(f),
            None => {
                close_child_stdin = true;
                Stdio::piped()
            }
        },
        WirePlan::File { path, mode } => Stdio::from(
            open_redirect_file(path, *mode, ctx).map_err(|m| ExecError::internal(command, m))?,
        ),
        WirePlan::NewPipe | WirePlan::MergeStdout => {
            return Err(ExecError::internal(command, "Unsupported redirect for stdin"))
        }
    };

    debug!("spawning {} {:?} in {}", exe.display(), argv, ctx.cwd.display());
    let mut proc = Process::new(&exe);
    proc.args(&argv)
        .current_dir(ctx.cwd)
        .env_clear()
        .envs(ctx.environment)
        .stdin(stdin_stdio)
        .stdout(Stdio::from(stdout_handle))
        .stderr(Stdio::from(stderr_handle));
    let mut child = proc
        .spawn()
        .map_err(|e| ExecError::internal(command, format!("{}: {}", exe.display(), e)))?;

    // Never write into a child's stdin; close our end right away.
    if close_child_stdin {
        drop(child.stdin.take());
    }

    // Route the next stage's input from this stage's output.
    *input = match (&stdout_read, stderr_is_stdout, &stderr_read) {
        (Some(read_end), _, _) => Some(
            read_end
                .try_clone()
                .map_err(|e| ExecError::internal(command, e.to_string()))?,
        ),
        (None, true, Some(read_end)) => Some(
            read_end
                .try_clone()
                .map_err(|e| ExecError::internal(command, e.to_string()))?,
        ),
        _ => None,
    };

    Ok(SpawnedCommand {
        command: command.clone(),
        child,
        stdout_pipe: stdout_read,
        stderr_pipe: stderr_read,
        stderr_temp,
        stderr_is_stdout,
    })
}

/// Open a redirect target relative to the pipeline's working directory.
fn open_redirect_file(path: &str, mode: OpenMode, ctx: &ExecContext<'_>) -> Result<File, String> {
    if ctx.avoid_dev_null && path == "/dev/null" {
        return tempfile::tempfile().map_err(|e| e.to_string());
    }
    let resolved = resolve_against_cwd(path, ctx.cwd);
    let opened = match mode {
        OpenMode::Read => File::open(&resolved),
        OpenMode::Write => File::create(&resolved),
        OpenMode::Append => OpenOptions::new()
            .create(true)
            .append(true)
            .open(&resolved)
            .and_then(|mut f| {
                // Position explicitly at the end; appends have started at
                // offset zero on some platforms.
                f.seek(SeekFrom::End(0))?;
                Ok(f)
            }),
    };
    opened.map_err(|e| format!("{}: {}", path, e))
}

fn resolve_against_cwd(path: &str, cwd: &Path) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        cwd.join(p)
    }
}

fn reap_abandoned(spawned: &mut [SpawnedCommand]) {
    for sc in spawned.iter_mut() {
        let _ = sc.child.kill();
        let _ = sc.child.wait();
    }
}

#[cfg(unix)]
fn is_sigint(code: i32) -> bool {
    code == -libc::SIGINT
}

#[cfg(not(unix))]
fn is_sigint(_code: i32) -> bool {
    false
}
