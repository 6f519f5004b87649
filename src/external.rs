//! External shell execution
//!
//! Materializes the substituted script to disk and runs it under a host
//! shell with the same semantics as the internal interpreter: fail-fast
//! chaining between lines and optional pipefail.

use std::io;
use std::path::Path;

use log::debug;

use crate::config::{RunnerConfig, Test};
use crate::exec::{decode_output, exit_code_of};

/// Render the script file contents.
///
/// CMD gets an explicit errorlevel check between lines; POSIX shells get
/// each line wrapped in `{ ...; }` and chained with `&&`, optionally under
/// `set -o pipefail`.
pub(crate) fn render_script(commands: &[String], pipefail: bool, windows_cmd: bool) -> String {
    let mut content = String::new();
    if windows_cmd {
        content.push_str(&commands.join("\nif %ERRORLEVEL% NEQ 0 EXIT\n"));
    } else {
        if pipefail {
            content.push_str("set -o pipefail;");
        }
        content.push_str("{ ");
        content.push_str(&commands.join("; } &&\n{ "));
        content.push_str("; }");
    }
    content.push('\n');
    content
}

/// Write the script next to the test's other artifacts and run it.
///
/// Returns the child's decoded stdout, stderr, and exit code.
pub fn execute_script_external(
    test: &Test,
    runner: &RunnerConfig,
    tmp_base: &str,
    commands: &[String],
    cwd: &Path,
) -> io::Result<(String, String, i32)> {
    let bash = runner.bash_path.as_ref();
    let windows_cmd = runner.is_windows && bash.is_none();

    let mut script = format!("{}.script", tmp_base);
    if windows_cmd {
        script.push_str(".bat");
    }
    std::fs::write(&script, render_script(commands, test.config.pipefail, windows_cmd))?;

    let mut argv: Vec<String> = if windows_cmd {
        vec!["cmd".to_string(), "/c".to_string(), script]
    } else {
        let shell = bash
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/bin/sh".to_string());
        vec![shell, script]
    };
    if runner.use_valgrind {
        let mut wrapped = runner.valgrind_args.clone();
        wrapped.append(&mut argv);
        argv = wrapped;
    }

    debug!("running script via {:?}", argv);
    let output = std::process::Command::new(&argv[0])
        .args(&argv[1..])
        .current_dir(cwd)
        .env_clear()
        .envs(&test.config.environment)
        .output()?;

    Ok((
        decode_output(&output.stdout),
        decode_output(&output.stderr),
        exit_code_of(output.status),
    ))
}
