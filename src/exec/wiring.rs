//! Redirect resolution
//!
//! Each command gets a three-slot table for stdin/stdout/stderr. Slots start
//! as `Std(n)` sentinels meaning "inherit the current wiring for fd n";
//! redirects overwrite them left to right, so a later redirect wins. A dup
//! copies whatever the named slot holds at that point. The concrete wiring
//! plan is then a pure function of the final table.

use crate::ast::{Command, Redirect};

/// Open mode for a file-valued slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenMode {
    Read,
    Write,
    Append,
}

/// One slot of the redirect table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slot {
    /// Sentinel: the default wiring for fd `n`.
    Std(u32),
    File { path: String, mode: OpenMode },
}

fn file(path: &str, mode: OpenMode) -> Slot {
    Slot::File {
        path: path.to_string(),
        mode,
    }
}

/// Apply a command's redirects to the initial sentinel table.
///
/// Unsupported forms produce an error message that becomes an exit-127
/// result upstream.
pub(crate) fn apply_redirects(command: &Command) -> Result<[Slot; 3], String> {
    let mut slots = [Slot::Std(0), Slot::Std(1), Slot::Std(2)];
    for redirect in &command.redirects {
        match redirect {
            Redirect::Out {
                fd: 2,
                path,
                append,
            } => {
                slots[2] = file(path, write_mode(*append));
            }
            Redirect::Dup { fd: 2, target } => {
                let src = match target.as_str() {
                    "0" => 0usize,
                    "1" => 1,
                    "2" => 2,
                    _ => return Err(format!("Unsupported redirect: {}", redirect)),
                };
                slots[2] = slots[src].clone();
            }
            Redirect::MergeOutErr { path, append } => {
                let target = file(path, write_mode(*append));
                slots[1] = target.clone();
                slots[2] = target;
            }
            Redirect::Out {
                fd: 1,
                path,
                append,
            } => {
                slots[1] = file(path, write_mode(*append));
            }
            Redirect::In { fd: 0, path } => {
                slots[0] = file(path, OpenMode::Read);
            }
            other => return Err(format!("Unsupported redirect: {}", other)),
        }
    }
    Ok(slots)
}

fn write_mode(append: bool) -> OpenMode {
    if append {
        OpenMode::Append
    } else {
        OpenMode::Write
    }
}

/// Concrete wiring for one stream of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WirePlan {
    /// The incoming stream (the previous command's output pipe, or an
    /// immediately-closed pipe when nothing is connected).
    Input,
    /// A fresh pipe whose read end the driver keeps.
    NewPipe,
    /// Stderr joins whatever stdout was wired to.
    MergeStdout,
    File { path: String, mode: OpenMode },
}

/// Derive the spawn wiring from a finished redirect table.
pub(crate) fn plan_wiring(slots: &[Slot; 3]) -> Result<[WirePlan; 3], String> {
    let mut plans = [WirePlan::Input, WirePlan::NewPipe, WirePlan::NewPipe];
    for (index, slot) in slots.iter().enumerate() {
        plans[index] = match slot {
            Slot::Std(0) => WirePlan::Input,
            Slot::Std(1) => match index {
                0 => return Err("Unsupported redirect for stdin".to_string()),
                1 => WirePlan::NewPipe,
                _ => WirePlan::MergeStdout,
            },
            Slot::Std(2) => {
                if index != 2 {
                    return Err("Unsupported redirect on stdout".to_string());
                }
                WirePlan::NewPipe
            }
            Slot::Std(_) => return Err("Unsupported redirect".to_string()),
            Slot::File { path, mode } => WirePlan::File {
                path: path.clone(),
                mode: *mode,
            },
        };
    }
    Ok(plans)
}
