//! Process identity collaborator.
//!
//! The guest's `syscall` package reaches for a `process` object for pids,
//! user/group ids and the working directory. Identity queries answer from
//! the real host process where the platform provides them; group
//! enumeration and umask manipulation stay unimplemented.

use wago_value::builtins::type_error;
use wago_value::{CallError, HostObject, HostValue};

use crate::enosys::throwing_stub;
use crate::fs::io_err;

#[cfg(unix)]
fn identity() -> [(&'static str, i64); 4] {
    // These libc calls cannot fail.
    unsafe {
        [
            ("getuid", libc::getuid() as i64),
            ("geteuid", libc::geteuid() as i64),
            ("getgid", libc::getgid() as i64),
            ("getegid", libc::getegid() as i64),
        ]
    }
}

#[cfg(not(unix))]
fn identity() -> [(&'static str, i64); 4] {
    [
        ("getuid", -1),
        ("geteuid", -1),
        ("getgid", -1),
        ("getegid", -1),
    ]
}

#[cfg(unix)]
fn parent_pid() -> i64 {
    unsafe { libc::getppid() as i64 }
}

#[cfg(not(unix))]
fn parent_pid() -> i64 {
    -1
}

/// Build the `process` collaborator object.
pub fn make_process() -> HostValue {
    let mut obj = HostObject::with_props([
        ("pid", HostValue::Number(std::process::id() as f64)),
        ("ppid", HostValue::Number(parent_pid() as f64)),
    ]);

    for (name, value) in identity() {
        obj.props.insert(
            name.to_string(),
            HostValue::function(name, move |_, _, _| Ok(HostValue::Number(value as f64))),
        );
    }

    obj.props.insert(
        "cwd".to_string(),
        HostValue::function("cwd", |_, _, _| {
            let dir = std::env::current_dir().map_err(|e| CallError::Thrown(io_err(e)))?;
            Ok(HostValue::string(dir.to_string_lossy()))
        }),
    );

    obj.props.insert(
        "chdir".to_string(),
        HostValue::function("chdir", |_, _, args| {
            let path = match args.first() {
                Some(HostValue::String(s)) => s.to_string(),
                _ => return Err(CallError::Thrown(type_error("path must be a string"))),
            };
            std::env::set_current_dir(&path).map_err(|e| CallError::Thrown(io_err(e)))?;
            Ok(HostValue::Undefined)
        }),
    );

    for name in ["getgroups", "umask"] {
        obj.props.insert(name.to_string(), throwing_stub(name));
    }

    HostValue::object(obj)
}
