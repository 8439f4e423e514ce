//! File system collaborator.
//!
//! The guest runtime's syscall layer speaks a callback-flavored file API:
//! every operation takes a trailing callback invoked as `cb(err)` or
//! `cb(null, result...)`, with errors carrying a `code` property the guest
//! maps back to an errno. Operations this host does not provide report
//! `ENOSYS` the same way, which the guest treats as a clean "unsupported".

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use wago_value::builtins::{coded_error, type_error};
use wago_value::{call_value, CallError, CallResult, CallScope, HostObject, HostValue};

use crate::enosys::callback_stub;

// Open flag bits, matching the guest's expectations.
const O_WRONLY: i32 = 1;
const O_RDWR: i32 = 2;
const O_CREAT: i32 = 0o100;
const O_EXCL: i32 = 0o200;
const O_TRUNC: i32 = 0o1000;
const O_APPEND: i32 = 0o2000;

/// Open file table. Descriptors 0-2 are reserved for the standard
/// streams and never stored here.
struct FdTable {
    files: FxHashMap<i32, File>,
    next: i32,
}

impl FdTable {
    fn new() -> Self {
        Self {
            files: FxHashMap::default(),
            next: 3,
        }
    }

    fn insert(&mut self, file: File) -> i32 {
        let fd = self.next;
        self.next += 1;
        self.files.insert(fd, file);
        fd
    }

    fn remove(&mut self, fd: i32) -> Result<File, HostValue> {
        self.files.remove(&fd).ok_or_else(bad_fd)
    }

    fn get_mut(&mut self, fd: i32) -> Result<&mut File, HostValue> {
        self.files.get_mut(&fd).ok_or_else(bad_fd)
    }
}

fn bad_fd() -> HostValue {
    coded_error("bad file descriptor", "EBADF")
}

/// Translate a host I/O failure into the guest-visible error shape.
pub(crate) fn io_err(err: std::io::Error) -> HostValue {
    use std::io::ErrorKind;
    let code = match err.kind() {
        ErrorKind::NotFound => "ENOENT",
        ErrorKind::PermissionDenied => "EACCES",
        ErrorKind::AlreadyExists => "EEXIST",
        ErrorKind::InvalidInput => "EINVAL",
        ErrorKind::DirectoryNotEmpty => "ENOTEMPTY",
        _ => "EIO",
    };
    coded_error(err.to_string(), code)
}

// ======================================================================
// Argument decoding
// ======================================================================

fn arg(args: &[HostValue], i: usize) -> HostValue {
    args.get(i).cloned().unwrap_or(HostValue::Undefined)
}

fn num_arg(args: &[HostValue], i: usize, what: &str) -> Result<f64, CallError> {
    arg(args, i)
        .as_f64()
        .ok_or_else(|| CallError::Thrown(type_error(format!("{what} must be a number"))))
}

fn str_arg(args: &[HostValue], i: usize, what: &str) -> Result<String, CallError> {
    match arg(args, i) {
        HostValue::String(s) => Ok(s.to_string()),
        _ => Err(CallError::Thrown(type_error(format!(
            "{what} must be a string"
        )))),
    }
}

fn bytes_arg(args: &[HostValue], i: usize, what: &str) -> Result<Rc<RefCell<Vec<u8>>>, CallError> {
    match arg(args, i) {
        HostValue::Bytes(b) => Ok(b),
        _ => Err(CallError::Thrown(type_error(format!(
            "{what} must be a byte buffer"
        )))),
    }
}

fn cb_arg(args: &[HostValue], i: usize) -> Result<HostValue, CallError> {
    let cb = arg(args, i);
    if cb.is_callable() {
        Ok(cb)
    } else {
        Err(CallError::Thrown(type_error("callback must be a function")))
    }
}

/// `null` position means "at the current cursor"; a number means an
/// absolute offset.
fn position_arg(args: &[HostValue], i: usize) -> Result<Option<u64>, CallError> {
    match arg(args, i) {
        HostValue::Null | HostValue::Undefined => Ok(None),
        HostValue::Number(n) if n >= 0.0 => Ok(Some(n as u64)),
        _ => Err(CallError::Thrown(type_error("position must be null or a non-negative number"))),
    }
}

/// Deliver an operation result through the trailing callback.
fn finish(
    scope: &mut dyn CallScope,
    cb: &HostValue,
    result: Result<Vec<HostValue>, HostValue>,
) -> CallResult {
    let args = match result {
        Ok(values) => {
            let mut all = Vec::with_capacity(values.len() + 1);
            all.push(HostValue::Null);
            all.extend(values);
            all
        }
        Err(err) => vec![err],
    };
    call_value(scope, cb, HostValue::Undefined, &args)?;
    Ok(HostValue::Undefined)
}

// ======================================================================
// Stat shape
// ======================================================================

#[cfg(unix)]
fn stat_value(meta: &std::fs::Metadata) -> HostValue {
    use std::os::unix::fs::MetadataExt;
    let ms = |secs: i64, nanos: i64| secs as f64 * 1000.0 + nanos as f64 / 1e6;
    HostValue::object(HostObject::with_props([
        ("dev", HostValue::Number(meta.dev() as f64)),
        ("ino", HostValue::Number(meta.ino() as f64)),
        ("mode", HostValue::Number(meta.mode() as f64)),
        ("nlink", HostValue::Number(meta.nlink() as f64)),
        ("uid", HostValue::Number(meta.uid() as f64)),
        ("gid", HostValue::Number(meta.gid() as f64)),
        ("rdev", HostValue::Number(meta.rdev() as f64)),
        ("size", HostValue::Number(meta.size() as f64)),
        ("blksize", HostValue::Number(meta.blksize() as f64)),
        ("blocks", HostValue::Number(meta.blocks() as f64)),
        ("atimeMs", HostValue::Number(ms(meta.atime(), meta.atime_nsec()))),
        ("mtimeMs", HostValue::Number(ms(meta.mtime(), meta.mtime_nsec()))),
        ("ctimeMs", HostValue::Number(ms(meta.ctime(), meta.ctime_nsec()))),
    ]))
}

#[cfg(not(unix))]
fn stat_value(meta: &std::fs::Metadata) -> HostValue {
    use std::time::UNIX_EPOCH;
    let mode = if meta.is_dir() { 0o040755 } else { 0o100644 };
    let mtime_ms = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0);
    HostValue::object(HostObject::with_props([
        ("dev", HostValue::Number(0.0)),
        ("ino", HostValue::Number(0.0)),
        ("mode", HostValue::Number(mode as f64)),
        ("nlink", HostValue::Number(1.0)),
        ("uid", HostValue::Number(0.0)),
        ("gid", HostValue::Number(0.0)),
        ("rdev", HostValue::Number(0.0)),
        ("size", HostValue::Number(meta.len() as f64)),
        ("blksize", HostValue::Number(4096.0)),
        ("blocks", HostValue::Number(0.0)),
        ("atimeMs", HostValue::Number(mtime_ms)),
        ("mtimeMs", HostValue::Number(mtime_ms)),
        ("ctimeMs", HostValue::Number(mtime_ms)),
    ]))
}

// ======================================================================
// Operations
// ======================================================================

fn open_options(flags: i32, mode: u32) -> OpenOptions {
    let access = flags & 0o3;
    let mut opts = OpenOptions::new();
    opts.read(access != O_WRONLY)
        .write(access == O_WRONLY || access == O_RDWR)
        .create(flags & O_CREAT != 0)
        .truncate(flags & O_TRUNC != 0)
        .append(flags & O_APPEND != 0)
        .create_new(flags & O_EXCL != 0);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    opts
}

fn write_stream(fd: i32, buf: &[u8]) -> Result<usize, HostValue> {
    let res = match fd {
        1 => std::io::stdout().lock().write(buf),
        2 => std::io::stderr().lock().write(buf),
        _ => return Err(bad_fd()),
    };
    res.map_err(io_err)
}

/// An owner id of `-1` from the guest means "leave unchanged".
#[cfg(unix)]
fn owner_arg(args: &[HostValue], i: usize, what: &str) -> Result<Option<u32>, CallError> {
    let n = num_arg(args, i, what)?;
    Ok(if n < 0.0 { None } else { Some(n as u32) })
}

/// Set access and modification times, given in seconds since the epoch.
#[cfg(unix)]
fn set_file_times(path: &str, atime: f64, mtime: f64) -> Result<(), HostValue> {
    let cpath = std::ffi::CString::new(path)
        .map_err(|_| coded_error("path contains a NUL byte", "EINVAL"))?;
    let tv = |secs: f64| libc::timeval {
        tv_sec: secs as libc::time_t,
        tv_usec: (secs.fract().abs() * 1e6) as libc::suseconds_t,
    };
    let times = [tv(atime), tv(mtime)];
    if unsafe { libc::utimes(cpath.as_ptr(), times.as_ptr()) } != 0 {
        return Err(io_err(std::io::Error::last_os_error()));
    }
    Ok(())
}

fn seek_if_positioned(file: &mut File, position: Option<u64>) -> Result<(), HostValue> {
    if let Some(pos) = position {
        file.seek(SeekFrom::Start(pos)).map_err(io_err)?;
    }
    Ok(())
}

/// Build the `fs` collaborator object with its own descriptor table.
pub fn make_fs() -> HostValue {
    let table = Rc::new(RefCell::new(FdTable::new()));
    let mut obj = HostObject::new();

    obj.props.insert(
        "constants".to_string(),
        HostValue::object(HostObject::with_props([
            ("O_RDONLY", HostValue::Number(0.0)),
            ("O_WRONLY", HostValue::Number(O_WRONLY as f64)),
            ("O_RDWR", HostValue::Number(O_RDWR as f64)),
            ("O_CREAT", HostValue::Number(O_CREAT as f64)),
            ("O_EXCL", HostValue::Number(O_EXCL as f64)),
            ("O_TRUNC", HostValue::Number(O_TRUNC as f64)),
            ("O_APPEND", HostValue::Number(O_APPEND as f64)),
        ])),
    );

    let mut add = |name: &str, f: HostValue| {
        obj.props.insert(name.to_string(), f);
    };

    {
        let table = table.clone();
        add(
            "writeSync",
            HostValue::function("writeSync", move |_, _, args| {
                let fd = num_arg(args, 0, "fd")? as i32;
                let buf = bytes_arg(args, 1, "buffer")?;
                let buf = buf.borrow();
                let n = if fd <= 2 {
                    write_stream(fd, &buf).map_err(CallError::Thrown)?
                } else {
                    let mut table = table.borrow_mut();
                    let file = table.get_mut(fd).map_err(CallError::Thrown)?;
                    file.write(&buf).map_err(|e| CallError::Thrown(io_err(e)))?
                };
                Ok(HostValue::Number(n as f64))
            }),
        );
    }

    {
        let table = table.clone();
        add(
            "write",
            HostValue::function("write", move |scope, _, args| {
                let cb = cb_arg(args, 5)?;
                let fd = num_arg(args, 0, "fd")? as i32;
                let buf = bytes_arg(args, 1, "buffer")?;
                let offset = num_arg(args, 2, "offset")? as usize;
                let length = num_arg(args, 3, "length")? as usize;
                let position = position_arg(args, 4)?;
                let result = (|| {
                    let buf = buf.borrow();
                    let end = offset
                        .checked_add(length)
                        .filter(|end| *end <= buf.len())
                        .ok_or_else(|| coded_error("write range out of buffer", "EINVAL"))?;
                    let chunk = &buf[offset..end];
                    let n = if fd <= 2 {
                        write_stream(fd, chunk)?
                    } else {
                        let mut table = table.borrow_mut();
                        let file = table.get_mut(fd)?;
                        seek_if_positioned(file, position)?;
                        file.write(chunk).map_err(io_err)?
                    };
                    Ok(vec![HostValue::Number(n as f64)])
                })();
                finish(scope, &cb, result)
            }),
        );
    }

    {
        let table = table.clone();
        add(
            "read",
            HostValue::function("read", move |scope, _, args| {
                let cb = cb_arg(args, 5)?;
                let fd = num_arg(args, 0, "fd")? as i32;
                let buf = bytes_arg(args, 1, "buffer")?;
                let offset = num_arg(args, 2, "offset")? as usize;
                let length = num_arg(args, 3, "length")? as usize;
                let position = position_arg(args, 4)?;
                let result = (|| {
                    let mut buf = buf.borrow_mut();
                    let end = offset
                        .checked_add(length)
                        .filter(|end| *end <= buf.len())
                        .ok_or_else(|| coded_error("read range out of buffer", "EINVAL"))?;
                    let mut table = table.borrow_mut();
                    let file = table.get_mut(fd)?;
                    seek_if_positioned(file, position)?;
                    let n = file.read(&mut buf[offset..end]).map_err(io_err)?;
                    Ok(vec![HostValue::Number(n as f64)])
                })();
                finish(scope, &cb, result)
            }),
        );
    }

    {
        let table = table.clone();
        add(
            "open",
            HostValue::function("open", move |scope, _, args| {
                let cb = cb_arg(args, 3)?;
                let path = str_arg(args, 0, "path")?;
                let flags = num_arg(args, 1, "flags")? as i32;
                let mode = num_arg(args, 2, "mode")? as u32;
                let result = open_options(flags, mode)
                    .open(&path)
                    .map_err(io_err)
                    .map(|file| {
                        let fd = table.borrow_mut().insert(file);
                        log::trace!("open {path:?} -> fd {fd}");
                        vec![HostValue::Number(fd as f64)]
                    });
                finish(scope, &cb, result)
            }),
        );
    }

    {
        let table = table.clone();
        add(
            "close",
            HostValue::function("close", move |scope, _, args| {
                let cb = cb_arg(args, 1)?;
                let fd = num_arg(args, 0, "fd")? as i32;
                let result = table.borrow_mut().remove(fd).map(|file| {
                    drop(file);
                    Vec::new()
                });
                finish(scope, &cb, result)
            }),
        );
    }

    {
        let table = table.clone();
        add(
            "fsync",
            HostValue::function("fsync", move |scope, _, args| {
                let cb = cb_arg(args, 1)?;
                let fd = num_arg(args, 0, "fd")? as i32;
                let result = (|| {
                    let mut table = table.borrow_mut();
                    let file = table.get_mut(fd)?;
                    file.sync_all().map_err(io_err)?;
                    Ok(Vec::new())
                })();
                finish(scope, &cb, result)
            }),
        );
    }

    add(
        "stat",
        HostValue::function("stat", move |scope, _, args| {
            let cb = cb_arg(args, 1)?;
            let path = str_arg(args, 0, "path")?;
            let result = std::fs::metadata(&path)
                .map_err(io_err)
                .map(|meta| vec![stat_value(&meta)]);
            finish(scope, &cb, result)
        }),
    );

    add(
        "lstat",
        HostValue::function("lstat", move |scope, _, args| {
            let cb = cb_arg(args, 1)?;
            let path = str_arg(args, 0, "path")?;
            let result = std::fs::symlink_metadata(&path)
                .map_err(io_err)
                .map(|meta| vec![stat_value(&meta)]);
            finish(scope, &cb, result)
        }),
    );

    {
        let table = table.clone();
        add(
            "fstat",
            HostValue::function("fstat", move |scope, _, args| {
                let cb = cb_arg(args, 1)?;
                let fd = num_arg(args, 0, "fd")? as i32;
                let result = (|| {
                    let mut table = table.borrow_mut();
                    let file = table.get_mut(fd)?;
                    let meta = file.metadata().map_err(io_err)?;
                    Ok(vec![stat_value(&meta)])
                })();
                finish(scope, &cb, result)
            }),
        );
    }

    add(
        "mkdir",
        HostValue::function("mkdir", move |scope, _, args| {
            let cb = cb_arg(args, 2)?;
            let path = str_arg(args, 0, "path")?;
            let result = std::fs::create_dir(&path).map_err(io_err).map(|_| Vec::new());
            finish(scope, &cb, result)
        }),
    );

    add(
        "rmdir",
        HostValue::function("rmdir", move |scope, _, args| {
            let cb = cb_arg(args, 1)?;
            let path = str_arg(args, 0, "path")?;
            let result = std::fs::remove_dir(&path).map_err(io_err).map(|_| Vec::new());
            finish(scope, &cb, result)
        }),
    );

    add(
        "unlink",
        HostValue::function("unlink", move |scope, _, args| {
            let cb = cb_arg(args, 1)?;
            let path = str_arg(args, 0, "path")?;
            let result = std::fs::remove_file(&path).map_err(io_err).map(|_| Vec::new());
            finish(scope, &cb, result)
        }),
    );

    add(
        "rename",
        HostValue::function("rename", move |scope, _, args| {
            let cb = cb_arg(args, 2)?;
            let from = str_arg(args, 0, "from")?;
            let to = str_arg(args, 1, "to")?;
            let result = std::fs::rename(&from, &to).map_err(io_err).map(|_| Vec::new());
            finish(scope, &cb, result)
        }),
    );

    add(
        "readdir",
        HostValue::function("readdir", move |scope, _, args| {
            let cb = cb_arg(args, 1)?;
            let path = str_arg(args, 0, "path")?;
            let result = (|| {
                let entries = std::fs::read_dir(&path).map_err(io_err)?;
                let mut names = Vec::new();
                for entry in entries {
                    let entry = entry.map_err(io_err)?;
                    names.push(HostValue::string(entry.file_name().to_string_lossy()));
                }
                Ok(vec![HostValue::array(names)])
            })();
            finish(scope, &cb, result)
        }),
    );

    add(
        "truncate",
        HostValue::function("truncate", move |scope, _, args| {
            let cb = cb_arg(args, 2)?;
            let path = str_arg(args, 0, "path")?;
            let len = num_arg(args, 1, "length")? as u64;
            let result = (|| {
                let file = OpenOptions::new().write(true).open(&path).map_err(io_err)?;
                file.set_len(len).map_err(io_err)?;
                Ok(Vec::new())
            })();
            finish(scope, &cb, result)
        }),
    );

    {
        let table = table.clone();
        add(
            "ftruncate",
            HostValue::function("ftruncate", move |scope, _, args| {
                let cb = cb_arg(args, 2)?;
                let fd = num_arg(args, 0, "fd")? as i32;
                let len = num_arg(args, 1, "length")? as u64;
                let result = (|| {
                    let mut table = table.borrow_mut();
                    let file = table.get_mut(fd)?;
                    file.set_len(len).map_err(io_err)?;
                    Ok(Vec::new())
                })();
                finish(scope, &cb, result)
            }),
        );
    }

    add(
        "readlink",
        HostValue::function("readlink", move |scope, _, args| {
            let cb = cb_arg(args, 1)?;
            let path = str_arg(args, 0, "path")?;
            let result = std::fs::read_link(&path)
                .map_err(io_err)
                .map(|target| vec![HostValue::string(target.to_string_lossy())]);
            finish(scope, &cb, result)
        }),
    );

    add(
        "link",
        HostValue::function("link", move |scope, _, args| {
            let cb = cb_arg(args, 2)?;
            let from = str_arg(args, 0, "path")?;
            let to = str_arg(args, 1, "link")?;
            let result = std::fs::hard_link(&from, &to)
                .map_err(io_err)
                .map(|_| Vec::new());
            finish(scope, &cb, result)
        }),
    );

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        add(
            "chmod",
            HostValue::function("chmod", move |scope, _, args| {
                let cb = cb_arg(args, 2)?;
                let path = str_arg(args, 0, "path")?;
                let mode = num_arg(args, 1, "mode")? as u32;
                let result =
                    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
                        .map_err(io_err)
                        .map(|_| Vec::new());
                finish(scope, &cb, result)
            }),
        );

        {
            let table = table.clone();
            add(
                "fchmod",
                HostValue::function("fchmod", move |scope, _, args| {
                    let cb = cb_arg(args, 2)?;
                    let fd = num_arg(args, 0, "fd")? as i32;
                    let mode = num_arg(args, 1, "mode")? as u32;
                    let result = (|| {
                        let mut table = table.borrow_mut();
                        let file = table.get_mut(fd)?;
                        file.set_permissions(std::fs::Permissions::from_mode(mode))
                            .map_err(io_err)?;
                        Ok(Vec::new())
                    })();
                    finish(scope, &cb, result)
                }),
            );
        }

        add(
            "chown",
            HostValue::function("chown", move |scope, _, args| {
                let cb = cb_arg(args, 3)?;
                let path = str_arg(args, 0, "path")?;
                let uid = owner_arg(args, 1, "uid")?;
                let gid = owner_arg(args, 2, "gid")?;
                let result = std::os::unix::fs::chown(&path, uid, gid)
                    .map_err(io_err)
                    .map(|_| Vec::new());
                finish(scope, &cb, result)
            }),
        );

        {
            let table = table.clone();
            add(
                "fchown",
                HostValue::function("fchown", move |scope, _, args| {
                    let cb = cb_arg(args, 3)?;
                    let fd = num_arg(args, 0, "fd")? as i32;
                    let uid = owner_arg(args, 1, "uid")?;
                    let gid = owner_arg(args, 2, "gid")?;
                    let result = (|| {
                        let mut table = table.borrow_mut();
                        let file = table.get_mut(fd)?;
                        std::os::unix::fs::fchown(&*file, uid, gid).map_err(io_err)?;
                        Ok(Vec::new())
                    })();
                    finish(scope, &cb, result)
                }),
            );
        }

        add(
            "utimes",
            HostValue::function("utimes", move |scope, _, args| {
                let cb = cb_arg(args, 3)?;
                let path = str_arg(args, 0, "path")?;
                let atime = num_arg(args, 1, "atime")?;
                let mtime = num_arg(args, 2, "mtime")?;
                let result = set_file_times(&path, atime, mtime).map(|_| Vec::new());
                finish(scope, &cb, result)
            }),
        );

        add(
            "symlink",
            HostValue::function("symlink", move |scope, _, args| {
                let cb = cb_arg(args, 2)?;
                let target = str_arg(args, 0, "path")?;
                let link = str_arg(args, 1, "link")?;
                let result = std::os::unix::fs::symlink(&target, &link)
                    .map_err(io_err)
                    .map(|_| Vec::new());
                finish(scope, &cb, result)
            }),
        );
    }

    // Hosts without the unix ownership model answer these with ENOSYS.
    #[cfg(not(unix))]
    for name in ["chmod", "fchmod", "chown", "fchown", "utimes", "symlink"] {
        add(name, callback_stub(name));
    }

    // No portable host counterpart.
    add("lchown", callback_stub("lchown"));

    HostValue::object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    use wago_value::object::{get_property, length_of};

    struct InertScope;

    impl CallScope for InertScope {
        fn resume(&mut self) -> Result<(), wago_value::FaultError> {
            Ok(())
        }
    }

    /// Callback that records its invocation on a shared cell.
    fn recording_cb(slot: Rc<RefCell<Vec<HostValue>>>) -> HostValue {
        HostValue::function("cb", move |_, _, args| {
            *slot.borrow_mut() = args.to_vec();
            Ok(HostValue::Undefined)
        })
    }

    fn call(fs: &HostValue, name: &str, args: &[HostValue]) -> Vec<HostValue> {
        let mut scope = InertScope;
        let f = get_property(fs, name).unwrap();
        let got = Rc::new(RefCell::new(Vec::new()));
        let mut all = args.to_vec();
        all.push(recording_cb(got.clone()));
        call_value(&mut scope, &f, HostValue::Undefined, &all).unwrap();
        let out = got.borrow().clone();
        out
    }

    #[test]
    fn open_write_read_close_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let path_str = path.to_string_lossy().to_string();
        let fs = make_fs();

        let flags = O_WRONLY | O_CREAT | O_TRUNC;
        let out = call(
            &fs,
            "open",
            &[
                HostValue::string(&path_str),
                HostValue::Number(flags as f64),
                HostValue::Number(0o644 as f64),
            ],
        );
        assert!(out[0].strict_eq(&HostValue::Null), "open failed: {out:?}");
        let fd = out[1].clone();

        let buf = HostValue::bytes(b"hello world".to_vec());
        let out = call(
            &fs,
            "write",
            &[
                fd.clone(),
                buf,
                HostValue::Number(0.0),
                HostValue::Number(11.0),
                HostValue::Null,
            ],
        );
        assert!(out[0].strict_eq(&HostValue::Null));
        assert_eq!(out[1].as_f64(), Some(11.0));

        let out = call(&fs, "close", &[fd]);
        assert!(out[0].strict_eq(&HostValue::Null));
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");

        // Read it back through the shim, from an absolute position.
        let out = call(
            &fs,
            "open",
            &[
                HostValue::string(&path_str),
                HostValue::Number(0.0),
                HostValue::Number(0.0),
            ],
        );
        let fd = out[1].clone();
        let buf = HostValue::bytes(vec![0; 5]);
        let out = call(
            &fs,
            "read",
            &[
                fd.clone(),
                buf.clone(),
                HostValue::Number(0.0),
                HostValue::Number(5.0),
                HostValue::Number(6.0),
            ],
        );
        assert!(out[0].strict_eq(&HostValue::Null));
        assert_eq!(out[1].as_f64(), Some(5.0));
        match buf {
            HostValue::Bytes(b) => assert_eq!(&*b.borrow(), b"world"),
            _ => unreachable!(),
        }
        call(&fs, "close", &[fd]);
    }

    #[test]
    fn missing_file_reports_enoent() {
        let fs = make_fs();
        let out = call(&fs, "stat", &[HostValue::string("/no/such/path/here")]);
        let code = get_property(&out[0], "code").unwrap();
        assert_eq!(code.as_str(), Some("ENOENT"));
    }

    #[test]
    fn stat_reports_directory_mode() {
        let dir = tempfile::tempdir().unwrap();
        let fs = make_fs();
        let out = call(&fs, "stat", &[HostValue::string(dir.path().to_string_lossy())]);
        assert!(out[0].strict_eq(&HostValue::Null));
        let mode = get_property(&out[1], "mode").unwrap().as_f64().unwrap() as u32;
        assert_eq!(mode & 0o170000, 0o040000, "expected directory type bits");
    }

    #[test]
    fn readdir_lists_created_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        let sub = dir.path().join("sub");
        let fs = make_fs();

        let out = call(&fs, "mkdir", &[
            HostValue::string(sub.to_string_lossy()),
            HostValue::Number(0o755 as f64),
        ]);
        assert!(out[0].strict_eq(&HostValue::Null));

        let out = call(&fs, "readdir", &[HostValue::string(dir.path().to_string_lossy())]);
        assert!(out[0].strict_eq(&HostValue::Null));
        assert_eq!(length_of(&out[1]).unwrap(), 2);
    }

    #[test]
    fn truncate_resizes_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, b"hello world").unwrap();
        let fs = make_fs();

        let out = call(&fs, "truncate", &[
            HostValue::string(path.to_string_lossy()),
            HostValue::Number(5.0),
        ]);
        assert!(out[0].strict_eq(&HostValue::Null), "truncate failed: {out:?}");
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn chmod_changes_permission_bits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"x").unwrap();
        let fs = make_fs();

        let out = call(&fs, "chmod", &[
            HostValue::string(path.to_string_lossy()),
            HostValue::Number(0o600 as f64),
        ]);
        assert!(out[0].strict_eq(&HostValue::Null), "chmod failed: {out:?}");

        let out = call(&fs, "stat", &[HostValue::string(path.to_string_lossy())]);
        let mode = get_property(&out[1], "mode").unwrap().as_f64().unwrap() as u32;
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_and_readlink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::write(&target, b"x").unwrap();
        let link = dir.path().join("link");
        let fs = make_fs();

        let out = call(&fs, "symlink", &[
            HostValue::string(target.to_string_lossy()),
            HostValue::string(link.to_string_lossy()),
        ]);
        assert!(out[0].strict_eq(&HostValue::Null), "symlink failed: {out:?}");

        let out = call(&fs, "readlink", &[HostValue::string(link.to_string_lossy())]);
        assert!(out[0].strict_eq(&HostValue::Null));
        assert_eq!(out[1].as_str(), Some(&*target.to_string_lossy()));
    }

    #[test]
    fn unsupported_calls_report_enosys_via_callback() {
        let fs = make_fs();
        let out = call(&fs, "lchown", &[
            HostValue::string("a"),
            HostValue::Number(0.0),
            HostValue::Number(0.0),
        ]);
        let code = get_property(&out[0], "code").unwrap();
        assert_eq!(code.as_str(), Some("ENOSYS"));
    }
}
