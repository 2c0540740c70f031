//! Locating the default cache file.
//!
//! The cache file lives in the home directory of the user running the
//! process. The home directory is taken from the `HOME` environment
//! variable, then from the password database, then from asking the shell.
//! If all of that fails, the literal `~` is used.

use std::env;
use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

/// The file name of the cache file.
pub const CACHE_FILE_NAME: &str = "ip_info";

/// Returns the default location of the cache file.
pub fn cache_file_path() -> PathBuf {
    home_dir().join(CACHE_FILE_NAME)
}

/// Returns the home directory of the current user.
pub fn home_dir() -> PathBuf {
    if let Some(home) = env::var_os("HOME").filter(|home| !home.is_empty()) {
        return home.into();
    }
    if let Some(home) = passwd_home() {
        return home;
    }
    if let Some(home) = shell_home() {
        return home;
    }
    debug!("no home directory found, falling back to '~'");
    PathBuf::from("~")
}

/// Returns the home directory from the password database.
#[cfg(unix)]
fn passwd_home() -> Option<PathBuf> {
    use std::ffi::{CStr, OsStr};
    use std::os::unix::ffi::OsStrExt;

    let mut buf = vec![0 as libc::c_char; 16 * 1024];
    // SAFETY: passwd is a plain C struct for which all zeroes is valid.
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut res: *mut libc::passwd = std::ptr::null_mut();

    // SAFETY: all pointers are valid for the duration of the call and
    // buf.len() is the size of the buffer behind buf.
    let rc = unsafe {
        libc::getpwuid_r(
            libc::getuid(),
            &mut pwd,
            buf.as_mut_ptr(),
            buf.len(),
            &mut res,
        )
    };
    if rc != 0 || res.is_null() || pwd.pw_dir.is_null() {
        return None;
    }

    // SAFETY: on success pw_dir points to a NUL terminated string within
    // buf which outlives this borrow.
    let dir = unsafe { CStr::from_ptr(pwd.pw_dir) }.to_bytes();
    if dir.is_empty() {
        return None;
    }
    Some(PathBuf::from(OsStr::from_bytes(dir)))
}

#[cfg(not(unix))]
fn passwd_home() -> Option<PathBuf> {
    None
}

/// Returns the home directory as expanded by the shell.
fn shell_home() -> Option<PathBuf> {
    let output = Command::new("sh")
        .args(["-c", "eval echo ~$USER"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let home = String::from_utf8(output.stdout).ok()?;
    let home = home.trim();
    if home.is_empty() {
        return None;
    }
    Some(PathBuf::from(home))
}

//============ Testing =======================================================
