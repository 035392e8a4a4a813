//! Toolchain subprocess invocation behind a scoped environment override.
//!
//! The vendor tree is prepended to `GOPATH` for exactly the lifetime of the
//! child process; the guard restores the prior value on every exit path,
//! including errors. The child's output streams pass through untouched and
//! its exit error is returned verbatim.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::Command;

use colored::Colorize;

use crate::error::{Error, Result};

/// Restores an environment variable to its prior value on drop.
pub struct ScopedEnv {
    key: String,
    prior: Option<OsString>,
}

impl ScopedEnv {
    pub fn set(key: &str, value: &OsStr) -> ScopedEnv {
        let prior = env::var_os(key);
        // SAFETY: gopack mutates the environment only here and on the
        // corresponding drop, from the single command-dispatch thread.
        unsafe { env::set_var(key, value) };
        ScopedEnv {
            key: key.to_string(),
            prior,
        }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        // SAFETY: see ScopedEnv::set.
        unsafe {
            match &self.prior {
                Some(value) => env::set_var(&self.key, value),
                None => env::remove_var(&self.key),
            }
        }
    }
}

/// Runs the external toolchain with the vendor tree prepended to `GOPATH`.
pub fn run_toolchain(vendor_root: &Path, cur_dir: &Path, args: &[String]) -> Result<()> {
    let sep = if cfg!(windows) { ";" } else { ":" };
    let prior = env::var("GOPATH").unwrap_or_default();
    let combined = format!("{}{}{}", vendor_root.display(), sep, prior);

    println!("{} Setting GOPATH to {}", "🔧".cyan(), vendor_root.display());
    let _gopath = ScopedEnv::set("GOPATH", OsStr::new(&combined));

    let Some((program, rest)) = args.split_first() else {
        return Err(Error::Io(std::io::Error::other("empty toolchain command")));
    };
    let status = Command::new(program)
        .args(rest)
        .current_dir(cur_dir)
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::Toolchain(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_env_restores_prior_value() {
        let key = "GOPACK_TEST_SCOPED_ENV";
        // SAFETY: single-threaded test setup.
        unsafe { env::set_var(key, "before") };
        {
            let _guard = ScopedEnv::set(key, OsStr::new("during"));
            assert_eq!(env::var(key).unwrap(), "during");
        }
        assert_eq!(env::var(key).unwrap(), "before");
        unsafe { env::remove_var(key) };
    }

    #[test]
    fn test_scoped_env_removes_when_previously_unset() {
        let key = "GOPACK_TEST_SCOPED_ENV_UNSET";
        {
            let _guard = ScopedEnv::set(key, OsStr::new("during"));
            assert_eq!(env::var(key).unwrap(), "during");
        }
        assert!(env::var_os(key).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_toolchain_exit_error_is_surfaced() {
        let tmp = tempfile::tempdir().unwrap();
        let args = vec!["false".to_string()];
        let result = run_toolchain(tmp.path(), tmp.path(), &args);
        assert!(matches!(result, Err(Error::Toolchain(_))));
    }
}
