//! File permissions for secrets and generated user passwords

use crate::error::{Error, Result};
use rand::distr::{Alphanumeric, SampleString};
use rand::Rng;
use std::path::Path;

/// Characters in a generated password, separators excluded
pub const PASSWORD_LENGTH: usize = 9;

/// Characters between two separators
pub const PASSWORD_GROUP: usize = 3;

/// Generate a password for a newly created user
///
/// Nine characters from `[A-Za-z0-9]`, with `separator` between every group
/// of three, e.g. `aB3-x9Q-k2L`.
///
/// # Example
///
/// ```
/// use zbx_migrate::security::generate_password;
///
/// let password = generate_password(&mut rand::rng(), "-");
/// assert_eq!(password.len(), 11);
/// assert_eq!(password.matches('-').count(), 2);
/// ```
pub fn generate_password<R: Rng + ?Sized>(rng: &mut R, separator: &str) -> String {
    let raw = Alphanumeric.sample_string(rng, PASSWORD_LENGTH);
    raw.as_bytes()
        .chunks(PASSWORD_GROUP)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Set restrictive permissions on a file (Unix: 0o600 - owner read/write only)
///
/// On Windows, this is a no-op as Windows uses ACLs differently.
///
/// # Errors
///
/// Fails if the metadata cannot be read or the permissions cannot be set.
#[cfg(unix)]
pub fn set_secure_file_permissions(path: &Path) -> Result<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut perms = metadata.permissions();
    perms.set_mode(0o600);

    fs::set_permissions(path, perms).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Set restrictive permissions on a directory (Unix: 0o700 - owner rwx only)
///
/// # Errors
///
/// Fails if the metadata cannot be read or the permissions cannot be set.
#[cfg(unix)]
pub fn set_secure_dir_permissions(path: &Path) -> Result<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut perms = metadata.permissions();
    perms.set_mode(0o700);

    fs::set_permissions(path, perms).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Ensure a directory exists with secure permissions (Unix: 0o700)
///
/// # Errors
///
/// Fails if directory creation or permission setting fails.
pub fn ensure_secure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::DirectoryCreate {
        path: path.to_path_buf(),
        source: e,
    })?;

    #[cfg(unix)]
    set_secure_dir_permissions(path)?;

    Ok(())
}

/// No-op on Windows (permissions managed via ACLs)
#[cfg(not(unix))]
pub fn set_secure_file_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// No-op on Windows (permissions managed via ACLs)
#[cfg(not(unix))]
pub fn set_secure_dir_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
