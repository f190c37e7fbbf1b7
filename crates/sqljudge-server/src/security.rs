use crate::handlers::HandlerError;
use std::path::{Component, Path, PathBuf};

/// Extensions tried, in order, when resolving a fixture key.
pub const FIXTURE_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Lexically jails `user_path` under `root_canon`.
///
/// Absolute paths, root/prefix components and `..` that would climb above the
/// root are rejected. The returned path is not canonicalized.
pub fn jail_path(root_canon: &Path, user_path: &str) -> Result<PathBuf, HandlerError> {
    if user_path.trim().is_empty() {
        return Err(HandlerError::new("E_INVALID_REQUEST", "fixture key is empty"));
    }

    let up = Path::new(user_path);
    if up.is_absolute() {
        return Err(HandlerError::new(
            "E_PERMISSION_DENIED",
            "absolute paths are not allowed",
        ));
    }

    let mut out = PathBuf::from(root_canon);
    let root_len = out.components().count();

    for c in up.components() {
        match c {
            Component::CurDir => {}
            Component::Normal(seg) => out.push(seg),
            Component::ParentDir => {
                if out.components().count() <= root_len {
                    return Err(HandlerError::new(
                        "E_PERMISSION_DENIED",
                        "path escapes fixture_root",
                    ));
                }
                out.pop();
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(HandlerError::new(
                    "E_PERMISSION_DENIED",
                    "path prefixes/root are not allowed",
                ));
            }
        }
    }

    if out.components().count() <= root_len {
        return Err(HandlerError::new(
            "E_PERMISSION_DENIED",
            "fixture key resolves to fixture_root itself",
        ));
    }
    Ok(out)
}

/// Maps a fixture key to `<root>/<key>.<ext>` for the first existing extension.
///
/// `Ok(None)` means no such fixture. Existing files are canonicalized so a
/// symlink pointing outside the root is rejected.
pub fn resolve_fixture_path(root_canon: &Path, key: &str) -> Result<Option<PathBuf>, HandlerError> {
    let base = jail_path(root_canon, key)?;

    for ext in FIXTURE_EXTENSIONS {
        let mut candidate = base.clone().into_os_string();
        candidate.push(".");
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);

        if !candidate.is_file() {
            continue;
        }
        let canon = std::fs::canonicalize(&candidate).map_err(|e| {
            HandlerError::new("E_FIXTURE_READ", &format!("canonicalize failed: {e}"))
        })?;
        if !canon.starts_with(root_canon) {
            return Err(HandlerError::new(
                "E_PERMISSION_DENIED",
                "fixture resolves outside fixture_root",
            ));
        }
        return Ok(Some(canon));
    }
    Ok(None)
}
