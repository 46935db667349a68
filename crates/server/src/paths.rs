use std::path::{Component, Path, PathBuf};

/// Resolves a client-supplied filename inside `root`.
///
/// Returns `None` for names that could point outside the root:
/// - empty names
/// - absolute paths (Unix `/` or Windows `C:\`)
/// - parent directory traversal (`..`)
/// - Windows prefix components (`C:`, `\\server`)
pub fn resolve_in_root(root: &Path, filename: &str) -> Option<PathBuf> {
    if filename.is_empty() {
        return None;
    }

    let path = Path::new(filename);
    if path.is_absolute() {
        return None;
    }

    for component in path.components() {
        match component {
            Component::ParentDir | Component::Prefix(_) | Component::RootDir => return None,
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Some(root.join(path))
}
