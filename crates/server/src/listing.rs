//! Directory listing for the `LIST` command.

use std::path::Path;

/// Lists the entry names in `root`, files and directories alike.
///
/// Names starting with `.` are skipped. Order is whatever the filesystem
/// returns; callers must not assume it is sorted.
///
/// Names that are not valid UTF-8 are listed lossily (with U+FFFD) but
/// cannot be fetched: requests carry UTF-8 filenames only.
pub async fn list_root(root: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(root).await?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }

    Ok(names)
}

/// Renders a listing as it travels on the data channel: every name followed
/// by a newline.
pub(crate) fn render_listing(names: &[String]) -> Vec<u8> {
    let mut out = Vec::with_capacity(names.iter().map(|n| n.len() + 1).sum());
    for name in names {
        out.extend_from_slice(name.as_bytes());
        out.push(b'\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn skips_hidden_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path();
        std::fs::write(base.join("a.txt"), "a").unwrap();
        std::fs::write(base.join("b.txt"), "b").unwrap();
        std::fs::write(base.join(".hidden"), "h").unwrap();

        let mut names = list_root(base).await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn includes_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("docs")).unwrap();
        std::fs::create_dir(tmp.path().join(".git")).unwrap();

        let names = list_root(tmp.path()).await.unwrap();
        assert_eq!(names, vec!["docs"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_names_are_listed_lossily() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().unwrap();
        let name = OsStr::from_bytes(b"caf\xe9.txt");
        if std::fs::write(tmp.path().join(name), "x").is_err() {
            // Some filesystems refuse names that are not UTF-8.
            return;
        }

        let names = list_root(tmp.path()).await.unwrap();
        assert_eq!(names, vec!["caf\u{FFFD}.txt"]);
    }

    #[tokio::test]
    async fn empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_root(tmp.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        assert!(list_root(Path::new("/definitely/not/real")).await.is_err());
    }

    #[test]
    fn renders_newline_terminated_names() {
        let names = vec!["a.txt".to_string(), "b.txt".to_string()];
        assert_eq!(render_listing(&names), b"a.txt\nb.txt\n");
        assert!(render_listing(&[]).is_empty());
    }
}
