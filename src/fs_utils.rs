use crate::error::{RenderError, Result};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Reads the contents of a file at the given path. Anything `open()` accepts
/// works, including pipes and process substitutions.
///
/// # Errors
///
/// Returns the underlying `io::Error`: `NotFound` for missing paths,
/// `InvalidData` for content that isn't UTF-8.
pub fn read_file_contents(path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
}

/// Reads all of standard input into a string
///
/// # Errors
///
/// Returns `RenderError::Io` if stdin can't be read or isn't valid UTF-8.
pub fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

/// Resolves a template name (as used by `include`, `import` or `extends`)
/// relative to the template directory. The result never escapes that directory.
///
/// # Errors
///
/// - `RenderError::PathTraversal` if the resolved path escapes the base directory.
/// - `RenderError::Io` if there's an error canonicalizing paths.
pub fn resolve_template_path(name: &str, base_dir: &Path) -> Result<PathBuf> {
    let cleaned = name.trim_start_matches('/').trim_start_matches('\\');

    let full_path = base_dir.join(cleaned);

    // Canonicalize to resolve .. and . components
    let canonical = full_path.canonicalize().or_else(|_| {
        // Missing file: canonicalize the parent and append the filename
        full_path.parent().map_or_else(
            || Err(io::Error::new(io::ErrorKind::NotFound, "Invalid path")),
            |parent| {
                parent
                    .canonicalize()
                    .map(|p| p.join(full_path.file_name().unwrap_or_default()))
            },
        )
    })?;

    let base_canonical = base_dir.canonicalize()?;
    if !canonical.starts_with(&base_canonical) {
        return Err(RenderError::PathTraversal { path: canonical });
    }

    Ok(canonical)
}

/// Rendered text fully written to a temporary file next to its destination,
/// waiting to be renamed into place. Dropping it removes the temporary file.
#[derive(Debug)]
pub struct StagedWrite {
    temp_file: NamedTempFile,
    destination: PathBuf,
}

impl StagedWrite {
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Renames the temporary file over the destination.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::OutputWrite` if the rename fails.
    pub fn commit(self) -> Result<()> {
        let destination = self.destination;
        self.temp_file
            .persist(&destination)
            .map_err(|e| RenderError::OutputWrite {
                destination: destination.display().to_string(),
                source: e.error,
            })?;
        Ok(())
    }
}

/// Writes `contents` to a temporary file in the destination's directory
/// without touching the destination itself.
///
/// # Errors
///
/// Returns `RenderError::OutputWrite` if the destination is a directory or the
/// temporary file can't be created, written or synced.
pub fn stage_write(path: &Path, contents: &str) -> Result<StagedWrite> {
    let write_error = |source: io::Error| RenderError::OutputWrite {
        destination: path.display().to_string(),
        source,
    };

    if path.is_dir() {
        return Err(write_error(io::Error::new(
            io::ErrorKind::IsADirectory,
            "destination is a directory",
        )));
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp_file = NamedTempFile::new_in(parent).map_err(write_error)?;
    temp_file
        .write_all(contents.as_bytes())
        .map_err(write_error)?;
    temp_file.as_file().sync_all().map_err(write_error)?;

    Ok(StagedWrite {
        temp_file,
        destination: path.to_path_buf(),
    })
}

/// Writes `contents` to `path` through a temporary file in the same directory
/// that is renamed over the destination once fully written. A failed write
/// leaves any previous file at `path` untouched.
///
/// # Errors
///
/// Returns `RenderError::OutputWrite` if the temporary file can't be created,
/// written, synced or persisted.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    stage_write(path, contents)?.commit()
}

/// Destination for a template rendered in separate mode: the template file
/// name without its last extension, placed in `outdir`.
///
/// # Errors
///
/// Returns `RenderError::InvalidOptions` if the template path has no file name.
pub fn separate_output_path(template: &Path, outdir: &Path) -> Result<PathBuf> {
    let stem = template
        .file_stem()
        .ok_or_else(|| RenderError::InvalidOptions {
            message: format!("template path has no file name: {}", template.display()),
        })?;
    Ok(outdir.join(stem))
}

/// Directory containing `path`, `.` for bare file names
pub fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_file_contents() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");

        fs::write(&file_path, "test content").unwrap();
        let result = read_file_contents(&file_path);
        assert_eq!(result.unwrap(), "test content");

        let non_existent = temp_dir.path().join("nonexistent.txt");
        let err = read_file_contents(&non_existent).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        // A directory exists but can't be read as a document
        let dir_path = temp_dir.path().join("dir");
        fs::create_dir(&dir_path).unwrap();
        let err = read_file_contents(&dir_path).unwrap_err();
        assert_ne!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_read_file_contents_invalid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("binary.yml");
        fs::write(&file_path, b"name: \xff\xfe\n").unwrap();

        let err = read_file_contents(&file_path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_read_file_contents_unicode() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("unicode.txt");

        let content = "Hello 世界 🌍 Здравствуй";
        fs::write(&file_path, content).unwrap();
        assert_eq!(read_file_contents(&file_path).unwrap(), content);
    }

    #[test]
    fn test_resolve_template_path_basic() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();

        let file_path = base.join("header.j2");
        fs::write(&file_path, "content").unwrap();

        let result = resolve_template_path("header.j2", base).unwrap();
        assert_eq!(result, file_path.canonicalize().unwrap());

        // Leading separators are relative to the template directory
        let result = resolve_template_path("/header.j2", base).unwrap();
        assert_eq!(result, file_path.canonicalize().unwrap());
        let result = resolve_template_path("\\header.j2", base).unwrap();
        assert_eq!(result, file_path.canonicalize().unwrap());
    }

    #[test]
    fn test_resolve_template_path_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();

        fs::create_dir_all(base.join("partials/nav")).unwrap();
        let file_path = base.join("partials/nav/menu.j2");
        fs::write(&file_path, "menu").unwrap();

        let result = resolve_template_path("partials/nav/menu.j2", base).unwrap();
        assert_eq!(result, file_path.canonicalize().unwrap());
    }

    #[test]
    fn test_resolve_template_path_traversal_prevention() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();

        let nested_dir = base.join("templates").join("nested");
        fs::create_dir_all(&nested_dir).unwrap();

        let result = resolve_template_path("../../../", &nested_dir);
        assert!(matches!(result, Err(RenderError::PathTraversal { .. })));

        let result = resolve_template_path("../secret.j2", &nested_dir);
        assert!(matches!(result, Err(RenderError::PathTraversal { .. })));
    }

    #[test]
    fn test_resolve_template_path_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();

        let resolved = resolve_template_path("missing.j2", base).unwrap();
        let expected = base.canonicalize().unwrap().join("missing.j2");
        assert_eq!(resolved, expected);
    }

    #[test]
    fn test_write_atomic_creates_and_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("out.conf");

        write_atomic(&target, "first\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "first\n");

        write_atomic(&target, "second\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "second\n");

        // No temporary files left behind
        let entries = fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_write_atomic_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("no-such-dir").join("out.conf");

        let result = write_atomic(&target, "text");
        assert!(matches!(result, Err(RenderError::OutputWrite { .. })));
        assert!(!target.exists());
    }

    #[test]
    fn test_stage_write_leaves_destination_until_commit() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("out.conf");
        fs::write(&target, "old\n").unwrap();

        let staged = stage_write(&target, "new\n").unwrap();
        assert_eq!(staged.destination(), target.as_path());
        assert_eq!(fs::read_to_string(&target).unwrap(), "old\n");

        staged.commit().unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new\n");
    }

    #[test]
    fn test_stage_write_dropped_without_commit() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("out.conf");

        drop(stage_write(&target, "text").unwrap());
        assert!(!target.exists());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stage_write_rejects_directory_destination() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("taken");
        fs::create_dir(&target).unwrap();

        let result = stage_write(&target, "text");
        assert!(matches!(result, Err(RenderError::OutputWrite { .. })));
        assert!(target.is_dir());
    }

    #[test]
    fn test_separate_output_path_strips_last_extension() {
        let outdir = Path::new("build");

        let path = separate_output_path(Path::new("templates/nginx.conf.j2"), outdir).unwrap();
        assert_eq!(path, PathBuf::from("build/nginx.conf"));

        let path = separate_output_path(Path::new("README"), outdir).unwrap();
        assert_eq!(path, PathBuf::from("build/README"));
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("page.j2")), PathBuf::from("."));
        assert_eq!(
            parent_dir(Path::new("templates/page.j2")),
            PathBuf::from("templates")
        );
    }
}
