use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

const DEVNULL: &str = "/dev/null";

/// Defines what replaces a standard stream (stdin, stdout, stderr) once the
/// process has detached.
#[derive(Debug, Default)]
pub enum Stdio {
    /// Redirects the stream to `/dev/null`. Default option.
    #[default]
    Devnull,
    /// Opens the given path. Stdin is opened read-only; stdout and stderr are
    /// opened for appending and created if missing.
    Path(PathBuf),
    /// Redirects the stream to an already open file.
    File(File),
    /// Keeps the original stream (useful for debugging, not for production).
    Keep,
}

impl Stdio {
    /// Creates a configuration that discards all output.
    pub fn devnull() -> Self {
        Stdio::Devnull
    }

    /// Human readable target, used in error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Stdio::Devnull => DEVNULL.to_owned(),
            Stdio::Path(p) => p.display().to_string(),
            Stdio::File(_) => "<open file>".to_owned(),
            Stdio::Keep => "<inherited>".to_owned(),
        }
    }

    /// Opens the target for the given stream direction.
    /// Returns `None` for `Keep` and for `File`, which is already open.
    pub(crate) fn open(&self, readable: bool) -> io::Result<Option<File>> {
        match self {
            Stdio::Devnull => OpenOptions::new()
                .read(true)
                .write(true)
                .open(DEVNULL)
                .map(Some),
            Stdio::Path(path) if readable => File::open(path).map(Some),
            Stdio::Path(path) => OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map(Some),
            Stdio::File(_) | Stdio::Keep => Ok(None),
        }
    }
}

impl From<File> for Stdio {
    fn from(f: File) -> Self {
        Stdio::File(f)
    }
}

impl From<PathBuf> for Stdio {
    fn from(p: PathBuf) -> Self {
        Stdio::Path(p)
    }
}

impl From<&Path> for Stdio {
    fn from(p: &Path) -> Self {
        Stdio::Path(p.to_path_buf())
    }
}

impl From<&str> for Stdio {
    fn from(p: &str) -> Self {
        Stdio::Path(PathBuf::from(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn output_path_is_created_and_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        std::fs::write(&path, "first\n").unwrap();

        let stdio = Stdio::from(path.as_path());
        let mut f = stdio.open(false).unwrap().unwrap();
        writeln!(f, "second").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn input_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let stdio = Stdio::Path(dir.path().join("missing"));
        let err = stdio.open(true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn devnull_reads_empty() {
        let mut f = Stdio::devnull().open(true).unwrap().unwrap();
        let mut buf = Vec::new();
        f.read_to_end(&mut buf).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn keep_opens_nothing() {
        assert!(Stdio::Keep.open(false).unwrap().is_none());
        assert_eq!(Stdio::Keep.describe(), "<inherited>");
    }
}
