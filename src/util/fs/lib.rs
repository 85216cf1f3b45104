/* ************************************************************************ **
** This file is part of bocs, and is licensed under EITHER the MIT license  **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of bocs is provided under this permissive license, **
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

//! Thin wrappers around `std::fs` whose errors say which file was involved.

#[macro_use]
extern crate log;

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("while opening file '{}': {}", path.display(), source)]
    Open { path: PathBuf, source: io::Error },

    #[error("could not create file '{}': {}", path.display(), source)]
    Create { path: PathBuf, source: io::Error },

    #[error("could not create directory '{}': {}", path.display(), source)]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("while reading '{}' (line {}): {}", path.display(), line, source)]
    ReadLine { path: PathBuf, line: usize, source: io::Error },
}

pub type Result<T> = std::result::Result<T, FsError>;

/// Wrapper around `File::open` that adds context.
pub fn open(path: impl AsRef<Path>) -> Result<File> {
    let path = path.as_ref();
    File::open(path).map_err(|source| FsError::Open { path: path.to_owned(), source })
}

/// Wrapper around `File::open` that adds context and makes a `BufReader`.
pub fn open_text(path: impl AsRef<Path>) -> Result<BufReader<File>>
{ open(path).map(BufReader::new) }

/// Wrapper around `File::create` that adds context.
pub fn create(path: impl AsRef<Path>) -> Result<File> {
    let path = path.as_ref();
    trace!("creating '{}'", path.display());
    File::create(path).map_err(|source| FsError::Create { path: path.to_owned(), source })
}

/// Wrapper around `File::create` that adds context and makes a `BufWriter`.
pub fn create_buffered(path: impl AsRef<Path>) -> Result<BufWriter<File>>
{ create(path).map(BufWriter::new) }

/// Wrapper around `fs::create_dir_all` that adds context.
pub fn create_dir_all(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::create_dir_all(path).map_err(|source| FsError::CreateDir { path: path.to_owned(), source })
}

/// Read all lines of a text file, numbered from 1.
///
/// Unlike `BufRead::lines`, an error says which line could not be read.
pub fn read_numbered_lines(path: impl AsRef<Path>) -> Result<Vec<(usize, String)>> {
    let path = path.as_ref();
    let mut out = vec![];
    for (i, line) in open_text(path)?.lines().enumerate() {
        let line = line.map_err(|source| FsError::ReadLine {
            path: path.to_owned(),
            line: i + 1,
            source,
        })?;
        out.push((i + 1, line));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn open_error_names_the_path() {
        let err = open("/definitely/not/a/real/path.dat").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/a/real/path.dat"));
    }

    #[test]
    fn lines_are_numbered_from_one() {
        let dir = tempdir::TempDir::new("bocs-fs").unwrap();
        let path = dir.path().join("table.dat");
        {
            let mut f = create_buffered(&path).unwrap();
            writeln!(f, "a").unwrap();
            writeln!(f, "b").unwrap();
        }
        let lines = read_numbered_lines(&path).unwrap();
        assert_eq!(lines, vec![(1, "a".to_string()), (2, "b".to_string())]);
    }

    #[test]
    fn nested_directories() {
        let dir = tempdir::TempDir::new("bocs-fs").unwrap();
        let path = dir.path().join("a/b/c");
        create_dir_all(&path).unwrap();
        create_dir_all(&path).unwrap();
        assert!(path.is_dir());
    }
}
