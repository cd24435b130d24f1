//! Thin adapter over the `git` binary
//!
//! Only the plumbing the filters need: repository discovery, listing files
//! that carry our filter attribute, reading staged blobs, re-checking out
//! files, and editing repository config.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::subprocess;

/// Name of the filter and diff driver in `.gitattributes` and git config
pub const FILTER_NAME: &str = "redact";

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("failed to run git: {0}")]
    Spawn(#[source] io::Error),
    #[error("git {command} failed: {stderr}")]
    Failed { command: String, stderr: String },
    #[error("unexpected output from git {command}: {detail}")]
    Output { command: String, detail: String },
    #[error("working tree has uncommitted changes; commit or stash them first")]
    Dirty,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A file in the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    /// Path relative to the top of the work tree
    pub path: PathBuf,
    /// Object id of the staged blob
    pub object: String,
}

#[derive(Debug, Clone)]
pub struct GitRepo {
    dir: PathBuf,
}

impl GitRepo {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn command(&self) -> Command {
        let mut command = Command::new("git");
        command.arg("-C").arg(&self.dir);
        command
    }

    fn run<I, S>(&self, args: I) -> Result<Vec<u8>, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = self.command();
        command.args(args);
        let output = subprocess::run(&mut command).map_err(GitError::Spawn)?;
        check(&command, output)
    }

    fn run_with_input(&self, args: &[&str], input: &[u8]) -> Result<Vec<u8>, GitError> {
        let mut command = self.command();
        command.args(args);
        let output = subprocess::run_with_input(&mut command, input).map_err(GitError::Spawn)?;
        check(&command, output)
    }

    fn run_line(&self, args: &[&str]) -> Result<String, GitError> {
        let stdout = self.run(args)?;
        Ok(String::from_utf8_lossy(&stdout).trim_end().to_string())
    }

    /// Root of the work tree
    pub fn top_level(&self) -> Result<PathBuf, GitError> {
        Ok(PathBuf::from(self.run_line(&["rev-parse", "--show-toplevel"])?))
    }

    /// The git directory shared by every worktree
    pub fn common_dir(&self) -> Result<PathBuf, GitError> {
        let path = PathBuf::from(self.run_line(&["rev-parse", "--git-common-dir"])?);
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(self.dir.join(path))
        }
    }

    /// Whether tracked files have no staged or unstaged changes
    pub fn is_clean(&self) -> Result<bool, GitError> {
        Ok(self
            .run(["status", "--porcelain", "--untracked-files=no"])?
            .is_empty())
    }

    pub fn ensure_clean(&self) -> Result<(), GitError> {
        if self.is_clean()? {
            Ok(())
        } else {
            Err(GitError::Dirty)
        }
    }

    /// Every staged file whose `filter` attribute is `filter`
    pub fn list_files(&self, filter: &str) -> Result<Vec<TrackedFile>, GitError> {
        let top = self.top_level()?;
        let repo = GitRepo::new(top);

        let listing = repo.run(["ls-files", "--cached", "--stage", "-z", "--full-name"])?;
        let files = parse_ls_files(&listing)?;
        if files.is_empty() {
            return Ok(files);
        }

        let mut paths = Vec::new();
        for file in &files {
            paths.extend_from_slice(file.path.to_string_lossy().as_bytes());
            paths.push(0);
        }
        let attributes = repo.run_with_input(&["check-attr", "-z", "--stdin", "filter"], &paths)?;
        let filtered = parse_check_attr(&attributes)?;

        Ok(files
            .into_iter()
            .filter(|file| {
                filtered
                    .iter()
                    .any(|(path, value)| path == &file.path && value == filter)
            })
            .collect())
    }

    /// Contents of a blob as stored in the object database
    pub fn cat_blob(&self, object: &str) -> Result<Vec<u8>, GitError> {
        self.run(["cat-file", "blob", object])
    }

    /// Rewrite `paths` in the work tree from the index, running the filters again
    ///
    /// The files are removed first; otherwise git considers them up to date
    /// and skips the smudge.
    pub fn checkout(&self, paths: &[PathBuf]) -> Result<(), GitError> {
        if paths.is_empty() {
            return Ok(());
        }
        let top = self.top_level()?;
        for path in paths {
            match std::fs::remove_file(top.join(path)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        let mut args: Vec<&OsStr> = vec![OsStr::new("checkout"), OsStr::new("--")];
        args.extend(paths.iter().map(|p| p.as_os_str()));
        GitRepo::new(top).run(args)?;
        Ok(())
    }

    /// Re-checkout every file carrying our filter, returning their paths
    pub fn refresh_filtered_files(&self) -> Result<Vec<PathBuf>, GitError> {
        let paths: Vec<PathBuf> = self
            .list_files(FILTER_NAME)?
            .into_iter()
            .map(|file| file.path)
            .collect();
        self.checkout(&paths)?;
        tracing::debug!(count = paths.len(), "refreshed filtered files");
        Ok(paths)
    }

    pub fn set_config(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.run(["config", key, value])?;
        Ok(())
    }

    /// Remove `key` from the repository config; a missing key is not an error
    pub fn unset_config(&self, key: &str) -> Result<(), GitError> {
        let mut command = self.command();
        command.args(["config", "--unset-all", key]);
        let output = subprocess::run(&mut command).map_err(GitError::Spawn)?;
        // exit status 5: the key was not set
        if output.status.code() == Some(5) {
            return Ok(());
        }
        check(&command, output)?;
        Ok(())
    }

    /// Point the filter and diff drivers at `program`
    pub fn install_filters(&self, program: &Path) -> Result<(), GitError> {
        let program = shell_quote(&program.to_string_lossy());
        for (key, value) in filter_config(&program) {
            self.set_config(&key, &value)?;
        }
        Ok(())
    }

    pub fn uninstall_filters(&self) -> Result<(), GitError> {
        for (key, _) in filter_config("") {
            self.unset_config(&key)?;
        }
        Ok(())
    }

    /// Whether the filter drivers are configured
    pub fn filters_installed(&self) -> Result<bool, GitError> {
        let mut command = self.command();
        let key = format!("filter.{}.smudge", FILTER_NAME);
        command.args(["config", "--get", key.as_str()]);
        let output = subprocess::run(&mut command).map_err(GitError::Spawn)?;
        Ok(output.status.success())
    }
}

fn check(command: &Command, output: Output) -> Result<Vec<u8>, GitError> {
    if output.status.success() {
        return Ok(output.stdout);
    }
    Err(GitError::Failed {
        command: describe(command),
        stderr: subprocess::stderr_text(&output),
    })
}

fn describe(command: &Command) -> String {
    // skip "-C <dir>"
    command
        .get_args()
        .skip(2)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn filter_config(program: &str) -> Vec<(String, String)> {
    vec![
        (
            format!("filter.{}.clean", FILTER_NAME),
            format!("{} git clean", program),
        ),
        (
            format!("filter.{}.smudge", FILTER_NAME),
            format!("{} git smudge", program),
        ),
        (format!("filter.{}.required", FILTER_NAME), "true".to_string()),
        (
            format!("diff.{}.textconv", FILTER_NAME),
            format!("{} git textconv", program),
        ),
    ]
}

/// Single-quote `s` for the shell git runs filter commands through
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Parse `git ls-files --stage -z`: `<mode> <object> <stage>\t<path>\0`
fn parse_ls_files(output: &[u8]) -> Result<Vec<TrackedFile>, GitError> {
    let malformed = |detail: String| GitError::Output {
        command: "ls-files".to_string(),
        detail,
    };

    let mut files: Vec<TrackedFile> = Vec::new();
    for entry in output.split(|b| *b == 0).filter(|e| !e.is_empty()) {
        let entry = String::from_utf8_lossy(entry);
        let (meta, path) = entry
            .split_once('\t')
            .ok_or_else(|| malformed(format!("missing tab in {:?}", entry)))?;
        let mut fields = meta.split(' ');
        let object = fields
            .nth(1)
            .ok_or_else(|| malformed(format!("missing object id in {:?}", entry)))?;

        let path = PathBuf::from(path);
        // unmerged paths appear once per stage
        if files.last().is_some_and(|last| last.path == path) {
            continue;
        }
        files.push(TrackedFile {
            path,
            object: object.to_string(),
        });
    }
    Ok(files)
}

/// Parse `git check-attr -z`: repeated `<path>\0<attribute>\0<value>\0`
fn parse_check_attr(output: &[u8]) -> Result<Vec<(PathBuf, String)>, GitError> {
    let fields: Vec<&[u8]> = output.split(|b| *b == 0).collect();
    // trailing NUL leaves one empty element
    let fields = match fields.split_last() {
        Some((last, rest)) if last.is_empty() => rest,
        _ => &fields[..],
    };
    if fields.len() % 3 != 0 {
        return Err(GitError::Output {
            command: "check-attr".to_string(),
            detail: format!("{} fields is not a multiple of three", fields.len()),
        });
    }

    Ok(fields
        .chunks(3)
        .map(|chunk| {
            (
                PathBuf::from(String::from_utf8_lossy(chunk[0]).into_owned()),
                String::from_utf8_lossy(chunk[2]).into_owned(),
            )
        })
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_ls_files() {
        let output = b"100644 e69de29bb2d1d6434b8b29ae775ad8c2e48c5391 0\tsecrets/a.env\0\
100644 5716ca5987cbf97d6bb54920bea6adde242d87e6 0\tREADME.md\0";
        let files = parse_ls_files(output).unwrap();
        assert_eq!(
            files,
            vec![
                TrackedFile {
                    path: PathBuf::from("secrets/a.env"),
                    object: "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391".to_string(),
                },
                TrackedFile {
                    path: PathBuf::from("README.md"),
                    object: "5716ca5987cbf97d6bb54920bea6adde242d87e6".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_ls_files_collapses_stages() {
        let output = b"100644 aaaa 1\tconflict.env\0100644 bbbb 2\tconflict.env\0100644 cccc 3\tconflict.env\0";
        let files = parse_ls_files(output).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].object, "aaaa");
    }

    #[test]
    fn test_parse_ls_files_rejects_garbage() {
        assert!(parse_ls_files(b"no tab here\0").is_err());
        assert!(parse_ls_files(b"").unwrap().is_empty());
    }

    #[test]
    fn test_parse_check_attr() {
        let output = b"secrets/a.env\0filter\0redact\0README.md\0filter\0unspecified\0";
        let attrs = parse_check_attr(output).unwrap();
        assert_eq!(
            attrs,
            vec![
                (PathBuf::from("secrets/a.env"), "redact".to_string()),
                (PathBuf::from("README.md"), "unspecified".to_string()),
            ]
        );
        assert!(parse_check_attr(b"a\0filter\0").is_err());
    }

    #[test]
    fn test_filter_config() {
        let config = filter_config("'/usr/bin/redact'");
        assert!(config.contains(&(
            "filter.redact.smudge".to_string(),
            "'/usr/bin/redact' git smudge".to_string()
        )));
        assert!(config.contains(&("filter.redact.required".to_string(), "true".to_string())));
        assert!(config.contains(&(
            "diff.redact.textconv".to_string(),
            "'/usr/bin/redact' git textconv".to_string()
        )));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/opt/my tools/redact"), "'/opt/my tools/redact'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
