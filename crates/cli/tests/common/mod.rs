//! Shared helpers for driving the redact binary against scratch repositories
#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// Whether a usable `git` is on PATH
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn identity(command: &mut Command) -> &mut Command {
    command
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
}

/// Run git in `dir`, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> Vec<u8> {
    let output = identity(Command::new("git").arg("-C").arg(dir).args(args))
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    output.stdout
}

/// Run the redact binary in `dir`, feeding `stdin`
pub fn redact(dir: &Path, args: &[&str], stdin: &[u8]) -> Output {
    let mut child = identity(
        Command::new(env!("CARGO_BIN_EXE_redact"))
            .arg("--repo")
            .arg(dir)
            .args(args),
    )
    .env_remove("RUST_LOG")
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .unwrap();
    child.stdin.take().unwrap().write_all(stdin).unwrap();
    child.wait_with_output().unwrap()
}

/// Run redact and return stdout, panicking on failure
pub fn redact_ok(dir: &Path, args: &[&str]) -> String {
    let output = redact(dir, args, b"");
    assert!(
        output.status.success(),
        "redact {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

/// A scratch directory holding a fresh repository and a native keyring
pub struct Sandbox {
    pub temp: TempDir,
    pub repo: PathBuf,
    pub keyring: PathBuf,
}

pub fn sandbox() -> Sandbox {
    let temp = TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    let keyring = temp.path().join("keyring");
    git(temp.path(), &["init", "-q", repo.to_str().unwrap()]);
    Sandbox {
        temp,
        repo,
        keyring,
    }
}

impl Sandbox {
    /// Initialize redact with the native engine and this sandbox's keyring
    pub fn init(&self) {
        redact_ok(&self.repo, &["init", "--engine", "native"]);
        let config = self.repo.join(".git/redact/config.toml");
        let mut contents = fs::read_to_string(&config).unwrap();
        contents.push_str(&format!("keyring = '{}'\n", self.keyring.display()));
        fs::write(&config, contents).unwrap();
    }

    /// Commit `contents` as a protected file
    pub fn commit_secret(&self, name: &str, contents: &[u8]) {
        fs::write(
            self.repo.join(".gitattributes"),
            format!("{} filter=redact diff=redact\n", name),
        )
        .unwrap();
        fs::write(self.repo.join(name), contents).unwrap();
        git(&self.repo, &["add", ".gitattributes", name]);
        git(&self.repo, &["commit", "-q", "-m", "add secret"]);
    }
}
