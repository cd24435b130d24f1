use std::io::{self, Write};
use std::process::{Command, Output, Stdio};

/// Run `command`, feeding `input` on stdin while collecting stdout and stderr
///
/// The input is written from a scoped thread so a child that produces
/// output before draining its stdin cannot deadlock us.
pub fn run_with_input(command: &mut Command, input: &[u8]) -> io::Result<Output> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "child stdin unavailable"))?;

    std::thread::scope(|scope| {
        scope.spawn(move || {
            // A child that exits early closes the pipe; its exit status says why.
            let _ = stdin.write_all(input);
        });
        child.wait_with_output()
    })
}

/// Run `command` with a closed stdin
pub fn run(command: &mut Command) -> io::Result<Output> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
}

/// Trimmed, lossy stderr for error messages
pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}
