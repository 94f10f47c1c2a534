//! Subprocess runner (spec §4.1).
//!
//! Spawns a command with login-shell argv semantics (`sh -c <cmd>`),
//! writes `stdin` if given, and collects stdout and the exit status. Built
//! on `tokio::process::Command` so spawn/wait never blocks the reactor
//! task — the async analogue of the teacher's thread-pool-backed command
//! runner in `engine/runtime.rs`.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub struct CommandOutput {
    pub stdout: String,
    pub success: bool,
    pub code: Option<i32>,
}

pub async fn execute_command(cmd: &str, stdin: Option<Vec<u8>>) -> std::io::Result<CommandOutput> {
    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd).stdout(Stdio::piped()).stderr(Stdio::null());
    command.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });

    let mut child = command.spawn()?;

    if let Some(data) = stdin {
        if let Some(mut sink) = child.stdin.take() {
            sink.write_all(&data).await?;
        }
        // `sink` drops here, closing the write side before we wait.
    }

    let output = child.wait_with_output().await?;
    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        success: output.status.success(),
        code: output.status.code(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_success() {
        let out = execute_command("echo hello", None).await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.success);
        assert_eq!(out.code, Some(0));
    }

    #[tokio::test]
    async fn echoes_stdin_back() {
        let out = execute_command("cat", Some(b"payload".to_vec())).await.unwrap();
        assert_eq!(out.stdout, "payload");
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let out = execute_command("exit 3", None).await.unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(3));
    }
}
