use std::io;

use async_trait::async_trait;
use dialoguer::{Input, console::Term};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Source of one-time codes for an MFA device
#[async_trait]
pub trait MfaCodeSource: Send + Sync {
    /// Read one code for `serial`, as typed by the operator
    async fn read_code(&self, serial: &str) -> Result<String>;
}

/// Obtain a code for `serial`, or `None` when no MFA device is configured.
///
/// The read is abandoned if `shutdown` fires first.
pub async fn obtain_code(
    source: &dyn MfaCodeSource,
    serial: Option<&str>,
    shutdown: &CancellationToken,
) -> Result<Option<String>> {
    let Some(serial) = serial.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let code = tokio::select! {
        code = source.read_code(serial) => code?,
        _ = shutdown.cancelled() => {
            return Err(Error::io(
                "Failed to read MFA code",
                io::Error::new(io::ErrorKind::Interrupted, "shutdown requested"),
            ));
        }
    };

    Ok(Some(code.trim().to_string()))
}

/// Prompts on the controlling terminal, or reads plain lines from stdin when
/// stderr is redirected or no terminal is attached
#[derive(Debug)]
pub struct TerminalPrompt {
    stdin: Mutex<BufReader<Stdin>>,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self {
            stdin: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MfaCodeSource for TerminalPrompt {
    async fn read_code(&self, serial: &str) -> Result<String> {
        let prompt = format!("Enter MFA code for {serial}");

        if !Term::stderr().is_term() {
            eprint!("{prompt}: ");
            let mut stdin = self.stdin.lock().await;
            return read_line_code(&mut *stdin).await;
        }

        tokio::task::spawn_blocking(move || {
            Input::<String>::new()
                .with_prompt(prompt)
                .interact_text()
                .map_err(prompt_error)
        })
        .await
        .map_err(|e| Error::io("Failed to read MFA code", io::Error::other(e)))?
    }
}

/// Read one line of operator input; end of input is an error
pub async fn read_line_code<R>(reader: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .await
        .map_err(|e| Error::io("Failed to read MFA code", e))?;

    if read == 0 {
        return Err(Error::io(
            "Failed to read MFA code",
            io::Error::new(io::ErrorKind::UnexpectedEof, "no input"),
        ));
    }

    Ok(line.trim().to_string())
}

// Ctrl-C on the raw-mode prompt surfaces as ErrorKind::Interrupted.
fn prompt_error(e: dialoguer::Error) -> Error {
    let dialoguer::Error::IO(source) = e;
    Error::io("Failed to read MFA code", source)
}
