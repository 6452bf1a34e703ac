//! Stdio transport.
//!
//! Newline-delimited JSON over stdin/stdout. Logging goes to stderr so
//! stdout stays clean for frames. A malformed frame is answered with a parse
//! error and the connection stays open; EOF ends the loop gracefully.

use std::io::{self, BufRead, BufReader, Write};
use tracing::{debug, error, warn};

use super::types::{Request, Response, RpcError};
use crate::server::Dispatcher;

/// Stdio transport loop
pub struct StdioTransport;

impl StdioTransport {
    pub fn new() -> Self {
        Self
    }

    /// Run the dispatcher over stdio until EOF
    pub async fn run(self, mut dispatcher: Dispatcher) -> Result<(), io::Error> {
        let stdin = io::stdin();
        let stdout = io::stdout();

        let reader = BufReader::new(stdin.lock());
        let mut stdout = stdout.lock();

        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    error!("failed to read frame: {}", e);
                    break;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            debug!("received frame: {} bytes", line.len());

            let request: Request = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => {
                    warn!("unparseable frame: {}", e);
                    write_response(
                        &mut stdout,
                        &Response::failure(None, RpcError::parse_error()),
                    )?;
                    continue;
                }
            };

            if let Some(response) = dispatcher.handle(request).await {
                write_response(&mut stdout, &response)?;
            }
        }

        Ok(())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn write_response(stdout: &mut impl Write, response: &Response) -> io::Result<()> {
    match serde_json::to_string(response) {
        Ok(rendered) => {
            debug!("sending frame: {} bytes", rendered.len());
            writeln!(stdout, "{rendered}")?;
            stdout.flush()
        }
        Err(e) => {
            error!("failed to serialize response: {}", e);
            // Minimal frame so the client does not hang
            let fallback = r#"{"id":null,"error":{"code":-32603,"message":"internal error"}}"#;
            writeln!(stdout, "{fallback}")?;
            stdout.flush()
        }
    }
}
