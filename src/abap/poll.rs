//! Status polling for asynchronous ABAP operations.
//!
//! A create call returns a correlation handle; the resulting status URL is
//! polled until the operation leaves the running state or the attempt
//! budget is exhausted.

use std::thread;
use std::time::Duration;

use serde::Deserialize;

use crate::abap::{ConnectionDetails, OperationStatus};
use crate::error::{Error, Result};
use crate::http::HttpSender;

#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    d: StatusEntity,
}

#[derive(Debug, Deserialize)]
struct StatusEntity {
    status: String,
}

/// One status query against the connection's URL.
///
/// Transport errors and unparsable bodies propagate immediately; the
/// poller never retries a failed query.
pub fn fetch_status(
    connection: &ConnectionDetails,
    client: &dyn HttpSender,
) -> Result<OperationStatus> {
    let response = client.send("GET", &connection.url, None, &connection.headers())?;
    let envelope: StatusEnvelope = response.json()?;
    Ok(OperationStatus::from_code(&envelope.d.status))
}

/// Polls the connection's status URL until the remote operation reaches a
/// terminal state.
///
/// Returns the terminal status on success, `Error::RemoteOperation` when
/// the backend reports failure, and `Error::Timeout` when `max_attempts`
/// queries all observed the running state. The loop terminates exactly
/// once; `operation` names the work in error messages.
pub fn poll_until_terminal(
    operation: &str,
    connection: &ConnectionDetails,
    client: &dyn HttpSender,
    interval: Duration,
    max_attempts: u32,
) -> Result<OperationStatus> {
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        let status = fetch_status(connection, client)?;
        match status {
            OperationStatus::Running => {}
            OperationStatus::Failed => {
                return Err(Error::RemoteOperation(operation.to_string()));
            }
            terminal => return Ok(terminal),
        }
        if attempts >= max_attempts {
            return Err(Error::Timeout(format!(
                "{} (no terminal status after {} attempts)",
                operation, attempts
            )));
        }
        thread::sleep(interval);
    }
}
