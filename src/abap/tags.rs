//! Tag creation against the MANAGE_GIT_REPOSITORY OData service.
//!
//! One CSRF-priming call opens a session for the whole batch; every tag
//! then goes through a create+poll cycle. Individual failures are logged
//! and do not cancel the rest of the batch.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::abap::backlog::{build_backlog, Tag, WorkItem};
use crate::abap::poll::poll_until_terminal;
use crate::abap::{ConnectionDetails, CreateTagConfig};
use crate::error::{Error, Result};
use crate::http::{ClientOptions, HttpSender, DEFAULT_MAX_REQUEST_DURATION};
use crate::local_files::FileAccess;
use crate::logging::Log;

const TAGS_PATH: &str = "/sap/opu/odata/sap/MANAGE_GIT_REPOSITORY/Tags";
const PULL_PATH: &str = "/sap/opu/odata/sap/MANAGE_GIT_REPOSITORY/Pull";

/// Seconds between status checks; with the attempt budget this bounds a
/// single operation to roughly ten minutes.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const MAX_POLL_ATTEMPTS: u32 = 200;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateTagRequest {
    #[serde(rename = "sc_name")]
    pub repository_name: String,
    #[serde(rename = "commit_id")]
    pub commit_id: String,
    #[serde(rename = "tag_name")]
    pub tag_name: String,
    #[serde(rename = "tag_description")]
    pub tag_description: String,
}

#[derive(Debug, Deserialize)]
struct CreateTagEnvelope {
    d: CreateTagResponse,
}

#[derive(Debug, Deserialize)]
struct CreateTagResponse {
    uuid: Uuid,
}

/// CSRF session for one batch of writes.
///
/// Opened with a single HEAD request whose response header supplies the
/// token reused by every create call in the batch. A token the backend
/// later rejects is a hard failure; it is never re-fetched mid-batch.
pub struct TagSession {
    connection: ConnectionDetails,
}

impl TagSession {
    pub fn open(base: &ConnectionDetails, client: &dyn HttpSender) -> Result<Self> {
        let mut connection = base.clone();
        connection.url = format!("{}{}", base.url.trim_end_matches('/'), TAGS_PATH);
        connection.csrf_token = Some("fetch".to_string());

        let response = client.send("HEAD", &connection.url, None, &connection.headers())?;
        let token = response.header("x-csrf-token").ok_or_else(|| {
            Error::RemoteOperation(
                "authentication on the ABAP system did not return a CSRF token".to_string(),
            )
        })?;

        connection.csrf_token = Some(token.to_string());
        Ok(Self { connection })
    }

    fn status_url(&self, handle: &Uuid) -> String {
        format!(
            "{}{}(guid'{}')",
            self.connection.host.trim_end_matches('/'),
            PULL_PATH,
            handle
        )
    }

    /// Creates one tag and polls the resulting operation to a terminal
    /// state.
    fn create_tag(
        &self,
        item: &WorkItem,
        tag: &Tag,
        client: &dyn HttpSender,
        interval: Duration,
        max_attempts: u32,
    ) -> Result<()> {
        let request = CreateTagRequest {
            repository_name: item.repository_name.clone(),
            commit_id: item.commit_id.clone(),
            tag_name: tag.name.clone(),
            tag_description: tag.description.clone(),
        };
        let operation = format!(
            "create tag {} for repository {} with commitID {}",
            request.tag_name, request.repository_name, request.commit_id
        );

        let body = serde_json::to_vec(&request)?;
        let response = client.send(
            "POST",
            &self.connection.url,
            Some(&body),
            &self.connection.headers(),
        )?;
        let envelope: CreateTagEnvelope = response.json()?;

        let mut status_connection = self.connection.clone();
        status_connection.url = self.status_url(&envelope.d.uuid);
        poll_until_terminal(&operation, &status_connection, client, interval, max_attempts)?;
        Ok(())
    }
}

/// Processes the backlog: one CSRF-priming call, then a create+poll cycle
/// per tag in insertion order.
///
/// A failed tag is logged and the loop continues; the last error
/// encountered is what the batch returns. This is deliberately not
/// fail-fast.
pub fn create_tags(
    backlog: &[WorkItem],
    connection: &ConnectionDetails,
    client: &dyn HttpSender,
    log: &dyn Log,
) -> Result<()> {
    create_tags_with(
        backlog,
        connection,
        client,
        log,
        POLL_INTERVAL,
        MAX_POLL_ATTEMPTS,
    )
}

pub fn create_tags_with(
    backlog: &[WorkItem],
    connection: &ConnectionDetails,
    client: &dyn HttpSender,
    log: &dyn Log,
    interval: Duration,
    max_attempts: u32,
) -> Result<()> {
    let session = TagSession::open(connection, client)?;
    log.debug("Authentication on the ABAP system successful");

    let mut last_error: Option<Error> = None;
    for item in backlog {
        for tag in &item.tags {
            match session.create_tag(item, tag, client, interval, max_attempts) {
                Ok(()) => {
                    log.info(&format!(
                        "Created tag {} for repository {} with commitID {}",
                        tag.name, item.repository_name, item.commit_id
                    ));
                }
                Err(err) => {
                    log.error(&format!(
                        "NOT created: tag {} for repository {} with commitID {}: {}",
                        tag.name, item.repository_name, item.commit_id, err
                    ));
                    last_error = Some(err);
                }
            }
        }
    }

    match last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Step entry point: configures the transport, builds the backlog and
/// processes it.
pub fn run(
    config: &CreateTagConfig,
    client: &mut dyn HttpSender,
    files: &dyn FileAccess,
    log: &dyn Log,
) -> Result<()> {
    if config.host.is_empty() || config.username.is_empty() || config.password.is_empty() {
        return Err(Error::Config(
            "host, username and password are required for the ABAP connection".to_string(),
        ));
    }
    log.register_secret(&config.password);

    client.set_options(ClientOptions {
        max_request_duration: Some(DEFAULT_MAX_REQUEST_DURATION),
        username: Some(config.username.clone()),
        password: Some(config.password.clone()),
        token: None,
    });

    let backlog = build_backlog(config, files)?;
    let connection = ConnectionDetails {
        url: config.host.clone(),
        host: config.host.clone(),
        user: config.username.clone(),
        password: config.password.clone(),
        csrf_token: None,
    };

    create_tags(&backlog, &connection, client, log)
}
