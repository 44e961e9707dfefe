//! Heartbeat boundary.
//!
//! Every request is validated before the store is touched: a rejected
//! request never mutates state.

use std::collections::BTreeMap;
use std::sync::Arc;

use sha2::Digest;
use sha2::Sha512;
use tracing::debug;
use tracing::warn;
use warp::http::StatusCode;

use crate::metrics::HEARTBEATS_RECEIVED;
use crate::ClientConfig;
use crate::StateStore;

pub(crate) const CLIENT_ID_PARAM: &str = "clientid";
pub(crate) const KEY_PARAM: &str = "key";

#[derive(Debug, thiserror::Error)]
pub enum IngestRejection {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Parameter given more than once: {0}")]
    DuplicateParameter(&'static str),

    #[error("Unknown client: {0}")]
    UnknownClient(String),

    #[error("Invalid key for client: {0}")]
    InvalidKey(String),

    #[error("Heartbeat could not be recorded")]
    Internal,
}

impl warp::reject::Reject for IngestRejection {}

impl IngestRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestRejection::MissingParameter(_) | IngestRejection::DuplicateParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            IngestRejection::UnknownClient(_) => StatusCode::NOT_FOUND,
            IngestRejection::InvalidKey(_) => StatusCode::UNAUTHORIZED,
            IngestRejection::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Validates heartbeat requests and records the accepted ones.
pub struct HeartbeatIngest {
    store: Arc<StateStore>,
    clients: BTreeMap<String, ClientConfig>,
}

impl HeartbeatIngest {
    pub fn new(
        store: Arc<StateStore>,
        clients: BTreeMap<String, ClientConfig>,
    ) -> Self {
        Self { store, clients }
    }

    /// Checks the query parameters and returns the client id they name.
    ///
    /// The key is only required, and only checked, for clients configured
    /// with a digest.
    pub fn validate<'a>(
        &self,
        params: &'a [(String, String)],
    ) -> Result<&'a str, IngestRejection> {
        let client_id = single_param(params, CLIENT_ID_PARAM)?
            .ok_or(IngestRejection::MissingParameter(CLIENT_ID_PARAM))?;
        let key = single_param(params, KEY_PARAM)?;

        let Some(client) = self.clients.get(client_id) else {
            return Err(IngestRejection::UnknownClient(client_id.to_string()));
        };
        if !self.store.contains(client_id) {
            return Err(IngestRejection::UnknownClient(client_id.to_string()));
        }

        if let Some(expected) = &client.key {
            let key = key.ok_or(IngestRejection::MissingParameter(KEY_PARAM))?;
            if !key_matches(key, expected) {
                return Err(IngestRejection::InvalidKey(client_id.to_string()));
            }
        }

        Ok(client_id)
    }

    /// Records a heartbeat for a client that already passed validation.
    pub fn record_heartbeat(
        &self,
        client_id: &str,
    ) -> Result<(), IngestRejection> {
        self.store.reset_heartbeat(client_id).map_err(|e| {
            warn!("recording heartbeat for {} failed: {:?}", client_id, e);
            IngestRejection::Internal
        })?;
        HEARTBEATS_RECEIVED.with_label_values(&[client_id]).inc();
        debug!("heartbeat from client {}", client_id);
        Ok(())
    }

    pub fn handle(
        &self,
        params: &[(String, String)],
    ) -> Result<(), IngestRejection> {
        let client_id = self.validate(params)?;
        self.record_heartbeat(client_id)
    }
}

fn single_param<'a>(
    params: &'a [(String, String)],
    name: &'static str,
) -> Result<Option<&'a str>, IngestRejection> {
    let mut values = params.iter().filter(|(k, _)| k == name).map(|(_, v)| v.as_str());
    let first = values.next();
    if values.next().is_some() {
        return Err(IngestRejection::DuplicateParameter(name));
    }
    Ok(first)
}

/// Compares the SHA-512 of `key` with the configured hex digest.
pub(crate) fn key_matches(
    key: &str,
    expected_digest: &str,
) -> bool {
    let digest = hex::encode(Sha512::digest(key.as_bytes()));
    digest.eq_ignore_ascii_case(expected_digest)
}
