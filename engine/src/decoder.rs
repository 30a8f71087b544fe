//! Response decoding pipeline.
//!
//! A raw transport response is classified or mapped exactly once, stopping at
//! the first failure:
//!
//! 1. transport error            -> [`Error::Network`]
//! 2. missing or empty body      -> [`Error::EmptySerialization`]
//! 3. body is not JSON           -> [`Error::EmptySerialization`]
//! 4. non-empty `error_message`  -> [`Error::Business`]
//! 5. optional key-path extraction
//! 6. object mapping             -> [`Error::Mapping`] on failure
//!
//! Step 4 always runs before step 6, so a payload such as
//! `{"error_message": "not found", "id": "x"}` never reaches the mapper.

use crate::mapper::{self, map_array, FromJson};
use crate::{Error, Result, Timestamp};
use serde_json::Value;

/// Key path checked for server-reported failures.
pub const ERROR_MESSAGE_KEY_PATH: &str = "error_message";

const NIL_BODY_REASON: &str = "Data could not be serialized. Input data was nil.";
const OBJECT_MAPPING_REASON: &str = "ObjectMapper failed to serialize response";
const ARRAY_MAPPING_REASON: &str = "ObjectMapper failed to serialize response.";

static NULL: Value = Value::Null;

/// What the transport layer handed back for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status, when a response was received at all
    pub status: Option<u16>,
    /// Response body bytes
    pub body: Option<Vec<u8>>,
    /// Connection, TLS or timeout failure reported by the transport
    pub transport_error: Option<String>,
}

impl RawResponse {
    /// A response that arrived with the given status and body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Some(status),
            body: Some(body.into()),
            transport_error: None,
        }
    }

    /// A request that failed before a response was received.
    pub fn transport_failure(reason: impl Into<String>) -> Self {
        Self {
            status: None,
            body: None,
            transport_error: Some(reason.into()),
        }
    }

    /// A response that carried no body.
    pub fn without_body(status: u16) -> Self {
        Self {
            status: Some(status),
            body: None,
            transport_error: None,
        }
    }
}

/// Resolve a dotted key path such as `data.items` through nested objects.
///
/// Only objects are traversed; a path that runs into an array or scalar does
/// not resolve.
pub fn value_for_key_path<'a>(value: &'a Value, key_path: &str) -> Option<&'a Value> {
    key_path
        .split('.')
        .try_fold(value, |current, key| current.as_object()?.get(key))
}

/// Decodes raw responses into entities or classified errors.
#[derive(Debug, Clone, Default)]
pub struct ResponseDecoder {
    key_path: Option<String>,
}

impl ResponseDecoder {
    /// A decoder that maps the whole body.
    pub fn new() -> Self {
        Self::default()
    }

    /// A decoder that maps the subtree at `key_path` (e.g. `"data"`).
    pub fn with_key_path(key_path: impl Into<String>) -> Self {
        Self {
            key_path: Some(key_path.into()),
        }
    }

    pub fn key_path(&self) -> Option<&str> {
        self.key_path.as_deref()
    }

    /// Decode a response holding a single entity.
    pub fn decode_object<T: FromJson>(&self, response: &RawResponse) -> Result<T> {
        self.decode_object_at(response, mapper::now())
    }

    /// Decode a single entity, using `now` for date fallbacks.
    pub fn decode_object_at<T: FromJson>(
        &self,
        response: &RawResponse,
        now: Timestamp,
    ) -> Result<T> {
        let json = self.prepare(response)?;
        let target = self.extract(&json);
        T::from_json_at(target, now)
            .ok_or_else(|| Self::fail(response, Error::Mapping(OBJECT_MAPPING_REASON.into())))
    }

    /// Decode a response holding an array of entities.
    ///
    /// Elements that fail to map are dropped, so the result may be shorter
    /// than the array on the wire.
    pub fn decode_array<T: FromJson>(&self, response: &RawResponse) -> Result<Vec<T>> {
        self.decode_array_at(response, mapper::now())
    }

    /// Decode an array of entities, using `now` for date fallbacks.
    pub fn decode_array_at<T: FromJson>(
        &self,
        response: &RawResponse,
        now: Timestamp,
    ) -> Result<Vec<T>> {
        let json = self.prepare(response)?;
        let target = self.extract(&json);

        let elements = target
            .as_array()
            .filter(|elements| elements.iter().all(Value::is_object))
            .ok_or_else(|| Self::fail(response, Error::Mapping(ARRAY_MAPPING_REASON.into())))?;

        let mapped = map_array::<T>(elements, now);
        if mapped.len() < elements.len() {
            tracing::debug!(
                received = elements.len(),
                mapped = mapped.len(),
                "Dropped elements that failed to map"
            );
        }
        Ok(mapped)
    }

    /// Steps 1-4: everything up to and including the business error check.
    fn prepare(&self, response: &RawResponse) -> Result<Value> {
        if let Some(reason) = &response.transport_error {
            return Err(Self::fail(response, Error::Network(reason.clone())));
        }

        let body = match response.body.as_deref() {
            Some(body) if !body.is_empty() => body,
            _ => {
                return Err(Self::fail(
                    response,
                    Error::EmptySerialization(NIL_BODY_REASON.into()),
                ))
            }
        };

        let json: Value = serde_json::from_slice(body).map_err(|e| {
            Self::fail(
                response,
                Error::EmptySerialization(format!("JSON could not be serialized: {}", e)),
            )
        })?;

        if let Some(message) = value_for_key_path(&json, ERROR_MESSAGE_KEY_PATH)
            .and_then(Value::as_str)
            .filter(|message| !message.is_empty())
        {
            return Err(Self::fail(response, Error::Business(message.to_string())));
        }

        Ok(json)
    }

    /// Step 5: narrow to the caller's key path. A missing path yields `Null`
    /// and is reported by the mapping step.
    fn extract<'a>(&self, json: &'a Value) -> &'a Value {
        match self.key_path.as_deref().filter(|path| !path.is_empty()) {
            Some(path) => value_for_key_path(json, path).unwrap_or(&NULL),
            None => json,
        }
    }

    fn fail(response: &RawResponse, error: Error) -> Error {
        tracing::error!(status = ?response.status, error = %error, "Response decoding failed");
        error
    }
}
