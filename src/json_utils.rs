use std::fmt::Display;

use actix_web::error::PayloadError;
use actix_web::http::header::HeaderMap;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::error::Category;

use crate::error::ToolkitError;
use crate::Tools;

/// Wire shape shared by every JSON response this crate writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonResponse {
    pub error: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self { error: true, message: message.into(), data: None }
    }

    pub fn success(message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self { error: false, message: message.into(), data }
    }
}

impl Tools {
    /// Read a request body of at most `max_json_size` bytes and decode it as a single JSON value.
    pub async fn read_json<T, S>(&self, mut payload: S) -> Result<T, ToolkitError>
    where
        T: DeserializeOwned,
        S: Stream<Item = Result<Bytes, PayloadError>> + Unpin,
    {
        let limit = self.config().max_json_size;
        let mut body = BytesMut::new();
        while let Some(chunk) = payload.next().await {
            let chunk = chunk?;
            if (body.len() + chunk.len()) as u64 > limit {
                log::debug!("Rejected JSON body over {} bytes", limit);
                return Err(ToolkitError::BodyTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        self.decode_json(&body)
    }

    /// Decode `body` as exactly one JSON value.
    ///
    /// Fields the target does not know are rejected unless `allow_unknown_fields`
    /// is set. Failures are mapped to the user facing [`ToolkitError`] kinds.
    pub fn decode_json<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, ToolkitError> {
        let result = self.decode_single(body);
        if let Err(e) = &result {
            log::debug!("Rejected JSON body: {}", e);
        }
        result
    }

    fn decode_single<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, ToolkitError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ToolkitError::EmptyBody);
        }

        let mut de = serde_json::Deserializer::from_slice(body);
        let mut unknown_field: Option<String> = None;
        let mut record_unknown = |path: serde_ignored::Path<'_>| {
            if unknown_field.is_none() {
                unknown_field = Some(path.to_string());
            }
        };
        let decoded = serde_path_to_error::deserialize(serde_ignored::Deserializer::new(
            &mut de,
            &mut record_unknown,
        ));

        // Decoding stops at the first error, so a recorded field came before it.
        if let Some(field) = unknown_field.filter(|_| !self.config().allow_unknown_fields) {
            return Err(ToolkitError::UnknownField { field });
        }
        let value = decoded.map_err(|e| classify_json_error(e, body))?;

        de.end().map_err(|_| ToolkitError::MultipleJsonValues)?;

        Ok(value)
    }
}

/// Map a decode failure onto the user facing error kinds. Anything unrecognised
/// is returned as [`ToolkitError::Decode`].
pub fn classify_json_error(
    err: serde_path_to_error::Error<serde_json::Error>,
    body: &[u8],
) -> ToolkitError {
    let field = err.path().to_string();
    let inner = err.into_inner();
    let offset = byte_offset(body, inner.line(), inner.column());

    match inner.classify() {
        Category::Syntax => ToolkitError::BadlyFormedJson { offset },
        Category::Eof => ToolkitError::TruncatedJson,
        Category::Data => {
            let message = inner.to_string();
            if let Some(name) = unknown_field_name(&message) {
                ToolkitError::UnknownField { field: name.to_string() }
            } else if ["invalid type", "invalid value", "invalid length"]
                .iter()
                .any(|p| message.starts_with(p))
            {
                if field == "." {
                    ToolkitError::IncorrectJsonTypeAt { offset }
                } else {
                    ToolkitError::IncorrectJsonType { field }
                }
            } else {
                ToolkitError::Decode(inner)
            }
        }
        Category::Io => ToolkitError::Decode(inner),
    }
}

fn unknown_field_name(message: &str) -> Option<&str> {
    message
        .strip_prefix("unknown field `")
        .and_then(|rest| rest.split('`').next())
}

fn byte_offset(body: &[u8], line: usize, column: usize) -> usize {
    body.split(|&b| b == b'\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum::<usize>()
        + column
}

/// Serialize `data` and build a response with `status`. Nothing is built if serialization fails.
pub fn write_json<T: Serialize + ?Sized>(
    status: StatusCode,
    data: &T,
) -> Result<HttpResponse, ToolkitError> {
    write_json_with_headers(status, data, &HeaderMap::new())
}

/// [`write_json`] with extra response headers. `Content-Type` is always `application/json`.
pub fn write_json_with_headers<T: Serialize + ?Sized>(
    status: StatusCode,
    data: &T,
    headers: &HeaderMap,
) -> Result<HttpResponse, ToolkitError> {
    let out = serde_json::to_vec(data).map_err(ToolkitError::Serialize)?;

    let mut builder = HttpResponse::build(status);
    for (name, value) in headers.iter() {
        builder.append_header((name.clone(), value.clone()));
    }
    builder.content_type(mime::APPLICATION_JSON);

    Ok(builder.body(out))
}

/// Send `err` as an error envelope with status 400.
pub fn error_json(err: impl Display) -> Result<HttpResponse, ToolkitError> {
    error_json_with_status(err, StatusCode::BAD_REQUEST)
}

pub fn error_json_with_status(
    err: impl Display,
    status: StatusCode,
) -> Result<HttpResponse, ToolkitError> {
    write_json(status, &JsonResponse::error(err.to_string()))
}

/// POST `data` as JSON to `uri` with `client`, or a fresh default client.
///
/// The caller owns the returned response. Errors report as 400 through
/// [`actix_web::ResponseError`].
pub async fn post_json<T: Serialize + ?Sized>(
    uri: &str,
    data: &T,
    client: Option<&reqwest::Client>,
) -> Result<(reqwest::Response, reqwest::StatusCode), ToolkitError> {
    let payload = serde_json::to_vec(data).map_err(ToolkitError::Serialize)?;

    let default_client;
    let client = match client {
        Some(client) => client,
        None => {
            default_client = reqwest::Client::new();
            &default_client
        }
    };

    let res = client
        .post(uri)
        .header(reqwest::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .body(payload)
        .send()
        .await?;
    let status = res.status();

    Ok((res, status))
}
