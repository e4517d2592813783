use serde::Deserialize;
use tracing::debug;

use super::FeedRow;
use crate::errors::FeedError;

/// Result code the feed uses for a normal response.
pub const SUCCESS_CODE: &str = "INFO-000";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "mealServiceDietInfo")]
    service: Option<Vec<Segment>>,
    // the feed drops the service wrapper and answers with a bare RESULT
    // when nothing matched or the request itself was rejected
    #[serde(rename = "RESULT")]
    result: Option<ResultCode>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    head: Option<Vec<HeadItem>>,
    row: Option<Vec<FeedRow>>,
}

#[derive(Debug, Deserialize)]
struct HeadItem {
    #[serde(rename = "RESULT")]
    result: Option<ResultCode>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResultCode {
    #[serde(rename = "CODE")]
    code: String,
    #[serde(rename = "MESSAGE", default)]
    message: String,
}

/// Decodes a feed response body into rows.
///
/// A non-success `INFO-*` code or an empty body is a valid "no meals" answer.
/// A bare `ERROR-*` result (bad key, quota) is [`FeedError::Upstream`], and a
/// body without a header is [`FeedError::Decode`].
pub fn decode_envelope(body: &str) -> Result<Vec<FeedRow>, FeedError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| FeedError::Decode(e.to_string()))?;

    let Some(segments) = envelope.service else {
        return match envelope.result {
            Some(r) if r.code.starts_with("INFO-") => {
                debug!(code = %r.code, message = %r.message, "feed returned no rows");
                Ok(Vec::new())
            }
            Some(r) => Err(FeedError::Upstream {
                code: r.code,
                message: r.message,
            }),
            None => Err(FeedError::Decode("missing header segment".into())),
        };
    };

    let result = segments
        .iter()
        .filter_map(|s| s.head.as_ref())
        .flatten()
        .find_map(|h| h.result.clone())
        .ok_or_else(|| FeedError::Decode("missing header segment".into()))?;

    if result.code != SUCCESS_CODE {
        debug!(code = %result.code, message = %result.message, "feed returned non-success code");
        return Ok(Vec::new());
    }

    Ok(segments.into_iter().filter_map(|s| s.row).flatten().collect())
}
