//! Response framing for the in-process API (§6.1, §7 layer 1).
//!
//! The spec describes this boundary as a `{status_code, data_or_value, data_size}` C-ABI triple
//! (the shape a wasm/FFI caller receives). Internally this core models the same contract with an
//! idiomatic `Response<T>`, and [`Response::into_wire`]/[`Response::from_result`] are the two
//! conversion points a binding layer would use.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::AnalyzerError;

/// Status codes for the in-process API (§7 layer 1). `Ok` is the only success variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    Invalid,
    NotImplemented,
    ExecutionError,
    IoError,
}

impl Status {
    pub fn code(self) -> u32 {
        match self {
            Status::Ok => 0,
            Status::Invalid => 1,
            Status::NotImplemented => 2,
            Status::ExecutionError => 3,
            Status::IoError => 4,
        }
    }
}

impl From<&AnalyzerError> for Status {
    fn from(err: &AnalyzerError) -> Self {
        match err {
            AnalyzerError::Invalid(_) => Status::Invalid,
            AnalyzerError::NotImplemented(_) => Status::NotImplemented,
            AnalyzerError::ExecutionError(_) => Status::ExecutionError,
            AnalyzerError::IoError(_) => Status::IoError,
        }
    }
}

/// `Response = {status_code, data_or_value, data_size}` (§6.1): on success, `payload` holds the
/// artifact; on failure, `message` holds the UTF-8 error text and `payload` is absent.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Response<T> {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Response<T> {
    pub fn ok(payload: T) -> Self {
        Response {
            status: Status::Ok,
            payload: Some(payload),
            message: None,
        }
    }

    pub fn from_result(result: Result<T, AnalyzerError>) -> Self {
        match result {
            Ok(payload) => Response::ok(payload),
            Err(err) => Response {
                status: Status::from(&err),
                payload: None,
                message: Some(err.to_string()),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_result_ok() {
        let r: Response<u32> = Response::from_result(Ok(5));
        assert!(r.is_ok());
        assert_eq!(r.payload, Some(5));
        assert_eq!(r.status.code(), 0);
    }

    #[test]
    fn test_from_result_err() {
        let r: Response<u32> = Response::from_result(Err(AnalyzerError::invalid("bad")));
        assert!(!r.is_ok());
        assert!(r.payload.is_none());
        assert_eq!(r.status, Status::Invalid);
        assert_eq!(r.status.code(), 1);
        assert!(r.message.unwrap().contains("bad"));
    }
}
