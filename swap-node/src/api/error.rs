//! Wires `crate::error::ApiError` into actix-web's `ResponseError`, turning
//! every failure into the `{code, msg, data?}` envelope (§6). HTTP status
//! stays 200 for any `code >= 10000` per the spec; only genuinely malformed
//! requests actix itself rejects (unparseable JSON) fall outside that.

use actix_web::{HttpResponse, ResponseError};

use crate::error::{error_code, ApiError};

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let (code, msg) = error_code(self);
        HttpResponse::Ok().json(serde_json::json!({
            "code": code,
            "msg": msg,
        }))
    }
}
