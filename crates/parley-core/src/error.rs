use http::StatusCode;

/// Domain errors that the gateway reports as HTTP status + JSON body
///
/// Only pre-flight rejections go through this path. Vendor-side chat
/// failures are turned into chat content instead.
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error type (e.g. `invalid_request_error`)
    fn error_type(&self) -> &str;

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String;

    /// Structured `{"error": {...}}` body shared by every endpoint
    fn error_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "message": self.client_message(),
                "type": self.error_type(),
                "code": self.status_code().as_u16(),
            }
        })
    }
}
