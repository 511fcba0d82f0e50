//! 错误处理单元测试
//!
//! 测试应用错误类型的状态码、对外消息和响应格式

use axum::{http::StatusCode, response::IntoResponse};
use http_body_util::BodyExt;
use movie_stream::{
    auth::jwt::TokenError,
    error::{AppError, ErrorDetail, ErrorResponse},
};

// ==================== 错误状态码测试 ====================

#[test]
fn test_error_status_codes() {
    assert_eq!(
        AppError::unauthorized("x").status_code(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
    assert_eq!(
        AppError::BadRequest("invalid".to_string()).status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        AppError::Conflict("dup".to_string()).status_code(),
        StatusCode::CONFLICT
    );
    assert_eq!(
        AppError::Timeout("find user".to_string()).status_code(),
        StatusCode::REQUEST_TIMEOUT
    );
    assert_eq!(
        AppError::Database(sqlx::Error::RowNotFound).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        AppError::Config("bad".to_string()).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_error_code_consistency() {
    let errors = vec![
        AppError::unauthorized("x"),
        AppError::Forbidden,
        AppError::not_found("x"),
        AppError::BadRequest("x".to_string()),
        AppError::validation("x"),
        AppError::Conflict("x".to_string()),
        AppError::Timeout("x".to_string()),
        AppError::internal_error("x"),
    ];

    for error in errors {
        assert_eq!(error.code(), error.status_code().as_u16());
    }
}

// ==================== 用户消息测试 ====================

#[test]
fn test_client_errors_carry_their_message() {
    assert_eq!(
        AppError::unauthorized("Invalid email or password").user_message(),
        "Invalid email or password"
    );
    assert_eq!(
        AppError::not_found("User not found").user_message(),
        "User not found"
    );
    assert_eq!(
        AppError::BadRequest("Token has expired".to_string()).user_message(),
        "Token has expired"
    );
    assert_eq!(AppError::Forbidden.user_message(), "Access denied");
}

#[test]
fn test_server_errors_hide_details() {
    let message = AppError::Database(sqlx::Error::RowNotFound).user_message();
    assert_eq!(message, "Database error occurred");
    assert!(!message.to_lowercase().contains("row"));

    let message = AppError::Config("Missing signing secret".to_string()).user_message();
    assert_eq!(message, "Configuration error");

    let message = AppError::internal_error("Failed to exchange token").user_message();
    assert_eq!(message, "Internal server error");

    let message = AppError::Timeout("find user timed out after 100s".to_string()).user_message();
    assert_eq!(message, "Request timed out");
}

#[test]
fn test_unicode_error_message() {
    let error = AppError::BadRequest("错误信息 🚨".to_string());
    assert_eq!(error.user_message(), "错误信息 🚨");
}

// ==================== 错误显示测试 ====================

#[test]
fn test_error_display() {
    assert_eq!(format!("{}", AppError::Forbidden), "Access denied");
    assert_eq!(
        format!("{}", AppError::not_found("User not found")),
        "Resource not found: User not found"
    );
    assert_eq!(
        format!("{}", AppError::BadRequest("invalid state".to_string())),
        "Invalid request: invalid state"
    );
}

// ==================== From 转换测试 ====================

#[test]
fn test_from_sqlx_error() {
    let app_error = AppError::from(sqlx::Error::RowNotFound);
    assert!(matches!(app_error, AppError::Database(_)));
}

#[test]
fn test_from_config_error() {
    let app_error = AppError::from(config::ConfigError::Message("missing".to_string()));
    assert!(matches!(app_error, AppError::Config(_)));
}

#[test]
fn test_from_token_error() {
    for err in [
        TokenError::Expired,
        TokenError::InvalidSignature,
        TokenError::Malformed("bad".to_string()),
    ] {
        let app_error = AppError::from(err);
        assert!(matches!(app_error, AppError::Unauthorized(ref m) if m == "Invalid or expired token"));
    }

    let app_error = AppError::from(TokenError::Signing("no key".to_string()));
    assert!(matches!(app_error, AppError::Internal(_)));
}

#[test]
fn test_error_with_question_mark_operator() {
    fn verify() -> Result<(), TokenError> {
        Err(TokenError::Expired)
    }

    fn handler() -> movie_stream::error::Result<()> {
        verify()?;
        Ok(())
    }

    assert_eq!(handler().unwrap_err().code(), 401);
}

// ==================== 错误序列化测试 ====================

#[test]
fn test_error_response_serialization() {
    let error_response = ErrorResponse {
        error: ErrorDetail {
            code: 404,
            message: "User not found".to_string(),
            request_id: "req-123".to_string(),
        },
    };

    let json_obj = serde_json::to_value(&error_response).unwrap();

    assert_eq!(json_obj["error"]["code"], 404);
    assert_eq!(json_obj["error"]["message"], "User not found");
    assert_eq!(json_obj["error"]["request_id"], "req-123");
}

#[tokio::test]
async fn test_into_response() {
    let response = AppError::Conflict("User already exists".to_string()).into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"]["code"], 409);
    assert_eq!(json["error"]["message"], "User already exists");
    assert!(json["error"]["request_id"].is_string());
}
