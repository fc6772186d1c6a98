//! OAuth 2.0 协议响应与错误类型
//!
//! 提供 RFC 6749 定义的 token 响应结构和错误响应。
//! 内部错误（存储、加密等）在服务边界统一映射为协议错误，
//! 具体原因只进日志，绝不写入 `error_description`。

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Error;

/// OAuth Token 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Bearer Token
    #[default]
    Bearer,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Bearer => write!(f, "Bearer"),
        }
    }
}

/// OAuth 2.0 Token 响应
///
/// 符合 RFC 6749 Section 5.1 的 token 响应结构。
/// HTTP 层序列化本结构时必须设置 `Cache-Control: no-store` 和
/// `Pragma: no-cache`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// 访问令牌
    pub access_token: String,

    /// Token 类型（"Bearer"）
    pub token_type: TokenType,

    /// 过期时间（秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    /// 刷新令牌（client_credentials 授权不签发）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// 授权范围（空格分隔）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// 创建新的 Token 响应
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: TokenType::Bearer,
            expires_in: None,
            refresh_token: None,
            scope: None,
        }
    }

    /// 设置过期时间
    pub fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    /// 设置刷新令牌
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// 设置授权范围
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// OAuth 错误代码
///
/// RFC 6749 Section 5.2 加 RFC 7009 的 `unsupported_token_type`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorCode {
    /// 请求缺少必需参数、包含无效参数值或格式错误
    InvalidRequest,
    /// 客户端认证失败（未知、未启用或密钥错误）
    InvalidClient,
    /// 授权许可无效：凭证错误、授权码无效/过期/已用、refresh token 无效、PKCE 失败
    InvalidGrant,
    /// 客户端没有使用该授权类型的权限
    UnauthorizedClient,
    /// 授权服务器不支持此授权类型
    UnsupportedGrantType,
    /// 请求的范围超出允许范围
    InvalidScope,
    /// 用户在授权端点拒绝了请求
    AccessDenied,
    /// 不支持的响应类型
    UnsupportedResponseType,
    /// 撤销端点不支持给定的 token 类型提示 (RFC 7009)
    UnsupportedTokenType,
    /// 授权服务器内部错误
    ServerError,
    /// 授权服务器暂时无法处理请求
    TemporarilyUnavailable,
}

impl OAuthErrorCode {
    /// RFC 注册的错误字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthErrorCode::InvalidRequest => "invalid_request",
            OAuthErrorCode::InvalidClient => "invalid_client",
            OAuthErrorCode::InvalidGrant => "invalid_grant",
            OAuthErrorCode::UnauthorizedClient => "unauthorized_client",
            OAuthErrorCode::UnsupportedGrantType => "unsupported_grant_type",
            OAuthErrorCode::InvalidScope => "invalid_scope",
            OAuthErrorCode::AccessDenied => "access_denied",
            OAuthErrorCode::UnsupportedResponseType => "unsupported_response_type",
            OAuthErrorCode::UnsupportedTokenType => "unsupported_token_type",
            OAuthErrorCode::ServerError => "server_error",
            OAuthErrorCode::TemporarilyUnavailable => "temporarily_unavailable",
        }
    }

    /// token 端点响应该错误时使用的 HTTP 状态码
    ///
    /// `access_denied` 通过授权端点的重定向参数传递（302），
    /// 不会出现在 token 端点的响应体中。
    pub fn http_status(&self) -> u16 {
        match self {
            OAuthErrorCode::InvalidClient => 401,
            OAuthErrorCode::AccessDenied => 302,
            OAuthErrorCode::ServerError => 500,
            OAuthErrorCode::TemporarilyUnavailable => 503,
            _ => 400,
        }
    }
}

impl std::fmt::Display for OAuthErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// OAuth 错误响应
///
/// 符合 RFC 6749 Section 5.2 的错误响应。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthError {
    /// 错误代码
    pub error: OAuthErrorCode,

    /// 错误描述
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    /// 错误信息 URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl OAuthError {
    /// 创建新的 OAuth 错误
    pub fn new(error: OAuthErrorCode) -> Self {
        Self {
            error,
            error_description: None,
            error_uri: None,
        }
    }

    /// 设置错误描述
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }

    /// 设置错误 URI
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.error_uri = Some(uri.into());
        self
    }

    /// 创建无效请求错误
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidRequest).with_description(description)
    }

    /// 创建无效客户端错误
    pub fn invalid_client() -> Self {
        Self::new(OAuthErrorCode::InvalidClient)
            .with_description("client authentication failed")
    }

    /// 创建无效授权错误
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::InvalidGrant).with_description(description)
    }

    /// 创建客户端未被授权错误
    pub fn unauthorized_client() -> Self {
        Self::new(OAuthErrorCode::UnauthorizedClient)
            .with_description("the client is not authorized to use this grant type")
    }

    /// 创建无效范围错误
    pub fn invalid_scope() -> Self {
        Self::new(OAuthErrorCode::InvalidScope)
            .with_description("the requested scope exceeds the granted scope")
    }

    /// 创建不支持的授权类型错误
    pub fn unsupported_grant_type() -> Self {
        Self::new(OAuthErrorCode::UnsupportedGrantType)
            .with_description("the authorization grant type is not supported")
    }

    /// 创建访问被拒绝错误
    pub fn access_denied(description: impl Into<String>) -> Self {
        Self::new(OAuthErrorCode::AccessDenied).with_description(description)
    }

    /// 创建服务器内部错误
    pub fn server_error() -> Self {
        Self::new(OAuthErrorCode::ServerError)
    }

    /// 创建暂时不可用错误
    pub fn temporarily_unavailable() -> Self {
        Self::new(OAuthErrorCode::TemporarilyUnavailable)
    }
}

impl std::fmt::Display for OAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(desc) = &self.error_description {
            write!(f, ": {}", desc)?;
        }
        Ok(())
    }
}

impl std::error::Error for OAuthError {}

impl From<Error> for OAuthError {
    /// 将内部错误映射到协议边界
    ///
    /// 截止时间超时映射为 `temporarily_unavailable`，其余一律
    /// `server_error`。底层原因在此记录日志，不进响应体。
    fn from(err: Error) -> Self {
        if err.is_deadline_exceeded() {
            warn!("request deadline exceeded: {}", err);
            Self::temporarily_unavailable()
        } else {
            warn!("internal error surfaced as server_error: {}", err);
            Self::server_error()
        }
    }
}
