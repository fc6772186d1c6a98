//! Token 端点请求模型
//!
//! [`GrantRequest`] 是四种授权的封闭枚举：新增授权类型必须扩展枚举，
//! 编译器随即强制每个分发点穷尽处理。没有可注册的处理器表。
//!
//! [`TokenRequest::from_form`] 是 HTTP 层与核心之间的边界：HTTP 层
//! 解析 `application/x-www-form-urlencoded` 请求体后把键值对交给它，
//! 它负责必填项与 `grant_type` 的 RFC 错误映射。

use std::collections::HashMap;

use uuid::Uuid;

use crate::oauth::client::GrantType;
use crate::oauth::token::OAuthError;

/// 各授权类型的专有参数
#[derive(Debug, Clone)]
pub enum GrantRequest {
    /// 资源所有者密码凭证授权
    Password {
        /// 用户名
        username: String,
        /// 明文密码
        password: String,
        /// 请求的权限范围（空格分隔）
        scope: Option<String>,
    },

    /// 授权码授权（PKCE 必需）
    AuthorizationCode {
        /// 授权码
        code: String,
        /// 必须与授权时逐字节一致的重定向 URI
        redirect_uri: String,
        /// PKCE code_verifier
        code_verifier: String,
    },

    /// 刷新令牌授权
    RefreshToken {
        /// 刷新令牌
        refresh_token: String,
        /// 请求的权限范围（不得超出原 token）
        scope: Option<String>,
    },

    /// 客户端凭证授权
    ClientCredentials {
        /// 请求的权限范围
        scope: Option<String>,
    },
}

impl GrantRequest {
    /// 该请求对应的授权类型
    pub fn grant_type(&self) -> GrantType {
        match self {
            GrantRequest::Password { .. } => GrantType::Password,
            GrantRequest::AuthorizationCode { .. } => GrantType::AuthorizationCode,
            GrantRequest::RefreshToken { .. } => GrantType::RefreshToken,
            GrantRequest::ClientCredentials { .. } => GrantType::ClientCredentials,
        }
    }
}

/// Token 端点的完整请求
#[derive(Debug, Clone)]
pub struct TokenRequest {
    /// 客户端 ID
    pub client_id: Uuid,

    /// 客户端密钥明文
    pub client_secret: String,

    /// 授权专有参数
    pub grant: GrantRequest,
}

impl TokenRequest {
    /// 创建新的 token 请求
    pub fn new(client_id: Uuid, client_secret: impl Into<String>, grant: GrantRequest) -> Self {
        Self {
            client_id,
            client_secret: client_secret.into(),
            grant,
        }
    }

    /// 从已解析的表单键值对构建请求
    ///
    /// 错误映射：缺失参数 → `invalid_request`；未知 `grant_type` →
    /// `unsupported_grant_type`；`client_id` 非 UUID → `invalid_client`。
    pub fn from_form(
        form: &HashMap<String, String>,
    ) -> std::result::Result<Self, OAuthError> {
        let grant_type = require(form, "grant_type")?;
        let client_id = require(form, "client_id")?;
        let client_secret = require(form, "client_secret")?.to_string();

        let client_id = client_id
            .parse::<Uuid>()
            .map_err(|_| OAuthError::invalid_client())?;

        let grant = match grant_type {
            "password" => GrantRequest::Password {
                username: require(form, "username")?.to_string(),
                password: require(form, "password")?.to_string(),
                scope: optional(form, "scope"),
            },
            "authorization_code" => GrantRequest::AuthorizationCode {
                code: require(form, "code")?.to_string(),
                redirect_uri: require(form, "redirect_uri")?.to_string(),
                code_verifier: require(form, "code_verifier")?.to_string(),
            },
            "refresh_token" => GrantRequest::RefreshToken {
                refresh_token: require(form, "refresh_token")?.to_string(),
                scope: optional(form, "scope"),
            },
            "client_credentials" => GrantRequest::ClientCredentials {
                scope: optional(form, "scope"),
            },
            _ => return Err(OAuthError::unsupported_grant_type()),
        };

        Ok(Self {
            client_id,
            client_secret,
            grant,
        })
    }
}

/// 取必填参数；缺失或为空 → `invalid_request`
fn require<'a>(
    form: &'a HashMap<String, String>,
    key: &str,
) -> std::result::Result<&'a str, OAuthError> {
    match form.get(key).map(String::as_str) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(OAuthError::invalid_request(format!(
            "missing parameter: {}",
            key
        ))),
    }
}

/// 取可选参数；空白值视作未提供
fn optional(form: &HashMap<String, String>, key: &str) -> Option<String> {
    form.get(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::token::OAuthErrorCode;

    fn base_form(grant_type: &str) -> HashMap<String, String> {
        let mut form = HashMap::new();
        form.insert("grant_type".to_string(), grant_type.to_string());
        form.insert("client_id".to_string(), Uuid::new_v4().to_string());
        form.insert("client_secret".to_string(), "secret".to_string());
        form
    }

    #[test]
    fn test_parse_password_grant() {
        let mut form = base_form("password");
        form.insert("username".to_string(), "alice".to_string());
        form.insert("password".to_string(), "p@ss".to_string());
        form.insert("scope".to_string(), "read".to_string());

        let request = TokenRequest::from_form(&form).unwrap();
        assert_eq!(request.grant.grant_type(), GrantType::Password);
        match request.grant {
            GrantRequest::Password {
                username,
                password,
                scope,
            } => {
                assert_eq!(username, "alice");
                assert_eq!(password, "p@ss");
                assert_eq!(scope.as_deref(), Some("read"));
            }
            _ => panic!("wrong grant variant"),
        }
    }

    #[test]
    fn test_parse_authorization_code_grant_requires_pkce() {
        let mut form = base_form("authorization_code");
        form.insert("code".to_string(), "abc".to_string());
        form.insert(
            "redirect_uri".to_string(),
            "https://app.example.com/cb".to_string(),
        );

        // 缺 code_verifier
        let err = TokenRequest::from_form(&form).unwrap_err();
        assert_eq!(err.error, OAuthErrorCode::InvalidRequest);

        form.insert("code_verifier".to_string(), "v".repeat(43));
        assert!(TokenRequest::from_form(&form).is_ok());
    }

    #[test]
    fn test_parse_refresh_grant() {
        let mut form = base_form("refresh_token");
        form.insert("refresh_token".to_string(), "some.jwt".to_string());

        let request = TokenRequest::from_form(&form).unwrap();
        assert_eq!(request.grant.grant_type(), GrantType::RefreshToken);
    }

    #[test]
    fn test_parse_client_credentials_grant() {
        let form = base_form("client_credentials");
        let request = TokenRequest::from_form(&form).unwrap();
        assert_eq!(request.grant.grant_type(), GrantType::ClientCredentials);
    }

    #[test]
    fn test_unknown_grant_type() {
        let form = base_form("device_code");
        let err = TokenRequest::from_form(&form).unwrap_err();
        assert_eq!(err.error, OAuthErrorCode::UnsupportedGrantType);
    }

    #[test]
    fn test_missing_grant_type() {
        let mut form = base_form("password");
        form.remove("grant_type");
        let err = TokenRequest::from_form(&form).unwrap_err();
        assert_eq!(err.error, OAuthErrorCode::InvalidRequest);
    }

    #[test]
    fn test_malformed_client_id() {
        let mut form = base_form("client_credentials");
        form.insert("client_id".to_string(), "not-a-uuid".to_string());
        let err = TokenRequest::from_form(&form).unwrap_err();
        assert_eq!(err.error, OAuthErrorCode::InvalidClient);
    }

    #[test]
    fn test_blank_scope_is_absent() {
        let mut form = base_form("client_credentials");
        form.insert("scope".to_string(), "   ".to_string());

        let request = TokenRequest::from_form(&form).unwrap();
        match request.grant {
            GrantRequest::ClientCredentials { scope } => assert!(scope.is_none()),
            _ => panic!("wrong grant variant"),
        }
    }
}
