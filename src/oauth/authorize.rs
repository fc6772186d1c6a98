//! 授权端点（authorize / approve / deny）的请求模型与重定向构造
//!
//! `authorize` 校验授权请求并产出同意页所需的数据；`approve` 签发
//! 授权码并构造 `redirect_uri?code=...&state=...`；`deny` 构造
//! `redirect_uri?error=access_denied&state=...`。`state` 原样回传。
//!
//! 注意：核心信任 `approve` 携带的 `user_id`（但会校验该用户存在且
//! 启用）。把它绑定到已认证的最终用户会话是嵌入方的职责。

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result, ValidationError};
use crate::oauth::pkce::PkceMethod;

/// 授权端点请求 (GET /oauth2/authorize)
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    /// 响应类型；本核心只支持 "code"
    pub response_type: String,

    /// 客户端 ID
    pub client_id: Uuid,

    /// 重定向 URI（必须与注册值逐字节一致）
    pub redirect_uri: String,

    /// 请求的权限范围（空格分隔）
    pub scope: Option<String>,

    /// 客户端状态值，原样回传
    pub state: Option<String>,

    /// PKCE code_challenge（必需）
    pub code_challenge: String,

    /// PKCE challenge 方法；必须与 challenge 一同提供（"plain" 或 "S256"）
    pub code_challenge_method: Option<String>,
}

/// 同意页数据
///
/// `authorize` 校验通过后返回，嵌入方据此渲染同意界面，
/// 并在用户批准后将字段原样提交给 `approve`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentData {
    /// 客户端 ID
    pub client_id: Uuid,

    /// 客户端名称（展示用）
    pub client_name: String,

    /// 重定向 URI
    pub redirect_uri: String,

    /// 将被授予的权限范围
    pub scopes: Vec<String>,

    /// 客户端状态值
    pub state: Option<String>,

    /// PKCE code_challenge
    pub code_challenge: String,

    /// PKCE challenge 方法
    pub code_challenge_method: PkceMethod,
}

/// 批准请求 (POST /oauth2/authorize/approve)
#[derive(Debug, Clone)]
pub struct ApproveRequest {
    /// 客户端 ID
    pub client_id: Uuid,

    /// 批准授权的用户 ID
    pub user_id: Uuid,

    /// 重定向 URI
    pub redirect_uri: String,

    /// 授予的权限范围（空格分隔）
    pub scope: String,

    /// 客户端状态值
    pub state: Option<String>,

    /// PKCE code_challenge
    pub code_challenge: String,

    /// PKCE challenge 方法；必须与 challenge 一同提供
    pub code_challenge_method: Option<String>,
}

/// 构造批准后的重定向 URL：`redirect_uri?code=...&state=...`
pub(crate) fn build_success_redirect(
    redirect_uri: &str,
    code: &str,
    state: Option<&str>,
) -> Result<String> {
    let mut url = parse_redirect(redirect_uri)?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("code", code);
        if let Some(state) = state {
            pairs.append_pair("state", state);
        }
    }
    Ok(url.to_string())
}

/// 构造拒绝后的重定向 URL：`redirect_uri?error=access_denied&state=...`
pub(crate) fn build_denied_redirect(redirect_uri: &str, state: Option<&str>) -> Result<String> {
    let mut url = parse_redirect(redirect_uri)?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("error", "access_denied");
        if let Some(state) = state {
            pairs.append_pair("state", state);
        }
    }
    Ok(url.to_string())
}

fn parse_redirect(redirect_uri: &str) -> Result<Url> {
    Url::parse(redirect_uri).map_err(|e| {
        Error::Validation(ValidationError::InvalidRedirectUri(format!(
            "{}: {}",
            redirect_uri, e
        )))
    })
}
