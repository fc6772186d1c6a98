//! PKCE (Proof Key for Code Exchange) 服务端验证
//!
//! RFC 7636 将授权请求与 token 交换绑定：客户端在授权时提交
//! `code_challenge`，在 token 交换时提交原始 `code_verifier`，
//! 服务端验证 `transform(code_verifier) == stored_challenge`。
//!
//! 方法字符串按 RFC 注册名**区分大小写**匹配：`plain` 与 `S256`，
//! 其余一律拒绝。比较为常量时间。
//!
//! ## 示例
//!
//! ```rust
//! use identrs::oauth::pkce::{PkceCodeChallenge, PkceMethod};
//!
//! // RFC 7636 附录 B 的测试向量
//! let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
//! let challenge = PkceCodeChallenge::new(
//!     "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM",
//!     PkceMethod::S256,
//! );
//! assert!(challenge.verify(verifier));
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ConfigError, Error, Result};
use crate::random::constant_time_compare_str;

/// PKCE challenge 方法
///
/// RFC 7636 定义了两种方法：
/// - `plain`: code_challenge = code_verifier
/// - `S256`: code_challenge = BASE64URL(SHA256(code_verifier))（推荐）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PkceMethod {
    /// plain 方法：challenge = verifier
    #[serde(rename = "plain")]
    Plain,

    /// S256 方法：challenge = BASE64URL(SHA256(verifier))
    #[serde(rename = "S256")]
    S256,
}

impl PkceMethod {
    /// 转换为 RFC 注册的参数字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            PkceMethod::Plain => "plain",
            PkceMethod::S256 => "S256",
        }
    }
}

impl std::str::FromStr for PkceMethod {
    type Err = Error;

    /// 解析方法字符串，区分大小写（`s256` 不被接受）
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" => Ok(PkceMethod::Plain),
            "S256" => Ok(PkceMethod::S256),
            _ => Err(Error::Config(ConfigError::InvalidValue {
                key: "code_challenge_method".to_string(),
                message: format!("unsupported PKCE method: {}", s),
            })),
        }
    }
}

impl std::fmt::Display for PkceMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for PkceMethod {
    fn default() -> Self {
        PkceMethod::S256
    }
}

/// 校验 code_verifier 是否符合 RFC 7636 的约束
///
/// 长度 43-128 字符，字符集为 unreserved：
/// `[A-Z] / [a-z] / [0-9] / "-" / "." / "_" / "~"`
pub fn validate_verifier(verifier: &str) -> Result<()> {
    if verifier.len() < 43 || verifier.len() > 128 {
        return Err(Error::Config(ConfigError::InvalidValue {
            key: "code_verifier".to_string(),
            message: format!(
                "verifier length must be 43-128 characters, got {}",
                verifier.len()
            ),
        }));
    }

    if !verifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '~')
    {
        return Err(Error::Config(ConfigError::InvalidValue {
            key: "code_verifier".to_string(),
            message: "verifier contains invalid characters".to_string(),
        }));
    }

    Ok(())
}

/// 计算 code_challenge
pub fn compute_challenge(verifier: &str, method: PkceMethod) -> String {
    match method {
        PkceMethod::Plain => verifier.to_string(),
        PkceMethod::S256 => {
            let hash = Sha256::digest(verifier.as_bytes());
            URL_SAFE_NO_PAD.encode(hash)
        }
    }
}

/// 验证 code_verifier 是否匹配存储的 code_challenge
///
/// 不合法的 verifier（长度、字符集）直接判为不匹配；
/// 比较使用常量时间以防时序攻击。
pub fn verify(verifier: &str, challenge: &str, method: PkceMethod) -> bool {
    if validate_verifier(verifier).is_err() {
        return false;
    }
    let computed = compute_challenge(verifier, method);
    constant_time_compare_str(&computed, challenge)
}

/// 与授权码一起存储的 challenge/method 对
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceCodeChallenge {
    /// code_challenge 值
    pub challenge: String,

    /// challenge 方法
    pub method: PkceMethod,
}

impl PkceCodeChallenge {
    /// 创建新的 code challenge
    pub fn new(challenge: impl Into<String>, method: PkceMethod) -> Self {
        Self {
            challenge: challenge.into(),
            method,
        }
    }

    /// 验证客户端提交的 verifier
    pub fn verify(&self, verifier: &str) -> bool {
        verify(verifier, &self.challenge, self.method)
    }
}
