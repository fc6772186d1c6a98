//! JWT 签名器实现
//!
//! 使用 RS256 签发和验证本服务器的 access / refresh token。
//! 验证强制检查签名、`exp`（允许配置的时钟偏差）与 `iss`；
//! `aud` 的校验由需要绑定受众的调用方通过 [`TokenSigner::verify_for_audience`]
//! 完成。撤销路径使用 [`TokenSigner::verify_ignoring_expiry`]，
//! 以便已过期但签名有效的 token 仍可被登记撤销。

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthServerConfig;
use crate::error::{Error, Result, TokenError};
use crate::token::jwk::{Jwk, JwkSet};

/// Token 种类，写入 `token_type` claim
///
/// Refresh token 只被 refresh_token 授权接受；两类 token 由同一把
/// 密钥签名，靠该 claim 区分。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// 访问令牌（短有效期）
    Access,
    /// 刷新令牌（长有效期）
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// 本服务器签发的 JWT 的 claim 集合
///
/// `sub` 在用户绑定的授权中为用户 ID，在 client_credentials 授权中为
/// 客户端 ID；`aud` 始终为客户端 ID。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// 签发者 URL
    pub iss: String,

    /// 主题（用户 ID 或客户端 ID）
    pub sub: String,

    /// 受众（客户端 ID）
    pub aud: String,

    /// 过期时间（Unix 时间戳）
    pub exp: i64,

    /// 签发时间（Unix 时间戳）
    pub iat: i64,

    /// 全局唯一的 JWT ID
    pub jti: String,

    /// 授权范围（空格分隔）
    pub scope: String,

    /// Token 种类
    pub token_type: TokenKind,

    /// 客户端 ID
    pub client_id: String,
}

impl TokenClaims {
    /// 构建一组新的 claims
    ///
    /// `jti` 自动生成（UUID v4），`iat` 取当前时间。
    ///
    /// # Arguments
    ///
    /// * `kind` - access 或 refresh
    /// * `sub` - 主题
    /// * `client_id` - 客户端 ID（同时作为 `aud`）
    /// * `scope` - 空格分隔的授权范围
    /// * `issuer` - 签发者
    /// * `ttl_seconds` - 有效期（秒）
    pub fn new(
        kind: TokenKind,
        sub: impl Into<String>,
        client_id: impl Into<String>,
        scope: impl Into<String>,
        issuer: impl Into<String>,
        ttl_seconds: i64,
    ) -> Self {
        let now = Utc::now().timestamp();
        let client_id = client_id.into();
        Self {
            iss: issuer.into(),
            sub: sub.into(),
            aud: client_id.clone(),
            exp: now + ttl_seconds,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            scope: scope.into(),
            token_type: kind,
            client_id,
        }
    }

    /// 剩余有效期（秒），已过期时可能为负
    pub fn remaining_lifetime(&self) -> i64 {
        self.exp - Utc::now().timestamp()
    }

    /// 是否已过期
    pub fn is_expired(&self) -> bool {
        self.remaining_lifetime() <= 0
    }
}

/// RS256 JWT 签名器
///
/// 私钥在构造时解析完成，之后只读；验证不做任何 I/O。
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    kid: String,
    issuer: String,
    leeway: u64,
    jwk_set: JwkSet,
}

impl TokenSigner {
    /// 从 PEM 密钥对创建签名器
    ///
    /// # Arguments
    ///
    /// * `private_key_pem` - RSA 私钥（PKCS#1 或 PKCS#8 PEM）
    /// * `public_key_pem` - RSA 公钥 PEM
    /// * `kid` - 稳定的密钥标识符
    /// * `issuer` - 签发者 URL
    /// * `clock_skew_seconds` - 验证 `exp` 时允许的时钟偏差
    pub fn from_pem(
        private_key_pem: &[u8],
        public_key_pem: &[u8],
        kid: impl Into<String>,
        issuer: impl Into<String>,
        clock_skew_seconds: u64,
    ) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem).map_err(|e| {
            Error::Token(TokenError::EncodingFailed(format!(
                "invalid RSA private key: {}",
                e
            )))
        })?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem).map_err(|e| {
            Error::Token(TokenError::DecodingFailed(format!(
                "invalid RSA public key: {}",
                e
            )))
        })?;

        let kid = kid.into();
        let public_pem = std::str::from_utf8(public_key_pem).map_err(|_| {
            Error::Token(TokenError::DecodingFailed(
                "public key PEM is not valid UTF-8".to_string(),
            ))
        })?;
        let jwk_set = JwkSet::single(Jwk::from_rsa_public_key_pem(public_pem, kid.clone())?);

        Ok(Self {
            encoding_key,
            decoding_key,
            kid,
            issuer: issuer.into(),
            leeway: clock_skew_seconds,
            jwk_set,
        })
    }

    /// 从服务器配置创建签名器
    pub fn from_config(config: &AuthServerConfig) -> Result<Self> {
        Self::from_pem(
            config.jwt_private_key.as_bytes(),
            config.jwt_public_key.as_bytes(),
            config.jwt_kid.clone(),
            config.issuer.clone(),
            config.clock_skew_seconds,
        )
    }

    /// 签发者
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// 密钥标识符
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// 发布的 JWK 集合
    pub fn jwks(&self) -> &JwkSet {
        &self.jwk_set
    }

    /// 签名一组 claims，返回紧凑序列化的 JWT
    ///
    /// 拒绝缺少必需 claim（`sub`、`aud`）或 `exp` 不晚于 `iat` 的请求。
    pub fn sign(&self, claims: &TokenClaims) -> Result<String> {
        if claims.sub.is_empty() {
            return Err(Error::Token(TokenError::MissingClaim("sub".to_string())));
        }
        if claims.aud.is_empty() {
            return Err(Error::Token(TokenError::MissingClaim("aud".to_string())));
        }
        if claims.exp <= claims.iat {
            return Err(Error::Token(TokenError::InvalidClaim(
                "exp must be later than iat".to_string(),
            )));
        }

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());

        encode(&header, claims, &self.encoding_key).map_err(|e| {
            Error::Token(TokenError::EncodingFailed(format!(
                "failed to encode JWT: {}",
                e
            )))
        })
    }

    /// 验证并解码 JWT
    ///
    /// 检查签名、`exp`（允许配置的时钟偏差）与 `iss`。
    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        self.decode_with(token, self.build_validation(None, true))
    }

    /// 验证并解码 JWT，同时要求 `aud` 等于给定值
    pub fn verify_for_audience(&self, token: &str, audience: &str) -> Result<TokenClaims> {
        self.decode_with(token, self.build_validation(Some(audience), true))
    }

    /// 验证签名与 `iss` 但不强制 `exp`
    ///
    /// RFC 7009 撤销路径使用：已过期的 token 仍需能被登记撤销。
    pub fn verify_ignoring_expiry(&self, token: &str) -> Result<TokenClaims> {
        self.decode_with(token, self.build_validation(None, false))
    }

    fn decode_with(&self, token: &str, validation: Validation) -> Result<TokenClaims> {
        let token_data: TokenData<TokenClaims> = decode(token, &self.decoding_key, &validation)
            .map_err(|e| {
                let error = match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        TokenError::InvalidSignature
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidToken => {
                        TokenError::InvalidFormat("invalid token structure".to_string())
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                        TokenError::InvalidClaim("invalid issuer".to_string())
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                        TokenError::InvalidClaim("invalid audience".to_string())
                    }
                    jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(claim) => {
                        TokenError::MissingClaim(claim.clone())
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => {
                        TokenError::InvalidClaim("invalid algorithm".to_string())
                    }
                    _ => TokenError::DecodingFailed(e.to_string()),
                };
                Error::Token(error)
            })?;

        Ok(token_data.claims)
    }

    fn build_validation(&self, audience: Option<&str>, validate_exp: bool) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = self.leeway;
        validation.validate_exp = validate_exp;
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        validation
    }
}
