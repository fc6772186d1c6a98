//! JWK (JSON Web Key) 文档构建
//!
//! 从配置的 RSA 公钥 PEM 提取模数与指数，构建 RFC 7517 格式的
//! JWK 集合。签名端发布该文档，资源服务器据此验证 RS256 签名。

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rsa::RsaPublicKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, Error, Result};

/// 单个 RSA 签名公钥的 JWK 表示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// 密钥类型，固定为 "RSA"
    pub kty: String,

    /// 用途，固定为 "sig"
    #[serde(rename = "use")]
    pub use_: String,

    /// 算法，固定为 "RS256"
    pub alg: String,

    /// 稳定的密钥标识符，与 JWT 头部的 `kid` 一致
    pub kid: String,

    /// RSA 模数（big-endian 字节的 base64url 无填充编码）
    pub n: String,

    /// RSA 公共指数（同上编码）
    pub e: String,
}

impl Jwk {
    /// 从 PEM 格式的 RSA 公钥构建 JWK
    ///
    /// 同时接受 PKCS#8 (`BEGIN PUBLIC KEY`) 和 PKCS#1
    /// (`BEGIN RSA PUBLIC KEY`) 两种封装。
    ///
    /// # Arguments
    ///
    /// * `pem` - PEM 编码的 RSA 公钥
    /// * `kid` - 密钥标识符
    pub fn from_rsa_public_key_pem(pem: &str, kid: impl Into<String>) -> Result<Self> {
        let key = match RsaPublicKey::from_public_key_pem(pem) {
            Ok(key) => key,
            Err(_) => RsaPublicKey::from_pkcs1_pem(pem).map_err(|e| {
                Error::Crypto(CryptoError::InvalidKey(format!(
                    "invalid RSA public key: {}",
                    e
                )))
            })?,
        };

        Ok(Self {
            kty: "RSA".to_string(),
            use_: "sig".to_string(),
            alg: "RS256".to_string(),
            kid: kid.into(),
            n: URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
        })
    }
}

/// JWK 集合，即 `/.well-known/jwks.json` 的响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// 公钥列表
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// 由单个 JWK 构建集合
    pub fn single(jwk: Jwk) -> Self {
        Self { keys: vec![jwk] }
    }

    /// 按 `kid` 查找密钥
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}
