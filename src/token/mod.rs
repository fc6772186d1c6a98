//! Token 签发模块
//!
//! 提供 JWT 的签名、验证与 JWK 公钥发布：
//!
//! - **签名器** (`signer`): 使用 RS256 非对称签名签发与验证 JWT
//! - **JWK** (`jwk`): 从配置的 RSA 公钥构建 JWK 文档，供
//!   `/.well-known/jwks.json` 发布
//!
//! 验证是纯计算，不做任何 I/O；私钥在构造后只读。

pub mod jwk;
pub mod signer;

pub use jwk::{Jwk, JwkSet};
pub use signer::{TokenClaims, TokenKind, TokenSigner};
