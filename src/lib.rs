//! # identrs
//!
//! OAuth 2.0 授权服务器核心。
//!
//! ## 功能特性
//!
//! - **四种授权模式**: password、authorization_code（含 PKCE）、
//!   refresh_token（强制轮换）、client_credentials
//! - **RS256 JWT**: 非对称签名签发与验证，JWK 公钥发布
//! - **PKCE**: RFC 7636 服务端验证（plain / S256，方法区分大小写）
//! - **Token 内省**: RFC 7662，带读穿缓存与撤销即时可见
//! - **Token 撤销**: RFC 7009，按 jti 登记，静默处理未知 token
//! - **密码哈希**: bcrypt（cost ≥ 12），用户密码与客户端密钥共用
//! - **存储契约**: 用户、客户端、授权码、撤销记录与缓存全部抽象为
//!   async trait，内置内存实现供测试与组装参考
//! - **截止时间传播**: 所有存储与缓存调用接受调用方的 Deadline
//!
//! HTTP 框架、持久化与配置加载属于嵌入方的组装根，不在本库范围内。
//!
//! ## PKCE 验证示例
//!
//! ```rust
//! use identrs::oauth::pkce::{self, PkceMethod};
//!
//! // RFC 7636 附录 B 的测试向量
//! let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
//! let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
//! assert!(pkce::verify(verifier, challenge, PkceMethod::S256));
//! ```
//!
//! ## Token 请求解析示例
//!
//! ```rust
//! use std::collections::HashMap;
//! use identrs::oauth::{GrantType, TokenRequest};
//!
//! let mut form = HashMap::new();
//! form.insert("grant_type".to_string(), "client_credentials".to_string());
//! form.insert("client_id".to_string(), uuid::Uuid::new_v4().to_string());
//! form.insert("client_secret".to_string(), "secret".to_string());
//!
//! let request = TokenRequest::from_form(&form).unwrap();
//! assert_eq!(request.grant.grant_type(), GrantType::ClientCredentials);
//! ```
//!
//! ## 服务组装示例
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use identrs::{
//!     AuthServerConfig, Deadline, OAuth2Service,
//!     oauth::{
//!         InMemoryAuthorizationCodeStore, InMemoryClientStore,
//!         InMemoryIntrospectionCache, InMemoryRevokedTokenStore, InMemoryUserStore,
//!     },
//! };
//!
//! let config = AuthServerConfig::new(
//!     "https://auth.example.com",
//!     private_key_pem,
//!     public_key_pem,
//!     "key-1",
//! );
//!
//! let service = OAuth2Service::new(
//!     config,
//!     Arc::new(InMemoryUserStore::new()),
//!     Arc::new(InMemoryClientStore::new()),
//!     Arc::new(InMemoryAuthorizationCodeStore::new()),
//!     Arc::new(InMemoryRevokedTokenStore::new()),
//!     Arc::new(InMemoryIntrospectionCache::new()),
//! )?;
//!
//! let response = service.issue(token_request, Deadline::none()).await?;
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod oauth;
pub mod password;
pub mod random;
pub mod token;

pub use error::{Error, Result};

// ============================================================================
// 配置与上下文导出
// ============================================================================

pub use config::AuthServerConfig;
pub use context::Deadline;

// ============================================================================
// 密码哈希导出
// ============================================================================

pub use password::{PasswordHasher, hash_password, verify_password};

// ============================================================================
// Token 签名导出
// ============================================================================

pub use token::{Jwk, JwkSet, TokenClaims, TokenKind, TokenSigner};

// ============================================================================
// OAuth 2.0 核心导出
// ============================================================================

pub use oauth::{
    // 请求模型与门面
    ApproveRequest,
    // 授权码
    AuthorizationCode,
    AuthorizationCodeStore,
    AuthorizeRequest,
    // 客户端与用户
    Client,
    ClientAuthenticator,
    ClientBuilder,
    ClientStore,
    ConsentData,
    ConsumeError,
    GrantRequest,
    GrantType,
    InMemoryAuthorizationCodeStore,
    InMemoryClientStore,
    InMemoryIntrospectionCache,
    InMemoryRevokedTokenStore,
    InMemoryUserStore,
    // 内省与撤销
    IntrospectionCache,
    IntrospectionRequest,
    IntrospectionResponse,
    IntrospectionResponseBuilder,
    OAuth2Service,
    // 协议类型
    OAuthError,
    OAuthErrorCode,
    // PKCE
    PkceCodeChallenge,
    PkceMethod,
    RevokedToken,
    RevokedTokenStore,
    TokenRequest,
    TokenResponse,
    TokenType,
    TokenTypeHint,
    User,
    UserAuthenticator,
    UserStore,
};

// ============================================================================
// 测试辅助
// ============================================================================
