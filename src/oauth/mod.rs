//! OAuth 2.0 授权服务器核心模块
//!
//! 提供授权服务器状态机的全部组成部分：
//!
//! - **客户端** (`client`): 客户端实体、存储契约与客户端认证
//! - **用户** (`user`): 用户实体、存储契约与用户认证
//! - **PKCE** (`pkce`): RFC 7636 服务端验证
//! - **授权码** (`code`): 一次性授权码记录与原子消费存储
//! - **撤销** (`revocation`): 按 jti 登记的撤销存储
//! - **缓存** (`cache`): 内省结果的读穿缓存契约
//! - **内省** (`introspection`): RFC 7662 请求/响应类型
//! - **协议类型** (`token`): RFC 6749 token 响应与错误
//! - **请求模型** (`request`): token 端点的封闭授权枚举与表单解析
//! - **授权端点** (`authorize`): authorize/approve/deny 模型
//! - **服务门面** (`service`): 编排签发、内省、撤销的入口
//!
//! ## 授权码流程概览
//!
//! 1. 客户端把用户导向授权端点，附带 `code_challenge`
//! 2. `authorize` 校验请求并产出同意页数据
//! 3. 用户批准后 `approve` 签发一次性授权码并重定向回客户端
//! 4. 客户端在 token 端点用授权码 + `code_verifier` 换取 token
//! 5. 授权码的消费是原子的：并发兑换至多一次成功

pub mod authorize;
pub mod cache;
pub mod client;
pub mod code;
pub mod introspection;
pub mod pkce;
pub mod request;
pub mod revocation;
pub mod scope;
pub mod service;
pub mod token;
pub mod user;

// ============================================================================
// 客户端与用户
// ============================================================================

pub use client::{
    Client, ClientAuthenticator, ClientBuilder, ClientStore, GrantType, InMemoryClientStore,
};
pub use user::{InMemoryUserStore, User, UserAuthenticator, UserStore};

// ============================================================================
// PKCE 与授权码
// ============================================================================

pub use code::{
    AuthorizationCode, AuthorizationCodeStore, ConsumeError, InMemoryAuthorizationCodeStore,
};
pub use pkce::{PkceCodeChallenge, PkceMethod};

// ============================================================================
// 撤销与缓存
// ============================================================================

pub use cache::{InMemoryIntrospectionCache, IntrospectionCache, cache_key};
pub use revocation::{InMemoryRevokedTokenStore, RevokedToken, RevokedTokenStore};

// ============================================================================
// 协议类型
// ============================================================================

pub use introspection::{
    IntrospectionRequest, IntrospectionResponse, IntrospectionResponseBuilder, TokenTypeHint,
};
pub use token::{OAuthError, OAuthErrorCode, TokenResponse, TokenType};

// ============================================================================
// 请求模型与服务门面
// ============================================================================

pub use authorize::{ApproveRequest, AuthorizeRequest, ConsentData};
pub use request::{GrantRequest, TokenRequest};
pub use service::OAuth2Service;
