//! OAuth2 服务门面
//!
//! 编排四种授权的签发、RFC 7662 内省、RFC 7009 撤销与授权码流程。
//! 协作者全部经构造函数显式注入（存储走 `Arc<dyn Trait>` 契约），
//! 配置与签名密钥在构造后只读；没有任何进程级单例。
//!
//! 错误策略：内部错误在本层一次性映射为协议错误（原因只进日志）；
//! 内省把一切 token 失效原因收敛为 `{active:false}`；撤销对
//! "未知/不属于调用方"的 token 静默返回成功。缓存是可降级依赖，
//! 缓存故障回退到直接验证。

use std::cmp;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AuthServerConfig;
use crate::context::Deadline;
use crate::oauth::authorize::{
    ApproveRequest, AuthorizeRequest, ConsentData, build_denied_redirect, build_success_redirect,
};
use crate::oauth::cache::{IntrospectionCache, cache_key};
use crate::oauth::client::{Client, ClientAuthenticator, ClientStore, GrantType};
use crate::oauth::code::{AuthorizationCode, AuthorizationCodeStore, ConsumeError};
use crate::oauth::introspection::{IntrospectionRequest, IntrospectionResponse, TokenTypeHint};
use crate::oauth::pkce::{PkceCodeChallenge, PkceMethod};
use crate::oauth::request::{GrantRequest, TokenRequest};
use crate::oauth::revocation::{RevokedToken, RevokedTokenStore};
use crate::oauth::scope;
use crate::oauth::token::{OAuthError, OAuthErrorCode, TokenResponse};
use crate::oauth::user::{UserAuthenticator, UserStore};
use crate::password::PasswordHasher;
use crate::token::jwk::JwkSet;
use crate::token::signer::{TokenClaims, TokenKind, TokenSigner};

type OAuthResult<T> = std::result::Result<T, OAuthError>;

/// 一次签发出的 access/refresh 对
struct IssuedPair {
    access_token: String,
    refresh_token: String,
    access_claims: TokenClaims,
    refresh_claims: TokenClaims,
}

/// OAuth2 授权服务器核心
pub struct OAuth2Service {
    config: AuthServerConfig,
    signer: TokenSigner,
    clients: ClientAuthenticator,
    users: UserAuthenticator,
    client_store: Arc<dyn ClientStore>,
    user_store: Arc<dyn UserStore>,
    codes: Arc<dyn AuthorizationCodeStore>,
    revoked: Arc<dyn RevokedTokenStore>,
    cache: Arc<dyn IntrospectionCache>,
}

impl OAuth2Service {
    /// 创建服务
    ///
    /// 校验配置、解析签名密钥、构建客户端/用户认证器。
    pub fn new(
        config: AuthServerConfig,
        user_store: Arc<dyn UserStore>,
        client_store: Arc<dyn ClientStore>,
        code_store: Arc<dyn AuthorizationCodeStore>,
        revoked_store: Arc<dyn RevokedTokenStore>,
        cache: Arc<dyn IntrospectionCache>,
    ) -> crate::error::Result<Self> {
        config.validate()?;
        let signer = TokenSigner::from_config(&config)?;
        let hasher = PasswordHasher::new().with_cost(config.bcrypt_cost);

        let clients = ClientAuthenticator::new(client_store.clone(), hasher);
        let users = UserAuthenticator::new(user_store.clone(), hasher)?;

        Ok(Self {
            config,
            signer,
            clients,
            users,
            client_store,
            user_store,
            codes: code_store,
            revoked: revoked_store,
            cache,
        })
    }

    /// 发布的 JWK 集合（`/.well-known/jwks.json` 的响应体）
    pub fn jwks(&self) -> &JwkSet {
        self.signer.jwks()
    }

    /// 服务器配置
    pub fn config(&self) -> &AuthServerConfig {
        &self.config
    }

    // ========================================================================
    // Token 签发 (POST /oauth2/token)
    // ========================================================================

    /// 处理 token 请求：认证客户端后按授权类型分发
    pub async fn issue(
        &self,
        request: TokenRequest,
        deadline: Deadline,
    ) -> OAuthResult<TokenResponse> {
        let TokenRequest {
            client_id,
            client_secret,
            grant,
        } = request;

        let client = self
            .clients
            .authenticate_for_grant(client_id, &client_secret, grant.grant_type(), deadline)
            .await?;

        match grant {
            GrantRequest::Password {
                username,
                password,
                scope,
            } => {
                self.password_grant(&client, &username, &password, scope.as_deref(), deadline)
                    .await
            }
            GrantRequest::AuthorizationCode {
                code,
                redirect_uri,
                code_verifier,
            } => {
                self.authorization_code_grant(&client, &code, &redirect_uri, &code_verifier, deadline)
                    .await
            }
            GrantRequest::RefreshToken {
                refresh_token,
                scope,
            } => {
                self.refresh_token_grant(&client, &refresh_token, scope.as_deref(), deadline)
                    .await
            }
            GrantRequest::ClientCredentials { scope } => {
                self.client_credentials_grant(&client, scope.as_deref()).await
            }
        }
    }

    /// 密码授权 (RFC 6749 §4.3)
    async fn password_grant(
        &self,
        client: &Client,
        username: &str,
        password: &str,
        requested_scope: Option<&str>,
        deadline: Deadline,
    ) -> OAuthResult<TokenResponse> {
        let user = self.users.authenticate(username, password, deadline).await?;
        let granted = grant_scopes(client, requested_scope)?;

        let pair = self.issue_pair(&user.id.to_string(), client, &granted)?;
        debug!(client_id = %client.id, user_id = %user.id, "password grant issued");

        Ok(self.pair_response(pair, &granted))
    }

    /// 授权码授权 (RFC 6749 §4.1)
    async fn authorization_code_grant(
        &self,
        client: &Client,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
        deadline: Deadline,
    ) -> OAuthResult<TokenResponse> {
        let record = match self.codes.consume(code, deadline).await {
            Ok(record) => record,
            Err(ConsumeError::AlreadyConsumed(prior)) => {
                // 重放：撤销先前由该码签发的全部 token
                self.revoke_replayed_code_tokens(&prior, deadline).await;
                return Err(invalid_code());
            }
            Err(ConsumeError::NotFound) => return Err(invalid_code()),
            Err(ConsumeError::Storage(err)) => return Err(err.into()),
        };

        if record.client_id != client.id {
            return Err(invalid_code());
        }
        if record.redirect_uri != redirect_uri {
            return Err(invalid_code());
        }
        if !record.challenge().verify(code_verifier) {
            return Err(invalid_code());
        }

        let granted = scope::parse(&record.scope);
        let pair = self.issue_pair(&record.user_id.to_string(), client, &granted)?;

        // 为重放加固登记本次签发的 jti；登记失败不阻塞签发
        let jtis = vec![pair.access_claims.jti.clone(), pair.refresh_claims.jti.clone()];
        if let Err(err) = self.codes.attach_issued_tokens(&record.code, &jtis, deadline).await {
            warn!("failed to record issued tokens for authorization code: {}", err);
        }

        debug!(client_id = %client.id, user_id = %record.user_id, "authorization code grant issued");
        Ok(self.pair_response(pair, &granted))
    }

    /// 刷新令牌授权，轮换是强制的 (RFC 6749 §6)
    async fn refresh_token_grant(
        &self,
        client: &Client,
        refresh_token: &str,
        requested_scope: Option<&str>,
        deadline: Deadline,
    ) -> OAuthResult<TokenResponse> {
        // 签名、exp、iss、aud 一并校验；任何失败对外都是 invalid_grant
        let claims = self
            .signer
            .verify_for_audience(refresh_token, &client.id.to_string())
            .map_err(|_| invalid_refresh_token())?;

        if claims.token_type != TokenKind::Refresh {
            return Err(invalid_refresh_token());
        }
        if self.revoked.is_revoked(&claims.jti, deadline).await? {
            return Err(invalid_refresh_token());
        }

        let granted = narrow_refresh_scope(&claims.scope, requested_scope)?;
        let pair = self.issue_pair(&claims.sub, client, &granted)?;

        // 轮换的原子性：先把旧 jti 落入撤销存储，失败则整个请求失败，
        // 旧 token 保持有效
        let old_exp = timestamp_or(claims.exp, self.config.refresh_token_ttl_seconds);
        self.revoked
            .revoke(RevokedToken::new(claims.jti.clone(), old_exp), deadline)
            .await?;

        // 旧 refresh token 的缓存条目同步失效；缓存故障可降级
        if let Err(err) = self.cache.remove(&cache_key(refresh_token), deadline).await {
            warn!("cache invalidation degraded during refresh rotation: {}", err);
        }

        debug!(client_id = %client.id, rotated_jti = %claims.jti, "refresh token rotated");
        Ok(self.pair_response(pair, &granted))
    }

    /// 客户端凭证授权 (RFC 6749 §4.4)；不签发 refresh token
    async fn client_credentials_grant(
        &self,
        client: &Client,
        requested_scope: Option<&str>,
    ) -> OAuthResult<TokenResponse> {
        let granted = grant_scopes(client, requested_scope)?;
        let scope_str = scope::join(&granted);

        let claims = TokenClaims::new(
            TokenKind::Access,
            client.id.to_string(),
            client.id.to_string(),
            scope_str.clone(),
            self.config.issuer.clone(),
            self.config.access_token_ttl_seconds,
        );
        let access_token = self.signer.sign(&claims).map_err(OAuthError::from)?;

        debug!(client_id = %client.id, "client credentials grant issued");
        Ok(TokenResponse::new(access_token)
            .with_expires_in(self.config.access_token_ttl_seconds as u64)
            .with_scope(scope_str))
    }

    // ========================================================================
    // 内省 (POST /oauth2/introspect, RFC 7662)
    // ========================================================================

    /// 内省 token
    ///
    /// 需要客户端认证；token 的受众必须是调用方自己，否则按无效处理。
    /// 缓存命中仍会核对撤销存储，保证撤销后立即可见。
    pub async fn introspect(
        &self,
        client_id: Uuid,
        client_secret: &str,
        request: &IntrospectionRequest,
        deadline: Deadline,
    ) -> OAuthResult<IntrospectionResponse> {
        let client = self
            .clients
            .authenticate(client_id, client_secret, deadline)
            .await?;
        let caller = client.id.to_string();
        let key = cache_key(&request.token);

        match self.cache.get(&key, deadline).await {
            Ok(Some(cached)) => {
                if let Some(jti) = cached.jti.as_deref() {
                    if self.revoked.is_revoked(jti, deadline).await? {
                        if let Err(err) = self.cache.remove(&key, deadline).await {
                            warn!("failed to drop stale introspection cache entry: {}", err);
                        }
                        return Ok(IntrospectionResponse::inactive());
                    }
                }
                if cached.aud.as_deref() != Some(caller.as_str()) {
                    return Ok(IntrospectionResponse::inactive());
                }
                return Ok(cached);
            }
            Ok(None) => {}
            Err(err) => {
                // 缓存不可用：降级为直接验证
                warn!("introspection cache read degraded: {}", err);
            }
        }

        let claims = match self.signer.verify(&request.token) {
            Ok(claims) => claims,
            Err(_) => return Ok(IntrospectionResponse::inactive()),
        };
        if self.revoked.is_revoked(&claims.jti, deadline).await? {
            return Ok(IntrospectionResponse::inactive());
        }

        let response = self.build_active_response(&claims, deadline).await;

        let ttl = cmp::min(
            claims.remaining_lifetime(),
            self.config.introspection_cache_ttl_seconds,
        );
        if ttl > 0 {
            if let Err(err) = self.cache.put(&key, &response, ttl, deadline).await {
                warn!("introspection cache write degraded: {}", err);
            }
        }

        if claims.aud != caller {
            return Ok(IntrospectionResponse::inactive());
        }
        Ok(response)
    }

    async fn build_active_response(
        &self,
        claims: &TokenClaims,
        deadline: Deadline,
    ) -> IntrospectionResponse {
        // username 是尽力而为的补充：查不到（client_credentials 的 sub
        // 是客户端 ID）或存储故障时省略该字段
        let username = match Uuid::parse_str(&claims.sub) {
            Ok(user_id) => match self.user_store.find_by_id(user_id, deadline).await {
                Ok(user) => user.map(|u| u.username),
                Err(err) => {
                    warn!("username lookup degraded during introspection: {}", err);
                    None
                }
            },
            Err(_) => None,
        };

        let mut builder = IntrospectionResponse::active()
            .scope(claims.scope.clone())
            .client_id(claims.client_id.clone())
            .token_type("Bearer")
            .exp(claims.exp)
            .iat(claims.iat)
            .sub(claims.sub.clone())
            .aud(claims.aud.clone())
            .iss(claims.iss.clone())
            .jti(claims.jti.clone());
        if let Some(username) = username {
            builder = builder.username(username);
        }
        builder.build()
    }

    // ========================================================================
    // 撤销 (POST /oauth2/revoke, RFC 7009)
    // ========================================================================

    /// 撤销 token
    ///
    /// 除请求本身格式错误（未知的 token_type_hint）外总是返回成功：
    /// 无效、未知、不属于调用方的 token 一律静默成功，避免泄漏有效性。
    /// 已过期但签名有效的 token 仍会被登记。
    pub async fn revoke(
        &self,
        client_id: Uuid,
        client_secret: &str,
        token: &str,
        token_type_hint: Option<&str>,
        deadline: Deadline,
    ) -> OAuthResult<()> {
        let client = self
            .clients
            .authenticate(client_id, client_secret, deadline)
            .await?;

        if let Some(hint) = token_type_hint {
            hint.parse::<TokenTypeHint>().map_err(|_| {
                OAuthError::new(OAuthErrorCode::UnsupportedTokenType)
                    .with_description("unsupported token_type_hint")
            })?;
        }

        let claims = match self.signer.verify_ignoring_expiry(token) {
            Ok(claims) => claims,
            Err(_) => return Ok(()),
        };
        if claims.client_id != client.id.to_string() {
            return Ok(());
        }

        // 撤销必须先落存储；失败时不得谎报成功
        let exp = timestamp_or(claims.exp, self.config.refresh_token_ttl_seconds);
        self.revoked
            .revoke(RevokedToken::new(claims.jti.clone(), exp), deadline)
            .await?;

        // 缓存条目在返回前移除；故障可降级（内省的命中路径仍会核对
        // 撤销存储）
        if let Err(err) = self.cache.remove(&cache_key(token), deadline).await {
            warn!("cache invalidation degraded during revocation: {}", err);
        }

        debug!(client_id = %client.id, jti = %claims.jti, "token revoked");
        Ok(())
    }

    // ========================================================================
    // 授权端点 (GET /oauth2/authorize, POST /oauth2/authorize/{approve,deny})
    // ========================================================================

    /// 校验授权请求，返回同意页数据
    pub async fn authorize(
        &self,
        request: &AuthorizeRequest,
        deadline: Deadline,
    ) -> OAuthResult<ConsentData> {
        if request.response_type != "code" {
            return Err(OAuthError::new(OAuthErrorCode::UnsupportedResponseType)
                .with_description("only the 'code' response type is supported"));
        }

        let client = self.load_active_client(request.client_id, deadline).await?;

        if !client.allows_redirect_uri(&request.redirect_uri) {
            return Err(OAuthError::invalid_request(
                "redirect_uri is not registered for this client",
            ));
        }
        if !client.allows_grant_type(GrantType::AuthorizationCode) {
            return Err(OAuthError::unauthorized_client());
        }

        let scopes = grant_scopes(&client, request.scope.as_deref())?;

        if request.code_challenge.is_empty() {
            return Err(OAuthError::invalid_request("missing parameter: code_challenge"));
        }
        let method = parse_challenge_method(request.code_challenge_method.as_deref())?;

        Ok(ConsentData {
            client_id: client.id,
            client_name: client.name,
            redirect_uri: request.redirect_uri.clone(),
            scopes,
            state: request.state.clone(),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: method,
        })
    }

    /// 批准授权请求：签发授权码并构造重定向 URL
    ///
    /// 核心信任调用方提交的 `user_id`（仅校验存在且启用）；把它绑定
    /// 到已认证会话是嵌入方的职责。
    pub async fn approve(
        &self,
        request: &ApproveRequest,
        deadline: Deadline,
    ) -> OAuthResult<String> {
        let client = self.load_active_client(request.client_id, deadline).await?;

        if !client.allows_redirect_uri(&request.redirect_uri) {
            return Err(OAuthError::invalid_request(
                "redirect_uri is not registered for this client",
            ));
        }

        let user = self.user_store.find_by_id(request.user_id, deadline).await?;
        let user = match user {
            Some(user) if user.active => user,
            _ => return Err(OAuthError::access_denied("user authentication required")),
        };

        let scopes = scope::parse(&request.scope);
        if !client.allows_scopes(&scopes) {
            return Err(OAuthError::invalid_scope());
        }

        if request.code_challenge.is_empty() {
            return Err(OAuthError::invalid_request("missing parameter: code_challenge"));
        }
        let method = parse_challenge_method(request.code_challenge_method.as_deref())?;
        let challenge = PkceCodeChallenge::new(request.code_challenge.clone(), method);

        let record = AuthorizationCode::new(
            client.id,
            user.id,
            request.redirect_uri.clone(),
            scope::join(&scopes),
            challenge,
            self.config.auth_code_ttl_seconds,
        )
        .map_err(OAuthError::from)?;
        let code = record.code.clone();

        self.codes.put(record, deadline).await?;

        debug!(client_id = %client.id, user_id = %user.id, "authorization code issued");
        build_success_redirect(&request.redirect_uri, &code, request.state.as_deref())
            .map_err(|_| OAuthError::invalid_request("malformed redirect_uri"))
    }

    /// 拒绝授权请求：构造 `error=access_denied` 的重定向 URL
    pub fn deny(&self, redirect_uri: &str, state: Option<&str>) -> OAuthResult<String> {
        build_denied_redirect(redirect_uri, state)
            .map_err(|_| OAuthError::invalid_request("malformed redirect_uri"))
    }

    // ========================================================================
    // 内部辅助
    // ========================================================================

    async fn load_active_client(
        &self,
        client_id: Uuid,
        deadline: Deadline,
    ) -> OAuthResult<Client> {
        let client = self.client_store.find_by_id(client_id, deadline).await?;
        match client {
            Some(client) if client.active => Ok(client),
            _ => Err(OAuthError::invalid_client()),
        }
    }

    /// 签发一对 access/refresh token（scope 相同）
    fn issue_pair(
        &self,
        sub: &str,
        client: &Client,
        scopes: &[String],
    ) -> OAuthResult<IssuedPair> {
        let scope_str = scope::join(scopes);
        let client_id = client.id.to_string();

        let access_claims = TokenClaims::new(
            TokenKind::Access,
            sub,
            client_id.clone(),
            scope_str.clone(),
            self.config.issuer.clone(),
            self.config.access_token_ttl_seconds,
        );
        let refresh_claims = TokenClaims::new(
            TokenKind::Refresh,
            sub,
            client_id,
            scope_str,
            self.config.issuer.clone(),
            self.config.refresh_token_ttl_seconds,
        );

        let access_token = self.signer.sign(&access_claims).map_err(OAuthError::from)?;
        let refresh_token = self.signer.sign(&refresh_claims).map_err(OAuthError::from)?;

        Ok(IssuedPair {
            access_token,
            refresh_token,
            access_claims,
            refresh_claims,
        })
    }

    fn pair_response(&self, pair: IssuedPair, scopes: &[String]) -> TokenResponse {
        TokenResponse::new(pair.access_token)
            .with_expires_in(self.config.access_token_ttl_seconds as u64)
            .with_refresh_token(pair.refresh_token)
            .with_scope(scope::join(scopes))
    }

    /// 撤销重放的授权码先前签发的全部 token
    async fn revoke_replayed_code_tokens(&self, prior: &AuthorizationCode, deadline: Deadline) {
        if prior.issued_token_jtis.is_empty() {
            return;
        }
        warn!(
            client_id = %prior.client_id,
            "authorization code replay detected, revoking previously issued tokens"
        );
        // refresh token 是这对 token 中寿命最长的；用它的 TTL 作为
        // 撤销条目的清理上界
        let exp = Utc::now() + Duration::seconds(self.config.refresh_token_ttl_seconds);
        for jti in &prior.issued_token_jtis {
            if let Err(err) = self
                .revoked
                .revoke(RevokedToken::new(jti.clone(), exp), deadline)
                .await
            {
                warn!("failed to revoke token issued from replayed code: {}", err);
            }
        }
    }
}

// ============================================================================
// 纯函数辅助
// ============================================================================

/// 授权码所有失效路径共用的错误（不泄漏具体原因）
fn invalid_code() -> OAuthError {
    OAuthError::invalid_grant("the authorization code is invalid, expired, or already used")
}

/// 刷新令牌所有失效路径共用的错误
fn invalid_refresh_token() -> OAuthError {
    OAuthError::invalid_grant("the refresh token is invalid, expired, or revoked")
}

/// 解析请求的 scope：缺省回落到客户端配置，越界报 `invalid_scope`
fn grant_scopes(client: &Client, requested: Option<&str>) -> OAuthResult<Vec<String>> {
    match requested {
        None => Ok(client.scopes.clone()),
        Some(raw) => {
            let requested = scope::parse(raw);
            if requested.is_empty() {
                Ok(client.scopes.clone())
            } else if client.allows_scopes(&requested) {
                Ok(requested)
            } else {
                Err(OAuthError::invalid_scope())
            }
        }
    }
}

/// 刷新时收窄 scope：请求值必须是原 token scope 的子集
fn narrow_refresh_scope(token_scope: &str, requested: Option<&str>) -> OAuthResult<Vec<String>> {
    let token_scopes = scope::parse(token_scope);
    match requested {
        None => Ok(token_scopes),
        Some(raw) => {
            let requested = scope::parse(raw);
            if requested.is_empty() {
                Ok(token_scopes)
            } else if scope::is_subset(&requested, &token_scopes) {
                Ok(requested)
            } else {
                Err(OAuthError::invalid_scope())
            }
        }
    }
}

/// 解析 code_challenge_method；缺失或未知的方法按 PKCE 失败处理
fn parse_challenge_method(method: Option<&str>) -> OAuthResult<PkceMethod> {
    let raw = method.ok_or_else(invalid_challenge_method)?;
    raw.parse::<PkceMethod>()
        .map_err(|_| invalid_challenge_method())
}

fn invalid_challenge_method() -> OAuthError {
    OAuthError::invalid_grant("code_challenge_method must be 'plain' or 'S256'")
}

/// Unix 时间戳转 DateTime；越界时回落到 `now + fallback_ttl`
fn timestamp_or(timestamp: i64, fallback_ttl_seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_else(|| Utc::now() + Duration::seconds(fallback_ttl_seconds))
}
