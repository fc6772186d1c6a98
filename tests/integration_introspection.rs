//! 集成测试：内省、缓存、刷新轮换与撤销
//!
//! 覆盖 refresh token 的强制轮换、撤销后经缓存仍立即不可见、
//! JWK 发布与签发 token 的互验，以及内省对失效原因的统一收敛。

mod common;

use common::{USER_PASSWORD, setup, setup_with_config, test_config};
use identrs::{
    Deadline, GrantRequest, IntrospectionRequest, OAuthErrorCode, TokenClaims, TokenRequest,
};

async fn issue_password_pair(env: &common::TestEnv) -> identrs::TokenResponse {
    env.service
        .issue(
            TokenRequest::new(
                env.client.id,
                env.client_secret.clone(),
                GrantRequest::Password {
                    username: "alice".to_string(),
                    password: USER_PASSWORD.to_string(),
                    scope: Some("read".to_string()),
                },
            ),
            Deadline::none(),
        )
        .await
        .unwrap()
}

async fn introspect(env: &common::TestEnv, token: &str) -> identrs::IntrospectionResponse {
    env.service
        .introspect(
            env.client.id,
            &env.client_secret,
            &IntrospectionRequest::new(token),
            Deadline::none(),
        )
        .await
        .unwrap()
}

/// 刷新轮换：R → R'，R 立即失效，R' 活跃
#[tokio::test]
async fn test_refresh_rotation() {
    let env = setup().await;
    let deadline = Deadline::none();

    let original = issue_password_pair(&env).await;
    let old_refresh = original.refresh_token.clone().unwrap();

    let rotated = env
        .service
        .issue(
            TokenRequest::new(
                env.client.id,
                env.client_secret.clone(),
                GrantRequest::RefreshToken {
                    refresh_token: old_refresh.clone(),
                    scope: None,
                },
            ),
            deadline,
        )
        .await
        .unwrap();

    let new_refresh = rotated.refresh_token.clone().unwrap();
    assert_ne!(old_refresh, new_refresh);
    assert_eq!(rotated.scope.as_deref(), Some("read"));

    // 旧 refresh token 不再活跃，新的活跃
    assert!(!introspect(&env, &old_refresh).await.active);
    assert!(introspect(&env, &new_refresh).await.active);

    // 已轮换的 refresh token 被永久拒绝
    let err = env
        .service
        .issue(
            TokenRequest::new(
                env.client.id,
                env.client_secret.clone(),
                GrantRequest::RefreshToken {
                    refresh_token: old_refresh,
                    scope: None,
                },
            ),
            deadline,
        )
        .await
        .unwrap_err();
    assert_eq!(err.error, OAuthErrorCode::InvalidGrant);
}

/// 刷新时 scope 只能收窄
#[tokio::test]
async fn test_refresh_scope_narrowing() {
    let env = setup().await;
    let deadline = Deadline::none();

    // 原 token 带 read write
    let original = env
        .service
        .issue(
            TokenRequest::new(
                env.client.id,
                env.client_secret.clone(),
                GrantRequest::Password {
                    username: "alice".to_string(),
                    password: USER_PASSWORD.to_string(),
                    scope: None,
                },
            ),
            deadline,
        )
        .await
        .unwrap();

    let narrowed = env
        .service
        .issue(
            TokenRequest::new(
                env.client.id,
                env.client_secret.clone(),
                GrantRequest::RefreshToken {
                    refresh_token: original.refresh_token.unwrap(),
                    scope: Some("read".to_string()),
                },
            ),
            deadline,
        )
        .await
        .unwrap();
    assert_eq!(narrowed.scope.as_deref(), Some("read"));

    // 二次刷新尝试扩权 → invalid_scope
    let err = env
        .service
        .issue(
            TokenRequest::new(
                env.client.id,
                env.client_secret.clone(),
                GrantRequest::RefreshToken {
                    refresh_token: narrowed.refresh_token.unwrap(),
                    scope: Some("read write".to_string()),
                },
            ),
            deadline,
        )
        .await
        .unwrap_err();
    assert_eq!(err.error, OAuthErrorCode::InvalidScope);
}

/// access token 不能用于刷新
#[tokio::test]
async fn test_access_token_rejected_by_refresh_grant() {
    let env = setup().await;

    let pair = issue_password_pair(&env).await;
    let err = env
        .service
        .issue(
            TokenRequest::new(
                env.client.id,
                env.client_secret.clone(),
                GrantRequest::RefreshToken {
                    refresh_token: pair.access_token,
                    scope: None,
                },
            ),
            Deadline::none(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error, OAuthErrorCode::InvalidGrant);
}

/// refresh token 绑定签发它的客户端
#[tokio::test]
async fn test_refresh_token_bound_to_client() {
    let env = setup().await;
    let (other_client, other_secret) = env
        .register_client(
            "other",
            &[identrs::GrantType::RefreshToken],
            &["read", "write"],
        )
        .await;

    let pair = issue_password_pair(&env).await;
    let err = env
        .service
        .issue(
            TokenRequest::new(
                other_client.id,
                other_secret,
                GrantRequest::RefreshToken {
                    refresh_token: pair.refresh_token.unwrap(),
                    scope: None,
                },
            ),
            Deadline::none(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error, OAuthErrorCode::InvalidGrant);
}

/// 撤销 + 缓存：先内省填充缓存，撤销后立刻内省必须看到 inactive
#[tokio::test]
async fn test_revocation_invalidates_cached_introspection() {
    let env = setup().await;
    let deadline = Deadline::none();

    let pair = issue_password_pair(&env).await;

    // 填充缓存
    assert!(introspect(&env, &pair.access_token).await.active);

    env.service
        .revoke(
            env.client.id,
            &env.client_secret,
            &pair.access_token,
            None,
            deadline,
        )
        .await
        .unwrap();

    // 撤销后立即内省：不得出现陈旧的 active:true
    assert!(!introspect(&env, &pair.access_token).await.active);
}

/// 撤销 refresh token 后它不能再用于刷新
#[tokio::test]
async fn test_revoked_refresh_token_rejected() {
    let env = setup().await;
    let deadline = Deadline::none();

    let pair = issue_password_pair(&env).await;
    let refresh_token = pair.refresh_token.unwrap();

    env.service
        .revoke(
            env.client.id,
            &env.client_secret,
            &refresh_token,
            Some("refresh_token"),
            deadline,
        )
        .await
        .unwrap();

    let err = env
        .service
        .issue(
            TokenRequest::new(
                env.client.id,
                env.client_secret.clone(),
                GrantRequest::RefreshToken {
                    refresh_token,
                    scope: None,
                },
            ),
            deadline,
        )
        .await
        .unwrap_err();
    assert_eq!(err.error, OAuthErrorCode::InvalidGrant);
}

/// 未知 token 的撤销静默成功 (RFC 7009)
#[tokio::test]
async fn test_revoke_unknown_token_succeeds() {
    let env = setup().await;

    env.service
        .revoke(
            env.client.id,
            &env.client_secret,
            "not-even-a-jwt",
            None,
            Deadline::none(),
        )
        .await
        .unwrap();
}

/// 撤销他人的 token 静默成功但不生效
#[tokio::test]
async fn test_revoke_foreign_token_is_noop() {
    let env = setup().await;
    let deadline = Deadline::none();
    let (other_client, other_secret) = env
        .register_client("other", &[identrs::GrantType::ClientCredentials], &["read"])
        .await;

    let pair = issue_password_pair(&env).await;

    // 另一个客户端"撤销"它：返回成功
    env.service
        .revoke(
            other_client.id,
            &other_secret,
            &pair.access_token,
            None,
            deadline,
        )
        .await
        .unwrap();

    // 但 token 对其属主仍然活跃
    assert!(introspect(&env, &pair.access_token).await.active);
}

/// 提供了未知的 token_type_hint → unsupported_token_type
#[tokio::test]
async fn test_revoke_unsupported_hint() {
    let env = setup().await;

    let err = env
        .service
        .revoke(
            env.client.id,
            &env.client_secret,
            "whatever",
            Some("id_token"),
            Deadline::none(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error, OAuthErrorCode::UnsupportedTokenType);

    // 两个注册的提示值都被接受
    for hint in ["access_token", "refresh_token"] {
        env.service
            .revoke(
                env.client.id,
                &env.client_secret,
                "whatever",
                Some(hint),
                Deadline::none(),
            )
            .await
            .unwrap();
    }
}

/// 内省把所有失效原因收敛为 {active:false}
#[tokio::test]
async fn test_introspection_collapses_failures() {
    let env = setup().await;

    // 格式错误
    assert!(!introspect(&env, "garbage").await.active);
    assert!(!introspect(&env, "a.b.c").await.active);
    assert!(!introspect(&env, "").await.active);

    // 非活跃响应不携带任何元数据
    let response = introspect(&env, "garbage").await;
    assert!(response.scope.is_none());
    assert!(response.sub.is_none());
    assert!(response.exp.is_none());
}

/// 过期 token 内省为 inactive
#[tokio::test]
async fn test_introspect_expired_token() {
    let mut config = test_config();
    config.access_token_ttl_seconds = 1;
    let env = setup_with_config(config).await;

    let pair = issue_password_pair(&env).await;
    tokio::time::sleep(std::time::Duration::from_millis(2100)).await;

    assert!(!introspect(&env, &pair.access_token).await.active);
}

/// 所有权检查：token 的受众不是调用方时按无效处理
#[tokio::test]
async fn test_introspection_ownership() {
    let env = setup().await;
    let deadline = Deadline::none();
    let (other_client, other_secret) = env
        .register_client("other", &[identrs::GrantType::ClientCredentials], &["read"])
        .await;

    let pair = issue_password_pair(&env).await;

    // 属主视角：active
    assert!(introspect(&env, &pair.access_token).await.active);

    // 其他客户端视角：inactive，且不泄漏任何元数据
    let foreign = env
        .service
        .introspect(
            other_client.id,
            &other_secret,
            &IntrospectionRequest::new(&pair.access_token),
            deadline,
        )
        .await
        .unwrap();
    assert!(!foreign.active);
    assert!(foreign.scope.is_none());

    // 缓存已被属主路径填充后，他人命中缓存同样 inactive
    let foreign_again = env
        .service
        .introspect(
            other_client.id,
            &other_secret,
            &IntrospectionRequest::new(&pair.access_token),
            deadline,
        )
        .await
        .unwrap();
    assert!(!foreign_again.active);
}

/// 内省与撤销都要求客户端认证
#[tokio::test]
async fn test_introspection_and_revocation_require_client_auth() {
    let env = setup().await;
    let deadline = Deadline::none();
    let pair = issue_password_pair(&env).await;

    let err = env
        .service
        .introspect(
            env.client.id,
            "wrong-secret",
            &IntrospectionRequest::new(&pair.access_token),
            deadline,
        )
        .await
        .unwrap_err();
    assert_eq!(err.error, OAuthErrorCode::InvalidClient);

    let err = env
        .service
        .revoke(env.client.id, "wrong-secret", &pair.access_token, None, deadline)
        .await
        .unwrap_err();
    assert_eq!(err.error, OAuthErrorCode::InvalidClient);
}

/// 回环定律：发布的 JWK 能验证签发的 JWT
#[tokio::test]
async fn test_jwks_verifies_issued_tokens() {
    let env = setup().await;
    let pair = issue_password_pair(&env).await;

    let jwks = env.service.jwks();
    assert_eq!(jwks.keys.len(), 1);
    let jwk = &jwks.keys[0];
    assert_eq!(jwk.kty, "RSA");
    assert_eq!(jwk.use_, "sig");
    assert_eq!(jwk.alg, "RS256");
    assert_eq!(jwk.kid, "test-key");

    // 头部的 kid 与 JWK 一致
    let header = jsonwebtoken::decode_header(&pair.access_token).unwrap();
    assert_eq!(header.kid.as_deref(), Some("test-key"));

    // 用 JWK 的 n/e 重建公钥并验证签名
    let key = jsonwebtoken::DecodingKey::from_rsa_components(&jwk.n, &jwk.e).unwrap();
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::RS256);
    validation.validate_aud = false;
    let data =
        jsonwebtoken::decode::<TokenClaims>(&pair.access_token, &key, &validation).unwrap();

    assert_eq!(data.claims.iss, common::ISSUER);
    assert_eq!(data.claims.scope, "read");
    assert!(data.claims.exp > data.claims.iat);
}

/// 回环定律：以 scope S 签发的 token 内省出 scope S
#[tokio::test]
async fn test_scope_roundtrip() {
    let env = setup().await;
    let pair = issue_password_pair(&env).await;

    let introspection = introspect(&env, &pair.access_token).await;
    assert_eq!(introspection.scope.as_deref(), Some("read"));

    let refresh_introspection = introspect(&env, &pair.refresh_token.unwrap()).await;
    assert!(refresh_introspection.active);
    assert_eq!(refresh_introspection.scope.as_deref(), Some("read"));
}
