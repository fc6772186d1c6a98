//! 集成测试共享夹具
//!
//! RSA 测试密钥对每个测试二进制只生成一次；`setup` 构建一套带内存
//! 存储的完整服务，预注册一个全授权客户端和一个活跃用户。

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use identrs::oauth::{
    InMemoryAuthorizationCodeStore, InMemoryClientStore, InMemoryIntrospectionCache,
    InMemoryRevokedTokenStore, InMemoryUserStore,
};
use identrs::{
    AuthServerConfig, Client, ClientStore, Deadline, GrantType, OAuth2Service, PasswordHasher,
    User, UserStore,
};

/// 生成一次、整个测试二进制共享的 RSA-2048 密钥对 (private, public)
pub fn rsa_test_keys() -> &'static (String, String) {
    static KEYS: OnceLock<(String, String)> = OnceLock::new();
    KEYS.get_or_init(|| {
        use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

        let private =
            rsa::RsaPrivateKey::new(&mut rand_core::OsRng, 2048).expect("generate RSA test key");
        let public = rsa::RsaPublicKey::from(&private);

        let private_pem = private
            .to_pkcs8_pem(LineEnding::LF)
            .expect("encode private key")
            .to_string();
        let public_pem = public
            .to_public_key_pem(LineEnding::LF)
            .expect("encode public key");

        (private_pem, public_pem)
    })
}

/// 测试用签发者
pub const ISSUER: &str = "https://auth.example.com";

/// 预注册客户端的重定向 URI
pub const REDIRECT_URI: &str = "https://app.example.com/callback";

/// 预注册用户的密码
pub const USER_PASSWORD: &str = "p@ssw0rd";

/// 默认 TTL 的测试配置
pub fn test_config() -> AuthServerConfig {
    let (private_pem, public_pem) = rsa_test_keys();
    AuthServerConfig::new(ISSUER, private_pem.clone(), public_pem.clone(), "test-key")
}

/// 组装好的测试环境
pub struct TestEnv {
    pub service: OAuth2Service,
    pub client: Client,
    pub client_secret: String,
    pub user: User,
    pub user_store: Arc<InMemoryUserStore>,
    pub client_store: Arc<InMemoryClientStore>,
    pub code_store: Arc<InMemoryAuthorizationCodeStore>,
    pub revoked_store: Arc<InMemoryRevokedTokenStore>,
    pub cache: Arc<InMemoryIntrospectionCache>,
}

impl TestEnv {
    /// 注册一个额外的客户端
    pub async fn register_client(
        &self,
        name: &str,
        grant_types: &[GrantType],
        scopes: &[&str],
    ) -> (Client, String) {
        let hasher = PasswordHasher::default();
        let mut builder = Client::builder().name(name).redirect_uri(REDIRECT_URI);
        for grant in grant_types {
            builder = builder.grant_type(*grant);
        }
        for scope in scopes {
            builder = builder.scope(*scope);
        }
        let (client, secret) = builder.build(&hasher).expect("build client");
        self.client_store
            .save(&client, Deadline::none())
            .await
            .expect("save client");
        (client, secret)
    }
}

/// 用默认配置构建测试环境
pub async fn setup() -> TestEnv {
    setup_with_config(test_config()).await
}

/// 用自定义配置构建测试环境
pub async fn setup_with_config(config: AuthServerConfig) -> TestEnv {
    let hasher = PasswordHasher::default();

    let user_store = Arc::new(InMemoryUserStore::new());
    let client_store = Arc::new(InMemoryClientStore::new());
    let code_store = Arc::new(InMemoryAuthorizationCodeStore::new());
    let revoked_store = Arc::new(InMemoryRevokedTokenStore::new());
    let cache = Arc::new(InMemoryIntrospectionCache::new());

    let (client, client_secret) = Client::builder()
        .name("Test Application")
        .redirect_uri(REDIRECT_URI)
        .grant_type(GrantType::Password)
        .grant_type(GrantType::AuthorizationCode)
        .grant_type(GrantType::RefreshToken)
        .grant_type(GrantType::ClientCredentials)
        .scope("read")
        .scope("write")
        .build(&hasher)
        .expect("build client");
    client_store
        .save(&client, Deadline::none())
        .await
        .expect("save client");

    let user = User::register("alice", "alice@example.com", USER_PASSWORD, &hasher)
        .expect("register user");
    user_store
        .save(&user, Deadline::none())
        .await
        .expect("save user");

    let service = OAuth2Service::new(
        config,
        user_store.clone(),
        client_store.clone(),
        code_store.clone(),
        revoked_store.clone(),
        cache.clone(),
    )
    .expect("build service");

    TestEnv {
        service,
        client,
        client_secret,
        user,
        user_store,
        client_store,
        code_store,
        revoked_store,
        cache,
    }
}

/// 从重定向 URL 中提取查询参数
pub fn extract_query_param(redirect_url: &str, key: &str) -> Option<String> {
    let parsed = url::Url::parse(redirect_url).expect("parse redirect url");
    parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
