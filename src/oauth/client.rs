//! OAuth 2.0 客户端实体、存储契约与客户端认证
//!
//! 本核心只支持机密客户端：每个客户端都持有密钥，密钥以 bcrypt
//! 哈希形式存储，验证走常量时间的 KDF 比较。公开客户端（无密钥）
//! 在类型层面就不可构造。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::Deadline;
use crate::error::{Error, Result, StorageError, ValidationError};
use crate::oauth::token::OAuthError;
use crate::password::PasswordHasher;
use crate::random::generate_client_secret;

/// OAuth 授权类型
///
/// 封闭枚举：本服务器支持且只支持这四种授权。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// 资源所有者密码凭证模式
    Password,
    /// 授权码模式（含 PKCE）
    AuthorizationCode,
    /// 刷新令牌
    RefreshToken,
    /// 客户端凭证模式
    ClientCredentials,
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrantType::Password => write!(f, "password"),
            GrantType::AuthorizationCode => write!(f, "authorization_code"),
            GrantType::RefreshToken => write!(f, "refresh_token"),
            GrantType::ClientCredentials => write!(f, "client_credentials"),
        }
    }
}

impl std::str::FromStr for GrantType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "password" => Ok(GrantType::Password),
            "authorization_code" => Ok(GrantType::AuthorizationCode),
            "refresh_token" => Ok(GrantType::RefreshToken),
            "client_credentials" => Ok(GrantType::ClientCredentials),
            _ => Err(Error::Validation(ValidationError::Custom(format!(
                "unknown grant type: {}",
                s
            )))),
        }
    }
}

/// OAuth 客户端实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// 客户端 ID
    pub id: Uuid,

    /// 客户端密钥哈希（bcrypt），明文只在注册时返回一次
    pub secret_hash: String,

    /// 客户端名称
    pub name: String,

    /// 允许的重定向 URI 列表（逐字节精确匹配）
    pub redirect_uris: Vec<String>,

    /// 允许的授权类型
    pub grant_types: Vec<GrantType>,

    /// 允许的权限范围
    pub scopes: Vec<String>,

    /// 是否启用
    pub active: bool,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// 创建构建器
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// 验证客户端密钥
    ///
    /// bcrypt 比较为常量时间；哈希格式异常按验证失败处理。
    pub fn verify_secret(&self, secret: &str, hasher: &PasswordHasher) -> bool {
        hasher.verify(secret, &self.secret_hash).unwrap_or(false)
    }

    /// 是否允许指定的授权类型
    pub fn allows_grant_type(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// 是否允许指定的重定向 URI（逐字节精确匹配，含末尾斜杠）
    pub fn allows_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    /// 是否允许指定的权限范围
    pub fn allows_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// 是否允许所有请求的权限范围
    pub fn allows_scopes(&self, scopes: &[String]) -> bool {
        scopes.iter().all(|s| self.allows_scope(s))
    }

    /// 停用客户端
    pub fn deactivate(&mut self) {
        self.active = false;
        self.updated_at = Utc::now();
    }
}

/// OAuth 客户端构建器
///
/// `build` 生成客户端 ID 与高熵明文密钥，密钥以 bcrypt 哈希入库，
/// 明文随返回值给出——这是获取明文的唯一机会。
#[derive(Debug, Default)]
pub struct ClientBuilder {
    name: Option<String>,
    redirect_uris: Vec<String>,
    grant_types: Vec<GrantType>,
    scopes: Vec<String>,
}

impl ClientBuilder {
    /// 设置客户端名称
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 添加重定向 URI
    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    /// 添加授权类型
    pub fn grant_type(mut self, grant_type: GrantType) -> Self {
        if !self.grant_types.contains(&grant_type) {
            self.grant_types.push(grant_type);
        }
        self
    }

    /// 添加权限范围
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    /// 构建客户端，返回客户端和明文密钥
    pub fn build(self, hasher: &PasswordHasher) -> Result<(Client, String)> {
        let name = self
            .name
            .ok_or_else(|| Error::Validation(ValidationError::EmptyField("name".to_string())))?;

        if self.redirect_uris.is_empty() {
            return Err(Error::Validation(ValidationError::Custom(
                "at least one redirect URI is required".to_string(),
            )));
        }
        for uri in &self.redirect_uris {
            validate_redirect_uri(uri)?;
        }

        let grant_types = if self.grant_types.is_empty() {
            vec![GrantType::AuthorizationCode]
        } else {
            self.grant_types
        };

        let secret = generate_client_secret()?;
        let secret_hash = hasher.hash(&secret)?;
        let now = Utc::now();

        let client = Client {
            id: Uuid::new_v4(),
            secret_hash,
            name,
            redirect_uris: self.redirect_uris,
            grant_types,
            scopes: self.scopes,
            active: true,
            created_at: now,
            updated_at: now,
        };

        Ok((client, secret))
    }
}

/// 验证重定向 URI 格式
///
/// 只做结构检查（必须带 scheme）；是否注册由精确匹配决定。
fn validate_redirect_uri(uri: &str) -> Result<()> {
    if uri.is_empty() {
        return Err(Error::Validation(ValidationError::InvalidRedirectUri(
            "redirect URI cannot be empty".to_string(),
        )));
    }
    if !uri.contains("://") {
        return Err(Error::Validation(ValidationError::InvalidRedirectUri(
            format!("redirect URI must have a scheme: {}", uri),
        )));
    }
    Ok(())
}

// ============================================================================
// 存储契约
// ============================================================================

/// OAuth 客户端存储 trait
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// 保存客户端（插入或覆盖）
    async fn save(&self, client: &Client, deadline: Deadline) -> Result<()>;

    /// 根据 ID 查找客户端
    async fn find_by_id(&self, client_id: Uuid, deadline: Deadline) -> Result<Option<Client>>;

    /// 删除客户端
    async fn delete(&self, client_id: Uuid, deadline: Deadline) -> Result<()>;

    /// 列出所有客户端
    async fn list(&self, deadline: Deadline) -> Result<Vec<Client>>;
}

/// 内存客户端存储实现
#[derive(Debug, Default)]
pub struct InMemoryClientStore {
    clients: RwLock<HashMap<Uuid, Client>>,
}

impl InMemoryClientStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn save(&self, client: &Client, deadline: Deadline) -> Result<()> {
        deadline.check()?;
        let mut clients = self
            .clients
            .write()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        clients.insert(client.id, client.clone());
        Ok(())
    }

    async fn find_by_id(&self, client_id: Uuid, deadline: Deadline) -> Result<Option<Client>> {
        deadline.check()?;
        let clients = self
            .clients
            .read()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        Ok(clients.get(&client_id).cloned())
    }

    async fn delete(&self, client_id: Uuid, deadline: Deadline) -> Result<()> {
        deadline.check()?;
        let mut clients = self
            .clients
            .write()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        clients
            .remove(&client_id)
            .ok_or_else(|| Error::Storage(StorageError::NotFound(client_id.to_string())))?;
        Ok(())
    }

    async fn list(&self, deadline: Deadline) -> Result<Vec<Client>> {
        deadline.check()?;
        let clients = self
            .clients
            .read()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        Ok(clients.values().cloned().collect())
    }
}

// ============================================================================
// 客户端认证
// ============================================================================

/// 客户端认证器
///
/// 认证失败的三条路径（客户端不存在、未启用、密钥错误）都返回同一个
/// `invalid_client`，不向调用方泄漏具体原因。
pub struct ClientAuthenticator {
    store: Arc<dyn ClientStore>,
    hasher: PasswordHasher,
}

impl ClientAuthenticator {
    /// 创建客户端认证器
    pub fn new(store: Arc<dyn ClientStore>, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    /// 认证客户端凭证
    pub async fn authenticate(
        &self,
        client_id: Uuid,
        client_secret: &str,
        deadline: Deadline,
    ) -> std::result::Result<Client, OAuthError> {
        let client = self.store.find_by_id(client_id, deadline).await?;

        let client = match client {
            Some(c) if c.active => c,
            _ => return Err(OAuthError::invalid_client()),
        };

        if !client.verify_secret(client_secret, &self.hasher) {
            return Err(OAuthError::invalid_client());
        }

        Ok(client)
    }

    /// 认证客户端凭证并检查授权类型许可
    pub async fn authenticate_for_grant(
        &self,
        client_id: Uuid,
        client_secret: &str,
        grant_type: GrantType,
        deadline: Deadline,
    ) -> std::result::Result<Client, OAuthError> {
        let client = self
            .authenticate(client_id, client_secret, deadline)
            .await?;

        if !client.allows_grant_type(grant_type) {
            return Err(OAuthError::unauthorized_client());
        }

        Ok(client)
    }
}
