//! 用户实体、存储契约与用户认证
//!
//! 用户认证的错误响应不区分"用户不存在"与"密码错误"：两条路径返回
//! 同一个 `invalid_grant`，且用户不存在时也会烧掉一次 bcrypt 验证，
//! 使延迟在 KDF 容差内不可区分。

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

/// 用户实体
///
/// `password_hash` 为不透明 KDF 输出，不得出现在任何日志或响应中。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// 用户 ID
    pub id: Uuid,

    /// 用户名（唯一，区分大小写，3-64 字符）
    pub username: String,

    /// 邮箱（唯一）
    pub email: String,

    /// 密码哈希；序列化时剔除，不得出现在任何对外表示中
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// 是否启用；停用的用户被所有需要用户的授权拒绝
    pub active: bool,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// 注册新用户
    ///
    /// 校验用户名与邮箱格式，明文密码在此处哈希一次，之后不再出现。
    ///
    /// # Arguments
    ///
    /// * `username` - 用户名（3-64 字符，不含空白）
    /// * `email` - 邮箱
    /// * `password` - 明文密码
    /// * `hasher` - 密码哈希器
    pub fn register(
        username: impl Into<String>,
        email: impl Into<String>,
        password: &str,
        hasher: &PasswordHasher,
    ) -> Result<Self> {
        let username = username.into();
        let email = email.into();
        validate_username(&username)?;
        validate_email(&email)?;

        let password_hash = hasher.hash(password)?;
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// 停用账户（软删除；核心不做硬删除）
    pub fn deactivate(&mut self) {
        self.active = false;
        self.updated_at = Utc::now();
    }

    /// 重新启用账户
    pub fn activate(&mut self) {
        self.active = true;
        self.updated_at = Utc::now();
    }

    /// 更新密码
    pub fn update_password(&mut self, new_password: &str, hasher: &PasswordHasher) -> Result<()> {
        self.password_hash = hasher.hash(new_password)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// 校验用户名：3-64 字符，不含空白
fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(3..=64).contains(&len) || username.chars().any(char::is_whitespace) {
        return Err(Error::Validation(ValidationError::InvalidUsername(
            username.to_string(),
        )));
    }
    Ok(())
}

/// 校验邮箱表面格式：恰好一个 `@`，本地与域名部分非空，域名含点
fn validate_email(email: &str) -> Result<()> {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");

    let valid = !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
        && email.matches('@').count() == 1;

    if !valid {
        return Err(Error::Validation(ValidationError::InvalidEmail(
            email.to_string(),
        )));
    }
    Ok(())
}

// ============================================================================
// 存储契约
// ============================================================================

/// 用户存储 trait
///
/// `save` 在用户名或邮箱与现有记录（包括停用用户）冲突时必须失败。
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 保存新用户；用户名/邮箱冲突时返回 `AlreadyExists`
    async fn save(&self, user: &User, deadline: Deadline) -> Result<()>;

    /// 更新已有用户
    async fn update(&self, user: &User, deadline: Deadline) -> Result<()>;

    /// 根据 ID 查找用户
    async fn find_by_id(&self, user_id: Uuid, deadline: Deadline) -> Result<Option<User>>;

    /// 根据用户名查找用户（区分大小写）
    async fn find_by_username(&self, username: &str, deadline: Deadline) -> Result<Option<User>>;

    /// 根据邮箱查找用户
    async fn find_by_email(&self, email: &str, deadline: Deadline) -> Result<Option<User>>;
}

/// 内存用户存储实现
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn save(&self, user: &User, deadline: Deadline) -> Result<()> {
        deadline.check()?;
        let mut users = self
            .users
            .write()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;

        if users.contains_key(&user.id) {
            return Err(Error::Storage(StorageError::AlreadyExists(
                user.id.to_string(),
            )));
        }
        if users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(Error::Storage(StorageError::AlreadyExists(format!(
                "user '{}'",
                user.username
            ))));
        }

        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User, deadline: Deadline) -> Result<()> {
        deadline.check()?;
        let mut users = self
            .users
            .write()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;

        if !users.contains_key(&user.id) {
            return Err(Error::Storage(StorageError::NotFound(user.id.to_string())));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, user_id: Uuid, deadline: Deadline) -> Result<Option<User>> {
        deadline.check()?;
        let users = self
            .users
            .read()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        Ok(users.get(&user_id).cloned())
    }

    async fn find_by_username(&self, username: &str, deadline: Deadline) -> Result<Option<User>> {
        deadline.check()?;
        let users = self
            .users
            .read()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str, deadline: Deadline) -> Result<Option<User>> {
        deadline.check()?;
        let users = self
            .users
            .read()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }
}

// ============================================================================
// 用户认证
// ============================================================================

/// 用户认证器
pub struct UserAuthenticator {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    /// 用户不存在时用于等化延迟的哈希
    fallback_hash: String,
}

impl UserAuthenticator {
    /// 创建用户认证器
    ///
    /// 构造时生成一条 fallback 哈希，供未知用户路径烧掉一次 KDF 验证。
    pub fn new(store: Arc<dyn UserStore>, hasher: PasswordHasher) -> Result<Self> {
        let fallback_hash = hasher.hash("fallback-credential-for-timing")?;
        Ok(Self {
            store,
            hasher,
            fallback_hash,
        })
    }

    /// 按用户名和密码认证用户
    ///
    /// 用户不存在、已停用、密码错误三条路径返回完全相同的错误。
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        deadline: Deadline,
    ) -> std::result::Result<User, OAuthError> {
        let user = self.store.find_by_username(username, deadline).await?;

        match user {
            Some(user) => {
                let verified = self
                    .hasher
                    .verify(password, &user.password_hash)
                    .unwrap_or(false);
                if verified && user.active {
                    Ok(user)
                } else {
                    Err(invalid_credentials())
                }
            }
            None => {
                // 等化延迟：与存在用户的路径做同样多的 KDF 工作
                let _ = self.hasher.verify(password, &self.fallback_hash);
                Err(invalid_credentials())
            }
        }
    }
}

fn invalid_credentials() -> OAuthError {
    OAuthError::invalid_grant("invalid resource owner credentials")
}
