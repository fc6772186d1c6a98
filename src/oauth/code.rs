//! 授权码记录与存储契约
//!
//! 授权码是一次性、短时效的凭证：`consume` 是从 `consumed=false` 到
//! `true` 的原子比较交换，任意并发交错下至多一次成功。过期的授权码
//! 对 `consume` 与 `get` 一律表现为不存在。
//!
//! 记录上的 `issued_token_jtis` 保存了兑换时签发的 token ID：当一个
//! 已消费的授权码被再次提交时，服务层据此撤销之前签发的全部 token
//! （RFC 6749 §4.1.2 的重放加固建议）。

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::Deadline;
use crate::error::{Error, Result, StorageError};
use crate::oauth::pkce::{PkceCodeChallenge, PkceMethod};
use crate::random::generate_authorization_code;

/// 授权码记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// 授权码本身（≥128 位熵，URL 安全）
    pub code: String,

    /// 绑定的客户端 ID
    pub client_id: Uuid,

    /// 批准授权的用户 ID
    pub user_id: Uuid,

    /// 授权时提交的重定向 URI；token 交换时必须逐字节一致
    pub redirect_uri: String,

    /// 授权的权限范围（空格分隔）
    pub scope: String,

    /// PKCE code_challenge
    pub code_challenge: String,

    /// PKCE challenge 方法
    pub code_challenge_method: PkceMethod,

    /// 过期时间
    pub expires_at: DateTime<Utc>,

    /// 是否已消费（单次 false→true）
    pub consumed: bool,

    /// 消费时间
    pub consumed_at: Option<DateTime<Utc>>,

    /// 兑换该码时签发的 token 的 jti 列表
    pub issued_token_jtis: Vec<String>,

    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl AuthorizationCode {
    /// 创建新的授权码记录
    ///
    /// 码值自动生成（32 字节 CSPRNG，base64url）。
    pub fn new(
        client_id: Uuid,
        user_id: Uuid,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
        challenge: PkceCodeChallenge,
        ttl_seconds: i64,
    ) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            code: generate_authorization_code()?,
            client_id,
            user_id,
            redirect_uri: redirect_uri.into(),
            scope: scope.into(),
            code_challenge: challenge.challenge,
            code_challenge_method: challenge.method,
            expires_at: now + Duration::seconds(ttl_seconds),
            consumed: false,
            consumed_at: None,
            issued_token_jtis: Vec::new(),
            created_at: now,
        })
    }

    /// 是否已过期
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// 存储的 PKCE challenge
    pub fn challenge(&self) -> PkceCodeChallenge {
        PkceCodeChallenge::new(self.code_challenge.clone(), self.code_challenge_method)
    }
}

/// `consume` 的失败结果
#[derive(Debug)]
pub enum ConsumeError {
    /// 授权码不存在或已过期（两者对外不可区分）
    NotFound,

    /// 授权码已被消费；携带先前的记录，供撤销由它签发的 token
    AlreadyConsumed(Box<AuthorizationCode>),

    /// 存储层故障
    Storage(Error),
}

impl std::fmt::Display for ConsumeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsumeError::NotFound => write!(f, "authorization code not found"),
            ConsumeError::AlreadyConsumed(_) => write!(f, "authorization code already consumed"),
            ConsumeError::Storage(e) => write!(f, "storage failure: {}", e),
        }
    }
}

impl std::error::Error for ConsumeError {}

impl From<Error> for ConsumeError {
    fn from(err: Error) -> Self {
        ConsumeError::Storage(err)
    }
}

/// 授权码存储 trait
///
/// 实现必须保证 `consume` 可线性化：同一授权码的并发消费串行化，
/// 恰好一个调用观察到成功。
#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    /// 插入新记录；码值已存在时失败
    async fn put(&self, record: AuthorizationCode, deadline: Deadline) -> Result<()>;

    /// 查找记录；不存在或已过期返回 `None`
    async fn get(&self, code: &str, deadline: Deadline) -> Result<Option<AuthorizationCode>>;

    /// 原子消费：consumed 从 false 置为 true，返回先前的记录
    ///
    /// 过期的授权码返回 [`ConsumeError::NotFound`]。
    async fn consume(
        &self,
        code: &str,
        deadline: Deadline,
    ) -> std::result::Result<AuthorizationCode, ConsumeError>;

    /// 记录兑换该码时签发的 token jti
    async fn attach_issued_tokens(
        &self,
        code: &str,
        jtis: &[String],
        deadline: Deadline,
    ) -> Result<()>;

    /// 清理过期记录，返回删除数量
    async fn purge_expired(&self, deadline: Deadline) -> Result<usize>;
}

/// 内存授权码存储
///
/// 互斥锁串行化全部操作，`consume` 由此天然线性化。
#[derive(Debug, Default)]
pub struct InMemoryAuthorizationCodeStore {
    codes: Mutex<HashMap<String, AuthorizationCode>>,
}

impl InMemoryAuthorizationCodeStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned() -> Error {
    Error::Storage(StorageError::OperationFailed("lock poisoned".into()))
}

#[async_trait]
impl AuthorizationCodeStore for InMemoryAuthorizationCodeStore {
    async fn put(&self, record: AuthorizationCode, deadline: Deadline) -> Result<()> {
        deadline.check()?;
        let mut codes = self.codes.lock().map_err(|_| lock_poisoned())?;
        if codes.contains_key(&record.code) {
            return Err(Error::Storage(StorageError::AlreadyExists(
                "authorization code".to_string(),
            )));
        }
        codes.insert(record.code.clone(), record);
        Ok(())
    }

    async fn get(&self, code: &str, deadline: Deadline) -> Result<Option<AuthorizationCode>> {
        deadline.check()?;
        let codes = self.codes.lock().map_err(|_| lock_poisoned())?;
        Ok(codes.get(code).filter(|c| !c.is_expired()).cloned())
    }

    async fn consume(
        &self,
        code: &str,
        deadline: Deadline,
    ) -> std::result::Result<AuthorizationCode, ConsumeError> {
        deadline.check()?;
        let mut codes = self.codes.lock().map_err(|_| lock_poisoned())?;

        let record = match codes.get_mut(code) {
            Some(record) => record,
            None => return Err(ConsumeError::NotFound),
        };

        if record.is_expired() {
            // 过期即不存在；顺手清掉
            codes.remove(code);
            return Err(ConsumeError::NotFound);
        }
        if record.consumed {
            return Err(ConsumeError::AlreadyConsumed(Box::new(record.clone())));
        }

        record.consumed = true;
        record.consumed_at = Some(Utc::now());
        Ok(record.clone())
    }

    async fn attach_issued_tokens(
        &self,
        code: &str,
        jtis: &[String],
        deadline: Deadline,
    ) -> Result<()> {
        deadline.check()?;
        let mut codes = self.codes.lock().map_err(|_| lock_poisoned())?;
        let record = codes
            .get_mut(code)
            .ok_or_else(|| Error::Storage(StorageError::NotFound("authorization code".into())))?;
        record.issued_token_jtis.extend(jtis.iter().cloned());
        Ok(())
    }

    async fn purge_expired(&self, deadline: Deadline) -> Result<usize> {
        deadline.check()?;
        let mut codes = self.codes.lock().map_err(|_| lock_poisoned())?;
        let before = codes.len();
        codes.retain(|_, record| !record.is_expired());
        Ok(before - codes.len())
    }
}
