//! 已撤销 token 的登记存储
//!
//! 撤销按 `jti` 登记并保留原 token 的 `exp`；`exp` 过后条目可以清理，
//! 因为届时签名验证自身就会拒绝该 token。已撤销的 `jti` 即使签名
//! 有效且未过期也必须被拒绝。

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::Deadline;
use crate::error::{Error, Result, StorageError};

/// 一条撤销记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedToken {
    /// 被撤销 token 的 JWT ID
    pub jti: String,

    /// 原 token 的过期时间；之后条目可被清理
    pub exp: DateTime<Utc>,
}

impl RevokedToken {
    /// 创建撤销记录
    pub fn new(jti: impl Into<String>, exp: DateTime<Utc>) -> Self {
        Self {
            jti: jti.into(),
            exp,
        }
    }

    /// 原 token 是否已自然过期（条目可被清理）
    pub fn is_purgeable(&self) -> bool {
        self.exp <= Utc::now()
    }
}

/// 撤销存储 trait
#[async_trait]
pub trait RevokedTokenStore: Send + Sync {
    /// 登记撤销；重复登记是幂等的
    async fn revoke(&self, entry: RevokedToken, deadline: Deadline) -> Result<()>;

    /// 查询 jti 是否已撤销
    async fn is_revoked(&self, jti: &str, deadline: Deadline) -> Result<bool>;

    /// 清理 `exp` 已过的条目，返回删除数量
    async fn purge_expired(&self, deadline: Deadline) -> Result<usize>;
}

/// 内存撤销存储
#[derive(Debug, Default)]
pub struct InMemoryRevokedTokenStore {
    entries: RwLock<HashMap<String, RevokedToken>>,
}

impl InMemoryRevokedTokenStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned() -> Error {
    Error::Storage(StorageError::OperationFailed("lock poisoned".into()))
}

#[async_trait]
impl RevokedTokenStore for InMemoryRevokedTokenStore {
    async fn revoke(&self, entry: RevokedToken, deadline: Deadline) -> Result<()> {
        deadline.check()?;
        let mut entries = self.entries.write().map_err(|_| lock_poisoned())?;
        entries.insert(entry.jti.clone(), entry);
        Ok(())
    }

    async fn is_revoked(&self, jti: &str, deadline: Deadline) -> Result<bool> {
        deadline.check()?;
        let entries = self.entries.read().map_err(|_| lock_poisoned())?;
        Ok(entries.contains_key(jti))
    }

    async fn purge_expired(&self, deadline: Deadline) -> Result<usize> {
        deadline.check()?;
        let mut entries = self.entries.write().map_err(|_| lock_poisoned())?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_purgeable());
        Ok(before - entries.len())
    }
}
