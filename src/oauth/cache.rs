//! 内省结果缓存契约
//!
//! 读穿缓存：命中直接返回缓存的内省响应（跳过签名验证），未命中
//! 走完整验证后回填。键是 token 字符串的 SHA-256 十六进制摘要，
//! 原始 bearer token 永远不进缓存层。
//!
//! 缓存属于可降级依赖：任何缓存故障都只记日志，调用方退回直接验证，
//! 故障绝不向协议边界传播。撤销路径在响应返回前同步调用 `remove`。

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::context::Deadline;
use crate::error::{Error, Result, StorageError};
use crate::oauth::introspection::IntrospectionResponse;
use crate::random::hex_encode;

/// 由 token 字符串派生缓存键
///
/// SHA-256 十六进制摘要；所有读写方使用同一派生，保证键一致。
pub fn cache_key(token: &str) -> String {
    hex_encode(&Sha256::digest(token.as_bytes()))
}

/// 内省缓存 trait
#[async_trait]
pub trait IntrospectionCache: Send + Sync {
    /// 读取缓存的内省响应
    async fn get(&self, key: &str, deadline: Deadline) -> Result<Option<IntrospectionResponse>>;

    /// 写入内省响应，`ttl_seconds` 后过期
    async fn put(
        &self,
        key: &str,
        response: &IntrospectionResponse,
        ttl_seconds: i64,
        deadline: Deadline,
    ) -> Result<()>;

    /// 同步移除缓存条目（撤销路径在返回前调用）
    async fn remove(&self, key: &str, deadline: Deadline) -> Result<()>;
}

/// 内存内省缓存
#[derive(Debug, Default)]
pub struct InMemoryIntrospectionCache {
    entries: RwLock<HashMap<String, (IntrospectionResponse, DateTime<Utc>)>>,
}

impl InMemoryIntrospectionCache {
    /// 创建新的内存缓存
    pub fn new() -> Self {
        Self::default()
    }

    /// 清理已过期的条目，返回删除数量
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut entries = self.entries.write().map_err(|_| lock_poisoned())?;
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(before - entries.len())
    }
}

fn lock_poisoned() -> Error {
    Error::Storage(StorageError::OperationFailed("lock poisoned".into()))
}

#[async_trait]
impl IntrospectionCache for InMemoryIntrospectionCache {
    async fn get(&self, key: &str, deadline: Deadline) -> Result<Option<IntrospectionResponse>> {
        deadline.check()?;
        let entries = self.entries.read().map_err(|_| lock_poisoned())?;
        Ok(entries.get(key).and_then(|(response, expires_at)| {
            if *expires_at > Utc::now() {
                Some(response.clone())
            } else {
                None
            }
        }))
    }

    async fn put(
        &self,
        key: &str,
        response: &IntrospectionResponse,
        ttl_seconds: i64,
        deadline: Deadline,
    ) -> Result<()> {
        deadline.check()?;
        if ttl_seconds <= 0 {
            return Ok(());
        }
        let mut entries = self.entries.write().map_err(|_| lock_poisoned())?;
        entries.insert(
            key.to_string(),
            (response.clone(), Utc::now() + Duration::seconds(ttl_seconds)),
        );
        Ok(())
    }

    async fn remove(&self, key: &str, deadline: Deadline) -> Result<()> {
        deadline.check()?;
        let mut entries = self.entries.write().map_err(|_| lock_poisoned())?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> IntrospectionResponse {
        IntrospectionResponse::active()
            .scope("read")
            .client_id("client-1")
            .jti("jti-1")
            .build()
    }

    #[test]
    fn test_cache_key_is_stable_and_opaque() {
        let token = "some.jwt.token";
        let key = cache_key(token);

        assert_eq!(key, cache_key(token));
        assert_ne!(key, cache_key("other.jwt.token"));
        // 键不含原始 token
        assert!(!key.contains("jwt"));
        assert_eq!(key.len(), 64);
    }

    #[tokio::test]
    async fn test_put_get_remove() {
        let cache = InMemoryIntrospectionCache::new();
        let deadline = Deadline::none();
        let response = sample_response();

        assert!(cache.get("k", deadline).await.unwrap().is_none());

        cache.put("k", &response, 300, deadline).await.unwrap();
        assert_eq!(cache.get("k", deadline).await.unwrap(), Some(response));

        cache.remove("k", deadline).await.unwrap();
        assert!(cache.get("k", deadline).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss() {
        let cache = InMemoryIntrospectionCache::new();
        let deadline = Deadline::none();

        cache
            .put("k", &sample_response(), -1, deadline)
            .await
            .unwrap();
        assert!(cache.get("k", deadline).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = InMemoryIntrospectionCache::new();
        let deadline = Deadline::none();

        cache.put("live", &sample_response(), 300, deadline).await.unwrap();
        // 直接塞入一条已过期的条目
        cache
            .entries
            .write()
            .unwrap()
            .insert("dead".into(), (sample_response(), Utc::now() - Duration::seconds(1)));

        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert!(cache.get("live", deadline).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let cache = InMemoryIntrospectionCache::new();
        assert!(cache.remove("missing", Deadline::none()).await.is_ok());
    }
}
