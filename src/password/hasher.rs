//! 密码哈希实现
//!
//! 提供基于 bcrypt 的密码哈希和验证。

use crate::error::{Error, PasswordHashError, Result};

/// 允许的最小 bcrypt cost
///
/// 低于 12 的 cost 对离线暴力破解的抵抗不足。
pub const MIN_COST: u32 = 12;

/// 密码哈希器
///
/// 同时服务于用户密码和客户端密钥两类凭证。
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    /// bcrypt 的 cost 参数 (12-31, 默认 12)
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: MIN_COST }
    }
}

impl PasswordHasher {
    /// 创建新的密码哈希器（默认 cost 12）
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 bcrypt 的 cost 参数
    ///
    /// # Arguments
    ///
    /// * `cost` - cost 参数，范围 12-31
    ///
    /// # Panics
    ///
    /// 如果 cost 不在 12-31 范围内会 panic
    pub fn with_cost(mut self, cost: u32) -> Self {
        assert!(
            (MIN_COST..=31).contains(&cost),
            "bcrypt cost must be between 12 and 31"
        );
        self.cost = cost;
        self
    }

    /// 当前的 cost 参数
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// 哈希凭证
    ///
    /// bcrypt 自带每条凭证独立的随机盐；输出为不透明字符串。
    ///
    /// # Arguments
    ///
    /// * `password` - 要哈希的明文凭证
    ///
    /// # Returns
    ///
    /// 返回哈希后的字符串
    pub fn hash(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.cost).map_err(|e| {
            Error::PasswordHash(PasswordHashError::HashFailed(format!(
                "bcrypt hash failed: {}",
                e
            )))
        })
    }

    /// 验证凭证
    ///
    /// 派生标签的比较为常量时间；错误信息中不包含明文。
    ///
    /// # Arguments
    ///
    /// * `password` - 要验证的明文凭证
    /// * `hash` - 存储的哈希值
    ///
    /// # Returns
    ///
    /// 凭证正确返回 `Ok(true)`，错误返回 `Ok(false)`
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        bcrypt::verify(password, hash).map_err(|e| {
            Error::PasswordHash(PasswordHashError::InvalidFormat(format!(
                "bcrypt verify failed: {}",
                e
            )))
        })
    }
}

// ============================================================================
// 便捷函数
// ============================================================================

/// 使用默认 cost 哈希凭证
///
/// # Example
///
/// ```rust
/// use identrs::password::hash_password;
///
/// let hash = hash_password("my_secure_password").unwrap();
/// assert!(hash.starts_with("$2"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    PasswordHasher::default().hash(password)
}

/// 验证凭证是否匹配哈希
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    PasswordHasher::default().verify(password, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::default();
        let password = "test_password_123";

        let hash = hasher.hash(password).unwrap();
        assert!(hash.starts_with("$2"));

        assert!(hasher.verify(password, &hash).unwrap());
        assert!(!hasher.verify("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_salt_uniqueness() {
        let hasher = PasswordHasher::default();

        // 相同明文两次哈希结果不同（随机盐）
        let h1 = hasher.hash("same_password").unwrap();
        let h2 = hasher.hash("same_password").unwrap();
        assert_ne!(h1, h2);

        assert!(hasher.verify("same_password", &h1).unwrap());
        assert!(hasher.verify("same_password", &h2).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        let hasher = PasswordHasher::default();
        assert!(hasher.verify("password", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    #[should_panic(expected = "bcrypt cost must be between 12 and 31")]
    fn test_cost_below_minimum_panics() {
        let _ = PasswordHasher::new().with_cost(4);
    }

    #[test]
    fn test_convenience_functions() {
        let hash = hash_password("my_secure_password").unwrap();
        assert!(verify_password("my_secure_password", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }
}
