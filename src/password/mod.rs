//! 密码哈希模块
//!
//! 使用 bcrypt 对用户密码和客户端密钥进行哈希与验证。
//! cost 参数下限为 12，每条凭证使用独立随机盐，验证为常量时间比较，
//! 验证延迟由 KDF 成本有意约束。
//!
//! ## 示例
//!
//! ```rust
//! use identrs::password::{hash_password, verify_password};
//!
//! // 哈希密码
//! let hash = hash_password("my_secure_password").unwrap();
//!
//! // 验证密码
//! let is_valid = verify_password("my_secure_password", &hash).unwrap();
//! assert!(is_valid);
//! ```

mod hasher;

pub use hasher::{MIN_COST, PasswordHasher, hash_password, verify_password};
