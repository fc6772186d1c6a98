//! 权限范围（scope）字符串处理
//!
//! OAuth 2.0 的 scope 是空格分隔的字符串；本模块提供解析、拼接与
//! 子集判断。子集判断用于三处：token 请求的 scope 不得超出客户端
//! 配置、refresh 时请求的 scope 不得超出原 token、授权请求的 scope
//! 不得超出客户端配置。
//!
//! ## 示例
//!
//! ```rust
//! use identrs::oauth::scope;
//!
//! let requested = scope::parse("read write");
//! let allowed = scope::parse("read write admin");
//! assert!(scope::is_subset(&requested, &allowed));
//! assert!(!scope::is_subset(&allowed, &requested));
//! ```

/// 解析空格分隔的 scope 字符串
///
/// 多余空白被忽略；空字符串解析为空列表。
pub fn parse(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(str::to_string).collect()
}

/// 将 scope 列表拼接为空格分隔的字符串
pub fn join(scopes: &[String]) -> String {
    scopes.join(" ")
}

/// 判断 `requested` 是否为 `allowed` 的子集
pub fn is_subset(requested: &[String], allowed: &[String]) -> bool {
    requested.iter().all(|s| allowed.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        assert_eq!(parse("read write"), vec!["read", "write"]);
        assert_eq!(parse("read"), vec!["read"]);
    }

    #[test]
    fn test_parse_extra_whitespace() {
        assert_eq!(parse("  read   write  "), vec!["read", "write"]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse("").is_empty());
        assert!(parse("   ").is_empty());
    }

    #[test]
    fn test_join_roundtrip() {
        let scopes = parse("read write admin");
        assert_eq!(join(&scopes), "read write admin");
    }

    #[test]
    fn test_is_subset() {
        let allowed = parse("read write");

        assert!(is_subset(&parse("read"), &allowed));
        assert!(is_subset(&parse("read write"), &allowed));
        assert!(is_subset(&[], &allowed));

        assert!(!is_subset(&parse("read write admin"), &allowed));
        assert!(!is_subset(&parse("admin"), &allowed));
    }

    #[test]
    fn test_is_subset_of_empty() {
        assert!(is_subset(&[], &[]));
        assert!(!is_subset(&parse("read"), &[]));
    }
}
