//! Redis key namespaces.
//!
//! These formats interoperate with existing deployments and must match
//! exactly, so every key is built through this module.

/// Entity cache for shops: `cache:shop:<id>`
pub const SHOP_CACHE_PREFIX: &str = "cache:shop:";
/// Lock domain for shop cache rebuilds: `lock:shop:<id>`
pub const SHOP_LOCK_DOMAIN: &str = "shop";

/// Per-user timeline: `feed:<userId>`
pub fn feed_key(user_id: i64) -> String {
    format!("feed:{}", user_id)
}

/// Monthly sign-in bitmap: `sign:<userId>:<yyyyMM>`
pub fn sign_key(user_id: i64, year_month: &str) -> String {
    format!("sign:{}:{}", user_id, year_month)
}

/// Daily id counter: `icr:<prefix>:<yyyy:MM:dd>`
pub fn id_counter_key(prefix: &str, date: &str) -> String {
    format!("icr:{}:{}", prefix, date)
}

/// Pending login code: `login:code:<phone>`
pub fn login_code_key(phone: &str) -> String {
    format!("login:code:{}", phone)
}

/// Session hash: `login:token:<token>`
pub fn login_token_key(token: &str) -> String {
    format!("login:token:{}", token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(format!("{}{}", SHOP_CACHE_PREFIX, 42), "cache:shop:42");
        assert_eq!(feed_key(1010), "feed:1010");
        assert_eq!(sign_key(7, "202608"), "sign:7:202608");
        assert_eq!(id_counter_key("order", "2026:08:06"), "icr:order:2026:08:06");
        assert_eq!(login_code_key("13812345678"), "login:code:13812345678");
        assert_eq!(login_token_key("abc123"), "login:token:abc123");
    }
}
