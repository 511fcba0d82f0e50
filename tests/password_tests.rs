//! 密码哈希功能单元测试
//!
//! 测试 Argon2id 密码哈希、验证和长度策略

mod common;

use common::{create_test_config, fast_hasher};
use movie_stream::auth::password::PasswordHasher;

#[test]
fn test_password_hash_and_verify() {
    let hasher = fast_hasher();
    let password = "TestPassword123!";

    let hash = hasher.hash(password).expect("Hashing should succeed");

    // 哈希值应该包含 argon2id 标识
    assert!(hash.starts_with("$argon2id$"));
    assert!(hasher.verify(password, &hash));
}

#[test]
fn test_password_verify_with_wrong_password() {
    let hasher = fast_hasher();
    let hash = hasher.hash("TestPassword123!").unwrap();

    assert!(!hasher.verify("WrongPassword123!", &hash));
}

#[test]
fn test_password_hash_different_each_time() {
    let hasher = fast_hasher();
    let password = "TestPassword123!";

    let hash1 = hasher.hash(password).unwrap();
    let hash2 = hasher.hash(password).unwrap();

    // 由于随机盐，每次生成的哈希应该不同
    assert_ne!(hash1, hash2);
    assert!(hasher.verify(password, &hash1));
    assert!(hasher.verify(password, &hash2));
}

#[test]
fn test_password_hash_unicode() {
    let hasher = fast_hasher();
    let password = "密码测试Test123!🔒";

    let hash = hasher.hash(password).unwrap();

    assert!(hasher.verify(password, &hash));
    assert!(!hasher.verify("密码测试Test123🔒", &hash));
}

#[test]
fn test_digest_from_other_params_still_verifies() {
    // 参数编码在摘要中，调整成本参数后旧摘要仍可验证
    let old = PasswordHasher::with_params(2048, 2, 1).unwrap();
    let hash = old.hash("secret1").unwrap();

    assert!(fast_hasher().verify("secret1", &hash));
}

#[test]
fn test_invalid_params_rejected() {
    assert!(PasswordHasher::with_params(1, 1, 1).is_err());
}

#[test]
fn test_password_verify_with_invalid_hash() {
    let hasher = fast_hasher();

    assert!(!hasher.verify("secret1", "invalid_hash"));
    assert!(!hasher.verify("secret1", "$argon2id$v=19$invalid"));
    assert!(!hasher.verify("secret1", ""));
    // 明文不会被当作摘要
    assert!(!hasher.verify("secret1", "secret1"));
}

#[test]
fn test_password_policy_minimum_length() {
    let config = create_test_config();

    assert!(PasswordHasher::validate_password_policy("secret", &config.security).is_ok());
    assert!(PasswordHasher::validate_password_policy("12345", &config.security).is_err());
    // 按字符计数，而不是字节
    assert!(PasswordHasher::validate_password_policy("密码密码密码", &config.security).is_ok());
}

#[test]
fn test_password_policy_minimum_length_custom() {
    let mut config = create_test_config();
    config.security.password_min_length = 12;

    assert!(PasswordHasher::validate_password_policy("Test12345678", &config.security).is_ok());

    let err = PasswordHasher::validate_password_policy("Test1234567", &config.security).unwrap_err();
    assert_eq!(err.user_message(), "Password must be at least 12 characters");
}
