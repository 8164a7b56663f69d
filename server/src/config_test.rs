use super::*;

#[test]
fn env_parse_missing_returns_default() {
    let val: usize = env_parse("__SHELL_TEST_NONEXISTENT_KEY__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__SHELL_TEST_EP_VALID__", "99") };
    let val: usize = env_parse("__SHELL_TEST_EP_VALID__", 0);
    assert_eq!(val, 99);
    unsafe { std::env::remove_var("__SHELL_TEST_EP_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__SHELL_TEST_EP_INVALID__", "lots") };
    let val: u16 = env_parse("__SHELL_TEST_EP_INVALID__", 3000);
    assert_eq!(val, 3000);
    unsafe { std::env::remove_var("__SHELL_TEST_EP_INVALID__") };
}

#[test]
fn defaults_match_documented_values() {
    let config = ServerConfig::default();
    assert_eq!(config.port, 3000);
    assert_eq!(config.queue_capacity, 256);
}
