use super::*;
use std::sync::{Mutex, MutexGuard, PoisonError};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// # Safety
/// Callers must hold `env_lock()` so no other test mutates the environment concurrently.
unsafe fn clear_storefront_env() {
    unsafe {
        std::env::remove_var("STOREFRONT_API_BASE_URL");
        std::env::remove_var("STOREFRONT_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("STOREFRONT_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("STOREFRONT_SESSION_REFRESH_SECS");
        std::env::remove_var("STOREFRONT_SESSION_FILE");
    }
}

#[test]
fn from_env_uses_defaults() {
    let _guard = env_lock();
    unsafe { clear_storefront_env() };

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg, ClientConfig::default());
    assert_eq!(cfg.timeouts.request_secs, 15);
    assert_eq!(cfg.refresh_period, Duration::from_secs(600));
}

#[test]
fn from_env_parses_overrides() {
    let _guard = env_lock();
    unsafe {
        clear_storefront_env();
        std::env::set_var("STOREFRONT_API_BASE_URL", "https://shop.example.test/api/");
        std::env::set_var("STOREFRONT_REQUEST_TIMEOUT_SECS", "5");
        std::env::set_var("STOREFRONT_CONNECT_TIMEOUT_SECS", "2");
        std::env::set_var("STOREFRONT_SESSION_REFRESH_SECS", "30");
        std::env::set_var("STOREFRONT_SESSION_FILE", "/tmp/session.json");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.api_base_url, "https://shop.example.test/api");
    assert_eq!(cfg.timeouts, Timeouts { request_secs: 5, connect_secs: 2 });
    assert_eq!(cfg.refresh_period, Duration::from_secs(30));
    assert_eq!(cfg.session_file, PathBuf::from("/tmp/session.json"));

    unsafe { clear_storefront_env() };
}

#[test]
fn from_env_ignores_unparseable_numbers() {
    let _guard = env_lock();
    unsafe {
        clear_storefront_env();
        std::env::set_var("STOREFRONT_REQUEST_TIMEOUT_SECS", "soon");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.timeouts.request_secs, DEFAULT_REQUEST_TIMEOUT_SECS);

    unsafe { clear_storefront_env() };
}

#[test]
fn zero_refresh_period_rejected() {
    let err = ClientConfig::new(
        DEFAULT_API_BASE_URL.into(),
        Timeouts::default(),
        Duration::ZERO,
        PathBuf::from(DEFAULT_SESSION_FILE),
    )
    .unwrap_err();
    assert_eq!(err, ConfigError::ZeroRefreshPeriod);
}

#[test]
fn blank_base_url_rejected() {
    let err = ClientConfig::new("  / ".into(), Timeouts::default(), Duration::from_secs(1), PathBuf::new()).unwrap_err();
    assert_eq!(err, ConfigError::EmptyBaseUrl);
}
