//! Provider 자격증명.
//!
//! Provider 이름 → API 키 매핑입니다. 키는 `SecretString`으로 보관되어
//! `Debug` 출력이나 로그에 노출되지 않습니다.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

/// Provider별 API 키 모음.
#[derive(Debug, Default)]
pub struct Credentials {
    keys: HashMap<String, SecretString>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// 환경변수에서 로드.
    ///
    /// Provider 이름 `alpha_vantage`는 `ALPHA_VANTAGE_API_KEY`로 조회합니다.
    /// 비어 있는 값은 없는 것으로 취급합니다.
    pub fn from_env<'a>(providers: impl IntoIterator<Item = &'a str>) -> Self {
        Self::from_lookup(providers, |key| std::env::var(key).ok())
    }

    /// 임의의 조회 함수로 로드 (테스트용).
    pub fn from_lookup<'a, F>(providers: impl IntoIterator<Item = &'a str>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut credentials = Self::new();
        for provider in providers {
            if let Some(value) = lookup(&env_key(provider)) {
                let value = value.trim();
                if !value.is_empty() {
                    credentials.insert(provider, value);
                }
            }
        }
        credentials
    }

    pub fn insert(&mut self, provider: &str, key: &str) {
        self.keys
            .insert(provider.to_string(), SecretString::from(key.to_string()));
    }

    pub fn with(mut self, provider: &str, key: &str) -> Self {
        self.insert(provider, key);
        self
    }

    pub fn get(&self, provider: &str) -> Option<&SecretString> {
        self.keys.get(provider)
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.keys.contains_key(provider)
    }

    /// 키 값을 꺼내는 헬퍼. 요청 URL을 만들 때만 사용합니다.
    pub fn expose(&self, provider: &str) -> Option<&str> {
        self.keys.get(provider).map(|s| s.expose_secret())
    }

    /// 키가 설정된 Provider 이름 (정렬됨).
    pub fn providers(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.keys.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Provider 이름에 대응하는 환경변수 이름.
pub fn env_key(provider: &str) -> String {
    format!("{}_API_KEY", provider.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_key() {
        assert_eq!(env_key("alpha_vantage"), "ALPHA_VANTAGE_API_KEY");
        assert_eq!(env_key("finnhub"), "FINNHUB_API_KEY");
    }

    #[test]
    fn test_from_lookup_skips_blank_values() {
        let credentials = Credentials::from_lookup(
            ["alpha_vantage", "finnhub", "yahoo_finance"],
            |key| match key {
                "ALPHA_VANTAGE_API_KEY" => Some("demo".to_string()),
                "FINNHUB_API_KEY" => Some("   ".to_string()),
                _ => None,
            },
        );

        assert_eq!(credentials.providers(), vec!["alpha_vantage"]);
        assert_eq!(credentials.expose("alpha_vantage"), Some("demo"));
        assert!(!credentials.contains("finnhub"));
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let credentials = Credentials::new().with("finnhub", "super-secret-token");
        let debug = format!("{:?}", credentials);
        assert!(!debug.contains("super-secret-token"));
    }
}
