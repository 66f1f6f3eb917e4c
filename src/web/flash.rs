//! One-shot flash messages carried in a short-lived cookie and rendered
//! once by the base template.

use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

pub const FLASH_COOKIE: &str = "handshop_flash";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flash {
    pub category: String,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            category: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            category: "error".to_string(),
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            category: "warning".to_string(),
            message: message.into(),
        }
    }
}

// Cookie values cannot carry raw JSON (or non-ASCII messages), so the
// payload is base64 over JSON. Undecodable cookies read as no messages.
fn encode(flashes: &[Flash]) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(flashes).unwrap_or_default())
}

fn decode(value: &str) -> Vec<Flash> {
    URL_SAFE_NO_PAD
        .decode(value)
        .ok()
        .and_then(|raw| serde_json::from_slice(&raw).ok())
        .unwrap_or_default()
}

/// Queue a message for the next rendered page.
pub fn push(jar: CookieJar, flash: Flash) -> CookieJar {
    let mut flashes = jar
        .get(FLASH_COOKIE)
        .map(|c| decode(c.value()))
        .unwrap_or_default();
    flashes.push(flash);
    jar.add(
        Cookie::build((FLASH_COOKIE, encode(&flashes)))
            .path("/")
            .http_only(true)
            .build(),
    )
}

/// Drain pending messages and clear the cookie.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<Flash>) {
    let flashes = jar
        .get(FLASH_COOKIE)
        .map(|c| decode(c.value()))
        .unwrap_or_default();
    let jar = jar.remove(Cookie::build((FLASH_COOKIE, "")).path("/").build());
    (jar, flashes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_take_round_trips() {
        let jar = CookieJar::new();
        let jar = push(jar, Flash::success("登录成功"));
        let jar = push(jar, Flash::warning("完成时间格式无效，已忽略"));

        let (_, flashes) = take(jar);
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0], Flash::success("登录成功"));
        assert_eq!(flashes[1].category, "warning");
    }

    #[test]
    fn take_clears_the_cookie() {
        let jar = push(CookieJar::new(), Flash::error("用户名或密码错误"));
        let (jar, flashes) = take(jar);
        assert_eq!(flashes.len(), 1);

        // A removal cookie remains in the jar, but carries no messages
        let again = jar
            .get(FLASH_COOKIE)
            .map(|c| decode(c.value()))
            .unwrap_or_default();
        assert!(again.is_empty());
    }

    #[test]
    fn garbage_cookie_reads_as_empty() {
        assert!(decode("%%% not base64 %%%").is_empty());
        assert!(decode("").is_empty());
    }
}
