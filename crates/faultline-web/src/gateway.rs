use axum::http::HeaderMap;

pub const UNKNOWN_CLIENT: &str = "unknown";

const RATE_LIMIT_KEY_PREFIX: &str = "error-reporting:";

/// Client address as reported by the proxy in front of the service.
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|raw| raw.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    forwarded
        .or_else(|| {
            header_str(headers, "x-real-ip")
                .map(str::trim)
                .filter(|value| !value.is_empty())
        })
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

pub fn rate_limit_key(client_ip: &str) -> String {
    format!("{RATE_LIMIT_KEY_PREFIX}{client_ip}")
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn first_forwarded_entry_wins() {
        let headers = headers(&[
            ("x-forwarded-for", " 203.0.113.9 , 10.0.0.1"),
            ("x-real-ip", "198.51.100.4"),
        ]);
        assert_eq!(client_ip(&headers), "203.0.113.9");
    }

    #[test]
    fn falls_back_to_real_ip_then_sentinel() {
        assert_eq!(
            client_ip(&headers(&[("x-real-ip", "198.51.100.4")])),
            "198.51.100.4"
        );
        assert_eq!(client_ip(&headers(&[("x-forwarded-for", "  ")])), UNKNOWN_CLIENT);
        assert_eq!(client_ip(&HeaderMap::new()), UNKNOWN_CLIENT);
    }

    #[test]
    fn rate_limit_key_is_namespaced() {
        assert_eq!(rate_limit_key("203.0.113.9"), "error-reporting:203.0.113.9");
    }
}
