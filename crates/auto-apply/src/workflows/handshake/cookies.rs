use chrono::{DateTime, NaiveDateTime, Utc};

use crate::workflows::applications::CredentialBlob;

/// Fold one `Set-Cookie` header into the jar. `Max-Age=0` or an `Expires` date
/// at or before `now` deletes the cookie.
pub(crate) fn absorb_set_cookie(jar: &mut CredentialBlob, header: &str, now: DateTime<Utc>) {
    let mut parts = header.split(';');
    let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
        return;
    };

    let name = name.trim();
    if name.is_empty() {
        return;
    }

    let expired = parts.any(|attribute| {
        let Some((key, value)) = attribute.trim().split_once('=') else {
            return false;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.eq_ignore_ascii_case("max-age") {
            value.parse::<i64>().map(|secs| secs <= 0).unwrap_or(false)
        } else if key.eq_ignore_ascii_case("expires") {
            parse_expires(value).is_some_and(|expires| expires <= now)
        } else {
            false
        }
    });

    if expired {
        jar.0.remove(name);
    } else {
        jar.0
            .insert(name.to_string(), value.trim().trim_matches('"').to_string());
    }
}

/// `Wed, 21 Oct 2015 07:28:00 GMT`, or the older dashed `21-Oct-2015` form.
fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(expires) = DateTime::parse_from_rfc2822(value) {
        return Some(expires.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|expires| expires.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn jar() -> CredentialBlob {
        let mut cookies = BTreeMap::new();
        cookies.insert("_session".to_string(), "old".to_string());
        cookies.insert("tracking".to_string(), "1".to_string());
        CredentialBlob(cookies)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 9, 9, 12, 0, 0).unwrap()
    }

    #[test]
    fn set_cookie_replaces_value() {
        let mut jar = jar();
        absorb_set_cookie(&mut jar, "_session=new; path=/; secure; HttpOnly", now());
        assert_eq!(jar.0.get("_session").map(String::as_str), Some("new"));
        assert_eq!(jar.0.len(), 2);
    }

    #[test]
    fn zero_max_age_removes_cookie() {
        let mut jar = jar();
        absorb_set_cookie(&mut jar, "tracking=; Max-Age=0; path=/", now());
        assert!(!jar.0.contains_key("tracking"));
    }

    #[test]
    fn past_expires_removes_cookie() {
        let mut jar = jar();
        absorb_set_cookie(
            &mut jar,
            "tracking=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/",
            now(),
        );
        absorb_set_cookie(
            &mut jar,
            "_session=; expires=Fri, 08-Sep-2023 10:00:00 GMT",
            now(),
        );
        assert!(jar.is_empty());
    }

    #[test]
    fn future_expires_keeps_cookie() {
        let mut jar = jar();
        absorb_set_cookie(
            &mut jar,
            "_session=rotated; Expires=Sat, 09 Sep 2028 12:00:00 GMT; HttpOnly",
            now(),
        );
        assert_eq!(jar.0.get("_session").map(String::as_str), Some("rotated"));
    }

    #[test]
    fn malformed_header_is_ignored() {
        let mut jar = jar();
        absorb_set_cookie(&mut jar, "no-equals-sign", now());
        absorb_set_cookie(&mut jar, "=value", now());
        absorb_set_cookie(&mut jar, "tracking=2; Expires=someday", now());
        let mut expected = self::jar();
        expected.0.insert("tracking".to_string(), "2".to_string());
        assert_eq!(jar, expected);
    }
}
