use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use indexmap::IndexMap;

const YEAR: u32 = 365 * 24 * 60 * 60;
const MONTH: u32 = 31 * 24 * 60 * 60;
const DAY: u32 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    pub value: String,
    /// Lifetime in seconds; 0 makes it a session cookie.
    pub max_age: u32,
    pub http_only: bool,
}

/// Cookies to be set by a response, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieJar {
    cookies: IndexMap<String, Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        CookieJar::default()
    }

    /// Adds a cookie. Setting an existing name replaces it but keeps its position.
    pub fn set(&mut self, name: &str, value: &str, max_age: u32, http_only: bool) {
        self.cookies.insert(
            name.to_string(),
            Cookie {
                value: value.to_string(),
                max_age,
                http_only,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.get(name)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// `Set-Cookie` header lines for every cookie, each ending with `\r\n`.
    pub fn headers(&self) -> String {
        self.headers_at(Utc::now())
    }

    /// Same as `headers`, with expiry dates computed from `now`.
    pub fn headers_at(&self, now: DateTime<Utc>) -> String {
        let mut headers = String::new();

        for (name, cookie) in &self.cookies {
            let mut header = format!("Set-Cookie: {}={}", name, cookie.value);

            if cookie.max_age > 0 {
                header.push_str(&format!(
                    "; Expires={}; Max-Age={}",
                    expires_at(now, cookie.max_age).format("%a, %d %b %Y %H:%M:%S GMT"),
                    cookie.max_age
                ));
            }

            if cookie.http_only {
                header.push_str("; HttpOnly");
            }
            header.push_str("; Path=/");

            // A NUL would end the header early on the wire.
            if let Some(nul) = header.find('\0') {
                header.truncate(nul);
            }

            header.push_str("\r\n");
            headers.push_str(&header);
        }

        headers
    }
}

/// Adds `max_age` seconds to `now` as calendar fields: whole years of 365 days and months of 31
/// days are added to the year and month, the rest to the day and the clock. Overflowing fields
/// roll over into the next larger one.
pub fn expires_at(now: DateTime<Utc>, max_age: u32) -> DateTime<Utc> {
    let years = max_age / YEAR;
    let months = (max_age % YEAR) / MONTH;
    let rest = max_age % YEAR % MONTH;
    let days = rest / DAY;
    let seconds = rest % DAY;

    let total_months =
        (now.year() as i64 + years as i64) * 12 + now.month0() as i64 + months as i64;
    let year = total_months.div_euclid(12) as i32;
    let month = total_months.rem_euclid(12) as u32 + 1;

    let first_of_month = match NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        Some(midnight) => midnight,
        None => return now + Duration::seconds(max_age as i64),
    };

    let clock = now.num_seconds_from_midnight() as i64 + seconds as i64;
    let expires = first_of_month
        + Duration::days(now.day0() as i64 + days as i64)
        + Duration::seconds(clock);

    Utc.from_utc_datetime(&expires)
}

#[cfg(test)]
fn at(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
}

#[test]
fn session_cookie() {
    let mut jar = CookieJar::new();
    jar.set("sid", "abc", 0, true);
    assert_eq!(jar.headers(), "Set-Cookie: sid=abc; HttpOnly; Path=/\r\n");
}

#[test]
fn insertion_order_and_overwrite() {
    let mut jar = CookieJar::new();
    jar.set("b", "1", 0, false);
    jar.set("a", "2", 0, false);
    jar.set("b", "3", 0, true);

    assert_eq!(jar.len(), 2);
    assert_eq!(jar.get("b").unwrap().value, "3");
    assert_eq!(
        jar.headers(),
        "Set-Cookie: b=3; HttpOnly; Path=/\r\nSet-Cookie: a=2; Path=/\r\n"
    );
}

#[test]
fn expiring_cookie() {
    let mut jar = CookieJar::new();
    jar.set("theme", "dark", 90061, false);

    assert_eq!(
        jar.headers_at(at("2024-01-31T10:00:00Z")),
        "Set-Cookie: theme=dark; Expires=Thu, 01 Feb 2024 11:01:01 GMT; Max-Age=90061; Path=/\r\n"
    );
}

#[test]
fn expiry_uses_calendar_months() {
    // One 31 day month from January 31st lands on "February 31st", i.e. March 2nd in 2024.
    assert_eq!(
        expires_at(at("2024-01-31T10:00:00Z"), MONTH),
        at("2024-03-02T10:00:00Z")
    );
    assert_eq!(
        expires_at(at("2023-12-15T23:59:59Z"), YEAR + 2),
        at("2024-12-16T00:00:01Z")
    );
    assert_eq!(
        expires_at(at("2024-11-20T00:00:00Z"), 2 * MONTH),
        at("2025-01-20T00:00:00Z")
    );
}

#[test]
fn nul_truncates_header() {
    let mut jar = CookieJar::new();
    jar.set("a", "x\0y", 0, true);
    assert_eq!(jar.headers(), "Set-Cookie: a=x\r\n");
}
