use crate::cookie::CookieJar;
use crate::flash::FlashQueue;
use crate::status::{mime, Status};
use chrono::{DateTime, Utc};

/// A response in the making: the template text and everything the serving layer sends with it.
///
/// Until a render succeeds, `body` is the template itself. A failed render leaves the body as it
/// was and sets the status to `500 Internal Server Error`.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    file_name: String,
    html: String,
    status: Status,
    content_type: String,
    encoding: String,
    location: Option<String>,
    cookies: CookieJar,
    flashes: FlashQueue,
}

impl Page {
    /// Creates a page from template text that does not come from a file.
    ///
    /// # Examples
    ///
    /// ```
    /// let page = stencil::Page::new("<p>{{ name }}</p>");
    ///
    /// assert_eq!(page.body(), "<p>{{ name }}</p>");
    /// assert_eq!(page.status_line(), "HTTP/1.1 200 OK\r\n");
    /// assert_eq!(page.content_type(), "text/html");
    /// assert_eq!(page.encoding(), "utf-8");
    /// ```
    pub fn new(html: impl Into<String>) -> Self {
        Page {
            file_name: "<inline>".to_string(),
            html: html.into(),
            status: Status::Ok,
            content_type: mime::HTML.to_string(),
            encoding: "utf-8".to_string(),
            location: None,
            cookies: CookieJar::new(),
            flashes: FlashQueue::new(),
        }
    }

    /// Sets the file name reported by render errors.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn body(&self) -> &str {
        &self.html
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn status_line(&self) -> String {
        self.status.line()
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = content_type.into();
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn set_encoding(&mut self, encoding: impl Into<String>) {
        self.encoding = encoding.into();
    }

    pub fn redirect_location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Turns the page into a redirect to `location`.
    ///
    /// Any status is stored; use [`Status::is_redirect`] to check that browsers will follow it.
    pub fn redirect(&mut self, location: impl Into<String>, status: Status) {
        self.location = Some(location.into());
        self.status = status;
    }

    /// Queues a message for the next `get_flashed_messages` loop.
    pub fn flash(&mut self, message: impl Into<String>, category: impl Into<String>) {
        self.flashes.push(message, category);
    }

    pub fn flashes(&self) -> &FlashQueue {
        &self.flashes
    }

    /// Sets a cookie. A `max_age` of 0 makes a session cookie.
    pub fn set_cookie(&mut self, name: &str, value: &str, max_age: u32, http_only: bool) {
        self.cookies.set(name, value, max_age, http_only);
    }

    pub fn cookie_value(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|cookie| cookie.value.as_str())
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// One `Set-Cookie` line per cookie, in the order they were first set.
    pub fn cookie_headers(&self) -> String {
        self.cookies.headers()
    }

    pub fn cookie_headers_at(&self, now: DateTime<Utc>) -> String {
        self.cookies.headers_at(now)
    }

    // Stores the result of a successful render.
    pub(crate) fn commit(&mut self, html: String, flashes: FlashQueue) {
        self.html = html;
        self.flashes = flashes;
    }

    pub(crate) fn fail(&mut self) {
        self.status = Status::InternalServerError;
    }
}

#[test]
fn page_defaults() {
    let page = Page::new("x");
    assert_eq!(page.file_name(), "<inline>");
    assert_eq!(page.status(), Status::Ok);
    assert_eq!(page.redirect_location(), None);
    assert_eq!(page.cookie_headers(), "");
    assert!(page.flashes().is_empty());

    let page = page.with_file_name("index.html");
    assert_eq!(page.file_name(), "index.html");
}

#[test]
fn page_headers() {
    let mut page = Page::new("");
    page.set_content_type(mime::JSON);
    page.set_encoding("ascii");
    page.set_cookie("sid", "abc", 0, true);
    page.set_cookie("lang", "en", 0, false);

    assert_eq!(page.content_type(), "application/json");
    assert_eq!(page.encoding(), "ascii");
    assert_eq!(page.cookie_value("sid"), Some("abc"));
    assert_eq!(page.cookie_value("nope"), None);
    assert_eq!(
        page.cookie_headers(),
        "Set-Cookie: sid=abc; HttpOnly; Path=/\r\nSet-Cookie: lang=en; Path=/\r\n"
    );
}

#[test]
fn page_redirect() {
    let mut page = Page::new("");
    page.redirect("/login", Status::SeeOther);
    assert_eq!(page.redirect_location(), Some("/login"));
    assert_eq!(page.status_line(), "HTTP/1.1 303 See Other\r\n");

    page.redirect("/home", Status::Ok);
    assert_eq!(page.redirect_location(), Some("/home"));
    assert!(!page.status().is_redirect());
}

#[test]
fn page_commit_and_fail() {
    let mut page = Page::new("{{ x }}");
    page.flash("hi", "info");

    page.fail();
    assert_eq!(page.status(), Status::InternalServerError);
    assert_eq!(page.body(), "{{ x }}");

    page.commit("1".to_string(), FlashQueue::new());
    assert_eq!(page.body(), "1");
    assert!(page.flashes().is_empty());
}
