//! Minimal HTTP/1.1 server that impersonates the portal's attendance register pages.
//!
//! Routes on the query of `/mod/attendanceregister/view.php`:
//! `a=C&userid=U` serves the register of U in course C, `a=C&action=recalc` answers a
//! recalculation, and `a=C` alone serves the course overview. Requests without the
//! expected session cookie get a login page. Stalled registers answer only after a delay.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const SESSION: &str = "test-session";

type Pair = (String, String);

#[derive(Debug, Default, Clone)]
pub struct Portal {
    registers: HashMap<Pair, String>,
    overviews: HashMap<String, String>,
    /// Remaining 503 responses per (course, user).
    unavailable: HashMap<Pair, u32>,
    /// Delay before every register response for (course, user).
    stalled: HashMap<Pair, Duration>,
    failing_recalc: HashSet<String>,
}

impl Portal {
    /// Register rows as `(start, end, duration)` cell text.
    pub fn register(mut self, course: &str, user: &str, rows: &[(&str, &str, &str)]) -> Self {
        let mut html = String::from("<html><body><table class=\"generaltable\">");
        html.push_str("<tr class=\"attendanceregister_evenrow\"><th>#</th><th>Start</th></tr>");
        for (i, (start, end, dur)) in rows.iter().enumerate() {
            let class = if i % 2 == 0 {
                "attendanceregister_oddrow"
            } else {
                "attendanceregister_evenrow"
            };
            html.push_str(&format!(
                "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                class,
                i + 1,
                start,
                end,
                dur
            ));
        }
        html.push_str("</table></body></html>");
        self.registers
            .insert((course.to_string(), user.to_string()), html);
        self
    }

    /// Overview listing `(link text, userid)` entries.
    pub fn overview(mut self, course: &str, entries: &[(&str, &str)]) -> Self {
        let mut html = String::from("<html><body><table>");
        for (i, (text, user)) in entries.iter().enumerate() {
            let class = if i % 2 == 0 {
                "attendanceregister_oddrow"
            } else {
                "attendanceregister_evenrow"
            };
            html.push_str(&format!(
                "<tr class=\"{}\"><td><a href=\"view.php?a={}&amp;userid={}\">{}</a></td></tr>",
                class, course, user, text
            ));
        }
        html.push_str("</table></body></html>");
        self.overviews.insert(course.to_string(), html);
        self
    }

    /// Answer the next `times` register requests for (course, user) with 503.
    pub fn unavailable(mut self, course: &str, user: &str, times: u32) -> Self {
        self.unavailable
            .insert((course.to_string(), user.to_string()), times);
        self
    }

    /// Hold every register request for (course, user) for `delay` before answering.
    pub fn stalled(mut self, course: &str, user: &str, delay: Duration) -> Self {
        self.stalled
            .insert((course.to_string(), user.to_string()), delay);
        self
    }

    pub fn failing_recalc(mut self, course: &str) -> Self {
        self.failing_recalc.insert(course.to_string());
        self
    }
}

/// Running server: base URL plus the request targets it has seen.
pub struct PortalHandle {
    pub base_url: String,
    hits: Arc<Mutex<Vec<String>>>,
}

impl PortalHandle {
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn count_hits(&self, needle: &str) -> usize {
        self.hits().iter().filter(|h| h.contains(needle)).count()
    }
}

/// Starts the server in a background thread. It runs until the process exits.
pub fn start(portal: Portal) -> PortalHandle {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let portal = Arc::new(Mutex::new(portal));
    let hits = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let portal = Arc::clone(&portal);
            let seen = Arc::clone(&seen);
            thread::spawn(move || handle(stream, &portal, &seen));
        }
    });
    PortalHandle {
        base_url: format!("http://127.0.0.1:{}/", port),
        hits,
    }
}

fn handle(mut stream: std::net::TcpStream, portal: &Mutex<Portal>, hits: &Mutex<Vec<String>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (target, cookie) = parse_request(request);
    hits.lock().unwrap().push(target.to_string());

    // Sleep outside the lock so other connections keep being served.
    let stall = register_pair(target)
        .and_then(|pair| portal.lock().unwrap().stalled.get(&pair).copied());
    if let Some(delay) = stall {
        thread::sleep(delay);
    }

    let (status, body) = route(target, cookie, &mut portal.lock().unwrap());
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(body.as_bytes());
}

fn route(target: &str, cookie: &str, portal: &mut Portal) -> (&'static str, String) {
    let Ok(url) = url::Url::parse(&format!("http://localhost{}", target)) else {
        return ("400 Bad Request", String::new());
    };
    if url.path() != "/mod/attendanceregister/view.php" {
        return ("404 Not Found", String::new());
    }
    if !cookie.contains(&format!("MoodleSession={}", SESSION)) {
        let login = r#"<html><body><form id="login" action="/login/index.php"><input name="username"></form></body></html>"#;
        return ("200 OK", login.to_string());
    }

    let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
    let Some(course) = query.get("a").cloned() else {
        return ("400 Bad Request", String::new());
    };

    if query.get("action").map(String::as_str) == Some("recalc") {
        let body = if portal.failing_recalc.contains(&course) {
            r#"<div class="alert alert-danger">Register could not be recalculated</div>"#.to_string()
        } else {
            format!(
                r#"<div class="alert alert-success">Register {} recalculated</div>"#,
                course
            )
        };
        return ("200 OK", body);
    }

    if let Some(user) = query.get("userid").cloned() {
        let pair = (course, user);
        if let Some(left) = portal.unavailable.get_mut(&pair) {
            if *left > 0 {
                *left -= 1;
                return ("503 Service Unavailable", String::new());
            }
        }
        let body = portal
            .registers
            .get(&pair)
            .cloned()
            .unwrap_or_else(|| "<html><body><table></table></body></html>".to_string());
        return ("200 OK", body);
    }

    match portal.overviews.get(&course) {
        Some(html) => ("200 OK", html.clone()),
        None => ("404 Not Found", String::new()),
    }
}

/// (course, user) of a per-student register request.
fn register_pair(target: &str) -> Option<Pair> {
    let url = url::Url::parse(&format!("http://localhost{}", target)).ok()?;
    let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
    Some((query.get("a")?.clone(), query.get("userid")?.clone()))
}

/// Returns (request target, Cookie header value).
fn parse_request(request: &str) -> (&str, &str) {
    let mut target = "";
    let mut cookie = "";
    for (i, line) in request.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if i == 0 {
            target = line.split_whitespace().nth(1).unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("cookie") {
                cookie = value.trim();
            }
        }
    }
    (target, cookie)
}
