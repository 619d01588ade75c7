//! Blocking curl GET wrapped for async callers.

use anyhow::{Context, Result};
use std::time::Duration;
use url::Url;

use crate::model::{Session, Student};
use crate::retry::{classify_curl_error, classify_http_status, ErrorKind, FetchError};

use super::parse;
use super::{Credentials, SessionFetcher};

const REGISTER_PATH: &str = "mod/attendanceregister/view.php";

/// HTTP client for the portal's attendance register pages.
#[derive(Debug, Clone)]
pub struct PortalClient {
    base: Url,
    credentials: Credentials,
    timeout: Duration,
}

impl PortalClient {
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).with_context(|| format!("invalid base URL: {}", base_url))?;
        Ok(Self {
            base,
            credentials,
            timeout,
        })
    }

    /// Same client with a different per-request timeout (recalculation is slow).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `{base}/mod/attendanceregister/view.php?{params}`.
    pub fn register_url(&self, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base.join(REGISTER_PATH).context("build register URL")?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    /// GET `url` and return the body of a 2xx response.
    pub async fn get_page(&self, url: Url) -> Result<String, FetchError> {
        let cookie = self.credentials.cookie_header();
        let timeout = self.timeout;
        let target = url.to_string();
        let res = tokio::task::spawn_blocking(move || get_blocking(&target, &cookie, timeout))
            .await
            .map_err(|e| FetchError::from_kind(ErrorKind::Other, format!("fetch task: {}", e)))?;

        let (code, body) = res.map_err(|e| {
            FetchError::from_kind(classify_curl_error(&e), format!("GET {}: {}", url, e))
        })?;
        let body = String::from_utf8_lossy(&body).into_owned();
        if !(200..300).contains(&code) {
            let detail = parse::alert_text(&body, "alert-danger")
                .map(|t| format!(": {}", t))
                .unwrap_or_default();
            return Err(FetchError::from_kind(
                classify_http_status(code),
                format!("GET {} returned HTTP {}{}", url, code, detail),
            ));
        }
        Ok(body)
    }

    /// Ask the portal to recalculate one register (`action=recalc`).
    /// Returns the portal's success banner, if any. An error banner is a permanent failure.
    pub async fn recalc(&self, course_id: &str) -> Result<Option<String>, FetchError> {
        let url = self
            .register_url(&[("a", course_id), ("action", "recalc")])
            .map_err(|e| FetchError::from_kind(ErrorKind::Other, e.to_string()))?;
        let body = self.get_page(url).await?;
        if let Some(msg) = parse::alert_text(&body, "alert-danger") {
            return Err(FetchError::from_kind(ErrorKind::Other, msg));
        }
        Ok(parse::alert_text(&body, "alert-success"))
    }

    /// Read the register overview of one course and list the students it links to.
    pub async fn discover_students(&self, course_id: &str) -> Result<Vec<Student>, FetchError> {
        let url = self
            .register_url(&[("a", course_id)])
            .map_err(|e| FetchError::from_kind(ErrorKind::Other, e.to_string()))?;
        let body = self.get_page(url).await?;
        Ok(parse::parse_roster(&body))
    }
}

impl SessionFetcher for PortalClient {
    async fn fetch_sessions(
        &self,
        portal_id: &str,
        course_id: &str,
    ) -> Result<Vec<Session>, FetchError> {
        let url = self
            .register_url(&[("a", course_id), ("userid", portal_id)])
            .map_err(|e| FetchError::from_kind(ErrorKind::Other, e.to_string()))?;
        let body = self.get_page(url).await?;
        parse::parse_sessions(&body)
    }
}

/// Runs in the current thread; call from `spawn_blocking`.
fn get_blocking(url: &str, cookie: &str, timeout: Duration) -> Result<(u32, Vec<u8>), curl::Error> {
    let mut body = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(timeout.min(Duration::from_secs(15)))?;
    easy.timeout(timeout)?;

    let mut list = curl::easy::List::new();
    list.append(cookie)?;
    easy.http_headers(list)?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    Ok((code, body))
}
