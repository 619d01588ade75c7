//! Register page fetching.
//!
//! Uses the curl crate (libcurl) on the blocking pool to GET attendance register pages
//! with the operator's session cookies, and scraper to turn the page rows into sessions.

mod client;
pub mod parse;

use anyhow::{Context, Result};
use std::fmt;
use std::future::Future;

use crate::model::Session;
use crate::retry::FetchError;

pub use client::PortalClient;

/// One remote read per (student, course) pair. No retries at this layer.
pub trait SessionFetcher: Send + Sync + 'static {
    fn fetch_sessions(
        &self,
        portal_id: &str,
        course_id: &str,
    ) -> impl Future<Output = Result<Vec<Session>, FetchError>> + Send;
}

/// Portal session cookies. Acquiring them (logging in) is up to the operator.
#[derive(Clone)]
pub struct Credentials {
    moodle_session: String,
    moodle_id: String,
}

impl Credentials {
    pub fn new(moodle_session: impl Into<String>, moodle_id: impl Into<String>) -> Self {
        Self {
            moodle_session: moodle_session.into(),
            moodle_id: moodle_id.into(),
        }
    }

    /// Read `MOODLE_SESSION` and `MOODLEID1_` from the environment.
    pub fn from_env() -> Result<Self> {
        let session = std::env::var("MOODLE_SESSION").context("MOODLE_SESSION is not set")?;
        let id = std::env::var("MOODLEID1_").context("MOODLEID1_ is not set")?;
        if session.trim().is_empty() || id.trim().is_empty() {
            anyhow::bail!("MOODLE_SESSION and MOODLEID1_ must not be empty");
        }
        Ok(Self::new(session.trim(), id.trim()))
    }

    pub fn cookie_header(&self) -> String {
        format!(
            "Cookie: MoodleSession={}; MOODLEID1_={}",
            self.moodle_session, self.moodle_id
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("moodle_session", &"<redacted>")
            .field("moodle_id", &"<redacted>")
            .finish()
    }
}
