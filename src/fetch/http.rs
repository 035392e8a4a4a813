//! Shared HTTP client for all host fetchers.
//!
//! One agent with dial and round-trip timeouts; a timeout cancels only that
//! request (logged as a warning) and never aborts the whole run. An
//! `http_proxy` from the persisted configuration applies to every outbound
//! request.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

const DIAL_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub struct HttpClient {
    agent: ureq::Agent,
}

impl HttpClient {
    pub fn new(proxy: Option<&str>) -> Result<HttpClient> {
        let mut builder = ureq::builder()
            .timeout_connect(DIAL_TIMEOUT)
            .timeout(REQUEST_TIMEOUT);
        if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
            let proxy = ureq::Proxy::new(proxy)
                .map_err(|e| Error::fetch("http proxy", format!("invalid proxy setting: {e}")))?;
            builder = builder.proxy(proxy);
        }
        Ok(HttpClient {
            agent: builder.build(),
        })
    }

    /// Raw request for callers that branch on the status code.
    pub(crate) fn call(&self, url: &str) -> std::result::Result<ureq::Response, ureq::Error> {
        let result = self.agent.get(url).call();
        if let Err(ureq::Error::Transport(t)) = &result {
            println!("{} Request failed for {}: {}", "!".yellow(), url, t);
        }
        result
    }

    fn get(&self, url: &str) -> Result<ureq::Response> {
        self.call(url).map_err(|e| match e {
            ureq::Error::Status(code, _) => Error::fetch(url, format!("status {code}")),
            ureq::Error::Transport(t) => Error::fetch(url, t),
        })
    }

    pub fn get_string(&self, url: &str) -> Result<String> {
        self.get(url)?
            .into_string()
            .map_err(|e| Error::fetch(url, e))
    }

    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_string(url)?;
        serde_json::from_str(&body)
            .map_err(|e| Error::fetch(url, format!("fail to decode response JSON: {e}")))
    }

    /// Streams the response body into `dest`, creating parent directories.
    pub fn get_to_file(&self, url: &str, dest: &Path) -> Result<()> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.blue} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Downloading {url}..."));
        spinner.enable_steady_tick(Duration::from_millis(100));

        let result = self.get(url).and_then(|response| {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(dest)?;
            io::copy(&mut response.into_reader(), &mut file)
                .map_err(|e| Error::fetch(url, e))?;
            Ok(())
        });

        match &result {
            Ok(()) => spinner.finish_and_clear(),
            Err(_) => spinner.finish_with_message(format!("{} Failed {url}", "x".red())),
        }
        result
    }
}
