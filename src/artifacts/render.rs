//! External rendering seams.
//!
//! Two trait seams describe the external collaborators the generator needs:
//! a templating endpoint that produces message HTML, and a headless
//! renderer that rasterizes a URL into a document file. Production
//! implementations live here; tests substitute mocks.

use std::future::Future;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Fetches a rendered message body from the external templating endpoint.
///
/// # Example (mock for testing)
///
/// ```ignore
/// struct FixedSource(String);
///
/// impl MessageSource for FixedSource {
///     type Error = std::convert::Infallible;
///
///     async fn fetch(&self, _url: &str) -> Result<String, Self::Error> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
pub trait MessageSource {
    /// The error type returned by this source.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches the rendered HTML at `url`.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

/// Rasterizes URLs into document files (fax- and print-ready output).
pub trait DocumentRenderer {
    /// The error type returned by this renderer.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Renders `url` into a document at `target`. Blocking for the
    /// duration of the external call; no timeout or retry is applied.
    fn render(
        &self,
        url: &str,
        target: &Path,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Combines several documents into one printable output.
    fn collate(
        &self,
        inputs: &[PathBuf],
        output: &Path,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Error from the HTTP message source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request failed outright (connection, DNS, ...).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("bad response fetching {url}: {status}")]
    BadStatus {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// `MessageSource` over the external templating endpoint.
#[derive(Debug, Clone, Default)]
pub struct HttpMessageSource {
    client: reqwest::Client,
}

impl HttpMessageSource {
    pub fn new(client: reqwest::Client) -> Self {
        HttpMessageSource { client }
    }
}

impl MessageSource for HttpMessageSource {
    type Error = FetchError;

    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::BadStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Error from the subprocess renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Failed to spawn or wait on the subprocess.
    #[error("renderer subprocess failed: {0}")]
    Io(#[from] std::io::Error),

    /// The subprocess ran but exited non-zero.
    #[error("renderer exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// `DocumentRenderer` that shells out to an external headless renderer
/// (and to ghostscript for collation).
#[derive(Debug, Clone)]
pub struct SubprocessRenderer {
    /// Command line prefix for rendering, e.g. `node scripts/print.js`.
    print_command: String,
}

impl SubprocessRenderer {
    pub fn new(print_command: impl Into<String>) -> Self {
        SubprocessRenderer {
            print_command: print_command.into(),
        }
    }

    async fn run(&self, mut command: tokio::process::Command) -> Result<(), RenderError> {
        debug!(?command, "running renderer subprocess");
        let output = command.output().await?;
        if !output.status.success() {
            return Err(RenderError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

impl DocumentRenderer for SubprocessRenderer {
    type Error = RenderError;

    async fn render(&self, url: &str, target: &Path) -> Result<(), RenderError> {
        let mut parts = self.print_command.split_whitespace();
        let program = parts.next().unwrap_or("false");
        let mut command = tokio::process::Command::new(program);
        command.args(parts).arg(url).arg(target);
        self.run(command).await
    }

    async fn collate(&self, inputs: &[PathBuf], output: &Path) -> Result<(), RenderError> {
        let mut command = tokio::process::Command::new("gs");
        command
            .args(["-q", "-sPAPERSIZE=a4", "-dNOPAUSE", "-dBATCH", "-sDEVICE=pdfwrite"])
            .arg(format!("-sOutputFile={}", output.display()))
            .args(inputs);
        self.run(command).await
    }
}
