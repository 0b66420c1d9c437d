//! Browser Authorization Prompt with a Loopback Redirect Listener
//!
//! Opens the system browser on the provider's authorization page and listens
//! on the loopback address named by the redirect URI for the provider's
//! redirect back. The first request to the redirect path carrying either a
//! `code` or an `error` parameter settles the prompt.

use async_trait::async_trait;
use bridge_traits::{
    authorization::{AuthorizationOutcome, AuthorizationPrompt},
    error::{BridgeError, Result},
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};
use url::Url;

const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// How long a connection may take to send its request line.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS_PAGE: &str = "<html><body><h3>Signed in.</h3>\
    <p>You can close this tab and return to the application.</p></body></html>";
const CANCELLED_PAGE: &str = "<html><body><h3>Sign-in cancelled.</h3>\
    <p>You can close this tab.</p></body></html>";

pub struct LoopbackBrowserPrompt {
    redirect_uri: String,
    bind_host: String,
    port: u16,
    callback_path: String,
}

impl LoopbackBrowserPrompt {
    /// Create a prompt for a loopback redirect URI such as
    /// `http://127.0.0.1:53682/callback`.
    pub fn new(redirect_uri: impl Into<String>) -> Result<Self> {
        let redirect_uri = redirect_uri.into();
        let url = Url::parse(&redirect_uri).map_err(|e| {
            BridgeError::NotAvailable(format!("Invalid redirect URI '{}': {}", redirect_uri, e))
        })?;

        let host = url.host_str().unwrap_or("127.0.0.1");
        let bind_host = if host.eq_ignore_ascii_case("localhost") {
            "127.0.0.1".to_string()
        } else {
            host.to_string()
        };
        let port = url.port_or_known_default().ok_or_else(|| {
            BridgeError::NotAvailable(format!("Redirect URI '{}' has no port", redirect_uri))
        })?;

        Ok(Self {
            callback_path: url.path().to_string(),
            redirect_uri,
            bind_host,
            port,
        })
    }

    async fn read_request_target(stream: &mut TcpStream) -> Result<Option<String>> {
        let mut buffer = Vec::with_capacity(1024);
        let mut chunk = [0u8; 1024];

        loop {
            let read = stream.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= MAX_REQUEST_HEAD {
                break;
            }
        }

        let head = String::from_utf8_lossy(&buffer);
        let request_line = head.lines().next().unwrap_or_default();
        let mut parts = request_line.split_whitespace();

        match (parts.next(), parts.next()) {
            (Some("GET"), Some(target)) => Ok(Some(target.to_string())),
            _ => Ok(None),
        }
    }

    async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> Result<()> {
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

/// Interpret a redirect request target (`/callback?code=...&state=...`).
///
/// Returns `None` for requests that do not settle the prompt (other paths,
/// or the redirect path without `code`/`error`).
fn parse_callback(target: &str, callback_path: &str) -> Option<AuthorizationOutcome> {
    let url = Url::parse(&format!("http://localhost{}", target)).ok()?;
    if url.path() != callback_path {
        return None;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        debug!(error = %error, "Provider redirected with an error");
        return Some(AuthorizationOutcome::Cancelled);
    }

    code.filter(|c| !c.is_empty())
        .map(|code| AuthorizationOutcome::Code {
            code,
            state: state.unwrap_or_default(),
        })
}

#[async_trait]
impl AuthorizationPrompt for LoopbackBrowserPrompt {
    fn redirect_uri(&self) -> String {
        self.redirect_uri.clone()
    }

    async fn authorize(&self, authorization_url: &str) -> Result<AuthorizationOutcome> {
        let listener = TcpListener::bind((self.bind_host.as_str(), self.port))
            .await
            .map_err(|e| {
                BridgeError::NotAvailable(format!(
                    "Failed to bind redirect listener on {}:{}: {}",
                    self.bind_host, self.port, e
                ))
            })?;

        info!("Opening browser for authorization");
        webbrowser::open(authorization_url)
            .map_err(|e| BridgeError::NotAvailable(format!("Failed to open browser: {}", e)))?;

        self.wait_for_redirect(listener).await
    }
}

impl LoopbackBrowserPrompt {
    /// Accept connections until one settles the prompt.
    ///
    /// Each connection is served on its own task, so an idle socket (browsers
    /// preconnect speculatively) never holds up the real redirect.
    async fn wait_for_redirect(&self, listener: TcpListener) -> Result<AuthorizationOutcome> {
        let (outcome_tx, mut outcome_rx) = mpsc::channel(1);

        loop {
            tokio::select! {
                Some(outcome) = outcome_rx.recv() => return Ok(outcome),
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!(%peer, "Accepted redirect connection");
                    tokio::spawn(serve_connection(
                        stream,
                        self.callback_path.clone(),
                        outcome_tx.clone(),
                    ));
                }
            }
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    callback_path: String,
    outcome_tx: mpsc::Sender<AuthorizationOutcome>,
) {
    let target = match timeout(
        REQUEST_READ_TIMEOUT,
        LoopbackBrowserPrompt::read_request_target(&mut stream),
    )
    .await
    {
        Ok(Ok(Some(target))) => target,
        Ok(Ok(None)) => return,
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to read redirect request");
            return;
        }
        Err(_) => {
            debug!("Dropping idle redirect connection");
            return;
        }
    };

    match parse_callback(&target, &callback_path) {
        Some(outcome) => {
            let page = match outcome {
                AuthorizationOutcome::Code { .. } => SUCCESS_PAGE,
                AuthorizationOutcome::Cancelled => CANCELLED_PAGE,
            };
            if let Err(e) = LoopbackBrowserPrompt::respond(&mut stream, "200 OK", page).await {
                warn!(error = %e, "Failed to answer redirect request");
            }
            // Only the first settling request is consumed.
            let _ = outcome_tx.try_send(outcome);
        }
        None => {
            let _ = LoopbackBrowserPrompt::respond(&mut stream, "404 Not Found", "").await;
        }
    }
}
