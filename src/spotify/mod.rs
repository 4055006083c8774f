//! Spotify Web API access: OAuth tokens, the on-disk token cache and
//! playback dispatch.
//!
//! Every network call goes through [`send_with_retry`]: the client carries
//! an explicit timeout and a request that fails in transport is retried
//! once. HTTP error statuses are not retried.

pub mod api;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod oauth;

pub use api::{Device, PlaybackApi, SpotifyWebApi};
pub use credentials::{AuthPrompt, ConsolePrompt, CredentialCache};
pub use dispatcher::{choose_device, PlaybackDispatcher, PlaybackOutcome};
pub use error::{Result, SpotifyError};
pub use oauth::{now_epoch, AuthClient, OAuthSettings, SpotifyAuth, TokenRecord};

use reqwest::blocking::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::warn;

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Sends the request built by `build`, retrying once on a transport error,
/// and turns non-success statuses into [`SpotifyError::Api`].
pub(crate) fn send_with_retry<F>(build: F) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let response = match build().send() {
        Ok(response) => response,
        Err(e) => {
            warn!("Request failed ({}), retrying once", e);
            build().send()?
        }
    };
    check_status(response)
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(SpotifyError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Pulls the human-readable part out of a Spotify error body. Web API
/// errors look like `{"error": {"message": ..}}`, token endpoint errors
/// like `{"error": "invalid_grant", "error_description": ..}`.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    let error = &value["error"];
    if let Some(message) = error["message"].as_str() {
        return message.to_string();
    }
    if let Some(description) = value["error_description"].as_str() {
        return description.to_string();
    }
    if let Some(code) = error.as_str() {
        return code.to_string();
    }
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves one canned HTTP response per connection, `connections` times.
    fn serve(response: &'static str, connections: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for stream in listener.incoming().take(connections) {
                let mut stream = stream.unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                    line.clear();
                }
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn transport_error_is_retried_exactly_once() {
        let client = build_client(Duration::from_secs(2)).unwrap();
        let calls = Cell::new(0);
        let result = send_with_retry(|| {
            calls.set(calls.get() + 1);
            client.get("http://127.0.0.1:1/")
        });
        assert!(matches!(result, Err(SpotifyError::Http(_))));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn status_error_is_not_retried() {
        let body = "HTTP/1.1 500 Internal Server Error\r\nContent-Type: application/json\r\nContent-Length: 28\r\nConnection: close\r\n\r\n{\"error\":{\"message\":\"boom\"}}";
        let url = serve(body, 1);
        let client = build_client(Duration::from_secs(2)).unwrap();
        let calls = Cell::new(0);
        let result = send_with_retry(|| {
            calls.set(calls.get() + 1);
            client.get(&url)
        });
        match result {
            Err(SpotifyError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected result {:?}", other.map(|r| r.status())),
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn success_passes_through() {
        let url = serve("HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n", 1);
        let client = build_client(Duration::from_secs(2)).unwrap();
        let response = send_with_retry(|| client.get(&url)).unwrap();
        assert_eq!(response.status().as_u16(), 204);
    }

    #[test]
    fn error_message_reads_both_error_shapes() {
        assert_eq!(
            error_message(r#"{"error":{"status":404,"message":"Player command failed: No active device found"}}"#),
            "Player command failed: No active device found"
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Refresh token revoked"}"#),
            "Refresh token revoked"
        );
        assert_eq!(error_message(r#"{"error":"invalid_client"}"#), "invalid_client");
        assert_eq!(error_message("  Bad Gateway \n"), "Bad Gateway");
    }
}
