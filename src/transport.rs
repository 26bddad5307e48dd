use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::error::ScrapeError;

/// Issues requests against the portal and hands back the body text.
///
/// Every call is a single attempt; callers decide what a failure means.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, ScrapeError>;

    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<String, ScrapeError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        // Postback tokens are only honoured within the session that issued them
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    async fn read_body(url: &str, response: reqwest::Response) -> Result<String, ScrapeError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| ScrapeError::Transport {
            url: url.to_string(),
            source,
        })?;
        debug!(url = %url, bytes = body.len(), "Received response body");
        Ok(body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ScrapeError::Transport {
                url: url.to_string(),
                source,
            })?;

        Self::read_body(url, response).await
    }

    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<String, ScrapeError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|source| ScrapeError::Transport {
                url: url.to_string(),
                source,
            })?;

        Self::read_body(url, response).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    use super::*;
    use crate::form_state::tests::landing_page;
    use crate::form_state::FormState;

    fn response(status: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n{extra_headers}\r\n{body}",
            body.len()
        )
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Serve one canned response per connection and hand back each raw request.
    async fn serve(responses: Vec<String>) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/CourseOffering", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for response in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let request = read_request(&mut stream).await;
                tx.send(request).unwrap();
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
        });

        (url, rx)
    }

    fn transport() -> HttpTransport {
        HttpTransport::new("offerings-test", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_session_cookie_and_form_carry_into_postback() {
        let landing = landing_page(&["202410"], &["ICS"]);
        let (url, mut requests) = serve(vec![
            response(
                "200 OK",
                "Set-Cookie: ASP.NET_SessionId=x; path=/; HttpOnly\r\n",
                &landing,
            ),
            response("200 OK", "", "<html><body></body></html>"),
        ])
        .await;
        let transport = transport();

        let state = FormState::load(&transport, &url, 3).await.unwrap();
        let body = transport
            .post_form(&url, &state.postback_payload("202410", "ICS"))
            .await
            .unwrap();
        assert!(body.contains("<body>"));

        let get = requests.recv().await.unwrap();
        assert!(get.starts_with("GET /CourseOffering"));
        assert!(!get.to_ascii_lowercase().contains("cookie:"));

        let post = requests.recv().await.unwrap();
        let lowered = post.to_ascii_lowercase();
        assert!(post.starts_with("POST /CourseOffering"));
        assert!(lowered.contains("cookie: asp.net_sessionid=x"));
        assert!(lowered.contains("content-type: application/x-www-form-urlencoded"));

        let (_, form) = post.split_once("\r\n\r\n").unwrap();
        assert_eq!(
            form,
            "__VIEWSTATE=vs%2Babc%2F%3D&__VIEWSTATEGENERATOR=C1D2&__EVENTVALIDATION=ev123\
             &ctl00%24CntntPlcHldr%24ddlTerm=202410&ctl00%24CntntPlcHldr%24ddlDept=ICS"
        );
    }

    #[tokio::test]
    async fn test_server_error_is_a_transport_failure() {
        let (url, _requests) = serve(vec![response(
            "500 Internal Server Error",
            "",
            "Runtime Error",
        )])
        .await;

        let err = transport().get(&url).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Status { status: 500, .. }));
        assert!(err.is_transport());
        assert!(err.to_string().contains("HTTP 500"));
    }
}
