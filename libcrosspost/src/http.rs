//! Shared HTTP plumbing for the vendor REST APIs
//!
//! Every adapter goes through [`ApiClient`] so that timeouts, the user agent and
//! the mapping of vendor failures onto [`PlatformError`] stay in one place.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::Part;
use reqwest::{Body, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::HttpConfig;
use crate::error::{ContentValidationError, CrosspostError, PlatformError, Result};
use crate::types::{MediaKind, SocialPlatform};

/// Thin wrapper around a configured `reqwest::Client`
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Send a prepared request, mapping transport failures and non-2xx responses
    pub async fn send(
        &self,
        platform: SocialPlatform,
        context: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| map_transport_error(platform, context, e))?;
        check_response(platform, context, response).await
    }

    /// Send a request and decode the JSON body
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        platform: SocialPlatform,
        context: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = self.send(platform, context, request).await?;
        decode_json(platform, context, response).await
    }
}

/// Turn a non-2xx response into a [`PlatformError`] carrying the vendor's text
pub async fn check_response(
    platform: SocialPlatform,
    context: &str,
    response: Response,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(
        platform = %platform,
        context,
        status = status.as_u16(),
        "Vendor request failed"
    );
    Err(map_status(platform, context, status, body).into())
}

fn map_status(
    platform: SocialPlatform,
    context: &str,
    status: StatusCode,
    body: String,
) -> PlatformError {
    let name = platform.display_name();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Authentication(format!(
            "{} rejected the credentials during {} (HTTP {}): {}",
            name,
            context,
            status.as_u16(),
            body
        )),
        StatusCode::TOO_MANY_REQUESTS => PlatformError::RateLimit(format!(
            "{} rate limit exceeded during {}: {}",
            name, context, body
        )),
        _ => PlatformError::Api {
            platform,
            context: context.to_string(),
            status: status.as_u16(),
            body,
        },
    }
}

fn map_transport_error(
    platform: SocialPlatform,
    context: &str,
    error: reqwest::Error,
) -> CrosspostError {
    let kind = if error.is_timeout() {
        "timed out"
    } else if error.is_connect() {
        "could not connect"
    } else {
        "request failed"
    };
    PlatformError::Network(format!(
        "{} {} {}: {}",
        platform.display_name(),
        context,
        kind,
        error
    ))
    .into()
}

/// Decode a JSON body, naming the call that produced it on failure
pub async fn decode_json<T: DeserializeOwned>(
    platform: SocialPlatform,
    context: &str,
    response: Response,
) -> Result<T> {
    let text = read_body(platform, context, response).await?;
    serde_json::from_str(&text).map_err(|e| {
        PlatformError::Posting(format!(
            "{} {} returned an unexpected body ({}): {}",
            platform.display_name(),
            context,
            e,
            text
        ))
        .into()
    })
}

/// Read a response body as text; a dropped connection is a network error
pub async fn read_body(
    platform: SocialPlatform,
    context: &str,
    response: Response,
) -> Result<String> {
    response
        .text()
        .await
        .map_err(|e| map_transport_error(platform, context, e))
}

fn media_error(path: &Path, kind: MediaKind, error: std::io::Error) -> CrosspostError {
    if error.kind() == std::io::ErrorKind::NotFound {
        return ContentValidationError::FileNotFound {
            kind,
            path: path.to_path_buf(),
        }
        .into();
    }
    CrosspostError::InvalidInput(format!("Failed to read {}: {}", path.display(), error))
}

/// Open a media file for upload, returning it with its length in bytes
pub async fn open_media(path: &Path, kind: MediaKind) -> Result<(File, u64)> {
    let file = File::open(path).await.map_err(|e| media_error(path, kind, e))?;
    let metadata = file
        .metadata()
        .await
        .map_err(|e| media_error(path, kind, e))?;
    Ok((file, metadata.len()))
}

/// Request body that streams the file from disk
pub async fn media_body(path: &Path, kind: MediaKind) -> Result<(Body, u64)> {
    let (file, len) = open_media(path, kind).await?;
    Ok((Body::from(file), len))
}

/// Read up to `limit` bytes; a short result means the end of the file
pub async fn read_segment<R>(reader: &mut R, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut segment = Vec::with_capacity(limit);
    reader.take(limit as u64).read_to_end(&mut segment).await?;
    Ok(segment)
}

/// MIME type for an upload, guessed from the file extension
pub fn mime_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// File name component used for multipart uploads
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string()
}

/// Streamed multipart file part with name and MIME type set
pub async fn file_part(path: &Path, kind: MediaKind) -> Result<Part> {
    let (body, len) = media_body(path, kind).await?;
    Part::stream_with_length(body, len)
        .file_name(file_name(path))
        .mime_str(&mime_for(path))
        .map_err(|e| CrosspostError::InvalidInput(format!("Invalid MIME type: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> ApiClient {
        ApiClient::new(&HttpConfig::default()).unwrap()
    }

    #[test]
    fn test_map_status_authentication() {
        let err = map_status(
            SocialPlatform::LinkedIn,
            "userinfo",
            StatusCode::UNAUTHORIZED,
            "expired".to_string(),
        );
        match err {
            PlatformError::Authentication(msg) => {
                assert!(msg.contains("LinkedIn"));
                assert!(msg.contains("userinfo"));
                assert!(msg.contains("expired"));
            }
            other => panic!("Expected Authentication, got {:?}", other),
        }
    }

    #[test]
    fn test_map_status_rate_limit() {
        let err = map_status(
            SocialPlatform::X,
            "status update",
            StatusCode::TOO_MANY_REQUESTS,
            String::new(),
        );
        assert!(matches!(err, PlatformError::RateLimit(_)));
    }

    #[test]
    fn test_map_status_other_keeps_vendor_body() {
        let err = map_status(
            SocialPlatform::Facebook,
            "page feed",
            StatusCode::BAD_REQUEST,
            "{\"error\":{\"message\":\"Invalid OAuth access token\"}}".to_string(),
        );
        match err {
            PlatformError::Api { status, body, .. } => {
                assert_eq!(status, 400);
                assert!(body.contains("Invalid OAuth access token"));
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("a.mp4")), "video/mp4");
        assert_eq!(mime_for(Path::new("a.pdf")), "application/pdf");
        assert_eq!(mime_for(Path::new("a.unknownext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_send_json_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "1"})))
            .mount(&server)
            .await;

        let api = client();
        let value: serde_json::Value = api
            .send_json(
                SocialPlatform::Facebook,
                "page lookup",
                api.inner().get(format!("{}/ok", server.uri())),
            )
            .await
            .unwrap();
        assert_eq!(value["id"], "1");
    }

    #[tokio::test]
    async fn test_send_json_bad_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let api = client();
        let result: Result<serde_json::Value> = api
            .send_json(
                SocialPlatform::YouTube,
                "upload",
                api.inner().get(format!("{}/html", server.uri())),
            )
            .await;
        match result {
            Err(CrosspostError::Platform(PlatformError::Posting(msg))) => {
                assert!(msg.contains("unexpected body"));
                assert!(msg.contains("<html>"));
            }
            other => panic!("Expected Posting error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_connection_refused_is_network_error() {
        let api = client();
        let result = api
            .send(
                SocialPlatform::X,
                "status update",
                api.inner().get("http://127.0.0.1:9/unreachable"),
            )
            .await;
        assert!(matches!(
            result,
            Err(CrosspostError::Platform(PlatformError::Network(_)))
        ));
    }

    #[tokio::test]
    async fn test_open_media_missing_file() {
        let result = open_media(Path::new("/definitely/not/here.png"), MediaKind::Image).await;
        assert!(matches!(
            result,
            Err(CrosspostError::Validation(ContentValidationError::FileNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_open_media_reports_length() {
        let dir = tempfile::TempDir::new().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, vec![7u8; 1500]).unwrap();

        let (_file, len) = open_media(&video, MediaKind::Video).await.unwrap();
        assert_eq!(len, 1500);
    }

    #[tokio::test]
    async fn test_read_segment_splits_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"0123456789").unwrap();

        let (mut file, _) = open_media(&video, MediaKind::Video).await.unwrap();
        assert_eq!(read_segment(&mut file, 4).await.unwrap(), b"0123");
        assert_eq!(read_segment(&mut file, 4).await.unwrap(), b"4567");
        assert_eq!(read_segment(&mut file, 4).await.unwrap(), b"89");
        assert!(read_segment(&mut file, 4).await.unwrap().is_empty());
    }
}
