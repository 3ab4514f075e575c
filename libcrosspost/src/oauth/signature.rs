//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! Used by the X helper for the request/access token legs and by the X
//! publisher for every API call. Parameters are percent-encoded per RFC 3986,
//! sorted by key then value, and joined into the signature base string.

use base64::Engine;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;

use crate::error::{PlatformError, Result};

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 percent-encoding (unreserved characters pass through)
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Consumer credentials plus an optional token
#[derive(Clone)]
pub struct OAuth1Signer {
    consumer_key: String,
    consumer_secret: String,
    token: Option<String>,
    token_secret: Option<String>,
}

impl std::fmt::Debug for OAuth1Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth1Signer")
            .field("consumer_key", &self.consumer_key)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl OAuth1Signer {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            token: None,
            token_secret: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, token_secret: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self.token_secret = Some(token_secret.into());
        self
    }

    /// Build the `Authorization` header for a request
    ///
    /// `url` must not carry a query string; pass query and form parameters in
    /// `params` so they are covered by the signature. `oauth_extra` holds
    /// protocol parameters such as `oauth_callback` or `oauth_verifier`.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        oauth_extra: &[(&str, &str)],
    ) -> Result<String> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_header_with(method, url, params, oauth_extra, &nonce, &timestamp)
    }

    fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        oauth_extra: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String> {
        let mut oauth_params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some(token) = &self.token {
            oauth_params.push(("oauth_token".to_string(), token.clone()));
        }
        for (key, value) in oauth_extra {
            oauth_params.push((key.to_string(), value.to_string()));
        }

        let mut all: Vec<(String, String)> = oauth_params.clone();
        all.extend(params.iter().cloned());

        let base = signature_base_string(method, url, &all);
        let signature = sign(
            &base,
            &self.consumer_secret,
            self.token_secret.as_deref().unwrap_or(""),
        )?;
        oauth_params.push(("oauth_signature".to_string(), signature));
        oauth_params.sort();

        let header = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {}", header))
    }
}

/// `METHOD&encoded(url)&encoded(sorted params)`
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&param_string)
    )
}

/// HMAC-SHA1 over the base string, base64 encoded
pub fn sign(base_string: &str, consumer_secret: &str, token_secret: &str) -> Result<String> {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| PlatformError::Authentication(format!("Invalid signing key: {}", e)))?;
    mac.update(base_string.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Worked example from the Twitter developer documentation on creating signatures
    const CONSUMER_KEY: &str = "xvz1evFS4wEEPTGEFPHBog";
    const CONSUMER_SECRET: &str = "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw";
    const TOKEN: &str = "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb";
    const TOKEN_SECRET: &str = "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE";
    const NONCE: &str = "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg";
    const TIMESTAMP: &str = "1318622958";
    const URL: &str = "https://api.twitter.com/1.1/statuses/update.json";

    fn request_params() -> Vec<(String, String)> {
        vec![
            (
                "status".to_string(),
                "Hello Ladies + Gentlemen, a signed OAuth request!".to_string(),
            ),
            ("include_entities".to_string(), "true".to_string()),
        ]
    }

    #[test]
    fn test_percent_encode_rfc3986() {
        assert_eq!(percent_encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(percent_encode("An encoded string!"), "An%20encoded%20string%21");
        assert_eq!(percent_encode("Dogs, Cats & Mice"), "Dogs%2C%20Cats%20%26%20Mice");
        assert_eq!(percent_encode("-._~"), "-._~");
    }

    #[test]
    fn test_signature_base_string() {
        let mut params = request_params();
        params.extend([
            ("oauth_consumer_key".to_string(), CONSUMER_KEY.to_string()),
            ("oauth_nonce".to_string(), NONCE.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), TIMESTAMP.to_string()),
            ("oauth_token".to_string(), TOKEN.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ]);

        let base = signature_base_string("post", URL, &params);
        assert!(base.starts_with(
            "POST&https%3A%2F%2Fapi.twitter.com%2F1.1%2Fstatuses%2Fupdate.json&include_entities%3Dtrue%26oauth_consumer_key"
        ));
        assert!(base.ends_with(
            "status%3DHello%2520Ladies%2520%252B%2520Gentlemen%252C%2520a%2520signed%2520OAuth%2520request%2521"
        ));
    }

    #[test]
    fn test_known_signature() {
        let signer =
            OAuth1Signer::new(CONSUMER_KEY, CONSUMER_SECRET).with_token(TOKEN, TOKEN_SECRET);
        let header = signer
            .authorization_header_with("POST", URL, &request_params(), &[], NONCE, TIMESTAMP)
            .unwrap();

        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_token=\"370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb\""));
        assert!(!header.contains("status="));
    }

    #[test]
    fn test_header_without_token_uses_empty_token_secret() {
        let signer = OAuth1Signer::new("key", "secret");
        let header = signer
            .authorization_header_with(
                "POST",
                "https://api.twitter.com/oauth/request_token",
                &[],
                &[("oauth_callback", "oob")],
                "nonce",
                "1",
            )
            .unwrap();

        assert!(header.contains("oauth_callback=\"oob\""));
        assert!(!header.contains("oauth_token="));

        let base = signature_base_string(
            "POST",
            "https://api.twitter.com/oauth/request_token",
            &[
                ("oauth_callback".to_string(), "oob".to_string()),
                ("oauth_consumer_key".to_string(), "key".to_string()),
                ("oauth_nonce".to_string(), "nonce".to_string()),
                ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
                ("oauth_timestamp".to_string(), "1".to_string()),
                ("oauth_version".to_string(), "1.0".to_string()),
            ],
        );
        let expected = percent_encode(&sign(&base, "secret", "").unwrap());
        assert!(header.contains(&format!("oauth_signature=\"{}\"", expected)));
    }

    #[test]
    fn test_random_nonce_changes_header() {
        let signer = OAuth1Signer::new("key", "secret");
        let a = signer.authorization_header("GET", URL, &[], &[]).unwrap();
        let b = signer.authorization_header("GET", URL, &[], &[]).unwrap();
        assert_ne!(a, b);
    }
}
