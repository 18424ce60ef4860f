use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use url::Url;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

pub const DOWNLOAD_ROUTE: &str = "/api/files/download";

/// Issues and checks time-limited download links for blob storage paths.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    base_url: String,
    ttl_secs: i64,
}

impl UrlSigner {
    pub fn new(secret: impl Into<Vec<u8>>, base_url: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            base_url: base_url.into(),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    fn signature(&self, path: &str, expires: i64) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Internal(format!("invalid signing key: {}", e)))?;
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Absolute URL valid until `now + ttl`.
    pub fn sign(&self, path: &str, now_unix: i64) -> Result<String> {
        let expires = now_unix + self.ttl_secs;
        let signature = self.signature(path, expires)?;
        let mut url = Url::parse(&self.base_url)
            .and_then(|base| base.join(DOWNLOAD_ROUTE))
            .map_err(|e| Error::Config(format!("invalid PUBLIC_BASE_URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);
        Ok(url.into())
    }

    pub fn verify(&self, path: &str, expires: i64, signature: &str, now_unix: i64) -> Result<()> {
        if now_unix > expires {
            return Err(Error::Forbidden("download link has expired".to_string()));
        }
        let expected = self.signature(path, expires)?;
        if bool::from(expected.as_bytes().ct_eq(signature.to_ascii_lowercase().as_bytes())) {
            Ok(())
        } else {
            Err(Error::Forbidden("invalid download signature".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> UrlSigner {
        UrlSigner::new("test-secret", "http://localhost:8080", 300)
    }

    fn query(url: &str, key: &str) -> String {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[test]
    fn signed_url_round_trips_within_ttl() {
        let url = signer().sign("org/cand/1-cv.pdf", 1_000).unwrap();
        assert!(url.starts_with("http://localhost:8080/api/files/download?"));
        let expires: i64 = query(&url, "expires").parse().unwrap();
        assert_eq!(expires, 1_300);
        assert_eq!(query(&url, "path"), "org/cand/1-cv.pdf");
        let sig = query(&url, "signature");
        assert!(signer().verify("org/cand/1-cv.pdf", expires, &sig, 1_299).is_ok());
    }

    #[test]
    fn expired_or_tampered_links_are_rejected() {
        let url = signer().sign("a/b/c.txt", 0).unwrap();
        let sig = query(&url, "signature");
        assert!(matches!(signer().verify("a/b/c.txt", 300, &sig, 301), Err(Error::Forbidden(_))));
        assert!(matches!(signer().verify("a/b/d.txt", 300, &sig, 10), Err(Error::Forbidden(_))));
        assert!(matches!(signer().verify("a/b/c.txt", 900, &sig, 10), Err(Error::Forbidden(_))));
    }
}
