// AWS Signature Version 4 request signing

use crate::aws::AwsCredentials;
use crate::backend::{BackendError, BackendResult};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Who signs, and for which region/service
#[derive(Debug, Clone, Copy)]
pub struct SigningScope<'a> {
    pub credentials: &'a AwsCredentials,
    pub region: &'a str,
    pub service: &'a str,
}

/// A request URL with its canonical query applied, plus the headers to send
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

/// Sign a request.
///
/// `url` must not carry a query string; `query` pairs are encoded here so the
/// query that goes on the wire is byte-identical to the one that was signed.
pub fn sign(
    method: &str,
    url: &Url,
    query: &[(&str, &str)],
    payload: &[u8],
    scope: SigningScope<'_>,
    now: DateTime<Utc>,
) -> BackendResult<SignedRequest> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(BackendError::Signing("URL has no host".to_string())),
    };

    let canonical_query = canonical_query(query);
    let canonical_uri = canonical_uri(url.path());

    let mut headers = vec![
        ("host".to_string(), host),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(token) = &scope.credentials.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.sort();

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method,
        canonical_uri,
        canonical_query,
        canonical_headers,
        signed_headers,
        hex::encode(Sha256::digest(payload))
    );

    let credential_scope = format!("{}/{}/{}/aws4_request", date, scope.region, scope.service);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        credential_scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let secret = format!("AWS4{}", scope.credentials.secret_access_key);
    let k_date = hmac(secret.as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, scope.region.as_bytes())?;
    let k_service = hmac(&k_region, scope.service.as_bytes())?;
    let k_signing = hmac(&k_service, b"aws4_request")?;
    let signature = hex::encode(hmac(&k_signing, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, scope.credentials.access_key_id, credential_scope, signed_headers, signature
    );

    let mut signed_url = url.clone();
    if canonical_query.is_empty() {
        signed_url.set_query(None);
    } else {
        signed_url.set_query(Some(&canonical_query));
    }

    // reqwest derives Host from the URL, so it is signed but not re-sent
    let mut out: Vec<(String, String)> = headers
        .into_iter()
        .filter(|(name, _)| name != "host")
        .collect();
    out.push(("authorization".to_string(), authorization));

    Ok(SignedRequest {
        url: signed_url,
        headers: out,
    })
}

fn hmac(key: &[u8], data: &[u8]) -> BackendResult<Vec<u8>> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| BackendError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn canonical_query(query: &[(&str, &str)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

// Path segments arrive already percent-encoded from `Url`; encoding them
// again gives the double encoding non-S3 services expect.
fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

fn uri_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_credentials() -> AwsCredentials {
        AwsCredentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
    }

    fn example_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    fn authorization(signed: &SignedRequest) -> &str {
        signed
            .headers
            .iter()
            .find(|(name, _)| name == "authorization")
            .map(|(_, value)| value.as_str())
            .unwrap()
    }

    #[test]
    fn test_get_vanilla() {
        let creds = example_credentials();
        let url = Url::parse("https://example.amazonaws.com/").unwrap();
        let scope = SigningScope {
            credentials: &creds,
            region: "us-east-1",
            service: "service",
        };

        let signed = sign("GET", &url, &[], b"", scope, example_time()).unwrap();

        assert_eq!(
            authorization(&signed),
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert!(signed
            .headers
            .contains(&("x-amz-date".to_string(), "20150830T123600Z".to_string())));
        assert!(signed.url.query().is_none());
    }

    #[test]
    fn test_query_is_sorted_before_signing() {
        let creds = example_credentials();
        let url = Url::parse("https://example.amazonaws.com/").unwrap();
        let scope = SigningScope {
            credentials: &creds,
            region: "us-east-1",
            service: "service",
        };

        let signed = sign(
            "GET",
            &url,
            &[("Param2", "value2"), ("Param1", "value1")],
            b"",
            scope,
            example_time(),
        )
        .unwrap();

        assert_eq!(signed.url.query(), Some("Param1=value1&Param2=value2"));
        assert!(authorization(&signed).ends_with(
            "Signature=b97d918cfa904a5beff61c982a1b6f458b799221646efd99d3219ec94cdf2500"
        ));
    }

    #[test]
    fn test_promql_query_with_session_token() {
        let creds = AwsCredentials::new("AKID", "SECRET").with_session_token("TOKEN");
        let url =
            Url::parse("https://aps-workspaces.us-west-2.amazonaws.com/workspaces/ws-1234/api/v1/query")
                .unwrap();
        let scope = SigningScope {
            credentials: &creds,
            region: "us-west-2",
            service: "aps",
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let signed = sign(
            "GET",
            &url,
            &[("query", "up{job=\"node\"}"), ("time", "2024-01-01T00:00:00Z")],
            b"",
            scope,
            now,
        )
        .unwrap();

        assert_eq!(
            signed.url.query(),
            Some("query=up%7Bjob%3D%22node%22%7D&time=2024-01-01T00%3A00%3A00Z")
        );
        assert!(signed
            .headers
            .contains(&("x-amz-security-token".to_string(), "TOKEN".to_string())));
        assert!(authorization(&signed)
            .contains("SignedHeaders=host;x-amz-date;x-amz-security-token"));
        assert!(authorization(&signed).ends_with(
            "Signature=265ae77a38eaf36d008314a494a863af4b6acb323e08160b4bdf92a78a15a793"
        ));
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("abc-_.~123"), "abc-_.~123");
        assert_eq!(uri_encode("a b/c"), "a%20b%2Fc");
        assert_eq!(uri_encode("rate(x[5m])"), "rate%28x%5B5m%5D%29");
    }

    #[test]
    fn test_canonical_uri() {
        assert_eq!(canonical_uri(""), "/");
        assert_eq!(canonical_uri("/"), "/");
        assert_eq!(
            canonical_uri("/workspaces/ws-1/api/v1/label/__name__/values"),
            "/workspaces/ws-1/api/v1/label/__name__/values"
        );
    }
}
