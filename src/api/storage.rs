use crate::error::{GenerationError, Result};
use crate::logi;
use reqwest::Client;
use std::time::Duration;

/// Splits `gs://bucket/path/to/object` into bucket and object name.
pub fn parse_gcs_uri(uri: &str) -> Result<(String, String)> {
    let rest = uri
        .strip_prefix("gs://")
        .ok_or_else(|| GenerationError::Storage(format!("not a gs:// URI: {uri}")))?;
    match rest.split_once('/') {
        Some((bucket, object)) if !bucket.is_empty() && !object.is_empty() => {
            Ok((bucket.to_string(), object.to_string()))
        }
        _ => Err(GenerationError::Storage(format!("gs:// URI has no object path: {uri}"))),
    }
}

fn url_encode_component(input: &str) -> String {
    let mut out = String::new();
    for b in input.as_bytes() {
        let c = *b as char;
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '~' {
            out.push(c);
        } else {
            out.push('%');
            out.push_str(&format!("{:02X}", b));
        }
    }
    out
}

pub fn object_media_url(storage_base: &str, bucket: &str, object: &str) -> String {
    format!(
        "{}/storage/v1/b/{}/o/{}?alt=media",
        storage_base.trim_end_matches('/'),
        url_encode_component(bucket),
        url_encode_component(object)
    )
}

pub async fn download_gcs_object(
    client: &Client,
    storage_base: &str,
    token: &str,
    uri: &str,
) -> Result<Vec<u8>> {
    let (bucket, object) = parse_gcs_uri(uri)?;
    let url = object_media_url(storage_base, &bucket, &object);
    logi("    - Downloading video from Cloud Storage...");

    let resp = client
        .get(&url)
        .bearer_auth(token)
        .timeout(Duration::from_secs(300))
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let snippet = body.chars().take(300).collect::<String>();
        return Err(GenerationError::Storage(format!(
            "HTTP {} for {}: {}",
            status.as_u16(),
            uri,
            snippet
        )));
    }

    let bytes = resp.bytes().await?;
    if bytes.is_empty() {
        return Err(GenerationError::Storage(format!("empty object at {uri}")));
    }
    Ok(bytes.to_vec())
}
