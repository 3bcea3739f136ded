use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Splits `data:<mime>;base64,<payload>` into its media type and decoded bytes.
/// Input without a `data:` header is decoded as bare base64.
pub fn decode_data_uri(data_uri: &str) -> Result<(String, Vec<u8>)> {
    let data_uri = data_uri.trim();
    let (mime_type, payload) = match data_uri.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .context("Data URI is missing the ',' separator")?;
            let mime = header.split(';').next().unwrap_or("").trim();
            let mime = if mime.is_empty() { DEFAULT_MIME_TYPE } else { mime };
            (mime.to_string(), payload)
        }
        None => (DEFAULT_MIME_TYPE.to_string(), data_uri),
    };

    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if payload.is_empty() {
        bail!("Data URI has an empty payload");
    }
    let bytes = BASE64
        .decode(payload.as_bytes())
        .context("Data URI payload is not valid base64")?;
    Ok((mime_type, bytes))
}
