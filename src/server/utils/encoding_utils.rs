use std::io::{Read, Write};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use tracing::{debug, error};

use crate::server::error::{AppResult, Error};

/// encodings we can put on a rewritten manifest
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContentEncoding {
    Zstd,
    Gzip,
    None,
}

impl ContentEncoding {
    /// apple's player sends "gzip, deflate" or "identity" and identity must be respected
    pub fn from_accept_encoding(accept_encoding: Option<&str>) -> Self {
        match accept_encoding {
            Some(v) => {
                if v == "identity" || v.starts_with("identity,") {
                    return Self::None;
                }
                // zstd is smaller, gzip is what everyone actually supports
                if v.contains("zstd") {
                    Self::Zstd
                } else if v.contains("gzip") {
                    Self::Gzip
                } else {
                    Self::None
                }
            }
            None => Self::None,
        }
    }

    pub fn as_header_value(&self) -> Option<&'static str> {
        match self {
            Self::Zstd => Some("zstd"),
            Self::Gzip => Some("gzip"),
            Self::None => None,
        }
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
        match self {
            Self::Zstd => zstd::encode_all(data, 3),
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Self::None => Ok(data.to_vec()),
        }
    }
}

/// true when the upstream put an encoding on the body that has to be undone before reading it
pub fn is_encoded(content_encoding: Option<&str>) -> bool {
    matches!(content_encoding, Some("gzip") | Some("zstd"))
}

/// undoes an upstream content-encoding. we ask for identity but some origins compress anyway
pub fn decode_body(content_encoding: Option<&str>, bytes: Vec<u8>) -> AppResult<Vec<u8>> {
    match content_encoding {
        Some("zstd") => {
            debug!("Decompressing zstd-encoded manifest");
            zstd::decode_all(&bytes[..]).map_err(|e| {
                error!("Failed to decompress zstd: {}", e);
                Error::InternalServerErrorWithContext("Failed to decompress upstream body".to_string())
            })
        }
        Some("gzip") => {
            debug!("Decompressing gzip-encoded manifest");
            let mut decoder = GzDecoder::new(&bytes[..]);
            let mut decompressed = Vec::new();
            decoder.read_to_end(&mut decompressed).map_err(|e| {
                error!("Failed to decompress gzip: {}", e);
                Error::InternalServerErrorWithContext("Failed to decompress upstream body".to_string())
            })?;
            Ok(decompressed)
        }
        _ => Ok(bytes),
    }
}
