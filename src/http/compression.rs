//! Response compression negotiation.
//!
//! # Responsibilities
//! - Parse `Accept-Encoding` (q-values, `q=0` means "not acceptable")
//! - Pick Brotli over gzip whenever the client advertises it
//! - Encode buffered bodies
//!
//! # Design Decisions
//! - Preference order is fixed (br, then gzip); q-values only gate acceptability
//! - Encoding failure leaves the body uncompressed rather than failing the request

use std::io::Write;

use axum::http::{header, HeaderMap, HeaderValue};
use flate2::{write::GzEncoder, Compression};

use crate::config::CompressionConfig;

/// Content codings the gateway can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Brotli,
    Gzip,
}

impl ContentCoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCoding::Brotli => "br",
            ContentCoding::Gzip => "gzip",
        }
    }

    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

/// Codings a client declared acceptable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptEncoding {
    pub brotli: bool,
    pub gzip: bool,
}

impl AcceptEncoding {
    /// Parse every `Accept-Encoding` header on the request.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get_all(header::ACCEPT_ENCODING)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .fold(Self::default(), |acc, value| acc.merge(Self::parse(value)))
    }

    pub fn parse(value: &str) -> Self {
        let mut accepted = Self::default();
        for part in value.split(',') {
            let mut params = part.split(';');
            let coding = params.next().unwrap_or("").trim().to_ascii_lowercase();
            let q = params
                .find_map(|p| p.trim().strip_prefix("q="))
                .map(|q| q.trim().parse::<f32>().unwrap_or(0.0))
                .unwrap_or(1.0);
            if q <= 0.0 {
                continue;
            }
            match coding.as_str() {
                "br" => accepted.brotli = true,
                "gzip" | "x-gzip" => accepted.gzip = true,
                _ => {}
            }
        }
        accepted
    }

    fn merge(self, other: Self) -> Self {
        Self {
            brotli: self.brotli || other.brotli,
            gzip: self.gzip || other.gzip,
        }
    }

    /// Preferred coding, if any.
    pub fn preferred(&self) -> Option<ContentCoding> {
        if self.brotli {
            Some(ContentCoding::Brotli)
        } else if self.gzip {
            Some(ContentCoding::Gzip)
        } else {
            None
        }
    }
}

/// Body encoder configured from [`CompressionConfig`].
#[derive(Debug, Clone)]
pub struct Compressor {
    enabled: bool,
    min_size: usize,
    brotli_quality: u32,
    gzip_level: u32,
}

impl Compressor {
    pub fn new(config: &CompressionConfig) -> Self {
        Self {
            enabled: config.enabled,
            min_size: config.min_size,
            brotli_quality: config.brotli_quality,
            gzip_level: config.gzip_level,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Bodies must be strictly larger than the threshold.
    pub fn worth_compressing(&self, len: usize) -> bool {
        self.enabled && len > self.min_size
    }

    pub fn encode(&self, body: &[u8], coding: ContentCoding) -> Option<Vec<u8>> {
        match coding {
            ContentCoding::Gzip => {
                let mut encoder = GzEncoder::new(
                    Vec::with_capacity(body.len() / 2),
                    Compression::new(self.gzip_level),
                );
                encoder.write_all(body).ok()?;
                encoder.finish().ok()
            }
            ContentCoding::Brotli => {
                let mut compressed = Vec::with_capacity(body.len() / 2);
                let params = brotli::enc::BrotliEncoderParams {
                    quality: self.brotli_quality as i32,
                    ..Default::default()
                };
                let mut input = std::io::Cursor::new(body);
                brotli::BrotliCompress(&mut input, &mut compressed, &params).ok()?;
                Some(compressed)
            }
        }
    }
}
