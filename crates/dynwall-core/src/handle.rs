use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// URL scheme + provider prefix understood by the image-retrieval surface.
pub const URL_PREFIX: &str = "image://dynamic/";

const SEPARATOR: char = '#';

/// Wire value of an unset frame index.
const UNSET_INDEX: &str = "-1";

/// Addresses one frame inside a multi-frame wallpaper package.
///
/// A handle is valid only when it names a non-empty source and carries a
/// frame index. The textual form is `<base64(source)>#<index>`, with `-1`
/// standing in for an unset index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FrameHandle {
    source: String,
    frame_index: Option<u32>,
}

impl FrameHandle {
    pub fn new(source: impl Into<String>, frame_index: u32) -> Self {
        Self {
            source: source.into(),
            frame_index: Some(frame_index),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.source.is_empty() && self.frame_index.is_some()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    pub fn frame_index(&self) -> Option<u32> {
        self.frame_index
    }

    pub fn set_frame_index(&mut self, frame_index: Option<u32>) {
        self.frame_index = frame_index;
    }

    /// Token form, without the URL prefix.
    pub fn to_token(&self) -> String {
        let source = STANDARD.encode(self.source.as_bytes());
        match self.frame_index {
            Some(index) => format!("{source}{SEPARATOR}{index}"),
            None => format!("{source}{SEPARATOR}{UNSET_INDEX}"),
        }
    }

    pub fn to_url(&self) -> String {
        format!("{URL_PREFIX}{}", self.to_token())
    }

    /// Parse a token produced by [`FrameHandle::to_token`].
    ///
    /// Malformed input never errors; it produces a handle for which
    /// [`FrameHandle::is_valid`] returns false.
    pub fn from_token(token: &str) -> Self {
        let parts: Vec<&str> = token.split(SEPARATOR).filter(|p| !p.is_empty()).collect();
        let [source, index] = parts[..] else {
            return Self::default();
        };

        Self {
            source: source_from_base64(source),
            frame_index: frame_index_from_str(index),
        }
    }

    /// Parse either a full `image://dynamic/...` URL or a bare token.
    pub fn from_url(url: &str) -> Self {
        Self::from_token(url.strip_prefix(URL_PREFIX).unwrap_or(url))
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}

fn source_from_base64(encoded: &str) -> String {
    match STANDARD.decode(encoded) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

/// Negative values, including the `-1` sentinel, and values past `u32::MAX` mean "unset".
fn frame_index_from_str(s: &str) -> Option<u32> {
    s.parse::<i64>()
        .ok()
        .and_then(|i| u32::try_from(i).ok())
}
