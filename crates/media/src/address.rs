//! Media endpoint addresses.
//!
//! - `tcp://host:port` raw FLV over TCP
//! - `tcp://host:port/key` FLV over TCP after a `PUBLISH`/`PLAY` handshake for `key`
//! - `rtmp://host[:port]/app/stream` or `rtmps://…` an RTMP publish or play session
//! - `file:///path/to/file.flv` or a bare path

use crate::error::{MediaError, MediaResult};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaAddress {
    Tcp { authority: String, key: Option<String> },
    /// Full RTMP URL, handed to FFmpeg as is.
    Rtmp { url: String },
    File(PathBuf),
}

fn valid_authority(authority: &str, port_required: bool) -> bool {
    match authority.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => !port_required && !authority.is_empty(),
    }
}

impl FromStr for MediaAddress {
    type Err = MediaError;

    fn from_str(s: &str) -> MediaResult<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(MediaError::invalid_address(s, "empty address"));
        }

        match trimmed.split_once("://") {
            Some(("tcp", rest)) => {
                let (authority, key) = match rest.split_once('/') {
                    Some((authority, key)) => (authority, Some(key.trim_matches('/'))),
                    None => (rest, None),
                };
                if !valid_authority(authority, true) {
                    return Err(MediaError::invalid_address(s, "expected host:port"));
                }

                Ok(MediaAddress::Tcp {
                    authority: authority.to_string(),
                    key: key.filter(|k| !k.is_empty()).map(str::to_string),
                })
            }
            Some(("rtmp" | "rtmps", rest)) => {
                let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
                if !valid_authority(authority, false) {
                    return Err(MediaError::invalid_address(s, "expected host[:port]"));
                }
                if path.trim_matches('/').is_empty() {
                    return Err(MediaError::invalid_address(s, "missing application name"));
                }
                Ok(MediaAddress::Rtmp {
                    url: trimmed.to_string(),
                })
            }
            Some(("file", path)) => {
                if path.is_empty() {
                    return Err(MediaError::invalid_address(s, "empty file path"));
                }
                Ok(MediaAddress::File(PathBuf::from(path)))
            }
            Some((scheme, _)) => Err(MediaError::invalid_address(
                s,
                format!("unsupported scheme '{}'", scheme),
            )),
            None => Ok(MediaAddress::File(PathBuf::from(trimmed))),
        }
    }
}

impl fmt::Display for MediaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaAddress::Tcp {
                authority,
                key: Some(key),
            } => write!(f, "tcp://{}/{}", authority, key),
            MediaAddress::Tcp { authority, key: None } => write!(f, "tcp://{}", authority),
            MediaAddress::Rtmp { url } => f.write_str(url),
            MediaAddress::File(path) => write!(f, "file://{}", path.display()),
        }
    }
}
