//! NodePath and NodeInfo - textual node addressing
//!
//! A node path is `<group>/<host>:<port>`. Paths are stored as raw strings and
//! parsed on demand, so a malformed path can be carried around and only fails
//! at the accessor that needs the broken segment.

use std::fmt;

use flitterbytes::{CodecError, read_u16, write_u16};
use serde::{Deserialize, Serialize};

/// Separator between the group segment and the connection segment
pub const GROUP_SEPARATOR: char = '/';

/// Connection-identifying part of a node path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeInfo {
    pub host: String,
    pub port: u16,
}

impl NodeInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host:port`
    ///
    /// The host must be non-empty and free of whitespace and `/`. The port is
    /// the decimal text after the last `:`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (host, port) = s.rsplit_once(':')?;
        if host.is_empty() || host.contains(GROUP_SEPARATOR) || host.chars().any(char::is_whitespace) {
            return None;
        }
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let port = port.parse::<u16>().ok()?;
        Some(Self::new(host, port))
    }

    /// Address string suitable for `TcpStream::connect`
    ///
    /// IPv6 hosts are bracketed, so `::1` on port 80 becomes `[::1]:80`.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Compact binary form: `[host len: u16][host][port: u16]`
    ///
    /// Public API for peers that exchange node identities in binary payloads.
    /// Hosts longer than `u16::MAX` bytes are rejected.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let host_len = u16::try_from(self.host.len()).map_err(|_| CodecError::TooLong {
            len: self.host.len(),
            max: u16::MAX as usize,
        })?;
        let mut out = Vec::with_capacity(4 + self.host.len());
        write_u16(&mut out, host_len);
        out.extend_from_slice(self.host.as_bytes());
        write_u16(&mut out, self.port);
        Ok(out)
    }

    /// Decode the compact binary form
    ///
    /// Public API counterpart of [`NodeInfo::to_bytes`]; trailing bytes are ignored.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, CodecError> {
        let host_len = read_u16(buf)? as usize;
        let rest = &buf[2..];
        let host_bytes = rest.get(..host_len).ok_or(CodecError::ShortBuffer {
            needed: 2 + host_len,
            got: buf.len(),
        })?;
        let port = read_u16(&rest[host_len..]).map_err(|_| CodecError::ShortBuffer {
            needed: 4 + host_len,
            got: buf.len(),
        })?;
        Ok(Self::new(String::from_utf8_lossy(host_bytes), port))
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Textual address of a node: group name plus connection info
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(String);

impl NodePath {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Canonical path for a group and node
    pub fn from_parts(group: &str, info: &NodeInfo) -> Self {
        Self(format!("{}{}{}", group.trim(), GROUP_SEPARATOR, info))
    }

    /// The empty path, used as "no such node"
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Group segment, if present and non-empty
    pub fn group_name(&self) -> Option<&str> {
        let (group, _) = self.0.split_once(GROUP_SEPARATOR)?;
        let group = group.trim();
        if group.is_empty() { None } else { Some(group) }
    }

    /// Connection segment, if it parses as `host:port`
    pub fn node_info(&self) -> Option<NodeInfo> {
        let (_, rest) = self.0.split_once(GROUP_SEPARATOR)?;
        NodeInfo::parse(rest)
    }

    /// Re-encode into canonical form, if both segments parse
    pub fn canonical(&self) -> Option<Self> {
        let group = self.group_name()?;
        let info = self.node_info()?;
        Some(Self::from_parts(group, &info))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodePath {
    fn from(s: String) -> Self {
        Self(s)
    }
}
