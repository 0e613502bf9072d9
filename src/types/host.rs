//! Remote host slots
//!
//! One `HostSlot` is one concurrent remote-execution lane: a hostname plus
//! the path of the benchgrid binary on that host. Listing the same hostname
//! several times buys several parallel lanes to one machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One remote execution lane
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostSlot {
    /// Hostname as understood by ssh (may be an ssh-config alias)
    pub hostname: String,
    /// Absolute path of the benchgrid binary on the remote host
    pub remote_binary: String,
}

impl HostSlot {
    /// Parse a `hostname:remote_binary` entry
    pub fn parse(entry: &str) -> Result<Self> {
        let (hostname, remote_binary) =
            entry.split_once(':').ok_or_else(|| Error::InvalidHostSlot {
                entry: entry.to_string(),
            })?;
        if hostname.is_empty() || remote_binary.is_empty() {
            return Err(Error::InvalidHostSlot {
                entry: entry.to_string(),
            });
        }
        Ok(Self {
            hostname: hostname.to_string(),
            remote_binary: remote_binary.to_string(),
        })
    }

    /// Parse a list of entries, preserving duplicates (duplicate hostnames
    /// are extra lanes, not an error)
    pub fn parse_all<I, S>(entries: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        entries.into_iter().map(|e| Self::parse(e.as_ref())).collect()
    }
}

impl fmt::Display for HostSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.remote_binary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_slot() {
        let slot = HostSlot::parse("machine1:/usr/local/bin/benchgrid").unwrap();
        assert_eq!(slot.hostname, "machine1");
        assert_eq!(slot.remote_binary, "/usr/local/bin/benchgrid");
    }

    #[test]
    fn test_parse_rejects_missing_colon() {
        assert!(HostSlot::parse("machine1").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_parts() {
        assert!(HostSlot::parse(":/usr/bin/benchgrid").is_err());
        assert!(HostSlot::parse("machine1:").is_err());
    }

    #[test]
    fn test_parse_all_keeps_duplicates() {
        let slots = HostSlot::parse_all(["m1:/bin/bg", "m1:/bin/bg", "m2:/bin/bg"]).unwrap();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0], slots[1]);
    }
}
