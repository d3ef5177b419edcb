//! Supervisor snapshot: the starter's declared table of controlled servers.
//!
//! The starter device exposes a `Servers` spectrum attribute, one
//! tab-delimited record per server: `server \t state \t controlled \t level`.
//! The snapshot is refreshed on a much coarser cadence than process metrics
//! because the starter's table changes rarely.

use crate::directory::DeviceChannel;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Name of the starter attribute holding the server table.
pub const SERVERS_ATTRIBUTE: &str = "Servers";

/// One declared server in the starter's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarterEntry {
    /// Run level declared by the starter.
    pub level: i32,
    /// Whether the starter reports the server as ON.
    pub ok: bool,
}

/// The starter's declared table, keyed by server identity.
pub type StarterSnapshot = HashMap<String, StarterEntry>;

/// Read and parse the starter's `Servers` attribute.
///
/// A fetch failure propagates so the caller can keep its previous snapshot;
/// malformed records are skipped individually.
pub async fn fetch_starter_servers(channel: &dyn DeviceChannel) -> Result<StarterSnapshot> {
    let lines = channel.read_spectrum(SERVERS_ATTRIBUTE).await?;
    Ok(parse_starter_records(&lines))
}

/// Parse the records of a `Servers` attribute value into a snapshot.
///
/// Records that fail to parse are skipped with a debug log; the attribute
/// holds many independent records and one bad line must not invalidate the
/// rest.
pub fn parse_starter_records(lines: &[String]) -> StarterSnapshot {
    let mut snapshot = StarterSnapshot::new();
    for line in lines {
        match parse_record(line) {
            Ok(Some((server, entry))) => {
                snapshot.insert(server, entry);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(record = %line, error = %e, "skipping malformed starter record");
            }
        }
    }
    snapshot
}

/// Parse one record. Returns `Ok(None)` for well-formed records whose level
/// is zero.
///
/// A server counts as meaningfully supervised iff its level field is nonzero.
/// The third field (the starter's own "controlled" flag) is unreliable in
/// practice and is deliberately not consulted; this is a policy decision to
/// confirm against the real starter semantics.
fn parse_record(line: &str) -> Result<Option<(String, StarterEntry)>> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 4 {
        return Err(Error::InvalidRecord(format!(
            "expected 4 tab-delimited fields, got {}",
            fields.len()
        )));
    }

    let level: i32 = fields[3]
        .trim()
        .parse()
        .map_err(|_| Error::InvalidRecord(format!("level is not an integer: {:?}", fields[3])))?;
    if level == 0 {
        return Ok(None);
    }

    let entry = StarterEntry {
        level,
        ok: fields[1] == "ON",
    };
    Ok(Some((fields[0].to_string(), entry)))
}
