use std::collections::HashMap;

use sha1::{Digest, Sha1};

use crate::addr::ServerAddr;
use crate::errors::SelectorError;

/// Ring points generated per server at weight 1, the ketama convention.
const POINTS_PER_SERVER: usize = 160;

/// One point on the continuum, owned by a single server.
#[derive(Clone, Debug)]
pub(crate) struct Entry {
    pub(crate) point: u32,
    pub(crate) addr: ServerAddr,
}

/// Immutable continuum: entries sorted ascending by point, plus the distinct
/// server addresses in first-seen order. Reconfiguration means building a new
/// ring; nothing here mutates after construction.
#[derive(Clone, Debug, Default)]
pub(crate) struct Ring {
    pub(crate) entries: Vec<Entry>,
    pub(crate) addrs: Vec<ServerAddr>,
}

impl Ring {
    /// Builds a ring from server labels, honoring inline `host:port:weight`
    /// suffixes. An empty list yields an empty ring, not an error.
    pub(crate) fn from_labels<S: AsRef<str>>(servers: &[S]) -> Result<Self, SelectorError> {
        Self::build(parse_labels(servers))
    }

    /// Builds a ring from an explicit label -> weight map. Map iteration
    /// order does not affect lookups since entries are sorted by point.
    pub(crate) fn from_weights(servers: &HashMap<String, u32>) -> Result<Self, SelectorError> {
        Self::build(servers.iter().map(|(label, &weight)| (label.clone(), weight)).collect())
    }

    fn build(servers: Vec<(String, u32)>) -> Result<Self, SelectorError> {
        if servers.is_empty() {
            return Ok(Ring::default());
        }

        // A lone server owns every key; one point is enough, weight ignored.
        if servers.len() == 1 {
            let (label, _) = &servers[0];
            let addr = ServerAddr::resolve(label)?;
            return Ok(Ring {
                entries: vec![Entry { point: server_point(label, 0), addr: addr.clone() }],
                addrs: vec![addr],
            });
        }

        let total_servers = servers.len();
        let total_weight: u64 = servers.iter().map(|(_, weight)| u64::from(*weight)).sum();

        let mut entries = Vec::new();
        let mut addrs = Vec::with_capacity(total_servers);

        for (label, weight) in &servers {
            let addr = ServerAddr::resolve(label)?;
            for index in 0..entry_count(*weight, total_servers, total_weight) {
                entries.push(Entry { point: server_point(label, index), addr: addr.clone() });
            }
            addrs.push(addr);
        }

        entries.sort_unstable_by_key(|entry| entry.point);

        Ok(Ring { entries, addrs })
    }
}

/// Splits inline weight suffixes off a label list.
///
/// A third colon-separated field parses as the weight and is stripped from
/// the label. A non-numeric weight field degrades to weight 0: the server
/// keeps its slot in the address list but owns no points, matching deployed
/// rings of this scheme. Duplicate labels collapse, last weight wins.
fn parse_labels<S: AsRef<str>>(servers: &[S]) -> Vec<(String, u32)> {
    let mut parsed: Vec<(String, u32)> = Vec::with_capacity(servers.len());

    for server in servers {
        let server = server.as_ref();
        let fields: Vec<&str> = server.splitn(3, ':').collect();

        let (label, weight) = if fields.len() == 3 {
            (format!("{}:{}", fields[0], fields[1]), fields[2].parse().unwrap_or(0))
        } else {
            (server.to_owned(), 1)
        };

        match parsed.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, w)) => *w = weight,
            None => parsed.push((label, weight)),
        }
    }

    parsed
}

/// Point count for one server: proportional to its weight relative to the
/// whole cluster, scaled by the cluster size (not a normalized fraction).
fn entry_count(weight: u32, total_servers: usize, total_weight: u64) -> usize {
    if total_weight == 0 {
        return 0;
    }
    ((total_servers as u64 * POINTS_PER_SERVER as u64 * u64::from(weight)) / total_weight) as usize
}

/// Hash point for `"<label>:<index>"`: the first four bytes of the SHA-1
/// digest read big-endian, i.e. the first 8 hex characters of the digest
/// parsed as a hex literal. Deployed rings depend on this bit-for-bit.
pub(crate) fn server_point(label: &str, index: usize) -> u32 {
    let digest = Sha1::digest(format!("{label}:{index}").as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Probe coordinate for a key.
#[inline]
pub(crate) fn key_hash(key: &str) -> u32 {
    crc32fast::hash(key.as_bytes())
}

/// Locates the entry owning coordinate `h`.
///
/// Faithful transcription of the continuum search this scheme ships with,
/// including its unsigned index arithmetic: the ownership branch returns
/// `midp - 1` with 64-bit wrap, so a coordinate at or below the first point
/// comes back as a sentinel `>= entries.len()`. Callers map the sentinel to
/// index 0 (the arc wrapping past the highest point) or to a failover rehash.
/// Coordinates above the highest point also map to index 0. Any change here
/// silently moves keys near the coordinate-space boundary and breaks
/// compatibility with existing ring distributions.
pub(crate) fn search(entries: &[Entry], h: u32) -> u64 {
    let maxp = entries.len() as u64;
    let h = u64::from(h);
    let mut lowp: u64 = 0;
    let mut highp: u64 = maxp;

    loop {
        let midp = lowp.wrapping_add(highp) / 2;

        if midp >= maxp {
            return if midp == maxp { 0 } else { maxp - 1 };
        }

        let midval = u64::from(entries[midp as usize].point);
        let midval1 = if midp == 0 { 0 } else { u64::from(entries[midp as usize - 1].point) };

        if h <= midval && h > midval1 {
            return midp.wrapping_sub(1);
        }

        if midval < h {
            lowp = midp + 1;
        } else {
            highp = midp.wrapping_sub(1);
        }

        if lowp > highp {
            return 0;
        }
    }
}
