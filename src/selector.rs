use std::collections::HashMap;

use tracing::debug;

use crate::addr::ServerAddr;
use crate::errors::SelectorError;
use crate::probe::{Liveness, NetProbe};
use crate::ring::{self, Ring};

/// Maximum lookup attempts when failover rehashing is enabled.
const MAX_ATTEMPTS: usize = 20;

/// Behavioral switches, fixed at construction.
///
/// `failover` without `check_alive` has no effect since nothing ever marks a
/// candidate dead. `check_alive` without `failover` turns a dead candidate
/// into [`SelectorError::NoServers`] instead of retrying.
#[derive(Clone, Copy, Debug, Default)]
pub struct Options {
    /// Probe a candidate's reachability before returning it.
    pub check_alive: bool,
    /// On a dead candidate, retry with a rehashed coordinate.
    pub failover: bool,
}

/// Maps lookup keys to server addresses over an immutable weighted ring.
///
/// Read-only after construction and safe to share across threads;
/// reconfiguration means building a new `Selector`. Liveness is re-probed on
/// every call when enabled, never cached, so routing follows servers going
/// up or down between calls.
pub struct Selector {
    ring: Ring,
    options: Options,
    probe: Box<dyn Liveness + Send + Sync>,
}

impl Selector {
    /// Builds a selector from server labels.
    ///
    /// Labels are `host:port`, a `/`-containing Unix socket path, or
    /// `host:port:weight` with an inline integer weight.
    pub fn new<S: AsRef<str>>(servers: &[S], options: Options) -> Result<Self, SelectorError> {
        Ok(Selector {
            ring: Ring::from_labels(servers)?,
            options,
            probe: Box::new(NetProbe::new()),
        })
    }

    /// Builds a selector from an explicit label -> weight map.
    pub fn with_weights(
        servers: &HashMap<String, u32>,
        options: Options,
    ) -> Result<Self, SelectorError> {
        Ok(Selector {
            ring: Ring::from_weights(servers)?,
            options,
            probe: Box::new(NetProbe::new()),
        })
    }

    /// Builds a selector with a caller-supplied liveness probe, e.g. a
    /// [`NetProbe::with_timeout`](crate::NetProbe::with_timeout) to keep
    /// lookups bounded, or a protocol-aware health check.
    pub fn with_probe<S: AsRef<str>>(
        servers: &[S],
        options: Options,
        probe: Box<dyn Liveness + Send + Sync>,
    ) -> Result<Self, SelectorError> {
        Ok(Selector { ring: Ring::from_labels(servers)?, options, probe })
    }

    /// Returns the server address owning `key`.
    ///
    /// For a fixed ring and fixed liveness state this is a pure function of
    /// the key. Fails with [`SelectorError::NoServers`] when the ring is
    /// empty or no live server is found within the attempt budget.
    pub fn pick_server(&self, key: &str) -> Result<ServerAddr, SelectorError> {
        match self.ring.entries.len() {
            0 => Err(SelectorError::NoServers),
            1 => Ok(self.ring.entries[0].addr.clone()),
            len => self.walk(key, len),
        }
    }

    /// Distinct configured server addresses, one per server label.
    pub fn servers(&self) -> &[ServerAddr] {
        &self.ring.addrs
    }

    /// Invokes `visit` for every distinct address in order, stopping at and
    /// propagating the first error.
    pub fn each<E>(&self, mut visit: impl FnMut(&ServerAddr) -> Result<(), E>) -> Result<(), E> {
        for addr in &self.ring.addrs {
            visit(addr)?;
        }
        Ok(())
    }

    fn walk(&self, key: &str, len: usize) -> Result<ServerAddr, SelectorError> {
        let entries = &self.ring.entries;
        let mut x = ring::key_hash(key);

        for attempt in 0..MAX_ATTEMPTS {
            let found = ring::search(entries, x);

            if found >= len as u64 && self.options.failover {
                x = rehash(key, attempt);
                continue;
            }

            // The wrap sentinel lands on the arc owned by the first entry.
            let candidate = if found >= len as u64 { &entries[0] } else { &entries[found as usize] };

            if !self.options.check_alive || self.probe.is_alive(&candidate.addr) {
                return Ok(candidate.addr.clone());
            }
            if !self.options.failover {
                break;
            }

            debug!(addr = %candidate.addr, attempt, "candidate not alive, rehashing");
            x = rehash(key, attempt);
        }

        Err(SelectorError::NoServers)
    }
}

/// Failover coordinate for the given attempt: an independent hash of the
/// attempt-prefixed key, so a dead server's load spreads across the ring
/// instead of concentrating on its clockwise neighbor.
fn rehash(key: &str, attempt: usize) -> u32 {
    ring::key_hash(&format!("{attempt}{key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProbe {
        dead: Vec<&'static str>,
    }

    impl Liveness for FakeProbe {
        fn is_alive(&self, addr: &ServerAddr) -> bool {
            !self.dead.contains(&addr.to_string().as_str())
        }
    }

    const PAIR: [&str; 2] = ["127.0.0.1:11210", "127.0.0.1:11211"];

    fn with_dead(dead: Vec<&'static str>, options: Options) -> Selector {
        Selector::with_probe(&PAIR, options, Box::new(FakeProbe { dead })).unwrap()
    }

    #[test]
    fn empty_ring_fails_every_lookup() {
        let selector = Selector::new::<&str>(&[], Options::default()).unwrap();
        assert!(selector.servers().is_empty());
        assert!(matches!(selector.pick_server("api:foo"), Err(SelectorError::NoServers)));
    }

    #[test]
    fn single_server_routes_every_key() {
        let selector = Selector::new(&["127.0.0.1:11211"], Options::default()).unwrap();
        for key in ["api:foo", "", "ключ", "日本語キー", "foo:info/bar"] {
            assert_eq!(selector.pick_server(key).unwrap().to_string(), "127.0.0.1:11211");
        }
    }

    #[test]
    fn picks_are_deterministic() {
        let selector = Selector::new(&PAIR, Options::default()).unwrap();
        for key in ["api:foo", "api:bar", "foo:info"] {
            let first = selector.pick_server(key).unwrap();
            for _ in 0..10 {
                assert_eq!(selector.pick_server(key).unwrap(), first);
            }
        }
    }

    // "api:foo" hashes to :11211 and "api:bar" to :11210 on this pair.

    #[test]
    fn without_check_alive_dead_servers_are_still_returned() {
        let selector =
            with_dead(vec!["127.0.0.1:11210", "127.0.0.1:11211"], Options::default());
        assert_eq!(selector.pick_server("api:foo").unwrap().to_string(), "127.0.0.1:11211");
        assert_eq!(selector.pick_server("api:bar").unwrap().to_string(), "127.0.0.1:11210");
    }

    #[test]
    fn check_alive_without_failover_fails_on_a_dead_pick() {
        let options = Options { check_alive: true, failover: false };
        let selector = with_dead(vec!["127.0.0.1:11211"], options);
        assert!(matches!(selector.pick_server("api:foo"), Err(SelectorError::NoServers)));
        assert_eq!(selector.pick_server("api:bar").unwrap().to_string(), "127.0.0.1:11210");
    }

    #[test]
    fn failover_rehashes_onto_the_live_server() {
        let options = Options { check_alive: true, failover: true };

        let selector = with_dead(vec!["127.0.0.1:11211"], options);
        assert_eq!(selector.pick_server("api:foo").unwrap().to_string(), "127.0.0.1:11210");

        let selector = with_dead(vec!["127.0.0.1:11210"], options);
        assert_eq!(selector.pick_server("api:bar").unwrap().to_string(), "127.0.0.1:11211");
    }

    #[test]
    fn failover_gives_up_when_everything_is_dead() {
        let options = Options { check_alive: true, failover: true };
        let selector = with_dead(vec!["127.0.0.1:11210", "127.0.0.1:11211"], options);
        assert!(matches!(selector.pick_server("api:foo"), Err(SelectorError::NoServers)));
    }

    #[test]
    fn each_visits_addresses_in_order() {
        let selector = Selector::new(&PAIR, Options::default()).unwrap();
        let mut seen = Vec::new();
        let ok: Result<(), &str> = selector.each(|addr| {
            seen.push(addr.to_string());
            Ok(())
        });
        assert!(ok.is_ok());
        assert_eq!(seen, vec!["127.0.0.1:11210", "127.0.0.1:11211"]);
    }

    #[test]
    fn each_stops_at_the_first_error() {
        let selector = Selector::new(&PAIR, Options::default()).unwrap();
        let mut visited = 0;
        let result: Result<(), &str> = selector.each(|_| {
            visited += 1;
            Err("boom")
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(visited, 1);
    }

    #[test]
    fn traffic_follows_weights() {
        let servers =
            HashMap::from([("10.0.0.1:11211".to_owned(), 1), ("10.0.0.2:11211".to_owned(), 3)]);
        let selector = Selector::with_weights(&servers, Options::default()).unwrap();

        let mut heavy = 0u32;
        let mut light = 0u32;
        for i in 0..10_000u32 {
            match selector.pick_server(&format!("key-{i}")).unwrap().to_string().as_str() {
                "10.0.0.2:11211" => heavy += 1,
                _ => light += 1,
            }
        }

        let ratio = f64::from(heavy) / f64::from(light);
        assert!((2.0..4.5).contains(&ratio), "weight-3 share off: ratio {ratio:.2}");
    }

    #[test]
    fn equal_weights_spread_roughly_evenly() {
        let labels = ["10.0.0.1:11211", "10.0.0.2:11211", "10.0.0.3:11211"];
        let selector = Selector::new(&labels, Options::default()).unwrap();

        let mut counts = HashMap::new();
        for i in 0..10_000u32 {
            let addr = selector.pick_server(&format!("key-{i}")).unwrap().to_string();
            *counts.entry(addr).or_insert(0u32) += 1;
        }

        for label in labels {
            let count = counts.get(label).copied().unwrap_or(0);
            assert!((2500..=4500).contains(&count), "{label} got {count} of 10000 keys");
        }
    }
}
