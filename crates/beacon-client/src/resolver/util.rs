//! Shuffle and comparison helpers shared by the resolver hierarchy.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::net::UdpSocket;
use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use beacon_common::Endpoint;

/// Partitions endpoints into (local zone, everything else), preserving input
/// order. With no local zone, every endpoint lands in the second list.
pub fn split_by_zone(endpoints: &[Endpoint], my_zone: Option<&str>) -> (Vec<Endpoint>, Vec<Endpoint>) {
    let my_zone = match my_zone {
        Some(zone) => zone,
        None => return (Vec::new(), endpoints.to_vec()),
    };
    let mut local = Vec::with_capacity(endpoints.len());
    let mut other = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        let same = endpoint
            .zone
            .as_deref()
            .map(|z| z.eq_ignore_ascii_case(my_zone))
            .unwrap_or(false);
        if same {
            local.push(endpoint.clone());
        } else {
            other.push(endpoint.clone());
        }
    }
    (local, other)
}

/// Shuffles a copy of the list, seeded by a stable hash of the local IPv4
/// address. Across hosts load is spread; on a single host the order is
/// stable, which keeps incremental fetches talking to the same
/// eventually-consistent server.
pub fn randomize(list: &[Endpoint]) -> Vec<Endpoint> {
    randomize_seeded(list, local_ipv4_seed())
}

/// Fisher-Yates with an explicit seed; lists shorter than two elements come
/// back unchanged.
pub fn randomize_seeded(list: &[Endpoint], seed: u64) -> Vec<Endpoint> {
    let mut shuffled = list.to_vec();
    if shuffled.len() < 2 {
        return shuffled;
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let last = shuffled.len() - 1;
    for i in 0..last {
        let pos = rng.gen_range(i..shuffled.len());
        shuffled.swap(i, pos);
    }
    shuffled
}

/// Order-insensitive equality: both lists contain the same endpoint set.
pub fn identical(first: &[Endpoint], second: &[Endpoint]) -> bool {
    if first.len() != second.len() {
        return false;
    }
    let first_set: HashSet<&Endpoint> = first.iter().collect();
    let second_set: HashSet<&Endpoint> = second.iter().collect();
    first_set == second_set
}

/// Best-effort local IPv4 address, resolved once. Falls back to loopback
/// when no route is available; the seed only needs to be stable per host.
pub fn local_ipv4() -> &'static str {
    static LOCAL_IPV4: OnceLock<String> = OnceLock::new();
    LOCAL_IPV4.get_or_init(|| {
        UdpSocket::bind("0.0.0.0:0")
            .and_then(|socket| {
                socket.connect("198.51.100.1:80")?;
                socket.local_addr()
            })
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|_| "127.0.0.1".to_string())
    })
}

fn local_ipv4_seed() -> u64 {
    let mut hasher = DefaultHasher::new();
    local_ipv4().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(host: &str, zone: Option<&str>) -> Endpoint {
        Endpoint::new(host, 8080, false, "/v2/").with_placement(None, zone.map(String::from))
    }

    #[test]
    fn test_split_by_zone_partitions_in_order() {
        let endpoints = vec![
            endpoint("a", Some("us-east-1a")),
            endpoint("b", Some("us-east-1b")),
            endpoint("c", Some("us-east-1a")),
            endpoint("d", None),
        ];
        let (local, other) = split_by_zone(&endpoints, Some("us-east-1a"));
        assert_eq!(local, vec![endpoints[0].clone(), endpoints[2].clone()]);
        assert_eq!(other, vec![endpoints[1].clone(), endpoints[3].clone()]);
    }

    #[test]
    fn test_split_by_zone_is_case_insensitive() {
        let endpoints = vec![endpoint("a", Some("US-EAST-1A"))];
        let (local, other) = split_by_zone(&endpoints, Some("us-east-1a"));
        assert_eq!(local.len(), 1);
        assert!(other.is_empty());
    }

    #[test]
    fn test_split_by_zone_without_zone() {
        let endpoints = vec![endpoint("a", Some("us-east-1a")), endpoint("b", None)];
        let (local, other) = split_by_zone(&endpoints, None);
        assert!(local.is_empty());
        assert_eq!(other.len(), 2);
    }

    #[test]
    fn test_randomize_is_a_permutation() {
        let endpoints: Vec<Endpoint> =
            (0..20).map(|i| endpoint(&format!("host-{}", i), None)).collect();
        let shuffled = randomize_seeded(&endpoints, 42);
        assert_eq!(shuffled.len(), endpoints.len());
        assert!(identical(&endpoints, &shuffled));
    }

    #[test]
    fn test_randomize_same_seed_same_order() {
        let endpoints: Vec<Endpoint> =
            (0..10).map(|i| endpoint(&format!("host-{}", i), None)).collect();
        assert_eq!(randomize_seeded(&endpoints, 7), randomize_seeded(&endpoints, 7));
    }

    #[test]
    fn test_randomize_short_lists_unchanged() {
        assert!(randomize_seeded(&[], 1).is_empty());
        let single = vec![endpoint("only", None)];
        assert_eq!(randomize_seeded(&single, 1), single);
    }

    #[test]
    fn test_identical_ignores_order() {
        let a = vec![endpoint("x", None), endpoint("y", None)];
        let b = vec![endpoint("y", None), endpoint("x", None)];
        assert!(identical(&a, &b));
    }

    #[test]
    fn test_identical_detects_difference() {
        let a = vec![endpoint("x", None)];
        let b = vec![endpoint("y", None)];
        assert!(!identical(&a, &b));
        assert!(!identical(&a, &[]));
    }

    #[test]
    fn test_local_ipv4_is_stable() {
        assert_eq!(local_ipv4(), local_ipv4());
    }
}
