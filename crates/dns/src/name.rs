//! Consul-style DNS name grammar and SRV weight assignment.
//!
//! Supported forms (`<domain>` is the configured suffix, e.g. `consul`):
//!   - `_<service>._tcp.service.<domain>.` → SRV lookup
//!   - `<service>.service.<domain>.`       → A lookup
//!   - `<service>.node.<domain>.`          → A lookup (single instance by name)
//!
//! Anything else is not ours to answer; the caller should return NXDOMAIN.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    Srv(String),
    ServiceA(String),
    NodeA(String),
}

/// Parse a query name against the configured domain suffix. `name` may or
/// may not carry a trailing dot.
pub fn parse(name: &str, domain: &str) -> Option<QueryKind> {
    let name = name.strip_suffix('.').unwrap_or(name);
    let suffix = format!(".{domain}");
    let base = name.strip_suffix(&suffix)?;

    if let Some(service) = base
        .strip_prefix('_')
        .and_then(|s| s.strip_suffix(".service"))
        .and_then(|s| s.strip_suffix("._tcp"))
    {
        if service.is_empty() {
            return None;
        }
        return Some(QueryKind::Srv(service.to_owned()));
    }

    if let Some(service) = base.strip_suffix(".service") {
        if service.is_empty() {
            return None;
        }
        return Some(QueryKind::ServiceA(service.to_owned()));
    }

    if let Some(service) = base.strip_suffix(".node") {
        if service.is_empty() {
            return None;
        }
        return Some(QueryKind::NodeA(service.to_owned()));
    }

    None
}

/// Assign SRV weights across `n` records so that ties never collapse to a
/// single value once there's more than one record to balance across —
/// a pure round-number split (e.g. 2 records at 50/50) would make every
/// resolver-side weighted pick equivalent to unweighted round robin.
pub fn compute_weights(n: usize) -> Vec<u16> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![100];
    }
    let base = 100 / n as u16;
    let remainder = 100 % n as u16;
    let mut weights = vec![base; n];
    if remainder > 0 {
        for w in weights.iter_mut().take(remainder as usize) {
            *w += 1;
        }
    } else {
        weights[0] += 1;
        let last = weights.len() - 1;
        weights[last] -= 1;
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_srv_query() {
        assert_eq!(
            parse("_web._tcp.service.consul.", "consul"),
            Some(QueryKind::Srv("web".into()))
        );
        // without trailing dot too
        assert_eq!(
            parse("_web._tcp.service.consul", "consul"),
            Some(QueryKind::Srv("web".into()))
        );
    }

    #[test]
    fn rejects_srv_query_missing_service_infix() {
        assert_eq!(parse("_web._tcp.consul.", "consul"), None);
    }

    #[test]
    fn parses_service_a_query() {
        assert_eq!(
            parse("web.service.consul.", "consul"),
            Some(QueryKind::ServiceA("web".into()))
        );
    }

    #[test]
    fn parses_node_a_query() {
        assert_eq!(
            parse("web.node.consul.", "consul"),
            Some(QueryKind::NodeA("web".into()))
        );
    }

    #[test]
    fn rejects_wrong_domain() {
        assert_eq!(parse("web.service.other.", "consul"), None);
    }

    #[test]
    fn rejects_unrecognized_shape() {
        assert_eq!(parse("web.consul.", "consul"), None);
        assert_eq!(parse("web.weird.consul.", "consul"), None);
    }

    #[test]
    fn weights_for_two_records_are_not_identical() {
        let w = compute_weights(2);
        assert_eq!(w.len(), 2);
        assert_ne!(w[0], w[1]);
        assert_eq!(w.iter().sum::<u16>(), 100);
    }

    #[test]
    fn weights_for_three_records_sum_to_100_with_variance() {
        let w = compute_weights(3);
        assert_eq!(w.iter().sum::<u16>(), 100);
        assert!(w.iter().collect::<std::collections::HashSet<_>>().len() >= 2);
    }

    #[test]
    fn single_record_gets_full_weight() {
        assert_eq!(compute_weights(1), vec![100]);
    }

    #[test]
    fn zero_records_yields_empty_weights() {
        assert_eq!(compute_weights(0), Vec::<u16>::new());
    }
}
