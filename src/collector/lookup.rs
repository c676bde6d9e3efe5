//! Mapping from PowerDNS statistic names to metric kinds.
//!
//! The table is ordered: server statistics first, recursor statistics
//! second. Raw names are not unique across the two sections in general, so
//! [`resolve`] returns the first exact match and the order is part of the
//! contract.

/// One row of the lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupEntry {
    /// Statistic name as emitted by the server or recursor.
    pub raw_name: &'static str,
    /// Metric kind known to the dispatcher.
    pub metric_kind: &'static str,
    /// Type instance distinguishing rows of the same kind.
    pub sub_label: Option<&'static str>,
}

const fn entry(
    raw_name: &'static str,
    metric_kind: &'static str,
    sub_label: Option<&'static str>,
) -> LookupEntry {
    LookupEntry {
        raw_name,
        metric_kind,
        sub_label,
    }
}

pub static LOOKUP_TABLE: &[LookupEntry] = &[
    // Authoritative server: questions
    entry("recursing-questions", "dns_question", Some("recurse")),
    entry("tcp-queries", "dns_question", Some("tcp")),
    entry("udp-queries", "dns_question", Some("udp")),
    // Answers
    entry("recursing-answers", "dns_answer", Some("recurse")),
    entry("tcp-answers", "dns_answer", Some("tcp")),
    entry("udp-answers", "dns_answer", Some("udp")),
    // Caches
    entry("packetcache-hit", "cache_result", Some("packet-hit")),
    entry("packetcache-miss", "cache_result", Some("packet-miss")),
    entry("packetcache-size", "cache_size", Some("packet")),
    entry("query-cache-hit", "cache_result", Some("query-hit")),
    entry("query-cache-miss", "cache_result", Some("query-miss")),
    entry("latency", "latency", None),
    entry("corrupt-packets", "io_packets", Some("corrupt")),
    entry("deferred-cache-inserts", "counter", Some("cache-deferred_insert")),
    entry("deferred-cache-lookup", "counter", Some("cache-deferred_lookup")),
    entry("qsize-a", "cache_size", Some("answers")),
    entry("qsize-q", "cache_size", Some("questions")),
    entry("servfail-packets", "io_packets", Some("servfail")),
    entry("timedout-packets", "io_packets", Some("timeout")),
    entry("udp4-answers", "dns_answer", Some("udp4")),
    entry("udp4-queries", "dns_question", Some("queries-udp4")),
    entry("udp6-answers", "dns_answer", Some("udp6")),
    entry("udp6-queries", "dns_question", Some("queries-udp6")),
    // Recursor: answers by rcode
    entry("noerror-answers", "dns_rcode", Some("NOERROR")),
    entry("nxdomain-answers", "dns_rcode", Some("NXDOMAIN")),
    entry("servfail-answers", "dns_rcode", Some("SERVFAIL")),
    // CPU time in milliseconds
    entry("sys-msec", "cpu", Some("system")),
    entry("user-msec", "cpu", Some("user")),
    entry("qa-latency", "latency", None),
    entry("cache-entries", "cache_size", None),
    entry("cache-hits", "cache_result", Some("hit")),
    entry("cache-misses", "cache_result", Some("miss")),
    entry("questions", "dns_qtype", Some("total")),
];

/// Returns the first table entry whose raw name equals `raw_name`.
pub fn resolve(raw_name: &str) -> Option<&'static LookupEntry> {
    LOOKUP_TABLE.iter().find(|e| e.raw_name == raw_name)
}
