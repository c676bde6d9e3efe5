//! Parsers for PowerDNS control socket replies.
//!
//! These are pure functions over the reply text so they can be tested with
//! string inputs. Malformed input never fails: the parsers stop or skip and
//! return whatever pairs they could extract.

/// A raw statistic as found in a reply, before name resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStat<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

impl<'a> RawStat<'a> {
    pub fn new(name: &'a str, value: &'a str) -> Self {
        Self { name, value }
    }
}

/// Separators between names in a recursor command.
const COMMAND_SEPARATORS: &[char] = &[' ', '\t'];

/// Separators between values in a recursor reply.
const VALUE_SEPARATORS: &[char] = &[' ', '\t', '\n', '\r'];

/// Parses an authoritative server `SHOW *` reply.
///
/// Format: `corrupt-packets=0,deferred-cache-inserts=0,...,udp6-queries=0,`
///
/// - empty tokens (trailing or doubled commas) are skipped;
/// - a token without `=` ends parsing, the rest of the reply is ignored;
/// - a token with an empty value is skipped.
pub fn parse_server_reply(reply: &str) -> Vec<RawStat<'_>> {
    let mut stats = Vec::new();

    for token in reply.split(',').filter(|t| !t.is_empty()) {
        let Some((name, value)) = token.split_once('=') else {
            break;
        };
        if value.is_empty() {
            continue;
        }
        stats.push(RawStat::new(name, value));
    }

    stats
}

/// Parses a recursor `get ...` reply.
///
/// The reply carries values only, in the order the names were requested.
/// Names are taken from `command` (the exact string that was sent), minus
/// its leading verb. Pairing stops at the end of the shorter sequence.
pub fn parse_recursor_reply<'a>(command: &'a str, reply: &'a str) -> Vec<RawStat<'a>> {
    let names = split_tokens(command, COMMAND_SEPARATORS).skip(1);
    let values = split_tokens(reply, VALUE_SEPARATORS);

    names
        .zip(values)
        .map(|(name, value)| RawStat::new(name, value))
        .collect()
}

fn split_tokens<'a>(s: &'a str, separators: &'a [char]) -> impl Iterator<Item = &'a str> {
    s.split(separators).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs<'a>(stats: &[RawStat<'a>]) -> Vec<(&'a str, &'a str)> {
        stats.iter().map(|s| (s.name, s.value)).collect()
    }

    #[test]
    fn test_server_reply_basic() {
        let stats = parse_server_reply("a=1,b=2,c=3");
        assert_eq!(pairs(&stats), vec![("a", "1"), ("b", "2"), ("c", "3")]);
    }

    #[test]
    fn test_server_reply_trailing_comma() {
        assert_eq!(pairs(&parse_server_reply("a=1,")), vec![("a", "1")]);
    }

    #[test]
    fn test_server_reply_stops_at_token_without_equals() {
        let stats = parse_server_reply("a=1,garbage,b=2");
        assert_eq!(pairs(&stats), vec![("a", "1")]);
    }

    #[test]
    fn test_server_reply_skips_empty_value() {
        assert_eq!(pairs(&parse_server_reply("a=,b=2")), vec![("b", "2")]);
    }

    #[test]
    fn test_server_reply_splits_on_first_equals() {
        assert_eq!(pairs(&parse_server_reply("a=b=c")), vec![("a", "b=c")]);
    }

    #[test]
    fn test_server_reply_doubled_commas_and_empty() {
        assert_eq!(pairs(&parse_server_reply(",,a=1,,b=2")), vec![("a", "1"), ("b", "2")]);
        assert!(parse_server_reply("").is_empty());
        assert!(parse_server_reply(",").is_empty());
    }

    #[test]
    fn test_server_reply_realistic() {
        let reply = "corrupt-packets=0,deferred-cache-inserts=12,latency=250,\
                     packetcache-hit=1000,udp6-queries=3,\n";
        let stats = parse_server_reply(reply);
        assert_eq!(stats.len(), 5);
        assert_eq!(stats[1], RawStat::new("deferred-cache-inserts", "12"));
        assert_eq!(stats[4], RawStat::new("udp6-queries", "3"));
    }

    #[test]
    fn test_recursor_reply_basic() {
        let stats = parse_recursor_reply("get foo bar baz", "1 2 3");
        assert_eq!(pairs(&stats), vec![("foo", "1"), ("bar", "2"), ("baz", "3")]);
    }

    #[test]
    fn test_recursor_reply_short() {
        let stats = parse_recursor_reply("get foo bar baz", "1 2");
        assert_eq!(pairs(&stats), vec![("foo", "1"), ("bar", "2")]);
    }

    #[test]
    fn test_recursor_reply_long() {
        let stats = parse_recursor_reply("get foo", "1 2 3");
        assert_eq!(pairs(&stats), vec![("foo", "1")]);
    }

    #[test]
    fn test_recursor_reply_mixed_whitespace() {
        let stats = parse_recursor_reply("get\tfoo  bar\tbaz", "10\n20\r\n\t30\n");
        assert_eq!(pairs(&stats), vec![("foo", "10"), ("bar", "20"), ("baz", "30")]);
    }

    #[test]
    fn test_recursor_reply_verb_only() {
        assert!(parse_recursor_reply("get", "1 2 3").is_empty());
        assert!(parse_recursor_reply("", "1").is_empty());
        assert!(parse_recursor_reply("get foo", "").is_empty());
    }
}
