//! SPF term grammar: mechanisms, modifiers, and qualifiers (RFC 7208
//! Sections 4.6.2 and 5).
//!
//! A term is parsed from one whitespace-delimited token. The mechanism
//! pattern is tried first, the modifier pattern second; the first match
//! wins and there is no backtracking between the two.

use std::fmt;

/// Qualifier prefix on a mechanism. Defaults to Pass if omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    /// `+` (or no prefix): the sender is authorized.
    Pass,
    /// `-`: the sender is not authorized.
    Fail,
    /// `~`: weak non-authorization.
    SoftFail,
    /// `?`: no assertion.
    Neutral,
    /// No qualifier applies (never produced by parsing).
    None,
}

impl Qualifier {
    /// Parse a single-char qualifier prefix. Returns (Qualifier, remaining
    /// str). If no qualifier prefix, defaults to Pass.
    pub fn parse_prefix(s: &str) -> (Qualifier, &str) {
        match s.as_bytes().first() {
            Some(b'+') => (Qualifier::Pass, &s[1..]),
            Some(b'-') => (Qualifier::Fail, &s[1..]),
            Some(b'~') => (Qualifier::SoftFail, &s[1..]),
            Some(b'?') => (Qualifier::Neutral, &s[1..]),
            _ => (Qualifier::Pass, s),
        }
    }

    /// The prefix character this qualifier is written as.
    pub fn symbol(self) -> &'static str {
        match self {
            Qualifier::Pass => "+",
            Qualifier::Fail => "-",
            Qualifier::SoftFail => "~",
            Qualifier::Neutral => "?",
            Qualifier::None => "",
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Mechanism type tokens (RFC 7208 Section 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MechanismKind {
    /// Unrecognized type token; the term still parses.
    Unknown,
    /// `all`, always matches, conventionally last.
    All,
    /// `ip4`, matches an IPv4 network.
    Ip4,
    /// `ip6`, matches an IPv6 network.
    Ip6,
    /// `a`, matches the address records of a domain.
    A,
    /// `mx`, matches a domain's mail exchangers.
    Mx,
    /// `ptr`, matches on a verified reverse mapping.
    Ptr,
    /// `exists`, matches if the domain resolves at all.
    Exists,
    /// `include`, recursive evaluation of another policy.
    Include,
}

impl MechanismKind {
    /// Name table, canonical wire casing. Lookup is ASCII-case-insensitive.
    const NAMES: &'static [(MechanismKind, &'static str)] = &[
        (MechanismKind::Unknown, "unknown"),
        (MechanismKind::All, "all"),
        (MechanismKind::Ip4, "ip4"),
        (MechanismKind::Ip6, "ip6"),
        (MechanismKind::A, "a"),
        (MechanismKind::Mx, "mx"),
        (MechanismKind::Ptr, "ptr"),
        (MechanismKind::Exists, "exists"),
        (MechanismKind::Include, "include"),
    ];

    pub fn from_name(s: &str) -> Option<Self> {
        lookup_kind(Self::NAMES, s)
    }

    pub fn name(self) -> &'static str {
        kind_name(Self::NAMES, self)
    }
}

/// Modifier type tokens (RFC 7208 Section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    /// Unrecognized modifier name; parsed but dropped on serialization.
    Unknown,
    /// `redirect=`, continue evaluation with another domain's policy.
    Redirect,
    /// `exp=`, domain whose TXT record explains a failure.
    Exp,
}

impl ModifierKind {
    const NAMES: &'static [(ModifierKind, &'static str)] = &[
        (ModifierKind::Unknown, "unknown"),
        (ModifierKind::Redirect, "redirect"),
        (ModifierKind::Exp, "exp"),
    ];

    pub fn from_name(s: &str) -> Option<Self> {
        lookup_kind(Self::NAMES, s)
    }

    pub fn name(self) -> &'static str {
        kind_name(Self::NAMES, self)
    }
}

fn lookup_kind<K: Copy>(table: &[(K, &'static str)], s: &str) -> Option<K> {
    table
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(s))
        .map(|(kind, _)| *kind)
}

fn kind_name<K: Copy + PartialEq>(table: &[(K, &'static str)], kind: K) -> &'static str {
    table
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, name)| *name)
        .unwrap_or("unknown")
}

/// A mechanism term: `[qualifier]type[:host][/prefix[/prefix6]]`.
///
/// Prefixes are kept as written, without range validation. Note the
/// serializer writes the IPv6 prefix as `//prefix6` while the parser
/// accepts a single slash; the asymmetry is inherited wire behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mechanism {
    pub qualifier: Qualifier,
    pub kind: MechanismKind,
    pub host: Option<String>,
    /// IPv4 CIDR prefix length.
    pub prefix: Option<u32>,
    /// IPv6 CIDR prefix length.
    pub prefix6: Option<u32>,
}

/// A modifier term: `name=value`. No qualifier, no prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modifier {
    pub kind: ModifierKind,
    pub host: String,
}

/// A single term of an SPF record. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Mechanism(Mechanism),
    Modifier(Modifier),
}

impl Term {
    /// Parse one whitespace-delimited token. `None` means the token matches
    /// neither pattern; record assembly treats that as fatal for the whole
    /// record. An unrecognized type token is NOT a parse failure — it
    /// produces an `Unknown`-kind term so forward-compatible extensions
    /// survive parsing.
    pub fn parse(token: &str) -> Option<Term> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        parse_mechanism(token).or_else(|| parse_modifier(token))
    }
}

/// Mechanism pattern: optional qualifier, alphanumeric type token, optional
/// `:host` (up to the next `/`, must be non-empty), optional `/prefix` and
/// `/prefix6` digit runs. The whole token must be consumed.
fn parse_mechanism(s: &str) -> Option<Term> {
    let (qualifier, rest) = Qualifier::parse_prefix(s);

    let kind_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if kind_len == 0 {
        return None;
    }
    let (kind_token, mut rest) = rest.split_at(kind_len);

    let mut host = None;
    if let Some(r) = rest.strip_prefix(':') {
        let host_len = r.bytes().take_while(|&b| b != b'/').count();
        if host_len == 0 {
            return None;
        }
        host = Some(r[..host_len].to_string());
        rest = &r[host_len..];
    }

    let mut prefix = None;
    let mut prefix6 = None;
    if let Some(r) = rest.strip_prefix('/') {
        let (value, r) = take_digits(r)?;
        prefix = value;
        rest = r;
        if let Some(r) = rest.strip_prefix('/') {
            let (value, r) = take_digits(r)?;
            prefix6 = value;
            rest = r;
        }
    }

    if !rest.is_empty() {
        return None;
    }

    let kind = MechanismKind::from_name(kind_token).unwrap_or(MechanismKind::Unknown);
    Some(Term::Mechanism(Mechanism {
        qualifier,
        kind,
        host,
        prefix,
        prefix6,
    }))
}

/// A non-empty digit run. The value is `None` when the digits overflow
/// `u32`; the run is consumed either way.
fn take_digits(s: &str) -> Option<(Option<u32>, &str)> {
    let len = s.bytes().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }
    Some((s[..len].parse().ok(), &s[len..]))
}

/// Modifier pattern: alphabetic name, `=`, non-empty value with no
/// whitespace.
fn parse_modifier(s: &str) -> Option<Term> {
    let (name, value) = s.split_once('=')?;
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return None;
    }
    let kind = ModifierKind::from_name(name).unwrap_or(ModifierKind::Unknown);
    Some(Term::Modifier(Modifier {
        kind,
        host: value.to_string(),
    }))
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.qualifier {
            Qualifier::Fail | Qualifier::SoftFail | Qualifier::Neutral => {
                f.write_str(self.qualifier.symbol())?
            }
            Qualifier::Pass | Qualifier::None => {}
        }
        f.write_str(self.kind.name())?;
        if let Some(host) = self.host.as_deref().filter(|h| !h.is_empty()) {
            write!(f, ":{host}")?;
        }
        if let Some(prefix) = self.prefix {
            write!(f, "/{prefix}")?;
        }
        if let Some(prefix6) = self.prefix6 {
            write!(f, "//{prefix6}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind.name(), self.host)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Mechanism(m) => m.fmt(f),
            Term::Modifier(m) => m.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mech(token: &str) -> Mechanism {
        match Term::parse(token) {
            Some(Term::Mechanism(m)) => m,
            other => panic!("expected mechanism for {token:?}, got {other:?}"),
        }
    }

    fn modifier(token: &str) -> Modifier {
        match Term::parse(token) {
            Some(Term::Modifier(m)) => m,
            other => panic!("expected modifier for {token:?}, got {other:?}"),
        }
    }

    // ---- Qualifier ----

    #[test]
    fn qualifier_parse_explicit() {
        assert_eq!(Qualifier::parse_prefix("+all"), (Qualifier::Pass, "all"));
        assert_eq!(Qualifier::parse_prefix("-all"), (Qualifier::Fail, "all"));
        assert_eq!(Qualifier::parse_prefix("~all"), (Qualifier::SoftFail, "all"));
        assert_eq!(Qualifier::parse_prefix("?all"), (Qualifier::Neutral, "all"));
    }

    #[test]
    fn qualifier_parse_default() {
        assert_eq!(Qualifier::parse_prefix("all"), (Qualifier::Pass, "all"));
        assert_eq!(
            Qualifier::parse_prefix("include:x"),
            (Qualifier::Pass, "include:x")
        );
    }

    // ---- Registry tables ----

    #[test]
    fn kind_lookup_case_insensitive() {
        assert_eq!(MechanismKind::from_name("ALL"), Some(MechanismKind::All));
        assert_eq!(MechanismKind::from_name("Ip4"), Some(MechanismKind::Ip4));
        assert_eq!(MechanismKind::from_name("bogus"), None);
        assert_eq!(
            ModifierKind::from_name("REDIRECT"),
            Some(ModifierKind::Redirect)
        );
    }

    #[test]
    fn kind_names_are_canonical() {
        assert_eq!(MechanismKind::Include.name(), "include");
        assert_eq!(ModifierKind::Exp.name(), "exp");
        // "unknown" is itself a named entry, so unknown terms re-parse as
        // unknown rather than failing.
        assert_eq!(
            MechanismKind::from_name("unknown"),
            Some(MechanismKind::Unknown)
        );
    }

    // ---- Mechanism pattern ----

    #[test]
    fn parse_all_with_qualifiers() {
        for (token, qualifier) in [
            ("all", Qualifier::Pass),
            ("+all", Qualifier::Pass),
            ("-all", Qualifier::Fail),
            ("~all", Qualifier::SoftFail),
            ("?all", Qualifier::Neutral),
        ] {
            let m = mech(token);
            assert_eq!(m.kind, MechanismKind::All);
            assert_eq!(m.qualifier, qualifier, "token {token:?}");
            assert_eq!(m.host, None);
        }
    }

    #[test]
    fn parse_include() {
        let m = mech("include:_spf.example.com");
        assert_eq!(m.kind, MechanismKind::Include);
        assert_eq!(m.host.as_deref(), Some("_spf.example.com"));
        assert_eq!(m.prefix, None);
    }

    #[test]
    fn colon_with_empty_host_rejected() {
        assert_eq!(Term::parse("include:"), None);
        assert_eq!(Term::parse("a:/24"), None);
    }

    #[test]
    fn parse_a_bare_and_with_host() {
        assert_eq!(mech("a").host, None);
        assert_eq!(mech("a:example.com").host.as_deref(), Some("example.com"));
    }

    #[test]
    fn parse_prefixes() {
        let m = mech("a:example.com/24");
        assert_eq!(m.prefix, Some(24));
        assert_eq!(m.prefix6, None);

        // Both prefixes are written with single slashes on the way in.
        let m = mech("mx:example.com/24/64");
        assert_eq!(m.kind, MechanismKind::Mx);
        assert_eq!(m.prefix, Some(24));
        assert_eq!(m.prefix6, Some(64));
    }

    #[test]
    fn serialized_double_slash_does_not_reparse() {
        // The serializer emits `//prefix6`; the grammar does not accept it.
        assert_eq!(Term::parse("a:example.com/24//64"), None);
        assert_eq!(Term::parse("a//64"), None);
    }

    #[test]
    fn trailing_slash_rejected() {
        assert_eq!(Term::parse("a/"), None);
        assert_eq!(Term::parse("a/24/"), None);
    }

    #[test]
    fn parse_ip4_with_prefix() {
        let m = mech("ip4:104.21.71.145/32");
        assert_eq!(m.kind, MechanismKind::Ip4);
        assert_eq!(m.host.as_deref(), Some("104.21.71.145"));
        assert_eq!(m.prefix, Some(32));
    }

    #[test]
    fn parse_ip6_host_keeps_colons() {
        let m = mech("ip6:2001:db8::cd30");
        assert_eq!(m.kind, MechanismKind::Ip6);
        assert_eq!(m.host.as_deref(), Some("2001:db8::cd30"));
    }

    #[test]
    fn unknown_type_token_still_parses() {
        let m = mech("zz:example.com");
        assert_eq!(m.kind, MechanismKind::Unknown);
        assert_eq!(m.host.as_deref(), Some("example.com"));
    }

    #[test]
    fn overflowing_prefix_digits_drop_the_value() {
        let m = mech("a:example.com/99999999999999999999");
        assert_eq!(m.prefix, None);
    }

    #[test]
    fn whitespace_around_token_tolerated() {
        let m = mech("  -all  ");
        assert_eq!(m.qualifier, Qualifier::Fail);
        assert_eq!(m.kind, MechanismKind::All);
    }

    // ---- Modifier pattern ----

    #[test]
    fn parse_redirect() {
        let m = modifier("redirect=_spf.example.com");
        assert_eq!(m.kind, ModifierKind::Redirect);
        assert_eq!(m.host, "_spf.example.com");
    }

    #[test]
    fn parse_exp_case_insensitive() {
        assert_eq!(modifier("EXP=explain.example.com").kind, ModifierKind::Exp);
    }

    #[test]
    fn unknown_modifier_name_still_parses() {
        let m = modifier("foo=bar");
        assert_eq!(m.kind, ModifierKind::Unknown);
        assert_eq!(m.host, "bar");
    }

    #[test]
    fn modifier_requires_value() {
        assert_eq!(Term::parse("redirect="), None);
        assert_eq!(Term::parse("=value"), None);
    }

    #[test]
    fn modifier_value_may_contain_equals() {
        assert_eq!(modifier("exp=a=b").host, "a=b");
    }

    #[test]
    fn mechanism_pattern_wins_over_modifier() {
        // A `:host` containing `=` is still a mechanism: the mechanism
        // pattern is tried first and there is no backtracking.
        let m = mech("a:b=c");
        assert_eq!(m.host.as_deref(), Some("b=c"));
    }

    #[test]
    fn garbage_matches_neither_pattern() {
        assert_eq!(Term::parse(""), None);
        assert_eq!(Term::parse("   "), None);
        assert_eq!(Term::parse("***"), None);
        assert_eq!(Term::parse("-"), None);
        assert_eq!(Term::parse("a=b c"), None);
    }

    // ---- Display ----

    #[test]
    fn display_mechanisms() {
        assert_eq!(mech("-all").to_string(), "-all");
        assert_eq!(mech("~all").to_string(), "~all");
        // The Pass qualifier is implicit and not written back.
        assert_eq!(mech("+all").to_string(), "all");
        assert_eq!(
            mech("ip4:104.21.71.145/32").to_string(),
            "ip4:104.21.71.145/32"
        );
    }

    #[test]
    fn display_prefix6_uses_double_slash() {
        assert_eq!(
            mech("a:example.com/24/64").to_string(),
            "a:example.com/24//64"
        );
    }

    #[test]
    fn display_modifier() {
        assert_eq!(
            modifier("redirect=_spf.example.com").to_string(),
            "redirect=_spf.example.com"
        );
    }

    #[test]
    fn unknown_mechanism_displays_canonical_unknown() {
        let m = mech("zz:example.com");
        assert_eq!(m.to_string(), "unknown:example.com");
        // Re-parsing the canonical form yields an equal term.
        assert_eq!(Term::parse("unknown:example.com"), Some(Term::Mechanism(m)));
    }
}
