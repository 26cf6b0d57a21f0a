// Bulk status-table parser for `show interfaces status` style dumps.
//
// Link status is decided by an ordered rule list. The first rule that returns a verdict
// wins; when every rule is inconclusive the port is Down. A false Up lets a VLAN change
// through to a live port unconfirmed, so no rule may infer Up from indirect evidence.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{PortMode, PortRecord, PortStatus};

use super::{interface, vlan_list};

static COLUMN_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("column gap regex"));

/// Up words as whole words only, so `disconnected` or `notconnected` never read as up.
static UP_SUBSTRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(link-?up|connected)\b").expect("up substring regex"));

/// Negated link words. Checked before any up substring.
const DOWN_SUBSTRINGS: &[&str] = &[
    "disconnect",
    "dis-connect",
    "notconnect",
    "not connect",
    "down",
];

/// Columns below this count after a run-of-whitespace split mean the device used single spaces.
const MIN_COLUMNS: usize = 3;

/// Lowercased view of one table row with the port name and free-text description removed.
#[derive(Debug, Clone, Default)]
pub struct RowSignals {
    pub tokens: Vec<String>,
    pub text: String,
}

impl RowSignals {
    pub fn from_tokens(tokens: &[&str]) -> Self {
        let tokens: Vec<String> = tokens.iter().map(|t| t.to_ascii_lowercase()).collect();
        let text = tokens.join(" ");
        Self { tokens, text }
    }
}

pub type LinkRule = (&'static str, fn(&RowSignals) -> Option<PortStatus>);

/// Highest priority first. New firmware quirks go in as new entries.
pub const LINK_RULES: &[LinkRule] = &[
    ("exact_token", exact_token),
    ("compound_pair", compound_pair),
    ("speed_duplex", speed_duplex),
    ("substring", substring),
];

pub fn classify_link(signals: &RowSignals) -> PortStatus {
    LINK_RULES
        .iter()
        .find_map(|(_, rule)| rule(signals))
        .unwrap_or(PortStatus::Down)
}

/// Parses every recognizable port row. Header, separator and garbled lines are skipped.
pub fn parse_status_table(raw: &str) -> Vec<PortRecord> {
    raw.lines().filter_map(parse_row).collect()
}

pub fn parse_row(line: &str) -> Option<PortRecord> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut columns: Vec<&str> = COLUMN_GAP.split(trimmed).collect();
    if columns.len() < MIN_COLUMNS {
        columns = trimmed.split_whitespace().collect();
    }
    let port = *columns.first()?;
    if !interface::looks_like_port(port) {
        return None;
    }

    let rest = &columns[1..];
    let (description, field_columns) = match rest.first() {
        Some(first) if !is_field_value(first) => (first.trim().to_string(), &rest[1..]),
        _ => (String::new(), rest),
    };
    let tokens: Vec<&str> = field_columns
        .iter()
        .flat_map(|c| c.split_whitespace())
        .collect();
    let signals = RowSignals::from_tokens(&tokens);

    let (vlan, tagged_vlans) = extract_vlans(&signals);
    let mode = match extract_mode(&signals) {
        // Tables without a mode column: a lone VLAN is access, a membership list is general.
        PortMode::Unknown if vlan.is_some() && tagged_vlans.is_empty() => PortMode::Access,
        PortMode::Unknown if !tagged_vlans.is_empty() => PortMode::General,
        mode => mode,
    };
    Some(PortRecord {
        name: port.to_string(),
        status: classify_link(&signals),
        mode,
        vlan,
        tagged_vlans,
        description,
    })
}

const UP_WORDS: &[&str] = &["up", "connected", "connect"];
const DOWN_WORDS: &[&str] = &[
    "down",
    "notconnect",
    "notconnected",
    "not-connected",
    "nolink",
    "disconnect",
    "disconnected",
    "dis-connected",
];
const DISABLED_WORDS: &[&str] = &["disabled", "disable", "shutdown", "admin-down"];
const ERR_DISABLED_WORDS: &[&str] = &[
    "err-disabled",
    "errdisabled",
    "err-disable",
    "errdisable",
    "err_disabled",
];
const DUPLEX_WORDS: &[&str] = &["full", "half", "a-full", "a-half", "auto", "n/a", "unknown"];
const NO_LINK_MARKERS: &[&str] = &["unknown", "n/a", "--"];

fn word_status(word: &str) -> Option<PortStatus> {
    if ERR_DISABLED_WORDS.contains(&word) {
        Some(PortStatus::ErrDisabled)
    } else if DISABLED_WORDS.contains(&word) {
        Some(PortStatus::Disabled)
    } else if DOWN_WORDS.contains(&word) {
        Some(PortStatus::Down)
    } else if UP_WORDS.contains(&word) {
        Some(PortStatus::Up)
    } else {
        None
    }
}

/// Most severe wins when a row carries conflicting words.
fn severity(status: PortStatus) -> u8 {
    match status {
        PortStatus::ErrDisabled => 3,
        PortStatus::Disabled => 2,
        PortStatus::Down => 1,
        PortStatus::Up => 0,
    }
}

fn most_severe(statuses: impl Iterator<Item = PortStatus>) -> Option<PortStatus> {
    statuses.max_by_key(|s| severity(*s))
}

/// Rule 1: whole-token match against the status vocabulary. A negated token (`not connected`)
/// is left for the compound rule.
pub fn exact_token(signals: &RowSignals) -> Option<PortStatus> {
    most_severe(signals.tokens.iter().enumerate().filter_map(|(i, tok)| {
        let negated = i > 0 && matches!(signals.tokens[i - 1].as_str(), "not" | "no");
        if negated { None } else { word_status(tok) }
    }))
}

/// Rule 2: two-token phrases split across columns.
pub fn compound_pair(signals: &RowSignals) -> Option<PortStatus> {
    most_severe(signals.tokens.windows(2).filter_map(|pair| {
        match (pair[0].as_str(), pair[1].as_str()) {
            ("link", "up") | ("line", "up") => Some(PortStatus::Up),
            ("link", "down") | ("not", "connected") | ("not", "present") | ("no", "link") => {
                Some(PortStatus::Down)
            }
            ("admin", "down") | ("administratively", "down") => Some(PortStatus::Disabled),
            ("err", "disabled") | ("error", "disabled") => Some(PortStatus::ErrDisabled),
            _ => None,
        }
    }))
}

/// Rule 3: speed/duplex columns. Explicit no-link markers there mean Down. Negotiated
/// speed alone never yields Up; it is left for the remaining rules and the Down default.
pub fn speed_duplex(signals: &RowSignals) -> Option<PortStatus> {
    let duplex_at = signals
        .tokens
        .iter()
        .position(|t| DUPLEX_WORDS.contains(&t.as_str()))?;
    let speed_window = &signals.tokens[duplex_at..(duplex_at + 2).min(signals.tokens.len())];
    if speed_window
        .iter()
        .any(|t| NO_LINK_MARKERS.contains(&t.as_str()))
    {
        Some(PortStatus::Down)
    } else {
        None
    }
}

/// Rule 4: last resort substring search over the joined row.
pub fn substring(signals: &RowSignals) -> Option<PortStatus> {
    let text = signals.text.as_str();
    if text.contains("err-disable") || text.contains("errdisable") {
        Some(PortStatus::ErrDisabled)
    } else if text.contains("disabled") || text.contains("shutdown") {
        Some(PortStatus::Disabled)
    } else if DOWN_SUBSTRINGS.iter().any(|w| text.contains(w)) {
        Some(PortStatus::Down)
    } else if UP_SUBSTRING.is_match(text) {
        Some(PortStatus::Up)
    } else {
        None
    }
}

fn extract_mode(signals: &RowSignals) -> PortMode {
    signals
        .tokens
        .iter()
        .find_map(|t| PortMode::from_token(t))
        .unwrap_or(PortMode::Unknown)
}

/// Parenthesized primary beats plain numbers. Plain numbers only count before the duplex /
/// speed columns, where `10` and `100` would be link speeds.
fn extract_vlans(signals: &RowSignals) -> (Option<u16>, Vec<u16>) {
    let mut tagged = Vec::new();
    let mut primary_paren = None;
    let mut primary_plain = None;
    let mut past_vlan_columns = false;

    for tok in &signals.tokens {
        if DUPLEX_WORDS.contains(&tok.as_str()) {
            past_vlan_columns = true;
        }
        if past_vlan_columns || !vlan_list::looks_like_list(tok) {
            continue;
        }
        if let Some(p) = vlan_list::parenthesized_primary(tok) {
            primary_paren.get_or_insert(p);
        }
        if tok.contains(',') || tok.contains('-') || tok.contains('(') {
            tagged.extend(vlan_list::expand(tok));
        } else if let Ok(v) = tok.parse::<u16>()
            && (1..=4094).contains(&v)
        {
            primary_plain.get_or_insert(v);
        }
    }

    let primary = primary_paren.or(primary_plain);
    if let Some(p) = primary {
        tagged.retain(|v| *v != p);
    }
    tagged.sort_unstable();
    tagged.dedup();
    (primary, tagged)
}

/// Values that can sit in the column right after the port name when the description is empty.
fn is_field_value(column: &str) -> bool {
    let first = column.split_whitespace().next().unwrap_or("").to_ascii_lowercase();
    vlan_list::looks_like_list(&first)
        || PortMode::from_token(&first).is_some()
        || DUPLEX_WORDS.contains(&first.as_str())
        || word_status(&first).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(line: &str) -> RowSignals {
        RowSignals::from_tokens(&line.split_whitespace().collect::<Vec<_>>())
    }

    #[test]
    fn exact_token_rule() {
        assert_eq!(exact_token(&sig("10 full 1000 up")), Some(PortStatus::Up));
        assert_eq!(exact_token(&sig("10 down")), Some(PortStatus::Down));
        assert_eq!(exact_token(&sig("up err-disabled")), Some(PortStatus::ErrDisabled));
        assert_eq!(exact_token(&sig("not connected")), None);
        assert_eq!(exact_token(&sig("10 full 1000")), None);
    }

    #[test]
    fn compound_pair_rule() {
        assert_eq!(compound_pair(&sig("not connected")), Some(PortStatus::Down));
        assert_eq!(compound_pair(&sig("admin down")), Some(PortStatus::Disabled));
        assert_eq!(compound_pair(&sig("err disabled")), Some(PortStatus::ErrDisabled));
        assert_eq!(compound_pair(&sig("link up")), Some(PortStatus::Up));
        assert_eq!(compound_pair(&sig("up")), None);
    }

    #[test]
    fn speed_duplex_rule_never_says_up() {
        assert_eq!(speed_duplex(&sig("10 full 1000 auto")), None);
        assert_eq!(speed_duplex(&sig("10 n/a unknown auto")), Some(PortStatus::Down));
        assert_eq!(speed_duplex(&sig("10")), None);
    }

    #[test]
    fn substring_rule() {
        assert_eq!(substring(&sig("(err-disabled)")), Some(PortStatus::ErrDisabled));
        assert_eq!(substring(&sig("linkdown")), Some(PortStatus::Down));
        assert_eq!(substring(&sig("[connected]")), Some(PortStatus::Up));
        assert_eq!(substring(&sig("10 full 1000")), None);
    }

    #[test]
    fn disconnected_is_never_up() {
        assert_eq!(exact_token(&sig("10 full 1000 disconnected")), Some(PortStatus::Down));
        assert_eq!(substring(&sig("(disconnected)")), Some(PortStatus::Down));
        assert_eq!(substring(&sig("[dis-connected]")), Some(PortStatus::Down));
        assert_eq!(substring(&sig("port-disconnected")), Some(PortStatus::Down));
        assert_eq!(substring(&sig("[linkup]")), Some(PortStatus::Up));
        assert_eq!(substring(&sig("reconnected-lately")), None);

        let row = parse_row("Gi1/0/7    Lab printer    10    Full   1000    Auto  Disconnected").unwrap();
        assert_eq!(row.status, PortStatus::Down);
        assert_eq!(row.description, "Lab printer");
    }

    #[test]
    fn inconclusive_row_defaults_down() {
        assert_eq!(classify_link(&sig("10 full 1000 auto")), PortStatus::Down);
        assert_eq!(classify_link(&sig("")), PortStatus::Down);
    }
}
