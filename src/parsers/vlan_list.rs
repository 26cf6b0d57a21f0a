// VLAN list notation: `10,20,30-35`, optionally with a parenthesized primary `(10),20`

use std::collections::BTreeSet;

/// Ranges wider than this are clamped; a `1-4094` trunk still counts as "many".
const MAX_RANGE_SPAN: u16 = 4094;

/// Expands a comma/range list into a sorted, deduplicated set. Unparseable items are skipped.
pub fn expand(raw: &str) -> Vec<u16> {
    let mut set = BTreeSet::new();
    for item in raw.split(',') {
        let item = item.trim().trim_matches(|c| c == '(' || c == ')');
        if item.is_empty() {
            continue;
        }
        match item.split_once('-') {
            Some((a, b)) => {
                let (Ok(a), Ok(b)) = (a.trim().parse::<u16>(), b.trim().parse::<u16>()) else {
                    continue;
                };
                if a == 0 || b < a || b > 4094 || b - a > MAX_RANGE_SPAN {
                    continue;
                }
                set.extend(a..=b);
            }
            None => {
                if let Ok(v) = item.parse::<u16>()
                    && (1..=4094).contains(&v)
                {
                    set.insert(v);
                }
            }
        }
    }
    set.into_iter().collect()
}

/// The parenthesized primary VLAN of a group-membership list, e.g. `10` in `(10),20,30`.
pub fn parenthesized_primary(raw: &str) -> Option<u16> {
    let start = raw.find('(')?;
    let end = raw[start..].find(')')? + start;
    raw[start + 1..end]
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|v| (1..=4094).contains(v))
}

/// True for tokens shaped like a VLAN list (digits, commas, hyphens, parentheses).
pub fn looks_like_list(token: &str) -> bool {
    !token.is_empty()
        && token.chars().any(|c| c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ',' | '-' | '(' | ')'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_ranges_and_commas() {
        assert_eq!(expand("10,20,30-33"), vec![10, 20, 30, 31, 32, 33]);
        assert_eq!(expand("5, 5 ,6"), vec![5, 6]);
    }

    #[test]
    fn skips_garbage_items() {
        assert_eq!(expand("abc,0,4095,12-10,7"), vec![7]);
    }

    #[test]
    fn parenthesized_primary_found() {
        assert_eq!(parenthesized_primary("(10),20,30"), Some(10));
        assert_eq!(parenthesized_primary("20,(30)"), Some(30));
        assert_eq!(parenthesized_primary("10,20"), None);
        assert_eq!(expand("(10),20"), vec![10, 20]);
    }

    #[test]
    fn list_shape() {
        assert!(looks_like_list("(1),10-20"));
        assert!(!looks_like_list("Full"));
        assert!(!looks_like_list("--"));
    }
}
