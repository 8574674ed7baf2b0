use std::fmt;

use crate::error::{Error, Result};

/// Bidding zones known to the ENTSO-E Transparency Platform, with their EIC
/// area codes. See
/// <https://www.entsoe.eu/data/energy-identification-codes-eic/eic-approved-codes/>.
const BIDDING_ZONES: [(&str, &str); 21] = [
    ("NO1", "10YNO-1--------2"),
    ("NO2", "10YNO-2--------T"),
    ("NO3", "10YNO-3--------J"),
    ("NO4", "10YNO-4--------9"),
    ("NO5", "10Y1001A1001A48H"),
    ("SE1", "10Y1001A1001A44P"),
    ("SE2", "10Y1001A1001A45N"),
    ("SE3", "10Y1001A1001A46L"),
    ("SE4", "10Y1001A1001A47J"),
    ("DK1", "10YDK-1--------W"),
    ("DK2", "10YDK-2--------M"),
    ("FI", "10YFI-1--------U"),
    ("NL", "10YNL----------L"),
    // DE-LU
    ("DE", "10Y1001A1001A82H"),
    ("FR", "10YFR-RTE------C"),
    ("BE", "10YBE----------2"),
    ("AT", "10YAT-APG------L"),
    ("EE", "10Y1001A1001A39I"),
    ("LT", "10YLT-1001A0008Q"),
    ("LV", "10YLV-1001A00074"),
    ("PL", "10YPL-AREA-----S"),
];

const GROUPS: [(&str, &[&str]); 6] = [
    (
        "nordics",
        &["NO1", "NO2", "NO3", "NO4", "NO5", "SE1", "SE2", "SE3", "SE4", "DK1", "DK2", "FI"],
    ),
    ("norway", &["NO1", "NO2", "NO3", "NO4", "NO5"]),
    ("sweden", &["SE1", "SE2", "SE3", "SE4"]),
    ("denmark", &["DK1", "DK2"]),
    ("baltics", &["EE", "LT", "LV"]),
    ("cwe", &["DE", "AT", "BE", "FR", "NL", "PL"]),
];

/// Alternative spellings (after normalization) for registered codes.
const ALIASES: [(&str, &str); 1] = [("DELU", "DE")];

const ALL_GROUP: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiddingZone {
    pub code: String,
    pub eic: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneGroup {
    pub keyword: String,
    pub codes: Vec<String>,
}

/// Immutable lookup table of bidding zones and group keywords.
///
/// The `all` keyword is implicit and always expands to every zone in
/// registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneRegistry {
    zones: Vec<BiddingZone>,
    groups: Vec<ZoneGroup>,
}

impl Default for ZoneRegistry {
    fn default() -> Self {
        Self::entsoe()
    }
}

impl ZoneRegistry {
    /// The built-in registry of day-ahead bidding zones.
    pub fn entsoe() -> Self {
        let zones = BIDDING_ZONES
            .iter()
            .map(|(code, eic)| BiddingZone {
                code: code.to_string(),
                eic: eic.to_string(),
            })
            .collect();
        let groups = GROUPS
            .iter()
            .map(|(keyword, codes)| ZoneGroup {
                keyword: keyword.to_string(),
                codes: codes.iter().map(|c| c.to_string()).collect(),
            })
            .collect();
        Self { zones, groups }
    }

    /// Build a registry from custom tables. Group members must be registered
    /// codes and groups must not be empty.
    pub fn new(zones: Vec<BiddingZone>, groups: Vec<ZoneGroup>) -> Result<Self> {
        let registry = Self { zones, groups: Vec::new() };
        for group in &groups {
            if group.codes.is_empty() {
                return Err(Error::InvalidConfig(format!("zone group {} has no members", group.keyword)));
            }
            if let Some(bad) = group.codes.iter().find(|c| registry.zone(c).is_none()) {
                return Err(Error::UnknownZoneToken(vec![bad.clone()]));
            }
        }
        Ok(Self { groups, ..registry })
    }

    pub fn zones(&self) -> &[BiddingZone] {
        &self.zones
    }

    pub fn groups(&self) -> &[ZoneGroup] {
        &self.groups
    }

    /// Case-insensitive lookup of an explicit zone code.
    pub fn zone(&self, code: &str) -> Option<&BiddingZone> {
        let key = normalize_code(code);
        self.find_normalized(&key).or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| *alias == key)
                .and_then(|(_, target)| self.find_normalized(target))
        })
    }

    /// Registered codes are compared in normalized form too, so `DE_LU`
    /// and `DELU` name the same zone.
    fn find_normalized(&self, key: &str) -> Option<&BiddingZone> {
        self.zones.iter().find(|z| normalize_code(&z.code) == key)
    }

    pub fn eic_code(&self, code: &str) -> Option<&str> {
        self.zone(code).map(|z| z.eic.as_str())
    }

    /// Case-insensitive lookup of a group keyword, including `all`.
    pub fn group_members(&self, keyword: &str) -> Option<Vec<&str>> {
        let keyword = keyword.trim();
        if keyword.eq_ignore_ascii_case(ALL_GROUP) {
            return Some(self.zones.iter().map(|z| z.code.as_str()).collect());
        }
        self.groups
            .iter()
            .find(|g| g.keyword.eq_ignore_ascii_case(keyword))
            .map(|g| g.codes.iter().map(String::as_str).collect())
    }

    /// Keywords accepted by [`ZoneRegistry::group_members`].
    pub fn keywords(&self) -> Vec<&str> {
        std::iter::once(ALL_GROUP)
            .chain(self.groups.iter().map(|g| g.keyword.as_str()))
            .collect()
    }

    pub fn expand<S: AsRef<str>>(&self, tokens: &[S]) -> Result<ZoneSet> {
        expand(tokens, self)
    }
}

fn normalize_code(code: &str) -> String {
    code.trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Ordered, duplicate-free list of canonical bidding zone codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneSet {
    codes: Vec<String>,
}

impl ZoneSet {
    fn push(&mut self, code: &str) {
        if !self.contains(code) {
            self.codes.push(code.to_string());
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }
}

impl fmt::Display for ZoneSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.codes.join(", "))
    }
}

/// Expand zone codes and group keywords into a [`ZoneSet`].
///
/// Tokens may hold comma separated lists (`"NO1,NO2"`). Matching is
/// case-insensitive and codes keep the order in which they were first seen.
/// All unknown tokens are reported together.
pub fn expand<S: AsRef<str>>(tokens: &[S], registry: &ZoneRegistry) -> Result<ZoneSet> {
    let mut out = ZoneSet::default();
    let mut unknown: Vec<String> = Vec::new();
    let mut seen_any = false;

    for fragment in tokens
        .iter()
        .flat_map(|t| t.as_ref().split(','))
        .map(str::trim)
        .filter(|f| !f.is_empty())
    {
        seen_any = true;
        if let Some(zone) = registry.zone(fragment) {
            out.push(&zone.code);
        } else if let Some(members) = registry.group_members(fragment) {
            for code in members {
                out.push(code);
            }
        } else if !unknown.iter().any(|u| u == fragment) {
            unknown.push(fragment.to_string());
        }
    }

    if !unknown.is_empty() {
        return Err(Error::UnknownZoneToken(unknown));
    }
    if !seen_any || out.is_empty() {
        return Err(Error::EmptyZoneSet);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(set: &ZoneSet) -> Vec<&str> {
        set.iter().collect()
    }

    #[test]
    fn explicit_codes_are_case_insensitive_and_deduplicated() {
        let registry = ZoneRegistry::entsoe();
        let set = expand(&["NO1", "no1"], &registry).unwrap();
        assert_eq!(codes(&set), vec!["NO1"]);
    }

    #[test]
    fn group_keyword_keeps_registered_order() {
        let registry = ZoneRegistry::entsoe();
        let set = expand(&["norway"], &registry).unwrap();
        assert_eq!(codes(&set), vec!["NO1", "NO2", "NO3", "NO4", "NO5"]);
    }

    #[test]
    fn all_expands_to_every_registered_zone() {
        let registry = ZoneRegistry::entsoe();
        let set = expand(&["ALL"], &registry).unwrap();
        assert_eq!(set.len(), BIDDING_ZONES.len());
        assert_eq!(set.codes()[0], "NO1");
        assert_eq!(set.codes()[20], "PL");
    }

    #[test]
    fn groups_and_codes_merge_in_first_seen_order() {
        let registry = ZoneRegistry::entsoe();
        let set = expand(&["SE3", "norway", "nordics", "NO2"], &registry).unwrap();
        assert_eq!(
            codes(&set),
            vec!["SE3", "NO1", "NO2", "NO3", "NO4", "NO5", "SE1", "SE2", "SE4", "DK1", "DK2", "FI"]
        );
    }

    #[test]
    fn comma_lists_and_aliases() {
        let registry = ZoneRegistry::entsoe();
        let set = expand(&["NO1,NO2", " no_3 ", "DE_LU"], &registry).unwrap();
        assert_eq!(codes(&set), vec!["NO1", "NO2", "NO3", "DE"]);
        assert_eq!(registry.eic_code("de_lu"), Some("10Y1001A1001A82H"));
    }

    #[test]
    fn unknown_tokens_are_reported_together() {
        let registry = ZoneRegistry::entsoe();
        match expand(&["NO1", "XX9"], &registry) {
            Err(Error::UnknownZoneToken(bad)) => assert_eq!(bad, vec!["XX9"]),
            other => panic!("unexpected {other:?}"),
        }
        match expand(&["XX9", "nordic", "NO1", "XX9"], &registry) {
            Err(Error::UnknownZoneToken(bad)) => assert_eq!(bad, vec!["XX9", "nordic"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_input_fails() {
        let registry = ZoneRegistry::entsoe();
        let none: [&str; 0] = [];
        assert!(matches!(expand(&none, &registry), Err(Error::EmptyZoneSet)));
        assert!(matches!(expand(&[" , "], &registry), Err(Error::EmptyZoneSet)));
    }

    #[test]
    fn custom_registry_is_validated() {
        let zones = vec![BiddingZone {
            code: "NO1".into(),
            eic: "10YNO-1--------2".into(),
        }];
        let bad = vec![ZoneGroup {
            keyword: "west".into(),
            codes: vec!["NO5".into()],
        }];
        assert!(ZoneRegistry::new(zones.clone(), bad).is_err());

        let ok = vec![ZoneGroup {
            keyword: "east".into(),
            codes: vec!["NO1".into()],
        }];
        let registry = ZoneRegistry::new(zones, ok).unwrap();
        assert_eq!(registry.keywords(), vec!["all", "east"]);
        assert_eq!(codes(&registry.expand(&["East"]).unwrap()), vec!["NO1"]);

        let empty = vec![ZoneGroup {
            keyword: "none".into(),
            codes: Vec::new(),
        }];
        let zones = ZoneRegistry::entsoe().zones().to_vec();
        assert!(matches!(ZoneRegistry::new(zones, empty), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn custom_codes_with_separators_are_found() {
        let zones = vec![
            BiddingZone {
                code: "NO_1".into(),
                eic: "10YNO-1--------2".into(),
            },
            BiddingZone {
                code: "DE_LU".into(),
                eic: "10Y1001A1001A82H".into(),
            },
        ];
        let groups = vec![ZoneGroup {
            keyword: "cwe".into(),
            codes: vec!["DE_LU".into()],
        }];
        let registry = ZoneRegistry::new(zones, groups).unwrap();

        assert_eq!(registry.eic_code("DE_LU"), Some("10Y1001A1001A82H"));
        assert_eq!(registry.zone("no1").map(|z| z.code.as_str()), Some("NO_1"));
        let set = registry.expand(&["DE-LU", "no_1", "cwe"]).unwrap();
        assert_eq!(codes(&set), vec!["DE_LU", "NO_1"]);
    }
}
