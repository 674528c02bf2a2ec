use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label shown when no region is selected.
pub const ALL_REGIONS_LABEL: &str = "All States";

/// Sentinel filter value meaning "no restriction".
pub const ALL: &str = "All";

/// Canonical name of a first-level administrative area.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Region selection supplied by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    All,
    Region(Region),
}

impl Filter {
    /// `None`, empty input and the `"All"` sentinel all select every region.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some(ALL) => Filter::All,
            Some(name) => Filter::Region(Region::new(name)),
        }
    }

    pub fn region(&self) -> Option<&Region> {
        match self {
            Filter::All => None,
            Filter::Region(r) => Some(r),
        }
    }

    pub fn scope_label(&self) -> &str {
        match self {
            Filter::All => ALL_REGIONS_LABEL,
            Filter::Region(r) => r.as_str(),
        }
    }
}

/// How raw values of a region column are cased before synonym lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Casing {
    AsIs,
    /// Warehouse `INITCAP`: first letter of every word upper, the rest lower.
    Title,
}

/// The region column of a dataset with the rules that turn its raw values
/// into canonical regions.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionColumn {
    pub column: String,
    pub casing: Casing,
    /// Known misspelling -> canonical spelling. Exact, case-sensitive match
    /// on the cased value.
    pub synonyms: BTreeMap<String, String>,
}

impl RegionColumn {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            casing: Casing::AsIs,
            synonyms: BTreeMap::new(),
        }
    }

    pub fn title_cased(mut self) -> Self {
        self.casing = Casing::Title;
        self
    }

    pub fn synonym(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.synonyms.insert(alias.into(), canonical.into());
        self
    }

    /// Canonical spelling of a raw value: surrounding spaces stripped (like
    /// the warehouse `BTRIM`), then casing, then synonyms.
    pub fn canonicalize(&self, raw: &str) -> String {
        let trimmed = raw.trim_matches(' ');
        let cased = match self.casing {
            Casing::AsIs => trimmed.to_string(),
            Casing::Title => initcap(trimmed),
        };
        match self.synonyms.get(&cased) {
            Some(canonical) => canonical.clone(),
            None => cased,
        }
    }
}

/// Mirrors the warehouse `INITCAP`: words are maximal runs of alphanumerics.
pub fn initcap(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut at_word_start = true;
    for c in raw.chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_parse_treats_sentinel_and_blank_as_all() {
        assert_eq!(Filter::parse(None), Filter::All);
        assert_eq!(Filter::parse(Some("All")), Filter::All);
        assert_eq!(Filter::parse(Some("  ")), Filter::All);
        assert_eq!(
            Filter::parse(Some("Goa")),
            Filter::Region(Region::new("Goa"))
        );
        assert_eq!(Filter::All.scope_label(), "All States");
    }

    #[test]
    fn initcap_matches_warehouse_semantics() {
        assert_eq!(initcap("HIMACHAL PRADESH"), "Himachal Pradesh");
        assert_eq!(initcap("jammu & kashmir"), "Jammu & Kashmir");
        assert_eq!(initcap("ANDAMAN-NICOBAR"), "Andaman-Nicobar");
    }

    #[test]
    fn synonyms_apply_after_casing() {
        let col = RegionColumn::new("STATE")
            .title_cased()
            .synonym("Uttrakhand", "Uttarakhand");
        assert_eq!(col.canonicalize("UTTRAKHAND"), "Uttarakhand");
        assert_eq!(col.canonicalize("SIKKIM"), "Sikkim");

        let exact = RegionColumn::new("STATE").synonym("Uttrakhand", "Uttarakhand");
        assert_eq!(exact.canonicalize("Uttrakhand"), "Uttarakhand");
        // case-sensitive: an upper-case alias is not a known misspelling
        assert_eq!(exact.canonicalize("UTTRAKHAND"), "UTTRAKHAND");
    }

    #[test]
    fn padding_is_stripped_before_synonym_lookup() {
        let col = RegionColumn::new("STATE").synonym("Uttrakhand", "Uttarakhand");
        assert_eq!(col.canonicalize("Uttrakhand "), "Uttarakhand");
        assert_eq!(col.canonicalize("  Goa"), "Goa");

        let titled = RegionColumn::new("STATE").title_cased();
        assert_eq!(titled.canonicalize(" SIKKIM "), "Sikkim");
    }
}
