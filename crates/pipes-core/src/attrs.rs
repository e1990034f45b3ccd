use std::collections::HashMap;

/// A single attribute value: either a plain string, or a nested sub-map.
///
/// The original key/value store (`kvhash`) lets any entry's value be
/// another hash, which it uses to attach a "hash" subtree to a key (for
/// example a source's private bookkeeping) alongside its plain string
/// attributes. `copy_unique_except_hashes` exists to skip exactly those
/// subtrees when propagating attributes downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    SubMap(AttrDict),
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

/// A string-keyed attribute dictionary, attached to every `Source` and
/// usable as a nested value within itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrDict {
    entries: HashMap<String, AttrValue>,
}

impl AttrDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn lookup(&self, key: &str) -> Option<&AttrValue> {
        self.entries.get(key)
    }

    /// Fetches a string-valued attribute, panicking if it is absent or is
    /// actually a sub-map. Mirrors `kvGetString`'s abort-on-missing-key
    /// contract: attribute lookups in this codebase are for structural
    /// metadata that must already be present by the time it is read.
    pub fn get_string(&self, key: &str) -> &str {
        match self.entries.get(key) {
            Some(AttrValue::Str(s)) => s,
            Some(AttrValue::SubMap(_)) => {
                panic!("attribute {key} is a sub-map, not a string")
            }
            None => panic!("missing required attribute {key}"),
        }
    }

    pub fn get_string_opt(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(AttrValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.entries.iter()
    }

    /// Copies every entry from `src` into `self`, except entries whose
    /// value is a sub-map. Used by every passthrough-ish tool to inherit
    /// an upstream source's plain attributes without dragging along its
    /// private bookkeeping.
    pub fn copy_unique_except_hashes(&mut self, src: &AttrDict) {
        for (k, v) in src.iter() {
            if matches!(v, AttrValue::Str(_)) {
                self.entries.insert(k.clone(), v.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_skips_submaps() {
        let mut src = AttrDict::new();
        src.define("datatype", "float64");
        src.define("dimensions", "xyzt");
        let mut private = AttrDict::new();
        private.define("cursor", "0");
        src.define("private", AttrValue::SubMap(private));

        let mut dst = AttrDict::new();
        dst.copy_unique_except_hashes(&src);

        assert_eq!(dst.get_string("datatype"), "float64");
        assert_eq!(dst.get_string("dimensions"), "xyzt");
        assert!(!dst.contains("private"));
    }

    #[test]
    #[should_panic(expected = "missing required attribute")]
    fn get_string_panics_on_missing() {
        let d = AttrDict::new();
        d.get_string("nope");
    }
}
