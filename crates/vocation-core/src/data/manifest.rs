use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, VocationError};

#[derive(Deserialize)]
struct PersonRecord {
    occupation: Vec<String>,
}

/// Expected label for every identifier, read from a people index such as
/// `processed_names.json`:
///
/// ```json
/// { "Marie_Curie": { "occupation": ["chemist", "physicist"] } }
/// ```
///
/// The last listed occupation is the one used as the label. Entries are
/// kept sorted by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeopleIndex {
    labels: BTreeMap<String, String>,
}

impl PeopleIndex {
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let records: BTreeMap<String, PersonRecord> = serde_json::from_str(json)?;
        let mut labels = BTreeMap::new();
        for (id, record) in records {
            let Some(label) = record.occupation.into_iter().last() else {
                return Err(VocationError::MissingLabel { id });
            };
            labels.insert(id, label);
        }
        Ok(Self { labels })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            labels: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn label(&self, id: &str) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    /// `(identifier, expected label)` in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_occupation_is_the_label() {
        let index = PeopleIndex::from_json(
            r#"{
                "Marie_Curie": {"occupation": ["chemist", "physicist"], "born": 1867},
                "Ada_Lovelace": {"occupation": ["mathematician"]}
            }"#,
        )
        .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.label("Marie_Curie"), Some("physicist"));
        let ids: Vec<&str> = index.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["Ada_Lovelace", "Marie_Curie"]);
    }

    #[test]
    fn empty_occupation_rejected() {
        let err = PeopleIndex::from_json(r#"{"X": {"occupation": []}}"#).unwrap_err();
        assert!(matches!(err, VocationError::MissingLabel { ref id } if id == "X"));
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(PeopleIndex::from_json(r#"{"X": {"job": "cook"}}"#).is_err());
    }
}
