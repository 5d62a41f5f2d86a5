//! Normalization of classifier outputs into label/probability maps.
//!
//! Classifier endpoints answer in one of three shapes:
//!
//! - a list of records: `[{"label": "realism", "score": 0.9}, ...]`
//! - a single record: `{"label": "realism", "score": 0.9}`
//! - a wrapper: `{"outputs": [{"label": "realism", "score": 0.9}, ...]}`
//!
//! Each shape has its own parser returning `Option`; the first that matches
//! wins. Anything else normalizes to an empty map.

use std::collections::BTreeMap;

use serde_json::Value;

use dfguard_ml_client::LabelScore;

/// Lowercase label to probability in `[0, 1]` for one classifier response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelScoreMap(BTreeMap<String, f64>);

impl LabelScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. The first score seen for a label is kept.
    pub fn insert(&mut self, label: &str, score: f64) {
        if !score.is_finite() {
            return;
        }
        let label = normalize_label(label);
        if label.is_empty() {
            return;
        }
        self.0.entry(label).or_insert(score.clamp(0.0, 1.0));
    }

    /// Probability for `label`, compared case-insensitively.
    pub fn get(&self, label: &str) -> Option<f64> {
        self.0.get(&normalize_label(label)).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<'a> FromIterator<&'a LabelScore> for LabelScoreMap {
    fn from_iter<I: IntoIterator<Item = &'a LabelScore>>(iter: I) -> Self {
        let mut map = LabelScoreMap::new();
        for record in iter {
            map.insert(&record.label, record.score);
        }
        map
    }
}

/// Normalize one raw classifier response. Unknown shapes yield an empty map.
pub fn parse_label_scores(raw: &Value) -> LabelScoreMap {
    parse_record_list(raw)
        .or_else(|| parse_single_record(raw))
        .or_else(|| parse_outputs_wrapper(raw))
        .unwrap_or_default()
}

fn parse_record_list(raw: &Value) -> Option<LabelScoreMap> {
    let items = raw.as_array()?;
    let records: Vec<LabelScore> = items.iter().filter_map(parse_record).collect();
    Some(records.iter().collect())
}

fn parse_single_record(raw: &Value) -> Option<LabelScoreMap> {
    let record = parse_record(raw)?;
    Some(std::iter::once(&record).collect())
}

fn parse_outputs_wrapper(raw: &Value) -> Option<LabelScoreMap> {
    parse_record_list(raw.as_object()?.get("outputs")?)
}

fn parse_record(value: &Value) -> Option<LabelScore> {
    let object = value.as_object()?;
    let label = object.get("label")?.as_str()?;
    let score = object.get("score")?.as_f64()?;
    Some(LabelScore {
        label: label.to_string(),
        score,
    })
}

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}
