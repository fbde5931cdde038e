//! Categorical histograms over already fetched collections.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::AudioFeatures;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub label: String,
    pub count: usize,
    /// Share of all classified items, rounded to one decimal place.
    pub percentage: f64,
}

/// Counts the label `classify` assigns to every item.
///
/// Items classified as `None` are left out of both the buckets and the total the
/// percentages are computed against. Without any classified item the result is empty.
/// Buckets are ordered by descending count, then by label.
pub fn histogram<T, F>(items: &[T], classify: F) -> Vec<HistogramBucket>
where
    F: Fn(&T) -> Option<String>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in items.iter().filter_map(&classify) {
        *counts.entry(label).or_default() += 1;
    }

    let total: usize = counts.values().sum();
    let mut buckets: Vec<HistogramBucket> = counts
        .into_iter()
        .map(|(label, count)| HistogramBucket {
            label,
            count,
            percentage: percentage(count, total),
        })
        .collect();

    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    buckets
}

/// `count / total * 100` rounded to one decimal; 0 when nothing was classified.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(count as f64 / total as f64 * 100.0)
}

/// Mood quadrant from valence and energy, both split at 0.5.
pub fn classify_mood(features: &AudioFeatures) -> Option<String> {
    let valence = features.valence.filter(|v| v.is_finite())?;
    let energy = features.energy.filter(|e| e.is_finite())?;

    let mood = match (valence >= 0.5, energy >= 0.5) {
        (true, true) => "energetic",
        (true, false) => "chill",
        (false, true) => "intense",
        (false, false) => "melancholic",
    };
    Some(mood.to_string())
}

pub fn classify_energy(features: &AudioFeatures) -> Option<String> {
    let energy = features.energy.filter(|e| e.is_finite())?;

    let level = if energy < 0.33 {
        "low"
    } else if energy < 0.66 {
        "medium"
    } else {
        "high"
    };
    Some(level.to_string())
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
