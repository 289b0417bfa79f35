//! Console rendering of the posture scores streamed back by the service.

use std::fmt;

use crate::types::ScoreUpdate;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricStatus {
    Excellent,
    Good,
    Warning,
    Poor,
}

impl MetricStatus {
    pub fn from_percent(percent: f64) -> Self {
        if percent >= 90.0 {
            MetricStatus::Excellent
        } else if percent >= 80.0 {
            MetricStatus::Good
        } else if percent >= 60.0 {
            MetricStatus::Warning
        } else {
            MetricStatus::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricStatus::Excellent => "excellent",
            MetricStatus::Good => "good",
            MetricStatus::Warning => "warning",
            MetricStatus::Poor => "poor",
        }
    }
}

pub fn metric_label(key: &str) -> &str {
    match key {
        "knee_angle" => "Knee Angle",
        "head_tilt" => "Head Tilt",
        "arm_angle" => "Arm Angle",
        "arm_bent_angle" => "Arm Bent Angle",
        "leg_spread" => "Leg Spread",
        "back_angle" => "Back Angle",
        "foot_to_shoulder_offset" => "Foot to Shoulder Offset",
        other => other,
    }
}

pub fn recommendation(key: &str, value: f64) -> &'static str {
    match key {
        "knee_bent_angle" => {
            if value < 10.0 {
                "Straighten your knees for better stability."
            } else if value <= 30.0 {
                "Knee bend is optimal for balance."
            } else {
                "Bend your knees slightly to improve balance and reduce strain."
            }
        }
        "head_tilt" => {
            if value > 30.0 {
                "Lower your head slightly to maintain a neutral neck position."
            } else if (-10.0..=10.0).contains(&value) {
                "Head position is neutral."
            } else if value < -30.0 {
                "Raise your head slightly to avoid excessive neck flexion."
            } else {
                "Head position is within tolerance."
            }
        }
        "arm_angle" => {
            if value < 60.0 {
                "Raise your arms for optimal posture and control."
            } else if (80.0..=100.0).contains(&value) {
                "Arm position is optimal."
            } else if value > 100.0 {
                "Lower your arms to reduce shoulder fatigue."
            } else {
                "Arm position is within tolerance."
            }
        }
        "arm_bent_angle" => {
            if value < 10.0 {
                "Decrease elbow bend for better recoil control."
            } else if value <= 40.0 {
                "Elbow bend is optimal for control."
            } else {
                "Bend your elbows more for better recoil control."
            }
        }
        "leg_spread" => {
            if value < 20.0 {
                "Widen your stance for improved balance."
            } else if value <= 40.0 {
                "Leg spread is optimal for stability."
            } else {
                "Narrow your stance for better stability."
            }
        }
        "back_angle" => {
            if value > 45.0 {
                "Bend your back less to avoid lower back strain."
            } else if (-30.0..=30.0).contains(&value) {
                "Back posture is good."
            } else if value < -45.0 {
                "Standing too straight; lean forward slightly for better stability."
            } else {
                "Back posture is within tolerance."
            }
        }
        "foot_to_shoulder_offset_left" => {
            if value > 6.0 {
                "Bring your feet closer to your shoulders for optimal support."
            } else if (-3.0..=3.0).contains(&value) {
                "Foot position is optimal."
            } else if value < -6.0 {
                "Move your feet slightly apart for better balance."
            } else {
                "Foot position is within tolerance."
            }
        }
        _ => "No recommendation available.",
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoreRow {
    pub key: String,
    pub label: String,
    pub percent: f64,
    pub status: MetricStatus,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Recommendation {
    pub key: String,
    pub value: f64,
    pub percent: f64,
    pub advice: &'static str,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsReport {
    pub rows: Vec<ScoreRow>,
    pub overall: Option<u32>,
    pub recommendations: Vec<Recommendation>,
}

impl MetricsReport {
    pub fn from_scores(scores: &ScoreUpdate) -> Self {
        let percents = scores.raw_scores_percent.clone().unwrap_or_default();

        let rows: Vec<ScoreRow> = percents
            .iter()
            .map(|(key, &percent)| ScoreRow {
                key: key.clone(),
                label: metric_label(key).to_string(),
                percent,
                status: MetricStatus::from_percent(percent),
            })
            .collect();

        let overall = (!rows.is_empty()).then(|| {
            let mean = rows.iter().map(|r| r.percent).sum::<f64>() / rows.len() as f64;
            mean.round().max(0.0) as u32
        });

        let recommendations = scores
            .measurements
            .iter()
            .flatten()
            .map(|(key, &value)| {
                // both foot offsets are scored as one combined metric
                let score_key = match key.as_str() {
                    "foot_to_shoulder_offset_left" | "foot_to_shoulder_offset_right" => {
                        "foot_to_shoulder_offset"
                    }
                    other => other,
                };
                Recommendation {
                    key: key.clone(),
                    value,
                    percent: percents.get(score_key).copied().unwrap_or(0.0),
                    advice: recommendation(key, value),
                }
            })
            .collect();

        Self {
            rows,
            overall,
            recommendations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.recommendations.is_empty()
    }
}

fn overall_verdict(score: u32) -> &'static str {
    if score >= 90 {
        "Excellent"
    } else if score >= 70 {
        "Good"
    } else {
        "Needs Improvement"
    }
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "no analysis data to display");
        }
        if let Some(score) = self.overall {
            writeln!(
                f,
                "overall {score}% ({}) across {} metric(s)",
                overall_verdict(score),
                self.rows.len()
            )?;
        }
        for row in &self.rows {
            writeln!(
                f,
                "  {:<26} {:>6.1}%  {}",
                row.label,
                row.percent,
                row.status.as_str()
            )?;
        }
        if !self.recommendations.is_empty() {
            writeln!(f, "recommendations:")?;
        }
        for rec in &self.recommendations {
            writeln!(
                f,
                "  {:<30} {:>6.1}%  {}",
                rec.key.replace('_', " "),
                rec.percent,
                rec.advice
            )?;
        }
        Ok(())
    }
}
