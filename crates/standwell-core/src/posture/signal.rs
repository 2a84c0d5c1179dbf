use serde::{Deserialize, Serialize};

/// Posture-quality transition reported by the motion layer.
///
/// Raw sensor data never reaches the alerting components; they only see
/// these transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostureQuality {
    Good,
    Poor,
}

impl std::str::FromStr for PostureQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "good" => Ok(PostureQuality::Good),
            "poor" | "bad" => Ok(PostureQuality::Poor),
            other => Err(format!("unknown posture quality: {other}")),
        }
    }
}
