use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The ten heavenly stems, in cycle order
pub const STEMS: [char; 10] = ['甲', '乙', '丙', '丁', '戊', '己', '庚', '辛', '壬', '癸'];

/// The twelve earthly branches, in cycle order
pub const BRANCHES: [char; 12] = [
    '子', '丑', '寅', '卯', '辰', '巳', '午', '未', '申', '酉', '戌', '亥',
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PillarError {
    #[error("Pillar must be two characters separated by a space, got {0:?}")]
    Malformed(String),

    #[error("Unknown heavenly stem: {0}")]
    UnknownStem(char),

    #[error("Unknown earthly branch: {0}")]
    UnknownBranch(char),
}

/// One stem+branch pair of a chart, written on the wire as `"甲 子"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pillar {
    pub stem: char,
    pub branch: char,
}

impl Pillar {
    pub fn new(stem: char, branch: char) -> Result<Self, PillarError> {
        if !STEMS.contains(&stem) {
            return Err(PillarError::UnknownStem(stem));
        }
        if !BRANCHES.contains(&branch) {
            return Err(PillarError::UnknownBranch(branch));
        }
        Ok(Self { stem, branch })
    }
}

impl FromStr for Pillar {
    type Err = PillarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(' ');
        let (stem, branch) = match (parts.next(), parts.next(), parts.next()) {
            (Some(stem), Some(branch), None) => (stem, branch),
            _ => return Err(PillarError::Malformed(s.to_string())),
        };

        let single = |part: &str| {
            let mut chars = part.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        };

        match (single(stem), single(branch)) {
            (Some(stem), Some(branch)) => Pillar::new(stem, branch),
            _ => Err(PillarError::Malformed(s.to_string())),
        }
    }
}

impl TryFrom<String> for Pillar {
    type Error = PillarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pillar> for String {
    fn from(pillar: Pillar) -> Self {
        pillar.to_string()
    }
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.stem, self.branch)
    }
}

/// Birth date and hour as entered by the user (local civil time)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct BirthData {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl BirthData {
    pub fn new(year: i32, month: u32, day: u32, hour: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
        }
    }
}

impl fmt::Display for BirthData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02}-{:02} {:02}:00",
            self.year, self.month, self.day, self.hour
        )
    }
}

/// The four pillars returned by `/calculate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pillars {
    #[serde(rename = "year_pillar")]
    pub year: Pillar,
    #[serde(rename = "month_pillar")]
    pub month: Pillar,
    #[serde(rename = "day_pillar")]
    pub day: Pillar,
    #[serde(rename = "hour_pillar")]
    pub hour: Pillar,
}

impl Pillars {
    /// Pillars in display order with their labels
    pub fn labeled(&self) -> [(&'static str, Pillar); 4] {
        [
            ("Year", self.year),
            ("Month", self.month),
            ("Day", self.day),
            ("Hour", self.hour),
        ]
    }
}

impl fmt::Display for Pillars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {} | {} | {}", self.year, self.month, self.day, self.hour)
    }
}

/// Body of `POST /save_chart`: birth fields plus pillar fields, flat
#[derive(Debug, Clone, Serialize)]
pub struct SaveChartRequest {
    #[serde(flatten)]
    pub birth: BirthData,
    #[serde(flatten)]
    pub pillars: Pillars,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveChartResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub chart_id: i64,
}

/// A chart as listed by `/my_charts`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedChart {
    pub id: i64,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub birth_info: String,
    #[serde(rename = "pillars", default)]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub pillars: Pillars,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl SavedChart {
    /// Heading for the chart card, falling back to the plain date
    pub fn title(&self) -> &str {
        if self.birth_info.is_empty() {
            &self.date
        } else {
            &self.birth_info
        }
    }
}

/// Envelope of `GET /my_charts`
#[derive(Debug, Clone, Deserialize)]
pub struct ChartList {
    #[serde(default)]
    pub data: Vec<SavedChart>,
}

/// Payload of `GET /health`
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pillar() {
        let pillar: Pillar = "甲 子".parse().expect("valid pillar");
        assert_eq!(pillar.stem, '甲');
        assert_eq!(pillar.branch, '子');
        assert_eq!(pillar.to_string(), "甲 子");
    }

    #[test]
    fn test_parse_pillar_malformed() {
        assert!(matches!("甲子".parse::<Pillar>(), Err(PillarError::Malformed(_))));
        assert!(matches!("甲  子".parse::<Pillar>(), Err(PillarError::Malformed(_))));
        assert!(matches!("甲 子 丑".parse::<Pillar>(), Err(PillarError::Malformed(_))));
        assert!(matches!("".parse::<Pillar>(), Err(PillarError::Malformed(_))));
    }

    #[test]
    fn test_parse_pillar_unknown_characters() {
        assert_eq!("子 甲".parse::<Pillar>(), Err(PillarError::UnknownStem('子')));
        assert_eq!("甲 乙".parse::<Pillar>(), Err(PillarError::UnknownBranch('乙')));
    }

    #[test]
    fn test_parse_calculate_response() {
        let json = r#"{"year_pillar":"庚 午","month_pillar":"辛 巳","day_pillar":"甲 子","hour_pillar":"庚 午","calculated_at":"2025-01-01T00:00:00"}"#;
        let pillars: Pillars = serde_json::from_str(json).expect("Failed to parse pillars JSON");
        assert_eq!(pillars.year.to_string(), "庚 午");
        assert_eq!(pillars.day.stem, '甲');
        assert_eq!(pillars.to_string(), "庚 午 | 辛 巳 | 甲 子 | 庚 午");
    }

    #[test]
    fn test_save_chart_request_is_flat() {
        let request = SaveChartRequest {
            birth: BirthData::new(1990, 5, 15, 14),
            pillars: Pillars {
                year: "庚 午".parse().unwrap(),
                month: "辛 巳".parse().unwrap(),
                day: "甲 子".parse().unwrap(),
                hour: "庚 午".parse().unwrap(),
            },
        };
        let value = serde_json::to_value(&request).expect("serializable");
        assert_eq!(value["year"], 1990);
        assert_eq!(value["hour"], 14);
        assert_eq!(value["month_pillar"], "辛 巳");
    }

    #[test]
    fn test_parse_chart_list() {
        let json = r#"{"success":true,"data":[{"id":3,"date":"1990-05-15 14:00","birth_info":"1990年5月15日 14时","pillars":"庚 午 | 辛 巳 | 甲 子 | 庚 午","year_pillar":"庚 午","month_pillar":"辛 巳","day_pillar":"甲 子","hour_pillar":"庚 午","created_at":"2025-01-01T00:00:00"}]}"#;
        let list: ChartList = serde_json::from_str(json).expect("Failed to parse chart list JSON");
        assert_eq!(list.data.len(), 1);
        let chart = &list.data[0];
        assert_eq!(chart.id, 3);
        assert_eq!(chart.title(), "1990年5月15日 14时");
        assert_eq!(chart.pillars.hour.branch, '午');
    }

    #[test]
    fn test_birth_data_display() {
        assert_eq!(BirthData::new(1990, 5, 15, 4).to_string(), "1990-05-15 04:00");
    }
}
