use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scheduled reminder. Users may keep several, each with its own
/// lifecycle; disabled reminders are kept but never fire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReminderSpec {
    pub id: Uuid,
    /// Zero-padded 24h wall-clock time, e.g. "09:00".
    pub time: String,
    pub enabled: bool,
    /// IANA zone the time is interpreted in, e.g. "America/New_York".
    pub timezone: String,
}

/// Coarse part of day a reminder fired in, used to pick notification copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPeriod {
    Morning,
    Afternoon,
    Evening,
}

impl DayPeriod {
    /// Classify a local hour (0-23).
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=11 => DayPeriod::Morning,
            12..=16 => DayPeriod::Afternoon,
            _ => DayPeriod::Evening,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DayPeriod::Morning => "morning",
            DayPeriod::Afternoon => "afternoon",
            DayPeriod::Evening => "evening",
        }
    }

    pub fn greeting(&self) -> &'static str {
        match self {
            DayPeriod::Morning => "Good morning",
            DayPeriod::Afternoon => "Good afternoon",
            DayPeriod::Evening => "Good evening",
        }
    }
}
