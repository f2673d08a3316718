use chrono::Weekday;

/// Weekly rest day whose absences are tracked separately. Locale dependent.
pub const DEFAULT_REST_DAY: Weekday = Weekday::Fri;

/// Rest-day absences at or above this count are "frequent".
pub const DEFAULT_FREQUENT_REST_DAY_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub rest_day: Weekday,
    pub frequent_rest_day_threshold: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rest_day: DEFAULT_REST_DAY,
            frequent_rest_day_threshold: DEFAULT_FREQUENT_REST_DAY_THRESHOLD,
        }
    }
}

impl EngineConfig {
    pub fn new(rest_day: Weekday, frequent_rest_day_threshold: u32) -> Self {
        Self {
            rest_day,
            frequent_rest_day_threshold,
        }
    }
}
