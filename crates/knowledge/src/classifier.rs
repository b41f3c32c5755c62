//! Maturity classification
//!
//! Rules, first match wins:
//! 1. published within the recent window -> recent
//! 2. old enough for the long horizon and cited enough -> foundation
//! 3. old enough for the medium horizon and cited enough -> foundation
//! 4. otherwise -> core
//!
//! A paper without a year is treated as published in the current year.

use crate::topic::Maturity;
use chrono::Datelike;
use paperhound_common::config::ClassificationConfig;
use paperhound_common::Paper;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRules {
    pub recent_window_years: i32,
    pub long_horizon_years: i32,
    pub long_horizon_citations: u64,
    pub medium_horizon_years: i32,
    pub medium_horizon_citations: u64,
    /// Fixed reference year; the current UTC year when unset
    pub current_year: Option<i32>,
}

/// Bucket plus the rule that chose it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub maturity: Maturity,
    pub reason: String,
}

impl From<&ClassificationConfig> for ClassificationRules {
    fn from(config: &ClassificationConfig) -> Self {
        Self {
            recent_window_years: config.recent_window_years,
            long_horizon_years: config.long_horizon_years,
            long_horizon_citations: config.long_horizon_citations,
            medium_horizon_years: config.medium_horizon_years,
            medium_horizon_citations: config.medium_horizon_citations,
            current_year: config.current_year,
        }
    }
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self::from(&ClassificationConfig::default())
    }
}

impl ClassificationRules {
    pub fn current_year(&self) -> i32 {
        self.current_year.unwrap_or_else(|| chrono::Utc::now().year())
    }

    pub fn classify(&self, paper: &Paper) -> Classification {
        self.classify_at(paper.year, paper.citations, self.current_year())
    }

    /// Pure rule evaluation for a given reference year
    pub fn classify_at(&self, year: Option<i32>, citations: u64, current_year: i32) -> Classification {
        let year = year.unwrap_or(current_year);

        if year >= current_year - self.recent_window_years {
            return Classification {
                maturity: Maturity::Recent,
                reason: format!("published within the last {} years", self.recent_window_years),
            };
        }
        if year <= current_year - self.long_horizon_years && citations >= self.long_horizon_citations {
            return Classification {
                maturity: Maturity::Foundation,
                reason: format!(
                    "{}+ years old with {}+ citations",
                    self.long_horizon_years, self.long_horizon_citations
                ),
            };
        }
        if year <= current_year - self.medium_horizon_years && citations >= self.medium_horizon_citations {
            return Classification {
                maturity: Maturity::Foundation,
                reason: format!(
                    "{}+ years old with {}+ citations",
                    self.medium_horizon_years, self.medium_horizon_citations
                ),
            };
        }
        Classification {
            maturity: Maturity::Core,
            reason: "established work below the foundation thresholds".to_string(),
        }
    }
}
