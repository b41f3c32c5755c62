//! Knowledge state machine
//!
//! The state is recomputed from the read percentage after every mutation
//! and never moves backwards.

use crate::topic::KnowledgeState;
use paperhound_common::config::KnowledgeConfig;

/// Read percentages (0-100) at which a topic is promoted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateThresholds {
    pub intermediate: f64,
    pub experienced: f64,
}

impl From<&KnowledgeConfig> for StateThresholds {
    fn from(config: &KnowledgeConfig) -> Self {
        Self {
            intermediate: config.intermediate_threshold,
            experienced: config.experienced_threshold,
        }
    }
}

impl Default for StateThresholds {
    fn default() -> Self {
        Self::from(&KnowledgeConfig::default())
    }
}

/// Read share as a percentage rounded to two decimals; 0 for an empty topic.
pub fn progress_percentage(read: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = read as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

/// State implied by `percentage`, never lower than `current`.
pub fn next_state(current: KnowledgeState, percentage: f64, thresholds: &StateThresholds) -> KnowledgeState {
    let earned = if percentage >= thresholds.experienced {
        KnowledgeState::Experienced
    } else if percentage >= thresholds.intermediate {
        KnowledgeState::Intermediate
    } else {
        KnowledgeState::Beginner
    };
    current.max(earned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_rounding() {
        assert_eq!(progress_percentage(0, 0), 0.0);
        assert_eq!(progress_percentage(1, 3), 33.33);
        assert_eq!(progress_percentage(2, 3), 66.67);
        assert_eq!(progress_percentage(4, 4), 100.0);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let t = StateThresholds::default();
        assert_eq!(next_state(KnowledgeState::Beginner, 79.99, &t), KnowledgeState::Beginner);
        assert_eq!(next_state(KnowledgeState::Beginner, 80.0, &t), KnowledgeState::Intermediate);
        assert_eq!(next_state(KnowledgeState::Intermediate, 95.0, &t), KnowledgeState::Experienced);
    }

    #[test]
    fn test_can_skip_directly_to_experienced() {
        let t = StateThresholds::default();
        assert_eq!(next_state(KnowledgeState::Beginner, 100.0, &t), KnowledgeState::Experienced);
    }

    #[test]
    fn test_never_regresses() {
        let t = StateThresholds::default();
        assert_eq!(next_state(KnowledgeState::Intermediate, 10.0, &t), KnowledgeState::Intermediate);
        assert_eq!(next_state(KnowledgeState::Experienced, 0.0, &t), KnowledgeState::Experienced);
    }
}
