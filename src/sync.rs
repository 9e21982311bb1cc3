use serde::{Deserialize, Serialize};

use crate::constants::{
    CLAIM_GRACE_SECS, CLAIM_INTERVAL_SECS, DAILY_CLAIM_POINTS, KEYS_PER_CONVERSION,
    POINTS_PER_CONVERSION,
};
use crate::session::SessionState;

/// Last counters accepted by the ledger for one player.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedProgress {
    #[serde(rename = "highScore")]
    pub high_score: u64,
    #[serde(rename = "currentScore")]
    pub current_score: u64,
    #[serde(rename = "currentLevel")]
    pub current_level: u32,
    #[serde(rename = "highestLevel")]
    pub highest_level: u32,
    #[serde(rename = "totalKeys")]
    pub total_keys: u64,
    pub points: u64,
    #[serde(rename = "nextClaimSecs")]
    pub next_claim_secs: u64,
}

/// Writes to hand to the ledger. `None` fields are left untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    #[serde(rename = "highScore")]
    pub high_score: Option<u64>,
    #[serde(rename = "currentScore")]
    pub current_score: u64,
    #[serde(rename = "currentLevel")]
    pub current_level: u32,
    #[serde(rename = "highestLevel")]
    pub highest_level: Option<u32>,
    #[serde(rename = "keysToAdd")]
    pub keys_to_add: Option<u64>,
}

pub fn plan_sync(state: &SessionState, recorded: &RecordedProgress) -> SyncPlan {
    SyncPlan {
        high_score: (state.score > recorded.high_score).then_some(state.score),
        current_score: state.score,
        current_level: state.level,
        highest_level: (state.level > recorded.highest_level).then_some(state.level),
        keys_to_add: Some(state.unsynced_keys()).filter(|keys| *keys > 0),
    }
}

impl SyncPlan {
    pub fn apply(&self, recorded: &RecordedProgress) -> RecordedProgress {
        RecordedProgress {
            high_score: self.high_score.unwrap_or(recorded.high_score),
            current_score: self.current_score,
            current_level: self.current_level,
            highest_level: self.highest_level.unwrap_or(recorded.highest_level),
            total_keys: recorded.total_keys + self.keys_to_add.unwrap_or(0),
            ..recorded.clone()
        }
    }
}

pub fn can_claim(next_claim_secs: u64, now_secs: u64) -> bool {
    now_secs > next_claim_secs.saturating_add(CLAIM_GRACE_SECS)
}

/// Grants the daily point, or `None` while the claim window is still closed.
pub fn apply_claim(recorded: &RecordedProgress, now_secs: u64) -> Option<RecordedProgress> {
    if !can_claim(recorded.next_claim_secs, now_secs) {
        return None;
    }
    Some(RecordedProgress {
        points: recorded.points + DAILY_CLAIM_POINTS,
        next_claim_secs: now_secs + CLAIM_INTERVAL_SECS,
        ..recorded.clone()
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ConversionQuote {
    pub batches: u64,
    #[serde(rename = "keysSpent")]
    pub keys_spent: u64,
    #[serde(rename = "pointsGained")]
    pub points_gained: u64,
}

/// Whole batches only; the remainder below one batch stays as keys.
pub fn quote_conversion(keys_requested: u64, keys_available: u64) -> Option<ConversionQuote> {
    let batches = keys_requested.min(keys_available) / KEYS_PER_CONVERSION;
    if batches == 0 {
        return None;
    }
    Some(ConversionQuote {
        batches,
        keys_spent: batches * KEYS_PER_CONVERSION,
        points_gained: batches * POINTS_PER_CONVERSION,
    })
}

impl ConversionQuote {
    pub fn apply(&self, recorded: &RecordedProgress) -> RecordedProgress {
        RecordedProgress {
            total_keys: recorded.total_keys - self.keys_spent.min(recorded.total_keys),
            points: recorded.points + self.points_gained,
            ..recorded.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(score: u64, level: u32, total_keys: u64) -> SessionState {
        SessionState {
            score,
            level,
            total_keys,
            ..SessionState::new()
        }
    }

    #[test]
    fn plan_skips_fields_that_would_not_improve() {
        let recorded = RecordedProgress {
            high_score: 500,
            highest_level: 6,
            ..RecordedProgress::default()
        };
        let plan = plan_sync(&state(300, 4, 0), &recorded);
        assert_eq!(
            plan,
            SyncPlan {
                high_score: None,
                current_score: 300,
                current_level: 4,
                highest_level: None,
                keys_to_add: None,
            }
        );
    }

    #[test]
    fn plan_includes_improvements_and_keys() {
        let recorded = RecordedProgress {
            high_score: 500,
            highest_level: 6,
            total_keys: 10,
            ..RecordedProgress::default()
        };
        let plan = plan_sync(&state(800, 7, 3), &recorded);
        assert_eq!(plan.high_score, Some(800));
        assert_eq!(plan.highest_level, Some(7));
        assert_eq!(plan.keys_to_add, Some(3));

        let next = plan.apply(&recorded);
        assert_eq!(next.high_score, 800);
        assert_eq!(next.highest_level, 7);
        assert_eq!(next.current_level, 7);
        assert_eq!(next.total_keys, 13);
    }

    #[test]
    fn keys_already_synced_are_not_planned_again() {
        let recorded = RecordedProgress {
            total_keys: 2,
            ..RecordedProgress::default()
        };
        let synced = state(0, 1, 2).mark_synced();
        assert_eq!(plan_sync(&synced, &recorded).keys_to_add, None);

        let more = synced.collect_key();
        let plan = plan_sync(&more, &recorded);
        assert_eq!(plan.keys_to_add, Some(1));
        assert_eq!(plan.apply(&recorded).total_keys, 3);
    }

    #[test]
    fn equal_score_is_not_a_new_high_score() {
        let recorded = RecordedProgress {
            high_score: 500,
            highest_level: 3,
            ..RecordedProgress::default()
        };
        let plan = plan_sync(&state(500, 3, 0), &recorded);
        assert_eq!(plan.high_score, None);
        assert_eq!(plan.highest_level, None);
    }

    #[test]
    fn claim_opens_only_after_grace_period() {
        assert!(!can_claim(1_000, 1_000));
        assert!(!can_claim(1_000, 1_010));
        assert!(can_claim(1_000, 1_011));
        assert!(can_claim(0, 11));

        let recorded = RecordedProgress {
            next_claim_secs: 1_000,
            points: 4,
            ..RecordedProgress::default()
        };
        assert!(apply_claim(&recorded, 1_005).is_none());
        let claimed = apply_claim(&recorded, 2_000).expect("window is open");
        assert_eq!(claimed.points, 5);
        assert_eq!(claimed.next_claim_secs, 2_000 + CLAIM_INTERVAL_SECS);
        assert!(apply_claim(&claimed, 2_050).is_none());
    }

    #[test]
    fn conversion_rounds_down_to_whole_batches() {
        assert_eq!(quote_conversion(49, 1_000), None);
        assert_eq!(quote_conversion(120, 30), None);
        let quote = quote_conversion(120, 1_000).expect("two batches");
        assert_eq!(
            quote,
            ConversionQuote {
                batches: 2,
                keys_spent: 100,
                points_gained: 20,
            }
        );

        let recorded = RecordedProgress {
            total_keys: 130,
            points: 1,
            ..RecordedProgress::default()
        };
        let next = quote.apply(&recorded);
        assert_eq!(next.total_keys, 30);
        assert_eq!(next.points, 21);
    }
}
