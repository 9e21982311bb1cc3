use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::session::SessionState;
use crate::sync::{
    apply_claim, plan_sync, quote_conversion, ConversionQuote, RecordedProgress, SyncPlan,
};
use crate::types::{LeaderboardEntry, LeaderboardResponse};

const STORE_VERSION: u8 = 1;
const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
const MAX_LEADERBOARD_LIMIT: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredPlayer {
    address: String,
    #[serde(flatten)]
    progress: RecordedProgress,
    #[serde(rename = "updatedAtMs", alias = "updated_at_ms")]
    updated_at_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ProgressStoreFile {
    version: u8,
    players: HashMap<String, StoredPlayer>,
}

#[derive(Clone, Debug, Deserialize)]
struct ProgressStoreFileRaw {
    version: u8,
    players: HashMap<String, serde_json::Value>,
}

/// Local mirror of what was last written to the ledger, keyed by player
/// address. Every mutation is flushed to disk immediately.
pub struct ProgressStore {
    file_path: PathBuf,
    players: HashMap<String, StoredPlayer>,
}

impl ProgressStore {
    /// Opens the store, starting empty when the file is missing or unreadable.
    pub fn new(file_path: PathBuf) -> Self {
        let players = match read_players(&file_path) {
            Ok(players) => players,
            Err(StoreError::Io(error)) if error.kind() == std::io::ErrorKind::NotFound => {
                HashMap::new()
            }
            Err(error) => {
                tracing::warn!(
                    path = %file_path.display(),
                    %error,
                    "starting with empty progress store"
                );
                HashMap::new()
            }
        };
        Self { file_path, players }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, address: &str) -> RecordedProgress {
        self.players
            .get(&address_key(address))
            .map(|player| player.progress.clone())
            .unwrap_or_default()
    }

    /// Plans a sync against the recorded counters, applies it and persists.
    pub fn apply_sync(&mut self, address: &str, state: &SessionState) -> Option<SyncPlan> {
        let key = address_key(address);
        if key.is_empty() {
            return None;
        }
        let recorded = self.get(&key);
        let plan = plan_sync(state, &recorded);
        self.put(address, plan.apply(&recorded));
        tracing::debug!(
            address = %key,
            score = plan.current_score,
            level = plan.current_level,
            "progress synced"
        );
        Some(plan)
    }

    pub fn claim_daily(&mut self, address: &str, now_secs: u64) -> Option<RecordedProgress> {
        let claimed = apply_claim(&self.get(address), now_secs)?;
        self.put(address, claimed.clone());
        Some(claimed)
    }

    pub fn convert_keys(
        &mut self,
        address: &str,
        keys_requested: u64,
    ) -> Option<ConversionQuote> {
        let recorded = self.get(address);
        let quote = quote_conversion(keys_requested, recorded.total_keys)?;
        self.put(address, quote.apply(&recorded));
        Some(quote)
    }

    pub fn leaderboard(&self, requested_limit: Option<usize>) -> LeaderboardResponse {
        LeaderboardResponse {
            generated_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            entries: self.top_entries(requested_limit),
        }
    }

    fn top_entries(&self, requested_limit: Option<usize>) -> Vec<LeaderboardEntry> {
        let limit = requested_limit
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
            .clamp(1, MAX_LEADERBOARD_LIMIT);
        let mut entries: Vec<LeaderboardEntry> = self
            .players
            .values()
            .map(|player| LeaderboardEntry {
                address: player.address.clone(),
                high_score: player.progress.high_score,
                highest_level: player.progress.highest_level,
                updated_at_ms: player.updated_at_ms,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.high_score
                .cmp(&a.high_score)
                .then_with(|| b.highest_level.cmp(&a.highest_level))
                .then_with(|| a.address.cmp(&b.address))
        });
        entries.truncate(limit);
        entries
    }

    fn put(&mut self, address: &str, progress: RecordedProgress) {
        let key = address_key(address);
        if key.is_empty() {
            return;
        }
        self.players.insert(
            key,
            StoredPlayer {
                address: address.trim().to_string(),
                progress,
                updated_at_ms: now_ms(),
            },
        );
        if let Err(error) = self.save() {
            tracing::error!(path = %self.file_path.display(), %error, "failed to persist progress");
        }
    }

    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = ProgressStoreFile {
            version: STORE_VERSION,
            players: self.players.clone(),
        };
        let text = serde_json::to_string_pretty(&payload)?;
        fs::write(&self.file_path, text)?;
        Ok(())
    }
}

fn read_players(path: &Path) -> Result<HashMap<String, StoredPlayer>, StoreError> {
    let text = fs::read_to_string(path)?;
    let parsed: ProgressStoreFileRaw = serde_json::from_str(&text)?;
    if parsed.version != STORE_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: parsed.version,
        });
    }

    let mut players = HashMap::new();
    for (player_key, raw_value) in parsed.players {
        let player: StoredPlayer = match serde_json::from_value(raw_value) {
            Ok(player) => player,
            Err(error) => {
                tracing::warn!(
                    player = %player_key,
                    path = %path.display(),
                    %error,
                    "skipping unreadable player entry"
                );
                continue;
            }
        };
        let key = address_key(&player.address);
        if key.is_empty() {
            continue;
        }
        match players.get_mut(&key) {
            Some(current) => merge_player(current, player),
            None => {
                players.insert(key, player);
            }
        }
    }
    Ok(players)
}

/// Two spellings of the same address collapse into one entry keeping the
/// best counters and the most recent snapshot.
fn merge_player(current: &mut StoredPlayer, other: StoredPlayer) {
    let high_score = current.progress.high_score.max(other.progress.high_score);
    let highest_level = current
        .progress
        .highest_level
        .max(other.progress.highest_level);
    if other.updated_at_ms > current.updated_at_ms {
        current.address = other.address;
        current.progress = other.progress;
        current.updated_at_ms = other.updated_at_ms;
    }
    current.progress.high_score = high_score;
    current.progress.highest_level = highest_level;
}

fn address_key(address: &str) -> String {
    address.trim().to_lowercase()
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        let unique = format!(
            "{}-{}-{}",
            name,
            std::process::id(),
            now_ms().saturating_add(rand::random::<u32>() as u64)
        );
        std::env::temp_dir().join(unique).join("progress.json")
    }

    fn cleanup(path: &Path) {
        let _ = fs::remove_file(path);
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    fn played(score: u64, level: u32, total_keys: u64) -> SessionState {
        SessionState {
            score,
            level,
            total_keys,
            ..SessionState::new()
        }
    }

    #[test]
    fn sync_persists_and_reloads() {
        let path = temp_file("progress-store-sync");
        let mut store = ProgressStore::new(path.clone());
        assert!(store.is_empty());

        let plan = store
            .apply_sync("GABC", &played(400, 5, 3))
            .expect("address is valid");
        assert_eq!(plan.high_score, Some(400));
        assert_eq!(plan.keys_to_add, Some(3));

        let plan = store
            .apply_sync("gabc", &played(100, 2, 0))
            .expect("address is valid");
        assert_eq!(plan.high_score, None);
        assert_eq!(plan.highest_level, None);

        let reloaded = ProgressStore::new(path.clone());
        assert_eq!(reloaded.len(), 1);
        let progress = reloaded.get(" GABC ");
        assert_eq!(progress.high_score, 400);
        assert_eq!(progress.highest_level, 5);
        assert_eq!(progress.current_score, 100);
        assert_eq!(progress.current_level, 2);
        assert_eq!(progress.total_keys, 3);

        cleanup(&path);
    }

    #[test]
    fn repeated_save_of_one_run_credits_keys_once() {
        let path = temp_file("progress-store-repeat");
        let mut store = ProgressStore::new(path.clone());

        let mut state = played(200, 3, 2);
        for _ in 0..3 {
            store.apply_sync("GABC", &state).expect("address is valid");
            state = state.mark_synced();
        }
        assert_eq!(store.get("GABC").total_keys, 2);

        let plan = store
            .apply_sync("GABC", &state.collect_key())
            .expect("address is valid");
        assert_eq!(plan.keys_to_add, Some(1));
        assert_eq!(store.get("GABC").total_keys, 3);

        cleanup(&path);
    }

    #[test]
    fn blank_address_is_ignored() {
        let path = temp_file("progress-store-blank");
        let mut store = ProgressStore::new(path.clone());
        assert!(store.apply_sync("   ", &played(10, 1, 0)).is_none());
        assert!(store.is_empty());
        cleanup(&path);
    }

    #[test]
    fn claim_and_conversion_update_points() {
        let path = temp_file("progress-store-points");
        let mut store = ProgressStore::new(path.clone());
        store.apply_sync("GKEYS", &played(0, 1, 120));

        let claimed = store.claim_daily("GKEYS", 1_000).expect("first claim is open");
        assert_eq!(claimed.points, 1);
        assert!(store.claim_daily("GKEYS", 1_001).is_none());

        assert!(store.convert_keys("GKEYS", 30).is_none());
        let quote = store.convert_keys("GKEYS", 120).expect("two batches");
        assert_eq!(quote.points_gained, 20);
        let progress = store.get("GKEYS");
        assert_eq!(progress.points, 21);
        assert_eq!(progress.total_keys, 20);

        cleanup(&path);
    }

    #[test]
    fn leaderboard_orders_and_clamps() {
        let path = temp_file("progress-store-leaderboard");
        let mut store = ProgressStore::new(path.clone());
        store.apply_sync("GLOW", &played(100, 2, 0));
        store.apply_sync("GHIGH", &played(900, 8, 0));
        store.apply_sync("GMID", &played(500, 4, 0));

        let response = store.leaderboard(None);
        let order: Vec<&str> = response
            .entries
            .iter()
            .map(|entry| entry.address.as_str())
            .collect();
        assert_eq!(order, vec!["GHIGH", "GMID", "GLOW"]);
        assert!(!response.generated_at_iso.is_empty());

        assert_eq!(store.leaderboard(Some(0)).entries.len(), 1);
        assert_eq!(store.leaderboard(Some(2)).entries.len(), 2);
        assert_eq!(store.leaderboard(Some(999)).entries.len(), 3);

        cleanup(&path);
    }

    #[test]
    fn load_merges_addresses_and_skips_broken_entries() {
        let path = temp_file("progress-store-load");
        let parent = path.parent().expect("parent exists").to_path_buf();
        fs::create_dir_all(&parent).expect("create dir");
        let raw = r#"{
  "version": 1,
  "players": {
    "gabc": {
      "address": "GABC",
      "highScore": 300,
      "currentScore": 300,
      "currentLevel": 4,
      "highestLevel": 4,
      "totalKeys": 2,
      "points": 0,
      "nextClaimSecs": 0,
      "updatedAtMs": 10
    },
    "legacy": {
      "address": " gabc ",
      "highScore": 200,
      "currentScore": 50,
      "currentLevel": 6,
      "highestLevel": 6,
      "totalKeys": 9,
      "points": 1,
      "nextClaimSecs": 0,
      "updatedAtMs": 20
    },
    "broken": {
      "address": "GBAD",
      "highScore": -5
    }
  }
}"#;
        fs::write(&path, raw).expect("write file");

        let store = ProgressStore::new(path.clone());
        assert_eq!(store.len(), 1);
        let progress = store.get("GABC");
        assert_eq!(progress.high_score, 300);
        assert_eq!(progress.highest_level, 6);
        assert_eq!(progress.total_keys, 9);
        assert_eq!(progress.current_score, 50);

        cleanup(&path);
    }

    #[test]
    fn unsupported_version_is_reported() {
        let path = temp_file("progress-store-version");
        let parent = path.parent().expect("parent exists").to_path_buf();
        fs::create_dir_all(&parent).expect("create dir");
        fs::write(&path, r#"{"version": 2, "players": {}}"#).expect("write file");

        assert!(matches!(
            read_players(&path),
            Err(StoreError::UnsupportedVersion { found: 2 })
        ));
        assert!(ProgressStore::new(path.clone()).is_empty());

        cleanup(&path);
    }
}
