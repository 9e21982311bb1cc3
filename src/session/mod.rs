use serde::Serialize;

use crate::constants::HAZARD_KEY_PENALTY;
use crate::difficulty::DifficultyCurve;
use crate::error::ConfigError;
use crate::generator::{GeneratedLevel, LevelGenerator};
use crate::rng::Rng;
use crate::types::{
    BadgeView, CellCode, Direction, GameOverReason, MoveEvent, MoveRejection, Position,
};
use crate::validator::legal_move_target;

mod state;

pub use self::state::{level_score, Badges, SessionState};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MoveOutcome {
    pub accepted: bool,
    pub rejection: Option<MoveRejection>,
    pub events: Vec<MoveEvent>,
    pub position: Position,
    pub level: u32,
    #[serde(rename = "levelChanged")]
    pub level_changed: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub badges: Vec<BadgeView>,
    pub paused: bool,
    pub level: GeneratedLevel,
}

/// One player's run: the level being played plus the counters carried
/// between levels. All randomness comes from the session's own [`Rng`].
#[derive(Clone, Debug)]
pub struct GameSession {
    curve: DifficultyCurve,
    generator: LevelGenerator,
    rng: Rng,
    state: SessionState,
    level: GeneratedLevel,
    paused: bool,
}

impl GameSession {
    pub fn new(
        curve: DifficultyCurve,
        generator: LevelGenerator,
        seed: u32,
    ) -> Result<Self, ConfigError> {
        curve.validate()?;
        let mut rng = Rng::new(seed);
        let state = SessionState::new();
        let level = generator.generate(&curve.config_for_level(state.level), &mut rng)?;
        let mut session = Self {
            curve,
            generator,
            rng,
            state,
            level,
            paused: false,
        };
        session.refresh_portals();
        Ok(session)
    }

    /// Carries a previously recorded high score into a fresh run.
    pub fn with_high_score(mut self, high_score: u64) -> Self {
        self.state.high_score = self.state.high_score.max(high_score);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn level(&self) -> &GeneratedLevel {
        &self.level
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            badges: self.state.badges.views(),
            paused: self.paused,
            level: self.level.clone(),
        }
    }

    /// Records that the current inventory has been credited to the ledger.
    pub fn mark_synced(&mut self) {
        self.state = self.state.mark_synced();
    }

    pub fn restart(&mut self) -> Result<(), ConfigError> {
        self.state = self.state.reset();
        self.paused = false;
        self.load_level()
    }

    fn ship_position(&self) -> Position {
        self.level.objects.spaceship.sprite.position()
    }

    fn load_level(&mut self) -> Result<(), ConfigError> {
        let config = self.curve.config_for_level(self.state.level);
        self.level = self.generator.generate(&config, &mut self.rng)?;
        self.refresh_portals();
        tracing::debug!(
            level = self.state.level,
            attempts = self.level.attempts,
            terminal_fallback = self.level.terminal_fallback,
            "level loaded"
        );
        Ok(())
    }

    /// Portals are active exactly when every key is collected. Returns true
    /// on the inactive to active transition.
    fn refresh_portals(&mut self) -> bool {
        let open = self.level.objects.all_keys_collected();
        let mut activated = false;
        for portal in &mut self.level.objects.portals {
            activated |= open && !portal.active;
            portal.active = open;
        }
        activated
    }

    fn outcome(
        &self,
        rejection: Option<MoveRejection>,
        events: Vec<MoveEvent>,
        level_changed: bool,
    ) -> MoveOutcome {
        MoveOutcome {
            accepted: rejection.is_none(),
            rejection,
            events,
            position: self.ship_position(),
            level: self.state.level,
            level_changed,
        }
    }

    /// Resolves one step: legality, barrier payment, key pickup, teleport,
    /// portal, then hazard.
    pub fn attempt_move(&mut self, dir: Direction) -> MoveOutcome {
        if self.state.game_over {
            return self.outcome(Some(MoveRejection::GameOver), Vec::new(), false);
        }
        if self.paused {
            return self.outcome(Some(MoveRejection::Paused), Vec::new(), false);
        }

        let from = self.ship_position();
        let target = from.step(dir);
        if !self.level.grid.in_bounds(target) {
            return self.outcome(Some(MoveRejection::OutOfBounds), Vec::new(), false);
        }
        if legal_move_target(&self.level.grid, from, dir).is_none() {
            return self.outcome(Some(MoveRejection::Asteroid), Vec::new(), false);
        }

        let mut events = Vec::new();
        let barrier_index = self
            .level
            .objects
            .barriers
            .iter()
            .position(|barrier| barrier.sprite.is_at(target));
        if let Some(index) = barrier_index {
            let (next, paid) = self.state.use_key(1);
            self.state = next;
            if !paid {
                tracing::debug!(?target, "barrier hit without keys");
                return self.outcome(
                    Some(MoveRejection::BarrierLocked),
                    vec![MoveEvent::GameOver {
                        reason: GameOverReason::BarrierWithoutKeys,
                    }],
                    false,
                );
            }
            let barrier = self.level.objects.barriers.remove(index);
            self.level.grid.set(target, CellCode::Empty);
            events.push(MoveEvent::BarrierOpened {
                color: barrier.color,
            });
        }

        self.level.objects.spaceship.sprite.move_to(target);

        let picked = self
            .level
            .objects
            .keys
            .iter_mut()
            .find(|key| !key.collected && key.sprite.is_at(target))
            .map(|key| {
                key.collected = true;
                key.color.clone()
            });
        if let Some(color) = picked {
            self.state = self.state.collect_key();
            self.level.grid.set(target, CellCode::Empty);
            events.push(MoveEvent::KeyCollected { color });
        }

        if let Some(dest) = self.level.objects.teleport_destination(target) {
            self.level.objects.spaceship.sprite.move_to(dest);
            events.push(MoveEvent::Teleported {
                from: target,
                to: dest,
            });
        }

        if self.refresh_portals() {
            events.push(MoveEvent::PortalActivated);
        }

        let here = self.ship_position();
        let portal_active = self
            .level
            .objects
            .portals
            .iter()
            .find(|portal| portal.sprite.is_at(here))
            .map(|portal| portal.active);
        if let Some(active) = portal_active {
            return self.enter_portal(active, events);
        }

        let hazard_index = self
            .level
            .objects
            .hazards
            .iter()
            .position(|hazard| hazard.is_at(target));
        if let Some(index) = hazard_index {
            self.level.objects.hazards.remove(index);
            self.level.grid.set(target, CellCode::Empty);
            let before = self.state.total_keys;
            self.state = self.state.lose_keys(HAZARD_KEY_PENALTY);
            events.push(MoveEvent::HazardHit {
                keys_lost: before - self.state.total_keys,
            });
            if self.state.game_over {
                events.push(MoveEvent::GameOver {
                    reason: GameOverReason::KeysDepleted,
                });
            }
        }

        self.outcome(None, events, false)
    }

    fn enter_portal(&mut self, active: bool, mut events: Vec<MoveEvent>) -> MoveOutcome {
        if !active {
            events.push(MoveEvent::PortalLocked);
            return self.outcome(None, events, false);
        }
        if self.state.total_keys == 0 {
            let (next, _) = self.state.use_key(1);
            self.state = next;
            events.push(MoveEvent::GameOver {
                reason: GameOverReason::PortalWithoutKeys,
            });
            return self.outcome(None, events, false);
        }

        let completed = self.state.level;
        let previous_badges = self.state.badges;
        let (next, level_score) = self
            .state
            .complete_level(self.level.config.difficulty_multiplier);
        self.state = next;
        events.push(MoveEvent::LevelCompleted {
            level: completed,
            level_score,
        });
        tracing::info!(
            level = completed,
            level_score,
            score = self.state.score,
            "level completed"
        );
        for badge in self.state.badges.newly_unlocked(&previous_badges) {
            tracing::info!(?badge, "badge unlocked");
        }

        if let Err(error) = self.load_level() {
            tracing::error!(%error, level = self.state.level, "failed to generate next level");
        }
        self.outcome(None, events, true)
    }
}
