//! Input disambiguation
//!
//! A right-click on geometry is reported as a block use, sometimes followed
//! by an item use, and the client follows both with an arm swing. The swing
//! that trails a use must not trigger the secondary ability.

use serde::{Deserialize, Serialize};

/// Last classified input of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerAction {
    #[default]
    None,
    Attack,
    Use,
    UseBlock,
    UseBlockAndItem,
}

impl PlayerAction {
    pub fn is_use(self) -> bool {
        matches!(
            self,
            PlayerAction::Use | PlayerAction::UseBlock | PlayerAction::UseBlockAndItem
        )
    }
}

/// How a swing should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingIntent {
    /// Deliberate attack: trigger the secondary ability
    Secondary,
    /// Echo of a preceding use
    Suppressed,
}

#[derive(Debug, Clone, Default)]
pub struct ActionDisambiguator {
    last: PlayerAction,
}

impl ActionDisambiguator {
    pub fn last(&self) -> PlayerAction {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = PlayerAction::None;
    }

    /// An item use went through to the primary action
    pub fn on_item_used(&mut self) {
        self.last = PlayerAction::Use;
    }

    /// An item use was refused because the item is cooling down
    pub fn on_item_use_blocked(&mut self) {
        if self.last == PlayerAction::UseBlock {
            self.last = PlayerAction::UseBlockAndItem;
        }
    }

    pub fn on_block_used(&mut self) {
        self.last = match self.last {
            PlayerAction::UseBlockAndItem => PlayerAction::None,
            _ => PlayerAction::UseBlock,
        };
    }

    pub fn on_swing(&mut self) -> SwingIntent {
        if self.last.is_use() {
            self.last = PlayerAction::None;
            SwingIntent::Suppressed
        } else {
            self.last = PlayerAction::Attack;
            SwingIntent::Secondary
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lone_swing_is_an_attack() {
        let mut actions = ActionDisambiguator::default();
        assert_eq!(actions.on_swing(), SwingIntent::Secondary);
        assert_eq!(actions.on_swing(), SwingIntent::Secondary);
    }

    #[test]
    fn swing_after_item_use_is_suppressed_once() {
        let mut actions = ActionDisambiguator::default();
        actions.on_item_used();
        assert_eq!(actions.on_swing(), SwingIntent::Suppressed);
        assert_eq!(actions.last(), PlayerAction::None);
        assert_eq!(actions.on_swing(), SwingIntent::Secondary);
    }

    #[test]
    fn block_then_blocked_item_then_block_resets() {
        let mut actions = ActionDisambiguator::default();
        actions.on_block_used();
        assert_eq!(actions.last(), PlayerAction::UseBlock);
        actions.on_item_use_blocked();
        assert_eq!(actions.last(), PlayerAction::UseBlockAndItem);
        actions.on_block_used();
        assert_eq!(actions.last(), PlayerAction::None);
        assert_eq!(actions.on_swing(), SwingIntent::Secondary);
    }

    #[test]
    fn swing_after_block_use_is_suppressed() {
        let mut actions = ActionDisambiguator::default();
        actions.on_block_used();
        assert_eq!(actions.on_swing(), SwingIntent::Suppressed);
    }
}
