//! The bot decision policy.
//!
//! Bots see exactly what a seated player sees: the public table state plus
//! their own hole cards. Every decision is clamped to a legal action before
//! it leaves this module, so the engine never rejects a bot.

use crate::evaluator;
use felt_types::{Action, Card, HandCategory, Rank};
use rand::Rng;

/// Bot skill levels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Expert,
}

/// The state a bot decides from.
#[derive(Clone, Debug)]
pub struct BotView {
    pub hole: [Card; 2],
    pub community: Vec<Card>,
    pub chips: u64,
    pub street_wager: u64,
    pub current_bet: u64,
    pub min_raise: u64,
    pub pot: u64,
    pub big_blind: u64,
    /// Players still in the hand besides the bot.
    pub opponents: usize,
    /// Seat position normalized to `[0, 1]`; 1.0 is the button.
    pub position: f64,
    /// False after an all-in under-raise capped the street's betting.
    pub raise_allowed: bool,
}

impl BotView {
    fn to_call(&self) -> u64 {
        self.current_bet
            .saturating_sub(self.street_wager)
            .min(self.chips)
    }

    fn available(&self) -> u64 {
        self.street_wager + self.chips
    }

    /// `callAmount / (pot + callAmount)`, the price of continuing.
    fn pot_odds(&self) -> f64 {
        let call = self.to_call();
        if call == 0 {
            return 0.0;
        }
        call as f64 / (self.pot + call) as f64
    }

    fn standard_raise(&self) -> Action {
        let increment = self.min_raise.max(self.pot / 2);
        Action::Raise {
            to: self.current_bet + increment,
        }
    }
}

/// Produce one legal action for the bot to play.
pub fn decide(difficulty: Difficulty, view: &BotView, rng: &mut impl Rng) -> Action {
    let action = match difficulty {
        Difficulty::Easy => decide_easy(view, rng),
        Difficulty::Medium => decide_medium(view, rng, hand_strength(view)),
        Difficulty::Hard => decide_hard(view, rng),
        Difficulty::Expert => decide_expert(view, rng),
    };
    clamp_legal(action, view)
}

/// Closed-form preflop strength over pair/suited/connected/high-card
/// features, in `[0, 1]`.
pub fn preflop_strength(hole: &[Card; 2]) -> f64 {
    let (high, low) = if hole[0].rank >= hole[1].rank {
        (hole[0].rank, hole[1].rank)
    } else {
        (hole[1].rank, hole[0].rank)
    };
    if high == low {
        // Pairs: 22 maps to ~0.57, aces to 1.0.
        return 0.5 + high.value() as f64 / 28.0;
    }
    let mut strength = (high.value() + low.value()) as f64 / 56.0;
    if hole[0].suit == hole[1].suit {
        strength += 0.06;
    }
    let gap = high.value() - low.value();
    if gap == 1 {
        strength += 0.05;
    } else if gap > 4 {
        strength -= 0.02;
    }
    strength.clamp(0.0, 1.0)
}

/// Postflop strength: evaluated category mapped to `[0.15, 0.98]` plus a
/// small kicker bonus.
pub fn postflop_strength(hole: &[Card; 2], community: &[Card]) -> f64 {
    let Ok(rank) = evaluator::evaluate(hole, community) else {
        // Malformed inputs only arise from engine invariant violations; be
        // conservative rather than panic inside a bot turn.
        return 0.15;
    };
    let base = match rank.category {
        HandCategory::HighCard => 0.15,
        HandCategory::OnePair => 0.35,
        HandCategory::TwoPair => 0.55,
        HandCategory::ThreeOfAKind => 0.68,
        HandCategory::Straight => 0.78,
        HandCategory::Flush => 0.85,
        HandCategory::FullHouse => 0.92,
        HandCategory::FourOfAKind => 0.96,
        HandCategory::StraightFlush | HandCategory::RoyalFlush => 0.98,
    };
    let kicker = rank
        .kickers
        .first()
        .copied()
        .unwrap_or(Rank::TWO)
        .value() as f64;
    (base + kicker / 14.0 * 0.02).min(0.98)
}

fn hand_strength(view: &BotView) -> f64 {
    if view.community.is_empty() {
        preflop_strength(&view.hole)
    } else {
        postflop_strength(&view.hole, &view.community)
    }
}

/// Easy: weighted-random play, blind to hand strength.
fn decide_easy(view: &BotView, rng: &mut impl Rng) -> Action {
    let roll: f64 = rng.gen();
    if view.to_call() == 0 {
        if roll < 0.70 {
            Action::Check
        } else if roll < 0.95 {
            view.standard_raise()
        } else {
            Action::AllIn
        }
    } else if roll < 0.30 {
        Action::Fold
    } else if roll < 0.80 {
        Action::Call
    } else {
        view.standard_raise()
    }
}

/// Medium: hand strength against pot odds.
fn decide_medium(view: &BotView, rng: &mut impl Rng, strength: f64) -> Action {
    let to_call = view.to_call();
    if strength > 0.80 {
        return view.standard_raise();
    }
    if to_call == 0 {
        // Cheap to see another card; bet the decent hands sometimes.
        if strength > 0.55 && rng.gen::<f64>() < 0.5 {
            return view.standard_raise();
        }
        return Action::Check;
    }
    if strength > view.pot_odds() + 0.05 {
        Action::Call
    } else {
        Action::Fold
    }
}

/// Hard: medium adjusted for position and opponent count, with a rare
/// positional bluff.
fn decide_hard(view: &BotView, rng: &mut impl Rng) -> Action {
    let mut strength = hand_strength(view) * (0.85 + 0.30 * view.position);
    strength -= 0.03 * view.opponents.saturating_sub(1) as f64;
    if view.position > 0.65 && rng.gen::<f64>() < 0.06 {
        return view.standard_raise();
    }
    decide_medium(view, rng, strength.clamp(0.0, 1.0))
}

/// Expert: hard plus trap-calls with monsters and balanced raises from the
/// calling range.
fn decide_expert(view: &BotView, rng: &mut impl Rng) -> Action {
    let strength = hand_strength(view);
    if strength > 0.85 && view.to_call() > 0 && rng.gen::<f64>() < 0.30 {
        return Action::Call;
    }
    let action = decide_hard(view, rng);
    if action == Action::Call && rng.gen::<f64>() < 0.15 {
        return view.standard_raise();
    }
    action
}

/// Clamp any intended action to the nearest legal alternative.
fn clamp_legal(action: Action, view: &BotView) -> Action {
    let to_call = view.to_call();
    match action {
        Action::Fold if to_call == 0 => Action::Check,
        Action::Fold => Action::Fold,
        Action::Check if to_call > 0 => Action::Call,
        Action::Check => Action::Check,
        Action::Call if to_call == 0 => Action::Check,
        Action::Call => Action::Call,
        Action::AllIn => Action::AllIn,
        Action::Raise { to } => {
            if !view.raise_allowed {
                return if to_call > 0 { Action::Call } else { Action::Check };
            }
            let minimum = view.current_bet + view.min_raise;
            let available = view.available();
            if available <= minimum {
                // Cannot make a full raise; push instead.
                return Action::AllIn;
            }
            let to = to.max(minimum);
            if to >= available {
                Action::AllIn
            } else {
                Action::Raise { to }
            }
        }
    }
}
