//! The per-hand state machine.
//!
//! A [`HandEngine`] owns one table's seats, deck, and betting state. It is
//! strictly synchronous: every operation either rejects with an
//! [`EngineError`] and leaves the state untouched, or mutates and returns
//! the ordered [`EngineEvent`]s the mutation produced. The table controller
//! consumes those events and turns them into protocol broadcasts, so the
//! engine never calls back into anything.

use crate::deck::Deck;
use crate::error::EngineError;
use crate::evaluator;
use crate::pot::{build_pots, split_amount, Contribution, Pot};
use felt_types::{
    Action, ActionKind, Card, HandPhase, HandRank, LastAction, Player, PlayerState, PotView,
    SeatView, TableConfig, TableState,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Blind kinds, for posting events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Blind {
    Ante,
    Small,
    Big,
}

/// One player's winnings at hand end.
#[derive(Clone, Debug, PartialEq)]
pub struct Payout {
    pub seat: usize,
    pub player_id: String,
    pub amount: u64,
    /// Absent when the hand ended without evaluation (everyone else folded).
    pub hand: Option<HandRank>,
}

/// An observable engine state transition, emitted in causal order.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    HandStarted {
        hand_number: u64,
        dealer_seat: usize,
    },
    BlindPosted {
        seat: usize,
        blind: Blind,
        amount: u64,
    },
    HoleCards {
        seat: usize,
        player_id: String,
        cards: [Card; 2],
    },
    PhaseChanged {
        phase: HandPhase,
    },
    CommunityDealt {
        phase: HandPhase,
        cards: Vec<Card>,
    },
    PlayerActed {
        seat: usize,
        player_id: String,
        action: ActionKind,
        amount: u64,
    },
    ActionOn {
        seat: usize,
        player_id: String,
        call_amount: u64,
        min_raise_to: u64,
        max_raise_to: u64,
    },
    ShowdownReveal {
        seat: usize,
        player_id: String,
        cards: [Card; 2],
    },
    HandFinished {
        payouts: Vec<Payout>,
        pot_total: u64,
    },
}

/// The per-hand state machine for one table.
pub struct HandEngine {
    config: TableConfig,
    seats: Vec<Option<Player>>,
    deck: Deck,
    phase: HandPhase,
    hand_number: u64,
    dealer_seat: usize,
    small_blind_seat: usize,
    big_blind_seat: usize,
    actor_seat: Option<usize>,
    current_bet: u64,
    min_raise: u64,
    community: Vec<Card>,
    /// Seats that must still be offered a turn this street. Includes the big
    /// blind preflop even when unraised, so the option is always honored.
    owes_action: HashSet<usize>,
    /// Set once an all-in below the minimum raise lands: explicit raises are
    /// no longer legal this street (callers may still push all-in). Cleared
    /// by a full-sized raise or a new street.
    betting_capped: bool,
    pending_buy_ins: Vec<(usize, u64)>,
    pending_sit_outs: HashSet<usize>,
    pending_removals: HashSet<usize>,
}

impl HandEngine {
    /// A fresh engine. `seed` fixes the shuffle sequence for tests.
    pub fn new(config: TableConfig, seed: Option<u64>) -> Self {
        let seats = (0..config.max_seats).map(|_| None).collect();
        let deck = match seed {
            Some(seed) => Deck::seeded(seed),
            None => Deck::new(),
        };
        Self {
            config,
            seats,
            deck,
            phase: HandPhase::Waiting,
            hand_number: 0,
            dealer_seat: 0,
            small_blind_seat: 0,
            big_blind_seat: 0,
            actor_seat: None,
            current_bet: 0,
            min_raise: 0,
            community: Vec::new(),
            owes_action: HashSet::new(),
            betting_capped: false,
            pending_buy_ins: Vec::new(),
            pending_sit_outs: HashSet::new(),
            pending_removals: HashSet::new(),
        }
    }

    // ---- accessors ----

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn phase(&self) -> HandPhase {
        self.phase
    }

    pub fn hand_number(&self) -> u64 {
        self.hand_number
    }

    pub fn actor_seat(&self) -> Option<usize> {
        self.actor_seat
    }

    pub fn current_bet(&self) -> u64 {
        self.current_bet
    }

    pub fn min_raise(&self) -> u64 {
        self.min_raise
    }

    /// Whether an explicit raise is currently legal (betting not capped by
    /// an all-in under-raise).
    pub fn raise_allowed(&self) -> bool {
        !self.betting_capped
    }

    pub fn community(&self) -> &[Card] {
        &self.community
    }

    pub fn player(&self, seat: usize) -> Option<&Player> {
        self.seats.get(seat).and_then(Option::as_ref)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.seats.iter().flatten()
    }

    pub fn seat_of(&self, player_id: &str) -> Option<usize> {
        self.players()
            .find(|p| p.id == player_id)
            .map(|p| p.seat)
    }

    pub fn seated_count(&self) -> usize {
        self.players().count()
    }

    /// Chips committed to the hand so far, across all seats.
    pub fn pot_total(&self) -> u64 {
        self.players().map(|p| p.hand_wager).sum()
    }

    // ---- seat lifecycle ----

    /// Seat a player at the lowest free index.
    pub fn add_player(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        chips: u64,
        is_bot: bool,
    ) -> Result<usize, EngineError> {
        let id = id.into();
        if self.players().any(|p| p.id == id) {
            return Err(EngineError::AlreadySeated);
        }
        let seat = self
            .seats
            .iter()
            .position(Option::is_none)
            .ok_or(EngineError::TableFull)?;
        let name = name.into();
        let player = if is_bot {
            Player::bot(id, name, seat, chips)
        } else {
            Player::new(id, name, seat, chips)
        };
        self.seats[seat] = Some(player);
        Ok(seat)
    }

    /// Remove a player. Mid-hand this folds them and forfeits their
    /// contributions; the seat itself frees once the hand concludes.
    /// Returns the chips the player leaves with plus any resulting events.
    pub fn remove_player(&mut self, seat: usize) -> Result<(u64, Vec<EngineEvent>), EngineError> {
        let player = self
            .seats
            .get(seat)
            .and_then(Option::as_ref)
            .ok_or(EngineError::EmptySeat { seat })?;
        let chips = player.chips;
        let in_running_hand = self.phase.in_hand() && player.in_hand();
        if !in_running_hand {
            self.seats[seat] = None;
            self.pending_buy_ins.retain(|(s, _)| *s != seat);
            return Ok((chips, Vec::new()));
        }
        self.pending_removals.insert(seat);
        let events = self.force_fold(seat)?;
        Ok((chips, events))
    }

    /// Sit a player out. Mid-hand this folds them first.
    pub fn sit_out(&mut self, seat: usize) -> Result<Vec<EngineEvent>, EngineError> {
        let player = self
            .seats
            .get(seat)
            .and_then(Option::as_ref)
            .ok_or(EngineError::EmptySeat { seat })?;
        if self.phase.in_hand() && player.in_hand() {
            self.pending_sit_outs.insert(seat);
            return self.force_fold(seat);
        }
        if let Some(player) = self.seats[seat].as_mut() {
            player.state = PlayerState::SittingOut;
        }
        Ok(Vec::new())
    }

    /// Return a sitting-out player to the next deal.
    pub fn sit_in(&mut self, seat: usize) -> Result<(), EngineError> {
        let player = self
            .seats
            .get_mut(seat)
            .and_then(Option::as_mut)
            .ok_or(EngineError::EmptySeat { seat })?;
        if player.state == PlayerState::SittingOut {
            player.state = PlayerState::Waiting;
        }
        self.pending_sit_outs.remove(&seat);
        Ok(())
    }

    /// Add chips to a stack. Takes effect immediately between hands;
    /// mid-hand top-ups apply when the hand concludes.
    pub fn buy_in(&mut self, seat: usize, amount: u64) -> Result<(), EngineError> {
        let player = self
            .seats
            .get(seat)
            .and_then(Option::as_ref)
            .ok_or(EngineError::EmptySeat { seat })?;
        if self.phase.in_hand() && (player.in_hand() || player.hand_wager > 0) {
            self.pending_buy_ins.push((seat, amount));
        } else if let Some(player) = self.seats[seat].as_mut() {
            player.chips += amount;
        }
        Ok(())
    }

    // ---- hand lifecycle ----

    /// Whether `start_hand` would be accepted right now.
    pub fn can_start(&self) -> bool {
        if self.phase.in_hand() {
            return false;
        }
        self.dealable_count() >= self.config.min_players.max(2)
    }

    fn dealable_count(&self) -> usize {
        self.players().filter(|p| p.can_be_dealt()).count()
    }

    /// Begin a new hand: move the button, post antes and blinds, deal hole
    /// cards, and open preflop action.
    pub fn start_hand(&mut self) -> Result<Vec<EngineEvent>, EngineError> {
        if self.phase.in_hand() {
            return Err(EngineError::WrongPhase { phase: self.phase });
        }
        if self.dealable_count() < self.config.min_players.max(2) {
            return Err(EngineError::NotEnoughPlayers);
        }

        for (seat, amount) in std::mem::take(&mut self.pending_buy_ins) {
            if let Some(player) = self.seats.get_mut(seat).and_then(Option::as_mut) {
                player.chips += amount;
            }
        }
        for seat in self.seats.iter().flatten().map(|p| p.seat).collect::<Vec<_>>() {
            if let Some(player) = self.seats[seat].as_mut() {
                player.reset_for_hand();
            }
        }

        self.hand_number += 1;
        self.community.clear();
        self.betting_capped = false;
        self.owes_action.clear();

        let dealable: Vec<usize> = self
            .players()
            .filter(|p| p.can_be_dealt())
            .map(|p| p.seat)
            .collect();
        self.dealer_seat = if self.hand_number == 1 {
            dealable[0]
        } else {
            self.next_seat_where(self.dealer_seat, |p| p.can_be_dealt())
                .unwrap_or(dealable[0])
        };

        for &seat in &dealable {
            if let Some(player) = self.seats[seat].as_mut() {
                player.state = PlayerState::Active;
            }
        }

        let mut events = vec![EngineEvent::HandStarted {
            hand_number: self.hand_number,
            dealer_seat: self.dealer_seat,
        }];
        self.phase = HandPhase::Starting;
        events.push(EngineEvent::PhaseChanged {
            phase: HandPhase::Starting,
        });

        // Heads-up: the dealer is the small blind and acts first preflop.
        if dealable.len() == 2 {
            self.small_blind_seat = self.dealer_seat;
            self.big_blind_seat = self
                .next_seat_where(self.dealer_seat, Player::in_hand)
                .ok_or(EngineError::NotEnoughPlayers)?;
        } else {
            self.small_blind_seat = self
                .next_seat_where(self.dealer_seat, Player::in_hand)
                .ok_or(EngineError::NotEnoughPlayers)?;
            self.big_blind_seat = self
                .next_seat_where(self.small_blind_seat, Player::in_hand)
                .ok_or(EngineError::NotEnoughPlayers)?;
        }
        if let Some(player) = self.seats[self.dealer_seat].as_mut() {
            player.is_dealer = true;
        }
        if let Some(player) = self.seats[self.small_blind_seat].as_mut() {
            player.is_small_blind = true;
        }
        if let Some(player) = self.seats[self.big_blind_seat].as_mut() {
            player.is_big_blind = true;
        }

        // Antes join the pot without counting toward street wagers.
        if self.config.ante > 0 {
            let mut seat = self.dealer_seat;
            for _ in 0..dealable.len() {
                seat = self
                    .next_seat_where(seat, Player::in_hand)
                    .unwrap_or(seat);
                if let Some(player) = self.seats[seat].as_mut() {
                    if matches!(player.state, PlayerState::Active) {
                        let posted = player.chips.min(self.config.ante);
                        player.chips -= posted;
                        player.hand_wager += posted;
                        if player.chips == 0 {
                            player.state = PlayerState::AllIn;
                        }
                        events.push(EngineEvent::BlindPosted {
                            seat,
                            blind: Blind::Ante,
                            amount: posted,
                        });
                    }
                }
            }
        }

        let posted = self.post_blind(self.small_blind_seat, self.config.small_blind);
        if let Some(player) = self.seats[self.small_blind_seat].as_mut() {
            player.last_action = LastAction::PostSmallBlind;
        }
        events.push(EngineEvent::BlindPosted {
            seat: self.small_blind_seat,
            blind: Blind::Small,
            amount: posted,
        });
        let posted = self.post_blind(self.big_blind_seat, self.config.big_blind);
        if let Some(player) = self.seats[self.big_blind_seat].as_mut() {
            player.last_action = LastAction::PostBigBlind;
        }
        events.push(EngineEvent::BlindPosted {
            seat: self.big_blind_seat,
            blind: Blind::Big,
            amount: posted,
        });

        self.current_bet = self.config.big_blind;
        self.min_raise = self.config.big_blind;

        self.deck.reset();
        self.deck.shuffle();
        let mut seat = self.dealer_seat;
        for _ in 0..dealable.len() {
            seat = self
                .next_seat_where(seat, |p| p.in_hand())
                .ok_or(EngineError::NotEnoughPlayers)?;
            let cards = [self.deck.deal()?, self.deck.deal()?];
            if let Some(player) = self.seats[seat].as_mut() {
                player.hole_cards = Some(cards);
                events.push(EngineEvent::HoleCards {
                    seat,
                    player_id: player.id.clone(),
                    cards,
                });
            }
        }

        self.phase = HandPhase::Preflop;
        events.push(EngineEvent::PhaseChanged {
            phase: HandPhase::Preflop,
        });

        // Everyone dealt in owes a preflop action, blinds included: the big
        // blind keeps the option even when nobody raises.
        self.owes_action = self
            .players()
            .filter(|p| p.state == PlayerState::Active)
            .map(|p| p.seat)
            .collect();

        self.open_action(self.big_blind_seat, &mut events)?;
        debug!(
            hand = self.hand_number,
            dealer = self.dealer_seat,
            "hand started"
        );
        Ok(events)
    }

    fn post_blind(&mut self, seat: usize, amount: u64) -> u64 {
        match self.seats[seat].as_mut() {
            Some(player) => {
                let posted = player.chips.min(amount);
                player.chips -= posted;
                player.street_wager += posted;
                player.hand_wager += posted;
                if player.chips == 0 {
                    player.state = PlayerState::AllIn;
                }
                posted
            }
            None => 0,
        }
    }

    // ---- actions ----

    /// Apply one player action. Rejections leave the state untouched.
    pub fn apply(&mut self, seat: usize, action: Action) -> Result<Vec<EngineEvent>, EngineError> {
        if !matches!(
            self.phase,
            HandPhase::Preflop | HandPhase::Flop | HandPhase::Turn | HandPhase::River
        ) {
            return Err(EngineError::WrongPhase { phase: self.phase });
        }
        if self.actor_seat != Some(seat) {
            return Err(EngineError::NotYourTurn);
        }
        let player = self
            .seats
            .get(seat)
            .and_then(Option::as_ref)
            .ok_or(EngineError::EmptySeat { seat })?;
        if player.state != PlayerState::Active {
            return Err(EngineError::PlayerNotActive {
                state: state_name(player.state),
            });
        }

        let to_call = self.current_bet - player.street_wager.min(self.current_bet);
        let available = player.street_wager + player.chips;

        // Validate fully before mutating anything.
        let action = match action {
            // An all-in is a raise when it beats the current bet, otherwise
            // a (possibly short) call.
            Action::AllIn => {
                if available > self.current_bet {
                    Action::Raise { to: available }
                } else {
                    Action::Call
                }
            }
            other => other,
        };
        match action {
            Action::Fold => {}
            Action::Check => {
                if to_call > 0 {
                    return Err(EngineError::CheckFacingBet);
                }
            }
            Action::Call => {
                if to_call == 0 {
                    return Err(EngineError::NothingToCall);
                }
            }
            Action::Raise { to } => {
                if to > available {
                    return Err(EngineError::RaiseExceedsStack { to, available });
                }
                let minimum = self.current_bet + self.min_raise;
                let is_all_in = to == available;
                if to <= self.current_bet || (to < minimum && !is_all_in) {
                    return Err(EngineError::BelowMinimumRaise { to, min: minimum });
                }
                if self.betting_capped && !is_all_in {
                    return Err(EngineError::RaiseNotReopened);
                }
            }
            Action::AllIn => unreachable!("normalized above"),
        }

        let mut events = Vec::new();
        match action {
            Action::Fold => {
                let player_id = self.fold_player(seat);
                events.push(EngineEvent::PlayerActed {
                    seat,
                    player_id,
                    action: ActionKind::Fold,
                    amount: 0,
                });
            }
            Action::Check => {
                self.owes_action.remove(&seat);
                let player = self.seats[seat].as_mut().expect("validated above");
                player.last_action = LastAction::Check;
                events.push(EngineEvent::PlayerActed {
                    seat,
                    player_id: player.id.clone(),
                    action: ActionKind::Check,
                    amount: 0,
                });
            }
            Action::Call => {
                self.owes_action.remove(&seat);
                let player = self.seats[seat].as_mut().expect("validated above");
                let paid = player.chips.min(to_call);
                player.chips -= paid;
                player.street_wager += paid;
                player.hand_wager += paid;
                let went_all_in = player.chips == 0;
                if went_all_in {
                    // A short call is an all-in and never reopens action.
                    player.state = PlayerState::AllIn;
                    player.last_action = LastAction::AllIn;
                } else {
                    player.last_action = LastAction::Call;
                }
                events.push(EngineEvent::PlayerActed {
                    seat,
                    player_id: player.id.clone(),
                    action: if went_all_in {
                        ActionKind::AllIn
                    } else {
                        ActionKind::Call
                    },
                    amount: paid,
                });
            }
            Action::Raise { to } => {
                self.owes_action.remove(&seat);
                let minimum = self.current_bet + self.min_raise;
                let previous_bet = self.current_bet;
                let is_full = to >= minimum;
                let (player_id, went_all_in) = {
                    let player = self.seats[seat].as_mut().expect("validated above");
                    let added = to - player.street_wager;
                    player.chips -= added;
                    player.street_wager = to;
                    player.hand_wager += added;
                    let went_all_in = player.chips == 0;
                    if went_all_in {
                        player.state = PlayerState::AllIn;
                        player.last_action = LastAction::AllIn;
                    } else {
                        player.last_action = LastAction::Raise;
                    }
                    (player.id.clone(), went_all_in)
                };
                self.current_bet = to;
                if is_full {
                    // A full-sized raise reopens action for everyone else.
                    self.min_raise = to - previous_bet;
                    self.betting_capped = false;
                    self.owes_action = self
                        .players()
                        .filter(|p| p.state == PlayerState::Active && p.seat != seat)
                        .map(|p| p.seat)
                        .collect();
                } else {
                    // All-in below the minimum: unmatched players must still
                    // get a turn, but the betting stays capped.
                    self.betting_capped = true;
                    let unmatched: Vec<usize> = self
                        .players()
                        .filter(|p| {
                            p.state == PlayerState::Active
                                && p.seat != seat
                                && p.street_wager < self.current_bet
                        })
                        .map(|p| p.seat)
                        .collect();
                    self.owes_action.extend(unmatched);
                }
                events.push(EngineEvent::PlayerActed {
                    seat,
                    player_id,
                    action: if went_all_in {
                        ActionKind::AllIn
                    } else {
                        ActionKind::Raise
                    },
                    amount: to,
                });
            }
            Action::AllIn => unreachable!("normalized above"),
        }

        self.settle_after_action(seat, &mut events)?;
        Ok(events)
    }

    /// Resolve an elapsed action deadline: fold when facing a bet, check
    /// otherwise.
    pub fn timeout(&mut self, seat: usize) -> Result<Vec<EngineEvent>, EngineError> {
        if self.actor_seat != Some(seat) {
            return Err(EngineError::NotYourTurn);
        }
        let player = self
            .seats
            .get(seat)
            .and_then(Option::as_ref)
            .ok_or(EngineError::EmptySeat { seat })?;
        let to_call = self.current_bet - player.street_wager.min(self.current_bet);
        if to_call > 0 {
            self.apply(seat, Action::Fold)
        } else {
            self.apply(seat, Action::Check)
        }
    }

    // ---- internals ----

    fn fold_player(&mut self, seat: usize) -> String {
        self.owes_action.remove(&seat);
        let player = self.seats[seat].as_mut().expect("caller checked seat");
        player.state = PlayerState::Folded;
        player.last_action = LastAction::Fold;
        player.id.clone()
    }

    /// Fold a player out of turn (leave/sit-out/disconnect expiry).
    fn force_fold(&mut self, seat: usize) -> Result<Vec<EngineEvent>, EngineError> {
        let player_id = self.fold_player(seat);
        let mut events = vec![EngineEvent::PlayerActed {
            seat,
            player_id,
            action: ActionKind::Fold,
            amount: 0,
        }];
        if self.actor_seat == Some(seat) {
            self.settle_after_action(seat, &mut events)?;
        } else if self.in_hand_count() <= 1 {
            self.finish_by_fold(&mut events);
        }
        Ok(events)
    }

    fn in_hand_count(&self) -> usize {
        self.players().filter(|p| p.in_hand()).count()
    }

    fn voluntary_count(&self) -> usize {
        self.players()
            .filter(|p| p.state == PlayerState::Active)
            .count()
    }

    fn settle_after_action(
        &mut self,
        from_seat: usize,
        events: &mut Vec<EngineEvent>,
    ) -> Result<(), EngineError> {
        if self.in_hand_count() <= 1 {
            self.finish_by_fold(events);
            return Ok(());
        }
        if self.street_closed() {
            self.advance_streets(events)?;
            return Ok(());
        }
        self.open_action(from_seat, events)
    }

    fn street_closed(&self) -> bool {
        if !self.owes_action.is_empty() {
            return false;
        }
        self.players()
            .filter(|p| p.state == PlayerState::Active)
            .all(|p| p.street_wager == self.current_bet)
    }

    /// Hand the turn to the next owed seat clockwise from `from_seat`.
    fn open_action(
        &mut self,
        from_seat: usize,
        events: &mut Vec<EngineEvent>,
    ) -> Result<(), EngineError> {
        // First owed seat clockwise; owed seats are always active.
        let mut next = None;
        let mut seat = from_seat;
        for _ in 0..self.seats.len() {
            seat = (seat + 1) % self.seats.len();
            if self.owes_action.contains(&seat) {
                next = Some(seat);
                break;
            }
        }
        let Some(next) = next else {
            // All-in preflops land here straight from the blinds.
            self.advance_streets(events)?;
            return Ok(());
        };
        self.actor_seat = Some(next);
        let player = self.seats[next].as_ref().expect("owed seat is occupied");
        let call_amount = self.current_bet - player.street_wager.min(self.current_bet);
        let max_raise_to = player.street_wager + player.chips;
        let min_raise_to = (self.current_bet + self.min_raise).min(max_raise_to);
        events.push(EngineEvent::ActionOn {
            seat: next,
            player_id: player.id.clone(),
            call_amount: call_amount.min(player.chips),
            min_raise_to,
            max_raise_to,
        });
        Ok(())
    }

    /// Close the current street and advance. When at most one player can
    /// still act voluntarily, the remaining community cards run out and the
    /// hand goes straight to showdown.
    fn advance_streets(&mut self, events: &mut Vec<EngineEvent>) -> Result<(), EngineError> {
        self.actor_seat = None;
        loop {
            for player in self.seats.iter_mut().flatten() {
                player.street_wager = 0;
                if player.state == PlayerState::Active {
                    player.last_action = LastAction::None;
                }
            }
            self.current_bet = 0;
            self.min_raise = self.config.big_blind;
            self.betting_capped = false;
            self.owes_action.clear();

            let next = match self.phase {
                HandPhase::Preflop => HandPhase::Flop,
                HandPhase::Flop => HandPhase::Turn,
                HandPhase::Turn => HandPhase::River,
                HandPhase::River => {
                    self.showdown(events)?;
                    return Ok(());
                }
                phase => return Err(EngineError::WrongPhase { phase }),
            };

            self.deck.burn()?;
            let count = if next == HandPhase::Flop { 3 } else { 1 };
            let mut dealt = Vec::with_capacity(count);
            for _ in 0..count {
                dealt.push(self.deck.deal()?);
            }
            self.community.extend_from_slice(&dealt);
            self.phase = next;
            events.push(EngineEvent::PhaseChanged { phase: next });
            events.push(EngineEvent::CommunityDealt {
                phase: next,
                cards: dealt,
            });

            if self.voluntary_count() <= 1 {
                // Nobody left to bet; keep dealing to the river.
                continue;
            }

            self.owes_action = self
                .players()
                .filter(|p| p.state == PlayerState::Active)
                .map(|p| p.seat)
                .collect();
            self.open_action(self.dealer_seat, events)?;
            return Ok(());
        }
    }

    fn contributions(&self) -> Vec<Contribution> {
        self.players()
            .filter(|p| p.hand_wager > 0)
            .map(|p| Contribution {
                player_id: p.id.clone(),
                amount: p.hand_wager,
                live: p.in_hand(),
            })
            .collect()
    }

    /// Current pot layers, for display.
    pub fn pot_views(&self) -> Vec<PotView> {
        build_pots(&self.contributions())
            .iter()
            .map(Pot::view)
            .collect()
    }

    fn showdown(&mut self, events: &mut Vec<EngineEvent>) -> Result<(), EngineError> {
        self.phase = HandPhase::Showdown;
        events.push(EngineEvent::PhaseChanged {
            phase: HandPhase::Showdown,
        });

        let mut ranks: HashMap<String, (usize, HandRank)> = HashMap::new();
        for player in self.players().filter(|p| p.in_hand()) {
            let hole = player.hole_cards.ok_or(EngineError::InvalidHand)?;
            events.push(EngineEvent::ShowdownReveal {
                seat: player.seat,
                player_id: player.id.clone(),
                cards: hole,
            });
            let rank = evaluator::evaluate(&hole, &self.community)?;
            ranks.insert(player.id.clone(), (player.seat, rank));
        }

        let pots = build_pots(&self.contributions());
        let pot_total: u64 = pots.iter().map(|p| p.amount).sum();
        let mut won: HashMap<String, u64> = HashMap::new();
        for pot in &pots {
            let best = pot
                .eligible
                .iter()
                .filter_map(|id| ranks.get(id).map(|(_, rank)| rank))
                .max()
                .cloned();
            let Some(best) = best else { continue };
            // Winners ordered clockwise from the button so the odd chip
            // lands deterministically.
            let mut winners: Vec<&String> = pot
                .eligible
                .iter()
                .filter(|id| ranks.get(*id).map(|(_, rank)| rank) == Some(&best))
                .collect();
            winners.sort_by_key(|id| {
                let seat = ranks[id.as_str()].0;
                (seat + self.seats.len() - 1 - self.dealer_seat) % self.seats.len()
            });
            let shares = split_amount(pot.amount, winners.len());
            for (id, share) in winners.into_iter().zip(shares) {
                *won.entry(id.clone()).or_default() += share;
            }
        }

        let mut payouts = Vec::new();
        for (id, amount) in won {
            let (seat, rank) = ranks[&id].clone();
            if let Some(player) = self.seats[seat].as_mut() {
                player.chips += amount;
            }
            payouts.push(Payout {
                seat,
                player_id: id,
                amount,
                hand: Some(rank),
            });
        }
        payouts.sort_by_key(|p| p.seat);

        self.finish_hand(payouts, pot_total, events);
        Ok(())
    }

    fn finish_by_fold(&mut self, events: &mut Vec<EngineEvent>) {
        self.actor_seat = None;
        let pot_total = self.pot_total();
        let winner = self
            .players()
            .find(|p| p.in_hand())
            .map(|p| (p.seat, p.id.clone()));
        let mut payouts = Vec::new();
        if let Some((seat, player_id)) = winner {
            if let Some(player) = self.seats[seat].as_mut() {
                player.chips += pot_total;
            }
            payouts.push(Payout {
                seat,
                player_id,
                amount: pot_total,
                hand: None,
            });
        }
        self.finish_hand(payouts, pot_total, events);
    }

    fn finish_hand(&mut self, payouts: Vec<Payout>, pot_total: u64, events: &mut Vec<EngineEvent>) {
        self.phase = HandPhase::Finished;
        self.actor_seat = None;
        self.owes_action.clear();
        // The pot has been paid out; wagers are history now.
        for player in self.seats.iter_mut().flatten() {
            player.street_wager = 0;
            player.hand_wager = 0;
        }
        events.push(EngineEvent::PhaseChanged {
            phase: HandPhase::Finished,
        });
        events.push(EngineEvent::HandFinished { payouts, pot_total });

        for seat in std::mem::take(&mut self.pending_sit_outs) {
            if let Some(player) = self.seats.get_mut(seat).and_then(Option::as_mut) {
                player.state = PlayerState::SittingOut;
            }
        }
        for seat in std::mem::take(&mut self.pending_removals) {
            if let Some(slot) = self.seats.get_mut(seat) {
                *slot = None;
            }
            self.pending_buy_ins.retain(|(s, _)| *s != seat);
        }
    }

    fn next_seat_where(
        &self,
        from: usize,
        predicate: impl Fn(&Player) -> bool,
    ) -> Option<usize> {
        let len = self.seats.len();
        let mut seat = from;
        for _ in 0..len {
            seat = (seat + 1) % len;
            if let Some(player) = self.seats[seat].as_ref() {
                if predicate(player) {
                    return Some(seat);
                }
            }
        }
        None
    }

    // ---- views ----

    /// The redacted table state broadcast to every client.
    pub fn table_state(&self, table_id: &str, action_deadline_ms: Option<i64>) -> TableState {
        TableState {
            table_id: table_id.to_string(),
            hand_number: self.hand_number,
            phase: self.phase,
            community: self.community.clone(),
            pots: self.pot_views(),
            current_bet: self.current_bet,
            min_raise: self.min_raise,
            dealer_seat: self.phase.in_hand().then_some(self.dealer_seat),
            actor_seat: self.actor_seat,
            action_deadline_ms,
            config: self.config.clone(),
            players: self.players().map(SeatView::public).collect(),
        }
    }

    /// As [`Self::table_state`], with `player_id`'s own hole cards included.
    pub fn table_state_for(
        &self,
        table_id: &str,
        player_id: &str,
        action_deadline_ms: Option<i64>,
    ) -> TableState {
        let mut state = self.table_state(table_id, action_deadline_ms);
        if let Some(player) = self.players().find(|p| p.id == player_id) {
            if let Some(view) = state.players.iter_mut().find(|v| v.player_id == player_id) {
                view.hole_cards = player.hole_cards;
            }
        }
        state
    }
}

fn state_name(state: PlayerState) -> &'static str {
    match state {
        PlayerState::Waiting => "waiting",
        PlayerState::Active => "active",
        PlayerState::Folded => "folded",
        PlayerState::AllIn => "all_in",
        PlayerState::SittingOut => "sitting_out",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use felt_types::HandCategory;

    fn config(small: u64, big: u64) -> TableConfig {
        TableConfig {
            small_blind: small,
            big_blind: big,
            max_seats: 6,
            ..TableConfig::default()
        }
    }

    fn engine_with(stacks: &[u64]) -> HandEngine {
        let mut engine = HandEngine::new(config(10, 20), Some(99));
        for (index, &stack) in stacks.iter().enumerate() {
            engine
                .add_player(format!("p{}", index + 1), format!("P{}", index + 1), stack, false)
                .expect("seats available");
        }
        engine
    }

    fn total_chips(engine: &HandEngine) -> u64 {
        engine.players().map(|p| p.chips).sum::<u64>() + engine.pot_total()
    }

    fn card(s: &str) -> Card {
        s.parse().expect("card parses")
    }

    fn hole(a: &str, b: &str) -> [Card; 2] {
        [card(a), card(b)]
    }

    #[test]
    fn test_seats_assigned_lowest_free() {
        let mut engine = engine_with(&[1_000, 1_000, 1_000]);
        let (_, _) = engine.remove_player(1).expect("seat occupied");
        let seat = engine
            .add_player("p4", "P4", 500, false)
            .expect("seat available");
        assert_eq!(seat, 1);
        assert_eq!(
            engine.add_player("p4", "P4", 500, false),
            Err(EngineError::AlreadySeated)
        );
    }

    #[test]
    fn test_heads_up_fold_preflop() {
        // Dealer posts the small blind and acts first; folding hands the
        // blinds to the big blind with no showdown.
        let mut engine = engine_with(&[1_000, 1_000]);
        let events = engine.start_hand().expect("hand starts");
        assert_eq!(engine.phase(), HandPhase::Preflop);

        let dealer = match events.first() {
            Some(EngineEvent::HandStarted { dealer_seat, .. }) => *dealer_seat,
            other => panic!("expected HandStarted, got {other:?}"),
        };
        assert!(engine.player(dealer).expect("seated").is_small_blind);
        assert_eq!(engine.actor_seat(), Some(dealer));

        let before = total_chips(&engine);
        let events = engine.apply(dealer, Action::Fold).expect("fold is legal");
        assert_eq!(engine.phase(), HandPhase::Finished);
        assert!(!events
            .iter()
            .any(|e| matches!(e, EngineEvent::ShowdownReveal { .. })));
        let payout = events
            .iter()
            .find_map(|e| match e {
                EngineEvent::HandFinished { payouts, .. } => Some(payouts.clone()),
                _ => None,
            })
            .expect("hand finished");
        assert_eq!(payout.len(), 1);
        assert_eq!(payout[0].amount, 30);
        assert!(payout[0].hand.is_none());

        let folder = engine.player(dealer).expect("seated");
        let winner = engine
            .players()
            .find(|p| p.seat != dealer)
            .expect("two players");
        assert_eq!(folder.chips, 990);
        assert_eq!(winner.chips, 1_010);
        assert_eq!(total_chips(&engine), before);
    }

    #[test]
    fn test_big_blind_gets_option_when_unraised() {
        let mut engine = engine_with(&[1_000, 1_000, 1_000]);
        engine.start_hand().expect("hand starts");
        let bb = engine.big_blind_seat;

        // Everyone limps; the big blind must still be offered an action.
        while engine.actor_seat() != Some(bb) {
            let actor = engine.actor_seat().expect("actor set");
            engine.apply(actor, Action::Call).expect("call is legal");
            assert_eq!(engine.phase(), HandPhase::Preflop);
        }
        assert_eq!(
            engine.apply(bb, Action::Call),
            Err(EngineError::NothingToCall)
        );
        engine.apply(bb, Action::Check).expect("option check");
        assert_eq!(engine.phase(), HandPhase::Flop);
        assert_eq!(engine.community().len(), 3);
    }

    #[test]
    fn test_street_transitions_and_wager_reset() {
        let mut engine = engine_with(&[1_000, 1_000, 1_000]);
        engine.start_hand().expect("hand starts");

        for expected in [HandPhase::Flop, HandPhase::Turn, HandPhase::River] {
            while engine.phase() != expected {
                let actor = engine.actor_seat().expect("actor set");
                let player = engine.player(actor).expect("seated");
                let to_call = engine.current_bet() - player.street_wager;
                let action = if to_call > 0 { Action::Call } else { Action::Check };
                engine.apply(actor, action).expect("action is legal");
            }
            // Street transition invariant: wagers cleared, bet reset.
            assert_eq!(engine.current_bet(), 0);
            assert_eq!(engine.min_raise(), 20);
            for player in engine.players().filter(|p| p.state == PlayerState::Active) {
                assert_eq!(player.street_wager, 0);
            }
        }
        assert_eq!(engine.community().len(), 5);
    }

    #[test]
    fn test_full_raise_reopens_action() {
        let mut engine = engine_with(&[1_000, 1_000, 1_000]);
        engine.start_hand().expect("hand starts");
        let first = engine.actor_seat().expect("actor set");
        engine.apply(first, Action::Call).expect("limp");
        let sb = engine.actor_seat().expect("actor set");
        engine
            .apply(sb, Action::Raise { to: 80 })
            .expect("raise is legal");
        // The limper owes action again and may re-raise.
        assert_eq!(engine.min_raise(), 60);
        let bb = engine.actor_seat().expect("actor set");
        engine.apply(bb, Action::Fold).expect("fold");
        assert_eq!(engine.actor_seat(), Some(first));
        engine
            .apply(first, Action::Raise { to: 140 })
            .expect("re-raise after reopen");
    }

    #[test]
    fn test_raise_below_minimum_rejected() {
        let mut engine = engine_with(&[1_000, 1_000, 1_000]);
        engine.start_hand().expect("hand starts");
        let actor = engine.actor_seat().expect("actor set");
        assert_eq!(
            engine.apply(actor, Action::Raise { to: 30 }),
            Err(EngineError::BelowMinimumRaise { to: 30, min: 40 })
        );
        assert_eq!(
            engine.apply(actor, Action::Raise { to: 5_000 }),
            Err(EngineError::RaiseExceedsStack {
                to: 5_000,
                available: 1_000
            })
        );
        // Rejections leave the state untouched.
        assert_eq!(engine.current_bet(), 20);
        assert_eq!(engine.actor_seat(), Some(actor));
    }

    #[test]
    fn test_wrong_turn_rejected() {
        let mut engine = engine_with(&[1_000, 1_000, 1_000]);
        engine.start_hand().expect("hand starts");
        let actor = engine.actor_seat().expect("actor set");
        let other = engine
            .players()
            .map(|p| p.seat)
            .find(|s| Some(*s) != engine.actor_seat())
            .expect("three players");
        assert_eq!(
            engine.apply(other, Action::Fold),
            Err(EngineError::NotYourTurn)
        );
        assert_eq!(engine.actor_seat(), Some(actor));
    }

    #[test]
    fn test_all_in_under_raise_does_not_reopen() {
        // Blinds 10/20. Seat 0 (first to act) raises to 60; the short stack
        // jams for 75, below the minimum re-raise to 100. Everyone else may
        // only call or fold.
        let mut engine = HandEngine::new(config(10, 20), Some(5));
        engine.add_player("p1", "P1", 1_000, false).expect("seat");
        engine.add_player("p2", "P2", 75, false).expect("seat");
        engine.add_player("p3", "P3", 1_000, false).expect("seat");
        engine.start_hand().expect("hand starts");
        // Seat 0 deals, seat 1 posts small, seat 2 posts big; seat 0 opens.
        assert_eq!(engine.actor_seat(), Some(0));

        engine.apply(0, Action::Raise { to: 60 }).expect("open raise");
        assert_eq!(engine.actor_seat(), Some(1));
        engine.apply(1, Action::AllIn).expect("jam");
        assert_eq!(engine.current_bet(), 75);

        // Big blind never acted voluntarily but still may not re-raise.
        assert_eq!(engine.actor_seat(), Some(2));
        assert_eq!(
            engine.apply(2, Action::Raise { to: 200 }),
            Err(EngineError::RaiseNotReopened)
        );
        engine.apply(2, Action::Call).expect("call the jam");

        // The original raiser owes the difference but may only call or fold.
        assert_eq!(engine.actor_seat(), Some(0));
        assert_eq!(
            engine.apply(0, Action::Raise { to: 200 }),
            Err(EngineError::RaiseNotReopened)
        );
        engine.apply(0, Action::Call).expect("complete to 75");
        assert_eq!(engine.phase(), HandPhase::Flop);
    }

    #[test]
    fn test_short_call_is_all_in_and_never_reopens() {
        let mut engine = HandEngine::new(config(10, 20), Some(5));
        engine.add_player("p1", "P1", 1_000, false).expect("seat");
        engine.add_player("p2", "P2", 50, false).expect("seat");
        engine.add_player("p3", "P3", 1_000, false).expect("seat");
        engine.start_hand().expect("hand starts");

        engine.apply(0, Action::Raise { to: 200 }).expect("open");
        // Seat 1 calls short: an all-in for 50 total.
        let events = engine.apply(1, Action::Call).expect("short call");
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::PlayerActed {
                action: ActionKind::AllIn,
                ..
            }
        )));
        assert_eq!(engine.current_bet(), 200);
        assert_eq!(engine.player(1).expect("seated").chips, 0);
        assert_eq!(engine.player(1).expect("seated").state, PlayerState::AllIn);
    }

    #[test]
    fn test_all_in_runout_reaches_showdown() {
        let mut engine = engine_with(&[500, 500]);
        engine.start_hand().expect("hand starts");
        let before = total_chips(&engine);
        let first = engine.actor_seat().expect("actor set");
        engine.apply(first, Action::AllIn).expect("jam");
        let other = engine.actor_seat().expect("actor set");
        let events = engine.apply(other, Action::Call).expect("call");

        // Board runs out with no further action and the hand settles.
        assert_eq!(engine.phase(), HandPhase::Finished);
        assert_eq!(engine.community().len(), 5);
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::ShowdownReveal { .. })));
        assert_eq!(total_chips(&engine), before);
        let paid: u64 = events
            .iter()
            .find_map(|e| match e {
                EngineEvent::HandFinished { payouts, .. } => {
                    Some(payouts.iter().map(|p| p.amount).sum())
                }
                _ => None,
            })
            .expect("hand finished");
        assert_eq!(paid, 1_000);
    }

    #[test]
    fn test_timeout_checks_when_free_and_folds_when_facing_bet() {
        let mut engine = engine_with(&[1_000, 1_000, 1_000]);
        engine.start_hand().expect("hand starts");
        let actor = engine.actor_seat().expect("actor set");
        // Facing the big blind: the timeout folds.
        let events = engine.timeout(actor).expect("timeout resolves");
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::PlayerActed {
                action: ActionKind::Fold,
                ..
            }
        )));

        // Walk to the flop; the first actor there faces no bet, so a
        // timeout checks instead.
        let sb = engine.actor_seat().expect("actor set");
        engine.apply(sb, Action::Call).expect("call");
        let bb = engine.actor_seat().expect("actor set");
        engine.apply(bb, Action::Check).expect("option");
        assert_eq!(engine.phase(), HandPhase::Flop);
        let actor = engine.actor_seat().expect("actor set");
        let events = engine.timeout(actor).expect("timeout resolves");
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::PlayerActed {
                action: ActionKind::Check,
                ..
            }
        )));
    }

    #[test]
    fn test_three_way_side_pots_settle_per_layer() {
        // Stacks 100/200/300 all-in preflop; the rigged board and holes give
        // the short stack the best hand overall and the big stack the best
        // among the side-pot contenders.
        let mut engine = engine_with(&[100, 200, 300]);
        engine.start_hand().expect("hand starts");
        let mut actor = engine.actor_seat().expect("actor set");
        for _ in 0..3 {
            engine.apply(actor, Action::AllIn).expect("jam");
            if let Some(next) = engine.actor_seat() {
                actor = next;
            } else {
                break;
            }
        }
        assert_eq!(engine.phase(), HandPhase::Finished);

        // Re-run the settlement with the cards pinned to the scenario.
        let mut engine = engine_with(&[0, 0, 0]);
        engine.phase = HandPhase::River;
        engine.dealer_seat = 0;
        engine.hand_number = 1;
        engine.community = vec![card("2h"), card("3h"), card("4h"), card("7c"), card("9d")];
        let holes = [hole("Ah", "Kh"), hole("As", "Ad"), hole("2c", "2d")];
        let wagers = [100, 200, 300];
        for seat in 0..3 {
            let player = engine.seats[seat].as_mut().expect("seated");
            player.state = PlayerState::AllIn;
            player.hole_cards = Some(holes[seat]);
            player.hand_wager = wagers[seat];
        }
        let mut events = Vec::new();
        engine.showdown(&mut events).expect("showdown settles");

        let payouts = events
            .iter()
            .find_map(|e| match e {
                EngineEvent::HandFinished { payouts, pot_total } => {
                    Some((payouts.clone(), *pot_total))
                }
                _ => None,
            })
            .expect("hand finished");
        assert_eq!(payouts.1, 600);
        // P1's heart flush takes the 300 main pot; P3's set takes both side
        // pots (200 + 100); P2's aces take nothing.
        assert_eq!(engine.player(0).expect("seated").chips, 300);
        assert_eq!(engine.player(1).expect("seated").chips, 0);
        assert_eq!(engine.player(2).expect("seated").chips, 300);
        let p1 = payouts.0.iter().find(|p| p.player_id == "p1").expect("p1");
        assert_eq!(p1.amount, 300);
        assert_eq!(
            p1.hand.as_ref().map(|h| h.category),
            Some(HandCategory::Flush)
        );
        let p3 = payouts.0.iter().find(|p| p.player_id == "p3").expect("p3");
        assert_eq!(p3.amount, 300);
        assert_eq!(
            p3.hand.as_ref().map(|h| h.category),
            Some(HandCategory::ThreeOfAKind)
        );
    }

    #[test]
    fn test_split_pot_odd_chip_goes_clockwise_from_button() {
        let mut engine = engine_with(&[0, 0, 0]);
        engine.phase = HandPhase::River;
        engine.dealer_seat = 0;
        engine.hand_number = 1;
        engine.community = vec![card("Ah"), card("Kd"), card("Qc"), card("Js"), card("Th")];
        // Seats 0 and 1 both play the board; the folded seat's dead chip
        // makes the pot odd (100 + 100 + 101 = 301).
        let holes = [hole("2c", "3c"), hole("2d", "3d"), hole("4c", "5d")];
        for seat in 0..3 {
            let player = engine.seats[seat].as_mut().expect("seated");
            player.hole_cards = Some(holes[seat]);
            if seat == 2 {
                player.state = PlayerState::Folded;
                player.hand_wager = 101;
            } else {
                player.state = PlayerState::AllIn;
                player.hand_wager = 100;
            }
        }
        let mut events = Vec::new();
        engine.showdown(&mut events).expect("showdown settles");
        // Seat 1 sits clockwise from the button and receives the odd chip.
        assert_eq!(engine.player(1).expect("seated").chips, 151);
        assert_eq!(engine.player(0).expect("seated").chips, 150);
        assert_eq!(engine.player(2).expect("seated").chips, 0);
    }

    #[test]
    fn test_chip_conservation_across_scripted_hand() {
        let mut engine = engine_with(&[1_000, 800, 1_200, 600]);
        let before: u64 = engine.players().map(|p| p.chips).sum();
        engine.start_hand().expect("hand starts");
        while engine.phase().in_hand() {
            let Some(actor) = engine.actor_seat() else { break };
            let player = engine.player(actor).expect("seated");
            let to_call = engine.current_bet() - player.street_wager;
            // Raise once per street opportunity, otherwise call/check.
            let action = if engine.current_bet() == 0 {
                Action::Raise {
                    to: engine.min_raise(),
                }
            } else if to_call > 0 {
                Action::Call
            } else {
                Action::Check
            };
            engine.apply(actor, action).expect("scripted action legal");
        }
        assert_eq!(engine.phase(), HandPhase::Finished);
        let after: u64 = engine.players().map(|p| p.chips).sum();
        assert_eq!(before, after);

        // Pot layers always sum to the wagers.
        assert_eq!(engine.pot_total(), 0);
    }

    #[test]
    fn test_start_hand_preconditions() {
        let mut engine = engine_with(&[1_000]);
        assert!(!engine.can_start());
        assert_eq!(engine.start_hand(), Err(EngineError::NotEnoughPlayers));
        engine.add_player("p2", "P2", 0, false).expect("seat");
        // A bust stack does not count toward the minimum.
        assert_eq!(engine.start_hand(), Err(EngineError::NotEnoughPlayers));
        engine.buy_in(1, 500).expect("top up");
        assert!(engine.can_start());
        engine.start_hand().expect("hand starts");
        assert_eq!(
            engine.start_hand(),
            Err(EngineError::WrongPhase {
                phase: HandPhase::Preflop
            })
        );
    }

    #[test]
    fn test_button_advances_between_hands() {
        let mut engine = engine_with(&[1_000, 1_000, 1_000]);
        engine.start_hand().expect("hand starts");
        let first_dealer = engine.dealer_seat;
        let actor = engine.actor_seat().expect("actor set");
        engine.apply(actor, Action::Fold).expect("fold");
        let actor = engine.actor_seat().expect("actor set");
        engine.apply(actor, Action::Fold).expect("fold");
        assert_eq!(engine.phase(), HandPhase::Finished);
        engine.start_hand().expect("next hand");
        assert_eq!(engine.dealer_seat, (first_dealer + 1) % 6);
    }

    #[test]
    fn test_mid_hand_leave_folds_and_frees_seat_after_hand() {
        let mut engine = engine_with(&[1_000, 1_000, 1_000]);
        engine.start_hand().expect("hand starts");
        // Seat 1 leaves mid-hand while not the actor.
        let leaving = engine
            .players()
            .map(|p| p.seat)
            .find(|s| Some(*s) != engine.actor_seat())
            .expect("someone else");
        let (chips, events) = engine.remove_player(leaving).expect("removal");
        assert!(chips <= 1_000);
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::PlayerActed {
                action: ActionKind::Fold,
                ..
            }
        )));
        // Seat still shows occupied until the hand concludes.
        assert!(engine.player(leaving).is_some());
        let remaining: Vec<usize> = engine
            .players()
            .filter(|p| p.in_hand())
            .map(|p| p.seat)
            .collect();
        assert!(!remaining.contains(&leaving));

        while engine.phase().in_hand() {
            let Some(actor) = engine.actor_seat() else { break };
            engine.timeout(actor).expect("timeout resolves");
        }
        assert_eq!(engine.phase(), HandPhase::Finished);
        assert!(engine.player(leaving).is_none());
    }

    #[test]
    fn test_private_view_includes_only_own_hole_cards() {
        let mut engine = engine_with(&[1_000, 1_000]);
        engine.start_hand().expect("hand starts");
        let state = engine.table_state("t1", None);
        assert!(state.players.iter().all(|p| p.hole_cards.is_none()));
        let private = engine.table_state_for("t1", "p1", None);
        let own = private
            .players
            .iter()
            .find(|p| p.player_id == "p1")
            .expect("seated");
        assert!(own.hole_cards.is_some());
        let other = private
            .players
            .iter()
            .find(|p| p.player_id == "p2")
            .expect("seated");
        assert!(other.hole_cards.is_none());
    }

    #[test]
    fn test_seeded_hands_are_reproducible() {
        let run = |seed: u64| -> Vec<Card> {
            let mut engine = HandEngine::new(config(10, 20), Some(seed));
            engine.add_player("a", "A", 1_000, false).expect("seat");
            engine.add_player("b", "B", 1_000, false).expect("seat");
            engine.start_hand().expect("hand starts");
            engine
                .players()
                .flat_map(|p| p.hole_cards.into_iter().flatten())
                .collect()
        };
        assert_eq!(run(7), run(7));
        assert_ne!(run(7), run(8));
    }

    #[test]
    fn test_antes_join_pot_without_counting_as_street_wagers() {
        let mut engine = HandEngine::new(
            TableConfig {
                small_blind: 10,
                big_blind: 20,
                ante: 5,
                max_seats: 3,
                ..TableConfig::default()
            },
            Some(17),
        );
        engine.add_player("a", "A", 1_000, false).expect("seat");
        engine.add_player("b", "B", 1_000, false).expect("seat");
        engine.add_player("c", "C", 1_000, false).expect("seat");
        engine.start_hand().expect("hand starts");

        // 3 antes + both blinds.
        assert_eq!(engine.pot_total(), 15 + 30);
        for player in engine.players() {
            assert!(player.hand_wager >= 5);
            // The ante never counts toward what a player has in this street.
            assert!(player.street_wager <= 20);
        }
        // Calling still owes the full big blind, antes notwithstanding.
        let actor = engine.actor_seat().expect("actor set");
        engine.apply(actor, Action::Call).expect("call");
        assert_eq!(engine.player(actor).expect("seated").street_wager, 20);
        assert_eq!(engine.player(actor).expect("seated").hand_wager, 25);
    }

    #[test]
    fn test_mid_hand_buy_in_applies_at_next_hand() {
        let mut engine = engine_with(&[1_000, 1_000]);
        engine.start_hand().expect("hand starts");
        let dealt = engine
            .players()
            .find(|p| p.in_hand())
            .map(|p| p.seat)
            .expect("someone dealt");
        let before = engine.player(dealt).expect("seated").chips;
        engine.buy_in(dealt, 500).expect("queued");
        // Nothing changes while the hand runs.
        assert_eq!(engine.player(dealt).expect("seated").chips, before);

        let actor = engine.actor_seat().expect("actor set");
        engine.apply(actor, Action::Fold).expect("fold ends hand");
        let settled = engine.player(dealt).expect("seated").chips;
        engine.start_hand().expect("next hand");
        let player = engine.player(dealt).expect("seated");
        // The top-up landed before blinds were posted.
        assert_eq!(player.chips + player.hand_wager, settled + 500);
    }

    #[test]
    fn test_sit_out_and_back_in() {
        let mut engine = engine_with(&[1_000, 1_000, 1_000]);
        engine.sit_out(2).expect("sits out");
        engine.start_hand().expect("hand starts without seat 2");
        assert_eq!(
            engine.player(2).expect("seated").state,
            PlayerState::SittingOut
        );
        assert!(engine.player(2).expect("seated").hole_cards.is_none());

        // Finish the hand, sit back in, and get dealt next time.
        let actor = engine.actor_seat().expect("actor set");
        engine.apply(actor, Action::Fold).expect("fold ends hand");
        assert_eq!(engine.phase(), HandPhase::Finished);
        engine.sit_in(2).expect("sits in");
        engine.start_hand().expect("next hand");
        assert_eq!(engine.player(2).expect("seated").state, PlayerState::Active);
        assert!(engine.player(2).expect("seated").hole_cards.is_some());
    }

    #[test]
    fn test_mid_hand_sit_out_folds_first() {
        let mut engine = engine_with(&[1_000, 1_000, 1_000]);
        engine.start_hand().expect("hand starts");
        let bystander = engine
            .players()
            .map(|p| p.seat)
            .find(|s| Some(*s) != engine.actor_seat())
            .expect("someone else");
        let events = engine.sit_out(bystander).expect("sits out");
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::PlayerActed {
                action: ActionKind::Fold,
                ..
            }
        )));
        assert_eq!(
            engine.player(bystander).expect("seated").state,
            PlayerState::Folded
        );

        // The sit-out takes over once the hand is done.
        while engine.phase().in_hand() {
            let Some(actor) = engine.actor_seat() else { break };
            engine.timeout(actor).expect("timeout resolves");
        }
        assert_eq!(
            engine.player(bystander).expect("seated").state,
            PlayerState::SittingOut
        );
    }
}
