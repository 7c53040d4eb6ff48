//! Pot construction and splitting.
//!
//! Layers are rebuilt from whole-hand contribution totals whenever they are
//! needed, so street-by-street collection and showdown settlement share one
//! implementation.

use felt_types::PotView;

/// One pot layer: an amount plus the ids eligible to win it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pot {
    pub amount: u64,
    pub eligible: Vec<String>,
    pub is_side: bool,
}

impl Pot {
    pub fn view(&self) -> PotView {
        PotView {
            amount: self.amount,
            eligible: self.eligible.clone(),
            is_side: self.is_side,
        }
    }
}

/// A player's total contribution to the hand.
#[derive(Clone, Debug)]
pub struct Contribution {
    pub player_id: String,
    pub amount: u64,
    /// Whether the player is still in the hand (has not folded).
    pub live: bool,
}

/// Partition contributions into pot layers by ascending live thresholds.
///
/// For each distinct contribution level among live players, one layer holds
/// every chip committed between the previous level and this one; folded
/// players' chips count toward the layer amounts but never toward
/// eligibility. Contributions above the highest live level (a folded player
/// covering the table) fold into the last layer. Empty layers are dropped.
pub fn build_pots(contributions: &[Contribution]) -> Vec<Pot> {
    let mut levels: Vec<u64> = contributions
        .iter()
        .filter(|c| c.live && c.amount > 0)
        .map(|c| c.amount)
        .collect();
    levels.sort_unstable();
    levels.dedup();
    if levels.is_empty() {
        return Vec::new();
    }

    let mut pots = Vec::with_capacity(levels.len());
    let mut previous = 0u64;
    for &level in &levels {
        let amount: u64 = contributions
            .iter()
            .map(|c| c.amount.min(level) - c.amount.min(previous))
            .sum();
        let eligible: Vec<String> = contributions
            .iter()
            .filter(|c| c.live && c.amount >= level)
            .map(|c| c.player_id.clone())
            .collect();
        if amount > 0 {
            pots.push(Pot {
                amount,
                eligible,
                is_side: !pots.is_empty(),
            });
        }
        previous = level;
    }

    // Chips above the highest live level are dead money for the last layer.
    let dead: u64 = contributions
        .iter()
        .map(|c| c.amount - c.amount.min(previous))
        .sum();
    if dead > 0 {
        if let Some(last) = pots.last_mut() {
            last.amount += dead;
        }
    }

    pots
}

/// Split `amount` among `winners` in layer order: each gets the floor share
/// and the remainder goes to the winner earliest in `winners`, which callers
/// order clockwise from the dealer button.
pub fn split_amount(amount: u64, winners: usize) -> Vec<u64> {
    let winners = winners.max(1) as u64;
    let share = amount / winners;
    let remainder = amount % winners;
    (0..winners)
        .map(|i| if i == 0 { share + remainder } else { share })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(id: &str, amount: u64, live: bool) -> Contribution {
        Contribution {
            player_id: id.into(),
            amount,
            live,
        }
    }

    #[test]
    fn test_single_layer_when_even() {
        let pots = build_pots(&[
            contribution("a", 100, true),
            contribution("b", 100, true),
            contribution("c", 100, true),
        ]);
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].amount, 300);
        assert_eq!(pots[0].eligible.len(), 3);
        assert!(!pots[0].is_side);
    }

    #[test]
    fn test_three_way_all_in_layers() {
        // Stacks 100/200/300 all-in: layers 300, 200, 100 per the side-pot
        // boundary case.
        let pots = build_pots(&[
            contribution("p1", 100, true),
            contribution("p2", 200, true),
            contribution("p3", 300, true),
        ]);
        assert_eq!(pots.len(), 3);
        assert_eq!(pots[0].amount, 300);
        assert_eq!(pots[0].eligible, vec!["p1", "p2", "p3"]);
        assert!(!pots[0].is_side);
        assert_eq!(pots[1].amount, 200);
        assert_eq!(pots[1].eligible, vec!["p2", "p3"]);
        assert!(pots[1].is_side);
        assert_eq!(pots[2].amount, 100);
        assert_eq!(pots[2].eligible, vec!["p3"]);
        assert!(pots[2].is_side);
    }

    #[test]
    fn test_folded_chips_are_dead_money() {
        let pots = build_pots(&[
            contribution("folder", 60, false),
            contribution("a", 100, true),
            contribution("b", 100, true),
        ]);
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].amount, 260);
        assert_eq!(pots[0].eligible, vec!["a", "b"]);
    }

    #[test]
    fn test_folder_covering_the_table_feeds_last_layer() {
        let pots = build_pots(&[
            contribution("folder", 500, false),
            contribution("a", 100, true),
            contribution("b", 200, true),
        ]);
        assert_eq!(pots.len(), 2);
        // Main: 100*2 + 100 dead; side: 100 + 100 dead + 300 excess dead.
        assert_eq!(pots[0].amount, 300);
        assert_eq!(pots[1].amount, 500);
        assert_eq!(pots[1].eligible, vec!["b"]);
        let total: u64 = pots.iter().map(|p| p.amount).sum();
        assert_eq!(total, 800);
    }

    #[test]
    fn test_pot_total_matches_contributions() {
        let contributions = [
            contribution("a", 37, true),
            contribution("b", 512, true),
            contribution("c", 512, false),
            contribution("d", 90, true),
        ];
        let pots = build_pots(&contributions);
        let total: u64 = pots.iter().map(|p| p.amount).sum();
        let wagered: u64 = contributions.iter().map(|c| c.amount).sum();
        assert_eq!(total, wagered);
    }

    #[test]
    fn test_no_live_contributions_builds_nothing() {
        assert!(build_pots(&[contribution("a", 0, true)]).is_empty());
        assert!(build_pots(&[]).is_empty());
    }

    #[test]
    fn test_split_remainder_goes_to_first_winner() {
        assert_eq!(split_amount(301, 2), vec![151, 150]);
        assert_eq!(split_amount(300, 3), vec![100, 100, 100]);
        assert_eq!(split_amount(5, 1), vec![5]);
    }
}
