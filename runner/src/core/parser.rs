//! Stateless parsing of raw game output into partial state updates.
//!
//! Markers are matched by substring on upper-cased, trimmed lines, in any
//! order. When a category matches more than once in a batch the last match
//! wins. This is a simplification: the game never promises one report per
//! category per prompt, so a batch carrying two location lines (a bat snatch
//! followed by a landing) keeps only the later one.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::core::types::{DeathCause, Terminal};

/// Number of tunnels leading out of every room.
pub const TUNNEL_ARITY: usize = 3;

const LOCATION_MARKER: &str = "YOU ARE IN ROOM";
const TUNNELS_MARKER: &str = "TUNNELS LEAD TO";
const BATS_MARKER: &str = "BATS NEARBY";
const DRAFT_MARKER: &str = "FEEL A DRAFT";
const SMELL_MARKER: &str = "SMELL A WUMPUS";
const VICTORY_MARKER: &str = "YOU GOT THE WUMPUS";

pub(crate) const PIT_DEATH_MARKER: &str = "FELL IN PIT";
pub(crate) const WUMPUS_DEATH_MARKER: &str = "WUMPUS GOT YOU";
pub(crate) const ARROWS_DEATH_MARKER: &str = "RAN OUT OF ARROWS";

const DEFEAT_MARKERS: [(&str, DeathCause); 3] = [
    (WUMPUS_DEATH_MARKER, DeathCause::Wumpus),
    ("YOU RAN OUT OF ARROWS", DeathCause::OutOfArrows),
    (PIT_DEATH_MARKER, DeathCause::Pit),
];

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("number pattern is valid"));

/// Fields extracted from one batch of output.
///
/// `None`/`false` means "not reported in this batch"; merging leaves the
/// corresponding world-state field alone (hazards were already reset).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialUpdate {
    pub current_room: Option<u32>,
    pub adjacent_rooms: Option<Vec<u32>>,
    pub bat_nearby: bool,
    pub draft_felt: bool,
    pub wumpus_smell: bool,
    pub terminal: Option<Terminal>,
    /// Every line of the batch, trimmed but otherwise verbatim.
    pub lines: Vec<String>,
}

/// Split raw output into trimmed lines.
pub fn split_lines(raw: &str) -> Vec<String> {
    raw.trim()
        .lines()
        .map(|line| line.trim().to_string())
        .collect()
}

/// Parse a raw output batch.
pub fn parse_output(raw: &str) -> PartialUpdate {
    parse_lines(&split_lines(raw))
}

/// Parse already-split lines.
pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> PartialUpdate {
    let mut update = PartialUpdate {
        lines: lines.iter().map(|l| l.as_ref().trim().to_string()).collect(),
        ..PartialUpdate::default()
    };
    for line in lines {
        apply_line(&mut update, line.as_ref());
    }
    update
}

fn apply_line(update: &mut PartialUpdate, line: &str) {
    let upper = line.trim().to_uppercase();

    if let Some(rest) = after_marker(&upper, LOCATION_MARKER) {
        match numbers(rest).last() {
            Some(room) => update.current_room = Some(*room),
            None => debug!(line, "location line without room number"),
        }
    }
    if let Some(rest) = after_marker(&upper, TUNNELS_MARKER) {
        let found = numbers(rest);
        if found.len() >= TUNNEL_ARITY {
            update.adjacent_rooms = Some(found[found.len() - TUNNEL_ARITY..].to_vec());
        } else {
            debug!(line, found = found.len(), "tunnel line with too few rooms");
        }
    }
    if upper.contains(BATS_MARKER) {
        update.bat_nearby = true;
    }
    if upper.contains(DRAFT_MARKER) {
        update.draft_felt = true;
    }
    if upper.contains(SMELL_MARKER) {
        update.wumpus_smell = true;
    }
    for (marker, cause) in DEFEAT_MARKERS {
        if upper.contains(marker) {
            update.terminal = Some(Terminal::Defeat(cause));
        }
    }
    if upper.contains(VICTORY_MARKER) {
        update.terminal = Some(Terminal::Victory);
    }
}

fn after_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.find(marker).map(|idx| &line[idx + marker.len()..])
}

fn numbers(text: &str) -> Vec<u32> {
    NUMBER_RE
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bat_teleport_batch_reports_landing_room_and_hazards() {
        let update = parse_lines(&[
            "5",
            "ZAP--SUPER BAT SNATCH! ELSEWHEREVILLE FOR YOU!",
            "",
            "I SMELL A WUMPUS!",
            "BATS NEARBY!",
            "YOU ARE IN ROOM 6",
            "TUNNELS LEAD TO 5 7 15",
            "",
            "SHOOT OR MOVE (S-M)",
        ]);

        assert_eq!(update.current_room, Some(6));
        assert_eq!(update.adjacent_rooms, Some(vec![5, 7, 15]));
        assert!(update.wumpus_smell);
        assert!(update.bat_nearby);
        assert!(!update.draft_felt);
        assert_eq!(update.terminal, None);
    }

    #[test]
    fn draft_batch_sets_only_draft() {
        let update = parse_lines(&[
            "YOU ARE IN ROOM 12",
            "TUNNELS LEAD TO 3 11 13",
            "I FEEL A DRAFT",
        ]);

        assert_eq!(update.current_room, Some(12));
        assert_eq!(update.adjacent_rooms, Some(vec![3, 11, 13]));
        assert!(update.draft_felt);
        assert!(!update.bat_nearby);
        assert!(!update.wumpus_smell);
        assert_eq!(update.terminal, None);
    }

    #[test]
    fn location_survives_any_other_marker() {
        let update = parse_lines(&[
            "YYYIIIIEEEE . . . FELL IN PIT",
            "YOU ARE IN ROOM 19",
            "I FEEL A DRAFT",
        ]);

        assert_eq!(update.current_room, Some(19));
        assert_eq!(update.terminal, Some(Terminal::Defeat(DeathCause::Pit)));
    }

    #[test]
    fn later_location_overwrites_earlier_one() {
        let update = parse_lines(&[
            "YOU ARE IN ROOM 4",
            "TUNNELS LEAD TO 1 2 3",
            "YOU ARE IN ROOM 9",
            "TUNNELS LEAD TO 8 10 18",
        ]);

        assert_eq!(update.current_room, Some(9));
        assert_eq!(update.adjacent_rooms, Some(vec![8, 10, 18]));
    }

    #[test]
    fn victory_marker_is_terminal_win() {
        let update =
            parse_output("AHA! YOU GOT THE WUMPUS!\nHEE HEE HEE - THE WUMPUS'LL GETCHA NEXT TIME!!");
        assert_eq!(update.terminal, Some(Terminal::Victory));
    }

    #[test]
    fn each_defeat_marker_maps_to_its_cause() {
        let cases = [
            ("TSK TSK TSK - WUMPUS GOT YOU!", DeathCause::Wumpus),
            ("YOU RAN OUT OF ARROWS", DeathCause::OutOfArrows),
            ("YYYIIIIEEEE . . . FELL IN PIT", DeathCause::Pit),
        ];
        for (line, cause) in cases {
            let update = parse_lines(&[line]);
            assert_eq!(update.terminal, Some(Terminal::Defeat(cause)), "{line}");
        }
    }

    #[test]
    fn matching_ignores_case() {
        let update = parse_output("you are in room 3\ntunnels lead to 2 4 13\nBats Nearby!");
        assert_eq!(update.current_room, Some(3));
        assert_eq!(update.adjacent_rooms, Some(vec![2, 4, 13]));
        assert!(update.bat_nearby);
    }

    #[test]
    fn malformed_marker_lines_are_ignored() {
        let update = parse_lines(&["YOU ARE IN ROOM ??", "TUNNELS LEAD TO 4 5"]);
        assert_eq!(update.current_room, None);
        assert_eq!(update.adjacent_rooms, None);
    }

    #[test]
    fn unrecognized_lines_are_kept_trimmed() {
        let update = parse_output("  HUNT THE WUMPUS  \r\n\r\nSHOOT OR MOVE (S-M)\r\n");
        assert_eq!(update.lines, vec!["HUNT THE WUMPUS", "", "SHOOT OR MOVE (S-M)"]);
        assert_eq!(
            update,
            PartialUpdate {
                lines: update.lines.clone(),
                ..PartialUpdate::default()
            }
        );
    }
}
