//! Best-effort correction of a train's reported line and direction from
//! the sequence of stations it was observed at within one poll.
//!
//! The feed frequently misreports line and direction; the station sequence
//! rarely lies. The classifier scores the sequence against station sets
//! that are unique to one axis or one line and against signed positions
//! along each trunk. Ambiguous inputs keep the reported values — precision
//! over recall.

use crate::taxonomy::{Direction, Line, Station};

/// A (line, direction) pair where either side may be unknown. Reported
/// values that fail to parse enter as `None` and leave unchanged when the
/// sequence offers no evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub line: Option<Line>,
    pub direction: Option<Direction>,
}

impl Classification {
    pub fn new(line: Option<Line>, direction: Option<Direction>) -> Self {
        Classification { line, direction }
    }
}

/// Infer the most plausible (line, direction) for a station sequence.
///
/// Ambiguity at any decision point falls back to the reported value for
/// that axis rather than guessing.
pub fn classify_sequence(seq: &[Station], reported: Classification) -> Classification {
    let mut gold_score = 0;
    let mut red_score = 0;
    let mut ew_score = 0;
    let mut ns_score = 0;

    for (i, station) in seq.iter().copied().enumerate() {
        if station == Station::Bankhead {
            // Bankhead is unique to the Green line. As the western
            // terminus it can only be the first stop of an outbound run
            // or the destination of an eastbound one.
            if i == 0 {
                return Classification::new(Some(Line::Green), Some(Direction::West));
            }
            return Classification::new(Some(Line::Green), Some(Direction::East));
        }

        if is_gold_only(station) {
            gold_score += 1;
        }
        if is_red_only(station) {
            red_score += 1;
        }
        if is_east_west_only(station) {
            ew_score += 1;
        }
        if is_north_south_only(station) {
            ns_score += 1;
        }
    }

    // Both axes scored, or neither did — nothing to go on.
    if (ew_score == 0) == (ns_score == 0) {
        return reported;
    }

    if ew_score > 0 {
        // A Bankhead sighting would have exited above, so east-west
        // evidence means Blue.
        let east_score = directionality_score(seq, east_core_position);
        let direction = match east_score {
            s if s > 0 => Some(Direction::East),
            s if s < 0 => Some(Direction::West),
            _ => reported.direction,
        };
        return Classification::new(Some(Line::Blue), direction);
    }

    let north_score = directionality_score(seq, north_core_position);
    let direction = match north_score {
        s if s > 0 => Some(Direction::North),
        s if s < 0 => Some(Direction::South),
        _ => reported.direction,
    };

    if (gold_score == 0) == (red_score == 0) {
        return Classification::new(reported.line, direction);
    }

    if gold_score > 0 {
        return Classification::new(Some(Line::Gold), direction);
    }

    Classification::new(Some(Line::Red), direction)
}

/// Signed travel distance between the first and last stations of the
/// sequence along one trunk. Stations off the trunk contribute zero.
fn directionality_score(seq: &[Station], position: fn(Station) -> i32) -> i32 {
    match (seq.first(), seq.last()) {
        (Some(&first), Some(&last)) => position(last) - position(first),
        _ => 0,
    }
}

fn is_gold_only(s: Station) -> bool {
    matches!(
        s,
        Station::Lenox | Station::Brookhaven | Station::Chamblee | Station::Doraville
    )
}

fn is_red_only(s: Station) -> bool {
    matches!(
        s,
        Station::Buckhead
            | Station::MedicalCenter
            | Station::Dunwoody
            | Station::SandySprings
            | Station::NorthSprings
    )
}

fn is_east_west_only(s: Station) -> bool {
    matches!(
        s,
        Station::Bankhead
            | Station::HamiltonEHolmes
            | Station::WestLake
            | Station::Ashby
            | Station::VineCity
            | Station::OmniDome
            | Station::GeorgiaState
            | Station::KingMemorial
            | Station::InmanPark
            | Station::EdgewoodCandlerPark
            | Station::EastLake
            | Station::Decatur
            | Station::Avondale
            | Station::Kensington
            | Station::IndianCreek
    )
}

fn is_north_south_only(s: Station) -> bool {
    matches!(
        s,
        Station::Airport
            | Station::CollegePark
            | Station::EastPoint
            | Station::Lakewood
            | Station::OaklandCity
            | Station::WestEnd
            | Station::Garnett
            | Station::PeachtreeCenter
            | Station::CivicCenter
            | Station::NorthAvenue
            | Station::Midtown
            | Station::ArtsCenter
            | Station::LindberghCenter
            | Station::Lenox
            | Station::Brookhaven
            | Station::Chamblee
            | Station::Doraville
            | Station::Buckhead
            | Station::MedicalCenter
            | Station::Dunwoody
            | Station::SandySprings
            | Station::NorthSprings
    )
}

/// Position along the east-west trunk, increasing eastward. Zero for
/// stations off the trunk.
fn east_core_position(s: Station) -> i32 {
    match s {
        Station::Ashby => -6,
        Station::VineCity => -5,
        Station::OmniDome => -4,
        Station::FivePoints => -3,
        Station::GeorgiaState => -2,
        Station::KingMemorial => -1,
        Station::InmanPark => 0,
        Station::EdgewoodCandlerPark => 1,
        Station::EastLake => 2,
        Station::Decatur => 3,
        Station::Avondale => 4,
        Station::Kensington => 5,
        Station::IndianCreek => 6,
        _ => 0,
    }
}

/// Position along the north-south trunk, increasing northward. Zero for
/// stations off the trunk.
fn north_core_position(s: Station) -> i32 {
    match s {
        Station::Airport => -7,
        Station::CollegePark => -6,
        Station::EastPoint => -5,
        Station::Lakewood => -4,
        Station::OaklandCity => -3,
        Station::WestEnd => -2,
        Station::Garnett => -1,
        Station::FivePoints => 1,
        Station::PeachtreeCenter => 2,
        Station::CivicCenter => 3,
        Station::NorthAvenue => 4,
        Station::Midtown => 5,
        Station::ArtsCenter => 6,
        Station::LindberghCenter => 7,
        _ => 0,
    }
}
