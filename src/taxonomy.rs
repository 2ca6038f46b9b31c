//! Enumerations for MARTA rail directions, lines and stations, plus the
//! ordered station lists and termini used by the classifier and the
//! run-completion check.
//!
//! The feed reports all of these as free-form strings; parsing normalizes
//! (uppercase, trailing " STATION" stripped) and anything unrecognized
//! stays a raw string downstream. Identifiers persisted to the database are
//! always built from the raw feed strings, never from these enums.

/// A travel direction code as reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::South => "S",
            Direction::East => "E",
            Direction::West => "W",
        }
    }

    /// Parse a feed direction code. Unknown codes yield `None`.
    pub fn parse(s: &str) -> Option<Direction> {
        match s.trim().to_uppercase().as_str() {
            "N" => Some(Direction::North),
            "S" => Some(Direction::South),
            "E" => Some(Direction::East),
            "W" => Some(Direction::West),
            _ => None,
        }
    }
}

/// A rail line as reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    Green,
    Blue,
    Gold,
    Red,
}

impl Line {
    pub fn as_str(self) -> &'static str {
        match self {
            Line::Green => "GREEN",
            Line::Blue => "BLUE",
            Line::Gold => "GOLD",
            Line::Red => "RED",
        }
    }

    /// Parse a feed line name. Unknown names yield `None`.
    pub fn parse(s: &str) -> Option<Line> {
        match s.trim().to_uppercase().as_str() {
            "GREEN" => Some(Line::Green),
            "BLUE" => Some(Line::Blue),
            "GOLD" => Some(Line::Gold),
            "RED" => Some(Line::Red),
            _ => None,
        }
    }
}

/// A rail station. Canonical names match the feed's uppercase spelling
/// with the `" STATION"` suffix removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Station {
    Airport,
    ArtsCenter,
    Ashby,
    Avondale,
    Bankhead,
    Brookhaven,
    Buckhead,
    Chamblee,
    CivicCenter,
    CollegePark,
    Decatur,
    Doraville,
    Dunwoody,
    EastLake,
    EastPoint,
    EdgewoodCandlerPark,
    FivePoints,
    Garnett,
    GeorgiaState,
    HamiltonEHolmes,
    IndianCreek,
    InmanPark,
    Kensington,
    KingMemorial,
    Lakewood,
    Lenox,
    LindberghCenter,
    MedicalCenter,
    Midtown,
    NorthAvenue,
    NorthSprings,
    OaklandCity,
    OmniDome,
    PeachtreeCenter,
    SandySprings,
    VineCity,
    WestEnd,
    WestLake,
}

impl Station {
    pub fn as_str(self) -> &'static str {
        match self {
            Station::Airport => "AIRPORT",
            Station::ArtsCenter => "ARTS CENTER",
            Station::Ashby => "ASHBY",
            Station::Avondale => "AVONDALE",
            Station::Bankhead => "BANKHEAD",
            Station::Brookhaven => "BROOKHAVEN",
            Station::Buckhead => "BUCKHEAD",
            Station::Chamblee => "CHAMBLEE",
            Station::CivicCenter => "CIVIC CENTER",
            Station::CollegePark => "COLLEGE PARK",
            Station::Decatur => "DECATUR",
            Station::Doraville => "DORAVILLE",
            Station::Dunwoody => "DUNWOODY",
            Station::EastLake => "EAST LAKE",
            Station::EastPoint => "EAST POINT",
            Station::EdgewoodCandlerPark => "EDGEWOOD-CANDLER PARK",
            Station::FivePoints => "FIVE POINTS",
            Station::Garnett => "GARNETT",
            Station::GeorgiaState => "GEORGIA STATE",
            Station::HamiltonEHolmes => "HAMILTON E HOLMES",
            Station::IndianCreek => "INDIAN CREEK",
            Station::InmanPark => "INMAN PARK",
            Station::Kensington => "KENSINGTON",
            Station::KingMemorial => "KING MEMORIAL",
            Station::Lakewood => "LAKEWOOD",
            Station::Lenox => "LENOX",
            Station::LindberghCenter => "LINDBERGH CENTER",
            Station::MedicalCenter => "MEDICAL CENTER",
            Station::Midtown => "MIDTOWN",
            Station::NorthAvenue => "NORTH AVENUE",
            Station::NorthSprings => "NORTH SPRINGS",
            Station::OaklandCity => "OAKLAND CITY",
            Station::OmniDome => "OMNI DOME",
            Station::PeachtreeCenter => "PEACHTREE CENTER",
            Station::SandySprings => "SANDY SPRINGS",
            Station::VineCity => "VINE CITY",
            Station::WestEnd => "WEST END",
            Station::WestLake => "WEST LAKE",
        }
    }

    /// Parse a feed station name: uppercase, strip a trailing " STATION",
    /// trim. A few spellings the feed is known to vary on are accepted as
    /// alternates. Unknown names yield `None` — the classifier simply has
    /// nothing to score for them.
    pub fn parse(s: &str) -> Option<Station> {
        let upper = s.trim().to_uppercase();
        let name = upper.strip_suffix(" STATION").unwrap_or(&upper).trim();
        match name {
            "AIRPORT" => Some(Station::Airport),
            "ARTS CENTER" => Some(Station::ArtsCenter),
            "ASHBY" => Some(Station::Ashby),
            "AVONDALE" => Some(Station::Avondale),
            "BANKHEAD" => Some(Station::Bankhead),
            "BROOKHAVEN" => Some(Station::Brookhaven),
            "BUCKHEAD" => Some(Station::Buckhead),
            "CHAMBLEE" => Some(Station::Chamblee),
            "CIVIC CENTER" => Some(Station::CivicCenter),
            "COLLEGE PARK" => Some(Station::CollegePark),
            "DECATUR" => Some(Station::Decatur),
            "DORAVILLE" => Some(Station::Doraville),
            "DUNWOODY" => Some(Station::Dunwoody),
            "EAST LAKE" => Some(Station::EastLake),
            "EAST POINT" => Some(Station::EastPoint),
            "EDGEWOOD-CANDLER PARK" | "EDGEWOOD CANDLER PARK" => {
                Some(Station::EdgewoodCandlerPark)
            }
            "FIVE POINTS" => Some(Station::FivePoints),
            "GARNETT" => Some(Station::Garnett),
            "GEORGIA STATE" => Some(Station::GeorgiaState),
            "HAMILTON E HOLMES" | "H. E. HOLMES" => Some(Station::HamiltonEHolmes),
            "INDIAN CREEK" => Some(Station::IndianCreek),
            "INMAN PARK" => Some(Station::InmanPark),
            "KENSINGTON" => Some(Station::Kensington),
            "KING MEMORIAL" => Some(Station::KingMemorial),
            "LAKEWOOD" => Some(Station::Lakewood),
            "LENOX" => Some(Station::Lenox),
            "LINDBERGH CENTER" | "LINDBERGH" => Some(Station::LindberghCenter),
            "MEDICAL CENTER" => Some(Station::MedicalCenter),
            "MIDTOWN" => Some(Station::Midtown),
            "NORTH AVENUE" | "NORTH AVE" => Some(Station::NorthAvenue),
            "NORTH SPRINGS" => Some(Station::NorthSprings),
            "OAKLAND CITY" => Some(Station::OaklandCity),
            "OMNI DOME" => Some(Station::OmniDome),
            "PEACHTREE CENTER" => Some(Station::PeachtreeCenter),
            "SANDY SPRINGS" => Some(Station::SandySprings),
            "VINE CITY" => Some(Station::VineCity),
            "WEST END" => Some(Station::WestEnd),
            "WEST LAKE" => Some(Station::WestLake),
            _ => None,
        }
    }
}

/// The stations on a line, ordered along the nominal direction of travel
/// (the direction whose terminus is the last element).
pub fn line_stations(line: Line) -> &'static [Station] {
    match line {
        Line::Green => &[
            Station::Bankhead,
            Station::Ashby,
            Station::VineCity,
            Station::OmniDome,
            Station::FivePoints,
            Station::GeorgiaState,
            Station::KingMemorial,
            Station::InmanPark,
            Station::EdgewoodCandlerPark,
        ],
        Line::Blue => &[
            Station::HamiltonEHolmes,
            Station::WestLake,
            Station::Ashby,
            Station::VineCity,
            Station::OmniDome,
            Station::FivePoints,
            Station::GeorgiaState,
            Station::KingMemorial,
            Station::InmanPark,
            Station::EdgewoodCandlerPark,
            Station::EastLake,
            Station::Decatur,
            Station::Avondale,
            Station::Kensington,
            Station::IndianCreek,
        ],
        Line::Gold => &[
            Station::Airport,
            Station::CollegePark,
            Station::EastPoint,
            Station::Lakewood,
            Station::OaklandCity,
            Station::WestEnd,
            Station::Garnett,
            Station::FivePoints,
            Station::PeachtreeCenter,
            Station::CivicCenter,
            Station::NorthAvenue,
            Station::Midtown,
            Station::ArtsCenter,
            Station::LindberghCenter,
            Station::Lenox,
            Station::Brookhaven,
            Station::Chamblee,
            Station::Doraville,
        ],
        Line::Red => &[
            Station::Airport,
            Station::CollegePark,
            Station::EastPoint,
            Station::Lakewood,
            Station::OaklandCity,
            Station::WestEnd,
            Station::Garnett,
            Station::FivePoints,
            Station::PeachtreeCenter,
            Station::CivicCenter,
            Station::NorthAvenue,
            Station::Midtown,
            Station::ArtsCenter,
            Station::LindberghCenter,
            Station::Buckhead,
            Station::MedicalCenter,
            Station::Dunwoody,
            Station::SandySprings,
            Station::NorthSprings,
        ],
    }
}

/// The terminus of a line in a given direction, or `None` for a direction
/// the line does not run in.
pub fn terminus(line: Line, dir: Direction) -> Option<Station> {
    match (line, dir) {
        (Line::Green, Direction::East) => Some(Station::EdgewoodCandlerPark),
        (Line::Green, Direction::West) => Some(Station::Bankhead),
        (Line::Blue, Direction::East) => Some(Station::IndianCreek),
        (Line::Blue, Direction::West) => Some(Station::HamiltonEHolmes),
        (Line::Gold, Direction::North) => Some(Station::Doraville),
        (Line::Gold, Direction::South) => Some(Station::Airport),
        (Line::Red, Direction::North) => Some(Station::NorthSprings),
        (Line::Red, Direction::South) => Some(Station::Airport),
        _ => None,
    }
}
