use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::state::{Game, Side};

// (code, full name, nickname)
const TEAMS: [(&str, &str, &str); 30] = [
    ("ATL", "Atlanta Hawks", "Hawks"),
    ("BOS", "Boston Celtics", "Celtics"),
    ("BKN", "Brooklyn Nets", "Nets"),
    ("CHA", "Charlotte Hornets", "Hornets"),
    ("CHI", "Chicago Bulls", "Bulls"),
    ("CLE", "Cleveland Cavaliers", "Cavaliers"),
    ("DAL", "Dallas Mavericks", "Mavericks"),
    ("DEN", "Denver Nuggets", "Nuggets"),
    ("DET", "Detroit Pistons", "Pistons"),
    ("GSW", "Golden State Warriors", "Warriors"),
    ("HOU", "Houston Rockets", "Rockets"),
    ("IND", "Indiana Pacers", "Pacers"),
    ("LAC", "Los Angeles Clippers", "Clippers"),
    ("LAL", "Los Angeles Lakers", "Lakers"),
    ("MEM", "Memphis Grizzlies", "Grizzlies"),
    ("MIA", "Miami Heat", "Heat"),
    ("MIL", "Milwaukee Bucks", "Bucks"),
    ("MIN", "Minnesota Timberwolves", "Timberwolves"),
    ("NOP", "New Orleans Pelicans", "Pelicans"),
    ("NYK", "New York Knicks", "Knicks"),
    ("OKC", "Oklahoma City Thunder", "Thunder"),
    ("ORL", "Orlando Magic", "Magic"),
    ("PHI", "Philadelphia 76ers", "76ers"),
    ("PHX", "Phoenix Suns", "Suns"),
    ("POR", "Portland Trail Blazers", "Trail Blazers"),
    ("SAC", "Sacramento Kings", "Kings"),
    ("SAS", "San Antonio Spurs", "Spurs"),
    ("TOR", "Toronto Raptors", "Raptors"),
    ("UTA", "Utah Jazz", "Jazz"),
    ("WAS", "Washington Wizards", "Wizards"),
];

static LOOKUP: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::with_capacity(TEAMS.len() * 3 + 4);
    for (code, full, nick) in TEAMS {
        map.insert(code.to_ascii_lowercase(), code);
        map.insert(full.to_ascii_lowercase(), code);
        map.insert(nick.to_ascii_lowercase(), code);
    }
    // Common alternate spellings in schedule feeds.
    map.insert("la clippers".to_string(), "LAC");
    map.insert("la lakers".to_string(), "LAL");
    map.insert("sixers".to_string(), "PHI");
    map.insert("blazers".to_string(), "POR");
    map
});

pub fn team_code(name: &str) -> Option<&'static str> {
    let key = name.trim().to_ascii_lowercase();
    if key.is_empty() {
        return None;
    }
    LOOKUP.get(&key).copied()
}

pub fn team_name(code: &str) -> Option<&'static str> {
    let code = code.trim();
    TEAMS
        .iter()
        .find(|(c, _, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, full, _)| *full)
}

/// The feed's team id when present, else the code for the team name, else empty.
pub fn resolve_team_id(game: &Game, side: Side) -> String {
    let (id, name) = match side {
        Side::Home => (game.home_team_id.as_deref(), game.home_team.as_str()),
        Side::Away => (game.away_team_id.as_deref(), game.away_team.as_str()),
    };
    id.map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| team_code(name).map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_resolve_from_any_spelling() {
        assert_eq!(team_code("Boston Celtics"), Some("BOS"));
        assert_eq!(team_code("celtics"), Some("BOS"));
        assert_eq!(team_code(" bos "), Some("BOS"));
        assert_eq!(team_code("LA Clippers"), Some("LAC"));
        assert_eq!(team_code("Springfield Atoms"), None);
        assert_eq!(team_code(""), None);
    }

    #[test]
    fn names_resolve_from_codes() {
        assert_eq!(team_name("gsw"), Some("Golden State Warriors"));
        assert_eq!(team_name("XYZ"), None);
    }
}
