use std::fs;
use std::path::PathBuf;

use courtside::nba_fetch::{
    parse_calculator_json, parse_full_match_json, parse_games_json, parse_match_prediction_json,
    parse_player_history_json, parse_roster_json, parse_shooting_json,
};
use courtside::state::{Side, StatCategory};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_games_fixture_and_skips_broken_rows() {
    let games = parse_games_json(&read_fixture("games.json")).expect("fixture should parse");
    assert_eq!(games.len(), 2);
    assert_eq!(games[0].game_id, "0022500601");
    assert_eq!(games[0].home_team_id.as_deref(), Some("BOS"));
    assert_eq!(games[1].home_team_id, None);
    assert!(!games[1].is_live);
}

#[test]
fn parses_roster_with_either_field_spelling() {
    let roster = parse_roster_json(&read_fixture("roster.json")).expect("fixture should parse");
    assert_eq!(roster.len(), 2);
    assert_eq!(roster[0].full_name, "Jayson Tatum");
    assert_eq!(roster[1].id, 1627759);
    assert_eq!(roster[1].position.as_deref(), Some("G-F"));
}

#[test]
fn parses_match_prediction_aliases() {
    let pred = parse_match_prediction_json(&read_fixture("match_prediction.json"))
        .expect("fixture should parse");
    assert_eq!(pred.home_win_probability, Some(0.64));
    assert_eq!(pred.confidence_level.as_deref(), Some("Solide"));
    assert_eq!(pred.away_fatigue_factors, vec!["Back-to-back".to_string()]);
}

#[test]
fn parses_full_match_and_finds_players() {
    let full = parse_full_match_json(&read_fixture("full_match.json")).expect("fixture should parse");
    let (side, tatum) = full.find_player(1628369).expect("home player");
    assert_eq!(side, Side::Home);
    assert_eq!(tatum.advanced_metrics_projected.PRA, Some(40.6));
    let (side, lebron) = full.find_player(2544).expect("away player");
    assert_eq!(side, Side::Away);
    assert_eq!(lebron.predicted_stats.AST, None);
    assert!(full.find_player(1).is_none());
}

#[test]
fn parses_player_history() {
    let history = parse_player_history_json(&read_fixture("player_history.json"))
        .expect("fixture should parse");
    let recent = history.recent_form_avg.expect("recent form");
    assert_eq!(recent.get(StatCategory::PRA), Some(42.2));
    assert_eq!(history.h2h_avg.map(|l| l.games_played()), Some(0.0));
    let away = history.splits.and_then(|s| s.away).expect("away split");
    assert_eq!(away.get(StatCategory::REB), None);
    let fatigue = history.fatigue.expect("fatigue");
    assert_eq!(fatigue.last_min, 41.0);
}

#[test]
fn parses_calculator_and_shooting() {
    let calc = parse_calculator_json(&read_fixture("calculator.json")).expect("fixture should parse");
    assert_eq!(calc.color_code.as_deref(), Some("green"));

    let shooting = parse_shooting_json(&read_fixture("shooting.json")).expect("fixture should parse");
    assert_eq!(shooting.home.fg3m_range, "12-18");
    assert_eq!(shooting.analysis.two_pt_winner.as_deref(), Some("LAL"));
    assert!(shooting.analysis.extra.contains_key("2pt_margin"));
}

#[test]
fn null_bodies_are_empty_where_allowed() {
    assert!(parse_games_json("null").expect("null games").is_empty());
    assert!(parse_roster_json("  ").expect("blank roster").is_empty());
    assert!(parse_full_match_json("null").expect("null full match").home_players.is_empty());
    assert!(parse_player_history_json("").expect("empty history").fatigue.is_none());
    assert!(parse_calculator_json("null").is_err());
    assert!(parse_shooting_json("").is_err());
}

#[test]
fn malformed_json_is_an_error() {
    assert!(parse_games_json("{\"games\": [").is_err());
    assert!(parse_games_json("{\"unexpected\": true}").is_err());
    assert!(parse_player_history_json("[1, 2]").is_err());
}
