use courtside::request_key::{ParamValue, Params, QueryKind, RequestDescriptor, build_key};
use courtside::source::{CalculatorRequest, MatchupRequest};
use courtside::state::{SelectionState, Side, StatCategory};

fn matchup(selection: &SelectionState) -> MatchupRequest {
    MatchupRequest::new("BOS", "LAL", selection)
}

#[test]
fn exclusion_order_does_not_change_the_key() {
    let mut first = SelectionState::new();
    first.excluded_mut(Side::Home).insert(17, "B");
    first.excluded_mut(Side::Home).insert(3, "A");

    let mut second = SelectionState::new();
    second.excluded_mut(Side::Home).insert(3, "A");
    second.excluded_mut(Side::Home).insert(17, "B");

    let a = RequestDescriptor::match_prediction(&matchup(&first)).key();
    let b = RequestDescriptor::match_prediction(&matchup(&second)).key();
    assert_eq!(a, b);
    assert_eq!(
        a.as_str(),
        "MATCH_PREDICTION|away=LAL|excluded_away=|excluded_home=3,17|home=BOS"
    );
}

#[test]
fn excluding_a_player_changes_every_matchup_key() {
    let base = SelectionState::new();
    let mut out = SelectionState::new();
    out.excluded_mut(Side::Away).insert(2544, "LeBron James");

    for build in [
        RequestDescriptor::match_prediction,
        RequestDescriptor::full_match_prediction,
        RequestDescriptor::shooting_splits,
    ] {
        assert_ne!(build(&matchup(&base)).key(), build(&matchup(&out)).key());
    }
}

#[test]
fn home_and_away_exclusions_are_distinct() {
    let mut home = SelectionState::new();
    home.excluded_mut(Side::Home).insert(7, "X");
    let mut away = SelectionState::new();
    away.excluded_mut(Side::Away).insert(7, "X");
    assert_ne!(
        RequestDescriptor::match_prediction(&matchup(&home)).key(),
        RequestDescriptor::match_prediction(&matchup(&away)).key()
    );
}

#[test]
fn parameter_insertion_order_is_irrelevant() {
    let mut a = Params::new();
    a.insert("player_id", ParamValue::Int(203999));
    a.insert("opponent", ParamValue::Text("LAL".to_string()));
    let mut b = Params::new();
    b.insert("opponent", ParamValue::Text("LAL".to_string()));
    b.insert("player_id", ParamValue::Int(203999));
    assert_eq!(
        build_key(QueryKind::PlayerHistory, &a),
        build_key(QueryKind::PlayerHistory, &b)
    );
    assert_eq!(
        RequestDescriptor::player_history(203999, "LAL").key(),
        build_key(QueryKind::PlayerHistory, &a)
    );
}

#[test]
fn empty_id_set_differs_from_missing_parameter() {
    let mut with_empty = Params::new();
    with_empty.insert("excluded_home", ParamValue::IdSet(Vec::new()));
    let missing = Params::new();
    assert_ne!(
        build_key(QueryKind::MatchPrediction, &with_empty),
        build_key(QueryKind::MatchPrediction, &missing)
    );
}

#[test]
fn duplicate_ids_collapse() {
    let mut dup = Params::new();
    dup.insert("ids", ParamValue::IdSet(vec![5, 5, 1]));
    let mut clean = Params::new();
    clean.insert("ids", ParamValue::IdSet(vec![1, 5]));
    assert_eq!(
        build_key(QueryKind::MatchPrediction, &dup),
        build_key(QueryKind::MatchPrediction, &clean)
    );
}

#[test]
fn calculator_key_tracks_line_and_stat() {
    let req = CalculatorRequest {
        player_id: 1628369,
        projection: 27.4,
        line: 25.5,
        stat: StatCategory::PTS,
    };
    let base = RequestDescriptor::calculator_analysis(&req);
    assert!(!base.enabled);

    let other_line = RequestDescriptor::calculator_analysis(&CalculatorRequest {
        line: 26.5,
        ..req.clone()
    });
    let other_stat = RequestDescriptor::calculator_analysis(&CalculatorRequest {
        stat: StatCategory::PRA,
        ..req.clone()
    });
    // Float noise below the key precision is the same request.
    let same_line = RequestDescriptor::calculator_analysis(&CalculatorRequest {
        line: 25.500000001,
        ..req.clone()
    });
    assert_ne!(base.key(), other_line.key());
    assert_ne!(base.key(), other_stat.key());
    assert_eq!(base.key(), same_line.key());
}

#[test]
fn history_key_ignores_line_and_stat() {
    // Nothing the user types into the line box reaches this key.
    let key = RequestDescriptor::player_history(1628369, "LAL").key();
    assert!(!key.as_str().contains("line"));
    assert!(!key.as_str().contains("stat"));
    assert_eq!(key.kind_prefix(), "PLAYER_HISTORY");
}

#[test]
fn incomplete_matchups_are_disabled() {
    let selection = SelectionState::new();
    let req = MatchupRequest::new("BOS", "", &selection);
    assert!(!RequestDescriptor::match_prediction(&req).enabled);
    assert!(!RequestDescriptor::team_roster("  ").enabled);
    assert!(RequestDescriptor::team_roster("BOS").enabled);
}

#[test]
fn separators_inside_values_cannot_forge_parameters() {
    let mut forged = Params::new();
    forged.insert("away", ParamValue::Text("LAL|home=BOS".to_string()));
    let mut honest = Params::new();
    honest.insert("away", ParamValue::Text("LAL".to_string()));
    honest.insert("home", ParamValue::Text("BOS".to_string()));
    assert_ne!(
        build_key(QueryKind::MatchPrediction, &forged),
        build_key(QueryKind::MatchPrediction, &honest)
    );

    // A literal backslash cannot stand in for an escape.
    let mut slash = Params::new();
    slash.insert("team_id", ParamValue::Text("A\\|B".to_string()));
    let mut pipe = Params::new();
    pipe.insert("team_id", ParamValue::Text("A|B".to_string()));
    assert_ne!(
        build_key(QueryKind::TeamRoster, &slash),
        build_key(QueryKind::TeamRoster, &pipe)
    );
}
