use std::collections::BTreeMap;

use crate::state::{
    CalculatorAnalysis, ComparisonTab, Fatigue, Game, PlayerFullPrediction, PlayerHistory,
    RosterPlayer, SelectionState, ShootingPrediction, Side, StatCategory, StatLine, parse_line,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Over,
    Under,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatigueTone {
    Fresh,
    Tired,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceTier {
    Tight,
    Solid,
    Blowout,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FatigueBadge {
    pub status: String,
    pub last_minutes: f64,
    pub tone: FatigueTone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorPanel {
    pub probability_over: f64,
    pub probability_under: f64,
    pub advice: Option<String>,
    pub confidence: Option<String>,
    pub recommendation: Recommendation,
}

/// Everything the player panel shows for the current selection.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub player_id: u32,
    pub name: String,
    pub team: String,
    pub position: Option<String>,
    pub stat: StatCategory,
    pub tab: ComparisonTab,
    /// Absent while the current matchup's projection is still loading.
    pub projection_value: Option<f64>,
    pub projected_minutes: Option<f64>,
    pub recent_form: Option<StatLine>,
    pub head_to_head: Option<StatLine>,
    pub recent_form_average: Option<f64>,
    pub head_to_head_average: Option<f64>,
    pub home_split: Option<f64>,
    pub away_split: Option<f64>,
    pub player_is_home: bool,
    pub edge: Option<f64>,
    pub recommendation: Option<Recommendation>,
    pub calculator: Option<CalculatorPanel>,
    pub fatigue: Option<FatigueBadge>,
    pub matchup_context: Option<String>,
}

pub fn projection_value(player: &PlayerFullPrediction, stat: StatCategory) -> f64 {
    let value = match stat {
        StatCategory::PRA => player.advanced_metrics_projected.PRA,
        StatCategory::PTS => player.predicted_stats.PTS,
        StatCategory::REB => player.predicted_stats.REB,
        StatCategory::AST => player.predicted_stats.AST,
    };
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Projection minus line, only for a line that parses as a finite number above zero.
pub fn edge(projection: f64, line_text: &str) -> Option<f64> {
    let line = parse_line(line_text).ok()?;
    let edge = projection - line;
    edge.is_finite().then_some(edge)
}

pub fn format_edge(edge: f64) -> String {
    // Round first so 0.04 doesn't print as "+0.0" with a misleading sign.
    let rounded = (edge * 10.0).round() / 10.0;
    if rounded > 0.0 {
        format!("+{rounded:.1}")
    } else if rounded < 0.0 {
        format!("{rounded:.1}")
    } else {
        "0.0".to_string()
    }
}

/// The color code decides when present; the advice text is only a fallback.
pub fn recommendation(color_code: Option<&str>, advice: Option<&str>) -> Recommendation {
    if let Some(code) = color_code.map(str::trim).filter(|c| !c.is_empty()) {
        return match code.to_ascii_lowercase().as_str() {
            "green" => Recommendation::Over,
            "red" => Recommendation::Under,
            _ => Recommendation::Neutral,
        };
    }
    let Some(advice) = advice else {
        return Recommendation::Neutral;
    };
    let upper = advice.to_ascii_uppercase();
    if upper.contains("OVER") {
        Recommendation::Over
    } else if upper.contains("UNDER") {
        Recommendation::Under
    } else {
        Recommendation::Neutral
    }
}

pub fn calculator_recommendation(result: &CalculatorAnalysis) -> Recommendation {
    recommendation(result.color_code.as_deref(), result.advice.as_deref())
}

pub fn split_value(history: Option<&PlayerHistory>, side: Side, stat: StatCategory) -> Option<f64> {
    let splits = history?.splits.as_ref()?;
    let line = match side {
        Side::Home => splits.home.as_ref(),
        Side::Away => splits.away.as_ref(),
    }?;
    line.get(stat)
}

/// Best-effort: the roster feed and the schedule feed must spell the team the same way.
pub fn is_player_home(player_team: &str, home_team_name: Option<&str>) -> bool {
    match home_team_name {
        Some(home) if !home.is_empty() => player_team == home,
        _ => false,
    }
}

pub fn fatigue_tone(color_code: Option<&str>) -> FatigueTone {
    match color_code.map(|c| c.trim().to_ascii_lowercase()).as_deref() {
        Some("green") => FatigueTone::Fresh,
        Some("red") => FatigueTone::Tired,
        _ => FatigueTone::Neutral,
    }
}

fn fatigue_badge(fatigue: &Fatigue) -> FatigueBadge {
    FatigueBadge {
        status: fatigue.status.clone(),
        last_minutes: fatigue.last_min,
        tone: fatigue_tone(fatigue.color_code.as_deref()),
    }
}

pub fn derive_player_view(
    selection: &SelectionState,
    player: &PlayerFullPrediction,
    home_team_name: Option<&str>,
    history: Option<&PlayerHistory>,
    calculator: Option<&CalculatorAnalysis>,
) -> PlayerView {
    let stat = selection.stat;
    let projection = projection_value(player, stat);

    let recent_form = history.and_then(|h| h.recent_form_avg.clone());
    // An H2H line with no games is the service's way of saying "never met".
    let head_to_head = history
        .and_then(|h| h.h2h_avg.clone())
        .filter(|line| line.games_played() > 0.0);

    let calculator = calculator.map(|result| CalculatorPanel {
        probability_over: result.probability_over,
        probability_under: result.probability_under,
        advice: result.advice.clone(),
        confidence: result.confidence.clone(),
        recommendation: calculator_recommendation(result),
    });

    PlayerView {
        player_id: player.player_id,
        name: player.player.clone(),
        team: player.team.clone(),
        position: player.position.clone(),
        stat,
        tab: selection.tab,
        projection_value: Some(projection),
        projected_minutes: player.predicted_stats.MIN,
        recent_form_average: recent_form.as_ref().and_then(|l| l.get(stat)),
        head_to_head_average: head_to_head.as_ref().and_then(|l| l.get(stat)),
        recent_form,
        head_to_head,
        home_split: split_value(history, Side::Home, stat),
        away_split: split_value(history, Side::Away, stat),
        player_is_home: is_player_home(&player.team, home_team_name),
        edge: edge(projection, &selection.line_text),
        recommendation: calculator.as_ref().map(|c| c.recommendation),
        calculator,
        fatigue: history.and_then(|h| h.fatigue.as_ref()).map(fatigue_badge),
        matchup_context: history.and_then(|h| h.matchup_context.clone()),
    }
}

impl PlayerView {
    /// Drop everything computed from the projection.
    pub fn without_projection(mut self) -> Self {
        self.projection_value = None;
        self.edge = None;
        self.recommendation = None;
        self.calculator = None;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShootingBar {
    pub home_value: f64,
    pub away_value: f64,
    pub home_range: String,
    pub away_range: String,
    // Percent of the larger of the two values.
    pub home_pct: f64,
    pub away_pct: f64,
    pub home_wins: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShootingComparison {
    pub home_team: String,
    pub away_team: String,
    pub pace_context: String,
    pub two_point: ShootingBar,
    pub three_point: ShootingBar,
    pub home_total: f64,
    pub away_total: f64,
    pub fatigue_impact: Option<String>,
}

pub fn shooting_comparison(data: &ShootingPrediction) -> ShootingComparison {
    let home = &data.home;
    let away = &data.away;
    let two_point = shooting_bar(
        (home.fg2m, &home.fg2m_range),
        (away.fg2m, &away.fg2m_range),
        data.analysis.two_pt_winner.as_deref() == Some(home.team.as_str()),
    );
    let three_point = shooting_bar(
        (home.fg3m, &home.fg3m_range),
        (away.fg3m, &away.fg3m_range),
        data.analysis.three_pt_winner.as_deref() == Some(home.team.as_str()),
    );
    ShootingComparison {
        home_team: home.team.clone(),
        away_team: away.team.clone(),
        pace_context: data.pace_context.clone(),
        two_point,
        three_point,
        home_total: home.total_fg,
        away_total: away.total_fg,
        fatigue_impact: data.analysis.fatigue_impact.clone(),
    }
}

fn shooting_bar(home: (f64, &str), away: (f64, &str), home_wins: bool) -> ShootingBar {
    let max = home.0.max(away.0);
    let pct = |v: f64| {
        if max > 0.0 && v.is_finite() {
            (v / max * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    };
    ShootingBar {
        home_value: home.0,
        away_value: away.0,
        home_range: home.1.to_string(),
        away_range: away.1.to_string(),
        home_pct: pct(home.0),
        away_pct: pct(away.0),
        home_wins,
    }
}

pub fn confidence_tier(level: Option<&str>) -> ConfidenceTier {
    let Some(level) = level else {
        return ConfidenceTier::Unknown;
    };
    let lower = level.to_lowercase();
    if ["indécis", "tight", "serré"].iter().any(|kw| lower.contains(kw)) {
        ConfidenceTier::Tight
    } else if ["solid", "solide"].iter().any(|kw| lower.contains(kw)) {
        ConfidenceTier::Solid
    } else if lower.contains("blowout") {
        ConfidenceTier::Blowout
    } else {
        ConfidenceTier::Unknown
    }
}

pub fn filter_games<'a>(games: &'a [Game], query: &str) -> Vec<&'a Game> {
    let needle = query.trim().to_lowercase();
    games
        .iter()
        .filter(|g| {
            needle.is_empty()
                || g.home_team.to_lowercase().contains(&needle)
                || g.away_team.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Games keyed by date, in feed order within a day.
pub fn group_games_by_date<'a>(games: &[&'a Game]) -> BTreeMap<String, Vec<&'a Game>> {
    let mut out: BTreeMap<String, Vec<&'a Game>> = BTreeMap::new();
    for game in games {
        out.entry(normalize_game_date(&game.game_date))
            .or_default()
            .push(game);
    }
    out
}

fn normalize_game_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return dt.date_naive().format("%Y-%m-%d").to_string();
    }
    if let Some(prefix) = trimmed.get(..10)
        && let Ok(date) = chrono::NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
    {
        return date.format("%Y-%m-%d").to_string();
    }
    trimmed.to_string()
}

pub fn search_roster<'a>(roster: &'a [RosterPlayer], query: &str) -> Vec<&'a RosterPlayer> {
    let needle = query.trim().to_lowercase();
    roster
        .iter()
        .filter(|p| p.full_name.to_lowercase().contains(&needle))
        .collect()
}
