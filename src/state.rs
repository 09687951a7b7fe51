use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum StatCategory {
    #[default]
    PTS,
    REB,
    AST,
    PRA,
}

impl StatCategory {
    pub const ALL: [StatCategory; 4] = [
        StatCategory::PTS,
        StatCategory::REB,
        StatCategory::AST,
        StatCategory::PRA,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatCategory::PTS => "PTS",
            StatCategory::REB => "REB",
            StatCategory::AST => "AST",
            StatCategory::PRA => "PRA",
        }
    }

    pub fn next(self) -> Self {
        match self {
            StatCategory::PTS => StatCategory::REB,
            StatCategory::REB => StatCategory::AST,
            StatCategory::AST => StatCategory::PRA,
            StatCategory::PRA => StatCategory::PTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComparisonTab {
    #[default]
    RecentForm,
    HeadToHead,
}

impl ComparisonTab {
    pub fn toggle(self) -> Self {
        match self {
            ComparisonTab::RecentForm => ComparisonTab::HeadToHead,
            ComparisonTab::HeadToHead => ComparisonTab::RecentForm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedPlayer {
    pub id: u32,
    pub name: String,
}

/// Players marked absent for one side. Order is kept for display only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    players: Vec<ExcludedPlayer>,
}

impl ExclusionSet {
    pub fn insert(&mut self, id: u32, name: impl Into<String>) -> bool {
        if self.contains(id) {
            return false;
        }
        self.players.push(ExcludedPlayer {
            id,
            name: name.into(),
        });
        true
    }

    pub fn remove(&mut self, id: u32) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.id != id);
        self.players.len() != before
    }

    pub fn contains(&self, id: u32) -> bool {
        self.players.iter().any(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExcludedPlayer> {
        self.players.iter()
    }

    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.players.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    pub stat: StatCategory,
    pub line_text: String,
    pub excluded_home: ExclusionSet,
    pub excluded_away: ExclusionSet,
    pub tab: ComparisonTab,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&self) -> Result<f64, LineError> {
        parse_line(&self.line_text)
    }

    pub fn excluded(&self, side: Side) -> &ExclusionSet {
        match side {
            Side::Home => &self.excluded_home,
            Side::Away => &self.excluded_away,
        }
    }

    pub fn excluded_mut(&mut self, side: Side) -> &mut ExclusionSet {
        match side {
            Side::Home => &mut self.excluded_home,
            Side::Away => &mut self.excluded_away,
        }
    }
}

pub fn parse_line(raw: &str) -> Result<f64, LineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LineError::Empty);
    }
    let value = trimmed
        .parse::<f64>()
        .map_err(|_| LineError::NotNumeric)?;
    if !value.is_finite() {
        return Err(LineError::NotFinite);
    }
    if value <= 0.0 {
        return Err(LineError::NotPositive);
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    #[serde(rename = "gameId")]
    pub game_id: String,
    #[serde(rename = "gameDate", default)]
    pub game_date: String,
    #[serde(rename = "gameTime", default)]
    pub game_time: Option<String>,
    #[serde(rename = "homeTeam")]
    pub home_team: String,
    #[serde(rename = "awayTeam")]
    pub away_team: String,
    #[serde(rename = "homeTeamId", default)]
    pub home_team_id: Option<String>,
    #[serde(rename = "awayTeamId", default)]
    pub away_team_id: Option<String>,
    #[serde(rename = "isLive", default)]
    pub is_live: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterPlayer {
    pub id: u32,
    pub full_name: String,
    #[serde(default)]
    pub position: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchPrediction {
    #[serde(default)]
    pub winner: Option<String>,
    #[serde(default, alias = "home_win_prob")]
    pub home_win_probability: Option<f64>,
    #[serde(default, alias = "away_win_prob")]
    pub away_win_probability: Option<f64>,
    #[serde(default, alias = "home_score")]
    pub predicted_home_score: Option<f64>,
    #[serde(default, alias = "away_score")]
    pub predicted_away_score: Option<f64>,
    #[serde(default, alias = "confidence")]
    pub confidence_level: Option<String>,
    #[serde(default)]
    pub home_fatigue_factors: Vec<String>,
    #[serde(default)]
    pub away_fatigue_factors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct PredictedStats {
    #[serde(default)]
    pub MIN: Option<f64>,
    #[serde(default)]
    pub PTS: Option<f64>,
    #[serde(default)]
    pub REB: Option<f64>,
    #[serde(default)]
    pub AST: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct AdvancedMetrics {
    #[serde(default)]
    pub PRA: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerFullPrediction {
    pub player_id: u32,
    pub player: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub predicted_stats: PredictedStats,
    #[serde(default)]
    pub advanced_metrics_projected: AdvancedMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FullMatchPrediction {
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
    #[serde(default)]
    pub home_players: Vec<PlayerFullPrediction>,
    #[serde(default)]
    pub away_players: Vec<PlayerFullPrediction>,
}

impl FullMatchPrediction {
    pub fn find_player(&self, player_id: u32) -> Option<(Side, &PlayerFullPrediction)> {
        self.home_players
            .iter()
            .find(|p| p.player_id == player_id)
            .map(|p| (Side::Home, p))
            .or_else(|| {
                self.away_players
                    .iter()
                    .find(|p| p.player_id == player_id)
                    .map(|p| (Side::Away, p))
            })
    }
}

/// Averages over a window of games; every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct StatLine {
    #[serde(default)]
    pub GP: Option<f64>,
    #[serde(default)]
    pub PTS: Option<f64>,
    #[serde(default)]
    pub REB: Option<f64>,
    #[serde(default)]
    pub AST: Option<f64>,
    #[serde(default)]
    pub PRA: Option<f64>,
    #[serde(default)]
    pub PA: Option<f64>,
    #[serde(default)]
    pub PR: Option<f64>,
    #[serde(default)]
    pub STL: Option<f64>,
    #[serde(default)]
    pub BLK: Option<f64>,
}

impl StatLine {
    pub fn get(&self, stat: StatCategory) -> Option<f64> {
        match stat {
            StatCategory::PTS => self.PTS,
            StatCategory::REB => self.REB,
            StatCategory::AST => self.AST,
            StatCategory::PRA => self.PRA,
        }
    }

    pub fn games_played(&self) -> f64 {
        self.GP.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Splits {
    #[serde(default)]
    pub home: Option<StatLine>,
    #[serde(default)]
    pub away: Option<StatLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fatigue {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub last_min: f64,
    #[serde(default)]
    pub color_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerHistory {
    #[serde(default)]
    pub recent_form_avg: Option<StatLine>,
    #[serde(default)]
    pub h2h_avg: Option<StatLine>,
    #[serde(default)]
    pub splits: Option<Splits>,
    #[serde(default)]
    pub fatigue: Option<Fatigue>,
    #[serde(default)]
    pub matchup_context: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculatorAnalysis {
    #[serde(default)]
    pub probability_over: f64,
    #[serde(default)]
    pub probability_under: f64,
    #[serde(default)]
    pub advice: Option<String>,
    #[serde(default)]
    pub color_code: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamShooting {
    pub team: String,
    #[serde(rename = "FG2M", default)]
    pub fg2m: f64,
    #[serde(rename = "FG2M_Range", default)]
    pub fg2m_range: String,
    #[serde(rename = "FG3M", default)]
    pub fg3m: f64,
    #[serde(rename = "FG3M_Range", default)]
    pub fg3m_range: String,
    #[serde(rename = "Total_FG", default)]
    pub total_fg: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShootingAnalysis {
    #[serde(rename = "2pt_winner", default)]
    pub two_pt_winner: Option<String>,
    #[serde(rename = "3pt_winner", default)]
    pub three_pt_winner: Option<String>,
    #[serde(default)]
    pub fatigue_impact: Option<String>,
    // Win-margin fields vary between model versions; kept as raw json.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShootingPrediction {
    #[serde(default)]
    pub matchup: String,
    #[serde(default)]
    pub pace_context: String,
    pub home: TeamShooting,
    pub away: TeamShooting,
    #[serde(default)]
    pub analysis: ShootingAnalysis,
}

/// Everything a query can resolve to.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Games(Vec<Game>),
    Roster(Vec<RosterPlayer>),
    MatchPrediction(MatchPrediction),
    FullMatchPrediction(FullMatchPrediction),
    PlayerHistory(PlayerHistory),
    Calculator(CalculatorAnalysis),
    Shooting(ShootingPrediction),
}

impl Payload {
    pub fn as_games(&self) -> Option<&[Game]> {
        match self {
            Payload::Games(games) => Some(games),
            _ => None,
        }
    }

    pub fn as_roster(&self) -> Option<&[RosterPlayer]> {
        match self {
            Payload::Roster(players) => Some(players),
            _ => None,
        }
    }

    pub fn as_match_prediction(&self) -> Option<&MatchPrediction> {
        match self {
            Payload::MatchPrediction(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_full_match_prediction(&self) -> Option<&FullMatchPrediction> {
        match self {
            Payload::FullMatchPrediction(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_player_history(&self) -> Option<&PlayerHistory> {
        match self {
            Payload::PlayerHistory(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_calculator(&self) -> Option<&CalculatorAnalysis> {
        match self {
            Payload::Calculator(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_shooting(&self) -> Option<&ShootingPrediction> {
        match self {
            Payload::Shooting(s) => Some(s),
            _ => None,
        }
    }
}
