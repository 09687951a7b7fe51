use anyhow::Result;

use crate::state::{
    CalculatorAnalysis, FullMatchPrediction, Game, MatchPrediction, PlayerHistory, RosterPlayer,
    SelectionState, ShootingPrediction, StatCategory,
};

/// Two teams plus the players marked absent on each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchupRequest {
    pub home_team_id: String,
    pub away_team_id: String,
    pub excluded_home: Vec<u32>,
    pub excluded_away: Vec<u32>,
}

impl MatchupRequest {
    pub fn new(home_team_id: &str, away_team_id: &str, selection: &SelectionState) -> Self {
        Self {
            home_team_id: home_team_id.to_string(),
            away_team_id: away_team_id.to_string(),
            excluded_home: selection.excluded_home.ids(),
            excluded_away: selection.excluded_away.ids(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.home_team_id.trim().is_empty() && !self.away_team_id.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorRequest {
    pub player_id: u32,
    pub projection: f64,
    pub line: f64,
    pub stat: StatCategory,
}

/// The remote prediction service, one method per logical query.
///
/// Implementations block; the query cache runs them off the owner thread.
pub trait PredictionSource: Send + Sync {
    fn games(&self) -> Result<Vec<Game>>;

    fn team_roster(&self, team_id: &str) -> Result<Vec<RosterPlayer>>;

    fn match_prediction(&self, req: &MatchupRequest) -> Result<MatchPrediction>;

    fn full_match_prediction(&self, req: &MatchupRequest) -> Result<FullMatchPrediction>;

    fn player_history(&self, player_id: u32, opponent_team_id: &str) -> Result<PlayerHistory>;

    fn calculator_analysis(&self, req: &CalculatorRequest) -> Result<CalculatorAnalysis>;

    fn shooting_splits(&self, req: &MatchupRequest) -> Result<ShootingPrediction>;
}
