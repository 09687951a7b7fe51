//! Cache keys for the prediction service queries.
//!
//! A key is the query kind followed by its canonical parameters, sorted by name:
//! `MATCH_PREDICTION|away=LAL|excluded_away=|excluded_home=3,17|home=BOS`.
//! Parameters a query does not depend on are never part of its key, so changing
//! them cannot trigger a refetch.

use std::collections::BTreeMap;
use std::fmt;

use crate::source::{CalculatorRequest, MatchupRequest};

const DECIMAL_PLACES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKind {
    GamesFeed,
    TeamRoster,
    MatchPrediction,
    FullMatchPrediction,
    PlayerHistory,
    CalculatorAnalysis,
    ShootingSplits,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::GamesFeed => "GAMES_FEED",
            QueryKind::TeamRoster => "TEAM_ROSTER",
            QueryKind::MatchPrediction => "MATCH_PREDICTION",
            QueryKind::FullMatchPrediction => "FULL_MATCH_PREDICTION",
            QueryKind::PlayerHistory => "PLAYER_HISTORY",
            QueryKind::CalculatorAnalysis => "CALCULATOR_ANALYSIS",
            QueryKind::ShootingSplits => "SHOOTING_SPLITS",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Decimal(f64),
    IdSet(Vec<u32>),
}

impl ParamValue {
    fn canonical(&self) -> String {
        match self {
            ParamValue::Text(s) => escape_text(s.trim()),
            ParamValue::Int(n) => n.to_string(),
            ParamValue::Decimal(v) => format_decimal(*v),
            ParamValue::IdSet(ids) => {
                let mut ids = ids.clone();
                ids.sort_unstable();
                ids.dedup();
                ids.iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            }
        }
    }
}

/// Backslash-escapes the key separators so a value can never read as another parameter.
fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '|' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn format_decimal(v: f64) -> String {
    let out = format!("{:.*}", DECIMAL_PLACES, v);
    // -0.00 and 0.00 are the same request.
    if out.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
        return out.trim_start_matches('-').to_string();
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind_prefix(&self) -> &str {
        self.0.split('|').next().unwrap_or_default()
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type Params = BTreeMap<&'static str, ParamValue>;

pub fn build_key(kind: QueryKind, params: &Params) -> RequestKey {
    let mut out = String::from(kind.as_str());
    for (name, value) in params {
        out.push('|');
        out.push_str(name);
        out.push('=');
        out.push_str(&value.canonical());
    }
    RequestKey(out)
}

/// A logical request: what to fetch and whether it may be fetched automatically.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub kind: QueryKind,
    pub params: Params,
    // Not part of the key: the same request can be lazy on one render and eager on the next.
    pub enabled: bool,
}

impl RequestDescriptor {
    pub fn new(kind: QueryKind) -> Self {
        Self {
            kind,
            params: BTreeMap::new(),
            enabled: true,
        }
    }

    pub fn param(mut self, name: &'static str, value: ParamValue) -> Self {
        self.params.insert(name, value);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn key(&self) -> RequestKey {
        build_key(self.kind, &self.params)
    }

    pub fn games_feed() -> Self {
        Self::new(QueryKind::GamesFeed)
    }

    pub fn team_roster(team_id: &str) -> Self {
        Self::new(QueryKind::TeamRoster)
            .param("team_id", ParamValue::Text(team_id.to_string()))
            .enabled(!team_id.trim().is_empty())
    }

    pub fn match_prediction(req: &MatchupRequest) -> Self {
        matchup_params(Self::new(QueryKind::MatchPrediction), req)
    }

    pub fn full_match_prediction(req: &MatchupRequest) -> Self {
        matchup_params(Self::new(QueryKind::FullMatchPrediction), req)
    }

    pub fn shooting_splits(req: &MatchupRequest) -> Self {
        matchup_params(Self::new(QueryKind::ShootingSplits), req)
    }

    pub fn player_history(player_id: u32, opponent_team_id: &str) -> Self {
        Self::new(QueryKind::PlayerHistory)
            .param("player_id", ParamValue::Int(i64::from(player_id)))
            .param("opponent", ParamValue::Text(opponent_team_id.to_string()))
    }

    /// Lazy by default: the calculator only runs on an explicit trigger.
    pub fn calculator_analysis(req: &CalculatorRequest) -> Self {
        Self::new(QueryKind::CalculatorAnalysis)
            .param("player_id", ParamValue::Int(i64::from(req.player_id)))
            .param("projection", ParamValue::Decimal(req.projection))
            .param("line", ParamValue::Decimal(req.line))
            .param("stat", ParamValue::Text(req.stat.as_str().to_string()))
            .enabled(false)
    }
}

fn matchup_params(desc: RequestDescriptor, req: &MatchupRequest) -> RequestDescriptor {
    desc.param("home", ParamValue::Text(req.home_team_id.clone()))
        .param("away", ParamValue::Text(req.away_team_id.clone()))
        .param("excluded_home", ParamValue::IdSet(req.excluded_home.clone()))
        .param("excluded_away", ParamValue::IdSet(req.excluded_away.clone()))
        .enabled(req.is_complete())
}
