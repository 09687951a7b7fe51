use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::Config;
use crate::demo_feed::example_shooting_prediction;
use crate::http_client::{build_client, get_text};
use crate::source::{CalculatorRequest, MatchupRequest, PredictionSource};
use crate::state::{
    CalculatorAnalysis, FullMatchPrediction, Game, MatchPrediction, PlayerHistory, RosterPlayer,
    ShootingPrediction,
};

pub struct HttpPredictionSource {
    client: Client,
    base_url: String,
    shooting_fallback: bool,
}

impl HttpPredictionSource {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: build_client(config.request_timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            shooting_fallback: config.shooting_fallback,
        })
    }

    fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let base = format!("{}{}", self.base_url, path);
        let url = Url::parse_with_params(&base, query)
            .with_context(|| format!("invalid url: {base}"))?;
        get_text(&self.client, url.as_str())
    }

    fn fetch_shooting(&self, req: &MatchupRequest) -> Result<ShootingPrediction> {
        let body = self.get("/predict/shooting", &matchup_query(req))?;
        parse_shooting_json(&body)
    }
}

impl PredictionSource for HttpPredictionSource {
    fn games(&self) -> Result<Vec<Game>> {
        let body = self.get("/games/upcoming", &[("hours", "48".to_string())])?;
        parse_games_json(&body)
    }

    fn team_roster(&self, team_id: &str) -> Result<Vec<RosterPlayer>> {
        let body = self.get(&format!("/teams/{}/roster", team_id.trim()), &[])?;
        parse_roster_json(&body)
    }

    fn match_prediction(&self, req: &MatchupRequest) -> Result<MatchPrediction> {
        let body = self.get("/predict/match", &matchup_query(req))?;
        parse_match_prediction_json(&body)
    }

    fn full_match_prediction(&self, req: &MatchupRequest) -> Result<FullMatchPrediction> {
        let body = self.get("/predict/full-match", &matchup_query(req))?;
        parse_full_match_json(&body)
    }

    fn player_history(&self, player_id: u32, opponent_team_id: &str) -> Result<PlayerHistory> {
        let body = self.get(
            &format!("/players/{player_id}/history"),
            &[("opponent", opponent_team_id.to_string())],
        )?;
        parse_player_history_json(&body)
    }

    fn calculator_analysis(&self, req: &CalculatorRequest) -> Result<CalculatorAnalysis> {
        let body = self.get(
            "/calculator",
            &[
                ("player_id", req.player_id.to_string()),
                ("projection", format!("{:.2}", req.projection)),
                ("line", format!("{:.2}", req.line)),
                ("stat", req.stat.as_str().to_string()),
            ],
        )?;
        parse_calculator_json(&body)
    }

    fn shooting_splits(&self, req: &MatchupRequest) -> Result<ShootingPrediction> {
        match self.fetch_shooting(req) {
            Ok(data) => Ok(data),
            Err(_) if self.shooting_fallback => {
                Ok(example_shooting_prediction(&req.home_team_id, &req.away_team_id))
            }
            Err(err) => Err(err),
        }
    }
}

fn matchup_query(req: &MatchupRequest) -> Vec<(&'static str, String)> {
    vec![
        ("home", req.home_team_id.clone()),
        ("away", req.away_team_id.clone()),
        ("home_absents", join_ids(&req.excluded_home)),
        ("away_absents", join_ids(&req.excluded_away)),
    ]
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn is_blank(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == "null"
}

/// Accepts a bare array or an object wrapping it under one of `keys`.
fn unwrap_list<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    if let Some(items) = root.as_array() {
        return Some(items);
    }
    keys.iter()
        .find_map(|key| root.get(*key).and_then(Value::as_array))
}

pub fn parse_games_json(raw: &str) -> Result<Vec<Game>> {
    if is_blank(raw) {
        return Ok(Vec::new());
    }
    let root: Value = serde_json::from_str(raw.trim()).context("invalid games json")?;
    let Some(items) = unwrap_list(&root, &["games", "data"]) else {
        return Err(anyhow!("games json has no game list"));
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        // Skip rows the schedule feed left half-filled rather than failing the page.
        if let Ok(game) = serde_json::from_value::<Game>(item.clone()) {
            out.push(game);
        }
    }
    Ok(out)
}

pub fn parse_roster_json(raw: &str) -> Result<Vec<RosterPlayer>> {
    if is_blank(raw) {
        return Ok(Vec::new());
    }
    let root: Value = serde_json::from_str(raw.trim()).context("invalid roster json")?;
    let Some(items) = unwrap_list(&root, &["players", "roster"]) else {
        return Err(anyhow!("roster json has no player list"));
    };
    Ok(items
        .iter()
        .filter_map(|item| {
            let id = pick_u32(item, &["id", "player_id", "PLAYER_ID"])?;
            let full_name = pick_string(item, &["full_name", "name", "PLAYER"])?;
            Some(RosterPlayer {
                id,
                full_name,
                position: pick_string(item, &["position", "POSITION"]),
            })
        })
        .collect())
}

pub fn parse_match_prediction_json(raw: &str) -> Result<MatchPrediction> {
    parse_or_default(raw, "invalid match prediction json")
}

pub fn parse_full_match_json(raw: &str) -> Result<FullMatchPrediction> {
    parse_or_default(raw, "invalid full match prediction json")
}

pub fn parse_player_history_json(raw: &str) -> Result<PlayerHistory> {
    parse_or_default(raw, "invalid player history json")
}

pub fn parse_calculator_json(raw: &str) -> Result<CalculatorAnalysis> {
    if is_blank(raw) {
        return Err(anyhow!("empty calculator response"));
    }
    serde_json::from_str(raw.trim()).context("invalid calculator json")
}

pub fn parse_shooting_json(raw: &str) -> Result<ShootingPrediction> {
    if is_blank(raw) {
        return Err(anyhow!("empty shooting prediction response"));
    }
    serde_json::from_str(raw.trim()).context("invalid shooting prediction json")
}

fn parse_or_default<T: DeserializeOwned + Default>(raw: &str, what: &'static str) -> Result<T> {
    if is_blank(raw) {
        return Ok(T::default());
    }
    serde_json::from_str(raw.trim()).context(what)
}

fn pick_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let v = value.get(*key)?;
        match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    })
}

fn pick_u32(value: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|key| {
        let v = value.get(*key)?;
        v.as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .or_else(|| v.as_str().and_then(|s| s.trim().parse::<u32>().ok()))
    })
}
