//! Offline prediction source for running the dashboard without a backend.
//!
//! Numbers are derived from a small seeded table so the same matchup always looks the
//! same, with optional jitter to make refreshes visible.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use chrono::{Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use crate::source::{CalculatorRequest, MatchupRequest, PredictionSource};
use crate::state::{
    AdvancedMetrics, CalculatorAnalysis, Fatigue, FullMatchPrediction, Game, MatchPrediction,
    PlayerFullPrediction, PlayerHistory, PredictedStats, RosterPlayer, ShootingAnalysis,
    ShootingPrediction, Splits, StatLine, TeamShooting,
};
use crate::team_codes::team_name;

const SCHEDULE: [(&str, &str); 4] = [("BOS", "LAL"), ("DEN", "GSW"), ("MIL", "NYK"), ("PHX", "DAL")];

const FIRST_NAMES: [&str; 8] = [
    "Marcus", "Andre", "Tyrese", "Jalen", "Devin", "Malik", "Cody", "Isaiah",
];
const LAST_NAMES: [&str; 8] = [
    "Holloway", "Brooks", "Whitfield", "Carver", "Mason", "Ellison", "Pratt", "Dunmore",
];
const POSITIONS: [&str; 8] = ["G", "G", "F", "F", "C", "G", "F", "C"];

// Per-slot baseline (PTS, REB, AST, MIN).
const SLOT_BASELINE: [(f64, f64, f64, f64); 8] = [
    (26.4, 5.1, 6.8, 35.5),
    (19.8, 4.2, 4.9, 33.0),
    (15.2, 7.6, 2.7, 30.5),
    (12.1, 6.3, 2.1, 28.0),
    (10.4, 9.8, 1.6, 26.5),
    (8.2, 2.5, 3.1, 20.0),
    (6.0, 3.3, 1.2, 16.5),
    (4.4, 4.0, 0.8, 13.0),
];

pub struct DemoPredictionSource {
    jitter: bool,
    rng: Mutex<StdRng>,
}

impl Default for DemoPredictionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoPredictionSource {
    pub fn new() -> Self {
        Self {
            jitter: true,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Same answers every time.
    pub fn steady() -> Self {
        Self {
            jitter: false,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    fn wobble(&self, value: f64, spread: f64) -> f64 {
        if !self.jitter {
            return value;
        }
        let delta = match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(-spread..=spread),
            Err(_) => 0.0,
        };
        round1(value + delta).max(0.0)
    }
}

impl PredictionSource for DemoPredictionSource {
    fn games(&self) -> Result<Vec<Game>> {
        let now = Utc::now();
        Ok(SCHEDULE
            .iter()
            .enumerate()
            .map(|(idx, &(home, away))| {
                let tip = now + ChronoDuration::hours(2 + 12 * idx as i64);
                Game {
                    game_id: format!("demo-{}-{}", home.to_lowercase(), away.to_lowercase()),
                    game_date: tip.format("%Y-%m-%d").to_string(),
                    game_time: Some(tip.format("%H:%M").to_string()),
                    home_team: team_name(home).unwrap_or(home).to_string(),
                    away_team: team_name(away).unwrap_or(away).to_string(),
                    // Every other game leaves the ids out so names have to be mapped.
                    home_team_id: (idx % 2 == 0).then(|| home.to_string()),
                    away_team_id: (idx % 2 == 0).then(|| away.to_string()),
                    is_live: false,
                }
            })
            .collect())
    }

    fn team_roster(&self, team_id: &str) -> Result<Vec<RosterPlayer>> {
        let team = team_index(team_id).ok_or_else(|| anyhow!("unknown team: {team_id}"))?;
        Ok((0..SLOT_BASELINE.len())
            .map(|slot| RosterPlayer {
                id: player_id(team, slot),
                full_name: player_name(team, slot),
                position: Some(POSITIONS[slot].to_string()),
            })
            .collect())
    }

    fn match_prediction(&self, req: &MatchupRequest) -> Result<MatchPrediction> {
        let home = team_index(&req.home_team_id)
            .ok_or_else(|| anyhow!("unknown team: {}", req.home_team_id))?;
        let away = team_index(&req.away_team_id)
            .ok_or_else(|| anyhow!("unknown team: {}", req.away_team_id))?;
        let home_score = self.wobble(team_points(home, &req.excluded_home) + 2.5, 1.5);
        let away_score = self.wobble(team_points(away, &req.excluded_away), 1.5);
        let margin = home_score - away_score;
        let home_prob = 1.0 / (1.0 + (-margin / 6.0).exp());

        let confidence = match margin.abs() {
            m if m < 4.0 => "Tight",
            m if m < 12.0 => "Solid",
            _ => "Blowout",
        };
        let home_name = display_name(&req.home_team_id);
        let away_name = display_name(&req.away_team_id);
        Ok(MatchPrediction {
            winner: Some(if margin >= 0.0 { home_name } else { away_name }),
            home_win_probability: Some(round3(home_prob)),
            away_win_probability: Some(round3(1.0 - home_prob)),
            predicted_home_score: Some(round1(home_score)),
            predicted_away_score: Some(round1(away_score)),
            confidence_level: Some(confidence.to_string()),
            home_fatigue_factors: fatigue_factors(home, &req.excluded_home),
            away_fatigue_factors: fatigue_factors(away, &req.excluded_away),
        })
    }

    fn full_match_prediction(&self, req: &MatchupRequest) -> Result<FullMatchPrediction> {
        let home = team_index(&req.home_team_id)
            .ok_or_else(|| anyhow!("unknown team: {}", req.home_team_id))?;
        let away = team_index(&req.away_team_id)
            .ok_or_else(|| anyhow!("unknown team: {}", req.away_team_id))?;
        Ok(FullMatchPrediction {
            home_team: Some(display_name(&req.home_team_id)),
            away_team: Some(display_name(&req.away_team_id)),
            home_players: self.team_projections(home, &req.excluded_home),
            away_players: self.team_projections(away, &req.excluded_away),
        })
    }

    fn player_history(&self, player_id: u32, opponent_team_id: &str) -> Result<PlayerHistory> {
        let (team, slot) =
            locate_player(player_id).ok_or_else(|| anyhow!("unknown player: {player_id}"))?;
        let (pts, reb, ast, min) = SLOT_BASELINE[slot];
        let form = 1.0 + ((player_id % 7) as f64 - 3.0) * 0.04;
        let recent = stat_line(10.0, pts * form, reb * form, ast * form);

        // Teams an even number of slots apart have met this season.
        let opponent = team_index(opponent_team_id);
        let h2h = match opponent {
            Some(opp) if (opp + team) % 2 == 0 => {
                let h = 1.0 + ((player_id % 5) as f64 - 2.0) * 0.06;
                stat_line(2.0, pts * h, reb * h, ast * h)
            }
            _ => stat_line(0.0, 0.0, 0.0, 0.0),
        };

        let last_min = self.wobble(min + ((player_id % 9) as f64 - 4.0), 2.0);
        let (status, color) = if last_min >= 36.0 {
            ("Heavy minutes", "red")
        } else if last_min <= 24.0 {
            ("Rested", "green")
        } else {
            ("Normal load", "yellow")
        };

        Ok(PlayerHistory {
            recent_form_avg: Some(recent),
            h2h_avg: Some(h2h),
            splits: Some(Splits {
                home: Some(stat_line(20.0, pts * 1.04, reb * 1.02, ast * 1.03)),
                away: Some(stat_line(20.0, pts * 0.96, reb * 0.98, ast * 0.97)),
            }),
            fatigue: Some(Fatigue {
                status: status.to_string(),
                last_min,
                color_code: Some(color.to_string()),
            }),
            matchup_context: opponent.map(|opp| {
                format!(
                    "Faces {} defense ranked {} in the league",
                    TEAM_CODES[opp],
                    (opp * 7) % 30 + 1
                )
            }),
        })
    }

    fn calculator_analysis(&self, req: &CalculatorRequest) -> Result<CalculatorAnalysis> {
        if !(req.line.is_finite() && req.line > 0.0) {
            return Err(anyhow!("line must be a positive number"));
        }
        let sigma = (req.projection * 0.25).max(1.5);
        let z = (req.line - req.projection) / sigma;
        let over = (1.0 - normal_cdf(z)).clamp(0.01, 0.99);
        let (advice, color) = if over >= 0.58 {
            ("Lean OVER", "green")
        } else if over <= 0.42 {
            ("Lean UNDER", "red")
        } else {
            ("No edge, pass", "amber")
        };
        let confidence = match (over - 0.5).abs() {
            d if d >= 0.2 => "High",
            d if d >= 0.08 => "Medium",
            _ => "Low",
        };
        let over = round3(over);
        Ok(CalculatorAnalysis {
            probability_over: over,
            probability_under: round3(1.0 - over),
            advice: Some(advice.to_string()),
            color_code: Some(color.to_string()),
            confidence: Some(confidence.to_string()),
        })
    }

    fn shooting_splits(&self, req: &MatchupRequest) -> Result<ShootingPrediction> {
        let home = team_index(&req.home_team_id)
            .ok_or_else(|| anyhow!("unknown team: {}", req.home_team_id))?;
        let away = team_index(&req.away_team_id)
            .ok_or_else(|| anyhow!("unknown team: {}", req.away_team_id))?;
        let home_side = self.team_shooting(&req.home_team_id, home, &req.excluded_home);
        let away_side = self.team_shooting(&req.away_team_id, away, &req.excluded_away);
        let pace = 97.0 + ((home + away) % 9) as f64 * 0.6;
        let winner = |h: f64, a: f64| {
            if h >= a {
                req.home_team_id.clone()
            } else {
                req.away_team_id.clone()
            }
        };
        let fatigued = !req.excluded_home.is_empty() || !req.excluded_away.is_empty();
        Ok(ShootingPrediction {
            matchup: format!("{} @ {}", req.away_team_id, req.home_team_id),
            pace_context: format!("{}: {:.1}", pace_label(pace), pace),
            analysis: ShootingAnalysis {
                two_pt_winner: Some(winner(home_side.fg2m, away_side.fg2m)),
                three_pt_winner: Some(winner(home_side.fg3m, away_side.fg3m)),
                fatigue_impact: Some(if fatigued { "Oui" } else { "Non" }.to_string()),
                extra: BTreeMap::from([(
                    "total_margin".to_string(),
                    Value::from(round1(home_side.total_fg - away_side.total_fg)),
                )]),
            },
            home: home_side,
            away: away_side,
        })
    }
}

impl DemoPredictionSource {
    fn team_projections(&self, team: usize, excluded: &[u32]) -> Vec<PlayerFullPrediction> {
        let absent_pts: f64 = (0..SLOT_BASELINE.len())
            .filter(|slot| excluded.contains(&player_id(team, *slot)))
            .map(|slot| SLOT_BASELINE[slot].0)
            .sum();
        let active = SLOT_BASELINE.len() - excluded_count(team, excluded);
        // Absent scoring is spread evenly over whoever is left.
        let bump = if active > 0 { absent_pts / active as f64 } else { 0.0 };

        (0..SLOT_BASELINE.len())
            .filter(|slot| !excluded.contains(&player_id(team, *slot)))
            .map(|slot| {
                let (pts, reb, ast, min) = SLOT_BASELINE[slot];
                let pts = self.wobble(pts + bump * 0.8, 0.6);
                let reb = self.wobble(reb, 0.4);
                let ast = self.wobble(ast, 0.4);
                PlayerFullPrediction {
                    player_id: player_id(team, slot),
                    player: player_name(team, slot),
                    team: display_name(TEAM_CODES[team]),
                    position: Some(POSITIONS[slot].to_string()),
                    predicted_stats: PredictedStats {
                        MIN: Some(round1(min)),
                        PTS: Some(pts),
                        REB: Some(reb),
                        AST: Some(ast),
                    },
                    advanced_metrics_projected: AdvancedMetrics {
                        PRA: Some(round1(pts + reb + ast)),
                    },
                }
            })
            .collect()
    }

    fn team_shooting(&self, code: &str, team: usize, excluded: &[u32]) -> TeamShooting {
        let strength = team_points(team, excluded) / 110.0;
        let fg2m = self.wobble(round1(22.0 + 8.0 * strength + (team % 5) as f64), 0.8);
        let fg3m = self.wobble(round1(9.0 + 3.5 * strength + (team % 4) as f64 * 0.7), 0.5);
        TeamShooting {
            team: code.to_string(),
            fg2m,
            fg2m_range: range_label(fg2m, 5.5),
            fg3m,
            fg3m_range: range_label(fg3m, 2.5),
            total_fg: round1(fg2m + fg3m),
        }
    }
}

/// The canned shooting prediction shown when the shooting service is unreachable.
pub fn example_shooting_prediction(home_team_id: &str, away_team_id: &str) -> ShootingPrediction {
    ShootingPrediction {
        matchup: format!("{away_team_id} @ {home_team_id}"),
        pace_context: "Rythme Rapide: 100.8".to_string(),
        home: TeamShooting {
            team: home_team_id.to_string(),
            fg2m: 25.6,
            fg2m_range: "20-31".to_string(),
            fg3m: 12.4,
            fg3m_range: "10-15".to_string(),
            total_fg: 38.0,
        },
        away: TeamShooting {
            team: away_team_id.to_string(),
            fg2m: 31.9,
            fg2m_range: "27-37".to_string(),
            fg3m: 9.8,
            fg3m_range: "8-12".to_string(),
            total_fg: 41.7,
        },
        analysis: ShootingAnalysis {
            two_pt_winner: Some(away_team_id.to_string()),
            three_pt_winner: Some(home_team_id.to_string()),
            fatigue_impact: Some("Oui".to_string()),
            extra: BTreeMap::new(),
        },
    }
}

const TEAM_CODES: [&str; 8] = ["BOS", "LAL", "DEN", "GSW", "MIL", "NYK", "PHX", "DAL"];

fn team_index(team_id: &str) -> Option<usize> {
    let id = team_id.trim();
    TEAM_CODES.iter().position(|code| code.eq_ignore_ascii_case(id))
}

fn display_name(code: &str) -> String {
    team_name(code).unwrap_or(code).to_string()
}

fn player_id(team: usize, slot: usize) -> u32 {
    (1_000 + team * 100 + slot) as u32
}

fn locate_player(id: u32) -> Option<(usize, usize)> {
    let raw = (id as usize).checked_sub(1_000)?;
    let (team, slot) = (raw / 100, raw % 100);
    (team < TEAM_CODES.len() && slot < SLOT_BASELINE.len()).then_some((team, slot))
}

fn player_name(team: usize, slot: usize) -> String {
    let first = FIRST_NAMES[(team * 3 + slot) % FIRST_NAMES.len()];
    let last = LAST_NAMES[(team + slot * 5) % LAST_NAMES.len()];
    format!("{first} {last}")
}

fn excluded_count(team: usize, excluded: &[u32]) -> usize {
    (0..SLOT_BASELINE.len())
        .filter(|slot| excluded.contains(&player_id(team, *slot)))
        .count()
}

fn team_points(team: usize, excluded: &[u32]) -> f64 {
    let roster: f64 = SLOT_BASELINE.iter().map(|(pts, ..)| pts).sum();
    // A missing player's points are only partly replaced.
    let lost: f64 = (0..SLOT_BASELINE.len())
        .filter(|slot| excluded.contains(&player_id(team, *slot)))
        .map(|slot| SLOT_BASELINE[slot].0 * 0.35)
        .sum();
    roster + (team % 6) as f64 * 1.7 - lost
}

fn fatigue_factors(team: usize, excluded: &[u32]) -> Vec<String> {
    let mut out = Vec::new();
    if team % 3 == 0 {
        out.push("Back-to-back".to_string());
    }
    let missing = excluded_count(team, excluded);
    if missing > 0 {
        out.push(format!("{missing} rotation player(s) out"));
    }
    out
}

fn stat_line(gp: f64, pts: f64, reb: f64, ast: f64) -> StatLine {
    StatLine {
        GP: Some(gp),
        PTS: Some(round1(pts)),
        REB: Some(round1(reb)),
        AST: Some(round1(ast)),
        PRA: Some(round1(pts + reb + ast)),
        PA: Some(round1(pts + ast)),
        PR: Some(round1(pts + reb)),
        STL: None,
        BLK: None,
    }
}

fn pace_label(pace: f64) -> &'static str {
    if pace >= 100.0 {
        "Rythme Rapide"
    } else if pace >= 98.0 {
        "Rythme Moyen"
    } else {
        "Rythme Lent"
    }
}

fn range_label(value: f64, spread: f64) -> String {
    let lo = (value - spread).max(0.0).round() as i64;
    let hi = (value + spread).round() as i64;
    format!("{lo}-{hi}")
}

fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

// Abramowitz and Stegun 7.1.26, max error 1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let y = 1.0
        - (((((1.061_405_429 * t - 1.453_152_027) * t) + 1.421_413_741) * t - 0.284_496_736) * t
            + 0.254_829_592)
            * t
            * (-x * x).exp();
    sign * y
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StatCategory;

    fn matchup(excluded_home: Vec<u32>) -> MatchupRequest {
        MatchupRequest {
            home_team_id: "BOS".to_string(),
            away_team_id: "LAL".to_string(),
            excluded_home,
            excluded_away: Vec::new(),
        }
    }

    #[test]
    fn excluded_players_leave_the_projection() {
        let source = DemoPredictionSource::steady();
        let full = source
            .full_match_prediction(&matchup(vec![1_000]))
            .expect("prediction");
        assert!(full.home_players.iter().all(|p| p.player_id != 1_000));
        assert_eq!(full.home_players.len(), SLOT_BASELINE.len() - 1);
    }

    #[test]
    fn calculator_leans_with_the_projection() {
        let source = DemoPredictionSource::steady();
        let req = |line: f64| CalculatorRequest {
            player_id: 1_000,
            projection: 26.0,
            line,
            stat: StatCategory::PTS,
        };
        let low = source.calculator_analysis(&req(18.5)).expect("analysis");
        let high = source.calculator_analysis(&req(34.5)).expect("analysis");
        assert_eq!(low.color_code.as_deref(), Some("green"));
        assert_eq!(high.color_code.as_deref(), Some("red"));
        assert!((low.probability_over + low.probability_under - 1.0).abs() < 1e-9);
    }

    #[test]
    fn player_ids_round_trip_to_slots() {
        assert_eq!(locate_player(player_id(3, 5)), Some((3, 5)));
        assert_eq!(locate_player(42), None);
    }
}
