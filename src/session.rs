use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::config::{Config, SourceKind};
use crate::demo_feed::DemoPredictionSource;
use crate::derive::{
    ConfidenceTier, PlayerView, ShootingComparison, confidence_tier, derive_player_view,
    projection_value, shooting_comparison,
};
use crate::error::{LineError, QueryError};
use crate::nba_fetch::HttpPredictionSource;
use crate::query_cache::{
    CacheEntry, CacheStats, Commit, JobRunner, QueryCache, QueryOptions, QueryStatus, RayonRunner,
};
use crate::request_key::{RequestDescriptor, RequestKey};
use crate::source::{CalculatorRequest, MatchupRequest, PredictionSource};
use crate::state::{
    ComparisonTab, ExcludedPlayer, FullMatchPrediction, Game, MatchPrediction, Payload,
    PlayerFullPrediction, RosterPlayer, SelectionState, Side, StatCategory, parse_line,
};
use crate::team_codes::resolve_team_id;

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub games_refresh: Duration,
    pub shooting_stale: Duration,
    pub line_debounce: Duration,
    pub auto_analyze: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            games_refresh: config.games_refresh,
            shooting_stale: config.shooting_stale,
            line_debounce: config.line_debounce,
            auto_analyze: config.auto_analyze,
        }
    }
}

/// Where one query stands, without its value.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub status: QueryStatus,
    pub loading: bool,
    pub error: Option<QueryError>,
}

impl QueryState {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            loading: false,
            error: None,
        }
    }

    fn of(entry: &CacheEntry) -> Self {
        Self {
            status: entry.status,
            loading: entry.is_loading(),
            error: entry.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerPanel {
    pub view: PlayerView,
    pub side: Side,
    pub opponent_team_id: String,
    /// The full-match projection behind `view.projection_value`.
    pub projection: QueryState,
    pub history: QueryState,
    pub calculator: QueryState,
    pub calculator_open: bool,
    /// Set when the typed line is non-empty but unusable.
    pub line_error: Option<LineError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameView {
    pub game: Game,
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_roster: Vec<RosterPlayer>,
    pub away_roster: Vec<RosterPlayer>,
    pub home_roster_state: QueryState,
    pub away_roster_state: QueryState,
    pub excluded_home: Vec<ExcludedPlayer>,
    pub excluded_away: Vec<ExcludedPlayer>,
    pub prediction: Option<MatchPrediction>,
    pub prediction_state: QueryState,
    pub confidence: ConfidenceTier,
    pub players: Option<FullMatchPrediction>,
    pub players_state: QueryState,
    pub shooting: Option<ShootingComparison>,
    pub shooting_state: QueryState,
    pub player: Option<PlayerPanel>,
}

/// One consistent snapshot of everything on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub games: Vec<Game>,
    pub games_state: QueryState,
    pub selected_game_id: Option<String>,
    pub game: Option<GameView>,
}

#[derive(Debug, Clone)]
struct TrackedPlayer {
    snapshot: PlayerFullPrediction,
    side: Side,
}

struct Resolved {
    state: QueryState,
    value: Option<Arc<Payload>>,
}

pub struct DashboardSession {
    source: Arc<dyn PredictionSource>,
    cache: QueryCache,
    options: SessionOptions,
    selection: SelectionState,
    game_id: Option<String>,
    player: Option<TrackedPlayer>,
    calculator_open: bool,
    active_keys: Vec<RequestKey>,
    logs: VecDeque<String>,
}

impl DashboardSession {
    pub fn new(
        source: Arc<dyn PredictionSource>,
        runner: impl JobRunner + 'static,
        options: SessionOptions,
    ) -> Self {
        Self {
            source,
            cache: QueryCache::new(runner),
            options,
            selection: SelectionState::new(),
            game_id: None,
            player: None,
            calculator_open: false,
            active_keys: Vec::new(),
            logs: VecDeque::with_capacity(MAX_LOGS),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let source: Arc<dyn PredictionSource> = match config.source {
            SourceKind::Http => Arc::new(HttpPredictionSource::new(config)?),
            SourceKind::Demo => Arc::new(DemoPredictionSource::new()),
        };
        let runner = RayonRunner::new(config.fetch_threads)?;
        let mut session = Self::new(source, runner, SessionOptions::from_config(config));
        session.push_log(match config.source {
            SourceKind::Http => format!("[INFO] Prediction service: {}", config.base_url),
            SourceKind::Demo => "[INFO] Prediction service: offline demo data".to_string(),
        });
        Ok(session)
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn selected_game_id(&self) -> Option<&str> {
        self.game_id.as_deref()
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn logs(&self) -> &VecDeque<String> {
        &self.logs
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    /// Commit finished fetches, then resolve every query the current selection needs.
    pub fn render(&mut self) -> DashboardView {
        let commits = self.cache.pump();
        self.log_commits(commits);
        self.active_keys.clear();

        let source = Arc::clone(&self.source);
        let games = self.query(
            RequestDescriptor::games_feed(),
            QueryOptions::default().stale_after(self.options.games_refresh),
            move || source.games().map(Payload::Games),
        );
        let game_list: Vec<Game> = games
            .value
            .as_deref()
            .and_then(Payload::as_games)
            .map(<[Game]>::to_vec)
            .unwrap_or_default();

        let selected = self
            .game_id
            .as_deref()
            .and_then(|id| game_list.iter().find(|g| g.game_id == id))
            .cloned();
        let game = selected.map(|game| self.render_game(game));

        DashboardView {
            games: game_list,
            games_state: games.state,
            selected_game_id: self.game_id.clone(),
            game,
        }
    }

    /// Render until nothing is in flight or `timeout` passes.
    pub fn settle(&mut self, timeout: Duration) -> DashboardView {
        let deadline = Instant::now() + timeout;
        loop {
            let view = self.render();
            let now = Instant::now();
            if self.cache.in_flight() == 0 || now >= deadline {
                return view;
            }
            let commits = self.cache.pump_wait(deadline - now);
            self.log_commits(commits);
        }
    }

    pub fn select_game(&mut self, game_id: &str) {
        if self.game_id.as_deref() == Some(game_id) {
            return;
        }
        self.game_id = Some(game_id.to_string());
        self.selection.excluded_home.clear();
        self.selection.excluded_away.clear();
        self.close_player();
    }

    pub fn clear_game(&mut self) {
        self.game_id = None;
        self.selection.excluded_home.clear();
        self.selection.excluded_away.clear();
        self.close_player();
    }

    pub fn exclude_player(&mut self, side: Side, player: &RosterPlayer) -> bool {
        if !self
            .selection
            .excluded_mut(side)
            .insert(player.id, player.full_name.clone())
        {
            return false;
        }
        if self.player.as_ref().is_some_and(|p| p.snapshot.player_id == player.id) {
            self.close_player();
        }
        self.push_log(format!(
            "[INFO] {} marked out ({})",
            player.full_name,
            side_label(side)
        ));
        true
    }

    pub fn restore_player(&mut self, side: Side, player_id: u32) -> bool {
        let removed = self.selection.excluded_mut(side).remove(player_id);
        if removed {
            self.push_log(format!("[INFO] Player {player_id} back in ({})", side_label(side)));
        }
        removed
    }

    /// Open the panel for a player from the current full-match projection.
    pub fn open_player(&mut self, player_id: u32) -> bool {
        let view = self.render();
        let found = view
            .game
            .as_ref()
            .and_then(|g| g.players.as_ref())
            .and_then(|full| full.find_player(player_id))
            .map(|(side, player)| (side, player.clone()));
        match found {
            Some((side, player)) => {
                self.open_player_with(player, side);
                true
            }
            None => false,
        }
    }

    pub fn open_player_with(&mut self, player: PlayerFullPrediction, side: Side) {
        self.player = Some(TrackedPlayer {
            snapshot: player,
            side,
        });
        self.selection.line_text.clear();
        self.selection.tab = ComparisonTab::RecentForm;
        self.calculator_open = false;
    }

    pub fn close_player(&mut self) {
        self.player = None;
        self.calculator_open = false;
    }

    pub fn set_stat(&mut self, stat: StatCategory) {
        self.selection.stat = stat;
        self.calculator_open = false;
    }

    pub fn set_line(&mut self, text: impl Into<String>) {
        self.selection.line_text = text.into();
    }

    pub fn set_tab(&mut self, tab: ComparisonTab) {
        self.selection.tab = tab;
    }

    /// Run the calculator for the open player at the typed line.
    pub fn analyze(&mut self) -> Result<(), QueryError> {
        let view = self.render();
        let Some(panel) = view.game.as_ref().and_then(|g| g.player.as_ref()) else {
            return Err(QueryError::NoPlayer);
        };
        let line = match self.selection.line() {
            Ok(line) => line,
            Err(err) => {
                self.push_log(format!("[WARN] Line rejected: {err}"));
                return Err(err.into());
            }
        };
        let Some(projection) = panel.view.projection_value else {
            self.push_log(format!(
                "[WARN] Projection for {} is still loading",
                panel.view.name
            ));
            return Err(QueryError::ProjectionPending);
        };

        let req = CalculatorRequest {
            player_id: panel.view.player_id,
            projection,
            line,
            stat: panel.view.stat,
        };
        let desc = RequestDescriptor::calculator_analysis(&req);
        let key = desc.key();
        let source = Arc::clone(&self.source);
        let name = panel.view.name.clone();
        self.cache.resolve(&desc, QueryOptions::default(), move || {
            source.calculator_analysis(&req).map(Payload::Calculator)
        });
        self.cache.refetch(&key);
        self.calculator_open = true;
        self.push_log(format!(
            "[INFO] Analyzing {name} {} at {line}",
            self.selection.stat.as_str()
        ));
        Ok(())
    }

    /// Mark every query behind the current view stale.
    pub fn refresh(&mut self) -> usize {
        let keys = std::mem::take(&mut self.active_keys);
        let marked = keys.iter().filter(|key| self.cache.invalidate(key)).count();
        self.active_keys = keys;
        self.push_log(format!("[INFO] Refreshing {marked} queries"));
        marked
    }

    fn render_game(&mut self, game: Game) -> GameView {
        let home_id = resolve_team_id(&game, Side::Home);
        let away_id = resolve_team_id(&game, Side::Away);

        let home_roster = self.roster(&home_id);
        let away_roster = self.roster(&away_id);

        let matchup = MatchupRequest::new(&home_id, &away_id, &self.selection);
        let source = Arc::clone(&self.source);
        let req = matchup.clone();
        let prediction = self.query(
            RequestDescriptor::match_prediction(&matchup),
            QueryOptions::default(),
            move || source.match_prediction(&req).map(Payload::MatchPrediction),
        );
        let source = Arc::clone(&self.source);
        let req = matchup.clone();
        let players = self.query(
            RequestDescriptor::full_match_prediction(&matchup),
            QueryOptions::default(),
            move || source.full_match_prediction(&req).map(Payload::FullMatchPrediction),
        );
        let source = Arc::clone(&self.source);
        let req = matchup.clone();
        let shooting = self.query(
            RequestDescriptor::shooting_splits(&matchup),
            QueryOptions::default().stale_after(self.options.shooting_stale),
            move || source.shooting_splits(&req).map(Payload::Shooting),
        );

        let prediction_value = prediction
            .value
            .as_deref()
            .and_then(Payload::as_match_prediction)
            .cloned();
        let players_value = players
            .value
            .as_deref()
            .and_then(Payload::as_full_match_prediction)
            .cloned();
        let shooting_value = shooting
            .value
            .as_deref()
            .and_then(Payload::as_shooting)
            .map(shooting_comparison);

        let player = self.render_player(
            &game,
            &home_id,
            &away_id,
            players_value.as_ref(),
            &players.state,
        );

        GameView {
            home_team_id: home_id,
            away_team_id: away_id,
            home_roster: roster_players(&home_roster),
            away_roster: roster_players(&away_roster),
            home_roster_state: home_roster.state,
            away_roster_state: away_roster.state,
            excluded_home: self.selection.excluded_home.iter().cloned().collect(),
            excluded_away: self.selection.excluded_away.iter().cloned().collect(),
            confidence: confidence_tier(
                prediction_value
                    .as_ref()
                    .and_then(|p| p.confidence_level.as_deref()),
            ),
            prediction: prediction_value,
            prediction_state: prediction.state,
            players: players_value,
            players_state: players.state,
            shooting: shooting_value,
            shooting_state: shooting.state,
            player,
            game,
        }
    }

    fn render_player(
        &mut self,
        game: &Game,
        home_id: &str,
        away_id: &str,
        players: Option<&FullMatchPrediction>,
        players_state: &QueryState,
    ) -> Option<PlayerPanel> {
        let tracked = self.player.as_mut()?;
        // Only the current matchup's projection is shown; the snapshot keeps identity.
        let found = players.and_then(|full| full.find_player(tracked.snapshot.player_id));
        let ready = found.is_some();
        if let Some((side, latest)) = found {
            tracked.snapshot = latest.clone();
            tracked.side = side;
        }
        let player = tracked.snapshot.clone();
        let side = tracked.side;
        let opponent = match side {
            Side::Home => away_id,
            Side::Away => home_id,
        }
        .to_string();

        let source = Arc::clone(&self.source);
        let (player_id, opponent_id) = (player.player_id, opponent.clone());
        let history = self.query(
            RequestDescriptor::player_history(player.player_id, &opponent),
            QueryOptions::default(),
            move || {
                source
                    .player_history(player_id, &opponent_id)
                    .map(Payload::PlayerHistory)
            },
        );

        let stat = self.selection.stat;
        let projection = projection_value(&player, stat);
        let auto = self.options.auto_analyze;
        let calculator = match parse_line(&self.selection.line_text) {
            Ok(line) if ready => {
                let req = CalculatorRequest {
                    player_id: player.player_id,
                    projection,
                    line,
                    stat,
                };
                let options = if auto {
                    QueryOptions::default().debounce(self.options.line_debounce)
                } else {
                    QueryOptions::default()
                };
                let source = Arc::clone(&self.source);
                Some(self.query(
                    RequestDescriptor::calculator_analysis(&req).enabled(auto),
                    options,
                    move || source.calculator_analysis(&req).map(Payload::Calculator),
                ))
            }
            _ => None,
        };

        let calculator_open = self.calculator_open || auto;
        let calculator_value = calculator
            .as_ref()
            .filter(|_| calculator_open)
            .and_then(|c| c.value.as_deref())
            .and_then(Payload::as_calculator);
        let history_value = history.value.as_deref().and_then(Payload::as_player_history);

        let mut view = derive_player_view(
            &self.selection,
            &player,
            Some(game.home_team.as_str()),
            history_value,
            calculator_value,
        );
        if !ready {
            view = view.without_projection();
        }
        let line_error = match self.selection.line() {
            Err(LineError::Empty) | Ok(_) => None,
            Err(err) => Some(err),
        };

        Some(PlayerPanel {
            view,
            side,
            opponent_team_id: opponent,
            projection: players_state.clone(),
            history: history.state,
            calculator: calculator.map(|c| c.state).unwrap_or_else(QueryState::idle),
            calculator_open,
            line_error,
        })
    }

    fn roster(&mut self, team_id: &str) -> Resolved {
        let source = Arc::clone(&self.source);
        let id = team_id.to_string();
        self.query(
            RequestDescriptor::team_roster(team_id),
            QueryOptions::default(),
            move || source.team_roster(&id).map(Payload::Roster),
        )
    }

    fn query<F>(&mut self, desc: RequestDescriptor, options: QueryOptions, fetcher: F) -> Resolved
    where
        F: Fn() -> Result<Payload> + Send + Sync + 'static,
    {
        self.active_keys.push(desc.key());
        let entry = self.cache.resolve(&desc, options, fetcher);
        Resolved {
            state: QueryState::of(entry),
            value: entry.current().cloned(),
        }
    }

    fn log_commits(&mut self, commits: Vec<Commit>) {
        for commit in commits {
            match commit {
                Commit::Resolved(key) => {
                    self.push_log(format!("[INFO] {} ready", key.kind_prefix()));
                }
                Commit::Failed(key, err) => {
                    self.push_log(format!("[WARN] {} failed: {err}", key.kind_prefix()));
                }
                Commit::Discarded(key) => {
                    self.push_log(format!("[INFO] Dropped late response for {key}"));
                }
            }
        }
    }
}

fn roster_players(resolved: &Resolved) -> Vec<RosterPlayer> {
    resolved
        .value
        .as_deref()
        .and_then(Payload::as_roster)
        .map(<[RosterPlayer]>::to_vec)
        .unwrap_or_default()
}

fn side_label(side: Side) -> &'static str {
    match side {
        Side::Home => "home",
        Side::Away => "away",
    }
}
