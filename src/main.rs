use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use courtside::config::{self, Config};
use courtside::derive::{
    ConfidenceTier, FatigueTone, Recommendation, ShootingBar, filter_games, format_edge,
    group_games_by_date, search_roster,
};
use courtside::error::QueryError;
use courtside::query_cache::QueryStatus;
use courtside::session::{DashboardSession, DashboardView, GameView, PlayerPanel, QueryState};
use courtside::state::{ComparisonTab, Game, RosterPlayer, Side, StatLine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Games,
    Game,
    Player,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    HomeRoster,
    AwayRoster,
    Players,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::HomeRoster => Focus::AwayRoster,
            Focus::AwayRoster => Focus::Players,
            Focus::Players => Focus::HomeRoster,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Normal,
    Search,
    Line,
}

struct App {
    session: DashboardSession,
    view: DashboardView,
    screen: Screen,
    focus: Focus,
    input: InputMode,
    search: String,
    roster_search: String,
    selected_game: usize,
    cursor: usize,
    help_overlay: bool,
    should_quit: bool,
}

impl App {
    fn new(mut session: DashboardSession) -> Self {
        let view = session.render();
        Self {
            session,
            view,
            screen: Screen::Games,
            focus: Focus::HomeRoster,
            input: InputMode::Normal,
            search: String::new(),
            roster_search: String::new(),
            selected_game: 0,
            cursor: 0,
            help_overlay: false,
            should_quit: false,
        }
    }

    fn visible_games(&self) -> Vec<Game> {
        let filtered = filter_games(&self.view.games, &self.search);
        group_games_by_date(&filtered)
            .into_values()
            .flatten()
            .cloned()
            .collect()
    }

    /// Roster rows for one side, narrowed by the player search.
    fn visible_roster(&self, side: Side) -> Vec<RosterPlayer> {
        let Some(game) = self.view.game.as_ref() else {
            return Vec::new();
        };
        let roster = match side {
            Side::Home => &game.home_roster,
            Side::Away => &game.away_roster,
        };
        search_roster(roster, &self.roster_search)
            .into_iter()
            .cloned()
            .collect()
    }

    fn on_key(&mut self, key: KeyEvent) {
        match self.input {
            InputMode::Search => return self.on_search_key(key),
            InputMode::Line => return self.on_line_key(key),
            InputMode::Normal => {}
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.help_overlay = !self.help_overlay,
            KeyCode::Char('r') => {
                self.session.refresh();
            }
            _ => match self.screen {
                Screen::Games => self.on_games_key(key),
                Screen::Game => self.on_game_key(key),
                Screen::Player => self.on_player_key(key),
            },
        }
    }

    fn on_games_key(&mut self, key: KeyEvent) {
        let total = self.visible_games().len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if total > 0 {
                    self.selected_game = (self.selected_game + 1).min(total - 1);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected_game = self.selected_game.saturating_sub(1);
            }
            KeyCode::Char('/') => self.input = InputMode::Search,
            KeyCode::Enter | KeyCode::Char('d') => {
                if let Some(game) = self.visible_games().get(self.selected_game) {
                    self.session.select_game(&game.game_id);
                    self.screen = Screen::Game;
                    self.focus = Focus::HomeRoster;
                    self.cursor = 0;
                    self.roster_search.clear();
                }
            }
            _ => {}
        }
    }

    fn on_search_key(&mut self, key: KeyEvent) {
        if self.screen != Screen::Games {
            return self.on_roster_search_key(key);
        }
        match key.code {
            KeyCode::Esc | KeyCode::Enter => self.input = InputMode::Normal,
            KeyCode::Backspace => {
                self.search.pop();
                self.selected_game = 0;
            }
            KeyCode::Char(c) => {
                self.search.push(c);
                self.selected_game = 0;
            }
            _ => {}
        }
    }

    fn on_roster_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => self.input = InputMode::Normal,
            KeyCode::Backspace => {
                self.roster_search.pop();
                self.cursor = 0;
            }
            KeyCode::Char(c) => {
                self.roster_search.push(c);
                self.cursor = 0;
            }
            _ => {}
        }
    }

    fn on_game_key(&mut self, key: KeyEvent) {
        let len = self.focus_len();
        match key.code {
            KeyCode::Char('b') | KeyCode::Esc => {
                self.session.clear_game();
                self.screen = Screen::Games;
            }
            KeyCode::Tab | KeyCode::Char('l') => {
                self.focus = self.focus.next();
                self.cursor = 0;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if len > 0 {
                    self.cursor = (self.cursor + 1).min(len - 1);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Char('x') => self.toggle_exclusion(),
            KeyCode::Char('/') => {
                if self.focus == Focus::Players {
                    self.focus = Focus::HomeRoster;
                }
                self.input = InputMode::Search;
            }
            KeyCode::Enter => {
                if self.focus == Focus::Players
                    && let Some(id) = self.focused_player_id()
                    && self.session.open_player(id)
                {
                    self.screen = Screen::Player;
                }
            }
            _ => {}
        }
    }

    fn on_player_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('b') | KeyCode::Esc => {
                self.session.close_player();
                self.screen = Screen::Game;
            }
            KeyCode::Char('s') => {
                let next = self.session.selection().stat.next();
                self.session.set_stat(next);
            }
            KeyCode::Char('t') => {
                let tab = self.session.selection().tab.toggle();
                self.session.set_tab(tab);
            }
            KeyCode::Char('e') => self.input = InputMode::Line,
            KeyCode::Char('a') => self.analyze(),
            _ => {}
        }
    }

    fn on_line_key(&mut self, key: KeyEvent) {
        let mut line = self.session.selection().line_text.clone();
        match key.code {
            KeyCode::Esc => self.input = InputMode::Normal,
            KeyCode::Enter => {
                self.input = InputMode::Normal;
                self.analyze();
            }
            KeyCode::Backspace => {
                line.pop();
                self.session.set_line(line);
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => {
                line.push(c);
                self.session.set_line(line);
            }
            _ => {}
        }
    }

    fn analyze(&mut self) {
        match self.session.analyze() {
            // Already in the console.
            Ok(()) | Err(QueryError::MalformedInput(_) | QueryError::ProjectionPending) => {}
            Err(err) => self.session.push_log(format!("[WARN] Analyze: {err}")),
        }
    }

    fn focus_len(&self) -> usize {
        let Some(game) = self.view.game.as_ref() else {
            return 0;
        };
        match self.focus {
            Focus::HomeRoster => self.visible_roster(Side::Home).len(),
            Focus::AwayRoster => self.visible_roster(Side::Away).len(),
            Focus::Players => game
                .players
                .as_ref()
                .map(|p| p.home_players.len() + p.away_players.len())
                .unwrap_or(0),
        }
    }

    fn focused_player_id(&self) -> Option<u32> {
        let players = self.view.game.as_ref()?.players.as_ref()?;
        players
            .home_players
            .iter()
            .chain(players.away_players.iter())
            .nth(self.cursor)
            .map(|p| p.player_id)
    }

    fn toggle_exclusion(&mut self) {
        let side = match self.focus {
            Focus::HomeRoster => Side::Home,
            Focus::AwayRoster => Side::Away,
            Focus::Players => return,
        };
        let Some(player) = self.visible_roster(side).into_iter().nth(self.cursor) else {
            return;
        };
        if self.session.selection().excluded(side).contains(player.id) {
            self.session.restore_player(side, player.id);
        } else {
            self.session.exclude_player(side, &player);
        }
    }
}

fn main() -> Result<()> {
    config::load_dotenv();
    let config = Config::from_env();
    let session = DashboardSession::from_config(&config)?;

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App::new(session);
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        app.view = app.session.render();
        if app.screen == Screen::Player
            && app.view.game.as_ref().is_none_or(|g| g.player.is_none())
        {
            // The player was excluded or the game went away.
            app.screen = Screen::Game;
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(app)).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.screen {
        Screen::Games => render_games(frame, chunks[1], app),
        Screen::Game | Screen::Player => match app.view.game.as_ref() {
            Some(game) => render_game(frame, chunks[1], app, game),
            None => {
                let waiting = Paragraph::new("Loading game...")
                    .style(Style::default().fg(Color::DarkGray));
                frame.render_widget(waiting, chunks[1]);
            }
        },
    }

    let console = Paragraph::new(console_text(app))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(app)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);

    if app.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(app: &App) -> String {
    let stats = app.session.stats();
    let title = match (app.screen, app.view.game.as_ref()) {
        (Screen::Games, _) | (_, None) => "COURTSIDE | Next 48h".to_string(),
        (_, Some(game)) => format!(
            "COURTSIDE | {} @ {}",
            game.game.away_team, game.game.home_team
        ),
    };
    format!(
        "{title}   [fetches {} | cached hits {} | dropped {}]",
        stats.dispatches, stats.hits, stats.discarded
    )
}

fn footer_text(app: &App) -> String {
    match (app.input, app.screen) {
        (InputMode::Search, Screen::Games) => {
            format!("Search: {}_  (Enter/Esc done)", app.search)
        }
        (InputMode::Search, _) => {
            format!("Find player: {}_  (Enter/Esc done)", app.roster_search)
        }
        (InputMode::Line, _) => format!(
            "Line: {}_  (Enter analyze | Esc done)",
            app.session.selection().line_text
        ),
        (_, Screen::Games) => "j/k Move | Enter Open | / Search | r Refresh | ? Help | q Quit".to_string(),
        (_, Screen::Game) => {
            "Tab Focus | j/k Move | x Out/In | / Find | Enter Player | b Back | r Refresh | q Quit"
                .to_string()
        }
        (_, Screen::Player) => {
            "s Stat | e Line | a Analyze | t Form/H2H | b Back | r Refresh | q Quit".to_string()
        }
    }
}

fn render_games(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().title("Games").borders(Borders::ALL);
    let games = app.visible_games();
    if games.is_empty() {
        let text = match &app.view.games_state {
            s if s.loading => "Loading games...".to_string(),
            QueryState {
                error: Some(err), ..
            } => format!("Games unavailable: {err}"),
            _ if !app.search.is_empty() => format!("No team matches \"{}\"", app.search),
            _ => "No games in the next 48 hours".to_string(),
        };
        frame.render_widget(Paragraph::new(text).block(block), area);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();
    let mut last_date = String::new();
    for (idx, game) in games.iter().enumerate() {
        let date = game.game_date.get(..10).unwrap_or(game.game_date.as_str()).to_string();
        if date != last_date {
            lines.push(Line::styled(
                date.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            last_date = date;
        }
        let selected = idx == app.selected_game;
        let prefix = if selected { "> " } else { "  " };
        let live = if game.is_live { " LIVE" } else { "" };
        let text = format!(
            "{prefix}{} {} @ {}{live}",
            game.game_time.as_deref().unwrap_or("--:--"),
            game.away_team,
            game.home_team
        );
        let style = if selected {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        lines.push(Line::styled(text, style));
    }
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_game(frame: &mut Frame, area: Rect, app: &App, game: &GameView) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(30),
            Constraint::Min(40),
            Constraint::Length(36),
        ])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(columns[0]);
    render_roster(frame, left[0], app, game, Side::Home);
    render_roster(frame, left[1], app, game, Side::Away);

    if app.screen == Screen::Player
        && let Some(panel) = game.player.as_ref()
    {
        render_player(frame, columns[1], app, panel);
    } else {
        let middle = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(9), Constraint::Min(1)])
            .split(columns[1]);
        let prediction = Paragraph::new(prediction_text(game))
            .block(Block::default().title("Match Prediction").borders(Borders::ALL));
        frame.render_widget(prediction, middle[0]);
        let shooting = Paragraph::new(shooting_text(game))
            .block(Block::default().title("Shooting Battle").borders(Borders::ALL));
        frame.render_widget(shooting, middle[1]);
    }

    let players = Paragraph::new(players_lines(app, game)).block(
        Block::default()
            .title("Projections")
            .borders(Borders::ALL)
            .border_style(focus_style(app.focus == Focus::Players)),
    );
    frame.render_widget(players, columns[2]);
}

fn render_roster(frame: &mut Frame, area: Rect, app: &App, game: &GameView, side: Side) {
    let (mut title, state, focus) = match side {
        Side::Home => (
            format!("Home {}", game.home_team_id),
            &game.home_roster_state,
            Focus::HomeRoster,
        ),
        Side::Away => (
            format!("Away {}", game.away_team_id),
            &game.away_roster_state,
            Focus::AwayRoster,
        ),
    };
    let roster = app.visible_roster(side);
    if !app.roster_search.trim().is_empty() {
        title = format!("{title} [{}]", app.roster_search.trim());
    }
    let focused = app.focus == focus;
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(focus_style(focused));

    if roster.is_empty() {
        let text = if app.roster_search.trim().is_empty() {
            status_text(state, "No roster")
        } else {
            format!("No player matches \"{}\"", app.roster_search.trim())
        };
        frame.render_widget(Paragraph::new(text).block(block), area);
        return;
    }

    let excluded = app.session.selection().excluded(side);
    let lines: Vec<Line> = roster
        .iter()
        .enumerate()
        .map(|(idx, player)| {
            let cursor = if focused && idx == app.cursor { ">" } else { " " };
            let out = excluded.contains(player.id);
            let text = format!(
                "{cursor}{} {} {}",
                if out { "x" } else { " " },
                player.full_name,
                player.position.as_deref().unwrap_or("")
            );
            let style = if out {
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default()
            };
            Line::styled(text, style)
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn prediction_text(game: &GameView) -> String {
    let Some(pred) = game.prediction.as_ref() else {
        return status_text(&game.prediction_state, "No prediction");
    };
    let mut lines = vec![
        format!("Winner: {}", pred.winner.as_deref().unwrap_or("?")),
        format!(
            "Win %: {} {:.0}% | {} {:.0}%",
            game.home_team_id,
            pred.home_win_probability.unwrap_or(0.0) * 100.0,
            game.away_team_id,
            pred.away_win_probability.unwrap_or(0.0) * 100.0
        ),
        format!(
            "Score: {:.0} - {:.0}",
            pred.predicted_home_score.unwrap_or(0.0),
            pred.predicted_away_score.unwrap_or(0.0)
        ),
        format!(
            "Confidence: {} ({})",
            pred.confidence_level.as_deref().unwrap_or("?"),
            confidence_label(game.confidence)
        ),
    ];
    for factor in pred.home_fatigue_factors.iter().take(2) {
        lines.push(format!("{} fatigue: {factor}", game.home_team_id));
    }
    for factor in pred.away_fatigue_factors.iter().take(2) {
        lines.push(format!("{} fatigue: {factor}", game.away_team_id));
    }
    if game.prediction_state.status == QueryStatus::Pending {
        lines.push("(updating)".to_string());
    }
    lines.join("\n")
}

fn shooting_text(game: &GameView) -> String {
    let Some(shooting) = game.shooting.as_ref() else {
        return status_text(&game.shooting_state, "No shooting data");
    };
    let mut lines = vec![shooting.pace_context.clone(), String::new()];
    lines.extend(shooting_bar_lines("2PT", shooting, &shooting.two_point));
    lines.extend(shooting_bar_lines("3PT", shooting, &shooting.three_point));
    lines.push(format!(
        "Total FG: {} {:.1} | {} {:.1}",
        shooting.home_team, shooting.home_total, shooting.away_team, shooting.away_total
    ));
    if let Some(impact) = shooting.fatigue_impact.as_deref() {
        lines.push(format!("Fatigue impact: {impact}"));
    }
    lines.join("\n")
}

fn shooting_bar_lines(
    label: &str,
    shooting: &courtside::derive::ShootingComparison,
    bar: &ShootingBar,
) -> Vec<String> {
    let width = 20.0;
    let draw = |pct: f64| "█".repeat((pct / 100.0 * width).round() as usize);
    let mark = |wins: bool| if wins { " *" } else { "" };
    vec![
        format!(
            "{label} {:<4} {:<20} {:.1} ({}){}",
            shooting.home_team,
            draw(bar.home_pct),
            bar.home_value,
            bar.home_range,
            mark(bar.home_wins)
        ),
        format!(
            "{label} {:<4} {:<20} {:.1} ({}){}",
            shooting.away_team,
            draw(bar.away_pct),
            bar.away_value,
            bar.away_range,
            mark(!bar.home_wins)
        ),
    ]
}

fn players_lines(app: &App, game: &GameView) -> Vec<Line<'static>> {
    let Some(players) = game.players.as_ref() else {
        return vec![Line::raw(status_text(&game.players_state, "No projections"))];
    };
    let focused = app.focus == Focus::Players;
    players
        .home_players
        .iter()
        .map(|p| (game.home_team_id.as_str(), p))
        .chain(players.away_players.iter().map(|p| (game.away_team_id.as_str(), p)))
        .enumerate()
        .map(|(idx, (team, p))| {
            let cursor = if focused && idx == app.cursor { ">" } else { " " };
            let stats = &p.predicted_stats;
            Line::raw(format!(
                "{cursor}{team} {:<18} {:>4.1}p {:>4.1}r {:>4.1}a",
                p.player,
                stats.PTS.unwrap_or(0.0),
                stats.REB.unwrap_or(0.0),
                stats.AST.unwrap_or(0.0)
            ))
        })
        .collect()
}

fn render_player(frame: &mut Frame, area: Rect, app: &App, panel: &PlayerPanel) {
    let view = &panel.view;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(7),
            Constraint::Min(1),
        ])
        .split(area);

    let venue = if view.player_is_home { "home" } else { "away" };
    let mut top = vec![
        format!(
            "{} ({} {}) vs {} | {venue}",
            view.name,
            view.team,
            view.position.as_deref().unwrap_or("-"),
            panel.opponent_team_id
        ),
        format!(
            "Stat: {} | Projection: {} | Minutes: {}",
            view.stat.as_str(),
            match view.projection_value {
                Some(value) => format!("{value:.1}"),
                None if panel.projection.loading => "loading...".to_string(),
                None => "-".to_string(),
            },
            view.projected_minutes
                .map(|m| format!("{m:.1}"))
                .unwrap_or_else(|| "-".to_string())
        ),
        format!(
            "Line: {} | Edge: {}",
            if app.session.selection().line_text.is_empty() {
                "-"
            } else {
                app.session.selection().line_text.as_str()
            },
            view.edge.map(format_edge).unwrap_or_else(|| "-".to_string())
        ),
        format!(
            "Home split: {} | Away split: {}",
            opt_num(view.home_split),
            opt_num(view.away_split)
        ),
    ];
    if let Some(err) = panel.line_error {
        top.push(format!("! {err}"));
    }
    if let Some(fatigue) = view.fatigue.as_ref() {
        top.push(format!(
            "Fatigue: {} ({:.0} min last game) [{}]",
            fatigue.status,
            fatigue.last_minutes,
            fatigue_label(fatigue.tone)
        ));
    }
    let header = Paragraph::new(top.join("\n"))
        .block(Block::default().title("Player").borders(Borders::ALL));
    frame.render_widget(header, rows[0]);

    let (title, body) = match view.tab {
        ComparisonTab::RecentForm => (
            "Recent Form [t]",
            stat_line_text(view.recent_form.as_ref(), &panel.history, "No recent games"),
        ),
        ComparisonTab::HeadToHead => (
            "Head to Head [t]",
            stat_line_text(view.head_to_head.as_ref(), &panel.history, "No games vs this opponent"),
        ),
    };
    let mut body = body;
    if let Some(ctx) = view.matchup_context.as_deref() {
        body.push('\n');
        body.push_str(ctx);
    }
    frame.render_widget(
        Paragraph::new(body).block(Block::default().title(title).borders(Borders::ALL)),
        rows[1],
    );

    let calc_text = match view.calculator.as_ref() {
        Some(calc) => {
            let mut lines = vec![
                format!(
                    "Over {:.1}% | Under {:.1}%",
                    calc.probability_over * 100.0,
                    calc.probability_under * 100.0
                ),
                format!("Call: {}", recommendation_label(calc.recommendation)),
            ];
            if let Some(advice) = calc.advice.as_deref() {
                lines.push(advice.to_string());
            }
            if let Some(confidence) = calc.confidence.as_deref() {
                lines.push(format!("Confidence: {confidence}"));
            }
            lines.join("\n")
        }
        None if panel.calculator.loading => "Analyzing...".to_string(),
        None => match panel.calculator.error.as_ref() {
            Some(err) => format!("Analysis failed: {err}"),
            None => "Enter a line (e) and analyze (a)".to_string(),
        },
    };
    let style = view
        .recommendation
        .map(|r| Style::default().fg(recommendation_color(r)))
        .unwrap_or_default();
    frame.render_widget(
        Paragraph::new(calc_text)
            .style(style)
            .block(Block::default().title("Calculator").borders(Borders::ALL)),
        rows[2],
    );
}

fn stat_line_text(line: Option<&StatLine>, state: &QueryState, empty: &str) -> String {
    let Some(line) = line else {
        return status_text(state, empty);
    };
    format!(
        "GP {} | PTS {} | REB {} | AST {} | PRA {}",
        opt_num(line.GP),
        opt_num(line.PTS),
        opt_num(line.REB),
        opt_num(line.AST),
        opt_num(line.PRA)
    )
}

fn status_text(state: &QueryState, empty: &str) -> String {
    if state.loading {
        return "Loading...".to_string();
    }
    match state.error.as_ref() {
        Some(err) => format!("Unavailable: {err}"),
        None => empty.to_string(),
    }
}

fn opt_num(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| "-".to_string())
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn confidence_label(tier: ConfidenceTier) -> &'static str {
    match tier {
        ConfidenceTier::Tight => "TIGHT",
        ConfidenceTier::Solid => "SOLID",
        ConfidenceTier::Blowout => "BLOWOUT",
        ConfidenceTier::Unknown => "?",
    }
}

fn fatigue_label(tone: FatigueTone) -> &'static str {
    match tone {
        FatigueTone::Fresh => "FRESH",
        FatigueTone::Tired => "TIRED",
        FatigueTone::Neutral => "OK",
    }
}

fn recommendation_label(rec: Recommendation) -> &'static str {
    match rec {
        Recommendation::Over => "OVER",
        Recommendation::Under => "UNDER",
        Recommendation::Neutral => "NEUTRAL",
    }
}

fn recommendation_color(rec: Recommendation) -> Color {
    match rec {
        Recommendation::Over => Color::Green,
        Recommendation::Under => Color::Red,
        Recommendation::Neutral => Color::Yellow,
    }
}

fn console_text(app: &App) -> String {
    let logs = app.session.logs();
    if logs.is_empty() {
        return "No alerts yet".to_string();
    }
    let start = logs.len().saturating_sub(3);
    logs.iter()
        .skip(start)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Courtside - Help",
        "",
        "Games:",
        "  j/k or ↑/↓   Move",
        "  Enter / d    Open game",
        "  /            Search teams",
        "",
        "Game:",
        "  Tab          Cycle home / away / projections",
        "  x            Mark player out / back in",
        "  /            Find player in rosters",
        "  Enter        Open player (projections)",
        "",
        "Player:",
        "  s            Cycle PTS / REB / AST / PRA",
        "  e            Edit bookmaker line",
        "  a            Analyze line",
        "  t            Recent form / head to head",
        "",
        "  r            Refresh   ?  Help   q  Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text).block(Block::default().title("Help").borders(Borders::ALL));
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crossterm::event::KeyModifiers;

    use courtside::demo_feed::DemoPredictionSource;
    use courtside::query_cache::InlineRunner;
    use courtside::session::SessionOptions;

    use super::*;

    const WAIT: Duration = Duration::from_secs(2);

    fn press(app: &mut App, code: KeyCode) {
        app.on_key(KeyEvent::new(code, KeyModifiers::NONE));
        app.view = app.session.settle(WAIT);
    }

    fn demo_app() -> App {
        let source: Arc<dyn courtside::source::PredictionSource> =
            Arc::new(DemoPredictionSource::steady());
        let mut session = DashboardSession::new(source, InlineRunner, SessionOptions::default());
        session.settle(WAIT);
        let mut app = App::new(session);
        app.view = app.session.settle(WAIT);
        app
    }

    #[test]
    fn roster_search_narrows_rows_and_exclusion_follows_them() {
        let mut app = demo_app();
        app.session.select_game("demo-bos-lal");
        app.screen = Screen::Game;
        app.view = app.session.settle(WAIT);
        let target = app.visible_roster(Side::Home)[2].clone();

        press(&mut app, KeyCode::Char('/'));
        for c in target.full_name.to_uppercase().chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);

        let rows = app.visible_roster(Side::Home);
        assert!(rows.len() < app.view.game.as_ref().map_or(0, |g| g.home_roster.len()));
        app.cursor = rows.iter().position(|p| p.id == target.id).expect("match shown");
        press(&mut app, KeyCode::Char('x'));
        assert!(app.session.selection().excluded(Side::Home).contains(target.id));
    }

    #[test]
    fn analyze_without_player_reaches_the_console() {
        let mut app = demo_app();
        app.analyze();
        assert!(
            app.session
                .logs()
                .back()
                .is_some_and(|l| l.starts_with("[WARN] Analyze: no player selected"))
        );
    }
}
