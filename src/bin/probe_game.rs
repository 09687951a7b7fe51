use std::time::Duration;

use anyhow::{Result, anyhow};

use courtside::config::{self, Config};
use courtside::derive::format_edge;
use courtside::session::DashboardSession;
use courtside::state::StatCategory;

fn main() -> Result<()> {
    config::load_dotenv();
    let config = Config::from_env();
    let wait = Duration::from_secs(
        std::env::var("PROBE_WAIT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(15)
            .clamp(1, 120),
    );
    let mut args = std::env::args().skip(1);
    let game_filter = args.next();
    let line = args.next();

    let mut session = DashboardSession::from_config(&config)?;
    let view = session.settle(wait);
    if view.games.is_empty() {
        print_logs(&session);
        return Err(anyhow!("no games available"));
    }
    println!("Games ({}):", view.games.len());
    for game in &view.games {
        println!(
            "  {} {} {} @ {}",
            game.game_id, game.game_date, game.away_team, game.home_team
        );
    }

    let game = match game_filter.as_deref() {
        Some(filter) => view
            .games
            .iter()
            .find(|g| {
                g.game_id == filter
                    || g.home_team.to_lowercase().contains(&filter.to_lowercase())
                    || g.away_team.to_lowercase().contains(&filter.to_lowercase())
            })
            .ok_or_else(|| anyhow!("no game matches {filter}"))?,
        None => &view.games[0],
    };
    println!("\nProbing {} @ {}", game.away_team, game.home_team);
    session.select_game(&game.game_id);
    let view = session.settle(wait);
    let Some(detail) = view.game.as_ref() else {
        print_logs(&session);
        return Err(anyhow!("selected game vanished from the feed"));
    };

    if let Some(pred) = detail.prediction.as_ref() {
        println!(
            "Prediction: winner={} home={:.1}% away={:.1}% score={:.0}-{:.0} confidence={}",
            pred.winner.as_deref().unwrap_or("?"),
            pred.home_win_probability.unwrap_or(0.0) * 100.0,
            pred.away_win_probability.unwrap_or(0.0) * 100.0,
            pred.predicted_home_score.unwrap_or(0.0),
            pred.predicted_away_score.unwrap_or(0.0),
            pred.confidence_level.as_deref().unwrap_or("?")
        );
    }
    if let Some(shooting) = detail.shooting.as_ref() {
        println!(
            "Shooting: {} | 2PT {:.1} vs {:.1} | 3PT {:.1} vs {:.1}",
            shooting.pace_context,
            shooting.two_point.home_value,
            shooting.two_point.away_value,
            shooting.three_point.home_value,
            shooting.three_point.away_value
        );
    }

    let Some(top) = detail
        .players
        .as_ref()
        .and_then(|p| p.home_players.first())
        .map(|p| p.player_id)
    else {
        print_logs(&session);
        return Ok(());
    };
    session.open_player(top);
    session.set_stat(StatCategory::PTS);
    let view = session.settle(wait);
    let projection = view
        .game
        .as_ref()
        .and_then(|g| g.player.as_ref())
        .and_then(|p| p.view.projection_value)
        .unwrap_or(0.0);
    // Without an explicit line, probe half a point under the projection.
    let line = line.unwrap_or_else(|| format!("{:.1}", (projection - 0.5).max(0.5)));
    session.set_line(line);
    session.analyze()?;
    let view = session.settle(wait);

    if let Some(panel) = view.game.as_ref().and_then(|g| g.player.as_ref()) {
        let pv = &panel.view;
        println!(
            "Player: {} {} proj={} edge={} recent={:?} h2h={:?} home={:?} away={:?}",
            pv.name,
            pv.stat.as_str(),
            pv.projection_value
                .map(|v| format!("{v:.1}"))
                .unwrap_or_else(|| "-".to_string()),
            pv.edge.map(format_edge).unwrap_or_else(|| "-".to_string()),
            pv.recent_form_average,
            pv.head_to_head_average,
            pv.home_split,
            pv.away_split
        );
        if let Some(calc) = pv.calculator.as_ref() {
            println!(
                "Calculator: over={:.1}% under={:.1}% call={:?} advice={}",
                calc.probability_over * 100.0,
                calc.probability_under * 100.0,
                calc.recommendation,
                calc.advice.as_deref().unwrap_or("-")
            );
        }
    }

    let stats = session.stats();
    println!(
        "Cache: {} entries, {} fetches, {} hits, {} dropped, {} failures",
        session.cache().len(),
        stats.dispatches,
        stats.hits,
        stats.discarded,
        stats.failures
    );
    print_logs(&session);
    Ok(())
}

fn print_logs(session: &DashboardSession) {
    for line in session.logs() {
        println!("{line}");
    }
}
