//! Terminal demo: drives a scripted two-player series end to end so
//! the engine can be exercised without a network layer.
//!
//! Mirrors the reference crate's terminal interface in spirit — a
//! colored, narrated walkthrough — but there is no interactive input
//! here: the Swap 2 dialogue and game results are scripted so the
//! whole series lifecycle (opening, scoring, a forfeit, a rematch) is
//! visible in a single run.

use std::sync::Arc;

use colored::Colorize;
use uuid::Uuid;

use swap2_arena::collaborators::{
    InMemoryPlayerDirectory, InMemorySeriesStore, ManualTimeProvider, TimeProvider,
};
use swap2_arena::disconnect::DisconnectHandler;
use swap2_arena::series::{RematchOutcome, SeriesManager};
use swap2_arena::swap2::{StoneChoice, Swap2Manager};

fn print_header(title: &str) {
    println!();
    println!("{}", "═".repeat(60).yellow());
    println!("  {}", title.yellow().bold());
    println!("{}", "═".repeat(60).yellow());
}

fn print_swap2_opening(series_mgr: &SeriesManager, series_id: Uuid, p1: Uuid, p2: Uuid) {
    println!("{}", "-- Swap 2 opening --".cyan().bold());
    series_mgr.place_opening_stone(series_id, p1, 7, 7).unwrap();
    series_mgr.place_opening_stone(series_id, p1, 7, 8).unwrap();
    let state = series_mgr
        .place_opening_stone(series_id, p1, 8, 7)
        .unwrap();
    println!(
        "  {} placed 3 opening stones; {} to choose a color",
        "P1".green(),
        "P2".blue()
    );
    debug_assert_eq!(state.active_player_id, p2);

    let state = series_mgr
        .make_opening_choice(series_id, p2, StoneChoice::Black)
        .unwrap();
    let assignments = Swap2Manager::get_final_assignments(&state).unwrap();
    println!(
        "  {} chose {} — {} is Black, {} is White, first mover is {}",
        "P2".blue(),
        "black".bold(),
        if assignments.black_player_id == p1 { "P1" } else { "P2" },
        if assignments.white_player_id == p1 { "P1" } else { "P2" },
        if assignments.first_mover == p1 { "P1" } else { "P2" }
    );

    let series = series_mgr.get_series_state(series_id).unwrap().series;
    println!(
        "  sides recorded: P1={:?}, P2={:?}",
        series.player1_side.unwrap(),
        series.player2_side.unwrap()
    );
}

/// Runs a scripted demo series: create, open game 1's opening, win two
/// games, then run the rematch handshake.
pub fn run_demo() {
    print_header("Swap2 Arena — scripted demo series");

    // A manual clock, not a real one: the scripted disconnect below
    // needs to cross `TIMEOUT_SECONDS` deterministically and instantly,
    // the same way the test suite drives it, rather than waiting on a
    // real wall-clock minute.
    let manual_time = Arc::new(ManualTimeProvider::new(1_000_000));
    let time: Arc<dyn TimeProvider> = manual_time.clone();
    let swap2 = Arc::new(Swap2Manager::new(time.clone()));
    let players = Arc::new(InMemoryPlayerDirectory::new());

    let p1 = Uuid::new_v4();
    let p2 = Uuid::new_v4();
    players.register(p1, 1500, "Gold");
    players.register(p2, 1420, "Silver");

    let store = Arc::new(InMemorySeriesStore::new());
    let series_mgr = Arc::new(SeriesManager::new(
        swap2.clone(),
        players,
        store.clone(),
        store,
        time.clone(),
    ));
    let disconnect_handler = DisconnectHandler::new(series_mgr.clone(), time.clone());

    let series = series_mgr.create_series(p1, p2).unwrap();
    println!(
        "Created series {} between {} (1500 MP) and {} (1420 MP)",
        series.id.to_string().dimmed(),
        "P1".green(),
        "P2".blue()
    );

    print_swap2_opening(&series_mgr, series.id, p1, p2);

    print_header("Game 1");
    let outcome = series_mgr
        .end_game(series.id, Uuid::new_v4(), p1, 340)
        .unwrap();
    println!(
        "  {} wins game 1. Score: {}-{}",
        "P1".green(),
        outcome.series.player1_wins,
        outcome.series.player2_wins
    );
    print_swap2_opening(&series_mgr, series.id, p1, p2);

    print_header("Game 2 — disconnect and forfeit");
    disconnect_handler.handle_disconnect(series.id, p2);
    println!(
        "  {} disconnected. Watchdog armed for {} seconds.",
        "P2".blue(),
        swap2_arena::disconnect::TIMEOUT_SECONDS
    );
    println!(
        "  (a real deployment polls check_timeout on a schedule; this demo fast-forwards the clock past the window instead of sleeping)"
    );
    manual_time.advance(swap2_arena::disconnect::TIMEOUT_SECONDS + 1);

    let check = disconnect_handler.check_timeout(series.id).unwrap();
    if check.forfeited {
        let outcome = check.outcome.unwrap();
        println!(
            "  {} forfeited by timeout. {}",
            "P2".blue(),
            if outcome.is_complete {
                "Series complete.".bold().to_string()
            } else {
                "Series continues.".to_string()
            }
        );
        if outcome.is_complete {
            print_header("Series complete");
            println!(
                "  Winner: {} — final score {}",
                if outcome.series.winner_id == Some(p1) { "P1" } else { "P2" },
                outcome.series.final_score.as_deref().unwrap_or("?")
            );
            println!(
                "  Loser MP change: {}",
                outcome.series.loser_mp_change.unwrap_or(0)
            );

            print_header("Rematch handshake");
            let first = series_mgr.request_rematch(series.id, p1).unwrap();
            println!("  P1 requests a rematch: {first:?}");
            let second = series_mgr.request_rematch(series.id, p2).unwrap();
            match second {
                RematchOutcome::Created(new_series) => {
                    println!(
                        "  P2 requests a rematch — both agreed, new series {} created.",
                        new_series.id.to_string().green()
                    );
                }
                RematchOutcome::WaitingForOpponent => {
                    println!("  Still waiting on the other player.");
                }
            }
        }
    } else {
        println!("  (disconnect watchdog had not elapsed in this run)");
    }

    println!();
}
