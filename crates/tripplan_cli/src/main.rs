//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `tripplan_core` wiring end to end: open a database, seed a trip
//!   with one day, run one drag gesture, arrange the day by date and print
//!   the committed order after each step.
//!
//! Usage: `tripplan_cli [DB_PATH]`. Without a path an in-memory database is
//! used. Set `TRIPPLAN_LOG_DIR` to an absolute path to enable file logging.

use std::error::Error;
use std::process::ExitCode;
use tripplan_core::db::{open_db, open_db_in_memory};
use tripplan_core::{
    default_log_level, init_logging, Item, ItemDraft, ItineraryService, MouseInput,
    PlannerSession, SqliteItemRepository,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_run module=cli status=error error={err}");
            eprintln!("tripplan_cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("TRIPPLAN_LOG_DIR") {
        init_logging(default_log_level(), &log_dir)?;
    }

    println!("tripplan_core ping={}", tripplan_core::ping());
    println!("tripplan_core version={}", tripplan_core::core_version());

    let conn = match std::env::args().nth(1) {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let service = ItineraryService::new(SqliteItemRepository::try_new(&conn)?);

    let trip = service.create_trip("Weekend")?;
    let day = service.create_day(&trip.id, "Day 1")?;
    service.add_item(&day.id, ItemDraft::new("Breakfast"))?;
    service.add_item(&day.id, ItemDraft::new("Museum").with_date("2024-05-02"))?;
    service.add_item(&day.id, ItemDraft::new("Dinner").with_date("2024-05-01"))?;

    let mut session = PlannerSession::open(service.repo(), &day.id)?;
    session.handle_mouse(&day.id, MouseInput::DragStart(0))?;
    session.handle_mouse(&day.id, MouseInput::DragEnter(2))?;
    session.handle_mouse(&day.id, MouseInput::Drop)?;
    session.pump_snapshots();
    print_items("after drag", &service.list_items(&day.id)?);

    service.arrange_by_date(&day.id)?;
    print_items("by date", &service.list_items(&day.id)?);
    Ok(())
}

fn print_items(label: &str, items: &[Item]) {
    println!("{label}:");
    for item in items {
        let date = item.date.as_deref().unwrap_or("undated");
        println!("  {} {} {}", item.order, date, item.title);
    }
}
