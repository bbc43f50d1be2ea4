//! Headless LiveInk session driver.
//!
//! Connects two sessions through an in-process relay, plays a short scripted
//! interaction and logs the shared state and each participant's overlay.
//!
//! Usage: `liveink-sim [config.json]`

use kurbo::Point;
use liveink_core::room::ConnectionId;
use liveink_core::{
    AttributeKey, ContextMenuItem, Key, Modifiers, PresenceChannel, RoomHub, Session,
    SessionConfig, SharedShapeMap, ShortcutRegistry, Tool,
};
use std::error::Error;

struct Participant {
    name: &'static str,
    session: Session,
    connection: ConnectionId,
}

impl Participant {
    fn join(hub: &mut RoomHub, name: &'static str, config: &SessionConfig) -> Self {
        Self {
            name,
            session: Session::new(config.clone(), 0),
            connection: hub.connect(),
        }
    }
}

/// Deliver everything in flight, advancing both participants to `now`.
fn settle(
    hub: &mut RoomHub,
    participants: &mut [&mut Participant],
    now: u64,
) -> Result<(), Box<dyn Error>> {
    for _ in 0..3 {
        for p in participants.iter_mut() {
            hub.exchange(p.connection, p.session.room_mut())?;
            p.session.tick(now);
        }
    }
    Ok(())
}

fn drag(session: &mut Session, from: Point, to: Point) {
    session.pointer_down(from);
    session.pointer_move(from.midpoint(to));
    session.pointer_up(to);
}

fn type_chat(session: &mut Session, text: &str) {
    for c in text.chars() {
        session.key_up(Key::Char(c), Modifiers::NONE);
    }
}

fn load_config() -> Result<SessionConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            let config = SessionConfig::from_json(&json)?;
            log::info!("Loaded configuration from {path}");
            Ok(config)
        }
        None => Ok(SessionConfig::default()),
    }
}

fn report(p: &Participant, now: u64) -> Result<(), Box<dyn Error>> {
    let storage = p.session.room().storage();
    log::info!(
        "[{}] {} objects on canvas, {} in storage",
        p.name,
        p.session.scene().len(),
        storage.size()
    );
    for (id, record) in storage.entries() {
        log::debug!("[{}]   {id}: {}", p.name, record.to_json());
    }
    let overlay = p.session.overlay(now);
    log::info!("[{}] overlay: {}", p.name, serde_json::to_string(&overlay)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    log::info!("Starting LiveInk simulation in room {}", config.room_id);
    ShortcutRegistry::log_all();

    let mut hub = RoomHub::new();
    let mut alice = Participant::join(&mut hub, "alice", &config);
    let mut bob = Participant::join(&mut hub, "bob", &config);
    settle(&mut hub, &mut [&mut alice, &mut bob], 0)?;

    // Alice draws two shapes.
    alice.session.pointer_move(Point::new(40.0, 40.0));
    alice.session.select_tool(Tool::Rectangle);
    drag(&mut alice.session, Point::new(40.0, 40.0), Point::new(240.0, 140.0));
    let rect = alice.session.active_ref();
    alice.session.select_tool(Tool::Circle);
    drag(&mut alice.session, Point::new(400.0, 200.0), Point::new(500.0, 260.0));
    settle(&mut hub, &mut [&mut alice, &mut bob], 50)?;

    // Bob recolors the rectangle through the panel and says hello.
    bob.session.pointer_move(Point::new(120.0, 90.0));
    bob.session.select(rect);
    if bob.session.input_change(AttributeKey::Fill, "#2563eb") {
        log::info!("[bob] recolored the rectangle");
    }
    bob.session.key_up(Key::Char('/'), Modifiers::NONE);
    type_chat(&mut bob.session, "nice shapes!");
    settle(&mut hub, &mut [&mut alice, &mut bob], 100)?;

    // Alice holds down a reaction for half a second.
    alice.session.context_menu(ContextMenuItem::Reactions);
    alice.session.select_reaction("🔥");
    alice.session.pointer_down(Point::new(300.0, 300.0));
    alice.session.tick(600);
    alice.session.pointer_up(Point::new(300.0, 300.0));
    settle(&mut hub, &mut [&mut alice, &mut bob], 600)?;

    report(&alice, 600)?;
    report(&bob, 600)?;

    // Reactions are gone once they age out.
    settle(&mut hub, &mut [&mut alice, &mut bob], 5000)?;
    log::info!(
        "[bob] {} reactions visible at 5000ms",
        bob.session.overlay(5000).reactions.len()
    );

    // Alice wipes the board.
    if alice.session.reset() {
        log::info!("[alice] board reset");
    }
    settle(&mut hub, &mut [&mut alice, &mut bob], 5100)?;
    report(&bob, 5100)?;

    for p in [&mut alice, &mut bob] {
        p.session.teardown();
        hub.exchange(p.connection, p.session.room_mut())?;
        hub.disconnect(p.connection);
    }
    log::info!("Simulation finished");
    Ok(())
}
