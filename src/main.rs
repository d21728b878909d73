//! Retro Arcade entry point
//!
//! Native builds run a headless autoplay session: a simple bot drives the
//! chosen game, outcome dialogs are answered automatically, and the final
//! session is printed as JSON.
//!
//! Usage: `retro-arcade [game] [settings.json] [--frames N] [--fallback MODE] [--mute]`

#[cfg(not(target_arch = "wasm32"))]
mod autoplay {
    use std::cell::Cell;
    use std::rc::Rc;

    use glam::Vec2;
    use retro_arcade::audio::NullAudio;
    use retro_arcade::games::Engine;
    use retro_arcade::games::snake::Direction;
    use retro_arcade::{
        Arcade, DialogCallbacks, GameKind, GameOverFallback, InputEvent, Key, Outcome,
        SessionPhase, Settings, TickInput,
    };

    /// Frames between Tetris hard drops
    const TETRIS_DROP_EVERY: u64 = 20;

    pub struct Options {
        pub kind: GameKind,
        pub settings: Settings,
        pub frames: u64,
        pub muted: bool,
    }

    impl Options {
        pub fn from_args(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
            let mut kind = GameKind::Tetris;
            let mut settings = None;
            let mut frames = 60 * 120;
            let mut fallback = None;
            let mut muted = false;

            while let Some(arg) = args.next() {
                if arg == "--frames" {
                    let value = args.next().ok_or("--frames needs a value")?;
                    frames = value
                        .parse()
                        .map_err(|e| format!("bad --frames '{}': {}", value, e))?;
                } else if arg == "--fallback" {
                    let value = args.next().ok_or("--fallback needs a value")?;
                    fallback = Some(
                        GameOverFallback::from_str(&value)
                            .ok_or_else(|| format!("bad --fallback '{}'", value))?,
                    );
                } else if arg == "--mute" {
                    muted = true;
                } else if let Some(k) = GameKind::from_slug(&arg) {
                    kind = k;
                } else if arg.ends_with(".json") {
                    settings = Some(Settings::load_from(&arg));
                } else {
                    return Err(format!("unknown argument '{}'", arg));
                }
            }

            let mut settings = settings.unwrap_or_default();
            if let Some(fallback) = fallback {
                settings.game_over_fallback = fallback;
            }
            Ok(Self {
                kind,
                settings,
                frames,
                muted,
            })
        }
    }

    /// Pick this frame's input from the visible engine state
    fn bot_input(arcade: &Arcade, frame: u64) -> (TickInput, Option<InputEvent>) {
        let mut input = TickInput::default();
        let mut event = None;

        match arcade.engine() {
            Engine::Tetris(_) => {
                if frame % TETRIS_DROP_EVERY == 0 {
                    let key = if frame % (TETRIS_DROP_EVERY * 2) == 0 {
                        Key::Left
                    } else {
                        Key::Right
                    };
                    event = Some(InputEvent::KeyDown(key));
                } else if frame % TETRIS_DROP_EVERY == 1 {
                    event = Some(InputEvent::KeyDown(Key::Action));
                }
            }
            Engine::Snake(s) => {
                let d = s.food() - s.head();
                let want = if d.x > 0 {
                    Direction::Right
                } else if d.x < 0 {
                    Direction::Left
                } else if d.y > 0 {
                    Direction::Down
                } else {
                    Direction::Up
                };
                let key = match want {
                    Direction::Up => Key::Up,
                    Direction::Down => Key::Down,
                    Direction::Left => Key::Left,
                    Direction::Right => Key::Right,
                };
                input.held.set(key, true);
            }
            Engine::PingPong(p) => {
                input.pointer = Some(p.ball().pos);
            }
            Engine::ShootingGame(g) => {
                input.held.action = true;
                let target = g
                    .boss()
                    .map(|b| b.pos.x)
                    .or_else(|| g.enemies().iter().map(|e| e.pos.x).next());
                if let Some(x) = target {
                    input.held.left = x < g.ship().x - 5.0;
                    input.held.right = x > g.ship().x + 5.0;
                }
            }
            Engine::WhackAMole(w) => {
                if let Some(hole) = w.holes().iter().find(|h| h.visible) {
                    event = Some(InputEvent::PointerDown(hole.pos + Vec2::new(3.0, -2.0)));
                }
            }
        }
        (input, event)
    }

    pub fn run(options: Options) {
        let Options {
            kind,
            settings,
            frames,
            muted,
        } = options;
        let frame_dt = settings.frame_dt_ms;
        log::info!("Game over fallback: {}", settings.game_over_fallback.as_str());

        let levels_cleared = Rc::new(Cell::new(0u32));
        let final_score = Rc::new(Cell::new(None));

        let mut arcade = Arcade::new(kind, settings);
        if muted {
            arcade = arcade.with_audio(NullAudio);
        }
        let cleared = levels_cleared.clone();
        let over = final_score.clone();
        arcade.init(
            1,
            DialogCallbacks::new()
                .on_level_complete(move |level, score| {
                    cleared.set(cleared.get() + 1);
                    log::info!("Dialog: level {} next (score {})", level, score);
                })
                .on_game_over(move |score| {
                    over.set(Some(score));
                    log::info!("Dialog: game over (score {})", score);
                }),
        );

        for frame in 0..frames {
            let (mut input, event) = bot_input(&arcade, frame);
            input.dt_ms = Some(frame_dt);
            if let Some(event) = event {
                arcade.on_input(event);
            }
            arcade.tick(&input);

            match arcade.session().phase() {
                SessionPhase::AwaitingOutcome(Outcome::LevelComplete { .. }) => {
                    arcade.resume_game();
                }
                SessionPhase::AwaitingOutcome(Outcome::GameOver { .. }) => break,
                SessionPhase::Terminated => break,
                _ => {}
            }
            arcade.drain_events();
        }

        let session = arcade.session();
        println!(
            "{}: level {} reached, {} levels cleared, {} lives left, score {}{}",
            kind.display_name(),
            session.level,
            levels_cleared.get(),
            session.lives,
            session.score,
            if final_score.get().is_some() { " (game over)" } else { "" }
        );
        match serde_json::to_string_pretty(session) {
            Ok(json) => println!("{}", json),
            Err(e) => log::warn!("Could not serialize session: {}", e),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn parse(args: &[&str]) -> Result<Options, String> {
            Options::from_args(args.iter().map(|a| a.to_string()))
        }

        #[test]
        fn test_fallback_and_mute_flags() {
            let options = parse(&["snake", "--fallback", "Terminate", "--mute"]).unwrap();
            assert_eq!(options.kind, GameKind::Snake);
            assert_eq!(options.settings.game_over_fallback, GameOverFallback::Terminate);
            assert!(options.muted);

            let options = parse(&["--frames", "10"]).unwrap();
            assert_eq!(options.frames, 10);
            assert_eq!(options.settings.game_over_fallback, GameOverFallback::AutoReset);
            assert!(!options.muted);
        }

        #[test]
        fn test_bad_arguments_are_rejected() {
            assert!(parse(&["--fallback", "sometimes"]).is_err());
            assert!(parse(&["--frames"]).is_err());
            assert!(parse(&["pinball"]).is_err());
        }

        #[test]
        fn test_muted_terminating_run_finishes() {
            let args = ["whack-a-mole", "--fallback", "terminate", "--mute", "--frames", "600"];
            run(parse(&args).unwrap());
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Retro Arcade (native) starting...");

    match autoplay::Options::from_args(std::env::args().skip(1)) {
        Ok(options) => autoplay::run(options),
        Err(e) => {
            eprintln!("{}", e);
            eprintln!(
                "usage: retro-arcade [game] [settings.json] [--frames N] [--fallback MODE] [--mute]"
            );
            std::process::exit(2);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Hosts embed the library directly on the web
}
