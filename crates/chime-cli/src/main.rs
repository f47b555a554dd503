//! chime CLI — sound player powered by the chime manager.
//!
//! Commands:
//!   chime play <file|url> [options]   Play one sound to the end
//!   chime probe <file|url>            Show format and duration
//!   chime demo                        Scripted session on the headless plugin backend
//!
//! Play options:
//!   --volume <0-100>   --pan <-100..100>   --from <seconds>
//!   --to <seconds>     --loops <n>         --plugin

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use chime_core::backend::media;
use chime_core::backend::plugin::{HeadlessBridge, PluginDriver};
use chime_core::{
    BackendMode, Clock, Manager, ManualClock, PlayOptions, PlayState, ReadyState, SetupOptions,
    SoundEvent, SoundOptions, SystemClock,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        return;
    }

    match args[0].as_str() {
        "play" => cmd_play(&args[1..]),
        "probe" => cmd_probe(&args[1..]),
        "demo" => cmd_demo(),
        other => {
            eprintln!("unknown command: {}", other);
            print_usage();
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

struct PlayArgs {
    url: String,
    volume: Option<i32>,
    pan: Option<i32>,
    from_ms: Option<u64>,
    to_ms: Option<u64>,
    loops: Option<u32>,
    plugin: bool,
}

fn parse_play_args(args: &[String]) -> Result<PlayArgs, String> {
    let url = args.first().ok_or("usage: chime play <file|url> [options]")?;
    let mut out = PlayArgs {
        url: url.clone(),
        volume: None,
        pan: None,
        from_ms: None,
        to_ms: None,
        loops: None,
        plugin: false,
    };
    let mut rest = args[1..].iter();
    while let Some(flag) = rest.next() {
        if flag == "--plugin" {
            out.plugin = true;
            continue;
        }
        let value = rest
            .next()
            .ok_or_else(|| format!("missing value for {}", flag))?;
        let bad = || format!("invalid value for {}: {}", flag, value);
        match flag.as_str() {
            "--volume" => out.volume = Some(value.parse().map_err(|_| bad())?),
            "--pan" => out.pan = Some(value.parse().map_err(|_| bad())?),
            "--from" => out.from_ms = Some(secs_to_ms(value).ok_or_else(bad)?),
            "--to" => out.to_ms = Some(secs_to_ms(value).ok_or_else(bad)?),
            "--loops" => out.loops = Some(value.parse().map_err(|_| bad())?),
            _ => return Err(format!("unknown option: {}", flag)),
        }
    }
    Ok(out)
}

fn cmd_play(args: &[String]) {
    let play = match parse_play_args(args) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let mut manager = chime_core::standard_manager(clock);
    if play.plugin {
        let setup = SetupOptions::default().backend_mode(BackendMode::PluginOnly);
        if let Err(e) = manager.setup(setup) {
            eprintln!("setup failed: {}", e);
            return;
        }
    }
    if let Err(e) = manager.start() {
        eprintln!("start failed: {}", e);
        return;
    }
    while manager.ready_state() == ReadyState::Initializing {
        std::thread::sleep(Duration::from_millis(20));
        manager.tick();
    }
    if !manager.is_ready() {
        let status = manager.status();
        eprintln!(
            "no backend available: {}",
            status.error.unwrap_or_else(|| status.state.to_string())
        );
        return;
    }
    if let Some(kind) = manager.active_backend() {
        log::info!("chime: using {:?} backend", kind);
    }

    let mut opts = SoundOptions::new("cli", play.url.as_str());
    if let Some(v) = play.volume {
        opts = opts.volume(v);
    }
    if let Some(p) = play.pan {
        opts = opts.pan(p);
    }

    let done = Rc::new(RefCell::new(None::<Result<(), String>>));
    let sound = match manager.create_sound(opts) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("create failed: {}", e);
            return;
        }
    };
    let flag = Rc::clone(&done);
    sound.on_event(move |_, event| match event {
        SoundEvent::Finish => *flag.borrow_mut() = Some(Ok(())),
        SoundEvent::LoadFailed(e) => *flag.borrow_mut() = Some(Err(e.to_string())),
        SoundEvent::Error(msg) => eprintln!("\nplayback error: {}", msg),
        _ => {}
    });

    let mut options = PlayOptions::default();
    if let Some(ms) = play.from_ms {
        options = options.from_ms(ms);
    }
    if let Some(ms) = play.to_ms {
        options = options.to_ms(ms);
    }
    if let Some(n) = play.loops {
        options = options.loops(n);
    }
    if let Err(e) = sound.play(options) {
        eprintln!("play failed: {}", e);
        return;
    }

    // Block showing progress until the sound finishes (Ctrl+C exits)
    loop {
        std::thread::sleep(Duration::from_millis(50));
        manager.tick();
        if let Some(info) = manager.sound_info("cli") {
            print_progress(&info.id, info.position_ms, info.duration_ms, info.volume);
            if info.play_state == PlayState::Stopped && done.borrow().is_none() {
                break;
            }
        }
        if let Some(outcome) = done.borrow_mut().take() {
            if let Err(e) = outcome {
                eprintln!("\nload failed: {}", e);
            }
            break;
        }
    }
    println!();
    manager.destruct();
}

fn cmd_probe(args: &[String]) {
    if args.is_empty() {
        eprintln!("usage: chime probe <file|url>");
        return;
    }
    match media::probe_source(&args[0]) {
        Ok(format) => {
            println!("{}", args[0]);
            println!("  sample rate: {} Hz", format.sample_rate);
            println!("  channels:    {}", format.channels);
            match format.duration_ms {
                Some(ms) => println!("  duration:    {}", fmt_time(ms)),
                None => println!("  duration:    unknown"),
            }
        }
        Err(e) => eprintln!("probe failed: {}", e),
    }
}

/// Walks a sound through its lifecycle on simulated time.
fn cmd_demo() {
    let clock = ManualClock::new();
    let bridge = HeadlessBridge::new(Arc::new(clock.clone()))
        .handshake_after(120)
        .load_latency(40)
        .with_track("demo/chime.mp3", 1_000);
    let mut manager = Manager::new(Arc::new(clock.clone())).with_driver(PluginDriver::new(bridge));

    let setup = SetupOptions::default()
        .backend_mode(BackendMode::PluginOnly)
        .plugin_poll_interval_ms(100);
    if let Err(e) = manager.setup(setup) {
        eprintln!("setup failed: {}", e);
        return;
    }
    let hooks = manager
        .on_ready(|status| println!("[ready] backend: {:?}", status.backend))
        .and_then(|()| manager.on_timeout(|status| println!("[timeout] {:?}", status.error)));
    if let Err(e) = hooks {
        eprintln!("callback registration failed: {}", e);
        return;
    }
    if let Err(e) = manager.start() {
        eprintln!("start failed: {}", e);
        return;
    }
    while manager.ready_state() == ReadyState::Initializing {
        clock.advance(60);
        manager.tick();
    }

    let sound = match manager.create_sound(SoundOptions::new("demo", "demo/chime.mp3").volume(70)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("create failed: {}", e);
            return;
        }
    };
    let finished = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&finished);
    sound.on_event(move |info, event| match event {
        SoundEvent::Position(_) => {}
        SoundEvent::Finish => {
            println!("[{}] Finish", info.id);
            *flag.borrow_mut() = true;
        }
        other => println!("[{}] {:?} at {}", info.id, other, fmt_time(info.position_ms)),
    });
    sound.on_position(500, |info| println!("[{}] halfway", info.id));
    if let Err(e) = sound.play(PlayOptions::default().loops(2)) {
        eprintln!("play failed: {}", e);
        return;
    }

    for _ in 0..100 {
        clock.advance(60);
        manager.tick();
        if *finished.borrow() {
            break;
        }
    }
    manager.destruct();
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn secs_to_ms(s: &str) -> Option<u64> {
    let secs: f64 = s.parse().ok()?;
    (secs >= 0.0).then(|| (secs * 1000.0) as u64)
}

fn print_progress(id: &str, pos_ms: u64, dur_ms: Option<u64>, vol: u8) {
    let bar_width = 30;
    let filled = match dur_ms {
        Some(d) if d > 0 => ((pos_ms.min(d) as f64 / d as f64) * bar_width as f64) as usize,
        _ => 0,
    };
    let empty = bar_width - filled;

    print!(
        "\r  {}  [{}{}] {} / {}  vol: {}%    ",
        id,
        "=".repeat(filled),
        " ".repeat(empty),
        fmt_time(pos_ms),
        dur_ms.map(fmt_time).unwrap_or_else(|| "?:??".into()),
        vol,
    );
    use std::io::Write;
    std::io::stdout().flush().ok();
}

fn fmt_time(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn print_usage() {
    println!("chime - CLI sound player");
    println!();
    println!("usage: chime <command> [args]");
    println!();
    println!("commands:");
    println!("  play <file|url> [options]  Play one sound to the end");
    println!("  probe <file|url>           Show format and duration");
    println!("  demo                       Scripted session on the headless plugin backend");
    println!();
    println!("play options:");
    println!("  --volume <0-100>   --pan <-100..100>   --from <seconds>");
    println!("  --to <seconds>     --loops <n>         --plugin");
}
