//! teleport-demo: interactive rack stand-in for the relay subsystem.
//!
//! A spawned tick thread plays the role of the host's audio callback,
//! publishing every source and ticking every relay at a fixed rate, while
//! stdin drives the interactive domain: create, rename, rebind, destroy,
//! and inspect, concurrently with the ticks, the way a real patch session
//! exercises the directory.

use std::io::{self, BufRead, Write as _};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use teleport_core::{
    Directory, Indicator, Label, NUM_TELEPORT_PORTS, PortReader, RelayEndpoint, RelayState,
    SourceEndpoint, SourceState, UpstreamInfo, UpstreamWalker,
};

/// Interactive demo rack for the teleport relay subsystem
#[derive(Parser)]
#[command(name = "teleport-demo")]
#[command(about = "Drive sources and relays from a REPL while a tick thread runs")]
#[command(version)]
struct Cli {
    /// Tick rate in Hz for the stand-in audio thread
    #[arg(long, default_value = "1000")]
    tick_hz: f64,
}

/// Fake upstream wiring for one demo source. Plugged ports produce a
/// ramp derived from the tick counter so relayed values visibly move.
struct DemoWiring {
    tick: Arc<AtomicU64>,
    plugged: [Option<PluggedInput>; NUM_TELEPORT_PORTS],
}

struct PluggedInput {
    module_name: String,
    port_name: String,
    channels: usize,
}

impl DemoWiring {
    fn new(tick: Arc<AtomicU64>) -> Self {
        Self {
            tick,
            plugged: Default::default(),
        }
    }
}

impl PortReader for DemoWiring {
    fn channel_count(&self, port: usize) -> usize {
        self.plugged[port].as_ref().map_or(0, |p| p.channels)
    }

    fn voltage(&self, port: usize, channel: usize) -> f32 {
        let t = self.tick.load(Ordering::Relaxed);
        ((t + (port as u64) * 37 + (channel as u64) * 11) % 1000) as f32 / 100.0 - 5.0
    }

    fn is_connected(&self, port: usize) -> bool {
        self.plugged[port].is_some()
    }
}

impl UpstreamWalker for DemoWiring {
    fn upstream(&self, port: usize) -> Option<UpstreamInfo> {
        self.plugged[port].as_ref().map(|p| UpstreamInfo {
            module_name: p.module_name.clone(),
            port_name: p.port_name.clone(),
        })
    }
}

struct DemoSource {
    endpoint: SourceEndpoint,
    wiring: DemoWiring,
}

struct Rack {
    directory: Arc<Directory>,
    tick: Arc<AtomicU64>,
    sources: Mutex<Vec<DemoSource>>,
    relays: Mutex<Vec<RelayEndpoint>>,
}

impl Rack {
    fn new() -> Self {
        Self {
            directory: Arc::new(Directory::new()),
            tick: Arc::new(AtomicU64::new(0)),
            sources: Mutex::new(Vec::new()),
            relays: Mutex::new(Vec::new()),
        }
    }

    /// One stand-in audio callback: publish every source, tick every relay.
    fn tick_once(&self) {
        self.tick.fetch_add(1, Ordering::Relaxed);
        for source in self.sources.lock().iter() {
            source.endpoint.publish(&source.wiring);
        }
        for relay in self.relays.lock().iter() {
            relay.tick();
        }
    }
}

/// Saved demo patch: just the endpoints' durable surface.
#[derive(Serialize, Deserialize)]
struct SavedRack {
    sources: Vec<SourceState>,
    relays: Vec<RelayState>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let rack = Arc::new(Rack::new());
    let stop = Arc::new(AtomicBool::new(false));

    let tick_thread = {
        let rack = Arc::clone(&rack);
        let stop = Arc::clone(&stop);
        let period = Duration::from_secs_f64(1.0 / cli.tick_hz.max(1.0));
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                rack.tick_once();
                thread::sleep(period);
            }
        })
    };

    println!(
        "{} ticking at {} Hz, type {} for commands",
        "teleport-demo".bold(),
        cli.tick_hz,
        "help".cyan()
    );

    prompt();
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            prompt();
            continue;
        };
        let args: Vec<&str> = parts.collect();
        match run_command(&rack, command, &args) {
            Ok(true) => break,
            Ok(false) => {}
            Err(err) => println!("{} {err:#}", "error:".red()),
        }
        prompt();
    }

    stop.store(true, Ordering::Relaxed);
    tick_thread.join().ok();
    Ok(())
}

fn prompt() {
    print!("> ");
    io::stdout().flush().ok();
}

fn run_command(rack: &Rack, command: &str, args: &[&str]) -> Result<bool> {
    match command {
        "help" => help(),
        "ls" => list_labels(rack),
        "src" => list_sources(rack),
        "rly" => list_relays(rack),
        "new-src" => new_source(rack, args)?,
        "new-rly" => new_relay(rack),
        "rename" => rename(rack, args)?,
        "bind" => bind(rack, args)?,
        "plug" => rewire(rack, args, true)?,
        "unplug" => rewire(rack, args, false)?,
        "rm-src" => remove_source(rack, args)?,
        "rm-rly" => remove_relay(rack, args)?,
        "peek" => peek(rack, args)?,
        "save" => save(rack, args)?,
        "load" => load(rack, args)?,
        "quit" | "exit" => return Ok(true),
        other => println!("unknown command `{other}`, try {}", "help".cyan()),
    }
    Ok(false)
}

fn help() {
    println!(
        "  {}                 list live labels\n  \
         {}                list sources\n  \
         {}                list relays\n  \
         {} [ports]     create a source with N plugged ports (default 2)\n  \
         {}            create a relay bound to the default target\n  \
         {} <i> <label> relabel source i\n  \
         {} <i> <label|->  point relay i at a label, or unbind\n  \
         {} <i> <port>    plug a fake upstream into source i\n  \
         {} <i> <port>  pull the fake upstream out of source i\n  \
         {} <i>         destroy source i\n  \
         {} <i>         destroy relay i\n  \
         {} <i>          show relay i's outputs and tooltips\n  \
         {} <file>       save the demo patch as JSON\n  \
         {} <file>       load a demo patch\n  \
         {}",
        "ls".cyan(),
        "src".cyan(),
        "rly".cyan(),
        "new-src".cyan(),
        "new-rly".cyan(),
        "rename".cyan(),
        "bind".cyan(),
        "plug".cyan(),
        "unplug".cyan(),
        "rm-src".cyan(),
        "rm-rly".cyan(),
        "peek".cyan(),
        "save".cyan(),
        "load".cyan(),
        "quit".cyan(),
    );
}

fn list_labels(rack: &Rack) {
    let labels = rack.directory.labels();
    if labels.is_empty() {
        println!("(no live sources)");
        return;
    }
    let default = rack.directory.default_target();
    for label in labels {
        if Some(&label) == default.as_ref() {
            println!("  {}  {}", label.to_string().bold(), "(default)".dimmed());
        } else {
            println!("  {label}");
        }
    }
}

fn list_sources(rack: &Rack) {
    for (i, source) in rack.sources.lock().iter().enumerate() {
        let plugged = source
            .wiring
            .plugged
            .iter()
            .filter(|p| p.is_some())
            .count();
        println!(
            "  [{i}] {}  {plugged} port(s) plugged",
            source.endpoint.label().to_string().bold()
        );
    }
}

fn list_relays(rack: &Rack) {
    for (i, relay) in rack.relays.lock().iter().enumerate() {
        let target = relay
            .target()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "(none)".into());
        let status = if relay.source_valid() {
            "ok".green()
        } else if relay.target().is_some() {
            "missing".red()
        } else {
            "unbound".dimmed()
        };
        println!("  [{i}] -> {} {status}", target.bold());
    }
}

fn new_source(rack: &Rack, args: &[&str]) -> Result<()> {
    let plug_count: usize = args.first().map_or(Ok(2), |a| a.parse())?;
    let endpoint = SourceEndpoint::create(Arc::clone(&rack.directory))?;
    let mut wiring = DemoWiring::new(Arc::clone(&rack.tick));
    for port in 0..plug_count.min(NUM_TELEPORT_PORTS) {
        wiring.plugged[port] = Some(PluggedInput {
            module_name: format!("VCO {}", port + 1),
            port_name: "out".into(),
            channels: 1 + port % 4,
        });
    }
    endpoint.note_wiring_changed(&wiring);
    println!("created source {}", endpoint.label().to_string().bold());
    rack.sources.lock().push(DemoSource { endpoint, wiring });
    Ok(())
}

fn new_relay(rack: &Rack) {
    let relay = RelayEndpoint::create(Arc::clone(&rack.directory));
    let target = relay
        .target()
        .map(|l| l.to_string())
        .unwrap_or_else(|| "(none)".into());
    println!("created relay bound to {}", target.bold());
    rack.relays.lock().push(relay);
}

fn rename(rack: &Rack, args: &[&str]) -> Result<()> {
    let [index, new_label] = args else {
        anyhow::bail!("usage: rename <source> <label>");
    };
    let index: usize = index.parse()?;
    let sources = rack.sources.lock();
    let source = sources.get(index).context("no such source")?;
    if source.endpoint.rename(new_label) {
        println!("{}", "ok".green());
    } else {
        // Same transient rejection the label text box shows as "!err"
        println!("{}", "!err".red().bold());
    }
    Ok(())
}

fn bind(rack: &Rack, args: &[&str]) -> Result<()> {
    let [index, target] = args else {
        anyhow::bail!("usage: bind <relay> <label|->");
    };
    let index: usize = index.parse()?;
    let relays = rack.relays.lock();
    let relay = relays.get(index).context("no such relay")?;
    if *target == "-" {
        relay.set_target(None);
    } else {
        relay.set_target(Some(Label::parse(target)?));
    }
    Ok(())
}

fn rewire(rack: &Rack, args: &[&str], plug: bool) -> Result<()> {
    let [index, port] = args else {
        anyhow::bail!("usage: (un)plug <source> <port>");
    };
    let index: usize = index.parse()?;
    let port: usize = port.parse()?;
    anyhow::ensure!(port < NUM_TELEPORT_PORTS, "port out of range");
    let mut sources = rack.sources.lock();
    let source = sources.get_mut(index).context("no such source")?;
    source.wiring.plugged[port] = plug.then(|| PluggedInput {
        module_name: format!("VCO {}", port + 1),
        port_name: "out".into(),
        channels: 1,
    });
    source.endpoint.note_wiring_changed(&source.wiring);
    Ok(())
}

fn remove_source(rack: &Rack, args: &[&str]) -> Result<()> {
    let index: usize = args.first().context("usage: rm-src <source>")?.parse()?;
    let mut sources = rack.sources.lock();
    anyhow::ensure!(index < sources.len(), "no such source");
    let removed = sources.remove(index);
    println!("destroyed source {}", removed.endpoint.label());
    Ok(())
}

fn remove_relay(rack: &Rack, args: &[&str]) -> Result<()> {
    let index: usize = args.first().context("usage: rm-rly <relay>")?.parse()?;
    let mut relays = rack.relays.lock();
    anyhow::ensure!(index < relays.len(), "no such relay");
    relays.remove(index);
    Ok(())
}

fn peek(rack: &Rack, args: &[&str]) -> Result<()> {
    let index: usize = args.first().context("usage: peek <relay>")?.parse()?;
    let relays = rack.relays.lock();
    let relay = relays.get(index).context("no such relay")?;

    relay.refresh_metadata();
    let outputs = relay.outputs();
    let descriptions = relay.descriptions();
    println!(
        "target {}  valid: {}",
        relay
            .target()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "(none)".into())
            .bold(),
        relay.source_valid()
    );
    for i in 0..NUM_TELEPORT_PORTS {
        let port = outputs.port(i);
        let light = match relay.indicator(i) {
            Indicator::Off => "·".dimmed(),
            Indicator::Connected => "●".green(),
            Indicator::Disconnected => "●".red(),
        };
        println!(
            "  {light} port {i}: {} ch, [0] = {:+.2} V  {}",
            port.channels(),
            port.get(0),
            descriptions[i].to_string().dimmed()
        );
    }
    Ok(())
}

fn save(rack: &Rack, args: &[&str]) -> Result<()> {
    let path = args.first().context("usage: save <file>")?;
    let saved = SavedRack {
        sources: rack.sources.lock().iter().map(|s| s.endpoint.save()).collect(),
        relays: rack.relays.lock().iter().map(|r| r.save()).collect(),
    };
    let json = serde_json::to_string_pretty(&saved)?;
    std::fs::write(path, json).with_context(|| format!("writing {path}"))?;
    println!("saved to {path}");
    Ok(())
}

fn load(rack: &Rack, args: &[&str]) -> Result<()> {
    let path = args.first().context("usage: load <file>")?;
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let saved: SavedRack = serde_json::from_str(&text).context("parsing demo patch")?;

    let mut sources = rack.sources.lock();
    let mut relays = rack.relays.lock();
    sources.clear();
    relays.clear();
    for state in &saved.sources {
        let endpoint = SourceEndpoint::restore(Arc::clone(&rack.directory), state)?;
        let mut wiring = DemoWiring::new(Arc::clone(&rack.tick));
        wiring.plugged[0] = Some(PluggedInput {
            module_name: "VCO 1".into(),
            port_name: "out".into(),
            channels: 1,
        });
        endpoint.note_wiring_changed(&wiring);
        debug!(label = %endpoint.label(), "restored source");
        sources.push(DemoSource { endpoint, wiring });
    }
    for state in &saved.relays {
        relays.push(RelayEndpoint::restore(Arc::clone(&rack.directory), state));
    }
    println!(
        "loaded {} source(s), {} relay(s)",
        sources.len(),
        relays.len()
    );
    Ok(())
}
