use std::{
    io::{self, Write},
    time::{Duration, Instant},
};

use crossbeam_channel::unbounded;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal,
};
use log::{info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::app::render::{render_heap, render_log, render_pool, render_shaping};
use crate::config::SimConfig;
use crate::error::ShapingError;
use crate::heap::gc::Heap;
use crate::manager::pool_manager::PoolManager;
use crate::pool::scheduler::Concurrency;
use crate::shaping::debounce::spawn_debounced;
use crate::shaping::lab::ShapingLab;

const PROMPT: &str = ">>> ";
const WATCH_REFRESH: Duration = Duration::from_millis(250);
const DEFAULT_WATCH_SECS: u64 = 10;
const MAX_WATCH_SECS: u64 = 3600;
const MAX_BURST_EVENTS: u32 = 10_000;
const MAX_BURST_GAP_MS: u64 = 60_000;
const TYPE_POLL: Duration = Duration::from_millis(20);

const HELP: &[&str] = &[
    "generate             enqueue 5 tasks",
    "concurrency <1-6>    set pool slots",
    "pool                 show pending / active / completed",
    "watch [secs]         live pool view (any key stops)",
    "log                  show the engine log",
    "alloc                allocate a heap object",
    "detach <id>          drop a heap node's parent reference",
    "gc [-q]              run mark-and-sweep (-q: summary only)",
    "heap                 show the heap tree",
    "burst <n> <gap-ms>   feed n events through debounce/throttle",
    "type                 live typing through debounce/throttle",
    "window <ms>          set the shaping window (200-2000, step 100)",
    "exit                 quit",
];

pub enum Outcome {
    Continue,
    Watch(Duration),
    Type,
    Exit,
}

/// Everything the REPL operates on.
pub struct App {
    manager: PoolManager,
    heap: Heap,
    heap_rng: ChaCha8Rng,
    shaping: ShapingLab,
}

impl App {
    pub fn new(config: &SimConfig) -> Result<Self, ShapingError> {
        Ok(Self {
            manager: PoolManager::new(config),
            heap: Heap::new(),
            heap_rng: ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1)),
            shaping: ShapingLab::new(config.window_ms)?,
        })
    }

    pub fn start(&mut self) {
        self.manager.start();
    }

    pub fn shutdown(&mut self) {
        if let Err(e) = self.manager.stop() {
            warn!("{}", e);
        }
    }

    pub fn pool_view(&self) -> Vec<String> {
        render_pool(&self.manager.snapshot())
    }

    /// Runs one command line and collects what it prints.
    pub fn execute(&mut self, input: &str, out: &mut Vec<String>) -> Outcome {
        let mut args = input.split_whitespace();
        match args.next() {
            Some("generate") => match self.manager.enqueue() {
                Ok(()) => out.push("Enqueued 5 tasks.".to_string()),
                Err(e) => out.push(format!("Failed to enqueue: {}", e)),
            },
            Some("concurrency") => match args.next().map(str::parse::<i64>) {
                Some(Ok(slots)) => match Concurrency::new(slots) {
                    Ok(slots) => match self.manager.set_concurrency(slots) {
                        Ok(()) => out.push(format!("Concurrency set to {}.", slots.get())),
                        Err(e) => out.push(format!("Failed to set concurrency: {}", e)),
                    },
                    Err(e) => out.push(e.to_string()),
                },
                Some(Err(_)) => out.push("Invalid concurrency format.".to_string()),
                None => out.push("Concurrency must be specified.".to_string()),
            },
            Some("pool") => out.extend(self.pool_view()),
            Some("watch") => match args.next().map(str::parse::<u64>) {
                None => return Outcome::Watch(Duration::from_secs(DEFAULT_WATCH_SECS)),
                Some(Ok(secs)) if (1..=MAX_WATCH_SECS).contains(&secs) => {
                    return Outcome::Watch(Duration::from_secs(secs));
                }
                _ => out.push(format!("Usage: watch [secs], 1 to {}", MAX_WATCH_SECS)),
            },
            Some("log") => out.extend(render_log(self.manager.snapshot().log())),
            Some("alloc") => {
                let id = self.heap.allocate(&mut self.heap_rng);
                out.push(format!("Allocated {} ({}% heap).", id, self.heap.usage().round()));
            }
            Some("detach") => match args.next() {
                Some(id) => match self.heap.detach(id) {
                    Ok(()) => out.push(format!("Detached {}.", id)),
                    Err(e) => out.push(e.to_string()),
                },
                None => out.push("Node ID must be specified.".to_string()),
            },
            Some("gc") => match args.next() {
                Some("-q") => match self.heap.collect() {
                    Ok(report) => out.push(format!(
                        "{} live, {} swept.",
                        report.live.len(),
                        report.swept.len()
                    )),
                    Err(e) => out.push(e.to_string()),
                },
                _ => self.collect_garbage(out),
            },
            Some("heap") => out.extend(render_heap(&self.heap)),
            Some("burst") => {
                let count = args.next().map(str::parse::<u32>);
                let gap = args.next().map(str::parse::<u64>);
                match (count, gap) {
                    (Some(Ok(count)), Some(Ok(gap)))
                        if count <= MAX_BURST_EVENTS && gap <= MAX_BURST_GAP_MS =>
                    {
                        let stats = self.shaping.feed_burst(
                            Instant::now(),
                            count,
                            Duration::from_millis(gap),
                        );
                        out.extend(render_shaping(&stats, self.shaping.window().as_millis()));
                    }
                    _ => out.push(format!(
                        "Usage: burst <count> <gap-ms>, at most {} events {}ms apart",
                        MAX_BURST_EVENTS, MAX_BURST_GAP_MS
                    )),
                }
            }
            Some("type") => return Outcome::Type,
            Some("window") => match args.next().map(str::parse::<u64>) {
                Some(Ok(ms)) => match self.shaping.set_window(ms) {
                    Ok(()) => out.push(format!("Window set to {}ms.", ms)),
                    Err(e) => out.push(e.to_string()),
                },
                _ => out.push("Usage: window <ms>".to_string()),
            },
            Some("help") => out.extend(HELP.iter().map(|line| line.to_string())),
            Some("exit") => {
                out.push("Exiting the program...".to_string());
                return Outcome::Exit;
            }
            Some(cmd) => out.push(format!("Unknown command: {}. Type 'help'.", cmd)),
            None => {}
        }
        Outcome::Continue
    }

    fn collect_garbage(&mut self, out: &mut Vec<String>) {
        if let Err(e) = self.heap.begin_collection() {
            out.push(e.to_string());
            return;
        }
        let marked = self.heap.mark();
        out.extend(render_heap(&self.heap));
        let swept = marked.and_then(|_| self.heap.sweep());
        match swept {
            Ok(swept) if swept.is_empty() => out.push("Nothing to collect.".to_string()),
            Ok(swept) => out.push(format!("Swept {}.", swept.join(", "))),
            Err(e) => out.push(e.to_string()),
        }
    }
}

pub fn run_cli(mut app: App) -> io::Result<()> {
    println!("Simulation started. Enter a command, 'help' for a list or 'exit' to quit.");
    app.start();

    terminal::enable_raw_mode()?;
    let result = repl(&mut app);
    terminal::disable_raw_mode()?;
    app.shutdown();
    info!("REPL closed.");
    result
}

fn repl(app: &mut App) -> io::Result<()> {
    let mut commands_history: Vec<String> = Vec::new();
    loop {
        let Some(input) = read_line(&commands_history)? else {
            return Ok(());
        };
        if !input.trim().is_empty() {
            commands_history.push(input.clone());
        }

        let mut out = Vec::new();
        let outcome = app.execute(input.trim(), &mut out);
        print_lines(&out)?;
        match outcome {
            Outcome::Continue => {}
            Outcome::Watch(length) => watch(app, length)?,
            Outcome::Type => type_events(app)?,
            Outcome::Exit => return Ok(()),
        }
    }
}

/// Line editor with history. `None` means the user pressed Ctrl-C.
fn read_line(commands_history: &[String]) -> io::Result<Option<String>> {
    let mut history_index = commands_history.len();
    let mut input = String::new();
    print!("\r{}", PROMPT);
    io::stdout().flush()?;

    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = event::read()?
        else {
            continue;
        };
        match code {
            KeyCode::Enter => {
                println!();
                return Ok(Some(input));
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                println!();
                return Ok(None);
            }
            KeyCode::Up => {
                history_index = history_index.saturating_sub(1);
                if let Some(command) = commands_history.get(history_index) {
                    input = command.clone();
                    redraw(&input)?;
                }
            }
            KeyCode::Down => {
                if history_index < commands_history.len() {
                    history_index += 1;
                }
                input = commands_history
                    .get(history_index)
                    .cloned()
                    .unwrap_or_default();
                redraw(&input)?;
            }
            KeyCode::Char(c) => {
                input.push(c);
                print!("{}", c);
                io::stdout().flush()?;
            }
            KeyCode::Backspace => {
                input.pop();
                redraw(&input)?;
            }
            _ => {}
        }
    }
}

/// Redraws the pool until `length` passes or a key is pressed.
fn watch(app: &App, length: Duration) -> io::Result<()> {
    let deadline = Instant::now() + length;
    let mut stdout = io::stdout();
    while Instant::now() < deadline {
        execute!(
            stdout,
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        print_lines(&app.pool_view())?;
        print!("\r(press any key to stop)");
        stdout.flush()?;
        if event::poll(WATCH_REFRESH)? {
            if let Event::Key(_) = event::read()? {
                break;
            }
        }
    }
    println!();
    Ok(())
}

/// Each keystroke is one raw event. Stats redraw once typing settles for a
/// full window; Enter or Esc leaves.
fn type_events(app: &mut App) -> io::Result<()> {
    let (settled_tx, settled_rx) = unbounded();
    let settle = spawn_debounced(app.shaping.window(), move || {
        let _ = settled_tx.send(());
    });
    print_lines(&["Type freely; Enter or Esc to finish.".to_string()])?;
    print!("\r> ");
    io::stdout().flush()?;

    let mut text = String::new();
    loop {
        app.shaping.poll(Instant::now());
        if settled_rx.try_recv().is_ok() {
            println!();
            print_lines(&render_shaping(&app.shaping.stats(), app.shaping.window().as_millis()))?;
            print!("\r> {}", text);
            io::stdout().flush()?;
        }
        if !event::poll(TYPE_POLL)? {
            continue;
        }
        match event::read()? {
            Event::Key(KeyEvent {
                code: KeyCode::Enter | KeyCode::Esc,
                kind: KeyEventKind::Press,
                ..
            }) => break,
            Event::Key(KeyEvent {
                code: KeyCode::Char(c),
                kind: KeyEventKind::Press,
                ..
            }) => {
                text.push(c);
                app.shaping.record(Instant::now());
                settle.call();
                print!("{}", c);
                io::stdout().flush()?;
            }
            _ => {}
        }
    }
    drop(settle);

    if app.shaping.pending() {
        app.shaping.poll(Instant::now() + app.shaping.window());
    }
    println!();
    print_lines(&render_shaping(&app.shaping.stats(), app.shaping.window().as_millis()))
}

fn print_lines(lines: &[String]) -> io::Result<()> {
    let mut stdout = io::stdout();
    for line in lines {
        write!(stdout, "\r{}\r\n", line)?;
    }
    stdout.flush()
}

fn redraw(input: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        cursor::MoveToColumn(0),
        terminal::Clear(terminal::ClearType::CurrentLine)
    )?;
    print!("{}{}", PROMPT, input);
    stdout.flush()
}
