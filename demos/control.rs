use ceiling_light::{
    CommandPhase, DeviceConfig, LightController, LightState, Parameter, StateReceiver,
    SNAPSHOT_FILE_NAME,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use tracing_subscriber::EnvFilter;

const BRIGHTNESS_STEP: i64 = 5;
const COLOR_TEMPERATURE_STEP: i64 = 100;

struct App {
    controller: LightController,
    updates: StateReceiver,
    state: LightState,
    status_message: String,
}

impl App {
    fn new(controller: LightController) -> Self {
        let updates = controller.subscribe();
        let state = controller.state();

        Self {
            controller,
            updates,
            state,
            status_message: "Reading light state...".to_string(),
        }
    }

    fn adjust_brightness(&mut self, delta: i64) {
        let current = i64::from(self.controller.brightness().value());
        self.controller.set_brightness(current + delta);
    }

    fn adjust_color_temperature(&mut self, delta: i64) {
        let current = i64::from(self.controller.color_temperature().kelvin());
        self.controller.set_color_temperature(current + delta);
    }

    async fn refresh(&mut self) {
        self.status_message = match self.controller.refresh_device_state().await {
            Ok(Ok(state)) => format!("Device reports {}", state),
            Ok(Err(e)) => format!("Refresh failed: {}", e),
            Err(e) => format!("Refresh task failed: {}", e),
        };
    }

    fn handle_state_updates(&mut self) {
        while let Some(state) = self.updates.try_recv() {
            self.state = state;
        }
    }
}

fn phase_label(phase: CommandPhase) -> &'static str {
    match phase {
        CommandPhase::Idle => "synced",
        CommandPhase::Debouncing => "waiting",
        CommandPhase::Dispatching => "sending",
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(3),
        ])
        .split(f.size());

    render_power(f, app, chunks[0]);
    render_brightness(f, app, chunks[1]);
    render_color_temperature(f, app, chunks[2]);
    render_help(f, chunks[3]);
    render_status(f, app, chunks[4]);
}

fn render_power(f: &mut Frame, app: &App, area: Rect) {
    let (label, color) = if app.state.power.is_on() {
        ("ON", Color::Green)
    } else {
        ("OFF", Color::Red)
    };

    let text = Paragraph::new(Line::from(vec![
        Span::raw("Light: "),
        Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
    ]))
    .block(Block::default().title(" Ceiling Light ").borders(Borders::ALL));

    f.render_widget(text, area);
}

fn render_brightness(f: &mut Frame, app: &App, area: Rect) {
    let value = app.state.brightness.value();
    let phase = app.controller.phase(Parameter::Brightness);

    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(format!(" Brightness ({}) ", phase_label(phase)))
                .borders(Borders::ALL),
        )
        .gauge_style(Style::default().fg(Color::Yellow))
        .percent(u16::from(value))
        .label(format!("{}%", value));

    f.render_widget(gauge, area);
}

fn render_color_temperature(f: &mut Frame, app: &App, area: Rect) {
    let kelvin = app.state.color_temperature.kelvin();
    let phase = app.controller.phase(Parameter::ColorTemperature);
    let ratio = f64::from(kelvin - 1700) / f64::from(6500 - 1700);

    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(format!(" Color Temperature ({}) ", phase_label(phase)))
                .borders(Borders::ALL),
        )
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(format!("{}K", kelvin));

    f.render_widget(gauge, area);
}

fn render_help(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from("space: toggle   o: on   f: off   r: refresh from device"),
        Line::from("+/-: brightness   ]/[: color temperature   q: quit"),
    ];

    let text = Paragraph::new(lines)
        .block(Block::default().title(" Keys ").borders(Borders::ALL))
        .wrap(Wrap { trim: true });

    f.render_widget(text, area);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Status ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let text = Paragraph::new(app.status_message.clone())
        .block(block)
        .wrap(Wrap { trim: true });

    f.render_widget(text, area);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Log to a file; stderr belongs to the terminal UI
    let log_file = std::fs::File::create("ceiling-light.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();

    let config = DeviceConfig::from_env()?;
    let controller = LightController::from_config(&config);

    // Keep the snapshot file current for external readers
    controller.on_state_changed(|state| {
        if let Err(e) = ceiling_light::LightSnapshot::from(*state).write_to(SNAPSHOT_FILE_NAME) {
            tracing::warn!("Failed to save light state: {}", e);
        }
    });

    let mut app = App::new(controller);
    app.refresh().await;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {}", err);
    }

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        app.handle_state_updates();
        terminal.draw(|f| ui(f, app))?;

        if event::poll(std::time::Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => return Ok(()),
                        KeyCode::Char(' ') => app.controller.toggle_power(),
                        KeyCode::Char('o') => app.controller.turn_on(),
                        KeyCode::Char('f') => app.controller.turn_off(),
                        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => {
                            app.adjust_brightness(BRIGHTNESS_STEP)
                        }
                        KeyCode::Char('-') | KeyCode::Char('_') | KeyCode::Down => {
                            app.adjust_brightness(-BRIGHTNESS_STEP)
                        }
                        KeyCode::Char(']') | KeyCode::Right => {
                            app.adjust_color_temperature(COLOR_TEMPERATURE_STEP)
                        }
                        KeyCode::Char('[') | KeyCode::Left => {
                            app.adjust_color_temperature(-COLOR_TEMPERATURE_STEP)
                        }
                        KeyCode::Char('r') => app.refresh().await,
                        _ => {}
                    }
                }
            }
        }
    }
}
