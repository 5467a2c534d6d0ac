use std::{collections::BTreeSet, io, thread, time::Duration};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use rulebook_core::{
    save::default_preset_name, AppConfig, ModuleId, PresetManager, Rule, RuleLibrary,
    RuleStatus, SessionConfig,
};
use tokio::sync::mpsc;
use tracing::{error, info};

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_PRESET_NAME_LEN: usize = 64;

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    success: Color,
    warning: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Browse,
    Filter,
    NamePrompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Session,
    Rules,
}

/// One selectable row of the session panel.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionOption {
    Module(ModuleId),
    /// Empty name stands for "no scenario".
    Scenario(String),
    Variant(String),
}

enum AppEvent {
    Input(Event),
    Tick,
}

/// Interactive session rulebook viewer.
pub struct RulebookApp {
    library: RuleLibrary,
    config: AppConfig,
    presets: PresetManager,
    session: SessionConfig,
    options: Vec<SessionOption>,
    cursor: usize,
    focus: Focus,
    mode: Mode,
    scroll: u16,
    filter: String,
    name_input: String,
    show_explain: bool,
    status: String,
    should_quit: bool,
    theme: Theme,
}

impl RulebookApp {
    pub fn new(library: RuleLibrary, config: AppConfig, session: SessionConfig) -> Self {
        let presets = config.preset_manager();
        let mut app = Self {
            library,
            config,
            presets,
            session,
            options: Vec::new(),
            cursor: 0,
            focus: Focus::Session,
            mode: Mode::Browse,
            scroll: 0,
            filter: String::new(),
            name_input: String::new(),
            show_explain: false,
            status: "Ready".to_string(),
            should_quit: false,
            theme: Theme::default(),
        };
        app.rebuild_options();
        app
    }

    pub async fn run(&mut self) -> Result<()> {
        let store = self.library.store();
        let mut status = format!(
            "Loaded {} rules from {}",
            store.len(),
            self.library.source()
        );
        let issues = self.library.issues();
        if !issues.is_empty() {
            status.push_str(&format!(" • {} validation issue(s), see log", issues.len()));
        }
        self.set_status(status);

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.should_quit {
                break;
            }
            match event_rx.recv().await {
                Some(AppEvent::Input(event)) => {
                    if let Err(err) = self.handle_input(event) {
                        error!(?err, "Input handling failed");
                        self.set_status(format!("Error: {err}"));
                    }
                }
                Some(AppEvent::Tick) => self.handle_tick(),
                None => break,
            }
        }

        restore_terminal(&mut terminal)
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    fn handle_tick(&mut self) {
        if self.mode == Mode::Filter {
            self.status = format!("Filter: {}", self.filter);
        }
    }

    fn rebuild_options(&mut self) {
        let store = self.library.store();

        let mut modules: BTreeSet<ModuleId> = store.modules();
        modules.extend(self.config.named_modules());
        modules.extend(self.session.active_modules.iter().copied());

        let mut scenarios: BTreeSet<String> = store.scenarios();
        scenarios.extend(self.config.scenarios.iter().cloned());
        if !self.session.scenario.is_empty() {
            scenarios.insert(self.session.scenario.clone());
        }

        let mut variants: BTreeSet<String> = store.variants();
        variants.extend(self.config.variants.iter().cloned());
        variants.extend(self.session.active_variants.iter().cloned());

        self.options = modules
            .into_iter()
            .map(SessionOption::Module)
            .chain(std::iter::once(SessionOption::Scenario(String::new())))
            .chain(scenarios.into_iter().map(SessionOption::Scenario))
            .chain(variants.into_iter().map(SessionOption::Variant))
            .collect();
        self.cursor = self.cursor.min(self.options.len().saturating_sub(1));
    }

    fn toggle_current(&mut self) {
        let Some(option) = self.options.get(self.cursor).cloned() else {
            return;
        };
        match option {
            SessionOption::Module(module) => {
                let active = self.session.toggle_module(module);
                let label = self.config.module_label(module);
                self.set_status(format!(
                    "{label} {}",
                    if active { "enabled" } else { "disabled" }
                ));
            }
            SessionOption::Scenario(name) => {
                self.session.scenario = name;
                let label = scenario_label(&self.session.scenario).to_string();
                self.set_status(format!("Scenario: {label}"));
            }
            SessionOption::Variant(name) => {
                let active = self.session.toggle_variant(&name);
                self.set_status(format!(
                    "Variant {name} {}",
                    if active { "enabled" } else { "disabled" }
                ));
            }
        }
        self.scroll = 0;
        info!(session = %self.session.summary(), "Session changed");
    }

    fn reload_rules(&mut self) {
        match self.library.reload() {
            Ok(store) => {
                self.rebuild_options();
                let issues = self.library.issues().len();
                self.set_status(format!(
                    "Reloaded {} rules ({issues} validation issue(s))",
                    store.len()
                ));
            }
            Err(err) => {
                error!(?err, "Reload failed");
                self.set_status(format!("Reload failed, keeping previous rules: {err:#}"));
            }
        }
    }

    fn save_preset(&mut self) -> Result<()> {
        let name = self.name_input.trim().to_string();
        let entry = self
            .presets
            .create(Some(name.as_str()), &self.session)
            .context("failed to save preset")?;
        info!(path = %entry.path.display(), name = %entry.name, "Preset saved");
        self.set_status(format!("Saved preset: {}", entry.name));
        Ok(())
    }

    fn restore_latest_preset(&mut self) -> Result<()> {
        match self.presets.latest()? {
            Some(entry) => {
                let payload = self.presets.load(&entry)?;
                self.session = payload.into_session();
                self.rebuild_options();
                self.scroll = 0;
                info!(name = %entry.name, "Preset restored");
                self.set_status(format!("Restored preset: {}", entry.name));
            }
            None => self.set_status(format!(
                "No presets in {}",
                self.presets.root().display()
            )),
        }
        Ok(())
    }

    fn handle_input(&mut self, event: Event) -> Result<()> {
        let Event::Key(key) = event else {
            return Ok(());
        };
        match self.mode {
            Mode::Browse => self.handle_browse_key(key),
            Mode::Filter => {
                self.handle_filter_key(key);
                Ok(())
            }
            Mode::NamePrompt => self.handle_name_prompt_key(key),
        }
    }

    fn handle_browse_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc if key.modifiers.is_empty() => {
                self.should_quit = true
            }
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.reload_rules()
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = match self.focus {
                    Focus::Session => Focus::Rules,
                    Focus::Rules => Focus::Session,
                };
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1),
            KeyCode::PageDown => self.move_cursor(10),
            KeyCode::PageUp => self.move_cursor(-10),
            KeyCode::Char(' ') | KeyCode::Enter if self.focus == Focus::Session => {
                self.toggle_current()
            }
            KeyCode::Char('/') => {
                self.mode = Mode::Filter;
                self.set_status("Enter filter text");
            }
            KeyCode::Char('x') => {
                self.show_explain = !self.show_explain;
                self.scroll = 0;
                self.set_status(if self.show_explain {
                    "Showing every rule with its status"
                } else {
                    "Showing the session rulebook"
                });
            }
            KeyCode::Char('s') => {
                self.name_input = default_preset_name(&self.session);
                self.mode = Mode::NamePrompt;
            }
            KeyCode::Char('p') => self.restore_latest_preset()?,
            _ => {}
        }
        Ok(())
    }

    fn move_cursor(&mut self, delta: i32) {
        match self.focus {
            Focus::Session => {
                if self.options.is_empty() {
                    return;
                }
                let max = self.options.len() as i64 - 1;
                let next = (self.cursor as i64 + delta as i64).clamp(0, max);
                self.cursor = next as usize;
            }
            Focus::Rules => {
                let next = (self.scroll as i32 + delta).max(0);
                self.scroll = next.min(u16::MAX as i32) as u16;
            }
        }
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Browse;
                self.filter.clear();
                self.set_status("Filter cleared");
            }
            KeyCode::Enter => {
                self.mode = Mode::Browse;
                self.set_status(format!("Filter applied: {}", self.filter));
            }
            KeyCode::Backspace => {
                self.filter.pop();
                self.scroll = 0;
            }
            KeyCode::Char(c) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    self.filter.push(c);
                    self.scroll = 0;
                }
            }
            _ => {}
        }
    }

    fn handle_name_prompt_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Browse;
                self.set_status("Save cancelled");
            }
            KeyCode::Enter => {
                self.mode = Mode::Browse;
                self.save_preset()?;
            }
            KeyCode::Backspace => {
                self.name_input.pop();
            }
            KeyCode::Char(c) => {
                if (key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT)
                    && self.name_input.chars().count() < MAX_PRESET_NAME_LEN
                {
                    self.name_input.push(c);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(frame.size());

        self.render_header(frame, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(36), Constraint::Min(20)])
            .split(chunks[1]);
        self.render_session_panel(frame, body[0]);
        if self.show_explain {
            self.render_explain_panel(frame, body[1]);
        } else {
            self.render_rulebook_panel(frame, body[1]);
        }

        let status = Paragraph::new(Line::from(vec![
            Span::styled(self.status.clone(), Style::default().fg(self.theme.primary_fg)),
            Span::styled(
                "  tab focus · space toggle · / filter · x explain · s save · p preset · ^r reload · q quit",
                Style::default().fg(self.theme.muted),
            ),
        ]));
        frame.render_widget(status, chunks[2]);

        if self.mode == Mode::NamePrompt {
            self.render_name_prompt(frame);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let store = self.library.store();
        let line = Line::from(vec![
            Span::styled(
                store.meta().display_name(),
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  ·  {}", self.config.session_summary(&self.session)),
                Style::default().fg(self.theme.muted),
            ),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn option_label(&self, option: &SessionOption) -> (String, bool) {
        match option {
            SessionOption::Module(module) => (
                self.config.module_label(*module),
                self.session.active_modules.contains(module),
            ),
            SessionOption::Scenario(name) => (
                format!("Scenario: {}", scenario_label(name)),
                self.session.scenario == *name,
            ),
            SessionOption::Variant(name) => (
                format!("Variant: {name}"),
                self.session.active_variants.contains(name),
            ),
        }
    }

    fn render_session_panel(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .options
            .iter()
            .map(|option| {
                let (label, selected) = self.option_label(option);
                let marker = match (option, selected) {
                    (SessionOption::Scenario(_), true) => "(•) ",
                    (SessionOption::Scenario(_), false) => "( ) ",
                    (_, true) => "[x] ",
                    (_, false) => "[ ] ",
                };
                let style = if selected {
                    Style::default().fg(self.theme.success)
                } else {
                    Style::default().fg(self.theme.primary_fg)
                };
                ListItem::new(Line::from(vec![
                    Span::styled(marker, style.add_modifier(Modifier::BOLD)),
                    Span::styled(label, style),
                ]))
            })
            .collect();

        let mut list_state = ListState::default();
        if !self.options.is_empty() {
            list_state.select(Some(self.cursor));
        }
        let list = List::new(items)
            .block(self.panel_block("Session", Focus::Session))
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn panel_block(&self, title: &str, focus: Focus) -> Block<'static> {
        let border = if self.focus == focus {
            Style::default().fg(self.theme.accent)
        } else {
            Style::default().fg(self.theme.muted)
        };
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title.to_string())
    }

    fn render_rulebook_panel(&self, frame: &mut Frame, area: Rect) {
        let store = self.library.store();
        let book = store.resolve(&self.session);
        let mut lines: Vec<Line> = Vec::new();
        let mut shown = 0;

        for section in book.sections() {
            let rules: Vec<&Rule> = section
                .rules
                .iter()
                .copied()
                .filter(|rule| rule.matches_query(&self.filter))
                .collect();
            if rules.is_empty() {
                continue;
            }
            lines.push(Line::from(Span::styled(
                format!("§ {}", section.label),
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )));
            for rule in rules {
                shown += 1;
                self.push_rule_lines(&mut lines, rule);
            }
        }

        if book.is_empty() {
            lines.push(Line::from(Span::styled(
                "No applicable rules for this session.",
                Style::default().fg(self.theme.warning),
            )));
        } else if shown == 0 {
            lines.push(Line::from(Span::styled(
                format!("No rules match \"{}\".", self.filter),
                Style::default().fg(self.theme.warning),
            )));
        }

        let title = if self.filter.is_empty() {
            format!("Rulebook · {} rules", book.len())
        } else {
            format!("Rulebook · {shown}/{} rules · filter \"{}\"", book.len(), self.filter)
        };
        let paragraph = Paragraph::new(lines)
            .block(self.panel_block(&title, Focus::Rules))
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0));
        frame.render_widget(paragraph, area);
    }

    fn push_rule_lines(&self, lines: &mut Vec<Line<'static>>, rule: &Rule) {
        let mut heading = vec![Span::styled(
            rule.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )];
        if rule.id != rule.section {
            heading.insert(
                0,
                Span::styled(format!("{} ", rule.id), Style::default().fg(self.theme.muted)),
            );
        }
        if let Some(target) = &rule.supersedes {
            heading.push(Span::styled(
                format!("  replaces {target}"),
                Style::default().fg(self.theme.warning),
            ));
        }
        lines.push(Line::from(heading));
        for text in rule.text.lines() {
            lines.push(Line::from(format!("  {text}")));
        }
        let references = rule.cross_references();
        if !references.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("  See also: {}", references.join(", ")),
                Style::default().fg(self.theme.muted),
            )));
        }
        lines.push(Line::from(""));
    }

    fn render_explain_panel(&self, frame: &mut Frame, area: Rect) {
        let store = self.library.store();
        let mut lines: Vec<Line> = Vec::new();
        for (rule, status) in store.explain(&self.session) {
            if !rule.matches_query(&self.filter) {
                continue;
            }
            let (marker, detail, color) = match status {
                RuleStatus::Active => ("✔", "active".to_string(), self.theme.success),
                RuleStatus::Superseded { by } => (
                    "↷",
                    format!("replaced by {}", by.join(", ")),
                    self.theme.warning,
                ),
                RuleStatus::Inapplicable(reasons) => {
                    let reasons: Vec<String> =
                        reasons.iter().map(|reason| reason.to_string()).collect();
                    ("✘", reasons.join("; "), self.theme.danger)
                }
            };
            lines.push(Line::from(vec![
                Span::styled(format!("{marker} "), Style::default().fg(color)),
                Span::styled(
                    format!("{:<5}", rule.id),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!("{}  ", rule.title)),
                Span::styled(detail, Style::default().fg(self.theme.muted)),
            ]));
        }

        let paragraph = Paragraph::new(lines)
            .block(self.panel_block("Rule status", Focus::Rules))
            .wrap(Wrap { trim: true })
            .scroll((self.scroll, 0));
        frame.render_widget(paragraph, area);
    }

    fn render_name_prompt(&self, frame: &mut Frame) {
        let area = centered_rect(60, 5, frame.size());
        frame.render_widget(Clear, area);
        let lines = vec![
            Line::from(format!("{}▏", self.name_input)),
            Line::from(Span::styled(
                "enter save · esc cancel",
                Style::default().fg(self.theme.muted),
            )),
        ];
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.accent))
            .title("Save preset as");
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}

fn scenario_label(name: &str) -> &str {
    if name.is_empty() {
        "none"
    } else {
        name
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}
