use std::error::Error;
use std::io;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::{Frame, Terminal};
use tracing::info;

use sales_dashboard::calendar::{CalendarController, DayMark, Selection};
use sales_dashboard::clock::Clock;
use sales_dashboard::period::{classify, previous_period, ComparisonCard, PeriodClassification, PeriodKey};
use sales_dashboard::range::{days_in_month, first_day_of_month, shift_month, DateRange};
use sales_dashboard::storage::KeyValueStore;
use sales_dashboard::store::{cache_key, DashboardStateStore};

const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);

type Store<S, C> = DashboardStateStore<S, C>;

pub fn run_dashboard<S: KeyValueStore, C: Clock>(store: &mut Store<S, C>, session: &str) -> Result<(), Box<dyn Error>> {
	let initial = store.initialize_default_range();
	info!(session, range = ?initial, "dashboard opened");

	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, store, session);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop<S: KeyValueStore, C: Clock>(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	store: &mut Store<S, C>,
	session: &str,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::new(store.active_range(), store.clock().today());

	loop {
		app.calendar.set_today(store.clock().today());
		let view = build_view(store);
		terminal.draw(|frame| draw_dashboard(frame, &app, &view, session))?;

		if event::poll(StdDuration::from_millis(250))? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				if handle_key(&mut app, key.code, store) {
					break;
				}
			}
		}
	}

	Ok(())
}

fn draw_dashboard(frame: &mut Frame, app: &App, view: &ViewModel, session: &str) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Min(12), Constraint::Length(4)])
		.split(frame.area());

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage(28),
			Constraint::Percentage(40),
			Constraint::Percentage(32),
		])
		.split(layout[0]);

	let left = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(11), Constraint::Min(9)])
		.split(body[0]);

	let right = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(8), Constraint::Min(4)])
		.split(body[2]);

	render_calendar_panel(frame, left[0], app);
	render_shortcuts_panel(frame, left[1], app);
	render_selection_panel(frame, body[1], app, view);
	render_store_panel(frame, right[0], view, session);
	render_cache_panel(frame, right[1], view);
	render_footer(frame, layout[1], app);
}

fn render_calendar_panel(frame: &mut Frame, area: Rect, app: &App) {
	let month = app.calendar.visible_month();
	let today = app.calendar.today();
	let mut lines = Vec::new();
	lines.push(Line::from(format!("{} {}", month.format("%B"), month.year())));
	lines.push(Line::from("Mo Tu We Th Fr Sa Su"));

	let first_weekday = month.weekday().number_from_monday() as usize - 1;
	let days_in_month = days_in_month(month.year(), month.month());
	let mut day_counter = 1u32;
	for week in 0..6 {
		let mut spans = Vec::new();
		for weekday_index in 0..7 {
			let before_first = week == 0 && weekday_index < first_weekday;
			let after_last = day_counter > days_in_month;
			if before_first || after_last {
				spans.push(Span::raw("   "));
				continue;
			}

			let date = NaiveDate::from_ymd_opt(month.year(), month.month(), day_counter)
				.expect("calendar day must be valid");
			let mut style = day_mark_style(app.calendar.mark(date));
			if date == today {
				style = style.add_modifier(Modifier::BOLD);
			}
			if date == app.cursor {
				style = style.add_modifier(Modifier::REVERSED);
			}

			spans.push(Span::styled(format!("{:>2}", day_counter), style));
			spans.push(Span::raw(" "));
			day_counter += 1;
		}
		lines.push(Line::from(spans));
	}

	let block = Block::default()
		.borders(Borders::ALL)
		.title(format!("Calendar | {}", app.calendar.period().label()))
		.border_style(border_style(app.calendar.is_awaiting_manual()));
	let calendar = Paragraph::new(lines).block(block);
	frame.render_widget(calendar, area);
}

fn render_shortcuts_panel(frame: &mut Frame, area: Rect, app: &App) {
	let active = app.calendar.period();
	let items = PeriodKey::ALL
		.iter()
		.enumerate()
		.map(|(index, key)| {
			let style = if *key == active {
				Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD)
			} else {
				Style::default()
			};
			ListItem::new(Line::from(vec![
				Span::styled(format!("{} ", index + 1), Style::default().fg(Color::DarkGray)),
				Span::styled(key.label(), style),
			]))
		})
		.collect::<Vec<_>>();

	let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Periods"));
	frame.render_widget(list, area);
}

fn render_selection_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let mut lines = Vec::new();

	let picked = app.calendar.selected_range();
	lines.push(Line::from(format!("Picked:   {picked}")));
	lines.push(Line::from(format!("Applied:  {}", display_range(view.active.as_ref()))));
	if let Some(original) = view.original.filter(|original| Some(*original) != view.active) {
		lines.push(Line::from(format!("Original: {original}")));
	}
	lines.push(Line::from(""));

	let classification_style = if view.classification.is_valid() {
		Style::default().fg(Color::LightGreen)
	} else {
		Style::default().fg(Color::LightRed)
	};
	lines.push(Line::from(vec![
		Span::raw("Classification: "),
		Span::styled(view.classification.label(), classification_style.add_modifier(Modifier::BOLD)),
	]));
	if let Some(days) = view.active.as_ref().and_then(DateRange::day_count) {
		lines.push(Line::from(format!("Days: {days}")));
	}
	lines.push(Line::from(format!("Compared to: {}", display_range(view.previous.as_ref()))));
	lines.push(Line::from(""));

	match view.card {
		Some(card) => {
			lines.push(Line::from(vec![
				Span::raw("Card: "),
				Span::styled(card.component_name(), Style::default().fg(Color::LightCyan)),
			]));
			let cache_state = match &view.card_cache {
				Some(Some(expires_at)) => format!("cached, expires {}", format_local_time(*expires_at)),
				Some(None) => "cached, never expires".to_string(),
				None => "not cached".to_string(),
			};
			lines.push(Line::from(format!("Cache: {cache_state}")));
		}
		None => lines.push(Line::from("Card: (none renders for this range)")),
	}

	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Selection"));
	frame.render_widget(panel, area);
}

fn render_store_panel(frame: &mut Frame, area: Rect, view: &ViewModel, session: &str) {
	let mut lines = Vec::new();
	lines.push(Line::from(format!("Session: {session}")));
	lines.push(Line::from(format!(
		"Selection: {}",
		if view.user_selected {
			"user"
		} else {
			"auto"
		}
	)));
	if let Some(selected_at) = view.user_selection_timestamp {
		lines.push(Line::from(format!("Selected at: {}", format_local_time(selected_at))));
	}
	lines.push(Line::from(format!("Updated: {}", format_local_time(view.last_updated))));
	lines.push(Line::from(vec![
		Span::raw("State: "),
		if view.state_valid {
			Span::styled("fresh", Style::default().fg(Color::LightGreen))
		} else {
			Span::styled("stale", Style::default().fg(Color::LightRed))
		},
	]));

	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Store"));
	frame.render_widget(panel, area);
}

fn render_cache_panel(frame: &mut Frame, area: Rect, view: &ViewModel) {
	let mut items = view
		.cache_rows
		.iter()
		.map(|row| {
			let style = if row.fresh {
				Style::default()
			} else {
				Style::default().fg(Color::DarkGray)
			};
			ListItem::new(Line::from(vec![
				Span::styled(format!("{:>8} ", row.remaining), style),
				Span::styled(row.key.clone(), style),
			]))
		})
		.collect::<Vec<_>>();

	if items.is_empty() {
		items.push(ListItem::new("(no cached responses)"));
	}

	let title = format!("Cache ({})", view.cache_rows.len());
	let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
	frame.render_widget(list, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
	let footer_lines = vec![
		Line::from("1-7 period | arrows/hjkl move | space pick day | Enter apply pick | n/N month | r restore | c clear cache | q quit"),
		Line::from(app.status.clone()),
	];

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn day_mark_style(mark: DayMark) -> Style {
	match mark {
		DayMark::Outside => Style::default(),
		DayMark::Pending => Style::default().fg(Color::Black).bg(Color::LightCyan),
		DayMark::Start | DayMark::End | DayMark::Single => Style::default()
			.fg(Color::Black)
			.bg(Color::Yellow)
			.add_modifier(Modifier::BOLD),
		DayMark::Inside => Style::default().fg(Color::LightYellow).bg(HIGHLIGHT_BACKGROUND_COLOR),
	}
}

fn handle_key<S: KeyValueStore, C: Clock>(app: &mut App, code: KeyCode, store: &mut Store<S, C>) -> bool {
	match code {
		KeyCode::Char('q') | KeyCode::Esc => true,
		KeyCode::Char(digit @ '1'..='7') => {
			let index = digit as usize - '1' as usize;
			apply_shortcut(app, PeriodKey::ALL[index], store);
			false
		}
		KeyCode::Up | KeyCode::Char('k') => {
			app.move_cursor(-7);
			false
		}
		KeyCode::Down | KeyCode::Char('j') => {
			app.move_cursor(7);
			false
		}
		KeyCode::Left | KeyCode::Char('h') => {
			app.move_cursor(-1);
			false
		}
		KeyCode::Right | KeyCode::Char('l') => {
			app.move_cursor(1);
			false
		}
		KeyCode::Char('n') => {
			app.shift_visible_month(1);
			false
		}
		KeyCode::Char('N') => {
			app.shift_visible_month(-1);
			false
		}
		KeyCode::Char(' ') => {
			app.status = match app.calendar.handle_day_click(app.cursor.day()) {
				Selection::PendingStart(start) => format!("Start {start}, pick the end day"),
				Selection::Complete { from, to } => {
					format!("Picked {}, Enter applies", DateRange::new(Some(from), Some(to)))
				}
				Selection::Empty => "Nothing picked".to_string(),
			};
			false
		}
		KeyCode::Enter => {
			apply_manual_selection(app, store);
			false
		}
		KeyCode::Char('r') => {
			app.status = match store.restore_original_date_range() {
				Some(original) => {
					app.reseed(original);
					format!("Restored {original}")
				}
				None => "No original range to restore".to_string(),
			};
			false
		}
		KeyCode::Char('c') => {
			let removed = store.clear_api_cache(None);
			app.status = format!("Cleared {removed} cached response(s)");
			false
		}
		_ => false,
	}
}

fn apply_shortcut<S: KeyValueStore, C: Clock>(app: &mut App, key: PeriodKey, store: &mut Store<S, C>) {
	let mut outcome = None;
	let range = app
		.calendar
		.handle_period_change_and_apply(key, |range| outcome = Some(store.set_original_date_range(range, true)));

	if let Some(from) = range.and_then(|range| range.from) {
		app.cursor = from;
	}

	app.status = match (range, outcome) {
		(Some(range), Some(Ok(()))) => format!("{} applied: {range}", key.label()),
		(_, Some(Err(err))) => format!("Rejected {}: {err}", key.label()),
		_ => "Custom: pick two days with space, Enter applies".to_string(),
	};
}

fn apply_manual_selection<S: KeyValueStore, C: Clock>(app: &mut App, store: &mut Store<S, C>) {
	let selection = app.calendar.selection();
	if !selection.is_complete() {
		app.status = "Pick a start and an end day first".to_string();
		return;
	}

	let range = selection.range();
	app.status = match store.set_original_date_range(range, true) {
		Ok(()) => format!("Applied {range} ({})", classify(&range).label()),
		Err(err) => format!("Rejected {range}: {err}"),
	};
}

fn build_view<S: KeyValueStore, C: Clock>(store: &Store<S, C>) -> ViewModel {
	let now = store.clock().now();
	let state = store.state();
	let active = store.active_range();
	let classification = active
		.as_ref()
		.map(classify)
		.unwrap_or(PeriodClassification::Invalid);
	let card = active.as_ref().and_then(ComparisonCard::for_range);
	let card_cache = card.and_then(|card| {
		let key = cache_key(card.component_name(), active.as_ref());
		state
			.api_responses
			.get(&key)
			.filter(|entry| entry.is_fresh(now))
			.map(|entry| entry.expires_at())
	});

	let cache_rows = store
		.cache_entries()
		.map(|(key, entry)| CacheRow {
			key: key.to_string(),
			remaining: entry
				.expires_at()
				.map(|expires_at| format_remaining(expires_at - now))
				.unwrap_or_else(|| "never".to_string()),
			fresh: entry.is_fresh(now),
		})
		.collect();

	ViewModel {
		active,
		original: state.original_date_range,
		classification,
		previous: active.as_ref().and_then(previous_period),
		card,
		card_cache,
		user_selected: state.is_user_selected,
		user_selection_timestamp: state.user_selection_timestamp,
		last_updated: state.last_updated,
		state_valid: store.is_state_valid(),
		cache_rows,
	}
}

fn display_range(range: Option<&DateRange>) -> String {
	range
		.map(ToString::to_string)
		.unwrap_or_else(|| "(none)".to_string())
}

fn format_local_time(instant: DateTime<Utc>) -> String {
	instant.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn format_remaining(remaining: Duration) -> String {
	if remaining <= Duration::zero() {
		return "expired".to_string();
	}
	let seconds = remaining.num_seconds();
	if seconds >= 3600 {
		format!("{}h{:02}m", seconds / 3600, (seconds % 3600) / 60)
	} else {
		format!("{}m{:02}s", seconds / 60, seconds % 60)
	}
}

fn border_style(focused: bool) -> Style {
	if focused {
		Style::default()
			.fg(FOCUSED_PANEL_BORDER_COLOR)
			.add_modifier(Modifier::BOLD)
	} else {
		Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
	}
}

#[derive(Debug, Clone)]
struct App {
	calendar: CalendarController,
	cursor: NaiveDate,
	status: String,
}

impl App {
	fn new(applied: Option<DateRange>, today: NaiveDate) -> Self {
		let calendar = match applied {
			Some(range) => CalendarController::with_range(&range, today),
			None => CalendarController::new(today),
		};
		let cursor = applied.and_then(|range| range.from).unwrap_or(today);
		Self {
			calendar,
			cursor,
			status: "Ready".to_string(),
		}
	}

	fn reseed(&mut self, range: DateRange) {
		let today = self.calendar.today();
		self.calendar = CalendarController::with_range(&range, today);
		if let Some(from) = range.from {
			self.cursor = from;
		}
	}

	fn move_cursor(&mut self, delta_days: i64) {
		self.cursor += Duration::days(delta_days);
		self.follow_cursor();
	}

	fn shift_visible_month(&mut self, delta_months: i32) {
		self.cursor = shift_month(self.cursor, delta_months);
		self.follow_cursor();
	}

	/// Keeps the visible month on the cursor so a click always lands inside it.
	fn follow_cursor(&mut self) {
		let target = first_day_of_month(self.cursor);
		while self.calendar.visible_month() < target {
			self.calendar.handle_next_month();
		}
		while self.calendar.visible_month() > target {
			self.calendar.handle_previous_month();
		}
	}
}

struct ViewModel {
	active: Option<DateRange>,
	original: Option<DateRange>,
	classification: PeriodClassification,
	previous: Option<DateRange>,
	card: Option<ComparisonCard>,
	/// Expiry of the active card's fresh entry; the inner `None` means it never expires.
	card_cache: Option<Option<DateTime<Utc>>>,
	user_selected: bool,
	user_selection_timestamp: Option<DateTime<Utc>>,
	last_updated: DateTime<Utc>,
	state_valid: bool,
	cache_rows: Vec<CacheRow>,
}

struct CacheRow {
	key: String,
	remaining: String,
	fresh: bool,
}

pub fn print_state<S: KeyValueStore, C: Clock>(store: &Store<S, C>) {
	let view = build_view(store);
	println!("applied:        {}", display_range(view.active.as_ref()));
	println!("original:       {}", display_range(view.original.as_ref()));
	println!("classification: {}", view.classification);
	println!("compared to:    {}", display_range(view.previous.as_ref()));
	println!(
		"card:           {}",
		view.card.map(ComparisonCard::component_name).unwrap_or("(none)")
	);
	println!(
		"selection:      {}{}",
		if view.user_selected { "user" } else { "auto" },
		view.user_selection_timestamp
			.map(|selected_at| format!(" at {}", selected_at.to_rfc3339()))
			.unwrap_or_default()
	);
	println!(
		"last updated:   {} ({})",
		view.last_updated.to_rfc3339(),
		if view.state_valid { "fresh" } else { "stale" }
	);

	if view.cache_rows.is_empty() {
		println!("no cached responses");
		return;
	}
	println!("cache:");
	for row in &view.cache_rows {
		println!("{:>8} | {}", row.remaining, row.key);
	}
}
