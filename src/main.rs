mod ui;

use std::error::Error;
use std::path::{Path, PathBuf};

use chrono::Duration;
use clap::{Parser, Subcommand};
use serde_json::Value;

use sales_dashboard::clock::{Clock, SystemClock};
use sales_dashboard::config::Config;
use sales_dashboard::period::{classify, previous_period, ComparisonCard, PeriodKey};
use sales_dashboard::range::DateRange;
use sales_dashboard::sessions::{list_sessions, log_file, resolve_state_dir, session_dir, DEFAULT_SESSION};
use sales_dashboard::storage::FileStorage;
use sales_dashboard::store::{cache_key, DashboardStateStore};

use crate::ui::{print_state, run_dashboard};

#[derive(Debug, Parser)]
#[command(name = "sales-dashboard", about = "Date-range selection and dashboard state for sales reports")]
struct Cli {
	#[arg(long)]
	state_dir: Option<PathBuf>,
	#[arg(long, default_value = DEFAULT_SESSION)]
	session: String,
	#[arg(long)]
	config: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Dashboard,
	/// Classify a range without touching any session.
	Classify {
		#[arg(long)]
		from: String,
		#[arg(long)]
		to: String,
	},
	/// Show the range a period shortcut resolves to today.
	Period {
		key: String,
		#[arg(long)]
		apply: bool,
	},
	Select {
		#[arg(long)]
		from: String,
		#[arg(long)]
		to: String,
		/// Only change the range on screen, keeping the original for `restore`.
		#[arg(long)]
		current: bool,
		#[arg(long)]
		force_user: bool,
	},
	Restore,
	State,
	CacheGet {
		#[arg(long)]
		component: String,
		#[arg(long)]
		from: Option<String>,
		#[arg(long)]
		to: Option<String>,
	},
	CachePut {
		#[arg(long)]
		component: String,
		#[arg(long)]
		from: Option<String>,
		#[arg(long)]
		to: Option<String>,
		/// JSON payload to cache.
		#[arg(long)]
		payload: String,
		#[arg(long)]
		ttl_minutes: Option<i64>,
	},
	CacheClear {
		#[arg(long)]
		pattern: Option<String>,
	},
	Reset,
	Sessions,
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	let state_dir = resolve_state_dir(cli.state_dir);
	let config = Config::resolve(cli.config.as_deref(), &state_dir)?;
	let command = cli.command.unwrap_or(Command::Dashboard);

	// The dashboard owns the terminal, so its logs go to a file.
	let fallback_log = matches!(command, Command::Dashboard).then(|| log_file(&state_dir));
	config.logging.init(fallback_log.as_deref())?;

	match &command {
		Command::Classify { from, to } => {
			print_classification(from, to);
			return Ok(());
		}
		Command::Sessions => {
			print_sessions(&state_dir)?;
			return Ok(());
		}
		_ => {}
	}

	let storage = FileStorage::new(session_dir(&state_dir, &cli.session)?);
	let mut store: DashboardStateStore<FileStorage, SystemClock> =
		DashboardStateStore::load(storage, SystemClock, config.store_settings()?);

	match command {
		Command::Dashboard => {
			run_dashboard(&mut store, &cli.session)?;
		}
		Command::Period { key, apply } => {
			let key = key.parse::<PeriodKey>()?;
			let Some(range) = key.range(store.clock().today()) else {
				println!("{}: pick the days manually", key.label());
				return Ok(());
			};
			println!("{} | {} | {}", key.label(), range, classify(&range));
			if apply {
				store.set_original_date_range(range, true)?;
				println!("applied to session {}", cli.session);
			}
		}
		Command::Select {
			from,
			to,
			current,
			force_user,
		} => {
			let range = parse_range(&from, &to)?;
			if current {
				store.set_current_date_range(range)?;
				println!("showing {range}");
			} else {
				store.set_original_date_range(range, force_user)?;
				println!(
					"selected {range} ({}, {})",
					classify(&range),
					if store.state().is_user_selected { "user" } else { "auto" }
				);
			}
		}
		Command::Restore => match store.restore_original_date_range() {
			Some(range) => println!("restored {range}"),
			None => println!("no original range to restore"),
		},
		Command::State => {
			print_state(&store);
		}
		Command::CacheGet { component, from, to } => {
			let range = optional_range(from.as_deref(), to.as_deref())?;
			match store.get_cached_api_response(&component, range.as_ref()) {
				Some(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
				None => println!("cache miss: {}", cache_key(&component, range.as_ref())),
			}
		}
		Command::CachePut {
			component,
			from,
			to,
			payload,
			ttl_minutes,
		} => {
			let range = optional_range(from.as_deref(), to.as_deref())?;
			let payload: Value = serde_json::from_str(&payload)?;
			match ttl_minutes {
				Some(minutes) if minutes <= 0 => return Err("--ttl-minutes must be greater than 0".into()),
				Some(minutes) => {
					let ttl = Duration::try_minutes(minutes).ok_or("--ttl-minutes is too large")?;
					store.set_cached_api_response_with_ttl(&component, range.as_ref(), payload, ttl)
				}
				None => store.set_cached_api_response(&component, range.as_ref(), payload),
			}
			println!("cached {}", cache_key(&component, range.as_ref()));
		}
		Command::CacheClear { pattern } => {
			let removed = store.clear_api_cache(pattern.as_deref());
			println!("removed {removed} cached response(s)");
		}
		Command::Reset => {
			store.clear_dashboard_state();
			println!("cleared session {}", cli.session);
		}
		Command::Classify { .. } | Command::Sessions => {}
	}

	Ok(())
}

fn print_classification(from: &str, to: &str) {
	let Some(range) = DateRange::parse_iso(from, to) else {
		println!("{from} .. {to} | {}", classify(&DateRange::empty()));
		return;
	};

	println!("{range} | {}", classify(&range));
	if let Some(days) = range.day_count() {
		println!("days:        {days}");
	}
	if let Some(previous) = previous_period(&range) {
		println!("compared to: {previous}");
	}
	match ComparisonCard::for_range(&range) {
		Some(card) => println!("card:        {}", card.component_name()),
		None => println!("card:        (none)"),
	}
}

fn print_sessions(state_dir: &Path) -> Result<(), Box<dyn Error>> {
	let rows = list_sessions(state_dir)?;
	if rows.is_empty() {
		println!("no sessions in {}", state_dir.display());
		return Ok(());
	}

	for (index, name) in rows.iter().enumerate() {
		println!("{:>2}. {}", index + 1, name);
	}

	Ok(())
}

fn parse_range(from: &str, to: &str) -> Result<DateRange, Box<dyn Error>> {
	DateRange::parse_iso(from, to).ok_or_else(|| format!("invalid date range: {from} .. {to}").into())
}

fn optional_range(from: Option<&str>, to: Option<&str>) -> Result<Option<DateRange>, Box<dyn Error>> {
	match (from, to) {
		(Some(from), Some(to)) => Ok(Some(parse_range(from, to)?)),
		(None, None) => Ok(None),
		_ => Err("pass both --from and --to, or neither".into()),
	}
}
