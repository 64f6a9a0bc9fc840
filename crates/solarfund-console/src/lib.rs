//! Colorful console output for allocation runs.
//!
//! Provides a custom `tracing` layer that formats allocation events with colors.
//!
//! ## Log Levels
//!
//! - **INFO**: Lifecycle events (allocation/fund start/end)
//! - **WARN**: Skipped conditions and failed funds
//! - **DEBUG**: Budget initialization
//! - **TRACE**: Individual admissions and rejections

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::layer::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();
static EPOCH: OnceLock<Instant> = OnceLock::new();
static RUN_START_NANOS: AtomicU64 = AtomicU64::new(0);

/// Package version for banner display.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes the allocation console output.
///
/// Safe to call multiple times - only the first call has effect.
/// Prints the SolarFund banner and sets up tracing.
pub fn init() {
    INIT.get_or_init(|| {
        print_banner();

        let filter = EnvFilter::builder()
            .with_default_directive(directive("solarfund_engine=info"))
            .from_env_lossy()
            .add_directive(directive("solarfund_config=warn"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(AllocationConsoleLayer)
            .try_init();
    });
}

fn directive(s: &str) -> Directive {
    s.parse().unwrap_or_else(|_| LevelFilter::INFO.into())
}

// Marks the start of a run for elapsed time tracking.
fn mark_run_start() {
    let epoch = EPOCH.get_or_init(Instant::now);
    let nanos = epoch.elapsed().as_nanos() as u64;
    RUN_START_NANOS.store(nanos, Ordering::Relaxed);
}

// Returns elapsed time since run start.
fn elapsed_secs() -> f64 {
    let Some(epoch) = EPOCH.get() else {
        return 0.0;
    };
    let start_nanos = RUN_START_NANOS.load(Ordering::Relaxed);
    let now_nanos = epoch.elapsed().as_nanos() as u64;
    now_nanos.saturating_sub(start_nanos) as f64 / 1_000_000_000.0
}

fn print_banner() {
    let banner = r#"
 ____        _            _____                _
/ ___|  ___ | | __ _ _ __|  ___|   _ _ __   __| |
\___ \ / _ \| |/ _` | '__| |_ | | | | '_ \ / _` |
 ___) | (_) | | (_| | |  |  _|| |_| | | | | (_| |
|____/ \___/|_|\__,_|_|  |_|   \__,_|_| |_|\__,_|
"#;

    let version_line = format!(
        "              v{} - Constraint-Capped Fund Allocation\n",
        VERSION
    );

    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", banner.bright_yellow());
    let _ = writeln!(stdout, "{}", version_line.bright_white().bold());
    let _ = stdout.flush();
}

/// A tracing layer that formats allocation events with colors.
pub struct AllocationConsoleLayer;

impl<S: Subscriber> Layer<S> for AllocationConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();

        if !target.starts_with("solarfund_engine")
            && !target.starts_with("solarfund_config")
            && !target.starts_with("solarfund::")
        {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let level = *metadata.level();
        let output = format_event(&visitor, level);
        if !output.is_empty() {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }
}

#[derive(Default)]
struct EventVisitor {
    event: Option<String>,
    fund: Option<String>,
    budget: Option<String>,
    system: Option<String>,
    error: Option<String>,
    systems: Option<u64>,
    backlog: Option<u64>,
    funds: Option<u64>,
    budgets: Option<u64>,
    eligible: Option<u64>,
    allocated: Option<u64>,
    unallocated: Option<u64>,
    rejected: Option<u64>,
    failed: Option<u64>,
    target: Option<f64>,
    previously_allocated: Option<f64>,
    remaining: Option<f64>,
    allocated_fmv: Option<f64>,
    percent_of_target: Option<f64>,
    cap: Option<f64>,
    fmv: Option<f64>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let s = format!("{:?}", value);
        self.record_str(field, s.trim_matches('"'));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "systems" => self.systems = Some(value),
            "backlog" => self.backlog = Some(value),
            "funds" => self.funds = Some(value),
            "budgets" => self.budgets = Some(value),
            "eligible" => self.eligible = Some(value),
            "allocated" => self.allocated = Some(value),
            "unallocated" => self.unallocated = Some(value),
            "rejected" => self.rejected = Some(value),
            "failed" => self.failed = Some(value),
            _ => self.record_f64(field, value as f64),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_u64(field, value.max(0) as u64);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        match field.name() {
            "target" => self.target = Some(value),
            "previously_allocated" => self.previously_allocated = Some(value),
            "remaining" => self.remaining = Some(value),
            "allocated_fmv" => self.allocated_fmv = Some(value),
            "percent_of_target" => self.percent_of_target = Some(value),
            "cap" => self.cap = Some(value),
            "fmv" => self.fmv = Some(value),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "event" => self.event = Some(value.to_string()),
            "fund" => self.fund = Some(value.to_string()),
            "budget" => self.budget = Some(value.to_string()),
            "system" => self.system = Some(value.to_string()),
            "error" | "err" => self.error = Some(value.to_string()),
            _ => {}
        }
    }
}

fn format_event(v: &EventVisitor, level: Level) -> String {
    let event = v.event.as_deref().unwrap_or("");

    match event {
        "allocation_start" => format_allocation_start(v),
        "allocation_end" => format_allocation_end(v),
        "fund_start" => format_fund_start(v),
        "fund_end" => format_fund_end(v),
        "fund_failed" => format_fund_failed(v),
        "condition_skipped" => format_condition_skipped(v),
        "budget_initialized" => format_budget(v),
        "admit" | "reject" => format_decision(v, event == "admit", level),
        _ => String::new(),
    }
}

fn format_elapsed() -> String {
    format!("{:>7.3}s", elapsed_secs())
        .bright_black()
        .to_string()
}

fn format_allocation_start(v: &EventVisitor) -> String {
    mark_run_start();
    let systems = v.systems.unwrap_or(0);
    let backlog = v.backlog.unwrap_or(0);
    let funds = v.funds.unwrap_or(0);

    format!(
        "{} {} Allocating │ {} systems │ {} in backlog │ {} funds",
        format_elapsed(),
        "▶".bright_green().bold(),
        systems.to_formatted_string(&Locale::en).bright_yellow(),
        backlog.to_formatted_string(&Locale::en).bright_yellow(),
        funds.to_formatted_string(&Locale::en).bright_yellow(),
    )
}

fn format_allocation_end(v: &EventVisitor) -> String {
    let allocated = v.allocated.unwrap_or(0);
    let unallocated = v.unallocated.unwrap_or(0);
    let failed = v.failed.unwrap_or(0);
    let fmv = v.allocated_fmv.unwrap_or(0.0);

    let status = if failed == 0 {
        "COMPLETE".bright_green().bold().to_string()
    } else {
        format!("{} FUND(S) FAILED", failed).bright_red().bold().to_string()
    };

    let mut output = format!(
        "{} {} Allocation complete │ {} systems │ {} FMV │ {}",
        format_elapsed(),
        "■".bright_cyan().bold(),
        allocated.to_formatted_string(&Locale::en).white(),
        format_money(fmv).bright_magenta().bold(),
        status
    );

    // Summary box
    let inner_width: usize = 58;
    let border = "═".repeat(inner_width);
    output.push_str("\n\n");
    output.push_str(&format!("╔{}╗", border).bright_cyan().to_string());
    output.push('\n');
    for (label, value) in [
        ("Systems allocated:", allocated.to_formatted_string(&Locale::en)),
        ("Systems unallocated:", unallocated.to_formatted_string(&Locale::en)),
        ("FMV allocated:", format_money(fmv)),
    ] {
        output.push_str(&format!(
            "{}  {:<22}{:>32}  {}",
            "║".bright_cyan(),
            label,
            value,
            "║".bright_cyan()
        ));
        output.push('\n');
    }
    output.push_str(&format!("╚{}╝", border).bright_cyan().to_string());
    output.push('\n');

    output
}

fn format_fund_start(v: &EventVisitor) -> String {
    let fund = v.fund.as_deref().unwrap_or("Unknown");
    let target = v.target.unwrap_or(0.0);
    let remaining = v.remaining.unwrap_or(0.0);
    let budgets = v.budgets.unwrap_or(0);
    let eligible = v.eligible.unwrap_or(0);

    let mut output = format!(
        "{} {} {} │ target {} │ {} open",
        format_elapsed(),
        "▶".bright_blue(),
        fund.white().bold(),
        format_money(target).yellow(),
        format_money(remaining).bright_yellow(),
    );

    if let Some(held) = v.previously_allocated.filter(|h| *h > 0.0) {
        output.push_str(&format!(" │ {} held", format_money(held).white()));
    }

    output.push_str(&format!(
        " │ {} budgets │ {} eligible",
        budgets.to_formatted_string(&Locale::en).white(),
        eligible.to_formatted_string(&Locale::en).white(),
    ));

    output
}

fn format_fund_end(v: &EventVisitor) -> String {
    let fund = v.fund.as_deref().unwrap_or("Unknown");
    let allocated = v.allocated.unwrap_or(0);
    let fmv = v.allocated_fmv.unwrap_or(0.0);
    let percent = v.percent_of_target.unwrap_or(0.0);
    let rejected = v.rejected.unwrap_or(0);

    let mut output = format!(
        "{} {} {} │ {} systems │ {} │ {}",
        format_elapsed(),
        "◀".bright_blue(),
        fund.white().bold(),
        allocated.to_formatted_string(&Locale::en).white(),
        format_money(fmv).bright_magenta().bold(),
        format_percent(percent),
    );

    if rejected > 0 {
        output.push_str(&format!(
            " │ {} rejection reasons",
            rejected.to_formatted_string(&Locale::en).yellow()
        ));
    }

    output
}

fn format_fund_failed(v: &EventVisitor) -> String {
    let fund = v.fund.as_deref().unwrap_or("Unknown");
    let error = v.error.as_deref().unwrap_or("unknown error");

    format!(
        "{} {} {} │ {}",
        format_elapsed(),
        "✗".bright_red().bold(),
        fund.white().bold(),
        error.bright_red()
    )
}

fn format_condition_skipped(v: &EventVisitor) -> String {
    let error = v.error.as_deref().unwrap_or("unusable condition");

    format!(
        "{} {} skipped {}",
        format_elapsed(),
        "!".yellow().bold(),
        error.yellow()
    )
}

fn format_budget(v: &EventVisitor) -> String {
    let budget = v.budget.as_deref().unwrap_or("Unknown");
    let cap = v.cap.unwrap_or(0.0);
    let remaining = v.remaining.unwrap_or(0.0);

    format!(
        "{} {} {:<24} │ cap {:>16} │ open {:>16}",
        format_elapsed(),
        "·".bright_black(),
        budget.white(),
        format_money(cap),
        format_money(remaining).bright_yellow(),
    )
}

fn format_decision(v: &EventVisitor, admitted: bool, level: Level) -> String {
    if level != Level::TRACE {
        return String::new();
    }

    let system = v.system.as_deref().unwrap_or("?");
    let fund = v.fund.as_deref().unwrap_or("?");
    let fmv = v.fmv.unwrap_or(0.0);

    let icon = if admitted {
        "✓".bright_green().to_string()
    } else {
        "✗".bright_red().to_string()
    };

    format!(
        "{} {} {:<16} → {:<16} │ {}",
        format_elapsed(),
        icon,
        system.bright_black(),
        fund.bright_black(),
        format_money(fmv).bright_black()
    )
}

fn format_money(amount: f64) -> String {
    let whole = amount.abs().round() as u64;
    let sign = if amount < 0.0 && whole > 0 { "-" } else { "" };
    format!("{}${}", sign, whole.to_formatted_string(&Locale::en))
}

fn format_percent(percent: f64) -> String {
    let text = format!("{:.1}% of target", percent);
    if percent >= 99.95 {
        text.bright_green().to_string()
    } else if percent >= 50.0 {
        text.yellow().to_string()
    } else {
        text.bright_red().to_string()
    }
}
