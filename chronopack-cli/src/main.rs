use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod seed;
mod state;

use chronopack_core::{BlockKind, BlockStatus};
use chronopack_driver::{InMemoryNotificationSink, PeriodicDriver};
use chronopack_store::{DailySchedulePlanRepository, MoveBlockRequest, PlanMutator};

#[derive(Parser, Debug)]
#[command(name = "chronopack", version, about = "Capacity-aware task scheduling engine demonstrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write ~/.chronopack/config.toml with defaults if it doesn't exist yet.
    ConfigInit,

    /// Seed a demo task set and generate a multi-day plan.
    Plan {
        /// First day of the horizon (defaults to today).
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Number of days to pack (defaults to the configured value).
        #[arg(long)]
        max_days: Option<u32>,

        /// Truncate today to the current minute and emit ghost blocks for
        /// tasks already completed earlier today.
        #[arg(long)]
        from_now: bool,

        /// Skip the "my tasks" assignment/visibility projection.
        #[arg(long)]
        no_filter_by_assignee: bool,

        /// Skip applying the schedule-snapshot window constraints.
        #[arg(long)]
        no_apply_plan_constraints: bool,
    },

    /// Show just today's tasks, from a stored plan or a fresh forecast.
    Today {
        /// Date to treat as "today" (defaults to the real today).
        #[arg(long)]
        target_date: Option<NaiveDate>,
    },

    /// Generate a plan, then move or resize one of its auto blocks.
    MoveBlock {
        /// Date of the block to move (defaults to today).
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Index of the block within that day's time_blocks list.
        #[arg(long)]
        index: usize,

        /// Destination date (defaults to the same date: a same-day resize).
        #[arg(long)]
        target_date: Option<NaiveDate>,

        /// New start instant, RFC 3339 (e.g. 2026-07-28T14:00:00Z).
        #[arg(long)]
        new_start: chrono::DateTime<Utc>,

        /// New end instant, RFC 3339.
        #[arg(long)]
        new_end: chrono::DateTime<Utc>,
    },

    /// Run one pass of each periodic job (daily generation, heartbeat,
    /// weekly retrospective) against the demo dataset and report what fired.
    DriverTick,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::ConfigInit => config::init_config()?,

        Command::Plan { start, max_days, from_now, no_filter_by_assignee, no_apply_plan_constraints } => {
            let cfg = config::load_config()?;
            let demo = seed::build(&cfg.scheduling.timezone, cfg.scheduling.buffer_hours, cfg.scheduling.break_after_task_minutes).await;

            let start_date = start.unwrap_or_else(|| Utc::now().date_naive());
            let max_days = max_days.unwrap_or(cfg.scheduling.max_days);

            let plans = demo
                .generator
                .build_plan(demo.user_id, start_date, max_days, from_now, !no_filter_by_assignee, !no_apply_plan_constraints)
                .await
                .context("building schedule")?;

            print_plans(&plans);
        }

        Command::Today { target_date } => {
            let cfg = config::load_config()?;
            let demo = seed::build(&cfg.scheduling.timezone, cfg.scheduling.buffer_hours, cfg.scheduling.break_after_task_minutes).await;

            let today = target_date.unwrap_or_else(|| Utc::now().date_naive());
            let lookup = demo
                .generator
                .get_plan_or_forecast(demo.user_id, today, today, true, true)
                .await
                .context("looking up today's plan")?;

            println!("# Today ({today})\n");
            println!("state: {:?}", lookup.state);
            if !lookup.pending_changes.is_empty() {
                println!("pending changes: {}", lookup.pending_changes.len());
                for change in &lookup.pending_changes {
                    println!("  - {:?} {}", change.kind, change.task_id);
                }
            }
            println!();
            print_plans(&lookup.plans);
        }

        Command::MoveBlock { date, index, target_date, new_start, new_end } => {
            let cfg = config::load_config()?;
            let demo = seed::build(&cfg.scheduling.timezone, cfg.scheduling.buffer_hours, cfg.scheduling.break_after_task_minutes).await;

            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let target_date = target_date.unwrap_or(date);

            let span_days = (target_date - date).num_days().unsigned_abs() as u32 + 1;
            demo.generator
                .build_plan(demo.user_id, date.min(target_date), span_days, false, false, false)
                .await
                .context("building schedule to mutate")?;

            let mutator = PlanMutator { task_repo: demo.task_repo.clone(), plan_repo: demo.plan_repo.clone() };
            mutator
                .move_time_block(MoveBlockRequest { user_id: demo.user_id, date, block_index: index, target_date, new_start, new_end })
                .await
                .context("moving time block")?;

            println!("Moved block {index} on {date} -> {target_date} [{new_start} .. {new_end}]\n");
            let source = demo.plan_repo.get_by_date(demo.user_id, date).await?;
            if let Some(plan) = source {
                print_plans(&[plan]);
            }
            if target_date != date {
                if let Some(plan) = demo.plan_repo.get_by_date(demo.user_id, target_date).await? {
                    print_plans(&[plan]);
                }
            }
        }

        Command::DriverTick => {
            let cfg = config::load_config()?;
            let demo = seed::build(&cfg.scheduling.timezone, cfg.scheduling.buffer_hours, cfg.scheduling.break_after_task_minutes).await;

            let notifications = Arc::new(InMemoryNotificationSink::new());
            let driver = Arc::new(PeriodicDriver::new(
                demo.generator.clone(),
                demo.settings_repo.clone(),
                demo.task_repo.clone(),
                demo.user_repo.clone(),
                notifications.clone(),
                true,
            ));

            driver.clone().run_daily_plan_generation().await;
            driver.clone().run_heartbeat_checks().await;
            driver.run_weekly_retrospective().await;

            let events = notifications.events().await;
            println!("# Driver tick\n");
            println!("daily plan rows for user: {}", demo.plan_repo.get_range(demo.user_id, Utc::now().date_naive(), Utc::now().date_naive()).await?.len());
            println!("notifications sent: {}", events.len());
            for event in &events {
                println!("  - [{:?}] task {} — {}", event.severity, event.task_id, event.message);
            }
        }
    }

    Ok(())
}

fn print_plans(plans: &[chronopack_store::DailySchedulePlan]) {
    for plan in plans {
        println!("## {} (group {})", plan.plan_date, plan.plan_group_id);
        let Some(day) = &plan.schedule_day else {
            println!("  (no schedule day materialised)\n");
            continue;
        };
        println!(
            "  capacity={}m allocated={}m overflow={}m meetings={}m available={}m",
            day.capacity_minutes, day.allocated_minutes, day.overflow_minutes, day.meeting_minutes, day.available_minutes
        );
        if !day.pinned_overflow_task_ids.is_empty() {
            println!("  pinned overflow: {:?}", day.pinned_overflow_task_ids);
        }
        for block in &day.time_blocks {
            let kind = match block.kind {
                BlockKind::Meeting => "meeting",
                BlockKind::Auto => "auto",
            };
            let status = match block.status {
                BlockStatus::Scheduled => "scheduled",
                BlockStatus::Ghost => "ghost",
            };
            println!(
                "  [{kind}/{status}] {} .. {}  task={}",
                block.start.to_rfc3339(),
                block.end.to_rfc3339(),
                block.task_id
            );
        }
        if !plan.unscheduled_task_ids.is_empty() {
            println!("  unscheduled: {:?}", plan.unscheduled_task_ids);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_plan_with_defaults() {
        let cli = Cli::parse_from(["chronopack", "plan"]);
        match cli.command {
            Command::Plan { start, max_days, from_now, .. } => {
                assert!(start.is_none());
                assert!(max_days.is_none());
                assert!(!from_now);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_parses_move_block() {
        let cli = Cli::parse_from([
            "chronopack",
            "move-block",
            "--index",
            "0",
            "--new-start",
            "2026-07-28T09:00:00Z",
            "--new-end",
            "2026-07-28T10:00:00Z",
        ]);
        match cli.command {
            Command::MoveBlock { index, .. } => assert_eq!(index, 0),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
