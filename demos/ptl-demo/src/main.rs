//! Periodic task layer demonstration.
//!
//! Runs a small task set under the layer for a bounded window, then dumps
//! the trace and statistics. The default scenario is the three-task
//! showcase: a well-behaved sensor, a rogue image processor that gets
//! killed, and a logger that runs late under the SKIP policy.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;

use ptl::{GlobalConfig, JobFn, OverrunPolicy, TaskConfig};
use ptl_kernel::burn;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Scenario {
    /// Sensor + ImgProc (KILL) + Logger (SKIP), global CATCH_UP.
    Demo,
    /// One task overrunning every period under SKIP.
    Skip,
    /// One task overrunning every period under KILL.
    Kill,
    /// One task overrunning every period under CATCH_UP.
    Catchup,
}

#[derive(Parser, Debug)]
#[command(name = "ptl-demo")]
#[command(about = "Periodic task layer demonstration", long_about = None)]
struct Args {
    /// Scenario to run
    #[arg(short, long, value_enum, default_value_t = Scenario::Demo)]
    scenario: Scenario,

    /// Observation window in milliseconds
    #[arg(short, long, default_value_t = 2000)]
    duration: u64,
}

fn burn_job(ms: u32) -> JobFn {
    Arc::new(move |_arg| burn::burn(ms))
}

/// Runs quickly and finishes well before its deadline.
fn job_sensor() -> JobFn {
    Arc::new(|_arg| {
        println!("[SENSOR] Reading data... (10ms work)");
        burn::burn(10);
        println!("[SENSOR] Done.");
    })
}

/// Intentionally exceeds its deadline; the supervisor kills it.
fn job_image_proc() -> JobFn {
    Arc::new(|_arg| {
        println!("[IMG_PROC] Processing heavy frame... (will exceed deadline)");
        burn::burn(80);
        // A working KILL policy never lets execution get this far.
        println!("{}", "[FAIL] ImgProc finished! (should have been killed)".red());
    })
}

/// Runs late but is allowed to finish; the next release is skipped.
fn job_logger() -> JobFn {
    Arc::new(|_arg| {
        println!("[LOG] Writing to flash... (running late)");
        burn::burn(60);
        println!("[LOG] Done (late but safe).");
    })
}

fn build(scenario: Scenario) -> (GlobalConfig, Vec<TaskConfig>) {
    match scenario {
        Scenario::Demo => (
            GlobalConfig::new(OverrunPolicy::CatchUp).with_max_tasks(3),
            vec![
                TaskConfig::new("Sensor", 100, job_sensor())
                    .with_deadline(100)
                    .with_priority(2),
                TaskConfig::new("ImgProc", 200, job_image_proc())
                    .with_deadline(50)
                    .with_priority(1)
                    .with_policy(OverrunPolicy::Kill),
                TaskConfig::new("Logger", 200, job_logger())
                    .with_deadline(50)
                    .with_priority(3)
                    .with_policy(OverrunPolicy::Skip),
            ],
        ),
        Scenario::Skip => (
            GlobalConfig::new(OverrunPolicy::Skip),
            vec![TaskConfig::new("Skipper", 100, burn_job(250)).with_priority(2)],
        ),
        Scenario::Kill => (
            GlobalConfig::new(OverrunPolicy::Kill),
            vec![TaskConfig::new("Rogue", 100, burn_job(200)).with_priority(2)],
        ),
        Scenario::Catchup => (
            GlobalConfig::new(OverrunPolicy::CatchUp),
            vec![TaskConfig::new("Catcher", 100, burn_job(120)).with_priority(2)],
        ),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("{}", "========================================".cyan());
    println!("{}", "   PTL REAL-TIME SCHEDULER DEMO v1.0    ".cyan());
    println!("{}", "========================================".cyan());

    let (global, tasks) = build(args.scenario);
    let task_count = tasks.len();

    if let Err(err) = ptl::init(global, &tasks) {
        bail!("initialization failed: {err}");
    }
    println!("[INFO] System initialized, starting scheduler...");

    // The layer owns the process from here; observe from a side thread.
    thread::spawn(|| {
        let _ = ptl::start();
    });
    thread::sleep(Duration::from_millis(args.duration));

    ptl::print_trace()?;
    ptl::print_statistics()?;

    println!("{}", "Per-task counters".bold());
    for index in 0..task_count {
        let (jobs, misses, overruns) = ptl::get_task_stats(index)?;
        let name = tasks[index].name.as_str();
        println!(
            "  {:<10} jobs={} misses={} overruns={}",
            name.green(),
            jobs,
            misses,
            overruns
        );
    }

    Ok(())
}
