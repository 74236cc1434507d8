//! Application wiring: logger setup, engine construction, and the CLI
//! run loop (including the interactive context prompt).

mod logging;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::browser::HttpBrowser;
use crate::config::Config;
use crate::context::ContextQuestion;
use crate::events::{EventSink, JsonlSink, NullSink};
use crate::machine::{Engine, EngineSettings, RunRequest, RunSnapshot, RunState};
use crate::rules::RuleRegistry;
use crate::storage::RunStore;

pub use logging::init_logger_with;

/// Builds the engine from CLI configuration and drives one run to a
/// terminal state. Returns whether the run finished `DONE`.
pub async fn run(config: Config) -> anyhow::Result<bool> {
    let driver = Arc::new(HttpBrowser::new(&config.user_agent)?);

    let mut registry = RuleRegistry::with_builtin();
    if let Some(dir) = &config.plugin_dir {
        let count = registry.load_plugins(dir).await;
        log::info!("loaded {count} plugin schema(s) from {}", dir.display());
    }

    let sink: Arc<dyn EventSink> = match &config.event_log {
        Some(path) => Arc::new(
            JsonlSink::open(path)
                .with_context(|| format!("opening event log {}", path.display()))?,
        ),
        None => Arc::new(NullSink),
    };

    let engine = Engine::new(
        driver,
        Arc::new(registry),
        RunStore::new(&config.data_dir),
        sink,
        EngineSettings::from(&config),
    );

    let run_id = engine
        .start(RunRequest {
            base_url: config.base_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            environment: Some(config.environment.clone()),
        })
        .await?;

    {
        let engine = engine.clone();
        let run_id = run_id.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("interrupt received; cancelling run {run_id}");
                let _ = engine.cancel(&run_id);
            }
        });
    }

    let snapshot = supervise(&engine, &run_id).await?;
    print_summary(&snapshot);
    Ok(snapshot.state == RunState::Done)
}

/// Watches the run, answering context questions from stdin until the run
/// reaches a terminal state.
async fn supervise(engine: &Engine, run_id: &str) -> anyhow::Result<RunSnapshot> {
    loop {
        let snapshot = engine.get_state(run_id)?;
        if snapshot.state.is_terminal() {
            return Ok(snapshot);
        }
        if snapshot.state == RunState::WaitContextInput {
            if let Some(question) = snapshot.pending_question {
                let selection = prompt_selection(&question).await?;
                if let Err(e) = engine.answer(run_id, &question.question_id, &selection) {
                    // The run may have been cancelled while we were prompting.
                    log::warn!("answer not accepted: {e}");
                }
                continue;
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

async fn prompt_selection(question: &ContextQuestion) -> anyhow::Result<String> {
    println!();
    println!("{}", question.prompt);
    for (index, option) in question.options.iter().enumerate() {
        println!("  {}. {option}", index + 1);
    }
    let options = question.options.clone();
    tokio::task::spawn_blocking(move || loop {
        eprint!("selection (number or label): ");
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .context("reading selection from stdin")?;
        let line = line.trim();
        if let Ok(number) = line.parse::<usize>() {
            if (1..=options.len()).contains(&number) {
                return Ok(options[number - 1].clone());
            }
        }
        if let Some(exact) = options.iter().find(|o| o.as_str() == line) {
            return Ok(exact.clone());
        }
        eprintln!("not one of the offered options");
    })
    .await
    .context("selection prompt task failed")?
}

fn print_summary(snapshot: &RunSnapshot) {
    println!();
    println!("run {} finished: {}", snapshot.run_id, snapshot.state);
    println!("  pages discovered : {}", snapshot.pages_discovered);
    println!(
        "  checks           : {} passed, {} failed, {} skipped",
        snapshot.checks_passed, snapshot.checks_failed, snapshot.checks_skipped
    );
    println!("  test cases       : {}", snapshot.test_case_count);
    if let Some(context) = &snapshot.context {
        println!("  context          : {context}");
    }
    if !snapshot.errors.is_empty() {
        let tallies: Vec<String> = snapshot
            .errors
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect();
        if !tallies.is_empty() {
            println!("  recoverable errs : {}", tallies.join(", "));
        }
    }
    if let Some(reason) = &snapshot.failure_reason {
        println!("  failure          : {reason}");
    }
}
