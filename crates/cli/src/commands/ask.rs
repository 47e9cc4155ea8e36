//! `trialscout ask`: single-question or interactive answering.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use trialscout_agent::{AgentAnswer, AnsweringAgent};
use trialscout_config::AppConfig;
use trialscout_core::EventBus;

use crate::bootstrap;

pub async fn run(config: AppConfig, question: Option<String>) -> anyhow::Result<()> {
    bootstrap::require_api_key(&config)?;

    let events = Arc::new(EventBus::default());
    let _event_log = bootstrap::spawn_event_log(&events);
    let provider = bootstrap::provider(&config)?;
    let index = bootstrap::build_index(&config, provider.clone(), events.clone()).await?;
    let agent = bootstrap::agent(&config, provider, index, events);

    match question {
        Some(question) => {
            let answer = agent.run(&question).await?;
            print_answer(&answer);
            Ok(())
        }
        None => interactive(&agent, &config).await,
    }
}

/// Read questions from stdin until EOF or `exit`. Follow-up questions see
/// the earlier turns.
async fn interactive(agent: &AnsweringAgent, config: &AppConfig) -> anyhow::Result<()> {
    println!();
    println!("  TrialScout: ask about the indexed clinical studies");
    println!("  Model:   {}", config.model);
    println!("  Studies: {}", config.rag.data_path.display());
    println!("  Type 'exit' or press Ctrl+D to quit.");
    println!();

    let mut conversation = agent.new_conversation();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"  You > ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        match agent.run_in(&mut conversation, line).await {
            Ok(answer) => print_answer(&answer),
            Err(e) => eprintln!("  [Error] {e}\n"),
        }
    }

    println!();
    Ok(())
}

fn print_answer(answer: &AgentAnswer) {
    println!();
    for line in answer.answer.lines() {
        println!("  {line}");
    }
    if !answer.sources.is_empty() {
        let mut ids: Vec<&str> = answer.sources.iter().map(|s| s.study_id.as_str()).collect();
        ids.dedup();
        println!();
        println!("  Sources: {}", ids.join(", "));
    }
    println!();
}
