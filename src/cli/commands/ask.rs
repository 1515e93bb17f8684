use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::app::AppContext;
use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, OutputFormat, Secrets};
use crate::services::QueryPipeline;

#[derive(Debug, Args)]
pub struct AskArgs {
    /// Question to answer; omit for an interactive session
    pub question: Option<String>,
}

pub async fn handle_ask(args: AskArgs, format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let secrets = Secrets::from_env(&config);
    let formatter = get_formatter(format);

    let ctx = AppContext::build(config, &secrets)
        .await
        .context("failed to start")?;

    match args.question {
        Some(question) => {
            let answer = ctx.query.ask(&question).await?;
            print!("{}", formatter.format_answer(&answer));
            Ok(())
        }
        None => {
            let stdin = BufReader::new(tokio::io::stdin());
            interactive(&ctx.query, formatter.as_ref(), stdin).await
        }
    }
}

/// Read questions from `input` until `exit` or end of input.
async fn interactive<R>(query: &QueryPipeline, formatter: &dyn Formatter, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        print!("\nAsk a question (or type 'exit'): ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        match query.ask(question).await {
            Ok(answer) => print!("\n{}", formatter.format_answer(&answer)),
            Err(e) => eprint!("{}", formatter.format_error(&e.to_string())),
        }
    }

    Ok(())
}
