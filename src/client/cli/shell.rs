use super::io::{read_user_input, write_line};

use crate::conversation::ConversationState;
use crate::error::QueryError;
use crate::model::CompletionModel;
use crate::orchestrator::OrchestrationLoop;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{error, info};

pub const QUIT_COMMAND: &str = "quit";
pub const CLEAR_COMMAND: &str = "/clear";

/// Line-oriented chat session. A failed query is reported and the session
/// moves on to the next line; only I/O errors end it early.
pub struct InteractiveShell<M, R, W> {
    orchestrator: OrchestrationLoop<M>,
    state: ConversationState,
    input: R,
    output: W,
}

impl<M, R, W> InteractiveShell<M, R, W>
where
    M: CompletionModel,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        orchestrator: OrchestrationLoop<M>,
        state: ConversationState,
        input: R,
        output: W,
    ) -> Self {
        Self {
            orchestrator,
            state,
            input,
            output,
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub async fn run(&mut self) -> Result<()> {
        self.greet().await?;
        while let Some(line) = read_user_input(&mut self.input, &mut self.output).await? {
            let query = line.trim();
            if query.is_empty() {
                continue;
            }
            if query.eq_ignore_ascii_case(QUIT_COMMAND) {
                write_line(&mut self.output, "bye").await?;
                break;
            }
            if query == CLEAR_COMMAND {
                self.state.clear();
                write_line(&mut self.output, "history cleared").await?;
                continue;
            }

            match self.orchestrator.process_query(&mut self.state, query).await {
                Ok(outcome) => {
                    info!(cycles = outcome.cycles, "answered");
                    write_line(&mut self.output, &outcome.answer).await?;
                }
                Err(err) => {
                    error!(error = %err, "query failed");
                    write_line(&mut self.output, &format!("error: {err}")).await?;
                    if let QueryError::CycleLimitExceeded {
                        partial: Some(partial),
                        ..
                    } = &err
                    {
                        write_line(&mut self.output, &format!("partial answer: {partial}"))
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn greet(&mut self) -> Result<()> {
        let banner = format!("tool chat started (type '{QUIT_COMMAND}' to exit)");
        write_line(&mut self.output, &banner).await?;
        match self.orchestrator.tools().await {
            Ok(tools) => {
                let names: Vec<_> = tools.iter().map(|tool| tool.name.as_str()).collect();
                write_line(&mut self.output, &format!("tools: {}", names.join(", "))).await
            }
            Err(err) => {
                write_line(&mut self.output, &format!("warning: could not list tools: {err}"))
                    .await
            }
        }
    }
}
