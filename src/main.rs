use toolchat::builtin_tools::builtin_toolset;
use toolchat::config::{Args, BackendTarget};
use toolchat::{
    ConversationState, InteractiveShell, LocalToolBackend, McpHttpBackend, OpenAiModel,
    OrchestrationLoop, ToolBackend, logging,
};

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::io::{BufReader, stdin, stdout};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init(args.verbose);

    let backend: Arc<dyn ToolBackend> = match args.target()? {
        BackendTarget::Local => Arc::new(LocalToolBackend::new(builtin_toolset())),
        BackendTarget::Remote(url) => Arc::new(McpHttpBackend::new(url)?),
    };
    let model = OpenAiModel::new(&args.api_base, &args.api_key()?, &args.model);
    info!(model = model.model(), "using model");

    let orchestrator = OrchestrationLoop::new(model, backend.clone(), args.loop_config());
    let mut shell = InteractiveShell::new(
        orchestrator,
        ConversationState::new(args.history),
        BufReader::new(stdin()),
        stdout(),
    );
    let result = shell.run().await;

    if let Err(err) = backend.close().await {
        warn!(error = %err, "could not close tool server session");
    }
    result
}
