use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use hsm_core::domain::{RunId, StateMachineKey};
use hsm_core::impls::InMemoryEnvironment;
use hsm_core::ports::{IdGenerator, SystemClock, UlidGenerator};
use hsm_core::{
    Dispatcher, DispatcherBuilder, DispatcherConfig, InvocationRequest, MachineType, Ref,
    RegistryStatus,
};

use crate::machines::{self, TIMER, WORKFLOW};

#[derive(Debug, Parser)]
#[command(name = "hsm", about = "Remote-method dispatch for hierarchical state machines")]
pub struct Cli {
    /// Dispatcher config (JSON). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List registered remote methods as JSON
    Methods,
    /// Invoke one remote method against a freshly seeded in-memory environment
    Invoke(InvokeArgs),
    /// Run a short scripted session against the sample machines
    Demo,
}

#[derive(Debug, Args, Clone)]
struct InvokeArgs {
    #[arg(long)]
    machine_type: String,
    #[arg(long)]
    method: String,
    #[arg(long, default_value = "default")]
    namespace: String,
    #[arg(long, default_value = "wf-1")]
    workflow_id: String,
    /// Run id ("run-<ulid>"); a new one is generated when omitted
    #[arg(long)]
    run_id: Option<String>,
    /// Comma separated "type:id" keys from the root, e.g. "workflow:wf-1,timer:t-1"
    #[arg(long)]
    path: String,
    /// JSON input
    #[arg(long, default_value = "null")]
    input: String,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = match &self.config {
            Some(path) => DispatcherConfig::from_file(path)?,
            None => DispatcherConfig::default(),
        };
        let dispatcher = machines::install(DispatcherBuilder::new().with_config(config))?.build()?;
        tracing::info!(
            methods = dispatcher.registry().len(),
            "dispatcher ready"
        );

        match self.command {
            Command::Methods => {
                let status = RegistryStatus::from_registry(dispatcher.registry());
                println!("{}", serde_json::to_string_pretty(&status)?);
                Ok(())
            }
            Command::Invoke(args) => invoke(&dispatcher, args).await,
            Command::Demo => demo(&dispatcher).await,
        }
    }
}

fn parse_path(path: &str) -> anyhow::Result<Vec<StateMachineKey>> {
    path.split(',')
        .map(|key| Ok(StateMachineKey::from_str(key.trim())?))
        .collect()
}

async fn invoke(dispatcher: &Dispatcher, args: InvokeArgs) -> anyhow::Result<()> {
    let run_id = match &args.run_id {
        Some(run_id) => RunId::from_str(run_id)?,
        None => UlidGenerator::new(SystemClock).generate_run_id(),
    };
    let target = Ref::from_path(args.namespace, args.workflow_id, run_id, parse_path(&args.path)?)?;

    let env = Arc::new(InMemoryEnvironment::new());
    machines::seed(&env, &target).await?;

    let request = InvocationRequest::new(
        MachineType::new(args.machine_type)?,
        args.method,
        target,
        args.input.into_bytes(),
    );
    match dispatcher.invoke(dispatcher.new_context(), env, request).await {
        Ok(output) => {
            println!("{}", String::from_utf8_lossy(&output));
            Ok(())
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err.to_status())?);
            Err(err.into())
        }
    }
}

async fn demo(dispatcher: &Dispatcher) -> anyhow::Result<()> {
    let run_id = UlidGenerator::new(SystemClock).generate_run_id();
    let workflow = Ref::root(
        "default",
        "demo",
        run_id,
        StateMachineKey::new(MachineType::new(WORKFLOW)?, "demo"),
    );
    let timer = workflow.child(StateMachineKey::new(MachineType::new(TIMER)?, "t-1"));

    let env = Arc::new(InMemoryEnvironment::new());
    machines::seed(&env, &timer).await?;

    let steps: [(&str, &str, &Ref, &str); 7] = [
        (WORKFLOW, "Signal", &workflow, r#"{"name":"approve"}"#),
        (TIMER, "Reschedule", &timer, r#"{"delay_seconds":30}"#),
        (TIMER, "Describe", &timer, "null"),
        (WORKFLOW, "Describe", &timer, "null"),
        (TIMER, "Reschedule", &timer, r#"{"delay_seconds":-5}"#),
        (TIMER, "Fire", &timer, "null"),
        (TIMER, "Reschedule", &timer, r#"{"delay_seconds":10}"#),
    ];

    for (machine_type, method, target, input) in steps {
        let request = InvocationRequest::new(
            MachineType::new(machine_type)?,
            method,
            target.clone(),
            input.as_bytes(),
        );
        println!("> {machine_type}.{method} on {target}");
        match dispatcher.invoke(dispatcher.new_context(), env.clone(), request).await {
            Ok(output) => println!("  ok: {}", String::from_utf8_lossy(&output)),
            Err(err) => println!("  error: {}", serde_json::to_string(&err.to_status())?),
        }
    }

    println!("scheduled effects:");
    for (target, effect) in env.effects().await {
        println!("  {target}: {}", serde_json::to_string(&effect)?);
    }
    Ok(())
}
