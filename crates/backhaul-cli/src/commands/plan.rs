//! `backhaul plan` — Display planned resources before deploying.

use clap::Args;

use backhaul_synth::graph::ResourceGraph;

use crate::commands::StackArgs;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Deployment-time parameters.
    #[command(flatten)]
    pub stack: StackArgs,
}

/// Executes the `plan` command.
///
/// Synthesizes the pipeline, resolves deploy order from the resource
/// graph, and lists every resource with its type.
///
/// # Errors
///
/// Returns an error if parameter resolution or synthesis fails.
pub fn execute(args: &PlanArgs) -> anyhow::Result<()> {
    let config = args.stack.resolve()?;
    let template = backhaul_stacks::pipeline::synthesize(&config)?;
    let order = ResourceGraph::from_resources(&template.resources).deploy_order()?;

    println!("Deployment plan for: {}", config.app_name);
    println!();

    for logical_id in &order {
        if let Some(resource) = template.resources.get(logical_id) {
            println!("  + {logical_id}");
            println!("      type: {}", resource.resource_type);
            if !resource.depends_on.is_empty() {
                println!("      after: {}", resource.depends_on.join(", "));
            }
        }
    }

    println!();
    println!("  {} resource(s) will be provisioned.", order.len());

    if !template.parameters.is_empty() {
        println!();
        println!("  Parameters to supply at deploy time:");
        for name in template.parameters.keys() {
            println!("    {name}");
        }
    }

    if !template.outputs.is_empty() {
        println!();
        println!("  Outputs:");
        for name in template.outputs.keys() {
            println!("    {name}");
        }
    }

    Ok(())
}
