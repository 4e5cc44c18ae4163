//! Components command - lists the built-in components.

use anyhow::Result;
use clap::Args;

use sift_components::ComponentRegistry;
use sift_session::{ComponentDescriptor, ComponentKind, DescriptorResolver, escape_component_name};

use super::Context;

/// Arguments for the components command.
#[derive(Args, Debug)]
pub struct ComponentsArgs {
    /// Show one component's properties
    pub name: Option<String>,
}

/// Run the components command.
pub fn run(args: ComponentsArgs, ctx: &Context) -> Result<()> {
    let registry = ComponentRegistry::builtin();

    let descriptors = match args.name {
        Some(name) => vec![
            registry
                .resolve(&name)
                .ok_or_else(|| anyhow::anyhow!("Unknown component: {}", name))?,
        ],
        None => registry.descriptors(),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    for descriptor in &descriptors {
        print_descriptor(descriptor, ctx.verbose);
    }

    Ok(())
}

fn print_descriptor(descriptor: &ComponentDescriptor, verbose: bool) {
    let kind = match descriptor.kind {
        ComponentKind::Transformer => "transformer",
        ComponentKind::Analyzer => "analyzer",
    };
    println!("{:<20} {:<12} {}", descriptor.name, kind, descriptor.description);

    if verbose {
        let escaped = escape_component_name(&descriptor.name);
        if escaped != descriptor.name {
            println!("  path: {}", escaped);
        }
    }

    for property in &descriptor.properties {
        let mut flags = Vec::new();
        if property.required {
            flags.push("required");
        }
        if property.input_column {
            flags.push("column");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!("  - {}{}: {}", property.name, flags, property.description);
    }
}
