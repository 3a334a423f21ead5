use crate::cli;
use crate::commands::submit::plan_submit;
use anyhow::Result;
use dclaunch::config::Config;
use dclaunch::core::descriptor::ResourceDescriptor;
use tabled::{builder::Builder, settings::style::Style};

pub(crate) fn handle_show(config: &Config, args: cli::ShowArgs) -> Result<i32> {
    let descriptor = config.job.clone().overlay(&args.resources.descriptor()?);
    println!("{}", resource_table(&descriptor));

    let submit_args = cli::SubmitArgs {
        config: args.config,
        resources: args.resources,
        local: args.local,
        ..Default::default()
    };
    for command in plan_submit(config, &submit_args)? {
        println!("{command}");
    }
    Ok(0)
}

fn resource_table(descriptor: &ResourceDescriptor) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Resource", "Value"]);

    for (key, value) in descriptor.qsub_pairs() {
        builder.push_record([key, value]);
    }
    if let Some(workers) = descriptor.workers_per_node {
        builder.push_record(["workers_per_node".to_string(), workers.to_string()]);
    }

    builder.build().with(Style::rounded()).to_string()
}
