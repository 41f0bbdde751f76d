use anyhow::Result;
use clap::Args;
use serde::Serialize;
use site_adapter::plugin::CAPABILITIES;

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct InfoArgs {
    /// Also print the adapter metrics in Prometheus text format
    #[arg(long)]
    pub metrics: bool,
}

#[derive(Serialize)]
struct InfoReport<'a> {
    version: &'a str,
    build_date: &'a str,
    git_hash: &'a str,
    git_branch: &'a str,
    adapter: &'a str,
    adapter_version: &'a str,
    domain: &'a str,
    hostnames: &'a [String],
    capabilities: Vec<&'static str>,
}

pub async fn cmd_info(args: InfoArgs, ctx: &CliContext) -> Result<()> {
    let adapter = &ctx.config().adapter;
    let report = InfoReport {
        version: env!("CARGO_PKG_VERSION"),
        build_date: env!("BUILD_DATE"),
        git_hash: env!("GIT_HASH"),
        git_branch: env!("GIT_BRANCH"),
        adapter: &adapter.name,
        adapter_version: &adapter.version,
        domain: &adapter.site.domain,
        hostnames: &adapter.site.hostnames,
        capabilities: CAPABILITIES.iter().map(|cap| cap.as_str()).collect(),
    };

    if let Some(rendered) = ctx.output().render(&report)? {
        println!("{rendered}");
    } else {
        println!("Sitehook Information");
        println!("====================");
        println!("Version: {}", report.version);
        println!("Build Date: {}", report.build_date);
        println!("Git Commit: {} ({})", report.git_hash, report.git_branch);
        println!();
        println!("Adapter:");
        println!("- Name: {} v{}", report.adapter, report.adapter_version);
        println!("- Domain: {}", report.domain);
        println!("- Hostnames: {}", report.hostnames.join(", "));
        println!("- Capabilities: {}", report.capabilities.join(", "));
    }

    if args.metrics {
        println!();
        print!("{}", site_adapter::metrics::render());
    }

    Ok(())
}
