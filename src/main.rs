//! protoc-gen-oas - Command-line tool for generating OpenAPI documents from protobuf.
//!
//! # Usage
//!
//! As a protoc plugin (no arguments; request on stdin, response on stdout):
//! ```bash
//! protoc --oas_out=. --oas_opt=title=Library,version=1.0 library.proto
//! ```
//!
//! Standalone, on a descriptor set:
//! ```bash
//! protoc --descriptor_set_out=library.pb --include_imports --include_source_info library.proto
//! protoc-gen-oas --descriptor-set library.pb --title Library -o docs
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! protoc-gen-oas --descriptor-set library.pb -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use protoc_gen_oas::cli;

fn main() -> Result<()> {
    // protoc starts plugins without arguments
    if std::env::args_os().len() <= 1 {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .init();
        return cli::run_plugin(std::io::stdin().lock(), std::io::stdout().lock());
    }

    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("protoc-gen-oas starting...");
    cli::run_standalone(args)?;
    info!("OpenAPI document generation completed successfully");

    Ok(())
}
