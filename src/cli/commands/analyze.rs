//! Analyze command implementation
//!
//! This module implements the `analyze` command, which summarizes the
//! reports, query results and logs left behind by earlier runs.

use crate::config::read_config;
use crate::core::analysis::RunAnalyzer;
use clap::Args;

/// Arguments for the analyze command
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Print the analysis as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Do not write the analysis into the reports directory
    #[arg(long)]
    pub no_save: bool,
}

impl AnalyzeArgs {
    /// Execute the analyze command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Analyzing previous runs");

        let config = match read_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let analyzer = RunAnalyzer::from_config(&config);
        let analysis = analyzer.analyze();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        } else {
            print!("{}", analysis.render());
        }

        if !self.no_save {
            match analyzer.save(&analysis) {
                Ok(path) => println!("Analysis saved to {}", path.display()),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not save run analysis");
                    println!("Could not save analysis: {e}");
                }
            }
        }

        Ok(analysis.exit_code())
    }
}
