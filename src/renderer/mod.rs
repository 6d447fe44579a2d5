//! Markdown renderer module
//!
//! Renders command summaries as Markdown for the terminal display:
//! model catalogue, networks, init and update results.

use crate::config::Config;
use crate::nwp::ModelSpec;
use crate::reference::{InitSummary, NetworkHandlers, UpdateSummary, NETWORK_OPTIONS};

/// Markdown renderer for command output
pub struct Renderer<'a> {
    config: &'a Config,
}

impl<'a> Renderer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Table of the NOMADS models that can be fetched
    pub fn render_models(&self, models: &[&ModelSpec]) -> String {
        let mut output = String::new();

        output.push_str("# NWP Models\n\n");
        output.push_str(&format!("**Server:** {}\n\n", self.config.nwp.base_url));
        output.push_str("| Model | Update | Forecast hours | Output | Members |\n");
        output.push_str("|-------|--------|----------------|--------|---------|\n");

        for model in models {
            output.push_str(&self.render_model_row(model));
        }

        output.trim_end().to_string()
    }

    fn render_model_row(&self, model: &ModelSpec) -> String {
        let hours = (model.valid_hours)(0);
        let last = hours.last().copied().unwrap_or_default();
        let members = if model.members.is_empty() {
            "-".to_string()
        } else {
            model.members.len().to_string()
        };

        format!(
            "| `{}` | {}h | {} (to f{:03}) | `{}` | {} |\n",
            model.key,
            model.update_freq_hours,
            hours.len(),
            last,
            model.filename,
            members
        )
    }

    /// Networks accepted on the command line and whether they are updated
    pub fn render_networks(&self, handlers: &NetworkHandlers) -> String {
        let mut output = String::new();

        output.push_str("# Reference Networks\n\n");
        output.push_str("| Network | Updates |\n");
        output.push_str("|---------|---------|\n");
        for network in NETWORK_OPTIONS {
            let status = if handlers.supports(network) {
                "supported"
            } else {
                "not configured"
            };
            output.push_str(&format!("| {} | {} |\n", network, status));
        }

        output.push_str(&format!("\n**USCRN source:** {}", self.config.crn.base_url));
        output
    }

    /// Sites created by `reference init`
    pub fn render_init(&self, summary: &InitSummary) -> String {
        let mut output = String::new();

        output.push_str("# Reference Initialization\n\n");
        output.push_str(&format!(
            "Created **{}** sites, **{}** failures.\n",
            summary.created.len(),
            summary.failures
        ));

        if !summary.created.is_empty() {
            output.push('\n');
            for name in &summary.created {
                output.push_str(&format!("- {}\n", name));
            }
        }

        output.trim_end().to_string()
    }

    /// Networks processed by `reference update`
    pub fn render_update(&self, summary: &UpdateSummary) -> String {
        let mut output = String::new();

        output.push_str("# Reference Update\n\n");
        if let (Some(start), Some(end)) = (summary.start, summary.end) {
            output.push_str(&format!(
                "**Period:** {} to {}\n\n",
                start.format("%Y-%m-%d %H:%M UTC"),
                end.format("%Y-%m-%d %H:%M UTC")
            ));
        }
        output.push_str(&format!("**Observations:** {}\n", summary.observations));

        if !summary.updated.is_empty() {
            output.push_str("\n## Updated\n\n");
            for network in &summary.updated {
                output.push_str(&format!("- {}\n", network));
            }
        }

        if !summary.not_configured.is_empty() {
            output.push_str("\n## Not configured\n\n");
            for network in &summary.not_configured {
                output.push_str(&format!("- {}\n", network));
            }
        }

        output.trim_end().to_string()
    }
}
