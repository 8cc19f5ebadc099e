//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{load_pipeline, Environment, PipelineConfig};
use crate::error::{Error, Result, ResultExt};
use crate::normalize::{Node, NodeCollector, NodeField};
use crate::pipeline::{Capabilities, Pipeline, RunStats};
use crate::sanitize::KeySanitizer;
use crate::template::TemplateContext;
use serde_json::{json, Value};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run {
                config,
                dev,
                refresh_endpoint,
                format,
                output,
            } => {
                let mut env = Environment::from_env();
                env.development |= *dev;
                env.refresh_endpoint |= *refresh_endpoint;
                self.run_pipeline(config, env, *format, output.as_deref())
                    .await
            }
            Commands::Validate { config } => self.validate(config),
            Commands::Sanitize { keys } => {
                self.sanitize(keys);
                Ok(())
            }
        }
    }

    /// Load a pipeline definition, applying the global verbose flag
    fn load(&self, path: &Path) -> Result<PipelineConfig> {
        let mut config = load_pipeline(path)?;
        if self.cli.verbose {
            config.defaults.verbose = true;
        }
        Ok(config)
    }

    /// Run the pipeline and write nodes, fields and stats
    async fn run_pipeline(
        &self,
        path: &Path,
        env: Environment,
        format: OutputFormat,
        output: Option<&Path>,
    ) -> Result<()> {
        let config = self.load(path)?;
        let collector = Arc::new(NodeCollector::new());
        let caps = Capabilities::collecting(collector.clone()).with_env(env);

        let stats = Pipeline::new(config, caps).run().await?;
        let (nodes, fields) = collector.take();

        let rendered = render_output(&nodes, &fields, &stats, format)?;
        match output {
            Some(file) => fs::write(file, rendered)
                .with_context(|| format!("Failed to write output file '{}'", file.display()))?,
            None => std::io::stdout().lock().write_all(rendered.as_bytes())?,
        }
        Ok(())
    }

    /// Validate a pipeline definition
    fn validate(&self, path: &Path) -> Result<()> {
        let config = self.load(path)?;
        let ctx = TemplateContext::from_env();

        let mut problems = Vec::new();
        let sources = config.sources();
        for source in &sources {
            if let Err(e) = source.prepare(&ctx) {
                problems.push(format!("{}: {}", source.type_name(), e));
            }
        }
        if let Err(e) = config.rendered_auth(&ctx) {
            problems.push(format!("auth: {e}"));
        }

        if !problems.is_empty() {
            return Err(Error::config(problems.join("; ")));
        }

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!("Pipeline is valid with {} source(s)", sources.len())
            }
        }));
        Ok(())
    }

    /// Print each key next to its sanitized form
    fn sanitize(&self, keys: &[String]) {
        let sanitizer = if self.cli.verbose {
            KeySanitizer::verbose()
        } else {
            KeySanitizer::new()
        };
        for key in keys {
            println!("{key} -> {}", sanitizer.sanitize(key));
        }
    }

    /// Output a message to stdout
    fn output_message(&self, msg: &Value) {
        println!("{}", serde_json::to_string(msg).unwrap_or_default());
    }
}

/// Serialize a run's results.
///
/// `Json` writes one `NODE`/`FIELD` message per line followed by a `STATS`
/// message; `Pretty` writes a single `{nodes, fields, stats}` document.
fn render_output(
    nodes: &[Node],
    fields: &[NodeField],
    stats: &RunStats,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut out = String::new();
            for node in nodes {
                out.push_str(&serde_json::to_string(&json!({"type": "NODE", "node": node}))?);
                out.push('\n');
            }
            for field in fields {
                out.push_str(&serde_json::to_string(&json!({"type": "FIELD", "field": field}))?);
                out.push('\n');
            }
            out.push_str(&serde_json::to_string(&json!({"type": "STATS", "stats": stats}))?);
            out.push('\n');
            Ok(out)
        }
        OutputFormat::Pretty => {
            let document = json!({"nodes": nodes, "fields": fields, "stats": stats});
            let mut out = serde_json::to_string_pretty(&document)?;
            out.push('\n');
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{NodeInternal, MEDIA_TYPE};
    use serde_json::Map;

    fn node() -> Node {
        let mut fields = Map::new();
        fields.insert("title".to_string(), json!("Hello"));
        Node {
            id: "n1".to_string(),
            parent: None,
            children: Vec::new(),
            internal: NodeInternal {
                node_type: "Post".to_string(),
                media_type: MEDIA_TYPE.to_string(),
                content_digest: "abc".to_string(),
            },
            fields,
        }
    }

    fn field() -> NodeField {
        NodeField {
            node_id: "n1".to_string(),
            name: "path".to_string(),
            value: json!("/hello/"),
        }
    }

    #[test]
    fn test_render_json_lines() {
        let stats = RunStats {
            sources_processed: 1,
            nodes_created: 1,
            fields_created: 1,
            ..Default::default()
        };
        let out = render_output(&[node()], &[field()], &stats, OutputFormat::Json).unwrap();
        let lines: Vec<Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["type"], "NODE");
        assert_eq!(lines[0]["node"]["id"], "n1");
        assert_eq!(lines[0]["node"]["title"], "Hello");
        assert_eq!(lines[0]["node"]["internal"]["type"], "Post");
        assert_eq!(lines[1]["type"], "FIELD");
        assert_eq!(lines[1]["field"]["value"], "/hello/");
        assert_eq!(lines[2]["stats"]["nodes_created"], 1);
    }

    #[test]
    fn test_render_pretty_document() {
        let out =
            render_output(&[node()], &[], &RunStats::default(), OutputFormat::Pretty).unwrap();
        let document: Value = serde_json::from_str(&out).unwrap();

        assert_eq!(document["nodes"][0]["internal"]["mediaType"], MEDIA_TYPE);
        assert_eq!(document["fields"], json!([]));
        assert_eq!(document["stats"]["sources_failed"], 0);
        assert!(out.contains("\n  "));
    }
}
