//! Configuration parsing for audit runs.
//!
//! Config files are JSON5 (comments and trailing commas allowed) and describe
//! a target URL, an iteration count, and a list of named runs. Each run may
//! override the global request blocklist and script injection.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// Main configuration structure loaded from JSON5 files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Root directory for persisted results (default: "results")
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Number of audit iterations per run
    pub iterations: u32,
    /// URL to audit
    pub url: String,
    /// Global request blocklist: URL substrings whose requests are aborted
    #[serde(default)]
    pub block: Option<Vec<String>>,
    /// Global script injection applied to every audited page
    #[serde(default)]
    pub script: Option<ScriptInjection>,
    /// Extra HTTP headers sent with every request the engine makes
    #[serde(default)]
    pub extra_headers: Option<BTreeMap<String, String>>,
    /// Opaque engine options overlaid on the built-in defaults
    #[serde(default)]
    pub lighthouse: Option<serde_json::Map<String, serde_json::Value>>,
    /// Named run configurations, executed in order
    pub runs: Vec<RunDefinition>,
}

/// One named run variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDefinition {
    /// Run name; used as the output subdirectory and report key
    pub name: String,
    /// Per-run blocklist; fully replaces the global blocklist when present
    #[serde(default)]
    pub block: Option<Vec<String>>,
    /// Per-run script injection; fully replaces the global one when present
    #[serde(default)]
    pub script: Option<ScriptInjection>,
}

/// A script tag to add to audited pages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptInjection {
    /// External script URL
    #[serde(default)]
    pub url: Option<String>,
    /// Inline script body
    #[serde(default)]
    pub content: Option<String>,
    /// Path to a file whose contents become `content` at run start
    #[serde(default)]
    pub content_file: Option<String>,
}

impl Config {
    /// Load configuration from a JSON5 file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the JSON5 is malformed,
    /// or the parsed configuration fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a JSON5 string
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: Config =
            json5::from_str(s).context("Failed to parse JSON5 configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the orchestrator relies on
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.iterations == 0 {
            bail!("iterations must be positive");
        }
        if self.runs.is_empty() {
            bail!("at least one run must be configured");
        }

        let mut names = HashSet::new();
        for run in &self.runs {
            if !names.insert(run.name.as_str()) {
                bail!("duplicate run name: {}", run.name);
            }
        }

        if let Some(script) = &self.script {
            script.validate().context("invalid global script")?;
        }
        for run in &self.runs {
            if let Some(script) = &run.script {
                script
                    .validate()
                    .with_context(|| format!("invalid script for run {}", run.name))?;
            }
        }

        Ok(())
    }
}

impl ScriptInjection {
    fn validate(&self) -> anyhow::Result<()> {
        if self.content.is_some() && self.content_file.is_some() {
            bail!("content and contentFile are mutually exclusive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let source = r#"
            {
                iterations: 3,
                url: "https://example.com",
                runs: [
                    { name: "baseline" },
                ],
            }
        "#;

        let config = Config::from_str(source).unwrap();
        assert_eq!(config.iterations, 3);
        assert_eq!(config.url, "https://example.com");
        assert_eq!(config.runs.len(), 1);
        assert_eq!(config.runs[0].name, "baseline");
        assert!(config.output_dir.is_none());
        assert!(config.block.is_none());
    }

    #[test]
    fn test_parse_full_config_with_comments() {
        let source = r#"
            {
                // where results land
                outputDir: "out",
                iterations: 5,
                url: "https://example.com/page",
                block: ["ads", "track"],
                script: { content: "console.log('hi')" },
                extraHeaders: { "X-Debug": "1" },
                lighthouse: { onlyCategories: ["performance"] },
                runs: [
                    { name: "control" },
                    { name: "blocked", block: ["analytics"] },
                ],
            }
        "#;

        let config = Config::from_str(source).unwrap();
        assert_eq!(config.output_dir.as_deref(), Some("out"));
        assert_eq!(config.block.as_deref(), Some(&["ads".to_string(), "track".to_string()][..]));
        assert_eq!(
            config.extra_headers.as_ref().unwrap().get("X-Debug"),
            Some(&"1".to_string())
        );
        assert!(config.lighthouse.as_ref().unwrap().contains_key("onlyCategories"));
        assert_eq!(config.runs[1].block.as_ref().unwrap(), &["analytics"]);
    }

    #[test]
    fn test_reject_zero_iterations() {
        let source = r#"{ iterations: 0, url: "https://x", runs: [{ name: "a" }] }"#;
        assert!(Config::from_str(source).is_err());
    }

    #[test]
    fn test_reject_empty_runs() {
        let source = r#"{ iterations: 1, url: "https://x", runs: [] }"#;
        assert!(Config::from_str(source).is_err());
    }

    #[test]
    fn test_reject_duplicate_run_names() {
        let source = r#"
            { iterations: 1, url: "https://x", runs: [{ name: "a" }, { name: "a" }] }
        "#;
        let err = Config::from_str(source).unwrap_err();
        assert!(err.to_string().contains("duplicate run name"));
    }

    #[test]
    fn test_reject_content_and_content_file() {
        let source = r#"
            {
                iterations: 1,
                url: "https://x",
                script: { content: "a", contentFile: "b.js" },
                runs: [{ name: "a" }],
            }
        "#;
        assert!(Config::from_str(source).is_err());
    }

    #[test]
    fn test_script_url_only_is_valid() {
        let source = r#"
            {
                iterations: 1,
                url: "https://x",
                runs: [{ name: "a", script: { url: "https://cdn/x.js" } }],
            }
        "#;
        let config = Config::from_str(source).unwrap();
        let script = config.runs[0].script.as_ref().unwrap();
        assert_eq!(script.url.as_deref(), Some("https://cdn/x.js"));
        assert!(script.content.is_none());
    }

    #[test]
    fn test_trailing_commas_and_unquoted_keys() {
        let source = "{ iterations: 2, url: 'https://x', runs: [ { name: 'a' }, ], }";
        let config = Config::from_str(source).unwrap();
        assert_eq!(config.iterations, 2);
    }
}
