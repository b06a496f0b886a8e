//! Config schema and deserialization

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::tool::ToolInvocation;
use crate::VariantFilter;

pub const DEFAULT_IMAGE_DIR: &str = "sample_images";
pub const DEFAULT_RESULTS_DIR: &str = "results";
pub const DEFAULT_TOOL_COMMAND: &str = "./assess_images.sh";
pub const DEFAULT_CUSTOM_FLAG: &str = "--custom";

/// How to invoke the batch assessment tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Arguments placed before the variant and custom-directory flags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Image directory the tool reads when not given the custom flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_image_dir: Option<String>,

    /// Flag telling the tool to read the configured image directory instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_flag: Option<String>,
}

/// How to invoke the single-image predictor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

/// Root config structure for .nimarc.json
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Extend another config file (path relative to this config)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Directory holding the source images. Default: sample_images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_dir: Option<String>,

    /// Directory for JSON score records. Default: results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_dir: Option<String>,

    /// Directory for rendered reports. Default: the results directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<VariantFilter>,

    /// Echo tool output line by line while it runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    #[serde(default)]
    pub tool: ToolConfig,

    #[serde(default)]
    pub predictor: PredictorConfig,
}

/// Values given on the command line; `None` leaves the config value in place
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub image_dir: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub model_type: Option<VariantFilter>,
    pub tool_command: Option<String>,
    /// Replaces the configured tool arguments when non-empty
    pub tool_args: Vec<String>,
    pub stream: bool,
    pub predictor_command: Option<String>,
    pub predictor_args: Vec<String>,
}

/// Settings after applying defaults, config and CLI overrides
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub image_dir: PathBuf,
    pub results_dir: PathBuf,
    pub report_dir: PathBuf,
    pub model_type: VariantFilter,
    pub stream: bool,
    pub tool: ToolInvocation,
    /// Predictor program and arguments, if one is configured
    pub predictor: Option<(String, Vec<String>)>,
}

impl Config {
    /// Config with every default spelled out, as written by `init`
    pub fn template() -> Self {
        Self {
            extends: None,
            image_dir: Some(DEFAULT_IMAGE_DIR.to_string()),
            results_dir: Some(DEFAULT_RESULTS_DIR.to_string()),
            report_dir: None,
            model_type: Some(VariantFilter::Both),
            stream: Some(false),
            tool: ToolConfig {
                command: Some(DEFAULT_TOOL_COMMAND.to_string()),
                args: Some(Vec::new()),
                default_image_dir: Some(DEFAULT_IMAGE_DIR.to_string()),
                custom_flag: Some(DEFAULT_CUSTOM_FLAG.to_string()),
            },
            predictor: PredictorConfig::default(),
        }
    }

    /// Merge CLI overrides into config. CLI values take precedence.
    pub fn merge_with_cli(self, cli: CliOverrides) -> EffectiveConfig {
        let image_dir = cli
            .image_dir
            .or_else(|| self.image_dir.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_DIR));
        let results_dir = cli
            .results_dir
            .or_else(|| self.results_dir.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIR));
        let report_dir = cli
            .report_dir
            .or_else(|| self.report_dir.map(PathBuf::from))
            .unwrap_or_else(|| results_dir.clone());

        let tool_args = if cli.tool_args.is_empty() {
            self.tool.args.unwrap_or_default()
        } else {
            cli.tool_args
        };
        let tool = ToolInvocation {
            program: cli
                .tool_command
                .or(self.tool.command)
                .unwrap_or_else(|| DEFAULT_TOOL_COMMAND.to_string()),
            args: tool_args,
            default_image_dir: self
                .tool
                .default_image_dir
                .unwrap_or_else(|| DEFAULT_IMAGE_DIR.to_string()),
            custom_flag: self
                .tool
                .custom_flag
                .unwrap_or_else(|| DEFAULT_CUSTOM_FLAG.to_string()),
        };

        let predictor_args = if cli.predictor_args.is_empty() {
            self.predictor.args.unwrap_or_default()
        } else {
            cli.predictor_args
        };
        let predictor = cli
            .predictor_command
            .or(self.predictor.command)
            .map(|command| (command, predictor_args));

        EffectiveConfig {
            image_dir,
            results_dir,
            report_dir,
            model_type: cli.model_type.or(self.model_type).unwrap_or_default(),
            stream: cli.stream || self.stream.unwrap_or(false),
            tool,
            predictor,
        }
    }

    /// Merge another config into this one (for extends)
    pub fn merge_from(&mut self, base: Config) {
        // Base values are overridden by this config's values
        if self.extends.is_none() {
            self.extends = base.extends;
        }
        if self.image_dir.is_none() {
            self.image_dir = base.image_dir;
        }
        if self.results_dir.is_none() {
            self.results_dir = base.results_dir;
        }
        if self.report_dir.is_none() {
            self.report_dir = base.report_dir;
        }
        if self.model_type.is_none() {
            self.model_type = base.model_type;
        }
        if self.stream.is_none() {
            self.stream = base.stream;
        }

        let tool = &mut self.tool;
        if tool.command.is_none() {
            tool.command = base.tool.command;
        }
        if tool.args.is_none() {
            tool.args = base.tool.args;
        }
        if tool.default_image_dir.is_none() {
            tool.default_image_dir = base.tool.default_image_dir;
        }
        if tool.custom_flag.is_none() {
            tool.custom_flag = base.tool.custom_flag;
        }

        if self.predictor.command.is_none() {
            self.predictor.command = base.predictor.command;
        }
        if self.predictor.args.is_none() {
            self.predictor.args = base.predictor.args;
        }
    }
}
