//! External collaborators: the assessment tool and the single-image predictor.
//!
//! Both are opaque processes. The assessment tool is "run, return captured
//! text"; the predictor is "given an image, return a distribution".

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Output, Stdio};

use crate::parser::extract_distribution;
use crate::{Error, ModelVariant, Result, ScoreDistribution, VariantFilter};

/// Produces the text log that the output parser consumes
pub trait AssessmentTool {
    /// Run to completion and return everything written to stdout.
    ///
    /// Implementations that stream may call `on_line` for each line as it
    /// arrives; the returned text is still the complete capture.
    fn capture(&self, on_line: &mut dyn FnMut(&str)) -> Result<String>;
}

/// Scores one image for one model variant
pub trait Predictor {
    fn predict(&self, image: &Path, variant: ModelVariant) -> Result<ScoreDistribution>;
}

/// Output captured earlier (e.g. read from a log file)
#[derive(Debug, Clone)]
pub struct CapturedOutput(pub String);

impl AssessmentTool for CapturedOutput {
    fn capture(&self, _on_line: &mut dyn FnMut(&str)) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// How the assessment tool is told which variant and image set to use
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Image directory the tool reads when not given the custom flag
    pub default_image_dir: String,
    /// Flag that switches the tool to the custom image directory
    pub custom_flag: String,
}

impl ToolInvocation {
    /// Full argument list for a run: base args, then `--<variant>` unless both
    /// variants are requested, then the custom flag when `image_dir` is not
    /// the tool's default
    pub fn args_for(&self, filter: VariantFilter, image_dir: &Path) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(variant) = filter.variant() {
            args.push(format!("--{}", variant));
        }
        if image_dir != Path::new(&self.default_image_dir) && !self.custom_flag.is_empty() {
            args.push(self.custom_flag.clone());
        }
        args
    }

    pub fn command(&self, filter: VariantFilter, image_dir: &Path, stream: bool) -> CommandTool {
        CommandTool::new(&self.program, self.args_for(filter, image_dir)).streaming(stream)
    }
}

/// Assessment tool run as a child process
#[derive(Debug, Clone)]
pub struct CommandTool {
    program: String,
    args: Vec<String>,
    stream: bool,
}

impl CommandTool {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            stream: false,
        }
    }

    /// Read stdout line by line as it is produced
    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Program and arguments as one display string
    pub fn display(&self) -> String {
        display_command(&self.program, &self.args)
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        Error::ToolNotFound {
            command: self.display(),
            source: e,
        }
    }

    fn capture_buffered(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;
        check_status(&self.display(), &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn capture_streaming(&self, on_line: &mut dyn FnMut(&str)) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Drain stderr concurrently so a chatty tool cannot block on a full pipe
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).to_string()
            })
        });

        let mut captured = String::new();
        let mut read_error = None;
        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim_end_matches(['\n', '\r']);
                        on_line(line);
                        captured.push_str(line);
                        captured.push('\n');
                    }
                    Err(e) => {
                        read_error = Some(e);
                        break;
                    }
                }
            }
        }

        let status = child.wait()?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if let Some(e) = read_error {
            return Err(Error::ToolInvocationFailed {
                command: self.display(),
                status: "unreadable output stream".to_string(),
                stderr: e.to_string(),
            });
        }
        if !status.success() {
            return Err(Error::ToolInvocationFailed {
                command: self.display(),
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(captured)
    }
}

impl AssessmentTool for CommandTool {
    fn capture(&self, on_line: &mut dyn FnMut(&str)) -> Result<String> {
        if self.stream {
            self.capture_streaming(on_line)
        } else {
            self.capture_buffered()
        }
    }
}

/// Predictor run as a child process: `<program> <args...> <image> <variant>`.
/// Its stdout must contain a `Predicted score distribution: [...]` line.
#[derive(Debug, Clone)]
pub struct CommandPredictor {
    program: String,
    args: Vec<String>,
}

impl CommandPredictor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Predictor for CommandPredictor {
    fn predict(&self, image: &Path, variant: ModelVariant) -> Result<ScoreDistribution> {
        let mut args = self.args.clone();
        args.push(image.to_string_lossy().to_string());
        args.push(variant.to_string());
        let command = display_command(&self.program, &args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::ToolNotFound {
                command: command.clone(),
                source: e,
            })?;
        check_status(&command, &output)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        extract_distribution(&stdout)?.ok_or_else(|| {
            Error::InvalidDistribution(format!(
                "`{}` printed no score distribution",
                command
            ))
        })
    }
}

fn check_status(command: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(Error::ToolInvocationFailed {
        command: command.to_string(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation() -> ToolInvocation {
        ToolInvocation {
            program: "./assess_images.sh".to_string(),
            args: vec![],
            default_image_dir: "sample_images".to_string(),
            custom_flag: "--custom".to_string(),
        }
    }

    #[test]
    fn args_for_both_on_default_dir_is_empty() {
        let args = invocation().args_for(VariantFilter::Both, Path::new("sample_images"));
        assert!(args.is_empty());
    }

    #[test]
    fn args_for_single_variant_on_custom_dir() {
        let args = invocation().args_for(VariantFilter::Technical, Path::new("my_images"));
        assert_eq!(args, vec!["--technical", "--custom"]);
    }

    #[test]
    fn captured_output_returns_text_verbatim() {
        let tool = CapturedOutput("line one\nline two\n".to_string());
        assert_eq!(tool.capture(&mut |_| {}).unwrap(), "line one\nline two\n");
    }

    #[test]
    fn missing_program_is_tool_not_found() {
        let tool = CommandTool::new("definitely-not-a-real-program-xyz", vec![]);
        let err = tool.capture(&mut |_| {}).unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
        assert!(err.is_fatal());
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_reports_stderr() {
        let tool = CommandTool::new(
            "sh",
            vec!["-c".to_string(), "echo boom >&2; exit 3".to_string()],
        );
        match tool.capture(&mut |_| {}) {
            Err(Error::ToolInvocationFailed { stderr, .. }) => assert_eq!(stderr, "boom"),
            other => panic!("expected ToolInvocationFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn streaming_reports_each_line_and_full_capture() {
        let tool = CommandTool::new(
            "sh",
            vec!["-c".to_string(), "echo first; echo second".to_string()],
        )
        .streaming(true);
        let mut seen = Vec::new();
        let text = tool.capture(&mut |line| seen.push(line.to_string())).unwrap();
        assert_eq!(seen, vec!["first", "second"]);
        assert_eq!(text, "first\nsecond\n");
    }

    #[cfg(unix)]
    #[test]
    fn streaming_failure_is_fatal() {
        let tool = CommandTool::new(
            "sh",
            vec!["-c".to_string(), "echo partial; echo bad >&2; exit 1".to_string()],
        )
        .streaming(true);
        let err = tool.capture(&mut |_| {}).unwrap_err();
        assert!(matches!(err, Error::ToolInvocationFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn predictor_parses_distribution_from_stdout() {
        let script = "echo \"Image: $0\"; \
                      echo 'Predicted score distribution: [0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1]'";
        let predictor = CommandPredictor::new("sh", vec!["-c".to_string(), script.to_string()]);
        let d = predictor
            .predict(Path::new("photo1.jpg"), ModelVariant::Aesthetic)
            .unwrap();
        assert_eq!(d, ScoreDistribution::uniform());
    }

    #[cfg(unix)]
    #[test]
    fn predictor_without_distribution_is_an_error() {
        let predictor = CommandPredictor::new(
            "sh",
            vec!["-c".to_string(), "echo nothing".to_string()],
        );
        assert!(predictor
            .predict(Path::new("photo1.jpg"), ModelVariant::Technical)
            .is_err());
    }
}
