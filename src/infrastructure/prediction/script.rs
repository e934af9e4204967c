//! External classifier process

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::domain::prediction::{PredictionError, Predictor};

const MAX_REPORTED_OUTPUT: usize = 2048;

/// Runs `<interpreter> <script> <image_path>` and reads one JSON object from stdout
#[derive(Debug, Clone)]
pub struct ScriptPredictor {
    interpreter: String,
    script: PathBuf,
    timeout: Duration,
}

impl ScriptPredictor {
    pub fn new(interpreter: impl Into<String>, script: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            timeout,
        }
    }

    pub fn script(&self) -> &Path {
        &self.script
    }
}

#[async_trait]
impl Predictor for ScriptPredictor {
    async fn predict(&self, image_path: &Path) -> Result<Value, PredictionError> {
        let child = Command::new(&self.interpreter)
            .arg(&self.script)
            .arg(image_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(PredictionError::Spawn)?;

        // On timeout the child is dropped, which kills it
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| PredictionError::Timeout(self.timeout))?
            .map_err(PredictionError::Spawn)?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!(stderr = %stderr.trim(), "Prediction process wrote to stderr");
        }

        interpret_output(
            output.status.success(),
            output.status.code(),
            &String::from_utf8_lossy(&output.stdout),
            &stderr,
        )
    }
}

/// Map a finished run to a payload or failure.
///
/// An `error` field in the JSON wins over the exit status. Otherwise a
/// non-zero exit is a failure even when stdout holds valid JSON.
fn interpret_output(
    success: bool,
    exit_code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> Result<Value, PredictionError> {
    let failed = || PredictionError::Failed {
        exit_code,
        stderr: truncate(stderr),
    };

    let stdout = stdout.trim();
    if stdout.is_empty() {
        return Err(if success {
            PredictionError::EmptyOutput
        } else {
            failed()
        });
    }

    let Some(value) = parse_payload(stdout) else {
        return Err(if success {
            PredictionError::MalformedOutput {
                output: truncate(stdout),
            }
        } else {
            failed()
        });
    };

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(PredictionError::Rejected { message });
    }

    if !success {
        return Err(failed());
    }

    Ok(value)
}

/// The whole output as one object, else the last line that is one
fn parse_payload(stdout: &str) -> Option<Value> {
    let whole = serde_json::from_str::<Value>(stdout).ok().filter(Value::is_object);

    whole.or_else(|| {
        stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .and_then(|line| serde_json::from_str::<Value>(line).ok())
            .filter(Value::is_object)
    })
}

fn truncate(text: &str) -> String {
    text.trim().chars().take(MAX_REPORTED_OUTPUT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_payload_verbatim() {
        let value = interpret_output(true, Some(0), "{\"prediction\": 87.5}\n", "").unwrap();
        assert_eq!(value, json!({ "prediction": 87.5 }));
    }

    #[test]
    fn test_noise_before_payload() {
        let stdout = "loading model...\n{\"prediction\": 12.0}\n";
        let value = interpret_output(true, Some(0), stdout, "").unwrap();
        assert_eq!(value["prediction"], 12.0);
    }

    #[test]
    fn test_error_field() {
        let err = interpret_output(false, Some(1), "{\"error\": \"Model file not found\"}", "")
            .unwrap_err();
        assert!(matches!(err, PredictionError::Rejected { ref message } if message == "Model file not found"));

        let err = interpret_output(true, Some(0), "{\"error\": \"bad image\"}", "").unwrap_err();
        assert_eq!(err.to_string(), "bad image");
    }

    #[test]
    fn test_nonzero_exit_without_output() {
        let err = interpret_output(false, Some(2), "  \n", "Traceback").unwrap_err();
        match err {
            PredictionError::Failed { exit_code, stderr } => {
                assert_eq!(exit_code, Some(2));
                assert_eq!(stderr, "Traceback");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nonzero_exit_with_valid_json_fails() {
        let err = interpret_output(false, Some(1), "{\"prediction\": 1.0}", "").unwrap_err();
        assert!(matches!(err, PredictionError::Failed { .. }));
    }

    #[test]
    fn test_malformed_and_empty() {
        let err = interpret_output(true, Some(0), "not json", "").unwrap_err();
        assert!(matches!(err, PredictionError::MalformedOutput { .. }));

        let err = interpret_output(true, Some(0), "[1, 2]", "").unwrap_err();
        assert!(matches!(err, PredictionError::MalformedOutput { .. }));

        let err = interpret_output(true, Some(0), "", "").unwrap_err();
        assert!(matches!(err, PredictionError::EmptyOutput));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::io::Write;

        fn script(body: &str) -> tempfile::NamedTempFile {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "{}", body).unwrap();
            file
        }

        #[tokio::test]
        async fn test_runs_script_with_image_path() {
            let file = script(r#"printf '{"prediction": 42.0, "path": "%s"}' "$1""#);
            let predictor = ScriptPredictor::new("sh", file.path(), Duration::from_secs(5));

            let value = predictor.predict(Path::new("/tmp/foot.png")).await.unwrap();
            assert_eq!(value["prediction"], 42.0);
            assert_eq!(value["path"], "/tmp/foot.png");
        }

        #[tokio::test]
        async fn test_script_failure() {
            let file = script("echo 'model exploded' >&2; exit 3");
            let predictor = ScriptPredictor::new("sh", file.path(), Duration::from_secs(5));

            let err = predictor.predict(Path::new("x.png")).await.unwrap_err();
            assert!(matches!(err, PredictionError::Failed { exit_code: Some(3), .. }));
            assert_eq!(err.details().as_deref(), Some("model exploded"));
        }

        #[tokio::test]
        async fn test_timeout() {
            let file = script("sleep 5; echo '{}'");
            let predictor = ScriptPredictor::new("sh", file.path(), Duration::from_millis(200));

            let started = std::time::Instant::now();
            let err = predictor.predict(Path::new("x.png")).await.unwrap_err();

            assert!(matches!(err, PredictionError::Timeout(_)));
            assert!(started.elapsed() < Duration::from_secs(4));
        }

        #[tokio::test]
        async fn test_missing_interpreter() {
            let predictor = ScriptPredictor::new(
                "/nonexistent/seedora-python",
                "predict.py",
                Duration::from_secs(1),
            );

            let err = predictor.predict(Path::new("x.png")).await.unwrap_err();
            assert!(matches!(err, PredictionError::Spawn(_)));
        }
    }
}
