use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::app::ports::BackendError;

/// Captured output of a CLI invocation that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `program` to completion, bounded by `limit`.
///
/// A non-zero exit status becomes [`BackendError::QueryFailed`] carrying stderr.
pub async fn run_cli(program: &str, args: &[String], limit: Duration) -> Result<CliOutput, BackendError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true) // Ensure child process is killed on timeout/drop
        .spawn()
        .map_err(|e| BackendError::CommandNotFound(format!("{}: {}", program, e)))?;

    // Read stdout/stderr BEFORE wait() to prevent pipe buffer deadlock
    let mut stdout_handle = child.stdout.take();
    let mut stderr_handle = child.stderr.take();

    let (status, stdout, stderr) = timeout(limit, async {
        let (stdout_result, stderr_result) = tokio::join!(
            async {
                let mut buf = Vec::new();
                if let Some(ref mut out) = stdout_handle {
                    out.read_to_end(&mut buf).await?;
                }
                Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).into_owned())
            },
            async {
                let mut buf = Vec::new();
                if let Some(ref mut err) = stderr_handle {
                    err.read_to_end(&mut buf).await?;
                }
                Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).into_owned())
            }
        );

        let stdout = stdout_result?;
        let stderr = stderr_result?;
        let status = child.wait().await?;

        Ok::<_, std::io::Error>((status, stdout, stderr))
    })
    .await
    .map_err(|_| BackendError::Timeout)?
    .map_err(|e| BackendError::QueryFailed(e.to_string()))?;

    if !status.success() {
        let message = stderr.trim();
        return Err(BackendError::QueryFailed(if message.is_empty() {
            format!("{} exited with {}", program, status)
        } else {
            message.to_string()
        }));
    }

    Ok(CliOutput { stdout, stderr })
}

/// Number of data records in CSV output with a header line.
pub fn count_csv_records(output: &str) -> Result<u64, BackendError> {
    if output.trim().is_empty() {
        return Ok(0);
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(output.as_bytes());
    let mut count = 0;
    for record in reader.records() {
        record.map_err(|e| BackendError::UnexpectedOutput(format!("CSV parse error: {}", e)))?;
        count += 1;
    }
    Ok(count)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    mod run_cli {
        use super::*;

        #[tokio::test]
        async fn captures_both_streams() {
            let output = run_cli("sh", &sh("echo out; echo err >&2"), Duration::from_secs(5))
                .await
                .unwrap();

            assert_eq!(output.stdout.trim(), "out");
            assert_eq!(output.stderr.trim(), "err");
        }

        #[tokio::test]
        async fn non_zero_exit_reports_stderr() {
            let err = run_cli("sh", &sh("echo 'relation missing' >&2; exit 3"), Duration::from_secs(5))
                .await
                .unwrap_err();

            assert_eq!(err, BackendError::QueryFailed("relation missing".to_string()));
        }

        #[tokio::test]
        async fn missing_program_is_command_not_found() {
            let err = run_cli("tablestress-no-such-cli", &[], Duration::from_secs(5))
                .await
                .unwrap_err();

            assert!(matches!(err, BackendError::CommandNotFound(_)));
        }

        #[tokio::test]
        async fn slow_program_times_out() {
            let err = run_cli("sh", &sh("sleep 5"), Duration::from_millis(50))
                .await
                .unwrap_err();

            assert_eq!(err, BackendError::Timeout);
        }
    }

    mod count_csv_records {
        use super::*;
        use rstest::rstest;

        #[rstest]
        #[case("", 0)]
        #[case("\"row_count\"\n", 0)]
        #[case("\"_col0\"\n\"1\"\n", 1)]
        #[case("name,min_value\n\"a, b\",1.0\nc,2.0\n", 2)]
        fn counts_data_rows(#[case] output: &str, #[case] expected: u64) {
            assert_eq!(count_csv_records(output).unwrap(), expected);
        }

        #[test]
        fn ragged_rows_are_unexpected_output() {
            let err = count_csv_records("a,b\n1,2,3\n").unwrap_err();

            assert!(matches!(err, BackendError::UnexpectedOutput(_)));
        }
    }
}
