use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::ToolchainConfig;
use crate::contexts::{
    interpret_compile, interpret_test_run, module_of, test_class_name, CoverageReport, TestCounts,
    ToolOutput, Toolchain,
};
use crate::error::ToolchainFailure;

/// Gradle-backed toolchain for Kotlin test sources.
///
/// Every invocation runs from the project root, is scoped to the module that
/// owns the target, and is killed once `timeout_secs` elapse.
#[derive(Debug, Clone)]
pub struct GradleToolchain {
    config: ToolchainConfig,
}

impl GradleToolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    fn module<'a>(&'a self, target: &'a str) -> &'a str {
        module_of(target, &self.config.default_module)
    }

    fn compile_args(&self, target: &str) -> Vec<String> {
        let mut args = vec![format!(":{}:compileTestKotlin", self.module(target))];
        args.extend(self.exclusions());
        args
    }

    fn test_args(&self, target: &str) -> Vec<String> {
        let mut args = vec![
            format!(":{}:test", self.module(target)),
            "--tests".to_string(),
            test_class_name(target),
        ];
        args.extend(self.exclusions());
        args
    }

    fn coverage_args(&self, target: &str) -> Vec<String> {
        vec![format!(":{}:jacocoTestReport", self.module(target))]
    }

    fn exclusions(&self) -> impl Iterator<Item = String> + '_ {
        self.config
            .excluded_tasks
            .iter()
            .flat_map(|task| ["-x".to_string(), task.clone()])
    }

    /// `./gradlew` is resolved against the project root, not our own cwd.
    fn program(&self, project_root: &Path) -> PathBuf {
        let command = Path::new(&self.config.gradle_command);
        if command.is_relative() && self.config.gradle_command.contains('/') {
            project_root.join(command)
        } else {
            command.to_path_buf()
        }
    }

    async fn invoke(&self, project_root: &Path, args: Vec<String>) -> Result<ToolOutput, ToolchainFailure> {
        let command_line = format!("{} {}", self.config.gradle_command, args.join(" "));
        // The wrapper path and the child's cwd must agree even for relative roots.
        let root = tokio::fs::canonicalize(project_root)
            .await
            .map_err(|e| ToolchainFailure::Spawn {
                command: command_line.clone(),
                reason: format!("project root {}: {}", project_root.display(), e),
            })?;
        debug!(command = %command_line, root = %root.display(), "Running Gradle");

        let mut command = Command::new(self.program(&root));
        command
            .args(&args)
            .current_dir(&root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(java_home) = &self.config.java_home {
            command.env("JAVA_HOME", java_home);
        }

        let child = command.spawn().map_err(|e| ToolchainFailure::Spawn {
            command: command_line.clone(),
            reason: e.to_string(),
        })?;

        let secs = self.config.timeout_secs;
        let output = match tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolchainFailure::Spawn {
                    command: command_line,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ToolchainFailure::Timeout {
                    command: command_line,
                    secs,
                })
            }
        };

        Ok(ToolOutput {
            status_success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[async_trait]
impl Toolchain for GradleToolchain {
    async fn compile(&self, project_root: &Path, target: &str) -> Result<ToolOutput, ToolchainFailure> {
        let output = self.invoke(project_root, self.compile_args(target)).await?;
        interpret_compile(&self.config.gradle_command, output)
    }

    async fn run(&self, project_root: &Path, target: &str) -> Result<TestCounts, ToolchainFailure> {
        let output = self.invoke(project_root, self.test_args(target)).await?;
        interpret_test_run(&self.config.gradle_command, output)
    }

    async fn coverage(&self, project_root: &Path, target: &str) -> Result<CoverageReport, ToolchainFailure> {
        let output = self.invoke(project_root, self.coverage_args(target)).await?;
        if !output.status_success {
            return Err(ToolchainFailure::NonZeroExit {
                command: self.config.gradle_command.clone(),
                status: "failure".to_string(),
                output: output.combined(),
            });
        }
        Ok(CoverageReport {
            report_path: format!(
                "{}/build/reports/jacoco/test/html/index.html",
                self.module(target)
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "order/src/test/kotlin/com/acme/OrderServiceTest.kt";

    fn toolchain(command: &str) -> GradleToolchain {
        GradleToolchain::new(ToolchainConfig {
            gradle_command: command.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn compile_is_scoped_to_module_and_skips_kapt() {
        let args = toolchain("./gradlew").compile_args(TARGET);
        assert_eq!(args[0], ":order:compileTestKotlin");
        assert_eq!(args.iter().filter(|a| *a == "-x").count(), 4);
        assert!(args.contains(&"kaptGenerateStubsTestKotlin".to_string()));
    }

    #[test]
    fn tests_are_filtered_by_class() {
        let args = toolchain("./gradlew").test_args(TARGET);
        assert_eq!(&args[..3], &[":order:test", "--tests", "OrderServiceTest"]);
    }

    #[test]
    fn target_without_module_uses_default() {
        let args = toolchain("./gradlew").coverage_args("OrderServiceTest.kt");
        assert_eq!(args, vec![":app:jacocoTestReport"]);
    }

    #[test]
    fn wrapper_resolves_against_project_root() {
        let root = Path::new("/work/shop");
        assert_eq!(toolchain("./gradlew").program(root), root.join("./gradlew"));
        assert_eq!(toolchain("gradle").program(root), PathBuf::from("gradle"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_output_compiles() {
        let output = toolchain("echo").compile(&std::env::temp_dir(), TARGET).await.unwrap();
        assert!(output.stdout.contains(":order:compileTestKotlin"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_without_counts_passes() {
        let counts = toolchain("echo").run(&std::env::temp_dir(), TARGET).await.unwrap();
        assert_eq!(counts, TestCounts::default());
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn wrapper_runs_from_relative_project_root() {
        let dir = tempfile::tempdir_in(".").unwrap();
        write_script(dir.path(), "gradlew", "echo BUILD SUCCESSFUL");
        let relative = PathBuf::from(dir.path().file_name().unwrap());

        let output = toolchain("./gradlew").compile(&relative, TARGET).await.unwrap();
        assert!(output.stdout.contains("BUILD SUCCESSFUL"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_build_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "slow-gradle", "sleep 10");
        let toolchain = GradleToolchain::new(ToolchainConfig {
            gradle_command: script.display().to_string(),
            timeout_secs: 1,
            ..Default::default()
        });

        let err = toolchain.run(dir.path(), TARGET).await.unwrap_err();
        assert!(matches!(err, ToolchainFailure::Timeout { secs: 1, .. }));
    }

    #[tokio::test]
    async fn missing_project_root_is_a_spawn_failure() {
        let err = toolchain("./gradlew")
            .compile(Path::new("/definitely/not/a/project"), TARGET)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolchainFailure::Spawn { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_failure() {
        let err = toolchain("testsmith-no-such-gradle")
            .compile(&std::env::temp_dir(), TARGET)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolchainFailure::Spawn { .. }));
    }
}
