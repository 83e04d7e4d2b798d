//! Execution engine - compiles and runs a confined source file
//!
//! # Run Flow
//!
//! ```text
//! file_path ──confine──► /root/src/main.cpp
//!                              │
//!                       Language::from_path
//!                              │
//!               ┌──────────────┴──────────────┐
//!          interpreted                     compiled
//!               │                             │
//!               │                    g++ / javac (cwd = root)
//!               │                             │
//!               │                   exit != 0 ──► report.compile_error
//!               ▼                             ▼
//!        spawn (cwd = root, args appended, hard timeout)
//!               │
//!   timeout ──► killpg(SIGKILL) ──► report.timed_out
//!               │
//!               ▼
//!      stdout / stderr / exit code
//! ```
//!
//! Every child is started in its own process group so a timeout kills the
//! whole tree, not just the direct child.
//!
//! Compiled artifacts (`main` next to `main.cpp`, `Main.class` next to
//! `Main.java`) are left in place unless `cleanup_artifacts` is set.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::{confine_existing, Language, SandboxError, WorkingDirectory};
use crate::metrics::{EXECUTIONS_TOTAL, EXECUTION_DURATION};

/// Default wall-clock limit for each spawned process
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the execution engine
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Wall-clock limit applied to every compile and run step
    pub timeout: Duration,
    /// Python interpreter binary
    pub python: String,
    /// JavaScript runtime binary
    pub node: String,
    /// C++ compiler binary
    pub cxx: String,
    /// Java compiler binary
    pub javac: String,
    /// Java launcher binary
    pub java: String,
    /// Remove compiled binaries / class files after the run
    pub cleanup_artifacts: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_EXECUTION_TIMEOUT,
            python: "python3".to_string(),
            node: "node".to_string(),
            cxx: "g++".to_string(),
            javac: "javac".to_string(),
            java: "java".to_string(),
            cleanup_artifacts: false,
        }
    }
}

/// Outcome of running one source file
///
/// `exit_code` is `None` only when the program timed out. When compilation
/// fails, `compile_error` holds the compiler's stderr, `exit_code` holds the
/// compiler's code, and `stdout`/`stderr` stay empty because the run step
/// never happened.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub language: Language,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub compile_error: Option<String>,
    /// Limit the process was held to
    pub timeout: Duration,
    /// Total wall-clock time including compilation
    pub duration_ms: f64,
}

impl ExecutionReport {
    /// Render captured output for the model
    ///
    /// Empty output renders as exactly `No output produced.`
    pub fn render_output(&self) -> String {
        if self.stdout.is_empty() && self.stderr.is_empty() {
            return "No output produced.".to_string();
        }

        let mut out = format!("STDOUT:\n{}\nSTDERR:\n{}", self.stdout, self.stderr);
        if let Some(code) = self.exit_code.filter(|code| *code != 0) {
            out.push_str(&format!("\nProcess exited with code {}", code));
        }
        out
    }

    /// Convert to tool text, surfacing compile failures and timeouts as errors
    pub fn into_text(self) -> Result<String, SandboxError> {
        if let Some(stderr) = self.compile_error {
            return Err(SandboxError::CompileFailed {
                language: self.language,
                exit_code: self.exit_code,
                stderr,
            });
        }
        if self.timed_out {
            return Err(SandboxError::TimedOut(self.timeout));
        }
        Ok(self.render_output())
    }

    fn status_label(&self) -> &'static str {
        if self.compile_error.is_some() {
            "compile_error"
        } else if self.timed_out {
            "timeout"
        } else if self.exit_code == Some(0) {
            "success"
        } else {
            "error"
        }
    }
}

/// Captured result of a single child process
#[derive(Debug)]
struct ProcessOutput {
    stdout: String,
    stderr: String,
    exit_code: Option<i32>,
    timed_out: bool,
}

/// What to spawn for one language: optional compile step, then the run step
struct RunPlan {
    compile: Option<(String, Vec<OsString>)>,
    program: OsString,
    args: Vec<OsString>,
    artifact: Option<PathBuf>,
}

/// Runs source files inside a working directory
#[derive(Debug, Clone, Default)]
pub struct ExecutionEngine {
    config: ExecutionConfig,
}

impl ExecutionEngine {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Compile (if needed) and run `file_path` with `args`
    ///
    /// # Arguments
    /// * `root` - Working directory; also the child's current directory
    /// * `file_path` - Source file, relative to `root`
    /// * `args` - Appended verbatim after the program / class name
    ///
    /// # Errors
    /// Confinement, unsupported extensions, missing binaries and spawn
    /// failures are errors. Compile failures and timeouts are reported in the
    /// returned `ExecutionReport`.
    pub async fn run(
        &self,
        root: &WorkingDirectory,
        file_path: &str,
        args: &[String],
    ) -> Result<ExecutionReport, SandboxError> {
        let target = confine_existing(root, file_path)?;
        if !target.is_file() {
            return Err(SandboxError::NotAFile(file_path.to_string()));
        }

        let language = Language::from_path(&target)?;
        let plan = self.plan(language, root.path(), &target);
        let start = Instant::now();

        info!(
            file = %file_path,
            language = %language,
            compiled = language.is_compiled(),
            args = args.len(),
            "Running source file"
        );

        let report = self.execute(language, root.path(), plan, args, start).await;

        if let Ok(ref report) = report {
            let status = report.status_label();
            EXECUTIONS_TOTAL
                .with_label_values(&[language.as_str(), status])
                .inc();
            EXECUTION_DURATION
                .with_label_values(&[language.as_str()])
                .observe(report.duration_ms / 1000.0);
            info!(
                file = %file_path,
                status,
                exit_code = ?report.exit_code,
                duration_ms = report.duration_ms,
                "Execution finished"
            );
        }

        report
    }

    async fn execute(
        &self,
        language: Language,
        cwd: &Path,
        plan: RunPlan,
        args: &[String],
        start: Instant,
    ) -> Result<ExecutionReport, SandboxError> {
        let timeout = self.config.timeout;
        let empty = ExecutionReport {
            language,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            timed_out: false,
            compile_error: None,
            timeout,
            duration_ms: 0.0,
        };

        if let Some((compiler, compile_args)) = &plan.compile {
            debug!(compiler = %compiler, "Compiling");
            let output = run_process(OsStr::new(compiler), compile_args, cwd, timeout).await?;

            if output.timed_out {
                warn!(compiler = %compiler, "Compilation timed out");
                return Ok(ExecutionReport {
                    timed_out: true,
                    duration_ms: elapsed_ms(start),
                    ..empty
                });
            }
            if output.exit_code != Some(0) {
                return Ok(ExecutionReport {
                    exit_code: output.exit_code,
                    compile_error: Some(output.stderr),
                    duration_ms: elapsed_ms(start),
                    ..empty
                });
            }
        }

        let mut run_args = plan.args;
        run_args.extend(args.iter().map(OsString::from));

        let result = run_process(&plan.program, &run_args, cwd, timeout).await;

        if self.config.cleanup_artifacts {
            if let Some(artifact) = &plan.artifact {
                remove_artifact(artifact).await;
            }
        }

        let output = result?;
        if output.timed_out {
            warn!(timeout_secs = timeout.as_secs(), "Execution timed out");
        }

        Ok(ExecutionReport {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
            timed_out: output.timed_out,
            duration_ms: elapsed_ms(start),
            ..empty
        })
    }

    fn plan(&self, language: Language, root: &Path, target: &Path) -> RunPlan {
        let source = target.as_os_str().to_os_string();
        match language {
            Language::Python => RunPlan {
                compile: None,
                program: OsString::from(&self.config.python),
                args: vec![source],
                artifact: None,
            },
            Language::JavaScript => RunPlan {
                compile: None,
                program: OsString::from(&self.config.node),
                args: vec![source],
                artifact: None,
            },
            Language::Cpp => {
                // main.cpp → main
                let exe = target.with_extension("");
                RunPlan {
                    compile: Some((
                        self.config.cxx.clone(),
                        vec![
                            "-std=c++17".into(),
                            "-O2".into(),
                            "-o".into(),
                            exe.as_os_str().to_os_string(),
                            source,
                        ],
                    )),
                    program: exe.as_os_str().to_os_string(),
                    args: Vec::new(),
                    artifact: Some(exe),
                }
            }
            Language::Java => {
                // HelloWorld.java → HelloWorld
                let class_name = target
                    .file_stem()
                    .map(|s| s.to_os_string())
                    .unwrap_or_default();
                RunPlan {
                    compile: Some((self.config.javac.clone(), vec![source])),
                    program: OsString::from(&self.config.java),
                    args: vec!["-cp".into(), root.as_os_str().to_os_string(), class_name],
                    artifact: Some(target.with_extension("class")),
                }
            }
        }
    }
}

/// Spawn a process, capture its output, and enforce `timeout`
///
/// The deadline covers both waiting for the child and draining its pipes.
/// Background processes the child leaves behind in its process group are
/// killed once the child exits, so they cannot hold the pipes open. A run
/// whose output is still open at the deadline (a descendant that left the
/// group) counts as timed out.
async fn run_process(
    program: &OsStr,
    args: &[OsString],
    cwd: &Path,
    timeout: Duration,
) -> Result<ProcessOutput, SandboxError> {
    let deadline = tokio::time::Instant::now() + timeout;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SandboxError::ExecutorNotFound(program.to_string_lossy().to_string())
        } else {
            SandboxError::Spawn(e)
        }
    })?;
    let pid = child.id();

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SandboxError::Spawn(std::io::Error::other("child stdout unavailable")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SandboxError::Spawn(std::io::Error::other("child stderr unavailable")))?;

    // Drain both pipes concurrently so a chatty child cannot block on a full pipe.
    let stdout_task = spawn_reader(stdout, deadline);
    let stderr_task = spawn_reader(stderr, deadline);

    let (mut exit_code, mut timed_out) = match tokio::time::timeout_at(deadline, child.wait()).await {
        Ok(status) => {
            let status = status.map_err(SandboxError::Spawn)?;
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            (Some(status.code().unwrap_or(-1)), false)
        }
        Err(_) => {
            terminate(&mut child).await;
            (None, true)
        }
    };

    let (stdout, stdout_cut) = collect(stdout_task).await?;
    let (stderr, stderr_cut) = collect(stderr_task).await?;

    if (stdout_cut || stderr_cut) && !timed_out {
        warn!(?pid, "Output pipes still open at deadline");
        exit_code = None;
        timed_out = true;
    }

    Ok(ProcessOutput {
        stdout,
        stderr,
        exit_code,
        timed_out,
    })
}

/// Kill the child's whole process group and reap the child
async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        kill_process_group(pid);
    }

    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill timed out process");
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        // Group already empty
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid, error = %e, "Failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

/// Read a pipe to EOF or until `deadline`, keeping whatever arrived
///
/// The flag is set when the deadline cut the read short.
fn spawn_reader<R>(
    mut pipe: R,
    deadline: tokio::time::Instant,
) -> tokio::task::JoinHandle<std::io::Result<(Vec<u8>, bool)>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        match tokio::time::timeout_at(deadline, pipe.read_to_end(&mut buffer)).await {
            Ok(result) => result.map(|_| (buffer, false)),
            Err(_) => Ok((buffer, true)),
        }
    })
}

async fn collect(
    task: tokio::task::JoinHandle<std::io::Result<(Vec<u8>, bool)>>,
) -> Result<(String, bool), SandboxError> {
    let (bytes, cut) = task
        .await
        .map_err(|e| SandboxError::Spawn(std::io::Error::other(e)))?
        .map_err(SandboxError::Spawn)?;
    Ok((String::from_utf8_lossy(&bytes).to_string(), cut))
}

async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(artifact = %path.display(), "Removed build artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(artifact = %path.display(), error = %e, "Failed to remove build artifact"),
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::test_support::{has_binary, ScratchDir};

    fn report(stdout: &str, stderr: &str, exit_code: Option<i32>) -> ExecutionReport {
        ExecutionReport {
            language: Language::Python,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
            timed_out: false,
            compile_error: None,
            timeout: DEFAULT_EXECUTION_TIMEOUT,
            duration_ms: 1.0,
        }
    }

    #[test]
    fn test_render_empty_output() {
        assert_eq!(report("", "", Some(0)).render_output(), "No output produced.");
        assert_eq!(report("", "", Some(2)).render_output(), "No output produced.");
    }

    #[test]
    fn test_render_sections_and_exit_code() {
        let text = report("hi\n", "", Some(0)).render_output();
        assert_eq!(text, "STDOUT:\nhi\n\nSTDERR:\n");

        let text = report("", "boom\n", Some(3)).render_output();
        assert!(text.contains("STDERR:\nboom"));
        assert!(text.ends_with("Process exited with code 3"));
    }

    #[test]
    fn test_into_text_surfaces_compile_failure() {
        let mut r = report("", "", Some(1));
        r.language = Language::Cpp;
        r.compile_error = Some("main.cpp:1: error".to_string());
        let err = r.into_text().unwrap_err();
        assert!(matches!(err, SandboxError::CompileFailed { .. }));
        assert!(err.to_string().starts_with("C++ compilation failed:\nmain.cpp:1"));
    }

    #[test]
    fn test_into_text_surfaces_timeout() {
        let mut r = report("", "", None);
        r.timed_out = true;
        let err = r.into_text().unwrap_err();
        assert!(matches!(err, SandboxError::TimedOut(_)));
    }

    #[tokio::test]
    async fn test_rejects_escape_and_unsupported() {
        let scratch = ScratchDir::new("cb_exec");
        scratch.write("script.rb", "puts 1");
        scratch.write("pkg/inner.py", "");
        let wd = WorkingDirectory::open(scratch.path()).unwrap();
        let engine = ExecutionEngine::default();

        let err = engine.run(&wd, "../escape.py", &[]).await.unwrap_err();
        assert!(matches!(err, SandboxError::PathEscape(_)));

        let err = engine.run(&wd, "script.rb", &[]).await.unwrap_err();
        assert!(matches!(err, SandboxError::UnsupportedType(_)));

        let err = engine.run(&wd, "missing.py", &[]).await.unwrap_err();
        assert!(matches!(err, SandboxError::NotFound(_)));

        let err = engine.run(&wd, "pkg", &[]).await.unwrap_err();
        assert!(matches!(err, SandboxError::NotAFile(_)));
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let scratch = ScratchDir::new("cb_exec");
        scratch.write("hello.py", "print('hello')\n");
        let wd = WorkingDirectory::open(scratch.path()).unwrap();
        let engine = ExecutionEngine::new(ExecutionConfig {
            python: "codebuddy-no-such-python".to_string(),
            ..Default::default()
        });

        match engine.run(&wd, "hello.py", &[]).await {
            Err(SandboxError::ExecutorNotFound(binary)) => {
                assert_eq!(binary, "codebuddy-no-such-python")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_python_hello() {
        if !has_binary("python3", "--version") {
            return;
        }
        let scratch = ScratchDir::new("cb_exec");
        scratch.write("hello.py", "print('hello')\n");
        let wd = WorkingDirectory::open(scratch.path()).unwrap();

        let report = ExecutionEngine::default().run(&wd, "hello.py", &[]).await.unwrap();
        assert!(report.stdout.contains("hello"));
        assert_eq!(report.exit_code, Some(0));
        assert!(report.compile_error.is_none());
        assert!(!report.timed_out);
    }

    #[tokio::test]
    async fn test_python_args_and_cwd() {
        if !has_binary("python3", "--version") {
            return;
        }
        let scratch = ScratchDir::new("cb_exec");
        scratch.write("data.txt", "payload");
        scratch.write(
            "scripts/args.py",
            "import sys\nprint(sys.argv[1:])\nprint(open('data.txt').read())\nsys.exit(3)\n",
        );
        let wd = WorkingDirectory::open(scratch.path()).unwrap();
        let args = vec!["--flag".to_string(), "two words".to_string()];

        let report = ExecutionEngine::default()
            .run(&wd, "scripts/args.py", &args)
            .await
            .unwrap();
        assert!(report.stdout.contains("['--flag', 'two words']"));
        assert!(report.stdout.contains("payload"));
        assert_eq!(report.exit_code, Some(3));
        assert!(report.render_output().ends_with("Process exited with code 3"));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        if !has_binary("python3", "--version") {
            return;
        }
        let scratch = ScratchDir::new("cb_exec");
        scratch.write(
            "sleepy.py",
            "import os, time\nwith open('pid.txt', 'w') as f:\n    f.write(str(os.getpid()))\ntime.sleep(60)\n",
        );
        let wd = WorkingDirectory::open(scratch.path()).unwrap();
        let engine = ExecutionEngine::new(ExecutionConfig {
            timeout: Duration::from_secs(2),
            ..Default::default()
        });

        let started = Instant::now();
        let report = engine.run(&wd, "sleepy.py", &[]).await.unwrap();
        assert!(report.timed_out);
        assert_eq!(report.exit_code, None);
        assert!(started.elapsed() < Duration::from_secs(20));

        let pid: i32 = std::fs::read_to_string(scratch.path().join("pid.txt"))
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let alive = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok();
        assert!(!alive, "timed out process {} is still running", pid);
    }

    /// Whether `pid` is still a live (non-zombie) process
    fn is_running(pid: i32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .is_some_and(|state| state != 'Z' && state != 'X'),
            Err(_) => nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok(),
        }
    }

    #[tokio::test]
    async fn test_background_child_does_not_outlive_run() {
        if !has_binary("python3", "--version") {
            return;
        }
        let scratch = ScratchDir::new("cb_exec");
        scratch.write(
            "bg.py",
            "import subprocess, sys\n\
             p = subprocess.Popen([sys.executable, '-c', 'import time; time.sleep(25)'])\n\
             open('child.pid', 'w').write(str(p.pid))\n\
             print('parent done')\n",
        );
        let wd = WorkingDirectory::open(scratch.path()).unwrap();
        let engine = ExecutionEngine::new(ExecutionConfig {
            timeout: Duration::from_secs(2),
            ..Default::default()
        });

        let started = Instant::now();
        let report = engine.run(&wd, "bg.py", &[]).await.unwrap();
        assert!(
            started.elapsed() < Duration::from_secs(10),
            "run took {:?} with a 2 s timeout",
            started.elapsed()
        );
        assert!(!report.timed_out);
        assert_eq!(report.exit_code, Some(0));
        assert!(report.stdout.contains("parent done"));

        let pid: i32 = std::fs::read_to_string(scratch.path().join("child.pid"))
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let mut alive = is_running(pid);
        for _ in 0..20 {
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            alive = is_running(pid);
        }
        assert!(!alive, "background process {} is still running", pid);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_compile_step_is_held_to_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let scratch = ScratchDir::new("cb_exec");
        scratch.write("main.cpp", "int main() { return 0; }\n");
        let compiler = scratch.write("slow-cxx.sh", "#!/bin/sh\nexec sleep 20\n");
        std::fs::set_permissions(&compiler, std::fs::Permissions::from_mode(0o755)).unwrap();
        let wd = WorkingDirectory::open(scratch.path()).unwrap();
        let engine = ExecutionEngine::new(ExecutionConfig {
            timeout: Duration::from_secs(1),
            cxx: compiler.to_string_lossy().to_string(),
            ..Default::default()
        });

        let started = Instant::now();
        let report = engine.run(&wd, "main.cpp", &[]).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(report.timed_out);
        assert!(report.compile_error.is_none());
        assert!(matches!(report.into_text(), Err(SandboxError::TimedOut(_))));
    }

    #[tokio::test]
    async fn test_javascript_with_args() {
        if !has_binary("node", "--version") {
            return;
        }
        let scratch = ScratchDir::new("cb_exec");
        scratch.write("app.js", "console.log(process.argv.slice(2).join('|'));\n");
        let wd = WorkingDirectory::open(scratch.path()).unwrap();

        let args = vec!["one".to_string(), "two words".to_string()];
        let report = ExecutionEngine::default().run(&wd, "app.js", &args).await.unwrap();
        assert_eq!(report.language, Language::JavaScript);
        assert_eq!(report.stdout.trim(), "one|two words");
        assert_eq!(report.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_java_runs_class_from_root_with_args() {
        if !has_binary("javac", "-version") || !has_binary("java", "-version") {
            return;
        }
        let scratch = ScratchDir::new("cb_exec");
        scratch.write(
            "Hello.java",
            "public class Hello {\n\
             public static void main(String[] args) {\n\
             System.out.println(\"args=\" + String.join(\",\", args));\n\
             }\n\
             }\n",
        );
        let wd = WorkingDirectory::open(scratch.path()).unwrap();

        let args = vec!["x".to_string(), "y".to_string()];
        let report = ExecutionEngine::default().run(&wd, "Hello.java", &args).await.unwrap();
        assert!(report.compile_error.is_none(), "{:?}", report.compile_error);
        assert_eq!(report.stdout.trim(), "args=x,y");
        assert_eq!(report.exit_code, Some(0));
        assert!(scratch.path().join("Hello.class").exists());
    }

    #[tokio::test]
    async fn test_java_compile_error_rendering() {
        if !has_binary("javac", "-version") {
            return;
        }
        let scratch = ScratchDir::new("cb_exec");
        scratch.write("Broken.java", "public class Broken { int x = }\n");
        let wd = WorkingDirectory::open(scratch.path()).unwrap();

        let report = ExecutionEngine::default().run(&wd, "Broken.java", &[]).await.unwrap();
        assert!(report.exit_code.is_some_and(|c| c != 0));
        let err = report.into_text().unwrap_err();
        assert!(err.to_string().starts_with("Java compilation failed:\n"));
        assert!(!scratch.path().join("Broken.class").exists());
    }

    #[tokio::test]
    async fn test_cpp_compile_error_skips_run() {
        if !has_binary("g++", "--version") {
            return;
        }
        let scratch = ScratchDir::new("cb_exec");
        scratch.write("broken.cpp", "int main() { return 0 }\n");
        let wd = WorkingDirectory::open(scratch.path()).unwrap();

        let report = ExecutionEngine::default().run(&wd, "broken.cpp", &[]).await.unwrap();
        assert!(report.compile_error.as_deref().is_some_and(|e| !e.is_empty()));
        assert!(report.exit_code.is_some_and(|c| c != 0));
        assert!(report.stdout.is_empty());
        assert!(report.stderr.is_empty());
        assert!(!scratch.path().join("broken").exists());
    }

    #[tokio::test]
    async fn test_cpp_run_and_cleanup() {
        if !has_binary("g++", "--version") {
            return;
        }
        let scratch = ScratchDir::new("cb_exec");
        scratch.write(
            "echo.cpp",
            "#include <iostream>\nint main(int argc, char** argv) { std::cout << argc - 1 << std::endl; }\n",
        );
        let wd = WorkingDirectory::open(scratch.path()).unwrap();

        let args = vec!["a".to_string(), "b".to_string()];
        let report = ExecutionEngine::default().run(&wd, "echo.cpp", &args).await.unwrap();
        assert_eq!(report.stdout.trim(), "2");
        assert!(scratch.path().join("echo").exists());

        let engine = ExecutionEngine::new(ExecutionConfig {
            cleanup_artifacts: true,
            ..Default::default()
        });
        let report = engine.run(&wd, "echo.cpp", &[]).await.unwrap();
        assert_eq!(report.stdout.trim(), "0");
        assert!(!scratch.path().join("echo").exists());
    }
}
