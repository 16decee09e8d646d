//! Process-backed sandbox.
//!
//! Mounts the project tree into a workspace directory on disk, runs the
//! install command to completion, and keeps at most one long-lived run
//! process whose output is scanned for the readiness line carrying the
//! preview address.

use async_recursion::async_recursion;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};

use super::{MountDir, MountEntry, ReadySignal, Sandbox, SandboxError};

/// Sandbox backed by a workspace directory and `tokio::process`.
pub struct ProcessSandbox {
    root: PathBuf,
    install_command: Vec<String>,
    run_command: Vec<String>,
    child: Mutex<Option<Child>>,
}

impl ProcessSandbox {
    /// Boot the sandbox once per application lifetime. The returned handle is
    /// passed to the sync controller; nothing else should hold it.
    pub async fn boot(
        root: PathBuf,
        install_command: Vec<String>,
        run_command: Vec<String>,
    ) -> anyhow::Result<Arc<Self>> {
        tokio::fs::create_dir_all(&root).await?;
        tracing::info!("Sandbox booted at {}", root.display());

        Ok(Arc::new(Self {
            root,
            install_command,
            run_command,
            child: Mutex::new(None),
        }))
    }

    fn command(parts: &[String], cwd: &Path) -> Command {
        let mut cmd = Command::new(&parts[0]);
        if parts.len() > 1 {
            cmd.args(&parts[1..]);
        }
        cmd.current_dir(cwd);
        cmd
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn mount(&self, root: &MountDir) -> Result<(), SandboxError> {
        // Full replace: the controller rebuilds the tree wholesale, so stale
        // files from a previous mount must not survive.
        if tokio::fs::try_exists(&self.root).await? {
            tokio::fs::remove_dir_all(&self.root)
                .await
                .map_err(|e| SandboxError::Mount(format!("clearing workspace: {}", e)))?;
        }
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SandboxError::Mount(format!("creating workspace: {}", e)))?;

        write_entries(&self.root, root).await?;

        tracing::info!(
            "Mounted {} top-level entries into {}",
            root.len(),
            self.root.display()
        );
        Ok(())
    }

    async fn terminate_running(&self) {
        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            if let Err(e) = child.start_kill() {
                tracing::debug!("No run process to kill: {}", e);
                return;
            }
            let _ = child.wait().await;
            tracing::debug!("Previous run process terminated");
        }
    }

    async fn install(&self) -> Result<i32, SandboxError> {
        tracing::info!("Installing dependencies: {}", self.install_command.join(" "));

        let output = Self::command(&self.install_command, &self.root)
            .output()
            .await
            .map_err(|e| SandboxError::Install(format!("{}", e)))?;

        let code = output.status.code().unwrap_or(-1);
        if !output.status.success() {
            tracing::warn!(
                "Install exited with code {}: {}",
                code,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(code)
    }

    async fn start(&self) -> Result<ReadySignal, SandboxError> {
        tracing::info!("Starting run process: {}", self.run_command.join(" "));

        let mut cmd = Self::command(&self.run_command, &self.root);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| SandboxError::Start(format!("{}", e)))?;

        let (tx, rx) = oneshot::channel();
        let ready = Arc::new(Mutex::new(Some(tx)));

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output("stdout", stdout, Arc::clone(&ready)));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output("stderr", stderr, ready));
        }

        *self.child.lock().await = Some(child);
        Ok(rx)
    }
}

#[async_recursion]
async fn write_entries(dir: &Path, entries: &MountDir) -> Result<(), SandboxError> {
    for (name, entry) in entries {
        let path = dir.join(name);
        match entry {
            MountEntry::File { contents } => {
                tokio::fs::write(&path, contents)
                    .await
                    .map_err(|e| SandboxError::Mount(format!("writing {}: {}", path.display(), e)))?;
            }
            MountEntry::Directory { entries } => {
                tokio::fs::create_dir_all(&path)
                    .await
                    .map_err(|e| SandboxError::Mount(format!("creating {}: {}", path.display(), e)))?;
                write_entries(&path, entries).await?;
            }
        }
    }
    Ok(())
}

/// Pipe run-process output into the log, resolving the readiness signal with
/// the first URL that appears.
async fn forward_output<R>(stream: &'static str, reader: R, ready: Arc<Mutex<Option<oneshot::Sender<String>>>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!("[run:{}] {}", stream, line);
        if let Some(url) = extract_preview_url(&line) {
            if let Some(tx) = ready.lock().await.take() {
                let _ = tx.send(url);
            }
        }
    }
}

/// Pull the first URL-looking token out of a log line.
fn extract_preview_url(line: &str) -> Option<String> {
    let idx = line.find("http://").or_else(|| line.find("https://"))?;
    let url: String = line[idx..]
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '"' && *c != '\'')
        .collect();
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::mount_tree;
    use crate::tree::build_from_entries;

    #[test]
    fn preview_url_extracted_from_dev_server_banner() {
        assert_eq!(
            extract_preview_url("  ➜  Local:   http://localhost:5173/"),
            Some("http://localhost:5173/".to_string())
        );
        assert_eq!(
            extract_preview_url("ready on https://0.0.0.0:3000"),
            Some("https://0.0.0.0:3000".to_string())
        );
        assert_eq!(extract_preview_url("compiling..."), None);
    }

    #[tokio::test]
    async fn mount_writes_tree_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("project");
        let sandbox = ProcessSandbox::boot(
            root.clone(),
            vec!["true".to_string()],
            vec!["true".to_string()],
        )
        .await
        .unwrap();

        let tree = build_from_entries(vec![
            ("src/App.tsx".to_string(), "app".to_string()),
            ("package.json".to_string(), "{}".to_string()),
        ]);
        sandbox.mount(&mount_tree(&tree)).await.unwrap();

        assert_eq!(
            tokio::fs::read_to_string(root.join("src/App.tsx"))
                .await
                .unwrap(),
            "app"
        );
        assert_eq!(
            tokio::fs::read_to_string(root.join("package.json"))
                .await
                .unwrap(),
            "{}"
        );
    }

    #[tokio::test]
    async fn remount_drops_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("project");
        let sandbox = ProcessSandbox::boot(
            root.clone(),
            vec!["true".to_string()],
            vec!["true".to_string()],
        )
        .await
        .unwrap();

        let first = build_from_entries(vec![("old.txt".to_string(), "old".to_string())]);
        sandbox.mount(&mount_tree(&first)).await.unwrap();

        let second = build_from_entries(vec![("new.txt".to_string(), "new".to_string())]);
        sandbox.mount(&mount_tree(&second)).await.unwrap();

        assert!(!root.join("old.txt").exists());
        assert_eq!(
            tokio::fs::read_to_string(root.join("new.txt")).await.unwrap(),
            "new"
        );
    }

    #[tokio::test]
    async fn install_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = ProcessSandbox::boot(
            dir.path().join("project"),
            vec!["false".to_string()],
            vec!["true".to_string()],
        )
        .await
        .unwrap();

        let tree = build_from_entries(vec![("a.txt".to_string(), "a".to_string())]);
        sandbox.mount(&mount_tree(&tree)).await.unwrap();

        let code = sandbox.install().await.unwrap();
        assert_ne!(code, 0);
    }

    #[tokio::test]
    async fn readiness_signal_carries_url() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = ProcessSandbox::boot(
            dir.path().join("project"),
            vec!["true".to_string()],
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo serving at http://127.0.0.1:4000; sleep 5".to_string(),
            ],
        )
        .await
        .unwrap();

        let tree = build_from_entries(vec![("a.txt".to_string(), "a".to_string())]);
        sandbox.mount(&mount_tree(&tree)).await.unwrap();

        let ready = sandbox.start().await.unwrap();
        let url = ready.await.unwrap();
        assert_eq!(url, "http://127.0.0.1:4000");

        sandbox.terminate_running().await;
    }
}
