//! Integration tests for nmb
//!
//! Drives the engine through its public API with scripted input and an
//! in-memory remote host.

use async_trait::async_trait;
use nmb::cli::Config;
use nmb::modules::{ModuleHeader, ModuleStore};
use nmb::remote::{RemoteOutput, RemoteSession, RemoteTarget};
use nmb::repl::{Command, Engine, Prompter, ReadEvent};
use nmb::runner::{LaunchPlan, ProcessTable, StopOutcome};
use nmb::NmbError;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct Script(VecDeque<ReadEvent>);

impl Script {
    fn new(lines: &[&str]) -> Box<Self> {
        Self::events(lines.iter().map(|l| ReadEvent::Line(l.to_string())).collect())
    }

    fn events(events: Vec<ReadEvent>) -> Box<Self> {
        Box::new(Script(events.into()))
    }

    fn next(&mut self) -> ReadEvent {
        self.0.pop_front().unwrap_or(ReadEvent::Eof)
    }
}

impl Prompter for Script {
    fn read_command(&mut self, _prompt: &str) -> anyhow::Result<ReadEvent> {
        Ok(self.next())
    }

    fn read_answer(&mut self, _prompt: &str) -> anyhow::Result<ReadEvent> {
        Ok(self.next())
    }

    fn read_password(&mut self, _prompt: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

#[derive(Default)]
struct HostLog {
    uploads: Vec<(String, String)>,
    commands: Vec<String>,
}

/// Remote host that records what it was asked to do
struct FakeHost {
    target: RemoteTarget,
    log: Arc<Mutex<HostLog>>,
}

#[async_trait]
impl RemoteSession for FakeHost {
    fn target(&self) -> &RemoteTarget {
        &self.target
    }

    fn remote_dir(&self) -> &str {
        "/tmp"
    }

    async fn upload(&self, name: &str, content: &[u8]) -> nmb::Result<String> {
        let path = format!("/tmp/{}", name);
        self.log
            .lock()
            .unwrap()
            .uploads
            .push((path.clone(), String::from_utf8_lossy(content).into_owned()));
        Ok(path)
    }

    async fn exec(&self, command: &str) -> nmb::Result<RemoteOutput> {
        self.log.lock().unwrap().commands.push(command.to_string());
        Ok(RemoteOutput {
            stdout: "ok\n".to_string(),
            stderr: String::new(),
            exit_status: 0,
        })
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> nmb::Result<()> {
        std::fs::write(local_path, format!("copied from {}", remote_path))?;
        Ok(())
    }

    async fn disconnect(&self) -> nmb::Result<()> {
        Ok(())
    }
}

fn config_in(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.registry.url = "http://127.0.0.1:9/modules".to_string();
    config.paths.modules_dir = tmp.path().join("modules").to_string_lossy().into_owned();
    config.paths.logs_dir = tmp.path().join("logs").to_string_lossy().into_owned();
    config
}

#[test]
fn test_store_and_header_round_trip() {
    let tmp = TempDir::new().unwrap();
    let store = ModuleStore::new(tmp.path().join("modules"));
    store
        .write(
            "scan.sh",
            "#!/bin/bash\r\n# Help: target - host to scan\r\n# Inputs: target, ports\r\n# Dependencies: nmap\r\n",
        )
        .unwrap();

    assert_eq!(store.list().unwrap(), vec!["scan.sh"]);
    assert!(!store.read("scan.sh").unwrap().contains('\r'));

    let header = store.read_header("scan.sh").unwrap();
    assert_eq!(header.inputs, vec!["target", "ports"]);
    assert_eq!(header.dependencies, vec!["nmap"]);
    assert_eq!(header.input_prompt("target"), "target: (host to scan) ");
    assert_eq!(header.input_prompt("ports"), "ports: ");
    assert_eq!(header, ModuleHeader::from_file(&tmp.path().join("modules/scan.sh")).unwrap());
}

#[tokio::test]
async fn test_local_launch_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let store = ModuleStore::new(tmp.path().join("modules"));
    store.write("idle.py", "import time\ntime.sleep(30)\n").unwrap();

    let plan = LaunchPlan::new(&store, "idle.py", vec![]).unwrap();
    let mut table = ProcessTable::new();
    table.launch(&plan).unwrap();
    assert!(table.is_running("idle.py"));

    assert_eq!(table.stop("idle.py").await.unwrap(), StopOutcome::Terminated);
    assert!(matches!(
        table.stop("idle.py").await,
        Err(NmbError::NotRunning(_))
    ));
}

#[tokio::test]
async fn test_remote_session_flow() {
    let tmp = TempDir::new().unwrap();
    let log = Arc::new(Mutex::new(HostLog::default()));
    let mut engine = Engine::new(config_in(&tmp), Script::new(&["eth0"])).unwrap();
    engine.setup_directories().unwrap();
    engine
        .store()
        .write("sniff.sh", "# Inputs: iface\r\ntcpdump -i $1\r\n")
        .unwrap();
    engine.set_remote(Box::new(FakeHost {
        target: RemoteTarget::parse("pi@raspberrypi.local").unwrap(),
        log: Arc::clone(&log),
    }));

    engine.execute(Command::parse("launch sniff.sh")).await.unwrap();
    engine
        .execute(Command::parse("pull /tmp/capture.pcap"))
        .await
        .unwrap();

    let host = log.lock().unwrap();
    assert_eq!(host.uploads.len(), 1);
    assert_eq!(host.uploads[0].0, "/tmp/sniff.sh");
    assert_eq!(host.uploads[0].1, "# Inputs: iface\ntcpdump -i $1\n");
    assert_eq!(host.commands.len(), 1);
    assert!(host.commands[0].starts_with("bash "));
    assert!(host.commands[0].contains("eth0"));

    let pulled = std::fs::read_to_string(tmp.path().join("logs/capture.pcap")).unwrap();
    assert_eq!(pulled, "copied from /tmp/capture.pcap");
}

#[tokio::test]
async fn test_repl_loop_survives_errors() {
    let tmp = TempDir::new().unwrap();
    let script = Script::new(&["launch ghost.sh", "read ../etc/passwd", "whatever", "list"]);
    let mut engine = Engine::new(config_in(&tmp), script).unwrap();

    engine.run().await.unwrap();
    assert!(tmp.path().join("modules").is_dir());
    assert!(tmp.path().join("logs").is_dir());
}

#[tokio::test]
async fn test_exit_stops_tracked_modules() {
    let tmp = TempDir::new().unwrap();
    let script = Script::new(&["launch nap.sh", "exit", "list"]);
    let mut engine = Engine::new(config_in(&tmp), script).unwrap();
    engine.setup_directories().unwrap();
    engine.store().write("nap.sh", "sleep 30\n").unwrap();

    engine.run().await.unwrap();
    assert!(engine.processes().is_empty());
}

#[tokio::test]
async fn test_ctrl_c_keeps_the_session_alive() {
    let tmp = TempDir::new().unwrap();
    let script = Script::events(vec![
        ReadEvent::Interrupted,
        ReadEvent::Line("remove old.sh".to_string()),
        ReadEvent::Interrupted,
        ReadEvent::Line("exit".to_string()),
        ReadEvent::Line("remove keep.sh".to_string()),
    ]);
    let mut engine = Engine::new(config_in(&tmp), script).unwrap();
    engine.setup_directories().unwrap();
    engine.store().write("old.sh", "echo old\n").unwrap();
    engine.store().write("keep.sh", "echo keep\n").unwrap();

    engine.run().await.unwrap();

    // commands after Ctrl-C still ran, nothing after exit did
    assert_eq!(engine.store().list().unwrap(), vec!["keep.sh"]);
}
