use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/ledmesh-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("ephemeral bind should work");
    listener
        .local_addr()
        .expect("bound listener has an address")
        .port()
}

fn ledmesh(port: u16, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ledmesh"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .args(["--registry", &format!("127.0.0.1:{port}"), "--timeout", "2s"])
        .output()
        .expect("ledmesh should run")
}

struct Registry {
    child: Child,
    port: u16,
}

impl Registry {
    fn start(state: &Path) -> Self {
        let port = free_port();
        let child = Command::new(env!("CARGO_BIN_EXE_ledmesh"))
            .args(["--log-level", "error", "serve", "--port"])
            .arg(port.to_string())
            .arg("--state")
            .arg(state)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("serve should start");

        let start = Instant::now();
        while !ledmesh(port, &["status"]).status.success() {
            if start.elapsed() >= Duration::from_secs(10) {
                panic!("registry did not come up");
            }
            thread::sleep(Duration::from_millis(50));
        }
        Self { child, port }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_ledmesh"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("ledmesh {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn status_without_registry_is_a_transport_error() {
    let output = ledmesh(free_port(), &["status"]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect failed"));
}

#[test]
fn profile_lifecycle_against_running_registry() {
    let dir = unique_temp_dir("lifecycle");
    let state_path = dir.join("state.json");
    let registry = Registry::start(&state_path);

    let created = json(&ledmesh(
        registry.port,
        &["profile", "create", "movie", "screen=strip"],
    ));
    assert_eq!(created["name"], "movie");
    assert_eq!(created["io"][0]["input_id"], "screen");
    assert_eq!(created["io"][0]["output_id"], "strip");
    let id = created["id"].as_str().expect("profile id").to_string();

    let enabled = json(&ledmesh(registry.port, &["profile", "enable", &id]));
    assert_eq!(enabled["status"], "enabled");

    let status = json(&ledmesh(registry.port, &["status"]));
    assert_eq!(status["active_profiles"][0], id.as_str());

    let persisted = std::fs::read_to_string(&state_path).expect("state should be persisted");
    assert!(persisted.contains(&id));

    let refused = ledmesh(registry.port, &["profile", "delete", &id]);
    assert_eq!(refused.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&refused.stderr).contains("profile is active"));

    json(&ledmesh(registry.port, &["profile", "disable", &id]));
    json(&ledmesh(registry.port, &["profile", "delete", &id]));

    let profiles = json(&ledmesh(registry.port, &["profile", "list"]));
    assert_eq!(profiles, serde_json::json!([]));

    drop(registry);
    let _ = std::fs::remove_dir_all(&dir);
}
