use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::{tempdir, TempDir};
use tokio::sync::Notify;

use wgkeeper::config::ConfigRepository;
use wgkeeper::controller::{TunnelController, TunnelState};
use wgkeeper::driver::{StatusSample, TunnelDriver};
use wgkeeper::error::VpnError;
use wgkeeper::settings::Settings;
use tokio_util::sync::CancellationToken;

const CONF: &str = "\
[Interface]
PrivateKey = cFff9SJ2XvDF8BpCWh1nYRozu7Lk6eUzVyBPQJ+mC2E=
Address = 10.0.0.2/32

[Peer]
PublicKey = HIgo9xNzJMWLKASShiTqIybxZ0U3wGLiUeJ1PKf8ykw=
AllowedIPs = 0.0.0.0/0
Endpoint = vpn.example.org:51820
";

#[derive(Default)]
struct MockState {
    up: bool,
    started: bool,
    samples_after_start: usize,
}

/// Scripted driver: `converge_after` controls how many post-start samples
/// still report down before the interface comes up (`None` = never).
struct MockDriver {
    state: Mutex<MockState>,
    converge_after: Option<usize>,
    start_gate: Option<Arc<Notify>>,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    sample_calls: AtomicUsize,
}

impl MockDriver {
    fn new(up: bool, converge_after: Option<usize>) -> Arc<Self> {
        Arc::new(MockDriver {
            state: Mutex::new(MockState {
                up,
                ..Default::default()
            }),
            converge_after,
            start_gate: None,
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            sample_calls: AtomicUsize::new(0),
        })
    }

    fn gated(up: bool, converge_after: Option<usize>, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(MockDriver {
            state: Mutex::new(MockState {
                up,
                ..Default::default()
            }),
            converge_after,
            start_gate: Some(gate),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            sample_calls: AtomicUsize::new(0),
        })
    }

    fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    fn sample_calls(&self) -> usize {
        self.sample_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TunnelDriver for MockDriver {
    async fn is_installed(&self) -> bool {
        true
    }

    async fn sample(&self, _config_path: &Path) -> Result<StatusSample, VpnError> {
        self.sample_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.started && !state.up {
            if let Some(n) = self.converge_after {
                if state.samples_after_start >= n {
                    state.up = true;
                } else {
                    state.samples_after_start += 1;
                }
            }
        }
        Ok(StatusSample {
            interface_up: state.up,
            reachable: None,
        })
    }

    async fn start(&self, _config_path: &Path) -> Result<(), VpnError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.start_gate {
            gate.notified().await;
        }
        self.state.lock().unwrap().started = true;
        Ok(())
    }

    async fn stop(&self, _config_path: &Path) -> Result<(), VpnError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.up = false;
        state.started = false;
        Ok(())
    }

    async fn install_tunnel(&self, _config_path: &Path) -> Result<(), VpnError> {
        Ok(())
    }

    async fn uninstall_tunnel(&self, _config_path: &Path) -> Result<(), VpnError> {
        Ok(())
    }
}

fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.poll_interval_ms = 10;
    settings.convergence_timeout_ms = 300;
    settings
}

fn controller_with(driver: Arc<MockDriver>, tunnels: &[&str]) -> (Arc<TunnelController>, TempDir) {
    let dir = tempdir().unwrap();
    let repo = ConfigRepository::open(dir.path()).unwrap();
    for name in tunnels {
        repo.write(name, CONF).unwrap();
    }
    let controller = Arc::new(TunnelController::new(
        driver,
        Arc::new(repo),
        fast_settings(),
        CancellationToken::new(),
    ));
    (controller, dir)
}

#[tokio::test]
async fn activate_polls_until_the_interface_comes_up() {
    let driver = MockDriver::new(false, Some(1));
    let (controller, _dir) = controller_with(driver.clone(), &["office"]);

    let status = controller.activate("office").await.unwrap();
    assert_eq!(status.state, TunnelState::Running);
    assert_eq!(driver.start_calls(), 1);

    let queried = controller.query("office").await.unwrap();
    assert_eq!(queried.state, TunnelState::Running);
}

#[tokio::test]
async fn activate_on_a_running_tunnel_is_a_no_op() {
    let driver = MockDriver::new(true, None);
    let (controller, _dir) = controller_with(driver.clone(), &["office"]);

    let status = controller.activate("office").await.unwrap();
    assert_eq!(status.state, TunnelState::Running);
    assert_eq!(driver.start_calls(), 0);
}

#[tokio::test]
async fn second_activate_while_in_flight_is_rejected() {
    let gate = Arc::new(Notify::new());
    let driver = MockDriver::gated(false, Some(0), gate.clone());
    let (controller, _dir) = controller_with(driver.clone(), &["office"]);

    let first = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.activate("office").await })
    };
    // Let the first operation reach the driver and park in start().
    tokio::time::sleep(Duration::from_millis(30)).await;

    let second = controller.activate("office").await;
    assert!(matches!(second, Err(VpnError::OperationInProgress(_))));

    // A concurrent query reports the transitional state.
    let status = controller.query("office").await.unwrap();
    assert_eq!(status.state, TunnelState::Starting);

    gate.notify_one();
    let status = first.await.unwrap().unwrap();
    assert_eq!(status.state, TunnelState::Running);
    assert_eq!(driver.start_calls(), 1);
}

#[tokio::test]
async fn convergence_timeout_becomes_a_sticky_error() {
    let driver = MockDriver::new(false, None);
    let (controller, _dir) = controller_with(driver.clone(), &["office"]);

    let err = controller.activate("office").await.unwrap_err();
    assert!(matches!(err, VpnError::ConvergenceTimeout { .. }));

    // The recorded error answers queries without waking the driver again.
    let samples_after_failure = driver.sample_calls();
    for _ in 0..3 {
        let status = controller.query("office").await.unwrap();
        assert!(matches!(status.state, TunnelState::Error(_)));
    }
    assert_eq!(driver.sample_calls(), samples_after_failure);

    // The next explicit operation clears the error.
    let status = controller.deactivate("office").await.unwrap();
    assert_eq!(status.state, TunnelState::Stopped);
    let status = controller.query("office").await.unwrap();
    assert_eq!(status.state, TunnelState::Stopped);
}

#[tokio::test]
async fn deactivate_converges_to_stopped() {
    let driver = MockDriver::new(true, None);
    let (controller, _dir) = controller_with(driver.clone(), &["office"]);

    let status = controller.deactivate("office").await.unwrap();
    assert_eq!(status.state, TunnelState::Stopped);
    assert_eq!(driver.stop_calls(), 1);
}

#[tokio::test]
async fn deactivate_on_a_stopped_tunnel_is_a_no_op() {
    let driver = MockDriver::new(false, None);
    let (controller, _dir) = controller_with(driver.clone(), &["office"]);

    let status = controller.deactivate("office").await.unwrap();
    assert_eq!(status.state, TunnelState::Stopped);
    assert_eq!(driver.stop_calls(), 0);
}

#[tokio::test]
async fn shutdown_abandons_a_convergence_wait() {
    let driver = MockDriver::new(false, None);
    let dir = tempdir().unwrap();
    let repo = ConfigRepository::open(dir.path()).unwrap();
    repo.write("office", CONF).unwrap();

    let mut settings = fast_settings();
    settings.convergence_timeout_ms = 10_000;
    let controller = Arc::new(TunnelController::new(
        driver,
        Arc::new(repo),
        settings,
        CancellationToken::new(),
    ));

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.activate("office").await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    controller.shutdown();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(VpnError::Cancelled)));
}

#[tokio::test]
async fn unknown_tunnel_never_reaches_the_driver() {
    let driver = MockDriver::new(false, Some(0));
    let (controller, _dir) = controller_with(driver.clone(), &[]);

    assert!(matches!(
        controller.activate("ghost").await,
        Err(VpnError::ConfigNotFound(_))
    ));
    assert_eq!(driver.start_calls(), 0);
    assert_eq!(driver.sample_calls(), 0);
}

#[tokio::test]
async fn distinct_tunnels_are_not_serialized() {
    let gate = Arc::new(Notify::new());
    let driver = MockDriver::gated(false, Some(0), gate.clone());
    let (controller, _dir) = controller_with(driver.clone(), &["office", "home"]);

    let first = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.activate("office").await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    // "home" is down; its deactivate completes while "office" is in flight.
    let status = controller.deactivate("home").await.unwrap();
    assert_eq!(status.state, TunnelState::Stopped);

    gate.notify_one();
    first.await.unwrap().unwrap();
}
