//! Scenario tests for the P2P driver against a scripted supplicant.

use p2p_fsm::p2p::{
    ConfigMethod, ConnectionRequest, ConnectionResponse, ControlChannel, ControlError, Driver,
    DriverConfig, DriverError, FindResult, LinkInfo, MacAddress, P2pEvent, P2pState, Reason,
    Status,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PEER: &str = "aa:bb:cc:dd:ee:ff";
const STRANGER: &str = "cc:cc:cc:cc:cc:cc";

/// Records every command and answers `OK`, or `FAIL` for commands starting
/// with the configured prefix.
#[derive(Default)]
struct Supplicant {
    sent: Mutex<Vec<String>>,
    fail_prefix: Mutex<Option<&'static str>>,
}

impl ControlChannel for Supplicant {
    fn request(&self, command: &str) -> Result<String, ControlError> {
        self.sent.lock().unwrap().push(command.to_string());
        match *self.fail_prefix.lock().unwrap() {
            Some(prefix) if command.starts_with(prefix) => Ok("FAIL".to_string()),
            _ => Ok("OK".to_string()),
        }
    }
}

impl Supplicant {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn fail(&self, prefix: &'static str) {
        *self.fail_prefix.lock().unwrap() = Some(prefix);
    }

    fn saw(&self, command: &str) -> bool {
        self.sent().iter().any(|sent| sent == command)
    }
}

#[derive(Clone, Default)]
struct Reports {
    found: Arc<Mutex<Vec<FindResult>>>,
    up: Arc<Mutex<Vec<LinkInfo>>>,
    down: Arc<Mutex<Vec<LinkInfo>>>,
}

impl Reports {
    fn found(&self) -> Vec<FindResult> {
        self.found.lock().unwrap().clone()
    }

    fn up(&self) -> Vec<LinkInfo> {
        self.up.lock().unwrap().clone()
    }

    fn down(&self) -> Vec<LinkInfo> {
        self.down.lock().unwrap().clone()
    }
}

struct Harness {
    driver: Arc<Driver>,
    supplicant: Arc<Supplicant>,
    reports: Reports,
}

impl Harness {
    async fn with_config(config: DriverConfig) -> Self {
        init_tracing();
        let supplicant = Arc::new(Supplicant::default());
        let driver = Arc::new(Driver::new(supplicant.clone(), config).unwrap());
        let reports = Reports::default();

        let found = Arc::clone(&reports.found);
        driver
            .register_find_callback(move |result: &FindResult| found.lock().unwrap().push(result.clone()))
            .await;
        let up = Arc::clone(&reports.up);
        let down = Arc::clone(&reports.down);
        driver
            .register_link_callback(
                move |info: &LinkInfo| up.lock().unwrap().push(info.clone()),
                move |info: &LinkInfo| down.lock().unwrap().push(info.clone()),
            )
            .await;

        Self {
            driver,
            supplicant,
            reports,
        }
    }

    async fn started() -> Self {
        let harness = Self::with_config(DriverConfig::default()).await;
        harness.driver.start().await.unwrap();
        harness
    }

    async fn notify(&self, line: &str) -> Status {
        self.driver.handle_notification(line).await
    }

    async fn accept_incoming(&self, go_intent: u8) {
        self.driver
            .register_connection_handler(move |_: &ConnectionRequest| ConnectionResponse::accept(go_intent))
            .await;
    }

    /// Drive an incoming PBC connection up to a formed client link.
    async fn join_as_client(&self) {
        self.accept_incoming(3).await;
        self.notify(&format!("P2P-PROV-DISC-PBC-REQ {PEER}")).await;
        self.notify(&format!("P2P-GO-NEG-REQUEST {PEER} dev_passwd_id=4 go_intent=6"))
            .await;
        self.notify("P2P-GO-NEG-SUCCESS role=client freq=2437").await;
        self.notify(&format!(
            "P2P-GROUP-STARTED wl3 client ssid=\"DIRECT-xy\" freq=2437 go_dev_addr={PEER}"
        ))
        .await;
        assert_eq!(self.driver.state().await, P2pState::GroupMemberFormed);
    }
}

/// Route driver logs to the test output; `RUST_LOG=p2p_fsm=debug` shows
/// every state change.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn found_line(address: &str) -> String {
    format!(
        "<3>P2P-DEVICE-FOUND {address} p2p_dev_addr={address} pri_dev_type=10-0050F204-5 \
         name='Xperia Z3 Compact_3f03' config_methods=0x188 dev_capab=0x25 group_capab=0x0"
    )
}

fn address(text: &str) -> MacAddress {
    text.parse().unwrap()
}

async fn wait_for_state(driver: &Driver, state: P2pState) {
    for _ in 0..400 {
        if driver.state().await == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("driver never reached {state}, stuck in {}", driver.state().await);
}

#[tokio::test]
async fn end_to_end_find_to_link_up() {
    let harness = Harness::started().await;

    assert_eq!(harness.driver.find(30, Some(PEER)).await, Status::Success);
    assert!(harness.supplicant.saw(&format!("P2P_FIND 30 dev_id={PEER}")));

    harness.notify(&found_line(STRANGER)).await;
    assert_eq!(harness.driver.state().await, P2pState::Finding);

    harness.notify(&found_line(PEER)).await;
    assert_eq!(harness.driver.state().await, P2pState::ConnectOutFound);
    assert_eq!(harness.supplicant.sent().last().unwrap(), "P2P_STOP_FIND");

    harness
        .notify(&format!("P2P-GO-NEG-SUCCESS role=GO freq=2437 peer_dev={PEER} wps_method=PBC"))
        .await;
    assert_eq!(harness.driver.state().await, P2pState::GroupFormingAsOwner);

    harness
        .notify("P2P-GROUP-STARTED wl3 GO ssid=\"DIRECT-ab\" freq=2437 passphrase=\"x\"")
        .await;
    assert_eq!(harness.driver.state().await, P2pState::GroupOwnerFormed);

    let up = harness.reports.up();
    assert_eq!(up.len(), 1);
    assert_eq!(up[0].reason, Reason::Success);
    assert_eq!(up[0].ssid.as_deref(), Some("DIRECT-ab"));
    assert_eq!(up[0].peer_address, Some(address(PEER)));

    let path = harness.driver.history().await.events();
    assert!(path.contains(&P2pEvent::FoundCorrectPeer));
    assert!(path.contains(&P2pEvent::LinkUp));
}

#[tokio::test]
async fn untargeted_find_reports_every_peer() {
    let harness = Harness::started().await;
    harness.driver.find(0, None).await;
    assert!(harness.supplicant.saw("P2P_FIND"));

    harness.notify(&found_line(STRANGER)).await;
    harness.notify(&found_line(PEER)).await;
    harness.notify("P2P-DEVICE-FOUND truncated").await;

    let found = harness.reports.found();
    assert_eq!(found.len(), 2);
    assert_eq!(found[1].peer.as_ref().unwrap().address, address(PEER));
    assert_eq!(harness.driver.state().await, P2pState::Finding);
}

#[tokio::test]
async fn find_timeout_reports_once_and_returns_to_idle() {
    let harness = Harness::started().await;
    harness.driver.find(10, None).await;

    harness.notify("P2P-FIND-STOPPED").await;
    harness.notify("P2P-FIND-STOPPED").await;

    let found = harness.reports.found();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].reason, Reason::Timeout);
    assert!(found[0].peer.is_none());
    assert_eq!(harness.driver.state().await, P2pState::Idle);
}

#[tokio::test]
async fn connect_waits_for_the_peer_before_provisioning() {
    let harness = Harness::started().await;
    harness.supplicant.clear();

    let driver = Arc::clone(&harness.driver);
    let connect = tokio::spawn(async move { driver.connect(PEER, ConfigMethod::Pbc).await });

    wait_for_state(&harness.driver, P2pState::ConnectOutSearching).await;
    assert_eq!(harness.supplicant.sent(), vec![format!("P2P_FIND 30 dev_id={PEER}")]);

    harness.notify(&found_line(STRANGER)).await;
    assert_eq!(harness.driver.state().await, P2pState::ConnectOutSearching);
    assert!(!connect.is_finished());

    harness.notify(&found_line(PEER)).await;
    assert_eq!(connect.await.unwrap(), Status::Success);
    assert_eq!(harness.driver.state().await, P2pState::ConnectOutProvDiscSent);
    assert_eq!(
        harness.supplicant.sent(),
        vec![
            format!("P2P_FIND 30 dev_id={PEER}"),
            "P2P_STOP_FIND".to_string(),
            format!("P2P_PROV_DISC {PEER} pbc"),
        ]
    );

    harness.notify(&format!("P2P-PROV-DISC-PBC-RESP {PEER}")).await;
    assert_eq!(harness.driver.state().await, P2pState::Negotiating);
    assert!(harness.supplicant.saw(&format!("P2P_CONNECT {PEER} pbc go_intent=7")));

    harness.notify("P2P-GO-NEG-SUCCESS role=client").await;
    harness
        .notify(&format!("P2P-GROUP-STARTED wl3 client ssid=\"DIRECT-Oz\" go_dev_addr={PEER}"))
        .await;
    harness
        .notify(&format!("CTRL-EVENT-CONNECTED - Connection to {PEER} completed"))
        .await;
    assert_eq!(harness.driver.state().await, P2pState::Connected);
    assert_eq!(harness.reports.up().len(), 1);
}

#[tokio::test]
async fn connect_after_targeted_find_provisions_immediately() {
    let harness = Harness::started().await;

    assert_eq!(harness.driver.find(30, Some(PEER)).await, Status::Success);
    harness.notify(&found_line(PEER)).await;
    assert_eq!(harness.driver.state().await, P2pState::ConnectOutFound);
    harness.supplicant.clear();

    assert_eq!(harness.driver.connect(PEER, ConfigMethod::Pbc).await, Status::Success);
    assert_eq!(harness.driver.state().await, P2pState::ConnectOutProvDiscSent);
    assert_eq!(harness.supplicant.sent(), vec![format!("P2P_PROV_DISC {PEER} pbc")]);

    harness.notify(&format!("P2P-PROV-DISC-PBC-RESP {PEER}")).await;
    assert_eq!(harness.driver.state().await, P2pState::Negotiating);
}

#[tokio::test]
async fn connect_gives_up_when_peer_never_appears() {
    let config = DriverConfig::builder()
        .connect_wait(Duration::from_millis(50))
        .build()
        .unwrap();
    let harness = Harness::with_config(config).await;
    harness.driver.start().await.unwrap();

    assert_eq!(harness.driver.connect(PEER, ConfigMethod::Pbc).await, Status::Error);
    assert_eq!(harness.driver.state().await, P2pState::Idle);
    assert!(harness.supplicant.saw("P2P_CANCEL"));

    let up = harness.reports.up();
    assert_eq!(up.len(), 1);
    assert_eq!(up[0].reason, Reason::Timeout);
    assert_eq!(up[0].peer_address, Some(address(PEER)));
}

#[tokio::test]
async fn connect_rejects_bad_address() {
    let harness = Harness::started().await;
    assert_eq!(
        harness.driver.connect("not-an-address", ConfigMethod::Pbc).await,
        Status::ParamFailed
    );
    assert_eq!(harness.driver.find(5, Some("aa:bb")).await, Status::ParamFailed);
    assert_eq!(harness.driver.state().await, P2pState::Idle);
}

#[tokio::test]
async fn incoming_connection_accepted() {
    let harness = Harness::started().await;
    harness.join_as_client().await;

    assert!(harness.supplicant.saw(&format!("P2P_CONNECT {PEER} pbc go_intent=3")));
    let up = harness.reports.up();
    assert_eq!(up.len(), 1);
    assert_eq!(up[0].ssid.as_deref(), Some("DIRECT-xy"));
    assert_eq!(up[0].peer_address, Some(address(PEER)));
}

#[tokio::test]
async fn incoming_connection_rejected_is_not_reported() {
    let harness = Harness::started().await;
    harness
        .driver
        .register_connection_handler(|_: &ConnectionRequest| ConnectionResponse::reject())
        .await;

    harness.notify(&format!("P2P-PROV-DISC-PBC-REQ {PEER}")).await;
    assert_eq!(harness.driver.state().await, P2pState::ConnectInAwaitingDecision);
    harness.notify(&format!("P2P-GO-NEG-REQUEST {PEER} dev_passwd_id=4")).await;

    assert!(harness.supplicant.saw(&format!("P2P_CONNECT {PEER} pbc go_intent=7 reject")));
    assert_eq!(harness.driver.state().await, P2pState::Idle);
    assert!(harness.reports.up().is_empty());
}

#[tokio::test]
async fn unsolicited_negotiation_is_rejected() {
    let harness = Harness::started().await;
    harness.notify(&format!("P2P-GO-NEG-REQUEST {STRANGER} dev_passwd_id=4")).await;

    assert!(harness.supplicant.saw(&format!("P2P_REJECT {STRANGER}")));
    assert_eq!(harness.driver.state().await, P2pState::Idle);
}

#[tokio::test]
async fn negotiation_failure_is_reported_with_reason() {
    let harness = Harness::started().await;
    harness.accept_incoming(7).await;
    harness.notify(&format!("P2P-PROV-DISC-PBC-REQ {PEER}")).await;
    harness.notify(&format!("P2P-GO-NEG-REQUEST {PEER}")).await;
    assert_eq!(harness.driver.state().await, P2pState::Negotiating);

    harness.notify("P2P-GO-NEG-FAILURE status=1").await;

    assert_eq!(harness.driver.state().await, P2pState::Idle);
    let up = harness.reports.up();
    assert_eq!(up.len(), 1);
    assert_eq!(up[0].reason, Reason::NegotiationFailed);
}

#[tokio::test]
async fn client_disconnect_waits_for_group_removal() {
    let harness = Harness::started().await;
    harness.join_as_client().await;

    let driver = Arc::clone(&harness.driver);
    let disconnect = tokio::spawn(async move { driver.disconnect().await });

    wait_for_state(&harness.driver, P2pState::Disconnecting).await;
    assert!(harness.supplicant.saw("P2P_GROUP_REMOVE wl3"));

    harness.notify("P2P-GROUP-REMOVED wl3 client reason=REQUESTED").await;
    assert_eq!(disconnect.await.unwrap(), Status::Success);
    assert_eq!(harness.driver.state().await, P2pState::Idle);
    assert_eq!(harness.reports.down().len(), 1);
}

#[tokio::test]
async fn group_owner_cannot_disconnect() {
    let harness = Harness::started().await;
    assert_eq!(harness.driver.create_group(6, false).await, Status::Success);
    assert!(harness.supplicant.saw("P2P_GROUP_ADD freq=2437"));

    harness
        .notify("P2P-GROUP-STARTED p2p-wlan0-0 GO ssid=\"DIRECT-go\" freq=2437")
        .await;
    assert_eq!(harness.driver.state().await, P2pState::GroupOwnerFormed);
    assert!(harness.reports.up().is_empty());

    harness
        .notify(&format!("AP-STA-CONNECTED {PEER} p2p_dev_addr={PEER}"))
        .await;
    assert_eq!(harness.reports.up().len(), 1);

    assert_eq!(harness.driver.disconnect().await, Status::NotAllowed);
    assert_eq!(harness.driver.state().await, P2pState::GroupOwnerFormed);

    assert_eq!(harness.driver.remove_group().await, Status::Success);
    assert!(harness.supplicant.saw("P2P_GROUP_REMOVE p2p-wlan0-0"));
    harness.notify("P2P-GROUP-REMOVED p2p-wlan0-0 GO reason=REQUESTED").await;
    assert_eq!(harness.driver.state().await, P2pState::Idle);
    assert_eq!(harness.reports.down().len(), 1);
}

#[tokio::test]
async fn create_group_validates_parameters() {
    let harness = Harness::with_config(DriverConfig::default()).await;
    assert_eq!(harness.driver.create_group(0, false).await, Status::Error);

    harness.driver.start().await.unwrap();
    assert_eq!(harness.driver.create_group(6, true).await, Status::NotSupported);
    assert_eq!(harness.driver.create_group(15, false).await, Status::ParamFailed);
    assert_eq!(harness.driver.create_group(0, false).await, Status::Success);
    assert_eq!(harness.supplicant.sent().last().unwrap(), "P2P_GROUP_ADD");
}

#[tokio::test]
async fn set_device_name_updates_ssid_postfix() {
    let config = DriverConfig::builder().ssid_postfix("lab").build().unwrap();
    let harness = Harness::with_config(config).await;
    assert_eq!(harness.driver.set_device_name("tv").await, Status::Error);

    harness.driver.start().await.unwrap();
    assert!(harness.supplicant.saw("P2P_SET ssid_postfix -lab"));

    assert_eq!(harness.driver.set_device_name("").await, Status::ParamFailed);
    assert_eq!(harness.driver.set_device_name(&"x".repeat(33)).await, Status::ParamFailed);

    harness.supplicant.clear();
    assert_eq!(harness.driver.set_device_name("tv").await, Status::Success);
    assert_eq!(
        harness.supplicant.sent(),
        vec!["SET device_name tv", "P2P_SET ssid_postfix -lab-tv"]
    );
}

#[tokio::test]
async fn start_without_postfix_keeps_supplicant_ssid() {
    let harness = Harness::started().await;
    assert!(!harness.supplicant.sent().iter().any(|sent| sent.starts_with("P2P_SET")));
    assert_eq!(harness.driver.state().await, P2pState::Idle);
}

#[tokio::test]
async fn start_fails_hard() {
    let harness = Harness::started().await;
    assert_eq!(harness.driver.start().await, Err(DriverError::AlreadyStarted));

    let config = DriverConfig::builder().ssid_postfix("lab").build().unwrap();
    let refused = Harness::with_config(config).await;
    refused.supplicant.fail("P2P_SET");
    assert!(matches!(refused.driver.start().await, Err(DriverError::Rejected(_))));
    assert_eq!(refused.driver.state().await, P2pState::Stopped);
    assert!(refused.driver.session_id().await.is_none());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let harness = Harness::started().await;
    let first = harness.driver.session_id().await.unwrap();

    assert_eq!(harness.driver.stop().await, Status::Success);
    assert_eq!(harness.driver.state().await, P2pState::Stopped);
    assert!(harness.supplicant.saw("P2P_FLUSH"));
    assert_eq!(harness.driver.stop().await, Status::Success);

    harness.driver.start().await.unwrap();
    assert_ne!(harness.driver.session_id().await.unwrap(), first);
}

#[tokio::test]
async fn stop_as_client_waits_for_link_teardown() {
    let harness = Harness::started().await;
    harness.join_as_client().await;

    let driver = Arc::clone(&harness.driver);
    let stop = tokio::spawn(async move { driver.stop().await });
    wait_for_state(&harness.driver, P2pState::TerminatingDisconnect).await;

    // A second stop while the first is waiting returns at once.
    assert_eq!(harness.driver.stop().await, Status::Success);

    harness.notify("P2P-GROUP-REMOVED wl3 client reason=REQUESTED").await;
    assert_eq!(stop.await.unwrap(), Status::Success);
    assert_eq!(harness.driver.state().await, P2pState::Stopped);
    assert!(harness.supplicant.saw("P2P_GROUP_REMOVE wl3"));
    assert_eq!(harness.reports.down().len(), 1);
}

#[tokio::test]
async fn unhandled_events_report_error_without_changing_state() {
    let harness = Harness::with_config(DriverConfig::default()).await;
    assert_eq!(harness.driver.listen().await, Status::Error);
    assert_eq!(harness.notify(&found_line(PEER)).await, Status::Error);

    harness.driver.start().await.unwrap();
    assert_eq!(harness.driver.stop_listen().await, Status::Error);
    assert_eq!(harness.driver.disconnect().await, Status::Error);
    assert_eq!(harness.notify("CTRL-EVENT-SCAN-RESULTS").await, Status::Success);
    assert_eq!(harness.driver.state().await, P2pState::Idle);

    assert_eq!(harness.driver.listen().await, Status::Success);
    assert!(harness.supplicant.saw("P2P_LISTEN"));
    assert_eq!(harness.driver.stop_listen().await, Status::Success);
    assert_eq!(harness.driver.state().await, P2pState::Idle);
}
