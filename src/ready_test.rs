use super::*;
use crate::settings::{KEY_FORCE_ZOOM, MapSettings};
use crate::test_support::{MockScene, PanelEvent, RecordingRelay, gm, host_for, player, rats, roster, token};

fn coordinator_for(user: &Participant, people: &[Participant], settings: MapSettings) -> (Coordinator, Arc<RecordingRelay>, Arc<crate::test_support::MockClient>) {
    let scene = MockScene::new(rats(3));
    let (host, client) = host_for(user, &roster(people), &scene, settings);
    let relay = Arc::new(RecordingRelay::default());
    (Coordinator::new(host, relay.clone()), relay, client)
}

fn table() -> Vec<Participant> {
    vec![gm("gm"), player("alice"), player("bob")]
}

// =============================================================================
// BOARD
// =============================================================================

#[test]
fn empty_board_is_not_satisfied() {
    assert!(!ReadyBoard::new().is_satisfied());
}

#[test]
fn reset_tracks_only_active_players() {
    let mut away = player("carol");
    away.active = false;
    let mut board = ReadyBoard::new();
    board.reset(&[gm("gm"), player("alice"), away]);

    assert_eq!(board.len(), 1);
    assert_eq!(board.state_of("alice"), Some(ReadyState::Unknown));
    assert_eq!(board.state_of("gm"), None);
    assert_eq!(board.state_of("carol"), None);
}

#[test]
fn satisfied_only_when_every_player_is_ready() {
    let mut board = ReadyBoard::new();
    board.reset(&table());
    assert!(board.record("alice", ReadyAnswer::Ready));
    assert!(!board.is_satisfied());
    assert!(board.record("bob", ReadyAnswer::No));
    assert!(!board.is_satisfied());
    assert!(board.record("bob", ReadyAnswer::Ready));
    assert!(board.is_satisfied());
}

#[test]
fn record_ignores_untracked_ids() {
    let mut board = ReadyBoard::new();
    board.reset(&table());
    assert!(!board.record("mallory", ReadyAnswer::Ready));
    assert!(!board.record("gm", ReadyAnswer::Ready));
    assert_eq!(board.len(), 2);
}

#[test]
fn reset_discards_previous_answers() {
    let mut board = ReadyBoard::new();
    board.reset(&table());
    board.record("alice", ReadyAnswer::Ready);
    board.reset(&[gm("gm"), player("alice")]);
    assert_eq!(board.state_of("alice"), Some(ReadyState::Unknown));
    assert_eq!(board.state_of("bob"), None);
}

#[test]
fn view_uses_display_names_and_viewer_role() {
    let people = table();
    let mut check = ReadyCheck::open("Rat", &people);
    check.board.record("alice", ReadyAnswer::Ready);
    check.board.record("bob", ReadyAnswer::Ready);

    let gm_view = check.view(&people, &people[0]);
    assert!(gm_view.can_begin);
    assert!(!gm_view.can_respond);
    assert_eq!(gm_view.rows[0].name, "Player alice");

    let player_view = check.view(&people, &people[1]);
    assert!(!player_view.can_begin);
    assert!(player_view.can_respond);
}

// =============================================================================
// COORDINATOR
// =============================================================================

#[tokio::test]
async fn start_opens_panel_and_broadcasts() {
    let people = table();
    let (coordinator, relay, client) = coordinator_for(&people[0], &people, MapSettings::new());

    coordinator.start("Rat").await.expect("start should succeed");

    assert_eq!(relay.sent(), vec![ShellEvent::StartCheck { token_name: "Rat".into() }]);
    let view = client.last_view().expect("panel should be open");
    assert_eq!(view.token_name, "Rat");
    assert_eq!(view.rows.len(), 2);
    assert!(!view.can_begin);
}

#[tokio::test]
async fn start_by_player_is_forbidden() {
    let people = table();
    let (coordinator, relay, _) = coordinator_for(&people[1], &people, MapSettings::new());
    let err = coordinator.start("Rat").await.expect_err("players cannot start");
    assert_eq!(err.error_code(), "E_FORBIDDEN");
    assert!(relay.sent().is_empty());
}

#[tokio::test]
async fn start_with_one_matching_token_warns_and_does_nothing() {
    let people = table();
    let scene = MockScene::new(vec![token("t1", "Rat", 0.0, 0.0), token("t2", "Rat2", 100.0, 0.0)]);
    let (host, client) = host_for(&people[0], &roster(&people), &scene, MapSettings::new());
    let relay = Arc::new(RecordingRelay::default());
    let coordinator = Coordinator::new(host, relay.clone());

    let err = coordinator.start("Rat").await.expect_err("one token is not enough");
    assert!(matches!(err, ShellError::NotEnoughTokens { found: 1, .. }));
    assert!(relay.sent().is_empty());
    assert!(client.panel_events().is_empty());
    assert!(coordinator.current().is_none());
}

#[tokio::test]
async fn starting_twice_resets_every_answer() {
    let people = table();
    let (coordinator, _, _) = coordinator_for(&people[0], &people, MapSettings::new());
    coordinator.start("Rat").await.expect("first start");
    coordinator.apply_status("alice", ReadyAnswer::Ready);
    coordinator.start("Rat").await.expect("second start");

    let check = coordinator.current().expect("check open");
    assert_eq!(check.board.state_of("alice"), Some(ReadyState::Unknown));
}

#[tokio::test]
async fn report_ready_records_broadcasts_and_frames_tokens() {
    let people = table();
    let (coordinator, relay, client) = coordinator_for(&people[1], &people, MapSettings::new());
    coordinator.open_check("Rat");

    coordinator.report_status(ReadyAnswer::Ready).await.expect("report");

    assert_eq!(relay.sent(), vec![ShellEvent::Status { user_id: "alice".into(), status: ReadyAnswer::Ready }]);
    assert_eq!(client.target_clears(), 1);
    assert_eq!(coordinator.current().and_then(|c| c.board.state_of("alice")), Some(ReadyState::Ready));
    let targets = client.camera_targets();
    assert_eq!(targets.len(), 1);
    assert!((targets[0].center.x - 250.0).abs() < 1e-9);
}

#[tokio::test]
async fn report_no_skips_targets_and_camera() {
    let people = table();
    let (coordinator, _, client) = coordinator_for(&people[1], &people, MapSettings::new());
    coordinator.open_check("Rat");
    coordinator.report_status(ReadyAnswer::No).await.expect("report");
    assert_eq!(client.target_clears(), 0);
    assert!(client.camera_targets().is_empty());
}

#[tokio::test]
async fn force_zoom_off_leaves_camera_alone() {
    let people = table();
    let settings = MapSettings::new().with(KEY_FORCE_ZOOM, false);
    let (coordinator, _, client) = coordinator_for(&people[1], &people, settings);
    coordinator.open_check("Rat");
    coordinator.report_status(ReadyAnswer::Ready).await.expect("report");
    assert!(client.camera_targets().is_empty());
}

#[tokio::test]
async fn report_without_open_check_is_a_warning() {
    let people = table();
    let (coordinator, relay, _) = coordinator_for(&people[1], &people, MapSettings::new());
    let err = coordinator.report_status(ReadyAnswer::Ready).await.expect_err("no check");
    assert!(matches!(err, ShellError::NoActiveCheck));
    assert!(relay.sent().is_empty());
}

#[tokio::test]
async fn relayed_status_rerenders_panel() {
    let people = table();
    let (coordinator, _, client) = coordinator_for(&people[0], &people, MapSettings::new());
    coordinator.open_check("Rat");

    assert!(coordinator.apply_status("alice", ReadyAnswer::Ready));
    assert!(!coordinator.apply_status("stranger", ReadyAnswer::Ready));
    assert!(coordinator.apply_status("bob", ReadyAnswer::Ready));

    let renders = client
        .panel_events()
        .into_iter()
        .filter(|e| matches!(e, PanelEvent::Render(_)))
        .count();
    assert_eq!(renders, 2);
    assert!(client.last_view().expect("view").can_begin);
    assert!(coordinator.is_satisfied());
}

#[tokio::test]
async fn begin_while_unsatisfied_changes_nothing() {
    let people = table();
    let (coordinator, relay, client) = coordinator_for(&people[0], &people, MapSettings::new());
    coordinator.start("Rat").await.expect("start");
    coordinator.apply_status("alice", ReadyAnswer::Ready);
    coordinator.apply_status("bob", ReadyAnswer::No);

    let err = coordinator.begin().await.expect_err("not everyone is ready");
    assert!(matches!(err, ShellError::NotReady));
    assert_eq!(err.severity(), crate::error::Severity::Warning);
    assert_eq!(relay.sent().len(), 1);
    assert!(coordinator.current().is_some());
    assert!(!client.panel_events().contains(&PanelEvent::Close));
}

#[tokio::test]
async fn begin_releases_barrier_in_order() {
    let people = table();
    let (coordinator, relay, client) = coordinator_for(&people[0], &people, MapSettings::new());
    coordinator.start("Rat").await.expect("start");
    coordinator.apply_status("alice", ReadyAnswer::Ready);
    coordinator.apply_status("bob", ReadyAnswer::Ready);

    let name = coordinator.begin().await.expect("begin");

    assert_eq!(name, "Rat");
    assert_eq!(
        relay.sent()[1..],
        [ShellEvent::CloseCheck, ShellEvent::ClearTargets, ShellEvent::Countdown]
    );
    assert_eq!(client.panel_events().last(), Some(&PanelEvent::Close));
    assert!(coordinator.current().is_none());
}

#[tokio::test]
async fn begin_by_player_is_forbidden() {
    let people = table();
    let (coordinator, _, _) = coordinator_for(&people[1], &people, MapSettings::new());
    coordinator.open_check("Rat");
    let err = coordinator.begin().await.expect_err("players cannot begin");
    assert_eq!(err.error_code(), "E_FORBIDDEN");
}

#[tokio::test]
async fn begin_keeps_check_open_when_relay_fails() {
    let people = table();
    let (coordinator, relay, client) = coordinator_for(&people[0], &people, MapSettings::new());
    coordinator.start("Rat").await.expect("start");
    coordinator.apply_status("alice", ReadyAnswer::Ready);
    coordinator.apply_status("bob", ReadyAnswer::Ready);

    relay.fail_after(1);
    let err = coordinator.begin().await.expect_err("clear-targets send fails");
    assert_eq!(err.error_code(), "E_RELAY");
    assert!(coordinator.current().is_some());
    assert!(!client.panel_events().contains(&PanelEvent::Close));

    relay.resume_sends();
    assert_eq!(coordinator.begin().await.expect("retry"), "Rat");
    assert_eq!(
        relay.sent()[1..],
        [ShellEvent::CloseCheck, ShellEvent::CloseCheck, ShellEvent::ClearTargets, ShellEvent::Countdown]
    );
    assert!(coordinator.current().is_none());
}

#[tokio::test]
async fn gm_cannot_answer_the_check() {
    let people = table();
    let (coordinator, relay, client) = coordinator_for(&people[0], &people, MapSettings::new());
    coordinator.open_check("Rat");

    let err = coordinator.report_status(ReadyAnswer::Ready).await.expect_err("GM does not answer");

    assert!(matches!(err, ShellError::PlayersOnly));
    assert_eq!(err.severity(), crate::error::Severity::Warning);
    assert!(relay.sent().is_empty());
    assert_eq!(client.target_clears(), 0);
    assert!(client.camera_targets().is_empty());
}

#[tokio::test]
async fn player_leaving_mid_check_stops_blocking_begin() {
    let people = table();
    let scene = MockScene::new(rats(3));
    let seats = roster(&people);
    let (host, client) = host_for(&people[0], &seats, &scene, MapSettings::new());
    let coordinator = Coordinator::new(host, Arc::new(RecordingRelay::default()));
    coordinator.start("Rat").await.expect("start");

    seats.lock().unwrap()[2].active = false;
    coordinator.refresh();
    coordinator.apply_status("alice", ReadyAnswer::Ready);

    assert!(coordinator.is_satisfied());
    let view = client.last_view().expect("panel rendered");
    assert!(view.can_begin);
    assert_eq!(view.rows.len(), 1);

    seats.lock().unwrap()[2].active = true;
    coordinator.refresh();
    assert!(!coordinator.is_satisfied());
    assert!(!client.last_view().expect("panel rendered").can_begin);

    seats.lock().unwrap()[2].active = false;
    assert_eq!(coordinator.begin().await.expect("bob is gone"), "Rat");
}

#[test]
fn barrier_ignores_inactive_entries() {
    let mut people = table();
    let mut board = ReadyBoard::new();
    board.reset(&people);
    board.record("alice", ReadyAnswer::Ready);
    assert!(!board.is_satisfied_among(&people));

    people[2].active = false;
    assert!(board.is_satisfied_among(&people));

    people[1].active = false;
    assert!(!board.is_satisfied_among(&people));
}

#[test]
fn close_check_arms_token_name_once() {
    let people = table();
    let (coordinator, _, client) = coordinator_for(&people[2], &people, MapSettings::new());
    coordinator.open_check("Rat");
    coordinator.close_check();

    assert_eq!(client.panel_events().last(), Some(&PanelEvent::Close));
    assert_eq!(coordinator.take_armed().as_deref(), Some("Rat"));
    assert_eq!(coordinator.take_armed(), None);
}

#[test]
fn ready_state_from_answer() {
    assert_eq!(ReadyState::from(ReadyAnswer::Ready), ReadyState::Ready);
    assert_eq!(ReadyState::from(ReadyAnswer::No), ReadyState::No);
}
