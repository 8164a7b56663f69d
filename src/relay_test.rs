use frames::ReadyAnswer;

use super::*;

#[tokio::test]
async fn broadcast_reaches_peers_but_not_sender() {
    let hub = LocalHub::new(8);
    let (gm, mut gm_rx) = hub.join().await;
    let (_alice, mut alice_rx) = hub.join().await;
    let (_bob, mut bob_rx) = hub.join().await;

    gm.broadcast(ShellEvent::StartCheck { token_name: "Rat".into() })
        .await
        .expect("broadcast should succeed");

    let expected = ShellEvent::StartCheck { token_name: "Rat".into() };
    assert_eq!(alice_rx.try_recv().expect("alice receives"), expected);
    assert_eq!(bob_rx.try_recv().expect("bob receives"), expected);
    assert!(gm_rx.try_recv().is_err());
}

#[tokio::test]
async fn events_from_one_sender_arrive_in_order() {
    let hub = LocalHub::new(8);
    let (gm, _gm_rx) = hub.join().await;
    let (_alice, mut alice_rx) = hub.join().await;

    for event in [ShellEvent::CloseCheck, ShellEvent::ClearTargets, ShellEvent::Countdown] {
        gm.broadcast(event).await.expect("broadcast");
    }

    assert_eq!(alice_rx.try_recv().expect("first"), ShellEvent::CloseCheck);
    assert_eq!(alice_rx.try_recv().expect("second"), ShellEvent::ClearTargets);
    assert_eq!(alice_rx.try_recv().expect("third"), ShellEvent::Countdown);
}

#[tokio::test]
async fn full_peer_drops_event_without_failing_sender() {
    let hub = LocalHub::new(1);
    let (alice, _alice_rx) = hub.join().await;
    let (_bob, mut bob_rx) = hub.join().await;

    let status = |answer| ShellEvent::Status { user_id: "alice".into(), status: answer };
    alice.broadcast(status(ReadyAnswer::Ready)).await.expect("first fits");
    alice.broadcast(status(ReadyAnswer::No)).await.expect("second is dropped, not an error");

    assert_eq!(bob_rx.try_recv().expect("first arrives"), status(ReadyAnswer::Ready));
    assert!(bob_rx.try_recv().is_err());
}

#[tokio::test]
async fn departed_client_cannot_broadcast() {
    let hub = LocalHub::new(4);
    let (alice, _rx) = hub.join().await;
    let (_bob, _bob_rx) = hub.join().await;
    assert_eq!(hub.peer_count().await, 2);

    hub.leave(alice.client_id()).await;
    assert_eq!(hub.peer_count().await, 1);

    let err = alice.broadcast(ShellEvent::Countdown).await.expect_err("should fail");
    assert_eq!(err.error_code(), "E_RELAY");
}
