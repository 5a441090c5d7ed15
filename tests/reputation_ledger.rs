//! Reputation ledger properties: anti-gaming guards, idempotence,
//! non-decaying aggregation.

mod common;

use common::TestCore;
use commsd::error::ReputationError;
use commsd::identity::reputation::EventKind;

async fn core_with_users() -> anyhow::Result<(TestCore, String, String)> {
    let core = TestCore::new().await?;
    let code = core.seed_invite(0).await?;
    let alice = core
        .identity
        .register("alice@example.com", "passw0rd1", "alice", &code)
        .await?;
    let bob = core
        .identity
        .register("bob@example.com", "passw0rd1", "bob", &code)
        .await?;
    Ok((core, alice.id, bob.id))
}

#[tokio::test]
async fn test_self_reputation_rejected_except_moderator() -> anyhow::Result<()> {
    let (core, alice, _) = core_with_users().await?;

    for kind in EventKind::ALL {
        if kind == EventKind::ModeratorAction {
            continue;
        }
        let points = *kind.point_range().start();
        let err = core
            .reputation
            .record_event(&alice, &alice, kind.as_str(), points, "")
            .await
            .unwrap_err();
        assert!(
            matches!(err, ReputationError::SelfReputation),
            "kind {} should reject self-award",
            kind.as_str()
        );
    }

    // A moderator acting on their own account is allowed.
    core.reputation
        .record_event(&alice, &alice, "moderator_action", -40, "case-7")
        .await?;
    assert_eq!(core.reputation.get_reputation(&alice).await?, -40);

    Ok(())
}

#[tokio::test]
async fn test_unknown_type_and_out_of_range_points() -> anyhow::Result<()> {
    let (core, alice, bob) = core_with_users().await?;

    let err = core
        .reputation
        .record_event(&alice, &bob, "made_up", 1, "")
        .await
        .unwrap_err();
    assert!(matches!(err, ReputationError::InvalidEventType));

    // message_posted allows 1..=5.
    for bad in [0, 6, 100, -1] {
        let err = core
            .reputation
            .record_event(&alice, &bob, "message_posted", bad, "")
            .await
            .unwrap_err();
        assert!(
            matches!(err, ReputationError::InvalidPointsValue),
            "points {bad} should be out of range"
        );
    }

    // message_downvoted allows -10..=-1; a positive award under it is a
    // legitimate-looking type carrying an illegitimate amount.
    let err = core
        .reputation
        .record_event(&alice, &bob, "message_downvoted", 5, "")
        .await
        .unwrap_err();
    assert!(matches!(err, ReputationError::InvalidPointsValue));

    assert_eq!(core.reputation.get_reputation(&bob).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_reference_credits_once() -> anyhow::Result<()> {
    let (core, alice, bob) = core_with_users().await?;

    core.reputation
        .record_event(&alice, &bob, "message_upvoted", 10, "msg-42")
        .await?;

    let err = core
        .reputation
        .record_event(&alice, &bob, "message_upvoted", 10, "msg-42")
        .await
        .unwrap_err();
    assert!(matches!(err, ReputationError::DuplicateEvent));

    // Points applied exactly once.
    assert_eq!(core.reputation.get_reputation(&bob).await?, 10);

    // A different reference under the same type is a new credit.
    core.reputation
        .record_event(&alice, &bob, "message_upvoted", 5, "msg-43")
        .await?;
    assert_eq!(core.reputation.get_reputation(&bob).await?, 15);

    Ok(())
}

#[tokio::test]
async fn test_score_is_non_decaying_sum() -> anyhow::Result<()> {
    let (core, alice, bob) = core_with_users().await?;

    core.reputation
        .record_event(&alice, &bob, "message_posted", 5, "m1")
        .await?;
    core.reputation
        .record_event(&alice, &bob, "invite_used", 20, "i1")
        .await?;
    core.reputation
        .record_event(&alice, &bob, "reported_abuse", -10, "r1")
        .await?;

    // Sum of 5 + 20 - 10, stable across repeated reads.
    for _ in 0..3 {
        assert_eq!(core.reputation.get_reputation(&bob).await?, 15);
    }

    let breakdown = core.reputation.get_breakdown(&bob).await?;
    assert_eq!(breakdown.len(), 3);
    let posted = breakdown
        .iter()
        .find(|e| e.event_type == "message_posted")
        .unwrap();
    assert_eq!((posted.points, posted.count), (5, 1));

    // Alice earned nothing from awarding.
    assert_eq!(core.reputation.get_reputation(&alice).await?, 0);

    Ok(())
}
