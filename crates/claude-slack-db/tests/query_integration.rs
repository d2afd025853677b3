//! Integration tests for the query layer (§4.1, §4.2): CRUD round-trips
//! and the three permission primitives against a real in-memory database.

#![allow(clippy::too_many_lines)]

use claude_slack_db::queries::{agents, channels, links, messages, permissions, projects};
use claude_slack_db::{DbError, DbPool};

async fn make_pool() -> DbPool {
    DbPool::open_in_memory().await.expect("open in-memory pool")
}

#[tokio::test]
async fn project_upsert_is_idempotent() {
    let pool = make_pool().await;
    let mut writer = pool.writer().await;
    let first = projects::ensure_project(&mut *writer, "/repo/a", "repo-a").await.unwrap();
    let second = projects::ensure_project(&mut *writer, "/repo/a", "repo-a-renamed").await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "repo-a-renamed");
}

#[tokio::test]
async fn agent_not_found_surfaces_not_found() {
    let pool = make_pool().await;
    let err = agents::get_agent(pool.readers(), "nobody", None).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

#[tokio::test]
async fn channel_name_collision_is_conflict() {
    let pool = make_pool().await;
    let mut writer = pool.writer().await;
    let first = channels::create_channel(
        &mut *writer,
        channels::NewChannel {
            id: "global:general",
            channel_type: "channel",
            access_type: "open",
            scope: "global",
            project_id: None,
            name: "general",
            description: "",
            is_default: true,
            owner_name: None,
            owner_project_id: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(first.name, "general");

    let dupe = channels::create_channel(
        &mut *writer,
        channels::NewChannel {
            id: "global:general-2",
            channel_type: "channel",
            access_type: "open",
            scope: "global",
            project_id: None,
            name: "general",
            description: "",
            is_default: false,
            owner_name: None,
            owner_project_id: None,
        },
    )
    .await;
    assert!(matches!(dupe, Err(DbError::Conflict(_))));
}

#[tokio::test]
async fn membership_upsert_clears_opt_out() {
    let pool = make_pool().await;
    let mut writer = pool.writer().await;
    channels::create_channel(
        &mut *writer,
        channels::NewChannel {
            id: "global:eng",
            channel_type: "channel",
            access_type: "open",
            scope: "global",
            project_id: None,
            name: "eng",
            description: "",
            is_default: false,
            owner_name: None,
            owner_project_id: None,
        },
    )
    .await
    .unwrap();

    let new_member = || channels::NewMember {
        channel_id: "global:eng",
        agent_name: "alice",
        agent_project_id: None,
        can_leave: true,
        can_send: true,
        can_invite: false,
        can_manage: false,
        invited_by_name: None,
        invited_by_project_id: None,
        source: "manual",
        is_from_default: false,
    };

    channels::add_member(&mut *writer, new_member()).await.unwrap();
    channels::remove_member(&mut *writer, "global:eng", "alice", None).await.unwrap();
    let opted_out = channels::get_membership(pool.readers(), "global:eng", "alice", None)
        .await
        .unwrap()
        .unwrap();
    assert!(opted_out.opted_out);

    channels::add_member(&mut *writer, new_member()).await.unwrap();
    let reinstated = channels::get_membership(pool.readers(), "global:eng", "alice", None)
        .await
        .unwrap()
        .unwrap();
    assert!(!reinstated.opted_out);
}

#[tokio::test]
async fn visible_channels_excludes_opted_out_and_archived() {
    let pool = make_pool().await;
    let mut writer = pool.writer().await;
    channels::create_channel(
        &mut *writer,
        channels::NewChannel {
            id: "global:a",
            channel_type: "channel",
            access_type: "open",
            scope: "global",
            project_id: None,
            name: "a",
            description: "",
            is_default: false,
            owner_name: None,
            owner_project_id: None,
        },
    )
    .await
    .unwrap();
    channels::create_channel(
        &mut *writer,
        channels::NewChannel {
            id: "global:b",
            channel_type: "channel",
            access_type: "open",
            scope: "global",
            project_id: None,
            name: "b",
            description: "",
            is_default: false,
            owner_name: None,
            owner_project_id: None,
        },
    )
    .await
    .unwrap();

    for channel_id in ["global:a", "global:b"] {
        channels::add_member(
            &mut *writer,
            channels::NewMember {
                channel_id,
                agent_name: "bob",
                agent_project_id: None,
                can_leave: true,
                can_send: true,
                can_invite: false,
                can_manage: false,
                invited_by_name: None,
                invited_by_project_id: None,
                source: "manual",
                is_from_default: false,
            },
        )
        .await
        .unwrap();
    }
    channels::archive_channel(&mut *writer, "global:b").await.unwrap();

    let visible = permissions::visible_channels_for(pool.readers(), "bob", None).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, "global:a");
}

#[tokio::test]
async fn message_insert_and_recent_ordering() {
    let pool = make_pool().await;
    let mut writer = pool.writer().await;
    channels::create_channel(
        &mut *writer,
        channels::NewChannel {
            id: "global:a",
            channel_type: "channel",
            access_type: "open",
            scope: "global",
            project_id: None,
            name: "a",
            description: "",
            is_default: false,
            owner_name: None,
            owner_project_id: None,
        },
    )
    .await
    .unwrap();

    for content in ["first", "second", "third"] {
        messages::insert_message(
            &mut *writer,
            messages::NewMessage {
                channel_id: "global:a",
                sender_name: "carol",
                sender_project_id: None,
                content,
                confidence: None,
                metadata: "{}",
                thread_id: None,
            },
        )
        .await
        .unwrap();
    }

    let recent = messages::list_recent(pool.readers(), "global:a", 2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].content, "third");
    assert_eq!(recent[1].content, "second");
}

#[tokio::test]
async fn project_link_self_link_rejected() {
    let pool = make_pool().await;
    let mut writer = pool.writer().await;
    let p = projects::ensure_project(&mut *writer, "/repo/x", "x").await.unwrap();
    let err = links::link_projects(&mut *writer, &p.id, &p.id, "bidirectional").await.unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
}
