//! Scenario coverage for the three permission primitives (§4.2): `can_dm`
//! and `discoverable_agents_for`. `visible_channels_for` is covered in
//! `query_integration.rs` alongside channel/member CRUD.

use claude_slack_db::queries::{agents, links, permissions, projects};
use claude_slack_db::DbPool;

async fn make_pool() -> DbPool {
    DbPool::open_in_memory().await.expect("open in-memory pool")
}

fn new_agent<'a>(name: &'a str, dm_policy: &'a str) -> agents::NewAgent<'a> {
    agents::NewAgent { name, project_id: None, description: "", dm_policy, discoverable: "public" }
}

#[tokio::test]
async fn open_policies_can_always_dm() {
    let pool = make_pool().await;
    let mut writer = pool.writer().await;
    agents::upsert_agent(&mut *writer, new_agent("alice", "open")).await.unwrap();
    agents::upsert_agent(&mut *writer, new_agent("bob", "open")).await.unwrap();
    drop(writer);

    assert!(permissions::can_dm(pool.readers(), "alice", None, "bob", None).await.unwrap());
}

#[tokio::test]
async fn closed_policy_blocks_either_direction() {
    let pool = make_pool().await;
    let mut writer = pool.writer().await;
    agents::upsert_agent(&mut *writer, new_agent("alice", "open")).await.unwrap();
    agents::upsert_agent(&mut *writer, new_agent("bob", "closed")).await.unwrap();
    drop(writer);

    assert!(!permissions::can_dm(pool.readers(), "alice", None, "bob", None).await.unwrap());
    assert!(!permissions::can_dm(pool.readers(), "bob", None, "alice", None).await.unwrap());
}

#[tokio::test]
async fn restricted_policy_requires_explicit_allow() {
    let pool = make_pool().await;
    let mut writer = pool.writer().await;
    agents::upsert_agent(&mut *writer, new_agent("alice", "open")).await.unwrap();
    agents::upsert_agent(&mut *writer, new_agent("bob", "restricted")).await.unwrap();

    assert!(!permissions::can_dm(&mut *writer, "alice", None, "bob", None).await.unwrap());

    sqlx::query(
        "INSERT INTO dm_permissions (agent_name, agent_project_id, other_name, other_project_id, permission, created_at)
         VALUES ('bob', NULL, 'alice', NULL, 'allow', 0)",
    )
    .execute(&mut *writer)
    .await
    .unwrap();

    assert!(permissions::can_dm(&mut *writer, "alice", None, "bob", None).await.unwrap());
}

#[tokio::test]
async fn explicit_block_overrides_open_policy() {
    let pool = make_pool().await;
    let mut writer = pool.writer().await;
    agents::upsert_agent(&mut *writer, new_agent("alice", "open")).await.unwrap();
    agents::upsert_agent(&mut *writer, new_agent("bob", "open")).await.unwrap();

    sqlx::query(
        "INSERT INTO dm_permissions (agent_name, agent_project_id, other_name, other_project_id, permission, created_at)
         VALUES ('bob', NULL, 'alice', NULL, 'block', 0)",
    )
    .execute(&mut *writer)
    .await
    .unwrap();

    assert!(!permissions::can_dm(&mut *writer, "alice", None, "bob", None).await.unwrap());
    assert!(!permissions::can_dm(&mut *writer, "bob", None, "alice", None).await.unwrap());
}

#[tokio::test]
async fn discoverable_project_agents_require_a_link() {
    let pool = make_pool().await;
    let mut writer = pool.writer().await;
    let p1 = projects::ensure_project(&mut *writer, "/repo/p1", "p1").await.unwrap();
    let p2 = projects::ensure_project(&mut *writer, "/repo/p2", "p2").await.unwrap();

    agents::upsert_agent(
        &mut *writer,
        agents::NewAgent {
            name: "carol",
            project_id: Some(&p2.id),
            description: "",
            dm_policy: "open",
            discoverable: "project",
        },
    )
    .await
    .unwrap();

    let before = permissions::discoverable_agents_for(pool.readers(), Some(&p1.id)).await.unwrap();
    assert!(!before.iter().any(|a| a.name == "carol"));

    links::link_projects(&mut *writer, &p1.id, &p2.id, "bidirectional").await.unwrap();

    let after = permissions::discoverable_agents_for(pool.readers(), Some(&p1.id)).await.unwrap();
    assert!(after.iter().any(|a| a.name == "carol"));
}

#[tokio::test]
async fn private_agents_are_never_discoverable() {
    let pool = make_pool().await;
    let mut writer = pool.writer().await;
    agents::upsert_agent(
        &mut *writer,
        agents::NewAgent {
            name: "dave",
            project_id: None,
            description: "",
            dm_policy: "open",
            discoverable: "private",
        },
    )
    .await
    .unwrap();
    drop(writer);

    let agents = permissions::discoverable_agents_for(pool.readers(), None).await.unwrap();
    assert!(!agents.iter().any(|a| a.name == "dave"));
}
