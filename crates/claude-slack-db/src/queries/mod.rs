//! CRUD and permission queries. These are the "DB truth" for the façade:
//! higher layers call these helpers rather than embedding raw SQL, matching
//! the teacher's `mcp-agent-mail-db::queries` convention.

pub mod agents;
pub mod channels;
pub mod links;
pub mod messages;
pub mod permissions;
pub mod projects;
pub mod sessions;
