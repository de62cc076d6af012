//! Admin - Listing and Clearing Modules
//!
//! Clearing a module removes its three key classes in one atomic batch:
//! every `f/<id>` text, the `fmod/<module>` id set, and the module's entry
//! in `fmods`. The id counter is never reset, so ids are not reused.
//!
//! The id snapshot is read before the batch runs and is not WATCHed. A load
//! into the same module that lands between the two leaves its `f/<id>` text
//! behind with no set referencing it. Such a key is never selected or
//! listed; clear while no loader targets the module to avoid it.

use serde::Serialize;

use crate::backend::{KvConnection, WriteOp};
use crate::error::{FortuneError, FortuneResult};
use crate::schema::{fortune_text_key, module_fortune_set_key, module_set_key};

/// A loaded module and how many fortunes it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleStats {
    /// Module name
    #[serde(rename = "mod")]
    pub module: String,
    /// Fortunes in the module
    pub count: usize,
}

/// Every loaded module with its fortune count, sorted by name.
///
/// # Errors
/// Any backend error.
pub async fn list_modules<C>(conn: &mut C) -> FortuneResult<Vec<ModuleStats>>
where
    C: KvConnection + ?Sized,
{
    let mut modules = conn.set_members(module_set_key()).await?;
    modules.sort();

    let mut stats = Vec::with_capacity(modules.len());
    for module in modules {
        let count = conn.set_cardinality(&module_fortune_set_key(&module)).await?;
        stats.push(ModuleStats { module, count });
    }
    Ok(stats)
}

/// Remove `module` and all of its fortunes. Returns how many were removed.
///
/// Fortunes stored into `module` after its id set is read are not counted,
/// and their text keys outlive the clear.
///
/// # Errors
/// `ModuleNotFound` if the module is not loaded; any backend error.
pub async fn clear_module<C>(conn: &mut C, module: &str) -> FortuneResult<usize>
where
    C: KvConnection + ?Sized,
{
    if !conn.set_is_member(module_set_key(), module).await? {
        return Err(FortuneError::ModuleNotFound(module.to_string()));
    }

    let set_key = module_fortune_set_key(module);
    let members = conn.set_members(&set_key).await?;

    let mut ops = Vec::with_capacity(members.len() + 2);
    for member in &members {
        // Malformed members have no text key to delete; the set goes anyway.
        if let Ok(id) = member.parse::<u64>() {
            ops.push(WriteOp::delete(fortune_text_key(id)));
        }
    }
    ops.push(WriteOp::delete(set_key));
    ops.push(WriteOp::set_remove(module_set_key(), module));

    conn.exec_atomic(&ops).await?;
    tracing::info!(module, removed = members.len(), "cleared module");
    Ok(members.len())
}

/// Remove every module. Returns how many fortunes were removed.
///
/// Each module is cleared atomically; the run as a whole is not.
///
/// # Errors
/// Any backend error; modules cleared before it stay cleared.
pub async fn clear_all<C>(conn: &mut C) -> FortuneResult<usize>
where
    C: KvConnection + ?Sized,
{
    let mut removed = 0;
    for module in conn.set_members(module_set_key()).await? {
        match clear_module(conn, &module).await {
            Ok(n) => removed += n,
            // Cleared concurrently by someone else.
            Err(FortuneError::ModuleNotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SimConnection, SimConnector};
    use crate::dst::{FaultConfig, FaultType};
    use crate::loader::store_fortune;
    use crate::pool::ManageConnection;
    use crate::selector::pick_random;

    async fn loaded() -> (SimConnector, SimConnection) {
        let connector = SimConnector::with_seed(3);
        let mut conn = connector.connect().await.unwrap();
        for (module, text) in [("b", "b1"), ("a", "a1"), ("a", "a2")] {
            store_fortune(&mut conn, module, text).await.unwrap();
        }
        (connector, conn)
    }

    #[tokio::test]
    async fn test_list_modules_sorted_with_counts() {
        let (_, mut conn) = loaded().await;
        assert_eq!(
            list_modules(&mut conn).await.unwrap(),
            vec![
                ModuleStats {
                    module: "a".into(),
                    count: 2
                },
                ModuleStats {
                    module: "b".into(),
                    count: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_clear_module_removes_all_key_classes() {
        let (connector, mut conn) = loaded().await;

        assert_eq!(clear_module(&mut conn, "a").await.unwrap(), 2);

        assert!(!connector.peek_set("fmods").contains("a"));
        assert!(connector.peek_set("fmod/a").is_empty());
        assert_eq!(connector.peek_scalar("f/2"), None);
        assert_eq!(connector.peek_scalar("f/3"), None);
        assert_eq!(connector.peek_scalar("f/1").as_deref(), Some("b1"));
        assert_eq!(connector.peek_scalar("fid").as_deref(), Some("3"));
        assert!(matches!(
            pick_random(&mut conn, Some("a")).await.unwrap_err(),
            FortuneError::ModuleNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_clear_unknown_module() {
        let (_, mut conn) = loaded().await;
        assert!(matches!(
            clear_module(&mut conn, "zzz").await.unwrap_err(),
            FortuneError::ModuleNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_clear_all_keeps_counter() {
        let (connector, mut conn) = loaded().await;

        assert_eq!(clear_all(&mut conn).await.unwrap(), 3);
        assert_eq!(connector.key_count(), 1, "only the id counter remains");

        let id = store_fortune(&mut conn, "c", "fresh").await.unwrap();
        assert_eq!(id, 4);
    }

    #[tokio::test]
    async fn test_failed_clear_leaves_module_intact() {
        let (connector, mut conn) = loaded().await;
        connector.add_fault(FaultConfig::always(FaultType::Write));

        assert!(clear_module(&mut conn, "a").await.is_err());

        connector.clear_fault(FaultType::Write);
        assert_eq!(connector.peek_set("fmod/a").len(), 2);
        assert!(connector.peek_set("fmods").contains("a"));
    }

    #[tokio::test]
    async fn test_load_racing_clear_leaves_only_unreachable_text() {
        let (connector, mut conn) = loaded().await;
        let mut loader = connector.connect().await.unwrap();

        // The clear's id snapshot, then a load that lands before its batch.
        let snapshot = conn.set_members("fmod/a").await.unwrap();
        let late = store_fortune(&mut loader, "a", "late").await.unwrap();
        let mut ops: Vec<WriteOp> = snapshot
            .iter()
            .map(|m| WriteOp::delete(fortune_text_key(m.parse().unwrap())))
            .collect();
        ops.push(WriteOp::delete("fmod/a"));
        ops.push(WriteOp::set_remove("fmods", "a"));
        conn.exec_atomic(&ops).await.unwrap();

        assert_eq!(connector.peek_scalar(&fortune_text_key(late)).as_deref(), Some("late"));
        assert_eq!(list_modules(&mut conn).await.unwrap().len(), 1);
        for _ in 0..20 {
            let fortune = pick_random(&mut conn, None).await.unwrap();
            assert_eq!((fortune.module.as_str(), fortune.id), ("b", 1));
        }
        assert!(matches!(
            clear_module(&mut conn, "a").await.unwrap_err(),
            FortuneError::ModuleNotFound(_)
        ));
    }
}
