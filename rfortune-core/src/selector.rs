//! Selector - Two-Stage Random Pick
//!
//! TigerStyle: every empty scope is a typed failure, never a silent fallback.
//!
//! ```text
//! module filter? ──yes──▶ SISMEMBER fmods <m> ──no──▶ ModuleNotFound
//!      │ no                      │ yes
//!      ▼                         ▼
//! SRANDMEMBER fmods ─────▶ SRANDMEMBER fmod/<m> ──▶ GET f/<id>
//! ```
//!
//! The module is drawn first and the fortune second, so each module is
//! equally likely regardless of its size. That bias is the intended
//! behavior; do not flatten it into a draw over all fortunes.

use crate::backend::KvConnection;
use crate::error::{FortuneError, FortuneResult};
use crate::fortune::Fortune;
use crate::schema::{fortune_text_key, module_fortune_set_key, module_set_key};

/// Pick one random fortune, optionally restricted to `module`.
///
/// An empty filter means no filter.
///
/// # Errors
/// `ModuleNotFound`, `NoModulesLoaded` or `ModuleEmpty` for an empty scope;
/// `MalformedId` or `DataIntegrity` when the stored key-space is corrupt;
/// any backend error.
pub async fn pick_random<C>(conn: &mut C, module: Option<&str>) -> FortuneResult<Fortune>
where
    C: KvConnection + ?Sized,
{
    let module = match module.filter(|m| !m.is_empty()) {
        Some(module) => {
            if !conn.set_is_member(module_set_key(), module).await? {
                return Err(FortuneError::ModuleNotFound(module.to_string()));
            }
            module.to_string()
        }
        None => conn
            .set_random_member(module_set_key())
            .await?
            .ok_or(FortuneError::NoModulesLoaded)?,
    };

    let member = conn
        .set_random_member(&module_fortune_set_key(&module))
        .await?
        .ok_or_else(|| FortuneError::ModuleEmpty(module.clone()))?;
    let id = parse_id(&module, &member)?;

    read_text(conn, module, id).await
}

/// Fetch fortune `id` from `module`.
///
/// # Errors
/// `ModuleNotFound` if the module is unknown, `FortuneNotFound` if the id
/// does not belong to it, `DataIntegrity` if its text is missing.
pub async fn fetch<C>(conn: &mut C, module: &str, id: u64) -> FortuneResult<Fortune>
where
    C: KvConnection + ?Sized,
{
    if !conn.set_is_member(module_set_key(), module).await? {
        return Err(FortuneError::ModuleNotFound(module.to_string()));
    }
    if !conn
        .set_is_member(&module_fortune_set_key(module), &id.to_string())
        .await?
    {
        return Err(FortuneError::FortuneNotFound {
            module: module.to_string(),
            id,
        });
    }

    read_text(conn, module.to_string(), id).await
}

fn parse_id(module: &str, member: &str) -> FortuneResult<u64> {
    member.parse().map_err(|_| {
        tracing::error!(module, value = member, "malformed fortune id in module set");
        FortuneError::MalformedId {
            module: module.to_string(),
            value: member.to_string(),
        }
    })
}

async fn read_text<C>(conn: &mut C, module: String, id: u64) -> FortuneResult<Fortune>
where
    C: KvConnection + ?Sized,
{
    match conn.get(&fortune_text_key(id)).await? {
        Some(text) => Ok(Fortune { id, module, text }),
        None => {
            tracing::error!(module = %module, id, "fortune id has no text entry");
            Err(FortuneError::DataIntegrity { id })
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SimConnection, SimConnector};
    use crate::dst::{FaultConfig, FaultType};
    use crate::loader::store_fortune;
    use crate::pool::ManageConnection;
    use std::collections::HashMap;

    async fn seeded(seed: u64, modules: &[(&str, &[&str])]) -> (SimConnector, SimConnection) {
        let connector = SimConnector::with_seed(seed);
        let mut conn = connector.connect().await.unwrap();
        for (module, texts) in modules {
            for text in *texts {
                store_fortune(&mut conn, module, text).await.unwrap();
            }
        }
        (connector, conn)
    }

    #[tokio::test]
    async fn test_pick_single_fortune() {
        let (_, mut conn) = seeded(1, &[("zen", &["only one"])]).await;

        let fortune = pick_random(&mut conn, None).await.unwrap();
        assert_eq!(fortune, Fortune::new(1, "zen", "only one"));
        assert_eq!(pick_random(&mut conn, Some("zen")).await.unwrap(), fortune);
    }

    #[tokio::test]
    async fn test_empty_filter_means_any_module() {
        let (_, mut conn) = seeded(1, &[("zen", &["x"])]).await;
        assert_eq!(pick_random(&mut conn, Some("")).await.unwrap().module, "zen");
    }

    #[tokio::test]
    async fn test_no_modules_loaded() {
        let (_, mut conn) = seeded(1, &[]).await;
        let err = pick_random(&mut conn, None).await.unwrap_err();
        assert!(matches!(err, FortuneError::NoModulesLoaded));
        assert!(err.is_empty_scope());
    }

    #[tokio::test]
    async fn test_unknown_module_never_falls_back() {
        let (_, mut conn) = seeded(1, &[("zen", &["x"])]).await;
        let err = pick_random(&mut conn, Some("nope")).await.unwrap_err();
        assert!(matches!(err, FortuneError::ModuleNotFound(m) if m == "nope"));
    }

    #[tokio::test]
    async fn test_module_with_empty_id_set() {
        let (connector, mut conn) = seeded(1, &[]).await;
        connector.insert_member("fmods", "hollow");

        let err = pick_random(&mut conn, Some("hollow")).await.unwrap_err();
        assert!(matches!(err, FortuneError::ModuleEmpty(m) if m == "hollow"));
    }

    #[tokio::test]
    async fn test_missing_text_is_integrity_violation() {
        let (connector, mut conn) = seeded(1, &[("zen", &["x"])]).await;
        connector.remove_key("f/1");

        let err = pick_random(&mut conn, Some("zen")).await.unwrap_err();
        assert!(matches!(err, FortuneError::DataIntegrity { id: 1 }));
        assert!(err.is_integrity_violation());
        assert!(!err.is_empty_scope());
    }

    #[tokio::test]
    async fn test_malformed_id() {
        let (connector, mut conn) = seeded(1, &[]).await;
        connector.insert_member("fmods", "bad");
        connector.insert_member("fmod/bad", "not-a-number");

        let err = pick_random(&mut conn, None).await.unwrap_err();
        assert!(matches!(err, FortuneError::MalformedId { .. }));
        assert!(err.is_integrity_violation());
    }

    #[tokio::test]
    async fn test_fetch() {
        let (_, mut conn) = seeded(1, &[("a", &["one", "two"]), ("b", &["three"])]).await;

        assert_eq!(fetch(&mut conn, "a", 2).await.unwrap().text, "two");
        assert!(matches!(
            fetch(&mut conn, "a", 3).await.unwrap_err(),
            FortuneError::FortuneNotFound { id: 3, .. }
        ));
        assert!(matches!(
            fetch(&mut conn, "c", 1).await.unwrap_err(),
            FortuneError::ModuleNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_read_fault_surfaces_backend_error() {
        let (connector, mut conn) = seeded(1, &[("zen", &["x"])]).await;
        connector.add_fault(FaultConfig::always(FaultType::Read));

        let err = pick_random(&mut conn, None).await.unwrap_err();
        assert!(matches!(err, FortuneError::Backend(_)));
    }

    #[tokio::test]
    async fn test_filtered_pick_is_uniform_within_module() {
        let texts = ["a", "b", "c", "d"];
        let (_, mut conn) = seeded(7, &[("m", texts.as_slice())]).await;

        let draws = 4000;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..draws {
            let f = pick_random(&mut conn, Some("m")).await.unwrap();
            *counts.entry(f.text).or_default() += 1;
        }

        assert_eq!(counts.len(), texts.len());
        for (text, n) in counts {
            assert!((800..=1200).contains(&n), "{text} drawn {n} times of {draws}");
        }
    }

    #[tokio::test]
    async fn test_unfiltered_pick_weights_modules_equally() {
        // One fortune in "small", nine in "big": two-stage draw picks each
        // module about half the time.
        let big: Vec<&str> = (0..9).map(|_| "big").collect();
        let (_, mut conn) = seeded(11, &[("small", &["small"]), ("big", big.as_slice())]).await;

        let draws = 2000;
        let mut small = 0;
        for _ in 0..draws {
            if pick_random(&mut conn, None).await.unwrap().module == "small" {
                small += 1;
            }
        }

        assert!((800..=1200).contains(&small), "small drawn {small} times of {draws}");
    }

    #[tokio::test]
    async fn test_same_seed_same_picks() {
        let mut runs = Vec::new();
        for _ in 0..2 {
            let (_, mut conn) = seeded(42, &[("a", &["1", "2", "3"]), ("b", &["4", "5"])]).await;
            let mut picks = Vec::new();
            for _ in 0..20 {
                picks.push(pick_random(&mut conn, None).await.unwrap().id);
            }
            runs.push(picks);
        }
        assert_eq!(runs[0], runs[1]);
    }
}
