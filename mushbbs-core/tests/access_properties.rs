//! Universally quantified access rules, checked with proptest.
//!
//! The policy is async; each case drives it on a current-thread runtime.

use std::sync::Arc;

use mushbbs_core::testing::{acting, board, faction, membership};
use mushbbs_core::{
    AccessConfig, AccessKind, AccessPolicy, ExpressionEvaluator, LockExpr, Locks, MemoryRepo,
    PermissionResolver,
};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn arb_lock() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        Just("all()".to_string()),
        Just("none()".to_string()),
        (0..8i32).prop_map(|n| format!("admin({n})")),
        Just("name(Alys)".to_string()),
        Just("faction(K)".to_string()),
        (1..6i32).prop_map(|n| format!("rank(K, {n})")),
        Just("fperm(K, post)".to_string()),
        Just("broken(".to_string()),
    ];
    leaf.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|e| format!("!({e})")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({a}) & ({b})")),
            (inner.clone(), inner).prop_map(|(a, b)| format!("({a}) | ({b})")),
        ]
    })
}

proptest! {
    /// Without a read lock, whoever may post may also read
    #[test]
    fn post_implies_read_without_read_lock(
        post_lock in arb_lock(),
        admin_level in 0..8i32,
        rank in prop::option::of(1..7i32),
        grant_post in any::<bool>(),
    ) {
        runtime().block_on(async {
            let repo = Arc::new(MemoryRepo::new());
            let knights = repo.add_faction(faction(1, "Knights", "K")).await;
            let actor = acting("alice", "Alys", admin_level);
            if let Some(rank) = rank {
                let mut m = membership(&knights, actor.character_id(), rank);
                if grant_post {
                    m.permissions.insert("post".into());
                }
                repo.add_membership(m).await;
            }

            let evaluator = Arc::new(ExpressionEvaluator::new(repo.clone()));
            let policy = AccessPolicy::new(repo.clone(), evaluator, AccessConfig::default());

            for scoped in [None, Some(&knights)] {
                let mut target = board(1, scoped, 1);
                target.locks = Locks::new().with("post", &post_lock);

                let post = policy.access(&target, &actor, &AccessKind::Post).await.unwrap();
                let read = policy.access(&target, &actor, &AccessKind::Read).await.unwrap();
                prop_assert!(!post || read, "post granted but read denied for {}", post_lock);
            }
            Ok(())
        })?;
    }

    /// Leaders hold every faction permission
    #[test]
    fn leaders_have_every_permission(rank in -3..=1i32, permission in "[A-Za-z_]{1,16}") {
        runtime().block_on(async {
            let repo = MemoryRepo::new();
            let knights = repo.add_faction(faction(1, "Knights", "K")).await;
            let leader = acting("lord", "Lord", 0);
            repo.add_membership(membership(&knights, leader.character_id(), rank)).await;

            let allowed = PermissionResolver::new(&repo)
                .has_permission(&knights, leader.character_id(), &permission)
                .await
                .unwrap();
            prop_assert!(allowed);
            Ok(())
        })?;
    }

    /// Arbitrarily deep prefixes end in an error, never a stack overflow
    #[test]
    fn nesting_is_bounded(prefix in "[!( ]{0,3000}") {
        let input = format!("{prefix}all()");
        let parsed = LockExpr::parse(&input);
        if prefix.matches(['!', '(']).count() > 32 {
            prop_assert!(parsed.is_err());
        }
    }
}
