//! `check-lock`: parse a lock expression and try it against a hypothetical actor
//!
//! Factions named in the expression count as "not a member" unless given
//! with `--member ABBR:RANK[:perm,perm]`.

use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};
use clap::Parser;
use uuid::Uuid;

use mushbbs_core::lock::{LockExpr, LockFacts};
use mushbbs_core::models::{ActingIdentity, Character, User};
use mushbbs_core::PermissionContext;

#[derive(Parser, Debug)]
pub struct CheckLockArgs {
    /// Lock expression, e.g. "faction(K) & !rank(K, 5) | admin(3)"
    pub expr: String,

    /// Evaluate as this username
    #[arg(long, default_value = "guest")]
    pub user: String,

    /// Evaluate as this character name
    #[arg(long, default_value = "Guest")]
    pub name: String,

    /// Evaluate with this admin level
    #[arg(long, default_value_t = 0)]
    pub admin_level: i32,

    /// Faction standing as ABBR:RANK[:perm,perm] (repeatable)
    #[arg(long = "member", value_name = "ABBR:RANK[:PERMS]")]
    pub members: Vec<String>,
}

pub fn run_check_lock(args: CheckLockArgs) -> Result<()> {
    let expr = LockExpr::parse(&args.expr).context("invalid lock expression")?;

    let factions = expr.factions();
    if factions.is_empty() {
        println!("ok");
    } else {
        println!("ok (factions: {})", factions.join(", "));
    }

    let actor = ActingIdentity::new(
        User {
            id: Uuid::nil(),
            username: args.user,
            admin_level: args.admin_level,
        },
        Character {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            name: args.name,
        },
    );

    let mut facts = LockFacts::new(&actor);
    for member in &args.members {
        let (abbreviation, standing) = parse_member(member)?;
        facts = facts.with_faction(&abbreviation, Some(standing));
    }

    println!("{}", if facts.eval(&expr) { "pass" } else { "fail" });
    Ok(())
}

fn parse_member(spec: &str) -> Result<(String, PermissionContext)> {
    let mut parts = spec.splitn(3, ':');
    let (Some(abbreviation), Some(rank)) = (parts.next(), parts.next()) else {
        bail!("--member expects ABBR:RANK[:perm,perm], got '{spec}'");
    };
    let rank: i32 = rank
        .trim()
        .parse()
        .with_context(|| format!("invalid rank in --member '{spec}'"))?;
    let permissions: BTreeSet<String> = parts
        .next()
        .map(|perms| {
            perms
                .split(',')
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok((
        abbreviation.trim().to_owned(),
        PermissionContext { rank, permissions },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_spec_with_permissions() {
        let (abbr, standing) = parse_member("K:3:Post, bbadmin").unwrap();
        assert_eq!(abbr, "K");
        assert_eq!(standing.rank, 3);
        assert!(standing.permissions.contains("post"));
        assert!(standing.permissions.contains("bbadmin"));
    }

    #[test]
    fn member_spec_requires_rank() {
        assert!(parse_member("K").is_err());
        assert!(parse_member("K:high").is_err());
    }
}
