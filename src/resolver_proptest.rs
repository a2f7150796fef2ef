//! Property-based tests for resolution and planning.
//!
//! Inventories are generated over a small path alphabet so that rule
//! patterns overlap with generated paths often.

#[cfg(test)]
mod proptest_tests {
    use crate::cancel::CancelToken;
    use crate::config::ResolutionOptions;
    use crate::inventory::{RepositoryInventory, RevisionId};
    use crate::path::{self, PathPattern};
    use crate::planner::{self, CurrentState};
    use crate::resolver::{self, ResolutionContext, Selection};
    use crate::revision;
    use crate::spec::{self, VersionQualifier};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-c]{1,2}", 1..4)
            .prop_map(|segments| format!("/{}", segments.join("/")))
    }

    /// (path, revision id, timestamp seconds) triples.
    fn records_strategy() -> impl Strategy<Value = Vec<(String, u32, i64)>> {
        prop::collection::vec((path_strategy(), 0u32..50, 0i64..1_000), 1..30)
    }

    fn build_inventory(records: &[(String, u32, i64)]) -> RepositoryInventory {
        let mut inventory = RepositoryInventory::new();
        for (path, id, secs) in records {
            let created = Utc.timestamp_opt(*secs + i64::from(*id) * 1_000, 0).unwrap();
            inventory.add_revision(path, format!("r{}", id), "main", created);
        }
        inventory
    }

    /// Spec lines that always resolve for paths with history.
    fn rule_line_strategy() -> impl Strategy<Value = String> {
        (path_strategy(), any::<bool>(), any::<bool>()).prop_map(|(pattern, glob, exclude)| {
            let pattern = if glob { format!("{}/**", pattern) } else { pattern };
            if exclude {
                format!("{} EXCLUDE", pattern)
            } else {
                format!("{} LATEST", pattern)
            }
        })
    }

    /// What each path ends up with, ignoring which rule decided it.
    fn outcomes(selection: &[(String, Selection)]) -> Vec<(String, Option<RevisionId>)> {
        selection
            .iter()
            .map(|(path, chosen)| (path.clone(), chosen.revision().cloned()))
            .collect()
    }

    fn run(
        spec_text: &str,
        inventory: &RepositoryInventory,
        options: ResolutionOptions,
    ) -> Vec<(String, Selection)> {
        let rules = spec::parse(spec_text).unwrap();
        let ctx = ResolutionContext::new(&rules, options, CancelToken::new());
        resolver::resolve(&ctx, &inventory.universe(), inventory)
            .unwrap()
            .iter()
            .map(|(p, s)| (p.clone(), s.clone()))
            .collect()
    }

    // ============================================================================
    // Resolution
    // ============================================================================

    proptest! {
        /// Property: every universe path gets exactly one outcome
        #[test]
        fn resolution_is_total(
            records in records_strategy(),
            lines in prop::collection::vec(rule_line_strategy(), 0..6),
        ) {
            let inventory = build_inventory(&records);
            let result = run(&lines.join("\n"), &inventory, ResolutionOptions::default());
            let paths: Vec<String> = result.into_iter().map(|(p, _)| p).collect();
            prop_assert_eq!(paths, inventory.universe());
        }

        /// Property: parallel and sequential resolution agree
        #[test]
        fn resolution_is_deterministic(
            records in records_strategy(),
            lines in prop::collection::vec(rule_line_strategy(), 0..6),
        ) {
            let inventory = build_inventory(&records);
            let text = lines.join("\n");
            let parallel = run(&text, &inventory, ResolutionOptions::default());
            let again = run(&text, &inventory, ResolutionOptions::default());
            let sequential = run(
                &text,
                &inventory,
                ResolutionOptions { stop_on_first_error: true, ..ResolutionOptions::default() },
            );
            prop_assert_eq!(&parallel, &again);
            prop_assert_eq!(&parallel, &sequential);
        }

        /// Property: with no rules, everything is excluded
        #[test]
        fn no_rules_excludes_everything(records in records_strategy()) {
            let inventory = build_inventory(&records);
            for (_, chosen) in run("", &inventory, ResolutionOptions::default()) {
                prop_assert!(chosen.is_excluded());
            }
        }

        /// Property: swapping rules whose patterns cannot overlap changes nothing
        #[test]
        fn disjoint_rule_swap_is_neutral(records in records_strategy()) {
            let inventory = build_inventory(&records);
            let forward = run("/a/** LATEST\n/b/** EXCLUDE\n", &inventory, ResolutionOptions::default());
            let reversed = run("/b/** EXCLUDE\n/a/** LATEST\n", &inventory, ResolutionOptions::default());
            prop_assert_eq!(outcomes(&forward), outcomes(&reversed));
            for ((_, left), (_, right)) in forward.iter().zip(&reversed) {
                prop_assert_eq!(left.is_excluded(), right.is_excluded());
            }
        }

        /// Property: ASOF never selects a revision created after its bound
        #[test]
        fn asof_never_selects_newer(records in records_strategy(), bound in 0i64..60_000) {
            let inventory = build_inventory(&records);
            let at = Utc.timestamp_opt(bound, 0).unwrap();
            for path in inventory.universe() {
                if let Ok(version) = revision::resolve(&path, &VersionQualifier::AsOf(at), &inventory) {
                    let history = inventory.history(&path).unwrap();
                    let record = history.iter().find(|r| &r.id == version.id()).unwrap();
                    prop_assert!(record.created <= at);
                }
            }
        }

        /// Property: LATEST picks the newest revision and is stable across calls
        #[test]
        fn latest_is_newest_and_stable(records in records_strategy()) {
            let inventory = build_inventory(&records);
            for path in inventory.universe() {
                let first = revision::resolve(&path, &VersionQualifier::Latest, &inventory).unwrap();
                let second = revision::resolve(&path, &VersionQualifier::Latest, &inventory).unwrap();
                prop_assert_eq!(&first, &second);

                let newest = inventory.history(&path).unwrap().iter().map(|r| r.created).max().unwrap();
                let chosen = inventory.history(&path).unwrap().iter().find(|r| &r.id == first.id()).unwrap();
                prop_assert_eq!(chosen.created, newest);
            }
        }
    }

    // ============================================================================
    // Planning
    // ============================================================================

    proptest! {
        /// Property: applying a plan and planning again yields nothing
        #[test]
        fn apply_then_replan_is_empty(
            records in records_strategy(),
            lines in prop::collection::vec(rule_line_strategy(), 0..6),
            stale in prop::collection::vec(path_strategy(), 0..5),
        ) {
            let inventory = build_inventory(&records);
            let rules = spec::parse(&lines.join("\n")).unwrap();
            let ctx = ResolutionContext::new(&rules, ResolutionOptions::default(), CancelToken::new());
            let selection = resolver::resolve(&ctx, &inventory.universe(), &inventory).unwrap();

            let current: CurrentState = stale.into_iter().map(|p| (p, "old".into())).collect();
            let batch = planner::plan(&selection, &current);
            prop_assert_eq!(&batch, &planner::plan(&selection, &current));

            let after = planner::project(&current, &batch);
            prop_assert!(planner::plan(&selection, &after).is_empty());
        }
    }

    // ============================================================================
    // Patterns
    // ============================================================================

    proptest! {
        /// Property: normalization is idempotent
        #[test]
        fn normalize_is_idempotent(input in "[a-z./\\\\]{0,20}") {
            let once = path::normalize(&input);
            prop_assert_eq!(path::normalize(&once), once.clone());
            prop_assert!(once.starts_with('/'));
        }

        /// Property: a literal pattern matches its own path and every descendant
        #[test]
        fn literal_pattern_covers_descendants(base in path_strategy(), child in "[a-z]{1,5}") {
            let pattern = PathPattern::parse(&base).unwrap();
            prop_assert!(path::matches(&pattern, &base));
            let descendant = format!("{}/{}", base, child);
            prop_assert!(path::matches(&pattern, &descendant));
        }
    }
}
