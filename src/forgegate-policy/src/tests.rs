//! Tests for the Forgegate policy core.
//!
//! Coverage:
//! 1. Action vocabulary and bundle/category expansion
//! 2. Endpoint classification (REST and git smart HTTP)
//! 3. Body refinement totality
//! 4. IAM-style rule evaluation (deny-wins, implicit deny)
//! 5. Repository pattern matching
//! 6. Credential selection
//! 7. Config loading and validation
//! 8. End-to-end gate scenarios

use super::*;

fn rule(effect: Effect, actions: &[&str], repos: &[&str]) -> PolicyRule {
    PolicyRule {
        effect,
        actions: actions.iter().map(ToString::to_string).collect(),
        repos: repos.iter().map(ToString::to_string).collect(),
    }
}

fn config_with_rules(rules: Vec<PolicyRule>) -> ProxyConfig {
    ProxyConfig {
        classic_pat: Some(Credential::new("ghp_classic_token_0000")),
        fine_grained_pats: vec![],
        pats: vec![],
        rules,
    }
}

// ============================================================================
// Action Vocabulary Tests
// ============================================================================

mod vocabulary_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_universe_is_nonempty_and_unique() {
        let vocab = ActionVocabulary::new();
        let universe = vocab.universe();
        assert!(!universe.is_empty());

        let mut deduped = universe.to_vec();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), universe.len());
    }

    #[test]
    fn test_every_bundle_expands_into_universe() {
        let vocab = ActionVocabulary::new();
        for bundle in vocab.bundle_names().collect::<Vec<_>>() {
            let expansion = vocab.expand_bundle(bundle);
            assert!(!expansion.is_empty(), "bundle {bundle} is empty");
            for action in expansion {
                assert!(
                    vocab.is_primitive(action),
                    "bundle {bundle} contains unknown action {action}"
                );
            }
        }
    }

    #[test]
    fn test_every_category_expands_into_universe() {
        let vocab = ActionVocabulary::new();
        for category in [
            "metadata",
            "actions",
            "statuses",
            "code",
            "issues",
            "git",
            "pr",
            "discussions",
            "subissues",
        ] {
            let expansion = vocab.expand_category(category);
            assert!(!expansion.is_empty(), "category {category} is empty");
            for action in expansion {
                assert!(vocab.is_primitive(action));
            }
        }
    }

    #[test]
    fn test_write_bundle_is_superset_of_read() {
        let vocab = ActionVocabulary::new();
        let read = vocab.expand_bundle("pull-requests:read");
        let write = vocab.expand_bundle("pull-requests:write");
        for action in read {
            assert!(write.contains(action), "write bundle is missing {action}");
        }
    }

    #[test]
    fn test_contribute_bundle_is_superset_of_read_without_merge() {
        let vocab = ActionVocabulary::new();
        let read = vocab.expand_bundle("pull-requests:read");
        let contribute = vocab.expand_bundle("pulls:contribute");
        for action in read {
            assert!(contribute.contains(action));
        }
        assert!(!contribute.contains(&"pr:merge_commit"));
        assert!(!contribute.contains(&"pr:close"));
        assert!(!contribute.contains(&"pr:review_approve"));
    }

    #[test]
    fn test_merge_bundle_has_exactly_three_strategies() {
        let vocab = ActionVocabulary::new();
        assert_eq!(
            vocab.expand_bundle("pr:merge").to_vec(),
            vec!["pr:merge_commit", "pr:merge_squash", "pr:merge_rebase"]
        );
    }

    #[test]
    fn test_unknown_bundle_and_category_are_empty() {
        let vocab = ActionVocabulary::new();
        assert!(vocab.expand_bundle("no-such-bundle").is_empty());
        assert!(vocab.expand_category("no-such-category").is_empty());
        assert!(!vocab.is_primitive("no:such_action"));
    }
}

// ============================================================================
// Endpoint Classification Tests
// ============================================================================

mod classifier_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> EndpointTable {
        EndpointTable::new().expect("endpoint table compiles")
    }

    #[test]
    fn test_repo_metadata_read() {
        let classification = table().classify("GET", "/repos/acme/foo").unwrap();
        assert_eq!(classification.action, "metadata:read");
        assert_eq!(classification.params["owner"], "acme");
        assert_eq!(classification.params["repo"], "foo");
        assert_eq!(classification.repo().as_deref(), Some("acme/foo"));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let table = table();
        let first = table.classify("PATCH", "/repos/a/b/pulls/7");
        for _ in 0..3 {
            assert_eq!(table.classify("PATCH", "/repos/a/b/pulls/7"), first);
        }
        assert_eq!(first.unwrap().action, "pr:update_PARAM_BRANCH");
    }

    #[test]
    fn test_placeholder_endpoints() {
        let table = table();
        assert_eq!(
            table.classify("POST", "/repos/a/b/pulls").unwrap().action,
            "pr:create_PARAM_BRANCH"
        );
        assert_eq!(
            table.classify("PUT", "/repos/a/b/pulls/3/merge").unwrap().action,
            "pr:merge_PARAM_BRANCH"
        );
        assert_eq!(
            table.classify("POST", "/repos/a/b/pulls/3/reviews").unwrap().action,
            "pr:review_PARAM_BRANCH"
        );
        assert_eq!(
            table
                .classify("POST", "/repos/a/b/pulls/3/reviews/9/events")
                .unwrap()
                .action,
            "pr:review_submit_PARAM_BRANCH"
        );
    }

    #[test]
    fn test_review_comment_route_does_not_shadow_pull_number() {
        let table = table();
        // `pulls/comments/{id}` is declared before `pulls/{number}` and the
        // numeric capture keeps the literal segment from matching it.
        assert_eq!(
            table.classify("GET", "/repos/a/b/pulls/comments/12").unwrap().action,
            "pr:read"
        );
        assert_eq!(
            table.classify("PATCH", "/repos/a/b/pulls/comments/12").unwrap().action,
            "pr:comment"
        );
        assert_eq!(
            table.classify("GET", "/repos/a/b/issues/comments/12").unwrap().action,
            "issues:read"
        );
    }

    #[test]
    fn test_commit_status_routes_beat_generic_commit() {
        let table = table();
        assert_eq!(
            table.classify("GET", "/repos/a/b/commits/abc123/status").unwrap().action,
            "statuses:read"
        );
        assert_eq!(
            table.classify("GET", "/repos/a/b/commits/abc123/check-runs").unwrap().action,
            "statuses:read"
        );
        assert_eq!(
            table.classify("GET", "/repos/a/b/commits/abc123").unwrap().action,
            "code:read"
        );
    }

    #[test]
    fn test_contents_paths_allow_slashes() {
        let table = table();
        assert_eq!(
            table.classify("GET", "/repos/a/b/contents/src/lib/util.rs").unwrap().action,
            "code:read"
        );
        assert_eq!(
            table.classify("GET", "/repos/a/b/contents").unwrap().action,
            "code:read"
        );
        assert_eq!(
            table.classify("PUT", "/repos/a/b/contents/docs/README.md").unwrap().action,
            "code:write"
        );
    }

    #[test]
    fn test_issue_routes() {
        let table = table();
        assert_eq!(
            table.classify("POST", "/repos/a/b/issues").unwrap().action,
            "issues:write"
        );
        assert_eq!(
            table.classify("PATCH", "/repos/a/b/issues/44").unwrap().action,
            "issues:edit"
        );
        assert_eq!(
            table.classify("POST", "/repos/a/b/issues/44/comments").unwrap().action,
            "issues:comment"
        );
        assert_eq!(
            table.classify("PATCH", "/repos/a/b/issues/comments/9").unwrap().action,
            "issues:comment_edit"
        );
    }

    #[test]
    fn test_unknown_endpoint_is_unmatched() {
        let table = table();
        assert_eq!(table.classify("GET", "/repos/a/b/secrets"), None);
        assert_eq!(table.classify("GET", "/user"), None);
        assert_eq!(table.classify("DELETE", "/repos/a/b"), None);
    }

    #[test]
    fn test_verbs_outside_the_set_never_match() {
        let table = table();
        assert_eq!(table.classify("HEAD", "/repos/a/b"), None);
        assert_eq!(table.classify("OPTIONS", "/repos/a/b"), None);
        assert_eq!(table.classify("get", "/repos/a/b"), None);
    }

    #[test]
    fn test_query_string_must_not_be_in_path() {
        assert_eq!(table().classify("GET", "/repos/a/b?per_page=5"), None);
    }

    #[test]
    fn test_git_info_refs_defaults_to_read() {
        let classification = table()
            .classify_git("GET", "/git/a/b.git/info/refs", "service=git-upload-pack")
            .unwrap();
        assert_eq!(classification.action, "git:read");
        assert_eq!(classification.repo().as_deref(), Some("a/b"));
    }

    #[test]
    fn test_git_info_refs_receive_pack_is_write() {
        let classification = table()
            .classify_git("GET", "/git/a/b.git/info/refs", "service=git-receive-pack")
            .unwrap();
        assert_eq!(classification.action, "git:write");
    }

    #[test]
    fn test_git_pack_services() {
        let table = table();
        assert_eq!(
            table.classify_git("POST", "/git/a/b.git/git-upload-pack", "").unwrap().action,
            "git:read"
        );
        assert_eq!(
            table.classify_git("POST", "/git/a/b.git/git-receive-pack", "").unwrap().action,
            "git:write"
        );
    }

    #[test]
    fn test_git_unmatched_paths() {
        let table = table();
        assert_eq!(table.classify_git("GET", "/git/a/b.git/HEAD", ""), None);
        assert_eq!(table.classify_git("GET", "/git/a/b/info/refs", ""), None);
        assert_eq!(
            table.classify_git("PUT", "/git/a/b.git/git-upload-pack", ""),
            None
        );
    }
}

// ============================================================================
// Refinement Tests
// ============================================================================

mod refinement_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_refinement() {
        assert_eq!(refine("pr:create_PARAM_BRANCH", br#"{"draft": true}"#), "pr:create_draft");
        assert_eq!(refine("pr:create_PARAM_BRANCH", br#"{"draft": false}"#), "pr:create");
        assert_eq!(refine("pr:create_PARAM_BRANCH", b""), "pr:create");
    }

    #[test]
    fn test_update_refinement() {
        let action = "pr:update_PARAM_BRANCH";
        assert_eq!(refine(action, br#"{"state": "closed"}"#), "pr:close");
        assert_eq!(refine(action, br#"{"state": "open"}"#), "pr:reopen");
        assert_eq!(refine(action, br#"{"draft": true}"#), "pr:convert_to_draft");
        assert_eq!(refine(action, br#"{"draft": false}"#), "pr:mark_ready");
        assert_eq!(refine(action, br#"{"title": "new"}"#), "pr:update");
        // state takes precedence over draft
        assert_eq!(refine(action, br#"{"state": "closed", "draft": true}"#), "pr:close");
    }

    #[test]
    fn test_merge_refinement() {
        let action = "pr:merge_PARAM_BRANCH";
        assert_eq!(refine(action, br#"{"merge_method": "squash"}"#), "pr:merge_squash");
        assert_eq!(refine(action, br#"{"merge_method": "rebase"}"#), "pr:merge_rebase");
        assert_eq!(refine(action, br#"{"merge_method": "merge"}"#), "pr:merge_commit");
        assert_eq!(refine(action, b"{}"), "pr:merge_commit");
    }

    #[test]
    fn test_review_refinement_uppercases_event() {
        let action = "pr:review_PARAM_BRANCH";
        assert_eq!(refine(action, br#"{"event": "APPROVE"}"#), "pr:review_approve");
        assert_eq!(refine(action, br#"{"event": "approve"}"#), "pr:review_approve");
        assert_eq!(
            refine(action, br#"{"event": "request_changes"}"#),
            "pr:review_request_changes"
        );
        assert_eq!(refine(action, br#"{"event": "Comment"}"#), "pr:review_comment");
        assert_eq!(refine(action, b"{}"), "pr:review_pending");
    }

    #[test]
    fn test_review_submit_refinement() {
        let action = "pr:review_submit_PARAM_BRANCH";
        assert_eq!(refine(action, br#"{"event": "APPROVE"}"#), "pr:review_submit_approve");
        assert_eq!(
            refine(action, br#"{"event": "REQUEST_CHANGES"}"#),
            "pr:review_submit_request_changes"
        );
        assert_eq!(refine(action, br#"{"event": "COMMENT"}"#), "pr:review_submit_comment");
        assert_eq!(refine(action, b"not json"), "pr:review_submit_comment");
    }

    #[test]
    fn test_refinement_is_total_over_garbage_bodies() {
        let vocab = ActionVocabulary::new();
        let placeholders = [
            "pr:create_PARAM_BRANCH",
            "pr:update_PARAM_BRANCH",
            "pr:merge_PARAM_BRANCH",
            "pr:review_PARAM_BRANCH",
            "pr:review_submit_PARAM_BRANCH",
        ];
        let bodies: [&[u8]; 5] = [
            b"",
            b"not json",
            b"[1, 2, 3]",
            br#"{"unrelated": "field"}"#,
            br#"{"draft": "yes"}"#,
        ];
        for placeholder in placeholders {
            for body in bodies {
                let refined = refine(placeholder, body);
                assert!(
                    vocab.is_primitive(refined),
                    "{placeholder} refined to unknown action {refined}"
                );
            }
        }
    }

    #[test]
    fn test_non_placeholder_actions_pass_through() {
        assert_eq!(refine("metadata:read", br#"{"draft": true}"#), "metadata:read");
        assert_eq!(refine("pr:merge_squash", b"anything"), "pr:merge_squash");
    }

    #[test]
    fn test_unlisted_placeholder_is_stripped() {
        assert_eq!(refine("issues:edit_PARAM_BRANCH", b"{}"), "issues:edit");
    }
}

// ============================================================================
// Repository Pattern Tests
// ============================================================================

mod pattern_tests {
    use super::*;

    #[test]
    fn test_star_matches_everything() {
        assert!(repo_pattern_matches("*", "acme/foo"));
        assert!(repo_pattern_matches("*", "x/y"));
    }

    #[test]
    fn test_owner_wildcard() {
        assert!(repo_pattern_matches("acme/*", "acme/foo"));
        assert!(repo_pattern_matches("acme/*", "acme/bar"));
        assert!(!repo_pattern_matches("acme/*", "other/foo"));
        assert!(!repo_pattern_matches("acme/*", "acme"));
    }

    #[test]
    fn test_exact_match() {
        assert!(repo_pattern_matches("acme/foo", "acme/foo"));
        assert!(!repo_pattern_matches("acme/foo", "acme/foobar"));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert!(repo_pattern_matches("ACME/Foo", "acme/foo"));
        assert!(repo_pattern_matches("acme/*", "Acme/FOO"));
        assert!(repo_pattern_matches("*/DOCS", "team/docs"));
    }

    #[test]
    fn test_glob_fallback() {
        assert!(repo_pattern_matches("*/docs", "acme/docs"));
        assert!(!repo_pattern_matches("*/docs", "acme/code"));
        assert!(repo_pattern_matches("acme/proj-*", "acme/proj-one"));
    }

    #[test]
    fn test_invalid_glob_matches_nothing() {
        assert!(!repo_pattern_matches("acme/[", "acme/["));
    }
}

// ============================================================================
// Rule Evaluation Tests
// ============================================================================

mod evaluation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deny_wins_over_any_allow() {
        let vocab = ActionVocabulary::new();
        let rules = vec![
            rule(Effect::Allow, &["*"], &["*"]),
            rule(Effect::Deny, &["pr:merge"], &["*"]),
            rule(Effect::Allow, &["*"], &["*"]),
        ];
        let evaluation = evaluate(&vocab, "pr:merge_squash", "a/b", &rules);
        assert!(!evaluation.allowed);
        assert!(evaluation.reason.contains("deny"));
    }

    #[test]
    fn test_implicit_default_deny() {
        let vocab = ActionVocabulary::new();
        let rules = vec![rule(Effect::Allow, &["issues:read"], &["*"])];
        let evaluation = evaluate(&vocab, "pr:read", "a/b", &rules);
        assert!(!evaluation.allowed);
        assert_eq!(evaluation.reason, "No matching allow rule for pr:read on a/b");
    }

    #[test]
    fn test_allow_with_matching_rule() {
        let vocab = ActionVocabulary::new();
        let rules = vec![rule(Effect::Allow, &["metadata:read"], &["acme/*"])];
        let evaluation = evaluate(&vocab, "metadata:read", "acme/foo", &rules);
        assert!(evaluation.allowed);
        assert_eq!(evaluation.reason, "Allowed");
    }

    #[test]
    fn test_rule_skipped_when_repo_does_not_match() {
        let vocab = ActionVocabulary::new();
        let rules = vec![rule(Effect::Deny, &["*"], &["other/*"])];
        // The deny is scoped to another owner, so implicit deny fires
        // instead of the rule.
        let evaluation = evaluate(&vocab, "pr:read", "acme/foo", &rules);
        assert!(!evaluation.allowed);
        assert!(evaluation.reason.contains("No matching allow rule"));
    }

    #[test]
    fn test_category_wildcard_pattern() {
        let vocab = ActionVocabulary::new();
        let rules = vec![rule(Effect::Allow, &["issues:*"], &["*"])];
        assert!(evaluate(&vocab, "issues:comment_edit", "a/b", &rules).allowed);
        assert!(!evaluate(&vocab, "pr:read", "a/b", &rules).allowed);
    }

    #[test]
    fn test_bundle_pattern_expands() {
        let vocab = ActionVocabulary::new();
        let rules = vec![rule(Effect::Allow, &["pulls:contribute"], &["*"])];
        assert!(evaluate(&vocab, "pr:create", "a/b", &rules).allowed);
        assert!(evaluate(&vocab, "metadata:read", "a/b", &rules).allowed);
        assert!(!evaluate(&vocab, "pr:merge_commit", "a/b", &rules).allowed);
    }

    #[test]
    fn test_unknown_action_pattern_matches_nothing() {
        let vocab = ActionVocabulary::new();
        let rules = vec![rule(Effect::Allow, &["bogus:action"], &["*"])];
        assert!(!evaluate(&vocab, "metadata:read", "a/b", &rules).allowed);
    }

    #[test]
    fn test_empty_lists_match_nothing() {
        let vocab = ActionVocabulary::new();
        let no_actions = vec![rule(Effect::Allow, &[], &["*"])];
        let no_repos = vec![rule(Effect::Allow, &["*"], &[])];
        assert!(!evaluate(&vocab, "metadata:read", "a/b", &no_actions).allowed);
        assert!(!evaluate(&vocab, "metadata:read", "a/b", &no_repos).allowed);
    }

    #[test]
    fn test_expand_action_pattern_shapes() {
        let vocab = ActionVocabulary::new();
        assert_eq!(expand_action_pattern(&vocab, "*").len(), vocab.universe().len());
        assert_eq!(
            expand_action_pattern(&vocab, "pr:merge"),
            vec!["pr:merge_commit", "pr:merge_squash", "pr:merge_rebase"]
        );
        assert_eq!(expand_action_pattern(&vocab, "git:*"), vec!["git:read", "git:write"]);
        assert_eq!(expand_action_pattern(&vocab, "metadata:read"), vec!["metadata:read"]);
        assert!(expand_action_pattern(&vocab, "nope").is_empty());
        assert!(expand_action_pattern(&vocab, "nope:*").is_empty());
    }

    #[test]
    fn test_denial_reason_never_contains_tokens() {
        let vocab = ActionVocabulary::new();
        let rules = vec![rule(Effect::Deny, &["*"], &["*"])];
        let evaluation = evaluate(&vocab, "pr:read", "a/b", &rules);
        assert!(!evaluation.reason.contains("ghp_"));
    }
}

// ============================================================================
// Credential Selection Tests
// ============================================================================

mod credential_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(token: &str, repos: &[&str]) -> CredentialEntry {
        CredentialEntry {
            token: Credential::new(token),
            repos: repos.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_scoped_entry_wins_over_fallback() {
        let catalog = CredentialCatalog::new(
            vec![entry("T1", &["acme/*"])],
            Some(Credential::new("T0")),
        );
        assert_eq!(catalog.select("acme/foo").unwrap().token(), "T1");
        assert_eq!(catalog.select("other/x").unwrap().token(), "T0");
    }

    #[test]
    fn test_first_matching_entry_wins() {
        let catalog = CredentialCatalog::new(
            vec![entry("T1", &["acme/*"]), entry("T2", &["acme/foo"])],
            None,
        );
        assert_eq!(catalog.select("acme/foo").unwrap().token(), "T1");
    }

    #[test]
    fn test_selection_is_case_insensitive() {
        let catalog = CredentialCatalog::new(vec![entry("T1", &["Acme/*"])], None);
        assert_eq!(catalog.select("ACME/foo").unwrap().token(), "T1");
    }

    #[test]
    fn test_with_fallback_selection_is_total() {
        let catalog = CredentialCatalog::new(
            vec![entry("T1", &["acme/*"])],
            Some(Credential::new("T0")),
        );
        for repo in ["acme/foo", "other/bar", "weird/name-2"] {
            assert!(catalog.select(repo).is_some());
        }
    }

    #[test]
    fn test_no_match_without_fallback() {
        let catalog = CredentialCatalog::new(vec![entry("T1", &["acme/*"])], None);
        assert!(catalog.select("other/x").is_none());
    }

    #[test]
    fn test_masking() {
        assert_eq!(Credential::new("ghp_abcdefghijklmnop").masked(), "ghp_...mnop");
        assert_eq!(Credential::new("short").masked(), "****");
        let displayed = format!("{:?}", Credential::new("ghp_abcdefghijklmnop"));
        assert!(!displayed.contains("abcdefgh"));
    }
}

// ============================================================================
// Config Loading Tests
// ============================================================================

mod config_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VALID: &str = r#"{
        "classic_pat": "ghp_classic_token_0000",
        "fine_grained_pats": [
            {"pat": "github_pat_scoped_0001", "repos": ["acme/*"]}
        ],
        "rules": [
            {"effect": "allow", "actions": ["*"], "repos": ["*"]}
        ]
    }"#;

    #[test]
    fn test_valid_config_parses() {
        let config = ProxyConfig::from_json(VALID).unwrap();
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.fine_grained_pats.len(), 1);
    }

    #[test]
    fn test_comments_are_tolerated() {
        let commented = r#"{
            // catch-all token
            "classic_pat": "ghp_classic_token_0000",
            /* the ruleset */
            "rules": [
                {"effect": "allow", "actions": ["*"], "repos": ["*"]}
            ]
        }"#;
        let config = ProxyConfig::from_json(commented).unwrap();
        assert_eq!(config.rules.len(), 1);
    }

    #[test]
    fn test_comment_markers_inside_strings_survive() {
        let tricky = r#"{
            "classic_pat": "token//not-a-comment",
            "rules": [
                {"effect": "allow", "actions": ["*"], "repos": ["*"]}
            ]
        }"#;
        let config = ProxyConfig::from_json(tricky).unwrap();
        assert_eq!(
            config.classic_pat.unwrap().token(),
            "token//not-a-comment"
        );
    }

    #[test]
    fn test_missing_rules_is_fatal() {
        let result = ProxyConfig::from_json(r#"{"classic_pat": "t"}"#);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_empty_rules_is_fatal() {
        let result = ProxyConfig::from_json(r#"{"classic_pat": "t", "rules": []}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_effect_is_fatal() {
        let result = ProxyConfig::from_json(
            r#"{"classic_pat": "t", "rules": [{"effect": "audit", "actions": [], "repos": []}]}"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_credentials_is_fatal() {
        let result = ProxyConfig::from_json(
            r#"{"rules": [{"effect": "allow", "actions": ["*"], "repos": ["*"]}]}"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_catalog_normalizes_both_shapes() {
        let config = ProxyConfig::from_json(
            r#"{
                "classic_pat": "T0",
                "fine_grained_pats": [{"pat": "T2", "repos": ["legacy/*"]}],
                "pats": [{"token": "T1", "repos": ["modern/*"]}],
                "rules": [{"effect": "allow", "actions": ["*"], "repos": ["*"]}]
            }"#,
        )
        .unwrap();
        let catalog = config.catalog();
        assert_eq!(catalog.select("modern/x").unwrap().token(), "T1");
        assert_eq!(catalog.select("legacy/x").unwrap().token(), "T2");
        assert_eq!(catalog.select("neither/x").unwrap().token(), "T0");
    }

    #[cfg(unix)]
    #[test]
    fn test_world_readable_config_is_rejected() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(matches!(
            ProxyConfig::load(file.path()),
            Err(ConfigError::Permissions { .. })
        ));

        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600)).unwrap();
        assert!(ProxyConfig::load(file.path()).is_ok());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        assert!(matches!(
            ProxyConfig::load("/nonexistent/forgegate/config.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}

// ============================================================================
// End-to-End Gate Tests
// ============================================================================

mod gate_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_metadata_read_allowed() {
        let config = config_with_rules(vec![rule(Effect::Allow, &["*"], &["acme/*"])]);
        let gate = Gate::from_config(&config).unwrap();

        let verdict = gate.authorize_api("GET", "/repos/acme/foo", b"").unwrap();
        assert_eq!(verdict.action, "metadata:read");
        assert_eq!(verdict.repo, "acme/foo");
    }

    #[test]
    fn test_deny_overrides_allow_for_squash_merge() {
        let config = config_with_rules(vec![
            rule(Effect::Allow, &["*"], &["*"]),
            rule(Effect::Deny, &["pr:merge"], &["*"]),
        ]);
        let gate = Gate::from_config(&config).unwrap();

        let rejection = gate
            .authorize_api("PUT", "/repos/a/b/pulls/1/merge", br#"{"merge_method":"squash"}"#)
            .unwrap_err();
        match rejection {
            GateRejection::PolicyDenied { action, .. } => {
                assert_eq!(action, "pr:merge_squash");
            }
            other => panic!("expected policy denial, got {other:?}"),
        }
    }

    #[test]
    fn test_refinement_distinguishes_close_from_reopen() {
        let config = config_with_rules(vec![rule(Effect::Allow, &["pr:close"], &["a/b"])]);
        let gate = Gate::from_config(&config).unwrap();

        let verdict = gate
            .authorize_api("PATCH", "/repos/a/b/pulls/3", br#"{"state":"closed"}"#)
            .unwrap();
        assert_eq!(verdict.action, "pr:close");

        let rejection = gate
            .authorize_api("PATCH", "/repos/a/b/pulls/3", br#"{"state":"open"}"#)
            .unwrap_err();
        assert!(matches!(rejection, GateRejection::PolicyDenied { action, .. } if action == "pr:reopen"));
    }

    #[test]
    fn test_git_push_needs_write() {
        let config = config_with_rules(vec![rule(Effect::Allow, &["git:read"], &["*"])]);
        let gate = Gate::from_config(&config).unwrap();

        assert!(gate
            .authorize_git("GET", "/git/a/b.git/info/refs", "service=git-upload-pack")
            .is_ok());

        let rejection = gate
            .authorize_git("GET", "/git/a/b.git/info/refs", "service=git-receive-pack")
            .unwrap_err();
        assert!(matches!(rejection, GateRejection::PolicyDenied { action, .. } if action == "git:write"));
    }

    #[test]
    fn test_credential_scoping() {
        let config = ProxyConfig {
            classic_pat: Some(Credential::new("T0")),
            fine_grained_pats: vec![],
            pats: vec![CredentialEntry {
                token: Credential::new("T1"),
                repos: vec!["acme/*".to_string()],
            }],
            rules: vec![rule(Effect::Allow, &["*"], &["*"])],
        };
        let gate = Gate::from_config(&config).unwrap();

        let verdict = gate.authorize_api("GET", "/repos/acme/foo", b"").unwrap();
        assert_eq!(verdict.credential.token(), "T1");

        let verdict = gate.authorize_api("GET", "/repos/other/x", b"").unwrap();
        assert_eq!(verdict.credential.token(), "T0");
    }

    #[test]
    fn test_unmatched_endpoint_fails_closed_despite_allow_all() {
        let config = config_with_rules(vec![rule(Effect::Allow, &["*"], &["*"])]);
        let gate = Gate::from_config(&config).unwrap();

        assert!(matches!(
            gate.authorize_api("GET", "/repos/a/b/secrets", b""),
            Err(GateRejection::ForbiddenEndpoint)
        ));
    }

    #[test]
    fn test_missing_credential_is_rejected() {
        let config = ProxyConfig {
            classic_pat: None,
            fine_grained_pats: vec![],
            pats: vec![CredentialEntry {
                token: Credential::new("T1"),
                repos: vec!["acme/*".to_string()],
            }],
            rules: vec![rule(Effect::Allow, &["*"], &["*"])],
        };
        let gate = Gate::from_config(&config).unwrap();

        assert!(matches!(
            gate.authorize_api("GET", "/repos/other/x", b""),
            Err(GateRejection::NoCredential { .. })
        ));
    }

    #[test]
    fn test_explicit_action_authorization_for_side_channels() {
        let config = config_with_rules(vec![rule(Effect::Allow, &["discussions:read"], &["*"])]);
        let gate = Gate::from_config(&config).unwrap();

        assert!(gate.authorize_action("discussions:read", "a/b").is_ok());
        assert!(gate.authorize_action("discussions:write", "a/b").is_err());
    }
}
