//! # caseledger-policy
//!
//! TOML configuration for caseledger and the strict-by-default
//! recording-mode policy.
//!
//! ## Overview
//!
//! [`LedgerConfig`] is the whole `caseledger.toml` file: recorder and
//! verifier tunables, the store location, and an ordered list of
//! [`ModeRule`]s.  [`TomlModePolicy`] implements
//! [`ModePolicy`](caseledger_core::traits::ModePolicy) over those rules.
//!
//! ## Rule matching
//!
//! Each rule specifies a `table` and an `operation` pattern.  Both support
//! the wildcard `"*"`.  Rules are applied in declaration order; the first
//! match wins.  A call site no rule matches records strictly, so an audit
//! failure fails the business action unless a rule says otherwise, with a
//! reason.

pub mod engine;
pub mod rule;
pub mod settings;

pub use engine::TomlModePolicy;
pub use rule::{ModeRule, RuleMode};
pub use settings::{LedgerConfig, StoreSettings, VerifierSettings};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use caseledger_contracts::{
        error::LedgerError,
        mode::{AuditMode, CallSite},
        record::Operation,
    };
    use caseledger_core::traits::ModePolicy;

    use crate::{LedgerConfig, TomlModePolicy};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn site(table: &str, operation: &str) -> CallSite {
        CallSite::new(table, Operation::from(operation))
    }

    // ── 1. strict-by-default ──────────────────────────────────────────────────

    /// With no rules, every call site records strictly.
    #[test]
    fn test_strict_by_default() {
        let policy = TomlModePolicy::from_toml_str("").unwrap();
        let mode = policy.mode_for(&site("cases", "CREATE")).unwrap();
        assert_eq!(mode, AuditMode::Strict);
    }

    // ── 2. explicit lenient ───────────────────────────────────────────────────

    #[test]
    fn test_explicit_lenient_carries_reason() {
        let toml = r#"
            [[rules]]
            id = "lenient-chat-sync"
            description = "Chat mirror sync may proceed if auditing is down"
            table = "chat_messages"
            operation = "*"
            mode = "lenient"
            reason = "chat mirror is re-derivable from the provider"
        "#;

        let policy = TomlModePolicy::from_toml_str(toml).unwrap();

        match policy.mode_for(&site("chat_messages", "SYNC")).unwrap() {
            AuditMode::Lenient { reason } => {
                assert!(reason.contains("re-derivable"), "unexpected reason: {reason}");
            }
            other => panic!("expected Lenient, got {:?}", other),
        }
        assert_eq!(
            policy.mode_for(&site("cases", "SYNC")).unwrap(),
            AuditMode::Strict,
            "other tables must stay strict"
        );
    }

    // ── 3. lenient without a reason ───────────────────────────────────────────

    #[test]
    fn test_lenient_rule_without_reason_is_rejected() {
        let toml = r#"
            [[rules]]
            id = "undocumented"
            table = "*"
            operation = "*"
            mode = "lenient"
            reason = "   "
        "#;

        match TomlModePolicy::from_toml_str(toml) {
            Err(LedgerError::ConfigError { reason }) => {
                assert!(reason.contains("undocumented"), "unexpected reason: {reason}");
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }

        let missing = toml.replace("reason = \"   \"", "");
        assert!(matches!(
            TomlModePolicy::from_toml_str(&missing),
            Err(LedgerError::ConfigError { .. })
        ));
    }

    // ── 4. wildcard matching and first match wins ─────────────────────────────

    #[test]
    fn test_first_match_wins() {
        let toml = r#"
            [[rules]]
            id = "strict-task-deletes"
            table = "tasks"
            operation = "DELETE"
            mode = "strict"

            [[rules]]
            id = "lenient-tasks"
            table = "tasks"
            operation = "*"
            mode = "lenient"
            reason = "task reminders are advisory"
        "#;

        let policy = TomlModePolicy::from_toml_str(toml).unwrap();

        assert_eq!(policy.mode_for(&site("tasks", "DELETE")).unwrap(), AuditMode::Strict);
        assert!(!policy.mode_for(&site("tasks", "UPDATE")).unwrap().is_strict());
        assert_eq!(policy.rules().len(), 2);
    }

    /// Operation patterns compare against the exact label.
    #[test]
    fn test_operation_match_is_case_sensitive() {
        let toml = r#"
            [[rules]]
            id = "lenient-lowercase"
            table = "*"
            operation = "update"
            mode = "lenient"
            reason = "never matches UPDATE"
        "#;

        let policy = TomlModePolicy::from_toml_str(toml).unwrap();
        assert_eq!(policy.mode_for(&site("cases", "UPDATE")).unwrap(), AuditMode::Strict);
    }

    // ── 5. configuration sections ─────────────────────────────────────────────

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = LedgerConfig::from_toml_str("").unwrap();
        assert_eq!(config.recorder.max_append_attempts, 3);
        assert_eq!(config.verifier.batch_size, 500);
        assert_eq!(config.store.path, None);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_full_config_parses() {
        let toml = r#"
            [recorder]
            max_append_attempts = 5

            [verifier]
            batch_size = 64

            [store]
            path = "var/caseledger.db"
        "#;

        let config = LedgerConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.recorder.max_append_attempts, 5);
        assert_eq!(config.verifier.batch_size, 64);
        assert_eq!(config.store.path, Some(PathBuf::from("var/caseledger.db")));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let result = LedgerConfig::from_toml_str("[recorder\nmax_append_attempts = ");
        assert!(matches!(result, Err(LedgerError::ConfigError { .. })));

        let result = LedgerConfig::from_toml_str("[[rules]]\nid = \"x\"\nmode = \"sometimes\"");
        assert!(matches!(result, Err(LedgerError::ConfigError { .. })));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let path = std::env::temp_dir().join("caseledger-no-such-config.toml");
        match LedgerConfig::from_file(&path) {
            Err(LedgerError::ConfigError { reason }) => {
                assert!(reason.contains("failed to read config file"));
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }
}
