//! Property-based tests for command classification

use proptest::prelude::*;
use topaz_kernel::commands::{classify, plan_delivery, REJECTED_PREFIXES};
use topaz_kernel::models::{Command, DeliveryMode, SENTINEL};

fn mixed_case(s: &str, mask: u64) -> String {
    s.chars()
        .enumerate()
        .map(|(i, c)| {
            if mask & (1 << (i % 64)) != 0 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn test_classify_never_panics(s in "\\PC*") {
        let command = Command::new(s);
        let _ = command.delivery_plan();
    }

    #[test]
    fn test_rejected_cells_produce_no_writes(
        index in 0..REJECTED_PREFIXES.len(),
        mask in any::<u64>(),
        lead in "[ \t\n]{0,3}",
        rest in "[a-zA-Z0-9 %\n]{0,40}",
    ) {
        let text = format!("{}{}{}", lead, mixed_case(REJECTED_PREFIXES[index], mask), rest);
        let mode = classify(&text);
        prop_assert_eq!(mode, DeliveryMode::Rejected);
        prop_assert!(!mode.reaches_child());
        prop_assert!(plan_delivery(&text, mode).is_none());
    }

    #[test]
    fn test_block_plans_end_on_sentinel(
        body in prop::collection::vec("[a-z0-9+][a-z0-9 +]{0,19}", 0..6),
        with_sentinel in any::<bool>(),
    ) {
        let mut lines = vec!["run".to_string()];
        lines.extend(body.iter().cloned());
        if with_sentinel {
            lines.push(SENTINEL.to_string());
        }
        let text = lines.join("\n");

        let plan = Command::new(text).delivery_plan().unwrap();
        prop_assert_eq!(plan.commands, vec![SENTINEL.to_string()]);
        prop_assert_eq!(plan.raw_lines.len(), body.len() + 1);
        prop_assert!(plan.raw_lines.last().map(|l| l.trim() != SENTINEL).unwrap_or(true));
    }

    #[test]
    fn test_direct_plan_sends_trimmed_text(s in "[t-z][a-z0-9 ]{0,30}") {
        // t..z starts no rejected or block prefix
        let command = Command::new(format!("  {}  ", s));
        prop_assert_eq!(command.mode(), DeliveryMode::Direct);
        let plan = command.delivery_plan().unwrap();
        prop_assert!(plan.raw_lines.is_empty());
        prop_assert_eq!(plan.commands, vec![s.trim().to_string()]);
    }
}
