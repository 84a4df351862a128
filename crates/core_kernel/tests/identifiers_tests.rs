//! Unit tests for the Identifiers module
//!
//! Tests cover identifier creation, parsing, conversion, and display
//! formatting for the ledger entity identifiers.

use core_kernel::{
    OrganizationId, AccountId, JournalEntryId, JournalLineId, InvoiceId,
    PaymentId, AllocationId, RetentionId, RetentionSettingId, ContactId,
    PurchaseOrderId, PurchaseOrderItemId, UserId,
};
use uuid::Uuid;

mod journal_entry_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = JournalEntryId::new();
        let id2 = JournalEntryId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = JournalEntryId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = JournalEntryId::new_v7();
        let uuid1: Uuid = id1.into();
        let uuid2: Uuid = id2.into();
        assert!(uuid1 < uuid2);
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = JournalEntryId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(JournalEntryId::prefix(), "JNL");
    }

    #[test]
    fn test_from_str_with_prefix() {
        let original = JournalEntryId::new();
        let parsed: JournalEntryId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_from_str_without_prefix() {
        let uuid = Uuid::new_v4();
        let parsed: JournalEntryId = uuid.to_string().parse().unwrap();
        assert_eq!(*parsed.as_uuid(), uuid);
    }

    #[test]
    fn test_json_serialization_is_bare_uuid() {
        let id = JournalEntryId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));

        let deserialized: JournalEntryId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}

mod prefixes {
    use super::*;

    #[test]
    fn test_all_prefixes_are_distinct() {
        let prefixes = vec![
            OrganizationId::prefix(),
            AccountId::prefix(),
            JournalEntryId::prefix(),
            JournalLineId::prefix(),
            InvoiceId::prefix(),
            PaymentId::prefix(),
            AllocationId::prefix(),
            RetentionId::prefix(),
            RetentionSettingId::prefix(),
            ContactId::prefix(),
            PurchaseOrderId::prefix(),
            PurchaseOrderItemId::prefix(),
            UserId::prefix(),
        ];

        let mut sorted = prefixes.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), prefixes.len());
    }

    #[test]
    fn test_display_uses_prefix() {
        assert!(OrganizationId::new().to_string().starts_with("ORG-"));
        assert!(InvoiceId::new().to_string().starts_with("INV-"));
        assert!(RetentionId::new().to_string().starts_with("RET-"));
        assert!(PurchaseOrderId::new().to_string().starts_with("PO-"));
    }

    #[test]
    fn test_invalid_string_fails_to_parse() {
        let result: Result<AccountId, _> = "ACC-not-a-uuid".parse();
        assert!(result.is_err());
    }
}
