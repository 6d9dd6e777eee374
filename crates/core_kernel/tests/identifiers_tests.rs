//! Unit tests for the identifiers module
//!
//! Tests cover identifier creation, parsing, conversion, serialization
//! and display formatting.

use core_kernel::{BillId, LineItemId, CustomerId, CurrencyId};
use uuid::Uuid;

mod bill_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = BillId::new();
        let id2 = BillId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = BillId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = BillId::new_v7();
        assert!(id1 < id2);
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = BillId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(BillId::prefix(), "BIL");
    }

    #[test]
    fn test_from_str_with_prefix() {
        let original = BillId::new();
        let parsed: BillId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_from_str_rejects_foreign_prefix() {
        let line_item = LineItemId::new();
        assert!(line_item.to_string().parse::<BillId>().is_err());
    }
}

mod serialization_tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_bare_uuid() {
        let uuid = Uuid::new_v4();
        let id = CustomerId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }

    #[test]
    fn test_ids_deserialize_from_bare_uuid() {
        let uuid = Uuid::new_v4();
        let id: CurrencyId = serde_json::from_str(&format!("\"{}\"", uuid)).unwrap();
        assert_eq!(*id.as_uuid(), uuid);
    }
}

mod prefix_tests {
    use super::*;

    #[test]
    fn test_all_prefixes_are_distinct() {
        let prefixes = [
            BillId::prefix(),
            LineItemId::prefix(),
            CustomerId::prefix(),
            CurrencyId::prefix(),
        ];
        for (i, a) in prefixes.iter().enumerate() {
            for b in prefixes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
