use super::common::{normalize_unset, Field, Reference};
use super::field_map::FieldMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Frontend bookkeeping the gateway must not see.
const METADATA_KEY: &str = "_metadata";

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("No data provided")]
    Empty,

    #[error("Record {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error("Record {index} has an invalid field: {source}")]
    InvalidField {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// One customer for `mdm_customer/create`.
///
/// Fields every submission uses are typed. The many2one slots come in two
/// flavours: `*_id` takes an id or lookup name, while `*_number`/`*_name`
/// take the vendor's business key. Anything else (mostly the `X_*` custom
/// columns) rides along in `extra`, in the order it was received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub number: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub name: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub cust_group_id: Field<Reference>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub create_org_id: Field<Reference>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub use_org_id: Field<Reference>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub sale_user_id: Field<Reference>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub country_id: Field<Reference>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub currency_id: Field<Reference>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub note: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub cust_group_number: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub create_org_number: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub sale_user_number: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub country_name: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub currency_name: Field<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CustomerRecord {
    pub fn from_object(
        index: usize,
        mut object: Map<String, Value>,
        field_map: &FieldMap,
    ) -> Result<Self, RecordError> {
        object.remove(METADATA_KEY);
        let object = field_map.translate(object);

        let mut record: CustomerRecord = serde_json::from_value(Value::Object(object))
            .map_err(|source| RecordError::InvalidField { index, source })?;
        normalize_unset(&mut record.extra);
        Ok(record)
    }

    /// Accepts either a single object or an array of objects.
    pub fn from_payload(payload: Value, field_map: &FieldMap) -> Result<Vec<Self>, RecordError> {
        let items = match payload {
            Value::Array(items) => items,
            Value::Object(object) if object.is_empty() => Vec::new(),
            Value::Object(object) => vec![Value::Object(object)],
            Value::Null => Vec::new(),
            _ => return Err(RecordError::NotAnObject { index: 0 }),
        };
        if items.is_empty() {
            return Err(RecordError::Empty);
        }

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(object) => Self::from_object(index, object, field_map),
                _ => Err(RecordError::NotAnObject { index }),
            })
            .collect()
    }
}

/// Record with every mapped field filled, for end-to-end connection checks.
pub fn full_sample(test_id: u32) -> CustomerRecord {
    let extra: Map<String, Value> = [
        ("X_char_cay5jmarrr", json!("")),
        ("X_char_gzcp4gjmhi", json!(format!("API Test {}", test_id))),
        ("X_char_kg0wwz9xv7", json!("")),
        ("nternal_org_id", json!(false)),
        ("supplier_id", json!(false)),
        ("X_float_tbtkxzkblx", json!(0)),
        ("X_float_s9iykgnts9", json!(0)),
        ("X_float_vuow9bd5j8", json!(0)),
        ("X_char_f15xqcasni", json!("NIL")),
        ("X_char_xy0fi6varj", json!("test@example.com")),
        ("X_selection_ykh5dwo6fd", json!("是")),
        ("X_char_5smvg51jqa", json!("test@example.com")),
        ("X_many2one_eycmxxaldx", json!(false)),
        ("X_char_ayuwxr8kn8", json!("test@example.com")),
        ("inv_tax_number", json!("")),
        ("X_char_0qgsyzxr8t", json!("test@example.com")),
        ("X_char_zroglhprb4", json!("")),
        ("X_char_09sjzp5eae", json!("")),
        ("X_char_mfgjqyo2ah", json!("")),
        ("X_char_nkasruoowt", json!("")),
        ("X_char_t6itzytspg", json!("Test Contact")),
        ("X_char_vitg7ywwao", json!("13800138000")),
        ("X_char_9eqgn6f0dv", json!("")),
        ("X_char_hjjshmrsdx", json!("Test Consignee")),
        ("X_char_9pex08hr7a", json!("13800138000")),
        ("X_char_x7wfy6v7rs", json!("Test Address")),
        ("X_text_muniskyxgu", json!("")),
        ("pay_type_id", json!(false)),
        ("receivable_term_id", json!(false)),
        ("pay_party_id", json!(false)),
        ("receive_id", json!(false)),
        ("sale_dep_id", json!(false)),
        ("receive_party_id", json!(false)),
        ("price_list", json!(false)),
        ("delivery_id", json!(false)),
        ("X_float_noyptjqjqv", json!(0)),
        ("X_date_tmclhk5hqx", json!(false)),
        ("X_date_m5i3bpsrww", json!(false)),
        ("X_date_meluk6hgra", json!(false)),
        ("X_many2one_sc4u7xibxo", json!(false)),
        ("X_float_hkoamhw0em", json!(0)),
        ("inv_title", json!(format!("Test Company {}", test_id))),
        ("inv_bank_name", json!("")),
        ("inv_bank_acct", json!("")),
        ("inv_telephone", json!("13800138000")),
        ("tax_ident", json!(false)),
        ("inv_address", json!("")),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect();

    CustomerRecord {
        number: Field::Set(format!("TEST_{}", test_id)),
        name: Field::Set(format!("API Connection Test {}", test_id)),
        cust_group_number: Field::Set("C103".to_string()),
        create_org_number: Field::Set("My Company".to_string()),
        sale_user_number: Field::Unset,
        country_name: Field::Set("中国".to_string()),
        currency_name: Field::Set("人民币".to_string()),
        use_org_id: Field::Set(Reference::Id(3)),
        note: Field::Set("API connection test - can be deleted".to_string()),
        extra,
        ..Default::default()
    }
}

/// Record with only the fields the gateway requires.
pub fn minimal_sample(test_id: u32) -> CustomerRecord {
    CustomerRecord {
        name: Field::Set(format!("Minimal Test Customer - {}", test_id)),
        cust_group_id: Field::Set(Reference::from("C103")),
        create_org_id: Field::Set(Reference::Id(1)),
        use_org_id: Field::Set(Reference::Id(8)),
        sale_user_id: Field::Set(Reference::from("0005")),
        country_id: Field::Set(Reference::from("Singapore")),
        currency_id: Field::Set(Reference::from("USD")),
        ..Default::default()
    }
}

/// Short numeric id derived from the clock, used to tell test records apart.
pub fn test_id_from(timestamp: i64) -> u32 {
    timestamp.rem_euclid(100_000) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_map() -> FieldMap {
        FieldMap::embedded().unwrap()
    }

    #[test]
    fn known_fields_are_typed_and_rest_goes_to_extra() {
        let payload = json!({
            "name": "小花公司",
            "use_org_id": 3,
            "currency_id": "美元",
            "X_char_t6itzytspg": "Joshua",
            "tax_ident": null,
        });

        let records = CustomerRecord::from_payload(payload, &field_map()).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, Field::Set("小花公司".to_string()));
        assert_eq!(record.use_org_id, Field::Set(Reference::Id(3)));
        assert_eq!(record.currency_id, Field::Set(Reference::from("美元")));
        assert!(record.number.is_absent());
        assert_eq!(record.extra["X_char_t6itzytspg"], json!("Joshua"));
        assert_eq!(record.extra["tax_ident"], json!(false));
    }

    #[test]
    fn serialization_keeps_declared_then_input_order() {
        let payload = json!([{
            "zeta": 1,
            "note": "",
            "name": "A",
            "alpha": "中",
        }]);

        let records = CustomerRecord::from_payload(payload, &field_map()).unwrap();
        assert_eq!(
            serde_json::to_string(&records).unwrap(),
            r#"[{"name":"A","note":false,"zeta":1,"alpha":"中"}]"#
        );
    }

    #[test]
    fn metadata_is_stripped_and_labels_translated() {
        let payload = json!({
            "_metadata": { "submittedAt": "now" },
            "名称": "小花公司",
            "收货地址": "Test Address",
        });

        let records = CustomerRecord::from_payload(payload, &field_map()).unwrap();
        let record = &records[0];
        assert_eq!(record.name, Field::Set("小花公司".to_string()));
        assert!(!record.extra.contains_key(METADATA_KEY));
        assert_eq!(record.extra["X_char_x7wfy6v7rs"], json!("Test Address"));
    }

    #[test]
    fn empty_payloads_are_rejected() {
        for payload in [json!(null), json!({}), json!([])] {
            assert!(matches!(
                CustomerRecord::from_payload(payload, &field_map()),
                Err(RecordError::Empty)
            ));
        }
    }

    #[test]
    fn non_object_items_are_rejected() {
        let payload = json!([{ "name": "ok" }, 42]);
        assert!(matches!(
            CustomerRecord::from_payload(payload, &field_map()),
            Err(RecordError::NotAnObject { index: 1 })
        ));
    }

    #[test]
    fn bad_known_field_reports_index() {
        let payload = json!([{ "name": "ok" }, { "use_org_id": [1] }]);
        assert!(matches!(
            CustomerRecord::from_payload(payload, &field_map()),
            Err(RecordError::InvalidField { index: 1, .. })
        ));
    }

    #[test]
    fn samples_serialize_without_nulls() {
        let full = serde_json::to_value(full_sample(42)).unwrap();
        let object = full.as_object().unwrap();
        assert_eq!(object["number"], json!("TEST_42"));
        assert_eq!(object["sale_user_number"], json!(false));
        assert!(object.values().all(|v| !v.is_null()));
        assert_eq!(object.len(), 56);

        let minimal = serde_json::to_value(minimal_sample(42)).unwrap();
        assert_eq!(minimal.as_object().unwrap().len(), 7);
    }

    #[test]
    fn full_sample_uses_business_keys_for_required_fields() {
        let full = serde_json::to_value(full_sample(7)).unwrap();
        let object = full.as_object().unwrap();
        assert_eq!(object["cust_group_number"], json!("C103"));
        assert_eq!(object["create_org_number"], json!("My Company"));
        assert_eq!(object["country_name"], json!("中国"));
        assert_eq!(object["currency_name"], json!("人民币"));
        assert_eq!(object["use_org_id"], json!(3));
        for id_slot in ["cust_group_id", "create_org_id", "sale_user_id", "country_id", "currency_id"] {
            assert!(!object.contains_key(id_slot), "{} should not be sent", id_slot);
        }
    }

    #[test]
    fn business_keys_decode_as_typed_fields() {
        let payload = json!({ "create_org_number": "org_1001", "sale_user_number": false });
        let record = &CustomerRecord::from_payload(payload, &field_map()).unwrap()[0];
        assert_eq!(record.create_org_number, Field::Set("org_1001".to_string()));
        assert_eq!(record.sale_user_number, Field::Unset);
        assert!(record.extra.is_empty());
    }

    #[test]
    fn test_id_wraps() {
        assert_eq!(test_id_from(1_700_012_345), 12_345);
    }
}
