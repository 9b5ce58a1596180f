use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        TableauError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        TableauError::invalid_handle("x")
            .to_string()
            .contains("invalid handle:")
    );
    assert!(
        TableauError::contract("x")
            .to_string()
            .contains("contract violation:")
    );
    assert!(
        TableauError::backend("x")
            .to_string()
            .contains("backend error:")
    );
    assert!(
        TableauError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = TableauError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn json_errors_map_to_serde_variant() {
    let err: TableauError = serde_json::from_str::<u32>("not json").unwrap_err().into();
    assert!(matches!(err, TableauError::Serde(_)));
}
