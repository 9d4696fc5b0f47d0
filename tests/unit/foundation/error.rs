use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert_eq!(
        ConvertError::parse(7, "channel overflow").to_string(),
        "parse error at line 7: channel overflow"
    );
    assert!(
        ConvertError::cardinality("x")
            .to_string()
            .contains("cardinality error:")
    );
    assert!(
        ConvertError::resource("x")
            .to_string()
            .contains("resource error:")
    );
    assert!(
        ConvertError::decode("x")
            .to_string()
            .contains("decode error:")
    );
    assert!(
        ConvertError::validation("x")
            .to_string()
            .contains("validation error:")
    );
}

#[test]
fn io_and_other_preserve_source() {
    let err = ConvertError::from(std::io::Error::other("disk gone"));
    assert!(matches!(err, ConvertError::Io(_)));
    assert!(err.to_string().contains("disk gone"));

    let err = ConvertError::Other(anyhow::anyhow!("boom"));
    assert_eq!(err.to_string(), "boom");
}
