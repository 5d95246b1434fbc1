// ABOUTME: Integration tests for type-safe identifiers and validated types.
// ABOUTME: Tests scenario names, age thresholds, and id helpers.

use ephem::types::*;

mod scenario_name_tests {
    use super::*;

    #[test]
    fn accepts_portable_names() {
        for name in ["standalone", "cluster-3", "v5.20_causal", "A1"] {
            assert!(ScenarioName::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(ScenarioName::new(""), Err(ScenarioNameError::Empty));
    }

    #[test]
    fn rejects_too_long() {
        let name = "a".repeat(65);
        assert_eq!(ScenarioName::new(&name), Err(ScenarioNameError::TooLong));
        assert!(ScenarioName::new(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn rejects_leading_hyphen() {
        assert_eq!(
            ScenarioName::new("-standalone"),
            Err(ScenarioNameError::StartsWithHyphen)
        );
    }

    #[test]
    fn rejects_invalid_characters() {
        assert_eq!(
            ScenarioName::new("stand alone"),
            Err(ScenarioNameError::InvalidChar(' '))
        );
        assert_eq!(
            ScenarioName::new("a/b"),
            Err(ScenarioNameError::InvalidChar('/'))
        );
    }

    #[test]
    fn slug_is_resource_safe() {
        let name = ScenarioName::new("v5.20_causal").unwrap();
        assert_eq!(name.slug(), "v520-causal");
    }

    #[test]
    fn serde_roundtrip_validates() {
        let name: ScenarioName = serde_json::from_str("\"cluster\"").unwrap();
        assert_eq!(name.as_str(), "cluster");
        assert!(serde_json::from_str::<ScenarioName>("\"bad name\"").is_err());
    }
}

mod age_tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(AgeThreshold::parse("30m").unwrap().as_duration().num_minutes(), 30);
        assert_eq!(AgeThreshold::parse("2h").unwrap().as_duration().num_hours(), 2);
        assert_eq!(AgeThreshold::parse("3d").unwrap().as_duration().num_days(), 3);
        assert_eq!(AgeThreshold::parse("1w").unwrap().as_duration().num_days(), 7);
    }

    #[test]
    fn parse_is_case_and_whitespace_tolerant() {
        let age = AgeThreshold::parse(" 2H ").unwrap();
        assert_eq!(age, AgeThreshold::new(2, AgeUnit::Hours));
        assert_eq!(age.to_string(), "2h");
    }

    #[test]
    fn parse_errors() {
        assert_eq!(AgeThreshold::parse(""), Err(AgeParseError::Empty));
        assert!(matches!(
            AgeThreshold::parse("h"),
            Err(AgeParseError::MissingNumber(_))
        ));
        assert!(matches!(
            AgeThreshold::parse("2y"),
            Err(AgeParseError::UnknownUnit(_))
        ));
        assert!(matches!(
            AgeThreshold::parse("2"),
            Err(AgeParseError::UnknownUnit(_))
        ));
        assert!(matches!(
            AgeThreshold::parse("99999999999d"),
            Err(AgeParseError::Overflow(_))
        ));
    }
}

mod id_tests {
    use super::*;

    #[test]
    fn short_truncates_to_eight_characters() {
        let id = DeploymentId::new("0f3c9a7e-41b2-4c55-9d0e-1234567890ab");
        assert_eq!(id.short(), "0f3c9a7e");
        assert_eq!(DeploymentId::new("abc").short(), "abc");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = DeploymentId::generate();
        let b = DeploymentId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = TargetRef::new("ephem-test-standalone-20250116-143052");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ephem-test-standalone-20250116-143052\"");
        let back: TargetRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
